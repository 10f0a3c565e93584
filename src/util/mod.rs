use wasm_bindgen::JsCast;

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Browser confirm dialog; `false` when there is no window.
pub(crate) fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.confirm_with_message(message).ok())
        .unwrap_or(false)
}

/// Start a repeating timer. Returns the handle for [`clear_interval`].
pub(crate) fn set_interval(ms: i32, f: impl FnMut() + 'static) -> Option<i32> {
    let win = web_sys::window()?;
    let cb = wasm_bindgen::closure::Closure::wrap(Box::new(f) as Box<dyn FnMut()>);
    let tid = win
        .set_interval_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), ms)
        .ok();
    cb.forget();
    tid
}

pub(crate) fn clear_interval(tid: i32) {
    if let Some(win) = web_sys::window() {
        win.clear_interval_with_handle(tid);
    }
}

/// Blur the element an event was dispatched on.
pub(crate) fn blur_target(ev: &web_sys::Event) {
    if let Some(el) = ev
        .current_target()
        .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
    {
        let _ = el.blur();
    }
}

pub(crate) fn event_target_value(ev: &web_sys::Event) -> String {
    let Some(target) = ev.target() else {
        return String::new();
    };
    if let Some(input) = target.dyn_ref::<web_sys::HtmlInputElement>() {
        input.value()
    } else if let Some(area) = target.dyn_ref::<web_sys::HtmlTextAreaElement>() {
        area.value()
    } else if let Some(select) = target.dyn_ref::<web_sys::HtmlSelectElement>() {
        select.value()
    } else {
        String::new()
    }
}

pub(crate) fn event_target_checked(ev: &web_sys::Event) -> bool {
    ev.target()
        .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
        .map(|input| input.checked())
        .unwrap_or(false)
}

/// Id carried by an HTML5 drag, if any.
pub(crate) fn dragged_id(ev: &web_sys::DragEvent) -> Option<String> {
    ev.data_transfer()
        .and_then(|dt| dt.get_data("text/plain").ok())
        .filter(|id| !id.trim().is_empty())
}

pub(crate) fn start_drag(ev: &web_sys::DragEvent, id: &str) {
    if let Some(dt) = ev.data_transfer() {
        let _ = dt.set_data("text/plain", id);
        dt.set_effect_allowed("move");
    }
}

pub(crate) fn allow_drop(ev: &web_sys::DragEvent) {
    ev.prevent_default();
    if let Some(dt) = ev.data_transfer() {
        dt.set_drop_effect("move");
    }
}
