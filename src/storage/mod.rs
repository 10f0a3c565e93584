use serde::{Deserialize, Serialize};

/// Last list the user opened; restored when the app starts on `/`.
pub(crate) const LAST_LIST_KEY: &str = "life_planner_last_list_id";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let json = local_storage()?.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Some(storage) = local_storage() {
            let _ = storage.set_item(key, &json);
        }
    }
}

pub(crate) fn remove_from_storage(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

pub(crate) fn load_last_list_id() -> Option<String> {
    load_json_from_storage::<String>(LAST_LIST_KEY).filter(|id| !id.trim().is_empty())
}

pub(crate) fn save_last_list_id(id: Option<&str>) {
    match id.filter(|id| !id.trim().is_empty()) {
        Some(id) => save_json_to_storage(LAST_LIST_KEY, &id),
        None => remove_from_storage(LAST_LIST_KEY),
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_last_list_roundtrip() {
        save_last_list_id(Some("l1"));
        assert_eq!(load_last_list_id().as_deref(), Some("l1"));

        save_last_list_id(None);
        assert_eq!(load_last_list_id(), None);
    }

    #[wasm_bindgen_test]
    fn test_blank_list_id_clears_entry() {
        save_last_list_id(Some("l2"));
        save_last_list_id(Some("  "));
        assert_eq!(load_last_list_id(), None);
    }
}
