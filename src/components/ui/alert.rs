use icons::X;
use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Alert, div, "relative flex w-full items-start gap-3 rounded-lg border px-4 py-3 text-sm"}
    clx! {AlertDescription, p, "flex-1 text-sm leading-relaxed"}
}

pub use components::*;

/// Dismissable banner for a failed user action.
#[component]
pub fn ErrorBanner(#[prop(into)] message: Signal<Option<String>>, on_dismiss: Callback<()>) -> impl IntoView {
    view! {
        <Show when=move || message.get().is_some() fallback=|| ().into_view()>
            <Alert class="border-red-200 bg-red-50 text-red-700 dark:border-red-900 dark:bg-red-950 dark:text-red-300">
                <AlertDescription>{move || message.get().unwrap_or_default()}</AlertDescription>
                <button
                    class="shrink-0 rounded p-0.5 hover:bg-red-100 dark:hover:bg-red-900"
                    title="Dismiss"
                    on:click=move |_| on_dismiss.run(())
                >
                    <X class="size-4" />
                </button>
            </Alert>
        </Show>
    }
}
