pub mod brief;
pub mod goals;
pub mod lists;
pub mod todos;

pub use brief::BriefPage;
pub use goals::GoalsPage;
pub use lists::ListSidebar;
pub use todos::TodoPage;

use crate::components::ui::ErrorBanner;
use crate::state::AppContext;
use leptos::prelude::*;
use leptos_router::hooks::use_location;

const NAV_ITEMS: [(&str, &str); 3] = [
    ("/", "To-Do List"),
    ("/goals", "Goal Management"),
    ("/brief", "Personal Brief"),
];

#[component]
pub fn AppLayout(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let error = app_state.0.error;

    let location = use_location();
    let pathname = move || location.pathname.get();
    let on_todos = move || pathname() == "/";

    let app_dismiss = app_state.clone();
    let on_dismiss = Callback::new(move |_| app_dismiss.0.clear_error());

    let nav_class = move |href: &'static str| {
        if pathname() == href {
            "block rounded-md bg-slate-100 px-2 py-1.5 text-sm font-medium text-slate-900 dark:bg-slate-800 dark:text-slate-50"
        } else {
            "block rounded-md px-2 py-1.5 text-sm text-slate-600 hover:bg-slate-50 dark:text-slate-400 dark:hover:bg-slate-800/50"
        }
    };

    view! {
        <div class="min-h-screen bg-slate-50 text-slate-900 dark:bg-slate-950 dark:text-slate-50">
            <div class="mx-auto flex min-h-screen w-full max-w-6xl gap-6 px-4 py-6">
                <aside class="w-60 shrink-0">
                    <div class="sticky top-6 space-y-6">
                        <a href="/" class="block text-lg font-semibold">"Life Planner"</a>

                        <nav class="space-y-0.5">
                            {NAV_ITEMS
                                .into_iter()
                                .map(|(href, label)| view! {
                                    <a href=href class=move || nav_class(href)>{label}</a>
                                })
                                .collect_view()}
                        </nav>

                        <Show when=on_todos fallback=|| ().into_view()>
                            <ListSidebar />
                        </Show>
                    </div>
                </aside>

                <main class="min-w-0 flex-1 space-y-4">
                    <ErrorBanner message=Signal::derive(move || error.get()) on_dismiss=on_dismiss />
                    {children()}
                </main>
            </div>
        </div>
    }
}
