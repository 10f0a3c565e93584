use crate::pages::{AppLayout, BriefPage, GoalsPage, TodoPage};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    provide_context(AppContext(AppState::new()));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-slate-500">"Not found"</div> }>
                <Route path=path!("goals") view=move || view! {
                    <AppLayout>
                        <GoalsPage />
                    </AppLayout>
                } />
                <Route path=path!("brief") view=move || view! {
                    <AppLayout>
                        <BriefPage />
                    </AppLayout>
                } />
                <Route path=path!("") view=move || view! {
                    <AppLayout>
                        <TodoPage />
                    </AppLayout>
                } />
            </Routes>
        </Router>
    }
}
