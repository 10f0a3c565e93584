use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription, CardHeader, CardTitle,
    Input, Label, Spinner, Textarea,
};
use crate::models::{category_counts, Goal, GoalCategory, GoalStatus, GoalUpdate, NewGoal};
use crate::state::AppContext;
use crate::util::{confirm, event_target_value, now_ms};
use icons::X;
use leptos::prelude::*;
use leptos::task::spawn_local;

fn status_badge_class(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::NotStarted => "bg-slate-100 text-slate-700 dark:bg-slate-800 dark:text-slate-300",
        GoalStatus::InProgress => "bg-blue-100 text-blue-700 dark:bg-blue-950 dark:text-blue-300",
        GoalStatus::Completed => "bg-green-100 text-green-700 dark:bg-green-950 dark:text-green-300",
        GoalStatus::OnHold => "bg-amber-100 text-amber-700 dark:bg-amber-950 dark:text-amber-300",
    }
}

fn chip_class(selected: bool) -> &'static str {
    if selected {
        "rounded-full bg-slate-900 px-3 py-1 text-xs font-medium text-white dark:bg-slate-50 dark:text-slate-900"
    } else {
        "rounded-full border border-slate-200 px-3 py-1 text-xs text-slate-600 hover:bg-slate-100 dark:border-slate-700 dark:text-slate-300 dark:hover:bg-slate-800"
    }
}

#[component]
pub fn GoalsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let goals: RwSignal<Vec<Goal>> = RwSignal::new(vec![]);
    let loaded = RwSignal::new(false);
    let subscription = StoredValue::new(Some(app_state.0.goals().subscribe(move |next| {
        let _ = goals.try_set(next);
        let _ = loaded.try_set(true);
    })));
    on_cleanup(move || subscription.update_value(|s| drop(s.take())));

    // `None` shows every goal.
    let filter: RwSignal<Option<GoalCategory>> = RwSignal::new(None);
    let shown = Memo::new(move |_| {
        let f = filter.get();
        goals.with(|gs| {
            gs.iter()
                .filter(|g| f.is_none() || g.category == f)
                .cloned()
                .collect::<Vec<_>>()
        })
    });
    let counts = Memo::new(move |_| goals.with(|gs| category_counts(gs)));

    view! {
        <div class="space-y-4">
            <NewGoalForm />

            <div class="flex flex-wrap gap-2">
                <button
                    class=move || chip_class(filter.get().is_none())
                    on:click=move |_| filter.set(None)
                >
                    {move || format!("All ({})", goals.with(|gs| gs.len()))}
                </button>
                {move || {
                    counts
                        .get()
                        .into_iter()
                        .map(|(category, n)| view! {
                            <button
                                class=move || chip_class(filter.get() == Some(category))
                                on:click=move |_| filter.set(Some(category))
                            >
                                {format!("{} ({})", category.label(), n)}
                            </button>
                        })
                        .collect_view()
                }}
            </div>

            <Show
                when=move || loaded.get()
                fallback=|| view! {
                    <div class="flex items-center gap-2 text-sm text-slate-500">
                        <Spinner />
                        "Loading goals…"
                    </div>
                }
            >
                <Show
                    when=move || !shown.get().is_empty()
                    fallback=|| view! { <div class="text-sm text-slate-500">"No goals here yet."</div> }
                >
                    <div class="grid gap-3 md:grid-cols-2">
                        <For
                            each=move || shown.get()
                            key=|g: &Goal| g.id.clone()
                            children=move |g: Goal| view! { <GoalCard id=g.id goals=goals /> }
                        />
                    </div>
                </Show>
            </Show>
        </div>
    }
}

#[component]
fn NewGoalForm() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let name = RwSignal::new(String::new());
    let description = RwSignal::new(String::new());
    let category: RwSignal<Option<GoalCategory>> = RwSignal::new(None);
    let form_error: RwSignal<Option<String>> = RwSignal::new(None);
    let saving = RwSignal::new(false);

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if saving.get_untracked() {
            return;
        }

        let goal = match NewGoal::new(
            &name.get_untracked(),
            &description.get_untracked(),
            category.get_untracked(),
            now_ms(),
        ) {
            Ok(goal) => goal,
            Err(e) => {
                form_error.set(Some(e.to_string()));
                return;
            }
        };

        form_error.set(None);
        saving.set(true);
        let app = app_state.clone();
        spawn_local(async move {
            match app.0.goals().create(&goal).await {
                Ok(_) => {
                    name.set(String::new());
                    description.set(String::new());
                    category.set(None);
                }
                Err(e) => app.0.report("create goal", e),
            }
            saving.set(false);
        });
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-2xl">"Goal Management"</CardTitle>
                <CardDescription>"What you are working toward, by area of life."</CardDescription>
            </CardHeader>
            <CardContent>
                <form class="space-y-3" on:submit=on_submit>
                    <div class="space-y-1">
                        <Label html_for="goal-name">"Name"</Label>
                        <Input id="goal-name" bind_value=name placeholder="Run a half marathon" />
                    </div>
                    <div class="space-y-1">
                        <Label html_for="goal-description">"Description (optional)"</Label>
                        <Textarea id="goal-description" bind_value=description rows=2 />
                    </div>
                    <div class="flex flex-wrap items-end gap-3">
                        <div class="space-y-1">
                            <Label html_for="goal-category">"Category"</Label>
                            <select
                                id="goal-category"
                                class="h-9 rounded-md border border-slate-200 bg-transparent px-2 text-sm dark:border-slate-700"
                                on:change=move |ev| category.set(GoalCategory::from_value(&event_target_value(&ev)))
                            >
                                <option value="" prop:selected=move || category.get().is_none()>"No category"</option>
                                {GoalCategory::ALL
                                    .into_iter()
                                    .map(|c| view! {
                                        <option value=c.as_ref().to_string() prop:selected=move || category.get() == Some(c)>
                                            {c.label()}
                                        </option>
                                    })
                                    .collect_view()}
                            </select>
                        </div>
                        <Button attr:disabled=move || saving.get()>
                            "Add goal"
                        </Button>
                    </div>
                    {move || form_error.get().map(|e| view! { <p class="text-xs text-red-600">{e}</p> })}
                </form>
            </CardContent>
        </Card>
    }
}

#[component]
fn GoalCard(id: String, goals: RwSignal<Vec<Goal>>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let id = StoredValue::new(id);
    let goal = Memo::new(move |_| {
        let id = id.get_value();
        goals.with(|gs| gs.iter().find(|g| g.id == id).cloned())
    });

    let editing = RwSignal::new(false);
    let name_draft = RwSignal::new(String::new());
    let description_draft = RwSignal::new(String::new());
    let edit_error: RwSignal<Option<String>> = RwSignal::new(None);

    let app_update = app_state.clone();
    let send_update = move |update: GoalUpdate| {
        let app = app_update.clone();
        spawn_local(async move {
            if let Err(e) = app.0.goals().update(&id.get_value(), update).await {
                app.0.report("update goal", e);
            }
        });
    };

    let start_edit = move |_| {
        if let Some(g) = goal.get_untracked() {
            name_draft.set(g.name);
            description_draft.set(g.description);
            edit_error.set(None);
            editing.set(true);
        }
    };

    let save_edit = {
        let send_update = send_update.clone();
        move |_| match GoalUpdate::details(&name_draft.get_untracked(), &description_draft.get_untracked()) {
            Ok(update) => {
                editing.set(false);
                send_update(update);
            }
            Err(e) => edit_error.set(Some(e.to_string())),
        }
    };

    let app_delete = app_state.clone();
    let on_delete = move |_| {
        let Some(g) = goal.get_untracked() else {
            return;
        };
        if !confirm(&format!("Delete the goal \"{}\"?", g.name)) {
            return;
        }
        let app = app_delete.clone();
        spawn_local(async move {
            if let Err(e) = app.0.goals().delete(&g.id).await {
                app.0.report("delete goal", e);
            }
        });
    };

    let status = move || goal.get().map(|g| g.status).unwrap_or_default();
    let current_category = move || goal.get().and_then(|g| g.category);
    let on_status = {
        let send_update = send_update.clone();
        move |ev: web_sys::Event| {
            if let Some(next) = GoalStatus::from_value(&event_target_value(&ev)) {
                send_update(GoalUpdate::Status(next));
            }
        }
    };
    let on_category = move |ev: web_sys::Event| {
        send_update(GoalUpdate::Category(GoalCategory::from_value(&event_target_value(&ev))));
    };

    view! {
        <Card class="gap-3 py-4">
            <CardHeader class="px-4">
                <div class="flex w-full items-start justify-between gap-2">
                    <Show
                        when=move || editing.get()
                        fallback=move || view! {
                            <CardTitle class="cursor-text" on:click=start_edit>
                                {move || goal.get().map(|g| g.name).unwrap_or_default()}
                            </CardTitle>
                        }
                    >
                        <Input bind_value=name_draft class="h-8 text-sm" placeholder="Goal name" />
                    </Show>
                    <Button variant=ButtonVariant::Ghost size=ButtonSize::Icon attr:title="Delete goal" on:click=on_delete.clone()>
                        <X class="size-4" />
                    </Button>
                </div>
                <span class=move || format!("rounded-full px-2 py-0.5 text-xs font-medium {}", status_badge_class(status()))>
                    {move || status().label()}
                </span>
            </CardHeader>

            <CardContent class="space-y-3 px-4">
                <Show
                    when=move || editing.get()
                    fallback=move || view! {
                        <p class="cursor-text whitespace-pre-wrap text-sm text-slate-600 dark:text-slate-400" on:click=start_edit>
                            {move || {
                                let d = goal.get().map(|g| g.description).unwrap_or_default();
                                if d.is_empty() { "No description".to_string() } else { d }
                            }}
                        </p>
                    }
                >
                    <Textarea bind_value=description_draft rows=3 />
                    {move || edit_error.get().map(|e| view! { <p class="text-xs text-red-600">{e}</p> })}
                    <div class="flex gap-2">
                        <Button size=ButtonSize::Sm on:click=save_edit.clone()>"Save"</Button>
                        <Button size=ButtonSize::Sm variant=ButtonVariant::Outline on:click=move |_| editing.set(false)>
                            "Cancel"
                        </Button>
                    </div>
                </Show>

                <div class="flex flex-wrap gap-2">
                    <select
                        class="h-8 rounded-md border border-slate-200 bg-transparent px-2 text-xs dark:border-slate-700"
                        title="Status"
                        on:change=on_status
                    >
                        {GoalStatus::ALL
                            .into_iter()
                            .map(|s| view! {
                                <option value=s.as_ref().to_string() prop:selected=move || status() == s>{s.label()}</option>
                            })
                            .collect_view()}
                    </select>
                    <select
                        class="h-8 rounded-md border border-slate-200 bg-transparent px-2 text-xs dark:border-slate-700"
                        title="Category"
                        on:change=on_category
                    >
                        <option value="" prop:selected=move || current_category().is_none()>"No category"</option>
                        {GoalCategory::ALL
                            .into_iter()
                            .map(|c| view! {
                                <option value=c.as_ref().to_string() prop:selected=move || current_category() == Some(c)>
                                    {c.label()}
                                </option>
                            })
                            .collect_view()}
                    </select>
                </div>
            </CardContent>
        </Card>
    }
}
