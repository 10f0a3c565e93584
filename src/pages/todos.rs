use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription, CardHeader, CardTitle,
    Spinner,
};
use crate::gateway::TodoScope;
use crate::models::{Todo, TodoColor, TodoList};
use crate::state::{AppContext, TodoSyncController};
use crate::storage::{load_last_list_id, save_last_list_id};
use crate::sync::{key_action, KeyAction};
use crate::util::{
    allow_drop, blur_target, dragged_id, event_target_checked, event_target_value, start_drag,
};
use icons::X;
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::hooks::{use_navigate, use_query_map};

#[component]
pub fn TodoPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let query = use_query_map();
    let navigate = StoredValue::new(use_navigate());

    let list_id = Memo::new(move |_| {
        query
            .get()
            .get("listId")
            .filter(|id| !id.trim().is_empty())
    });

    // Remember the open list; reopen the last one when landing on `/`.
    let lists = app_state.0.lists;
    let lists_loaded = app_state.0.lists_loaded;
    Effect::new(move |_| match list_id.get() {
        Some(id) => save_last_list_id(Some(&id)),
        None => {
            if !lists_loaded.get() {
                return;
            }
            let Some(last) = load_last_list_id() else {
                return;
            };
            if lists.with(|ls| ls.iter().any(|l| l.id == last)) {
                navigate.with_value(|nav| {
                    nav(
                        &format!("/?listId={}", urlencoding::encode(&last)),
                        Default::default(),
                    )
                });
            } else {
                save_last_list_id(None);
            }
        }
    });

    move || match list_id.get() {
        None => view! { <Welcome /> }.into_any(),
        Some(id) => view! { <ListView list_id=id /> }.into_any(),
    }
}

#[component]
fn Welcome() -> impl IntoView {
    view! {
        <div class="flex min-h-[60vh] items-center justify-center">
            <Card class="w-full max-w-2xl">
                <CardContent class="space-y-6 p-8 text-center">
                    <div class="space-y-4">
                        <h1 class="text-4xl font-bold">"Welcome to Life Planner"</h1>
                        <p class="text-lg text-slate-600 dark:text-slate-400">
                            "Your personal task management and life organization tool"
                        </p>
                    </div>
                    <p class="mx-auto max-w-lg text-left text-base text-slate-700 dark:text-slate-300">
                        "Create a new list from the sidebar or select an existing one to start adding tasks. "
                        "Set priorities, drag items into order, and let AI rewrite a task when it reads unclear."
                    </p>
                </CardContent>
            </Card>
        </div>
    }
}

#[component]
fn ListView(list_id: String) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let owner = app_state.0.owner().to_string();
    let ctrl = TodoSyncController::new(app_state.clone(), TodoScope::list(&owner, &list_id));

    let c_cleanup = ctrl.clone();
    on_cleanup(move || c_cleanup.dispose());

    // Shift+Enter anywhere on the page adds an item.
    let c_key = ctrl.clone();
    let key_handle = window_event_listener(ev::keydown, move |ev: web_sys::KeyboardEvent| {
        if key_action(&ev.key(), ev.shift_key()) == KeyAction::CreateItem {
            ev.prevent_default();
            c_key.add_item();
        }
    });
    on_cleanup(move || key_handle.remove());

    let lists = app_state.0.lists;
    let lists_loaded = app_state.0.lists_loaded;
    let list_id_sv = StoredValue::new(list_id);
    let current_list = Memo::new(move |_| {
        let id = list_id_sv.get_value();
        lists.with(|ls| ls.iter().find(|l| l.id == id).cloned())
    });

    let c_items = ctrl.clone();
    let items = Memo::new(move |_| c_items.visible());

    let preferences = app_state.0.preferences;
    let show_completed = move || preferences.get().show_completed;
    let app = StoredValue::new(app_state);
    let ctrl = StoredValue::new(ctrl);

    view! {
        <Show
            when=move || current_list.get().is_some() || !lists_loaded.get()
            fallback=|| view! {
                <Card>
                    <CardContent>
                        <div class="text-sm text-slate-500">"This list no longer exists."</div>
                    </CardContent>
                </Card>
            }
        >
            <Card>
                <CardHeader class="gap-4">
                    {move || current_list.get().map(|list| view! { <ListHeader list=list /> })}

                    <div class="flex w-full flex-wrap items-center justify-between gap-2">
                        <div class="flex items-center gap-2">
                            <Button size=ButtonSize::Sm on:click=move |_| ctrl.with_value(|c| c.add_item())>
                                "Add item"
                            </Button>
                            <Button
                                variant=ButtonVariant::Outline
                                size=ButtonSize::Sm
                                on:click=move |_| ctrl.with_value(|c| c.sort_by_priority())
                            >
                                "Sort by priority"
                            </Button>
                            <Button
                                variant=ButtonVariant::Outline
                                size=ButtonSize::Sm
                                on:click=move |_| ctrl.with_value(|c| c.sort_by_added_time())
                            >
                                "Sort by added time"
                            </Button>
                        </div>

                        <label class="flex items-center gap-2 text-sm text-slate-600 dark:text-slate-400">
                            <input
                                type="checkbox"
                                prop:checked=show_completed
                                on:change=move |ev| {
                                    let checked = event_target_checked(&ev);
                                    app.with_value(|a| a.0.set_show_completed(checked));
                                }
                            />
                            {move || ctrl.with_value(|c| {
                                format!("Show completed ({} of {})", c.completed_count(), c.total_count())
                            })}
                        </label>
                    </div>
                    <p class="text-xs text-slate-400">"Shift+Enter adds an item. Drag rows to reorder."</p>
                </CardHeader>

                <CardContent>
                    <Show
                        when=move || ctrl.with_value(|c| c.is_loaded())
                        fallback=|| view! {
                            <div class="flex items-center gap-2 text-sm text-slate-500">
                                <Spinner />
                                "Loading…"
                            </div>
                        }
                    >
                        <Show
                            when=move || !items.get().is_empty()
                            fallback=|| view! {
                                <div class="text-sm text-slate-500">"Nothing here yet. Add an item to get started."</div>
                            }
                        >
                            <ul class="flex flex-col gap-1">
                                <For
                                    each=move || items.get()
                                    key=|t: &Todo| t.id.clone()
                                    children=move |t: Todo| {
                                        view! { <TodoRow id=t.id ctrl=ctrl.get_value() items=items /> }
                                    }
                                />
                            </ul>
                        </Show>
                    </Show>
                </CardContent>
            </Card>
        </Show>
    }
}

/// List name and description, each editable in place.
#[component]
fn ListHeader(list: TodoList) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let editing_name = RwSignal::new(false);
    let editing_description = RwSignal::new(false);
    let name_draft = RwSignal::new(String::new());
    let description_draft = RwSignal::new(String::new());
    let name_ref: NodeRef<html::Input> = NodeRef::new();
    let description_ref: NodeRef<html::Input> = NodeRef::new();

    Effect::new(move |_| {
        if editing_name.get() {
            if let Some(el) = name_ref.get() {
                let _ = el.focus();
            }
        }
    });
    Effect::new(move |_| {
        if editing_description.get() {
            if let Some(el) = description_ref.get() {
                let _ = el.focus();
            }
        }
    });

    let list = StoredValue::new(list);

    let app_name = app_state.clone();
    let commit_name = move || {
        editing_name.set(false);
        let current = list.get_value();
        let Some(update) = current.rename_update(&name_draft.get_untracked()) else {
            return;
        };
        let app = app_name.clone();
        spawn_local(async move {
            if let Err(e) = app.0.lists_gateway().update(&current.id, update).await {
                app.0.report("rename list", e);
            }
        });
    };

    let app_desc = app_state.clone();
    let commit_description = move || {
        editing_description.set(false);
        let current = list.get_value();
        let Some(update) = current.describe_update(&description_draft.get_untracked()) else {
            return;
        };
        let app = app_desc.clone();
        spawn_local(async move {
            if let Err(e) = app.0.lists_gateway().update(&current.id, update).await {
                app.0.report("update list description", e);
            }
        });
    };

    // Escape restores the stored value, then leaves the field; blur commits (a no-op).
    let on_edit_keydown = move |ev: web_sys::KeyboardEvent, draft: RwSignal<String>, stored: String| {
        match ev.key().as_str() {
            "Enter" => {
                ev.prevent_default();
                blur_target(&ev);
            }
            "Escape" => {
                draft.set(stored);
                blur_target(&ev);
            }
            _ => {}
        }
    };

    view! {
        <div class="w-full space-y-2">
            <Show
                when=move || editing_name.get()
                fallback=move || view! {
                    <CardTitle
                        class="cursor-text text-2xl"
                        on:click=move |_| {
                            name_draft.set(list.get_value().name);
                            editing_name.set(true);
                        }
                    >
                        {move || list.with_value(|l| l.display_name().to_string())}
                    </CardTitle>
                }
            >
                <input
                    node_ref=name_ref
                    class="w-full rounded-md border border-slate-200 bg-transparent px-2 py-1 text-2xl font-semibold outline-none dark:border-slate-700"
                    placeholder="List name"
                    prop:value=move || name_draft.get()
                    on:input=move |ev| name_draft.set(event_target_value(&ev))
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        on_edit_keydown(ev, name_draft, list.with_value(|l| l.name.clone()))
                    }
                    on:blur={
                        let commit = commit_name.clone();
                        move |_| commit()
                    }
                />
            </Show>

            <Show
                when=move || editing_description.get()
                fallback=move || view! {
                    <CardDescription
                        class="cursor-text"
                        on:click=move |_| {
                            description_draft.set(list.get_value().description);
                            editing_description.set(true);
                        }
                    >
                        {move || list.with_value(|l| {
                            if l.description.is_empty() {
                                "Click to add a description".to_string()
                            } else {
                                l.description.clone()
                            }
                        })}
                    </CardDescription>
                }
            >
                <input
                    node_ref=description_ref
                    class="w-full rounded-md border border-slate-200 bg-transparent px-2 py-1 text-sm outline-none dark:border-slate-700"
                    placeholder="List description (optional)"
                    prop:value=move || description_draft.get()
                    on:input=move |ev| description_draft.set(event_target_value(&ev))
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        on_edit_keydown(ev, description_draft, list.with_value(|l| l.description.clone()))
                    }
                    on:blur={
                        let commit = commit_description.clone();
                        move |_| commit()
                    }
                />
            </Show>
        </div>
    }
}

#[component]
fn TodoRow(id: String, ctrl: TodoSyncController, items: Memo<Vec<Todo>>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let id = StoredValue::new(id);
    let todo = Memo::new(move |_| {
        let id = id.get_value();
        items.with(|xs| xs.iter().find(|t| t.id == id).cloned())
    });

    let input_ref: NodeRef<html::Input> = NodeRef::new();
    let pending_focus = ctrl.pending_focus;
    Effect::new(move |_| {
        if pending_focus.get().as_deref() != Some(id.get_value().as_str()) {
            return;
        }
        if let Some(el) = input_ref.get() {
            let _ = el.focus();
            el.select();
            pending_focus.set(None);
        }
    });

    let text = move || todo.get().map(|t| t.text).unwrap_or_default();
    let done = move || todo.get().is_some_and(|t| t.done);
    let color = move || todo.get().map(|t| t.color).unwrap_or_default();
    let rewriting_id = app_state.0.rewriting_id;
    let rewriting = move || rewriting_id.get().as_deref() == Some(id.get_value().as_str());
    let any_rewriting = move || rewriting_id.get().is_some();

    let ctrl = StoredValue::new(ctrl);

    view! {
        <li
            class="group flex items-center gap-2 rounded-md px-1 py-1 hover:bg-slate-50 dark:hover:bg-slate-800/50"
            draggable="true"
            on:dragstart=move |ev: web_sys::DragEvent| start_drag(&ev, &id.get_value())
            on:dragover=move |ev: web_sys::DragEvent| allow_drop(&ev)
            on:drop=move |ev: web_sys::DragEvent| {
                ev.prevent_default();
                if let Some(source) = dragged_id(&ev) {
                    ctrl.with_value(|c| c.drop_onto(&source, &id.get_value()));
                }
            }
        >
            <span class="cursor-grab text-slate-300 group-hover:text-slate-500" title="Drag to reorder">
                <svg
                    xmlns="http://www.w3.org/2000/svg"
                    width="16"
                    height="16"
                    viewBox="0 0 24 24"
                    fill="currentColor"
                    aria-hidden="true"
                >
                    <circle cx="9" cy="6" r="1.5"></circle>
                    <circle cx="15" cy="6" r="1.5"></circle>
                    <circle cx="9" cy="12" r="1.5"></circle>
                    <circle cx="15" cy="12" r="1.5"></circle>
                    <circle cx="9" cy="18" r="1.5"></circle>
                    <circle cx="15" cy="18" r="1.5"></circle>
                </svg>
            </span>

            <input
                type="checkbox"
                class="size-4 shrink-0"
                prop:checked=done
                on:change=move |ev| {
                    let checked = event_target_checked(&ev);
                    ctrl.with_value(|c| c.set_done(&id.get_value(), checked));
                }
            />

            <span class=move || format!("size-2.5 shrink-0 rounded-full {}", color().dot_class())></span>

            <input
                node_ref=input_ref
                type="text"
                class=move || {
                    if done() {
                        "min-w-0 flex-1 bg-transparent px-1 py-1 text-sm text-slate-400 line-through outline-none"
                    } else {
                        "min-w-0 flex-1 bg-transparent px-1 py-1 text-sm outline-none"
                    }
                }
                placeholder="Write a task…"
                prop:value=text
                on:focus=move |_| ctrl.with_value(|c| c.on_focus(&id.get_value()))
                on:input=move |ev| {
                    let value = event_target_value(&ev);
                    ctrl.with_value(|c| c.on_input(&id.get_value(), &value));
                }
                on:blur=move |_| ctrl.with_value(|c| c.on_blur(&id.get_value()))
                on:keydown=move |ev: web_sys::KeyboardEvent| ctrl.with_value(|c| c.on_keydown(&ev))
            />

            <select
                class="h-8 shrink-0 rounded-md border border-slate-200 bg-transparent px-1 text-xs dark:border-slate-700"
                title="Priority"
                on:change=move |ev| {
                    let next = TodoColor::from_value(&event_target_value(&ev));
                    ctrl.with_value(|c| c.set_color(&id.get_value(), next));
                }
            >
                {move || {
                    // A legacy green item keeps its option so the picker shows it.
                    let current = color();
                    let mut options = TodoColor::SELECTABLE.to_vec();
                    if current == TodoColor::Green {
                        options.push(TodoColor::Green);
                    }
                    options
                        .into_iter()
                        .map(|c| view! {
                            <option value=c.as_ref().to_string() prop:selected=current == c>{c.label()}</option>
                        })
                        .collect_view()
                }}
            </select>

            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                attr:title="Rewrite with AI"
                attr:disabled=move || any_rewriting() || text().trim().is_empty()
                on:click=move |_| ctrl.with_value(|c| c.rewrite(&id.get_value()))
            >
                <Show
                    when=rewriting
                    fallback=|| view! {
                        <svg
                            xmlns="http://www.w3.org/2000/svg"
                            width="16"
                            height="16"
                            viewBox="0 0 24 24"
                            fill="none"
                            stroke="currentColor"
                            stroke-width="2"
                            stroke-linecap="round"
                            stroke-linejoin="round"
                            aria-hidden="true"
                        >
                            <path d="M12 3l1.9 5.8L20 10l-6.1 1.2L12 17l-1.9-5.8L4 10l6.1-1.2z"></path>
                        </svg>
                    }
                >
                    <Spinner />
                </Show>
            </Button>

            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                attr:title="Delete"
                on:click=move |_| ctrl.with_value(|c| c.remove(&id.get_value()))
            >
                <X class="size-4" />
            </Button>
        </li>
    }
}
