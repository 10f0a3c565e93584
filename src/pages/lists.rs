use crate::components::ui::{Button, ButtonSize, ButtonVariant, Input};
use crate::models::{next_list_order, NewTodoList, TodoList};
use crate::state::AppContext;
use crate::storage::save_last_list_id;
use crate::sync::{arrange_by, move_within};
use crate::util::{allow_drop, confirm, dragged_id, now_ms, start_drag};
use icons::X;
use leptos::html;
use leptos::logging::log;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::{use_navigate, use_query_map};

fn list_href(id: &str) -> String {
    format!("/?listId={}", urlencoding::encode(id))
}

#[component]
pub fn ListSidebar() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let lists = app_state.0.lists;
    let lists_loaded = app_state.0.lists_loaded;

    let query = use_query_map();
    let current_list_id = move || query.get().get("listId");
    let navigate = StoredValue::new(use_navigate());

    let creating = RwSignal::new(false);
    let new_name = RwSignal::new(String::new());
    let new_name_ref: NodeRef<html::Input> = NodeRef::new();

    Effect::new(move |_| {
        if creating.get() {
            if let Some(el) = new_name_ref.get() {
                let _ = el.focus();
            }
        }
    });

    let app_create = app_state.clone();
    let submit_create = move || {
        let name = new_name.get_untracked().trim().to_string();
        if name.is_empty() {
            return;
        }

        let list = NewTodoList {
            name,
            description: String::new(),
            created_at: now_ms(),
            order: lists.with_untracked(|ls| next_list_order(ls)),
        };
        new_name.set(String::new());
        creating.set(false);

        let app = app_create.clone();
        spawn_local(async move {
            match app.0.lists_gateway().create(&list).await {
                Ok(id) => {
                    log!("[App] created list {}", id);
                    navigate.with_value(|nav| nav(&list_href(&id), Default::default()));
                }
                Err(e) => app.0.report("create list", e),
            }
        });
    };

    let app_reorder = app_state.clone();
    let on_drop_list = move |source: String, destination: String| {
        let ids: Vec<String> = lists.with_untracked(|ls| ls.iter().map(|l| l.id.clone()).collect());
        let Some(next) = move_within(&ids, &source, &destination) else {
            return;
        };

        // Show the new order right away; the snapshot confirms it.
        lists.update(|ls| arrange_by(ls, &next, |l| l.id.as_str()));

        let app = app_reorder.clone();
        spawn_local(async move {
            if let Err(e) = app.0.lists_gateway().batch_reorder(&next).await {
                app.0.report("reorder lists", e);
            }
        });
    };

    let app_delete = app_state.clone();
    let on_delete_list = move |list: TodoList| {
        if !confirm(&format!(
            "Delete \"{}\" and all of its items?",
            list.display_name()
        )) {
            return;
        }

        let was_open = query.get_untracked().get("listId").as_deref() == Some(list.id.as_str());
        let app = app_delete.clone();
        spawn_local(async move {
            match app.0.lists_gateway().delete(&list.id).await {
                Ok(()) => {
                    if was_open {
                        save_last_list_id(None);
                        navigate.with_value(|nav| nav("/", Default::default()));
                    }
                }
                Err(e) => app.0.report("delete list", e),
            }
        });
    };

    let on_drop_list = StoredValue::new(on_drop_list);
    let on_delete_list = StoredValue::new(on_delete_list);

    view! {
        <div class="space-y-2">
            <div class="flex items-center justify-between">
                <div class="text-xs font-medium uppercase tracking-wide text-slate-500">"Lists"</div>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Sm
                    attr:title="New list"
                    on:click=move |_| creating.update(|v| *v = !*v)
                >
                    "+ New"
                </Button>
            </div>

            <Show when=move || creating.get() fallback=|| ().into_view()>
                <form
                    class="flex items-center gap-1"
                    on:submit={
                        let submit = submit_create.clone();
                        move |ev: web_sys::SubmitEvent| {
                            ev.prevent_default();
                            submit();
                        }
                    }
                >
                    <Input
                        node_ref=new_name_ref
                        bind_value=new_name
                        placeholder="List name"
                        class="h-8 text-sm"
                    />
                    <Button size=ButtonSize::Sm>"Add"</Button>
                </form>
            </Show>

            <Show
                when=move || lists_loaded.get()
                fallback=|| view! { <div class="px-2 text-xs text-slate-400">"Loading…"</div> }
            >
                <Show
                    when=move || !lists.with(|ls| ls.is_empty())
                    fallback=|| view! { <div class="px-2 text-xs text-slate-400">"No lists yet"</div> }
                >
                    <ul class="space-y-0.5">
                        <For
                            each=move || lists.get()
                            key=|l: &TodoList| (l.id.clone(), l.name.clone())
                            children=move |list: TodoList| {
                                let id = StoredValue::new(list.id.clone());
                                let active = move || current_list_id().as_deref() == Some(id.get_value().as_str());
                                let list_sv = StoredValue::new(list.clone());

                                view! {
                                    <li
                                        class=move || {
                                            if active() {
                                                "group flex items-center gap-1 rounded-md bg-slate-100 px-2 py-1 dark:bg-slate-800"
                                            } else {
                                                "group flex items-center gap-1 rounded-md px-2 py-1 hover:bg-slate-50 dark:hover:bg-slate-800/50"
                                            }
                                        }
                                        draggable="true"
                                        on:dragstart=move |ev: web_sys::DragEvent| start_drag(&ev, &id.get_value())
                                        on:dragover=move |ev: web_sys::DragEvent| allow_drop(&ev)
                                        on:drop=move |ev: web_sys::DragEvent| {
                                            ev.prevent_default();
                                            if let Some(source) = dragged_id(&ev) {
                                                on_drop_list.with_value(|f| f(source, id.get_value()));
                                            }
                                        }
                                    >
                                        <a
                                            href=list_href(&list.id)
                                            class="min-w-0 flex-1 truncate text-sm"
                                        >
                                            {list.display_name().to_string()}
                                        </a>
                                        <button
                                            class="shrink-0 rounded p-0.5 text-slate-400 opacity-0 hover:text-red-600 group-hover:opacity-100"
                                            title="Delete list"
                                            on:click=move |_| on_delete_list.with_value(|f| f(list_sv.get_value()))
                                        >
                                            <X class="size-3.5" />
                                        </button>
                                    </li>
                                }
                            }
                        />
                    </ul>
                </Show>
            </Show>
        </div>
    }
}
