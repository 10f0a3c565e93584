use crate::components::ui::{
    Button, Card, CardContent, CardDescription, CardHeader, CardTitle, Label, Spinner, Textarea,
};
use crate::models::PersonalBrief;
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;

/// The personal brief: three free-text sections fed into AI rewrites.
#[component]
pub fn BriefPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let intro = RwSignal::new(String::new());
    let who_you_are = RwSignal::new(String::new());
    let what_you_want = RwSignal::new(String::new());

    let loading = RwSignal::new(true);
    let saving = RwSignal::new(false);
    let saved = RwSignal::new(false);

    let app_load = app_state.clone();
    spawn_local(async move {
        match app_load.0.brief().get().await {
            Ok(brief) => {
                let _ = intro.try_set(brief.intro);
                let _ = who_you_are.try_set(brief.who_you_are);
                let _ = what_you_want.try_set(brief.what_you_want);
            }
            Err(e) => app_load.0.report("load brief", e),
        }
        let _ = loading.try_set(false);
    });

    // Any edit after a save clears the indicator.
    Effect::new(move |_| {
        intro.track();
        who_you_are.track();
        what_you_want.track();
        saved.set(false);
    });

    let on_save = move |_| {
        if saving.get_untracked() {
            return;
        }
        let brief = PersonalBrief {
            intro: intro.get_untracked(),
            who_you_are: who_you_are.get_untracked(),
            what_you_want: what_you_want.get_untracked(),
        };

        saving.set(true);
        let app = app_state.clone();
        spawn_local(async move {
            match app.0.brief().save(&brief).await {
                Ok(()) => {
                    let _ = saved.try_set(true);
                }
                Err(e) => app.0.report("save brief", e),
            }
            let _ = saving.try_set(false);
        });
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle>"Personal Brief"</CardTitle>
                <CardDescription>
                    "A short description of yourself. It gives AI rewrites the context to phrase tasks your way."
                </CardDescription>
            </CardHeader>
            <CardContent>
                <Show
                    when=move || !loading.get()
                    fallback=|| view! {
                        <div class="flex items-center gap-2 text-sm text-slate-500">
                            <Spinner />
                            "Loading…"
                        </div>
                    }
                >
                    <div class="space-y-4">
                        <div class="space-y-1">
                            <Label html_for="brief-intro">"Introduction"</Label>
                            <Textarea id="brief-intro" bind_value=intro rows=3 placeholder="A few words about yourself" />
                        </div>
                        <div class="space-y-1">
                            <Label html_for="brief-who">"Who you are"</Label>
                            <Textarea id="brief-who" bind_value=who_you_are rows=4 placeholder="Work, family, what fills your days" />
                        </div>
                        <div class="space-y-1">
                            <Label html_for="brief-want">"What you want"</Label>
                            <Textarea id="brief-want" bind_value=what_you_want rows=4 placeholder="What you are aiming for" />
                        </div>
                        <div class="flex items-center gap-3">
                            <Button attr:disabled=move || saving.get() on:click=on_save.clone()>
                                {move || if saving.get() { "Saving…" } else { "Save" }}
                            </Button>
                            <Show when=move || saved.get() fallback=|| ().into_view()>
                                <span class="text-sm text-green-600">"Saved"</span>
                            </Show>
                        </div>
                    </div>
                </Show>
            </CardContent>
        </Card>
    }
}
