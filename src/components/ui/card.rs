use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Card, div, "flex flex-col gap-4 rounded-xl border border-slate-200 bg-white py-6 text-slate-900 shadow-sm dark:border-slate-800 dark:bg-slate-900 dark:text-slate-50"}
    clx! {CardHeader, div, "flex flex-col items-start gap-1.5 px-6"}
    clx! {CardTitle, h2, "text-lg leading-none font-semibold"}
    clx! {CardDescription, p, "text-sm text-slate-500 dark:text-slate-400"}
    clx! {CardContent, div, "px-6"}
}

pub use components::*;
