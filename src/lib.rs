mod app;
mod components;
mod config;
mod errors;
mod gateway;
mod models;
mod pages;
mod rewrite;
mod state;
mod storage;
mod store;
mod sync;
mod util;

pub use app::App;
pub use config::EnvConfig;

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_env_config_defaults_in_browser() {
        let cfg = EnvConfig::new();
        assert_eq!(cfg.user_id, config::DEFAULT_OWNER);
        assert!(cfg.prompt_template_url.ends_with("/prompts/rewrite-todo.txt"));
    }
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}
