// Locarch desktop entry point. All the work happens in locarch_lib::run();
// this binary only exists because Tauri's bundler wants a `src/main.rs`,
// not a library, as the thing it packages per-platform.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    locarch_lib::run();
}
