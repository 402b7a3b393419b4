//! Keyboard-driven outline editor.
//!
//! Nodes are persisted through a [`store::NodeStore`]; [`outline::Outliner`] applies the
//! structural commands (add sibling, indent, outdent, delete, toggle status, commit text)
//! and the Leptos editor renders the resulting [`outline::OutlineChange`]s.

pub mod config;
pub mod cursor;
pub mod models;
pub mod outline;
pub mod store;
pub mod sync;

mod app;
mod components;
mod editor;
mod state;
mod storage;
mod util;

pub use state::outline_root;

use crate::app::App;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;


// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}
