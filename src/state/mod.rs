use crate::config::EnvConfig;
use crate::models::NodeId;
use leptos::prelude::*;
use std::sync::OnceLock;
use wasm_bindgen::JsCast;

static OUTLINE_ROOT: OnceLock<NodeId> = OnceLock::new();

/// Root of the outline for this process.
///
/// The first call fixes it from `config.root_id`; later calls return the same id whatever
/// config they pass.
pub fn outline_root(config: &EnvConfig) -> NodeId {
    OUTLINE_ROOT
        .get_or_init(|| NodeId::new(config.root_id.clone()))
        .clone()
}

#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub config: StoredValue<EnvConfig>,

    /// Last store failure, shown until the repair pass drains the queue.
    pub store_error: RwSignal<Option<String>>,
    /// Writes waiting for the repair pass.
    pub pending_writes: RwSignal<usize>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(EnvConfig::new())
    }

    pub fn with_config(config: EnvConfig) -> Self {
        Self {
            config: StoredValue::new(config),
            store_error: RwSignal::new(None),
            pending_writes: RwSignal::new(0),
        }
    }

    pub fn record_pending(&self, pending: usize, error: Option<String>) {
        self.pending_writes.set(pending);
        match error {
            Some(e) => self.store_error.set(Some(e)),
            None if pending == 0 => self.store_error.set(None),
            None => {}
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AppContext(pub AppState);

/// Run `tick` every `interval_ms` on the window timer. Returns the interval handle.
pub(crate) fn start_interval(interval_ms: i32, tick: impl FnMut() + 'static) -> Option<i32> {
    let win = web_sys::window()?;
    let cb = wasm_bindgen::closure::Closure::wrap(Box::new(tick) as Box<dyn FnMut()>);

    let tid = win
        .set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            interval_ms,
        )
        .ok()?;

    // The closure must outlive the timer; `clear_interval` is the only way to stop it.
    cb.forget();
    Some(tid)
}

pub(crate) fn stop_interval(tid: i32) {
    if let Some(win) = web_sys::window() {
        win.clear_interval_with_handle(tid);
    }
}
