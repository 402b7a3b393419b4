use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Alert, div, "relative flex w-full items-start gap-2 rounded-lg border border-destructive/50 bg-destructive/5 px-4 py-3 text-sm text-destructive"}
    clx! {AlertDescription, p, "text-sm leading-relaxed"}
}

pub use components::*;

/// Banner text for the last store failure, or `None` once it is cleared.
pub fn sync_alert_message(error: Option<&str>, pending: usize) -> Option<String> {
    let error = error?;
    Some(match pending {
        0 => error.to_string(),
        1 => format!("{error} (1 unsaved change, retrying)"),
        n => format!("{error} ({n} unsaved changes, retrying)"),
    })
}

/// Store failure banner. Shown while `error` is set.
#[component]
pub fn SyncAlert(
    error: RwSignal<Option<String>>,
    pending: RwSignal<usize>,
    #[prop(into, optional)] class: String,
) -> impl IntoView {
    let message = move || error.with(|e| sync_alert_message(e.as_deref(), pending.get()));

    view! {
        <Show when=move || error.with(Option::is_some)>
            <Alert class=class.clone() attr:role="alert">
                <AlertDescription>{move || message().unwrap_or_default()}</AlertDescription>
            </Alert>
        </Show>
    }
}
