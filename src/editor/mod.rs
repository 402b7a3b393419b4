use crate::components::ui::{Checkbox, Spinner, SyncAlert};
use crate::cursor::{clamp_caret, CaretPosition, CaretSource};
use crate::models::NodeId;
use crate::outline::{
    Command, CommandError, CommandOutcome, KeyChord, LogicalKey, Modifiers, OutlineChange,
    OutlineNode, Outliner,
};
use crate::state::{outline_root, start_interval, stop_interval, AppContext, AppState};
use crate::store::AppStore;
use leptos::logging::{error, log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

type Engine = Rc<Outliner<AppStore>>;

pub(crate) fn input_dom_id(id: &NodeId) -> String {
    format!("node-input-{id}")
}

/// What one row renders. Refreshed from the tree whenever a change names the node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RowView {
    pub text: String,
    pub checked: bool,
    pub expanded: bool,
    pub has_subtasks: bool,
    pub frozen: bool,
    pub children: Vec<NodeId>,
}

impl RowView {
    fn from_node(node: &OutlineNode) -> Self {
        Self {
            text: node.record().text.clone(),
            checked: node.record().checked,
            expanded: node.expanded(),
            has_subtasks: node.has_subtasks(),
            frozen: node.is_frozen(),
            children: node.children().to_vec(),
        }
    }
}

/// Caret of the focused row input.
struct DomCaret;

impl CaretSource for DomCaret {
    fn anchor_offset(&self, id: &NodeId) -> Option<u32> {
        let el = web_sys::window()?.document()?.active_element()?;
        if el.get_attribute("data-node-id").as_deref() != Some(id.as_str()) {
            return None;
        }
        let input = el.dyn_into::<web_sys::HtmlInputElement>().ok()?;
        input.selection_start().ok().flatten()
    }
}

/// Focus the row input on the next tick, once the row is mounted.
fn focus_row_input(pos: CaretPosition) {
    let Some(win) = web_sys::window() else {
        return;
    };
    let cb = Closure::once_into_js(move || {
        let Some(el) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&input_dom_id(&pos.id)))
        else {
            warn!("outline: no input to focus for {}", pos.id);
            return;
        };
        let Ok(input) = el.dyn_into::<web_sys::HtmlInputElement>() else {
            return;
        };
        let _ = input.focus();
        // selectionStart/End are in UTF-16 code units.
        let at = clamp_caret(&input.value(), pos.offset);
        let _ = input.set_selection_range(at, at);
    });
    let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), 0);
}

/// Presentation adapter: owns the engine and mirrors its tree into per-row signals.
#[derive(Clone, Copy)]
struct OutlineView {
    app: AppState,
    engine: StoredValue<Option<Engine>, LocalStorage>,
    rows: StoredValue<HashMap<NodeId, RwSignal<RowView>>>,
    /// Uncommitted input text; survives a row being re-mounted by a move.
    drafts: StoredValue<HashMap<NodeId, String>>,
    focus: RwSignal<Option<CaretPosition>>,
}

impl OutlineView {
    fn new(app: AppState) -> Self {
        Self {
            app,
            engine: StoredValue::new_local(None),
            rows: StoredValue::new(HashMap::new()),
            drafts: StoredValue::new(HashMap::new()),
            focus: RwSignal::new(None),
        }
    }

    fn install(self, engine: Engine) {
        let views = engine.with_tree(|t| {
            t.subtree_ids(t.root())
                .into_iter()
                .filter_map(|id| t.node(&id).map(|n| (id, RowView::from_node(n))))
                .collect::<Vec<_>>()
        });
        engine.take_changes();

        self.rows.update_value(|rows| {
            rows.clear();
            for (id, view) in views {
                rows.insert(id, RwSignal::new(view));
            }
        });
        self.engine.set_value(Some(engine));
    }

    fn row(&self, id: &NodeId) -> Option<RwSignal<RowView>> {
        self.rows.with_value(|rows| rows.get(id).copied())
    }

    fn draft(&self, id: &NodeId) -> Option<String> {
        self.drafts.with_value(|d| d.get(id).cloned())
    }

    fn set_draft(&self, id: NodeId, text: String) {
        self.drafts.update_value(|d| {
            d.insert(id, text);
        });
    }

    fn refresh(&self, engine: &Engine, id: &NodeId) {
        let Some(view) = engine.with_tree(|t| t.node(id).map(RowView::from_node)) else {
            return;
        };
        match self.row(id) {
            Some(sig) => {
                if sig.with_untracked(|v| *v != view) {
                    sig.set(view);
                }
            }
            None => self.rows.update_value(|rows| {
                rows.insert(id.clone(), RwSignal::new(view));
            }),
        }
    }

    fn apply_changes(&self, engine: &Engine) {
        for change in engine.take_changes() {
            match change {
                // Child row first, so the parent's list finds it when it re-renders.
                OutlineChange::Inserted { id, parent } => {
                    self.refresh(engine, &id);
                    self.refresh(engine, &parent);
                }
                OutlineChange::Removed { id } => {
                    self.rows.update_value(|rows| {
                        rows.remove(&id);
                    });
                    self.drafts.update_value(|d| {
                        d.remove(&id);
                    });
                }
                OutlineChange::ChildrenChanged { id }
                | OutlineChange::TextChanged { id }
                | OutlineChange::CheckedChanged { id }
                | OutlineChange::FlagsChanged { id }
                | OutlineChange::Frozen { id } => self.refresh(engine, &id),
                OutlineChange::Focus(pos) => self.focus.set(Some(pos)),
            }
        }
    }

    fn settle(&self, engine: &Engine, result: Result<CommandOutcome, CommandError>) {
        self.apply_changes(engine);
        let error = match result {
            Ok(_) => None,
            Err(e) => {
                warn!("outline: {e}");
                Some(e.to_string())
            }
        };
        self.app.record_pending(engine.pending_len(), error);
    }

    /// Save the row's typed text into its record, then run `command` on the row.
    ///
    /// Moves restore the caret against the saved text, and status writes carry it.
    async fn execute(
        self,
        engine: &Engine,
        id: &NodeId,
        command: Command,
        caret: &impl CaretSource,
    ) -> Result<CommandOutcome, CommandError> {
        let mut saved = Ok(());
        let carries_text = !matches!(command, Command::CommitText(_) | Command::Delete);
        // An empty draft would delete the row; it is left for the blur commit.
        if let Some(text) = self.draft(id).filter(|t| carries_text && !t.is_empty()) {
            self.drafts.update_value(|d| {
                d.remove(id);
            });
            saved = engine.commit_text(id, &text).await.map(|_| ());
        }
        let result = engine.dispatch(id, command, caret).await;
        saved.and(result)
    }

    fn run(self, id: NodeId, command: Command) {
        let Some(engine) = self.engine.get_value() else {
            return;
        };
        let early = engine.clone();
        spawn_local(async move {
            let result = self.execute(&engine, &id, command, &DomCaret).await;
            self.settle(&engine, result);
        });
        // Queued behind the command: renders its tree mutation while the writes are in flight.
        spawn_local(async move {
            self.apply_changes(&early);
        });
    }

    fn commit(self, id: NodeId, text: String) {
        self.drafts.update_value(|d| {
            d.remove(&id);
        });
        self.run(id, Command::CommitText(text));
    }

    fn add_first(self, root: NodeId) {
        let Some(engine) = self.engine.get_value() else {
            return;
        };
        spawn_local(async move {
            let result = engine.append_child(&root).await;
            self.settle(&engine, result);
        });
    }

    fn toggle_expanded(&self, id: &NodeId) {
        let Some(engine) = self.engine.get_value() else {
            return;
        };
        if engine.toggle_expanded(id) {
            self.apply_changes(&engine);
        }
    }

    /// One repair tick. Skipped while a previous pass is still running.
    fn repair(self, busy: Rc<Cell<bool>>) {
        let Some(engine) = self.engine.get_value() else {
            return;
        };
        if busy.get() || engine.pending_len() == 0 {
            return;
        }
        busy.set(true);
        spawn_local(async move {
            let report = engine.flush_pending().await;
            self.apply_changes(&engine);
            self.app.record_pending(report.remaining, None);
            busy.set(false);
        });
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

#[component]
pub fn OutlineEditor() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let config = app.config.get_value();
    let root = outline_root(&config);

    let outline = OutlineView::new(app);
    provide_context(outline);

    let load_state = RwSignal::new(LoadState::Loading);
    let repair_timer: StoredValue<Option<i32>> = StoredValue::new(None);

    Effect::new(move |_| {
        if let Some(pos) = outline.focus.get() {
            focus_row_input(pos);
        }
    });

    let root_for_load = root.clone();
    spawn_local(async move {
        let store = AppStore::from_config(&config);
        match Outliner::load(store, root_for_load.clone()).await {
            Ok(engine) => {
                let engine = Rc::new(engine);
                log!(
                    "outline: loaded {} node(s) under {root_for_load}",
                    engine.with_tree(|t| t.len())
                );
                outline.install(engine);

                let busy = Rc::new(Cell::new(false));
                let tid = start_interval(config.retry_ms, move || outline.repair(busy.clone()));
                repair_timer.set_value(tid);
                load_state.set(LoadState::Ready);
            }
            Err(e) => {
                error!("outline: loading {root_for_load} failed: {e}");
                load_state.set(LoadState::Failed(e.to_string()));
            }
        }
    });

    on_cleanup(move || {
        if let Some(tid) = repair_timer.get_value() {
            stop_interval(tid);
        }
    });

    let store_error = app.store_error;
    let pending = app.pending_writes;

    view! {
        <div class="mx-auto w-full max-w-3xl px-4 py-6">
            <SyncAlert error=store_error pending=pending class="mb-3" />

            {move || match load_state.get() {
                LoadState::Loading => view! {
                    <div class="flex items-center gap-2 text-xs text-muted-foreground">
                        <Spinner />
                        "Loading outline"
                    </div>
                }
                .into_any(),
                LoadState::Failed(e) => {
                    view! { <div class="text-xs text-destructive">{e}</div> }.into_any()
                }
                LoadState::Ready => view! { <OutlineRoot root=root.clone() /> }.into_any(),
            }}
        </div>
    }
}

#[component]
fn OutlineRoot(root: NodeId) -> impl IntoView {
    let outline = expect_context::<OutlineView>();
    let Some(row) = outline.row(&root) else {
        return view! { <div class="text-xs text-muted-foreground">"Outline root is missing"</div> }
            .into_any();
    };
    let root_sv = StoredValue::new(root);

    view! {
        <div class="outline-editor space-y-0.5">
            <For
                each=move || row.with(|v| v.children.clone())
                key=|id| id.clone()
                children=move |id| view! { <OutlineRow id=id depth=0 /> }
            />
            <Show when=move || row.with(|v| v.children.is_empty())>
                <button
                    type="button"
                    class="text-xs text-muted-foreground hover:text-foreground"
                    on:click=move |_| outline.add_first(root_sv.get_value())
                >
                    "+ Add the first item"
                </button>
            </Show>
        </div>
    }
    .into_any()
}

#[component]
fn OutlineRow(id: NodeId, depth: usize) -> impl IntoView {
    let outline = expect_context::<OutlineView>();
    let Some(row) = outline.row(&id) else {
        return ().into_any();
    };
    let id_sv = StoredValue::new(id.clone());
    let indent_px = depth * 20;

    let on_check = Callback::new(move |checked: bool| {
        outline.run(id_sv.get_value(), Command::SetChecked(checked));
    });

    let bullet = move || {
        row.with(|v| match (v.has_subtasks, v.expanded) {
            (false, _) => "•",
            (true, true) => "▾",
            (true, false) => "▸",
        })
    };

    view! {
        <div>
            <div
                class="outline-row flex items-center gap-2 py-1"
                style=format!("padding-left: {indent_px}px")
            >
                <button
                    type="button"
                    tabindex="-1"
                    class="h-5 w-5 text-base leading-none text-muted-foreground hover:text-foreground/80"
                    on:click=move |_| outline.toggle_expanded(&id_sv.get_value())
                >
                    {bullet}
                </button>
                <Checkbox checked=Signal::derive(move || row.with(|v| v.checked)) on_change=on_check />
                <input
                    id=input_dom_id(&id)
                    // Blur can run after the row is gone; the handler reads the id from here.
                    attr:data-node-id=id.to_string()
                    class=move || {
                        if row.with(|v| v.checked) {
                            "h-7 w-full min-w-0 flex-1 bg-transparent px-1 text-sm text-muted-foreground line-through outline-none"
                        } else {
                            "h-7 w-full min-w-0 flex-1 bg-transparent px-1 text-sm outline-none"
                        }
                    }
                    prop:value=move || {
                        let text = row.with(|v| v.text.clone());
                        outline.draft(&id_sv.get_value()).unwrap_or(text)
                    }
                    readonly=move || row.with(|v| v.frozen)
                    on:input=move |ev: web_sys::Event| {
                        outline.set_draft(id_sv.get_value(), event_target_value(&ev));
                    }
                    on:blur=move |ev: web_sys::FocusEvent| {
                        let Some(input) = ev
                            .target()
                            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                        else {
                            return;
                        };
                        let Some(node_id) = input
                            .get_attribute("data-node-id")
                            .filter(|s| !s.trim().is_empty())
                        else {
                            return;
                        };
                        outline.commit(NodeId::new(node_id), input.value());
                    }
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        let mods = Modifiers {
                            shift: ev.shift_key(),
                            ctrl: ev.ctrl_key() || ev.meta_key(),
                        };
                        let chord = KeyChord::new(LogicalKey::from_dom_key(&ev.key()), mods);
                        let Some(command) = Command::from_chord(chord) else {
                            return;
                        };
                        ev.prevent_default();
                        outline.run(id_sv.get_value(), command);
                    }
                />
            </div>
            <Show when=move || row.with(|v| v.expanded && !v.children.is_empty())>
                <For
                    each=move || row.with(|v| v.children.clone())
                    key=|id| id.clone()
                    children=move |kid| view! { <OutlineRow id=kid depth=depth + 1 /> }
                />
            </Show>
        </div>
    }
    .into_any()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::components::ui::sync_alert_message;
    use crate::cursor::{CaretAt, NoCaret};
    use crate::models::NodeRecord;
    use crate::outline::OutlineTree;
    use crate::store::MemoryStore;
    use futures::executor::block_on;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn rec(s: &str, kids: &[&str]) -> NodeRecord {
        let mut r = NodeRecord::new(id(s), s.to_uppercase());
        r.children = kids.iter().map(|k| id(k)).collect();
        r
    }

    fn mounted(records: Vec<NodeRecord>) -> (OutlineView, Engine) {
        let store = MemoryStore::new();
        store.seed(records.clone());
        let tree = OutlineTree::from_records(id("root"), records);
        let engine = Rc::new(Outliner::new(tree, AppStore::Memory(store)));

        let view = OutlineView::new(AppState::with_config(EnvConfig::from_lookup(|_| None)));
        view.install(engine.clone());
        (view, engine)
    }

    fn children_of(view: &OutlineView, s: &str) -> Option<Vec<NodeId>> {
        view.row(&id(s)).map(|r| r.get_untracked().children)
    }

    #[test]
    fn test_install_creates_a_row_per_node() {
        let (view, _) = mounted(vec![rec("root", &["a"]), rec("a", &["a1"]), rec("a1", &[])]);
        assert_eq!(children_of(&view, "root"), Some(vec![id("a")]));
        let a = view.row(&id("a")).expect("row a").get_untracked();
        assert!(a.expanded && a.has_subtasks);
        assert_eq!(a.text, "A");
        assert!(view.row(&id("a1")).is_some());
    }

    #[test]
    fn test_indent_is_mirrored_into_rows() {
        let (view, engine) = mounted(vec![rec("root", &["a", "b"]), rec("a", &[]), rec("b", &[])]);

        block_on(engine.indent(&id("b"), &NoCaret)).expect("indent");
        view.apply_changes(&engine);

        assert_eq!(children_of(&view, "root"), Some(vec![id("a")]));
        assert_eq!(children_of(&view, "a"), Some(vec![id("b")]));
        assert_eq!(view.focus.get_untracked().map(|p| p.id), Some(id("b")));
    }

    #[test]
    fn test_add_sibling_creates_row_before_parent_lists_it() {
        let (view, engine) = mounted(vec![rec("root", &["a"]), rec("a", &[])]);

        let out = block_on(engine.add_sibling(&id("a"))).expect("add");
        let new_id = out.focus.expect("focus").id;
        view.apply_changes(&engine);

        assert!(view.row(&new_id).is_some());
        assert_eq!(children_of(&view, "root"), Some(vec![id("a"), new_id]));
    }

    #[test]
    fn test_delete_drops_rows_and_drafts() {
        let (view, engine) = mounted(vec![
            rec("root", &["a", "b"]),
            rec("a", &["a1"]),
            rec("a1", &[]),
            rec("b", &[]),
        ]);
        view.set_draft(id("a1"), "half typed".to_string());

        block_on(engine.delete(&id("a"))).expect("delete");
        view.apply_changes(&engine);

        assert!(view.row(&id("a")).is_none());
        assert!(view.row(&id("a1")).is_none());
        assert!(view.draft(&id("a1")).is_none());
        assert_eq!(children_of(&view, "root"), Some(vec![id("b")]));
    }

    #[test]
    fn test_toggle_expanded_only_touches_the_row() {
        let (view, engine) = mounted(vec![rec("root", &["a"]), rec("a", &["a1"]), rec("a1", &[])]);

        view.toggle_expanded(&id("a"));
        assert!(!view.row(&id("a")).expect("row a").get_untracked().expanded);
        let AppStore::Memory(store) = engine.store() else {
            panic!("expected the memory store");
        };
        assert!(store.ops().is_empty());
    }

    #[test]
    fn test_indent_saves_typed_text_and_keeps_caret() {
        let (view, engine) = mounted(vec![rec("root", &["a", "b"]), rec("a", &[]), rec("b", &[])]);
        view.set_draft(id("b"), "Bxyz".to_string());

        let out = block_on(view.execute(&engine, &id("b"), Command::Indent, &CaretAt::new("b", 4)))
            .expect("indent");
        view.apply_changes(&engine);

        assert_eq!(out.focus.map(|p| p.offset), Some(4));
        assert!(view.draft(&id("b")).is_none());
        assert_eq!(view.row(&id("b")).expect("row b").get_untracked().text, "Bxyz");
        assert_eq!(children_of(&view, "a"), Some(vec![id("b")]));
        let AppStore::Memory(store) = engine.store() else {
            panic!("expected the memory store");
        };
        assert_eq!(store.record(&id("b")).map(|r| r.text), Some("Bxyz".to_string()));
    }

    #[test]
    fn test_toggle_status_writes_typed_text() {
        let (view, engine) = mounted(vec![rec("root", &["a"]), rec("a", &[])]);
        view.set_draft(id("a"), "Avocados".to_string());

        block_on(view.execute(&engine, &id("a"), Command::ToggleStatus, &NoCaret)).expect("toggle");

        let AppStore::Memory(store) = engine.store() else {
            panic!("expected the memory store");
        };
        let saved = store.record(&id("a")).expect("record a");
        assert!(saved.checked);
        assert_eq!(saved.text, "Avocados");
    }

    #[test]
    fn test_empty_draft_is_not_committed_before_a_move() {
        let (view, engine) = mounted(vec![rec("root", &["a", "b"]), rec("a", &[]), rec("b", &[])]);
        view.set_draft(id("b"), String::new());

        block_on(view.execute(&engine, &id("b"), Command::Indent, &NoCaret)).expect("indent");

        engine.with_tree(|t| assert_eq!(t.children(&id("a")), &[id("b")]));
        assert_eq!(view.draft(&id("b")).as_deref(), Some(""));
    }

    #[test]
    fn test_rejected_write_raises_banner_until_repaired() {
        let (view, engine) = mounted(vec![rec("root", &["a"]), rec("a", &[])]);
        let AppStore::Memory(store) = engine.store() else {
            panic!("expected the memory store");
        };
        store.reject_writes_for(&id("a"));

        let commit = Command::CommitText("Apples".to_string());
        let result = block_on(view.execute(&engine, &id("a"), commit, &NoCaret));
        assert!(result.is_err());
        view.settle(&engine, result);

        let banner = || {
            let error = view.app.store_error.get_untracked();
            sync_alert_message(error.as_deref(), view.app.pending_writes.get_untracked())
        };
        assert_eq!(
            banner().as_deref(),
            Some("could not save 1 node(s): write rejected for node a (1 unsaved change, retrying)")
        );

        store.accept_writes_for(&id("a"));
        let report = block_on(engine.flush_pending());
        view.app.record_pending(report.remaining, None);
        assert_eq!(banner(), None);
        assert_eq!(store.record(&id("a")).map(|r| r.text), Some("Apples".to_string()));
    }

    #[test]
    fn test_input_dom_id() {
        assert_eq!(input_dom_id(&id("mem-3")), "node-input-mem-3");
    }
}
