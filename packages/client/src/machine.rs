//! # Edit State Machine
//!
//! Selection, hover and text-edit state for one editor session, plus the
//! optimistic bookkeeping for requests in flight.
//!
//! The machine never touches a DOM. The host describes elements as
//! [`ElementSnapshot`]s, feeds [`Event`]s in, and carries out the returned
//! [`Effect`]s.
//!
//! ```text
//!            click              dblclick (editable tag)
//!   Idle ───────────► Selected ─────────────────────────► Editing
//!    ▲                 ▲   ▲  Enter / deferred focus-out     │
//!    │  click outside  │   └─────────────────────────────────┤
//!    └─────────────────┴──────────── Escape (restore) ◄──────┘
//! ```

use loupe_source::SourceLocator;
use loupe_transform::{
    ClientMessage, ServerMessage, TextUpdateChange, TransformError, TransformRequest,
    TransformResult, TransformType, UndoData,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::transport::Connection;

/// Tags whose text can be edited in place
pub const TEXT_EDITABLE_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "a", "button", "label", "li", "td", "th",
    "strong", "em", "b", "i", "small", "blockquote", "figcaption", "dt", "dd", "caption",
    "legend", "summary", "div",
];

pub const DEFAULT_COMMIT_GRACE_MS: u64 = 1500;

pub fn is_text_editable(tag: &str) -> bool {
    TEXT_EDITABLE_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Host-side description of a rendered element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// Stable identity assigned by the host
    pub id: String,
    pub tag: String,
    /// `data-source` attribute, if instrumented
    #[serde(default)]
    pub locator: Option<String>,
    /// `data-style` attribute, if instrumented
    #[serde(default)]
    pub style_locator: Option<String>,
    /// Current text content
    #[serde(default)]
    pub text: String,
}

impl ElementSnapshot {
    pub fn is_locatable(&self) -> bool {
        self.locator.as_deref().map(|l| !l.trim().is_empty()).unwrap_or(false)
    }

    pub fn source_locator(&self) -> Option<SourceLocator> {
        let locator = self.locator.as_deref()?;
        match SourceLocator::from_strings(locator, self.style_locator.as_deref()) {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!(element = %self.id, "Ignoring malformed locator: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditState {
    Idle,
    Selected {
        element: ElementSnapshot,
    },
    Editing {
        element: ElementSnapshot,
        locator: SourceLocator,
        original_text: String,
        current_text: String,
        /// Distinguishes deferred commits of different sessions
        generation: u64,
    },
}

/// Input to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `None` when the click hit nothing locatable
    Click(Option<ElementSnapshot>),
    DoubleClick(ElementSnapshot),
    PointerMove(Option<ElementSnapshot>),
    KeyDown { key: String, shift: bool },
    /// Current text of the element being edited
    TextInput { text: String },
    /// Focus left the editing element; `related` is the id of the new focus target
    FocusOut { related: Option<String> },
    DeferredCommit { generation: u64 },
    ServerMessage(ServerMessage),
    Tick { now_ms: i64 },
}

/// Output for the host to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetEditable { element_id: String, editable: bool },
    /// Place a cursor selection over the element's text
    SelectContents { element_id: String },
    RestoreText { element_id: String, text: String },
    Send(ClientMessage),
    /// Deliver `Event::DeferredCommit` with this generation on the next tick
    ScheduleDeferredCommit { generation: u64 },
    Notify(Notification),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    SelectionChanged { element_id: Option<String> },
    HoverChanged { element_id: Option<String> },
    EditStarted { element_id: String },
    EditEnded { element_id: String, committed: bool },
    EditCommitted { request_id: String },
    EditFailed { request_id: String, message: String },
    ConnectionChanged { connection: Connection },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Committed,
    Failed,
}

/// A dispatched request awaiting, or recently given, its result
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub id: String,
    pub transform_type: String,
    pub target: SourceLocator,
    /// Dispatch time, unix millis
    pub timestamp: i64,
    pub status: PendingStatus,
    pub error: Option<String>,
    /// When the result arrived, unix millis
    pub resolved_at: Option<i64>,
    /// Dispatched by `undo`; its own undo data is not recorded
    pub is_undo: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub request_id: String,
    pub undo_data: UndoData,
}

#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub session_id: String,
    pub commit_grace_ms: u64,
}

impl MachineConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            commit_grace_ms: DEFAULT_COMMIT_GRACE_MS,
        }
    }
}

pub struct EditMachine {
    config: MachineConfig,
    state: EditState,
    hovered: Option<ElementSnapshot>,
    /// In dispatch order
    pending: Vec<PendingEdit>,
    undo_history: Vec<UndoEntry>,
    sequence: u64,
    generation: u64,
}

impl EditMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            state: EditState::Idle,
            hovered: None,
            pending: Vec::new(),
            undo_history: Vec::new(),
            sequence: 0,
            generation: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn selected(&self) -> Option<&ElementSnapshot> {
        match &self.state {
            EditState::Idle => None,
            EditState::Selected { element } | EditState::Editing { element, .. } => Some(element),
        }
    }

    pub fn hovered(&self) -> Option<&ElementSnapshot> {
        self.hovered.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing { .. })
    }

    pub fn pending(&self) -> &[PendingEdit] {
        &self.pending
    }

    pub fn pending_edit(&self, id: &str) -> Option<&PendingEdit> {
        self.pending.iter().find(|edit| edit.id == id)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_history.len()
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            Event::Click(target) => self.on_click(target, &mut effects),
            Event::DoubleClick(element) => self.on_double_click(element, &mut effects),
            Event::PointerMove(target) => self.on_pointer_move(target, &mut effects),
            Event::KeyDown { key, shift } => match key.as_str() {
                "Enter" if !shift && self.is_editing() => self.commit(&mut effects),
                "Escape" if self.is_editing() => self.cancel(&mut effects),
                _ => {}
            },
            Event::TextInput { text } => {
                if let EditState::Editing { current_text, .. } = &mut self.state {
                    *current_text = text;
                }
            }
            Event::FocusOut { related } => {
                if let EditState::Editing {
                    element, generation, ..
                } = &self.state
                {
                    if related.as_deref() != Some(element.id.as_str()) {
                        effects.push(Effect::ScheduleDeferredCommit {
                            generation: *generation,
                        });
                    }
                }
            }
            Event::DeferredCommit { generation } => {
                let current = match &self.state {
                    EditState::Editing { generation, .. } => Some(*generation),
                    _ => None,
                };
                if current == Some(generation) {
                    self.commit(&mut effects);
                }
            }
            Event::ServerMessage(message) => self.on_server_message(message, &mut effects),
            Event::Tick { now_ms } => self.prune(now_ms),
        }
        effects
    }

    fn on_click(&mut self, target: Option<ElementSnapshot>, effects: &mut Vec<Effect>) {
        let target = target.filter(ElementSnapshot::is_locatable);

        match target {
            None => {
                self.end_editing(effects);
                if !matches!(self.state, EditState::Idle) {
                    self.state = EditState::Idle;
                    effects.push(Effect::Notify(Notification::SelectionChanged { element_id: None }));
                }
            }
            Some(element) => {
                if let EditState::Editing { element: editing, .. } = &self.state {
                    if editing.id == element.id {
                        // Clicks inside the editing element only move the caret
                        return;
                    }
                }
                self.end_editing(effects);
                self.select(element, effects);
            }
        }
    }

    fn on_double_click(&mut self, element: ElementSnapshot, effects: &mut Vec<Effect>) {
        if !element.is_locatable() {
            return;
        }
        if let EditState::Editing { element: editing, .. } = &self.state {
            if editing.id == element.id {
                return;
            }
        }
        self.end_editing(effects);
        self.select(element.clone(), effects);

        if !is_text_editable(&element.tag) {
            return;
        }
        let Some(locator) = element.source_locator() else {
            return;
        };

        self.generation += 1;
        effects.push(Effect::SetEditable {
            element_id: element.id.clone(),
            editable: true,
        });
        effects.push(Effect::SelectContents {
            element_id: element.id.clone(),
        });
        effects.push(Effect::Notify(Notification::EditStarted {
            element_id: element.id.clone(),
        }));
        self.clear_hover(effects);

        self.state = EditState::Editing {
            original_text: element.text.clone(),
            current_text: element.text.clone(),
            element,
            locator,
            generation: self.generation,
        };
    }

    fn on_pointer_move(&mut self, target: Option<ElementSnapshot>, effects: &mut Vec<Effect>) {
        if self.is_editing() {
            return;
        }
        let target = target
            .filter(ElementSnapshot::is_locatable)
            .filter(|element| self.selected().map(|s| s.id != element.id).unwrap_or(true));

        let changed = self.hovered.as_ref().map(|h| &h.id) != target.as_ref().map(|t| &t.id);
        if changed {
            effects.push(Effect::Notify(Notification::HoverChanged {
                element_id: target.as_ref().map(|t| t.id.clone()),
            }));
        }
        self.hovered = target;
    }

    fn select(&mut self, element: ElementSnapshot, effects: &mut Vec<Effect>) {
        let already = self.selected().map(|s| s.id == element.id).unwrap_or(false);
        if self.hovered.as_ref().map(|h| h.id == element.id).unwrap_or(false) {
            self.clear_hover(effects);
        }
        if !already {
            effects.push(Effect::Notify(Notification::SelectionChanged {
                element_id: Some(element.id.clone()),
            }));
        }
        self.state = EditState::Selected { element };
    }

    fn clear_hover(&mut self, effects: &mut Vec<Effect>) {
        if self.hovered.take().is_some() {
            effects.push(Effect::Notify(Notification::HoverChanged { element_id: None }));
        }
    }

    /// Leave `Editing` without dispatching, restoring the original text
    fn end_editing(&mut self, effects: &mut Vec<Effect>) {
        if !self.is_editing() {
            return;
        }
        let EditState::Editing {
            element,
            original_text,
            ..
        } = std::mem::replace(&mut self.state, EditState::Idle)
        else {
            return;
        };

        effects.push(Effect::RestoreText {
            element_id: element.id.clone(),
            text: original_text.clone(),
        });
        effects.push(Effect::SetEditable {
            element_id: element.id.clone(),
            editable: false,
        });
        effects.push(Effect::Notify(Notification::EditEnded {
            element_id: element.id.clone(),
            committed: false,
        }));

        let mut element = element;
        element.text = original_text;
        self.state = EditState::Selected { element };
    }

    fn cancel(&mut self, effects: &mut Vec<Effect>) {
        self.end_editing(effects);
    }

    fn commit(&mut self, effects: &mut Vec<Effect>) {
        if !self.is_editing() {
            return;
        }
        let EditState::Editing {
            mut element,
            locator,
            original_text,
            current_text,
            ..
        } = std::mem::replace(&mut self.state, EditState::Idle)
        else {
            return;
        };

        effects.push(Effect::SetEditable {
            element_id: element.id.clone(),
            editable: false,
        });

        let changed = current_text.trim() != original_text.trim();
        effects.push(Effect::Notify(Notification::EditEnded {
            element_id: element.id.clone(),
            committed: changed,
        }));

        if changed {
            let change = TextUpdateChange {
                original_text: original_text.trim().to_string(),
                new_text: current_text.trim().to_string(),
            };
            match self.dispatch(TransformType::TextUpdate, locator, &change) {
                Ok((_, sent)) => effects.extend(sent),
                Err(e) => warn!(element = %element.id, "Failed to dispatch text update: {}", e),
            }
            element.text = current_text;
        }

        self.state = EditState::Selected { element };
    }

    /// Send a transform request and start tracking it
    pub fn dispatch<C: Serialize>(
        &mut self,
        transform_type: TransformType,
        target: SourceLocator,
        change: &C,
    ) -> Result<(String, Vec<Effect>), ClientError> {
        let change = serde_json::to_value(change)?;
        self.dispatch_raw(transform_type.as_str(), target, change, false)
    }

    fn dispatch_raw(
        &mut self,
        transform_type: &str,
        target: SourceLocator,
        change: Value,
        is_undo: bool,
    ) -> Result<(String, Vec<Effect>), ClientError> {
        let id = self.next_request_id();
        let request = TransformRequest::new(id.clone(), transform_type, target, change);
        let message = ClientMessage::transform(&request)?;

        debug!(id = %id, transform_type, "Dispatching transform");
        self.pending.push(PendingEdit {
            id: id.clone(),
            transform_type: transform_type.to_string(),
            target: request.target,
            timestamp: now_ms(),
            status: PendingStatus::Pending,
            error: None,
            resolved_at: None,
            is_undo,
        });

        Ok((id, vec![Effect::Send(message)]))
    }

    /// Revert the newest committed edit by dispatching its revert change
    pub fn undo(&mut self) -> Result<Option<(String, Vec<Effect>)>, ClientError> {
        let Some(entry) = self.undo_history.pop() else {
            return Ok(None);
        };
        debug!(reverting = %entry.request_id, "Undoing transform");
        let UndoData {
            transform_type,
            target,
            revert_change,
        } = entry.undo_data;
        self.dispatch_raw(&transform_type, target, revert_change, true)
            .map(Some)
    }

    /// Resolve a request that never reached the server as failed
    pub fn fail_pending(&mut self, id: &str, message: impl Into<String>) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.resolve(TransformResult::failure(id, TransformError::internal(message)), &mut effects);
        effects
    }

    /// Forget a failed edit, returns whether one was removed
    pub fn dismiss_failure(&mut self, id: &str) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|edit| !(edit.id == id && edit.status == PendingStatus::Failed));
        self.pending.len() != before
    }

    /// Return to `Idle`, dropping editability and hover
    pub fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let EditState::Editing { element, .. } = &self.state {
            effects.push(Effect::SetEditable {
                element_id: element.id.clone(),
                editable: false,
            });
        }
        self.state = EditState::Idle;
        self.hovered = None;
        effects
    }

    fn on_server_message(&mut self, message: ServerMessage, effects: &mut Vec<Effect>) {
        match message {
            ServerMessage::TransformResult(result) => self.resolve(result, effects),
            ServerMessage::Connected => debug!("Server acknowledged connection"),
            ServerMessage::Pong { request_id } => debug!(request_id = %request_id, "Pong"),
            ServerMessage::Unknown => warn!("Ignoring unknown server message"),
        }
    }

    fn resolve(&mut self, result: TransformResult, effects: &mut Vec<Effect>) {
        let Some(edit) = self.pending.iter_mut().find(|edit| edit.id == result.request_id) else {
            debug!(request_id = %result.request_id, "Result for unknown request");
            return;
        };
        if edit.status != PendingStatus::Pending {
            debug!(request_id = %result.request_id, "Duplicate result");
            return;
        }

        edit.resolved_at = Some(now_ms());
        if result.success {
            edit.status = PendingStatus::Committed;
            if let (Some(undo_data), false) = (result.undo_data, edit.is_undo) {
                self.undo_history.push(UndoEntry {
                    request_id: result.request_id.clone(),
                    undo_data,
                });
            }
            effects.push(Effect::Notify(Notification::EditCommitted {
                request_id: result.request_id,
            }));
        } else {
            let message = result
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "Transform failed".to_string());
            edit.status = PendingStatus::Failed;
            edit.error = Some(message.clone());
            effects.push(Effect::Notify(Notification::EditFailed {
                request_id: result.request_id,
                message,
            }));
        }
    }

    /// Drop committed edits whose grace period has passed
    fn prune(&mut self, now: i64) {
        let grace = self.config.commit_grace_ms as i64;
        self.pending.retain(|edit| match (edit.status, edit.resolved_at) {
            (PendingStatus::Committed, Some(at)) => now - at < grace,
            _ => true,
        });
    }

    fn next_request_id(&mut self) -> String {
        self.sequence += 1;
        format!("{}-{}", self.config.session_id, self.sequence)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_transform::ErrorCode;

    fn element(id: &str, tag: &str, text: &str) -> ElementSnapshot {
        ElementSnapshot {
            id: id.to_string(),
            tag: tag.to_string(),
            locator: Some(format!("src/App.tsx:{}:5", id.len() + 2)),
            style_locator: Some("src/App.css:.app".to_string()),
            text: text.to_string(),
        }
    }

    fn machine() -> EditMachine {
        EditMachine::new(MachineConfig::new("sess"))
    }

    fn key(key: &str) -> Event {
        Event::KeyDown {
            key: key.to_string(),
            shift: false,
        }
    }

    fn sent(effects: &[Effect]) -> Vec<&ClientMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn start_editing(m: &mut EditMachine, el: &ElementSnapshot) -> Vec<Effect> {
        m.handle(Event::Click(Some(el.clone())));
        m.handle(Event::DoubleClick(el.clone()))
    }

    fn result(id: &str, success: bool) -> Event {
        let result = if success {
            TransformResult::success(id, vec!["src/App.tsx".into()], None)
        } else {
            TransformResult::failure(id, TransformError::new(ErrorCode::ContentMismatch, "stale"))
        };
        Event::ServerMessage(ServerMessage::TransformResult(result))
    }

    #[test]
    fn test_click_selects_and_outside_clears() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");

        let effects = m.handle(Event::Click(Some(el.clone())));
        assert_eq!(m.selected(), Some(&el));
        assert!(effects.contains(&Effect::Notify(Notification::SelectionChanged {
            element_id: Some("title".into())
        })));

        m.handle(Event::Click(None));
        assert_eq!(m.state(), &EditState::Idle);
    }

    #[test]
    fn test_unlocatable_click_counts_as_outside() {
        let mut m = machine();
        m.handle(Event::Click(Some(element("a", "p", "x"))));
        let mut bare = element("b", "p", "y");
        bare.locator = None;
        m.handle(Event::Click(Some(bare)));
        assert_eq!(m.state(), &EditState::Idle);
    }

    #[test]
    fn test_double_click_enters_editing() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");
        let effects = start_editing(&mut m, &el);

        assert!(m.is_editing());
        assert!(effects.contains(&Effect::SetEditable {
            element_id: "title".into(),
            editable: true
        }));
        assert!(effects.contains(&Effect::SelectContents {
            element_id: "title".into()
        }));
    }

    #[test]
    fn test_double_click_on_non_text_tag_only_selects() {
        let mut m = machine();
        let img = element("logo", "img", "");
        start_editing(&mut m, &img);
        assert!(!m.is_editing());
        assert_eq!(m.selected().map(|e| e.id.as_str()), Some("logo"));
    }

    #[test]
    fn test_enter_commits_changed_text() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");
        start_editing(&mut m, &el);
        m.handle(Event::TextInput { text: "Hello world".into() });

        let effects = m.handle(key("Enter"));
        let messages = sent(&effects);
        assert_eq!(messages.len(), 1);
        match messages[0] {
            ClientMessage::Transform {
                id,
                transform_type,
                change,
                ..
            } => {
                assert_eq!(id, "sess-1");
                assert_eq!(transform_type, "text-update");
                assert_eq!(change["originalText"], "Hello");
                assert_eq!(change["newText"], "Hello world");
            }
            other => panic!("Expected a transform, got {:?}", other),
        }

        assert!(!m.is_editing());
        assert_eq!(m.selected().map(|e| e.text.as_str()), Some("Hello world"));
        assert_eq!(m.pending()[0].status, PendingStatus::Pending);
    }

    #[test]
    fn test_identical_text_sends_nothing() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");
        start_editing(&mut m, &el);
        m.handle(Event::TextInput { text: " Hello ".into() });

        let effects = m.handle(key("Enter"));
        assert!(sent(&effects).is_empty());
        assert!(m.pending().is_empty());
        assert!(!m.is_editing());
    }

    #[test]
    fn test_shift_enter_does_not_commit() {
        let mut m = machine();
        start_editing(&mut m, &element("p1", "p", "a"));
        m.handle(Event::KeyDown {
            key: "Enter".into(),
            shift: true,
        });
        assert!(m.is_editing());
    }

    #[test]
    fn test_escape_restores_original() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");
        start_editing(&mut m, &el);
        m.handle(Event::TextInput { text: "Changed".into() });

        let effects = m.handle(key("Escape"));
        assert!(effects.contains(&Effect::RestoreText {
            element_id: "title".into(),
            text: "Hello".into()
        }));
        assert!(sent(&effects).is_empty());
        assert_eq!(m.selected(), Some(&el));
    }

    #[test]
    fn test_focus_out_commits_on_deferred_tick() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        m.handle(Event::TextInput { text: "Bye".into() });

        // Focus moving within the element is ignored
        assert!(m
            .handle(Event::FocusOut {
                related: Some("title".into())
            })
            .is_empty());

        let effects = m.handle(Event::FocusOut { related: None });
        let generation = match effects.as_slice() {
            [Effect::ScheduleDeferredCommit { generation }] => *generation,
            other => panic!("Expected a deferred commit, got {:?}", other),
        };
        assert!(m.is_editing());

        let effects = m.handle(Event::DeferredCommit { generation });
        assert_eq!(sent(&effects).len(), 1);
    }

    #[test]
    fn test_cancel_beats_deferred_commit() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        m.handle(Event::TextInput { text: "Bye".into() });

        let effects = m.handle(Event::FocusOut { related: None });
        let Effect::ScheduleDeferredCommit { generation } = effects[0] else {
            panic!("Expected a deferred commit");
        };
        m.handle(key("Escape"));
        assert!(sent(&m.handle(Event::DeferredCommit { generation })).is_empty());

        // A stale generation does not commit a later session either
        start_editing(&mut m, &element("title", "h1", "Hello"));
        m.handle(Event::TextInput { text: "Other".into() });
        assert!(sent(&m.handle(Event::DeferredCommit { generation })).is_empty());
        assert!(m.is_editing());
    }

    #[test]
    fn test_selecting_other_element_discards_edit() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        m.handle(Event::TextInput { text: "Changed".into() });

        let effects = m.handle(Event::Click(Some(element("body", "p", "Text"))));
        assert!(sent(&effects).is_empty());
        assert!(effects.contains(&Effect::RestoreText {
            element_id: "title".into(),
            text: "Hello".into()
        }));
        assert_eq!(m.selected().map(|e| e.id.as_str()), Some("body"));
        assert!(!m.is_editing());
    }

    #[test]
    fn test_hover_never_equals_selection() {
        let mut m = machine();
        let a = element("a", "p", "x");
        let b = element("bb", "p", "y");

        m.handle(Event::PointerMove(Some(a.clone())));
        assert_eq!(m.hovered(), Some(&a));

        m.handle(Event::Click(Some(a.clone())));
        assert!(m.hovered().is_none());

        let effects = m.handle(Event::PointerMove(Some(a.clone())));
        assert!(effects.is_empty());
        assert!(m.hovered().is_none());

        m.handle(Event::PointerMove(Some(b.clone())));
        assert_eq!(m.hovered(), Some(&b));
    }

    #[test]
    fn test_hover_suppressed_while_editing() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        let effects = m.handle(Event::PointerMove(Some(element("other", "p", ""))));
        assert!(effects.is_empty());
        assert!(m.hovered().is_none());
    }

    #[test]
    fn test_results_resolve_pending_edits() {
        let mut m = machine();
        let el = element("title", "h1", "Hello");
        start_editing(&mut m, &el);
        m.handle(Event::TextInput { text: "One".into() });
        m.handle(key("Enter"));

        let effects = m.handle(result("sess-1", false));
        assert!(effects.contains(&Effect::Notify(Notification::EditFailed {
            request_id: "sess-1".into(),
            message: "stale".into()
        })));
        let failed = m.pending_edit("sess-1").unwrap();
        assert_eq!(failed.status, PendingStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("stale"));

        // Failures stay until dismissed, and ticks do not prune them
        m.handle(Event::Tick { now_ms: i64::MAX });
        assert!(m.pending_edit("sess-1").is_some());
        assert!(m.dismiss_failure("sess-1"));
        assert!(m.pending().is_empty());
    }

    #[test]
    fn test_unsent_edit_fails_instead_of_hanging() {
        let mut m = machine();
        let target = SourceLocator::from_strings("src/App.tsx:3:5", None).unwrap();
        let change = TextUpdateChange {
            original_text: "Hello".into(),
            new_text: "Hi".into(),
        };
        let (id, _) = m.dispatch(TransformType::TextUpdate, target, &change).unwrap();

        let effects = m.fail_pending(&id, "Transport task has stopped");
        assert_eq!(
            effects,
            vec![Effect::Notify(Notification::EditFailed {
                request_id: id.clone(),
                message: "Transport task has stopped".into()
            })]
        );
        let edit = m.pending_edit(&id).unwrap();
        assert_eq!(edit.status, PendingStatus::Failed);
        assert!(edit.resolved_at.is_some());

        // A late result for the same id changes nothing
        assert!(m.handle(result(&id, true)).is_empty());
        assert_eq!(m.undo_depth(), 0);
    }

    #[test]
    fn test_unmatched_result_is_ignored() {
        let mut m = machine();
        assert!(m.handle(result("other-9", true)).is_empty());
    }

    #[test]
    fn test_committed_edits_pruned_after_grace() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        m.handle(Event::TextInput { text: "One".into() });
        m.handle(key("Enter"));
        m.handle(result("sess-1", true));

        let resolved = m.pending_edit("sess-1").unwrap().resolved_at.unwrap();
        m.handle(Event::Tick {
            now_ms: resolved + DEFAULT_COMMIT_GRACE_MS as i64 - 1,
        });
        assert_eq!(m.pending().len(), 1);

        m.handle(Event::Tick {
            now_ms: resolved + DEFAULT_COMMIT_GRACE_MS as i64,
        });
        assert!(m.pending().is_empty());
    }

    #[test]
    fn test_undo_dispatches_revert_change() {
        let mut m = machine();
        let target = SourceLocator::from_strings("src/App.tsx:3:5", None).unwrap();
        let undo_data = UndoData::new(
            TransformType::TextUpdate,
            target,
            &TextUpdateChange {
                original_text: "New".into(),
                new_text: "Old".into(),
            },
        )
        .unwrap();

        let (id, _) = m
            .dispatch(
                TransformType::TextUpdate,
                undo_data.target.clone(),
                &TextUpdateChange {
                    original_text: "Old".into(),
                    new_text: "New".into(),
                },
            )
            .unwrap();
        assert_eq!(id, "sess-1");
        let mut ok = TransformResult::success(id, vec!["src/App.tsx".into()], Some(undo_data));
        m.handle(Event::ServerMessage(ServerMessage::TransformResult(ok.clone())));
        assert_eq!(m.undo_depth(), 1);

        let (undo_id, effects) = m.undo().unwrap().unwrap();
        assert_eq!(undo_id, "sess-2");
        match sent(&effects)[0] {
            ClientMessage::Transform { change, .. } => assert_eq!(change["newText"], "Old"),
            other => panic!("Expected a transform, got {:?}", other),
        }
        assert_eq!(m.undo_depth(), 0);

        // The undo's own result does not land back on the history
        ok.request_id = undo_id;
        m.handle(Event::ServerMessage(ServerMessage::TransformResult(ok)));
        assert_eq!(m.undo_depth(), 0);
        assert!(m.undo().unwrap().is_none());
    }

    #[test]
    fn test_teardown() {
        let mut m = machine();
        start_editing(&mut m, &element("title", "h1", "Hello"));
        let effects = m.teardown();
        assert_eq!(
            effects,
            vec![Effect::SetEditable {
                element_id: "title".into(),
                editable: false
            }]
        );
        assert_eq!(m.state(), &EditState::Idle);
    }

    #[test]
    fn test_text_editable_tags() {
        assert!(is_text_editable("H2"));
        assert!(is_text_editable("div"));
        assert!(!is_text_editable("img"));
        assert!(!is_text_editable("section"));
    }
}
