//! Chat panel state machine.
//!
//! The controller is synchronous. Anything slow (history fetches, the
//! completion request, record inserts) is described by a [`LoadPlan`] or a
//! [`SendJob`], run elsewhere, and fed back through [`ChatPanelController::finish_load`]
//! and [`ChatPanelController::finish_send`].

use services::RecordContext;
use shared::chat::{
    decode_messages, encode_messages, ChatMessage, ConversationKey, OPEN_STATE_KEY,
};
use shared::session_store::SessionStore;
use shared::settings::DataSavingPreference;
use std::fmt::Display;
use std::sync::Arc;

pub const EMPTY_STATE_PROMPT: &str =
    "Ask me anything about what you're writing. I can help you reflect, spot patterns, or go deeper.";

pub const PRIVACY_NOTICE: &str = "Privacy notice: your chat messages and the content of this \
     journal entry are sent to a third-party AI model provider to generate responses.";

/// Assistant text used when the endpoint succeeds without a reply.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't generate a response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

/// What the panel body should show right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelView {
    /// Initial load still running; no messages are shown
    Loading,
    /// Loaded with nothing to show: prompt plus privacy notice
    Empty,
    /// Messages, with a typing indicator after them while `sending`
    Conversation { sending: bool },
}

/// Inputs the host owns and may change at any time.
#[derive(Debug, Clone, Default)]
pub struct PanelProps {
    pub journal_content: String,
    pub data_saving: DataSavingPreference,
    pub research_consent: bool,
}

pub type ActivityNotifier = Box<dyn Fn(&ChatMessage) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub entry_id: String,
    pub user_id: String,
}

impl FetchRequest {
    /// Whether this fetch was issued for `key`.
    pub fn matches(&self, key: &ConversationKey) -> bool {
        key.entry_id.as_deref() == Some(self.entry_id.as_str())
            && key.user_id.as_deref() == Some(self.user_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Messages were settled synchronously
    Resolved,
    /// Persisted history must be fetched and passed to `finish_load`
    Fetch(FetchRequest),
}

/// Work handed off by a successful `begin_send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendJob {
    pub message: String,
    pub journal_content: String,
    pub record: RecordContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    /// A draft with local messages just received its entry identifier
    FirstSave,
    /// Someone signed in on a conversation that already has local messages
    SignInAdoption,
    Plain,
}

fn classify(
    previous_entry: Option<&str>,
    previous_user: Option<&str>,
    next: &ConversationKey,
    has_local: bool,
) -> Transition {
    let entry_assigned = previous_entry.is_none() && next.entry_id.is_some();
    if entry_assigned && has_local && previous_user == next.user_id.as_deref() {
        Transition::FirstSave
    } else if entry_assigned && has_local && previous_user.is_none() && next.user_id.is_some() {
        Transition::SignInAdoption
    } else {
        Transition::Plain
    }
}

pub fn failure_message(error: &dyn Display) -> String {
    let detail = error.to_string();
    let detail = if detail.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        detail
    };
    format!(
        "Sorry, I ran into an error: {}. Please check your internet connection and try again.",
        detail
    )
}

pub struct ChatPanelController {
    store: Arc<dyn SessionStore>,
    props: PanelProps,
    notifier: Option<ActivityNotifier>,
    visibility: Visibility,
    load_state: LoadState,
    send_state: SendState,
    messages: Vec<ChatMessage>,
    input: String,
    identity: ConversationKey,
    previous_entry_id: Option<String>,
    mounted: bool,
    clear_signal: bool,
}

impl ChatPanelController {
    pub fn new(store: Arc<dyn SessionStore>, props: PanelProps) -> Self {
        let open = store
            .get(OPEN_STATE_KEY)
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(false);

        Self {
            store,
            props,
            notifier: None,
            visibility: if open {
                Visibility::Open
            } else {
                Visibility::Closed
            },
            load_state: LoadState::Pending,
            send_state: SendState::Idle,
            messages: Vec::new(),
            input: String::new(),
            identity: ConversationKey::anonymous(),
            previous_entry_id: None,
            mounted: false,
            clear_signal: false,
        }
    }

    pub fn with_notifier(mut self, notifier: ActivityNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn identity(&self) -> &ConversationKey {
        &self.identity
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_open(&self) -> bool {
        self.visibility == Visibility::Open
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn send_state(&self) -> SendState {
        self.send_state
    }

    pub fn is_sending(&self) -> bool {
        self.send_state == SendState::Sending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn view(&self) -> PanelView {
        match (self.load_state, self.send_state) {
            (LoadState::Pending, _) => PanelView::Loading,
            (LoadState::Loaded, SendState::Idle) if self.messages.is_empty() => PanelView::Empty,
            (LoadState::Loaded, send) => PanelView::Conversation {
                sending: send == SendState::Sending,
            },
        }
    }

    // ── Host inputs ──────────────────────────────────────────────────

    pub fn set_journal_content(&mut self, content: &str) {
        if self.props.journal_content != content {
            self.props.journal_content = content.to_string();
        }
    }

    pub fn set_data_saving(&mut self, preference: DataSavingPreference) {
        self.props.data_saving = preference;
    }

    pub fn set_research_consent(&mut self, consent: bool) {
        self.props.research_consent = consent;
    }

    pub fn record_context(&self) -> RecordContext {
        RecordContext {
            user_id: self.identity.user_id.clone(),
            journal_entry_id: self.identity.entry_id.clone(),
            preference: self.props.data_saving,
            research_consent: self.props.research_consent,
        }
    }

    // ── Visibility ───────────────────────────────────────────────────

    pub fn toggle_open(&mut self) {
        let next = match self.visibility {
            Visibility::Open => Visibility::Closed,
            Visibility::Closed => Visibility::Open,
        };
        self.set_visibility(next);
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
        let flag = if visibility == Visibility::Open {
            "true"
        } else {
            "false"
        };
        self.store.set(OPEN_STATE_KEY, flag);
    }

    // ── Clear signal ─────────────────────────────────────────────────

    /// Feed the host's clear trigger. Only the rising edge clears, so a
    /// host that keeps the signal asserted does not wipe later messages.
    pub fn set_clear_signal(&mut self, asserted: bool) {
        let rising = asserted && !self.clear_signal;
        self.clear_signal = asserted;
        if rising {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.messages.clear();
        self.visibility = Visibility::Closed;
        self.store.remove(&self.identity.draft_cache_key());
        self.store.remove(OPEN_STATE_KEY);
        if self.identity.entry_id.is_some() {
            self.store.remove(&self.identity.cache_key());
        }
        tracing::info!(user = self.identity.user_label(), "chat cleared");
    }

    // ── Load protocol ────────────────────────────────────────────────

    /// First load for this panel instance.
    pub fn mount(&mut self, identity: ConversationKey) -> LoadPlan {
        self.mounted = true;
        self.begin_load(identity)
    }

    /// Report the current (user, entry) pair. Starts a load only when the
    /// pair differs from the last one seen.
    pub fn set_identity(&mut self, identity: ConversationKey) -> Option<LoadPlan> {
        if !self.mounted {
            return Some(self.mount(identity));
        }
        if identity == self.identity {
            return None;
        }
        Some(self.begin_load(identity))
    }

    fn begin_load(&mut self, identity: ConversationKey) -> LoadPlan {
        let has_local = !self.messages.is_empty();
        let previous_user = std::mem::replace(&mut self.identity, identity).user_id;
        let previous_entry = std::mem::replace(
            &mut self.previous_entry_id,
            self.identity.entry_id.clone(),
        );
        let transition = classify(
            previous_entry.as_deref(),
            previous_user.as_deref(),
            &self.identity,
            has_local,
        );
        self.load_state = LoadState::Pending;

        tracing::debug!(
            ?transition,
            user = self.identity.user_label(),
            entry = ?self.identity.entry_id,
            "loading chat messages"
        );

        let (Some(user_id), Some(entry_id)) =
            (self.identity.user_id.clone(), self.identity.entry_id.clone())
        else {
            let cached = self
                .read_cached(&self.identity.draft_cache_key())
                .unwrap_or_default();
            self.replace_messages(cached);
            self.load_state = LoadState::Loaded;
            return LoadPlan::Resolved;
        };

        match transition {
            Transition::FirstSave => {
                // Keep what the user just wrote; it now lives under the entry key.
                self.persist();
                self.load_state = LoadState::Loaded;
                LoadPlan::Resolved
            }
            Transition::SignInAdoption => {
                let anonymous_key = ConversationKey::anonymous_draft_key();
                match self.read_cached(&anonymous_key).filter(|m| !m.is_empty()) {
                    Some(adopted) => {
                        tracing::info!(count = adopted.len(), "adopting anonymous chat messages");
                        self.replace_messages(adopted);
                        self.store.remove(&anonymous_key);
                    }
                    None => self.persist(),
                }
                self.load_state = LoadState::Loaded;
                LoadPlan::Resolved
            }
            Transition::Plain => LoadPlan::Fetch(FetchRequest { entry_id, user_id }),
        }
    }

    /// Apply the outcome of a [`LoadPlan::Fetch`]. Errors are logged and
    /// leave an empty conversation. The last result to arrive wins.
    pub fn finish_load<E: Display>(&mut self, result: Result<Vec<ChatMessage>, E>) {
        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Error loading chat messages: {}", e);
                Vec::new()
            }
        };
        self.replace_messages(messages);
        self.load_state = LoadState::Loaded;
    }

    // ── Send protocol ────────────────────────────────────────────────

    /// Take the current input as a user message. Returns `None` for blank
    /// input or while another send is in flight.
    pub fn begin_send(&mut self) -> Option<SendJob> {
        if self.send_state == SendState::Sending {
            return None;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }

        let message = ChatMessage::user(text.clone());
        self.push_message(message.clone());
        self.input.clear();
        self.send_state = SendState::Sending;

        if let Some(notify) = &self.notifier {
            notify(&message);
        }

        Some(SendJob {
            message: text,
            journal_content: self.props.journal_content.clone(),
            record: self.record_context(),
        })
    }

    /// Append the assistant's answer, or a local error bubble, and return
    /// to idle. Replies with no send in flight are ignored.
    pub fn finish_send<E: Display>(&mut self, outcome: Result<String, E>) -> Option<ChatMessage> {
        if self.send_state != SendState::Sending {
            tracing::debug!("ignoring chat reply with no send in flight");
            return None;
        }

        let reply = match outcome {
            Ok(text) => ChatMessage::assistant(text),
            Err(e) => {
                tracing::error!("Error sending chat message: {}", e);
                ChatMessage::assistant(failure_message(&e))
            }
        };
        self.push_message(reply.clone());
        self.send_state = SendState::Idle;
        Some(reply)
    }

    // ── Session cache ────────────────────────────────────────────────

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.persist();
    }

    fn replace_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.persist();
    }

    /// Write-through to the active cache key. Anonymous sessions are not cached.
    fn persist(&self) {
        if self.identity.user_id.is_none() {
            return;
        }
        match encode_messages(&self.messages) {
            Ok(json) => self.store.set(&self.identity.cache_key(), &json),
            Err(e) => tracing::warn!("failed to encode chat messages: {}", e),
        }
    }

    fn read_cached(&self, key: &str) -> Option<Vec<ChatMessage>> {
        let raw = self.store.get(key)?;
        match decode_messages(&raw) {
            Ok(messages) => Some(messages),
            Err(e) => {
                tracing::warn!(key, "Error loading chat messages from session cache: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat::{ChatError, ChatRole};
    use shared::session_store::MemorySessionStore;

    fn user(id: &str) -> Option<String> {
        Some(id.to_string())
    }

    fn props() -> PanelProps {
        PanelProps {
            journal_content: "Today I walked by the river.".to_string(),
            data_saving: DataSavingPreference::Research,
            research_consent: true,
        }
    }

    fn controller(store: &Arc<MemorySessionStore>) -> ChatPanelController {
        ChatPanelController::new(store.clone(), props())
    }

    fn seed(store: &MemorySessionStore, key: &str, messages: &[ChatMessage]) {
        store.set(key, &encode_messages(messages).unwrap());
    }

    fn cached(store: &MemorySessionStore, key: &str) -> Option<Vec<ChatMessage>> {
        store.get(key).map(|raw| decode_messages(&raw).unwrap())
    }

    fn send(panel: &mut ChatPanelController, text: &str, reply: &str) {
        panel.set_input(text);
        panel.begin_send().unwrap();
        panel.finish_send(Ok::<_, ChatError>(reply.to_string())).unwrap();
    }

    #[test]
    fn test_anonymous_mount_shows_empty_state() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        assert_eq!(panel.view(), PanelView::Loading);

        assert_eq!(panel.mount(ConversationKey::anonymous()), LoadPlan::Resolved);
        assert_eq!(panel.load_state(), LoadState::Loaded);
        assert_eq!(panel.view(), PanelView::Empty);
        assert_eq!(panel.visibility(), Visibility::Closed);
    }

    #[test]
    fn test_send_then_reply() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), user("e1")));
        panel.finish_load(Ok::<_, ChatError>(Vec::new()));

        panel.set_input("  What stood out today?  ");
        let job = panel.begin_send().unwrap();
        assert_eq!(panel.send_state(), SendState::Sending);
        assert_eq!(job.message, "What stood out today?");
        assert_eq!(job.journal_content, "Today I walked by the river.");
        assert_eq!(job.record.journal_entry_id.as_deref(), Some("e1"));
        assert_eq!(panel.input(), "");
        assert_eq!(panel.messages(), [ChatMessage::user("What stood out today?")]);
        assert_eq!(panel.view(), PanelView::Conversation { sending: true });

        let reply = panel.finish_send(Ok::<_, ChatError>("Hello".to_string()));
        assert_eq!(reply, Some(ChatMessage::assistant("Hello")));
        assert_eq!(panel.messages().len(), 2);
        assert_eq!(panel.messages()[1].content, "Hello");
        assert_eq!(panel.send_state(), SendState::Idle);
    }

    #[test]
    fn test_send_guards() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());

        panel.set_input("   \n\t");
        assert!(panel.begin_send().is_none());
        assert!(panel.messages().is_empty());

        panel.set_input("first");
        assert!(panel.begin_send().is_some());
        panel.set_input("second");
        assert!(panel.begin_send().is_none());
        assert_eq!(panel.input(), "second");
        assert_eq!(panel.messages().len(), 1);
    }

    #[test]
    fn test_http_failure_becomes_assistant_message() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());

        panel.set_input("hi");
        panel.begin_send().unwrap();
        let reply = panel.finish_send(Err::<String, _>(ChatError::Status(500))).unwrap();

        assert_eq!(reply.role, ChatRole::Assistant);
        assert!(reply.content.contains("HTTP error! status: 500"));
        assert!(reply.content.contains("check your internet connection"));
        assert!(!panel.is_sending());
        assert_eq!(panel.messages().len(), 2);
    }

    #[test]
    fn test_blank_error_text_reads_unknown() {
        let text = failure_message(&ChatError::Transport(String::new()));
        assert!(text.contains("Unknown error"));
    }

    #[test]
    fn test_reply_without_send_is_ignored() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());
        assert!(panel.finish_send(Ok::<_, ChatError>("late".into())).is_none());
        assert!(panel.messages().is_empty());
    }

    #[test]
    fn test_notifier_sees_user_message() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store).with_notifier(Box::new(move |m: &ChatMessage| {
            sink.lock().push(m.content.clone());
        }));
        panel.mount(ConversationKey::anonymous());

        send(&mut panel, "note this", "noted");
        assert_eq!(*seen.lock(), vec!["note this".to_string()]);
    }

    #[test]
    fn test_clear_signal() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), None));
        panel.toggle_open();
        send(&mut panel, "hello", "hi there");
        assert!(store.contains("chat_messages_new_u1"));
        assert!(store.contains(OPEN_STATE_KEY));

        panel.set_clear_signal(true);
        assert!(panel.messages().is_empty());
        assert!(!panel.is_open());
        assert!(!store.contains("chat_messages_new_u1"));
        assert!(!store.contains(OPEN_STATE_KEY));

        // Holding the signal does not wipe later messages
        send(&mut panel, "again", "ok");
        panel.set_clear_signal(true);
        assert_eq!(panel.messages().len(), 2);

        panel.set_clear_signal(false);
        panel.set_clear_signal(true);
        assert!(panel.messages().is_empty());
    }

    #[test]
    fn test_clear_signal_drops_entry_cache() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), user("e1")));
        panel.finish_load(Ok::<_, ChatError>(Vec::new()));
        send(&mut panel, "hello", "hi there");
        assert!(store.contains("chat_messages_e1"));

        panel.set_clear_signal(true);
        assert!(panel.messages().is_empty());
        assert!(!store.contains("chat_messages_e1"));
        assert!(!store.contains("chat_messages_new_u1"));
    }

    #[test]
    fn test_stale_fetch_lands_on_current_conversation() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        let LoadPlan::Fetch(request) = panel.mount(ConversationKey::new(user("u1"), user("e1")))
        else {
            panic!("expected a fetch for a saved entry");
        };
        assert!(request.matches(panel.identity()));

        // Switch to a draft before the fetch returns
        assert_eq!(
            panel.set_identity(ConversationKey::new(user("u1"), None)),
            Some(LoadPlan::Resolved)
        );
        assert!(!request.matches(panel.identity()));

        // Last completed load wins, even when it was issued for another entry
        let history = vec![ChatMessage::user("from e1")];
        panel.finish_load(Ok::<_, ChatError>(history.clone()));
        assert_eq!(panel.messages(), history.as_slice());
        assert_eq!(cached(&store, "chat_messages_new_u1"), Some(history));
    }

    #[test]
    fn test_sign_in_adopts_anonymous_messages() {
        let store = Arc::new(MemorySessionStore::new());
        let anonymous = vec![ChatMessage::user("draft q"), ChatMessage::assistant("draft a")];
        seed(&store, &ConversationKey::anonymous_draft_key(), &anonymous);

        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());
        assert_eq!(panel.messages(), anonymous.as_slice());

        let plan = panel.set_identity(ConversationKey::new(user("u1"), user("e1")));
        assert_eq!(plan, Some(LoadPlan::Resolved));
        assert_eq!(panel.messages(), anonymous.as_slice());
        assert!(!store.contains(&ConversationKey::anonymous_draft_key()));
        assert_eq!(cached(&store, "chat_messages_e1"), Some(anonymous));
        assert_eq!(panel.load_state(), LoadState::Loaded);
    }

    #[test]
    fn test_sign_in_without_anonymous_cache_keeps_memory() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());
        send(&mut panel, "typed while signed out", "sure");

        let plan = panel.set_identity(ConversationKey::new(user("u1"), user("e1")));
        assert_eq!(plan, Some(LoadPlan::Resolved));
        assert_eq!(panel.messages().len(), 2);
    }

    #[test]
    fn test_first_save_keeps_messages() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), None));
        send(&mut panel, "before saving", "noted");

        let plan = panel.set_identity(ConversationKey::new(user("u1"), user("e42")));
        assert_eq!(plan, Some(LoadPlan::Resolved));
        assert_eq!(panel.messages().len(), 2);
        assert_eq!(
            cached(&store, "chat_messages_e42").map(|m| m.len()),
            Some(2)
        );
    }

    #[test]
    fn test_existing_entry_fetches_history() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);

        let plan = panel.mount(ConversationKey::new(user("u1"), user("e1")));
        assert_eq!(
            plan,
            LoadPlan::Fetch(FetchRequest {
                entry_id: "e1".into(),
                user_id: "u1".into()
            })
        );
        assert_eq!(panel.view(), PanelView::Loading);

        let history = vec![ChatMessage::user("q"), ChatMessage::assistant("a")];
        panel.finish_load(Ok::<_, ChatError>(history.clone()));
        assert_eq!(panel.messages(), history.as_slice());
        assert_eq!(panel.view(), PanelView::Conversation { sending: false });
        assert_eq!(cached(&store, "chat_messages_e1"), Some(history));
    }

    #[test]
    fn test_fetch_failure_falls_back_to_empty() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), user("e1")));
        panel.finish_load(Err::<Vec<ChatMessage>, _>("connection reset"));
        assert!(panel.messages().is_empty());
        assert_eq!(panel.view(), PanelView::Empty);
    }

    #[test]
    fn test_unchanged_identity_does_not_reload() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        let key = ConversationKey::new(user("u1"), None);
        assert!(panel.set_identity(key.clone()).is_some());
        assert!(panel.set_identity(key).is_none());
    }

    #[test]
    fn test_draft_round_trip_through_session_cache() {
        let store = Arc::new(MemorySessionStore::new());
        let key = ConversationKey::new(user("u1"), None);

        let mut first = controller(&store);
        first.mount(key.clone());
        send(&mut first, "remember this", "I will");
        let written = first.messages().to_vec();

        let mut reloaded = controller(&store);
        assert_eq!(reloaded.mount(key), LoadPlan::Resolved);
        assert_eq!(reloaded.messages(), written.as_slice());
    }

    #[test]
    fn test_anonymous_messages_are_not_cached() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.mount(ConversationKey::anonymous());
        send(&mut panel, "secret", "ok");
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_cache_loads_empty() {
        let store = Arc::new(MemorySessionStore::new());
        store.set("chat_messages_new_u1", "{oops");
        let mut panel = controller(&store);
        panel.mount(ConversationKey::new(user("u1"), None));
        assert_eq!(panel.view(), PanelView::Empty);
    }

    #[test]
    fn test_open_state_survives_reload() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.toggle_open();
        assert!(panel.is_open());
        assert!(controller(&store).is_open());

        panel.toggle_open();
        assert!(!controller(&store).is_open());
    }

    #[test]
    fn test_private_preference_in_record_context() {
        let store = Arc::new(MemorySessionStore::new());
        let mut panel = controller(&store);
        panel.set_data_saving(DataSavingPreference::Private);
        panel.mount(ConversationKey::new(user("u1"), user("e1")));
        assert!(!panel.record_context().should_record());
    }
}
