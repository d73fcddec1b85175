//! Best-effort remote logging of chat messages.

use crate::chat_records::{ChatRecordStore, NewChatRecord};
use shared::chat::ChatMessage;
use shared::settings::DataSavingPreference;
use std::sync::Arc;

/// Everything needed to decide whether, and how, a message is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordContext {
    pub user_id: Option<String>,
    pub journal_entry_id: Option<String>,
    pub preference: DataSavingPreference,
    pub research_consent: bool,
}

impl RecordContext {
    pub fn should_record(&self) -> bool {
        self.user_id.is_some() && self.preference.allows_remote_logging()
    }
}

#[derive(Clone)]
pub struct ChatRecorder {
    store: Arc<dyn ChatRecordStore>,
}

impl ChatRecorder {
    pub fn new(store: Arc<dyn ChatRecordStore>) -> Self {
        Self { store }
    }

    /// Insert one record for `message`. Returns whether a row was written.
    ///
    /// Skipped without a signed-in user or under the private preference.
    /// Failures are logged and swallowed; local chat state stays authoritative.
    pub fn save_chat_message(&self, ctx: &RecordContext, message: &ChatMessage) -> bool {
        let Some(user_id) = ctx.user_id.as_ref().filter(|_| ctx.should_record()) else {
            return false;
        };

        let record = NewChatRecord {
            user_id: user_id.clone(),
            journal_entry_id: ctx.journal_entry_id.clone(),
            message: message.content.clone(),
            role: message.role,
            is_public: false,
            research_consent: ctx.research_consent,
        };

        match self.store.insert(&record) {
            Ok(id) => {
                tracing::debug!(id, role = message.role.as_str(), "saved chat record");
                true
            }
            Err(e) => {
                tracing::error!("Error saving chat message: {}", e);
                false
            }
        }
    }
}
