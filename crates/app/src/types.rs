//! Host page state: the journal editor around the chat panel.

use crate::chat_panel::{ChatInputs, ChatPanel};
use anyhow::{Context, Result};
use chat_host::{ChatPanelController, PanelProps};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use providers::JournalChatClient;
use services::{FileSessionStore, SqliteChatStore};
use shared::chat::{ChatMessage, ConversationKey};
use shared::settings::{ChatSettings, DataSavingPreference};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Account used by "Sign in" when the settings name none.
pub const DEFAULT_USER: &str = "journal-user";

/// Where the app keeps its files.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub settings: Option<PathBuf>,
    pub session: PathBuf,
    pub database: PathBuf,
}

/// Messages the user has sent, counted by the panel's notifier.
#[derive(Debug, Default, Clone)]
pub struct ActivityLog {
    pub count: u64,
    pub last_at: Option<DateTime<Local>>,
}

pub struct JournalApp {
    pub settings: ChatSettings,
    pub paths: AppPaths,
    pub signed_in: Option<String>,
    pub entry_id: Option<String>,
    pub journal_text: String,
    pub clear_requested: bool,
    pub activity: Arc<Mutex<ActivityLog>>,
    pub chat: ChatPanel,
    pub status: Option<String>,
    session: Arc<FileSessionStore>,
}

impl JournalApp {
    pub fn new(settings: ChatSettings, paths: AppPaths) -> Result<Self> {
        let session = Arc::new(FileSessionStore::open(&paths.session)?);
        let records = Arc::new(SqliteChatStore::open(&paths.database)?);
        let endpoint = JournalChatClient::with_timeout(
            &settings.endpoint_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .with_context(|| format!("invalid chat endpoint {}", settings.endpoint_url))?;
        tracing::info!(endpoint = %endpoint.endpoint(), "journal chat ready");

        let activity = Arc::new(Mutex::new(ActivityLog::default()));
        let notifier_log = activity.clone();
        let props = PanelProps {
            journal_content: String::new(),
            data_saving: settings.data_saving,
            research_consent: settings.research_consent,
        };
        let controller = ChatPanelController::new(session.clone(), props).with_notifier(Box::new(
            move |_msg: &ChatMessage| {
                let mut log = notifier_log.lock();
                log.count += 1;
                log.last_at = Some(Local::now());
            },
        ));

        Ok(Self {
            settings,
            paths,
            signed_in: None,
            entry_id: None,
            journal_text: String::new(),
            clear_requested: false,
            activity,
            chat: ChatPanel::new(controller, records, Arc::new(endpoint)),
            status: None,
            session,
        })
    }

    pub fn chat_inputs(&self) -> ChatInputs {
        ChatInputs {
            identity: ConversationKey::new(self.signed_in.clone(), self.entry_id.clone()),
            journal_content: self.journal_text.clone(),
            data_saving: self.settings.data_saving,
            research_consent: self.settings.research_consent,
            clear_chat: self.clear_requested,
        }
    }

    pub fn sign_in(&mut self) {
        let user = self
            .settings
            .user_id
            .clone()
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        tracing::info!(user = %user, "signed in");
        self.status = Some(format!("Signed in as {}", user));
        self.signed_in = Some(user);
    }

    pub fn sign_out(&mut self) {
        self.signed_in = None;
        self.status = Some("Signed out".to_string());
    }

    /// First save gives the entry its id; later saves keep it.
    pub fn save_entry(&mut self) {
        let id = self
            .entry_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        self.status = Some(format!("Entry saved ({})", short_id(&id)));
    }

    /// Start a blank entry and wipe the chat.
    pub fn new_entry(&mut self) {
        self.journal_text.clear();
        self.entry_id = None;
        self.clear_requested = true;
        self.status = Some("New entry".to_string());
    }

    pub fn clear_chat(&mut self) {
        self.clear_requested = true;
    }

    pub fn set_data_saving(&mut self, preference: DataSavingPreference) {
        if self.settings.data_saving != preference {
            self.settings.data_saving = preference;
            self.persist_settings();
        }
    }

    pub fn set_research_consent(&mut self, consent: bool) {
        if self.settings.research_consent != consent {
            self.settings.research_consent = consent;
            self.persist_settings();
        }
    }

    /// Forget cached conversations and the panel's open flag.
    pub fn reset_session(&mut self) {
        self.session.reset();
        self.status = Some("Session cache cleared".to_string());
    }

    fn persist_settings(&self) {
        if let Some(path) = &self.paths.settings {
            crate::save_settings(path, &self.settings);
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
