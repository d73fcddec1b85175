pub mod chat;
pub mod session_store;

pub mod settings {
    use serde::{Deserialize, Serialize};

    pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787/api/journal-chat";

    fn default_endpoint() -> String {
        DEFAULT_ENDPOINT.to_string()
    }

    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    /// Whether chat content may be logged to the remote record store.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum DataSavingPreference {
        /// Nothing leaves the device except the completion request itself
        #[default]
        Private,
        /// Messages are stored as chat records
        Research,
    }

    impl DataSavingPreference {
        pub fn allows_remote_logging(&self) -> bool {
            !matches!(self, DataSavingPreference::Private)
        }

        pub fn display_name(&self) -> &'static str {
            match self {
                DataSavingPreference::Private => "Private",
                DataSavingPreference::Research => "Save for research",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ChatSettings {
        #[serde(default = "default_endpoint")]
        pub endpoint_url: String,
        #[serde(default = "default_timeout_secs")]
        pub request_timeout_secs: u64,
        #[serde(default)]
        pub data_saving: DataSavingPreference,
        #[serde(default)]
        pub research_consent: bool,
        /// Account used by the "Sign in" button
        #[serde(default)]
        pub user_id: Option<String>,
        #[serde(default)]
        pub database_path: Option<String>,
        #[serde(default)]
        pub session_path: Option<String>,
    }

    impl Default for ChatSettings {
        fn default() -> Self {
            Self {
                endpoint_url: default_endpoint(),
                request_timeout_secs: default_timeout_secs(),
                data_saving: DataSavingPreference::default(),
                research_consent: false,
                user_id: None,
                database_path: None,
                session_path: None,
            }
        }
    }

    impl ChatSettings {
        /// Apply `JOURNAL_CHAT_ENDPOINT` / `JOURNAL_CHAT_USER` from the process environment.
        pub fn apply_env_overrides(&mut self) {
            self.apply_overrides(|name| std::env::var(name).ok());
        }

        pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
            if let Some(endpoint) = lookup("JOURNAL_CHAT_ENDPOINT").filter(|v| !v.trim().is_empty())
            {
                self.endpoint_url = endpoint.trim().to_string();
            }
            if let Some(user) = lookup("JOURNAL_CHAT_USER").filter(|v| !v.trim().is_empty()) {
                self.user_id = Some(user.trim().to_string());
            }
        }
    }

}
