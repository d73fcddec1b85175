pub mod journal_chat;

pub use journal_chat::{ChatCompletion, JournalChatClient};
