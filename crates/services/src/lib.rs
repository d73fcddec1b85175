pub mod chat_records;
pub mod recorder;
pub mod session_file;

pub use chat_records::{ChatRecord, ChatRecordStore, NewChatRecord, SqliteChatStore, StoreError};
pub use recorder::{ChatRecorder, RecordContext};
pub use session_file::FileSessionStore;
