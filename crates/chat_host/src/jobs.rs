//! Work the controller hands off: history fetches and chat round trips.

use crate::controller::{FetchRequest, SendJob, FALLBACK_REPLY};
use providers::ChatCompletion;
use services::{ChatRecordStore, ChatRecorder, StoreError};
use shared::chat::{ChatError, ChatMessage};

/// Persisted history for one conversation, oldest first.
pub fn fetch_history(
    store: &dyn ChatRecordStore,
    request: &FetchRequest,
) -> Result<Vec<ChatMessage>, StoreError> {
    let records = store.list_for_entry(&request.entry_id, &request.user_id)?;
    Ok(records.iter().map(|r| r.to_message()).collect())
}

/// Record the user's message, ask the endpoint, record the answer.
///
/// Record inserts are best-effort and never fail the round trip. An empty
/// or missing reply becomes [`FALLBACK_REPLY`].
pub async fn execute_send(
    job: &SendJob,
    endpoint: &dyn ChatCompletion,
    recorder: &ChatRecorder,
) -> Result<String, ChatError> {
    recorder.save_chat_message(&job.record, &ChatMessage::user(job.message.clone()));

    let reply = endpoint
        .complete(&job.message, &job.journal_content)
        .await?
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| FALLBACK_REPLY.to_string());

    recorder.save_chat_message(&job.record, &ChatMessage::assistant(reply.clone()));
    Ok(reply)
}
