//! Background work for the chat panel.
//!
//! Each job runs on its own thread and reports over an mpsc channel that the
//! UI drains once per frame; the thread pokes egui so the result is picked up
//! without waiting for input.

use chat_host::{execute_send, fetch_history, FetchRequest, SendJob};
use eframe::egui;
use providers::ChatCompletion;
use services::{ChatRecordStore, ChatRecorder, StoreError};
use shared::chat::{ChatError, ChatMessage};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Result from a background history fetch
#[derive(Debug)]
pub struct LoadResult {
    pub request: FetchRequest,
    pub messages: Result<Vec<ChatMessage>, StoreError>,
}

/// Result from a background chat round trip
pub type SendResult = Result<String, ChatError>;

/// Fetch persisted history in a background thread (non-blocking)
pub fn spawn_load(
    store: Arc<dyn ChatRecordStore>,
    request: FetchRequest,
    tx: Sender<LoadResult>,
    repaint: egui::Context,
) {
    std::thread::spawn(move || {
        let messages = fetch_history(&*store, &request);
        let _ = tx.send(LoadResult { request, messages });
        repaint.request_repaint();
    });
}

/// Run a chat round trip in a background thread (non-blocking)
pub fn spawn_send(
    job: SendJob,
    endpoint: Arc<dyn ChatCompletion>,
    recorder: ChatRecorder,
    tx: Sender<SendResult>,
    repaint: egui::Context,
) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = tx.send(Err(ChatError::Transport(format!(
                    "Failed to start async runtime: {}",
                    e
                ))));
                repaint.request_repaint();
                return;
            }
        };

        let result = rt.block_on(execute_send(&job, &*endpoint, &recorder));
        let _ = tx.send(result);
        repaint.request_repaint();
    });
}
