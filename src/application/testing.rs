//! In-memory [`ChatApi`] used by the application tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::telegram::Result;
use crate::api::{ChatAction, ChatApi, DocumentUpload};
use crate::domain::{ChatError, StatusMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Send {
        chat_id: i64,
        text: String,
        reply_to: Option<i64>,
    },
    Edit {
        message_id: i64,
        text: String,
    },
    Action {
        chat_id: i64,
        action: ChatAction,
    },
    Document {
        chat_id: i64,
        file_name: String,
        caption: String,
        reply_to: i64,
        /// Size of the local file at upload time, `None` if it was missing.
        size: Option<u64>,
    },
}

#[derive(Default)]
pub struct FakeChat {
    calls: Mutex<Vec<ChatCall>>,
    next_id: AtomicI64,
    edit_error: Mutex<Option<ChatError>>,
    send_error: Mutex<Option<ChatError>>,
    upload_error: Mutex<Option<ChatError>>,
}

impl FakeChat {
    pub fn fail_edits(&self, err: ChatError) {
        *self.edit_error.lock().unwrap() = Some(err);
    }

    pub fn fail_sends(&self, err: ChatError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn fail_uploads(&self, err: ChatError) {
        *self.upload_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<ChatCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ChatCall::Document { .. }))
            .collect()
    }

    fn record(&self, call: ChatCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<StatusMessage> {
        self.record(ChatCall::Send {
            chat_id,
            text: text.to_string(),
            reply_to,
        });
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(StatusMessage {
            chat_id,
            message_id: 1000 + self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn edit_message(&self, message: &StatusMessage, text: &str) -> Result<()> {
        self.record(ChatCall::Edit {
            message_id: message.message_id,
            text: text.to_string(),
        });
        match self.edit_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()> {
        self.record(ChatCall::Action { chat_id, action });
        Ok(())
    }

    async fn send_document(&self, upload: DocumentUpload<'_>) -> Result<()> {
        let size = std::fs::metadata(upload.path).ok().map(|meta| meta.len());
        self.record(ChatCall::Document {
            chat_id: upload.chat_id,
            file_name: upload.file_name.to_string(),
            caption: upload.caption.to_string(),
            reply_to: upload.reply_to,
            size,
        });
        match self.upload_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
