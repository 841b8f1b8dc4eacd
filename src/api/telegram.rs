use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::models::{
    ApiResponse, ChatAction, EditMessageTextRequest, Message, ReplyParameters,
    ResponseParameters, SendChatActionRequest, SendMessageRequest, SetWebhookRequest,
    WebhookInfo,
};
use crate::domain::{ChatError, StatusMessage};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
const PARSE_MODE: &str = "HTML";
const INVALID_FILE_URL_MARKER: &str = "invalid file HTTP URL";

pub type Result<T> = std::result::Result<T, ChatError>;

/// A document to push into a chat.
#[derive(Debug, Clone, Copy)]
pub struct DocumentUpload<'a> {
    pub chat_id: i64,
    pub path: &'a Path,
    pub file_name: &'a str,
    pub caption: &'a str,
    pub reply_to: i64,
}

/// The chat operations the relay needs from the messaging platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<StatusMessage>;

    async fn edit_message(&self, message: &StatusMessage, text: &str) -> Result<()>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()>;

    async fn send_document(&self, upload: DocumentUpload<'_>) -> Result<()>;
}

/// Translate a failed Bot API answer into a [`ChatError`]. This is the only
/// place that inspects platform error text.
pub fn classify_api_error(
    code: u16,
    description: String,
    parameters: Option<ResponseParameters>,
) -> ChatError {
    if let Some(retry_after) = parameters.and_then(|p| p.retry_after) {
        return ChatError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        };
    }

    match code {
        429 => ChatError::RateLimited {
            retry_after: Duration::from_secs(1),
        },
        400 if description.contains(INVALID_FILE_URL_MARKER) => {
            ChatError::InvalidFileUrl(description)
        }
        400 => ChatError::BadRequest(description),
        _ => ChatError::Api { code, description },
    }
}

/// Bot API client over plain HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        parse_response(method, response).await
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo> {
        self.call("getWebhookInfo", &serde_json::json!({})).await
    }

    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let _: bool = self.call("setWebhook", &SetWebhookRequest { url }).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", &serde_json::json!({})).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<StatusMessage> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            reply_parameters: reply_to.map(|message_id| ReplyParameters { message_id }),
        };
        let sent: Message = self.call("sendMessage", &request).await?;

        Ok(StatusMessage {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn edit_message(&self, message: &StatusMessage, text: &str) -> Result<()> {
        let request = EditMessageTextRequest {
            chat_id: message.chat_id,
            message_id: message.message_id,
            text,
            parse_mode: PARSE_MODE,
        };
        // Answers with the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", &request).await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()> {
        let _: bool = self
            .call("sendChatAction", &SendChatActionRequest { chat_id, action })
            .await?;
        Ok(())
    }

    async fn send_document(&self, upload: DocumentUpload<'_>) -> Result<()> {
        let file = tokio::fs::File::open(upload.path)
            .await
            .map_err(|e| ChatError::Transport(format!("cannot open upload: {e}")))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| ChatError::Transport(format!("cannot stat upload: {e}")))?
            .len();

        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(upload.file_name.to_string());
        let reply = serde_json::to_string(&ReplyParameters {
            message_id: upload.reply_to,
        })
        .map_err(|e| ChatError::Transport(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", upload.chat_id.to_string())
            .text("caption", upload.caption.to_string())
            .text("parse_mode", PARSE_MODE)
            .text("reply_parameters", reply)
            .part("document", part);

        let response = self
            .http
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let _: Message = parse_response("sendDocument", response).await?;
        info!(
            "Document {} ({} bytes) sent to chat {}",
            upload.file_name, length, upload.chat_id
        );
        Ok(())
    }
}

// reqwest errors carry the request URL, which embeds the bot token.
fn transport_error(err: reqwest::Error) -> ChatError {
    ChatError::Transport(err.without_url().to_string())
}

async fn parse_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body: ApiResponse<T> = response.json().await.map_err(|e| {
        ChatError::Transport(format!(
            "{method}: unreadable response ({status}): {}",
            e.without_url()
        ))
    })?;

    if body.ok {
        return body
            .result
            .ok_or_else(|| ChatError::Transport(format!("{method}: response without result")));
    }

    let code = body.error_code.unwrap_or_else(|| status.as_u16());
    let description = body.description.unwrap_or_default();
    debug!("Telegram {method} failed ({code}): {description}");
    Err(classify_api_error(code, description, body.parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const TOKEN: &str = "123:abc";

    fn sent_message(chat_id: i64, message_id: i64) -> String {
        json!({
            "ok": true,
            "result": {
                "message_id": message_id,
                "date": 0,
                "chat": {"id": chat_id, "type": "private"},
                "text": "x"
            }
        })
        .to_string()
    }

    #[test]
    fn test_classify_api_error() {
        assert_eq!(
            classify_api_error(
                429,
                "Too Many Requests: retry after 7".to_string(),
                Some(ResponseParameters {
                    retry_after: Some(7)
                })
            ),
            ChatError::RateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
        assert!(matches!(
            classify_api_error(
                400,
                "Bad Request: invalid file HTTP URL specified: Wrong port number".to_string(),
                None
            ),
            ChatError::InvalidFileUrl(_)
        ));
        assert_eq!(
            classify_api_error(400, "Bad Request: chat not found".to_string(), None),
            ChatError::BadRequest("Bad Request: chat not found".to_string())
        );
        assert!(matches!(
            classify_api_error(403, "Forbidden: bot was blocked".to_string(), None),
            ChatError::Api { code: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_send_message_replies_in_thread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "text": "hello",
                "parse_mode": "HTML",
                "reply_parameters": {"message_id": 9}
            })))
            .with_body(sent_message(42, 100))
            .create_async()
            .await;

        let client = TelegramClient::new(server.url(), TOKEN);
        let status = client.send_message(42, "hello", Some(9)).await.unwrap();
        assert_eq!(
            status,
            StatusMessage {
                chat_id: 42,
                message_id: 100
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_edit_message_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bot123:abc/editMessageText")
            .with_status(429)
            .with_body(
                json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 3",
                    "parameters": {"retry_after": 3}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = TelegramClient::new(server.url(), TOKEN);
        let status = StatusMessage {
            chat_id: 1,
            message_id: 2,
        };
        let err = client.edit_message(&status, "50%").await.unwrap_err();
        assert_eq!(
            err,
            ChatError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
        );
    }

    #[tokio::test]
    async fn test_send_document_invalid_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendDocument")
            .match_body(Matcher::Regex("Downloaded via".to_string()))
            .with_status(400)
            .with_body(
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: invalid file HTTP URL specified"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        tokio::fs::write(&path, b"content").await.unwrap();

        let client = TelegramClient::new(server.url(), TOKEN);
        let err = client
            .send_document(DocumentUpload {
                chat_id: 5,
                path: &path,
                file_name: "abc.bin",
                caption: "Downloaded via link",
                reply_to: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidFileUrl(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_management() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bot123:abc/getWebhookInfo")
            .with_body(
                json!({
                    "ok": true,
                    "result": {"url": "https://old.example.com/webhook/x", "pending_update_count": 2}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let set = server
            .mock("POST", "/bot123:abc/setWebhook")
            .match_body(Matcher::Json(json!({"url": "https://new.example.com/webhook/x"})))
            .with_body(r#"{"ok":true,"result":true}"#)
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/bot123:abc/deleteWebhook")
            .with_body(r#"{"ok":true,"result":true}"#)
            .create_async()
            .await;

        let client = TelegramClient::new(server.url(), TOKEN);
        let info = client.get_webhook_info().await.unwrap();
        assert_eq!(info.url, "https://old.example.com/webhook/x");
        assert_eq!(info.pending_update_count, 2);

        client
            .set_webhook("https://new.example.com/webhook/x")
            .await
            .unwrap();
        client.delete_webhook().await.unwrap();
        set.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // nothing listens on port 9 locally
        let client = TelegramClient::new("http://127.0.0.1:9", TOKEN);
        let err = client.get_webhook_info().await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert!(!err.to_string().contains(TOKEN));
    }
}
