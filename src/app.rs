use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{SourceClient, TelegramClient};
use crate::application::{DownloadCoordinator, Downloader};
use crate::config::Settings;
use crate::domain::ChatError;
use crate::utils::mask_webhook_url;
use crate::webhook::WebhookState;

/// Process-wide context: built once in `main`, started before the server
/// accepts requests and shut down after it stops.
pub struct RelayApp {
    settings: Settings,
    telegram: Arc<TelegramClient>,
    coordinator: Arc<DownloadCoordinator>,
}

impl RelayApp {
    pub fn new(settings: Settings) -> Self {
        let telegram = Arc::new(TelegramClient::new(
            settings.telegram_api_url.clone(),
            settings.bot_token.clone(),
        ));
        let downloader = Downloader::new(SourceClient::new(), settings.chunk_size);
        let coordinator = Arc::new(DownloadCoordinator::new(
            telegram.clone(),
            downloader,
            settings.tmp_dir(),
        ));

        Self {
            settings,
            telegram,
            coordinator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn webhook_state(&self) -> WebhookState {
        WebhookState::new(self.settings.webhook_secret(), self.coordinator.clone())
    }

    /// Make sure Telegram delivers updates to this instance.
    pub async fn startup(&self) -> Result<(), ChatError> {
        info!("Starting bot...");
        let expected = self.settings.full_webhook_url();
        let masked = mask_webhook_url(&expected);

        let current = self.telegram.get_webhook_info().await?;
        if let Some(last_error) = &current.last_error_message {
            warn!("Telegram reports a previous webhook error: {last_error}");
        }
        if current.url == expected {
            info!(
                "Webhook already set to {masked} ({} pending updates)",
                current.pending_update_count
            );
            return Ok(());
        }

        retry_once_on_rate_limit(|| self.telegram.set_webhook(&expected)).await?;
        info!("Webhook set to {masked}");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), ChatError> {
        info!("Shutting down bot...");
        self.telegram.delete_webhook().await
    }
}

/// Run `op`; if the platform answers with a rate limit, wait the requested
/// time and run it exactly once more.
pub async fn retry_once_on_rate_limit<T, F, Fut>(mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    match op().await {
        Err(ChatError::RateLimited { retry_after }) => {
            warn!("Rate limited, retrying in {}s", retry_after.as_secs());
            tokio::time::sleep(retry_after).await;
            op().await
        }
        other => other,
    }
}
