pub mod client;
pub mod models;
pub mod telegram;

pub use client::SourceClient;
pub use models::{ChatAction, Message, Update};
pub use telegram::{ChatApi, DocumentUpload, TelegramClient};
