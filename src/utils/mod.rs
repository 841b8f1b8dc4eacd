use std::path::Path;

use regex::Regex;
use url::Url;

const GDRIVE_SHARE_PATTERN: &str =
    r"^https://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)/(?:[^?]*)(?:\?.*)?";
const GDRIVE_DIRECT: &str = "https://drive.google.com/uc?export=download&id=";
const DEFAULT_EXTENSION: &str = ".bin";

/// Rewrite a Google Drive share link to its direct-download form.
/// Any other input is returned unchanged.
pub fn normalize_link(url: &str) -> String {
    let Ok(re) = Regex::new(GDRIVE_SHARE_PATTERN) else {
        return url.to_string();
    };

    match re.captures(url) {
        Some(caps) => format!("{}{}", GDRIVE_DIRECT, &caps[1]),
        None => url.to_string(),
    }
}

/// Deterministic local file name for a URL: 12 hex chars of its MD5 plus a
/// guessed extension.
pub fn file_name_for(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    format!("{}{}", &digest[..12], guess_extension(url))
}

/// Extension (with leading dot) of the URL path when it names a known
/// content type, `.bin` otherwise.
pub fn guess_extension(url: &str) -> String {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    let extension = Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if mime_guess::from_ext(&ext).first().is_some() => format!(".{ext}"),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Hide everything after `/webhook/` so the secret never reaches the logs.
pub fn mask_webhook_url(url: &str) -> String {
    match url.find("/webhook/") {
        Some(idx) => format!("{}/webhook/***", &url[..idx]),
        None => url.to_string(),
    }
}
