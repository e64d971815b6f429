use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;

use crate::page::{DownloadLink, ImageSlot, PLACEHOLDER_HOST};

pub const FALLBACK_DOWNLOAD_NAME: &str = "enhanced_image.png";
const CACHE_TOKEN_KEY: &str = "t";

/// Puts server-confirmed results on screen.
pub struct ResultPresenter {
    last_token: u64,
    clock: fn() -> u64,
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self::with_clock(now_millis)
    }

    fn with_clock(clock: fn() -> u64) -> Self {
        Self {
            last_token: 0,
            clock,
        }
    }

    /// Shows `reference` with a fresh cache-busting token and points the
    /// download link at the bare reference.
    pub fn present(&mut self, slot: &mut ImageSlot, download: &mut DownloadLink, reference: &str) {
        let token = self.next_token();
        slot.show(with_cache_token(reference, token));
        update_download(download, Some(reference));
        tracing::info!(reference, token, "result presented");
    }

    pub fn reset(&mut self, slot: &mut ImageSlot, download: &mut DownloadLink) {
        slot.reset();
        update_download(download, None);
    }

    /// Strictly increasing even if the clock stalls or steps back.
    fn next_token(&mut self) -> u64 {
        let token = (self.clock)().max(self.last_token + 1);
        self.last_token = token;
        token
    }
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn with_cache_token(reference: &str, token: u64) -> String {
    let sep = if reference.contains('?') { '&' } else { '?' };
    format!("{reference}{sep}{CACHE_TOKEN_KEY}={token}")
}

/// Empty references, `#` and placeholder assets never get a download link.
pub fn is_placeholder_reference(reference: &str) -> bool {
    let reference = reference.trim();
    reference.is_empty() || reference == "#" || reference.starts_with(PLACEHOLDER_HOST)
}

/// Last path segment of the reference, resolved the way a browser would.
pub fn download_file_name(reference: &str) -> String {
    Url::parse("http://localhost/")
        .and_then(|base| base.join(reference))
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
}

pub fn update_download(download: &mut DownloadLink, reference: Option<&str>) {
    match reference {
        Some(reference) if !is_placeholder_reference(reference) => {
            download.visible = true;
            download.href = Some(reference.to_string());
            download.file_name = download_file_name(reference);
        }
        _ => {
            download.visible = false;
            download.href = None;
            download.file_name.clear();
        }
    }
}
