use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_UPLOADS_PATH: &str = "/static/uploads/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const SERVER_URL_ENV: &str = "ENHANCE_SERVER_URL";

#[derive(Debug, Default, Serialize, Deserialize)]
/// Persisted client settings for enhance-desk.
pub struct AppConfig {
    pub server_url: Option<String>,
    pub uploads_path: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub download_dir: Option<PathBuf>,
    pub last_open_dir: Option<PathBuf>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("enhance-desk").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), %err, "ignoring unreadable config");
            Self::default()
        })
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    /// Request deadline, shared by the HTTP client and the in-flight watchdog.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|&s| s > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Server location; `ENHANCE_SERVER_URL` wins over the file.
    pub fn server(&self) -> ServerConfig {
        let from_env = std::env::var(SERVER_URL_ENV).ok();
        resolve_server(from_env.as_deref(), self)
    }
}

fn resolve_server(from_env: Option<&str>, config: &AppConfig) -> ServerConfig {
    let base_url = from_env
        .and_then(normalize_server_url)
        .or_else(|| config.server_url.as_deref().and_then(normalize_server_url))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let uploads_path = config
        .uploads_path
        .clone()
        .unwrap_or_else(|| DEFAULT_UPLOADS_PATH.to_string());
    ServerConfig {
        base_url,
        uploads_path,
    }
}

/// Accepts `http(s)://host[:port][/prefix]`, dropping trailing slashes.
pub fn normalize_server_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let has_host = ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len());
    has_host.then(|| trimmed.to_string())
}

/// Where the enhancement service lives and how it serves images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub base_url: String,
    pub uploads_path: String,
}

impl ServerConfig {
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    /// Turns an image source from the page into a fetchable URL. Absolute
    /// URLs pass through, rooted paths hang off the server, bare file names
    /// live under the uploads path.
    pub fn resolve_image_url(&self, source: &str) -> String {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            source.to_string()
        } else if source.starts_with('/') {
            self.endpoint(source)
        } else {
            let dir = self.uploads_path.trim_matches('/');
            self.endpoint(&format!("{dir}/{source}"))
        }
    }

    pub fn download_url(&self, file_name: &str) -> String {
        self.endpoint(&format!("download/{file_name}"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        resolve_server(None, &AppConfig::default())
    }
}
