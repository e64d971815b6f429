//! Requests against the image-processing service.

use std::time::Duration;

use reqwest::blocking::{Client, Response, multipart};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::ServerConfig,
    error::RequestError,
    params::{EnhancementParameters, ParamsUsed},
};

pub const UPLOAD_ROUTE: &str = "/upload";
pub const AUTO_ENHANCE_ROUTE: &str = "/auto_enhance";
pub const MANUAL_ENHANCE_ROUTE: &str = "/manual_enhance";
pub const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReply {
    pub uploaded_filename: String,
    pub original_image_url: String,
    pub processed_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoEnhanceRequest {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualEnhanceRequest {
    pub filename: String,
    #[serde(flatten)]
    pub params: EnhancementParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnhanceReply {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub enhanced_image_url: Option<String>,
    #[serde(default)]
    pub params_used: Option<ParamsUsed>,
}

impl EnhanceReply {
    /// The URL wins over the bare file name when the server sends both.
    pub fn image_reference(&self) -> Option<&str> {
        self.enhanced_image_url
            .as_deref()
            .or(self.filename.as_deref())
            .filter(|r| !r.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

/// The remote enhancement service. Calls block; run them off the UI thread.
pub trait Backend: Send + Sync {
    fn upload(&self, file: &UploadFile) -> Result<UploadReply, RequestError>;
    fn auto_enhance(&self, request: &AutoEnhanceRequest) -> Result<EnhanceReply, RequestError>;
    fn manual_enhance(&self, request: &ManualEnhanceRequest)
    -> Result<EnhanceReply, RequestError>;
    /// Raw bytes of an image or download URL.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RequestError>;
}

pub struct HttpBackend {
    client: Client,
    server: ServerConfig,
}

impl HttpBackend {
    pub fn new(server: ServerConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("enhance-desk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, server })
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, RequestError> {
        let url = self.server.endpoint(route);
        tracing::debug!(%url, "POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(transport)?;
        decode_reply(resp)
    }
}

impl Backend for HttpBackend {
    fn upload(&self, file: &UploadFile) -> Result<UploadReply, RequestError> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(crate::files::mime_for(&file.name))
            .map_err(transport)?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);
        let url = self.server.endpoint(UPLOAD_ROUTE);
        tracing::debug!(%url, name = %file.name, size = file.bytes.len(), "POST upload");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(transport)?;
        decode_reply(resp)
    }

    fn auto_enhance(&self, request: &AutoEnhanceRequest) -> Result<EnhanceReply, RequestError> {
        self.post_json(AUTO_ENHANCE_ROUTE, request)
    }

    fn manual_enhance(
        &self,
        request: &ManualEnhanceRequest,
    ) -> Result<EnhanceReply, RequestError> {
        self.post_json(MANUAL_ENHANCE_ROUTE, request)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, RequestError> {
        let resp = self.client.get(url).send().map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RequestError::Transport(format!("HTTP {status} for {url}")));
        }
        Ok(resp.bytes().map_err(transport)?.to_vec())
    }
}

fn transport(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        RequestError::Transport("request timed out".to_string())
    } else {
        RequestError::Transport(err.to_string())
    }
}

fn decode_reply<T: DeserializeOwned>(resp: Response) -> Result<T, RequestError> {
    let ok = resp.status().is_success();
    let body = resp.bytes().map_err(transport)?;
    parse_reply(ok, &body)
}

/// Non-2xx bodies and 2xx bodies carrying `error` are server errors; anything
/// that is not JSON is a transport error.
pub(crate) fn parse_reply<T: DeserializeOwned>(ok: bool, body: &[u8]) -> Result<T, RequestError> {
    if !ok {
        return match serde_json::from_slice::<ErrorReply>(body) {
            Ok(reply) => Err(RequestError::Server(reply.error)),
            Err(err) => Err(RequestError::Transport(format!(
                "non-JSON error response: {err}"
            ))),
        };
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| RequestError::Transport(format!("non-JSON response: {err}")))?;
    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(RequestError::Server(Some(message.to_string())));
    }
    serde_json::from_value(value)
        .map_err(|err| RequestError::Transport(format!("unexpected response shape: {err}")))
}
