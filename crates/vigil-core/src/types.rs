//! Request/response model for rendered-page fetches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single monitoring fetch to execute against an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// URL to load in the browser.
    pub endpoint: String,
    /// Upper bound on the navigation step, in milliseconds.
    pub request_timeout_ms: u64,
    /// Extra request headers applied to every request the page issues.
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

/// Closed failure taxonomy for a fetch.
///
/// `HttpCode` is only ever produced by the navigation success path when the
/// status is >= 400; every other kind comes out of the error classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpErrorKind {
    Connect,
    Timeout,
    Decode,
    Redirect,
    HttpCode,
    Unknown,
}

/// A captured page screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub content_type: String,
}

impl Screenshot {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            data,
            content_type: "image/jpeg".to_string(),
        }
    }
}

/// Everything observed while fetching a page.
///
/// `error` is set exactly when the fetch did not complete a full success
/// path; evidence fields populated before a late failure are preserved, so
/// `error` and a non-empty `http_code` or `screenshot` may coexist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpResponse {
    pub http_code: Option<u16>,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
    /// Wall-clock duration of the navigation step only, not of permit-wait.
    pub response_time_ms: u64,
    /// Remote IP the browser actually connected to.
    pub response_ip_address: Option<String>,
    /// All addresses resolved for the endpoint's hostname; falls back to
    /// `[response_ip_address]` when resolution fails independently.
    #[serde(default)]
    pub resolved_ip_addresses: Vec<String>,
    pub response_body_size_bytes: u64,
    /// Serialized rendered page content.
    #[serde(default, with = "opt_base64_bytes")]
    pub response_body_content: Option<Vec<u8>>,
    pub screenshot: Option<Screenshot>,
    pub error: Option<HttpErrorKind>,
    pub error_message: Option<String>,
}

impl HttpResponse {
    /// A response carrying nothing but a failure classification.
    pub fn from_error(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: Some(kind),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn set_error(&mut self, kind: HttpErrorKind, message: impl Into<String>) {
        self.error = Some(kind);
        self.error_message = Some(message.into());
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod opt_base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        data: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer
                .serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| base64::engine::general_purpose::STANDARD.decode(s))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
