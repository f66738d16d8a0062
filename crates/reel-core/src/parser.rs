use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, ErrorRecord};
use crate::model::AdResponse;

static ABSOLUTE_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S+$").unwrap());

/// Where the ad response comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AdSource {
    /// Fetched by the parser.
    Url(String),
    /// Inline response document.
    Document(String),
}

impl AdSource {
    /// Classify raw request input. Empty or whitespace-only input yields `None`.
    pub fn classify(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if ABSOLUTE_URI.is_match(trimmed) {
            Some(Self::Url(trimmed.to_string()))
        } else {
            Some(Self::Document(input.to_string()))
        }
    }
}

/// Options accepted by `AdsManager::request_ads`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Announced to interactive creatives as `videoSlotCanAutoPlay`.
    pub autoplay: bool,
    pub muted: bool,
    pub response_load_timeout_ms: u64,
    pub media_load_timeout_ms: u64,
    pub with_credentials: bool,
    pub wrapper_limit: u32,
    pub resolve_all: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            muted: true,
            response_load_timeout_ms: 23_000,
            media_load_timeout_ms: 8_000,
            with_credentials: false,
            wrapper_limit: 10,
            resolve_all: true,
        }
    }
}

impl RequestOptions {
    pub fn response_load_timeout(&self) -> Duration {
        Duration::from_millis(self.response_load_timeout_ms)
    }

    pub fn media_load_timeout(&self) -> Duration {
        Duration::from_millis(self.media_load_timeout_ms)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            timeout_ms: self.response_load_timeout_ms,
            with_credentials: self.with_credentials,
            wrapper_limit: self.wrapper_limit,
            resolve_all: self.resolve_all,
        }
    }
}

/// Subset of the request options the response parser cares about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    pub timeout_ms: u64,
    pub with_credentials: bool,
    pub wrapper_limit: u32,
    pub resolve_all: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ParseError {
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            Self::Network(cause) => ErrorRecord::new(ErrorKind::RequestFailed)
                .format_message(&[cause])
                .caused_by(cause.clone()),
            Self::Malformed(cause) => {
                ErrorRecord::new(ErrorKind::UnknownAdResponse).caused_by(cause.clone())
            }
        }
    }
}

/// Resolves an ad source into a parsed response (fetching and unwrapping
/// wrappers as needed).
#[async_trait]
pub trait ResponseParser: Send + Sync {
    async fn load(&self, source: AdSource, options: ParserOptions) -> Result<AdResponse, ParseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_urls() {
        assert_eq!(
            AdSource::classify("https://ads.example/vast.xml?x=1"),
            Some(AdSource::Url("https://ads.example/vast.xml?x=1".into()))
        );
        assert_eq!(
            AdSource::classify("  data:text/xml,abc "),
            Some(AdSource::Url("data:text/xml,abc".into()))
        );
    }

    #[test]
    fn classify_documents() {
        let xml = "<VAST version=\"3.0\"></VAST>";
        assert_eq!(AdSource::classify(xml), Some(AdSource::Document(xml.into())));
        assert!(matches!(
            AdSource::classify("not a url at all"),
            Some(AdSource::Document(_))
        ));
    }

    #[test]
    fn classify_empty_is_none() {
        assert_eq!(AdSource::classify(""), None);
        assert_eq!(AdSource::classify("   \n"), None);
    }

    #[test]
    fn request_option_defaults() {
        let opts = RequestOptions::default();
        assert!(opts.autoplay);
        assert!(opts.muted);
        assert_eq!(opts.response_load_timeout_ms, 23_000);
        assert_eq!(opts.media_load_timeout_ms, 8_000);
        assert!(!opts.with_credentials);
        assert_eq!(opts.wrapper_limit, 10);
        assert!(opts.resolve_all);
    }

    #[test]
    fn partial_options_deserialize() {
        let opts: RequestOptions = serde_json::from_str(r#"{"muted":false}"#).unwrap();
        assert!(!opts.muted);
        assert_eq!(opts.wrapper_limit, 10);
        assert_eq!(opts.parser_options().timeout_ms, 23_000);
    }

    #[test]
    fn network_error_formats_cause() {
        let rec = ParseError::Network("connection refused".into()).to_record();
        assert_eq!(rec.code(), 1012);
        assert_eq!(
            rec.message(),
            "Unable to request ads from server. Cause: connection refused."
        );
        let rec = ParseError::Malformed("bad xml".into()).to_record();
        assert_eq!(rec.kind(), ErrorKind::UnknownAdResponse);
        assert_eq!(rec.inner_cause(), Some("bad xml"));
    }
}
