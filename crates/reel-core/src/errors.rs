use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\d+)\}").unwrap());

/// Failure taxonomy surfaced through the `Error` event.
/// Codes follow the VAST/IMA numbering the host integrations expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyResponse,
    AssetNotFound,
    LinearAssetMismatch,
    ResponseLoadTimeout,
    MediaLoadTimeout,
    PlaybackError,
    InteractiveCreativeError,
    RequestInputInvalid,
    RequestFailed,
    UnknownAdResponse,
    NonLinearUnsupported,
}

impl ErrorKind {
    pub fn code(self) -> u32 {
        match self {
            Self::EmptyResponse => 1009,
            Self::AssetNotFound => 1007,
            Self::LinearAssetMismatch => 403,
            Self::ResponseLoadTimeout => 301,
            Self::MediaLoadTimeout => 402,
            Self::PlaybackError => 400,
            Self::InteractiveCreativeError => 901,
            Self::RequestInputInvalid => 1005,
            Self::RequestFailed => 1012,
            Self::UnknownAdResponse => 1010,
            Self::NonLinearUnsupported => 500,
        }
    }

    /// Default message template. May contain `{0}`-style placeholders.
    pub fn default_message(self) -> &'static str {
        match self {
            Self::EmptyResponse => "The VAST response document is empty.",
            Self::AssetNotFound => "No assets were found in the VAST ad response.",
            Self::LinearAssetMismatch => {
                "Linear assets were found in the VAST ad response, but none of them matched the player's capabilities."
            }
            Self::ResponseLoadTimeout => "Ad request reached a timeout.",
            Self::MediaLoadTimeout => "VAST media file loading reached a timeout of {0} seconds.",
            Self::PlaybackError => "There was an error playing the video ad.",
            Self::InteractiveCreativeError => {
                "An unexpected error occurred within the VPAID creative. Refer to the inner error for more info."
            }
            Self::RequestInputInvalid => "The ad request input is empty or malformed.",
            Self::RequestFailed => "Unable to request ads from server. Cause: {0}.",
            Self::UnknownAdResponse => "The ad response was not understood and cannot be parsed.",
            Self::NonLinearUnsupported => "Non-linear creatives are not supported.",
        }
    }

    /// Short classification string for logging/metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::AssetNotFound => "asset_not_found",
            Self::LinearAssetMismatch => "linear_asset_mismatch",
            Self::ResponseLoadTimeout => "response_load_timeout",
            Self::MediaLoadTimeout => "media_load_timeout",
            Self::PlaybackError => "playback_error",
            Self::InteractiveCreativeError => "interactive_creative_error",
            Self::RequestInputInvalid => "request_input_invalid",
            Self::RequestFailed => "request_failed",
            Self::UnknownAdResponse => "unknown_ad_response",
            Self::NonLinearUnsupported => "non_linear_unsupported",
        }
    }
}

/// Immutable error value delivered with `AdEvent::Error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    kind: ErrorKind,
    code: u32,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inner_cause: Option<String>,
}

impl ErrorRecord {
    /// Record with the kind's default message.
    pub fn new(kind: ErrorKind) -> Self {
        Self::with_message(kind, kind.default_message())
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            inner_cause: None,
        }
    }

    /// Copy of this record carrying an inner cause.
    pub fn caused_by(&self, cause: impl Into<String>) -> Self {
        Self {
            inner_cause: Some(cause.into()),
            ..self.clone()
        }
    }

    /// New record with `{n}` placeholders replaced by `values[n]`.
    /// Placeholders without a matching value are left untouched.
    pub fn format_message<T: fmt::Display>(&self, values: &[T]) -> Self {
        let message = PLACEHOLDER
            .replace_all(&self.message, |caps: &regex::Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| values.get(i))
                    .map_or_else(|| caps[0].to_string(), ToString::to_string)
            })
            .into_owned();
        Self {
            message,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn inner_cause(&self) -> Option<&str> {
        self.inner_cause.as_deref()
    }
}

impl From<ErrorKind> for ErrorRecord {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdError {}: {}", self.code, self.message)?;
        if let Some(cause) = &self.inner_cause {
            write!(f, " Caused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorRecord {}
