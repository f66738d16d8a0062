use reel_core::parser::RequestOptions;
use serde::{Deserialize, Serialize};

/// Defaults applied to every `request_ads` call that does not pass its own
/// options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDefaults {
    pub autoplay: bool,
    pub muted: bool,
    pub response_load_timeout_ms: u64,
    pub media_load_timeout_ms: u64,
    pub with_credentials: bool,
    pub wrapper_limit: u32,
    pub resolve_all: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        let opts = RequestOptions::default();
        Self {
            autoplay: opts.autoplay,
            muted: opts.muted,
            response_load_timeout_ms: opts.response_load_timeout_ms,
            media_load_timeout_ms: opts.media_load_timeout_ms,
            with_credentials: opts.with_credentials,
            wrapper_limit: opts.wrapper_limit,
            resolve_all: opts.resolve_all,
        }
    }
}

impl RequestDefaults {
    pub fn to_request_options(&self) -> RequestOptions {
        RequestOptions {
            autoplay: self.autoplay,
            muted: self.muted,
            response_load_timeout_ms: self.response_load_timeout_ms,
            media_load_timeout_ms: self.media_load_timeout_ms,
            with_credentials: self.with_credentials,
            wrapper_limit: self.wrapper_limit,
            resolve_all: self.resolve_all,
        }
    }
}
