use serde::{Deserialize, Serialize};

/// Mime type that marks a media file as an interactive (VPAID) package.
pub const INTERACTIVE_MIME_TYPE: &str = "application/javascript";

/// Parsed ad response handed over by the response parser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdResponse {
    #[serde(default)]
    pub ads: Vec<Ad>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    #[serde(default)]
    pub id: Option<String>,
    /// Pod ordering key. Ads without one play after every sequenced ad.
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub creatives: Vec<Creative>,
}

impl Ad {
    /// First creative this engine can play.
    pub fn first_linear(&self) -> Option<&Creative> {
        self.creatives.iter().find(|c| c.kind == CreativeKind::Linear)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreativeKind {
    Linear,
    NonLinear,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: CreativeKind,
    #[serde(default)]
    pub media_files: Vec<MediaVariant>,
    /// Opaque parameters forwarded to interactive creatives as `AdParameters`.
    #[serde(default)]
    pub ad_parameters: Option<String>,
    /// Declared duration in seconds, if the response carried one.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Creative {
    pub fn linear(media_files: Vec<MediaVariant>) -> Self {
        Self {
            id: None,
            kind: CreativeKind::Linear,
            media_files,
            ad_parameters: None,
            duration: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub mime_type: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub is_interactive: bool,
    pub source_url: String,
}

impl MediaVariant {
    pub fn new(mime_type: impl Into<String>, width: u32, height: u32, source_url: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let is_interactive = mime_type == INTERACTIVE_MIME_TYPE;
        Self {
            mime_type,
            width,
            height,
            is_interactive,
            source_url: source_url.into(),
        }
    }

    /// Interactive packages are always eligible regardless of codec support.
    pub fn is_interactive_package(&self) -> bool {
        self.is_interactive || self.mime_type == INTERACTIVE_MIME_TYPE
    }
}

/// Render size plus the host's view mode (`normal`, `fullscreen`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
    pub view_mode: String,
}

impl Default for RenderSize {
    fn default() -> Self {
        Self {
            width: 300,
            height: 154,
            view_mode: "normal".into(),
        }
    }
}
