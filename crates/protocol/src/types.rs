use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "awaiting_authorization")]
    AwaitingAuthorization,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "aborted")]
    Aborted,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "completed")]
    Completed,
}

impl SessionState {
    /// Returns `true` for the states a session can only leave via `retry()`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Failed | Self::Completed)
    }

    /// Returns `true` while a transfer is (or may be) in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Paused)
    }

    /// Stable lowercase name, same as the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAuthorization => "awaiting_authorization",
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the source data of an upload.
///
/// The session never reads the bytes itself; the transport resolves `path`
/// (or whatever the caller's transport understands) when it begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileRef {
    pub fn new(name: impl Into<String>, size_bytes: u64, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            content_type: content_type.into(),
            path: None,
        }
    }

    /// Builds a reference from a file on disk, guessing the content type
    /// from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = guess_content_type(&name).to_string();
        Ok(Self {
            name,
            size_bytes: metadata.len(),
            content_type,
            path: Some(path),
        })
    }
}

/// Maps common video/audio extensions to a MIME type.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Who can play back the uploaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    #[default]
    Public,
    Private,
}

/// Request to generate subtitles for the uploaded media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleDirective {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub language_code: String,
}

/// Media settings sent along with the authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPolicy {
    #[serde(default)]
    pub access_policy: AccessPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_subtitles: Option<SubtitleDirective>,
    #[serde(default)]
    pub optimize_audio: bool,
    #[serde(default = "default_max_resolution")]
    pub max_resolution: String,
}

fn default_max_resolution() -> String {
    "1080p".into()
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            access_policy: AccessPolicy::Public,
            create_subtitles: None,
            optimize_audio: true,
            max_resolution: default_max_resolution(),
        }
    }
}
