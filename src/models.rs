use crate::config::Limits;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Image,
        }
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Video,
        }
    }

    /// Infer the kind from the file extension; anything that is not a known
    /// video container is treated as an image.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        Self {
            kind: if is_video {
                MediaKind::Video
            } else {
                MediaKind::Image
            },
            path,
        }
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

impl Note {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_media(mut self, media: Vec<MediaItem>) -> Self {
        self.media = media;
        self
    }

    pub fn has_images(&self) -> bool {
        has_kind(&self.media, MediaKind::Image)
    }

    pub fn has_videos(&self) -> bool {
        has_kind(&self.media, MediaKind::Video)
    }

    /// Enforce every content limit. Runs before a browser is launched.
    pub fn validate(&self, limits: &Limits) -> Result<(), ValidationError> {
        validate_title(&self.title, limits)?;
        validate_body(&self.body, limits)?;
        validate_topics(&self.topics, limits)
    }
}

pub fn has_kind(media: &[MediaItem], kind: MediaKind) -> bool {
    media.iter().any(|item| item.kind == kind)
}

pub fn validate_title(title: &str, limits: &Limits) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "title" });
    }
    if trimmed.chars().count() > limits.max_title_len {
        return Err(ValidationError::TooLong {
            field: "title",
            limit: limits.max_title_len,
        });
    }
    Ok(())
}

pub fn validate_body(body: &str, limits: &Limits) -> Result<(), ValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "body" });
    }
    if trimmed.chars().count() > limits.max_body_len {
        return Err(ValidationError::TooLong {
            field: "body",
            limit: limits.max_body_len,
        });
    }
    Ok(())
}

pub fn validate_topics(topics: &[String], limits: &Limits) -> Result<(), ValidationError> {
    if topics.len() > limits.max_topics {
        return Err(ValidationError::TooMany {
            field: "topics",
            limit: limits.max_topics,
        });
    }
    if topics
        .iter()
        .any(|topic| topic.chars().count() > limits.max_topic_len)
    {
        return Err(ValidationError::TooLong {
            field: "topic",
            limit: limits.max_topic_len,
        });
    }
    Ok(())
}

/// One cookie as stored by the credential collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default, alias = "httpOnly")]
    pub http_only: Option<bool>,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: None,
            secure: None,
            http_only: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub success: bool,
    pub message: String,
    pub final_url: Option<String>,
    pub failing_step: Option<String>,
}

impl PublishResult {
    pub fn succeeded(message: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            final_url: Some(final_url.into()),
            failing_step: None,
        }
    }

    pub fn failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            final_url: None,
            failing_step: Some(step.into()),
        }
    }
}
