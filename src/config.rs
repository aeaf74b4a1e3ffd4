use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub limits: Limits,
    pub timeouts: Timeouts,
    pub platform: PlatformUrls,
    pub chrome: ChromeOptions,
    /// Where failure screenshots are written. Defaults to the system temp dir.
    pub screenshot_dir: Option<PathBuf>,
}

impl PublishConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.screenshot_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_title_len: usize,
    pub max_body_len: usize,
    pub max_topics: usize,
    pub max_topic_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_title_len: 20,
            max_body_len: 1000,
            max_topics: 10,
            max_topic_len: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub page_load_settle_secs: u64,
    pub render_settle_secs: u64,
    pub mode_switch_settle_secs: u64,
    pub element_wait_secs: u64,
    pub editor_direct_wait_secs: u64,
    pub resolver_poll_ms: u64,
    pub focus_settle_ms: u64,
    pub focus_advance_settle_ms: u64,
    pub upload_start_delay_secs: u64,
    pub upload_poll_interval_secs: u64,
    pub upload_deadline_secs: u64,
    pub image_settle_secs: u64,
    pub content_settle_secs: u64,
    pub keystroke_settle_ms: u64,
    pub topic_marker_settle_ms: u64,
    pub suggestion_wait_ms: u64,
    pub topic_confirm_settle_ms: u64,
    pub submit_settle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_settle_secs: 5,
            render_settle_secs: 3,
            mode_switch_settle_secs: 2,
            element_wait_secs: 10,
            editor_direct_wait_secs: 2,
            resolver_poll_ms: 500,
            focus_settle_ms: 500,
            focus_advance_settle_ms: 800,
            upload_start_delay_secs: 3,
            upload_poll_interval_secs: 2,
            upload_deadline_secs: 120,
            image_settle_secs: 2,
            content_settle_secs: 2,
            keystroke_settle_ms: 100,
            topic_marker_settle_ms: 300,
            suggestion_wait_ms: 1500,
            topic_confirm_settle_ms: 500,
            submit_settle_secs: 3,
        }
    }
}

impl Timeouts {
    pub fn page_load_settle(&self) -> Duration {
        Duration::from_secs(self.page_load_settle_secs)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_secs(self.render_settle_secs)
    }

    pub fn mode_switch_settle(&self) -> Duration {
        Duration::from_secs(self.mode_switch_settle_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn editor_direct_wait(&self) -> Duration {
        Duration::from_secs(self.editor_direct_wait_secs)
    }

    pub fn resolver_poll(&self) -> Duration {
        Duration::from_millis(self.resolver_poll_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn focus_advance_settle(&self) -> Duration {
        Duration::from_millis(self.focus_advance_settle_ms)
    }

    pub fn upload_start_delay(&self) -> Duration {
        Duration::from_secs(self.upload_start_delay_secs)
    }

    pub fn upload_poll_interval(&self) -> Duration {
        Duration::from_secs(self.upload_poll_interval_secs)
    }

    pub fn upload_deadline(&self) -> Duration {
        Duration::from_secs(self.upload_deadline_secs)
    }

    pub fn image_settle(&self) -> Duration {
        Duration::from_secs(self.image_settle_secs)
    }

    pub fn content_settle(&self) -> Duration {
        Duration::from_secs(self.content_settle_secs)
    }

    pub fn keystroke_settle(&self) -> Duration {
        Duration::from_millis(self.keystroke_settle_ms)
    }

    pub fn topic_marker_settle(&self) -> Duration {
        Duration::from_millis(self.topic_marker_settle_ms)
    }

    pub fn suggestion_wait(&self) -> Duration {
        Duration::from_millis(self.suggestion_wait_ms)
    }

    pub fn topic_confirm_settle(&self) -> Duration {
        Duration::from_millis(self.topic_confirm_settle_ms)
    }

    pub fn submit_settle(&self) -> Duration {
        Duration::from_secs(self.submit_settle_secs)
    }
}

/// Where the authoring surface lives and how to recognise that we reached it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformUrls {
    pub home_url: String,
    pub publish_url: String,
    pub publish_path_marker: String,
    pub upload_success_text: String,
    pub image_tab_text: String,
    pub video_tab_text: String,
    pub active_tab_class: String,
}

impl Default for PlatformUrls {
    fn default() -> Self {
        Self {
            home_url: "https://creator.xiaohongshu.com".into(),
            publish_url: "https://creator.xiaohongshu.com/publish/publish?from=menu".into(),
            publish_path_marker: "publish".into(),
            upload_success_text: "上传成功".into(),
            image_tab_text: "上传图文".into(),
            video_tab_text: "上传视频".into(),
            active_tab_class: "active".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromeOptions {
    /// Explicit browser binary; detected from well-known locations when unset.
    pub executable: Option<PathBuf>,
    /// Profile directory; `~/.note-publisher/profile` when unset.
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub ready_timeout_secs: u64,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            executable: None,
            profile_dir: None,
            headless: false,
            window_width: 1280,
            window_height: 800,
            ready_timeout_secs: 30,
        }
    }
}
