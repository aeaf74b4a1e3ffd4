pub mod content;
pub mod topics;
pub mod upload;

use crate::browser::driver::{BrowserSession, PageDriver, SessionLauncher};
use crate::config::PublishConfig;
use crate::error::{PublishError, PublishOutcome, ValidationError};
use crate::models::{has_kind, Cookie, MediaItem, MediaKind, Note, PublishResult};
use crate::platforms::xiaohongshu;
use crate::selectors::{roles, RoleRegistry, SelectorResolver};
use anyhow::anyhow;
use content::ContentInjector;
use log::{error, info, warn};
use std::path::PathBuf;
use topics::TopicTagger;
use upload::{retain_existing_media, UploadCoordinator};

/// Where a publish attempt currently stands. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PublishState {
    Init,
    SessionOpen,
    ModeSelected,
    Uploaded,
    ContentFilled,
    TopicsFilled,
    Submitted,
    Success,
    Failed,
}

impl PublishState {
    /// Step name reported when entering this state fails.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "validate",
            Self::SessionOpen => "open-session",
            Self::ModeSelected => "select-mode",
            Self::Uploaded => "upload",
            Self::ContentFilled => "fill-content",
            Self::TopicsFilled => "fill-topics",
            Self::Submitted => "submit",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Runs one publish attempt end to end against a freshly launched session.
pub struct PublishOrchestrator<L: SessionLauncher> {
    launcher: L,
    config: PublishConfig,
    roles: RoleRegistry,
}

impl<L: SessionLauncher> PublishOrchestrator<L> {
    pub fn new(launcher: L, config: PublishConfig) -> Self {
        let roles = xiaohongshu::default_roles(&config.platform);
        Self {
            launcher,
            config,
            roles,
        }
    }

    pub fn with_roles(mut self, roles: RoleRegistry) -> Self {
        self.roles = roles;
        self
    }

    pub async fn publish(&self, note: &Note, cookies: &[Cookie]) -> PublishResult {
        info!(
            "[publish] {} note \"{}\" ({} media, {} topics)",
            xiaohongshu::info().name,
            note.title,
            note.media.len(),
            note.topics.len()
        );

        if let Err(e) = note.validate(&self.config.limits) {
            warn!("[publish] rejected before launch: {}", e);
            return PublishResult::failed(PublishState::Init.as_str(), e.to_string());
        }
        let media = retain_existing_media(&note.media);
        if media.is_empty() {
            let e = ValidationError::NoMedia;
            warn!("[publish] rejected before launch: {}", e);
            return PublishResult::failed(PublishState::Init.as_str(), e.to_string());
        }

        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!("[publish] browser launch failed: {:#}", e);
                return PublishResult::failed(
                    PublishState::SessionOpen.as_str(),
                    format!("{:#}", e),
                );
            }
        };

        let mut state = PublishState::Init;
        let outcome = self.run(&session, note, &media, cookies, &mut state).await;

        let result = match outcome {
            Ok(final_url) => {
                info!("[publish] note submitted, landed on {}", final_url);
                PublishResult::succeeded("note published", final_url)
            }
            Err(e) => {
                error!("[publish] failed at {}: {}", state.as_str(), e);
                if state >= PublishState::Uploaded {
                    self.capture_failure(&session).await;
                }
                PublishResult::failed(state.as_str(), e.to_string())
            }
        };

        if let Err(e) = session.close().await {
            warn!("[publish] closing the browser failed: {:#}", e);
        }
        result
    }

    /// Drive the page through every state. `state` names the step being
    /// entered, so on error it is the step that failed.
    async fn run<S: BrowserSession>(
        &self,
        session: &S,
        note: &Note,
        media: &[MediaItem],
        cookies: &[Cookie],
        state: &mut PublishState,
    ) -> PublishOutcome<String> {
        let timeouts = &self.config.timeouts;
        let resolver = SelectorResolver::new(session, &self.roles, timeouts);

        *state = PublishState::SessionOpen;
        self.open_session(session, cookies).await?;

        *state = PublishState::ModeSelected;
        self.select_mode(session, &resolver, media).await;

        *state = PublishState::Uploaded;
        let upload_text = self.config.platform.upload_success_text.as_str();
        let uploaded = UploadCoordinator::new(session, &resolver, timeouts, upload_text)
            .upload(media)
            .await;
        info!("[publish] upload finished: {:?}", uploaded);

        *state = PublishState::ContentFilled;
        let injector = ContentInjector::new(session, &resolver, &self.config.limits, timeouts);
        if !injector.fill_title(&note.title).await? {
            return Err(PublishError::step(
                state.as_str(),
                anyhow!("title field stayed empty"),
            ));
        }
        if !injector.fill_body(&note.body).await? {
            return Err(PublishError::step(
                state.as_str(),
                anyhow!("content editor stayed empty"),
            ));
        }

        *state = PublishState::TopicsFilled;
        let tagger = TopicTagger::new(session, &resolver, timeouts);
        if !tagger.fill_topics(&note.topics).await {
            warn!("[publish] some topics could not be entered, continuing");
        }
        if !note.topics.is_empty() {
            let converted = tagger.current_topics().await;
            info!(
                "[publish] {}/{} topic(s) recognised: {:?}",
                converted.len(),
                note.topics.len(),
                converted
            );
        }

        *state = PublishState::Submitted;
        let final_url = self.submit(session, &resolver).await?;

        *state = PublishState::Success;
        Ok(final_url)
    }

    async fn open_session<S: BrowserSession>(
        &self,
        session: &S,
        cookies: &[Cookie],
    ) -> PublishOutcome<()> {
        let step = |e: anyhow::Error| PublishError::step(PublishState::SessionOpen.as_str(), e);
        let platform = &self.config.platform;

        session.navigate(&platform.home_url).await.map_err(step)?;
        if !cookies.is_empty() {
            session.set_cookies(cookies).await.map_err(step)?;
            info!("[session] installed {} cookie(s)", cookies.len());
        }
        session.navigate(&platform.publish_url).await.map_err(step)?;
        tokio::time::sleep(self.config.timeouts.page_load_settle()).await;

        let url = session.current_url().await.map_err(step)?;
        if !url.contains(&platform.publish_path_marker) {
            return Err(step(anyhow!(
                "expected the publish page but landed on {}; login cookies are likely missing or expired",
                url
            )));
        }
        tokio::time::sleep(self.config.timeouts.render_settle()).await;
        info!("[session] publish page ready: {}", url);
        Ok(())
    }

    /// Pick the image or video tab. Never fails the publish.
    async fn select_mode<S: BrowserSession>(
        &self,
        session: &S,
        resolver: &SelectorResolver<'_, S>,
        media: &[MediaItem],
    ) {
        let platform = &self.config.platform;
        let (wanted, video) = if has_kind(media, MediaKind::Image) {
            (&platform.image_tab_text, false)
        } else if has_kind(media, MediaKind::Video) {
            (&platform.video_tab_text, true)
        } else {
            return;
        };

        let mut target = None;
        for tab in resolver.find_all_visible(roles::MODE_TAB).await {
            let on_screen = matches!(
                session.bounding_box(&tab).await,
                Ok(Some(rect)) if rect.is_on_screen()
            );
            if !on_screen {
                continue;
            }
            if matches!(session.text(&tab).await, Ok(text) if text.contains(wanted.as_str())) {
                target = Some(tab);
                break;
            }
        }

        let Some(tab) = target else {
            warn!("[mode] no on-screen \"{}\" tab, assuming it is already selected", wanted);
            return;
        };
        if video {
            let class = session
                .attribute(&tab, "class")
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if class.contains(platform.active_tab_class.as_str()) {
                info!("[mode] already in video mode");
                return;
            }
        }
        match session.click(&tab).await {
            Ok(()) => {
                info!("[mode] switched to \"{}\"", wanted);
                tokio::time::sleep(self.config.timeouts.mode_switch_settle()).await;
            }
            Err(e) => warn!("[mode] clicking \"{}\" failed, continuing: {:#}", wanted, e),
        }
    }

    async fn submit<S: BrowserSession>(
        &self,
        session: &S,
        resolver: &SelectorResolver<'_, S>,
    ) -> PublishOutcome<String> {
        let step = |e: anyhow::Error| PublishError::step(PublishState::Submitted.as_str(), e);
        let button = resolver
            .resolve(roles::SUBMIT_BUTTON, self.config.timeouts.element_wait())
            .await?;
        session.click(&button).await.map_err(step)?;
        info!("[submit] publish button clicked");
        tokio::time::sleep(self.config.timeouts.submit_settle()).await;
        session.current_url().await.map_err(step)
    }

    async fn capture_failure<D: PageDriver>(&self, driver: &D) {
        let path = self.screenshot_path();
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("[publish] cannot create screenshot dir {}: {}", dir.display(), e);
                return;
            }
        }
        match driver.screenshot(&path).await {
            Ok(()) => info!("[publish] failure screenshot saved to {}", path.display()),
            Err(e) => warn!("[publish] failure screenshot failed: {:#}", e),
        }
    }

    fn screenshot_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.config
            .screenshot_dir()
            .join(format!("publish_error_{}.png", stamp))
    }
}
