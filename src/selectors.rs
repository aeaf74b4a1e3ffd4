use crate::browser::driver::{Key, PageDriver};
use crate::config::Timeouts;
use crate::error::{PublishError, PublishOutcome};
use crate::poll::poll_until;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Logical UI targets, independent of how they are located.
pub mod roles {
    pub const TITLE_INPUT: &str = "title-input";
    pub const CONTENT_EDITOR: &str = "content-editor";
    pub const SUBMIT_BUTTON: &str = "submit-button";
    pub const UPLOAD_INPUT: &str = "upload-input";
    pub const UPLOAD_SUCCESS: &str = "upload-success";
    pub const VIDEO_INFO: &str = "video-info";
    pub const MODE_TAB: &str = "mode-tab";
    pub const TOPIC_SUGGESTION: &str = "topic-suggestion";
    pub const TOPIC_ENTITY: &str = "topic-entity";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryEngine {
    /// Structural query over the document tree.
    XPath,
    /// Attribute/class query.
    Css,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorSpec {
    pub engine: QueryEngine,
    pub expression: String,
}

impl SelectorSpec {
    pub fn css(expression: impl Into<String>) -> Self {
        Self {
            engine: QueryEngine::Css,
            expression: expression.into(),
        }
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self {
            engine: QueryEngine::XPath,
            expression: expression.into(),
        }
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.engine {
            QueryEngine::Css => write!(f, "css:{}", self.expression),
            QueryEngine::XPath => write!(f, "xpath:{}", self.expression),
        }
    }
}

/// What to try once every direct candidate has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Focus the anchor role, press Tab and adopt the newly focused element
    /// if its tag differs from the anchor's.
    FocusOrder { anchor_role: String },
    /// Accept the first match even if it is not displayed.
    Attached(SelectorSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub candidates: Vec<SelectorSpec>,
    pub fallback: Option<Fallback>,
}

impl RoleSpec {
    pub fn new(candidates: Vec<SelectorSpec>) -> Self {
        Self {
            candidates,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: HashMap<String, RoleSpec>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: impl Into<String>, spec: RoleSpec) -> &mut Self {
        self.roles.insert(role.into(), spec);
        self
    }

    pub fn get(&self, role: &str) -> Option<&RoleSpec> {
        self.roles.get(role)
    }
}

/// Resolves roles against a live page. Borrows the page for one call at a
/// time and keeps nothing between calls.
pub struct SelectorResolver<'a, D: PageDriver> {
    driver: &'a D,
    registry: &'a RoleRegistry,
    timeouts: &'a Timeouts,
}

impl<'a, D: PageDriver> SelectorResolver<'a, D> {
    pub fn new(driver: &'a D, registry: &'a RoleRegistry, timeouts: &'a Timeouts) -> Self {
        Self {
            driver,
            registry,
            timeouts,
        }
    }

    /// Wait up to `timeout` for a direct candidate to become interactable,
    /// then try the role's fallback once.
    pub async fn resolve(&self, role: &str, timeout: Duration) -> PublishOutcome<D::Element> {
        let spec = self
            .registry
            .get(role)
            .ok_or_else(|| PublishError::not_found(role))?;

        let this = self;
        let found = poll_until(self.timeouts.resolver_poll(), timeout, move || {
            this.direct_pass(role, spec)
        })
        .await
        .into_option();
        if let Some(element) = found {
            return Ok(element);
        }

        match self.fallback(role, spec).await {
            Some(element) => Ok(element),
            None => {
                warn!(
                    "[resolve] {} not found after {} candidate(s) within {:?}",
                    role,
                    spec.candidates.len(),
                    timeout
                );
                Err(PublishError::not_found(role))
            }
        }
    }

    /// One non-waiting pass over the direct candidates.
    pub async fn find_now(&self, role: &str) -> Option<D::Element> {
        let spec = self.registry.get(role)?;
        self.direct_pass(role, spec).await
    }

    /// One direct pass and then the fallback, without waiting in between.
    /// Suits roles whose target is normally hidden, where polling the visible
    /// candidates would only burn the timeout.
    pub async fn find_now_or_fallback(&self, role: &str) -> Option<D::Element> {
        let spec = self.registry.get(role)?;
        match self.direct_pass(role, spec).await {
            Some(element) => Some(element),
            None => self.fallback(role, spec).await,
        }
    }

    /// First interactable match of `role` whose rendered text contains any of
    /// `needles`.
    pub async fn find_with_text(&self, role: &str, needles: &[&str]) -> Option<D::Element> {
        for element in self.find_all_visible(role).await {
            let text = match self.driver.text(&element).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("[resolve] {} text unreadable: {}", role, e);
                    continue;
                }
            };
            if needles.iter().any(|needle| text.contains(needle)) {
                return Some(element);
            }
        }
        None
    }

    /// Every interactable element matched by any candidate of `role`.
    pub async fn find_all_visible(&self, role: &str) -> Vec<D::Element> {
        let Some(spec) = self.registry.get(role) else {
            return Vec::new();
        };
        let mut visible = Vec::new();
        for candidate in &spec.candidates {
            let elements = match self.driver.query(candidate).await {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("[resolve] {} query {} failed: {}", role, candidate, e);
                    continue;
                }
            };
            for element in elements {
                if matches!(self.driver.is_interactable(&element).await, Ok(true)) {
                    visible.push(element);
                }
            }
        }
        visible
    }

    async fn direct_pass(&self, role: &str, spec: &RoleSpec) -> Option<D::Element> {
        for candidate in &spec.candidates {
            let elements = match self.driver.query(candidate).await {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("[resolve] {} query {} failed: {}", role, candidate, e);
                    continue;
                }
            };
            for element in elements {
                if matches!(self.driver.is_interactable(&element).await, Ok(true)) {
                    debug!("[resolve] {} matched {}", role, candidate);
                    return Some(element);
                }
            }
        }
        None
    }

    async fn fallback(&self, role: &str, spec: &RoleSpec) -> Option<D::Element> {
        match &spec.fallback {
            Some(Fallback::FocusOrder { anchor_role }) => {
                self.focus_order_fallback(role, anchor_role).await
            }
            Some(Fallback::Attached(query)) => self.first_attached(role, query).await,
            None => None,
        }
    }

    async fn first_attached(&self, role: &str, query: &SelectorSpec) -> Option<D::Element> {
        match self.driver.query(query).await {
            Ok(elements) => {
                let first = elements.into_iter().next();
                if first.is_some() {
                    info!("[resolve] {} matched hidden element via {}", role, query);
                }
                first
            }
            Err(e) => {
                debug!("[resolve] {} attached query {} failed: {}", role, query, e);
                None
            }
        }
    }

    async fn focus_order_fallback(&self, role: &str, anchor_role: &str) -> Option<D::Element> {
        info!(
            "[resolve] {} has no direct match, advancing focus from {}",
            role, anchor_role
        );
        let Some(anchor) = self.find_now(anchor_role).await else {
            warn!("[resolve] anchor {} not found, cannot advance focus", anchor_role);
            return None;
        };
        let anchor_tag = match self.driver.tag_name(&anchor).await {
            Ok(tag) => tag.to_ascii_lowercase(),
            Err(e) => {
                warn!("[resolve] cannot read anchor tag: {}", e);
                return None;
            }
        };
        if let Err(e) = self.driver.focus(&anchor).await {
            warn!("[resolve] cannot focus anchor {}: {}", anchor_role, e);
            return None;
        }
        tokio::time::sleep(self.timeouts.focus_settle()).await;

        for advance in 1..=2 {
            if let Err(e) = self.driver.press_key(Key::Tab).await {
                warn!("[resolve] focus advance failed: {}", e);
                return None;
            }
            let settle = if advance == 1 {
                self.timeouts.focus_advance_settle()
            } else {
                self.timeouts.focus_settle()
            };
            tokio::time::sleep(settle).await;

            let active = match self.driver.active_element().await {
                Ok(Some(active)) => active,
                Ok(None) => {
                    warn!("[resolve] nothing holds focus after advance {}", advance);
                    continue;
                }
                Err(e) => {
                    warn!("[resolve] cannot read focused element: {}", e);
                    continue;
                }
            };
            let tag = self
                .driver
                .tag_name(&active)
                .await
                .map(|tag| tag.to_ascii_lowercase())
                .unwrap_or_default();
            if !tag.is_empty() && tag != anchor_tag {
                info!(
                    "[resolve] {} adopted focused <{}> after {} advance(s)",
                    role, tag, advance
                );
                return Some(active);
            }
            warn!(
                "[resolve] focused <{}> looks like the anchor <{}>, advancing again",
                tag, anchor_tag
            );
        }
        None
    }
}
