use crate::browser::driver::{Key, PageDriver};
use crate::config::Timeouts;
use crate::poll::poll_until;
use crate::selectors::{roles, SelectorResolver};
use anyhow::Result;
use log::{debug, info, warn};

const TOPIC_MARKER: char = '#';
const TOPIC_SUFFIX: &str = "[话题]";

/// Strip the leading tag marker and surrounding blanks from a requested topic.
pub fn strip_marker(topic: &str) -> &str {
    topic.trim().trim_start_matches(TOPIC_MARKER).trim()
}

/// Turn a rendered topic entity such as `#旅行[话题]#` back into `旅行`.
pub fn strip_decoration(text: &str) -> String {
    let text = text.trim().trim_start_matches(TOPIC_MARKER);
    let text = text.trim_end_matches(TOPIC_MARKER);
    text.strip_suffix(TOPIC_SUFFIX).unwrap_or(text).trim().to_string()
}

fn topic_name_from_data(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let name = value.get("name")?.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Types topics at the end of the editor and lets the page's autocomplete turn
/// them into topic entities. Never fails the publish.
pub struct TopicTagger<'a, D: PageDriver> {
    driver: &'a D,
    resolver: &'a SelectorResolver<'a, D>,
    timeouts: &'a Timeouts,
}

impl<'a, D: PageDriver> TopicTagger<'a, D> {
    pub fn new(
        driver: &'a D,
        resolver: &'a SelectorResolver<'a, D>,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            driver,
            resolver,
            timeouts,
        }
    }

    /// `true` when every non-empty topic was entered without a driver error.
    pub async fn fill_topics(&self, topics: &[String]) -> bool {
        if topics.is_empty() {
            return true;
        }

        let editor = match self
            .resolver
            .resolve(roles::CONTENT_EDITOR, self.timeouts.editor_direct_wait())
            .await
        {
            Ok(editor) => editor,
            Err(e) => {
                warn!("[topics] editor unavailable, skipping topics: {}", e);
                return false;
            }
        };
        if let Err(e) = self.open_topic_line(&editor).await {
            warn!("[topics] cannot place caret after body: {:#}", e);
            return false;
        }

        let mut all_entered = true;
        for topic in topics {
            let name = strip_marker(topic);
            if name.is_empty() {
                debug!("[topics] skipping blank topic {:?}", topic);
                continue;
            }
            match self.enter_topic(name).await {
                Ok(()) => info!("[topics] entered #{}", name),
                Err(e) => {
                    warn!("[topics] failed to enter #{}: {:#}", name, e);
                    all_entered = false;
                }
            }
        }
        all_entered
    }

    /// Topic names the editor currently holds as entities, in order, without
    /// duplicates.
    pub async fn current_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entity in self.resolver.find_all_visible(roles::TOPIC_ENTITY).await {
            let from_data = match self.driver.attribute(&entity, "data-topic").await {
                Ok(Some(raw)) => topic_name_from_data(&raw),
                _ => None,
            };
            let name = match from_data {
                Some(name) => name,
                None => match self.driver.text(&entity).await {
                    Ok(text) => strip_decoration(&text),
                    Err(_) => continue,
                },
            };
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    async fn open_topic_line(&self, editor: &D::Element) -> Result<()> {
        self.driver.collapse_selection_to_end(editor).await?;
        self.driver.press_key(Key::Enter).await?;
        self.driver.press_key(Key::Enter).await?;
        Ok(())
    }

    async fn enter_topic(&self, name: &str) -> Result<()> {
        self.driver.type_text(&TOPIC_MARKER.to_string()).await?;
        tokio::time::sleep(self.timeouts.topic_marker_settle()).await;
        self.driver.type_text(name).await?;

        // a panel left over from the previous topic must not count
        let resolver = self.resolver;
        let needles: &[&str] = &[name];
        let panel = poll_until(
            self.timeouts.resolver_poll(),
            self.timeouts.suggestion_wait(),
            move || resolver.find_with_text(roles::TOPIC_SUGGESTION, needles),
        )
        .await;
        if !panel.is_ready() {
            debug!("[topics] no suggestion panel for #{}, confirming anyway", name);
        }

        self.driver.press_key(Key::Enter).await?;
        tokio::time::sleep(self.timeouts.topic_confirm_settle()).await;
        Ok(())
    }
}
