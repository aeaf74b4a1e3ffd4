use super::PublishState;
use crate::browser::driver::{Key, PageDriver};
use crate::config::{Limits, Timeouts};
use crate::error::{PublishError, PublishOutcome};
use crate::models::{validate_body, validate_title};
use crate::selectors::{roles, SelectorResolver};
use log::{info, warn};

/// Drop control characters (line breaks included) and surrounding blanks.
pub fn clean_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Split a body into paragraphs on line breaks. Nothing is trimmed, so a
/// blank line survives as an empty paragraph. A literal backslash-n is read as
/// a line break and `\r\n` counts once.
pub fn split_paragraphs(body: &str) -> Vec<String> {
    body.replace("\\n", "\n")
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::to_string)
        .collect()
}

pub struct ContentInjector<'a, D: PageDriver> {
    driver: &'a D,
    resolver: &'a SelectorResolver<'a, D>,
    limits: &'a Limits,
    timeouts: &'a Timeouts,
}

fn step_err(e: anyhow::Error) -> PublishError {
    PublishError::step(PublishState::ContentFilled.as_str(), e)
}

impl<'a, D: PageDriver> ContentInjector<'a, D> {
    pub fn new(
        driver: &'a D,
        resolver: &'a SelectorResolver<'a, D>,
        limits: &'a Limits,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            driver,
            resolver,
            limits,
            timeouts,
        }
    }

    /// Replace the title field's content. `Ok(false)` means the field still
    /// reads empty afterwards.
    pub async fn fill_title(&self, title: &str) -> PublishOutcome<bool> {
        validate_title(title, self.limits)?;
        let cleaned = clean_title(title);

        let field = self
            .resolver
            .resolve(roles::TITLE_INPUT, self.timeouts.element_wait())
            .await?;
        self.driver.click(&field).await.map_err(step_err)?;
        self.driver
            .select_all_and_delete(&field)
            .await
            .map_err(step_err)?;
        self.driver.insert_text(&cleaned).await.map_err(step_err)?;
        tokio::time::sleep(self.timeouts.keystroke_settle()).await;

        let value = self.driver.value(&field).await.map_err(step_err)?;
        let filled = !value.trim().is_empty();
        if filled {
            info!("[content] title set ({} chars)", cleaned.chars().count());
        } else {
            warn!("[content] title field is still empty after input");
        }
        Ok(filled)
    }

    /// Replace the editor's content paragraph by paragraph, one hard break
    /// between neighbours.
    pub async fn fill_body(&self, body: &str) -> PublishOutcome<bool> {
        validate_body(body, self.limits)?;
        let paragraphs = split_paragraphs(body);

        let editor = self
            .resolver
            .resolve(roles::CONTENT_EDITOR, self.timeouts.editor_direct_wait())
            .await?;
        self.driver.focus(&editor).await.map_err(step_err)?;
        self.driver
            .select_all_and_delete(&editor)
            .await
            .map_err(step_err)?;

        let last = paragraphs.len().saturating_sub(1);
        for (index, paragraph) in paragraphs.iter().enumerate() {
            if !paragraph.is_empty() {
                self.driver.insert_text(paragraph).await.map_err(step_err)?;
            }
            if index < last {
                self.driver.press_key(Key::Enter).await.map_err(step_err)?;
            }
        }
        tokio::time::sleep(self.timeouts.content_settle()).await;

        let value = self.driver.value(&editor).await.map_err(step_err)?;
        let filled = !value.trim().is_empty();
        if filled {
            info!("[content] body set ({} paragraph(s))", paragraphs.len());
        } else {
            warn!("[content] editor is still empty after input");
        }
        Ok(filled)
    }
}
