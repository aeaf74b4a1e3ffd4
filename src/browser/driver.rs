use crate::models::Cookie;
use crate::selectors::SelectorSpec;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Keys the publish flow needs to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Delete,
}

impl Key {
    /// (key, code, windows virtual key code, text)
    pub fn definition(self) -> (&'static str, &'static str, i64, Option<&'static str>) {
        match self {
            Self::Tab => ("Tab", "Tab", 9, None),
            Self::Enter => ("Enter", "Enter", 13, Some("\r")),
            Self::Delete => ("Delete", "Delete", 46, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Rendered inside the viewport rather than parked off-screen.
    pub fn is_on_screen(&self) -> bool {
        self.x > 0.0 && self.y > 0.0
    }
}

/// Everything the publish flow does to the authoring page.
///
/// Implemented over CDP by [`super::automation::CdpSession`]; element handles
/// are only valid for the page that produced them.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// All elements currently matching `spec`, in document order.
    async fn query(&self, spec: &SelectorSpec) -> Result<Vec<Self::Element>>;
    /// Displayed (non-zero box, not hidden) and not disabled.
    async fn is_interactable(&self, element: &Self::Element) -> Result<bool>;
    async fn tag_name(&self, element: &Self::Element) -> Result<String>;
    async fn text(&self, element: &Self::Element) -> Result<String>;
    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;
    async fn bounding_box(&self, element: &Self::Element) -> Result<Option<Rect>>;
    /// `value` for form controls, rendered text otherwise.
    async fn value(&self, element: &Self::Element) -> Result<String>;

    async fn focus(&self, element: &Self::Element) -> Result<()>;
    async fn click(&self, element: &Self::Element) -> Result<()>;
    async fn active_element(&self) -> Result<Option<Self::Element>>;

    /// Press a key against whatever currently holds focus.
    async fn press_key(&self, key: Key) -> Result<()>;
    /// Insert text at the caret in one operation (no per-key events).
    async fn insert_text(&self, text: &str) -> Result<()>;
    /// Type text key by key so that page listeners observe each character.
    async fn type_text(&self, text: &str) -> Result<()>;
    /// Focus `element`, select all of its content and delete it.
    async fn select_all_and_delete(&self, element: &Self::Element) -> Result<()>;
    /// Move the caret to the very end of `element`'s content.
    async fn collapse_selection_to_end(&self, element: &Self::Element) -> Result<()>;

    async fn set_input_files(&self, element: &Self::Element, paths: &[String]) -> Result<()>;
    async fn screenshot(&self, path: &Path) -> Result<()>;
}

/// A page plus the browser process behind it.
#[async_trait]
pub trait BrowserSession: PageDriver + Sized {
    /// Terminate the browser. Called exactly once per session.
    async fn close(self) -> Result<()>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self) -> Result<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_screen_rects_are_rejected() {
        let on = Rect {
            x: 10.0,
            y: 5.0,
            width: 80.0,
            height: 30.0,
        };
        let parked = Rect { x: -9999.0, ..on };
        let top_edge = Rect { y: 0.0, ..on };
        assert!(on.is_on_screen());
        assert!(!parked.is_on_screen());
        assert!(!top_edge.is_on_screen());
    }

    #[test]
    fn enter_carries_carriage_return_text() {
        assert_eq!(Key::Enter.definition().3, Some("\r"));
        assert_eq!(Key::Tab.definition().2, 9);
    }
}
