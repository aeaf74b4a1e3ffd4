//! In-memory page used by the unit tests. Nodes match a selector when the
//! selector's expression is listed in their `selectors`.

use super::driver::{BrowserSession, Key, PageDriver, Rect, SessionLauncher};
use crate::models::Cookie;
use crate::selectors::SelectorSpec;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Navigate(String),
    SetCookies(usize),
    Focus(usize),
    Click(usize),
    Key(Key),
    InsertText(String),
    TypeText(String),
    SelectAllDelete(usize),
    CollapseToEnd(usize),
    SetFiles(Vec<String>),
    Screenshot(PathBuf),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeElement(pub usize);

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub tag: String,
    pub text: String,
    pub value: String,
    pub displayed: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub rect: Option<Rect>,
    pub selectors: Vec<String>,
    pub attributes: Vec<(String, String)>,
    appear_after: Option<Duration>,
    appears_at: Option<Instant>,
}

impl FakeNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: String::new(),
            value: String::new(),
            displayed: true,
            enabled: true,
            focusable: false,
            rect: Some(Rect {
                x: 10.0,
                y: 10.0,
                width: 100.0,
                height: 30.0,
            }),
            selectors: Vec::new(),
            attributes: Vec::new(),
            appear_after: None,
            appears_at: None,
        }
    }

    pub fn matching(mut self, expression: &str) -> Self {
        self.selectors.push(expression.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn focusable(mut self) -> Self {
        self.focusable = true;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.rect = Some(Rect {
            x,
            y,
            width: 100.0,
            height: 30.0,
        });
        self
    }

    /// Stay invisible until `delay` after the node is added to a page.
    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appear_after = Some(delay);
        self
    }

    fn visible_now(&self) -> bool {
        self.displayed && self.appears_at.map_or(true, |at| Instant::now() >= at)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    nodes: Vec<FakeNode>,
    ops: Vec<Op>,
    focused: Option<usize>,
    url: String,
    landing_url: Option<String>,
    failing: HashSet<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, mut node: FakeNode) -> FakeElement {
        node.appears_at = node.appear_after.map(|delay| Instant::now() + delay);
        let mut state = self.lock();
        state.nodes.push(node);
        FakeElement(state.nodes.len() - 1)
    }

    pub fn node(&self, element: FakeElement) -> FakeNode {
        self.lock().nodes[element.0].clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    /// Every navigation ends up at `url`, as when the site bounces to login.
    pub fn land_on(&self, url: &str) {
        self.lock().landing_url = Some(url.to_string());
    }

    /// Make the named driver call fail from now on.
    pub fn fail_on(&self, call: &'static str) {
        self.lock().failing.insert(call);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: &'static str, op: Option<Op>) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        if state.failing.contains(call) {
            bail!("injected {} failure", call);
        }
        if let Some(op) = op {
            state.ops.push(op);
        }
        Ok(state)
    }
}

fn append_to_focused(state: &mut FakeState, text: &str) {
    if let Some(index) = state.focused {
        state.nodes[index].value.push_str(text);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.record("navigate", Some(Op::Navigate(url.to_string())))?;
        let landed = state.landing_url.clone().unwrap_or_else(|| url.to_string());
        state.url = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.record("current_url", None)?.url.clone())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        drop(self.record("set_cookies", Some(Op::SetCookies(cookies.len())))?);
        Ok(())
    }

    async fn query(&self, spec: &SelectorSpec) -> Result<Vec<FakeElement>> {
        let state = self.record("query", None)?;
        Ok(state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.selectors.iter().any(|s| *s == spec.expression))
            .map(|(index, _)| FakeElement(index))
            .collect())
    }

    async fn is_interactable(&self, element: &FakeElement) -> Result<bool> {
        let state = self.record("is_interactable", None)?;
        let node = &state.nodes[element.0];
        Ok(node.visible_now() && node.enabled)
    }

    async fn tag_name(&self, element: &FakeElement) -> Result<String> {
        Ok(self.record("tag_name", None)?.nodes[element.0].tag.clone())
    }

    async fn text(&self, element: &FakeElement) -> Result<String> {
        Ok(self.record("text", None)?.nodes[element.0].text.clone())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> Result<Option<String>> {
        let state = self.record("attribute", None)?;
        Ok(state.nodes[element.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone()))
    }

    async fn bounding_box(&self, element: &FakeElement) -> Result<Option<Rect>> {
        Ok(self.record("bounding_box", None)?.nodes[element.0].rect)
    }

    async fn value(&self, element: &FakeElement) -> Result<String> {
        Ok(self.record("value", None)?.nodes[element.0].value.clone())
    }

    async fn focus(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.record("focus", Some(Op::Focus(element.0)))?;
        state.focused = Some(element.0);
        Ok(())
    }

    async fn click(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.record("click", Some(Op::Click(element.0)))?;
        if !state.nodes[element.0].visible_now() {
            return Err(anyhow!("element is not visible"));
        }
        state.focused = Some(element.0);
        Ok(())
    }

    async fn active_element(&self) -> Result<Option<FakeElement>> {
        Ok(self.record("active_element", None)?.focused.map(FakeElement))
    }

    async fn press_key(&self, key: Key) -> Result<()> {
        let mut state = self.record("press_key", Some(Op::Key(key)))?;
        match key {
            Key::Tab => {
                let start = state.focused.map_or(0, |index| index + 1);
                let next = (start..state.nodes.len())
                    .find(|&index| state.nodes[index].focusable && state.nodes[index].visible_now());
                if next.is_some() {
                    state.focused = next;
                }
            }
            Key::Enter => append_to_focused(&mut state, "\n"),
            Key::Delete => {}
        }
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        let mut state = self.record("insert_text", Some(Op::InsertText(text.to_string())))?;
        append_to_focused(&mut state, text);
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let mut state = self.record("type_text", Some(Op::TypeText(text.to_string())))?;
        append_to_focused(&mut state, text);
        Ok(())
    }

    async fn select_all_and_delete(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.record("select_all_and_delete", Some(Op::SelectAllDelete(element.0)))?;
        state.focused = Some(element.0);
        state.nodes[element.0].value.clear();
        Ok(())
    }

    async fn collapse_selection_to_end(&self, element: &FakeElement) -> Result<()> {
        let mut state = self.record("collapse_selection_to_end", Some(Op::CollapseToEnd(element.0)))?;
        state.focused = Some(element.0);
        Ok(())
    }

    async fn set_input_files(&self, _element: &FakeElement, paths: &[String]) -> Result<()> {
        drop(self.record("set_input_files", Some(Op::SetFiles(paths.to_vec())))?);
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        drop(self.record("screenshot", Some(Op::Screenshot(path.to_path_buf())))?);
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FakePage {
    async fn close(self) -> Result<()> {
        self.lock().ops.push(Op::Close);
        Ok(())
    }
}

/// Hands out the same page every launch and counts launches.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    pub page: FakePage,
    launches: Arc<AtomicUsize>,
    refuse: bool,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    type Session = FakePage;

    async fn launch(&self) -> Result<FakePage> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            bail!("Could not find Chrome browser");
        }
        Ok(self.page.clone())
    }
}
