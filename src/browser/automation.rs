use super::driver::{BrowserSession, Key, PageDriver, Rect};
use crate::models::Cookie;
use crate::selectors::{QueryEngine, SelectorSpec};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Child;
use tokio::task::JoinHandle;

const HANDLER_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

const JS_INTERACTABLE: &str = r#"function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    const shown = style.display !== 'none'
        && style.visibility !== 'hidden'
        && rect.width > 0
        && rect.height > 0;
    return shown && !this.disabled;
}"#;

const JS_TAG_NAME: &str = "function() { return (this.tagName || '').toLowerCase(); }";

const JS_VALUE: &str = r#"function() {
    if (typeof this.value === 'string') {
        return this.value;
    }
    return this.innerText || this.textContent || '';
}"#;

const JS_RECT: &str = r#"function() {
    const r = this.getBoundingClientRect();
    return { x: r.x, y: r.y, width: r.width, height: r.height };
}"#;

const JS_SELECT_ALL: &str = r#"function() {
    this.focus();
    if (typeof this.select === 'function') {
        this.select();
        return true;
    }
    const range = document.createRange();
    range.selectNodeContents(this);
    const sel = window.getSelection();
    sel.removeAllRanges();
    sel.addRange(range);
    return true;
}"#;

const JS_CARET_TO_END: &str = r#"function() {
    this.focus();
    if (typeof this.setSelectionRange === 'function' && typeof this.value === 'string') {
        const end = this.value.length;
        this.setSelectionRange(end, end);
        return true;
    }
    const range = document.createRange();
    range.selectNodeContents(this);
    range.collapse(false);
    const sel = window.getSelection();
    sel.removeAllRanges();
    sel.addRange(range);
    return true;
}"#;

#[derive(Debug, Deserialize)]
struct JsRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Connect to an already-running Chrome instance via CDP
pub async fn connect_to_chrome(port: u16) -> Result<(Browser, Page, JoinHandle<()>)> {
    let debug_url = format!("http://127.0.0.1:{}", port);

    let (browser, mut handler) = Browser::connect(&debug_url)
        .await
        .context(format!("Failed to connect to Chrome on port {}", port))?;

    // Spawn the handler to process CDP events
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("[cdp] handler event error: {}", e);
            }
        }
    });

    let pages = browser.pages().await.context("Failed to get pages")?;
    let page = match pages.into_iter().next() {
        Some(page) => page,
        None => browser
            .new_page("about:blank")
            .await
            .context("No pages found in Chrome and opening one failed")?,
    };

    info!("Connected to Chrome CDP on port {}", port);
    Ok((browser, page, handler_task))
}

/// A Chrome process we launched, plus the page we drive in it.
pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    child: Child,
}

impl CdpSession {
    pub fn new(browser: Browser, page: Page, handler_task: JoinHandle<()>, child: Child) -> Self {
        Self {
            browser,
            page,
            handler_task,
            child,
        }
    }

    async fn call(&self, element: &Element, function: &str) -> Result<serde_json::Value> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .context("Runtime.callFunctionOn failed")?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }

    async fn call_string(&self, element: &Element, function: &str) -> Result<String> {
        Ok(match self.call(element, function).await? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    async fn dispatch_key(
        &self,
        event: DispatchKeyEventType,
        key: &str,
        code: &str,
        vk: i64,
        text: Option<&str>,
    ) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(event)
            .key(key)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk);
        if let Some(text) = text {
            builder = builder.text(text).unmodified_text(text);
        }
        let params = builder.build().map_err(|e| anyhow!(e))?;
        self.page
            .execute(params)
            .await
            .with_context(|| format!("Input.dispatchKeyEvent {} failed", key))?;
        Ok(())
    }
}

fn cookie_param(cookie: &Cookie) -> Result<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone().unwrap_or_else(|| "/".to_string()));
    if let Some(secure) = cookie.secure {
        builder = builder.secure(secure);
    }
    if let Some(http_only) = cookie.http_only {
        builder = builder.http_only(http_only);
    }
    builder
        .build()
        .map_err(|e| anyhow!("invalid cookie {}: {}", cookie.name, e))
}

#[async_trait]
impl PageDriver for CdpSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("Failed to read page URL")?
            .unwrap_or_default())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        let params = cookies.iter().map(cookie_param).collect::<Result<Vec<_>>>()?;
        self.page
            .set_cookies(params)
            .await
            .context("Failed to set cookies")?;
        Ok(())
    }

    async fn query(&self, spec: &SelectorSpec) -> Result<Vec<Element>> {
        let found = match spec.engine {
            QueryEngine::Css => self.page.find_elements(spec.expression.as_str()).await,
            QueryEngine::XPath => self.page.find_xpaths(spec.expression.as_str()).await,
        };
        found.with_context(|| format!("query {} failed", spec))
    }

    async fn is_interactable(&self, element: &Element) -> Result<bool> {
        Ok(self.call(element, JS_INTERACTABLE).await?.as_bool().unwrap_or(false))
    }

    async fn tag_name(&self, element: &Element) -> Result<String> {
        self.call_string(element, JS_TAG_NAME).await
    }

    async fn text(&self, element: &Element) -> Result<String> {
        Ok(element
            .inner_text()
            .await
            .context("Failed to read element text")?
            .unwrap_or_default())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        element
            .attribute(name)
            .await
            .with_context(|| format!("Failed to read attribute {}", name))
    }

    async fn bounding_box(&self, element: &Element) -> Result<Option<Rect>> {
        let value = self.call(element, JS_RECT).await?;
        let rect: JsRect = serde_json::from_value(value).context("Unexpected rect shape")?;
        if rect.width <= 0.0 && rect.height <= 0.0 {
            return Ok(None);
        }
        Ok(Some(Rect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }))
    }

    async fn value(&self, element: &Element) -> Result<String> {
        self.call_string(element, JS_VALUE).await
    }

    async fn focus(&self, element: &Element) -> Result<()> {
        element.focus().await.context("Failed to focus element")?;
        Ok(())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await.context("Failed to click element")?;
        Ok(())
    }

    async fn active_element(&self) -> Result<Option<Element>> {
        match self.page.find_element(":focus").await {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                debug!("[cdp] no focused element: {}", e);
                Ok(None)
            }
        }
    }

    async fn press_key(&self, key: Key) -> Result<()> {
        let (name, code, vk, text) = key.definition();
        let down = if text.is_some() {
            DispatchKeyEventType::KeyDown
        } else {
            DispatchKeyEventType::RawKeyDown
        };
        self.dispatch_key(down, name, code, vk, text).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, name, code, vk, None)
            .await
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .context("Input.insertText failed")?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let s: &str = ch.encode_utf8(&mut buf);
            self.dispatch_key(DispatchKeyEventType::KeyDown, s, "", 0, Some(s))
                .await?;
            self.dispatch_key(DispatchKeyEventType::KeyUp, s, "", 0, None)
                .await?;
        }
        Ok(())
    }

    async fn select_all_and_delete(&self, element: &Element) -> Result<()> {
        self.call(element, JS_SELECT_ALL).await?;
        self.press_key(Key::Delete).await
    }

    async fn collapse_selection_to_end(&self, element: &Element) -> Result<()> {
        self.call(element, JS_CARET_TO_END).await?;
        Ok(())
    }

    async fn set_input_files(&self, element: &Element, paths: &[String]) -> Result<()> {
        let mut set_files = SetFileInputFilesParams::new(paths.to_vec());
        set_files.object_id = Some(element.remote_object_id.clone());
        self.page
            .execute(set_files)
            .await
            .context("Failed to set file via CDP")?;
        info!("File(s) set successfully: {:?}", paths);
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!("[Chrome close] Browser.close failed: {}", e);
        }
        if tokio::time::timeout(HANDLER_DRAIN_TIMEOUT, &mut self.handler_task)
            .await
            .is_err()
        {
            self.handler_task.abort();
        }

        let pid = self.child.id().unwrap_or_default();
        match self.child.try_wait() {
            Ok(Some(status)) => info!("[Chrome close] PID {} exited: {}", pid, status),
            _ => match self.child.kill().await {
                Ok(()) => info!("[Chrome close] PID {} killed", pid),
                Err(e) => warn!("[Chrome close] kill PID {} failed: {}", pid, e),
            },
        }
        Ok(())
    }
}
