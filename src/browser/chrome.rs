use super::automation::{connect_to_chrome, CdpSession};
use super::driver::SessionLauncher;
use crate::config::ChromeOptions;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::{Child, Command};

const DEBUG_PORT_START: u16 = 9300;
const DEBUG_PORT_END: u16 = 9800;
const READY_POLL_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct CdpTarget {
    #[serde(rename = "type")]
    target_type: String,
}

/// First port in the debugging range nothing on localhost is listening on.
/// The probe listener is released immediately, so Chrome can claim the port.
pub fn allocate_port() -> Result<u16> {
    (DEBUG_PORT_START..=DEBUG_PORT_END)
        .find(|&port| TcpListener::bind(("127.0.0.1", port)).is_ok())
        .ok_or_else(|| {
            anyhow!(
                "no free debugging port between {} and {}",
                DEBUG_PORT_START,
                DEBUG_PORT_END
            )
        })
}

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];
#[cfg(target_os = "macos")]
const PATH_NAMES: &[&str] = &["google-chrome", "chromium"];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];
#[cfg(target_os = "windows")]
const PATH_NAMES: &[&str] = &["chrome"];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PATH_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium-browser",
    "chromium",
];

/// Chrome executable for this machine: well-known install locations first,
/// then the usual binary names on `PATH`. `ChromeOptions::executable` skips
/// this lookup entirely.
pub fn detect_chrome() -> Result<PathBuf> {
    INSTALL_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .or_else(|| PATH_NAMES.iter().find_map(|name| which::which(name).ok()))
        .ok_or_else(|| {
            anyhow!(
                "no Chrome or Chromium found (looked in {:?} and for {:?} on PATH); set chrome.executable",
                INSTALL_PATHS,
                PATH_NAMES
            )
        })
}

/// Profile directory used when none is configured.
pub fn default_profile_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Cannot find home directory")?;
    Ok(home.join(".note-publisher").join("profile"))
}

/// Build the command line for a debuggable Chrome on `port`.
pub fn chrome_args(profile_dir: &Path, port: u16, url: &str, opts: &ChromeOptions) -> Vec<String> {
    let mut args = vec![
        format!("--user-data-dir={}", profile_dir.display()),
        format!("--remote-debugging-port={}", port),
        "--new-window".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-default-apps".to_string(),
        "--deny-permission-prompts".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        format!("--window-size={},{}", opts.window_width, opts.window_height),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
    }
    args.push(url.to_string());
    args
}

/// Spawn `program` tied to its handle: dropping the `Child` kills the process,
/// so a publish task that is cancelled or panics never leaves Chrome behind.
fn spawn_owned(program: &Path, args: &[String]) -> std::io::Result<Child> {
    Command::new(program).args(args).kill_on_drop(true).spawn()
}

/// Launch Chrome with a debugging port and return (Child, port)
pub fn launch_chrome_with_debug(
    chrome_path: &Path,
    profile_dir: &Path,
    url: &str,
    opts: &ChromeOptions,
) -> Result<(Child, u16)> {
    std::fs::create_dir_all(profile_dir).with_context(|| {
        format!("Failed to create profile dir {}", profile_dir.display())
    })?;
    let port = allocate_port()?;
    info!(
        "[Chrome launch] preparing profile={} port={} url={}",
        profile_dir.display(),
        port,
        url
    );

    let child = spawn_owned(chrome_path, &chrome_args(profile_dir, port, url, opts))
        .context("Failed to launch Chrome")?;

    info!(
        "Launched Chrome (PID: {}, port: {}) profile: {}",
        child.id().unwrap_or_default(),
        port,
        profile_dir.display()
    );
    Ok((child, port))
}

/// Wait until the debugging endpoint answers and exposes at least one page.
pub async fn wait_for_chrome_ready(port: u16, timeout_secs: u64) -> Result<()> {
    let start = tokio::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let version_url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            bail!(
                "CHROME_NOT_READY: Chrome was not ready within {} seconds (port {})",
                timeout_secs,
                port
            );
        }

        if let Ok(resp) = reqwest::get(&version_url).await {
            if resp.status().is_success() {
                match has_page_target(port).await {
                    Ok(true) => {
                        info!("Chrome is ready on port {} (version endpoint + page target ready)", port);
                        return Ok(());
                    }
                    Ok(false) => {
                        info!("Chrome version endpoint ready on port {}, waiting for page target...", port);
                    }
                    Err(e) => {
                        info!("Chrome version endpoint ready on port {}, page target check failed: {}", port, e);
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(READY_POLL_MS)).await;
    }
}

async fn has_page_target(port: u16) -> Result<bool> {
    let list_url = format!("http://127.0.0.1:{}/json/list", port);
    let resp = reqwest::get(&list_url)
        .await
        .context("Chrome json/list request failed")?;

    if !resp.status().is_success() {
        return Ok(false);
    }

    let body = resp.text().await.unwrap_or_default();
    Ok(page_target_present(&body))
}

fn page_target_present(list_body: &str) -> bool {
    let targets: Vec<CdpTarget> = serde_json::from_str(list_body).unwrap_or_default();
    targets.iter().any(|target| target.target_type == "page")
}

fn has_singleton_artifacts(profile_dir: &Path) -> bool {
    ["SingletonLock", "SingletonCookie", "SingletonSocket"]
        .iter()
        .any(|name| profile_dir.join(name).exists())
}

fn singleton_lock_pid(profile_dir: &Path) -> Option<u32> {
    let lock_path = profile_dir.join("SingletonLock");
    let target = std::fs::read_link(lock_path).ok()?;
    let name = target.file_name()?.to_string_lossy();
    let pid_part = name.rsplit('-').next()?;
    pid_part.parse::<u32>().ok()
}

#[cfg(unix)]
fn is_pid_running(pid: u32) -> bool {
    let pid_text = pid.to_string();
    let output = match std::process::Command::new("ps")
        .args(["-p", &pid_text, "-o", "pid="])
        .output()
    {
        Ok(output) => output,
        Err(_) => return false,
    };
    if !output.status.success() {
        return false;
    }
    !String::from_utf8_lossy(&output.stdout).trim().is_empty()
}

#[cfg(not(unix))]
fn is_pid_running(_pid: u32) -> bool {
    false
}

/// A profile still locked by a live Chrome would swallow our launch: the new
/// process hands its URL to the running one and exits without a debug port.
pub fn is_profile_busy(profile_dir: &Path) -> bool {
    if !has_singleton_artifacts(profile_dir) {
        return false;
    }

    match singleton_lock_pid(profile_dir) {
        Some(pid) => is_pid_running(pid),
        None => true,
    }
}

/// Launches a fresh, dedicated Chrome per publish attempt.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    options: ChromeOptions,
    start_url: String,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions, start_url: impl Into<String>) -> Self {
        Self {
            options,
            start_url: start_url.into(),
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = CdpSession;

    async fn launch(&self) -> Result<CdpSession> {
        let chrome_path = match &self.options.executable {
            Some(path) => path.clone(),
            None => detect_chrome()?,
        };
        let profile_dir = match &self.options.profile_dir {
            Some(dir) => dir.clone(),
            None => default_profile_dir()?,
        };
        if is_profile_busy(&profile_dir) {
            bail!(
                "PROFILE_BUSY: profile {} is held by another Chrome; close it and retry",
                profile_dir.display()
            );
        }

        let (mut child, port) =
            launch_chrome_with_debug(&chrome_path, &profile_dir, &self.start_url, &self.options)?;

        let attached = async {
            wait_for_chrome_ready(port, self.options.ready_timeout_secs).await?;
            connect_to_chrome(port).await
        }
        .await;

        match attached {
            Ok((browser, page, handler_task)) => {
                Ok(CdpSession::new(browser, page, handler_task, child))
            }
            Err(e) => {
                warn!(
                    "[Chrome launch] attach failed on port {}, killing PID {}",
                    port,
                    child.id().unwrap_or_default()
                );
                if let Err(kill_err) = child.kill().await {
                    warn!("[Chrome launch] kill failed: {}", kill_err);
                }
                Err(e)
            }
        }
    }
}
