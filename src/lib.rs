pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod platforms;
pub mod poll;
pub mod publish;
pub mod selectors;

pub use browser::chrome::ChromeLauncher;
pub use config::PublishConfig;
pub use error::{PublishError, ValidationError};
pub use models::{Cookie, MediaItem, MediaKind, Note, PublishResult};
pub use publish::{PublishOrchestrator, PublishState};

/// Install `env_logger` for binaries embedding the publisher. Defaults to
/// `info`; `RUST_LOG` overrides. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Launch a dedicated Chrome and publish `note` with the given login cookies.
pub async fn publish_note(config: PublishConfig, note: Note, cookies: Vec<Cookie>) -> PublishResult {
    let launcher = ChromeLauncher::new(config.chrome.clone(), config.platform.home_url.clone());
    let orchestrator = PublishOrchestrator::new(launcher, config);
    let result = orchestrator.publish(&note, &cookies).await;
    log::info!(
        "[publish] result: {}",
        serde_json::to_string(&result).unwrap_or_else(|_| result.message.clone())
    );
    result
}
