use crate::browser::driver::PageDriver;
use crate::config::Timeouts;
use crate::models::{has_kind, MediaItem, MediaKind};
use crate::poll::{poll_until, PollOutcome};
use crate::selectors::{roles, SelectorResolver};
use log::{info, warn};
use std::time::Duration;

/// Keep only media that can actually be handed to a file input: absolute
/// paths to files that exist right now.
pub fn retain_existing_media(items: &[MediaItem]) -> Vec<MediaItem> {
    items
        .iter()
        .filter(|item| {
            if !item.path.is_absolute() {
                warn!("[upload] skipping relative path {}", item.path.display());
                return false;
            }
            if !item.path.is_file() {
                warn!("[upload] skipping missing file {}", item.path.display());
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No file input could be located; the flow carries on without media.
    Skipped,
    /// Images were handed over and the settle delay has passed.
    Settled,
    /// The platform reported the video upload as finished.
    Confirmed { elapsed: Duration },
    /// The success indicator never showed up before the deadline.
    TimedOut { elapsed: Duration },
    /// The page refused the files; the flow carries on regardless.
    Failed,
}

pub struct UploadCoordinator<'a, D: PageDriver> {
    driver: &'a D,
    resolver: &'a SelectorResolver<'a, D>,
    timeouts: &'a Timeouts,
    success_text: &'a str,
}

impl<'a, D: PageDriver> UploadCoordinator<'a, D> {
    /// `success_text` is the wording the platform shows once a video is in.
    pub fn new(
        driver: &'a D,
        resolver: &'a SelectorResolver<'a, D>,
        timeouts: &'a Timeouts,
        success_text: &'a str,
    ) -> Self {
        Self {
            driver,
            resolver,
            timeouts,
            success_text,
        }
    }

    /// Hand every media path to the page's file input in one go, then wait
    /// for the platform to accept it. Upload trouble is logged, never raised.
    pub async fn upload(&self, media: &[MediaItem]) -> UploadOutcome {
        let input = match self.resolver.find_now_or_fallback(roles::UPLOAD_INPUT).await {
            Some(input) => input,
            None => match self
                .resolver
                .resolve(roles::UPLOAD_INPUT, self.timeouts.element_wait())
                .await
            {
                Ok(input) => input,
                Err(e) => {
                    warn!("[upload] {}, continuing without upload", e);
                    return UploadOutcome::Skipped;
                }
            },
        };

        let paths: Vec<String> = media.iter().map(MediaItem::path_str).collect();
        info!("[upload] sending {} file(s)", paths.len());
        if let Err(e) = self.driver.set_input_files(&input, &paths).await {
            warn!("[upload] the page refused the files, continuing: {:#}", e);
            return UploadOutcome::Failed;
        }

        if has_kind(media, MediaKind::Video) {
            self.wait_for_video().await
        } else {
            tokio::time::sleep(self.timeouts.image_settle()).await;
            info!("[upload] images handed over");
            UploadOutcome::Settled
        }
    }

    async fn wait_for_video(&self) -> UploadOutcome {
        tokio::time::sleep(self.timeouts.upload_start_delay()).await;
        info!(
            "[upload] waiting up to {:?} for the video to finish uploading",
            self.timeouts.upload_deadline()
        );

        let resolver = self.resolver;
        let needles: &[&str] = &[self.success_text];
        let outcome = poll_until(
            self.timeouts.upload_poll_interval(),
            self.timeouts.upload_deadline(),
            move || resolver.find_with_text(roles::UPLOAD_SUCCESS, needles),
        )
        .await;

        let result = match outcome {
            PollOutcome::Ready { elapsed, .. } => {
                info!("[upload] video upload confirmed after {:?}", elapsed);
                UploadOutcome::Confirmed { elapsed }
            }
            PollOutcome::TimedOut { elapsed, attempts } => {
                warn!(
                    "[upload] no upload confirmation after {:?} ({} checks), continuing",
                    elapsed, attempts
                );
                UploadOutcome::TimedOut { elapsed }
            }
        };

        self.log_video_info().await;
        result
    }

    async fn log_video_info(&self) {
        for label in self.resolver.find_all_visible(roles::VIDEO_INFO).await {
            if let Ok(text) = self.driver.text(&label).await {
                info!("[upload] video info: {}", text.trim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeNode, FakePage, Op};
    use crate::config::PlatformUrls;
    use crate::platforms::xiaohongshu;
    use std::fs;
    use tokio::time::Instant;

    const SUCCESS_XPATH: &str = "//div[contains(text(), '上传成功')]";
    const SUCCESS_TEXT: &str = "上传成功";

    fn set_files(page: &FakePage) -> Vec<Vec<String>> {
        page.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::SetFiles(paths) => Some(paths),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn only_existing_absolute_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("cover.jpg");
        fs::write(&present, b"jpg").unwrap();

        let kept = retain_existing_media(&[
            MediaItem::image(&present),
            MediaItem::image(dir.path().join("missing.jpg")),
            MediaItem::image("relative/cover.jpg"),
        ]);
        assert_eq!(kept, vec![MediaItem::image(&present)]);
    }

    #[test]
    fn directories_are_not_media() {
        let dir = tempfile::tempdir().unwrap();
        assert!(retain_existing_media(&[MediaItem::image(dir.path())]).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn video_poll_gives_up_at_the_deadline() {
        let page = FakePage::new();
        page.add(FakeNode::new("input").matching(".upload-input"));
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let start = Instant::now();
        let outcome = uploader
            .upload(&[MediaItem::video("/videos/clip.mp4")])
            .await;

        assert_eq!(
            outcome,
            UploadOutcome::TimedOut {
                elapsed: Duration::from_secs(120)
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(123));
        assert_eq!(set_files(&page), vec![vec!["/videos/clip.mp4".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn video_poll_stops_once_the_indicator_shows() {
        let page = FakePage::new();
        page.add(FakeNode::new("input").matching(".upload-input"));
        page.add(
            FakeNode::new("div")
                .matching(SUCCESS_XPATH)
                .text("上传成功")
                .appearing_after(Duration::from_secs(10)),
        );
        page.add(
            FakeNode::new("div")
                .matching("//div[contains(text(), '视频大小') or contains(text(), '视频时长')]")
                .text("视频大小: 12MB"),
        );
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let outcome = uploader
            .upload(&[MediaItem::video("/videos/clip.mp4")])
            .await;

        // appears at t=10s; polls run at t=3,5,7,9,11
        assert_eq!(
            outcome,
            UploadOutcome::Confirmed {
                elapsed: Duration::from_secs(8)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn images_only_settle_briefly() {
        let page = FakePage::new();
        page.add(FakeNode::new("input").matching(".upload-input"));
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let start = Instant::now();
        let outcome = uploader
            .upload(&[MediaItem::image("/a.jpg"), MediaItem::image("/b.png")])
            .await;
        assert_eq!(outcome, UploadOutcome::Settled);
        assert_eq!(start.elapsed(), timeouts.image_settle());
        assert_eq!(
            set_files(&page),
            vec![vec!["/a.jpg".to_string(), "/b.png".to_string()]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_file_input_is_still_used() {
        let page = FakePage::new();
        page.add(
            FakeNode::new("input")
                .matching(".upload-input")
                .matching("//input[@type='file']")
                .hidden(),
        );
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let start = Instant::now();
        let outcome = uploader.upload(&[MediaItem::image("/a.jpg")]).await;
        assert_eq!(outcome, UploadOutcome::Settled);
        assert_eq!(set_files(&page).len(), 1);
        // no element wait before the attached input is used
        assert_eq!(start.elapsed(), timeouts.image_settle());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_input_is_not_fatal() {
        let page = FakePage::new();
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let outcome = uploader.upload(&[MediaItem::image("/a.jpg")]).await;
        assert_eq!(outcome, UploadOutcome::Skipped);
        assert!(set_files(&page).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_files_do_not_stop_the_flow() {
        let page = FakePage::new();
        page.add(FakeNode::new("input").matching(".upload-input"));
        page.fail_on("set_input_files");
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let outcome = uploader.upload(&[MediaItem::video("/videos/clip.mp4")]).await;
        assert_eq!(outcome, UploadOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn other_notices_do_not_confirm_the_video() {
        let page = FakePage::new();
        page.add(FakeNode::new("input").matching(".upload-input"));
        page.add(
            FakeNode::new("div")
                .matching(SUCCESS_XPATH)
                .matching("//*[contains(text(), '上传成功')]")
                .text("保存草稿成功"),
        );
        let registry = xiaohongshu::default_roles(&PlatformUrls::default());
        let timeouts = Timeouts::default();
        let resolver = SelectorResolver::new(&page, &registry, &timeouts);
        let uploader = UploadCoordinator::new(&page, &resolver, &timeouts, SUCCESS_TEXT);

        let outcome = uploader.upload(&[MediaItem::video("/videos/clip.mp4")]).await;
        assert_eq!(
            outcome,
            UploadOutcome::TimedOut {
                elapsed: Duration::from_secs(120)
            }
        );
    }
}
