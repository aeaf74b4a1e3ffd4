use super::PlatformInfo;
use crate::config::PlatformUrls;
use crate::selectors::{roles, Fallback, RoleRegistry, RoleSpec, SelectorSpec};

pub fn info() -> PlatformInfo {
    PlatformInfo {
        id: "xiaohongshu".into(),
        name: "小红书".into(),
        name_en: "Xiaohongshu".into(),
    }
}

fn css_all(expressions: &[&str]) -> Vec<SelectorSpec> {
    expressions.iter().map(|e| SelectorSpec::css(*e)).collect()
}

/// Role table for the creator-center publish page.
pub fn default_roles(platform: &PlatformUrls) -> RoleRegistry {
    let mut registry = RoleRegistry::new();

    registry.insert(
        roles::TITLE_INPUT,
        RoleSpec::new(css_all(&[
            ".d-text",
            "[placeholder*='标题']",
            "[placeholder*='title']",
            "input[type='text']",
            ".title-input",
            ".input",
        ])),
    );

    // The editor is frequently unreachable by query; Tab from the title lands in it.
    registry.insert(
        roles::CONTENT_EDITOR,
        RoleSpec::new(css_all(&[
            "[contenteditable='true']",
            ".ql-editor",
            "#post-textarea",
            ".c-input_textarea",
        ]))
        .with_fallback(Fallback::FocusOrder {
            anchor_role: roles::TITLE_INPUT.to_string(),
        }),
    );

    // File inputs are usually hidden behind a styled drop zone.
    registry.insert(
        roles::UPLOAD_INPUT,
        RoleSpec::new(css_all(&[
            ".upload-input",
            "input[type='file']",
            "[class*='upload'][type='file']",
            ".file-input",
            ".uploader-input",
            "[accept*='image']",
            "[accept*='video']",
        ]))
        .with_fallback(Fallback::Attached(SelectorSpec::xpath(
            "//input[@type='file']",
        ))),
    );

    let done = &platform.upload_success_text;
    registry.insert(
        roles::UPLOAD_SUCCESS,
        RoleSpec::new(vec![
            SelectorSpec::xpath(format!("//div[contains(text(), '{done}')]")),
            SelectorSpec::xpath(format!("//span[contains(text(), '{done}')]")),
            SelectorSpec::xpath(format!("//*[contains(text(), '{done}')]")),
        ]),
    );

    registry.insert(
        roles::VIDEO_INFO,
        RoleSpec::new(vec![SelectorSpec::xpath(
            "//div[contains(text(), '视频大小') or contains(text(), '视频时长')]",
        )]),
    );

    registry.insert(roles::MODE_TAB, RoleSpec::new(css_all(&[".creator-tab"])));

    // Panel containers only: converted entities in the editor carry `mention`
    // classes too and must not pass for an open panel.
    registry.insert(
        roles::TOPIC_SUGGESTION,
        RoleSpec::new(css_all(&[
            ".ql-mention-list-container",
            ".mention-list",
            ".topic-dropdown",
            ".suggestion-list",
            ".autocomplete-container",
            ".search-suggestions",
        ])),
    );

    registry.insert(
        roles::TOPIC_ENTITY,
        RoleSpec::new(css_all(&["a.mention[data-topic]", ".mention"])),
    );

    registry.insert(
        roles::SUBMIT_BUTTON,
        RoleSpec::new(vec![
            SelectorSpec::css(".publishBtn"),
            SelectorSpec::css("[class*='publish']"),
            SelectorSpec::css("button[type='submit']"),
            SelectorSpec::xpath("//button[contains(text(), '发布')]"),
            SelectorSpec::xpath("//button[contains(text(), '提交')]"),
            SelectorSpec::xpath("//button[.//span[contains(text(), '发布')]]"),
            SelectorSpec::xpath("//button[contains(., 'Publish')]"),
        ]),
    );

    registry
}
