pub mod xiaohongshu;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub id: String,
    pub name: String,
    pub name_en: String,
}
