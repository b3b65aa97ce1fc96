use serde::Deserialize;

/// The merged, effective configuration, per §4.10. Every field has a
/// sensible default so a completely absent config still yields a usable
/// `AppConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub repos: Vec<String>,
    pub github_token: Option<String>,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub github_username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub stale_threshold: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            stale_threshold: "5m".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub exclude_bots: bool,
    pub exclude_authors: Vec<String>,
    pub bot_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jsonl,
    Json,
    Human,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jsonl
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_format: OutputFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub commit_implies_read: bool,
}
