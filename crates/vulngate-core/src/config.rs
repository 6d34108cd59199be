use crate::artifacts::{ArtifactPaths, ChecksumPins, CLASSIFIER_FILE, ENCODER_FILE, VECTORIZER_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up at the repository root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = ".vulngate.toml";

/// Environment variable overriding `artifacts.dir`.
pub const MODELS_DIR_ENV: &str = "VULNGATE_MODELS_DIR";

/// Gate configuration loaded from `.vulngate.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GateConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScanSettings {
    /// Extra glob patterns, matched against root-relative paths, to skip
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSettings {
    /// Models directory; relative paths resolve against the repository root
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,

    #[serde(default = "default_vectorizer_file")]
    pub vectorizer_file: String,

    #[serde(default = "default_encoder_file")]
    pub encoder_file: String,

    /// Value written to the extension column when the encoder does not
    /// know a file's extension
    #[serde(default)]
    pub unknown_extension_code: f64,

    #[serde(default)]
    pub sha256: ChecksumPins,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            classifier_file: default_classifier_file(),
            vectorizer_file: default_vectorizer_file(),
            encoder_file: default_encoder_file(),
            unknown_extension_code: 0.0,
            sha256: ChecksumPins::default(),
        }
    }
}

impl ArtifactSettings {
    /// Models directory resolved against `root`.
    pub fn models_dir(&self, root: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            root.join(&self.dir)
        }
    }

    pub fn paths(&self, root: &Path) -> ArtifactPaths {
        let dir = self.models_dir(root);
        ArtifactPaths {
            classifier: dir.join(&self.classifier_file),
            vectorizer: dir.join(&self.vectorizer_file),
            encoder: dir.join(&self.encoder_file),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifySettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Telegram `parse_mode`; unset sends plain text.
    #[serde(default)]
    pub parse_mode: Option<String>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            parse_mode: None,
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_classifier_file() -> String {
    CLASSIFIER_FILE.to_string()
}

fn default_vectorizer_file() -> String {
    VECTORIZER_FILE.to_string()
}

fn default_encoder_file() -> String {
    ENCODER_FILE.to_string()
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl GateConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: GateConfig = toml::from_str(content)?;
        if !config.artifacts.unknown_extension_code.is_finite() {
            anyhow::bail!("artifacts.unknown_extension_code must be a finite number");
        }
        Ok(config)
    }

    /// Load configuration from a TOML file that must exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    /// Load `<root>/.vulngate.toml` if present, defaults otherwise.
    pub fn discover(root: &Path) -> anyhow::Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!(config = %path.display(), "using repository config");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides (env takes precedence over the file).
    pub fn merge_with_env(self) -> Self {
        self.merge_with(|key| std::env::var(key).ok())
    }

    fn merge_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(MODELS_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.artifacts.dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_yields_defaults() {
        let config = GateConfig::from_toml("").unwrap();
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.artifacts.dir, PathBuf::from("models"));
        assert_eq!(config.artifacts.unknown_extension_code, 0.0);
        assert_eq!(config.notify.parse_mode, None);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[scan]
exclude = ["vendor/**", "third_party"]

[artifacts]
dir = "ml/artifacts"
unknown_extension_code = -1.0

[artifacts.sha256]
classifier = "abcd"

[notify]
api_base = "http://localhost:8081"
parse_mode = "MarkdownV2"
"#;
        let config = GateConfig::from_toml(toml).unwrap();
        assert_eq!(config.scan.exclude.len(), 2);
        assert_eq!(config.artifacts.unknown_extension_code, -1.0);
        assert_eq!(config.artifacts.sha256.classifier.as_deref(), Some("abcd"));
        assert_eq!(config.notify.api_base, "http://localhost:8081");
        assert_eq!(config.notify.parse_mode.as_deref(), Some("MarkdownV2"));

        let paths = config.artifacts.paths(Path::new("/repo"));
        assert_eq!(
            paths.classifier,
            PathBuf::from("/repo/ml/artifacts/vulnerability_detector.json")
        );
    }

    #[test]
    fn test_absolute_models_dir_is_kept() {
        let settings = ArtifactSettings {
            dir: PathBuf::from("/opt/models"),
            ..Default::default()
        };
        assert_eq!(settings.models_dir(Path::new("/repo")), PathBuf::from("/opt/models"));
    }

    #[test]
    fn test_unknown_field_type_is_error() {
        assert!(GateConfig::from_toml("[artifacts]\nunknown_extension_code = \"zero\"").is_err());
    }

    #[test]
    fn test_env_override_models_dir() {
        let config = GateConfig::default().merge_with(|key| {
            (key == MODELS_DIR_ENV).then(|| "/mnt/models".to_string())
        });
        assert_eq!(config.artifacts.dir, PathBuf::from("/mnt/models"));

        let config = GateConfig::default().merge_with(|_| Some("  ".to_string()));
        assert_eq!(config.artifacts.dir, PathBuf::from("models"));
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(GateConfig::discover(tmp.path()).unwrap(), GateConfig::default());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(GateConfig::load(Path::new("/nonexistent/vulngate.toml")).is_err());
    }
}
