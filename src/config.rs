use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::layout::{compile_layout, LayoutError, LayoutNode, Rect};
use crate::state::DEFAULT_COALESCE_WINDOW;

/// Checked in order when no `--config` is given.
pub const CONFIG_CANDIDATES: &[&str] = &["panedeck.json", "panedeck.toml", ".panedeckrc"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSpec {
    #[serde(default)]
    pub glob: Option<String>,
}

/// One entry of the command map. Immutable once a pane is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaneSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(rename = "stderr", default = "default_true")]
    pub stderr_visible: bool,
    #[serde(default)]
    pub clear_on_restart: bool,
    #[serde(default)]
    pub watch: Option<WatchSpec>,
}

fn default_true() -> bool {
    true
}

impl PaneSpec {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            label: None,
            cmd: cmd.into(),
            args: Vec::new(),
            stderr_visible: true,
            clear_on_restart: false,
            watch: None,
        }
    }

    pub fn label_or<'a>(&'a self, slug: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(slug)
    }

    pub fn watch_glob(&self) -> Option<&str> {
        self.watch.as_ref().and_then(|watch| watch.glob.as_deref())
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.cmd.clone()
        } else {
            format!("{} {}", self.cmd, self.args.join(" "))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    throttle_ms: Option<u64>,
    layout: LayoutNode,
    #[serde(alias = "commands")]
    frames: IndexMap<String, PaneSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else (including `.panedeckrc`) is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// A pane slot: the compiled rect merged with its command entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PanePlan {
    pub slug: String,
    pub rect: Rect,
    pub spec: PaneSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub name: Option<String>,
    pub throttle: Duration,
    /// Panes in tab order.
    pub panes: Vec<PanePlan>,
    /// Command entries that the layout never places.
    pub unplaced: Vec<String>,
    pub source: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON config in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOML config in {origin}: {source}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("layout places pane `{slug}` but no command is configured for it")]
    MissingFrame { slug: String },
    #[error("pane `{slug}` has an empty `cmd`")]
    EmptyCommand { slug: String },
    #[error("no config found in {} (looked for {})", .dir.display(), CONFIG_CANDIDATES.join(", "))]
    NotFound { dir: PathBuf },
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();
        let mut config = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => Self::from_json_str(&raw, &origin)?,
            ConfigFormat::Toml => Self::from_toml_str(&raw, &origin)?,
        };
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let parsed = serde_json::from_str::<RawConfig>(raw).map_err(|source| ConfigError::Json {
            origin: origin.to_owned(),
            source,
        })?;
        Self::from_raw(parsed)
    }

    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let parsed = toml::from_str::<RawConfig>(raw).map_err(|source| ConfigError::Toml {
            origin: origin.to_owned(),
            source,
        })?;
        Self::from_raw(parsed)
    }

    /// First existing entry of `CONFIG_CANDIDATES` under `dir`.
    pub fn discover(dir: &Path) -> Result<PathBuf, ConfigError> {
        CONFIG_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                dir: dir.to_path_buf(),
            })
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("panedeck")
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let RawConfig {
            name,
            throttle_ms,
            layout,
            mut frames,
        } = raw;
        let rects = compile_layout(&layout)?;

        let mut panes = Vec::with_capacity(rects.len());
        for rect in rects {
            let spec = frames
                .shift_remove(&rect.slug)
                .ok_or_else(|| ConfigError::MissingFrame {
                    slug: rect.slug.clone(),
                })?;
            if spec.cmd.trim().is_empty() {
                return Err(ConfigError::EmptyCommand { slug: rect.slug });
            }
            panes.push(PanePlan {
                slug: rect.slug.clone(),
                rect,
                spec,
            });
        }

        Ok(Self {
            name,
            throttle: throttle_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COALESCE_WINDOW),
            panes,
            unplaced: frames.into_keys().collect(),
            source: None,
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
