use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::placement::PlacementEngine;
use crate::recorder::discovery::DEFAULT_LIMIT;
use crate::selectors::{CaptureOptions, NthIndex};

/// Engine settings. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TourkitConfig {
    /// Tooltip footprint, gap and caret size.
    pub placement: PlacementEngine,
    /// How captured selectors disambiguate same-tag siblings.
    pub selector_nth: NthIndex,
    /// Auto-play eligible tours when the widget mounts without an explicit choice.
    pub auto_start: bool,
    pub discovery_limit: usize,
}

impl Default for TourkitConfig {
    fn default() -> Self {
        Self {
            placement: PlacementEngine::default(),
            selector_nth: NthIndex::default(),
            auto_start: true,
            discovery_limit: DEFAULT_LIMIT,
        }
    }
}

impl TourkitConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map(Self::load).unwrap_or_else(|| Ok(Self::default()))
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            nth: self.selector_nth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    #[test]
    fn test_empty_object_is_default() {
        let config: TourkitConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TourkitConfig::default());
        assert_eq!(config.placement.tooltip, Size::new(320.0, 180.0));
        assert_eq!(config.discovery_limit, 8);
    }

    #[test]
    fn test_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tourkit.json");
        std::fs::write(
            &path,
            r#"{"placement": {"gap": 24}, "selectorNth": "of_type", "autoStart": false}"#,
        )
        .unwrap();
        let config = TourkitConfig::load(&path).unwrap();
        assert_eq!(config.placement.gap, 24.0);
        assert_eq!(config.placement.caret_size, 8.0);
        assert_eq!(config.capture_options().nth, NthIndex::OfType);
        assert!(!config.auto_start);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = TourkitConfig::load(Path::new("/nonexistent/tourkit.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/tourkit.json"));
    }
}
