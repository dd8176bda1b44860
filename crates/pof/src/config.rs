//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PofError, Result};

/// Dirty-byte percentage above which a full replace delta is emitted.
pub const DEFAULT_REPLACE_THRESHOLD: u32 = 67;

/// Nesting limit for decoding and skipping values.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PofConfig {
    /// Delta encoder settings
    pub delta: DeltaConfig,

    /// Parser settings
    pub parser: ParserConfig,
}

/// Delta encoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    /// Percentage of dirty bytes (integer, `0..=100`) above which the
    /// replace format is chosen over the binary diff format.
    pub replace_threshold: u32,
}

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting of values decoded or skipped in one call.
    pub max_depth: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            replace_threshold: DEFAULT_REPLACE_THRESHOLD,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl PofConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PofConfig =
            toml::from_str(source).map_err(|e| PofError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| PofError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded POF configuration");
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PofError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.delta.replace_threshold > 100 {
            return Err(PofError::Config(format!(
                "delta.replace_threshold must be at most 100, got {}",
                self.delta.replace_threshold
            )));
        }
        if self.parser.max_depth == 0 {
            return Err(PofError::Config("parser.max_depth must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = PofConfig::from_toml_str("").unwrap();
        assert_eq!(config, PofConfig::default());
        assert_eq!(config.delta.replace_threshold, 67);
        assert_eq!(config.parser.max_depth, 64);
    }

    #[test]
    fn partial_document() {
        let config = PofConfig::from_toml_str("[parser]\nmax_depth = 8\n").unwrap();
        assert_eq!(config.parser.max_depth, 8);
        assert_eq!(config.delta.replace_threshold, 67);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(PofConfig::from_toml_str("[delta]\nreplace_threshold = 101\n").is_err());
        assert!(PofConfig::from_toml_str("[parser]\nmax_depth = 0\n").is_err());
        assert!(PofConfig::from_toml_str("[delta]\nreplace_threshold = \"x\"\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("pof-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[delta]\nreplace_threshold = 40\n").unwrap();
        let loaded = PofConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();
        let config = loaded.unwrap();
        assert_eq!(config.delta.replace_threshold, 40);
        assert_eq!(config.parser.max_depth, 64);

        assert!(matches!(
            PofConfig::from_file(&path),
            Err(PofError::Config(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = PofConfig::default();
        config.delta.replace_threshold = 50;
        let text = config.to_toml_string().unwrap();
        assert_eq!(PofConfig::from_toml_str(&text).unwrap(), config);
    }
}
