//! Alignment configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::technology::DetectorTechnology;

/// Which technologies take part in alignment, and how strictly contexts
/// are checked.
///
/// ```
/// use geoalign::{AlignmentConfig, DetectorTechnology};
///
/// let config = AlignmentConfig::from_json_str(
///     r#"{ "active_technologies": ["pixel", "strip", "calorimeter"],
///          "no_alignment": ["calorimeter"] }"#,
/// ).unwrap();
/// assert!(config.require_complete);
/// assert!(config.no_alignment_set().contains(&DetectorTechnology::Calorimeter));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignmentConfig {
    /// Technologies present in the geometry.
    pub active_technologies: Vec<DetectorTechnology>,
    /// Active technologies that never expect an alignment store.
    pub no_alignment: Vec<DetectorTechnology>,
    /// Fail context assembly when an active, aligned technology has no store.
    pub require_complete: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            active_technologies: Vec::new(),
            no_alignment: Vec::new(),
            require_complete: true,
        }
    }
}

impl AlignmentConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// `Parse` on malformed JSON, or any [`validate`](Self::validate) error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that neither list names a technology twice.
    ///
    /// # Errors
    /// `DuplicateTechnology` naming the list and the repeated technology.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_unique("active_technologies", &self.active_technologies)?;
        ensure_unique("no_alignment", &self.no_alignment)
    }

    /// The excluded technologies as a set.
    #[must_use]
    pub fn no_alignment_set(&self) -> HashSet<DetectorTechnology> {
        self.no_alignment.iter().copied().collect()
    }

    /// Active technologies that do expect an alignment store.
    pub fn aligned_technologies(&self) -> impl Iterator<Item = DetectorTechnology> + '_ {
        self.active_technologies
            .iter()
            .copied()
            .filter(|t| !self.no_alignment.contains(t))
    }
}

fn ensure_unique(field: &'static str, list: &[DetectorTechnology]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(list.len());
    for &technology in list {
        if !seen.insert(technology) {
            return Err(ConfigError::DuplicateTechnology { field, technology });
        }
    }
    Ok(())
}
