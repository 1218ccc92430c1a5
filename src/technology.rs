//! Detector technology tags.
//!
//! A technology tag selects which alignment store in a
//! [`GeometryContext`](crate::GeometryContext) applies to a given element.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Classification of detector sub-systems that carry their own alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorTechnology {
    /// Silicon pixel tracker
    Pixel,
    /// Silicon strip tracker
    Strip,
    /// Transition radiation straw tracker
    Trt,
    /// Electromagnetic and hadronic calorimeters
    Calorimeter,
    /// Monitored drift tube chambers
    Mdt,
    /// Resistive plate chambers
    Rpc,
    /// Thin gap chambers
    Tgc,
    /// Cathode strip chambers
    Csc,
    /// Micromegas chambers
    Mm,
    /// Small-strip thin gap chambers
    Stgc,
}

impl DetectorTechnology {
    /// All known technologies, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Pixel,
        Self::Strip,
        Self::Trt,
        Self::Calorimeter,
        Self::Mdt,
        Self::Rpc,
        Self::Tgc,
        Self::Csc,
        Self::Mm,
        Self::Stgc,
    ];

    /// Returns the lowercase name used in logs and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::Strip => "strip",
            Self::Trt => "trt",
            Self::Calorimeter => "calorimeter",
            Self::Mdt => "mdt",
            Self::Rpc => "rpc",
            Self::Tgc => "tgc",
            Self::Csc => "csc",
            Self::Mm => "mm",
            Self::Stgc => "stgc",
        }
    }

    /// Returns true for the inner tracking technologies.
    #[must_use]
    pub const fn is_inner_detector(self) -> bool {
        matches!(self, Self::Pixel | Self::Strip | Self::Trt)
    }

    /// Returns true for the muon spectrometer technologies.
    #[must_use]
    pub const fn is_muon(self) -> bool {
        matches!(
            self,
            Self::Mdt | Self::Rpc | Self::Tgc | Self::Csc | Self::Mm | Self::Stgc
        )
    }
}

impl fmt::Display for DetectorTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorTechnology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| ConfigError::Invalid {
                reason: format!("unknown detector technology '{s}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for tech in DetectorTechnology::ALL {
            let json = serde_json::to_string(&tech).unwrap();
            assert_eq!(json, format!("\"{tech}\""));
        }
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("  PIXEL ".parse::<DetectorTechnology>().unwrap(), DetectorTechnology::Pixel);
        assert_eq!("sTGC".parse::<DetectorTechnology>().unwrap(), DetectorTechnology::Stgc);
        assert!("drift".parse::<DetectorTechnology>().is_err());
    }

    #[test]
    fn test_groupings() {
        assert!(DetectorTechnology::Trt.is_inner_detector());
        assert!(!DetectorTechnology::Trt.is_muon());
        assert!(DetectorTechnology::Mm.is_muon());
        assert!(!DetectorTechnology::Calorimeter.is_inner_detector());
        assert!(!DetectorTechnology::Calorimeter.is_muon());
    }
}
