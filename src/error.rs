//! Error types for geoalign.
//!
//! All errors in geoalign are strongly typed using thiserror.
//! Every variant that concerns a detector element carries both its
//! technology and its element hash, so a failed construction pass or a
//! failed resolve can be traced back to the offending element.

use thiserror::Error;

use crate::conditions::Iov;
use crate::identity::ElementHash;
use crate::technology::DetectorTechnology;

/// Errors raised by the transform caches, alignment builders and stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("Surface not attached for {technology} element {hash}")]
    MissingSurface {
        technology: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("Surface already attached for {technology} element {hash}")]
    SurfaceAlreadyAttached {
        technology: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("Alignment for {technology} element {hash} was written twice in one pass")]
    DuplicateAlignmentWrite {
        technology: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("Alignment store for {technology} has no entry for element {hash}")]
    MissingAlignmentEntry {
        technology: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("{actual} element {hash} cannot be written into a {expected} alignment builder")]
    TechnologyMismatch {
        expected: DetectorTechnology,
        actual: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("No alignment constants have been defined for {technology}")]
    IncompleteAlignment {
        technology: DetectorTechnology,
    },

    #[error("Element {hash} is already registered for {technology}")]
    DuplicateElement {
        technology: DetectorTechnology,
        hash: ElementHash,
    },

    #[error("Alignment store for {technology} has no interval of validity")]
    MissingIov {
        technology: DetectorTechnology,
    },

    #[error("Alignment store for {technology} covering {new} overlaps the published interval {existing}")]
    OverlappingIov {
        technology: DetectorTechnology,
        existing: Iov,
        new: Iov,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Technology {technology} is listed more than once in '{field}'")]
    DuplicateTechnology {
        field: &'static str,
        technology: DetectorTechnology,
    },

    #[error("Invalid configuration: {reason}")]
    Invalid {
        reason: String,
    },
}

/// Top-level error type for geoalign.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Alignment error: {0}")]
    Align(#[from] AlignError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GeoError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the alignment error, if this is one.
    #[must_use]
    pub const fn as_align(&self) -> Option<&AlignError> {
        match self {
            Self::Align(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if this error was raised while building geometry or alignment.
    ///
    /// Construction errors abort the offending construction pass.
    #[must_use]
    pub const fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::Align(
                AlignError::DuplicateAlignmentWrite { .. }
                    | AlignError::TechnologyMismatch { .. }
                    | AlignError::DuplicateElement { .. }
                    | AlignError::SurfaceAlreadyAttached { .. }
                    | AlignError::OverlappingIov { .. }
                    | AlignError::MissingIov { .. }
            )
        )
    }

    /// Returns true if this error was raised while resolving a transform or surface.
    ///
    /// Resolve errors abort the triggering event rather than substituting nominal geometry.
    #[must_use]
    pub const fn is_resolve(&self) -> bool {
        matches!(
            self,
            Self::Align(
                AlignError::MissingAlignmentEntry { .. }
                    | AlignError::MissingSurface { .. }
                    | AlignError::IncompleteAlignment { .. }
            )
        )
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for geoalign operations.
pub type GeoResult<T> = Result<T, GeoError>;
