//! Conditions-side plumbing: intervals of validity, the registry of
//! published alignment stores, and per-event context provisioning.
//!
//! Alignment stores are built once per interval of validity (IOV) and
//! published here. For each event, [`ContextProvider`] selects the store
//! valid at the event's time for every configured technology and bundles
//! them into a [`GeometryContext`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alignment::SharedAlignmentStore;
use crate::config::AlignmentConfig;
use crate::context::GeometryContext;
use crate::error::{AlignError, ConfigError, GeoError, GeoResult};
use crate::technology::DetectorTechnology;

fn lock_err(context: &'static str) -> GeoError {
    GeoError::internal(format!("poisoned lock: {context}"))
}

/// Packs a run number and luminosity block into one ordered IOV time.
#[must_use]
pub const fn run_lumi(run: u32, lumi_block: u32) -> u64 {
    ((run as u64) << 32) | lumi_block as u64
}

/// Half-open interval of validity `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Iov {
    start: u64,
    end: u64,
}

impl Iov {
    /// Creates an interval.
    ///
    /// # Errors
    /// `ConfigError::Invalid` if `start >= end`.
    pub fn new(start: u64, end: u64) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::Invalid {
                reason: format!("interval of validity must be non-empty: [{start}, {end})"),
            });
        }
        Ok(Self { start, end })
    }

    /// An interval starting at `start` with no end.
    ///
    /// Stored with `end == u64::MAX`; that end is treated as inclusive, so
    /// the interval covers every time from `start` on.
    #[must_use]
    pub const fn open_ended(start: u64) -> Self {
        Self { start, end: u64::MAX }
    }

    /// First time covered.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end, or `u64::MAX` for an open-ended interval.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// True if the interval has no end.
    #[must_use]
    pub const fn is_open_ended(&self) -> bool {
        self.end == u64::MAX
    }

    /// True if `time` falls inside the interval.
    #[must_use]
    pub const fn contains(&self, time: u64) -> bool {
        self.start <= time && (time < self.end || self.is_open_ended())
    }

    /// True if the two intervals share any time.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        (self.start < other.end || other.is_open_ended())
            && (other.start < self.end || self.is_open_ended())
    }
}

impl fmt::Display for Iov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{}, inf)", self.start)
        } else {
            write!(f, "[{}, {})", self.start, self.end)
        }
    }
}

/// Registry of published alignment stores, keyed by technology and IOV.
///
/// # Safety Considerations
/// - Implementations must be safe to share between the conditions writer
///   and the per-event readers
/// - Published stores are never mutated; replacing one publishes a new `Arc`
pub trait AlignmentConditions: Send + Sync {
    /// Publishes a frozen store under its own technology and IOV.
    ///
    /// Publishing for an identical IOV supersedes the previous store.
    ///
    /// # Errors
    /// - `MissingIov`: the store was frozen without an IOV
    /// - `OverlappingIov`: the IOV partially overlaps a published one
    fn publish(&self, store: SharedAlignmentStore) -> GeoResult<()>;

    /// Returns the store for `technology` valid at `time`, if any.
    fn lookup(&self, technology: DetectorTechnology, time: u64) -> GeoResult<Option<SharedAlignmentStore>>;

    /// Drops every store whose IOV ends at or before `time`. Returns how many.
    fn retire_before(&self, time: u64) -> GeoResult<usize>;

    /// Total number of published stores.
    fn len(&self) -> GeoResult<usize>;

    /// True if nothing is published.
    fn is_empty(&self) -> GeoResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Thread-safe in-memory conditions registry.
#[derive(Debug, Default)]
pub struct InMemoryAlignmentConditions {
    // technology -> IOV start -> store
    state: RwLock<HashMap<DetectorTechnology, BTreeMap<u64, SharedAlignmentStore>>>,
}

impl InMemoryAlignmentConditions {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn store_iov(store: &SharedAlignmentStore) -> Result<Iov, AlignError> {
    store.iov().ok_or(AlignError::MissingIov {
        technology: store.technology(),
    })
}

impl AlignmentConditions for InMemoryAlignmentConditions {
    fn publish(&self, store: SharedAlignmentStore) -> GeoResult<()> {
        let technology = store.technology();
        let iov = store_iov(&store)?;

        let mut state = self.state.write().map_err(|_| lock_err("conditions.publish"))?;
        let by_start = state.entry(technology).or_default();

        for existing in by_start.values() {
            let existing_iov = store_iov(existing)?;
            if existing_iov != iov && existing_iov.overlaps(&iov) {
                warn!(%technology, existing = %existing_iov, new = %iov, "rejecting overlapping alignment store");
                return Err(AlignError::OverlappingIov {
                    technology,
                    existing: existing_iov,
                    new: iov,
                }
                .into());
            }
        }

        if by_start.insert(iov.start(), store).is_some() {
            warn!(%technology, %iov, "superseding published alignment store");
        } else {
            debug!(%technology, %iov, "published alignment store");
        }
        Ok(())
    }

    fn lookup(&self, technology: DetectorTechnology, time: u64) -> GeoResult<Option<SharedAlignmentStore>> {
        let state = self.state.read().map_err(|_| lock_err("conditions.lookup"))?;
        let Some(by_start) = state.get(&technology) else {
            return Ok(None);
        };
        let candidate = by_start.range(..=time).next_back().map(|(_, store)| store);
        match candidate {
            Some(store) if store_iov(store)?.contains(time) => Ok(Some(Arc::clone(store))),
            _ => Ok(None),
        }
    }

    fn retire_before(&self, time: u64) -> GeoResult<usize> {
        let mut state = self.state.write().map_err(|_| lock_err("conditions.retire_before"))?;
        let mut retired = 0;
        for (technology, by_start) in state.iter_mut() {
            let before = by_start.len();
            by_start.retain(|_, store| store.iov().is_some_and(|iov| iov.is_open_ended() || iov.end() > time));
            let dropped = before - by_start.len();
            if dropped > 0 {
                debug!(%technology, dropped, "retired superseded alignment stores");
            }
            retired += dropped;
        }
        state.retain(|_, by_start| !by_start.is_empty());
        Ok(retired)
    }

    fn len(&self) -> GeoResult<usize> {
        let state = self.state.read().map_err(|_| lock_err("conditions.len"))?;
        Ok(state.values().map(BTreeMap::len).sum())
    }
}

/// Assembles per-event geometry contexts from a conditions registry.
pub struct ContextProvider {
    conditions: Arc<dyn AlignmentConditions>,
    config: AlignmentConfig,
    no_alignment: HashSet<DetectorTechnology>,
}

impl fmt::Debug for ContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContextProvider {
    /// Creates a provider after validating `config`.
    ///
    /// # Errors
    /// Configuration errors from [`AlignmentConfig::validate`].
    pub fn new(conditions: Arc<dyn AlignmentConditions>, config: AlignmentConfig) -> GeoResult<Self> {
        config.validate()?;
        let no_alignment = config.no_alignment_set();
        Ok(Self {
            conditions,
            config,
            no_alignment,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Builds the context valid at `time`.
    ///
    /// Technologies excluded from alignment are never looked up, so they
    /// always resolve to nominal geometry.
    ///
    /// # Errors
    /// - `IncompleteAlignment` when completeness is required and an active
    ///   technology has no store valid at `time`
    /// - `Internal` on a poisoned registry lock
    pub fn context_for(&self, time: u64) -> GeoResult<GeometryContext> {
        let mut context = GeometryContext::nominal();
        for &technology in &self.config.active_technologies {
            if self.no_alignment.contains(&technology) {
                continue;
            }
            if let Some(store) = self.conditions.lookup(technology, time)? {
                context.insert(store);
            }
        }

        if self.config.require_complete {
            context.check_complete(self.config.active_technologies.iter().copied(), &self.no_alignment)?;
        }
        debug!(time, stores = context.technologies().count(), "assembled geometry context");
        Ok(context)
    }
}
