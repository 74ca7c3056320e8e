//! FILENAME: core/pivot-engine/src/session.rs
//! Recompute Session - Last-writer-wins publication of pivot results.
//!
//! Every config edit starts a computation with a new version. Only the most
//! recently started computation may publish; older ones notice through
//! `is_current` and stop between stages. The session is shared between the
//! caller and whatever worker threads the caller runs computations on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use records::Dataset;

use crate::catalog::FieldCatalog;
use crate::definition::PivotConfig;
use crate::engine::PivotCalculator;
use crate::error::PivotError;
use crate::relationship::Relationship;
use crate::view::PivotResult;

/// Identifies one started computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket {
    version: u64,
}

impl Ticket {
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug)]
struct Published {
    version: u64,
    result: Arc<PivotResult>,
}

#[derive(Debug, Default)]
pub struct PivotSession {
    version: AtomicU64,
    published: Mutex<Option<Published>>,
}

impl PivotSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new computation, superseding every earlier one.
    pub fn begin(&self) -> Ticket {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { version }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.version.load(Ordering::SeqCst) == ticket.version
    }

    fn lock(&self) -> MutexGuard<'_, Option<Published>> {
        // a panic while holding the lock leaves a whole result or none
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes `result` if `ticket` is still the latest computation.
    /// Returns the published result, or None when it was dropped.
    pub fn publish(&self, ticket: Ticket, result: PivotResult) -> Option<Arc<PivotResult>> {
        let mut published = self.lock();
        if !self.is_current(ticket) {
            log::debug!(target: "pivot", "dropping result of superseded version {}", ticket.version);
            return None;
        }
        let result = Arc::new(result);
        *published = Some(Published {
            version: ticket.version,
            result: Arc::clone(&result),
        });
        Some(result)
    }

    pub fn latest(&self) -> Option<Arc<PivotResult>> {
        self.lock().as_ref().map(|p| Arc::clone(&p.result))
    }

    pub fn latest_version(&self) -> Option<u64> {
        self.lock().as_ref().map(|p| p.version)
    }

    /// Runs one computation under a fresh ticket. Returns the published
    /// result, or None when a newer computation superseded this one.
    pub fn recompute(
        &self,
        dataset: &Dataset,
        relationships: &[Relationship],
        config: &PivotConfig,
    ) -> Result<Option<Arc<PivotResult>>, PivotError> {
        self.run(PivotCalculator::new(dataset, config).with_relationships(relationships))
    }

    /// Like `recompute`, sorting row positions by the catalog's field kinds.
    pub fn recompute_with_catalog(
        &self,
        dataset: &Dataset,
        relationships: &[Relationship],
        catalog: &FieldCatalog,
        config: &PivotConfig,
    ) -> Result<Option<Arc<PivotResult>>, PivotError> {
        self.run(
            PivotCalculator::new(dataset, config)
                .with_relationships(relationships)
                .with_catalog(catalog),
        )
    }

    fn run(&self, calculator: PivotCalculator<'_>) -> Result<Option<Arc<PivotResult>>, PivotError> {
        let ticket = self.begin();
        let outcome = calculator.calculate_cancellable(&|| !self.is_current(ticket))?;
        Ok(outcome.and_then(|result| self.publish(ticket, result)))
    }
}
