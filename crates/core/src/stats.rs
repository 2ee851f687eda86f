//! Derived dashboard statistics.
//!
//! Everything here is a pure function of the currently cached records and is
//! recomputed on every render. Nothing is memoised, so a count can never
//! drift from the list it describes.

use crate::types::{PatientRecord, RedCase, RiskLevel, RiskStatus, Role, resolve_role};

/// Red cases at or above this score count as critical.
pub const CRITICAL_SCORE: f64 = 8.0;

/// Default size of the display window over a filtered list.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Number of records whose ID resolves to `role`.
#[must_use]
pub fn count_by_role(users: &[PatientRecord], role: Role) -> usize {
    users
        .iter()
        .filter(|u| resolve_role(u.id.as_str()) == role)
        .count()
}

/// Number of records with exactly `status`. Unknown statuses are never counted.
#[must_use]
pub fn count_by_status(patients: &[PatientRecord], status: RiskLevel) -> usize {
    patients.iter().filter(|p| p.status.is(status)).count()
}

/// Arithmetic mean rounded to one decimal place; `0.0` for no scores.
#[must_use]
pub fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)] // list lengths stay far below 2^52
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Case-insensitive substring match on name or ID. An empty term keeps everything.
#[must_use]
pub fn filter_search<'a>(users: &'a [PatientRecord], term: &str) -> Vec<&'a PatientRecord> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|u| {
            u.name.to_lowercase().contains(&needle)
                || u.id.as_str().to_lowercase().contains(&needle)
        })
        .collect()
}

/// Leading display window of at most `size` items.
///
/// Stands in for server-side pagination. Borrows, so the cached list is
/// never shortened.
#[must_use]
pub fn window<T>(items: &[T], size: usize) -> &[T] {
    let end = size.min(items.len());
    items.split_at(end).0
}

/// Red cases with a score of at least [`CRITICAL_SCORE`].
#[must_use]
pub fn critical_count(cases: &[RedCase]) -> usize {
    cases.iter().filter(|c| c.score >= CRITICAL_SCORE).count()
}

/// Per-status totals for a patient list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub unknown: usize,
}

impl StatusBreakdown {
    /// Tally statuses over `patients`.
    #[must_use]
    pub fn of(patients: &[PatientRecord]) -> Self {
        patients.iter().fold(Self::default(), |mut acc, p| {
            match p.status {
                RiskStatus::Level(RiskLevel::Green) => acc.green += 1,
                RiskStatus::Level(RiskLevel::Yellow) => acc.yellow += 1,
                RiskStatus::Level(RiskLevel::Red) => acc.red += 1,
                RiskStatus::Unknown => acc.unknown += 1,
            }
            acc
        })
    }

    /// Total number of records tallied.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.green + self.yellow + self.red + self.unknown
    }
}
