use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A half-open calendar range `[start, end)`. The end day is checkout day,
/// so back-to-back rentals sharing an endpoint do not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("end date must be after start date")]
pub struct InvalidRange;

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidRange)
        }
    }

    /// For ranges already known to be ordered (rows read back from the
    /// ledger, which only ever stores validated ranges).
    pub fn unchecked(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `[a, b)` intersects `[c, d)` iff `a < d && c < b`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Does `candidate` intersect any of `existing`, skipping the entry with id
/// `exclude` (used when re-evaluating a booking against its peers)?
pub fn conflicts(
    candidate: &DateRange,
    existing: impl IntoIterator<Item = (Uuid, DateRange)>,
    exclude: Option<Uuid>,
) -> bool {
    existing
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .any(|(_, range)| candidate.overlaps(&range))
}
