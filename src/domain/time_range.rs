//! Closed time windows over record insert times.
//!
//! Insert times are stored with microsecond precision, so bounds are
//! rounded inward to whole microseconds: `start` up, `end` down. Every
//! backend then compares against the same values.

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::error::StoreError;

/// Inclusive window `[start, end]` over `insert_time`.
///
/// Either bound may be absent, meaning unbounded past or unbounded future.
/// The caller's bounds always satisfy `start <= end`; after rounding, a
/// window narrower than one microsecond may hold no instant at all (see
/// [`TimeRange::is_empty`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Builds a range from optional bounds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRange`] if both bounds are present and
    /// `start > end`.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, StoreError> {
        if let (Some(from), Some(to)) = (start, end)
            && from > to
        {
            return Err(StoreError::InvalidRange { from, to });
        }
        Ok(Self {
            start: start.map(ceil_micros),
            end: end.map(floor_micros),
        })
    }

    /// Range with both bounds set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRange`] if `from > to`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, StoreError> {
        Self::new(Some(from), Some(to))
    }

    /// Everything at or after `from`.
    #[must_use]
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            start: Some(ceil_micros(from)),
            end: None,
        }
    }

    /// Everything at or before `to`.
    #[must_use]
    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(floor_micros(to)),
        }
    }

    /// The whole log.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Inclusive lower bound, if any.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Inclusive upper bound, if any.
    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Returns `true` if no microsecond instant lies in the window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(from), Some(to)) if from > to)
    }

    /// Returns `true` if `t` falls inside the window.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.is_none_or(|from| t >= from) && self.end.is_none_or(|to| t <= to)
    }
}

fn floor_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

fn ceil_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    let floor = floor_micros(t);
    if floor == t {
        return t;
    }
    floor.checked_add_signed(Duration::microseconds(1)).unwrap_or(floor)
}
