use {
    super::{ProtocolError, error::ClientResult},
    std::{
        fmt,
        sync::atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// Lifecycle status of a leased range, as defined by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangeStatus {
    #[default]
    Unspecified,
    Active,
    Exhausted,
}

impl RangeStatus {
    /// Wire representation of the status.
    pub fn as_i32(self) -> i32 {
        match self {
            RangeStatus::Unspecified => 0,
            RangeStatus::Active => 1,
            RangeStatus::Exhausted => 2,
        }
    }
}

impl TryFrom<i32> for RangeStatus {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RangeStatus::Unspecified),
            1 => Ok(RangeStatus::Active),
            2 => Ok(RangeStatus::Exhausted),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RangeStatus::Unspecified => "UNSPECIFIED",
            RangeStatus::Active => "ACTIVE",
            RangeStatus::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// A contiguous interval of ids leased to one service.
///
/// Both bounds are inclusive, i.e. `[start_id..=end_id]`. When obtained from
/// [`RangeManager::current_range`](crate::RangeManager::current_range),
/// `start_id` is the next id that has not been issued yet, so it advances as
/// the range is consumed and stops at `end_id + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Range {
    pub range_id: String,
    pub start_id: i64,
    pub end_id: i64,
    pub service_id: String,
    pub status: RangeStatus,
}

impl Range {
    /// Number of ids between the bounds.
    ///
    /// Zero when the bounds are inverted.
    pub fn width(&self) -> u64 {
        if self.end_id < self.start_id {
            0
        } else {
            self.end_id.abs_diff(self.start_id) + 1
        }
    }

    /// Checks if the given id lies within the bounds.
    pub fn contains(&self, id: i64) -> bool {
        id >= self.start_id && id <= self.end_id
    }

    /// Checks that a freshly leased range can be installed for `service_id`.
    pub(crate) fn validate(&self, service_id: &str) -> ClientResult<()> {
        if self.start_id < 0 {
            return Err(ProtocolError::NegativeStart(self.start_id).into());
        }
        if self.end_id < self.start_id {
            return Err(ProtocolError::InvertedBounds {
                start_id: self.start_id,
                end_id: self.end_id,
            }
            .into());
        }
        if !self.service_id.is_empty() && self.service_id != service_id {
            return Err(ProtocolError::ForeignRange {
                range_id: self.range_id.clone(),
                expected: service_id.to_string(),
                actual: self.service_id.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// Range currently held by a manager, together with its issuance cursor.
///
/// The cursor counts issued ids relative to `start_id`, which keeps it
/// representable even when `end_id` is `i64::MAX`.
pub(crate) struct LeasedRange {
    range: Range,
    width: u64,
    issued: AtomicU64,
    reported: AtomicBool,
}

impl LeasedRange {
    /// Wraps a validated range.
    pub fn new(range: Range) -> Self {
        let width = range.width();
        Self {
            range,
            width,
            issued: AtomicU64::new(0),
            reported: AtomicBool::new(false),
        }
    }

    /// Claims the next id, if any is left.
    ///
    /// Exactly one caller wins each value: the cursor only moves through a
    /// successful compare-and-swap.
    pub fn claim(&self) -> Option<i64> {
        self.issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |issued| {
                (issued < self.width).then_some(issued + 1)
            })
            .ok()
            .map(|issued| self.range.start_id + issued as i64)
    }

    /// All ids of the range have been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.issued.load(Ordering::Acquire) >= self.width
    }

    /// Exhaustion was acknowledged by the authority.
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    pub fn mark_reported(&self) {
        self.reported.store(true, Ordering::Release);
    }

    /// Range as leased, without the cursor applied.
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Copy of the range metadata with the cursor applied.
    pub fn snapshot(&self) -> Range {
        let issued = self.issued.load(Ordering::Acquire);
        let (start_id, status) = if issued >= self.width {
            (self.range.end_id.saturating_add(1), RangeStatus::Exhausted)
        } else {
            (self.range.start_id + issued as i64, RangeStatus::Active)
        };

        Range {
            start_id,
            status,
            ..self.range.clone()
        }
    }
}
