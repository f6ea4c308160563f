//! Byte-to-unit progress scaling and the progress sink interface.
//!
//! File sizes are unbounded but progress bars work on a small fixed range, so
//! every deployment reports exactly [`TOTAL_PROGRESS_UNITS`] units in total.

/// Number of progress units in a complete deployment.
pub const TOTAL_PROGRESS_UNITS: u32 = 1000;

/// Receives progress for a deployment and answers cancellation queries.
///
/// Methods take `&self`; implementations use interior mutability, the same
/// way [`Log`](crate::logging::Log) implementations do.
pub trait ProgressSink {
    /// The execute pass is starting and will report `total_units` units.
    fn begin(&self, total_units: u32);
    /// `units` more units of work are done.
    fn step(&self, units: u32);
    /// The execute pass is over (completed or cancelled).
    fn end(&self);
    /// Whether the user asked to stop.  Checked once before each file.
    fn is_cancelled(&self) -> bool;
}

/// Converts byte deltas into whole progress units.
///
/// The fractional remainder is carried forward: after `n` bytes have been
/// reported the scaler has emitted exactly `floor(n * 1000 / total)` units,
/// so rounding error never exceeds one unit and never accumulates.
///
/// # Examples
///
/// ```
/// use localdeploy_cli::deploy::ProgressScaler;
///
/// let mut scaler = ProgressScaler::new(3000);
/// assert_eq!(scaler.step_size(), 3);
/// assert_eq!(scaler.advance(1), 0);
/// assert_eq!(scaler.advance(1), 0);
/// assert_eq!(scaler.advance(1), 1);
/// assert_eq!(scaler.advance(2997), 999);
/// assert_eq!(scaler.finish(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ProgressScaler {
    total_bytes: u64,
    seen_bytes: u64,
    emitted: u32,
}

impl ProgressScaler {
    /// Create a scaler for a deployment of `total_bytes` bytes.
    #[must_use]
    pub const fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            seen_bytes: 0,
            emitted: 0,
        }
    }

    /// Bytes per progress unit (integer part).
    #[must_use]
    pub const fn step_size(&self) -> u64 {
        self.total_bytes / TOTAL_PROGRESS_UNITS as u64
    }

    /// Units emitted so far.
    #[must_use]
    pub const fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Account for `delta_bytes` more bytes and return the whole units now due.
    ///
    /// Bytes past the total announced at construction are ignored.
    pub fn advance(&mut self, delta_bytes: u64) -> u32 {
        if self.total_bytes == 0 {
            return 0;
        }
        self.seen_bytes = self
            .seen_bytes
            .saturating_add(delta_bytes)
            .min(self.total_bytes);
        let due = u128::from(self.seen_bytes) * u128::from(TOTAL_PROGRESS_UNITS)
            / u128::from(self.total_bytes);
        let due = u32::try_from(due).unwrap_or(TOTAL_PROGRESS_UNITS);
        let step = due.saturating_sub(self.emitted);
        self.emitted = self.emitted.max(due);
        step
    }

    /// Return the units still owed so the run totals [`TOTAL_PROGRESS_UNITS`].
    ///
    /// Non-zero for empty deployments and for files that shrank between the
    /// scan and the copy.
    pub fn finish(&mut self) -> u32 {
        let rest = TOTAL_PROGRESS_UNITS.saturating_sub(self.emitted);
        self.emitted = TOTAL_PROGRESS_UNITS;
        rest
    }
}

/// Turns the cumulative byte counts of one file copy into scaler deltas.
#[derive(Debug, Default)]
pub(crate) struct FileProgress {
    last: u64,
}

impl FileProgress {
    /// Byte delta since the previous cumulative value.
    pub(crate) const fn delta(&mut self, cumulative: u64) -> u64 {
        let delta = cumulative.saturating_sub(self.last);
        if cumulative > self.last {
            self.last = cumulative;
        }
        delta
    }

    /// Bytes reported for this file so far.
    pub(crate) const fn reported(&self) -> u64 {
        self.last
    }
}
