//! Running totals accumulated across a single query or insert, folding each
//! `Progress` delta and `ProfileEvents` block the server sends.
//!
//! `Progress` is itself a delta that sums into a monotone snapshot;
//! `ProfileEvents` entries with `thread_id == 0` additionally contribute
//! memory/CPU metrics, using "increment" (add) or "gauge" (set-latest)
//! semantics depending on the event.

use crate::block::Block;
use crate::column::numeric::{ColumnInt64, ColumnUInt64, ColumnUInt8};
use crate::column::string::ColumnString;
use crate::query::Progress;

/// Names of events this crate understands well enough to fold into
/// [`AccumulatedProgress`]. Any other `ProfileEvents` row is ignored.
mod event_names {
    pub const MEMORY_USAGE: &str = "MemoryTrackerUsage";
    pub const MEMORY_PEAK_USAGE: &str = "MemoryTrackerPeakUsage";
    pub const USER_TIME_US: &str = "UserTimeMicroseconds";
    pub const SYSTEM_TIME_US: &str = "SystemTimeMicroseconds";
}

/// A running total folding every `Progress` delta and the metrics harvested
/// from `ProfileEvents` for a single query or insert.
#[derive(Clone, Debug, Default)]
pub struct AccumulatedProgress {
    /// Total rows read so far.
    pub read_rows: u64,
    /// Total bytes read so far.
    pub read_bytes: u64,
    /// Total rows written so far (inserts).
    pub written_rows: u64,
    /// Total bytes written so far (inserts).
    pub written_bytes: u64,
    /// Elapsed wall-clock time since the query started, in nanoseconds.
    pub elapsed_ns: u64,
    /// The server's latest (monotonically increasing) estimate of the
    /// total rows the query will read.
    pub total_rows_to_read: u64,
    /// Current resident memory usage reported by the server, a gauge that
    /// may decrease between samples.
    pub memory_usage: i64,
    /// Peak memory usage observed so far; monotonically non-decreasing.
    pub peak_memory_usage: i64,
    /// Cumulative user+system CPU time consumed by the query, in
    /// microseconds.
    pub cpu_time_microseconds: u64,
}

impl AccumulatedProgress {
    /// Fold a `Progress` packet delta into the running total.
    pub fn apply_progress(&mut self, delta: &Progress, elapsed_ns: u64) {
        self.read_rows += delta.rows;
        self.read_bytes += delta.bytes;
        self.written_rows += delta.written_rows;
        self.written_bytes += delta.written_bytes;
        self.elapsed_ns = elapsed_ns;
        // The server's row-count estimate only ever grows over the life of
        // a query (it tightens as more parts are scanned); guard against a
        // stale/lower sample overwriting a better one.
        self.total_rows_to_read =
            self.total_rows_to_read.max(delta.total_rows);
    }

    /// Fold an uncompressed `ProfileEvents` block into the running total.
    /// Only rows with `thread_id == 0` (the query-level aggregate row, not
    /// a per-thread one) contribute.
    pub fn apply_profile_events(&mut self, block: &Block) {
        let Some(thread_id_col) = block.column_by_name("thread_id") else {
            return;
        };
        let Some(name_col) = block.column_by_name("name") else {
            return;
        };
        let Some(value_col) = block.column_by_name("value") else {
            return;
        };
        // The server's ProfileEvents schema uses a `type` column to signal
        // increment-vs-gauge semantics (1 = increment counter updates,
        // similar enumerations for gauges); this crate only needs to
        // distinguish the two named gauges explicitly, so it keys purely
        // off `name`.
        let thread_ids =
            thread_id_col.as_any().downcast_ref::<ColumnUInt8>();
        let thread_ids_64 =
            thread_id_col.as_any().downcast_ref::<ColumnUInt64>();
        let names = name_col.as_any().downcast_ref::<ColumnString>();
        let values = value_col.as_any().downcast_ref::<ColumnInt64>();

        let (Some(names), Some(values)) = (names, values) else {
            return;
        };

        for row in 0..block.row_count() {
            let thread_id: u64 = if let Some(t) = thread_ids {
                t.at(row) as u64
            } else if let Some(t) = thread_ids_64 {
                t.at(row)
            } else {
                continue;
            };
            if thread_id != 0 {
                continue;
            }

            let name = names.at(row);
            let value = values.at(row);

            match name.as_str() {
                event_names::MEMORY_USAGE => {
                    self.memory_usage = value;
                }
                event_names::MEMORY_PEAK_USAGE => {
                    self.peak_memory_usage =
                        self.peak_memory_usage.max(value);
                }
                event_names::USER_TIME_US | event_names::SYSTEM_TIME_US => {
                    self.cpu_time_microseconds += value.max(0) as u64;
                }
                _ => {}
            }
        }
    }

    /// CPU utilization as a ratio of wall-clock time, i.e. `1.0` means one
    /// full core was kept busy continuously.
    pub fn cpu_usage(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        let elapsed_micros = self.elapsed_ns as f64 / 1000.0;
        self.cpu_time_microseconds as f64 / elapsed_micros
    }

    /// Completion percentage estimate, `0..=100`.
    pub fn percent(&self) -> f64 {
        let denom = self.read_rows.max(self.total_rows_to_read);
        if denom == 0 {
            return 0.0;
        }
        (self.read_rows as f64) * 100.0 / (denom as f64)
    }
}
