//! Query Orchestrator: drives one scan over a raw-record source, invoking the
//! flattener and appender per record and finalizing columns at end-of-input.
//!
//! A query is single-use: `SchemaBuilt → Scanning → Finalized`, no transition
//! skipped, no re-entry after finalize.

use crate::appender::ColumnSet;
use crate::error::FlattenError;
use crate::flatten::{FlatValue, RawRecord, RecordFlattener};
use crate::header::OutputSchema;
use arrow::record_batch::RecordBatch;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder capacity hint; a scan produces one batch regardless of length.
const DEFAULT_CAPACITY: usize = 1024;

/// Options applied at scan time.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Treat arity mismatches as fatal instead of degrading the field to
    /// missing. Off by default.
    pub arity_strict: bool,
}

/// Summary of degradations observed during one scan, reported once at
/// finalize time rather than per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    /// Number of records scanned.
    pub records: usize,
    /// Total count of fields degraded to missing.
    pub degraded_fields: usize,
    /// Degraded-field counts keyed by output column name; only columns with
    /// at least one degradation appear.
    pub degraded_by_column: HashMap<String, usize>,
    /// Number of repeated-INFO-key occurrences (last occurrence won).
    pub repeated_keys: usize,
}

/// The finalized output of one scan.
#[derive(Debug)]
pub struct FinalizedColumns {
    /// The assembled columns, one array per output column.
    pub batch: RecordBatch,
    /// Degradation summary for the scan.
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SchemaBuilt,
    Scanning,
}

/// One single-use scan over a raw-record source.
///
/// The output schema is shared read-only across the whole scan; each pushed
/// record is flattened and appended, and `finish` consumes the query, so a
/// finalized scan cannot be re-entered.
pub struct VcfQuery {
    schema: Arc<OutputSchema>,
    flattener: RecordFlattener,
    columns: ColumnSet,
    row: Vec<FlatValue>,
    state: ScanState,
}

impl VcfQuery {
    /// Creates a query over a built schema; builders are allocated here, so
    /// the total column cost is known before the first record.
    ///
    /// # Errors
    ///
    /// Propagates builder-construction faults.
    pub fn new(schema: Arc<OutputSchema>, options: QueryOptions) -> Result<VcfQuery, FlattenError> {
        let columns = ColumnSet::new(&schema, DEFAULT_CAPACITY)?;
        let width = schema.columns().len();
        Ok(VcfQuery {
            flattener: RecordFlattener::new(Arc::clone(&schema), options.arity_strict),
            schema,
            columns,
            row: Vec::with_capacity(width),
            state: ScanState::SchemaBuilt,
        })
    }

    /// Flattens and appends one record.
    ///
    /// # Errors
    ///
    /// Propagates flattener and appender errors; on error the scan should be
    /// discarded, partially filled builders and all.
    pub fn push(&mut self, record: &RawRecord) -> Result<(), FlattenError> {
        if self.state == ScanState::SchemaBuilt {
            debug!("scan started: {} columns", self.schema.columns().len());
            self.state = ScanState::Scanning;
        }
        self.flattener.flatten(record, &mut self.row)?;
        self.columns.append_row(&self.row)
    }

    /// Finalizes the scan, yielding immutable columns and the degradation
    /// summary. Consumes the query; a new scan needs a new query object.
    ///
    /// # Errors
    ///
    /// Propagates Arrow errors from batch assembly.
    pub fn finish(mut self) -> Result<FinalizedColumns, FlattenError> {
        let records = self.columns.rows();
        let batch = self.columns.finish(self.schema.arrow_schema())?;

        let mut degraded_by_column = HashMap::new();
        let mut degraded_fields = 0;
        for (column, &count) in self.schema.columns().iter().zip(self.flattener.degraded_counts())
        {
            if count > 0 {
                degraded_fields += count;
                degraded_by_column.insert(column.name.clone(), count);
            }
        }

        let stats = ScanStats {
            records,
            degraded_fields,
            degraded_by_column,
            repeated_keys: self.flattener.repeated_keys(),
        };
        debug!(
            "scan finalized: {} records, {} degraded fields",
            stats.records, stats.degraded_fields
        );
        Ok(FinalizedColumns { batch, stats })
    }
}

/// Drives a full scan over `records` and finalizes the columns.
///
/// Region filtering, when wanted, is the record source's concern; this
/// function consumes whatever sequence it is handed.
///
/// # Errors
///
/// Fails on the first fatal flattening error; malformed field values do not
/// abort, they degrade and are summarized in the returned stats.
pub fn run_query<I>(
    schema: Arc<OutputSchema>,
    records: I,
    options: QueryOptions,
) -> Result<FinalizedColumns, FlattenError>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut query = VcfQuery::new(schema, options)?;
    for record in records {
        query.push(&record)?;
    }
    query.finish()
}
