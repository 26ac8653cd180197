//! Schema-driven flattening of VCF INFO and FORMAT fields into Arrow columns.
//!
//! VCF headers declare, per field key, a value type (Integer, Float, String,
//! Character, Flag) and an arity rule (fixed count, one per ALT allele, one
//! per allele, one per genotype, or unbounded). This crate derives a stable
//! columnar schema from a header plus a user field selection, then streams
//! each record's sparsely-populated key/value text into that fixed schema,
//! with explicit missing-value semantics and per-field degradation instead of
//! scan aborts.
//!
//! File I/O, decompression, index-based region filtering, and record-line
//! tokenization are external concerns: callers feed [`RawRecord`] values from
//! whatever source they have, and get an Arrow `RecordBatch` back.
//!
//! # Example
//!
//! ```rust
//! use vcf_flatten::{
//!     FieldScope, FieldSelection, QueryOptions, RawRecord, SchemaOptions, build_schema,
//!     run_query,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let header = "##fileformat=VCFv4.3\n\
//! ##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of samples\">\n\
//! #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
//!
//! let schema = Arc::new(build_schema(
//!     header,
//!     &[FieldSelection::new(FieldScope::Info, "NS")],
//!     &SchemaOptions::default(),
//! )?);
//!
//! let records = vec![RawRecord::from_line("20\t14370\trs6054257\tG\tA\t29\tPASS\tNS=3;DP=14")?];
//! let output = run_query(schema, records, QueryOptions::default())?;
//! assert_eq!(output.batch.num_rows(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Column Appender: Arrow builders filled in lockstep and finalized once.
pub mod appender;
/// Error taxonomy: fatal schema errors, recoverable field degradations,
/// internal consistency faults.
pub mod error;
/// Record Flattener: raw records to fixed-width typed rows.
pub mod flatten;
/// Header Schema Builder: declarations plus selection to output schema.
pub mod header;
/// The closed vocabulary of VCF value types and arities.
pub mod model;
/// Query Orchestrator: single-use scans over a record source.
pub mod query;

pub use appender::{ColumnBuilder, ColumnSet};
pub use error::{FlattenError, SchemaError};
pub use flatten::{FlatValue, RawRecord, RecordFlattener};
pub use header::{
    ColumnSource, FieldDeclaration, FieldRegistry, FieldSelection, FixedColumn, OutputColumn,
    OutputSchema, SchemaOptions, build_schema, parse_header,
};
pub use model::{AlleleContext, Arity, FieldScope, Multiplicity, ValueType};
pub use query::{FinalizedColumns, QueryOptions, ScanStats, VcfQuery, run_query};
