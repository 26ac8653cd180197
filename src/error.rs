use crate::model::FieldScope;
use thiserror::Error;

/// Errors raised while building an output schema from a header and selection.
///
/// All variants are fatal and are surfaced before any record is flattened,
/// since they invalidate the whole query.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A selected field has no matching declaration in the header.
    #[error("selected {scope} field '{key}' is not declared in the header")]
    UnknownField {
        /// Header section the selection targeted.
        scope: FieldScope,
        /// The selected field key.
        key: String,
    },
    /// Two output columns would end up with the same name.
    #[error("duplicate output column name '{name}'")]
    DuplicateColumn {
        /// The colliding column name.
        name: String,
    },
    /// A sample requested for single-sample extraction is not in the header.
    #[error("sample '{name}' is not present in the header")]
    UnknownSample {
        /// The requested sample name.
        name: String,
    },
    /// An `##INFO` or `##FORMAT` declaration line could not be parsed.
    #[error("malformed header declaration: {reason}: {line}")]
    MalformedDeclaration {
        /// Why the line was rejected.
        reason: String,
        /// The offending header line.
        line: String,
    },
}

/// Errors raised while flattening records or finalizing columns.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// A record is corrupt beyond field-level recovery (e.g. non-numeric POS).
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// A present field carried a different number of values than its declared
    /// arity implies. Only raised when `arity_strict` is enabled; otherwise
    /// the field degrades to missing and the scan continues.
    #[error("arity mismatch in field '{key}': expected {expected} values, found {found}")]
    ArityMismatch {
        /// The field key.
        key: String,
        /// Count implied by the declared arity.
        expected: usize,
        /// Count observed in the record.
        found: usize,
    },
    /// Builder length drift or a value/builder shape mismatch. Indicates a
    /// bug in the flattening core, not bad input; always aborts the scan.
    #[error("internal consistency fault: {0}")]
    Internal(String),
    /// Error bubbled up from the Arrow columnar sink.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}
