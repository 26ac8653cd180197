//! Record Flattener: converts one raw record into a fixed-width typed row
//! matching the output schema.
//!
//! The INFO blob is scanned exactly once per record into a transient lookup
//! map; per-sample FORMAT blobs are split positionally against the record's
//! FORMAT key list. Malformed field values degrade to missing and are counted
//! rather than aborting the scan.

use crate::error::FlattenError;
use crate::header::{ColumnSource, FixedColumn, OutputColumn, OutputSchema};
use crate::model::{AlleleContext, ValueType};
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

/// One row from the upstream record source: the seven fixed VCF columns as
/// raw text plus the unparsed INFO blob and, when present, the FORMAT key
/// list and per-sample value blobs.
///
/// Ephemeral; lives only for the duration of flattening one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Reference sequence name.
    pub chrom: String,
    /// 1-based position, unparsed.
    pub pos: String,
    /// Record identifier(s); `.` means missing.
    pub id: String,
    /// Reference bases.
    pub reference: String,
    /// Comma-separated ALT alleles; `.` means none.
    pub alt: String,
    /// Quality score; `.` means missing.
    pub qual: String,
    /// Semicolon-separated FILTER status; `.` means missing.
    pub filter: String,
    /// Unparsed semicolon-delimited INFO key/value blob.
    pub info: String,
    /// Colon-delimited FORMAT key list, if genotypes are present.
    pub format: Option<String>,
    /// One colon-delimited value blob per sample.
    pub samples: Vec<String>,
}

impl RawRecord {
    /// Builds a raw record from one tab-separated data line.
    ///
    /// This is a convenience adapter for line-based sources; it does tab
    /// splitting only, no field interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError::InvalidRecord`] if the line has fewer than the
    /// eight mandatory columns.
    pub fn from_line(line: &str) -> Result<RawRecord, FlattenError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if fields.len() < 8 {
            return Err(FlattenError::InvalidRecord(format!(
                "expected at least 8 tab-separated columns, found {}",
                fields.len()
            )));
        }
        Ok(RawRecord {
            chrom: fields[0].to_string(),
            pos: fields[1].to_string(),
            id: fields[2].to_string(),
            reference: fields[3].to_string(),
            alt: fields[4].to_string(),
            qual: fields[5].to_string(),
            filter: fields[6].to_string(),
            info: fields[7].to_string(),
            format: fields.get(8).map(|s| s.to_string()),
            samples: fields.iter().skip(9).map(|s| s.to_string()).collect(),
        })
    }
}

/// A typed, possibly-list, possibly-missing value for one output column of
/// one record.
///
/// Produced by the flattener and consumed immediately by the appender; list
/// entries are `Option` so `.` placeholders keep their positions (e.g.
/// `AD=10,.` becomes `[Some(10), None]`). The `*ListList` variants carry
/// multi-sample FORMAT lists, one outer entry per sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    /// The field is absent or degraded for this record.
    Missing,
    /// Scalar integer.
    Int(i64),
    /// Scalar float.
    Float(f64),
    /// Flag presence.
    Bool(bool),
    /// Scalar text.
    Str(String),
    /// Integer list with nullable entries.
    IntList(Vec<Option<i64>>),
    /// Float list with nullable entries.
    FloatList(Vec<Option<f64>>),
    /// Text list with nullable entries.
    StrList(Vec<Option<String>>),
    /// Per-sample integer lists.
    IntListList(Vec<Option<Vec<Option<i64>>>>),
    /// Per-sample float lists.
    FloatListList(Vec<Option<Vec<Option<f64>>>>),
    /// Per-sample text lists.
    StrListList(Vec<Option<Vec<Option<String>>>>),
}

/// Flattens raw records against one fixed output schema.
///
/// Holds the per-column degraded-field counters for the scan; the orchestrator
/// folds them into [`crate::query::ScanStats`] at finalize time.
pub struct RecordFlattener {
    schema: Arc<OutputSchema>,
    arity_strict: bool,
    degraded: Vec<usize>,
    repeated_keys: usize,
}

impl RecordFlattener {
    /// Creates a flattener for one scan over `schema`.
    pub fn new(schema: Arc<OutputSchema>, arity_strict: bool) -> Self {
        let degraded = vec![0; schema.columns().len()];
        Self {
            schema,
            arity_strict,
            degraded,
            repeated_keys: 0,
        }
    }

    /// Per-column degraded-field counts accumulated so far.
    pub(crate) fn degraded_counts(&self) -> &[usize] {
        &self.degraded
    }

    /// Number of repeated-INFO-key occurrences seen so far.
    pub(crate) fn repeated_keys(&self) -> usize {
        self.repeated_keys
    }

    /// Produces one row of typed values for `record`, in schema column order.
    ///
    /// The row always has exactly one value per output column; malformed
    /// fields come back as [`FlatValue::Missing`] unless `arity_strict` turns
    /// an arity mismatch fatal.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError::InvalidRecord`] for records corrupt beyond
    /// field-level recovery (unparseable POS), and
    /// [`FlattenError::ArityMismatch`] in strict mode.
    pub fn flatten(
        &mut self,
        record: &RawRecord,
        row: &mut Vec<FlatValue>,
    ) -> Result<(), FlattenError> {
        let schema = Arc::clone(&self.schema);
        row.clear();

        let alts: Vec<&str> = if record.alt == "." || record.alt.is_empty() {
            Vec::new()
        } else {
            record.alt.split(',').collect()
        };
        let format_keys: Option<Vec<&str>> =
            record.format.as_deref().map(|f| f.split(':').collect());
        let sample_parts: Vec<Vec<&str>> = if format_keys.is_some() {
            record
                .samples
                .iter()
                .map(|s| s.split(':').collect())
                .collect()
        } else {
            Vec::new()
        };
        let ctx = AlleleContext {
            alt_count: alts.len(),
            ploidy: derive_ploidy(format_keys.as_deref(), &sample_parts),
        };
        let info = self.parse_info(&record.info);

        for (idx, column) in schema.columns().iter().enumerate() {
            let value = match &column.source {
                ColumnSource::Fixed(fixed) => self.fixed_value(*fixed, record, &alts, idx)?,
                ColumnSource::Info(decl) => {
                    if decl.value_type == ValueType::Flag {
                        FlatValue::Bool(info.contains_key(decl.key.as_str()))
                    } else {
                        match info.get(decl.key.as_str()) {
                            None => FlatValue::Missing,
                            Some(None) => {
                                self.degrade(idx, &decl.key, "present without a value");
                                FlatValue::Missing
                            }
                            Some(Some(raw)) => self.typed_value(column, raw, &ctx, idx)?,
                        }
                    }
                }
                ColumnSource::Format(decl) => self.format_value(
                    column,
                    &decl.key,
                    format_keys.as_deref(),
                    &sample_parts,
                    &ctx,
                    idx,
                )?,
            };
            row.push(value);
        }
        Ok(())
    }

    /// Single pass over the INFO blob into a key→raw-text lookup scoped to
    /// this record. Repeated keys keep the last occurrence.
    fn parse_info<'a>(&mut self, blob: &'a str) -> HashMap<&'a str, Option<&'a str>> {
        let mut map = HashMap::new();
        if blob == "." || blob.is_empty() {
            return map;
        }
        for pair in blob.split(';') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            };
            if map.insert(key, value).is_some() {
                self.repeated_keys += 1;
                warn!("INFO key '{key}' repeated within one record; keeping the last occurrence");
            }
        }
        map
    }

    fn fixed_value(
        &mut self,
        fixed: FixedColumn,
        record: &RawRecord,
        alts: &[&str],
        idx: usize,
    ) -> Result<FlatValue, FlattenError> {
        let value = match fixed {
            FixedColumn::Chrom => FlatValue::Str(record.chrom.clone()),
            FixedColumn::Pos => {
                let pos = record.pos.parse::<i64>().map_err(|_| {
                    FlattenError::InvalidRecord(format!("unparseable POS '{}'", record.pos))
                })?;
                FlatValue::Int(pos)
            }
            FixedColumn::Id => {
                if record.id == "." || record.id.is_empty() {
                    FlatValue::Missing
                } else {
                    FlatValue::Str(record.id.clone())
                }
            }
            FixedColumn::Ref => FlatValue::Str(record.reference.clone()),
            FixedColumn::Alt => {
                FlatValue::StrList(alts.iter().map(|a| Some(a.to_string())).collect())
            }
            FixedColumn::Qual => {
                if record.qual == "." || record.qual.is_empty() {
                    FlatValue::Missing
                } else {
                    match record.qual.parse::<f64>() {
                        Ok(q) => FlatValue::Float(q),
                        Err(_) => {
                            self.degrade(idx, "qual", "non-numeric quality score");
                            FlatValue::Missing
                        }
                    }
                }
            }
            FixedColumn::Filter => {
                if record.filter == "." || record.filter.is_empty() {
                    FlatValue::Missing
                } else {
                    FlatValue::StrList(
                        record
                            .filter
                            .split(';')
                            .map(|f| Some(f.to_string()))
                            .collect(),
                    )
                }
            }
        };
        Ok(value)
    }

    /// Parses one raw field value into its per-record shape (scalar or one
    /// list), validating the observed count against the resolved arity.
    fn typed_value(
        &mut self,
        column: &OutputColumn,
        raw: &str,
        ctx: &AlleleContext,
        idx: usize,
    ) -> Result<FlatValue, FlattenError> {
        let (decl, key) = match &column.source {
            ColumnSource::Info(d) | ColumnSource::Format(d) => (d, d.key.as_str()),
            ColumnSource::Fixed(_) => {
                return Err(FlattenError::Internal(
                    "typed_value invoked for a fixed column".to_string(),
                ));
            }
        };
        let parts: Vec<&str> = raw.split(',').collect();

        if let Some(expected) = decl.arity.resolve(ctx)
            && parts.len() != expected
        {
            return self.arity_mismatch(idx, key, expected, parts.len());
        }

        let parsed = if column.multiplicity.is_list() {
            parse_list(&parts, decl.value_type)
        } else {
            parse_scalar(parts[0], decl.value_type)
        };
        match parsed {
            Some(value) => Ok(value),
            None => {
                self.degrade(idx, key, "value does not match the declared type");
                Ok(FlatValue::Missing)
            }
        }
    }

    /// Flattens one FORMAT-derived column: positional lookup of the field in
    /// each sample's blob, aggregated across samples (or collapsed to the one
    /// selected sample).
    fn format_value(
        &mut self,
        column: &OutputColumn,
        key: &str,
        format_keys: Option<&[&str]>,
        samples: &[Vec<&str>],
        ctx: &AlleleContext,
        idx: usize,
    ) -> Result<FlatValue, FlattenError> {
        let pos = format_keys.and_then(|keys| keys.iter().position(|k| *k == key));

        // Missing sample value: "." or trailing-field omission.
        fn raw_of<'s>(sample: &[&'s str], pos: Option<usize>) -> Option<&'s str> {
            let p = pos?;
            match sample.get(p) {
                Some(v) if !v.is_empty() && *v != "." => Some(*v),
                _ => None,
            }
        }

        if let Some(sample_idx) = self.schema.single_sample() {
            return match samples.get(sample_idx).and_then(|s| raw_of(s, pos)) {
                None => Ok(FlatValue::Missing),
                Some(raw) => self.typed_value(column, raw, ctx, idx),
            };
        }

        // One entry per header sample, even when the record carries fewer
        // sample blobs than the header declares.
        let sample_count = self.schema.sample_names().len();
        let mut per_sample = Vec::with_capacity(sample_count);
        for i in 0..sample_count {
            let value = match samples.get(i).and_then(|s| raw_of(s, pos)) {
                None => FlatValue::Missing,
                Some(raw) => self.typed_value(column, raw, ctx, idx)?,
            };
            per_sample.push(value);
        }
        aggregate_samples(column, per_sample)
    }

    fn degrade(&mut self, idx: usize, key: &str, reason: &str) {
        self.degraded[idx] += 1;
        warn!("field '{key}' degraded to missing: {reason}");
    }

    fn arity_mismatch(
        &mut self,
        idx: usize,
        key: &str,
        expected: usize,
        found: usize,
    ) -> Result<FlatValue, FlattenError> {
        if self.arity_strict {
            return Err(FlattenError::ArityMismatch {
                key: key.to_string(),
                expected,
                found,
            });
        }
        self.degrade(
            idx,
            key,
            &format!("expected {expected} values, found {found}"),
        );
        Ok(FlatValue::Missing)
    }
}

/// Ploidy of the record, derived from the first sample's GT value when
/// genotypes are present.
fn derive_ploidy(format_keys: Option<&[&str]>, samples: &[Vec<&str>]) -> Option<usize> {
    let gt_pos = format_keys?.iter().position(|k| *k == "GT")?;
    let gt = samples.first()?.get(gt_pos)?;
    if *gt == "." || gt.is_empty() {
        return None;
    }
    Some(gt.split(['/', '|']).count())
}

fn parse_scalar(raw: &str, ty: ValueType) -> Option<FlatValue> {
    if raw == "." {
        return Some(FlatValue::Missing);
    }
    match ty {
        ValueType::Integer => raw.parse::<i64>().ok().map(FlatValue::Int),
        ValueType::Float => raw.parse::<f64>().ok().map(FlatValue::Float),
        ValueType::String | ValueType::Character => Some(FlatValue::Str(raw.to_string())),
        ValueType::Flag => None,
    }
}

fn parse_list(parts: &[&str], ty: ValueType) -> Option<FlatValue> {
    match ty {
        ValueType::Integer => parts
            .iter()
            .map(|p| {
                if *p == "." {
                    Some(None)
                } else {
                    p.parse::<i64>().ok().map(Some)
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(FlatValue::IntList),
        ValueType::Float => parts
            .iter()
            .map(|p| {
                if *p == "." {
                    Some(None)
                } else {
                    p.parse::<f64>().ok().map(Some)
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(FlatValue::FloatList),
        ValueType::String | ValueType::Character => Some(FlatValue::StrList(
            parts
                .iter()
                .map(|p| {
                    if *p == "." {
                        None
                    } else {
                        Some(p.to_string())
                    }
                })
                .collect(),
        )),
        ValueType::Flag => None,
    }
}

/// Folds per-sample values into one list-shaped value for a multi-sample
/// FORMAT column. A shape mismatch here means the flattener and the schema
/// disagree, which is a core bug.
fn aggregate_samples(
    column: &OutputColumn,
    per_sample: Vec<FlatValue>,
) -> Result<FlatValue, FlattenError> {
    use arrow::datatypes::DataType;

    let fault = |got: &FlatValue| {
        FlattenError::Internal(format!(
            "sample value shape {:?} does not match column '{}'",
            got, column.name
        ))
    };

    if column.multiplicity.is_list() {
        match column.element_type {
            DataType::Int64 => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::IntList(l) => Ok(Some(l)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::IntListList),
            DataType::Float64 => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::FloatList(l) => Ok(Some(l)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::FloatListList),
            _ => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::StrList(l) => Ok(Some(l)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::StrListList),
        }
    } else {
        match column.element_type {
            DataType::Int64 => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::Int(i) => Ok(Some(i)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::IntList),
            DataType::Float64 => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::Float(f) => Ok(Some(f)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::FloatList),
            _ => per_sample
                .into_iter()
                .map(|v| match v {
                    FlatValue::Missing => Ok(None),
                    FlatValue::Str(s) => Ok(Some(s)),
                    other => Err(fault(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FlatValue::StrList),
        }
    }
}
