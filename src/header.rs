//! Header Schema Builder: parses `##INFO` / `##FORMAT` declarations and the
//! `#CHROM` sample line into a field registry, then intersects the registry
//! with a user field selection to produce the output schema.
//!
//! Schema construction is a distinct phase from flattening: it must run to
//! completion before the first record is processed, since column builders are
//! created from its result.

use crate::error::SchemaError;
use crate::model::{Arity, FieldScope, Multiplicity, ValueType};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Key for storing a field's header description in Arrow field metadata.
pub const VCF_FIELD_DESCRIPTION_KEY: &str = "vcf.field.description";
/// Key for storing a field's declared `Number=` attribute in Arrow field metadata.
pub const VCF_FIELD_NUMBER_KEY: &str = "vcf.field.number";
/// Key for storing a field's declared `Type=` attribute in Arrow field metadata.
pub const VCF_FIELD_TYPE_KEY: &str = "vcf.field.type";
/// Key for storing whether a column came from INFO or FORMAT in Arrow field metadata.
pub const VCF_FIELD_SCOPE_KEY: &str = "vcf.field.scope";
/// Key for storing the header sample names in Arrow schema metadata.
pub const VCF_SAMPLE_NAMES_KEY: &str = "vcf.sample_names";
/// Key for storing the `##fileformat` version in Arrow schema metadata.
pub const VCF_FILE_FORMAT_KEY: &str = "vcf.file_format";

/// One `##INFO` or `##FORMAT` header declaration.
///
/// Immutable once parsed; keyed uniquely by `(scope, key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Header section the field was declared in.
    pub scope: FieldScope,
    /// The field key (`ID=` attribute), case-sensitive.
    pub key: String,
    /// Declared value type (`Type=` attribute).
    pub value_type: ValueType,
    /// Declared count rule (`Number=` attribute).
    pub arity: Arity,
    /// Free-text description from the header.
    pub description: String,
}

/// All field declarations and sample names parsed from one header.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    declarations: Vec<FieldDeclaration>,
    index: HashMap<(FieldScope, String), usize>,
    sample_names: Vec<String>,
    file_format: Option<String>,
}

impl FieldRegistry {
    /// Looks up a declaration by scope and key.
    pub fn get(&self, scope: FieldScope, key: &str) -> Option<&FieldDeclaration> {
        self.index
            .get(&(scope, key.to_string()))
            .map(|&i| &self.declarations[i])
    }

    /// All declarations in header order (INFO and FORMAT interleaved as declared).
    pub fn declarations(&self) -> &[FieldDeclaration] {
        &self.declarations
    }

    /// Sample names from the `#CHROM` line, in column order.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    fn insert(&mut self, decl: FieldDeclaration) {
        let id = (decl.scope, decl.key.clone());
        if let Some(&existing) = self.index.get(&id) {
            warn!(
                "{} field '{}' declared more than once; keeping the last declaration",
                decl.scope, decl.key
            );
            self.declarations[existing] = decl;
        } else {
            self.index.insert(id, self.declarations.len());
            self.declarations.push(decl);
        }
    }
}

/// Parses the declaration lines of a VCF header into a [`FieldRegistry`].
///
/// Only `##fileformat`, `##INFO`, `##FORMAT` and the `#CHROM` column line are
/// interpreted; every other header line is ignored.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedDeclaration`] when an `##INFO`/`##FORMAT`
/// line is missing a required attribute or carries an unparseable one.
pub fn parse_header(header: &str) -> Result<FieldRegistry, SchemaError> {
    let mut registry = FieldRegistry::default();

    for line in header.lines() {
        let line = line.trim_end();
        if let Some(body) = strip_declaration(line, "##INFO=<") {
            registry.insert(parse_declaration(body, line, FieldScope::Info)?);
        } else if let Some(body) = strip_declaration(line, "##FORMAT=<") {
            registry.insert(parse_declaration(body, line, FieldScope::Format)?);
        } else if let Some(version) = line.strip_prefix("##fileformat=") {
            registry.file_format = Some(version.to_string());
        } else if line.starts_with("#CHROM") {
            // Columns after FORMAT (index 9 onward) are sample names.
            registry.sample_names = line
                .split('\t')
                .skip(9)
                .map(|s| s.to_string())
                .collect();
        }
    }

    debug!(
        "parsed header: {} field declarations, {} samples",
        registry.declarations.len(),
        registry.sample_names.len()
    );
    Ok(registry)
}

fn strip_declaration<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)?.strip_suffix('>')
}

fn parse_declaration(
    body: &str,
    line: &str,
    scope: FieldScope,
) -> Result<FieldDeclaration, SchemaError> {
    let malformed = |reason: &str| SchemaError::MalformedDeclaration {
        reason: reason.to_string(),
        line: line.to_string(),
    };

    let mut key = None;
    let mut number = None;
    let mut ty = None;
    let mut description = String::new();

    for (attr, value) in split_attributes(body) {
        match attr {
            "ID" => key = Some(value.to_string()),
            "Number" => number = Some(value),
            "Type" => ty = Some(value),
            "Description" => description = unquote(value).to_string(),
            _ => {}
        }
    }

    let key = key.ok_or_else(|| malformed("missing ID attribute"))?;
    let value_type = ValueType::parse(ty.ok_or_else(|| malformed("missing Type attribute"))?)
        .ok_or_else(|| malformed("unknown Type attribute"))?;
    let arity = Arity::parse(number.ok_or_else(|| malformed("missing Number attribute"))?)
        .ok_or_else(|| malformed("unparseable Number attribute"))?;

    // Flags only make sense as per-record presence markers.
    if value_type == ValueType::Flag && scope == FieldScope::Format {
        return Err(malformed("Flag type is not allowed in FORMAT declarations"));
    }

    Ok(FieldDeclaration {
        scope,
        key,
        value_type,
        arity,
        description,
    })
}

/// Splits a declaration body into `attr=value` pairs, honoring commas inside
/// quoted Description values.
fn split_attributes(body: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
        .into_iter()
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim(), v))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// One entry of a user field selection: which declared field to extract and,
/// optionally, the output column name to give it.
#[derive(Debug, Clone)]
pub struct FieldSelection {
    /// Header section the key must be declared in.
    pub scope: FieldScope,
    /// The field key to select.
    pub key: String,
    /// Output column name override; defaults to the key.
    pub alias: Option<String>,
}

impl FieldSelection {
    /// Selects a field under its own key.
    pub fn new(scope: FieldScope, key: impl Into<String>) -> Self {
        Self {
            scope,
            key: key.into(),
            alias: None,
        }
    }

    /// Selects a field under an aliased output column name.
    pub fn with_alias(scope: FieldScope, key: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            scope,
            key: key.into(),
            alias: Some(alias.into()),
        }
    }
}

/// Options applied at schema-build time.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    /// Collapse FORMAT columns to a single sample, selected by name. When
    /// unset, FORMAT columns carry one entry per sample.
    pub single_sample: Option<String>,
}

/// The seven fixed VCF columns that open every output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedColumn {
    /// Reference sequence name.
    Chrom,
    /// 1-based variant position.
    Pos,
    /// Record identifier(s); `.` means missing.
    Id,
    /// Reference bases.
    Ref,
    /// ALT allele list.
    Alt,
    /// Phred-scaled quality; `.` means missing.
    Qual,
    /// FILTER status list; `.` means missing.
    Filter,
}

/// Where an output column's values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// One of the seven fixed VCF columns.
    Fixed(FixedColumn),
    /// A selected INFO field.
    Info(FieldDeclaration),
    /// A selected FORMAT field, aggregated across samples.
    Format(FieldDeclaration),
}

/// One column of the output schema.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    /// Unique output column name.
    pub name: String,
    /// Source of the column's values.
    pub source: ColumnSource,
    /// Arrow element type of individual values.
    pub element_type: DataType,
    /// Scalar, fixed-length list, or variable-length list per record.
    pub multiplicity: Multiplicity,
    /// Full Arrow type of the column, including per-sample list wrapping for
    /// FORMAT columns in multi-sample mode.
    pub data_type: DataType,
}

/// The ordered, deterministic column layout of one query.
///
/// Built once per open file/query and shared read-only by every record's
/// flattening. Column order is always: fixed VCF columns, selected INFO
/// fields in selection order, selected FORMAT fields last.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    columns: Vec<OutputColumn>,
    schema: SchemaRef,
    sample_names: Vec<String>,
    single_sample: Option<usize>,
}

impl OutputSchema {
    /// The output columns in schema order.
    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    /// The Arrow schema of the finalized output.
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Sample names from the header, in column order.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Index of the sample selected for single-sample extraction, if any.
    pub fn single_sample(&self) -> Option<usize> {
        self.single_sample
    }

    /// True when at least one FORMAT-derived column is selected.
    pub fn has_format_columns(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c.source, ColumnSource::Format(_)))
    }
}

fn list_of(element: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", element, true)))
}

fn arity_to_string(arity: Arity) -> String {
    match arity {
        Arity::Fixed(n) => n.to_string(),
        Arity::PerAltAllele => "A".to_string(),
        Arity::PerAllele => "R".to_string(),
        Arity::PerGenotype => "G".to_string(),
        Arity::Unbounded => ".".to_string(),
    }
}

fn value_type_to_string(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Integer => "Integer",
        ValueType::Float => "Float",
        ValueType::String => "String",
        ValueType::Character => "Character",
        ValueType::Flag => "Flag",
    }
}

fn declaration_field_metadata(decl: &FieldDeclaration) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert(
        VCF_FIELD_DESCRIPTION_KEY.to_string(),
        decl.description.clone(),
    );
    metadata.insert(
        VCF_FIELD_TYPE_KEY.to_string(),
        value_type_to_string(decl.value_type).to_string(),
    );
    metadata.insert(VCF_FIELD_NUMBER_KEY.to_string(), arity_to_string(decl.arity));
    metadata.insert(VCF_FIELD_SCOPE_KEY.to_string(), decl.scope.to_string());
    metadata
}

/// Builds the output schema for one query from header text and a field
/// selection.
///
/// An empty selection means "all declared fields": every INFO field followed
/// by every FORMAT field, in header order.
///
/// # Errors
///
/// Fails with a [`SchemaError`] when the header is malformed, a selected key
/// has no declaration, an output name collides, or a requested single sample
/// is unknown. No record is ever read before these checks pass.
pub fn build_schema(
    header: &str,
    selection: &[FieldSelection],
    options: &SchemaOptions,
) -> Result<OutputSchema, SchemaError> {
    let registry = parse_header(header)?;

    let selection: Vec<FieldSelection> = if selection.is_empty() {
        registry
            .declarations()
            .iter()
            .filter(|d| d.scope == FieldScope::Info)
            .chain(
                registry
                    .declarations()
                    .iter()
                    .filter(|d| d.scope == FieldScope::Format),
            )
            .map(|d| FieldSelection::new(d.scope, d.key.clone()))
            .collect()
    } else {
        selection.to_vec()
    };

    let single_sample = match &options.single_sample {
        Some(name) => Some(
            registry
                .sample_names()
                .iter()
                .position(|s| s == name)
                .ok_or_else(|| SchemaError::UnknownSample { name: name.clone() })?,
        ),
        None => None,
    };

    let mut columns = Vec::with_capacity(7 + selection.len());
    let mut fields = Vec::with_capacity(7 + selection.len());
    let mut seen_names = HashSet::new();

    let fixed: [(&str, FixedColumn, DataType, Multiplicity, bool); 7] = [
        ("chrom", FixedColumn::Chrom, DataType::Utf8, Multiplicity::Scalar, false),
        ("pos", FixedColumn::Pos, DataType::Int64, Multiplicity::Scalar, false),
        ("id", FixedColumn::Id, DataType::Utf8, Multiplicity::Scalar, true),
        ("ref", FixedColumn::Ref, DataType::Utf8, Multiplicity::Scalar, false),
        ("alt", FixedColumn::Alt, DataType::Utf8, Multiplicity::VarList, false),
        ("qual", FixedColumn::Qual, DataType::Float64, Multiplicity::Scalar, true),
        ("filter", FixedColumn::Filter, DataType::Utf8, Multiplicity::VarList, true),
    ];
    for (name, column, element_type, multiplicity, nullable) in fixed {
        let data_type = if multiplicity.is_list() {
            list_of(element_type.clone())
        } else {
            element_type.clone()
        };
        seen_names.insert(name.to_string());
        fields.push(Field::new(name, data_type.clone(), nullable));
        columns.push(OutputColumn {
            name: name.to_string(),
            source: ColumnSource::Fixed(column),
            element_type,
            multiplicity,
            data_type,
        });
    }

    // INFO columns in selection order, then FORMAT columns; order is fixed
    // here and never data-dependent afterwards.
    for format_pass in [false, true] {
        for sel in &selection {
            if (sel.scope == FieldScope::Format) != format_pass {
                continue;
            }
            let decl = registry
                .get(sel.scope, &sel.key)
                .ok_or_else(|| SchemaError::UnknownField {
                    scope: sel.scope,
                    key: sel.key.clone(),
                })?
                .clone();

            let name = sel.alias.clone().unwrap_or_else(|| decl.key.clone());
            if !seen_names.insert(name.clone()) {
                return Err(SchemaError::DuplicateColumn { name });
            }

            let element_type = decl.value_type.element_type();
            let multiplicity = decl.arity.multiplicity(decl.value_type);
            let per_record = if multiplicity.is_list() {
                list_of(element_type.clone())
            } else {
                element_type.clone()
            };

            let (data_type, nullable, source) = match sel.scope {
                FieldScope::Info => (
                    per_record,
                    decl.value_type != ValueType::Flag,
                    ColumnSource::Info(decl.clone()),
                ),
                FieldScope::Format => {
                    // Multi-sample output wraps the per-record shape in one
                    // more list level, one entry per sample.
                    let data_type = if single_sample.is_some() {
                        per_record
                    } else {
                        list_of(per_record)
                    };
                    (data_type, true, ColumnSource::Format(decl.clone()))
                }
            };

            fields.push(
                Field::new(&name, data_type.clone(), nullable)
                    .with_metadata(declaration_field_metadata(&decl)),
            );
            columns.push(OutputColumn {
                name,
                source,
                element_type,
                multiplicity,
                data_type,
            });
        }
    }

    let mut metadata = HashMap::new();
    metadata.insert(
        VCF_SAMPLE_NAMES_KEY.to_string(),
        registry.sample_names().join(","),
    );
    if let Some(version) = &registry.file_format {
        metadata.insert(VCF_FILE_FORMAT_KEY.to_string(), version.clone());
    }

    debug!(
        "built output schema: {} columns ({} selected fields), {} samples",
        columns.len(),
        selection.len(),
        registry.sample_names().len()
    );

    Ok(OutputSchema {
        columns,
        schema: Arc::new(Schema::new_with_metadata(fields, metadata)),
        sample_names: registry.sample_names().to_vec(),
        single_sample,
    })
}
