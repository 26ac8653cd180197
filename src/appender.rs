//! Column Appender: one Arrow builder per output column, filled in lockstep,
//! finalized once per scan.

use crate::error::FlattenError;
use crate::flatten::FlatValue;
use crate::header::OutputSchema;
use arrow::array::{
    ArrayBuilder, ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, ListBuilder,
    StringBuilder,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Builder wrapper covering every column shape the output schema can declare:
/// scalars, per-record lists, and per-sample lists of lists.
#[derive(Debug)]
pub enum ColumnBuilder {
    /// Builder for Int64 scalar values.
    Int64(Int64Builder),
    /// Builder for Float64 scalar values.
    Float64(Float64Builder),
    /// Builder for Boolean scalar values.
    Boolean(BooleanBuilder),
    /// Builder for UTF8 scalar values.
    Utf8(StringBuilder),
    /// Builder for Int64 list values.
    Int64List(ListBuilder<Int64Builder>),
    /// Builder for Float64 list values.
    Float64List(ListBuilder<Float64Builder>),
    /// Builder for UTF8 list values.
    Utf8List(ListBuilder<StringBuilder>),
    /// Builder for per-sample Int64 lists.
    Int64ListList(ListBuilder<ListBuilder<Int64Builder>>),
    /// Builder for per-sample Float64 lists.
    Float64ListList(ListBuilder<ListBuilder<Float64Builder>>),
    /// Builder for per-sample UTF8 lists.
    Utf8ListList(ListBuilder<ListBuilder<StringBuilder>>),
}

impl ColumnBuilder {
    /// Creates a builder for one output column's Arrow type.
    ///
    /// # Errors
    ///
    /// Returns an internal fault for a data type no schema builder produces.
    pub fn new(data_type: &DataType, capacity: usize) -> Result<ColumnBuilder, FlattenError> {
        let unsupported = || {
            FlattenError::Internal(format!(
                "no column builder for data type {data_type:?}"
            ))
        };
        match data_type {
            DataType::Int64 => Ok(ColumnBuilder::Int64(Int64Builder::with_capacity(capacity))),
            DataType::Float64 => Ok(ColumnBuilder::Float64(Float64Builder::with_capacity(
                capacity,
            ))),
            DataType::Boolean => Ok(ColumnBuilder::Boolean(BooleanBuilder::with_capacity(
                capacity,
            ))),
            DataType::Utf8 => Ok(ColumnBuilder::Utf8(StringBuilder::with_capacity(
                capacity,
                capacity * 8,
            ))),
            DataType::List(item) => match item.data_type() {
                DataType::Int64 => Ok(ColumnBuilder::Int64List(ListBuilder::with_capacity(
                    Int64Builder::new(),
                    capacity,
                ))),
                DataType::Float64 => Ok(ColumnBuilder::Float64List(ListBuilder::with_capacity(
                    Float64Builder::new(),
                    capacity,
                ))),
                DataType::Utf8 => Ok(ColumnBuilder::Utf8List(ListBuilder::with_capacity(
                    StringBuilder::new(),
                    capacity,
                ))),
                DataType::List(inner) => match inner.data_type() {
                    DataType::Int64 => Ok(ColumnBuilder::Int64ListList(
                        ListBuilder::with_capacity(ListBuilder::new(Int64Builder::new()), capacity),
                    )),
                    DataType::Float64 => Ok(ColumnBuilder::Float64ListList(
                        ListBuilder::with_capacity(
                            ListBuilder::new(Float64Builder::new()),
                            capacity,
                        ),
                    )),
                    DataType::Utf8 => Ok(ColumnBuilder::Utf8ListList(ListBuilder::with_capacity(
                        ListBuilder::new(StringBuilder::new()),
                        capacity,
                    ))),
                    _ => Err(unsupported()),
                },
                _ => Err(unsupported()),
            },
            _ => Err(unsupported()),
        }
    }

    /// Appends one flat value. A value whose shape does not match this
    /// builder is an internal consistency fault.
    pub fn append(&mut self, value: &FlatValue) -> Result<(), FlattenError> {
        match (self, value) {
            (builder, FlatValue::Missing) => builder.append_null(),
            (ColumnBuilder::Int64(b), FlatValue::Int(v)) => {
                b.append_value(*v);
                Ok(())
            }
            (ColumnBuilder::Float64(b), FlatValue::Float(v)) => {
                b.append_value(*v);
                Ok(())
            }
            (ColumnBuilder::Boolean(b), FlatValue::Bool(v)) => {
                b.append_value(*v);
                Ok(())
            }
            (ColumnBuilder::Utf8(b), FlatValue::Str(v)) => {
                b.append_value(v);
                Ok(())
            }
            (ColumnBuilder::Int64List(b), FlatValue::IntList(values)) => {
                for v in values {
                    b.values().append_option(*v);
                }
                b.append(true);
                Ok(())
            }
            (ColumnBuilder::Float64List(b), FlatValue::FloatList(values)) => {
                for v in values {
                    b.values().append_option(*v);
                }
                b.append(true);
                Ok(())
            }
            (ColumnBuilder::Utf8List(b), FlatValue::StrList(values)) => {
                for v in values {
                    b.values().append_option(v.as_deref());
                }
                b.append(true);
                Ok(())
            }
            (ColumnBuilder::Int64ListList(b), FlatValue::IntListList(samples)) => {
                for sample in samples {
                    match sample {
                        Some(values) => {
                            for v in values {
                                b.values().values().append_option(*v);
                            }
                            b.values().append(true);
                        }
                        None => b.values().append_null(),
                    }
                }
                b.append(true);
                Ok(())
            }
            (ColumnBuilder::Float64ListList(b), FlatValue::FloatListList(samples)) => {
                for sample in samples {
                    match sample {
                        Some(values) => {
                            for v in values {
                                b.values().values().append_option(*v);
                            }
                            b.values().append(true);
                        }
                        None => b.values().append_null(),
                    }
                }
                b.append(true);
                Ok(())
            }
            (ColumnBuilder::Utf8ListList(b), FlatValue::StrListList(samples)) => {
                for sample in samples {
                    match sample {
                        Some(values) => {
                            for v in values {
                                b.values().values().append_option(v.as_deref());
                            }
                            b.values().append(true);
                        }
                        None => b.values().append_null(),
                    }
                }
                b.append(true);
                Ok(())
            }
            (builder, value) => Err(FlattenError::Internal(format!(
                "value shape {:?} does not match builder {:?}",
                value, builder
            ))),
        }
    }

    fn append_null(&mut self) -> Result<(), FlattenError> {
        match self {
            ColumnBuilder::Int64(b) => b.append_null(),
            ColumnBuilder::Float64(b) => b.append_null(),
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Int64List(b) => b.append_null(),
            ColumnBuilder::Float64List(b) => b.append_null(),
            ColumnBuilder::Utf8List(b) => b.append_null(),
            ColumnBuilder::Int64ListList(b) => b.append_null(),
            ColumnBuilder::Float64ListList(b) => b.append_null(),
            ColumnBuilder::Utf8ListList(b) => b.append_null(),
        }
        Ok(())
    }

    fn len(&self) -> usize {
        match self {
            ColumnBuilder::Int64(b) => b.len(),
            ColumnBuilder::Float64(b) => b.len(),
            ColumnBuilder::Boolean(b) => b.len(),
            ColumnBuilder::Utf8(b) => b.len(),
            ColumnBuilder::Int64List(b) => b.len(),
            ColumnBuilder::Float64List(b) => b.len(),
            ColumnBuilder::Utf8List(b) => b.len(),
            ColumnBuilder::Int64ListList(b) => b.len(),
            ColumnBuilder::Float64ListList(b) => b.len(),
            ColumnBuilder::Utf8ListList(b) => b.len(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64List(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64List(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8List(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64ListList(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64ListList(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8ListList(b) => Arc::new(b.finish()),
        }
    }
}

/// The full builder set for one scan: one builder per output column, appended
/// in lockstep, finalized exactly once.
pub struct ColumnSet {
    builders: Vec<ColumnBuilder>,
    rows: usize,
    finished: bool,
}

impl ColumnSet {
    /// Creates one builder per column of `schema`.
    pub fn new(schema: &OutputSchema, capacity: usize) -> Result<ColumnSet, FlattenError> {
        let builders = schema
            .columns()
            .iter()
            .map(|c| ColumnBuilder::new(&c.data_type, capacity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnSet {
            builders,
            rows: 0,
            finished: false,
        })
    }

    /// Number of rows appended so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Appends one flattened row, one value per column in schema order.
    ///
    /// After the append, every builder must hold exactly `rows` values;
    /// drift means a flattener bug and aborts the scan.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError::Internal`] on row-length mismatch, value/builder
    /// shape mismatch, builder length drift, or append-after-finish.
    pub fn append_row(&mut self, row: &[FlatValue]) -> Result<(), FlattenError> {
        if self.finished {
            return Err(FlattenError::Internal(
                "append after finalize".to_string(),
            ));
        }
        if row.len() != self.builders.len() {
            return Err(FlattenError::Internal(format!(
                "row has {} values but the schema has {} columns",
                row.len(),
                self.builders.len()
            )));
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.append(value)?;
        }
        self.rows += 1;
        for (i, builder) in self.builders.iter().enumerate() {
            if builder.len() != self.rows {
                return Err(FlattenError::Internal(format!(
                    "builder {} holds {} values after {} rows",
                    i,
                    builder.len(),
                    self.rows
                )));
            }
        }
        Ok(())
    }

    /// Finalizes every builder into an immutable record batch.
    ///
    /// # Errors
    ///
    /// Returns [`FlattenError::Internal`] when called twice, and propagates
    /// Arrow errors from batch assembly.
    pub fn finish(
        &mut self,
        schema: arrow::datatypes::SchemaRef,
    ) -> Result<RecordBatch, FlattenError> {
        if self.finished {
            return Err(FlattenError::Internal(
                "columns already finalized".to_string(),
            ));
        }
        self.finished = true;
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}
