//! Arrow-backed table carrying an identity and a metadata side-store.

use std::{fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, RecordBatch, RecordBatchOptions},
    compute::kernels::filter::filter_record_batch,
    datatypes::{Field, Schema, SchemaRef},
};
use hopper_predicate::Predicate;
use ulid::Ulid;

use crate::{
    config::HopperConfig,
    error::{EvalError, FrameError, HopperError},
    eval::{self, EvalOptions},
    hopper::Hopper,
    metadata::Metadata,
    observability::log_debug,
};

/// Identity of a frame instance.
///
/// Every frame-deriving operation mints a new id; cloning a frame keeps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(Ulid);

impl FrameId {
    fn fresh() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An immutable record batch plus the metadata that travels with it.
#[derive(Clone, Debug)]
pub struct Frame {
    id: FrameId,
    batch: RecordBatch,
    metadata: Metadata,
}

impl Frame {
    /// Wrap a record batch with empty metadata.
    ///
    /// Schema metadata is kept as-is; hopper keys in it are not interpreted
    /// (use [`Frame::from_record_batch`] for that) and are dropped on export.
    #[must_use]
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            id: FrameId::fresh(),
            batch,
            metadata: Metadata::default(),
        }
    }

    /// Build a frame from named, equally long columns. All fields are nullable.
    pub fn from_columns<I, N>(columns: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (N, ArrayRef)>,
        N: Into<String>,
    {
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns
            .into_iter()
            .map(|(name, array)| {
                (
                    Field::new(name.into(), array.data_type().clone(), true),
                    array,
                )
            })
            .unzip();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self::new(batch))
    }

    /// Rebuild a frame from a batch produced by [`Frame::to_record_batch`].
    ///
    /// The hopper keys are stripped from the schema metadata and restored into
    /// the frame's own metadata. Batches without those keys come back with
    /// untouched metadata.
    pub fn from_record_batch(batch: RecordBatch) -> Result<Self, HopperError> {
        let schema = batch.schema();
        let mut schema_metadata = schema.metadata().clone();
        let metadata = Metadata::decode_from(&mut schema_metadata)?;
        let stripped = Arc::new(Schema::new_with_metadata(
            schema.fields().clone(),
            schema_metadata,
        ));
        let batch = rebuild(&batch, stripped)?;
        Ok(Self {
            id: FrameId::fresh(),
            batch,
            metadata,
        })
    }

    /// Export the batch with this frame's metadata embedded in the schema
    /// metadata, so any Arrow consumer carries the pending queue along.
    pub fn to_record_batch(&self) -> Result<RecordBatch, HopperError> {
        let schema = self.batch.schema();
        let mut schema_metadata = schema.metadata().clone();
        self.metadata.encode_into(&mut schema_metadata)?;
        let embedded = Arc::new(Schema::new_with_metadata(
            schema.fields().clone(),
            schema_metadata,
        ));
        Ok(rebuild(&self.batch, embedded)?)
    }

    /// Identity of this frame instance.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Underlying record batch.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in schema order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    /// True when a column called `name` exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().column_with_name(name).is_some()
    }

    /// Column called `name`, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Metadata attached to this frame.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable access to the metadata attached to this frame.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Attach a hopper with the default configuration.
    pub fn hopper(&mut self) -> Hopper<'_> {
        Hopper::attach(self, HopperConfig::default())
    }

    /// Attach a hopper with an explicit configuration.
    pub fn hopper_with(&mut self, config: HopperConfig) -> Hopper<'_> {
        Hopper::attach(self, config)
    }

    /// Keep the rows for which `predicate` is true.
    pub fn filter(&self, predicate: &Predicate) -> Result<Frame, EvalError> {
        self.filter_with(predicate, &EvalOptions::default())
    }

    /// Keep the rows for which `predicate` is true, with explicit options.
    pub fn filter_with(
        &self,
        predicate: &Predicate,
        options: &EvalOptions,
    ) -> Result<Frame, EvalError> {
        let mask = eval::evaluate(predicate, &self.batch, options)?;
        let batch = filter_record_batch(&self.batch, &mask)?;
        Ok(self.derive(batch))
    }

    /// Add `array` as column `name`, replacing a column of the same name in place.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Frame, FrameError> {
        if array.len() != self.num_rows() {
            return Err(FrameError::LengthMismatch {
                column: name.to_string(),
                expected: self.num_rows(),
                actual: array.len(),
            });
        }
        let schema = self.batch.schema();
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));
        let mut fields: Vec<_> = schema.fields().iter().cloned().collect();
        let mut columns = self.batch.columns().to_vec();
        match schema.index_of(name) {
            Ok(index) => {
                fields[index] = field;
                columns[index] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }
        let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        let batch = RecordBatch::try_new(schema, columns)?;
        Ok(self.derive(batch))
    }

    /// Keep only the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame, FrameError> {
        let schema = self.batch.schema_ref();
        let indices = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                schema
                    .index_of(name)
                    .map_err(|_| FrameError::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let batch = self.batch.project(&indices)?;
        Ok(self.derive(batch))
    }

    /// New frame identity over `batch`, inheriting a copy of this frame's metadata.
    fn derive(&self, batch: RecordBatch) -> Frame {
        let derived = Frame {
            id: FrameId::fresh(),
            batch,
            metadata: self.metadata.clone(),
        };
        log_debug!(
            component = "frame",
            event = "frame_derived",
            source = %self.id,
            derived = %derived.id,
            rows = derived.num_rows(),
            columns = derived.num_columns(),
        );
        derived
    }
}

/// Same columns and row count under a different schema.
fn rebuild(batch: &RecordBatch, schema: SchemaRef) -> Result<RecordBatch, FrameError> {
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        schema,
        batch.columns().to_vec(),
        &options,
    )?)
}
