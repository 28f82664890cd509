//! Parquet table encoding: an `id` column and a fixed-width `embedding`
//! column.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::dataset::{EmbeddingSet, ItemId};
use crate::embedding::vector::EmbeddingMatrix;
use crate::error::{PokembedError, Result};

pub const ID_COLUMN: &str = "id";
pub const EMBEDDING_COLUMN: &str = "embedding";

fn element_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Arrow schema of the table for embeddings of width `dimension`.
pub fn schema(dimension: usize) -> Result<SchemaRef> {
    let width = i32::try_from(dimension)
        .map_err(|_| PokembedError::format(format!("dimension {dimension} too large")))?;
    Ok(Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Int64, false),
        Field::new(
            EMBEDDING_COLUMN,
            DataType::FixedSizeList(element_field(), width),
            false,
        ),
    ])))
}

/// Build the Arrow record batch for a set.
pub fn to_record_batch(set: &EmbeddingSet) -> Result<RecordBatch> {
    let schema = schema(set.dimension())?;
    let width = set.dimension() as i32;

    let ids = Int64Array::from(set.ids().to_vec());
    let values = Float32Array::from(set.to_matrix().into_flat());
    let embeddings = FixedSizeListArray::try_new(element_field(), width, Arc::new(values), None)?;

    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(ids), Arc::new(embeddings)],
    )?)
}

/// Encode a set as an in-memory Parquet file.
pub fn encode(set: &EmbeddingSet) -> Result<Vec<u8>> {
    let batch = to_record_batch(set)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buffer)
}

/// Read a Parquet embedding table back into a set.
pub fn read<P: AsRef<Path>>(path: P) -> Result<EmbeddingSet> {
    let (ids, matrix) = read_raw(path)?;
    EmbeddingSet::from_parts(ids, matrix)
}

/// Read the raw `id` and `embedding` columns, keeping duplicate ids.
pub fn read_raw<P: AsRef<Path>>(path: P) -> Result<(Vec<ItemId>, EmbeddingMatrix)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PokembedError::not_found(path),
        _ => PokembedError::Io(e),
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let dimension = match builder.schema().field_with_name(EMBEDDING_COLUMN)?.data_type() {
        DataType::FixedSizeList(_, width) => *width as usize,
        other => {
            return Err(PokembedError::format(format!(
                "column {EMBEDDING_COLUMN} has type {other}, expected a fixed-size list"
            )));
        }
    };

    let mut ids: Vec<ItemId> = Vec::new();
    let mut values: Vec<f32> = Vec::new();

    for batch in builder.build()? {
        let batch = batch?;
        let id_column = batch
            .column_by_name(ID_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| PokembedError::format("missing or non-int64 id column"))?;
        let embedding_column = batch
            .column_by_name(EMBEDDING_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| PokembedError::format("missing embedding column"))?;

        for row in 0..batch.num_rows() {
            if id_column.is_null(row) || embedding_column.is_null(row) {
                return Err(PokembedError::format(format!("null value in row {row}")));
            }
            ids.push(id_column.value(row));

            let list = embedding_column.value(row);
            let floats = list
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| PokembedError::format("embedding values are not float32"))?;
            values.extend_from_slice(floats.values());
        }
    }

    Ok((ids, EmbeddingMatrix::from_flat(dimension, values)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::vector::Embedding;

    #[test]
    fn test_record_batch_shape() {
        let mut set = EmbeddingSet::new(3);
        set.push(7, Embedding::new(vec![1.0, 0.0, 0.0])).unwrap();
        set.push(8, Embedding::new(vec![0.0, 0.6, 0.8])).unwrap();

        let batch = to_record_batch(&set).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(
            batch.schema().field(1).data_type(),
            &DataType::FixedSizeList(element_field(), 3)
        );
    }

    #[test]
    fn test_raw_read_keeps_duplicate_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dup.parquet");

        let ids = Int64Array::from(vec![5, 5, 6]);
        let values = Float32Array::from(vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8]);
        let embeddings =
            FixedSizeListArray::try_new(element_field(), 2, Arc::new(values), None).unwrap();
        let batch =
            RecordBatch::try_new(schema(2).unwrap(), vec![Arc::new(ids), Arc::new(embeddings)])
                .unwrap();
        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        std::fs::write(&path, buffer).unwrap();

        let (ids, matrix) = read_raw(&path).unwrap();
        assert_eq!(ids, vec![5, 5, 6]);
        assert_eq!(matrix.rows(), 3);
        assert!(read(&path).is_err());
    }

    #[test]
    fn test_schema_column_names() {
        let schema = schema(512).unwrap();
        assert_eq!(schema.field(0).name(), ID_COLUMN);
        assert_eq!(schema.field(1).name(), EMBEDDING_COLUMN);
    }
}
