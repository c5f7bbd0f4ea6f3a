//! LanceDB-backed vector index implementation.

use crate::types::{IndexRecord, ScoredFragment};
use crate::vector_index::VectorIndex;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use qakb_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

/// Table holding the current snapshot.
pub const TABLE_NAME: &str = "fragments";

/// Largest possible cosine distance, used for rows the backend scored as NaN.
const MAX_COSINE_DISTANCE: f32 = 2.0;

/// LanceDB-backed vector index for knowledge fragments.
pub struct LanceDbIndex {
    conn: Connection,
    embedding_dim: usize,
}

impl LanceDbIndex {
    /// Open (or prepare) a LanceDB index at the specified directory.
    ///
    /// The table itself is created by the first [`VectorIndex::replace_all`].
    pub async fn open(db_path: &Path, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path)?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        tracing::debug!("Opened LanceDB index at {:?}", db_path);

        Ok(Self {
            conn,
            embedding_dim,
        })
    }

    /// Arrow schema of the fragments table.
    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("seq", DataType::UInt64, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert records into a single Arrow RecordBatch.
    fn records_to_batch(&self, records: &[IndexRecord]) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(self.embedding_dim);

        let mut values = Vec::with_capacity(records.len() * self.embedding_dim);
        for record in records {
            if record.vector.len() != self.embedding_dim {
                return Err(AppError::Config(format!(
                    "Embedding dimension mismatch for {}: expected {}, got {}",
                    record.fragment.id,
                    self.embedding_dim,
                    record.vector.len()
                )));
            }
            values.extend_from_slice(&record.vector);
        }

        let ids = StringArray::from_iter_values(records.iter().map(|r| r.fragment.id.as_str()));
        let seqs = UInt64Array::from_iter_values(records.iter().map(|r| r.fragment.seq));
        let sources =
            StringArray::from_iter_values(records.iter().map(|r| r.fragment.source.as_str()));
        let pages = UInt32Array::from_iter_values(records.iter().map(|r| r.fragment.page));
        let texts = StringArray::from_iter_values(records.iter().map(|r| r.fragment.text.as_str()));

        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Index(format!("Failed to create vector column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(seqs),
                Arc::new(sources),
                Arc::new(pages),
                Arc::new(texts),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Open the fragments table, or `None` when no snapshot was ever written.
    async fn open_table(&self) -> AppResult<Option<Table>> {
        let table_names = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Ok(None);
        }

        let table = self
            .conn
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to open table: {}", e)))?;

        Ok(Some(table))
    }

    /// Write an empty snapshot, creating or truncating the table.
    async fn write_empty(&self) -> AppResult<()> {
        self.conn
            .create_empty_table(TABLE_NAME, Self::create_schema(self.embedding_dim))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| AppError::IndexUnavailable(format!("Failed to reset table: {}", e)))?;
        Ok(())
    }
}

/// Nearest `limit` rows to `vector`, ordered by (distance, seq).
async fn search(
    table: &Table,
    vector: &[f32],
    limit: usize,
) -> AppResult<Vec<(u64, ScoredFragment)>> {
    let batches: Vec<RecordBatch> = table
        .query()
        .nearest_to(vector.to_vec())
        .map_err(|e| AppError::Index(format!("Failed to create query: {}", e)))?
        .distance_type(DistanceType::Cosine)
        .limit(limit)
        .execute()
        .await
        .map_err(|e| AppError::Index(format!("Failed to execute search: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| AppError::Index(format!("Failed to collect results: {}", e)))?;

    let mut scored = Vec::new();
    for batch in &batches {
        batch_to_scored(batch, &mut scored)?;
    }

    scored.sort_by(|(seq_a, a), (seq_b, b)| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then(seq_a.cmp(seq_b))
    });
    Ok(scored)
}

/// Pull the result rows out of one query batch.
fn batch_to_scored(batch: &RecordBatch, out: &mut Vec<(u64, ScoredFragment)>) -> AppResult<()> {
    let seqs = batch
        .column_by_name("seq")
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| AppError::Index("Invalid seq column".to_string()))?;

    let sources = batch
        .column_by_name("source")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Index("Invalid source column".to_string()))?;

    let texts = batch
        .column_by_name("text")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Index("Invalid text column".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| AppError::Index("Missing _distance column".to_string()))?;

    for row in 0..batch.num_rows() {
        let distance = if distances.is_null(row) || distances.value(row).is_nan() {
            MAX_COSINE_DISTANCE
        } else {
            distances.value(row)
        };

        out.push((
            seqs.value(row),
            ScoredFragment {
                text: texts.value(row).to_string(),
                source: sources.value(row).to_string(),
                distance,
            },
        ));
    }

    Ok(())
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    async fn replace_all(&mut self, records: Vec<IndexRecord>) -> AppResult<()> {
        if records.is_empty() {
            return self.write_empty().await;
        }

        let batch = self.records_to_batch(&records)?;
        let schema = batch.schema();

        // Overwrite commits a new table version in one step.
        self.conn
            .create_table(
                TABLE_NAME,
                RecordBatchIterator::new(vec![Ok(batch)], schema),
            )
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| {
                AppError::IndexUnavailable(format!("Failed to write fragments table: {}", e))
            })?;

        tracing::debug!("Replaced LanceDB snapshot with {} fragments", records.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredFragment>> {
        if vector.len() != self.embedding_dim {
            return Err(AppError::Config(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                vector.len()
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_table().await? else {
            tracing::debug!("No fragments table, returning no results");
            return Ok(Vec::new());
        };

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        // Widen the search until no unseen row can tie with the k-th result.
        let mut limit = k.saturating_add(1).min(rows);
        let mut scored = loop {
            let scored = search(&table, vector, limit).await?;
            if limit >= rows || scored.len() < limit {
                break scored;
            }
            let kth = scored[k - 1].1.distance;
            let last = scored[scored.len() - 1].1.distance;
            if last > kth {
                break scored;
            }
            limit = limit.saturating_mul(2).min(rows);
        };
        scored.truncate(k);

        tracing::debug!("Retrieved {} fragments (requested top-{})", scored.len(), k);

        Ok(scored.into_iter().map(|(_, fragment)| fragment).collect())
    }

    async fn count(&self) -> AppResult<usize> {
        match self.open_table().await? {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e))),
            None => Ok(0),
        }
    }

    async fn clear(&mut self) -> AppResult<()> {
        if self.open_table().await?.is_some() {
            self.write_empty().await?;
        }

        tracing::info!("Cleared LanceDB index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fragment;
    use tempfile::TempDir;

    fn record(seq: u64, source: &str, text: &str, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            fragment: Fragment {
                id: Fragment::id_for(seq),
                seq,
                source: source.to_string(),
                page: 0,
                text: text.to_string(),
            },
            vector,
        }
    }

    fn axis_records() -> Vec<IndexRecord> {
        vec![
            record(0, "x.txt", "along x", vec![1.0, 0.0, 0.0]),
            record(1, "y.txt", "along y", vec![0.0, 1.0, 0.0]),
            record(2, "xy.txt", "between x and y", vec![0.7, 0.7, 0.0]),
        ]
    }

    #[tokio::test]
    async fn test_query_missing_table_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::open(&temp.path().join("index"), 3)
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_query_ordering() {
        let temp = TempDir::new().unwrap();
        let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
        index.replace_all(axis_records()).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 3);

        let results = index.query(&[1.0, 0.1, 0.0], 3).await.unwrap();
        let sources: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["x.txt", "xy.txt", "y.txt"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

        let top = index.query(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].text, "along y");
    }

    #[tokio::test]
    async fn test_replace_discards_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
        index.replace_all(axis_records()).await.unwrap();
        index
            .replace_all(vec![record(0, "z.txt", "along z", vec![0.0, 0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "z.txt");
    }

    #[tokio::test]
    async fn test_zero_k_and_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
        index.replace_all(axis_records()).await.unwrap();

        assert!(index.query(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());

        let err = index.query(&[1.0, 0.0], 2).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let bad = vec![record(0, "bad.txt", "short", vec![1.0])];
        assert!(matches!(
            index.replace_all(bad).await,
            Err(AppError::Config(_))
        ));
        // A rejected batch leaves the snapshot untouched.
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ties_beyond_k_ordered_by_seq() {
        let temp = TempDir::new().unwrap();
        let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();

        // Reverse insertion so storage order disagrees with seq order.
        let records: Vec<IndexRecord> = (0..200u64)
            .rev()
            .map(|seq| record(seq, &format!("s{}", seq), "same", vec![1.0, 0.0, 0.0]))
            .collect();
        index.replace_all(records).await.unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap();
        let sources: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["s0", "s1", "s2"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
        index.replace_all(axis_records()).await.unwrap();

        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
            index.replace_all(axis_records()).await.unwrap();
        }

        let index = LanceDbIndex::open(temp.path(), 3).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
    }
}
