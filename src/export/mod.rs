//! CSV serialization and chunked object-storage upload of flat rows.
//!
//! Column names are the sorted union of keys across all rows; a row missing
//! a column gets an empty cell. The output schema is therefore whatever keys
//! the data produced, not a fixed contract.

use crate::normalize::FlatRow;
use crate::{Error, Result};

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Sorted union of column names across all rows.
pub fn field_names(rows: &[FlatRow]) -> Vec<String> {
    let mut names = BTreeSet::new();
    for row in rows {
        for key in row.keys() {
            names.insert(key.clone());
        }
    }
    names.into_iter().collect()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize rows to CSV bytes with the given header.
pub fn csv_bytes(rows: &[FlatRow], fields: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    for row in rows {
        let record: Vec<String> = fields
            .iter()
            .map(|field| row.get(field).map(cell_text).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Write all rows to a local CSV file.
pub fn write_csv_file(path: impl AsRef<Path>, rows: &[FlatRow]) -> Result<()> {
    let path = path.as_ref();
    let fields = field_names(rows);
    let bytes = csv_bytes(rows, &fields)?;
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), rows = rows.len(), columns = fields.len(), "Wrote CSV");
    Ok(())
}

/// Upload rows to the object store as fixed-size CSV chunks named
/// `<folder>/<stem>_<index>.csv`. Every chunk is a standalone CSV with the
/// full header. Returns the number of chunks uploaded.
pub async fn upload_chunks(
    store: &dyn ObjectStore,
    folder: &str,
    filename: &str,
    rows: &[FlatRow],
    chunk_size: usize,
) -> Result<usize> {
    if rows.is_empty() || chunk_size == 0 {
        return Ok(0);
    }
    let fields = field_names(rows);
    let stem = filename.strip_suffix(".csv").unwrap_or(filename);
    let folder = folder.trim_end_matches('/');

    let mut uploaded = 0;
    for (index, chunk) in rows.chunks(chunk_size).enumerate() {
        let bytes = csv_bytes(chunk, &fields)?;
        let key = StorePath::from(format!("{folder}/{stem}_{index}.csv"));
        store
            .put(&key, PutPayload::from(Bytes::from(bytes)))
            .await?;
        info!(key = %key, rows = chunk.len(), "Uploaded CSV chunk");
        uploaded += 1;
    }
    Ok(uploaded)
}

/// Upload backend selected from environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageBackend {
    Memory,
    S3,
}

/// A configured upload enables S3 unless `STORAGE_BACKEND=memory` opts
/// into the process-local development store.
fn resolve_backend(raw: Option<&str>) -> Result<StorageBackend> {
    match raw {
        None => Ok(StorageBackend::S3),
        Some("s3") => Ok(StorageBackend::S3),
        Some("memory") => Ok(StorageBackend::Memory),
        Some(other) => Err(Error::Config(format!(
            "Unknown STORAGE_BACKEND: {other}. Use 'memory' or 's3'"
        ))),
    }
}

/// Create the upload target from environment.
///
/// Defaults to a real S3 client for `bucket`, honoring `S3_REGION`,
/// `S3_ENDPOINT`, and the usual AWS credential variables.
/// `STORAGE_BACKEND=memory` overrides to an in-memory store for
/// development; uploads there never leave the process.
pub fn create_object_store(bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let raw = std::env::var("STORAGE_BACKEND").ok();
    match resolve_backend(raw.as_deref())? {
        StorageBackend::Memory => {
            warn!("STORAGE_BACKEND=memory: uploads go to a process-local store and are discarded at exit");
            Ok(Arc::new(InMemory::new()))
        }
        StorageBackend::S3 => {
            let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            info!(bucket = %bucket, region = %region, "Using S3 object store");

            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_region(&region);
            if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
                builder = builder.with_endpoint(&endpoint).with_allow_http(true);
            }
            Ok(Arc::new(builder.build()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> FlatRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_field_names_are_sorted_union() {
        let rows = vec![
            row(&[("zeta", json!(1)), ("alpha", json!(2))]),
            row(&[("mid", json!(3))]),
        ];
        assert_eq!(field_names(&rows), ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_csv_missing_cells_are_empty() {
        let rows = vec![
            row(&[("a", json!(1)), ("b", json!("x"))]),
            row(&[("b", json!("y"))]),
        ];
        let fields = field_names(&rows);
        let bytes = csv_bytes(&rows, &fields).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("a,b"));
        assert_eq!(lines.next(), Some("1,x"));
        assert_eq!(lines.next(), Some(",y"));
    }

    #[test]
    fn test_csv_round_trips_through_reader() {
        let rows = vec![row(&[
            ("cluster_health_score", json!("Green")),
            ("x_byLabelMode_a", json!(15.0)),
        ])];
        let fields = field_names(&rows);
        let bytes = csv_bytes(&rows, &fields).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert!(headers.iter().any(|h| h == "cluster_health_score"));
        let record = reader.records().next().unwrap().unwrap();
        assert!(record.iter().any(|c| c == "Green"));
    }

    #[tokio::test]
    async fn test_upload_chunks_splits_rows() {
        let store = InMemory::new();
        let rows: Vec<FlatRow> = (0..5).map(|i| row(&[("n", json!(i))])).collect();

        let uploaded = upload_chunks(&store, "weekly/", "runs.csv", &rows, 2)
            .await
            .unwrap();
        assert_eq!(uploaded, 3, "5 rows at chunk size 2 give 3 chunks");

        let first = store
            .get(&StorePath::from("weekly/runs_0.csv"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.starts_with("n\n"), "each chunk carries the header");

        let last = store.get(&StorePath::from("weekly/runs_2.csv")).await;
        assert!(last.is_ok());
    }

    #[test]
    fn test_backend_defaults_to_s3_when_unset() {
        assert_eq!(resolve_backend(None).unwrap(), StorageBackend::S3);
    }

    #[test]
    fn test_memory_backend_requires_explicit_override() {
        assert_eq!(
            resolve_backend(Some("memory")).unwrap(),
            StorageBackend::Memory
        );
        assert_eq!(resolve_backend(Some("s3")).unwrap(), StorageBackend::S3);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        assert!(matches!(
            resolve_backend(Some("disk")),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_no_rows_is_a_noop() {
        let store = InMemory::new();
        let uploaded = upload_chunks(&store, "weekly", "runs.csv", &[], 100)
            .await
            .unwrap();
        assert_eq!(uploaded, 0);
    }
}
