//! Upload streaming (§4.8, §5): writes an incoming byte stream to a temp
//! file in bounded chunks, aborting as soon as the declared maximum is
//! exceeded rather than after the whole body has landed on disk. The
//! counting wrapper mirrors the teacher's `CountingReader` (`src/utils.rs`)
//! adapted to the write side and to async I/O.

use std::path::{Path, PathBuf};

use futures::Stream;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::{Result, RowledgerError};
use crate::model::dataset::DatasetId;

/// Streams `body` (a sequence of byte chunks, as axum's multipart field
/// yields) into a uniquely named file under `dir`, enforcing `max_bytes`
/// incrementally. Returns the path the worker should read from.
pub async fn stream_to_temp_file<S, E>(
    dir: &Path,
    dataset_id: DatasetId,
    filename: &str,
    max_bytes: u64,
    mut body: S,
) -> Result<PathBuf>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    tokio::fs::create_dir_all(dir).await?;
    // Unique per upload so concurrent uploads for the same dataset never
    // collide on a path (§5 "each upload has a unique filename").
    let path = dir.join(format!("{dataset_id}-{}-{filename}", Uuid::new_v4()));

    let mut file = File::create(&path).await?;
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| RowledgerError::Storage(e.to_string()))?;
        bytes_written += chunk.len() as u64;
        if bytes_written > max_bytes {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(RowledgerError::FileTooLarge {
                limit_bytes: max_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn writes_every_chunk_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"id,name\n")),
            Ok(bytes::Bytes::from_static(b"1,Ana\n")),
        ];
        let path = stream_to_temp_file(
            dir.path(),
            DatasetId(1),
            "people.csv",
            1024,
            stream::iter(chunks),
        )
        .await
        .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "id,name\n1,Ana\n");
    }

    #[tokio::test]
    async fn aborts_and_cleans_up_once_the_bound_is_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> =
            vec![Ok(bytes::Bytes::from_static(b"0123456789"))];
        let result = stream_to_temp_file(
            dir.path(),
            DatasetId(1),
            "big.csv",
            4,
            stream::iter(chunks),
        )
        .await;

        assert!(matches!(result, Err(RowledgerError::FileTooLarge { limit_bytes: 4 })));
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
