//! Batch export: render selected photos with their overlay and package them.
//!
//! A single selected photo is rendered in-process and returned as one JPEG.
//! Two or more go through the worker [`Dispatcher`] one at a time, in the
//! order given, and land in a store-only zip. One item never runs while
//! another is still in flight, which bounds memory to a single decoded image.
//!
//! Per-item failures (missing record, undecodable image, worker timeout) are
//! counted and logged; they do not stop the batch. A batch where nothing
//! succeeded is an error and yields no archive.
//!
//! Progress is reported through an optional event channel, the same pattern
//! the CLI uses for every long-running operation.

use crate::imaging::exif::EXIF_DATETIME_FORMAT;
use crate::imaging::{ImageBackend, TransformConfig, TransformError, render_export};
use crate::naming::{archive_file_name, export_file_name};
use crate::store::{PhotoStore, StoreError};
use crate::worker::{DispatchError, Dispatcher, Processor};
use chrono::{Local, Utc};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no photos selected")]
    NothingSelected,
    #[error("photo {0} not found")]
    NotFound(i64),
    #[error("every photo in the batch failed ({failed} failures)")]
    AllFailed { failed: usize },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("render error: {0}")]
    Transform(#[from] TransformError),
    #[error("worker error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Naming and rendering settings for exports.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub prefix: String,
    pub archive_prefix: String,
    pub transform: TransformConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prefix: "GDR".to_string(),
            archive_prefix: "GDR_CAM_Pack".to_string(),
            transform: TransformConfig::default(),
        }
    }
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Started { total: usize },
    ItemExported { index: usize, id: i64, file_name: String },
    ItemFailed { index: usize, id: i64, reason: String },
    Finished { succeeded: usize, failed: usize },
}

/// What an export produced.
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Single {
        file_name: String,
        bytes: Vec<u8>,
    },
    Archive {
        file_name: String,
        bytes: Vec<u8>,
        succeeded: usize,
        failed: usize,
    },
}

impl ExportOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            ExportOutcome::Single { file_name, .. } | ExportOutcome::Archive { file_name, .. } => {
                file_name
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            ExportOutcome::Single { bytes, .. } | ExportOutcome::Archive { bytes, .. } => bytes,
        }
    }

    /// `(succeeded, failed)`; a single export that returned is one success.
    pub fn counts(&self) -> (usize, usize) {
        match self {
            ExportOutcome::Single { .. } => (1, 0),
            ExportOutcome::Archive {
                succeeded, failed, ..
            } => (*succeeded, *failed),
        }
    }

    /// Write the result into `dir` under its own file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.bytes())?;
        Ok(path)
    }
}

fn stored() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
}

/// Worker processor that renders the export version of a photo.
///
/// The worker only sees bytes, so photos without a capture time in their
/// metadata are stamped with the render time.
pub fn render_processor<B: ImageBackend + 'static>(
    backend: Arc<B>,
    config: TransformConfig,
) -> Processor {
    Box::new(move |bytes: &[u8]| {
        let fallback = Local::now().format(EXIF_DATETIME_FORMAT).to_string();
        render_export(backend.as_ref(), bytes, &fallback, &config).map_err(|e| e.to_string())
    })
}

/// Drives exports against one store.
pub struct Exporter<B: ImageBackend + 'static> {
    store: PhotoStore,
    backend: Arc<B>,
    dispatcher: Dispatcher,
    config: ExportConfig,
}

impl<B: ImageBackend + 'static> Exporter<B> {
    pub fn new(
        store: PhotoStore,
        backend: Arc<B>,
        dispatcher: Dispatcher,
        config: ExportConfig,
    ) -> Self {
        Self {
            store,
            backend,
            dispatcher,
            config,
        }
    }

    /// Export `ids`. Duplicate ids are exported once, at their first position.
    pub async fn export_selected(
        &self,
        ids: &[i64],
        events: Option<Sender<ExportEvent>>,
    ) -> Result<ExportOutcome> {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        match ids.as_slice() {
            [] => Err(ExportError::NothingSelected),
            [id] => self.export_one(*id).await,
            _ => self.export_batch(&ids, events).await,
        }
    }

    async fn export_one(&self, id: i64) -> Result<ExportOutcome> {
        let record = self.store.get(id).await?.ok_or(ExportError::NotFound(id))?;
        let bytes = render_export(
            self.backend.as_ref(),
            &record.image,
            &record.display_date,
            &self.config.transform,
        )?;
        let file_name = export_file_name(&self.config.prefix, record.captured_at_ms, id);
        info!(id, %file_name, "exported photo");
        Ok(ExportOutcome::Single { file_name, bytes })
    }

    async fn render_item(&self, id: i64) -> Result<(String, Vec<u8>)> {
        let record = self.store.get(id).await?.ok_or(ExportError::NotFound(id))?;
        let file_name = export_file_name(&self.config.prefix, record.captured_at_ms, id);
        let bytes = self.dispatcher.submit(id, record.image).await?;
        Ok((file_name, bytes))
    }

    async fn export_batch(
        &self,
        ids: &[i64],
        events: Option<Sender<ExportEvent>>,
    ) -> Result<ExportOutcome> {
        let emit = |event: ExportEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };
        emit(ExportEvent::Started { total: ids.len() });

        let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
        let (mut succeeded, mut failed) = (0, 0);

        for (index, &id) in ids.iter().enumerate() {
            match self.render_item(id).await {
                Ok((file_name, bytes)) => {
                    archive.start_file(file_name.as_str(), stored())?;
                    archive.write_all(&bytes)?;
                    succeeded += 1;
                    debug!(id, %file_name, "added to archive");
                    emit(ExportEvent::ItemExported {
                        index,
                        id,
                        file_name,
                    });
                }
                Err(e) => {
                    failed += 1;
                    warn!(id, error = %e, "export item failed");
                    emit(ExportEvent::ItemFailed {
                        index,
                        id,
                        reason: e.to_string(),
                    });
                }
            }
            tokio::task::yield_now().await;
        }

        emit(ExportEvent::Finished { succeeded, failed });
        if succeeded == 0 {
            return Err(ExportError::AllFailed { failed });
        }

        let bytes = archive.finish()?.into_inner();
        let file_name = archive_file_name(&self.config.archive_prefix, Utc::now().timestamp_millis());
        info!(succeeded, failed, %file_name, "batch export finished");
        Ok(ExportOutcome::Archive {
            file_name,
            bytes,
            succeeded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{RustBackend, exif};
    use crate::test_helpers::{sample_block, sample_metadata, tagged_jpeg, temp_store};
    use crate::worker::DEFAULT_TIMEOUT;
    use std::io::Read;
    use std::sync::mpsc::channel;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn exporter(store: PhotoStore) -> Exporter<RustBackend> {
        let backend = Arc::new(RustBackend::new());
        let dispatcher = Dispatcher::spawn(
            render_processor(Arc::clone(&backend), TransformConfig::default()),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        Exporter::new(store, backend, dispatcher, ExportConfig::default())
    }

    fn open_zip(bytes: &[u8]) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap()
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let (_tmp, store) = temp_store();
        let err = exporter(store).export_selected(&[], None).await.unwrap_err();
        assert!(matches!(err, ExportError::NothingSelected));
    }

    #[tokio::test]
    async fn single_photo_exports_named_jpeg_with_metadata() {
        let (_tmp, store) = temp_store();
        let id = store
            .insert(tagged_jpeg(160, 90), sample_metadata())
            .await
            .unwrap();
        let record = store.get(id).await.unwrap().unwrap();

        let outcome = exporter(store).export_selected(&[id], None).await.unwrap();
        let ExportOutcome::Single { file_name, bytes } = outcome else {
            panic!("expected a single file");
        };
        assert_eq!(file_name, export_file_name("GDR", record.captured_at_ms, id));
        assert_eq!(exif::decode(&bytes).unwrap(), sample_block());
    }

    #[tokio::test]
    async fn single_missing_photo_is_not_found() {
        let (_tmp, store) = temp_store();
        let err = exporter(store).export_selected(&[5], None).await.unwrap_err();
        assert!(matches!(err, ExportError::NotFound(5)));
    }

    #[tokio::test]
    async fn batch_with_one_bad_item_counts_partial_failure() {
        let (_tmp, store) = temp_store();
        let a = store.insert(tagged_jpeg(64, 36), sample_metadata()).await.unwrap();
        let b = store
            .insert(b"not an image".to_vec(), sample_metadata())
            .await
            .unwrap();
        let c = store.insert(tagged_jpeg(36, 64), sample_metadata()).await.unwrap();

        let (tx, rx) = channel();
        let outcome = exporter(store)
            .export_selected(&[a, b, c], Some(tx))
            .await
            .unwrap();
        assert_eq!(outcome.counts(), (2, 1));
        assert!(outcome.file_name().starts_with("GDR_CAM_Pack_"));

        let mut zip = open_zip(outcome.bytes());
        assert_eq!(zip.len(), 2);
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).unwrap();
            assert_eq!(entry.compression(), CompressionMethod::Stored);
            assert!(entry.name().ends_with(&format!("_ID{}.jpg", [a, c][i])));
            let mut jpeg = Vec::new();
            entry.read_to_end(&mut jpeg).unwrap();
            assert_eq!(exif::decode(&jpeg).unwrap(), sample_block());
        }

        let events: Vec<ExportEvent> = rx.try_iter().collect();
        assert_eq!(events.first(), Some(&ExportEvent::Started { total: 3 }));
        assert!(matches!(
            events[2],
            ExportEvent::ItemFailed { index: 1, id, .. } if id == b
        ));
        assert_eq!(
            events.last(),
            Some(&ExportEvent::Finished {
                succeeded: 2,
                failed: 1
            })
        );
    }

    #[tokio::test]
    async fn batch_where_everything_fails_has_no_archive() {
        let (_tmp, store) = temp_store();
        let a = store.insert(vec![0, 1, 2], sample_metadata()).await.unwrap();
        let err = exporter(store)
            .export_selected(&[a, 404], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::AllFailed { failed: 2 }));
    }

    #[tokio::test]
    async fn duplicate_ids_export_once() {
        let (_tmp, store) = temp_store();
        let a = store.insert(tagged_jpeg(32, 18), sample_metadata()).await.unwrap();
        let b = store.insert(tagged_jpeg(32, 18), sample_metadata()).await.unwrap();
        let outcome = exporter(store)
            .export_selected(&[a, b, a], None)
            .await
            .unwrap();
        assert_eq!(outcome.counts(), (2, 0));
        assert_eq!(open_zip(outcome.bytes()).len(), 2);
    }

    #[tokio::test]
    async fn write_to_creates_file() {
        let (_tmp, store) = temp_store();
        let id = store.insert(tagged_jpeg(32, 18), sample_metadata()).await.unwrap();
        let outcome = exporter(store).export_selected(&[id], None).await.unwrap();
        let out = TempDir::new().unwrap();
        let path = outcome.write_to(&out.path().join("exports")).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), outcome.bytes());
    }
}
