//! Whole-archive upload: single-shot or multipart.
//!
//! Files smaller than the part size are tree-hashed and sent in one
//! UploadArchive call. Larger files go through
//! `Initiated -> Uploading(offset) -> Completed`: parts are read, hashed
//! and sent strictly in file order, and each part's leaf digests are
//! appended to the archive-wide tree hash before the next part is read.
//! Any failure after initiation moves the session to `Failed` and, unless
//! disabled, aborts the remote upload.

use std::path::Path;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransferError;
use crate::part_size::PartSize;
use crate::reader::{Part, PartReader, read_and_hash};
use crate::service::ArchiveService;
use crate::types::{
    AbortUploadRequest, ByteRange, CompleteUploadRequest, InitiateUploadRequest, TransferResult,
    UploadArchiveRequest, UploadEvent, UploadPartRequest, UploadSession,
};

/// Uploads files as archives through an [`ArchiveService`].
pub struct ArchiveUploader<'a> {
    service: &'a dyn ArchiveService,
    part_size: PartSize,
    abort_on_failure: bool,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl<'a> ArchiveUploader<'a> {
    pub fn new(service: &'a dyn ArchiveService, part_size: PartSize) -> Self {
        Self {
            service,
            part_size,
            abort_on_failure: true,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Whether a failed multipart upload is aborted on the service (default on).
    pub fn with_abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    /// Uses `cancel` to stop the upload between remote calls.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sends progress events to `events`.
    pub fn with_events(mut self, events: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn part_size(&self) -> PartSize {
        self.part_size
    }

    /// Uploads the file at `path` to `vault`.
    ///
    /// The archive description is the file's base name.
    pub async fn upload(&self, vault: &str, path: &Path) -> Result<TransferResult, TransferError> {
        let description = archive_description(path);
        let file_size = tokio::fs::metadata(path).await?.len();
        let multipart = file_size >= self.part_size.bytes();

        info!(
            vault = %vault,
            archive = %description,
            size = file_size,
            part_size = %self.part_size,
            multipart,
            "uploading archive"
        );
        self.emit(UploadEvent::Started {
            description: description.clone(),
            total_bytes: file_size,
            multipart,
        })
        .await;

        let result = if multipart {
            self.upload_multipart(vault, path, description, file_size).await
        } else {
            self.upload_single(vault, path, description).await
        };

        match &result {
            Ok(r) => {
                info!(
                    vault = %vault,
                    archive_id = %r.archive_id(),
                    checksum = %r.checksum(),
                    "archive uploaded"
                );
                self.emit(UploadEvent::Completed {
                    archive_id: r.archive_id().to_string(),
                })
                .await;
            }
            Err(e) => {
                self.emit(UploadEvent::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn upload_single(
        &self,
        vault: &str,
        path: &Path,
        description: String,
    ) -> Result<TransferResult, TransferError> {
        self.check_cancelled()?;

        let (body, digest) = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || read_and_hash(&path)
        })
        .await
        .map_err(|e| TransferError::Task(e.to_string()))??;

        self.check_cancelled()?;
        debug!(vault = %vault, len = body.len(), checksum = %digest, "single-shot upload");

        self.service
            .upload_archive(UploadArchiveRequest {
                vault: vault.to_string(),
                description,
                checksum: digest.to_hex(),
                body,
            })
            .await
            .map_err(TransferError::remote("UploadArchive"))
    }

    async fn upload_multipart(
        &self,
        vault: &str,
        path: &Path,
        description: String,
        file_size: u64,
    ) -> Result<TransferResult, TransferError> {
        self.check_cancelled()?;

        let upload_id = self
            .service
            .initiate_upload(InitiateUploadRequest {
                vault: vault.to_string(),
                description: description.clone(),
                part_size: self.part_size.bytes(),
            })
            .await
            .map_err(TransferError::remote("InitiateUpload"))?;
        info!(vault = %vault, upload_id = %upload_id, "multipart upload initiated");

        let mut session =
            UploadSession::new(vault.to_string(), description, self.part_size, upload_id);

        match self.send_parts(&mut session, path, file_size).await {
            Ok(result) => {
                session.complete();
                Ok(result)
            }
            Err(err) => {
                session.fail();
                warn!(
                    vault = %vault,
                    upload_id = %session.upload_id(),
                    offset = session.offset(),
                    error = %err,
                    "multipart upload failed"
                );
                if self.abort_on_failure {
                    self.abort(&session).await;
                }
                Err(err)
            }
        }
    }

    /// Reads, hashes and sends every part, then completes the upload.
    async fn send_parts(
        &self,
        session: &mut UploadSession,
        path: &Path,
        file_size: u64,
    ) -> Result<TransferResult, TransferError> {
        let part_size = session.part_size();
        let mut reader = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || PartReader::open(&path, part_size)
        })
        .await
        .map_err(|e| TransferError::Task(e.to_string()))??;

        loop {
            self.check_cancelled()?;

            let (returned, next) = tokio::task::spawn_blocking(move || {
                let next = reader.next_part();
                (reader, next)
            })
            .await
            .map_err(|e| TransferError::Task(e.to_string()))?;
            reader = returned;

            let Some(Part {
                index,
                offset,
                data,
                leaves,
            }) = next?
            else {
                break;
            };

            let len = data.len() as u64;
            let range = ByteRange::new(offset, len);
            let checksum = leaves.root().to_hex();
            debug!(
                upload_id = %session.upload_id(),
                part = index,
                range = %range,
                checksum = %checksum,
                "uploading part"
            );

            self.service
                .upload_part(UploadPartRequest {
                    vault: session.vault().to_string(),
                    upload_id: session.upload_id().to_string(),
                    checksum,
                    range,
                    body: data,
                })
                .await
                .map_err(TransferError::remote("UploadPart"))?;

            session.record_part(index, offset, len, &leaves)?;

            self.emit(UploadEvent::PartUploaded {
                index,
                range,
                uploaded_bytes: session.offset(),
                total_bytes: file_size,
            })
            .await;
        }
        drop(reader);

        self.check_cancelled()?;

        let checksum = session.archive_checksum();
        debug!(
            upload_id = %session.upload_id(),
            parts = session.parts_uploaded(),
            checksum = %checksum,
            "completing multipart upload"
        );

        self.service
            .complete_upload(CompleteUploadRequest {
                vault: session.vault().to_string(),
                upload_id: session.upload_id().to_string(),
                archive_size: file_size,
                checksum,
            })
            .await
            .map_err(TransferError::remote("CompleteUpload"))
    }

    async fn abort(&self, session: &UploadSession) {
        let req = AbortUploadRequest {
            vault: session.vault().to_string(),
            upload_id: session.upload_id().to_string(),
        };
        match self.service.abort_upload(req).await {
            Ok(()) => info!(upload_id = %session.upload_id(), "multipart upload aborted"),
            Err(e) => warn!(
                upload_id = %session.upload_id(),
                error = %e,
                "failed to abort multipart upload"
            ),
        }
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// Archive description for `path`: its base name.
pub fn archive_description(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
