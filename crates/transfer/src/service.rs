//! Remote archive-storage service seam.
//!
//! The uploader only talks to [`ArchiveService`]. `frostbox-glacier`
//! implements it over HTTP; tests implement it in memory.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::types::{
    AbortUploadRequest, CompleteUploadRequest, InitiateUploadRequest, TransferResult,
    UploadArchiveRequest, UploadPartRequest,
};

/// Error returned by an [`ArchiveService`] implementation.
#[derive(Debug)]
pub struct ServiceError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.0)
    }
}

impl ServiceError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

/// Boxed future returned by service calls.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// The archive-storage RPCs used by the uploader.
pub trait ArchiveService: Send + Sync {
    /// Starts a multipart upload and returns its upload id.
    fn initiate_upload(&self, req: InitiateUploadRequest) -> ServiceFuture<'_, String>;

    /// Sends one part of a multipart upload.
    fn upload_part(&self, req: UploadPartRequest) -> ServiceFuture<'_, ()>;

    /// Assembles the uploaded parts into an archive.
    fn complete_upload(&self, req: CompleteUploadRequest) -> ServiceFuture<'_, TransferResult>;

    /// Uploads a whole archive in one request.
    fn upload_archive(&self, req: UploadArchiveRequest) -> ServiceFuture<'_, TransferResult>;

    /// Discards a multipart upload and its parts.
    fn abort_upload(&self, req: AbortUploadRequest) -> ServiceFuture<'_, ()>;
}
