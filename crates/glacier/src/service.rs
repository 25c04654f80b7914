//! [`ArchiveService`] over the Glacier client.

use frostbox_transfer::{
    AbortUploadRequest, ArchiveService, CompleteUploadRequest, InitiateUploadRequest,
    ServiceError, ServiceFuture, TransferResult, UploadArchiveRequest, UploadPartRequest,
};

use crate::client::Client;

impl ArchiveService for Client {
    fn initiate_upload(&self, req: InitiateUploadRequest) -> ServiceFuture<'_, String> {
        Box::pin(async move {
            self.initiate_multipart_upload(&req.vault, &req.description, req.part_size)
                .await
                .map_err(ServiceError::new)
        })
    }

    fn upload_part(&self, req: UploadPartRequest) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            self.upload_multipart_part(
                &req.vault,
                &req.upload_id,
                req.range,
                &req.checksum,
                req.body,
            )
            .await
            .map_err(ServiceError::new)
        })
    }

    fn complete_upload(&self, req: CompleteUploadRequest) -> ServiceFuture<'_, TransferResult> {
        Box::pin(async move {
            self.complete_multipart_upload(
                &req.vault,
                &req.upload_id,
                req.archive_size,
                &req.checksum,
            )
            .await
            .map_err(ServiceError::new)
        })
    }

    fn upload_archive(&self, req: UploadArchiveRequest) -> ServiceFuture<'_, TransferResult> {
        Box::pin(async move {
            Client::upload_archive(self, &req.vault, &req.description, &req.checksum, req.body)
                .await
                .map_err(ServiceError::new)
        })
    }

    fn abort_upload(&self, req: AbortUploadRequest) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            self.abort_multipart_upload(&req.vault, &req.upload_id)
                .await
                .map_err(ServiceError::new)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::error::Error;

    #[tokio::test]
    async fn errors_keep_their_type() {
        // Nothing listens on port 9 of the loopback address.
        let client = Client::with_endpoint(
            Credentials::new("AKID", "secret", "us-east-1"),
            "http://127.0.0.1:9",
        )
        .unwrap();

        let err = ArchiveService::abort_upload(
            &client,
            AbortUploadRequest {
                vault: "v".into(),
                upload_id: "u".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Http(_))));
    }
}
