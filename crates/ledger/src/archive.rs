use chrono::{DateTime, Utc};
use frostbox_transfer::TransferResult;
use serde::{Deserialize, Serialize};

/// One uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub vault: String,
    /// Base name of the uploaded file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Cleared when the archive is deleted from the vault.
    #[serde(default = "default_true")]
    pub exists: bool,
    pub location: String,
    pub archive_id: String,
    /// Hex tree hash of the whole archive.
    pub checksum: String,
}

fn default_true() -> bool {
    true
}

impl Archive {
    /// Record for a successful upload, stamped with the current time.
    pub fn from_upload(vault: &str, name: &str, size: u64, result: &TransferResult) -> Self {
        Self {
            vault: vault.into(),
            name: name.into(),
            size,
            uploaded_at: Utc::now(),
            exists: true,
            location: result.location().into(),
            archive_id: result.archive_id().into(),
            checksum: result.checksum().into(),
        }
    }
}
