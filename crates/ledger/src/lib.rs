//! Local ledger of uploaded archives.
//!
//! Glacier has no cheap way to list the archives in a vault, so every
//! successful upload is recorded locally. Records are never removed:
//! deleting an archive only clears its `exists` flag.

mod archive;
mod listing;
mod store;

pub use archive::Archive;
pub use listing::{human_size, write_listing};
pub use store::{Ledger, MemoryLedger, YamlLedger};

/// Errors produced by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger {path} is not valid YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
