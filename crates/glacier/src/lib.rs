//! Amazon Glacier REST client.
//!
//! Covers the vault and archive calls frostbox needs: multipart and
//! single-request uploads, archive deletion, and vault create, delete and
//! list. Requests are signed with AWS Signature Version 4. [`Client`]
//! implements [`frostbox_transfer::ArchiveService`].

mod client;
mod credentials;
mod error;
mod service;
mod signer;
mod types;

pub use client::Client;
pub use credentials::{CredentialFile, CredentialProvider, Credentials};
pub use error::Error;
pub use types::VaultDescription;
