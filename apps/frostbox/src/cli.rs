//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use frostbox_transfer::PartSize;

#[derive(Debug, Parser)]
#[command(name = "frostbox", version)]
#[command(about = "Upload archives to Amazon Glacier and keep a local ledger", long_about = None)]
pub struct Cli {
    /// Credential file.
    #[arg(short, long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Account profile in the credential file.
    #[arg(short, long, global = true)]
    pub account: Option<String>,

    /// Ledger file.
    #[arg(short, long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Multipart part size: <digits>, <digits>M or <digits>G.
    #[arg(short, long, global = true)]
    pub part_size: Option<PartSize>,

    /// Service endpoint override.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file as a new archive.
    #[command(name = "upload_archive", visible_alias = "ua")]
    UploadArchive {
        vault: String,
        file: PathBuf,
        /// Leave a failed multipart upload open on the service.
        #[arg(long)]
        no_abort: bool,
    },

    /// Delete an archive.
    #[command(name = "delete_archive", visible_alias = "da")]
    DeleteArchive { vault: String, archive_id: String },

    /// List archives recorded in the ledger.
    #[command(name = "list_archives", visible_alias = "la")]
    ListArchives {
        /// Only archives in this vault.
        vault: Option<String>,
        /// Include upload time, archive id, checksum and deleted archives.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create a vault.
    #[command(name = "create_vault", visible_alias = "cv")]
    CreateVault { vault: String },

    /// Delete an empty vault.
    #[command(name = "delete_vault", visible_alias = "dv")]
    DeleteVault { vault: String },

    /// List the account's vaults.
    #[command(name = "list_vaults", visible_alias = "lv")]
    ListVaults,

    /// Create an empty ledger file if none exists.
    #[command(name = "init_ledger", visible_alias = "il")]
    InitLedger,
}
