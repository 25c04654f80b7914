//! Subcommand implementations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use frostbox_glacier::{Client, CredentialFile, CredentialProvider};
use frostbox_ledger::{Archive, Ledger, YamlLedger, human_size, write_listing};
use frostbox_transfer::{
    ArchiveService, ArchiveUploader, PartSize, SpeedCalculator, UploadEvent, archive_description,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Configuration with command-line overrides applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: PathBuf,
    pub account: String,
    pub ledger: PathBuf,
    pub part_size: PartSize,
    pub abort_on_failure: bool,
    pub endpoint: Option<String>,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let part_size = match cli.part_size {
            Some(size) => size,
            None => config
                .part_size
                .parse()
                .context("invalid part_size in configuration")?,
        };

        Ok(Self {
            credentials: cli.credentials.clone().unwrap_or(config.credentials),
            account: cli.account.clone().unwrap_or(config.account),
            ledger: cli.ledger.clone().unwrap_or(config.ledger),
            part_size,
            abort_on_failure: config.abort_on_failure,
            endpoint: cli.endpoint.clone().or(config.endpoint),
        })
    }

    /// Builds a Glacier client for the configured account.
    fn client(&self) -> anyhow::Result<Client> {
        let credentials = CredentialFile::load(&self.credentials)?.credentials(&self.account)?;
        let client = match &self.endpoint {
            Some(endpoint) => Client::with_endpoint(credentials, endpoint)?,
            None => Client::new(credentials)?,
        };
        debug!(account = %self.account, region = %client.region(), "glacier client ready");
        Ok(client)
    }
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let settings = Settings::resolve(&cli, config)?;
    let ledger = YamlLedger::new(&settings.ledger);

    match cli.command {
        Command::ListArchives { vault, verbose } => {
            list_archives(&ledger, vault.as_deref(), verbose, &mut io::stdout())
        }
        Command::InitLedger => {
            if ledger.init()? {
                println!("created {}", ledger.path().display());
            } else {
                println!("{} already exists", ledger.path().display());
            }
            Ok(())
        }
        Command::UploadArchive {
            vault,
            file,
            no_abort,
        } => {
            let client = settings.client()?;
            let cancel = CancellationToken::new();
            let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));

            let result = upload_archive(
                &client,
                &ledger,
                &vault,
                &file,
                settings.part_size,
                settings.abort_on_failure && !no_abort,
                cancel,
            )
            .await;
            interrupt.abort();

            let archive = result?;
            println!("{}", archive.location);
            println!("archive id: {}", archive.archive_id);
            println!("checksum:   {}", archive.checksum);
            Ok(())
        }
        Command::DeleteArchive { vault, archive_id } => {
            let client = settings.client()?;
            delete_archive(&client, &ledger, &vault, &archive_id).await
        }
        Command::CreateVault { vault } => {
            settings
                .client()?
                .create_vault(&vault)
                .await
                .with_context(|| format!("creating vault {vault}"))?;
            info!(vault = %vault, "vault created");
            Ok(())
        }
        Command::DeleteVault { vault } => {
            settings
                .client()?
                .delete_vault(&vault)
                .await
                .with_context(|| format!("deleting vault {vault}"))?;
            info!(vault = %vault, "vault deleted");
            Ok(())
        }
        Command::ListVaults => {
            let vaults = settings
                .client()?
                .list_vaults()
                .await
                .context("listing vaults")?;
            let mut out = io::stdout();
            for vault in vaults {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    vault.vault_name,
                    vault.number_of_archives,
                    human_size(vault.size_in_bytes),
                    vault.creation_date
                )?;
            }
            Ok(())
        }
    }
}

/// Uploads `path` to `vault` and records the archive in `ledger`.
///
/// The ledger must load before anything is sent, and it is only written
/// after the service confirms the upload.
pub async fn upload_archive(
    service: &dyn ArchiveService,
    ledger: &dyn Ledger,
    vault: &str,
    path: &Path,
    part_size: PartSize,
    abort_on_failure: bool,
    cancel: CancellationToken,
) -> anyhow::Result<Archive> {
    ledger
        .check()
        .context("ledger cannot record the upload, nothing was sent")?;

    let (tx, rx) = mpsc::channel(16);
    let progress = tokio::spawn(log_progress(rx));

    let result = ArchiveUploader::new(service, part_size)
        .with_abort_on_failure(abort_on_failure)
        .with_cancel(cancel)
        .with_events(tx)
        .upload(vault, path)
        .await;
    // The uploader is dropped here, closing the event channel.
    let size = progress.await.ok().flatten();

    let result = result.with_context(|| format!("uploading {}", path.display()))?;
    let size = size.context("upload finished without reporting the archive size")?;

    let archive = Archive::from_upload(vault, &archive_description(path), size, &result);
    ledger
        .append(archive.clone())
        .context("recording archive in ledger")?;
    Ok(archive)
}

async fn delete_archive(
    client: &Client,
    ledger: &dyn Ledger,
    vault: &str,
    archive_id: &str,
) -> anyhow::Result<()> {
    ledger
        .check()
        .context("ledger cannot record the deletion, nothing was sent")?;

    client
        .delete_archive(vault, archive_id)
        .await
        .with_context(|| format!("deleting archive {archive_id}"))?;

    if ledger.mark_deleted(vault, archive_id)? {
        info!(vault = %vault, archive_id = %archive_id, "archive deleted");
    } else {
        warn!(vault = %vault, archive_id = %archive_id, "archive deleted but not found in ledger");
    }
    Ok(())
}

/// Writes the ledger listing, optionally restricted to one vault.
pub fn list_archives<W: Write>(
    ledger: &dyn Ledger,
    vault: Option<&str>,
    verbose: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut archives = ledger.load()?;
    if let Some(vault) = vault {
        archives.retain(|a| a.vault == vault);
    }
    write_listing(out, &archives, verbose)?;
    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling upload");
        cancel.cancel();
    }
}

/// Logs upload events. Returns the archive size announced at start.
async fn log_progress(mut events: mpsc::Receiver<UploadEvent>) -> Option<u64> {
    let speed = SpeedCalculator::default();
    let mut archive_size = None;

    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Started {
                description,
                total_bytes,
                multipart,
            } => {
                speed.add_sample(0);
                archive_size = Some(total_bytes);
                debug!(
                    archive = %description,
                    size = %human_size(total_bytes),
                    multipart,
                    "upload started"
                );
            }
            UploadEvent::PartUploaded {
                index,
                range,
                uploaded_bytes,
                total_bytes,
            } => {
                speed.add_sample(range.len());
                let rate = speed.bytes_per_second() as u64;
                let eta = speed
                    .eta(total_bytes.saturating_sub(uploaded_bytes))
                    .map(|d| d.as_secs());
                info!(
                    part = index,
                    uploaded = %human_size(uploaded_bytes),
                    total = %human_size(total_bytes),
                    rate = %format!("{}/s", human_size(rate)),
                    eta_secs = eta,
                    "part uploaded"
                );
            }
            UploadEvent::Completed { archive_id } => {
                debug!(archive_id = %archive_id, "upload completed");
            }
            UploadEvent::Failed { error } => {
                debug!(error = %error, "upload failed");
            }
        }
    }
    archive_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use frostbox_ledger::MemoryLedger;
    use frostbox_transfer::{
        AbortUploadRequest, CompleteUploadRequest, InitiateUploadRequest, ServiceError,
        ServiceFuture, TransferResult, UploadArchiveRequest, UploadPartRequest,
    };

    const MIB: usize = 1024 * 1024;

    #[derive(Default)]
    struct FakeService {
        fail_part: bool,
        calls: Mutex<Vec<&'static str>>,
        completed_size: Mutex<Option<u64>>,
    }

    impl FakeService {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn archive(id: &str) -> TransferResult {
            TransferResult::new(
                format!("/-/vaults/v/archives/{id}"),
                id.to_string(),
                "beef".to_string(),
            )
        }
    }

    impl ArchiveService for FakeService {
        fn initiate_upload(&self, _req: InitiateUploadRequest) -> ServiceFuture<'_, String> {
            self.record("initiate");
            Box::pin(async { Ok::<_, ServiceError>("UPLOAD".to_string()) })
        }

        fn upload_part(&self, _req: UploadPartRequest) -> ServiceFuture<'_, ()> {
            self.record("part");
            let fail = self.fail_part;
            Box::pin(async move {
                if fail {
                    Err(ServiceError::new("connection reset"))
                } else {
                    Ok(())
                }
            })
        }

        fn complete_upload(
            &self,
            req: CompleteUploadRequest,
        ) -> ServiceFuture<'_, TransferResult> {
            self.record("complete");
            *self.completed_size.lock().unwrap() = Some(req.archive_size);
            Box::pin(async { Ok::<_, ServiceError>(Self::archive("MULTI")) })
        }

        fn upload_archive(&self, _req: UploadArchiveRequest) -> ServiceFuture<'_, TransferResult> {
            self.record("upload");
            Box::pin(async { Ok::<_, ServiceError>(Self::archive("SINGLE")) })
        }

        fn abort_upload(&self, _req: AbortUploadRequest) -> ServiceFuture<'_, ()> {
            self.record("abort");
            Box::pin(async { Ok::<_, ServiceError>(()) })
        }
    }

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    fn one_mib() -> PartSize {
        PartSize::new(MIB as u64).unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        use clap::Parser;
        Cli::try_parse_from(args).unwrap()
    }

    #[tokio::test]
    async fn single_shot_upload_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.txt", 10);
        let service = FakeService::default();
        let ledger = MemoryLedger::new();

        let archive = upload_archive(
            &service,
            &ledger,
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(service.calls(), vec!["upload"]);
        assert_eq!(archive.archive_id, "SINGLE");
        assert_eq!(archive.name, "notes.txt");
        assert_eq!(archive.size, 10);
        assert_eq!(ledger.load().unwrap(), vec![archive]);
    }

    #[tokio::test]
    async fn multipart_upload_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.bin", 2 * MIB + 5);
        let service = FakeService::default();
        let ledger = MemoryLedger::new();

        let archive = upload_archive(
            &service,
            &ledger,
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            service.calls(),
            vec!["initiate", "part", "part", "part", "complete"]
        );
        assert_eq!(archive.archive_id, "MULTI");
        assert_eq!(archive.size, (2 * MIB + 5) as u64);
        assert_eq!(*service.completed_size.lock().unwrap(), Some(archive.size));
        assert_eq!(ledger.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_ledger_stops_upload_before_any_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.txt", 5);
        let ledger_path = dir.path().join("ledger.yaml");
        std::fs::write(&ledger_path, "this: [is not a list").unwrap();
        let service = FakeService::default();

        let err = upload_archive(
            &service,
            &YamlLedger::new(&ledger_path),
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("ledger.yaml"));
        assert!(service.calls().is_empty());
        assert_eq!(
            std::fs::read_to_string(&ledger_path).unwrap(),
            "this: [is not a list"
        );
    }

    #[tokio::test]
    async fn missing_ledger_stops_upload_before_any_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.bin", 2 * MIB);
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));
        let service = FakeService::default();

        let result = upload_archive(
            &service,
            &ledger,
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert!(service.calls().is_empty());
        assert!(!ledger.path().exists());
    }

    #[tokio::test]
    async fn initialised_ledger_records_first_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.txt", 5);
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));
        ledger.init().unwrap();
        let service = FakeService::default();

        upload_archive(
            &service,
            &ledger,
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let records = ledger.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 5);
    }

    #[tokio::test]
    async fn failed_part_leaves_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.bin", 3 * MIB);
        let service = FakeService {
            fail_part: true,
            ..Default::default()
        };
        let ledger = MemoryLedger::new();

        let err = upload_archive(
            &service,
            &ledger,
            "v",
            &path,
            one_mib(),
            true,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("connection reset"));
        assert_eq!(service.calls(), vec!["initiate", "part", "abort"]);
        assert!(ledger.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_upload_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.txt", 10);
        let service = FakeService::default();
        let ledger = MemoryLedger::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result =
            upload_archive(&service, &ledger, "v", &path, one_mib(), true, cancel).await;

        assert!(result.is_err());
        assert!(service.calls().is_empty());
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn list_archives_filters_by_vault() {
        let ledger = MemoryLedger::new();
        for (vault, id) in [("a", "1"), ("b", "2"), ("a", "3")] {
            let archive =
                Archive::from_upload(vault, &format!("{id}.tar"), 1024, &FakeService::archive(id));
            ledger.append(archive).unwrap();
        }

        let mut out = Vec::new();
        list_archives(&ledger, Some("a"), false, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a\t1.tar\t1.0 KiB\na\t3.tar\t1.0 KiB\n"
        );

        let mut out = Vec::new();
        list_archives(&ledger, None, false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }

    #[test]
    fn flags_override_config() {
        let config = Config {
            account: "default".into(),
            part_size: "8M".into(),
            endpoint: Some("http://config:1".into()),
            ..Config::default()
        };

        let settings =
            Settings::resolve(&cli(&["frostbox", "-a", "backup", "-p", "2M", "lv"]), config.clone())
                .unwrap();
        assert_eq!(settings.account, "backup");
        assert_eq!(settings.part_size.bytes(), 2 * MIB as u64);
        assert_eq!(settings.endpoint.as_deref(), Some("http://config:1"));

        let settings = Settings::resolve(&cli(&["frostbox", "lv"]), config).unwrap();
        assert_eq!(settings.account, "default");
        assert_eq!(settings.part_size.bytes(), 8 * MIB as u64);
    }

    #[test]
    fn invalid_configured_part_size_is_error() {
        let config = Config {
            part_size: "3M".into(),
            ..Config::default()
        };
        assert!(Settings::resolve(&cli(&["frostbox", "lv"]), config).is_err());
    }

    #[test]
    fn missing_credentials_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            credentials: dir.path().join("missing.toml"),
            ..Config::default()
        };
        let settings = Settings::resolve(&cli(&["frostbox", "lv"]), config).unwrap();
        let err = settings.client().unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));

        // Clients print their endpoint, never their keys.
        let creds = dir.path().join("credentials.toml");
        std::fs::write(
            &creds,
            "[accounts.default]\naccess_key = \"AKID\"\nsecret_key = \"topsecret\"\n",
        )
        .unwrap();
        let settings = Settings {
            credentials: creds,
            endpoint: Some("http://127.0.0.1:9000".into()),
            ..settings
        };
        let shown = format!("{:?}", settings.client().unwrap());
        assert!(shown.contains("127.0.0.1:9000"));
        assert!(!shown.contains("topsecret"));
    }
}
