//! Credential file loading.
//!
//! The credential file is TOML with one table per account:
//!
//! ```toml
//! [accounts.default]
//! access_key = "AKIA..."
//! secret_key = "..."
//! region = "eu-west-1"      # optional, defaults to us-east-1
//! account_id = "-"          # optional, "-" = owner of the keys
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Access keys and location of one account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_account_id() -> String {
    "-".into()
}

impl Credentials {
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            account_id: default_account_id(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Returns credentials for a named account.
pub trait CredentialProvider {
    fn credentials(&self, account: &str) -> Result<Credentials, Error>;
}

/// Parsed credential file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialFile {
    #[serde(default)]
    accounts: BTreeMap<String, Credentials>,
}

impl CredentialFile {
    /// Loads and parses the credential file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        let file = Self::parse(&content)
            .map_err(|e| Error::Credentials(format!("{}: {e}", path.display())))?;
        tracing::debug!(
            path = %path.display(),
            accounts = file.accounts.len(),
            "credential file loaded"
        );
        Ok(file)
    }

    /// Parses credential file content.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Names of all configured accounts.
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }
}

impl CredentialProvider for CredentialFile {
    fn credentials(&self, account: &str) -> Result<Credentials, Error> {
        let creds = self
            .accounts
            .get(account)
            .ok_or_else(|| Error::Credentials(format!("no account named {account:?}")))?;
        if creds.access_key.is_empty() || creds.secret_key.is_empty() {
            return Err(Error::Credentials(format!(
                "account {account:?} has an empty access or secret key"
            )));
        }
        Ok(creds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[accounts.default]
access_key = "AKIDEXAMPLE"
secret_key = "secret"

[accounts.backup]
access_key = "AKIDBACKUP"
secret_key = "other"
region = "eu-west-1"
account_id = "123456789012"
"#;

    #[test]
    fn parses_accounts_with_defaults() {
        let file = CredentialFile::parse(SAMPLE).unwrap();
        let creds = file.credentials("default").unwrap();
        assert_eq!(creds.access_key, "AKIDEXAMPLE");
        assert_eq!(creds.region, "us-east-1");
        assert_eq!(creds.account_id, "-");

        let backup = file.credentials("backup").unwrap();
        assert_eq!(backup.region, "eu-west-1");
        assert_eq!(backup.account_id, "123456789012");

        let names: Vec<&str> = file.accounts().collect();
        assert_eq!(names, vec!["backup", "default"]);
    }

    #[test]
    fn unknown_account_is_error() {
        let file = CredentialFile::parse(SAMPLE).unwrap();
        let err = file.credentials("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn empty_key_is_error() {
        let file = CredentialFile::parse(
            "[accounts.x]\naccess_key = \"\"\nsecret_key = \"s\"\n",
        )
        .unwrap();
        assert!(matches!(file.credentials("x"), Err(Error::Credentials(_))));
    }

    #[test]
    fn missing_key_field_fails_to_parse() {
        assert!(CredentialFile::parse("[accounts.x]\naccess_key = \"a\"\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = CredentialFile::load(&path).unwrap();
        assert!(file.credentials("backup").is_ok());
    }

    #[test]
    fn load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialFile::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials::new("AKID", "topsecret", "us-east-1");
        let shown = format!("{creds:?}");
        assert!(shown.contains("AKID"));
        assert!(!shown.contains("topsecret"));
    }
}
