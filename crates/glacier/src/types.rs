//! Glacier API response types.

use serde::{Deserialize, Serialize};

/// A vault as returned by ListVaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VaultDescription {
    pub vault_name: String,
    #[serde(rename = "VaultARN", default)]
    pub vault_arn: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub last_inventory_date: Option<String>,
    #[serde(default)]
    pub number_of_archives: u64,
    #[serde(default)]
    pub size_in_bytes: u64,
}

/// One page of ListVaults output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListVaultsPage {
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub vault_list: Vec<VaultDescription>,
}

/// JSON error body of a failed request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
