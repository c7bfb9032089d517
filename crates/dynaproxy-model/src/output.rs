//! The slice of backend responses the proxy itself inspects.
//!
//! Responses are relayed as opaque JSON; only the `/StatusTable/` poll needs
//! to look inside one, to read the table status out of `DescribeTable`.

use serde::Deserialize;

use crate::types::TableStatus;

/// `DescribeTable` output, reduced to the table status.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableStatusOutput {
    /// The described table.
    #[serde(default)]
    pub table: Option<TableStatusSummary>,
}

/// Identity and status of a described table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableStatusSummary {
    /// Table name.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Current status.
    #[serde(default)]
    pub table_status: Option<TableStatus>,
}

impl DescribeTableStatusOutput {
    /// Parse a `DescribeTable` response body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// The reported table status, if present.
    #[must_use]
    pub fn status(&self) -> Option<TableStatus> {
        self.table.as_ref().and_then(|t| t.table_status)
    }
}
