//! Shared DynamoDB wire types used by the typed request inputs.
//!
//! Structs use `PascalCase` field names and enums the `SCREAMING_SNAKE_CASE`
//! wire spelling. Only the shapes the validated relays check are modeled;
//! everything else passes through untouched as JSON.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::error::ModelError;

/// A primary key or item, keyed by attribute name.
pub type Item = HashMap<String, AttributeValue>;

/// Fields present in a request that the typed model does not name.
pub type PassthroughFields = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Key type within a key schema element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// Partition key.
    Hash,
    /// Sort key.
    Range,
}

/// Scalar attribute types allowed in key schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String.
    S,
    /// Number.
    N,
    /// Binary.
    B,
}

/// Table billing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    /// Provisioned capacity.
    Provisioned,
    /// On-demand capacity.
    PayPerRequest,
}

/// Current status of a table, as reported by DescribeTable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    /// Being created.
    Creating,
    /// Being updated.
    Updating,
    /// Being deleted.
    Deleting,
    /// Ready for use.
    Active,
    /// KMS key for the table is inaccessible.
    InaccessibleEncryptionCredentials,
    /// Being archived.
    Archiving,
    /// Archived.
    Archived,
}

impl TableStatus {
    /// Wire spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::Active => "ACTIVE",
            Self::InaccessibleEncryptionCredentials => "INACCESSIBLE_ENCRYPTION_CREDENTIALS",
            Self::Archiving => "ARCHIVING",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        [
            Self::Creating,
            Self::Updating,
            Self::Deleting,
            Self::Active,
            Self::InaccessibleEncryptionCredentials,
            Self::Archiving,
            Self::Archived,
        ]
        .into_iter()
        .find(|st| st.as_str() == upper)
        .ok_or_else(|| ModelError::validation(format!("unknown table status '{s}'")))
    }
}

/// Attributes returned by a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValue {
    /// Nothing.
    None,
    /// All attributes before the write.
    AllOld,
    /// Updated attributes before the write.
    UpdatedOld,
    /// All attributes after the write.
    AllNew,
    /// Updated attributes after the write.
    UpdatedNew,
}

/// Level of consumed-capacity detail in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnConsumedCapacity {
    /// Per table and index.
    Indexes,
    /// Aggregate only.
    Total,
    /// None.
    None,
}

/// Whether item collection metrics are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnItemCollectionMetrics {
    /// Return metrics.
    Size,
    /// Do not return metrics.
    None,
}

/// Attributes returned by Query and Scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Select {
    /// All item attributes.
    AllAttributes,
    /// All attributes projected into the index.
    AllProjectedAttributes,
    /// Attributes named by a projection.
    SpecificAttributes,
    /// Only the match count.
    Count,
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// One element of a table or index key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    /// Attribute name.
    pub attribute_name: String,
    /// Partition or sort key.
    pub key_type: KeyType,
}

/// Declared type of a key attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// Attribute name.
    pub attribute_name: String,
    /// Attribute type.
    pub attribute_type: ScalarAttributeType,
}

/// Provisioned read/write capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    /// Read capacity units.
    pub read_capacity_units: i64,
    /// Write capacity units.
    pub write_capacity_units: i64,
}

/// Keys to read from one table in a `BatchGetItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    /// Primary keys of the items to read.
    pub keys: Vec<Item>,
    /// Projection of the attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Whether to use a strongly consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    /// Unmodeled fields, passed through.
    #[serde(flatten)]
    pub extra: PassthroughFields,
}

/// A single put or delete within a `BatchWriteItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    /// Put an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    /// Delete an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}

/// Put request within a `BatchWriteItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    /// The item to write.
    pub item: Item,
}

/// Delete request within a `BatchWriteItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    /// Primary key of the item to delete.
    pub key: Item,
}
