//! DynamoDB operation enum.

use std::fmt;

/// The only DynamoDB API version the proxy speaks.
pub const CURRENT_API_VERSION: &str = "DynamoDB_20120810";

/// All DynamoDB operations the proxy can relay by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamoDBOperation {
    // Table management
    /// Create a new table.
    CreateTable,
    /// Delete a table.
    DeleteTable,
    /// Describe a table.
    DescribeTable,
    /// List all tables.
    ListTables,
    /// Update table settings.
    UpdateTable,

    // Item CRUD
    /// Put (insert or replace) an item.
    PutItem,
    /// Get an item by primary key.
    GetItem,
    /// Update an item.
    UpdateItem,
    /// Delete an item by primary key.
    DeleteItem,

    // Query & Scan
    /// Query items by key condition.
    Query,
    /// Scan all items in a table.
    Scan,

    // Batch operations
    /// Batch get items from multiple tables.
    BatchGetItem,
    /// Batch write (put/delete) items to multiple tables.
    BatchWriteItem,
}

impl DynamoDBOperation {
    /// Every operation, in route-installation order.
    pub const ALL: [Self; 13] = [
        Self::DescribeTable,
        Self::DeleteTable,
        Self::ListTables,
        Self::CreateTable,
        Self::UpdateTable,
        Self::PutItem,
        Self::GetItem,
        Self::BatchGetItem,
        Self::BatchWriteItem,
        Self::DeleteItem,
        Self::UpdateItem,
        Self::Query,
        Self::Scan,
    ];

    /// Returns the AWS operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "CreateTable",
            Self::DeleteTable => "DeleteTable",
            Self::DescribeTable => "DescribeTable",
            Self::ListTables => "ListTables",
            Self::UpdateTable => "UpdateTable",
            Self::PutItem => "PutItem",
            Self::GetItem => "GetItem",
            Self::UpdateItem => "UpdateItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchGetItem => "BatchGetItem",
            Self::BatchWriteItem => "BatchWriteItem",
        }
    }

    /// The direct raw-relay path, e.g. `/GetItem`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// The validated-relay path, e.g. `/GetItem/`.
    #[must_use]
    pub fn validated_path(&self) -> String {
        format!("/{}/", self.as_str())
    }

    /// Whether the validated relay takes its input from the path rather than
    /// a request body (`/DescribeTable/<name>`).
    #[must_use]
    pub fn is_path_addressed(&self) -> bool {
        matches!(self, Self::DescribeTable | Self::DeleteTable)
    }
}

impl fmt::Display for DynamoDBOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
