//! Decoded, validated request for one operation.
//!
//! [`OperationRequest`] is what a validated relay holds between reading the
//! body and calling the backend: the operation's typed input, checked against
//! the constraints the table store would otherwise reject it for.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ModelError, ModelResult};
use crate::input::{
    BatchGetItemInput, BatchWriteItemInput, CreateTableInput, DeleteItemInput, DeleteTableInput,
    DescribeTableInput, GetItemInput, ListTablesInput, PutItemInput, QueryInput, ScanInput,
    UpdateItemInput, UpdateTableInput,
};
use crate::operations::DynamoDBOperation;
use crate::types::{Item, KeyType};

/// Maximum number of keys in one `BatchGetItem` call.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Maximum number of writes in one `BatchWriteItem` call.
pub const MAX_BATCH_WRITE_REQUESTS: usize = 25;

/// Typed request for one of the relayed operations.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    /// `CreateTable`.
    CreateTable(CreateTableInput),
    /// `DeleteTable`.
    DeleteTable(DeleteTableInput),
    /// `DescribeTable`.
    DescribeTable(DescribeTableInput),
    /// `ListTables`.
    ListTables(ListTablesInput),
    /// `UpdateTable`.
    UpdateTable(UpdateTableInput),
    /// `PutItem`.
    PutItem(PutItemInput),
    /// `GetItem`.
    GetItem(GetItemInput),
    /// `UpdateItem`.
    UpdateItem(UpdateItemInput),
    /// `DeleteItem`.
    DeleteItem(DeleteItemInput),
    /// `Query`.
    Query(QueryInput),
    /// `Scan`.
    Scan(ScanInput),
    /// `BatchGetItem`.
    BatchGetItem(BatchGetItemInput),
    /// `BatchWriteItem`.
    BatchWriteItem(BatchWriteItemInput),
}

impl OperationRequest {
    /// Decode a JSON body into the input shape of `op`.
    ///
    /// An empty body is accepted only for `ListTables`, where it means "no
    /// options".
    pub fn decode(op: DynamoDBOperation, body: &[u8]) -> ModelResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) && op == DynamoDBOperation::ListTables {
            return Ok(Self::ListTables(ListTablesInput::default()));
        }

        Ok(match op {
            DynamoDBOperation::CreateTable => Self::CreateTable(parse(op, body)?),
            DynamoDBOperation::DeleteTable => Self::DeleteTable(parse(op, body)?),
            DynamoDBOperation::DescribeTable => Self::DescribeTable(parse(op, body)?),
            DynamoDBOperation::ListTables => Self::ListTables(parse(op, body)?),
            DynamoDBOperation::UpdateTable => Self::UpdateTable(parse(op, body)?),
            DynamoDBOperation::PutItem => Self::PutItem(parse(op, body)?),
            DynamoDBOperation::GetItem => Self::GetItem(parse(op, body)?),
            DynamoDBOperation::UpdateItem => Self::UpdateItem(parse(op, body)?),
            DynamoDBOperation::DeleteItem => Self::DeleteItem(parse(op, body)?),
            DynamoDBOperation::Query => Self::Query(parse(op, body)?),
            DynamoDBOperation::Scan => Self::Scan(parse(op, body)?),
            DynamoDBOperation::BatchGetItem => Self::BatchGetItem(parse(op, body)?),
            DynamoDBOperation::BatchWriteItem => Self::BatchWriteItem(parse(op, body)?),
        })
    }

    /// Build the request of a table-addressed operation from a bare table
    /// name (`/DescribeTable/<name>`). Returns `None` for other operations.
    #[must_use]
    pub fn for_table(op: DynamoDBOperation, table_name: &str) -> Option<Self> {
        let table_name = table_name.to_owned();
        match op {
            DynamoDBOperation::DescribeTable => {
                Some(Self::DescribeTable(DescribeTableInput { table_name }))
            }
            DynamoDBOperation::DeleteTable => {
                Some(Self::DeleteTable(DeleteTableInput { table_name }))
            }
            _ => None,
        }
    }

    /// The operation this request is for.
    #[must_use]
    pub fn operation(&self) -> DynamoDBOperation {
        match self {
            Self::CreateTable(_) => DynamoDBOperation::CreateTable,
            Self::DeleteTable(_) => DynamoDBOperation::DeleteTable,
            Self::DescribeTable(_) => DynamoDBOperation::DescribeTable,
            Self::ListTables(_) => DynamoDBOperation::ListTables,
            Self::UpdateTable(_) => DynamoDBOperation::UpdateTable,
            Self::PutItem(_) => DynamoDBOperation::PutItem,
            Self::GetItem(_) => DynamoDBOperation::GetItem,
            Self::UpdateItem(_) => DynamoDBOperation::UpdateItem,
            Self::DeleteItem(_) => DynamoDBOperation::DeleteItem,
            Self::Query(_) => DynamoDBOperation::Query,
            Self::Scan(_) => DynamoDBOperation::Scan,
            Self::BatchGetItem(_) => DynamoDBOperation::BatchGetItem,
            Self::BatchWriteItem(_) => DynamoDBOperation::BatchWriteItem,
        }
    }

    /// Check the constraints of the operation.
    pub fn validate(&self) -> ModelResult<()> {
        match self {
            Self::CreateTable(input) => {
                validate_table_name(&input.table_name)?;
                validate_key_schema(input)
            }
            Self::DeleteTable(DeleteTableInput { table_name })
            | Self::DescribeTable(DescribeTableInput { table_name }) => {
                validate_table_name(table_name)
            }
            Self::ListTables(input) => {
                if let Some(name) = &input.exclusive_start_table_name {
                    validate_table_name(name)?;
                }
                validate_limit(input.limit, 100)
            }
            Self::UpdateTable(input) => validate_table_name(&input.table_name),
            Self::PutItem(input) => {
                validate_table_name(&input.table_name)?;
                if input.item.is_empty() {
                    return Err(ModelError::validation("Item must not be empty"));
                }
                Ok(())
            }
            Self::GetItem(input) => {
                validate_table_name(&input.table_name)?;
                validate_key(&input.key)
            }
            Self::UpdateItem(input) => {
                validate_table_name(&input.table_name)?;
                validate_key(&input.key)
            }
            Self::DeleteItem(input) => {
                validate_table_name(&input.table_name)?;
                validate_key(&input.key)
            }
            Self::Query(input) => {
                validate_table_name(&input.table_name)?;
                if input.key_condition_expression.is_none()
                    && !input.extra.contains_key("KeyConditions")
                {
                    return Err(ModelError::validation(
                        "either KeyConditionExpression or KeyConditions is required",
                    ));
                }
                validate_limit(input.limit, i32::MAX)
            }
            Self::Scan(input) => {
                validate_table_name(&input.table_name)?;
                validate_limit(input.limit, i32::MAX)?;
                validate_segments(input.segment, input.total_segments)
            }
            Self::BatchGetItem(input) => validate_batch_get(input),
            Self::BatchWriteItem(input) => validate_batch_write(input),
        }
    }

    /// Encode the request back into the JSON body sent to the backend.
    pub fn to_body(&self) -> ModelResult<Vec<u8>> {
        let op = self.operation().as_str();
        match self {
            Self::CreateTable(input) => encode(op, input),
            Self::DeleteTable(input) => encode(op, input),
            Self::DescribeTable(input) => encode(op, input),
            Self::ListTables(input) => encode(op, input),
            Self::UpdateTable(input) => encode(op, input),
            Self::PutItem(input) => encode(op, input),
            Self::GetItem(input) => encode(op, input),
            Self::UpdateItem(input) => encode(op, input),
            Self::DeleteItem(input) => encode(op, input),
            Self::Query(input) => encode(op, input),
            Self::Scan(input) => encode(op, input),
            Self::BatchGetItem(input) => encode(op, input),
            Self::BatchWriteItem(input) => encode(op, input),
        }
    }
}

fn parse<T: DeserializeOwned>(op: DynamoDBOperation, body: &[u8]) -> ModelResult<T> {
    serde_json::from_slice(body).map_err(|source| ModelError::Decode {
        operation: op.as_str(),
        source,
    })
}

fn encode<T: Serialize>(operation: &'static str, input: &T) -> ModelResult<Vec<u8>> {
    serde_json::to_vec(input).map_err(|source| ModelError::Encode { operation, source })
}

/// Table names are 3-255 characters of `[A-Za-z0-9_.-]`.
fn validate_table_name(name: &str) -> ModelResult<()> {
    if !(3..=255).contains(&name.len()) {
        return Err(ModelError::validation(format!(
            "TableName '{name}' must be between 3 and 255 characters long"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(ModelError::validation(format!(
            "TableName '{name}' may only contain [a-zA-Z0-9_.-]"
        )));
    }
    Ok(())
}

fn validate_key(key: &Item) -> ModelResult<()> {
    if key.is_empty() || key.len() > 2 {
        return Err(ModelError::validation(
            "Key must name one or two key attributes",
        ));
    }
    if let Some((name, value)) = key.iter().find(|(_, v)| !v.is_key_scalar()) {
        return Err(ModelError::validation(format!(
            "key attribute '{name}' has non-scalar type {}",
            value.type_descriptor()
        )));
    }
    Ok(())
}

fn validate_limit(limit: Option<i32>, max: i32) -> ModelResult<()> {
    match limit {
        Some(l) if l < 1 || l > max => Err(ModelError::validation(format!(
            "Limit must be between 1 and {max}, got {l}"
        ))),
        _ => Ok(()),
    }
}

fn validate_segments(segment: Option<i32>, total: Option<i32>) -> ModelResult<()> {
    match (segment, total) {
        (None, None) => Ok(()),
        (Some(s), Some(t)) if t >= 1 && (0..t).contains(&s) => Ok(()),
        (Some(s), Some(t)) => Err(ModelError::validation(format!(
            "Segment {s} is out of range for TotalSegments {t}"
        ))),
        _ => Err(ModelError::validation(
            "Segment and TotalSegments must be given together",
        )),
    }
}

fn validate_key_schema(input: &CreateTableInput) -> ModelResult<()> {
    let hash_keys = input
        .key_schema
        .iter()
        .filter(|k| k.key_type == KeyType::Hash)
        .count();
    let range_keys = input.key_schema.len() - hash_keys;
    if hash_keys != 1 || range_keys > 1 {
        return Err(ModelError::validation(
            "KeySchema must have exactly one HASH key and at most one RANGE key",
        ));
    }
    for key in &input.key_schema {
        if !input
            .attribute_definitions
            .iter()
            .any(|d| d.attribute_name == key.attribute_name)
        {
            return Err(ModelError::validation(format!(
                "key attribute '{}' has no AttributeDefinition",
                key.attribute_name
            )));
        }
    }
    Ok(())
}

fn validate_batch_get(input: &BatchGetItemInput) -> ModelResult<()> {
    if input.request_items.is_empty() {
        return Err(ModelError::validation("RequestItems must not be empty"));
    }
    let mut total = 0;
    for (table, kaa) in &input.request_items {
        validate_table_name(table)?;
        if kaa.keys.is_empty() {
            return Err(ModelError::validation(format!(
                "Keys for table '{table}' must not be empty"
            )));
        }
        for key in &kaa.keys {
            validate_key(key)?;
        }
        total += kaa.keys.len();
    }
    if total > MAX_BATCH_GET_KEYS {
        return Err(ModelError::validation(format!(
            "too many keys requested: {total} > {MAX_BATCH_GET_KEYS}"
        )));
    }
    Ok(())
}

fn validate_batch_write(input: &BatchWriteItemInput) -> ModelResult<()> {
    if input.request_items.is_empty() {
        return Err(ModelError::validation("RequestItems must not be empty"));
    }
    let mut total = 0;
    for (table, writes) in &input.request_items {
        validate_table_name(table)?;
        if writes.is_empty() {
            return Err(ModelError::validation(format!(
                "write requests for table '{table}' must not be empty"
            )));
        }
        for write in writes {
            match (&write.put_request, &write.delete_request) {
                (Some(put), None) if !put.item.is_empty() => {}
                (None, Some(delete)) => validate_key(&delete.key)?,
                _ => {
                    return Err(ModelError::validation(
                        "each WriteRequest needs exactly one non-empty PutRequest or DeleteRequest",
                    ));
                }
            }
        }
        total += writes.len();
    }
    if total > MAX_BATCH_WRITE_REQUESTS {
        return Err(ModelError::validation(format!(
            "too many write requests: {total} > {MAX_BATCH_WRITE_REQUESTS}"
        )));
    }
    Ok(())
}
