//! DynamoDB model types for dynaproxy.
//!
//! The proxy never executes table-store operations itself. It only needs to
//! name them, and for the validated relays, to decode a request body into a
//! typed value before handing it on. This crate holds those shapes.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod request;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{ModelError, ModelResult};
pub use operations::{CURRENT_API_VERSION, DynamoDBOperation};
pub use request::OperationRequest;
