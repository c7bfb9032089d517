//! Relay handlers: forward a request to the backend and shape its answer.

use bytes::Bytes;
use http::Method;
use tracing::debug;

use dynaproxy_model::{DynamoDBOperation, OperationRequest};

use crate::error::{HandlerError, ProxyError};
use crate::response::ProxyResponseBody;
use crate::routes::path_segments;
use crate::service::{ProxyShared, RequestContext};

type HandlerResult = Result<http::Response<ProxyResponseBody>, HandlerError>;

/// Reject any method outside `allowed`.
pub(crate) fn require_method(method: &Method, allowed: &[Method]) -> Result<(), ProxyError> {
    if allowed.contains(method) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(Method::as_str).collect();
    Err(ProxyError::method_not_supported(method, &names.join(" or ")))
}

/// Forward the body unchanged to `op`.
pub(crate) async fn raw(
    shared: &ProxyShared,
    op: DynamoDBOperation,
    ctx: RequestContext,
) -> HandlerResult {
    require_method(&ctx.parts.method, &[Method::POST])?;
    let body = ctx.body.await?;
    let response = shared.call_backend(op.as_str(), body).await?;
    ctx.reply.relay(op.as_str(), response)
}

/// Decode and validate the request for `op`, then forward the re-encoded
/// value.
///
/// `DescribeTable` and `DeleteTable` take the table name from the path
/// (`GET /DescribeTable/<name>`). `ListTables` accepts `GET` with an empty
/// body. Everything else is a `POST` to exactly `/<Op>/`.
pub(crate) async fn validated(
    shared: &ProxyShared,
    op: DynamoDBOperation,
    ctx: RequestContext,
) -> HandlerResult {
    let request = if op.is_path_addressed() {
        require_method(&ctx.parts.method, &[Method::GET])?;
        let table_name = path_table_name(ctx.parts.uri.path(), op)?;
        OperationRequest::for_table(op, table_name)
            .ok_or_else(|| ProxyError::internal(format!("{op} cannot be addressed by path")))?
    } else {
        if op == DynamoDBOperation::ListTables {
            require_method(&ctx.parts.method, &[Method::GET, Method::POST])?;
        } else {
            require_method(&ctx.parts.method, &[Method::POST])?;
        }
        if path_segments(ctx.parts.uri.path()) != ["", op.as_str(), ""] {
            return Err(ProxyError::bad_request(format!(
                "cannot parse path {}, expected {}",
                ctx.parts.uri.path(),
                op.validated_path()
            ))
            .into());
        }
        let body = ctx.body.await?;
        OperationRequest::decode(op, &body).map_err(|e| ProxyError::internal(e.to_string()))?
    };

    request
        .validate()
        .map_err(|e| ProxyError::bad_request(e.to_string()))?;
    let encoded = request
        .to_body()
        .map_err(|e| ProxyError::internal(e.to_string()))?;
    debug!(operation = %op, bytes = encoded.len(), "relaying validated request");

    let response = shared.call_backend(op.as_str(), Bytes::from(encoded)).await?;
    ctx.reply.relay(op.as_str(), response)
}

/// Forward the body unchanged to the target named in the path,
/// `POST /RawPost/<Target>`.
pub(crate) async fn raw_post(shared: &ProxyShared, ctx: RequestContext) -> HandlerResult {
    require_method(&ctx.parts.method, &[Method::POST])?;
    let target = match path_segments(ctx.parts.uri.path()).as_slice() {
        ["", "RawPost", target]
            if !target.is_empty() && target.bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            (*target).to_owned()
        }
        _ => {
            return Err(ProxyError::bad_request(format!(
                "cannot parse path {}, expected /RawPost/<Target>",
                ctx.parts.uri.path()
            ))
            .into());
        }
    };
    let body = ctx.body.await?;
    let response = shared.call_backend(&target, body).await?;
    ctx.reply.relay(&target, response)
}

/// Table name of a `/<Op>/<TableName>` path.
fn path_table_name(path: &str, op: DynamoDBOperation) -> Result<&str, ProxyError> {
    match path_segments(path).as_slice() {
        ["", name, table] if *name == op.as_str() && !table.is_empty() => Ok(*table),
        _ => Err(ProxyError::bad_request(format!(
            "cannot parse path {path}, expected /{op}/<TableName>"
        ))),
    }
}
