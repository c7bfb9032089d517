//! Server status and table status endpoints.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::debug;

use dynaproxy_model::output::DescribeTableStatusOutput;
use dynaproxy_model::types::TableStatus;
use dynaproxy_model::{DynamoDBOperation, OperationRequest};

use crate::error::{HandlerError, ProxyError};
use crate::relay::require_method;
use crate::response::{ProxyResponseBody, ResponseOptions, backend_error_response};
use crate::routes::path_segments;
use crate::service::{ProxyShared, Reply, RequestContext};

type HandlerResult = Result<http::Response<ProxyResponseBody>, HandlerError>;

/// Snapshot reported by `GET /Status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusSnapshot {
    /// `starting`, `ready`, or `closed`.
    pub status: &'static str,
    /// Port the server listens on, once chosen.
    pub listen_port: Option<u16>,
    /// Every installed path, in installation order.
    pub available_handlers: Vec<String>,
    /// Query arguments understood by the endpoints.
    pub args: serde_json::Value,
}

pub(crate) fn snapshot(shared: &ProxyShared) -> StatusSnapshot {
    let mut args = ResponseOptions::describe();
    if let Some(map) = args.as_object_mut() {
        map.insert(
            "status".to_owned(),
            "StatusTable: status to wait for, default ACTIVE".into(),
        );
        map.insert(
            "tries".to_owned(),
            "StatusTable: DescribeTable polls before giving up".into(),
        );
    }
    StatusSnapshot {
        status: shared.runtime.gate.state().as_str(),
        listen_port: shared.runtime.listen_port.get(),
        available_handlers: shared.routes.paths().map(str::to_owned).collect(),
        args,
    }
}

/// `GET /Status`.
pub(crate) fn status(shared: &ProxyShared, ctx: &RequestContext) -> HandlerResult {
    require_method(&ctx.parts.method, &[Method::GET])?;
    let body = serde_json::to_vec(&snapshot(shared))
        .map_err(|e| ProxyError::internal(format!("cannot encode status: {e}")))?;
    ctx.reply.envelope("Status", StatusCode::OK, &body)
}

/// Poll parameters of `/StatusTable/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PollArgs {
    wanted: TableStatus,
    tries: u32,
}

impl PollArgs {
    fn from_query(query: Option<&str>, default_tries: u32) -> Result<Self, ProxyError> {
        let mut args = Self {
            wanted: TableStatus::Active,
            tries: default_tries.max(1),
        };
        let Some(query) = query else {
            return Ok(args);
        };
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "status" => {
                    args.wanted = value
                        .parse()
                        .map_err(|e: dynaproxy_model::ModelError| {
                            ProxyError::bad_request(e.to_string())
                        })?;
                }
                "tries" => {
                    args.tries = value
                        .parse::<u32>()
                        .ok()
                        .filter(|t| *t > 0)
                        .ok_or_else(|| {
                            ProxyError::bad_request(format!(
                                "tries must be a positive integer, got {value}"
                            ))
                        })?;
                }
                _ => {}
            }
        }
        Ok(args)
    }
}

/// `GET|POST /StatusTable/[<TableName>]`.
///
/// Polls `DescribeTable` until the table reports the wanted status, then
/// answers with the final `DescribeTable` response. The table name comes
/// from the path or, failing that, from the `TableName` of the body.
///
/// Polling stops early, with a 500, when the response deadline is close.
pub(crate) async fn status_table(shared: &ProxyShared, ctx: RequestContext) -> HandlerResult {
    // Give up with a 500 while there is still time to send it; the
    // service drops the connection once the write deadline passes.
    let budget = shared.config.write_timeout - shared.config.write_timeout / 10;
    let deadline = tokio::time::Instant::now() + budget;

    require_method(&ctx.parts.method, &[Method::GET, Method::POST])?;
    let args = PollArgs::from_query(ctx.parts.uri.query(), shared.config.status_poll_tries)?;

    let request = match path_segments(ctx.parts.uri.path()).as_slice() {
        ["", "StatusTable", table] if !table.is_empty() => {
            OperationRequest::for_table(DynamoDBOperation::DescribeTable, table)
                .ok_or_else(|| ProxyError::internal("DescribeTable cannot be addressed by path"))?
        }
        ["", "StatusTable", ""] | ["", ""] => {
            let body = ctx.body.await?;
            OperationRequest::decode(DynamoDBOperation::DescribeTable, &body)
                .map_err(|e| ProxyError::internal(e.to_string()))?
        }
        _ => {
            return Err(ProxyError::bad_request(format!(
                "cannot parse path {}, expected /StatusTable/<TableName>",
                ctx.parts.uri.path()
            ))
            .into());
        }
    };
    request
        .validate()
        .map_err(|e| ProxyError::bad_request(e.to_string()))?;
    let describe = Bytes::from(
        request
            .to_body()
            .map_err(|e| ProxyError::internal(e.to_string()))?,
    );

    let poll = poll_status(shared, &ctx.reply, args, describe);
    tokio::time::timeout_at(deadline, poll).await.unwrap_or_else(|_| {
        Err(ProxyError::internal(format!(
            "table did not reach status {} within {}ms",
            args.wanted,
            budget.as_millis()
        ))
        .into())
    })
}

async fn poll_status(
    shared: &ProxyShared,
    reply: &Reply,
    args: PollArgs,
    describe: Bytes,
) -> HandlerResult {
    for attempt in 1..=args.tries {
        let response = shared
            .call_backend(DynamoDBOperation::DescribeTable.as_str(), describe.clone())
            .await?;
        if response.is_error() {
            return Ok(backend_error_response(response));
        }
        let current = DescribeTableStatusOutput::from_slice(&response.body)
            .map_err(|e| ProxyError::internal(format!("cannot read DescribeTable response: {e}")))?
            .status();
        if current == Some(args.wanted) {
            return reply.envelope("StatusTable", response.status, &response.body);
        }
        debug!(attempt, tries = args.tries, ?current, wanted = %args.wanted, "table not in wanted status");
        if attempt < args.tries {
            tokio::time::sleep(shared.config.status_poll_interval).await;
        }
    }

    Err(ProxyError::internal(format!(
        "table did not reach status {} after {} tries",
        args.wanted, args.tries
    ))
    .into())
}
