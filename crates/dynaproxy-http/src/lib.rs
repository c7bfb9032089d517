//! Request dispatch core for dynaproxy.
//!
//! dynaproxy fronts a DynamoDB-style JSON-over-HTTP table store. Every
//! operation is reachable two ways:
//!
//! - **Direct routes**: one fixed path per operation (`/GetItem`), plus
//!   validated variants that decode the body first (`/GetItem/`).
//! - **Compatibility endpoint**: `POST /` with the operation named in the
//!   `X-Amz-Target` header, re-dispatched to the same handlers.
//!
//! Executing the operation is the job of a [`StoreBackend`]; this crate only
//! proves a request is well-formed enough to hand over, and shapes the HTTP
//! response envelope around whatever the backend answers.

pub mod backend;
pub mod compat;
pub mod error;
pub mod lifecycle;
mod relay;
pub mod response;
pub mod routes;
pub mod service;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendError, BackendResponse, HttpBackend, StoreBackend};
pub use response::ProxyResponseBody;
pub use error::{ProxyError, ProxyErrorKind, TransportError};
pub use lifecycle::{BoundServer, LOCALHOST, choose_listen_port, port_in_use};
pub use routes::{Route, RouteTable};
pub use service::{ProxyHttpConfig, ProxyHttpService};
