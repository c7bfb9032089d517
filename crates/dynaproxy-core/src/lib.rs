//! Core types, configuration, and process runtime state for dynaproxy.
//!
//! This crate holds the pieces shared by the HTTP layer and the server binary:
//! environment-driven configuration, the serving-state gate that decides
//! whether new requests are accepted, and the write-once listen port chosen
//! at startup.

mod config;
mod error;
mod runtime;

pub use config::{
    DEFAULT_PORTS, ProxyConfig, READ_TIMEOUT, WRITE_TIMEOUT, parse_port_list,
};
pub use error::{CoreError, CoreResult};
pub use runtime::{ListenPort, RuntimeInfo, ServingGate, ServingState};
