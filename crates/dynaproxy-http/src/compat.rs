//! Resolution of the `X-Amz-Target` header for the compatibility endpoint.
//!
//! Clients written against the stock DynamoDB wire protocol post everything
//! to `/` and name the operation in `X-Amz-Target`, e.g.
//! `DynamoDB_20120810.GetItem`. The header is mapped back onto a direct
//! route so both entry points run the same handler.

use std::collections::HashMap;

use dynaproxy_model::CURRENT_API_VERSION;

use crate::error::ProxyError;
use crate::routes::{Route, RouteTable};

/// Header naming the target operation.
pub const AMZ_TARGET_HEADER: &str = "x-amz-target";

/// Lookup from `/<Op>` to the route serving it.
#[derive(Debug, Clone)]
pub struct CompatTable {
    routes: HashMap<String, Route>,
}

impl CompatTable {
    /// Build the lookup from the installed direct routes.
    ///
    /// Every raw-relay route is reachable by its own path, and the table
    /// status poll by `StatusTable/` (trailing slash included). The status,
    /// passthrough, validated, and root entries are not.
    #[must_use]
    pub fn from_routes(table: &RouteTable) -> Self {
        let routes = table
            .iter()
            .filter(|(_, route)| matches!(route, Route::Raw(_) | Route::StatusTable))
            .map(|(path, route)| (path.to_owned(), route))
            .collect();
        Self { routes }
    }

    /// Resolve a target header value to a route.
    ///
    /// The value is either a bare operation name or `<version>.<name>`. The
    /// version, when present, must be [`CURRENT_API_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns a bad-request error for a foreign API version, an empty or
    /// root target, or a name with no compat entry.
    pub fn resolve(&self, target: &str) -> Result<Route, ProxyError> {
        let name = match target.split_once('.') {
            Some((version, name)) => {
                if version != CURRENT_API_VERSION {
                    return Err(ProxyError::bad_request(format!(
                        "unsupported API version {version}, expected {CURRENT_API_VERSION}"
                    )));
                }
                name
            }
            None => target,
        };

        if name.trim_matches('/').is_empty() {
            return Err(ProxyError::bad_request(
                "X-Amz-Target must name an endpoint, not /",
            ));
        }

        self.routes.get(&format!("/{name}")).copied().ok_or_else(|| {
            ProxyError::bad_request(format!("no compat endpoint for target {target}"))
        })
    }
}
