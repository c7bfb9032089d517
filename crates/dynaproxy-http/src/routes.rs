//! Direct route table.
//!
//! Every endpoint is a fixed path installed once at startup. A path ending in
//! `/` also serves as the root of its subtree: `/DescribeTable/users`
//! resolves to the `/DescribeTable/` entry. The root `/` only ever matches
//! exactly.

use std::collections::HashMap;

use dynaproxy_model::DynamoDBOperation;

/// Server status endpoint.
pub const STATUS_PATH: &str = "/Status";

/// Table status poll endpoint.
pub const STATUS_TABLE_PATH: &str = "/StatusTable/";

/// Arbitrary-target passthrough endpoint.
pub const RAW_POST_PATH: &str = "/RawPost/";

/// Compatibility endpoint, dispatching on `X-Amz-Target`.
pub const COMPAT_PATH: &str = "/";

/// Handler bound to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Report server state and the installed paths.
    Status,
    /// Relay the body to the backend without inspecting it.
    Raw(DynamoDBOperation),
    /// Decode and validate the body, then relay the re-encoded request.
    Validated(DynamoDBOperation),
    /// Poll `DescribeTable` until the table reaches a status.
    StatusTable,
    /// Relay to a target named in the path.
    RawPost,
    /// Re-dispatch on the `X-Amz-Target` header.
    Compat,
}

impl Route {
    /// Endpoint name reported in the response envelope.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::Raw(op) | Self::Validated(op) => op.as_str(),
            Self::StatusTable => "StatusTable",
            Self::RawPost => "RawPost",
            Self::Compat => "Compat",
        }
    }
}

/// Ordered set of installed routes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<(String, Route)>,
    index: HashMap<String, Route>,
}

impl RouteTable {
    /// Install every route.
    ///
    /// `DeleteTable` endpoints are only installed when `enable_delete_table`
    /// is set.
    #[must_use]
    pub fn new(enable_delete_table: bool) -> Self {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        let ops: Vec<DynamoDBOperation> = DynamoDBOperation::ALL
            .into_iter()
            .filter(|op| enable_delete_table || *op != DynamoDBOperation::DeleteTable)
            .collect();

        table.install(STATUS_PATH, Route::Status);
        for op in &ops {
            table.install(&op.path(), Route::Raw(*op));
        }
        for op in &ops {
            table.install(&op.validated_path(), Route::Validated(*op));
        }
        table.install(STATUS_TABLE_PATH, Route::StatusTable);
        table.install(RAW_POST_PATH, Route::RawPost);
        table.install(COMPAT_PATH, Route::Compat);
        table
    }

    fn install(&mut self, path: &str, route: Route) {
        let previous = self.index.insert(path.to_owned(), route);
        debug_assert!(previous.is_none(), "route {path} installed twice");
        self.entries.push((path.to_owned(), route));
    }

    /// Find the route serving `path`.
    ///
    /// An exact match wins; otherwise the longest installed subtree root
    /// (a path ending in `/`, other than `/` itself) that prefixes `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Route> {
        if let Some(route) = self.index.get(path) {
            return Some(*route);
        }
        self.entries
            .iter()
            .filter(|(root, _)| root.len() > 1 && root.ends_with('/') && path.starts_with(root))
            .max_by_key(|(root, _)| root.len())
            .map(|(_, route)| *route)
    }

    /// Exact lookup, without subtree matching.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Route> {
        self.index.get(path).copied()
    }

    /// Installed paths, in installation order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    /// Installed `(path, route)` pairs, in installation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Route)> {
        self.entries.iter().map(|(path, route)| (path.as_str(), *route))
    }

    /// Number of installed routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no routes are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a request path into its `/`-separated segments.
///
/// `/GetItem/` yields `["", "GetItem", ""]`.
#[must_use]
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').collect()
}
