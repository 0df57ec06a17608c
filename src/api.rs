//! Request boundary.
//!
//! Callers speak conceptual REST (`method` + `path` + `query` + JSON `body`)
//! in a JSON envelope; `dispatch` routes each request to one network
//! operation and folds every outcome, including every error, into an
//! `ApiResponse`. Nothing below this layer sees an HTTP status.
//!
//! Paths are accepted bare (`/hierarchy/fdhs`) or under `/api`.

use crate::core::error::{ErrorKind, FibermapError};
use crate::core::store::Store;
use crate::network::model::{
    Asset, AssetUpdate, Customer, CustomerUpdate, EntityId, Fdh, FdhUpdate, Headend, ListFilter,
    NewAsset, NewCustomer, NewFdh, NewHeadend, NewSplitter, Splitter, SplitterUpdate,
};
use crate::network::resolver::TopologyQuery;
use crate::network::{hierarchy, integrity, store as entities, topology};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Request envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiRequest {
    /// Request ID for correlation
    #[serde(default = "default_request_id")]
    pub id: String,
    pub method: String,
    /// Path, optionally carrying a `?key=value&...` query string
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

pub fn default_request_id() -> String {
    ulid::Ulid::new().to_string()
}

impl ApiRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            id: default_request_id(),
            method: method.to_string(),
            path: path.to_string(),
            query: BTreeMap::new(),
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }
}

/// Response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse {
    pub id: String,
    /// HTTP-equivalent status code
    pub status: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub detail: String,
}

struct Reply {
    status: u16,
    result: Value,
}

struct Failure {
    status: u16,
    error: FibermapError,
}

impl From<FibermapError> for Failure {
    fn from(error: FibermapError) -> Self {
        Failure {
            status: error.kind().http_status(),
            error,
        }
    }
}

impl From<serde_json::Error> for Failure {
    fn from(error: serde_json::Error) -> Self {
        Failure::from(FibermapError::JsonError(error))
    }
}

type Routed = Result<Reply, Failure>;

fn ok<T: Serialize>(value: T) -> Routed {
    Ok(Reply {
        status: 200,
        result: serde_json::to_value(value)?,
    })
}

fn created<T: Serialize>(value: T) -> Routed {
    Ok(Reply {
        status: 201,
        result: serde_json::to_value(value)?,
    })
}

fn deleted(id: EntityId) -> Routed {
    ok(json!({ "deleted": true, "id": id }))
}

fn not_allowed(method: &str, path: &str) -> Routed {
    Err(Failure {
        status: 405,
        error: FibermapError::InvalidQuery(format!("Method {} not allowed on {}", method, path)),
    })
}

/// Route one request. Never panics and never returns an error: failures are
/// reported in the envelope with their stable kind.
pub fn dispatch(store: &Store, request: &ApiRequest) -> ApiResponse {
    let (path, mut query) = split_query(&request.path);
    for (k, v) in &request.query {
        query.insert(k.clone(), v.clone());
    }
    let method = request.method.trim().to_ascii_uppercase();
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let segments = match segments.split_first() {
        Some((&"api", rest)) => rest,
        _ => &segments[..],
    };

    let call = Call {
        store,
        method: &method,
        path,
        query: &query,
        body: &request.body,
    };
    let response = match call.route(segments) {
        Ok(reply) => ApiResponse {
            id: request.id.clone(),
            status: reply.status,
            success: true,
            result: Some(reply.result),
            error: None,
        },
        Err(failure) => ApiResponse {
            id: request.id.clone(),
            status: failure.status,
            success: false,
            result: None,
            error: Some(ApiError {
                kind: failure.error.kind(),
                detail: failure.error.detail(),
            }),
        },
    };
    tracing::debug!(
        id = %response.id,
        method = %method,
        path = %path,
        status = response.status,
        "api request"
    );
    response
}

fn split_query(raw: &str) -> (&str, BTreeMap<String, String>) {
    let mut query = BTreeMap::new();
    let Some((path, qs)) = raw.split_once('?') else {
        return (raw, query);
    };
    for (k, v) in form_urlencoded::parse(qs.as_bytes()) {
        query.insert(k.into_owned(), v.into_owned());
    }
    (path, query)
}

fn parse_id(raw: &str) -> Result<EntityId, FibermapError> {
    raw.parse::<EntityId>()
        .map_err(|_| FibermapError::InvalidQuery(format!("'{}' is not a valid id", raw)))
}

#[derive(Debug, Deserialize)]
struct AttachBody {
    splitter_id: EntityId,
    #[serde(default)]
    port: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AssignBody {
    customer_id: EntityId,
}

struct Call<'a> {
    store: &'a Store,
    method: &'a str,
    path: &'a str,
    query: &'a BTreeMap<String, String>,
    body: &'a Value,
}

impl Call<'_> {
    fn route(&self, segments: &[&str]) -> Routed {
        match segments {
            [] => match self.method {
                "GET" => ok(json!({
                    "service": "fibermap",
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "ok",
                })),
                _ => self.not_allowed(),
            },
            ["hierarchy", rest @ ..] => self.hierarchy(rest),
            ["topology", rest @ ..] => self.topology(rest),
            ["inventory-assets", rest @ ..] => self.assets(rest),
            ["customers", rest @ ..] => self.customers(rest),
            ["audit"] => match self.method {
                "GET" => {
                    let limit = self.limit()?.unwrap_or(self.store.config.list.default_limit);
                    ok(self
                        .store
                        .broker()
                        .with_read("audit.list", |conn| entities::recent_audit(conn, limit))?)
                }
                _ => self.not_allowed(),
            },
            _ => self.unknown(),
        }
    }

    fn not_allowed(&self) -> Routed {
        not_allowed(self.method, self.path)
    }

    fn unknown(&self) -> Routed {
        Err(FibermapError::NotFound(format!("No route for {} {}", self.method, self.path)).into())
    }

    fn body<T: DeserializeOwned>(&self) -> Result<T, FibermapError> {
        let body = match self.body {
            Value::Null => json!({}),
            other => other.clone(),
        };
        Ok(serde_json::from_value(body)?)
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, FibermapError> {
        match self.param(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                FibermapError::InvalidQuery(format!("{} must be a number, got '{}'", key, raw))
            }),
        }
    }

    fn limit(&self) -> Result<Option<usize>, FibermapError> {
        let max = self.store.config.list.max_limit;
        Ok(self.number::<usize>("limit")?.map(|l| l.min(max)))
    }

    /// Filters from the query string, with the configured page size applied.
    fn list_filter(&self) -> Result<ListFilter, FibermapError> {
        Ok(ListFilter {
            asset_type: self
                .param("asset_type")
                .or_else(|| self.param("type"))
                .map(str::to_string),
            status: self.param("status").map(str::to_string),
            location: self.param("location").map(str::to_string),
            skip: self.number("skip")?,
            limit: Some(self.limit()?.unwrap_or(self.store.config.list.default_limit)),
        })
    }

    fn read_one<T: entities::Entity>(&self, op: &str, raw_id: &str) -> Routed {
        let id = parse_id(raw_id)?;
        ok(self
            .store
            .broker()
            .with_read(op, |conn| entities::get::<T>(conn, id))?)
    }

    fn read_list<T: entities::Entity>(&self, op: &str) -> Routed {
        let filter = self.list_filter()?;
        ok(self
            .store
            .broker()
            .with_read(op, |conn| entities::list::<T>(conn, &filter))?)
    }

    fn hierarchy(&self, segments: &[&str]) -> Routed {
        let store = self.store;
        match (segments, self.method) {
            (["headends"], "GET") => ok(hierarchy::headend_tree(store)?),
            (["headends"], "POST") => {
                created(integrity::create_headend(store, &self.body::<NewHeadend>()?)?)
            }
            (["headends", id], "GET") => self.read_one::<Headend>("headend.get", id),
            (["headends", id], "DELETE") => {
                let id = parse_id(id)?;
                integrity::delete_headend(store, id)?;
                deleted(id)
            }

            (["fdhs"], "GET") => ok(hierarchy::list_fdhs(store)?),
            (["fdhs"], "POST") => created(integrity::create_fdh(store, &self.body::<NewFdh>()?)?),
            (["fdhs", id], "GET") => self.read_one::<Fdh>("fdh.get", id),
            (["fdhs", id], "PUT") => ok(integrity::update_fdh(
                store,
                parse_id(id)?,
                &self.body::<FdhUpdate>()?,
            )?),
            (["fdhs", id], "DELETE") => {
                let id = parse_id(id)?;
                integrity::delete_fdh(store, id)?;
                deleted(id)
            }

            (["splitters"], "GET") => ok(hierarchy::list_splitters(store)?),
            (["splitters"], "POST") => {
                created(integrity::create_splitter(store, &self.body::<NewSplitter>()?)?)
            }
            (["splitters", id], "GET") => self.read_one::<Splitter>("splitter.get", id),
            (["splitters", id], "PUT") => ok(integrity::update_splitter(
                store,
                parse_id(id)?,
                &self.body::<SplitterUpdate>()?,
            )?),
            (["splitters", id], "DELETE") => {
                let id = parse_id(id)?;
                integrity::delete_splitter(store, id)?;
                deleted(id)
            }

            (["headends"] | ["headends", _] | ["fdhs"] | ["fdhs", _] | ["splitters"]
            | ["splitters", _], _) => self.not_allowed(),
            _ => self.unknown(),
        }
    }

    fn topology(&self, segments: &[&str]) -> Routed {
        let query = match segments {
            ["customer", id] => TopologyQuery::customer(parse_id(id)?),
            ["fdh", id] => TopologyQuery::fdh(parse_id(id)?),
            ["search"] => TopologyQuery {
                customer_id: self.number("customer_id")?,
                fdh_id: self.number("fdh_id")?,
                asset_serial: self
                    .param("serial")
                    .or_else(|| self.param("asset_serial"))
                    .map(str::to_string),
            },
            _ => return self.unknown(),
        };
        if self.method != "GET" {
            return self.not_allowed();
        }
        ok(topology::topology_for(self.store, &query)?)
    }

    fn assets(&self, segments: &[&str]) -> Routed {
        let store = self.store;
        match (segments, self.method) {
            ([], "GET") => self.read_list::<Asset>("asset.list"),
            ([], "POST") => created(integrity::create_asset(store, &self.body::<NewAsset>()?)?),
            ([id], "GET") => self.read_one::<Asset>("asset.get", id),
            ([id], "PUT") => ok(integrity::update_asset(
                store,
                parse_id(id)?,
                &self.body::<AssetUpdate>()?,
            )?),
            ([id], "DELETE") => ok(integrity::retire_asset(store, parse_id(id)?)?),
            ([id, "assign"], "POST") => {
                let body = self.body::<AssignBody>()?;
                ok(integrity::assign_asset(store, parse_id(id)?, body.customer_id)?)
            }
            ([id, "unassign"], "POST") => ok(integrity::unassign_asset(store, parse_id(id)?)?),

            ([] | [_] | [_, "assign"] | [_, "unassign"], _) => self.not_allowed(),
            _ => self.unknown(),
        }
    }

    fn customers(&self, segments: &[&str]) -> Routed {
        let store = self.store;
        match (segments, self.method) {
            ([], "GET") => self.read_list::<Customer>("customer.list"),
            ([], "POST") => {
                created(integrity::create_customer(store, &self.body::<NewCustomer>()?)?)
            }
            ([id], "GET") => self.read_one::<Customer>("customer.get", id),
            ([id], "PUT") => ok(integrity::update_customer(
                store,
                parse_id(id)?,
                &self.body::<CustomerUpdate>()?,
            )?),
            ([id], "DELETE") => {
                let id = parse_id(id)?;
                integrity::delete_customer(store, id)?;
                deleted(id)
            }
            ([id, "attach"], "POST") => {
                let body = self.body::<AttachBody>()?;
                ok(integrity::attach_customer(
                    store,
                    parse_id(id)?,
                    body.splitter_id,
                    body.port,
                )?)
            }
            ([id, "detach"], "POST") => ok(integrity::detach_customer(store, parse_id(id)?)?),

            ([] | [_] | [_, "attach"] | [_, "detach"], _) => self.not_allowed(),
            _ => self.unknown(),
        }
    }
}
