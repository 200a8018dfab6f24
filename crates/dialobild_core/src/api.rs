//! JSON request/response envelopes for editor clients.
//!
//! # Responsibility
//! - Validate request bodies before any service call.
//! - Map service outcomes and errors to status codes and JSON bodies.
//!
//! # Invariants
//! - Successful bodies carry `"error": 0`.
//! - Internal failures never leak persistence details to the caller.

use crate::config::LayoutConfig;
use crate::graph::error::{ErrorKind, GraphError};
use crate::model::graph::{NodeId, OwnerId, ProjectRef};
use crate::model::wire::WireNode;
use crate::service::ingest_service::IngestService;
use crate::service::project_service::ProjectService;
use crate::service::reconcile_service::ReconcileService;
use log::warn;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

impl From<ApiError> for ApiResponse {
    fn from(value: ApiError) -> Self {
        Self {
            status: value.status(),
            body: json!({ "error": value.public_message() }),
        }
    }
}

/// Envelope-level failure.
#[derive(Debug)]
pub enum ApiError {
    /// Required body field is absent.
    MissingParameter(&'static str),
    /// Body field is present but has the wrong shape.
    MalformedRequest(String),
    Graph(GraphError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingParameter(_) | Self::MalformedRequest(_) => 400,
            Self::Graph(err) if err.kind() == ErrorKind::NotFound => 404,
            Self::Graph(_) => 500,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Graph(err) if err.kind() == ErrorKind::Internal => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter(name) => write!(f, "missing parameter `{name}`"),
            Self::MalformedRequest(message) => write!(f, "malformed request: {message}"),
            Self::Graph(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// Saves a full node list (`{project_id|project_name, nodes}`).
pub fn save_project(conn: &Connection, owner_id: OwnerId, body: &Value) -> ApiResponse {
    respond("save_project", || {
        let project = project_ref(body)?;
        let nodes = required(body, "nodes")?;
        let nodes: Vec<WireNode> = serde_json::from_value(nodes.clone())
            .map_err(|err| ApiError::MalformedRequest(format!("`nodes`: {err}")))?;

        let reconciled = ReconcileService::new(conn).reconcile(owner_id, &project, &nodes)?;
        Ok(json!({
            "error": 0,
            "project_name": reconciled.project.name,
            "deleted": reconciled.outcome.deleted,
            "modified": reconciled.outcome.modified,
            "added": reconciled.outcome.added,
            "new_nodes_ids": reconciled.outcome.new_node_ids,
        }))
    })
}

/// Expands raw text below a node (`{project_id|project_name, active_node, text}`).
pub fn add_raw_nodes(
    conn: &Connection,
    owner_id: OwnerId,
    layout: &LayoutConfig,
    body: &Value,
) -> ApiResponse {
    respond("add_raw_nodes", || {
        let project = project_ref(body)?;
        let anchor_id = integer(required(body, "active_node")?, "active_node")?;
        let text = required(body, "text")?
            .as_str()
            .ok_or_else(|| ApiError::MalformedRequest("`text` must be a string".to_string()))?;

        let ingested =
            IngestService::new(conn, layout).ingest(owner_id, &project, anchor_id, text)?;
        Ok(json!({
            "error": 0,
            "update": ingested.nodes,
        }))
    })
}

/// Loads one project with nodes and catalogs (`{project_id|project_name}`).
pub fn get_project(conn: &Connection, owner_id: OwnerId, body: &Value) -> ApiResponse {
    respond("get_project", || {
        let project = project_ref(body)?;
        let view = ProjectService::new(conn).load_project(owner_id, &project)?;
        Ok(json!({
            "error": 0,
            "project_id": view.project.id,
            "project_name": view.project.name,
            "nodes": view.nodes,
            "node_types": view.node_types,
            "rule_types": view.rule_types,
            "default_rule": view.project.default_rule_code,
        }))
    })
}

/// Lists the caller's projects.
pub fn list_projects(conn: &Connection, owner_id: OwnerId) -> ApiResponse {
    respond("list_projects", || {
        let projects = ProjectService::new(conn).list_projects(owner_id)?;
        let projects = projects
            .iter()
            .map(|project| json!({ "id": project.id, "name": project.name }))
            .collect::<Vec<_>>();
        Ok(json!({
            "error": 0,
            "projects": projects,
        }))
    })
}

fn respond(
    endpoint: &'static str,
    handler: impl FnOnce() -> Result<Value, ApiError>,
) -> ApiResponse {
    match handler() {
        Ok(body) => ApiResponse::ok(body),
        Err(err) => {
            warn!(
                "event=api_request module=api status=error endpoint={endpoint} http_status={} error={err}",
                err.status()
            );
            err.into()
        }
    }
}

fn required<'b>(body: &'b Value, name: &'static str) -> Result<&'b Value, ApiError> {
    match body.get(name) {
        Some(Value::Null) | None => Err(ApiError::MissingParameter(name)),
        Some(value) => Ok(value),
    }
}

fn integer(value: &Value, name: &'static str) -> Result<NodeId, ApiError> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
        .ok_or_else(|| ApiError::MalformedRequest(format!("`{name}` must be an integer")))
}

fn project_ref(body: &Value) -> Result<ProjectRef, ApiError> {
    if let Ok(value) = required(body, "project_id") {
        return integer(value, "project_id").map(ProjectRef::Id);
    }
    let name = required(body, "project_name")?
        .as_str()
        .ok_or_else(|| ApiError::MalformedRequest("`project_name` must be a string".to_string()))?;
    Ok(ProjectRef::Name(name.to_string()))
}
