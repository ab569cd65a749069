//! Webhook descriptors, route keys and the request/response values that flow
//! through a test dispatch.
//!
//! Paths are stored without a leading or trailing slash (`"orders/new"`,
//! `":id/items"`). A segment starting with [`PATH_PARAM_MARKER`] is a named
//! parameter.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a named path segment (`:id`).
pub const PATH_PARAM_MARKER: char = ':';

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

/// HTTP methods a webhook can listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl HttpMethod {
    /// Every supported method, in a stable order.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Delete,
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Patch,
        HttpMethod::Post,
        HttpMethod::Put,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(HttpMethod::Delete),
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "PATCH" => Ok(HttpMethod::Patch),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            other => Err(format!("unsupported HTTP method: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptions and descriptors
// ---------------------------------------------------------------------------

/// One webhook trigger exposed by a workflow node, before it is bound to a
/// persisted workflow id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDescription {
    pub http_method: HttpMethod,
    /// Path template without surrounding slashes.
    pub path: String,
    /// Opaque discriminator addressing a dynamic (parameterized) path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    /// Name of the workflow node that owns this trigger.
    pub node_name: String,
    /// CORS allowed-origins setting of the node (`"*"` or a comma list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<String>,
}

/// A webhook trigger bound to its workflow.
///
/// Treated as an immutable value once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDescriptor {
    pub http_method: HttpMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    pub workflow_id: Uuid,
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<String>,
}

impl WebhookDescriptor {
    /// Bind a node-level description to a persisted workflow.
    pub fn bind(description: WebhookDescription, workflow_id: Uuid) -> Self {
        Self {
            http_method: description.http_method,
            path: trim_slashes(&description.path).to_string(),
            webhook_id: description.webhook_id,
            workflow_id,
            node_name: description.node_name,
            allowed_origins: description.allowed_origins,
        }
    }

    /// Whether the path template contains a named parameter segment.
    pub fn has_params(&self) -> bool {
        path_segments(&self.path).any(|s| s.starts_with(PATH_PARAM_MARKER))
    }

    /// Dynamic descriptors are addressed through their webhook id.
    pub fn is_dynamic(&self) -> bool {
        self.webhook_id.is_some() && self.has_params()
    }

    /// The route key this descriptor is matched under.
    pub fn route_key(&self) -> RouteKey {
        match &self.webhook_id {
            Some(webhook_id) if self.has_params() => RouteKey::dynamic(
                self.http_method,
                webhook_id.clone(),
                path_segments(&self.path).count(),
            ),
            _ => RouteKey::fixed(self.http_method, &self.path),
        }
    }

    /// The key under which this descriptor's test registration is stored.
    pub fn registration_key(&self) -> RegistrationKey {
        RegistrationKey {
            route: self.route_key(),
            workflow_id: self.workflow_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// What a route key addresses: a literal path or a webhook id plus the arity
/// of its template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteTarget {
    Static { path: String },
    Dynamic { webhook_id: String, segments: usize },
}

/// Key of the path index used by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub method: HttpMethod,
    pub target: RouteTarget,
}

impl RouteKey {
    pub fn fixed(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            target: RouteTarget::Static {
                path: trim_slashes(path).to_string(),
            },
        }
    }

    pub fn dynamic(method: HttpMethod, webhook_id: impl Into<String>, segments: usize) -> Self {
        Self {
            method,
            target: RouteTarget::Dynamic {
                webhook_id: webhook_id.into(),
                segments,
            },
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            RouteTarget::Static { path } => write!(f, "{}|{}", self.method, path),
            RouteTarget::Dynamic {
                webhook_id,
                segments,
            } => write!(f, "{}|{}/<{}>", self.method, webhook_id, segments),
        }
    }
}

/// Identity of one active test registration.
///
/// Structured rather than a concatenated string so that no delimiter choice
/// can make two different descriptors collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationKey {
    pub route: RouteKey,
    pub workflow_id: Uuid,
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.route, self.workflow_id)
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// An incoming call to a test webhook, detached from the HTTP server types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub method: HttpMethod,
    /// Path below the test-webhook prefix.
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Path parameters bound by the matcher.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl WebhookRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: serde_json::Value::Null,
            params: HashMap::new(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}

/// What the executor wants written back to the webhook caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl WebhookResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::json(status, serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Strip one leading and one trailing slash.
pub fn trim_slashes(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Non-empty segments of a path.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
