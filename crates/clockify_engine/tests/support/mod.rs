#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clockify_engine::{
    ApiClient, ApiError, ApiRequest, ExportSink, FailureKind, Method, Transport, PAGE_PARAM,
    PAGE_SIZE_PARAM,
};
use serde_json::{json, Value};

pub const WORKSPACE: &str = "ws1";

/// In-memory stand-in for the API.
///
/// Listings are served in pages honoring `page` and `page-size`; writes echo
/// their body back with a generated id. Every request is recorded.
#[derive(Default)]
pub struct StubTransport {
    listings: Mutex<HashMap<String, Vec<Value>>>,
    records: Mutex<HashMap<String, Value>>,
    failing_pages: Mutex<HashMap<String, usize>>,
    rejected_marker: Mutex<Option<String>>,
    calls: Arc<Mutex<Vec<ApiRequest>>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serves `items` under the workspace-relative listing `path`.
    pub fn with_listing(self: &Arc<Self>, path: &str, items: Vec<Value>) -> Arc<Self> {
        self.listings
            .lock()
            .unwrap()
            .insert(workspace_path(path), items);
        self.clone()
    }

    /// Serves `body` for GET requests on the absolute `endpoint`.
    pub fn with_record(self: &Arc<Self>, endpoint: &str, body: Value) -> Arc<Self> {
        self.records
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), body);
        self.clone()
    }

    /// Fails page `page` of the workspace-relative listing `path` with a 500.
    pub fn failing_page(self: &Arc<Self>, path: &str, page: usize) -> Arc<Self> {
        self.failing_pages
            .lock()
            .unwrap()
            .insert(workspace_path(path), page);
        self.clone()
    }

    /// Rejects any write whose body mentions `marker`.
    pub fn rejecting_writes_containing(self: &Arc<Self>, marker: &str) -> Arc<Self> {
        *self.rejected_marker.lock().unwrap() = Some(marker.to_string());
        self.clone()
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with(&self, method: Method, endpoint: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.endpoint == endpoint)
            .collect()
    }

    pub fn writes(&self) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method != Method::Get)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn serve_get(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        if let Some(body) = self.records.lock().unwrap().get(&request.endpoint) {
            return Ok(body.clone());
        }
        let listings = self.listings.lock().unwrap();
        let Some(items) = listings.get(&request.endpoint) else {
            return Err(ApiError::new(FailureKind::HttpStatus(404), "404 Not Found"));
        };
        let page: Option<usize> = request.query_value(PAGE_PARAM).and_then(|v| v.parse().ok());
        let size: Option<usize> = request
            .query_value(PAGE_SIZE_PARAM)
            .and_then(|v| v.parse().ok());
        let (Some(page), Some(size)) = (page, size) else {
            return Ok(Value::Array(items.clone()));
        };
        if self.failing_pages.lock().unwrap().get(&request.endpoint) == Some(&page) {
            return Err(ApiError::new(
                FailureKind::HttpStatus(500),
                "500 Internal Server Error",
            ));
        }
        let start = (page - 1) * size;
        Ok(Value::Array(
            items.iter().skip(start).take(size).cloned().collect(),
        ))
    }

    fn serve_write(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let body = request.body.clone().unwrap_or(Value::Null);
        if let Some(marker) = self.rejected_marker.lock().unwrap().as_deref() {
            if body.to_string().contains(marker) {
                return Err(ApiError::new(FailureKind::HttpStatus(400), "400 Bad Request"));
            }
        }
        if request.method == Method::Delete {
            return Ok(Value::Null);
        }
        let count = self.calls.lock().unwrap().len();
        let mut echoed = match body {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let id = request
            .endpoint
            .rsplit('/')
            .next()
            .filter(|_| request.method == Method::Put)
            .map(str::to_string)
            .unwrap_or_else(|| format!("created-{count}"));
        echoed.insert("id".to_string(), json!(id));
        echoed.entry("name").or_insert(json!(""));
        Ok(Value::Object(echoed))
    }
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        match request.method {
            Method::Get => self.serve_get(request),
            _ => self.serve_write(request),
        }
    }
}

pub fn workspace_path(path: &str) -> String {
    format!("/workspaces/{WORKSPACE}{path}")
}

pub fn client_for(transport: &Arc<StubTransport>) -> ApiClient {
    ApiClient::new(transport.clone(), WORKSPACE)
}

/// Keeps exported datasets in memory, by name.
#[derive(Default)]
pub struct RecordingSink {
    exports: Mutex<Vec<(String, Value)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn names(&self) -> Vec<String> {
        self.exports
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn last(&self, name: &str) -> Option<Value> {
        self.exports
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(exported, _)| exported == name)
            .map(|(_, value)| value.clone())
    }
}

impl ExportSink for RecordingSink {
    fn export(&self, name: &str, dataset: &Value) {
        self.exports
            .lock()
            .unwrap()
            .push((name.to_string(), dataset.clone()));
    }
}

pub fn project(id: &str, name: &str, client: Option<(&str, &str)>) -> Value {
    let mut body = json!({ "id": id, "name": name, "archived": false, "billable": true });
    if let Some((client_id, client_name)) = client {
        body["clientId"] = json!(client_id);
        body["clientName"] = json!(client_name);
    }
    body
}

pub fn task(id: &str, name: &str, project_id: &str, assignees: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "projectId": project_id,
        "assigneeIds": assignees,
        "userGroupIds": [],
        "status": "ACTIVE"
    })
}

pub fn user(id: &str, name: &str, email: &str) -> Value {
    json!({ "id": id, "name": name, "email": email, "status": "ACTIVE" })
}

pub fn group(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "userIds": [] })
}

pub fn category(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "archived": false, "hasUnitPrice": false })
}
