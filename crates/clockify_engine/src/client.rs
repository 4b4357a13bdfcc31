use std::sync::Arc;

use clockify_core::{
    extract_page_items, sniff_shape, Aggregate, Client, Expense, ExpenseCategory, Group, PagePlan,
    Project, ResponseShape, Task, User,
};
use clockify_logging::{clk_error, clk_info, clk_warn};
use serde::Serialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::transport::{ApiRequest, ReqwestTransport, Transport};
use crate::walker::{PageWalker, PAGE_PARAM, PAGE_SIZE_PARAM};
use crate::{ApiError, FailureKind};

/// How much of a listing to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Walk every page under the given plan.
    AllPages(PagePlan),
    /// One bare request without paging parameters.
    FirstPage,
}

impl Default for Fetch {
    fn default() -> Self {
        Fetch::AllPages(PagePlan::default())
    }
}

impl Fetch {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Fetch::AllPages(PagePlan::default().with_page_size(page_size))
    }
}

/// What a one-item probe learned about a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationProbe {
    pub endpoint: String,
    pub first_page_items: usize,
    pub shape: ResponseShape,
}

pub fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Endpoint wrappers for one workspace.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    workspace_id: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, workspace_id: impl Into<String>) -> Self {
        Self {
            transport,
            workspace_id: workspace_id.into(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.workspace_id.clone()))
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Same transport, different workspace.
    pub fn for_workspace(&self, workspace_id: impl Into<String>) -> Self {
        Self::new(self.transport.clone(), workspace_id)
    }

    pub fn workspace_endpoint(&self, path: &str) -> String {
        format!("/workspaces/{}{}", self.workspace_id, path)
    }

    pub async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        self.transport
            .send(&ApiRequest::get(endpoint).with_params(query))
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value, ApiError> {
        let body = to_body(body)?;
        self.transport.send(&ApiRequest::post(endpoint, body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value, ApiError> {
        let body = to_body(body)?;
        self.transport.send(&ApiRequest::put(endpoint, body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.transport.send(&ApiRequest::delete(endpoint)).await
    }

    /// Lists a workspace-relative path, raw.
    pub async fn list(&self, path: &str, filters: &[(String, String)], fetch: Fetch) -> Aggregate<Value> {
        let endpoint = self.workspace_endpoint(path);
        match fetch {
            Fetch::AllPages(plan) => {
                PageWalker::new(self.transport.as_ref())
                    .walk(&endpoint, filters, plan)
                    .await
            }
            Fetch::FirstPage => match self.get(&endpoint, filters).await {
                Ok(body) => Aggregate::single_page(extract_page_items(body)),
                Err(err) => {
                    clk_error!("{endpoint}: request failed: {err}");
                    Aggregate::failed(err.to_string())
                }
            },
        }
    }

    pub async fn list_projects(&self, fetch: Fetch) -> Aggregate<Project> {
        self.list("/projects", &[], fetch).await.decode()
    }

    /// Projects of one client, filtered server side.
    pub async fn list_projects_for_client(&self, client_id: &str, fetch: Fetch) -> Aggregate<Project> {
        self.list("/projects", &[param("clients", client_id)], fetch)
            .await
            .decode()
    }

    pub async fn list_tasks_for_project(&self, project_id: &str, fetch: Fetch) -> Aggregate<Task> {
        let aggregate: Aggregate<Task> = self
            .list(&format!("/projects/{project_id}/tasks"), &[], fetch)
            .await
            .decode();
        // Some task payloads omit the owning project.
        let Aggregate {
            mut items,
            pages_fetched,
            stop,
        } = aggregate;
        for task in &mut items {
            if task.project_id.is_empty() {
                task.project_id = project_id.to_string();
            }
        }
        Aggregate::new(items, pages_fetched, stop)
    }

    pub async fn list_users(&self, fetch: Fetch) -> Aggregate<User> {
        self.list("/users", &[], fetch).await.decode()
    }

    pub async fn list_groups(&self, fetch: Fetch) -> Aggregate<Group> {
        self.list("/user-groups", &[], fetch).await.decode()
    }

    pub async fn list_clients(&self, fetch: Fetch) -> Aggregate<Client> {
        self.list("/clients", &[], fetch).await.decode()
    }

    pub async fn list_expenses(&self, filters: &[(String, String)], fetch: Fetch) -> Aggregate<Expense> {
        self.list("/expenses", filters, fetch).await.decode()
    }

    pub async fn list_user_expenses(
        &self,
        user_id: &str,
        filters: &[(String, String)],
        fetch: Fetch,
    ) -> Aggregate<Expense> {
        self.list(&format!("/user/{user_id}/expenses"), filters, fetch)
            .await
            .decode()
    }

    pub async fn list_expense_categories(&self, fetch: Fetch) -> Aggregate<ExpenseCategory> {
        self.list("/expenses/categories", &[], fetch).await.decode()
    }

    pub async fn list_tags(&self, fetch: Fetch) -> Aggregate<Value> {
        self.list("/tags", &[], fetch).await
    }

    pub async fn list_time_entries(&self, user_id: &str, fetch: Fetch) -> Aggregate<Value> {
        self.list(&format!("/user/{user_id}/time-entries"), &[], fetch)
            .await
    }

    pub async fn list_custom_fields(&self, fetch: Fetch) -> Aggregate<Value> {
        self.list("/custom-fields", &[], fetch).await
    }

    /// Fetches one workspace-relative record.
    pub async fn get_record(&self, path: &str) -> Result<Value, ApiError> {
        self.get(&self.workspace_endpoint(path), &[]).await
    }

    pub async fn workspace_info(&self) -> Result<Value, ApiError> {
        self.get(&format!("/workspaces/{}", self.workspace_id), &[])
            .await
    }

    /// True when the key can read the configured workspace.
    pub async fn validate_connection(&self) -> bool {
        match self.workspace_info().await {
            Ok(info) => {
                let echoed = info.get("id").and_then(Value::as_str);
                if echoed == Some(self.workspace_id.as_str()) {
                    clk_info!("Connected to workspace {}", self.workspace_id);
                    true
                } else {
                    clk_warn!(
                        "Workspace lookup for {} returned an unexpected body",
                        self.workspace_id
                    );
                    false
                }
            }
            Err(err) => {
                clk_error!("Could not reach workspace {}: {err}", self.workspace_id);
                false
            }
        }
    }

    /// No rate-limit endpoint exists; a successful workspace read is the best signal.
    pub async fn check_rate_limits(&self) -> bool {
        self.validate_connection().await
    }

    /// Requests a single one-item page to see how a listing responds.
    pub async fn probe_pagination(&self, path: &str) -> Result<PaginationProbe, ApiError> {
        let endpoint = self.workspace_endpoint(path);
        let request = ApiRequest::get(&endpoint)
            .with_query(PAGE_PARAM, 1)
            .with_query(PAGE_SIZE_PARAM, 1);
        let body = self.transport.send(&request).await?;
        let shape = sniff_shape(&body);
        Ok(PaginationProbe {
            endpoint,
            first_page_items: extract_page_items(body).len(),
            shape,
        })
    }

    pub fn is_error_response<T>(aggregate: &Aggregate<T>) -> bool {
        aggregate.is_error()
    }

    pub fn get_error_message<T>(aggregate: &Aggregate<T>) -> Option<&str> {
        aggregate.error_message()
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::new(FailureKind::InvalidBody, err.to_string()))
}
