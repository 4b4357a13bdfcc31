use std::sync::Arc;

use chrono::Utc;
use clockify_core::{
    clients_from_projects, extract_categories, filter_by_category, find_by_name, match_exact,
    projects_for_client, workspace_stats, Aggregate, CacheSlot, ClientUsage, NameMatches,
    Project, ProjectCategory, ProjectDraft, WorkspaceStats,
};
use clockify_logging::{clk_info, clk_warn};
use serde::Serialize;

use super::{decode, settle_listing};
use crate::client::{ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStructure {
    pub discovered_at: String,
    pub statistics: WorkspaceStats,
    pub projects: Vec<Project>,
    pub categories: Vec<ProjectCategory>,
}

pub struct ProjectManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    cache: CacheSlot<Aggregate<Project>>,
}

impl ProjectManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            cache: CacheSlot::new(),
        }
    }

    pub async fn get_all_projects(&mut self, use_cache: bool) -> Aggregate<Project> {
        if use_cache {
            if let Some(cached) = self.cache.get() {
                return cached.clone();
            }
        }
        let aggregate = self.client.list_projects(Fetch::all()).await;
        if settle_listing(&aggregate, self.sink.as_ref(), "all_projects") {
            self.cache.store(aggregate.clone());
        }
        aggregate
    }

    pub async fn get_project_by_id(&self, project_id: &str) -> Result<Project, ApiError> {
        let value = self
            .client
            .get_record(&format!("/projects/{project_id}"))
            .await?;
        decode(value)
    }

    /// Case-insensitive exact name lookup over the cached listing.
    pub async fn get_project_by_name(&mut self, name: &str) -> Option<Project> {
        let projects = self.get_all_projects(true).await;
        find_by_name(&projects.items, name).cloned()
    }

    /// Case-insensitive exact lookup of several names.
    pub async fn get_projects_by_names(&mut self, names: &[String]) -> NameMatches<Project> {
        let projects = self.get_all_projects(true).await;
        let matches = match_exact(&projects.items, names);
        if !matches.missing.is_empty() {
            clk_warn!("Projects not found: {:?}", matches.missing);
        }
        if !matches.found.is_empty() {
            export_dataset(self.sink.as_ref(), "projects_by_names", &matches.found);
        }
        matches
    }

    pub fn filter_projects_by_client_id(projects: &[Project], client_id: &str) -> Vec<Project> {
        projects_for_client(projects, client_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Asks the API for one client's projects instead of filtering locally.
    pub async fn get_projects_by_client_api(&self, client_id: &str) -> Aggregate<Project> {
        let aggregate = self
            .client
            .list_projects_for_client(client_id, Fetch::all())
            .await;
        settle_listing(
            &aggregate,
            self.sink.as_ref(),
            &format!("projects_client_{client_id}"),
        );
        aggregate
    }

    pub fn extract_clients_from_projects(&self, projects: &[Project]) -> Vec<ClientUsage> {
        let clients = clients_from_projects(projects);
        clk_info!("Found {} clients referenced by projects", clients.len());
        if !clients.is_empty() {
            export_dataset(self.sink.as_ref(), "clients_from_projects", &clients);
        }
        clients
    }

    pub fn extract_categories_from_projects(&self, projects: &[Project]) -> Vec<ProjectCategory> {
        let categories = extract_categories(projects);
        clk_info!("Found {} project categories", categories.len());
        if !categories.is_empty() {
            export_dataset(self.sink.as_ref(), "categories", &categories);
        }
        categories
    }

    pub fn filter_projects_by_category(&self, projects: &[Project], category: &str) -> Vec<Project> {
        let matched: Vec<Project> = filter_by_category(projects, category)
            .into_iter()
            .cloned()
            .collect();
        clk_info!("{} projects in category {category}", matched.len());
        if !matched.is_empty() {
            export_dataset(
                self.sink.as_ref(),
                &format!("projects_category_{category}"),
                &matched,
            );
        }
        matched
    }

    pub async fn discover_workspace_structure(&mut self) -> WorkspaceStructure {
        let projects = self.get_all_projects(true).await.into_items();
        let categories = self.extract_categories_from_projects(&projects);
        let structure = WorkspaceStructure {
            discovered_at: Utc::now().to_rfc3339(),
            statistics: workspace_stats(&projects, &categories),
            projects,
            categories,
        };
        clk_info!(
            "Workspace has {} projects in {} categories",
            structure.statistics.total_projects,
            structure.statistics.total_categories
        );
        export_dataset(
            self.sink.as_ref(),
            "workspace_structure_discovery",
            &structure,
        );
        structure
    }

    pub async fn create_project(&mut self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        self.cache.invalidate();
        let value = self
            .client
            .post(&self.client.workspace_endpoint("/projects"), draft)
            .await?;
        let project: Project = decode(value)?;
        clk_info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn update_project(
        &mut self,
        project_id: &str,
        draft: &ProjectDraft,
    ) -> Result<Project, ApiError> {
        self.cache.invalidate();
        let value = self
            .client
            .put(
                &self.client.workspace_endpoint(&format!("/projects/{project_id}")),
                draft,
            )
            .await?;
        decode(value)
    }

    pub async fn delete_project(&mut self, project_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate();
        self.client
            .delete(&self.client.workspace_endpoint(&format!("/projects/{project_id}")))
            .await?;
        clk_info!("Deleted project {project_id}");
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate();
    }
}
