use std::collections::BTreeMap;
use std::sync::Arc;

use clockify_core::{
    canonical_ids, find_containing, tasks_per_project, Aggregate, Project, ScopedCache, Task,
    TaskDraft,
};
use clockify_logging::{clk_debug, clk_info};

use super::{decode, settle_listing};
use crate::client::{ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::ApiError;

/// Tasks are cached per project.
pub struct TaskManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    cache: ScopedCache<Aggregate<Task>>,
}

impl TaskManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            cache: ScopedCache::new(),
        }
    }

    fn task_endpoint(&self, project_id: &str, task_id: &str) -> String {
        self.client
            .workspace_endpoint(&format!("/projects/{project_id}/tasks/{task_id}"))
    }

    pub async fn get_tasks_by_project(&mut self, project_id: &str, use_cache: bool) -> Aggregate<Task> {
        if use_cache {
            if let Some(cached) = self.cache.get(project_id) {
                return cached.clone();
            }
        }
        let aggregate = self
            .client
            .list_tasks_for_project(project_id, Fetch::all())
            .await;
        let export_name = format!("tasks_project_{project_id}");
        if settle_listing(&aggregate, self.sink.as_ref(), &export_name) {
            self.cache.store(project_id, aggregate.clone());
        }
        aggregate
    }

    pub async fn get_task_by_id(&self, project_id: &str, task_id: &str) -> Result<Task, ApiError> {
        let value = self
            .client
            .get(&self.task_endpoint(project_id, task_id), &[])
            .await?;
        decode(value)
    }

    /// Tasks whose name contains `fragment`, case-insensitively, across `projects`.
    pub async fn get_tasks_by_name(&mut self, projects: &[Project], fragment: &str) -> Vec<Task> {
        let mut matched = Vec::new();
        for project in projects {
            let tasks = self.get_tasks_by_project(&project.id, true).await;
            matched.extend(find_containing(&tasks.items, fragment).into_iter().cloned());
        }
        clk_info!("{} tasks match {fragment:?}", matched.len());
        if !matched.is_empty() {
            export_dataset(self.sink.as_ref(), "tasks_by_name", &matched);
        }
        matched
    }

    /// Task counts keyed by project id; projects without tasks count zero.
    pub async fn count_tasks_per_project(&mut self, projects: &[Project]) -> BTreeMap<String, usize> {
        let mut all = Vec::new();
        for project in projects {
            all.extend(self.get_tasks_by_project(&project.id, true).await.into_items());
        }
        let mut counts = tasks_per_project(&all);
        for project in projects {
            counts.entry(project.id.clone()).or_insert(0);
        }
        counts
    }

    pub async fn create_task(&mut self, project_id: &str, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.cache.invalidate(project_id);
        let endpoint = self
            .client
            .workspace_endpoint(&format!("/projects/{project_id}/tasks"));
        let value = self.client.post(&endpoint, draft).await?;
        let task: Task = decode(value)?;
        clk_info!("Created task {} in project {project_id}", task.name);
        Ok(task)
    }

    pub async fn update_task(
        &mut self,
        project_id: &str,
        task_id: &str,
        draft: &TaskDraft,
    ) -> Result<Task, ApiError> {
        self.cache.invalidate(project_id);
        let endpoint = self.task_endpoint(project_id, task_id);
        let value = self.client.put(&endpoint, draft).await?;
        decode(value)
    }

    pub async fn delete_task(&mut self, project_id: &str, task_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate(project_id);
        let endpoint = self.task_endpoint(project_id, task_id);
        self.client.delete(&endpoint).await?;
        clk_info!("Deleted task {task_id} from project {project_id}");
        Ok(())
    }

    /// Replaces the users and groups assigned to `task`.
    pub async fn assign_task_access(
        &mut self,
        task: &Task,
        user_ids: &[String],
        group_ids: &[String],
    ) -> Result<Task, ApiError> {
        let draft = TaskDraft {
            assignee_ids: canonical_ids(user_ids),
            user_group_ids: canonical_ids(group_ids),
            ..TaskDraft::from_task(task)
        };
        clk_debug!(
            "Assigning {} users and {} groups to task {}",
            draft.assignee_ids.len(),
            draft.user_group_ids.len(),
            task.id
        );
        self.update_task(&task.project_id, &task.id, &draft).await
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate_all();
    }
}
