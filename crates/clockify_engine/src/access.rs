//! Two-phase task access run.
//!
//! Phase one hands authorized tasks to the roster's users and groups. Phase two
//! gives restricted tasks to every group except the restricted ones, leaving
//! their user assignees alone. Updates are issued one at a time; a failed
//! update is logged and counted and the run moves on. Nothing is rolled back.
//!
//! A phase with any listing that did not complete issues no update at all;
//! the ids it would write could be short.

use std::sync::Arc;

use clockify_core::{
    allowed_group_ids, canonical_ids, match_authorized, match_restricted, Project, Roster, TaskMatch,
};
use clockify_logging::{clk_error, clk_info, clk_warn};
use serde::Serialize;

use crate::client::ApiClient;
use crate::export::{export_dataset, ExportSink};
use crate::managers::{ClientManager, GroupManager, ProjectManager, TaskManager, UserManager};
use crate::types::IncompleteListing;

/// Which projects a run looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    ClientId(String),
    ClientName(String),
    ProjectId(String),
    ProjectName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub matched: usize,
    pub updated: usize,
    pub failed: usize,
    pub applied: bool,
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
    /// Listings that stopped early during this phase.
    pub lookup_errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessReport {
    pub projects: usize,
    /// Set when the project set could not be determined; no phase ran.
    pub project_error: Option<String>,
    pub grant: PhaseReport,
    pub restrict: PhaseReport,
}

impl AccessReport {
    /// Failed updates plus incomplete listings.
    pub fn failures(&self) -> usize {
        usize::from(self.project_error.is_some())
            + [&self.grant, &self.restrict]
                .iter()
                .map(|phase| phase.failed + phase.lookup_errors.len())
                .sum::<usize>()
    }
}

pub struct AccessRun {
    roster: Roster,
    approve_changes: bool,
    sink: Arc<dyn ExportSink>,
    projects: ProjectManager,
    clients: ClientManager,
    tasks: TaskManager,
    users: UserManager,
    groups: GroupManager,
}

impl AccessRun {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>, roster: Roster, approve_changes: bool) -> Self {
        Self {
            roster,
            approve_changes,
            projects: ProjectManager::new(client.clone(), sink.clone()),
            clients: ClientManager::new(client.clone(), sink.clone()),
            tasks: TaskManager::new(client.clone(), sink.clone()),
            users: UserManager::new(client.clone(), sink.clone()),
            groups: GroupManager::new(client, sink.clone()),
            sink,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub async fn run(&mut self, scope: &AccessScope) -> AccessReport {
        let empty = self.roster.empty_sections();
        if !empty.is_empty() {
            clk_warn!("Roster sections are empty: {empty:?}");
        }
        if !self.approve_changes {
            clk_warn!("Changes not approved; matches are exported but no task is updated");
        }

        let projects = match self.scoped_projects(scope).await {
            Ok(projects) => projects,
            Err(err) => {
                clk_error!("Access run stopped: {err}");
                let report = AccessReport {
                    project_error: Some(err.to_string()),
                    ..Default::default()
                };
                export_dataset(self.sink.as_ref(), "access_run_report", &report);
                return report;
            }
        };
        export_dataset(self.sink.as_ref(), "filtered_projects", &projects);
        clk_info!("{} projects in scope {scope:?}", projects.len());

        let grant = self.grant_access(&projects).await;
        let restrict = self.restrict_access(&projects).await;
        let report = AccessReport {
            projects: projects.len(),
            project_error: None,
            grant,
            restrict,
        };
        export_dataset(self.sink.as_ref(), "access_run_report", &report);
        report
    }

    /// Projects in `scope`. Fails when a listing the scope depends on stopped early.
    pub async fn scoped_projects(&mut self, scope: &AccessScope) -> Result<Vec<Project>, IncompleteListing> {
        let listing = self.projects.get_all_projects(true).await;
        IncompleteListing::check("project", &listing)?;
        let all = listing.into_items();
        let scoped = match scope {
            AccessScope::All => all,
            AccessScope::ClientId(client_id) => {
                ProjectManager::filter_projects_by_client_id(&all, client_id)
            }
            AccessScope::ClientName(name) => {
                let clients = self.clients.get_all_clients(true).await;
                IncompleteListing::check("client", &clients)?;
                self.clients.filter_projects_by_client_name(&all, name).await
            }
            AccessScope::ProjectId(project_id) => {
                all.into_iter().filter(|p| &p.id == project_id).collect()
            }
            AccessScope::ProjectName(name) => self
                .projects
                .get_projects_by_names(std::slice::from_ref(name))
                .await
                .found,
        };
        Ok(scoped)
    }

    /// Authorized task names matched in either direction.
    pub async fn find_authorized_tasks(&mut self, projects: &[Project]) -> Vec<TaskMatch> {
        let names = self.roster.authorized_tasks.clone();
        self.collect_matches(projects, &names, match_authorized, &mut Vec::new())
            .await
    }

    /// Tasks containing a restricted task name.
    pub async fn find_restricted_tasks(&mut self, projects: &[Project]) -> Vec<TaskMatch> {
        let names = self.roster.restricted_tasks.clone();
        self.collect_matches(projects, &names, match_restricted, &mut Vec::new())
            .await
    }

    /// An incomplete task listing lands in `lookup_errors`; its fetched matches are still reported.
    async fn collect_matches(
        &mut self,
        projects: &[Project],
        names: &[String],
        matcher: for<'n> fn(&str, &'n [String]) -> Option<&'n String>,
        lookup_errors: &mut Vec<String>,
    ) -> Vec<TaskMatch> {
        let mut matches = Vec::new();
        if names.is_empty() {
            return matches;
        }
        for project in projects {
            let tasks = self.tasks.get_tasks_by_project(&project.id, true).await;
            let resource = format!("task ({})", project.name);
            if let Err(err) = IncompleteListing::check(&resource, &tasks) {
                clk_warn!("{err}");
                lookup_errors.push(err.to_string());
            }
            for task in tasks.items {
                if let Some(name) = matcher(&task.name, names) {
                    matches.push(TaskMatch {
                        project_id: project.id.clone(),
                        project_name: project.name.clone(),
                        matched_name: name.clone(),
                        task,
                    });
                }
            }
        }
        matches
    }

    pub async fn grant_access(&mut self, projects: &[Project]) -> PhaseReport {
        let names = self.roster.authorized_tasks.clone();
        let mut lookup_errors = Vec::new();
        let matches = self
            .collect_matches(projects, &names, match_authorized, &mut lookup_errors)
            .await;
        clk_info!("Phase 1: {} authorized tasks", matches.len());
        export_dataset(self.sink.as_ref(), "all_authorized_tasks", &matches);

        let users = self.users.get_all_users(true).await;
        if let Err(err) = IncompleteListing::check("user", &users) {
            lookup_errors.push(err.to_string());
        }
        let groups = self.groups.get_all_groups(true).await;
        if let Err(err) = IncompleteListing::check("group", &groups) {
            lookup_errors.push(err.to_string());
        }
        let user_ids = self
            .users
            .find_users_by_names(&self.roster.authorized_users)
            .await
            .ids();
        let group_ids = self
            .groups
            .get_groups_by_names(&self.roster.authorized_groups)
            .await
            .ids();

        let mut report = PhaseReport {
            matched: matches.len(),
            user_ids: canonical_ids(&user_ids),
            group_ids: canonical_ids(&group_ids),
            lookup_errors,
            ..Default::default()
        };
        self.apply(&matches, false, &mut report).await;
        report
    }

    pub async fn restrict_access(&mut self, projects: &[Project]) -> PhaseReport {
        let names = self.roster.restricted_tasks.clone();
        let mut lookup_errors = Vec::new();
        let matches = self
            .collect_matches(projects, &names, match_restricted, &mut lookup_errors)
            .await;
        clk_info!("Phase 2: {} restricted tasks", matches.len());
        export_dataset(self.sink.as_ref(), "all_restricted_tasks", &matches);

        let groups = self.groups.get_all_groups(true).await;
        if let Err(err) = IncompleteListing::check("group", &groups) {
            lookup_errors.push(err.to_string());
        }
        let allowed = allowed_group_ids(&groups.items, &self.roster.restricted_groups);
        clk_info!(
            "{} of {} groups keep access to restricted tasks",
            allowed.len(),
            groups.items.len()
        );

        let mut report = PhaseReport {
            matched: matches.len(),
            group_ids: allowed,
            lookup_errors,
            ..Default::default()
        };
        self.apply(&matches, true, &mut report).await;
        report
    }

    /// Issues one update per match. `keep_users` keeps each task's current assignees.
    async fn apply(&mut self, matches: &[TaskMatch], keep_users: bool, report: &mut PhaseReport) {
        if !self.approve_changes {
            return;
        }
        if !report.lookup_errors.is_empty() {
            clk_error!(
                "Skipping {} task updates: {}",
                matches.len(),
                report.lookup_errors.join("; ")
            );
            return;
        }
        report.applied = true;
        for found in matches {
            let user_ids = if keep_users {
                found.task.assignee_ids.clone()
            } else {
                report.user_ids.clone()
            };
            let result = self
                .tasks
                .assign_task_access(&found.task, &user_ids, &report.group_ids)
                .await;
            match result {
                Ok(_) => report.updated += 1,
                Err(err) => {
                    report.failed += 1;
                    clk_error!(
                        "Updating task {} in {} failed: {err}",
                        found.task.name,
                        found.project_name
                    );
                }
            }
        }
        clk_info!("{} tasks updated, {} failed", report.updated, report.failed);
    }
}
