//! Derived views over listed records: categories, per-client counts, totals.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::records::{Client, Expense, Group, Project, Task};

const EXAMPLE_LIMIT: usize = 3;
const MIN_CATEGORY_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCategory {
    pub category: String,
    pub projects_count: usize,
    pub example_projects: Vec<String>,
}

/// Name-prefix categories such as `EXT.FFS` in "EXT.FFS Website".
///
/// A dotted first word is a category; otherwise the first word of a
/// multi-word name counts when it has at least three characters.
pub fn extract_categories(projects: &[Project]) -> Vec<ProjectCategory> {
    let mut found = BTreeSet::new();
    for project in projects {
        let name = project.name.trim();
        let Some(first) = name.split_whitespace().next() else {
            continue;
        };
        if name.contains('.') {
            if first.contains('.') {
                found.insert(first.to_string());
            }
        } else if name.contains(' ') && first.chars().count() >= MIN_CATEGORY_LEN {
            found.insert(first.to_string());
        }
    }

    found
        .into_iter()
        .map(|category| {
            let members = filter_by_category(projects, &category);
            ProjectCategory {
                projects_count: members.len(),
                example_projects: members
                    .iter()
                    .take(EXAMPLE_LIMIT)
                    .map(|p| p.name.clone())
                    .collect(),
                category,
            }
        })
        .collect()
}

pub fn project_belongs_to_category(project_name: &str, category: &str) -> bool {
    if project_name.is_empty() || category.is_empty() {
        return false;
    }
    let name = project_name.to_lowercase();
    let category = category.to_lowercase();

    if name.starts_with(&format!("{category} ")) {
        return true;
    }
    if category.contains('.') && name.starts_with(&category) {
        return true;
    }
    name.split_whitespace().any(|word| word.starts_with(&category))
}

pub fn filter_by_category<'a>(projects: &'a [Project], category: &str) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| project_belongs_to_category(&p.name, category))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientUsage {
    pub client_id: String,
    pub client_name: String,
    pub projects_count: usize,
    pub example_projects: Vec<String>,
}

/// Clients referenced by projects, in order of first reference.
pub fn clients_from_projects(projects: &[Project]) -> Vec<ClientUsage> {
    let mut usage: Vec<ClientUsage> = Vec::new();
    for project in projects {
        let Some(client_id) = project.client_id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        let position = match usage.iter().position(|u| u.client_id == client_id) {
            Some(position) => position,
            None => {
                usage.push(ClientUsage {
                    client_id: client_id.to_string(),
                    client_name: project
                        .client_name
                        .clone()
                        .unwrap_or_else(|| "Unknown Client".to_string()),
                    projects_count: 0,
                    example_projects: Vec::new(),
                });
                usage.len() - 1
            }
        };
        let entry = &mut usage[position];
        entry.projects_count += 1;
        if entry.example_projects.len() < EXAMPLE_LIMIT {
            entry.example_projects.push(project.name.clone());
        }
    }
    usage
}

pub fn projects_for_client<'a>(projects: &'a [Project], client_id: &str) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| p.client_id.as_deref() == Some(client_id))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceStats {
    pub total_projects: usize,
    pub total_categories: usize,
    pub projects_per_category: BTreeMap<String, usize>,
    pub largest_category: Option<String>,
    pub smallest_category: Option<String>,
}

pub fn workspace_stats(projects: &[Project], categories: &[ProjectCategory]) -> WorkspaceStats {
    let projects_per_category: BTreeMap<String, usize> = categories
        .iter()
        .map(|c| (c.category.clone(), c.projects_count))
        .collect();
    // Ties go to the alphabetically first category.
    let largest_category = projects_per_category
        .iter()
        .rev()
        .max_by_key(|(_, count)| **count)
        .map(|(name, _)| name.clone());
    let smallest_category = projects_per_category
        .iter()
        .min_by_key(|(_, count)| **count)
        .map(|(name, _)| name.clone());
    WorkspaceStats {
        total_projects: projects.len(),
        total_categories: categories.len(),
        projects_per_category,
        largest_category,
        smallest_category,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientProjectCount {
    pub client_id: String,
    pub client_name: String,
    pub archived: bool,
    pub project_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientsSummary {
    pub total_clients: usize,
    pub total_projects: usize,
    pub clients_with_projects: usize,
    pub clients: Vec<ClientProjectCount>,
}

/// Project counts per client, busiest first.
pub fn clients_summary(clients: &[Client], projects: &[Project]) -> ClientsSummary {
    let mut rows: Vec<ClientProjectCount> = clients
        .iter()
        .map(|client| ClientProjectCount {
            client_id: client.id.clone(),
            client_name: client.name.clone(),
            archived: client.archived,
            project_count: projects_for_client(projects, &client.id).len(),
        })
        .collect();
    rows.sort_by(|a, b| b.project_count.cmp(&a.project_count));
    ClientsSummary {
        total_clients: clients.len(),
        total_projects: projects.len(),
        clients_with_projects: rows.iter().filter(|r| r.project_count > 0).count(),
        clients: rows,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSize {
    pub group_id: String,
    pub group_name: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupsSummary {
    pub total_groups: usize,
    pub total_memberships: usize,
    pub empty_groups: usize,
    pub groups: Vec<GroupSize>,
}

pub fn groups_summary(groups: &[Group]) -> GroupsSummary {
    let sizes: Vec<GroupSize> = groups
        .iter()
        .map(|g| GroupSize {
            group_id: g.id.clone(),
            group_name: g.name.clone(),
            member_count: g.user_ids.len(),
        })
        .collect();
    GroupsSummary {
        total_groups: groups.len(),
        total_memberships: sizes.iter().map(|s| s.member_count).sum(),
        empty_groups: sizes.iter().filter(|s| s.member_count == 0).count(),
        groups: sizes,
    }
}

pub fn tasks_per_project(tasks: &[Task]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for task in tasks {
        *counts.entry(task.project_id.clone()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseTotal {
    pub count: usize,
    pub amount: f64,
}

impl ExpenseTotal {
    fn add(&mut self, amount: f64) {
        self.count += 1;
        self.amount += amount;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total_expenses: usize,
    pub total_amount: f64,
    pub billable_amount: f64,
    pub non_billable_amount: f64,
    pub by_category: BTreeMap<String, ExpenseTotal>,
    pub by_project: BTreeMap<String, ExpenseTotal>,
}

pub fn expense_summary(expenses: &[Expense]) -> ExpenseSummary {
    let mut summary = ExpenseSummary {
        total_expenses: expenses.len(),
        ..Default::default()
    };
    for expense in expenses {
        summary.total_amount += expense.amount;
        if expense.billable {
            summary.billable_amount += expense.amount;
        } else {
            summary.non_billable_amount += expense.amount;
        }
        summary
            .by_category
            .entry(expense.category_label().to_string())
            .or_default()
            .add(expense.amount);
        summary
            .by_project
            .entry(expense.project_label().to_string())
            .or_default()
            .add(expense.amount);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn project(id: &str, name: &str, client: Option<&str>) -> Project {
        Project {
            id: id.into(),
            name: name.into(),
            client_id: client.map(str::to_string),
            client_name: client.map(|c| format!("Client {c}")),
            archived: false,
            billable: true,
            extra: Map::new(),
        }
    }

    #[test]
    fn categories_come_from_name_prefixes() {
        let projects = vec![
            project("1", "EXT.FFS Website", None),
            project("2", "EXT.FFS Mobile", None),
            project("3", "INT Tooling", None),
            project("4", "Ad hoc", None),
            project("5", "Solo", None),
        ];
        let categories = extract_categories(&projects);
        let names: Vec<_> = categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["EXT.FFS", "INT"]);
        assert_eq!(categories[0].projects_count, 2);
        assert_eq!(categories[0].example_projects, vec!["EXT.FFS Website", "EXT.FFS Mobile"]);

        let stats = workspace_stats(&projects, &categories);
        assert_eq!(stats.largest_category.as_deref(), Some("EXT.FFS"));
        assert_eq!(stats.smallest_category.as_deref(), Some("INT"));
    }

    #[test]
    fn category_membership_rules() {
        assert!(project_belongs_to_category("EXT Website", "ext"));
        assert!(project_belongs_to_category("EXT.FFS-2024", "EXT.FFS"));
        assert!(project_belongs_to_category("Website INTERNAL", "int"));
        assert!(!project_belongs_to_category("Printer", "int"));
        assert!(!project_belongs_to_category("", "int"));
    }

    #[test]
    fn client_usage_keeps_first_seen_order() {
        let projects = vec![
            project("1", "A", Some("c2")),
            project("2", "B", Some("c1")),
            project("3", "C", Some("c2")),
            project("4", "D", None),
        ];
        let usage = clients_from_projects(&projects);
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].client_id, "c2");
        assert_eq!(usage[0].projects_count, 2);
        assert_eq!(usage[1].client_name, "Client c1");
    }
}
