//! Typed records for the resources the API lists.
//!
//! Each record keeps the fields the toolkit reads and collects everything else
//! into `extra`, so records written back to an export lose nothing.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    Task,
    User,
    Group,
    Client,
    Expense,
    ExpenseCategory,
}

impl ResourceKind {
    /// Plural label, used for log lines and export file prefixes.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Task => "tasks",
            ResourceKind::User => "users",
            ResourceKind::Group => "groups",
            ResourceKind::Client => "clients",
            ResourceKind::Expense => "expenses",
            ResourceKind::ExpenseCategory => "expense_categories",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait Resource: DeserializeOwned + Serialize + Clone {
    const KIND: ResourceKind;

    fn id(&self) -> &str;
}

/// A resource people refer to by name.
pub trait Named: Resource {
    fn name(&self) -> &str;
}

macro_rules! named_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }
        }

        impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub billable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default)]
    pub user_group_ids: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Expense {
    /// Category name when the API embedded the category, else its id.
    pub fn category_label(&self) -> &str {
        self.extra
            .get("category")
            .and_then(|category| category.get("name"))
            .and_then(Value::as_str)
            .or(self.category_id.as_deref())
            .unwrap_or("uncategorized")
    }

    pub fn project_label(&self) -> &str {
        self.project_id.as_deref().unwrap_or("no project")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub has_unit_price: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

named_resource!(Project, ResourceKind::Project);
named_resource!(Task, ResourceKind::Task);
named_resource!(User, ResourceKind::User);
named_resource!(Group, ResourceKind::Group);
named_resource!(Client, ResourceKind::Client);
named_resource!(ExpenseCategory, ResourceKind::ExpenseCategory);

impl Resource for Expense {
    const KIND: ResourceKind = ResourceKind::Expense;

    fn id(&self) -> &str {
        &self.id
    }
}

// Request bodies for create and update calls.

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    pub assignee_ids: Vec<String>,
    pub user_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TaskDraft {
    /// Starts an update from the task as the API last reported it.
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            assignee_ids: task.assignee_ids.clone(),
            user_group_ids: task.user_group_ids.clone(),
            status: task.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDraft {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

impl ExpenseDraft {
    /// Wire names of the fields the create endpoint requires but this draft lacks.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("categoryId", &self.category_id),
            ("date", &self.date),
            ("projectId", &self.project_id),
            ("userId", &self.user_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Decodes a single record returned by a create, update or lookup call.
pub fn decode_record<R: Resource>(value: Value) -> Result<R, serde_json::Error> {
    serde_json::from_value(value)
}
