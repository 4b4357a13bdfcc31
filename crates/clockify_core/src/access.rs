//! Task access policy: which tasks a roster touches and which groups keep access.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::names::{name_contains, normalize_name};
use crate::records::{Group, Named, Task};

/// Names that drive an access run. Loaded from configuration, never hardcoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub authorized_tasks: Vec<String>,
    pub restricted_tasks: Vec<String>,
    pub authorized_users: Vec<String>,
    pub authorized_groups: Vec<String>,
    pub restricted_groups: Vec<String>,
}

impl Roster {
    /// Lists the roster sections that are empty.
    pub fn empty_sections(&self) -> Vec<&'static str> {
        let sections = [
            ("authorized_tasks", self.authorized_tasks.is_empty()),
            ("restricted_tasks", self.restricted_tasks.is_empty()),
            ("authorized_users", self.authorized_users.is_empty()),
            ("authorized_groups", self.authorized_groups.is_empty()),
            ("restricted_groups", self.restricted_groups.is_empty()),
        ];
        sections
            .into_iter()
            .filter_map(|(name, empty)| empty.then_some(name))
            .collect()
    }
}

/// A task picked by one of the roster's task names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMatch {
    pub project_id: String,
    pub project_name: String,
    pub matched_name: String,
    pub task: Task,
}

/// Authorized names match in either direction: "Review" picks "Design Review",
/// and "Design Review Final" is picked by a task called "Design Review".
pub fn match_authorized<'a>(task_name: &str, authorized: &'a [String]) -> Option<&'a String> {
    if normalize_name(task_name).is_empty() {
        return None;
    }
    authorized
        .iter()
        .find(|name| name_contains(task_name, name) || name_contains(name, task_name))
}

/// Restricted names only match tasks that contain them.
pub fn match_restricted<'a>(task_name: &str, restricted: &'a [String]) -> Option<&'a String> {
    restricted.iter().find(|name| name_contains(task_name, name))
}

/// Ids of every group whose name is not restricted, sorted and deduplicated.
pub fn allowed_group_ids(all_groups: &[Group], restricted_names: &[String]) -> Vec<String> {
    let restricted: BTreeSet<String> = restricted_names
        .iter()
        .map(|name| normalize_name(name))
        .collect();
    all_groups
        .iter()
        .filter(|group| !restricted.contains(&normalize_name(group.name())))
        .map(|group| group.id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, deduplicated copy of `ids`.
pub fn canonical_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn group(id: &str, name: &str) -> Group {
        Group {
            id: id.into(),
            name: name.into(),
            user_ids: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn authorized_match_is_bidirectional() {
        let authorized = names(&["Review", "Final Sign Off Meeting"]);
        assert_eq!(
            match_authorized("Design REVIEW", &authorized).map(String::as_str),
            Some("Review")
        );
        assert_eq!(
            match_authorized("sign off", &authorized).map(String::as_str),
            Some("Final Sign Off Meeting")
        );
        assert_eq!(match_authorized("  ", &authorized), None);
    }

    #[test]
    fn restricted_match_is_one_way() {
        let restricted = names(&["Payroll Audit"]);
        assert!(match_restricted("Q3 payroll audit", &restricted).is_some());
        assert!(match_restricted("Payroll", &restricted).is_none());
    }

    #[test]
    fn allowed_groups_ignore_order_and_case() {
        let groups = vec![
            group("D", "Delta"),
            group("A", "Alpha"),
            group("C", "Charlie"),
            group("B", "Bravo"),
        ];
        let restricted = names(&["delta", " BRAVO"]);
        assert_eq!(allowed_group_ids(&groups, &restricted), names(&["A", "C"]));
    }

    #[test]
    fn empty_roster_sections_are_reported() {
        let roster = Roster {
            authorized_tasks: names(&["Review"]),
            ..Default::default()
        };
        assert_eq!(
            roster.empty_sections(),
            vec![
                "restricted_tasks",
                "authorized_users",
                "authorized_groups",
                "restricted_groups"
            ]
        );
    }
}
