use std::collections::HashMap;

use crate::records::Named;

/// Trims and lower-cases a name for comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn names_equal(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// Case-insensitive substring test. An empty needle never matches.
pub fn name_contains(haystack: &str, needle: &str) -> bool {
    let needle = normalize_name(needle);
    !needle.is_empty() && normalize_name(haystack).contains(&needle)
}

pub fn find_by_name<'a, R: Named>(records: &'a [R], name: &str) -> Option<&'a R> {
    let wanted = normalize_name(name);
    records
        .iter()
        .find(|record| normalize_name(record.name()) == wanted)
}

pub fn find_containing<'a, R: Named>(records: &'a [R], fragment: &str) -> Vec<&'a R> {
    records
        .iter()
        .filter(|record| name_contains(record.name(), fragment))
        .collect()
}

/// Records picked out by a list of requested names, plus the names nothing matched.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatches<R> {
    pub found: Vec<R>,
    pub missing: Vec<String>,
}

impl<R: Named> NameMatches<R> {
    pub fn ids(&self) -> Vec<String> {
        self.found.iter().map(|r| r.id().to_string()).collect()
    }
}

/// Exact (case-insensitive) lookup of each requested name.
pub fn match_exact<R: Named>(records: &[R], names: &[String]) -> NameMatches<R> {
    collect_matches(records, names, |record, name| names_equal(record.name(), name))
}

/// First record whose name contains each requested name.
pub fn match_first_containing<R: Named>(records: &[R], names: &[String]) -> NameMatches<R> {
    collect_matches(records, names, |record, name| name_contains(record.name(), name))
}

fn collect_matches<R: Named>(
    records: &[R],
    names: &[String],
    matches: impl Fn(&R, &str) -> bool,
) -> NameMatches<R> {
    let mut found: Vec<R> = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match records.iter().find(|record| matches(record, name)) {
            Some(record) => {
                if !found.iter().any(|seen| seen.id() == record.id()) {
                    found.push(record.clone());
                }
            }
            None => missing.push(name.clone()),
        }
    }
    NameMatches { found, missing }
}

/// Normalized name to id lookup. The first id seen for a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    entries: HashMap<String, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, R: Named + 'a>(records: impl IntoIterator<Item = &'a R>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record.name(), record.id());
        }
        index
    }

    /// Indexes arbitrary keys, e.g. user emails.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut index = Self::new();
        for (key, id) in pairs {
            index.insert(key, id);
        }
        index
    }

    /// Returns false when the name was already taken or normalizes to nothing.
    pub fn insert(&mut self, name: &str, id: &str) -> bool {
        let key = normalize_name(name);
        if key.is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, id.to_string());
        true
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries.get(&normalize_name(name)).map(String::as_str)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.values().any(|known| known == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_ignores_case_and_padding() {
        assert!(name_contains("Design Review", " review "));
        assert!(!name_contains("Design Review", "   "));
        assert!(names_equal("Acme Corp", " acme corp "));
    }

    #[test]
    fn index_keeps_first_id() {
        let mut index = NameIndex::new();
        assert!(index.insert("Meals", "cat1"));
        assert!(!index.insert(" meals", "cat2"));
        assert!(!index.insert("", "cat3"));
        assert_eq!(index.resolve("MEALS"), Some("cat1"));
        assert!(index.contains_id("cat1"));
        assert_eq!(index.len(), 1);
    }
}
