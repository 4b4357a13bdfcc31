//! Column handling and per-field checks for expense CSV rows.
//!
//! Everything here is pure: names are carried through unresolved and the
//! importer turns them into ids afterwards.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

/// Columns of the free-form layout.
pub const SIMPLE_COLUMNS: [&str; 2] = ["amount", "description"];

/// Columns of the layout that names its project, task and category.
pub const RESOLVED_COLUMNS: [&str; 4] = ["amount", "project", "task", "category"];

/// Accepted date layouts, tried in order. Month-first wins for ambiguous dates.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y"];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TRUE_WORDS: [&str; 5] = ["true", "1", "yes", "y", "billable"];
const FALSE_WORDS: [&str; 5] = ["false", "0", "no", "n", "non-billable"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvSchema {
    /// `amount` + `description`, with optional ids.
    Simple,
    /// `amount` + `project` + `task` + `category`, resolved by name.
    Resolved,
}

impl CsvSchema {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            CsvSchema::Simple => &SIMPLE_COLUMNS,
            CsvSchema::Resolved => &RESOLVED_COLUMNS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub missing_simple: Vec<String>,
    pub missing_resolved: Vec<String>,
    pub available: Vec<String>,
}

/// Lower-cases and trims a header, turning spaces and hyphens into underscores.
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Applies `mapping` to the raw headers, normalizes them and suffixes repeats.
///
/// Mapping keys are matched against the raw header first, then against its
/// normalized form. The second `note` column becomes `note_1`, the third
/// `note_2`, and so on.
pub fn normalize_headers(raw: &[String], mapping: &HashMap<String, String>) -> Vec<String> {
    let normalized_mapping: HashMap<String, &String> = mapping
        .iter()
        .map(|(from, to)| (normalize_column(from), to))
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(raw.len());
    for header in raw {
        let mapped = mapping
            .get(header)
            .or_else(|| normalized_mapping.get(&normalize_column(header)).copied())
            .unwrap_or(header);
        let base = normalize_column(mapped);
        let count = seen.entry(base.clone()).or_insert(0);
        let name = if *count == 0 {
            base.clone()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        headers.push(name);
    }
    headers
}

/// Picks the richer layout when both are present.
pub fn detect_schema(columns: &[String]) -> Result<CsvSchema, SchemaMismatch> {
    let missing = |schema: CsvSchema| -> Vec<String> {
        schema
            .columns()
            .iter()
            .filter(|col| !columns.iter().any(|have| have == *col))
            .map(|col| col.to_string())
            .collect()
    };
    let missing_resolved = missing(CsvSchema::Resolved);
    if missing_resolved.is_empty() {
        return Ok(CsvSchema::Resolved);
    }
    let missing_simple = missing(CsvSchema::Simple);
    if missing_simple.is_empty() {
        return Ok(CsvSchema::Simple);
    }
    Err(SchemaMismatch {
        missing_simple,
        missing_resolved,
        available: columns.to_vec(),
    })
}

/// One data row keyed by normalized column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn from_record<'a>(
        headers: &[String],
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let fields = headers
            .iter()
            .cloned()
            .zip(values.into_iter().map(|v| v.trim().to_string()))
            .collect();
        Self { fields }
    }

    /// Non-empty value of `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|col| self.get(col))
    }
}

/// A row whose fields parsed, with names still unresolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRow {
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub billable: Option<bool>,
    pub notes: Option<String>,
    pub currency: Option<String>,
    pub tags: Vec<String>,
    pub receipt: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub category_name: Option<String>,
    pub user_email: Option<String>,
}

/// Checks every field of `row`; the returned reasons are empty for a clean row.
pub fn parse_row(schema: CsvSchema, row: &RawRow) -> (ParsedRow, Vec<String>) {
    let mut errors = Vec::new();
    let mut parsed = ParsedRow::default();

    match row.get("amount") {
        None => errors.push("Amount is required".to_string()),
        Some(raw) => match parse_amount(raw) {
            Ok(amount) => parsed.amount = Some(amount),
            Err(reason) => errors.push(reason),
        },
    }

    match row.get("date") {
        Some(raw) => match parse_date(raw) {
            Ok(date) => parsed.date = Some(date),
            Err(reason) => errors.push(reason),
        },
        None if schema == CsvSchema::Resolved => errors.push("Date is required".to_string()),
        None => {}
    }

    if let Some(raw) = row.get("billable") {
        match parse_billable(raw) {
            Ok(flag) => parsed.billable = Some(flag),
            Err(reason) => errors.push(reason),
        }
    }

    parsed.notes = row
        .first_of(&["description", "note", "notes"])
        .map(str::to_string);
    parsed.currency = row.get("currency").map(str::to_uppercase);
    parsed.tags = row.get("tags").map(parse_tags).unwrap_or_default();
    parsed.receipt = row.get("receipt").map(str::to_string);
    parsed.task_id = row.get("task_id").map(str::to_string);
    parsed.user_email = row
        .first_of(&["user_email", "email"])
        .map(str::to_string);

    match schema {
        CsvSchema::Simple => {
            if parsed.notes.is_none() {
                errors.push("Description is required".to_string());
            }
            parsed.project_id = row.get("project_id").map(str::to_string);
            parsed.project_name = row.get("project_name").map(str::to_string);
            parsed.category_name = row.get("category").map(str::to_string);
        }
        CsvSchema::Resolved => {
            for (column, label) in [
                ("project", "Project"),
                ("task", "Task"),
                ("category", "Category"),
            ] {
                if row.get(column).is_none() {
                    errors.push(format!("{label} is required"));
                }
            }
            parsed.project_name = row.get("project").map(str::to_string);
            parsed.task_name = row.get("task").map(str::to_string);
            parsed.category_name = row.get("category").map(str::to_string);
        }
    }

    (parsed, errors)
}

/// Parses a money amount, ignoring `$`, thousands separators and spaces.
pub fn parse_amount(raw: &str) -> Result<f64, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| format!("Invalid amount format: {raw}"))?;
    if !amount.is_finite() {
        return Err(format!("Invalid amount format: {raw}"));
    }
    if amount < 0.0 {
        return Err(format!("Amount must not be negative: {raw}"));
    }
    Ok(amount)
}

/// Parses a date in one of [`DATE_FORMATS`] (or with a time of day) into
/// `YYYY-MM-DDTHH:MM:SSZ`.
pub fn parse_date(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date.format("%Y-%m-%dT00:00:00Z").to_string());
        }
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map(|stamp| stamp.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .map_err(|_| format!("Invalid date format: {raw}"))
}

pub fn parse_billable(raw: &str) -> Result<bool, String> {
    let word = raw.trim().to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Ok(true)
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Ok(false)
    } else {
        Err(format!("Invalid billable value: {raw}"))
    }
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
