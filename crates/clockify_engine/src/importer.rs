//! Bulk expense import from CSV.
//!
//! A run goes parse, resolve and validate, upload, report. Dry runs stop after
//! validation. Rows are judged independently: a bad row is reported with its
//! 1-based index and never blocks the others. A lookup listing that stops
//! early fails the whole import before anything is uploaded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clockify_core::{
    detect_schema, normalize_headers, parse_row, CsvSchema, ExpenseDraft, NameIndex, ParsedRow,
    RawRow, SchemaMismatch,
};
use clockify_logging::clk_info;
use serde::Serialize;

use crate::client::ApiClient;
use crate::export::{export_dataset, ExportSink};
use crate::managers::{ExpenseManager, FailedExpense, ProjectManager, TaskManager, UserManager};
use crate::persist::{PersistError, SnapshotDir};
use crate::types::IncompleteListing;

pub const DEFAULT_CHUNK_SIZE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv file has no data rows")]
    Empty,
    #[error(
        "no supported column layout: amount+description is missing {missing_simple:?}, \
         amount+project+task+category is missing {missing_resolved:?} (found {available:?})"
    )]
    UnsupportedSchema {
        missing_simple: Vec<String>,
        missing_resolved: Vec<String>,
        available: Vec<String>,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("lookup failed: {0}")]
    Lookup(#[from] IncompleteListing),
}

impl From<SchemaMismatch> for ImportError {
    fn from(mismatch: SchemaMismatch) -> Self {
        ImportError::UnsupportedSchema {
            missing_simple: mismatch.missing_simple,
            missing_resolved: mismatch.missing_resolved,
            available: mismatch.available,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub chunk_size: usize,
    /// Raw header to target column, applied before normalization.
    pub column_mapping: HashMap<String, String>,
    /// Used for rows without a `user_email` column value.
    pub default_user_email: Option<String>,
    pub export_results: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            column_mapping: HashMap::new(),
            default_user_email: None,
            export_results: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    pub schema: CsvSchema,
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row_index: usize,
    pub raw: BTreeMap<String, String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    pub valid: Vec<ExpenseDraft>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    pub chunk_number: usize,
    pub chunk_size: usize,
    pub created: usize,
    pub failed: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadSummary {
    pub total_attempted: usize,
    pub total_created: usize,
    pub total_failed: usize,
    pub chunks: Vec<ChunkOutcome>,
    pub failed_expenses: Vec<FailedExpense>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub workspace_id: String,
    pub source: String,
    pub schema: String,
    pub dry_run: bool,
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub valid_expenses: Vec<ExpenseDraft>,
    pub validation_errors: Vec<RowError>,
    pub upload: Option<UploadSummary>,
    pub started_at: String,
    pub finished_at: String,
}

/// Reads a CSV file; a UTF-8 byte order mark is ignored.
pub fn read_csv(path: &Path, mapping: &HashMap<String, String>) -> Result<ParsedCsv, ImportError> {
    let bytes = fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _) = encoding_rs::UTF_8.decode_with_bom_removal(&bytes);
    parse_csv_text(&text, mapping)
}

pub fn parse_csv_text(text: &str, mapping: &HashMap<String, String>) -> Result<ParsedCsv, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ImportError::Empty);
    }
    let columns = normalize_headers(&raw_headers, mapping);
    let schema = detect_schema(&columns)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(RawRow::from_record(&columns, record.iter()));
    }
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(ParsedCsv {
        schema,
        columns,
        rows,
    })
}

/// Name to id lookups for one workspace. Tasks are loaded per project on first use.
#[derive(Debug, Default)]
struct ResolutionCache {
    projects: NameIndex,
    project_ids: HashSet<String>,
    categories: Option<NameIndex>,
    users: Option<NameIndex>,
    tasks: HashMap<String, NameIndex>,
}

pub struct ExpenseImporter {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    projects: ProjectManager,
    tasks: TaskManager,
    users: UserManager,
    expenses: ExpenseManager,
    cache: Option<ResolutionCache>,
}

impl ExpenseImporter {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            projects: ProjectManager::new(client.clone(), sink.clone()),
            tasks: TaskManager::new(client.clone(), sink.clone()),
            users: UserManager::new(client.clone(), sink.clone()),
            expenses: ExpenseManager::new(client.clone(), sink.clone()),
            client,
            sink,
            cache: None,
        }
    }

    pub fn workspace_id(&self) -> &str {
        self.client.workspace_id()
    }

    /// Runs a whole import of `path`.
    pub async fn import_file(&mut self, path: &Path, options: &ImportOptions) -> Result<ImportReport, ImportError> {
        clk_info!("Importing expenses from {}", path.display());
        let parsed = read_csv(path, &options.column_mapping)?;
        self.import_parsed(&path.display().to_string(), parsed, options)
            .await
    }

    pub async fn import_parsed(
        &mut self,
        source: &str,
        parsed: ParsedCsv,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let started_at = Utc::now().to_rfc3339();
        clk_info!(
            "{} rows using the {:?} layout",
            parsed.rows.len(),
            parsed.schema
        );
        let total_records = parsed.rows.len();
        let validation = self.validate(&parsed, options).await?;
        clk_info!(
            "Validation: {} valid, {} invalid",
            validation.valid.len(),
            validation.errors.len()
        );

        let upload = if options.dry_run {
            clk_info!("Dry run; nothing uploaded");
            None
        } else {
            Some(self.upload(&validation.valid, options.chunk_size).await)
        };

        let report = ImportReport {
            workspace_id: self.workspace_id().to_string(),
            source: source.to_string(),
            schema: format!("{:?}", parsed.schema).to_lowercase(),
            dry_run: options.dry_run,
            total_records,
            valid_records: validation.valid.len(),
            invalid_records: validation.errors.len(),
            valid_expenses: validation.valid,
            validation_errors: validation.errors,
            upload,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
        };
        if options.export_results {
            self.export_report(&report);
        }
        Ok(report)
    }

    /// Resolves and checks every row.
    pub async fn validate(&mut self, parsed: &ParsedCsv, options: &ImportOptions) -> Result<Validation, ImportError> {
        self.ensure_cache().await?;
        let mut validation = Validation::default();
        for (position, row) in parsed.rows.iter().enumerate() {
            let (fields, mut errors) = parse_row(parsed.schema, row);
            let draft = self.resolve_row(fields, options, &mut errors).await?;
            match draft {
                Some(draft) if errors.is_empty() => validation.valid.push(draft),
                _ => validation.errors.push(RowError {
                    row_index: position + 1,
                    raw: row.fields.clone(),
                    errors,
                }),
            }
        }
        Ok(validation)
    }

    /// Submits drafts in chunks of `chunk_size`, one create call per draft.
    pub async fn upload(&mut self, drafts: &[ExpenseDraft], chunk_size: usize) -> UploadSummary {
        let chunk_size = chunk_size.max(1);
        let total_chunks = drafts.len().div_ceil(chunk_size);
        let mut summary = UploadSummary {
            total_attempted: drafts.len(),
            ..Default::default()
        };

        for (chunk_index, chunk) in drafts.chunks(chunk_size).enumerate() {
            let chunk_number = chunk_index + 1;
            clk_info!(
                "Uploading chunk {chunk_number}/{total_chunks} ({} expenses)",
                chunk.len()
            );
            let outcome = self.expenses.bulk_create_expenses(chunk).await;
            let offset = chunk_index * chunk_size;

            summary.total_created += outcome.total_created();
            summary.total_failed += outcome.total_failed();
            summary.chunks.push(ChunkOutcome {
                chunk_number,
                chunk_size: chunk.len(),
                created: outcome.total_created(),
                failed: outcome.total_failed(),
                success: outcome.failed.is_empty(),
            });
            summary
                .failed_expenses
                .extend(outcome.failed.into_iter().map(|failed| FailedExpense {
                    index: failed.index + offset,
                    ..failed
                }));
        }

        clk_info!(
            "Upload finished: {}/{} created",
            summary.total_created,
            summary.total_attempted
        );
        summary
    }

    /// Writes a CSV template for the name-resolved layout.
    pub fn write_template(path: &Path) -> Result<PathBuf, ImportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "date",
            "project",
            "task",
            "amount",
            "category",
            "billable",
            "description",
            "user_email",
        ])?;
        writer.write_record([
            "2025-07-01",
            "Website Redesign",
            "Design Review",
            "25.50",
            "Meals",
            "yes",
            "Team lunch",
            "",
        ])?;
        writer.write_record([
            "07/02/2025",
            "Website Redesign",
            "Client Visit",
            "$1,200.00",
            "Travel",
            "no",
            "Flight to client site",
            "",
        ])?;
        let bytes = writer
            .into_inner()
            .map_err(|err| ImportError::Io {
                path: path.to_path_buf(),
                source: io::Error::other(err.to_string()),
            })?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "expense_template.csv".to_string());
        let written = SnapshotDir::new(dir).write(&filename, &bytes)?;
        clk_info!("Template written to {}", written.display());
        Ok(written)
    }

    async fn ensure_cache(&mut self) -> Result<(), IncompleteListing> {
        if self.cache.is_some() {
            return Ok(());
        }
        let projects = self.projects.get_all_projects(true).await;
        IncompleteListing::check("project", &projects)?;
        self.cache = Some(ResolutionCache {
            projects: NameIndex::from_records(&projects.items),
            project_ids: projects.items.iter().map(|p| p.id.clone()).collect(),
            ..Default::default()
        });
        Ok(())
    }

    async fn resolve_row(
        &mut self,
        fields: ParsedRow,
        options: &ImportOptions,
        errors: &mut Vec<String>,
    ) -> Result<Option<ExpenseDraft>, IncompleteListing> {
        let project_id = self.resolve_project(&fields, errors);

        let task_id = match (&fields.task_id, &fields.task_name, &project_id) {
            (Some(task_id), _, _) => Some(task_id.clone()),
            (None, Some(task_name), Some(project_id)) => {
                let found = self.resolve_task(project_id, task_name).await?;
                if found.is_none() {
                    errors.push(format!("Task not found in project: {task_name}"));
                }
                found
            }
            _ => None,
        };

        let category_id = match &fields.category_name {
            Some(name) => {
                let found = self.resolve_category(name).await?;
                if found.is_none() {
                    errors.push(format!("Expense category not found: {name}"));
                }
                found
            }
            None => None,
        };

        let email = fields
            .user_email
            .clone()
            .or_else(|| options.default_user_email.clone());
        let user_id = match &email {
            Some(email) => {
                let found = self.resolve_user(email).await?;
                if found.is_none() {
                    errors.push(format!("User not found: {email}"));
                }
                found
            }
            None => None,
        };

        let Some(amount) = fields.amount else {
            return Ok(None);
        };
        Ok(Some(ExpenseDraft {
            amount,
            project_id,
            task_id,
            category_id,
            user_id,
            date: fields.date,
            billable: fields.billable,
            notes: fields.notes,
            currency: fields.currency,
            tag_ids: fields.tags,
            receipt: fields.receipt,
        }))
    }

    fn resolve_project(&self, fields: &ParsedRow, errors: &mut Vec<String>) -> Option<String> {
        let cache = self.cache.as_ref()?;
        if let Some(project_id) = &fields.project_id {
            if cache.project_ids.contains(project_id) {
                return Some(project_id.clone());
            }
            errors.push(format!("Project ID not found: {project_id}"));
            return None;
        }
        let name = fields.project_name.as_ref()?;
        let found = cache.projects.resolve(name).map(str::to_string);
        if found.is_none() {
            errors.push(format!("Project not found: {name}"));
        }
        found
    }

    async fn resolve_task(&mut self, project_id: &str, task_name: &str) -> Result<Option<String>, IncompleteListing> {
        let loaded = self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.tasks.contains_key(project_id));
        if !loaded {
            let tasks = self.tasks.get_tasks_by_project(project_id, true).await;
            IncompleteListing::check(&format!("task ({project_id})"), &tasks)?;
            let index = NameIndex::from_records(&tasks.items);
            if let Some(cache) = self.cache.as_mut() {
                cache.tasks.insert(project_id.to_string(), index);
            }
        }
        Ok(self
            .cache
            .as_ref()
            .and_then(|cache| cache.tasks.get(project_id))
            .and_then(|index| index.resolve(task_name))
            .map(str::to_string))
    }

    async fn resolve_category(&mut self, name: &str) -> Result<Option<String>, IncompleteListing> {
        let loaded = self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.categories.is_some());
        if !loaded {
            let categories = self.expenses.get_expense_categories(true).await;
            IncompleteListing::check("expense category", &categories)?;
            let index = NameIndex::from_records(&categories.items);
            if let Some(cache) = self.cache.as_mut() {
                cache.categories = Some(index);
            }
        }
        Ok(self
            .cache
            .as_ref()
            .and_then(|cache| cache.categories.as_ref())
            .and_then(|index| index.resolve(name))
            .map(str::to_string))
    }

    async fn resolve_user(&mut self, email: &str) -> Result<Option<String>, IncompleteListing> {
        let loaded = self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.users.is_some());
        if !loaded {
            let users = self.users.get_all_users(true).await;
            IncompleteListing::check("user", &users)?;
            let index = NameIndex::from_pairs(
                users
                    .items
                    .iter()
                    .map(|user| (user.email.as_str(), user.id.as_str())),
            );
            if let Some(cache) = self.cache.as_mut() {
                cache.users = Some(index);
            }
        }
        Ok(self
            .cache
            .as_ref()
            .and_then(|cache| cache.users.as_ref())
            .and_then(|index| index.resolve(email))
            .map(str::to_string))
    }

    fn export_report(&self, report: &ImportReport) {
        export_dataset(self.sink.as_ref(), "expense_upload_results", report);
        if report.validation_errors.is_empty() {
            return;
        }
        let rows: Vec<BTreeMap<&str, String>> = report
            .validation_errors
            .iter()
            .map(|error| {
                let mut row = BTreeMap::new();
                row.insert("row_index", error.row_index.to_string());
                row.insert("errors", error.errors.join("; "));
                row.insert(
                    "raw",
                    serde_json::to_string(&error.raw).unwrap_or_default(),
                );
                row
            })
            .collect();
        export_dataset(self.sink.as_ref(), "expense_validation_errors", &rows);
    }
}
