//! Clockify engine: HTTP transport, resource managers and batch runs.
mod access;
mod client;
mod config;
mod export;
mod filename;
mod importer;
mod managers;
mod persist;
mod transport;
mod types;
mod walker;

pub use access::{AccessReport, AccessRun, AccessScope, PhaseReport};
pub use client::{param, ApiClient, Fetch, PaginationProbe};
pub use config::{
    changes_approved, load_roster, ApiConfig, ConfigError, TransportSettings, API_KEY_VAR,
    APPROVE_VAR, BASE_URL_VAR, DEFAULT_BASE_URL, WORKSPACE_VAR,
};
pub use export::{
    dataset_rows, export_dataset, rows_to_csv, ExportError, ExportSink, ExportedFiles,
    FileExportSink, NullExportSink, DEFAULT_EXPORT_DIR,
};
pub use filename::export_filename;
pub use importer::{
    parse_csv_text, read_csv, ChunkOutcome, ExpenseImporter, ImportError, ImportOptions,
    ImportReport, ParsedCsv, RowError, UploadSummary, Validation, DEFAULT_CHUNK_SIZE,
};
pub use managers::{
    BulkOutcome, ClientManager, ExpenseFilter, ExpenseManager, FailedExpense, GroupManager,
    ProjectManager, TaskManager, UserManager, WorkspaceStructure, MAX_EXPENSE_PAGE_SIZE,
};
pub use persist::{prepare_dir, PersistError, SnapshotDir};
pub use transport::{ApiRequest, Method, ReqwestTransport, Transport};
pub use types::{ApiError, FailureKind, IncompleteListing};
pub use walker::{PageWalker, PAGE_PARAM, PAGE_SIZE_PARAM};
