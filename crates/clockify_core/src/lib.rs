//! Clockify core: pure paging rules, records and policies. No IO lives here.
mod access;
mod aggregate;
mod cache;
mod expense_row;
mod names;
mod pagination;
mod records;
mod summary;

pub use access::{
    allowed_group_ids, canonical_ids, match_authorized, match_restricted, Roster, TaskMatch,
};
pub use aggregate::{Aggregate, StopReason};
pub use cache::{CacheSlot, ScopedCache};
pub use expense_row::{
    detect_schema, normalize_column, normalize_headers, parse_amount, parse_billable, parse_date,
    parse_row, parse_tags, CsvSchema, ParsedRow, RawRow, SchemaMismatch, DATE_FORMATS,
    RESOLVED_COLUMNS, SIMPLE_COLUMNS,
};
pub use names::{
    find_by_name, find_containing, match_exact, match_first_containing, name_contains,
    names_equal, normalize_name, NameIndex, NameMatches,
};
pub use pagination::{
    extract_page_items, sniff_shape, PagePlan, PageWalk, ResponseShape, DEFAULT_PAGE_SIZE,
    LIST_FIELDS, MAX_PAGE_SIZE,
};
pub use records::{
    decode_record, Client, ClientDraft, Expense, ExpenseCategory, ExpenseDraft, Group,
    GroupDraft, Named, Project, ProjectDraft, Resource, ResourceKind, Task, TaskDraft, User,
};
pub use summary::{
    clients_from_projects, clients_summary, expense_summary, extract_categories,
    filter_by_category, groups_summary, project_belongs_to_category, projects_for_client,
    tasks_per_project, workspace_stats, ClientProjectCount, ClientUsage, ClientsSummary,
    ExpenseSummary, ExpenseTotal, GroupSize, GroupsSummary, ProjectCategory, WorkspaceStats,
};
