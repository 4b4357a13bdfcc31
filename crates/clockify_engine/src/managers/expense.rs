use std::sync::Arc;

use clockify_core::{
    expense_summary, Aggregate, CacheSlot, Expense, ExpenseCategory, ExpenseDraft, ExpenseSummary,
    ScopedCache,
};
use clockify_logging::{clk_info, clk_warn};
use serde::Serialize;

use super::{decode, settle_listing};
use crate::client::{param, ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::{ApiError, FailureKind};

/// The expenses listing rejects larger pages.
pub const MAX_EXPENSE_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ExpenseFilter {
    fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(project_id) = &self.project_id {
            params.push(param("projectId", project_id));
        }
        if let Some(start) = &self.start {
            params.push(param("start", start));
        }
        if let Some(end) = &self.end {
            params.push(param("end", end));
        }
        params
    }

    fn cache_key(&self) -> String {
        [&self.user_id, &self.project_id, &self.start, &self.end]
            .iter()
            .map(|part| part.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedExpense {
    pub index: usize,
    pub draft: ExpenseDraft,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkOutcome {
    pub created: Vec<Expense>,
    pub failed: Vec<FailedExpense>,
}

impl BulkOutcome {
    pub fn total_created(&self) -> usize {
        self.created.len()
    }

    pub fn total_failed(&self) -> usize {
        self.failed.len()
    }
}

pub struct ExpenseManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    expenses: ScopedCache<Aggregate<Expense>>,
    categories: CacheSlot<Aggregate<ExpenseCategory>>,
}

impl ExpenseManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            expenses: ScopedCache::new(),
            categories: CacheSlot::new(),
        }
    }

    pub async fn get_all_expenses(&mut self, filter: &ExpenseFilter, use_cache: bool) -> Aggregate<Expense> {
        let key = filter.cache_key();
        if use_cache {
            if let Some(cached) = self.expenses.get(&key) {
                return cached.clone();
            }
        }
        let fetch = Fetch::with_page_size(MAX_EXPENSE_PAGE_SIZE);
        let params = filter.params();
        let aggregate = match &filter.user_id {
            Some(user_id) => self.client.list_user_expenses(user_id, &params, fetch).await,
            None => self.client.list_expenses(&params, fetch).await,
        };
        if settle_listing(&aggregate, self.sink.as_ref(), "all_expenses") {
            self.expenses.store(&key, aggregate.clone());
        }
        aggregate
    }

    pub async fn get_expense_by_id(&self, expense_id: &str) -> Result<Expense, ApiError> {
        let value = self
            .client
            .get_record(&format!("/expenses/{expense_id}"))
            .await?;
        decode(value)
    }

    /// Refuses a draft missing a required id or date without sending it.
    pub async fn create_expense(&mut self, draft: &ExpenseDraft) -> Result<Expense, ApiError> {
        let missing = draft.missing_required();
        if !missing.is_empty() {
            return Err(ApiError::new(
                FailureKind::InvalidBody,
                format!("expense is missing required fields: {}", missing.join(", ")),
            ));
        }
        self.expenses.invalidate_all();
        let value = self
            .client
            .post(&self.client.workspace_endpoint("/expenses"), draft)
            .await?;
        decode(value)
    }

    pub async fn update_expense(
        &mut self,
        expense_id: &str,
        draft: &ExpenseDraft,
    ) -> Result<Expense, ApiError> {
        self.expenses.invalidate_all();
        let endpoint = self
            .client
            .workspace_endpoint(&format!("/expenses/{expense_id}"));
        let value = self.client.put(&endpoint, draft).await?;
        decode(value)
    }

    pub async fn delete_expense(&mut self, expense_id: &str) -> Result<(), ApiError> {
        self.expenses.invalidate_all();
        let endpoint = self
            .client
            .workspace_endpoint(&format!("/expenses/{expense_id}"));
        self.client.delete(&endpoint).await?;
        clk_info!("Deleted expense {expense_id}");
        Ok(())
    }

    /// Creates each draft in turn. A failed draft is recorded and skipped.
    pub async fn bulk_create_expenses(&mut self, drafts: &[ExpenseDraft]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for (index, draft) in drafts.iter().enumerate() {
            match self.create_expense(draft).await {
                Ok(expense) => outcome.created.push(expense),
                Err(err) => {
                    clk_warn!("Expense {} of {} failed: {err}", index + 1, drafts.len());
                    outcome.failed.push(FailedExpense {
                        index,
                        draft: draft.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        clk_info!(
            "Bulk create: {} created, {} failed",
            outcome.total_created(),
            outcome.total_failed()
        );
        outcome
    }

    pub async fn get_expense_categories(&mut self, use_cache: bool) -> Aggregate<ExpenseCategory> {
        if use_cache {
            if let Some(cached) = self.categories.get() {
                return cached.clone();
            }
        }
        let aggregate = self.client.list_expense_categories(Fetch::all()).await;
        if settle_listing(&aggregate, self.sink.as_ref(), "expense_categories") {
            self.categories.store(aggregate.clone());
        }
        aggregate
    }

    pub async fn get_expense_summary(&mut self, filter: &ExpenseFilter) -> ExpenseSummary {
        let expenses = self.get_all_expenses(filter, true).await;
        let summary = expense_summary(&expenses.items);
        clk_info!(
            "{} expenses totalling {:.2}",
            summary.total_expenses,
            summary.total_amount
        );
        export_dataset(self.sink.as_ref(), "expense_summary", &summary);
        summary
    }

    pub fn clear_cache(&mut self) {
        self.expenses.invalidate_all();
        self.categories.invalidate();
    }
}
