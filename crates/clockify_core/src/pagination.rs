//! Page-walk bookkeeping shared by every paginated listing.
//!
//! [`PageWalk`] owns the stopping rule and the response-shape sniffing; the
//! IO loop that feeds it lives in the engine crate. Keeping the decisions here
//! lets them be exercised without any transport.

use serde_json::Value;

use crate::aggregate::{Aggregate, StopReason};

/// Largest page size the API accepts.
pub const MAX_PAGE_SIZE: usize = 5000;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// Object fields that conventionally carry a listing, in lookup order.
pub const LIST_FIELDS: [&str; 5] = ["items", "data", "results", "expenses", "categories"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    page_size: usize,
    max_pages: Option<usize>,
}

impl Default for PagePlan {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

impl PagePlan {
    pub fn new(page_size: Option<usize>, max_pages: Option<usize>) -> Self {
        let plan = Self::default();
        let plan = match page_size {
            Some(size) => plan.with_page_size(size),
            None => plan,
        };
        match max_pages {
            Some(pages) => plan.with_max_pages(pages),
            None => plan,
        }
    }

    /// Page sizes are clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// A cap of zero means "no cap".
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = (max_pages > 0).then_some(max_pages);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Decides whether the walk ends after `page` (1-based) returned `count` items.
    ///
    /// A full page always asks for its successor, so an item count that is an
    /// exact multiple of the page size costs one trailing empty request.
    pub fn stop_after(&self, page: usize, count: usize) -> Option<StopReason> {
        if count == 0 {
            return Some(StopReason::EmptyPage);
        }
        if count < self.page_size {
            return Some(StopReason::ShortPage);
        }
        match self.max_pages {
            Some(cap) if page >= cap => Some(StopReason::PageCap),
            _ => None,
        }
    }
}

/// In-progress walk over one paginated endpoint.
///
/// Drive it with [`PageWalk::next_page`], then hand each body to
/// [`PageWalk::accept`] or report a failure through [`PageWalk::fail`].
#[derive(Debug)]
pub struct PageWalk {
    plan: PagePlan,
    items: Vec<Value>,
    pages_fetched: usize,
    stop: Option<StopReason>,
}

impl PageWalk {
    pub fn new(plan: PagePlan) -> Self {
        Self {
            plan,
            items: Vec::new(),
            pages_fetched: 0,
            stop: None,
        }
    }

    pub fn plan(&self) -> &PagePlan {
        &self.plan
    }

    /// The next page number to request, or `None` once the walk has stopped.
    pub fn next_page(&self) -> Option<usize> {
        match self.stop {
            Some(_) => None,
            None => Some(self.pages_fetched + 1),
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn items_so_far(&self) -> usize {
        self.items.len()
    }

    /// Appends one page and returns how many items it carried.
    pub fn accept(&mut self, body: Value) -> usize {
        if self.stop.is_some() {
            return 0;
        }
        let page_items = extract_page_items(body);
        let count = page_items.len();
        self.items.extend(page_items);
        self.pages_fetched += 1;
        self.stop = self.plan.stop_after(self.pages_fetched, count);
        count
    }

    /// Stops the walk at the page that failed; nothing from that page is kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.stop.is_none() {
            self.stop = Some(StopReason::Failed {
                page: self.pages_fetched + 1,
                message: message.into(),
            });
        }
    }

    /// Closes the walk. A walk abandoned before it stopped is reported as capped.
    pub fn finish(self) -> Aggregate<Value> {
        Aggregate::new(
            self.items,
            self.pages_fetched,
            self.stop.unwrap_or(StopReason::PageCap),
        )
    }
}

/// Pulls the item list out of one page body.
///
/// Arrays are the page. Objects contribute the first present [`LIST_FIELDS`]
/// entry; a non-list value there, or an object without any of those fields,
/// becomes a single implicit item. `null` and `{}` are empty pages.
pub fn extract_page_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut map) => {
            for field in LIST_FIELDS {
                if let Some(value) = map.remove(field) {
                    return match value {
                        Value::Array(items) => items,
                        Value::Null => Vec::new(),
                        other => vec![other],
                    };
                }
            }
            if map.is_empty() {
                Vec::new()
            } else {
                vec![Value::Object(map)]
            }
        }
        Value::String(ref text) if text.is_empty() => Vec::new(),
        other => vec![other],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    Array { len: usize },
    Object { keys: Vec<String>, list_field: Option<String> },
    Scalar,
    Empty,
}

/// Describes a response body without consuming it.
pub fn sniff_shape(body: &Value) -> ResponseShape {
    match body {
        Value::Array(items) => ResponseShape::Array { len: items.len() },
        Value::Object(map) if map.is_empty() => ResponseShape::Empty,
        Value::Object(map) => ResponseShape::Object {
            keys: map.keys().cloned().collect(),
            list_field: LIST_FIELDS
                .iter()
                .find(|field| map.contains_key(**field))
                .map(|field| field.to_string()),
        },
        Value::Null => ResponseShape::Empty,
        _ => ResponseShape::Scalar,
    }
}
