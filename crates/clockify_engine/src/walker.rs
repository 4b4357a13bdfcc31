use clockify_core::{Aggregate, PagePlan, PageWalk};
use clockify_logging::{clk_debug, clk_error, clk_info};
use serde_json::Value;

use crate::transport::{ApiRequest, Transport};

pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "page-size";

/// Walks a paginated listing until the paging rule says stop.
///
/// Pages are requested one after another. A failing page ends the walk and the
/// items gathered so far come back in an aggregate marked as failed.
pub struct PageWalker<'a> {
    transport: &'a dyn Transport,
}

impl<'a> PageWalker<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    pub async fn walk(
        &self,
        endpoint: &str,
        filters: &[(String, String)],
        plan: PagePlan,
    ) -> Aggregate<Value> {
        let filters: Vec<(String, String)> = filters
            .iter()
            .filter(|(key, _)| key != PAGE_PARAM && key != PAGE_SIZE_PARAM)
            .cloned()
            .collect();

        let mut walk = PageWalk::new(plan);
        while let Some(page) = walk.next_page() {
            let request = ApiRequest::get(endpoint)
                .with_params(&filters)
                .with_query(PAGE_PARAM, page)
                .with_query(PAGE_SIZE_PARAM, plan.page_size());
            match self.transport.send(&request).await {
                Ok(body) => {
                    let count = walk.accept(body);
                    clk_debug!("{endpoint}: page {page} returned {count} items");
                }
                Err(err) => {
                    clk_error!("{endpoint}: page {page} failed: {err}");
                    walk.fail(err.to_string());
                }
            }
        }

        let aggregate = walk.finish();
        clk_info!(
            "{endpoint}: {} items over {} pages ({})",
            aggregate.total_count(),
            aggregate.pages_fetched,
            aggregate.stop
        );
        aggregate
    }
}
