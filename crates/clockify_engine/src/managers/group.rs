use std::sync::Arc;

use clockify_core::{
    find_by_name, groups_summary, match_exact, match_first_containing, Aggregate, CacheSlot,
    Group, GroupDraft, GroupsSummary, NameMatches,
};
use clockify_logging::{clk_info, clk_warn};
use serde_json::json;

use super::{decode, settle_listing};
use crate::client::{ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::ApiError;

pub struct GroupManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    cache: CacheSlot<Aggregate<Group>>,
}

impl GroupManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            cache: CacheSlot::new(),
        }
    }

    fn group_endpoint(&self, group_id: &str) -> String {
        self.client
            .workspace_endpoint(&format!("/user-groups/{group_id}"))
    }

    pub async fn get_all_groups(&mut self, use_cache: bool) -> Aggregate<Group> {
        if use_cache {
            if let Some(cached) = self.cache.get() {
                return cached.clone();
            }
        }
        let aggregate = self.client.list_groups(Fetch::all()).await;
        if settle_listing(&aggregate, self.sink.as_ref(), "all_groups") {
            self.cache.store(aggregate.clone());
        }
        aggregate
    }

    pub async fn get_group_by_id(&self, group_id: &str) -> Result<Group, ApiError> {
        let value = self.client.get(&self.group_endpoint(group_id), &[]).await?;
        decode(value)
    }

    /// Case-insensitive exact match.
    pub async fn get_group_by_name(&mut self, name: &str) -> Option<Group> {
        let groups = self.get_all_groups(true).await;
        find_by_name(&groups.items, name).cloned()
    }

    /// First group whose name contains each requested name.
    pub async fn find_groups_by_names(&mut self, names: &[String]) -> NameMatches<Group> {
        let groups = self.get_all_groups(true).await;
        self.report_matches(match_first_containing(&groups.items, names))
    }

    /// Case-insensitive exact lookup of each requested name.
    pub async fn get_groups_by_names(&mut self, names: &[String]) -> NameMatches<Group> {
        let groups = self.get_all_groups(true).await;
        self.report_matches(match_exact(&groups.items, names))
    }

    fn report_matches(&self, matches: NameMatches<Group>) -> NameMatches<Group> {
        if !matches.missing.is_empty() {
            clk_warn!("Groups not found: {:?}", matches.missing);
        }
        if !matches.found.is_empty() {
            export_dataset(self.sink.as_ref(), "groups_by_names", &matches.found);
        }
        matches
    }

    pub async fn get_groups_summary(&mut self) -> GroupsSummary {
        let groups = self.get_all_groups(true).await;
        let summary = groups_summary(&groups.items);
        export_dataset(self.sink.as_ref(), "groups_summary", &summary);
        summary
    }

    pub async fn create_group(&mut self, draft: &GroupDraft) -> Result<Group, ApiError> {
        self.cache.invalidate();
        let value = self
            .client
            .post(&self.client.workspace_endpoint("/user-groups"), draft)
            .await?;
        let group: Group = decode(value)?;
        clk_info!("Created group {} ({})", group.name, group.id);
        Ok(group)
    }

    pub async fn update_group(&mut self, group_id: &str, draft: &GroupDraft) -> Result<Group, ApiError> {
        self.cache.invalidate();
        let value = self.client.put(&self.group_endpoint(group_id), draft).await?;
        decode(value)
    }

    pub async fn delete_group(&mut self, group_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate();
        self.client.delete(&self.group_endpoint(group_id)).await?;
        clk_info!("Deleted group {group_id}");
        Ok(())
    }

    pub async fn add_user_to_group(&mut self, group_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate();
        let endpoint = format!("{}/users", self.group_endpoint(group_id));
        self.client.post(&endpoint, &json!({ "userId": user_id })).await?;
        clk_info!("Added user {user_id} to group {group_id}");
        Ok(())
    }

    pub async fn remove_user_from_group(&mut self, group_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate();
        let endpoint = format!("{}/users/{user_id}", self.group_endpoint(group_id));
        self.client.delete(&endpoint).await?;
        clk_info!("Removed user {user_id} from group {group_id}");
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate();
    }
}
