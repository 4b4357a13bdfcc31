use std::sync::Arc;

use clockify_core::{
    find_containing, match_first_containing, names_equal, Aggregate, CacheSlot, NameMatches, User,
};
use clockify_logging::clk_warn;

use super::{decode, settle_listing};
use crate::client::{ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::ApiError;

pub struct UserManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    cache: CacheSlot<Aggregate<User>>,
}

impl UserManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            cache: CacheSlot::new(),
        }
    }

    pub async fn get_all_users(&mut self, use_cache: bool) -> Aggregate<User> {
        if use_cache {
            if let Some(cached) = self.cache.get() {
                return cached.clone();
            }
        }
        let aggregate = self.client.list_users(Fetch::all()).await;
        if settle_listing(&aggregate, self.sink.as_ref(), "all_users") {
            self.cache.store(aggregate.clone());
        }
        aggregate
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        let value = self.client.get_record(&format!("/users/{user_id}")).await?;
        decode(value)
    }

    /// Case-insensitive exact email match.
    pub async fn get_user_by_email(&mut self, email: &str) -> Option<User> {
        let users = self.get_all_users(true).await;
        users
            .items
            .into_iter()
            .find(|user| names_equal(&user.email, email))
    }

    /// Users whose name contains `fragment`.
    pub async fn get_users_by_name(&mut self, fragment: &str) -> Vec<User> {
        let users = self.get_all_users(true).await;
        find_containing(&users.items, fragment)
            .into_iter()
            .cloned()
            .collect()
    }

    /// First user whose name contains each requested name.
    pub async fn find_users_by_names(&mut self, names: &[String]) -> NameMatches<User> {
        let users = self.get_all_users(true).await;
        let matches = match_first_containing(&users.items, names);
        if !matches.missing.is_empty() {
            clk_warn!("Users not found: {:?}", matches.missing);
        }
        if !matches.found.is_empty() {
            export_dataset(self.sink.as_ref(), "users_by_names", &matches.found);
        }
        matches
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate();
    }
}
