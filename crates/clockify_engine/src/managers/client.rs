use std::sync::Arc;

use clockify_core::{
    clients_summary, find_by_name, projects_for_client, Aggregate, CacheSlot, Client,
    ClientDraft, ClientsSummary, Project,
};
use clockify_logging::{clk_info, clk_warn};

use super::{decode, settle_listing};
use crate::client::{ApiClient, Fetch};
use crate::export::{export_dataset, ExportSink};
use crate::ApiError;

pub struct ClientManager {
    client: ApiClient,
    sink: Arc<dyn ExportSink>,
    cache: CacheSlot<Aggregate<Client>>,
}

impl ClientManager {
    pub fn new(client: ApiClient, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            client,
            sink,
            cache: CacheSlot::new(),
        }
    }

    pub async fn get_all_clients(&mut self, use_cache: bool) -> Aggregate<Client> {
        if use_cache {
            if let Some(cached) = self.cache.get() {
                return cached.clone();
            }
        }
        let aggregate = self.client.list_clients(Fetch::all()).await;
        if settle_listing(&aggregate, self.sink.as_ref(), "all_clients") {
            self.cache.store(aggregate.clone());
        }
        aggregate
    }

    pub async fn get_client_by_id(&self, client_id: &str) -> Result<Client, ApiError> {
        let value = self
            .client
            .get_record(&format!("/clients/{client_id}"))
            .await?;
        decode(value)
    }

    /// Case-insensitive exact match.
    pub async fn get_client_by_name(&mut self, name: &str) -> Option<Client> {
        let clients = self.get_all_clients(true).await;
        find_by_name(&clients.items, name).cloned()
    }

    /// Projects owned by the client called `client_name`.
    pub async fn filter_projects_by_client_name(
        &mut self,
        projects: &[Project],
        client_name: &str,
    ) -> Vec<Project> {
        let Some(client) = self.get_client_by_name(client_name).await else {
            clk_warn!("Client not found: {client_name}");
            return Vec::new();
        };
        let matched: Vec<Project> = projects_for_client(projects, &client.id)
            .into_iter()
            .cloned()
            .collect();
        clk_info!("{} projects for client {}", matched.len(), client.name);
        if !matched.is_empty() {
            export_dataset(
                self.sink.as_ref(),
                &format!("projects_client_{}", client.name),
                &matched,
            );
        }
        matched
    }

    pub async fn get_clients_summary(&mut self, projects: &[Project]) -> ClientsSummary {
        let clients = self.get_all_clients(true).await;
        let summary = clients_summary(&clients.items, projects);
        export_dataset(self.sink.as_ref(), "clients_summary", &summary);
        summary
    }

    pub async fn create_client(&mut self, draft: &ClientDraft) -> Result<Client, ApiError> {
        self.cache.invalidate();
        let value = self
            .client
            .post(&self.client.workspace_endpoint("/clients"), draft)
            .await?;
        let client: Client = decode(value)?;
        clk_info!("Created client {} ({})", client.name, client.id);
        Ok(client)
    }

    pub async fn update_client(
        &mut self,
        client_id: &str,
        draft: &ClientDraft,
    ) -> Result<Client, ApiError> {
        self.cache.invalidate();
        let value = self
            .client
            .put(
                &self.client.workspace_endpoint(&format!("/clients/{client_id}")),
                draft,
            )
            .await?;
        decode(value)
    }

    pub async fn delete_client(&mut self, client_id: &str) -> Result<(), ApiError> {
        self.cache.invalidate();
        self.client
            .delete(&self.client.workspace_endpoint(&format!("/clients/{client_id}")))
            .await?;
        clk_info!("Deleted client {client_id}");
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate();
    }
}
