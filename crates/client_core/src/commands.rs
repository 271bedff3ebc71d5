//! Request/response commands against the dashboard backend.
//!
//! Every command is a single attempt. Drafts are validated locally first and an invalid
//! draft never reaches the network.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::Guid,
    protocol::{Concept, ConceptAck, ConceptDraft, ConceptFilter, Owner, OwnerAck, OwnerDraft, PeerMap},
};
use tracing::{debug, info, warn};

use crate::{config::ClientConfig, error::CommandError};

/// The three commands the dashboard forms issue.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn submit_concept(&self, draft: &ConceptDraft) -> Result<ConceptAck, CommandError>;
    async fn fetch_owner(&self) -> Result<Owner, CommandError>;
    async fn update_owner(&self, draft: &OwnerDraft) -> Result<OwnerAck, CommandError>;
}

#[derive(Debug, Clone)]
pub struct CommandClient {
    http: Client,
    config: ClientConfig,
}

impl CommandClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(Client::new(), config)
    }

    pub fn with_http_client(http: Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub async fn fetch_concept(&self, guid: &Guid) -> Result<Concept, CommandError> {
        let url = self.config.rest_url(&format!("/concept/{guid}"));
        read_json(&url, self.http.get(&url)).await
    }

    /// `GET /concepts`. An empty filter lists every concept; a `null` body is no matches.
    pub async fn query_concepts(&self, filter: &ConceptFilter) -> Result<Vec<Concept>, CommandError> {
        let url = self.config.rest_url("/concepts");
        let request = self.http.get(&url).query(&filter.query_pairs());
        let concepts: Option<Vec<Concept>> = read_json(&url, request).await?;
        Ok(concepts.unwrap_or_default())
    }

    pub async fn delete_concept(&self, guid: &Guid) -> Result<(), CommandError> {
        let url = self.config.rest_url(&format!("/concept/{guid}"));
        read_body(&url, self.http.delete(&url)).await?;
        info!(guid = %guid, "commands: concept deleted");
        Ok(())
    }

    /// `GET /peers`: the backend's current table of peers that advertise an owner.
    pub async fn list_peers(&self) -> Result<PeerMap, CommandError> {
        let url = self.config.rest_url("/peers");
        let peers: Option<PeerMap> = read_json(&url, self.http.get(&url)).await?;
        Ok(peers.unwrap_or_default())
    }
}

#[async_trait]
impl DashboardApi for CommandClient {
    async fn submit_concept(&self, draft: &ConceptDraft) -> Result<ConceptAck, CommandError> {
        draft.validate()?;
        let url = self.config.rest_url("/concept");
        let ack: ConceptAck = read_ack(&url, self.http.post(&url).json(draft)).await?;
        info!(
            guid = ack.guid.as_ref().map(Guid::as_str).unwrap_or("-"),
            cid = ack.cid.as_ref().map(|cid| cid.as_str()).unwrap_or("-"),
            "commands: concept submitted"
        );
        Ok(ack)
    }

    async fn fetch_owner(&self) -> Result<Owner, CommandError> {
        let url = self.config.rest_url("/owner");
        read_json(&url, self.http.get(&url)).await
    }

    async fn update_owner(&self, draft: &OwnerDraft) -> Result<OwnerAck, CommandError> {
        draft.validate()?;
        let url = self.config.rest_url("/owner");
        let ack: OwnerAck = read_ack(&url, self.http.post(&url).json(draft)).await?;
        info!(
            message = ack.message.as_deref().unwrap_or("-"),
            "commands: owner updated"
        );
        Ok(ack)
    }
}

async fn read_body(url: &str, request: RequestBuilder) -> Result<String, CommandError> {
    let response = request.send().await.map_err(|source| {
        warn!(url, "commands: request failed: {source}");
        CommandError::Request {
            url: url.to_string(),
            source,
        }
    })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| CommandError::Request {
            url: url.to_string(),
            source,
        })?;
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "commands: backend rejected request");
        return Err(CommandError::status(url, status.as_u16(), &body));
    }
    debug!(url, bytes = body.len(), "commands: response received");
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(
    url: &str,
    request: RequestBuilder,
) -> Result<T, CommandError> {
    let body = read_body(url, request).await?;
    decode(url, &body)
}

/// Acks carry only optional fields, so an empty success body is an empty ack.
async fn read_ack<T: DeserializeOwned + Default>(
    url: &str,
    request: RequestBuilder,
) -> Result<T, CommandError> {
    let body = read_body(url, request).await?;
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    decode(url, &body)
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, CommandError> {
    serde_json::from_str(body).map_err(|source| CommandError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
