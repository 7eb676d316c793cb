//! PostgREST table client for a Supabase project.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Request, StatusCode};
use serde::Deserialize;

use super::remote::{FetchedRows, RemoteError, RemoteRow, RemoteTable};
use crate::config::RemoteConfig;
use crate::util::compact_text;

#[derive(Clone)]
pub struct SupabaseTable {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for SupabaseTable {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseTable")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SupabaseTable {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// `POST /rest/v1/{table}?on_conflict=id` merging duplicates by id.
    pub fn build_upsert_request(&self, rows: &[RemoteRow]) -> Result<Request, RemoteError> {
        let request = self
            .authorized(self.client.post(self.config.table_url()))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .build()?;
        Ok(request)
    }

    /// `GET /rest/v1/{table}` filtered on `last_modified > since`, oldest first.
    pub fn build_fetch_request(&self, since: Option<DateTime<Utc>>) -> Result<Request, RemoteError> {
        let since = since.unwrap_or(DateTime::UNIX_EPOCH);
        let filter = format!("gt.{}", since.to_rfc3339_opts(SecondsFormat::Micros, true));
        let request = self
            .authorized(self.client.get(self.config.table_url()))
            .query(&[
                ("select", "*"),
                ("last_modified", filter.as_str()),
                ("order", "last_modified.asc"),
            ])
            .build()?;
        Ok(request)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.config.bearer_token())
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl RemoteTable for SupabaseTable {
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<(), RemoteError> {
        let request = self.build_upsert_request(rows)?;
        let response = self.client.execute(request).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        tracing::debug!(rows = rows.len(), table = %self.config.table, "Upserted rows");
        Ok(())
    }

    async fn fetch_modified_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<FetchedRows, RemoteError> {
        let request = self.build_fetch_request(since)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        FetchedRows::decode(&body)
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn api_error(status: StatusCode, body: &str) -> RemoteError {
    RemoteError::Api {
        status: status.as_u16(),
        message: parse_api_error(status, body),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint.filter(|hint| !hint.trim().is_empty()) {
                Some(hint) => format!("{} ({}; {})", message.trim(), status.as_u16(), hint.trim()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
