//! PostgREST client for storing results.
//!
//! Speaks the REST dialect Supabase exposes: rows are inserted with
//! `POST /rest/v1/<table>` and filtered with `column=eq.value` parameters.

use primex_experiment::persistence::Filter;
use primex_experiment::{Error, PersistenceGateway, ResultRecord};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

type GatewayResult<T> = primex_experiment::Result<T>;

#[derive(Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, params: Vec<(String, String)>) -> GatewayResult<T> {
        debug!(table, ?params, "querying results");
        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await
            .map_err(|e| failure("request failed", e))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| failure("unreadable response", e))
    }
}

fn failure(what: &str, e: impl std::fmt::Display) -> Error {
    Error::PersistenceFailure(format!("{what}: {e}"))
}

async fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::PersistenceFailure(format!("server returned {status}: {body}")))
}

/// `select` plus one `column=eq.value` pair per filter.
fn query_params(select: &str, filters: &[Filter]) -> Vec<(String, String)> {
    std::iter::once(("select".to_string(), select.to_string()))
        .chain(
            filters
                .iter()
                .map(|f| (f.column.clone(), format!("eq.{}", f.value))),
        )
        .collect()
}

impl PersistenceGateway for RestGateway {
    async fn save(&self, table: &str, records: &[ResultRecord]) -> GatewayResult<()> {
        debug!(table, count = records.len(), "inserting results");
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await
            .map_err(|e| failure("request failed", e))?;
        check_status(response).await?;
        Ok(())
    }

    async fn query(&self, table: &str, filters: &[Filter]) -> GatewayResult<Vec<ResultRecord>> {
        self.fetch(table, query_params("*", filters)).await
    }

    async fn check_duplicate(&self, table: &str, experiment_id: &str, external_id: &str) -> GatewayResult<bool> {
        let mut params = query_params(
            "id",
            &[
                Filter::eq("user_experiment_id", experiment_id),
                Filter::eq("external_id", external_id),
            ],
        );
        params.push(("limit".to_string(), "1".to_string()));
        let rows: Vec<serde_json::Value> = self.fetch(table, params).await?;
        Ok(!rows.is_empty())
    }
}
