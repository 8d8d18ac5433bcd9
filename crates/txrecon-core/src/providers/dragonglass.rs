use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Url};
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::types::{ExplorerPage, TxFilter};

use super::{build_http_client, checked_body, parse_endpoint, ExplorerSource};

/// REST explorer client. Issues one GET per call with the filter triple as
/// query parameters.
pub struct DragonglassClient {
    client: reqwest::Client,
    url: Url,
}

impl DragonglassClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            url: parse_endpoint(endpoint)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ExplorerSource for DragonglassClient {
    async fn fetch_transactions(&self, filter: &TxFilter) -> Result<ExplorerPage, CoreError> {
        debug!(
            payer_id = filter.payer_id,
            account_from = filter.account_from,
            query = %filter.query,
            "explorer request"
        );

        let response = self
            .client
            .get(self.url.clone())
            .header(header::ACCEPT, "application/json")
            .query(&[
                ("payerID", filter.payer_id.to_string()),
                ("query", filter.query.clone()),
                ("accountFrom", filter.account_from.to_string()),
                ("cache", "false".to_owned()),
            ])
            .send()
            .await?;

        let body = checked_body(response).await?;
        trace!(body_len = body.len(), body = %body, "explorer response body");

        let page: ExplorerPage = serde_json::from_str(&body)
            .map_err(|e| CoreError::InvalidResponse(format!("decode explorer page: {e}")))?;
        debug!(records = page.data.len(), total = page.total_count, "explorer response");
        Ok(page)
    }
}
