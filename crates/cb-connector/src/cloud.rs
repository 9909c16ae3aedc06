//! HTTP client for the external cloud's subscription API.

use std::time::Duration;

use cb_events::header::CORRELATION_ID_HEADER;
use cb_events::{SubscriptionRequest, SubscriptionResponse};
use cb_store::LinkedAccount;
use reqwest::Client;
use tracing::debug;

use crate::error::{ConnectorError, Result};

/// Client for subscribe/cancel calls against a linked cloud.
///
/// Every call authenticates with the acting account's access token and
/// carries the caller's deadline; a timed-out call is a normal
/// [`ConnectorError::ExternalApi`].
pub struct CloudClient {
    http: Client,
    events_url: String,
}

impl CloudClient {
    pub fn new(events_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            events_url: events_url.into(),
        }
    }

    /// Callback URL delivered to the external cloud in subscribe bodies.
    pub fn events_url(&self) -> &str {
        &self.events_url
    }

    /// Issue a subscribe request at `path` under the account's cloud.
    pub async fn subscribe(
        &self,
        account: &LinkedAccount,
        path: &str,
        correlation_id: &str,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionResponse> {
        let url = join_url(&account.origin_cloud.api_url, path);
        debug!(%url, correlation_id, account_id = %account.id, "subscribing");

        let response = self
            .http
            .post(&url)
            .bearer_auth(account.access_token.as_str())
            .header(CORRELATION_ID_HEADER, correlation_id)
            .json(request)
            .send()
            .await
            .map_err(|e| ConnectorError::ExternalApi(format!("subscribe {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::ExternalApi(format!(
                "subscribe {path}: HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ConnectorError::ExternalApi(format!("subscribe {path}: {e}")))
    }

    /// Cancel the subscription at `path`.
    ///
    /// Idempotency of cancelling an already-cancelled id is up to the
    /// remote side; any non-success status is surfaced as an error.
    pub async fn cancel(&self, account: &LinkedAccount, path: &str) -> Result<()> {
        let url = join_url(&account.origin_cloud.api_url, path);
        debug!(%url, account_id = %account.id, "cancelling subscription");

        let response = self
            .http
            .delete(&url)
            .bearer_auth(account.access_token.as_str())
            .send()
            .await
            .map_err(|e| ConnectorError::ExternalApi(format!("cancel {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::ExternalApi(format!(
                "cancel {path}: HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
