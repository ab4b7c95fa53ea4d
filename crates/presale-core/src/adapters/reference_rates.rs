use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::rates::{ExchangeRateTable, RateSource};
use crate::{Principal, ValuationError};

const RATES_PATH: &str = "/currencies/rates/";
const USER_ID_HEADER: &str = "user-id";

/// Client for the reference-books rate service.
#[derive(Clone)]
pub struct ReferenceRateClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl ReferenceRateClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::default()), base_url)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            timeout: Duration::from_millis(3_000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{RATES_PATH}", self.base_url.trim_end_matches('/'))
    }

    async fn fetch(&self, principal: &Principal) -> Result<ExchangeRateTable, ValuationError> {
        let endpoint = self.endpoint();
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let request = HttpRequest::get(&endpoint)
            .with_header(USER_ID_HEADER, principal.as_str())
            .with_timeout_ms(timeout_ms);

        debug!(%endpoint, principal = %principal, timeout_ms, "requesting reference rates");

        let response = match tokio::time::timeout(self.timeout, self.http_client.execute(request))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(%endpoint, error = %e, "reference rate transport error");
                return Err(ValuationError::upstream(None, Some(e.message().to_string())));
            }
            Err(_) => {
                warn!(%endpoint, timeout_ms, "reference rate request timed out");
                return Err(ValuationError::upstream(
                    None,
                    Some(format!("reference rate request timed out after {timeout_ms} ms")),
                ));
            }
        };

        if !response.is_success() {
            warn!(%endpoint, status = response.status, "reference rate service returned an error");
            return Err(ValuationError::upstream(
                Some(response.status),
                response.reason,
            ));
        }

        let table = ExchangeRateTable::from_payload(&response.body)?;
        debug!(currencies = table.len(), "reference rates loaded");
        Ok(table)
    }
}

impl RateSource for ReferenceRateClient {
    fn fetch_rates<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeRateTable, ValuationError>> + Send + 'a>> {
        Box::pin(self.fetch(principal))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::{HttpError, HttpResponse};

    struct ScriptedClient {
        response: Result<HttpResponse, HttpError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl HttpClient for ScriptedClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.seen.lock().expect("lock").push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn client(response: Result<HttpResponse, HttpError>) -> (Arc<ScriptedClient>, ReferenceRateClient) {
        let http = Arc::new(ScriptedClient {
            response,
            seen: Mutex::new(Vec::new()),
        });
        let rates = ReferenceRateClient::with_http_client(http.clone(), "https://books.test/api/");
        (http, rates)
    }

    #[tokio::test]
    async fn sends_principal_header_to_rates_endpoint() {
        let (http, rates) = client(Ok(HttpResponse::ok_json(
            r#"{"data":[{"currency":"USD","rate":1.0}]}"#,
        )));
        let principal = Principal::new("user-7").expect("principal");

        let table = rates.fetch_rates(&principal).await.expect("rates");
        assert_eq!(table.rate("usd").expect("usd"), 1.0);

        let seen = http.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "https://books.test/api/currencies/rates/");
        assert_eq!(seen[0].header("user-id"), Some("user-7"));
    }

    #[tokio::test]
    async fn non_success_status_keeps_status_and_reason() {
        let (_, rates) = client(Ok(HttpResponse::with_status(503, None)));
        let principal = Principal::new("user-7").expect("principal");

        let err = rates.fetch_rates(&principal).await.expect_err("must fail");
        assert!(matches!(
            err,
            ValuationError::UpstreamUnavailable { status: Some(503), ref reason }
                if reason == crate::error::DEFAULT_UPSTREAM_REASON
        ));
    }

    #[tokio::test]
    async fn transport_error_is_upstream_unavailable() {
        let (_, rates) = client(Err(HttpError::new("connection refused")));
        let principal = Principal::new("user-7").expect("principal");

        let err = rates.fetch_rates(&principal).await.expect_err("must fail");
        assert!(matches!(
            err,
            ValuationError::UpstreamUnavailable { status: None, ref reason } if reason == "connection refused"
        ));
    }
}
