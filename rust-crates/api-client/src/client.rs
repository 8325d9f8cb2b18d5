use crate::{
    Result,
    cache::ResponseCache,
    dto::{
        BalanceDto,
        CaseDto,
        HistoryDto,
        InventoryItemDto,
        OpenCaseRequest,
        OpenCaseResponseDto,
        SellItemRequest,
        SellItemResponseDto,
        StarsInvoiceDto,
        StarsInvoiceRequest,
        TransactionDto,
        UserProfileDto,
    },
    error::ApiError,
};
use reqwest::StatusCode;
use serde::{
    Serialize,
    de::DeserializeOwned,
};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const CASES_TTL: Duration = Duration::from_secs(5 * 60);
const BALANCE_TTL: Duration = Duration::from_secs(10);
const PROFILE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// HTTP client for the case-opening backend.
///
/// Every call makes a single request; retrying is left to the caller's
/// `RetryPolicy`.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    health_timeout: Duration,
    cache: ResponseCache,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            base_url,
            http,
            health_timeout: config.health_timeout,
            cache: ResponseCache::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn health(&self) -> Result<()> {
        let url = self.url("/health");
        let res = self
            .http
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&url, e))?;
        Self::read_body(&url, res).await.map(|_| ())
    }

    /// `true` when the backend answers its health check.
    pub async fn check_availability(&self) -> bool {
        match self.health().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "backend unavailable");
                false
            }
        }
    }

    pub async fn list_cases(&self) -> Result<Vec<CaseDto>> {
        self.get_json("/cases/", Some(("cases", CASES_TTL))).await
    }

    pub async fn case_details(&self, case_id: &str) -> Result<CaseDto> {
        let path = format!("/cases/{case_id}");
        let key = format!("case_details_{case_id}");
        self.get_json(&path, Some((&key, CASES_TTL))).await
    }

    pub async fn open_case(&self, case_id: &str, user_id: u64) -> Result<OpenCaseResponseDto> {
        let path = format!("/cases/{case_id}/open");
        let response: OpenCaseResponseDto =
            self.post_json(&path, &OpenCaseRequest { user_id }).await?;
        self.cache.invalidate_prefix("user_");
        if !response.success {
            return Err(ApiError::Rejected(response.message));
        }
        Ok(response)
    }

    pub async fn balance(&self, user_id: u64) -> Result<BalanceDto> {
        let path = format!("/users/{user_id}/balance");
        let key = format!("user_{user_id}_balance");
        self.get_json(&path, Some((&key, BALANCE_TTL))).await
    }

    pub async fn create_stars_invoice(
        &self,
        user_id: u64,
        stars_amount: u64,
    ) -> Result<StarsInvoiceDto> {
        let body = StarsInvoiceRequest {
            user_id,
            stars_amount,
        };
        self.post_json("/payments/stars/invoice", &body).await
    }

    /// Current state of a payment transaction. Never cached.
    pub async fn transaction_status(&self, transaction_id: &str) -> Result<TransactionDto> {
        let path = format!("/payments/transaction/{transaction_id}");
        self.get_json(&path, None).await
    }

    pub async fn inventory(&self, user_id: u64) -> Result<Vec<InventoryItemDto>> {
        let path = format!("/inventory/{user_id}");
        self.get_json(&path, None).await
    }

    pub async fn sell_item(&self, item_id: &str, user_id: u64) -> Result<SellItemResponseDto> {
        let path = format!("/inventory/{item_id}/sell");
        let response: SellItemResponseDto =
            self.post_json(&path, &SellItemRequest { user_id }).await?;
        self.cache.invalidate_prefix("user_");
        self.cache.invalidate_prefix("inventory_");
        if !response.success {
            return Err(ApiError::Rejected(response.message));
        }
        Ok(response)
    }

    pub async fn profile(&self, user_id: u64) -> Result<UserProfileDto> {
        let path = format!("/users/{user_id}/profile");
        let key = format!("user_profile_{user_id}");
        self.get_json(&path, Some((&key, PROFILE_TTL))).await
    }

    pub async fn history(&self, user_id: u64) -> Result<HistoryDto> {
        let path = format!("/users/{user_id}/history");
        self.get_json(&path, None).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cache: Option<(&str, Duration)>,
    ) -> Result<T> {
        let url = self.url(path);
        if let Some((key, _)) = cache {
            if let Some(body) = self.cache.get(key) {
                tracing::debug!(%url, "serving cached response");
                return Self::decode(&url, &body);
            }
        }
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&url, e))?;
        let body = Self::read_body(&url, res).await?;
        let value = Self::decode(&url, &body)?;
        if let Some((key, ttl)) = cache {
            self.cache.insert(key, body, ttl);
        }
        Ok(value)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&url, e))?;
        let bytes = Self::read_body(&url, res).await?;
        Self::decode(&url, &bytes)
    }

    async fn read_body(url: &str, res: reqwest::Response) -> Result<Vec<u8>> {
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(url, e))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body: Self::error_message(status, &bytes),
            });
        }
        Ok(bytes.to_vec())
    }

    fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    // FastAPI puts the reason in `detail`, other handlers in `message`.
    fn error_message(status: StatusCode, body: &[u8]) -> String {
        let parsed: Option<serde_json::Value> = serde_json::from_slice(body).ok();
        let reason = parsed.as_ref().and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        reason.unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body);
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                text.into_owned()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn new__trims_trailing_slash() {
        let client = ApiClient::new(ApiConfig::new("http://localhost:8000/api/")).unwrap();

        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/health"), "http://localhost:8000/api/health");
    }

    #[test]
    fn error_message__prefers_detail_then_message_then_body() {
        let status = StatusCode::BAD_REQUEST;

        assert_eq!(
            ApiClient::error_message(status, br#"{"detail":"Case not found"}"#),
            "Case not found"
        );
        assert_eq!(
            ApiClient::error_message(status, br#"{"message":"Insufficient balance"}"#),
            "Insufficient balance"
        );
        assert_eq!(ApiClient::error_message(status, b"plain text"), "plain text");
        assert_eq!(ApiClient::error_message(status, b""), "Bad Request");
    }
}
