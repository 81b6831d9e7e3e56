//! HTTP client for the platform's admin REST API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::lifecycle::Settlement;
use crate::models::{CopyTradeProduct, Purchase, TradeStatus};

use super::types::*;
use super::PurchaseApi;

const REQUEST_ID_HEADER: &str = "x-request-id";

const PURCHASES: &str = "copytrade-purchases";
const OPTIONS: &str = "copytrading-options";

/// Authenticated client for the admin API.
///
/// Every endpoint except login requires a bearer token; calls made without
/// one fail with [`AdminError::AuthenticationMissing`] before anything is sent.
pub struct AdminClient {
    client: Client,
    api_root: Url,
    token: Option<String>,
}

impl AdminClient {
    /// Create a client from configuration.
    pub fn new(config: &AdminConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AdminError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_root: parse_api_root(&config.api_root())?,
            token,
        })
    }

    /// Create with an explicit API root (for testing).
    #[cfg(test)]
    pub fn with_api_root(api_root: &str, token: Option<String>) -> Result<Self> {
        let config = AdminConfig::default();
        let mut client = Self::new(&config, token)?;
        client.api_root = parse_api_root(api_root)?;
        Ok(client)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// API root with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::Config(format!("Invalid API root: {}", self.api_root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AdminError::AuthenticationMissing)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(method = %method, path = %url.path(), request_id = %request_id, "API request");

        Ok(self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id))
    }

    fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let token = self.bearer()?;
        Ok(self
            .request(method, segments)?
            .header(AUTHORIZATION, format!("Bearer {}", token)))
    }

    /// Send a request and unwrap the response envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<ApiEnvelope<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope = decode_envelope(status, &body, what);
        if let Err(e) = &envelope {
            warn!(status = status.as_u16(), error = %e, "{} failed", what);
        }
        envelope
    }

    /// Log in with admin credentials and return the session token.
    ///
    /// The token is not retained; the caller decides where to keep it.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        if username.is_empty() || password.is_empty() {
            return Err(AdminError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let request = self
            .request(Method::POST, &["admin", "auth", "login"])?
            .json(&LoginRequest { username, password });
        let envelope: ApiEnvelope<LoginData> = self.execute(request, "Login").await?;

        require_data(envelope, "Login").map(|data| data.token)
    }

    /// End the session on the backend.
    pub async fn logout(&self) -> Result<Option<String>> {
        let request = self.authed(Method::POST, &["admin", "auth", "logout"])?;
        let envelope: ApiEnvelope<serde_json::Value> = self.execute(request, "Logout").await?;
        Ok(envelope.message)
    }

    /// `GET /copytrade-purchases/user/{userId}`
    pub async fn list_user_purchases(&self, user_id: &str) -> Result<Vec<Purchase>> {
        let user_id = id_segment(user_id, "user")?;
        let request = self.authed(Method::GET, &[PURCHASES, "user", user_id])?;
        let envelope: ApiEnvelope<Vec<Purchase>> =
            self.execute(request, "Fetch user purchases").await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait]
impl PurchaseApi for AdminClient {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>> {
        let request = self.authed(Method::GET, &[PURCHASES])?.query(filter);
        let envelope: ApiEnvelope<Vec<Purchase>> =
            self.execute(request, "Fetch copytrade purchases").await?;

        let purchases = envelope.data.unwrap_or_default();
        debug!(count = purchases.len(), filter = ?filter, "Fetched purchases");
        Ok(purchases)
    }

    async fn get_purchase(&self, id: &str) -> Result<Purchase> {
        let request = self.authed(Method::GET, &[PURCHASES, id_segment(id, "purchase")?])?;
        let envelope = self.execute(request, "Fetch copytrade purchase").await?;
        require_data(envelope, "Fetch copytrade purchase")
    }

    async fn list_products(&self) -> Result<Vec<CopyTradeProduct>> {
        let request = self.authed(Method::GET, &[OPTIONS])?;
        let envelope: ApiEnvelope<Vec<CopyTradeProduct>> =
            self.execute(request, "Fetch copytrade options").await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn get_product(&self, id: &str) -> Result<CopyTradeProduct> {
        let request = self.authed(Method::GET, &[OPTIONS, id_segment(id, "copytrade option")?])?;
        let envelope = self.execute(request, "Fetch copytrade option").await?;
        require_data(envelope, "Fetch copytrade option")
    }

    async fn create_product(&self, product: &ProductRequest) -> Result<CopyTradeProduct> {
        let request = self.authed(Method::POST, &[OPTIONS])?.json(product);
        let envelope = self.execute(request, "Create copytrade option").await?;
        require_data(envelope, "Create copytrade option")
    }

    async fn update_product(&self, id: &str, update: &ProductUpdate) -> Result<CopyTradeProduct> {
        let request = self
            .authed(Method::PUT, &[OPTIONS, id_segment(id, "copytrade option")?])?
            .json(update);
        let envelope = self.execute(request, "Update copytrade option").await?;
        require_data(envelope, "Update copytrade option")
    }

    async fn delete_product(&self, id: &str) -> Result<Option<String>> {
        let request =
            self.authed(Method::DELETE, &[OPTIONS, id_segment(id, "copytrade option")?])?;
        let envelope: ApiEnvelope<serde_json::Value> =
            self.execute(request, "Delete copytrade option").await?;
        Ok(envelope.message)
    }

    async fn create_purchase(&self, request: &CreatePurchaseRequest) -> Result<CreationOutcome> {
        let http = self.authed(Method::POST, &[PURCHASES, "admin"])?.json(request);
        let envelope: ApiEnvelope<CreationOutcome> =
            self.execute(http, "Create copytrade purchase").await?;

        let message = envelope.message.clone();
        let mut outcome = require_data(envelope, "Create copytrade purchase")?;
        outcome.message = message;
        Ok(outcome)
    }

    async fn update_status(&self, id: &str, status: TradeStatus) -> Result<StatusChange> {
        let request = self
            .authed(Method::PUT, &[PURCHASES, id_segment(id, "purchase")?])?
            .json(&StatusUpdateRequest {
                trade_status: status,
            });
        let envelope: ApiEnvelope<StatusUpdateData> =
            self.execute(request, "Update copytrade purchase").await?;

        let message = envelope.message.clone();
        require_data(envelope, "Update copytrade purchase").map(|data| data.into_change(message))
    }

    async fn end_purchase(&self, id: &str) -> Result<Settlement> {
        let request = self.authed(Method::POST, &[PURCHASES, id_segment(id, "purchase")?, "end"])?;
        let envelope: ApiEnvelope<Settlement> =
            self.execute(request, "End copytrade purchase").await?;

        let message = envelope.message.clone();
        let mut settlement = require_data(envelope, "End copytrade purchase")?;
        settlement.message = message;
        Ok(settlement)
    }

    async fn delete_purchase(&self, id: &str) -> Result<Option<String>> {
        let request = self.authed(Method::DELETE, &[PURCHASES, id_segment(id, "purchase")?])?;
        let envelope: ApiEnvelope<serde_json::Value> =
            self.execute(request, "Delete copytrade purchase").await?;
        Ok(envelope.message)
    }
}

fn parse_api_root(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AdminError::Config(format!("Invalid API root {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(AdminError::Config(format!("Invalid API root: {}", raw)));
    }
    Ok(url)
}

/// Check a caller-supplied id before it becomes a path segment. Dot
/// segments would be dropped or resolved, so they are refused outright.
fn id_segment<'a>(id: &'a str, what: &str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() || id == "." || id == ".." {
        return Err(AdminError::Validation(format!("Invalid {} id", what)));
    }
    Ok(id)
}

/// HTTP status text, used when a failed response carries no message.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Turn a raw response into an envelope, or the error it represents.
///
/// Non-2xx is a failure whatever the body says. Its message comes from the
/// JSON `message`/`error` field when present, else the HTTP status text.
/// A 2xx body with `success: false` is a failure too.
fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    what: &str,
) -> Result<ApiEnvelope<T>> {
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status_text(status));
        return Err(AdminError::backend(Some(status.as_u16()), message));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_slice(body)
        .map_err(|e| AdminError::Decode(format!("{} response: {}", what, e)))?;

    if !envelope.success {
        let message = envelope
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("{} was not successful", what));
        return Err(AdminError::backend(Some(status.as_u16()), message));
    }

    Ok(envelope)
}

fn require_data<T>(envelope: ApiEnvelope<T>, what: &str) -> Result<T> {
    envelope
        .data
        .ok_or_else(|| AdminError::Decode(format!("{} response has no data", what)))
}
