//! Clients for the external catalogue and booking APIs.
//!
//! The wizard only talks to the [`ServicesApi`] and [`BookingsApi`] traits;
//! [`HttpApiClient`] is the reqwest-backed implementation used by the binary.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{
    BookingPayload, BookingRecord, BookingResponse, ExactServiceQuote, ServiceSummary,
};

pub const UNREACHABLE_MESSAGE: &str =
    "Unable to reach the booking server. It may be offline, please try again in a moment.";
const GENERIC_MESSAGE: &str = "Something went wrong while talking to the booking server.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Text suitable for showing to the person filling in the wizard
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => UNREACHABLE_MESSAGE.to_string(),
            Self::Status { message, .. } | Self::Rejected(message) if !message.trim().is_empty() => {
                message.clone()
            }
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                message: String::new(),
            }
        } else {
            // connect, timeout, TLS and other transport failures
            Self::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait ServicesApi: Send + Sync {
    async fn get_unique_service_ids(&self) -> Result<Vec<ServiceSummary>, ApiError>;

    /// Resolve the priced record for a service on a given date, start time
    /// and state. `Ok(None)` when the catalogue has no such record.
    async fn find_service_by_id(
        &self,
        service_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        state: &str,
    ) -> Result<Option<ExactServiceQuote>, ApiError>;
}

#[async_trait]
pub trait BookingsApi: Send + Sync {
    async fn get_user_bookings(&self) -> Result<Vec<BookingRecord>, ApiError>;

    async fn create_booking(&self, payload: &BookingPayload) -> Result<BookingResponse, ApiError>;
}

/// `{ "data": ... }` envelope used by the list and lookup endpoints
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Pull a human readable message out of an error response body
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[derive(Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body);
            error!(status = %status, message = %message, "booking API returned an error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(ApiError::from)
    }
}

#[async_trait]
impl ServicesApi for HttpApiClient {
    async fn get_unique_service_ids(&self) -> Result<Vec<ServiceSummary>, ApiError> {
        let request = self.client.get(self.url("services/unique-ids"));
        let envelope: DataEnvelope<Vec<ServiceSummary>> = self.send(request).await?;
        debug!(count = envelope.data.len(), "loaded service catalogue");
        Ok(envelope.data)
    }

    async fn find_service_by_id(
        &self,
        service_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        state: &str,
    ) -> Result<Option<ExactServiceQuote>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("services/{service_id}")))
            .query(&[
                ("date", date.format("%Y-%m-%d").to_string()),
                ("time", time.format("%H:%M").to_string()),
                ("state", state.to_string()),
            ]);

        match self
            .send::<DataEnvelope<Option<ExactServiceQuote>>>(request)
            .await
        {
            Ok(envelope) => Ok(envelope.data),
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BookingsApi for HttpApiClient {
    async fn get_user_bookings(&self) -> Result<Vec<BookingRecord>, ApiError> {
        let request = self.client.get(self.url("bookings/user"));
        let envelope: DataEnvelope<Vec<BookingRecord>> = self.send(request).await?;
        Ok(envelope.data)
    }

    async fn create_booking(&self, payload: &BookingPayload) -> Result<BookingResponse, ApiError> {
        let request = self.client.post(self.url("bookings")).json(payload);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn network_errors_get_the_unreachable_message() {
        let err = ApiError::Network("connection refused".into());

        assert!(err.is_network());
        assert_eq!(err.user_message(), UNREACHABLE_MESSAGE);
    }

    #[test]
    fn server_messages_are_passed_through() {
        let err = ApiError::Status {
            status: 400,
            message: "Service not available in TAS".into(),
        };

        assert_eq!(err.user_message(), "Service not available in TAS");
    }

    #[test]
    fn blank_server_messages_fall_back_to_generic_text() {
        let err = ApiError::Status {
            status: 500,
            message: "  ".into(),
        };

        assert_eq!(err.user_message(), GENERIC_MESSAGE);
        assert_eq!(ApiError::Decode("eof".into()).user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn error_body_message_is_extracted() {
        assert_eq!(error_message_from_body(r#"{"message":"Slot taken"}"#), "Slot taken");
        assert_eq!(error_message_from_body(r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message_from_body("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn base_url_is_joined_without_double_slashes() {
        let client =
            HttpApiClient::new("http://localhost:5000/api/", None, Duration::from_secs(5)).unwrap();

        assert_eq!(client.url("/bookings"), "http://localhost:5000/api/bookings");
    }
}
