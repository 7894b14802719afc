//! # M-Pesa Gateway Client
//!
//! Turns an order plus payer phone number into an authorized STK push request
//! against the Daraja API: credential exchange for a bearer token, signature
//! generation, payload construction, and the single outbound push request.
//! No automatic retries; transport failures surface as
//! [`MpesaError::GatewayUnavailable`] and persist nothing.

use super::errors::MpesaError;
use super::phone;
use crate::config::MpesaConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the M-Pesa gateway, configured explicitly at construction.
#[derive(Debug, Clone)]
pub struct MpesaClient {
    http: reqwest::Client,
    config: MpesaConfig,
}

/// Outcome of one STK push request: the raw gateway payload plus the fields
/// reconciliation needs from it.
#[derive(Debug, Clone)]
pub struct StkPush {
    /// Raw gateway response, persisted verbatim on the payment attempt
    pub raw: Value,
    /// Amount actually requested after the gateway-minimum floor
    pub charged_amount: Decimal,
    /// Normalized payer number the push was sent to
    pub phone_number: String,
}

impl StkPush {
    /// Gateway accepted the push; a callback will follow
    pub fn accepted(&self) -> bool {
        self.raw.get("ResponseCode").and_then(Value::as_str) == Some("0")
    }

    /// Gateway-issued correlation id linking this push to its callback
    pub fn checkout_request_id(&self) -> Option<&str> {
        self.raw.get("CheckoutRequestID").and_then(Value::as_str)
    }

    /// Human-readable rejection reason for a failed push
    pub fn error_description(&self) -> String {
        self.raw
            .get("errorMessage")
            .or_else(|| self.raw.get("ResponseDescription"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string()
    }
}

impl MpesaClient {
    /// Build a client from explicit gateway configuration.
    ///
    /// The underlying HTTP client carries a request timeout; a push or token
    /// call that exceeds it fails with `GatewayUnavailable` instead of
    /// hanging a pending attempt forever.
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MpesaError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    /// Exchange client credentials for a short-lived bearer token
    pub async fn access_token(&self) -> Result<String, MpesaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(MpesaError::Auth(format!(
                "Token endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MpesaError::Auth("Token response missing access_token".to_string()))
    }

    /// Deterministic transport-safe request signature:
    /// base64 of `shortcode || passkey || timestamp`.
    pub fn request_signature(shortcode: &str, passkey: &str, timestamp: &str) -> String {
        STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
    }

    /// Gateway timestamp format, `%Y%m%d%H%M%S` in UTC
    pub fn timestamp(now: DateTime<Utc>) -> String {
        now.format("%Y%m%d%H%M%S").to_string()
    }

    /// Amount to request: the order total floored at the gateway minimum.
    ///
    /// The charged amount may exceed the order total only because of this
    /// floor; whatever is sent gets recorded verbatim on the attempt.
    pub fn charged_amount(&self, order_total: Decimal) -> Decimal {
        order_total.max(Decimal::from(self.config.minimum_amount))
    }

    /// Build the STK push JSON body.
    ///
    /// `phone_number` must already be normalized. Amount and phone are
    /// integer-encoded per the gateway contract; the account reference is the
    /// order id as a string.
    pub fn build_push_payload(
        &self,
        order_id: i64,
        charged_amount: Decimal,
        phone_number: &str,
        timestamp: &str,
    ) -> Result<Value, MpesaError> {
        let amount = charged_amount
            .trunc()
            .to_u64()
            .ok_or_else(|| MpesaError::InvalidAmount(charged_amount.to_string()))?;
        let phone: u64 = phone_number
            .parse()
            .map_err(|_| MpesaError::InvalidPhoneNumber(phone_number.to_string()))?;
        let shortcode: u64 = self
            .config
            .shortcode
            .parse()
            .map_err(|_| MpesaError::Config(format!("Non-numeric shortcode: {}", self.config.shortcode)))?;

        let password =
            Self::request_signature(&self.config.shortcode, &self.config.passkey, timestamp);

        Ok(json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": phone,
            "PartyB": shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": order_id.to_string(),
            "TransactionDesc": format!("Payment for Order #{order_id}"),
        }))
    }

    /// Send one STK push for an order.
    ///
    /// Phone normalization happens first, so invalid input is rejected before
    /// any network call. Exactly one outbound request is made; the caller
    /// persists the attempt from the returned raw payload.
    pub async fn stk_push(
        &self,
        order_id: i64,
        order_total: Decimal,
        phone_number: &str,
    ) -> Result<StkPush, MpesaError> {
        let phone_number = phone::normalize(phone_number, &self.config.country_prefix)?;
        let charged_amount = self.charged_amount(order_total);

        let access_token = self.access_token().await?;
        let timestamp = Self::timestamp(Utc::now());
        let payload = self.build_push_payload(order_id, charged_amount, &phone_number, &timestamp)?;

        debug!(order_id, %phone_number, %charged_amount, "Sending STK push");

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let raw: Value = response.json().await.map_err(transport_error)?;

        let push = StkPush {
            raw,
            charged_amount,
            phone_number,
        };
        if !push.accepted() {
            warn!(order_id, description = %push.error_description(), "Gateway declined STK push");
        }

        Ok(push)
    }
}

fn transport_error(e: reqwest::Error) -> MpesaError {
    if e.is_timeout() {
        MpesaError::GatewayUnavailable(format!("Request timed out: {e}"))
    } else {
        MpesaError::GatewayUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_client() -> MpesaClient {
        MpesaClient::new(MpesaConfig {
            shortcode: "174379".to_string(),
            passkey: "testpasskey".to_string(),
            callback_url: "https://example.com/v1/payments/mpesa/callback".to_string(),
            ..MpesaConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_request_signature_encodes_concatenation() {
        let signature = MpesaClient::request_signature("174379", "testpasskey", "20240102030405");
        let decoded = STANDARD.decode(&signature).unwrap();
        assert_eq!(decoded, b"174379testpasskey20240102030405");

        // Deterministic: a pure function of its inputs
        assert_eq!(
            signature,
            MpesaClient::request_signature("174379", "testpasskey", "20240102030405")
        );
    }

    #[test]
    fn test_timestamp_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(MpesaClient::timestamp(now), "20240102030405");
    }

    #[test]
    fn test_charged_amount_floors_at_gateway_minimum() {
        let client = test_client();
        // Order total 8.00, minimum 10 -> sent amount 10
        assert_eq!(
            client.charged_amount(Decimal::new(800, 2)),
            Decimal::from(10u32)
        );
        // Above the floor the total passes through
        assert_eq!(
            client.charged_amount(Decimal::new(25000, 2)),
            Decimal::new(25000, 2)
        );
    }

    #[test]
    fn test_build_push_payload() {
        let client = test_client();
        let charged = client.charged_amount(Decimal::new(800, 2));
        let payload = client
            .build_push_payload(42, charged, "254712345678", "20240102030405")
            .unwrap();

        assert_eq!(payload["BusinessShortCode"], "174379");
        assert_eq!(payload["TransactionType"], "CustomerPayBillOnline");
        assert_eq!(payload["Amount"], 10);
        assert_eq!(payload["PartyA"], 254_712_345_678_u64);
        assert_eq!(payload["PartyB"], 174_379);
        assert_eq!(payload["PhoneNumber"], 254_712_345_678_u64);
        assert_eq!(payload["AccountReference"], "42");
        assert_eq!(payload["TransactionDesc"], "Payment for Order #42");
        assert_eq!(
            payload["Password"],
            MpesaClient::request_signature("174379", "testpasskey", "20240102030405")
        );
    }

    #[test]
    fn test_push_outcome_parsing() {
        let accepted = StkPush {
            raw: json!({
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CheckoutRequestID": "ws_CO_010220241200001",
            }),
            charged_amount: Decimal::from(10u32),
            phone_number: "254712345678".to_string(),
        };
        assert!(accepted.accepted());
        assert_eq!(
            accepted.checkout_request_id(),
            Some("ws_CO_010220241200001")
        );

        let rejected = StkPush {
            raw: json!({
                "ResponseCode": "1",
                "errorMessage": "Invalid Access Token",
            }),
            charged_amount: Decimal::from(10u32),
            phone_number: "254712345678".to_string(),
        };
        assert!(!rejected.accepted());
        assert_eq!(rejected.error_description(), "Invalid Access Token");
        assert_eq!(rejected.checkout_request_id(), None);
    }
}
