//! # STK Callback Envelope
//!
//! Serde model of the asynchronous result notification the gateway posts
//! back after an STK push:
//!
//! ```json
//! { "Body": { "stkCallback": {
//!     "ResultCode": 0,
//!     "ResultDesc": "...",
//!     "CheckoutRequestID": "...",
//!     "CallbackMetadata": { "Item": [ {"Name": "...", "Value": ...}, ... ] }
//! } } }
//! ```
//!
//! On success the metadata items carry `Amount`, `MpesaReceiptNumber`,
//! `PhoneNumber` and `BillRefNumber` (the caller-supplied order reference).
//! Failure callbacks usually omit the metadata block entirely.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub item: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl CallbackEnvelope {
    pub fn stk_callback(&self) -> &StkCallback {
        &self.body.stk_callback
    }
}

impl StkCallback {
    /// ResultCode 0 signals a successful payment
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn item_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Amount confirmed by the gateway, when present
    pub fn amount(&self) -> Option<Decimal> {
        value_to_decimal(self.item_value("Amount")?)
    }

    /// Gateway receipt number for a successful payment
    pub fn receipt(&self) -> Option<String> {
        value_to_string(self.item_value("MpesaReceiptNumber")?)
    }

    /// Payer phone number as reported by the gateway
    pub fn phone_number(&self) -> Option<String> {
        value_to_string(self.item_value("PhoneNumber")?)
    }

    /// Caller-supplied order reference (`AccountReference` round-tripped
    /// through the gateway as `BillRefNumber`)
    pub fn bill_ref(&self) -> Option<i64> {
        match self.item_value("BillRefNumber")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// First metadata value, if any. Failure callbacks sometimes carry only
    /// the payer number, unnamed in a single item.
    pub fn first_item_value(&self) -> Option<String> {
        let item = self.callback_metadata.as_ref()?.item.first()?;
        value_to_string(item.value.as_ref()?)
    }
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success_body() -> Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_010220241200001",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 250.00 },
                            { "Name": "MpesaReceiptNumber", "Value": "QGR7TEST01" },
                            { "Name": "TransactionDate", "Value": 20240102030405_u64 },
                            { "Name": "PhoneNumber", "Value": 254712345678_u64 },
                            { "Name": "BillRefNumber", "Value": "42" }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_success_envelope() {
        let envelope: CallbackEnvelope = serde_json::from_value(success_body()).unwrap();
        let callback = envelope.stk_callback();

        assert!(callback.is_success());
        assert_eq!(
            callback.checkout_request_id.as_deref(),
            Some("ws_CO_010220241200001")
        );
        assert_eq!(callback.amount(), Some(Decimal::new(25000, 2)));
        assert_eq!(callback.receipt().as_deref(), Some("QGR7TEST01"));
        assert_eq!(callback.phone_number().as_deref(), Some("254712345678"));
        assert_eq!(callback.bill_ref(), Some(42));
    }

    #[test]
    fn test_parse_failure_envelope_without_metadata() {
        let body = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-2",
                    "CheckoutRequestID": "ws_CO_010220241200002",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let envelope: CallbackEnvelope = serde_json::from_value(body).unwrap();
        let callback = envelope.stk_callback();

        assert!(!callback.is_success());
        assert_eq!(callback.amount(), None);
        assert_eq!(callback.receipt(), None);
        assert_eq!(callback.bill_ref(), None);
        assert_eq!(
            callback.result_desc.as_deref(),
            Some("Request cancelled by user")
        );
    }

    #[test]
    fn test_numeric_bill_ref_accepted() {
        let mut body = success_body();
        body["Body"]["stkCallback"]["CallbackMetadata"]["Item"][4] =
            json!({ "Name": "BillRefNumber", "Value": 42 });
        let envelope: CallbackEnvelope = serde_json::from_value(body).unwrap();
        assert_eq!(envelope.stk_callback().bill_ref(), Some(42));
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        // Missing the Body wrapper entirely
        let result: Result<CallbackEnvelope, _> =
            serde_json::from_value(json!({ "stkCallback": { "ResultCode": 0 } }));
        assert!(result.is_err());

        // ResultCode is mandatory
        let result: Result<CallbackEnvelope, _> =
            serde_json::from_value(json!({ "Body": { "stkCallback": {} } }));
        assert!(result.is_err());
    }
}
