//! QR payloads scanned at the point of sale.
//!
//! Two kinds exist: a coupon QR shown by the customer for redemption, and a
//! business QR printed at the counter that opens the business profile. The
//! payload is self-describing so a scanner never mistakes one for the other.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QrPayload {
    Coupon {
        #[serde(rename = "couponId")]
        coupon_id: Uuid,
    },
    Business {
        id: Uuid,
    },
}

#[derive(Debug, Error)]
pub enum QrError {
    #[error("invalid QR payload")]
    InvalidPayload,
    #[error("failed to encode QR payload")]
    Encode(#[source] serde_json::Error),
}

impl QrPayload {
    pub fn coupon(coupon_id: Uuid) -> Self {
        QrPayload::Coupon { coupon_id }
    }

    pub fn business(id: Uuid) -> Self {
        QrPayload::Business { id }
    }

    pub fn encode(&self) -> Result<String, QrError> {
        serde_json::to_string(self).map_err(QrError::Encode)
    }

    /// Parse scanner input. Anything that is not exactly one of the two known
    /// shapes is `InvalidPayload`.
    pub fn decode(raw: &str) -> Result<Self, QrError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(QrError::InvalidPayload);
        }
        serde_json::from_str(raw).map_err(|err| {
            tracing::debug!(error = %err, "rejected QR payload");
            QrError::InvalidPayload
        })
    }

    /// The coupon id, or `InvalidPayload` if a business QR was presented for redemption.
    pub fn expect_coupon(self) -> Result<Uuid, QrError> {
        match self {
            QrPayload::Coupon { coupon_id } => Ok(coupon_id),
            QrPayload::Business { .. } => Err(QrError::InvalidPayload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_payload_matches_wire_format() {
        let id = Uuid::parse_str("5b0c8f3e-8a1d-4e63-9a57-2f4d1f9c0b11").unwrap();
        let encoded = QrPayload::coupon(id).encode().unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"coupon","couponId":"5b0c8f3e-8a1d-4e63-9a57-2f4d1f9c0b11"}"#
        );
    }

    #[test]
    fn business_payload_matches_wire_format() {
        let id = Uuid::parse_str("0e6f5a4b-1111-4c22-8d33-445566778899").unwrap();
        let encoded = QrPayload::business(id).encode().unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"business","id":"0e6f5a4b-1111-4c22-8d33-445566778899"}"#
        );
    }

    #[test]
    fn decode_inverts_encode() {
        for payload in [
            QrPayload::coupon(Uuid::new_v4()),
            QrPayload::business(Uuid::new_v4()),
        ] {
            let decoded = QrPayload::decode(&payload.encode().unwrap()).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn garbage_is_a_typed_error() {
        let inputs = [
            "",
            "   ",
            "not json",
            "42",
            "[]",
            "null",
            r#"{"type":"coupon"}"#,
            r#"{"type":"coupon","couponId":"not-a-uuid"}"#,
            r#"{"type":"coupon","couponId":17}"#,
            r#"{"type":"voucher","couponId":"5b0c8f3e-8a1d-4e63-9a57-2f4d1f9c0b11"}"#,
            r#"{"couponId":"5b0c8f3e-8a1d-4e63-9a57-2f4d1f9c0b11"}"#,
            r#"{"type":"business"}"#,
            "\u{0}\u{1}\u{2}",
            r#"{"type":"coupon","couponId":"5b0c8f3e-8a1d-4e63-9a57-2f4d1f9c0b11""#,
        ];
        for input in inputs {
            assert!(
                matches!(QrPayload::decode(input), Err(QrError::InvalidPayload)),
                "expected InvalidPayload for {input:?}"
            );
        }
    }

    #[test]
    fn business_qr_is_not_redeemable() {
        let payload = QrPayload::business(Uuid::new_v4());
        assert!(matches!(payload.expect_coupon(), Err(QrError::InvalidPayload)));
    }
}
