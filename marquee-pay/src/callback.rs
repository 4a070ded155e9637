use hmac::{Hmac, Mac};
use marquee_core::CoreError;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Provider-to-merchant payment notification, as posted to the IPN
/// endpoint. Field names follow the provider's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpnPayload {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

impl IpnPayload {
    /// Result code zero means the customer paid; anything else is a
    /// failure or cancellation.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Verifies the HMAC signature on incoming payment notifications before
/// any booking transition runs.
#[derive(Clone)]
pub struct CallbackVerifier {
    access_key: String,
    secret_key: String,
}

impl CallbackVerifier {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    fn canonical(&self, payload: &IpnPayload) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.access_key,
            payload.amount,
            payload.extra_data,
            payload.message,
            payload.order_id,
            payload.order_info,
            payload.order_type,
            payload.partner_code,
            payload.pay_type,
            payload.request_id,
            payload.response_time,
            payload.result_code,
            payload.trans_id,
        )
    }

    /// Signature the provider would attach to this payload. Used when
    /// composing outbound notifications and by test fixtures.
    pub fn sign(&self, payload: &IpnPayload) -> Result<String, CoreError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| CoreError::InvalidSignature)?;
        mac.update(self.canonical(payload).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Recompute the signature over the provider's canonical field order
    /// and compare in constant time. An unverifiable payload is
    /// indistinguishable from a tampered one.
    pub fn verify(&self, payload: &IpnPayload) -> Result<(), CoreError> {
        let canonical = self.canonical(payload);
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| CoreError::InvalidSignature)?;
        mac.update(canonical.as_bytes());

        let claimed = hex::decode(&payload.signature).map_err(|_| CoreError::InvalidSignature)?;
        mac.verify_slice(&claimed)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momo::hmac_hex;

    const ACCESS: &str = "access";
    const SECRET: &str = "secret";

    fn signed_payload(result_code: i64) -> IpnPayload {
        let mut payload = IpnPayload {
            partner_code: "MARQUEE".into(),
            order_id: "booking-1-1714000000000".into(),
            request_id: "req-1".into(),
            amount: 2250,
            order_info: "Tickets".into(),
            order_type: "momo_wallet".into(),
            trans_id: 99887766,
            result_code,
            message: "Successful.".into(),
            pay_type: "qr".into(),
            response_time: 1714000000123,
            extra_data: String::new(),
            signature: String::new(),
        };
        let canonical = format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            ACCESS,
            payload.amount,
            payload.extra_data,
            payload.message,
            payload.order_id,
            payload.order_info,
            payload.order_type,
            payload.partner_code,
            payload.pay_type,
            payload.request_id,
            payload.response_time,
            payload.result_code,
            payload.trans_id,
        );
        payload.signature = hmac_hex(SECRET, &canonical).unwrap();
        payload
    }

    #[test]
    fn genuine_payload_verifies() {
        let verifier = CallbackVerifier::new(ACCESS, SECRET);
        let payload = signed_payload(0);
        verifier.verify(&payload).unwrap();
        assert!(payload.is_success());
    }

    #[test]
    fn tampered_amount_is_rejected() {
        let verifier = CallbackVerifier::new(ACCESS, SECRET);
        let mut payload = signed_payload(0);
        payload.amount += 1;
        assert!(matches!(
            verifier.verify(&payload),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = CallbackVerifier::new(ACCESS, "other-secret");
        let payload = signed_payload(0);
        assert!(matches!(
            verifier.verify(&payload),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_signature_is_rejected_not_a_panic() {
        let verifier = CallbackVerifier::new(ACCESS, SECRET);
        let mut payload = signed_payload(0);
        payload.signature = "not-hex".into();
        assert!(matches!(
            verifier.verify(&payload),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn nonzero_result_code_is_a_failure_outcome() {
        let payload = signed_payload(1006);
        assert!(!payload.is_success());
    }
}
