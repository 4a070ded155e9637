use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use marquee_core::payment::{PaymentGateway, PaymentRedirect};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PayError {
    #[error("payment provider request failed: {0}")]
    Http(String),

    #[error("payment provider rejected the request: {code} {message}")]
    Provider { code: i64, message: String },

    #[error("signing key rejected")]
    Key,
}

/// Wallet provider credentials and endpoints, loaded from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

pub(crate) fn hmac_hex(secret: &str, payload: &str) -> Result<String, PayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PayError::Key)?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    partner_code: &'a str,
    access_key: &'a str,
    request_id: &'a str,
    amount: i64,
    order_id: &'a str,
    order_info: &'a str,
    redirect_url: &'a str,
    ipn_url: &'a str,
    extra_data: &'a str,
    request_type: &'a str,
    signature: &'a str,
    lang: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default)]
    pay_url: String,
    result_code: i64,
    #[serde(default)]
    message: String,
}

/// Wallet-redirect payment gateway. The create request is signed with
/// HMAC-SHA256 over the provider's canonical key=value string; field order
/// in that string is fixed by the provider and must not change.
pub struct MomoGateway {
    config: MomoConfig,
    http: reqwest::Client,
}

impl MomoGateway {
    pub fn new(config: MomoConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn create_signature(
        &self,
        amount: i64,
        order_id: &str,
        order_info: &str,
        request_id: &str,
        extra_data: &str,
    ) -> Result<String, PayError> {
        let canonical = format!(
            "accessKey={}&amount={}&extraData={}&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType=captureWallet",
            self.config.access_key,
            amount,
            extra_data,
            self.config.ipn_url,
            order_id,
            order_info,
            self.config.partner_code,
            self.config.redirect_url,
            request_id,
        );
        hmac_hex(&self.config.secret_key, &canonical)
    }

    async fn lodge(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_info: &str,
    ) -> Result<PaymentRedirect, PayError> {
        // A fresh order id per attempt lets a retried payment coexist with
        // an abandoned one at the provider.
        let order_id = format!("{}-{}", booking_id, Utc::now().timestamp_millis());
        let request_id = Uuid::new_v4().to_string();
        let extra_data = "";
        let signature =
            self.create_signature(amount, &order_id, order_info, &request_id, extra_data)?;

        let body = CreateRequest {
            partner_code: &self.config.partner_code,
            access_key: &self.config.access_key,
            request_id: &request_id,
            amount,
            order_id: &order_id,
            order_info,
            redirect_url: &self.config.redirect_url,
            ipn_url: &self.config.ipn_url,
            extra_data,
            request_type: "captureWallet",
            signature: &signature,
            lang: "en",
        };

        let response: CreateResponse = self
            .http
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| PayError::Http(err.to_string()))?
            .json()
            .await
            .map_err(|err| PayError::Http(err.to_string()))?;

        if response.result_code != 0 {
            return Err(PayError::Provider {
                code: response.result_code,
                message: response.message,
            });
        }

        tracing::info!(%booking_id, order_id, "payment request lodged");
        Ok(PaymentRedirect {
            pay_url: response.pay_url,
            request_id,
            transaction_ref: order_id,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PaymentGateway for MomoGateway {
    async fn create_payment(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_info: &str,
    ) -> Result<PaymentRedirect, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.lodge(booking_id, amount, order_info).await?)
    }
}

/// Gateway stub that never leaves the process. Tests and local runs point
/// the booking flow at this instead of the real provider.
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(
        &self,
        booking_id: Uuid,
        _amount: i64,
        _order_info: &str,
    ) -> Result<PaymentRedirect, Box<dyn std::error::Error + Send + Sync>> {
        let order_id = format!("{}-{}", booking_id, Utc::now().timestamp_millis());
        Ok(PaymentRedirect {
            pay_url: format!("https://pay.invalid/{order_id}"),
            request_id: Uuid::new_v4().to_string(),
            transaction_ref: order_id,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MomoConfig {
        MomoConfig {
            partner_code: "MARQUEE".into(),
            access_key: "access".into(),
            secret_key: "secret".into(),
            endpoint: "https://payment.invalid/v2/gateway/api/create".into(),
            redirect_url: "https://marquee.invalid/return".into(),
            ipn_url: "https://marquee.invalid/v1/payments/momo/ipn".into(),
        }
    }

    #[test]
    fn create_signature_is_stable_for_fixed_inputs() {
        let gateway = MomoGateway::new(config());
        let first = gateway
            .create_signature(2250, "order-1", "Tickets", "req-1", "")
            .unwrap();
        let second = gateway
            .create_signature(2250, "order-1", "Tickets", "req-1", "")
            .unwrap();
        assert_eq!(first, second);
        // hex-encoded HMAC-SHA256
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn create_signature_covers_the_amount() {
        let gateway = MomoGateway::new(config());
        let a = gateway
            .create_signature(2250, "order-1", "Tickets", "req-1", "")
            .unwrap();
        let b = gateway
            .create_signature(2251, "order-1", "Tickets", "req-1", "")
            .unwrap();
        assert_ne!(a, b);
    }
}
