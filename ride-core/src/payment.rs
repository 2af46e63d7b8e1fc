use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::BoxError;

type HmacSha256 = Hmac<Sha256>;

/// An order opened with the payment provider ahead of checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub order_id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, BoxError>;
}

/// Provider callback proving a payment was captured for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentProof {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Checks provider signatures: hex HMAC-SHA256 of `order_id|payment_id`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
        // new_from_slice accepts any key length for SHA256
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret).ok()?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Some(mac)
    }

    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        match self.mac(order_id, payment_id) {
            Some(mac) => hex::encode(mac.finalize().into_bytes()),
            None => String::new(),
        }
    }

    /// Malformed hex never verifies.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        let Some(mac) = self.mac(order_id, payment_id) else {
            return false;
        };
        let expected = mac.finalize().into_bytes();
        expected.as_slice().ct_eq(provided.as_slice()).into()
    }

    pub fn verify_proof(&self, proof: &PaymentProof) -> bool {
        self.verify(&proof.order_id, &proof.payment_id, &proof.signature)
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"********")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret";
    const ORDER: &str = "order_9A33XWu170gUtm";
    const PAYMENT: &str = "pay_29QQoUBi66xm2f";
    const KNOWN_SIGNATURE: &str =
        "3260a4f62b64907cfd92766c15dea1480ad753cedc90248b8346f48f243993c1";

    #[test]
    fn test_sign_matches_known_vector() {
        let verifier = SignatureVerifier::new(SECRET);
        assert_eq!(verifier.sign(ORDER, PAYMENT), KNOWN_SIGNATURE);
        assert!(verifier.verify(ORDER, PAYMENT, KNOWN_SIGNATURE));
    }

    #[test]
    fn test_tampered_inputs_fail() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(!verifier.verify(ORDER, "pay_other", KNOWN_SIGNATURE));
        assert!(!verifier.verify(ORDER, PAYMENT, &KNOWN_SIGNATURE[..62]));
        assert!(!SignatureVerifier::new("other").verify(ORDER, PAYMENT, KNOWN_SIGNATURE));
    }

    #[test]
    fn test_malformed_hex_is_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(!verifier.verify(ORDER, PAYMENT, "not-hex"));
        assert!(!verifier.verify(ORDER, PAYMENT, ""));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", SignatureVerifier::new(SECRET));
        assert!(!rendered.contains(SECRET));
    }
}
