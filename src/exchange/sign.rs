use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FlareError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signs exchange requests with HMAC-SHA256 over
/// `method + timestamp + path + query_string + body`, hex-encoded.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    api_secret: String,
}

impl RequestSigner {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Current timestamp in whole seconds. The exchange rejects stale
    /// timestamps, so every attempt signs a fresh one.
    pub fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string()
    }

    /// Build the message to sign. `query_string` carries its leading `?`
    /// when non-empty; `path` is the full request path including the API
    /// version prefix.
    pub fn signature_payload(
        method: &str,
        timestamp: &str,
        path: &str,
        query_string: &str,
        body: &str,
    ) -> String {
        format!("{}{}{}{}{}", method, timestamp, path, query_string, body)
    }

    /// Create the hex-encoded HMAC-SHA256 signature
    pub fn sign(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| FlareError::Signature(format!("HMAC init failed: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build authentication headers for one request attempt
    pub fn build_headers(
        &self,
        method: &str,
        path: &str,
        query_string: &str,
        body: &str,
    ) -> Result<HeaderMap> {
        let timestamp = Self::timestamp();
        let message = Self::signature_payload(method, &timestamp, path, query_string, body);
        let signature = self.sign(&message)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| FlareError::Signature(format!("invalid API key header: {}", e)))?,
        );
        headers.insert(
            "timestamp",
            HeaderValue::from_str(&timestamp)
                .map_err(|e| FlareError::Signature(format!("invalid timestamp header: {}", e)))?,
        );
        headers.insert(
            "signature",
            HeaderValue::from_str(&signature)
                .map_err(|e| FlareError::Signature(format!("invalid signature header: {}", e)))?,
        );

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_payload_layout() {
        let message = RequestSigner::signature_payload(
            "GET",
            "1700000000",
            "/v2/orders",
            "?product_ids=27&states=open",
            "",
        );
        assert_eq!(message, "GET1700000000/v2/orders?product_ids=27&states=open");

        let with_body = RequestSigner::signature_payload(
            "POST",
            "1700000000",
            "/v2/orders",
            "",
            r#"{"product_id":27}"#,
        );
        assert_eq!(with_body, r#"POST1700000000/v2/orders{"product_id":27}"#);
    }

    #[test]
    fn hex_signature_matches_known_vector() {
        let signer = RequestSigner::new("key".to_string(), "test-secret".to_string());

        let sig = signer
            .sign("GET1700000000/v2/orders?product_ids=27&states=open")
            .unwrap();
        assert_eq!(
            sig,
            "b499b8b6ec6822d069def0052d872b4448059b093bc1855861248b0d88537465"
        );

        let sig = signer
            .sign(r#"POST1700000000/v2/orders{"product_id":27}"#)
            .unwrap();
        assert_eq!(
            sig,
            "3ecd309e6cdfd20c19ee4e2554219cfdebb3527c250838cac9006e9ec86ff162"
        );
    }

    #[test]
    fn headers_carry_key_timestamp_signature() {
        let signer = RequestSigner::new("my-key".to_string(), "secret".to_string());
        let headers = signer.build_headers("GET", "/v2/positions", "", "").unwrap();

        assert_eq!(headers.get("api-key").unwrap(), "my-key");
        assert!(headers.contains_key("timestamp"));
        assert!(headers.contains_key("signature"));
        // hex-encoded SHA-256 output
        assert_eq!(headers.get("signature").unwrap().len(), 64);
    }
}
