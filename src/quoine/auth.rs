use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

pub struct QuoineAuth {
    token_id: String,
    token_secret: String,
}

impl QuoineAuth {
    pub fn new(token_id: String, token_secret: String) -> Self {
        Self {
            token_id,
            token_secret,
        }
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Generate the `X-Quoine-Auth` token for a request path.
    ///
    /// Quoine expects a compact JWS (HS256) over `{path, nonce, token_id}`,
    /// where the nonce is the current epoch time in milliseconds.
    pub fn sign_request(&self, path: &str) -> String {
        self.sign_with_nonce(path, Self::nonce())
    }

    fn sign_with_nonce(&self, path: &str, nonce: u64) -> String {
        let header = json!({ "typ": "JWT", "alg": "HS256" });
        let payload = json!({
            "path": path,
            "nonce": nonce.to_string(),
            "token_id": self.token_id,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string()),
        );

        let mut mac = HmacSha256::new_from_slice(self.token_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());

        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    /// Current timestamp in milliseconds, used as the per-request nonce.
    pub fn nonce() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }
}
