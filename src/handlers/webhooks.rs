use axum::{extract::State, http::HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    auth::Principal,
    errors::{AppError, Result},
    handlers::AppState,
    identity,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew between the provider's timestamp header and
/// local time, in seconds.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verifies svix-style webhook signatures: HMAC-SHA256 over
/// `"{id}.{timestamp}.{body}"` keyed with the base64 secret after the
/// `whsec_` prefix. The signature header carries whitespace-separated
/// `v1,<base64>` entries; any matching entry accepts the payload.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|_| AppError::Config("Malformed webhook signing secret".to_string()))?;
        Ok(Self { key })
    }

    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(format!("{}.{}.{}", msg_id, timestamp, body).as_bytes());
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    pub fn verify(
        &self,
        msg_id: &str,
        timestamp: &str,
        signature_header: &str,
        body: &str,
    ) -> Result<()> {
        let timestamp: i64 = timestamp.parse().map_err(|_| AppError::SignatureInvalid)?;
        if (chrono::Utc::now().timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(AppError::SignatureInvalid);
        }

        let expected = self.sign(msg_id, timestamp, body);
        let accepted = signature_header
            .split_whitespace()
            .any(|candidate| candidate == expected);

        if accepted {
            Ok(())
        } else {
            Err(AppError::SignatureInvalid)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClerkEvent {
    #[serde(rename = "type")]
    kind: String,
    data: ClerkEventData,
}

#[derive(Debug, Deserialize)]
struct ClerkEventData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<ClerkEmail>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClerkEmail {
    email_address: String,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::SignatureInvalid)
}

/// Identity-provider push endpoint. Delivery is at-least-once and may arrive
/// out of order relative to interactive logins; both paths funnel into the
/// same idempotent upsert, so the stored row converges either way.
pub async fn clerk(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<&'static str> {
    let verifier = WebhookVerifier::new(&state.config.webhook_signing_secret)?;
    verifier.verify(
        header(&headers, "svix-id")?,
        header(&headers, "svix-timestamp")?,
        header(&headers, "svix-signature")?,
        &body,
    )?;

    let event: ClerkEvent = serde_json::from_str(&body)
        .map_err(|_| AppError::Validation("Malformed event payload".to_string()))?;

    match event.kind.as_str() {
        "user.created" | "user.updated" => {
            let principal = Principal {
                clerk_id: event.data.id,
                emails: event
                    .data
                    .email_addresses
                    .into_iter()
                    .map(|e| e.email_address)
                    .collect(),
                first_name: event.data.first_name,
                last_name: event.data.last_name,
            };
            identity::sync_user(state.database.pool(), &principal).await?;
        }
        other => {
            tracing::debug!(event_type = %other, "Ignoring webhook event");
        }
    }

    Ok("OK")
}
