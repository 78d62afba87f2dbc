//! Outbound webhook dispatch: signing, retries, the circuit breaker, and
//! mandatory SSRF defense on every target URL.

#![forbid(unsafe_code)]

use chrono::Utc;
use clawbuds_proto::{DeliveryOutcome, Webhook, WebhookDelivery, WebhookEnvelope};
use clawbuds_storage::Storage;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::IpAddr;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("url is not http(s): {0}")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    NoHost,
    #[error("url resolves to a disallowed address: {0}")]
    ForbiddenTarget(String),
    #[error("dns resolution failed for {0}")]
    DnsFailure(String),
    #[error(transparent)]
    Storage(#[from] clawbuds_storage::StorageError),
}

/// Hostnames rejected outright regardless of how they resolve.
const HOST_BLOCKLIST: &[&str] = &["metadata.google.internal", "metadata", "localhost"];

/// Checks a candidate webhook target URL against the SSRF policy: only
/// `http`/`https`, no loopback/private/link-local/multicast addresses (v4 or
/// v6), no cloud metadata hostnames, and bracketed IPv6 literals are
/// unwrapped before the range check (the `url` crate already does this via
/// its `Host::Ipv6` variant, so there's no bracket-stripping bug to write).
pub async fn check_url_for_ssrf(url_str: &str) -> Result<(), WebhookError> {
    let url = reqwest::Url::parse(url_str).map_err(|_| WebhookError::NoHost)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(WebhookError::UnsupportedScheme(url.scheme().to_string()));
    }
    let host = url.host_str().ok_or(WebhookError::NoHost)?;
    // `Url::host_str` already strips the brackets from an IPv6 literal.
    let lower = host.to_ascii_lowercase();

    if let Ok(ip) = lower.parse::<IpAddr>() {
        return check_ip(ip);
    }
    if HOST_BLOCKLIST.contains(&lower.as_str()) {
        return Err(WebhookError::ForbiddenTarget(lower));
    }
    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| WebhookError::DnsFailure(lower.clone()))?;
    let mut any = false;
    for addr in addrs {
        any = true;
        check_ip(addr.ip())?;
    }
    if !any {
        return Err(WebhookError::DnsFailure(lower));
    }
    Ok(())
}

/// CGNAT shared address space, RFC 6598 (`100.64.0.0/10`) — used by cloud
/// providers for instance metadata endpoints much like `169.254.169.254`.
fn is_cgnat(v4: std::net::Ipv4Addr) -> bool {
    let octets = v4.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000
}

fn check_ip(ip: IpAddr) -> Result<(), WebhookError> {
    let forbidden = match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4 == std::net::Ipv4Addr::new(169, 254, 169, 254)
                || is_cgnat(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_multicast() || v6.is_unique_local() || v6.is_unicast_link_local() || v6.is_unspecified()
        }
    };
    if forbidden {
        Err(WebhookError::ForbiddenTarget(ip.to_string()))
    } else {
        Ok(())
    }
}

/// Header names set on every outbound delivery attempt.
pub const HEADER_EVENT: &str = "x-clawbuds-event";
pub const HEADER_SIGNATURE: &str = "x-clawbuds-signature";
pub const HEADER_DELIVERY: &str = "x-clawbuds-delivery";
pub const HEADER_TIMESTAMP: &str = "x-clawbuds-timestamp";

/// `sha256=` + hex HMAC-SHA256 of the body, the value receivers compare
/// against `X-ClawBuds-Signature`.
pub fn sign_envelope(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time inbound signature verification, required so a timing
/// side-channel can't be used to forge an incoming webhook call.
pub fn verify_inbound_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(given_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let expected = sign_envelope(secret, body);
    let expected_hex = expected.strip_prefix("sha256=").unwrap_or(&expected);
    let (Ok(expected_bytes), Ok(given_bytes)) = (hex::decode(expected_hex), hex::decode(given_hex)) else {
        return false;
    };
    expected_bytes.ct_eq(&given_bytes).into()
}

/// Delivers one event to one webhook, respecting the retry schedule and
/// updating the circuit breaker state. Call sites own scheduling attempts
/// 2-4 (e.g. via a delayed job); this does a single HTTP attempt per call.
pub struct Dispatcher {
    storage: std::sync::Arc<Storage>,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(storage: std::sync::Arc<Storage>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(clawbuds_proto::DELIVERY_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builds with a flat timeout");
        Self { storage, client }
    }

    /// One delivery attempt. `attempt` is 1-indexed (matches
    /// `RETRY_SCHEDULE_SECS`'s "4 attempts total" framing).
    pub async fn attempt_delivery(
        &self,
        webhook: &Webhook,
        event_name: &str,
        data: serde_json::Value,
        attempt: u32,
    ) -> Result<Webhook, WebhookError> {
        let Some(url) = webhook.url.as_deref() else {
            return Ok(webhook.clone());
        };
        check_url_for_ssrf(url).await?;

        let timestamp = Utc::now().timestamp();
        let envelope = WebhookEnvelope { event: event_name.to_string(), timestamp, data };
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        let signature = sign_envelope(&webhook.secret, &body);
        let delivery_id = Uuid::new_v4();

        let result = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .header(HEADER_EVENT, event_name)
            .header(HEADER_SIGNATURE, &signature)
            .header(HEADER_DELIVERY, delivery_id.to_string())
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .body(body)
            .send()
            .await;

        let (outcome, status_code, response_body) = match result {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    (DeliveryOutcome::Success, Some(status.as_u16()), Some(text))
                } else {
                    (DeliveryOutcome::Failed, Some(status.as_u16()), Some(text))
                }
            }
            Err(err) => {
                warn!(webhook_id = %webhook.id, error = %err, "webhook delivery attempt failed");
                (DeliveryOutcome::Failed, None, Some(err.to_string()))
            }
        };

        self.storage
            .create_delivery_record(&WebhookDelivery {
                id: delivery_id,
                webhook_id: webhook.id,
                event: event_name.to_string(),
                attempt,
                outcome,
                status_code,
                response_body,
                created_at: Utc::now(),
            })
            .await?;

        let updated = self.storage.record_delivery_outcome(webhook.id, outcome, status_code).await?;
        if !updated.active && webhook.active {
            info!(webhook_id = %webhook.id, "webhook deactivated by circuit breaker");
        }
        Ok(updated)
    }

    /// Runs the full retry schedule synchronously (test/offline use); in
    /// production the scheduler spaces attempts 2-4 across real time instead
    /// of sleeping a live task.
    pub async fn deliver_with_retries(
        &self,
        webhook: &Webhook,
        event_name: &str,
        data: serde_json::Value,
    ) -> Result<Webhook, WebhookError> {
        let mut current = webhook.clone();
        for (i, delay) in std::iter::once(0).chain(clawbuds_proto::RETRY_SCHEDULE_SECS).enumerate() {
            if delay > 0 {
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
            current = self.attempt_delivery(&current, event_name, data.clone(), (i + 1) as u32).await?;
            if !current.active {
                break;
            }
            let last_outcome_success = current.failure_count == 0;
            if last_outcome_success {
                break;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrips() {
        let sig = sign_envelope("s3cr3t", b"payload");
        assert!(sig.starts_with("sha256="));
        assert!(verify_inbound_signature("s3cr3t", b"payload", &sig));
        assert!(!verify_inbound_signature("s3cr3t", b"tampered", &sig));
        assert!(!verify_inbound_signature("wrong", b"payload", &sig));
    }

    #[test]
    fn signature_without_prefix_is_rejected() {
        let sig = sign_envelope("s3cr3t", b"payload");
        let bare = sig.strip_prefix("sha256=").unwrap();
        assert!(!verify_inbound_signature("s3cr3t", b"payload", bare));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = check_url_for_ssrf("ftp://example.com/x").await.unwrap_err();
        assert!(matches!(err, WebhookError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn rejects_ipv4_private_literal() {
        let err = check_url_for_ssrf("http://127.0.0.1:8080/hook").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }

    #[tokio::test]
    async fn rejects_cloud_metadata_literal() {
        let err = check_url_for_ssrf("http://169.254.169.254/latest").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }

    #[tokio::test]
    async fn rejects_unspecified_address() {
        let err = check_url_for_ssrf("http://0.0.0.0/").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }

    #[tokio::test]
    async fn rejects_cgnat_range() {
        let err = check_url_for_ssrf("http://100.64.0.1/").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }

    #[tokio::test]
    async fn rejects_bracketed_ipv6_loopback() {
        let err = check_url_for_ssrf("http://[::1]:8080/hook").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }

    #[tokio::test]
    async fn rejects_blocklisted_hostname() {
        let err = check_url_for_ssrf("http://metadata.google.internal/x").await.unwrap_err();
        assert!(matches!(err, WebhookError::ForbiddenTarget(_)));
    }
}
