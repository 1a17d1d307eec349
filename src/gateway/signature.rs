//! Slack request signature verification.
//!
//! Slack signs every request with
//! `v0=hex(HMAC-SHA256(signing_secret, "v0:{timestamp}:{body}"))` and sends
//! the result in `X-Slack-Signature`, the timestamp in
//! `X-Slack-Request-Timestamp`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ChannelError;

type HmacSha256 = Hmac<Sha256>;

/// Requests older (or newer) than this many seconds are rejected.
pub const MAX_REQUEST_AGE_SECS: u64 = 60 * 5;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const VERSION: &str = "v0";

/// Compute the `v0=` signature for a request.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, ChannelError> {
    let mac = keyed_mac(secret, timestamp, body)?;
    Ok(format!("{}={}", VERSION, hex::encode(mac.finalize().into_bytes())))
}

/// Verify a request against `secret` as of `now` (Unix seconds).
pub fn verify_slack_signature(
    secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now: i64,
) -> Result<(), ChannelError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| ChannelError::SignatureInvalid("malformed timestamp".to_string()))?;

    let age = now.checked_sub(sent_at).map(i64::unsigned_abs);
    if !matches!(age, Some(age) if age <= MAX_REQUEST_AGE_SECS) {
        return Err(ChannelError::SignatureInvalid("stale request".to_string()));
    }

    let provided = signature
        .strip_prefix("v0=")
        .ok_or_else(|| ChannelError::SignatureInvalid("unsupported signature version".to_string()))?;
    let provided = hex::decode(provided)
        .map_err(|_| ChannelError::SignatureInvalid("signature is not hex".to_string()))?;

    keyed_mac(secret, timestamp, body)?
        .verify_slice(&provided)
        .map_err(|_| ChannelError::SignatureInvalid("signature mismatch".to_string()))
}

fn keyed_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, ChannelError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ChannelError::SignatureInvalid(e.to_string()))?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyz&command=%2Fdailyreport&channel_id=C1";

    #[test]
    fn test_valid_signature() {
        let sig = sign(SECRET, "1531420618", BODY).unwrap();
        assert!(sig.starts_with("v0="));
        assert_eq!(sig.len(), 3 + 64);
        verify_slack_signature(SECRET, "1531420618", &sig, BODY, 1531420618 + 10).unwrap();
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign(SECRET, "1531420618", BODY).unwrap();
        let err = verify_slack_signature(SECRET, "1531420618", &sig, b"command=%2Fother", 1531420618)
            .unwrap_err();
        assert!(matches!(err, ChannelError::SignatureInvalid(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let sig = sign("another-secret", "1531420618", BODY).unwrap();
        assert!(verify_slack_signature(SECRET, "1531420618", &sig, BODY, 1531420618).is_err());
    }

    #[test]
    fn test_stale_request_rejected() {
        let sig = sign(SECRET, "1531420618", BODY).unwrap();
        let err = verify_slack_signature(SECRET, "1531420618", &sig, BODY, 1531420618 + 301)
            .unwrap_err();
        assert!(err.to_string().contains("stale"));
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for timestamp in [i64::MIN.to_string(), i64::MAX.to_string()] {
            let err = verify_slack_signature(SECRET, &timestamp, "v0=00", BODY, 1_700_000_000)
                .unwrap_err();
            assert!(err.to_string().contains("stale"), "{}: {}", timestamp, err);
        }
        let err = verify_slack_signature(SECRET, "-9223372036854775808", "v0=00", BODY, i64::MAX)
            .unwrap_err();
        assert!(err.to_string().contains("stale"));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        assert!(verify_slack_signature(SECRET, "yesterday", "v0=00", BODY, 0).is_err());
        assert!(verify_slack_signature(SECRET, "10", "v1=abcd", BODY, 10).is_err());
        assert!(verify_slack_signature(SECRET, "10", "v0=zz", BODY, 10).is_err());
    }
}
