pub mod encode;
pub mod exposition;
pub mod json;

use chrono::{DateTime, Utc};
use promdash_core::model::MetricsPayload;
use tracing::debug;

pub use encode::encode_exposition;
pub use exposition::{ExpositionDecoder, decode_exposition};
pub use json::normalize_json;

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub commit_untyped: bool,
}

/// Normalizes a raw scrape body: JSON first, exposition text when the body
/// is not valid JSON.
pub fn normalize_body(body: &[u8], options: DecodeOptions, now: DateTime<Utc>) -> MetricsPayload {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => normalize_json(&value, now),
        Err(err) => {
            debug!(error = %err, "body is not JSON; decoding as exposition text");
            let text = String::from_utf8_lossy(body);
            let metrics = ExpositionDecoder::new()
                .commit_untyped(options.commit_untyped)
                .decode(&text);
            MetricsPayload::new(metrics, now)
        }
    }
}
