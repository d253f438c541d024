//! Request/response types for the HTTP surface.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod draft;
pub mod game;
pub mod guess;
pub mod health;
pub mod identity;
pub mod results;
pub mod validation;

/// Render an epoch-milliseconds timestamp as RFC 3339 for API payloads.
pub fn format_epoch_ms(millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_ms_formats_as_rfc3339() {
        assert_eq!(format_epoch_ms(0), "1970-01-01T00:00:00Z");
        assert!(format_epoch_ms(1_700_000_000_000).starts_with("2023-11-14T"));
    }
}
