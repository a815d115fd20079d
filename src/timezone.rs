//! Timezone utilities for date grouping
//!
//! The engine is timezone-agnostic: callers pass the zone used for daily and
//! monthly grouping keys. This module supplies the two conveniences callers
//! need to produce that zone: system detection and string parsing.

use crate::error::{LedgerError, Result};
use chrono_tz::Tz;
use std::str::FromStr;
use tracing::debug;

/// Parse a timezone from an optional user-supplied string
///
/// `None` falls back to the detected system timezone.
pub fn parse_timezone(timezone_str: Option<&str>) -> Result<Tz> {
    match timezone_str {
        Some(tz_str) => {
            Tz::from_str(tz_str).map_err(|_| LedgerError::InvalidTimezone(tz_str.to_string()))
        }
        None => Ok(system_timezone()),
    }
}

/// Detect the system's local timezone, falling back to UTC
pub fn system_timezone() -> Tz {
    // The TZ environment variable takes precedence when it names a zone
    if let Ok(tz_str) = std::env::var("TZ") {
        if let Ok(tz) = Tz::from_str(&tz_str) {
            debug!("Using timezone from TZ environment variable: {}", tz_str);
            return tz;
        }
    }

    match iana_time_zone::get_timezone() {
        Ok(tz_str) => match Tz::from_str(&tz_str) {
            Ok(tz) => {
                debug!("Using system timezone: {}", tz_str);
                tz
            }
            Err(_) => {
                debug!("Could not parse system timezone '{}', using UTC", tz_str);
                Tz::UTC
            }
        },
        Err(e) => {
            debug!("Could not detect system timezone: {:?}, using UTC", e);
            Tz::UTC
        }
    }
}
