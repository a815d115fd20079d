//! Core domain types for ccledger
//!
//! Strong typing for the concepts the engine passes between stages: model
//! names, session IDs, timestamps, token counts, cost modes, and the
//! normalized usage event itself.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Strongly-typed model name wrapper
///
/// # Examples
/// ```
/// use ccledger::types::ModelName;
///
/// let model = ModelName::new("claude-3-opus");
/// assert_eq!(model.as_str(), "claude-3-opus");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelName(String);

impl ModelName {
    /// Create a new ModelName from any string-like type
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed session ID wrapper
///
/// Session IDs group related usage events together for aggregation and
/// deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// ISO timestamp wrapper for UTC timestamps
///
/// # Examples
/// ```
/// use ccledger::types::ISOTimestamp;
/// use chrono::{TimeZone, Utc};
///
/// let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
/// let timestamp = ISOTimestamp::new(dt);
/// assert_eq!(timestamp.to_daily_date().format("%Y-%m-%d"), "2024-01-15");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ISOTimestamp(DateTime<Utc>);

impl ISOTimestamp {
    /// Create a new ISOTimestamp
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner DateTime
    pub fn inner(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Convert to DailyDate using UTC
    pub fn to_daily_date(&self) -> DailyDate {
        DailyDate::new(self.0.date_naive())
    }

    /// Convert to DailyDate using the specified timezone
    pub fn to_daily_date_with_tz(&self, tz: &Tz) -> DailyDate {
        DailyDate::new(self.0.with_timezone(tz).date_naive())
    }
}

impl AsRef<DateTime<Utc>> for ISOTimestamp {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}

/// Daily date for aggregation
///
/// A calendar date without time information, used as the grouping key for
/// daily rollups after timezone conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailyDate(NaiveDate);

impl DailyDate {
    /// Create a new DailyDate
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Get the inner NaiveDate
    pub fn inner(&self) -> &NaiveDate {
        &self.0
    }

    /// Create from a timestamp using the specified timezone
    pub fn from_timestamp_with_tz(ts: &ISOTimestamp, tz: &Tz) -> Self {
        ts.to_daily_date_with_tz(tz)
    }

    /// Format with a strftime pattern
    pub fn format(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }
}

/// Token counts for usage tracking
///
/// Tracks all token categories consumed by an assistant interaction.
///
/// # Examples
/// ```
/// use ccledger::types::TokenCounts;
///
/// let tokens = TokenCounts::new(100, 50, 10, 5);
/// assert_eq!(tokens.total(), 165);
///
/// let combined = tokens + TokenCounts::new(50, 25, 5, 2);
/// assert_eq!(combined.input_tokens, 150);
/// ```
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenCounts {
    /// Input tokens used
    pub input_tokens: u64,
    /// Output tokens generated
    pub output_tokens: u64,
    /// Cache creation tokens
    pub cache_creation_tokens: u64,
    /// Cache read tokens
    pub cache_read_tokens: u64,
}

impl TokenCounts {
    /// Create new TokenCounts
    pub fn new(
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
        }
    }

    /// Calculate total tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

impl Add for TokenCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cache_creation_tokens: self.cache_creation_tokens + other.cache_creation_tokens,
            cache_read_tokens: self.cache_read_tokens + other.cache_read_tokens,
        }
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
    }
}

/// Cost calculation mode
///
/// Controls where a resolved cost comes from: precomputed values carried in
/// the log, recomputation from tokens, or a strict display-only source.
///
/// # Examples
/// ```
/// use ccledger::types::CostMode;
/// use std::str::FromStr;
///
/// assert_eq!(CostMode::from_str("auto").unwrap(), CostMode::Auto);
/// assert_eq!(CostMode::Calculate.to_string(), "calculate");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostMode {
    /// Use precomputed costs when present and positive, otherwise calculate
    #[default]
    Auto,
    /// Always calculate from tokens, ignoring any precomputed cost
    Calculate,
    /// Always use the precomputed cost, substituting zero when absent
    Display,
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Calculate => write!(f, "calculate"),
            Self::Display => write!(f, "display"),
        }
    }
}

impl std::str::FromStr for CostMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "calculate" => Ok(Self::Calculate),
            "display" => Ok(Self::Display),
            _ => Err(format!("Invalid cost mode: {s}")),
        }
    }
}

/// Per-category USD rates for a model
///
/// All costs are in USD per token. Fields are optional so models without a
/// rate for some category simply contribute zero for that category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    /// Cost per input token in USD
    pub input_cost_per_token: Option<f64>,
    /// Cost per output token in USD
    pub output_cost_per_token: Option<f64>,
    /// Cost per cache creation token in USD
    pub cache_creation_cost_per_token: Option<f64>,
    /// Cost per cache read token in USD
    pub cache_read_cost_per_token: Option<f64>,
}

/// Raw per-message usage block from a JSONL record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUsage {
    /// Input tokens used
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens generated
    #[serde(default)]
    pub output_tokens: u64,
    /// Cache creation tokens
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Cache read tokens
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Raw message data from a JSONL record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    /// Model used, when recorded
    #[serde(default)]
    pub model: Option<String>,
    /// Usage data
    #[serde(default)]
    pub usage: RawUsage,
}

/// Raw JSONL entry as written by the assistant's log writer
///
/// Unknown fields are ignored rather than rejected; the log format grows
/// fields over time and old readers must keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJsonlEntry {
    /// Session ID
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    /// Timestamp (RFC 3339); the one required field
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Message containing model and usage
    #[serde(default)]
    pub message: RawMessage,
    /// Request ID (preferred deduplication key component)
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    /// Current working directory when the event occurred
    #[serde(default)]
    pub cwd: Option<String>,
    /// Pre-calculated cost in USD (snake_case variant)
    #[serde(rename = "cost_usd", default)]
    pub cost_usd: Option<f64>,
    /// Pre-calculated cost in USD (camelCase variant)
    #[serde(rename = "costUSD", default)]
    pub cost_usd_camel: Option<f64>,
    /// Flag indicating this entry records an API error
    #[serde(rename = "isApiErrorMessage", default)]
    pub is_api_error_message: Option<bool>,
}

/// Deduplication identity for a usage event
///
/// When the same logical event appears in more than one log source, only the
/// first occurrence in source-iteration order survives. The request ID is the
/// preferred identity; events logged without one fall back to the
/// (session, timestamp, model) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Identity from the request ID
    Request(SessionId, String),
    /// Fallback identity for events without a request ID
    Fallback(SessionId, ISOTimestamp, ModelName),
}

/// One normalized assistant interaction record
///
/// Produced by the Event Loader from raw JSONL; every downstream stage
/// consumes this shape. Events are immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Session identifier grouping related interactions
    pub session_id: SessionId,
    /// Timestamp of the interaction
    pub timestamp: ISOTimestamp,
    /// Model that served the interaction
    pub model: ModelName,
    /// Project name, derived from the working directory or source path,
    /// used only for grouping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Request ID when the log recorded one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Token counts broken down by category
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Pre-calculated cost in USD, when the log carried one
    pub precomputed_cost: Option<f64>,
    /// Whether this event records an API error
    #[serde(default)]
    pub is_error: bool,
}

impl UsageEvent {
    /// Build a normalized event from a raw JSONL entry
    ///
    /// Returns `None` for records that cannot be normalized: a missing or
    /// unparseable timestamp. Everything else degrades gracefully: a
    /// missing model falls back to `default_model`, a missing session ID
    /// becomes a synthesized one, and negative precomputed costs are
    /// discarded as untrusted.
    pub fn from_raw(
        raw: RawJsonlEntry,
        default_model: &ModelName,
        fallback_project: Option<&str>,
    ) -> Option<Self> {
        let timestamp = raw.timestamp.as_deref()?;
        let timestamp = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(dt) => ISOTimestamp::new(dt.with_timezone(&Utc)),
            Err(_) => return None,
        };

        let model = raw
            .message
            .model
            .filter(|m| !m.is_empty())
            .map(ModelName::new)
            .unwrap_or_else(|| default_model.clone());

        let session_id = raw.session_id.unwrap_or_else(|| {
            format!("generated-{}-{}", timestamp.inner().timestamp(), model)
        });

        // costUSD (camelCase) is the newer field and wins over cost_usd
        let precomputed_cost = raw
            .cost_usd_camel
            .or(raw.cost_usd)
            .filter(|c| c.is_finite() && *c >= 0.0);

        let project = raw
            .cwd
            .as_deref()
            .and_then(|cwd| {
                std::path::Path::new(cwd)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .or_else(|| fallback_project.map(str::to_string));

        Some(Self {
            session_id: SessionId::new(session_id),
            timestamp,
            model,
            project,
            request_id: raw.request_id,
            tokens: TokenCounts {
                input_tokens: raw.message.usage.input_tokens,
                output_tokens: raw.message.usage.output_tokens,
                cache_creation_tokens: raw.message.usage.cache_creation_input_tokens,
                cache_read_tokens: raw.message.usage.cache_read_input_tokens,
            },
            precomputed_cost,
            is_error: raw.is_api_error_message.unwrap_or(false),
        })
    }

    /// Deduplication identity for this event
    pub fn dedup_key(&self) -> DedupKey {
        match &self.request_id {
            Some(req_id) => DedupKey::Request(self.session_id.clone(), req_id.clone()),
            None => DedupKey::Fallback(self.session_id.clone(), self.timestamp, self.model.clone()),
        }
    }
}

/// A usage event with its resolved cost
///
/// Output of the Cost Resolver; immutable once produced. `unpriced` is the
/// visible flag distinguishing a genuinely free event from one whose model
/// had no pricing entry anywhere in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedUsage {
    /// The underlying event
    #[serde(flatten)]
    pub event: UsageEvent,
    /// Resolved cost in USD, always present and non-negative
    pub cost_usd: f64,
    /// True when no pricing could be found and the cost defaulted to zero
    #[serde(default)]
    pub unpriced: bool,
}

impl ResolvedUsage {
    /// Timestamp of the underlying event
    pub fn timestamp(&self) -> &ISOTimestamp {
        &self.event.timestamp
    }

    /// Token counts of the underlying event
    pub fn tokens(&self) -> TokenCounts {
        self.event.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_entry(timestamp: &str) -> RawJsonlEntry {
        RawJsonlEntry {
            session_id: Some("session-1".to_string()),
            timestamp: Some(timestamp.to_string()),
            message: RawMessage {
                model: Some("claude-3-opus".to_string()),
                usage: RawUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                    cache_creation_input_tokens: 10,
                    cache_read_input_tokens: 5,
                },
            },
            request_id: Some("req-1".to_string()),
            cwd: None,
            cost_usd: None,
            cost_usd_camel: None,
            is_api_error_message: None,
        }
    }

    fn default_model() -> ModelName {
        ModelName::new("claude-3-sonnet")
    }

    #[test]
    fn test_token_counts_arithmetic() {
        let tokens1 = TokenCounts::new(100, 50, 10, 5);
        let tokens2 = TokenCounts::new(200, 100, 20, 10);

        let sum = tokens1 + tokens2;
        assert_eq!(sum.input_tokens, 300);
        assert_eq!(sum.output_tokens, 150);
        assert_eq!(sum.cache_creation_tokens, 30);
        assert_eq!(sum.cache_read_tokens, 15);
        assert_eq!(sum.total(), 495);
    }

    #[test]
    fn test_cost_mode_parsing() {
        assert_eq!("auto".parse::<CostMode>().unwrap(), CostMode::Auto);
        assert_eq!(
            "calculate".parse::<CostMode>().unwrap(),
            CostMode::Calculate
        );
        assert_eq!("Display".parse::<CostMode>().unwrap(), CostMode::Display);
        assert!("invalid".parse::<CostMode>().is_err());
    }

    #[test]
    fn test_from_raw_normalizes_fields() {
        let event = UsageEvent::from_raw(
            raw_entry("2024-01-01T00:00:00Z"),
            &default_model(),
            Some("fallback-project"),
        )
        .unwrap();

        assert_eq!(event.session_id.as_str(), "session-1");
        assert_eq!(event.model.as_str(), "claude-3-opus");
        assert_eq!(event.tokens.total(), 165);
        assert_eq!(event.project.as_deref(), Some("fallback-project"));
        assert!(!event.is_error);
    }

    #[test]
    fn test_from_raw_missing_timestamp() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.timestamp = None;
        assert!(UsageEvent::from_raw(raw, &default_model(), None).is_none());

        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.timestamp = Some("not-a-timestamp".to_string());
        assert!(UsageEvent::from_raw(raw, &default_model(), None).is_none());
    }

    #[test]
    fn test_from_raw_model_fallback() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.message.model = None;
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert_eq!(event.model.as_str(), "claude-3-sonnet");
    }

    #[test]
    fn test_from_raw_project_from_cwd() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.cwd = Some("/home/user/projects/my-app".to_string());
        let event = UsageEvent::from_raw(raw, &default_model(), Some("other")).unwrap();
        assert_eq!(event.project.as_deref(), Some("my-app"));
    }

    #[test]
    fn test_from_raw_cost_field_preference() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.cost_usd = Some(0.456);
        raw.cost_usd_camel = Some(0.789);
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert_eq!(event.precomputed_cost, Some(0.789));

        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.cost_usd = Some(0.456);
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert_eq!(event.precomputed_cost, Some(0.456));
    }

    #[test]
    fn test_from_raw_rejects_negative_cost() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.cost_usd_camel = Some(-0.5);
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert_eq!(event.precomputed_cost, None);
    }

    #[test]
    fn test_from_raw_keeps_error_events() {
        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.is_api_error_message = Some(true);
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert!(event.is_error);
    }

    #[test]
    fn test_dedup_key_prefers_request_id() {
        let event = UsageEvent::from_raw(
            raw_entry("2024-01-01T00:00:00Z"),
            &default_model(),
            None,
        )
        .unwrap();
        assert!(matches!(event.dedup_key(), DedupKey::Request(_, _)));

        let mut raw = raw_entry("2024-01-01T00:00:00Z");
        raw.request_id = None;
        let event = UsageEvent::from_raw(raw, &default_model(), None).unwrap();
        assert!(matches!(event.dedup_key(), DedupKey::Fallback(_, _, _)));
    }

    #[test]
    fn test_dedup_key_equality() {
        let a = UsageEvent::from_raw(
            raw_entry("2024-01-01T00:00:00Z"),
            &default_model(),
            None,
        )
        .unwrap();
        let b = a.clone();
        assert_eq!(a.dedup_key(), b.dedup_key());

        // Same request ID in a different session is a different event
        let mut c = a.clone();
        c.session_id = SessionId::new("session-2");
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_daily_date_with_tz() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 2, 30, 0).unwrap();
        let ts = ISOTimestamp::new(dt);

        // 02:30 UTC on the 15th is still the 14th in New York
        let ny: Tz = "America/New_York".parse().unwrap();
        assert_eq!(ts.to_daily_date_with_tz(&ny).format("%Y-%m-%d"), "2024-01-14");
        assert_eq!(ts.to_daily_date().format("%Y-%m-%d"), "2024-01-15");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let line = r#"{"sessionId":"s","timestamp":"2024-01-01T00:00:00Z","message":{"model":"m","usage":{"input_tokens":1}},"someFutureField":{"a":1}}"#;
        let raw: RawJsonlEntry = serde_json::from_str(line).unwrap();
        assert_eq!(raw.session_id.as_deref(), Some("s"));
        assert_eq!(raw.message.usage.input_tokens, 1);
    }
}
