//! Rollup aggregation: daily, monthly, and per-session summaries
//!
//! Pure folds over the resolved-event stream. Grouping keys come from event
//! timestamps converted to the caller-supplied timezone; the engine itself
//! is timezone-agnostic. Events arrive timestamp-sorted from the loader and
//! groups live in BTreeMaps, so the fold order is fixed and re-aggregating
//! the same snapshot yields bit-identical totals.

use crate::types::{DailyDate, ISOTimestamp, ModelName, ResolvedUsage, SessionId, TokenCounts};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Daily usage summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// Date of usage in the grouping timezone
    pub date: DailyDate,
    /// Token counts for the day
    pub tokens: TokenCounts,
    /// Total cost for the day in USD
    pub total_cost: f64,
    /// Number of messages (events) during the day
    pub message_count: usize,
    /// Unique models used during the day, sorted
    pub models_used: Vec<String>,
    /// Earliest event timestamp in the day
    pub first_timestamp: ISOTimestamp,
    /// Latest event timestamp in the day
    pub last_timestamp: ISOTimestamp,
    /// Events that resolved without pricing
    pub unpriced_count: usize,
}

/// Monthly usage summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyUsage {
    /// Year and month in YYYY-MM format, in the grouping timezone
    pub month: String,
    /// Total token counts for the month
    pub tokens: TokenCounts,
    /// Total cost for the month in USD
    pub total_cost: f64,
    /// Number of messages (events) during the month
    pub message_count: usize,
    /// Number of days with usage in this month
    pub active_days: usize,
}

/// Session usage summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUsage {
    /// Session identifier
    pub session_id: SessionId,
    /// Earliest event timestamp in the session
    pub start_time: ISOTimestamp,
    /// Latest event timestamp in the session
    pub end_time: ISOTimestamp,
    /// Token counts for the session
    pub tokens: TokenCounts,
    /// Total cost for the session in USD
    pub total_cost: f64,
    /// Number of messages (events) in the session
    pub message_count: usize,
    /// Unique models used in the session, sorted
    pub models_used: Vec<String>,
}

/// Grand totals across a set of summaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub tokens: TokenCounts,
    pub total_cost: f64,
    pub message_count: usize,
}

impl Totals {
    /// Totals across resolved events
    pub fn from_events(events: &[ResolvedUsage]) -> Self {
        let mut totals = Self::default();
        for event in events {
            totals.tokens += event.tokens();
            totals.total_cost += event.cost_usd;
            totals.message_count += 1;
        }
        totals
    }

    /// Totals across daily summaries
    pub fn from_daily(daily: &[DailyUsage]) -> Self {
        let mut totals = Self::default();
        for day in daily {
            totals.tokens += day.tokens;
            totals.total_cost += day.total_cost;
            totals.message_count += day.message_count;
        }
        totals
    }

    /// Totals across session summaries
    pub fn from_sessions(sessions: &[SessionUsage]) -> Self {
        let mut totals = Self::default();
        for session in sessions {
            totals.tokens += session.tokens;
            totals.total_cost += session.total_cost;
            totals.message_count += session.message_count;
        }
        totals
    }
}

struct PeriodAccumulator {
    tokens: TokenCounts,
    cost: f64,
    message_count: usize,
    models: BTreeSet<ModelName>,
    first: ISOTimestamp,
    last: ISOTimestamp,
    unpriced_count: usize,
}

impl PeriodAccumulator {
    fn open(event: &ResolvedUsage) -> Self {
        let ts = *event.timestamp();
        let mut acc = Self {
            tokens: TokenCounts::default(),
            cost: 0.0,
            message_count: 0,
            models: BTreeSet::new(),
            first: ts,
            last: ts,
            unpriced_count: 0,
        };
        acc.add(event);
        acc
    }

    fn add(&mut self, event: &ResolvedUsage) {
        let ts = *event.timestamp();
        self.tokens += event.tokens();
        self.cost += event.cost_usd;
        self.message_count += 1;
        self.models.insert(event.event.model.clone());
        if ts < self.first {
            self.first = ts;
        }
        if ts > self.last {
            self.last = ts;
        }
        if event.unpriced {
            self.unpriced_count += 1;
        }
    }

    fn models_sorted(&self) -> Vec<String> {
        self.models.iter().map(|m| m.to_string()).collect()
    }
}

/// Aggregate resolved events by calendar day in the given timezone
pub fn aggregate_daily(events: &[ResolvedUsage], tz: &Tz) -> Vec<DailyUsage> {
    let mut daily_map: BTreeMap<DailyDate, PeriodAccumulator> = BTreeMap::new();

    for event in events {
        let date = DailyDate::from_timestamp_with_tz(event.timestamp(), tz);
        daily_map
            .entry(date)
            .and_modify(|acc| acc.add(event))
            .or_insert_with(|| PeriodAccumulator::open(event));
    }

    daily_map
        .into_iter()
        .map(|(date, acc)| DailyUsage {
            date,
            tokens: acc.tokens,
            total_cost: acc.cost,
            message_count: acc.message_count,
            models_used: acc.models_sorted(),
            first_timestamp: acc.first,
            last_timestamp: acc.last,
            unpriced_count: acc.unpriced_count,
        })
        .collect()
}

/// Roll daily summaries up into monthly summaries
pub fn aggregate_monthly(daily: &[DailyUsage]) -> Vec<MonthlyUsage> {
    let mut monthly_map: BTreeMap<String, (TokenCounts, f64, usize, usize)> = BTreeMap::new();

    for day in daily {
        let month = day.date.format("%Y-%m");
        let entry = monthly_map
            .entry(month)
            .or_insert((TokenCounts::default(), 0.0, 0, 0));
        entry.0 += day.tokens;
        entry.1 += day.total_cost;
        entry.2 += day.message_count;
        entry.3 += 1;
    }

    monthly_map
        .into_iter()
        .map(|(month, (tokens, cost, messages, days))| MonthlyUsage {
            month,
            tokens,
            total_cost: cost,
            message_count: messages,
            active_days: days,
        })
        .collect()
}

/// Aggregate resolved events by session key
///
/// Sessions are returned sorted by start time, ties by session ID.
pub fn aggregate_sessions(events: &[ResolvedUsage]) -> Vec<SessionUsage> {
    let mut session_map: BTreeMap<SessionId, PeriodAccumulator> = BTreeMap::new();

    for event in events {
        session_map
            .entry(event.event.session_id.clone())
            .and_modify(|acc| acc.add(event))
            .or_insert_with(|| PeriodAccumulator::open(event));
    }

    let mut sessions: Vec<SessionUsage> = session_map
        .into_iter()
        .map(|(session_id, acc)| SessionUsage {
            session_id,
            start_time: acc.first,
            end_time: acc.last,
            tokens: acc.tokens,
            total_cost: acc.cost,
            message_count: acc.message_count,
            models_used: acc.models_sorted(),
        })
        .collect();

    sessions.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    sessions
}
