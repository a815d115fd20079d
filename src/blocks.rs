//! Billing-block segmentation
//!
//! Partitions a time-ordered stream of resolved events into fixed-duration
//! billing blocks. A block opens at the timestamp of its first event and
//! nominally runs for the full configured duration even if activity stopped
//! earlier. Activity state is never stored: it is derived from
//! `(blocks, now)` on every pass.

use crate::config::EngineConfig;
use crate::types::{ModelName, ResolvedUsage, TokenCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A fixed-duration billing block
///
/// Invariants: blocks from one segmentation pass are non-overlapping and
/// time-ordered; every non-gap block contains at least one event; at most
/// one block is active: the last one, and only while `now` is inside its
/// window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBlock {
    /// Block start, the timestamp of the first event placed in the block
    pub start_time: DateTime<Utc>,
    /// Block end: `start_time + block_duration`, fixed regardless of when
    /// activity actually stopped (gap blocks end at the next real event)
    pub end_time: DateTime<Utc>,
    /// Events belonging to this block, in time order (empty for gap blocks)
    pub events: Vec<ResolvedUsage>,
    /// Token totals across the block's events
    pub tokens: TokenCounts,
    /// Cost total across the block's events in USD
    pub cost_usd: f64,
    /// Unique models used in this block, sorted
    pub models_used: Vec<String>,
    /// Whether this block is the currently running one
    pub is_active: bool,
    /// Synthetic idle-period placeholder, excluded from all totals
    #[serde(default)]
    pub is_gap: bool,
}

impl UsageBlock {
    /// Number of messages (events) in the block
    pub fn message_count(&self) -> usize {
        self.events.len()
    }

    /// Number of events that resolved without pricing
    pub fn unpriced_count(&self) -> usize {
        self.events.iter().filter(|e| e.unpriced).count()
    }
}

struct BlockAccumulator {
    start_time: DateTime<Utc>,
    events: Vec<ResolvedUsage>,
    tokens: TokenCounts,
    cost_usd: f64,
    models: BTreeSet<ModelName>,
}

impl BlockAccumulator {
    fn open(first: ResolvedUsage) -> Self {
        let mut acc = Self {
            start_time: *first.timestamp().inner(),
            events: Vec::new(),
            tokens: TokenCounts::default(),
            cost_usd: 0.0,
            models: BTreeSet::new(),
        };
        acc.push(first);
        acc
    }

    fn push(&mut self, event: ResolvedUsage) {
        self.tokens += event.tokens();
        self.cost_usd += event.cost_usd;
        self.models.insert(event.event.model.clone());
        self.events.push(event);
    }

    fn last_event_time(&self) -> DateTime<Utc> {
        self.events
            .last()
            .map(|e| *e.timestamp().inner())
            .unwrap_or(self.start_time)
    }

    fn close(self, end_time: DateTime<Utc>) -> UsageBlock {
        UsageBlock {
            start_time: self.start_time,
            end_time,
            events: self.events,
            tokens: self.tokens,
            cost_usd: self.cost_usd,
            models_used: self.models.into_iter().map(|m| m.to_string()).collect(),
            is_active: false,
            is_gap: false,
        }
    }
}

/// Partition time-ascending resolved events into billing blocks
///
/// The first event always opens a block at its own timestamp. A subsequent
/// event closes the current block when its distance from the block start or
/// from the previous event reaches the block duration. After segmentation,
/// only the final block may be active, and only while `now < end_time`.
///
/// Gap blocks are synthesized between real blocks when
/// `config.include_gap_blocks` is set and the idle period exceeds the block
/// duration; they carry no events, contribute to no totals, and are never
/// active.
pub fn segment(
    events: &[ResolvedUsage],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<UsageBlock> {
    debug_assert!(
        events.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()),
        "segment requires time-ascending input"
    );

    let duration = config.block_duration;
    let mut blocks: Vec<UsageBlock> = Vec::new();
    let mut current: Option<BlockAccumulator> = None;

    for event in events {
        let event_time = *event.timestamp().inner();

        let needs_new_block = match &current {
            Some(acc) => {
                event_time - acc.start_time >= duration
                    || event_time - acc.last_event_time() >= duration
            }
            None => true,
        };

        if needs_new_block {
            if let Some(acc) = current.take() {
                let last_time = acc.last_event_time();
                let start = acc.start_time;
                blocks.push(acc.close(start + duration));

                if config.include_gap_blocks && event_time - last_time > duration {
                    blocks.push(UsageBlock {
                        start_time: last_time + duration,
                        end_time: event_time,
                        events: Vec::new(),
                        tokens: TokenCounts::default(),
                        cost_usd: 0.0,
                        models_used: Vec::new(),
                        is_active: false,
                        is_gap: true,
                    });
                }
            }
            current = Some(BlockAccumulator::open(event.clone()));
        } else if let Some(acc) = current.as_mut() {
            acc.push(event.clone());
        }
    }

    if let Some(acc) = current.take() {
        let start = acc.start_time;
        blocks.push(acc.close(start + duration));
    }

    // Active state is derived, never carried over: only the most recently
    // started real block, and only while now is inside its window
    if let Some(last) = blocks.iter_mut().rev().find(|b| !b.is_gap) {
        last.is_active = now >= last.start_time && now < last.end_time;
    }

    blocks
}

/// The currently active block, if any
pub fn active_block(blocks: &[UsageBlock]) -> Option<&UsageBlock> {
    blocks.iter().rev().find(|b| b.is_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ISOTimestamp, SessionId, UsageEvent};
    use chrono::{Duration, TimeZone};

    fn resolved(at: DateTime<Utc>, tokens: TokenCounts, cost: f64) -> ResolvedUsage {
        ResolvedUsage {
            event: UsageEvent {
                session_id: SessionId::new("s1"),
                timestamp: ISOTimestamp::new(at),
                model: ModelName::new("claude-3-opus"),
                project: None,
                request_id: None,
                tokens,
                precomputed_cost: Some(cost),
                is_error: false,
            },
            cost_usd: cost,
            unpriced: false,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_zero_events() {
        let blocks = segment(&[], &EngineConfig::default(), Utc::now());
        assert!(blocks.is_empty());
        assert!(active_block(&blocks).is_none());
    }

    #[test]
    fn test_two_events_within_duration_share_a_block() {
        let events = vec![
            resolved(t0(), TokenCounts::new(100, 50, 0, 0), 0.01),
            resolved(t0() + Duration::hours(2), TokenCounts::new(200, 100, 0, 0), 0.02),
        ];
        let now = t0() + Duration::hours(3);
        let blocks = segment(&events, &EngineConfig::default(), now);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_time, t0());
        assert_eq!(blocks[0].end_time, t0() + Duration::hours(5));
        assert!(blocks[0].is_active);

        // Once now passes the nominal end, the same stream yields no active block
        let later = segment(&events, &EngineConfig::default(), t0() + Duration::hours(5));
        assert!(!later[0].is_active);
    }

    #[test]
    fn test_three_events_five_hour_gaps() {
        let events: Vec<_> = [0, 6, 12]
            .iter()
            .map(|h| resolved(t0() + Duration::hours(*h), TokenCounts::new(100, 0, 0, 0), 0.01))
            .collect();
        let now = t0() + Duration::hours(13);
        let blocks = segment(&events, &EngineConfig::default(), now);

        assert_eq!(blocks.len(), 3);
        assert!(!blocks[0].is_active);
        assert!(!blocks[1].is_active);
        assert!(blocks[2].is_active);
        for (block, h) in blocks.iter().zip([0i64, 6, 12]) {
            assert_eq!(block.start_time, t0() + Duration::hours(h));
            assert_eq!(block.end_time, t0() + Duration::hours(h + 5));
            assert_eq!(block.events.len(), 1);
        }
    }

    #[test]
    fn test_block_boundary_is_inclusive() {
        // An event exactly block_duration after the start opens a new block
        let events = vec![
            resolved(t0(), TokenCounts::new(100, 0, 0, 0), 0.01),
            resolved(t0() + Duration::hours(5), TokenCounts::new(100, 0, 0, 0), 0.01),
        ];
        let blocks = segment(&events, &EngineConfig::default(), t0() + Duration::hours(6));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_short_gaps_stay_in_block() {
        let config = EngineConfig::default().with_block_duration(Duration::hours(5));
        let events = vec![
            resolved(t0(), TokenCounts::new(100, 0, 0, 0), 0.01),
            resolved(t0() + Duration::minutes(30), TokenCounts::new(100, 0, 0, 0), 0.01),
        ];
        let blocks = segment(&events, &config, t0() + Duration::hours(1));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].events.len(), 2);
    }

    #[test]
    fn test_token_and_cost_totals() {
        let events = vec![
            resolved(t0(), TokenCounts::new(1000, 500, 0, 0), 0.05),
            resolved(t0() + Duration::hours(1), TokenCounts::new(2000, 1000, 0, 0), 0.10),
        ];
        let blocks = segment(&events, &EngineConfig::default(), t0());

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tokens.input_tokens, 3000);
        assert_eq!(blocks[0].tokens.output_tokens, 1500);
        assert!((blocks[0].cost_usd - 0.15).abs() < 0.01);
        assert_eq!(blocks[0].message_count(), 2);
    }

    #[test]
    fn test_gap_block_synthesis() {
        let config = EngineConfig::default().with_gap_blocks(true);
        let events = vec![
            resolved(t0(), TokenCounts::new(100, 0, 0, 0), 0.01),
            resolved(t0() + Duration::hours(9), TokenCounts::new(150, 0, 0, 0), 0.015),
        ];
        let blocks = segment(&events, &config, t0() + Duration::hours(10));

        assert_eq!(blocks.len(), 3);
        assert!(blocks[1].is_gap);
        assert_eq!(blocks[1].start_time, t0() + Duration::hours(5));
        assert_eq!(blocks[1].end_time, t0() + Duration::hours(9));
        assert_eq!(blocks[1].tokens.total(), 0);
        assert!(!blocks[1].is_active);

        // Without the flag, the same stream produces no gap block
        let plain = segment(&events, &EngineConfig::default(), t0() + Duration::hours(10));
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn test_gap_block_never_active() {
        // Gap precedes the final real block; only the real block may be active
        let config = EngineConfig::default().with_gap_blocks(true);
        let events = vec![
            resolved(t0(), TokenCounts::new(100, 0, 0, 0), 0.01),
            resolved(t0() + Duration::hours(9), TokenCounts::new(150, 0, 0, 0), 0.015),
        ];
        let blocks = segment(&events, &config, t0() + Duration::hours(9));

        let active: Vec<_> = blocks.iter().filter(|b| b.is_active).collect();
        assert_eq!(active.len(), 1);
        assert!(!active[0].is_gap);
        assert_eq!(active[0].start_time, t0() + Duration::hours(9));
    }

    #[test]
    fn test_single_event_block() {
        let events = vec![resolved(t0(), TokenCounts::new(100, 0, 0, 0), 0.01)];

        let inside = segment(&events, &EngineConfig::default(), t0() + Duration::hours(4));
        assert_eq!(inside.len(), 1);
        assert!(inside[0].is_active);

        let outside = segment(&events, &EngineConfig::default(), t0() + Duration::hours(5));
        assert!(!outside[0].is_active);
    }

    #[test]
    fn test_future_event_still_blocked_by_timestamp() {
        // Clock skew: an event ahead of now still lands in a block by its
        // own timestamp; the last block is active because now < end
        let events = vec![resolved(t0() + Duration::minutes(10), TokenCounts::new(100, 0, 0, 0), 0.01)];
        let blocks = segment(&events, &EngineConfig::default(), t0());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_time, t0() + Duration::minutes(10));
        assert!(!blocks[0].is_active, "now is before the block start");
    }

    #[test]
    fn test_blocks_non_overlapping_and_ordered() {
        let events: Vec<_> = (0..20)
            .map(|i| {
                resolved(
                    t0() + Duration::minutes(i * 47),
                    TokenCounts::new(10, 5, 0, 0),
                    0.001,
                )
            })
            .collect();
        let blocks = segment(&events, &EngineConfig::default(), t0());

        for pair in blocks.windows(2) {
            assert!(pair[0].start_time < pair[1].start_time);
            assert!(pair[0].end_time <= pair[1].start_time);
        }
        let total_events: usize = blocks.iter().map(|b| b.events.len()).sum();
        assert_eq!(total_events, 20);
    }
}
