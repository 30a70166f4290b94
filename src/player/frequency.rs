//! "Seen tour" bookkeeping for auto-play frequency caps.
//!
//! Stats live in the browser's key-value store as `seen-<tourId>` →
//! `{"lastPlayedAt": <epoch ms>, "playCount": <n>}`. Concurrent tabs can race
//! on the read-modify-write; the worst case is one extra auto-play.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::PlayBehavior;
use crate::store::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStats {
    pub last_played_at: u64,
    pub play_count: u32,
}

pub fn seen_key(tour_id: &str) -> String {
    format!("seen-{}", tour_id)
}

/// Stored stats, or `None` when absent or unreadable.
pub fn load_stats<K: KeyValueStore + ?Sized>(kv: &K, tour_id: &str) -> Option<PlayStats> {
    let raw = kv.get(&seen_key(tour_id))?;
    match serde_json::from_str(&raw) {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("Ignoring unreadable play stats for tour {}: {}", tour_id, e);
            None
        }
    }
}

fn window_open(behavior: PlayBehavior, stats: &PlayStats, now_ms: u64) -> bool {
    match behavior.window_ms() {
        None => true,
        Some(window) => now_ms.saturating_sub(stats.last_played_at) < window,
    }
}

/// Has this tour used up its plays for the current window?
pub fn is_capped(behavior: PlayBehavior, stats: Option<&PlayStats>, now_ms: u64) -> bool {
    match stats {
        None => false,
        Some(stats) => {
            window_open(behavior, stats, now_ms) && stats.play_count >= behavior.max_plays()
        }
    }
}

/// Stats after one more play at `now_ms`. An elapsed window starts a new count.
pub fn next_stats(behavior: PlayBehavior, stats: Option<PlayStats>, now_ms: u64) -> PlayStats {
    let play_count = match stats {
        Some(s) if window_open(behavior, &s, now_ms) => s.play_count.saturating_add(1),
        _ => 1,
    };
    PlayStats {
        last_played_at: now_ms,
        play_count,
    }
}

pub fn record_play<K: KeyValueStore + ?Sized>(
    kv: &mut K,
    tour_id: &str,
    behavior: PlayBehavior,
    now_ms: u64,
) -> Result<PlayStats, StoreError> {
    let stats = next_stats(behavior, load_stats(kv, tour_id), now_ms);
    kv.set(&seen_key(tour_id), serde_json::to_string(&stats)?)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DAY_MS;
    use crate::store::MemoryKv;

    #[test]
    fn test_first_time_is_lifetime() {
        let mut kv = MemoryKv::new();
        assert!(!is_capped(PlayBehavior::FirstTime, None, 0));
        record_play(&mut kv, "t1", PlayBehavior::FirstTime, 0).unwrap();
        let stats = load_stats(&kv, "t1");
        assert!(is_capped(PlayBehavior::FirstTime, stats.as_ref(), 365 * DAY_MS));
    }

    #[test]
    fn test_weekly_allows_two_per_window() {
        let mut kv = MemoryKv::new();
        let b = PlayBehavior::Weekly;
        record_play(&mut kv, "t1", b, 0).unwrap();
        assert!(!is_capped(b, load_stats(&kv, "t1").as_ref(), DAY_MS));
        record_play(&mut kv, "t1", b, DAY_MS).unwrap();
        assert!(is_capped(b, load_stats(&kv, "t1").as_ref(), 2 * DAY_MS));
        // seven days after the last play the window has rolled over
        assert!(!is_capped(b, load_stats(&kv, "t1").as_ref(), 8 * DAY_MS));
        let stats = record_play(&mut kv, "t1", b, 8 * DAY_MS).unwrap();
        assert_eq!(stats.play_count, 1);
    }

    #[test]
    fn test_weekly_window_runs_from_last_play() {
        let mut kv = MemoryKv::new();
        let b = PlayBehavior::Weekly;
        record_play(&mut kv, "t1", b, 0).unwrap();
        record_play(&mut kv, "t1", b, 6 * DAY_MS).unwrap();
        let stats = load_stats(&kv, "t1");
        assert!(is_capped(b, stats.as_ref(), 12 * DAY_MS));
        assert!(!is_capped(b, stats.as_ref(), 13 * DAY_MS));
    }

    #[test]
    fn test_monthly_thrice() {
        let b = PlayBehavior::MonthlyThrice;
        let two = PlayStats {
            last_played_at: 0,
            play_count: 2,
        };
        assert!(!is_capped(b, Some(&two), DAY_MS));
        let three = next_stats(b, Some(two), DAY_MS);
        assert_eq!(three.play_count, 3);
        assert!(is_capped(b, Some(&three), 29 * DAY_MS));
        assert!(!is_capped(b, Some(&three), 31 * DAY_MS));
    }

    #[test]
    fn test_wire_format_and_garbage() {
        let mut kv = MemoryKv::new();
        let stats = record_play(&mut kv, "abc", PlayBehavior::Weekly, 1_700_000_000_000).unwrap();
        let raw = kv.get("seen-abc").unwrap();
        assert_eq!(raw, r#"{"lastPlayedAt":1700000000000,"playCount":1}"#);
        assert_eq!(load_stats(&kv, "abc"), Some(stats));

        kv.set("seen-abc", "not json".to_string()).unwrap();
        assert_eq!(load_stats(&kv, "abc"), None);
    }
}
