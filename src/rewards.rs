use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Persisted coin ledger: a running total plus per-day earned deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardLedgerState {
    /// Clamped at zero, never negative
    pub total_coins: u32,

    /// Signed delta accumulated per UTC day (`YYYY-MM-DD`), clamped at zero
    /// on removal
    pub per_day_earned: HashMap<String, i64>,
}

/// Append-only daily coin ledger driven by memorization toggles and quiz
/// answers. Calls carry no built-in dedup; idempotence is the caller's
/// responsibility.
#[derive(Debug, Clone, Default)]
pub struct RewardLedger {
    state: RewardLedgerState,
}

impl RewardLedger {
    pub fn new(state: RewardLedgerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &RewardLedgerState {
        &self.state
    }

    pub fn total_coins(&self) -> u32 {
        self.state.total_coins
    }

    pub fn earned_today(&self) -> i64 {
        self.state
            .per_day_earned
            .get(&today_key())
            .copied()
            .unwrap_or(0)
    }

    pub fn add_coins(&mut self, n: u32) {
        self.state.total_coins += n;
        let bucket = self.state.per_day_earned.entry(today_key()).or_insert(0);
        *bucket += i64::from(n);
        debug!("🪙 +{} coins (total {})", n, self.state.total_coins);
    }

    pub fn remove_coins(&mut self, n: u32) {
        self.state.total_coins = self.state.total_coins.saturating_sub(n);
        let bucket = self.state.per_day_earned.entry(today_key()).or_insert(0);
        *bucket = (*bucket - i64::from(n)).max(0);
        debug!("🪙 -{} coins (total {})", n, self.state.total_coins);
    }
}

fn today_key() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_and_day_bucket_accumulate() {
        let mut ledger = RewardLedger::default();
        ledger.add_coins(3);
        ledger.add_coins(2);
        assert_eq!(ledger.total_coins(), 5);
        assert_eq!(ledger.earned_today(), 5);
    }

    #[test]
    fn test_removal_clamps_at_zero() {
        let mut ledger = RewardLedger::default();
        ledger.add_coins(1);
        ledger.remove_coins(5);
        assert_eq!(ledger.total_coins(), 0);
        assert_eq!(ledger.earned_today(), 0);
    }

    #[test]
    fn test_add_then_remove_restores_balance() {
        let mut ledger = RewardLedger::default();
        ledger.add_coins(4);
        let before = ledger.total_coins();
        ledger.add_coins(1);
        ledger.remove_coins(1);
        assert_eq!(ledger.total_coins(), before);
    }

    #[test]
    fn test_state_roundtrips_through_serde() {
        let mut ledger = RewardLedger::default();
        ledger.add_coins(7);
        let json = serde_json::to_string(ledger.state()).unwrap();
        let restored: RewardLedgerState = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, ledger.state());
    }
}
