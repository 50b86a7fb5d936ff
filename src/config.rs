use clap::Parser;

use crate::engine::hysteresis::TierConfig;
use crate::engine::kelly::KellyConfig;
use crate::engine::odds::OddsConfig;
use crate::engine::settlement::SettlementConfig;
use crate::engine::EngineConfig;

/// In-play football signal engine
#[derive(Parser, Debug, Clone)]
#[command(name = "inplay-signals", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "signals.db")]
    pub database_path: String,

    /// JSON-lines replay files, comma separated; each acts as one provider
    #[arg(long, env = "REPLAY_PATH", value_delimiter = ',')]
    pub replay_path: Vec<String>,

    /// Snapshot polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "5")]
    pub poll_interval_secs: u64,

    /// Signal strength at or above which a fixture is in the high tier
    #[arg(long, env = "TIER_HIGH_THRESHOLD", default_value = "70")]
    pub tier_high_threshold: i32,

    /// Signal strength at or above which a fixture is in the watch tier
    #[arg(long, env = "TIER_WATCH_THRESHOLD", default_value = "50")]
    pub tier_watch_threshold: i32,

    /// Consecutive ticks a new tier must hold before it is adopted
    #[arg(long, env = "TIER_CONFIRM_COUNT", default_value = "3")]
    pub tier_confirm_count: u32,

    /// Minimum seconds between two signals of one type for one fixture
    #[arg(long, env = "SIGNAL_COOLDOWN_SECS", default_value = "600")]
    pub signal_cooldown_secs: i64,

    /// Minutes after the trigger in which a goal settles a signal as a hit
    #[arg(long, env = "SETTLEMENT_WINDOW_MINS", default_value = "15")]
    pub settlement_window_mins: i32,

    /// Pending signals of fixtures silent for this long are expired
    #[arg(long, env = "PENDING_EXPIRY_MINS", default_value = "180")]
    pub pending_expiry_mins: i64,

    /// Fractional Kelly multiplier (0.0–1.0)
    #[arg(long, env = "KELLY_FRACTION", default_value = "0.25")]
    pub kelly_fraction: f64,

    /// Share of the bankroll allocated to these signals (0.0–1.0)
    #[arg(long, env = "POSITION_FRACTION", default_value = "1.0")]
    pub position_fraction: f64,

    /// Smallest stake suggestion, percent of bankroll
    #[arg(long, env = "MIN_STAKE_PCT", default_value = "0.5")]
    pub min_stake_pct: f64,

    /// Largest stake suggestion, percent of bankroll
    #[arg(long, env = "MAX_STAKE_PCT", default_value = "5.0")]
    pub max_stake_pct: f64,

    /// Settled signals a strength bucket needs before its hit rate is used
    #[arg(long, env = "CALIBRATION_MIN_SAMPLES", default_value = "30")]
    pub calibration_min_samples: u32,

    /// How far back odds snapshots are kept per fixture
    #[arg(long, env = "ODDS_HISTORY_MINS", default_value = "30")]
    pub odds_history_mins: i64,

    /// Window for rapid odds-change detection
    #[arg(long, env = "ODDS_RAPID_WINDOW_SECS", default_value = "300")]
    pub odds_rapid_window_secs: i64,

    /// Absolute handicap price move that counts as rapid
    #[arg(long, env = "HANDICAP_ODDS_THRESHOLD", default_value = "0.08")]
    pub handicap_odds_threshold: f64,

    /// Absolute over/under price move that counts as rapid
    #[arg(long, env = "OVER_UNDER_ODDS_THRESHOLD", default_value = "0.10")]
    pub over_under_odds_threshold: f64,

    /// Fixtures not seen for this many minutes are dropped from memory
    #[arg(long, env = "STALE_FIXTURE_MINS", default_value = "30")]
    pub stale_fixture_mins: i64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.replay_path.is_empty() {
            anyhow::bail!("at least one REPLAY_PATH snapshot source is required");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if !(0..=100).contains(&self.tier_high_threshold)
            || !(0..=100).contains(&self.tier_watch_threshold)
        {
            anyhow::bail!("tier thresholds must be between 0 and 100");
        }
        if self.tier_watch_threshold >= self.tier_high_threshold {
            anyhow::bail!(
                "tier_watch_threshold ({}) must be below tier_high_threshold ({})",
                self.tier_watch_threshold,
                self.tier_high_threshold
            );
        }
        if self.tier_confirm_count == 0 {
            anyhow::bail!("tier_confirm_count must be at least 1");
        }
        if self.signal_cooldown_secs < 0 {
            anyhow::bail!("signal_cooldown_secs must not be negative");
        }
        if self.settlement_window_mins <= 0 {
            anyhow::bail!("settlement_window_mins must be positive");
        }
        if self.pending_expiry_mins <= 0 || self.stale_fixture_mins <= 0 {
            anyhow::bail!("pending_expiry_mins and stale_fixture_mins must be positive");
        }
        if !(0.0..=1.0).contains(&self.kelly_fraction) {
            anyhow::bail!("kelly_fraction must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.position_fraction) {
            anyhow::bail!("position_fraction must be between 0.0 and 1.0");
        }
        if self.min_stake_pct < 0.0 || self.min_stake_pct > self.max_stake_pct {
            anyhow::bail!(
                "stake bounds invalid: min {} / max {}",
                self.min_stake_pct,
                self.max_stake_pct
            );
        }
        if self.max_stake_pct > 100.0 {
            anyhow::bail!("max_stake_pct must not exceed 100");
        }
        if self.odds_history_mins <= 0 || self.odds_rapid_window_secs <= 0 {
            anyhow::bail!("odds windows must be positive");
        }
        if self.handicap_odds_threshold <= 0.0 || self.over_under_odds_threshold <= 0.0 {
            anyhow::bail!("odds change thresholds must be positive");
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tier: TierConfig {
                high_threshold: self.tier_high_threshold,
                watch_threshold: self.tier_watch_threshold,
                confirm_count: self.tier_confirm_count,
                cooldown_secs: self.signal_cooldown_secs,
            },
            kelly: KellyConfig {
                kelly_fraction: self.kelly_fraction,
                position_fraction: self.position_fraction,
                min_stake_pct: self.min_stake_pct,
                max_stake_pct: self.max_stake_pct,
            },
            odds: OddsConfig {
                history_window_mins: self.odds_history_mins,
                rapid_window_secs: self.odds_rapid_window_secs,
                handicap_threshold: self.handicap_odds_threshold,
                over_under_threshold: self.over_under_odds_threshold,
                ..OddsConfig::default()
            },
            settlement: SettlementConfig {
                window_mins: self.settlement_window_mins,
                pending_expiry_mins: self.pending_expiry_mins,
            },
            calibration_min_samples: self.calibration_min_samples,
            stale_fixture_mins: self.stale_fixture_mins,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["inplay-signals", "--replay-path", "ticks.jsonl"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_valid_and_match_engine_defaults() {
        let cfg = parse(&[]);
        cfg.validate().unwrap();
        assert_eq!(cfg.engine_config(), EngineConfig::default());
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(parse(&["--tier-watch-threshold", "70"]).validate().is_err());
        assert!(parse(&["--tier-confirm-count", "0"]).validate().is_err());
        assert!(parse(&["--min-stake-pct", "6"]).validate().is_err());
        assert!(parse(&["--kelly-fraction", "1.5"]).validate().is_err());
        assert!(parse(&["--position-fraction", "1.5"]).validate().is_err());
    }

    #[test]
    fn knobs_flow_into_engine_config() {
        let cfg = parse(&["--tier-confirm-count", "2", "--settlement-window-mins", "10"]);
        let engine = cfg.engine_config();
        assert_eq!(engine.tier.confirm_count, 2);
        assert_eq!(engine.settlement.window_mins, 10);
    }
}
