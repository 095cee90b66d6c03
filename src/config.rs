use crate::{
    balance::{
        BALANCE_KEY,
        DEFAULT_BALANCE,
    },
    symbols::TROPHY_PROBABILITY,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;

/// Upper bound on `reel_count`.
pub const MAX_REEL_COUNT: usize = 16;
/// Upper bound on every millisecond field, one minute.
pub const MAX_TIMING_MS: u64 = 60_000;

/// Tunables of the spin engine. `Default` is the reference machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub reel_count: usize,
    pub trophy_probability: f64,
    /// reel `i` ticks every `tick_base_ms + i * tick_stagger_ms`
    pub tick_base_ms: u64,
    pub tick_stagger_ms: u64,
    /// reel `i` stops after `stop_base_ms + i * stop_stagger_ms + jitter`
    pub stop_base_ms: u64,
    pub stop_stagger_ms: u64,
    /// exclusive upper bound of the random stop jitter
    pub stop_jitter_ms: u64,
    pub settle_delay_ms: u64,
    pub default_balance: f64,
    pub storage_key: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            reel_count: 3,
            trophy_probability: TROPHY_PROBABILITY,
            tick_base_ms: 60,
            tick_stagger_ms: 10,
            stop_base_ms: 700,
            stop_stagger_ms: 300,
            stop_jitter_ms: 500,
            settle_delay_ms: 300,
            default_balance: DEFAULT_BALANCE,
            storage_key: BALANCE_KEY.to_string(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_REEL_COUNT).contains(&self.reel_count) {
            return Err(eyre!(
                "reel_count must be within [2, {MAX_REEL_COUNT}], got {}",
                self.reel_count
            ));
        }
        for (name, value) in [
            ("tick_base_ms", self.tick_base_ms),
            ("tick_stagger_ms", self.tick_stagger_ms),
            ("stop_base_ms", self.stop_base_ms),
            ("stop_stagger_ms", self.stop_stagger_ms),
            ("stop_jitter_ms", self.stop_jitter_ms),
            ("settle_delay_ms", self.settle_delay_ms),
        ] {
            if value > MAX_TIMING_MS {
                return Err(eyre!(
                    "{name} must be at most {MAX_TIMING_MS} ms, got {value}"
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.trophy_probability) {
            return Err(eyre!(
                "trophy_probability must be within [0, 1], got {}",
                self.trophy_probability
            ));
        }
        if self.tick_base_ms == 0 {
            return Err(eyre!("tick_base_ms must be positive"));
        }
        if !self.default_balance.is_finite() || self.default_balance < 0.0 {
            return Err(eyre!(
                "default_balance must be a non-negative number, got {}",
                self.default_balance
            ));
        }
        if self.storage_key.is_empty() {
            return Err(eyre!("storage_key must not be empty"));
        }
        Ok(())
    }

    pub fn tick_interval(&self, reel: usize) -> Duration {
        Duration::from_millis(staggered(self.tick_base_ms, reel, self.tick_stagger_ms))
    }

    pub fn stop_delay(&self, reel: usize, jitter_ms: u64) -> Duration {
        Duration::from_millis(
            staggered(self.stop_base_ms, reel, self.stop_stagger_ms).saturating_add(jitter_ms),
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Upper bound on how long a spin can take from trigger to settlement.
    pub fn max_spin_duration(&self) -> Duration {
        let last = self.reel_count.saturating_sub(1);
        self.stop_delay(last, self.stop_jitter_ms) + self.settle_delay()
    }
}

/// `base + reel * stagger`, saturating so an unvalidated config cannot panic.
fn staggered(base: u64, reel: usize, stagger: u64) -> u64 {
    let reel = u64::try_from(reel).unwrap_or(u64::MAX);
    base.saturating_add(reel.saturating_mul(stagger))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn default__reference_timings() {
        let config = GameConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(0), Duration::from_millis(60));
        assert_eq!(config.tick_interval(2), Duration::from_millis(80));
        assert_eq!(config.stop_delay(0, 0), Duration::from_millis(700));
        assert_eq!(config.stop_delay(2, 499), Duration::from_millis(1_799));
        assert_eq!(config.settle_delay(), Duration::from_millis(300));
        assert_eq!(config.max_spin_duration(), Duration::from_millis(2_100));
    }

    #[test]
    fn validate__rejects_broken_values() {
        let broken = [
            GameConfig {
                reel_count: 1,
                ..GameConfig::default()
            },
            GameConfig {
                trophy_probability: 1.5,
                ..GameConfig::default()
            },
            GameConfig {
                trophy_probability: f64::NAN,
                ..GameConfig::default()
            },
            GameConfig {
                tick_base_ms: 0,
                ..GameConfig::default()
            },
            GameConfig {
                default_balance: -1.0,
                ..GameConfig::default()
            },
            GameConfig {
                storage_key: String::new(),
                ..GameConfig::default()
            },
            GameConfig {
                reel_count: 10_000,
                ..GameConfig::default()
            },
            GameConfig {
                stop_stagger_ms: u64::MAX / 2,
                ..GameConfig::default()
            },
            GameConfig {
                tick_stagger_ms: u64::MAX,
                ..GameConfig::default()
            },
            GameConfig {
                stop_jitter_ms: MAX_TIMING_MS + 1,
                ..GameConfig::default()
            },
            GameConfig {
                settle_delay_ms: u64::MAX,
                ..GameConfig::default()
            },
        ];
        for config in broken {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn validate__accepts_the_largest_allowed_values() {
        let config = GameConfig {
            reel_count: MAX_REEL_COUNT,
            tick_base_ms: MAX_TIMING_MS,
            tick_stagger_ms: MAX_TIMING_MS,
            stop_base_ms: MAX_TIMING_MS,
            stop_stagger_ms: MAX_TIMING_MS,
            stop_jitter_ms: MAX_TIMING_MS,
            settle_delay_ms: MAX_TIMING_MS,
            ..GameConfig::default()
        };

        assert!(config.validate().is_ok());
        assert_eq!(
            config.max_spin_duration(),
            Duration::from_millis(MAX_TIMING_MS * 18)
        );
    }

    #[test]
    fn stop_delay__huge_unvalidated_values__saturate_instead_of_panicking() {
        let config = GameConfig {
            stop_stagger_ms: u64::MAX / 2,
            tick_stagger_ms: u64::MAX,
            ..GameConfig::default()
        };

        assert_eq!(config.stop_delay(5, 499), Duration::from_millis(u64::MAX));
        assert_eq!(config.tick_interval(3), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn deserialize__missing_fields_take_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{ "reel_count": 4, "settle_delay_ms": 0 }"#).unwrap();

        assert_eq!(config.reel_count, 4);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.stop_base_ms, 700);
        assert_eq!(config.storage_key, "mk_balance");
    }
}
