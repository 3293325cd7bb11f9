//! Wave configuration records: spawn groups, waves and wave sets.

use serde::{Deserialize, Serialize};

use crate::{ensure_non_negative, ensure_positive, ValidationError};

fn one() -> f32 {
    1.0
}

/// A homogeneous batch of enemies spawned at a fixed interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemySpawnGroup {
    /// Stats key of the enemy type.
    pub enemy_type: String,
    /// Remaining enemies; counts down on a working copy during a run.
    pub count: u32,
    /// Seconds between two spawns of this group (> 0).
    pub spawn_interval: f32,
    /// Seconds to wait before the first spawn of this group (>= 0).
    #[serde(default)]
    pub start_delay: f32,
    #[serde(default = "one")]
    pub health_multiplier: f32,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
    /// Money per kill; falls back to the enemy's `reward_gold` when unset.
    #[serde(default)]
    pub money_reward: Option<u32>,
}

impl EnemySpawnGroup {
    /// A group with neutral multipliers and no start delay.
    pub fn new(enemy_type: impl Into<String>, count: u32, spawn_interval: f32) -> Self {
        Self {
            enemy_type: enemy_type.into(),
            count,
            spawn_interval,
            start_delay: 0.0,
            health_multiplier: 1.0,
            speed_multiplier: 1.0,
            money_reward: None,
        }
    }

    pub fn with_money_reward(mut self, money: u32) -> Self {
        self.money_reward = Some(money);
        self
    }

    pub fn with_multipliers(mut self, health: f32, speed: f32) -> Self {
        self.health_multiplier = health;
        self.speed_multiplier = speed;
        self
    }

    pub fn with_start_delay(mut self, delay: f32) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enemy_type.trim().is_empty() {
            return Err(ValidationError::EmptyName("enemy_type"));
        }
        ensure_positive("spawn_interval", self.spawn_interval)?;
        ensure_non_negative("start_delay", self.start_delay)?;
        ensure_positive("health_multiplier", self.health_multiplier)?;
        ensure_positive("speed_multiplier", self.speed_multiplier)?;
        Ok(())
    }
}

/// One scheduled batch of spawn groups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// 1-based position in the wave set.
    pub wave_number: u32,
    #[serde(default)]
    pub wave_name: String,
    #[serde(default)]
    pub enemy_groups: Vec<EnemySpawnGroup>,
    #[serde(default)]
    pub pre_wave_delay: f32,
    #[serde(default)]
    pub post_wave_delay: f32,
    /// Money awarded when the wave is cleared.
    #[serde(default)]
    pub bonus_money: u32,
}

impl Wave {
    pub fn new(wave_number: u32, wave_name: impl Into<String>) -> Self {
        Self {
            wave_number,
            wave_name: wave_name.into(),
            enemy_groups: Vec::new(),
            pre_wave_delay: 0.0,
            post_wave_delay: 0.0,
            bonus_money: 0,
        }
    }

    pub fn with_group(mut self, group: EnemySpawnGroup) -> Self {
        self.enemy_groups.push(group);
        self
    }

    pub fn with_bonus(mut self, bonus_money: u32) -> Self {
        self.bonus_money = bonus_money;
        self
    }

    /// Sum of group counts.
    pub fn total_enemies(&self) -> u32 {
        self.enemy_groups
            .iter()
            .fold(0u32, |acc, g| acc.saturating_add(g.count))
    }

    /// Deep copy used for one run, with every non-empty group count scaled.
    ///
    /// Scaled counts are rounded and never drop a non-empty group to zero.
    pub fn working_copy(&self, count_multiplier: f32) -> Wave {
        let mut copy = self.clone();
        if count_multiplier != 1.0 {
            for group in &mut copy.enemy_groups {
                if group.count > 0 {
                    let scaled = (f64::from(group.count) * f64::from(count_multiplier)).round();
                    group.count = scaled.clamp(1.0, f64::from(u32::MAX)) as u32;
                }
            }
        }
        copy
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_non_negative("pre_wave_delay", self.pre_wave_delay)?;
        ensure_non_negative("post_wave_delay", self.post_wave_delay)?;
        for group in &self.enemy_groups {
            group.validate()?;
        }
        Ok(())
    }
}

/// Ordered waves plus the starting economy; immutable during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveSet {
    pub set_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub waves: Vec<Wave>,
    #[serde(default)]
    pub initial_money: u32,
    pub initial_lives: u32,
}

impl Default for WaveSet {
    /// The empty fallback set used when configuration cannot be loaded.
    fn default() -> Self {
        Self {
            set_name: "empty".to_string(),
            description: String::new(),
            waves: Vec::new(),
            initial_money: 0,
            initial_lives: 1,
        }
    }
}

impl WaveSet {
    pub fn total_waves(&self) -> u32 {
        u32::try_from(self.waves.len()).unwrap_or(u32::MAX)
    }

    /// Look up a wave by its 1-based number.
    pub fn wave(&self, wave_number: u32) -> Option<&Wave> {
        let index = usize::try_from(wave_number.checked_sub(1)?).ok()?;
        self.waves.get(index)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_lives == 0 {
            return Err(ValidationError::NoLives);
        }
        self.validate_waves()
    }

    /// Check wave numbering and every wave, ignoring the set's starting economy.
    pub fn validate_waves(&self) -> Result<(), ValidationError> {
        for (i, wave) in self.waves.iter().enumerate() {
            let expected = u32::try_from(i + 1).unwrap_or(u32::MAX);
            if wave.wave_number != expected {
                return Err(ValidationError::WaveNumbering {
                    expected,
                    found: wave.wave_number,
                });
            }
            wave.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn two_group_wave() -> Wave {
        Wave::new(1, "opening")
            .with_group(EnemySpawnGroup::new("basic", 5, 1.0))
            .with_group(EnemySpawnGroup::new("fast", 3, 0.5).with_start_delay(2.0))
    }

    #[test]
    fn total_enemies_sums_groups() {
        assert_eq!(two_group_wave().total_enemies(), 8);
        assert_eq!(Wave::new(1, "empty").total_enemies(), 0);
    }

    #[test]
    fn working_copy_leaves_source_untouched() {
        let wave = two_group_wave();
        let mut copy = wave.working_copy(2.0);
        assert_eq!(copy.total_enemies(), 16);
        copy.enemy_groups[0].count = 0;
        assert_eq!(wave.enemy_groups[0].count, 5);
    }

    #[test]
    fn working_copy_keeps_small_groups_alive() {
        let wave = Wave::new(1, "w").with_group(EnemySpawnGroup::new("basic", 1, 1.0));
        assert_eq!(wave.working_copy(0.1).total_enemies(), 1);
        let empty = Wave::new(1, "w").with_group(EnemySpawnGroup::new("basic", 0, 1.0));
        assert_eq!(empty.working_copy(3.0).total_enemies(), 0);
    }

    #[test]
    fn wave_lookup_is_one_based() {
        let set = WaveSet {
            set_name: "t".into(),
            description: String::new(),
            waves: vec![two_group_wave()],
            initial_money: 100,
            initial_lives: 20,
        };
        assert!(set.wave(0).is_none());
        assert_eq!(set.wave(1).map(|w| w.wave_number), Some(1));
        assert!(set.wave(2).is_none());
        assert!(set.validate().is_ok());
    }

    #[test]
    fn validate_catches_bad_sets() {
        let mut set = WaveSet {
            waves: vec![Wave::new(2, "skipped")],
            ..WaveSet::default()
        };
        assert_eq!(
            set.validate(),
            Err(ValidationError::WaveNumbering {
                expected: 1,
                found: 2
            })
        );
        set.waves = vec![Wave::new(1, "ok").with_group(EnemySpawnGroup::new("basic", 1, 0.0))];
        assert!(matches!(
            set.validate(),
            Err(ValidationError::NonPositive {
                field: "spawn_interval",
                ..
            })
        ));
        set.waves.clear();
        set.initial_lives = 0;
        assert_eq!(set.validate(), Err(ValidationError::NoLives));
    }

    #[test]
    fn wave_checks_ignore_starting_lives() {
        let mut set = WaveSet {
            waves: vec![two_group_wave()],
            initial_lives: 0,
            ..WaveSet::default()
        };
        assert!(set.validate_waves().is_ok());
        set.waves[0].enemy_groups[1].spawn_interval = f32::NAN;
        assert!(matches!(
            set.validate_waves(),
            Err(ValidationError::NonPositive {
                field: "spawn_interval",
                ..
            })
        ));
    }

    #[test]
    fn group_defaults_from_json() {
        let g: EnemySpawnGroup =
            serde_json::from_str(r#"{"enemy_type": "tank", "count": 4, "spawn_interval": 2.5}"#)
                .unwrap();
        assert_eq!(g.health_multiplier, 1.0);
        assert_eq!(g.speed_multiplier, 1.0);
        assert_eq!(g.start_delay, 0.0);
        assert_eq!(g.money_reward, None);
    }

    proptest! {
        #[test]
        fn total_matches_group_sum(counts in proptest::collection::vec(0u32..500, 0..12)) {
            let mut wave = Wave::new(1, "p");
            for c in &counts {
                wave = wave.with_group(EnemySpawnGroup::new("basic", *c, 1.0));
            }
            prop_assert_eq!(wave.total_enemies(), counts.iter().sum::<u32>());
        }
    }
}
