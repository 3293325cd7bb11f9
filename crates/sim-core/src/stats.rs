//! Per-type enemy and building stats plus the lookup trait the engine uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ensure_positive, ValidationError};

/// Behaviour tag for enemies; replaces per-subtype enemy classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyVariant {
    /// Regular path walker.
    #[default]
    Standard,
    /// Boss with a periodic immunity ability.
    Boss,
}

impl EnemyVariant {
    /// Whether this enemy ignores damage while its ability is active.
    pub fn immune_while_ability_active(self) -> bool {
        matches!(self, EnemyVariant::Boss)
    }
}

/// Behaviour tag for buildings; replaces per-subtype tower classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingVariant {
    /// Single-target turret.
    #[default]
    Basic,
    /// Long range turret that needs a clear line of sight.
    Sniper,
    /// Area damage turret.
    Splash,
}

impl BuildingVariant {
    /// Whether the building must see its target before firing.
    pub fn has_line_of_sight_check(self) -> bool {
        matches!(self, BuildingVariant::Sniper)
    }
}

#[derive(Deserialize)]
struct EnemyStatsRecord {
    max_health: u32,
    speed: f32,
    #[serde(default)]
    damage: u32,
    #[serde(default)]
    reward_gold: u32,
    #[serde(default)]
    reward_xp: u32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    variant: EnemyVariant,
}

impl TryFrom<EnemyStatsRecord> for EnemyStats {
    type Error = ValidationError;

    fn try_from(r: EnemyStatsRecord) -> Result<Self, Self::Error> {
        EnemyStats::new(
            r.max_health,
            r.speed,
            r.damage,
            r.reward_gold,
            r.reward_xp,
            r.description,
        )
        .map(|s| s.with_variant(r.variant))
    }
}

/// Immutable enemy stats. Construct through [`EnemyStats::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnemyStatsRecord")]
pub struct EnemyStats {
    max_health: u32,
    speed: f32,
    damage: u32,
    reward_gold: u32,
    reward_xp: u32,
    description: String,
    variant: EnemyVariant,
}

impl EnemyStats {
    /// Build validated enemy stats. Health must be > 0, speed finite and > 0.
    pub fn new(
        max_health: u32,
        speed: f32,
        damage: u32,
        reward_gold: u32,
        reward_xp: u32,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if max_health == 0 {
            return Err(ValidationError::NonPositiveHealth);
        }
        ensure_positive("speed", speed)?;
        Ok(Self {
            max_health,
            speed,
            damage,
            reward_gold,
            reward_xp,
            description: description.into(),
            variant: EnemyVariant::Standard,
        })
    }

    /// Same stats with a different behaviour tag.
    pub fn with_variant(mut self, variant: EnemyVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn reward_gold(&self) -> u32 {
        self.reward_gold
    }

    pub fn reward_xp(&self) -> u32 {
        self.reward_xp
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn variant(&self) -> EnemyVariant {
        self.variant
    }

    /// `max_health * damage * speed / 1000`.
    pub fn threat_level(&self) -> f64 {
        f64::from(self.max_health) * f64::from(self.damage) * f64::from(self.speed) / 1000.0
    }

    /// Rewards per unit of threat; 0 when the enemy poses no threat.
    pub fn reward_efficiency(&self) -> f64 {
        let threat = self.threat_level();
        if threat == 0.0 {
            return 0.0;
        }
        (f64::from(self.reward_gold) + f64::from(self.reward_xp)) / threat
    }

    /// Returns a copy with health and speed scaled; other fields are copied.
    ///
    /// Health is rounded to the nearest integer and never drops below 1.
    pub fn with_multipliers(
        &self,
        health_multiplier: f32,
        speed_multiplier: f32,
    ) -> Result<Self, ValidationError> {
        ensure_positive("health_multiplier", health_multiplier)?;
        ensure_positive("speed_multiplier", speed_multiplier)?;
        let health = (f64::from(self.max_health) * f64::from(health_multiplier))
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32;
        let speed = self.speed * speed_multiplier;
        ensure_positive("speed", speed)?;
        Ok(Self {
            max_health: health,
            speed,
            ..self.clone()
        })
    }
}

#[derive(Deserialize)]
struct BuildingStatsRecord {
    #[serde(default)]
    cost: u32,
    #[serde(default)]
    damage: u32,
    range: f32,
    fire_rate: f32,
    bullet_speed: f32,
    #[serde(default)]
    shoot_sound: String,
    #[serde(default)]
    impact_sound: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    variant: BuildingVariant,
}

impl TryFrom<BuildingStatsRecord> for BuildingStats {
    type Error = ValidationError;

    fn try_from(r: BuildingStatsRecord) -> Result<Self, Self::Error> {
        let mut stats = BuildingStats::new(r.cost, r.damage, r.range, r.fire_rate, r.bullet_speed)?;
        stats.shoot_sound = r.shoot_sound;
        stats.impact_sound = r.impact_sound;
        stats.description = r.description;
        stats.variant = r.variant;
        Ok(stats)
    }
}

/// Immutable building stats. `fire_rate` is attacks per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BuildingStatsRecord")]
pub struct BuildingStats {
    cost: u32,
    damage: u32,
    range: f32,
    fire_rate: f32,
    bullet_speed: f32,
    shoot_sound: String,
    impact_sound: String,
    description: String,
    variant: BuildingVariant,
}

impl BuildingStats {
    /// Build validated building stats. Range, fire rate and bullet speed must be > 0.
    pub fn new(
        cost: u32,
        damage: u32,
        range: f32,
        fire_rate: f32,
        bullet_speed: f32,
    ) -> Result<Self, ValidationError> {
        ensure_positive("range", range)?;
        ensure_positive("fire_rate", fire_rate)?;
        ensure_positive("bullet_speed", bullet_speed)?;
        Ok(Self {
            cost,
            damage,
            range,
            fire_rate,
            bullet_speed,
            shoot_sound: String::new(),
            impact_sound: String::new(),
            description: String::new(),
            variant: BuildingVariant::Basic,
        })
    }

    /// Attach presentation metadata (sound keys and description).
    pub fn with_presentation(
        mut self,
        shoot_sound: impl Into<String>,
        impact_sound: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.shoot_sound = shoot_sound.into();
        self.impact_sound = impact_sound.into();
        self.description = description.into();
        self
    }

    pub fn with_variant(mut self, variant: BuildingVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn fire_rate(&self) -> f32 {
        self.fire_rate
    }

    pub fn bullet_speed(&self) -> f32 {
        self.bullet_speed
    }

    pub fn shoot_sound(&self) -> &str {
        &self.shoot_sound
    }

    pub fn impact_sound(&self) -> &str {
        &self.impact_sound
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn variant(&self) -> BuildingVariant {
        self.variant
    }

    /// `damage * fire_rate`.
    pub fn damage_per_second(&self) -> f64 {
        f64::from(self.damage) * f64::from(self.fire_rate)
    }

    /// DPS per unit of cost; 0 for free buildings.
    pub fn cost_effectiveness(&self) -> f64 {
        if self.cost == 0 {
            return 0.0;
        }
        self.damage_per_second() / f64::from(self.cost)
    }
}

/// Read-only lookup of per-type stats.
pub trait StatsProvider {
    fn enemy_stats(&self, enemy_type: &str) -> Option<&EnemyStats>;
    fn building_stats(&self, building_type: &str) -> Option<&BuildingStats>;
}

/// In-memory stats tables keyed by type identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    #[serde(default)]
    pub enemies: BTreeMap<String, EnemyStats>,
    #[serde(default)]
    pub buildings: BTreeMap<String, BuildingStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enemy(mut self, id: impl Into<String>, stats: EnemyStats) -> Self {
        self.enemies.insert(id.into(), stats);
        self
    }

    pub fn with_building(mut self, id: impl Into<String>, stats: BuildingStats) -> Self {
        self.buildings.insert(id.into(), stats);
        self
    }
}

impl StatsProvider for StatsTable {
    fn enemy_stats(&self, enemy_type: &str) -> Option<&EnemyStats> {
        self.enemies.get(enemy_type)
    }

    fn building_stats(&self, building_type: &str) -> Option<&BuildingStats> {
        self.buildings.get(building_type)
    }
}
