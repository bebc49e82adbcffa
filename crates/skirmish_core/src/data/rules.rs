//! The read-only rule tables handed to a simulation at construction.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BuildingData, ProjectileData, UnitData, WarheadData, WeaponData};
use crate::error::{GameError, Result};

/// On-disk layout of a rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    /// Unit definitions.
    pub units: Vec<UnitData>,
    /// Building definitions.
    pub buildings: Vec<BuildingData>,
    /// Weapon definitions.
    pub weapons: Vec<WeaponData>,
    /// Projectile definitions.
    pub projectiles: Vec<ProjectileData>,
    /// Warhead definitions.
    pub warheads: Vec<WarheadData>,
}

/// All static definitions, keyed by type name.
///
/// Shared behind an `Arc` so several simulations (a live game and a replay
/// verifier, say) can use one copy.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    units: BTreeMap<String, UnitData>,
    buildings: BTreeMap<String, BuildingData>,
    weapons: BTreeMap<String, WeaponData>,
    projectiles: BTreeMap<String, ProjectileData>,
    warheads: BTreeMap<String, WarheadData>,
}

impl From<RulesFile> for Rules {
    fn from(file: RulesFile) -> Self {
        let mut rules = Self::default();
        for unit in file.units {
            rules.add_unit(unit);
        }
        for building in file.buildings {
            rules.add_building(building);
        }
        for weapon in file.weapons {
            rules.add_weapon(weapon);
        }
        for projectile in file.projectiles {
            rules.add_projectile(projectile);
        }
        for warhead in file.warheads {
            rules.add_warhead(warhead);
        }
        rules
    }
}

impl Rules {
    /// Parse rules from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let file: RulesFile = ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        Ok(file.into())
    }

    /// Load rules from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file: RulesFile = ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let rules = Self::from(file);
        info!(
            path = %path.display(),
            units = rules.units.len(),
            buildings = rules.buildings.len(),
            "Loaded rules"
        );
        Ok(rules)
    }

    /// Register a unit type, replacing any existing one with the same id.
    pub fn add_unit(&mut self, unit: UnitData) -> &mut Self {
        self.units.insert(unit.id.clone(), unit);
        self
    }

    /// Register a building type.
    pub fn add_building(&mut self, building: BuildingData) -> &mut Self {
        self.buildings.insert(building.id.clone(), building);
        self
    }

    /// Register a weapon.
    pub fn add_weapon(&mut self, weapon: WeaponData) -> &mut Self {
        self.weapons.insert(weapon.id.clone(), weapon);
        self
    }

    /// Register a projectile.
    pub fn add_projectile(&mut self, projectile: ProjectileData) -> &mut Self {
        self.projectiles.insert(projectile.id.clone(), projectile);
        self
    }

    /// Register a warhead.
    pub fn add_warhead(&mut self, warhead: WarheadData) -> &mut Self {
        self.warheads.insert(warhead.id.clone(), warhead);
        self
    }

    /// Look up a unit type.
    #[must_use]
    pub fn unit(&self, id: &str) -> Option<&UnitData> {
        self.units.get(id)
    }

    /// Look up a building type.
    #[must_use]
    pub fn building(&self, id: &str) -> Option<&BuildingData> {
        self.buildings.get(id)
    }

    /// Look up a weapon.
    #[must_use]
    pub fn weapon(&self, id: &str) -> Option<&WeaponData> {
        self.weapons.get(id)
    }

    /// Look up a projectile.
    #[must_use]
    pub fn projectile(&self, id: &str) -> Option<&ProjectileData> {
        self.projectiles.get(id)
    }

    /// Look up a warhead.
    #[must_use]
    pub fn warhead(&self, id: &str) -> Option<&WarheadData> {
        self.warheads.get(id)
    }

    /// All unit types in id order.
    pub fn units(&self) -> impl Iterator<Item = &UnitData> {
        self.units.values()
    }

    /// All building types in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &BuildingData> {
        self.buildings.values()
    }

    /// Check every cross-reference between tables.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> std::result::Result<(), Vec<GameError>> {
        let mut problems = Vec::new();
        let mut bad = |owner: &str, message: String| {
            problems.push(GameError::InvalidData {
                owner: owner.to_string(),
                message,
            });
        };

        for weapon in self.weapons.values() {
            if !self.projectiles.contains_key(&weapon.projectile) {
                bad(
                    &weapon.id,
                    format!("unknown projectile '{}'", weapon.projectile),
                );
            }
            if !self.warheads.contains_key(&weapon.warhead) {
                bad(&weapon.id, format!("unknown warhead '{}'", weapon.warhead));
            }
            if weapon.range <= 0 {
                bad(&weapon.id, "range must be positive".to_string());
            }
        }

        for unit in self.units.values() {
            for weapon in unit.primary_weapon.iter().chain(&unit.secondary_weapon) {
                if !self.weapons.contains_key(weapon) {
                    bad(&unit.id, format!("unknown weapon '{weapon}'"));
                }
            }
            for prereq in &unit.prerequisites {
                if !self.buildings.contains_key(prereq) {
                    bad(&unit.id, format!("unknown prerequisite '{prereq}'"));
                }
            }
            if let Some(target) = &unit.deploys_into {
                if !self.buildings.contains_key(target) {
                    bad(&unit.id, format!("deploys into unknown building '{target}'"));
                }
            }
            if let Some(harvester) = unit.harvester {
                if harvester.capacity <= 0 || harvester.rate <= 0 {
                    bad(&unit.id, "harvester capacity and rate must be positive".to_string());
                }
            }
            if unit.speed < 0 {
                bad(&unit.id, "speed must not be negative".to_string());
            }
        }

        for building in self.buildings.values() {
            if let Some(weapon) = &building.primary_weapon {
                if !self.weapons.contains_key(weapon) {
                    bad(&building.id, format!("unknown weapon '{weapon}'"));
                }
            }
            if let Some(unit) = &building.free_unit {
                if !self.units.contains_key(unit) {
                    bad(&building.id, format!("unknown free unit '{unit}'"));
                }
            }
            for prereq in &building.prerequisites {
                if !self.buildings.contains_key(prereq) {
                    bad(&building.id, format!("unknown prerequisite '{prereq}'"));
                }
            }
            let (w, h) = building.footprint;
            if w <= 0 || h <= 0 {
                bad(&building.id, "footprint must be at least 1x1".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"(
        units: [
            UnitData(
                id: "rifle",
                class: Infantry,
                cost: 100,
                build_time: 45,
                health: 50,
                speed: 8,
                locomotion: Foot,
                primary_weapon: Some("m16"),
                prerequisites: ["barracks"],
            ),
        ],
        buildings: [
            BuildingData(id: "barracks", cost: 300, build_time: 100, health: 400, factory: Some(Infantry)),
        ],
        weapons: [
            WeaponData(id: "m16", damage: 15, range: 768, rate_of_fire: 20, projectile: "bullet", warhead: "small_arms"),
        ],
        projectiles: [
            ProjectileData(id: "bullet", kind: Invisible),
        ],
        warheads: [
            WarheadData(id: "small_arms", modifiers: { Heavy: 25 }),
        ],
    )"#;

    #[test]
    fn test_parse_and_lookup() {
        let rules = Rules::from_ron_str(SAMPLE).unwrap();
        assert_eq!(rules.unit("rifle").unwrap().cost, 100);
        assert!(rules.building("barracks").unwrap().is_factory());
        assert_eq!(rules.weapon("m16").unwrap().damage, 15);
        assert!(rules.unit("tank").is_none());
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_dangling_references() {
        let mut rules = Rules::from_ron_str(SAMPLE).unwrap();
        let mut rifle = rules.unit("rifle").unwrap().clone();
        rifle.primary_weapon = Some("laser".to_string());
        rifle.prerequisites.push("tech_center".to_string());
        rules.add_unit(rifle);

        let problems = rules.validate().unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(problems
            .iter()
            .all(|p| matches!(p, GameError::InvalidData { owner, .. } if owner == "rifle")));
    }

    #[test]
    fn test_bad_ron_reports_parse_error() {
        let err = Rules::from_ron_str("(units: [ UnitData(id: 3) ])").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
