//! Per-house ledger: credits, storage, power, and primary factories.
//!
//! Credits change through harvesting, production, and repairs. Deposits
//! from harvesting are capped by storage; spending never goes negative.
//! Power balance feeds the production speed multiplier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{FactoryKind, Rules};
use crate::math::Fixed;
use crate::visibility::Visibility;
use crate::world::{EntityId, World};

/// House (faction) identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct HouseId(pub u8);

impl std::fmt::Display for HouseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "house {}", self.0)
    }
}

/// One house's economy and production state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    /// Identifier.
    pub id: HouseId,
    /// Spendable credits.
    pub credits: i32,
    /// Ceiling on credits gained from harvesting.
    pub storage_capacity: i32,
    /// Power generated by owned buildings.
    pub power_output: i32,
    /// Power consumed by owned buildings.
    pub power_drain: i32,
    /// Primary factory per production line.
    pub primary: BTreeMap<FactoryKind, EntityId>,
    /// An HQ has been placed at some point.
    pub hq_deployed: bool,
    /// Fog of war.
    pub visibility: Visibility,
}

impl House {
    /// New house with starting credits and a map-sized fog layer.
    #[must_use]
    pub fn new(id: HouseId, credits: i32, map_width: i32, map_height: i32) -> Self {
        Self {
            id,
            credits,
            storage_capacity: credits,
            power_output: 0,
            power_drain: 0,
            primary: BTreeMap::new(),
            hq_deployed: false,
            visibility: Visibility::new(map_width, map_height),
        }
    }

    /// Storage space left before deposits are refused.
    #[must_use]
    pub const fn available_storage(&self) -> i32 {
        let space = self.storage_capacity - self.credits;
        if space > 0 {
            space
        } else {
            0
        }
    }

    /// Deposit harvested credits, respecting storage.
    ///
    /// Returns the amount actually deposited; the rest is lost.
    pub fn deposit(&mut self, amount: i32) -> i32 {
        let deposited = amount.clamp(0, self.available_storage());
        self.credits += deposited;
        deposited
    }

    /// Return previously spent credits. Not subject to storage.
    pub fn refund(&mut self, amount: i32) {
        self.credits += amount.max(0);
    }

    /// Spend credits if available. Returns true on success.
    pub fn spend(&mut self, amount: i32) -> bool {
        if amount >= 0 && self.credits >= amount {
            self.credits -= amount;
            true
        } else {
            false
        }
    }

    /// Check if the house can afford a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: i32) -> bool {
        self.credits >= cost
    }

    /// Production speed from the power balance: full when output covers
    /// drain, half when it covers at least half, quarter otherwise.
    #[must_use]
    pub fn power_multiplier(&self) -> Fixed {
        if self.power_drain <= 0 || self.power_output >= self.power_drain {
            Fixed::ONE
        } else if self.power_output * 2 >= self.power_drain {
            Fixed::from_num(1) / 2
        } else {
            Fixed::from_num(1) / 4
        }
    }
}

/// Recompute power and storage from every living building.
pub(crate) fn refresh_ledgers(
    houses: &mut BTreeMap<HouseId, House>,
    world: &World,
    rules: &Rules,
    base_storage: i32,
) {
    for house in houses.values_mut() {
        house.power_output = 0;
        house.power_drain = 0;
        house.storage_capacity = base_storage;
    }

    for entity in world.iter().filter(|e| e.building.is_some()) {
        let Some(owner) = entity.owner else { continue };
        let Some(house) = houses.get_mut(&owner) else {
            continue;
        };
        let Some(data) = rules.building(&entity.type_name) else {
            continue;
        };
        if data.power >= 0 {
            house.power_output += data.power;
        } else {
            house.power_drain -= data.power;
        }
        house.storage_capacity += data.storage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_capped_by_storage() {
        let mut house = House::new(HouseId(0), 900, 8, 8);
        house.storage_capacity = 1000;
        assert_eq!(house.deposit(250), 100);
        assert_eq!(house.credits, 1000);
        assert_eq!(house.deposit(50), 0);
    }

    #[test]
    fn test_spend_and_refund() {
        let mut house = House::new(HouseId(0), 500, 8, 8);
        assert!(house.can_afford(500));
        assert!(!house.spend(600));
        assert!(house.spend(300));
        assert_eq!(house.credits, 200);
        house.refund(300);
        assert_eq!(house.credits, 500);
    }

    #[test]
    fn test_power_multiplier_tiers() {
        let mut house = House::new(HouseId(0), 0, 8, 8);
        assert_eq!(house.power_multiplier(), Fixed::ONE);

        house.power_output = 100;
        house.power_drain = 100;
        assert_eq!(house.power_multiplier(), Fixed::ONE);

        house.power_drain = 150;
        assert_eq!(house.power_multiplier(), Fixed::from_num(0.5));

        house.power_drain = 201;
        assert_eq!(house.power_multiplier(), Fixed::from_num(0.25));
    }
}
