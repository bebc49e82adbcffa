//! Headless scenario runs and replay verification.
//!
//! A run loads a scenario, ticks it with no input, and tallies what
//! happened per house. Every run is recorded; the replay is written out
//! only when asked for.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use skirmish_core::data::Rules;
use skirmish_core::events::SimEvent;
use skirmish_core::house::HouseId;
use skirmish_core::replay::{Replay, ReplayPlayer, ReplayRecorder};
use skirmish_core::scenario::Scenario;
use skirmish_core::simulation::Simulation;
use skirmish_core::world::EntityKind;
use tracing::info;

use crate::error::ToolResult;

/// What to run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Scenario file.
    pub scenario: PathBuf,
    /// Rules file.
    pub rules: PathBuf,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Where to write the replay, if anywhere.
    pub record: Option<PathBuf>,
}

/// Per-house tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HouseSummary {
    /// House id.
    pub id: u8,
    /// Credits at the end of the run.
    pub credits: i32,
    /// Living units.
    pub units: usize,
    /// Living buildings.
    pub buildings: usize,
    /// Entities this house lost.
    pub losses: u32,
    /// Units and structures produced.
    pub produced: u32,
    /// Credits delivered by harvesters.
    pub harvested: i64,
}

/// Result of a headless run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Session seed.
    pub seed: u64,
    /// Final tick.
    pub ticks: u64,
    /// State hash at the final tick.
    pub state_hash: u64,
    /// Shots fired by everyone.
    pub shots: u64,
    /// Orders rejected during the run.
    pub rejected_orders: u64,
    /// Houses in id order.
    pub houses: Vec<HouseSummary>,
    /// Replay file written, if any.
    pub replay: Option<PathBuf>,
}

/// Result of a replay verification.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    /// Scenario the replay was recorded from.
    pub scenario: String,
    /// Session seed.
    pub seed: u64,
    /// Orders in the replay.
    pub orders: usize,
    /// Tick the replay ends on.
    pub final_tick: u64,
    /// Hash reproduced at the final tick.
    pub state_hash: u64,
}

#[derive(Debug, Default)]
struct Tally {
    shots: u64,
    rejected: u64,
    houses: BTreeMap<HouseId, HouseSummary>,
}

impl Tally {
    fn house(&mut self, id: HouseId) -> &mut HouseSummary {
        self.houses.entry(id).or_insert_with(|| HouseSummary {
            id: id.0,
            ..HouseSummary::default()
        })
    }

    fn record(&mut self, sim: &Simulation, event: &SimEvent) {
        match event {
            SimEvent::Fired { .. } => self.shots += 1,
            SimEvent::Killed { owner: Some(owner), .. } => self.house(*owner).losses += 1,
            SimEvent::UnitSpawned { entity, factory: Some(_) } => {
                if let Some(owner) = sim.entity(*entity).and_then(|e| e.owner) {
                    self.house(owner).produced += 1;
                }
            }
            SimEvent::BuildingPlaced { house, .. } => self.house(*house).produced += 1,
            SimEvent::CreditsDeposited { house, amount } => {
                self.house(*house).harvested += i64::from(*amount);
            }
            SimEvent::OrderRejected { .. } => self.rejected += 1,
            _ => {}
        }
    }

    fn finish(mut self, sim: &Simulation) -> (u64, u64, Vec<HouseSummary>) {
        for house in sim.houses() {
            self.house(house.id).credits = house.credits;
        }
        for entity in sim.world().iter() {
            let Some(owner) = entity.owner else { continue };
            let summary = self.house(owner);
            if entity.kind == EntityKind::Building {
                summary.buildings += 1;
            } else {
                summary.units += 1;
            }
        }
        (self.shots, self.rejected, self.houses.into_values().collect())
    }
}

/// Run a scenario headless for `options.ticks` ticks.
///
/// # Errors
///
/// Returns an error if the rules or scenario fail to load or build, or if
/// the replay cannot be written.
pub fn run_scenario(options: &RunOptions) -> ToolResult<RunSummary> {
    let rules = Arc::new(Rules::load(&options.rules)?);
    let scenario = Scenario::load(&options.scenario)?;
    let sim = scenario.build(rules)?;
    run_simulation(&scenario.name, sim, options.ticks, options.record.as_deref())
}

/// Run an already-built simulation, tallying events as it goes.
///
/// # Errors
///
/// Returns an error if the replay cannot be recorded or written.
pub fn run_simulation(
    name: &str,
    sim: Simulation,
    ticks: u64,
    record: Option<&Path>,
) -> ToolResult<RunSummary> {
    let mut recorder = ReplayRecorder::new(name, sim)?;
    let mut tally = Tally::default();
    for _ in 0..ticks {
        recorder.tick();
        let sim = recorder.simulation();
        for event in sim.events() {
            tally.record(sim, event);
        }
    }

    let (replay, sim) = recorder.finish();
    if let Some(path) = record {
        replay.save(path)?;
    }

    let (shots, rejected_orders, houses) = tally.finish(&sim);
    let summary = RunSummary {
        scenario: name.to_string(),
        seed: sim.config().seed,
        ticks: sim.get_tick(),
        state_hash: sim.state_hash(),
        shots,
        rejected_orders,
        houses,
        replay: record.map(Path::to_path_buf),
    };
    info!(
        scenario = %summary.scenario,
        ticks = summary.ticks,
        hash = summary.state_hash,
        "Run finished"
    );
    Ok(summary)
}

/// Replay a recording and check it reproduces its final hash.
///
/// # Errors
///
/// Returns [`skirmish_core::error::GameError::DesyncDetected`] (wrapped) on
/// a mismatch, or an error if either file fails to load.
pub fn verify_replay(replay: &Path, rules: &Path) -> ToolResult<ReplaySummary> {
    let rules = Arc::new(Rules::load(rules)?);
    let replay = Replay::load(replay)?;
    let summary = ReplaySummary {
        scenario: replay.scenario_id.clone(),
        seed: replay.seed,
        orders: replay.order_count(),
        final_tick: replay.final_tick,
        state_hash: replay.final_hash,
    };
    ReplayPlayer::new(replay, rules)?.verify()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_test_utils::fixtures;

    fn data(relative: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../data")
            .join(relative)
    }

    #[test]
    fn test_run_reports_every_house() {
        let summary = run_simulation("skirmish_1v1", fixtures::skirmish_1v1(), 50, None).unwrap();
        assert_eq!(summary.ticks, 50);
        assert_eq!(summary.houses.len(), 2);
        assert_eq!(summary.houses[0].id, 0);
        assert_eq!(summary.houses[1].id, 1);
        assert!(summary.houses.iter().all(|h| h.buildings > 0 && h.units > 0));
        assert!(summary.replay.is_none());
    }

    #[test]
    fn test_same_run_same_hash() {
        let a = run_simulation("a", fixtures::skirmish_1v1(), 120, None).unwrap();
        let b = run_simulation("b", fixtures::skirmish_1v1(), 120, None).unwrap();
        assert_eq!(a.state_hash, b.state_hash);
        assert_eq!(a.houses, b.houses);
    }

    #[test]
    fn test_recorded_run_verifies() {
        let path = std::env::temp_dir().join("skirmish_tools_run.replay");
        let options = RunOptions {
            scenario: data("scenarios/skirmish_1v1.ron"),
            rules: data("rules.ron"),
            ticks: 80,
            record: Some(path.clone()),
        };
        let run = run_scenario(&options).unwrap();
        assert_eq!(run.replay.as_deref(), Some(path.as_path()));

        let verified = verify_replay(&path, &options.rules).unwrap();
        assert_eq!(verified.final_tick, 80);
        assert_eq!(verified.state_hash, run.state_hash);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_tampered_replay_desyncs() {
        let path = std::env::temp_dir().join("skirmish_tools_tampered.replay");
        run_simulation("tampered", fixtures::skirmish_1v1(), 30, Some(&path)).unwrap();
        let mut replay = Replay::load(&path).unwrap();
        replay.final_hash ^= 1;
        replay.save(&path).unwrap();

        let err = verify_replay(&path, &data("rules.ron")).unwrap_err();
        assert!(err.to_string().contains("Desync"), "{err}");
        let _ = std::fs::remove_file(&path);
    }
}
