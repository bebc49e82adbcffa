//! Data validation utilities.
//!
//! A data directory holds `rules.ron` and, optionally, a `scenarios/`
//! directory of scenario files. Validation parses everything, checks the
//! rule tables' cross-references, and builds each scenario against the
//! rules so bad placements surface before a match does.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use skirmish_core::data::Rules;
use skirmish_core::scenario::Scenario;
use tracing::{debug, error, info};

use crate::error::ToolResult;

/// Rules file name inside a data directory.
pub const RULES_FILE: &str = "rules.ron";

/// Scenario directory name inside a data directory.
pub const SCENARIO_DIR: &str = "scenarios";

/// Outcome of validating a data directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Rules file that was checked.
    pub rules: PathBuf,
    /// Number of unit types.
    pub unit_types: usize,
    /// Number of building types.
    pub building_types: usize,
    /// Scenarios that built cleanly.
    pub scenarios: Vec<String>,
    /// Every problem found.
    pub problems: Vec<String>,
}

impl ValidationReport {
    /// True when nothing was wrong.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Load a rules file and check its cross-references.
///
/// Returns the rules along with every problem found.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn validate_rules(path: &Path) -> ToolResult<(Arc<Rules>, Vec<String>)> {
    let rules = Rules::load(path)?;
    let problems = match rules.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    };
    Ok((Arc::new(rules), problems))
}

/// Build one scenario file against `rules`.
///
/// # Errors
///
/// Returns an error if the scenario does not parse or does not build.
pub fn validate_scenario(path: &Path, rules: &Arc<Rules>) -> ToolResult<String> {
    let scenario = Scenario::load(path)?;
    let sim = scenario.build(Arc::clone(rules))?;
    debug!(
        scenario = %scenario.name,
        entities = sim.world().len(),
        "Scenario built"
    );
    Ok(scenario.name)
}

/// Validate all RON data files in a directory.
///
/// Problems in the rule tables or in individual scenarios are collected in
/// the report rather than returned as errors.
///
/// # Errors
///
/// Returns an error if the rules file cannot be read or parsed, or if the
/// scenario directory exists but cannot be listed.
pub fn validate_data_directory(dir: &Path) -> ToolResult<ValidationReport> {
    let rules_path = dir.join(RULES_FILE);
    let (rules, mut problems) = validate_rules(&rules_path)?;
    for problem in &problems {
        error!(path = %rules_path.display(), "{problem}");
    }

    let mut report = ValidationReport {
        rules: rules_path,
        unit_types: rules.units().count(),
        building_types: rules.buildings().count(),
        ..ValidationReport::default()
    };

    for path in scenario_files(&dir.join(SCENARIO_DIR))? {
        match validate_scenario(&path, &rules) {
            Ok(name) => report.scenarios.push(name),
            Err(e) => {
                error!(path = %path.display(), "{e}");
                problems.push(format!("{}: {e}", path.display()));
            }
        }
    }
    report.problems = problems;

    info!(
        units = report.unit_types,
        buildings = report.building_types,
        scenarios = report.scenarios.len(),
        problems = report.problems.len(),
        "Validation finished"
    );
    Ok(report)
}

/// Scenario files in name order; a missing directory has none.
fn scenario_files(dir: &Path) -> ToolResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
