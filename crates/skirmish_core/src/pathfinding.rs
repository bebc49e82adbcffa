//! A* search over the cell grid.
//!
//! Eight-way connectivity without corner cutting, octile heuristic with
//! unit cardinal cost and √2 diagonal cost, all in fixed point. The open
//! set is a binary heap ordered by lowest f-score and then by lowest cell
//! index, so equal-cost frontiers always expand in the same order on every
//! peer. The search gives up after a bounded number of expansions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use thiserror::Error;

use crate::grid::{CellCoord, Grid, Locomotion, DIRECTIONS};
use crate::math::{Fixed, SQRT_2};

/// Default expansion bound.
pub const DEFAULT_SEARCH_LIMIT: u32 = 1000;

/// Why a search failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// Start or goal lies off the map.
    #[error("start or goal outside the grid")]
    OutOfBounds,
    /// Goal cell cannot be entered with this locomotion.
    #[error("goal {0} is impassable")]
    Blocked(CellCoord),
    /// Open set ran dry.
    #[error("no route exists")]
    NoRoute,
    /// Expansion bound reached before the goal.
    #[error("search gave up after {0} expansions")]
    SearchExhausted(u32),
}

/// A frontier entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenNode {
    index: usize,
    f_score: Fixed,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both keys so the lowest f and
        // then the lowest cell index pop first.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance with D = 1 and D2 = √2.
#[must_use]
pub fn octile_heuristic(from: CellCoord, to: CellCoord) -> Fixed {
    let dx = (from.x - to.x).abs();
    let dy = (from.y - to.y).abs();
    let straight = Fixed::from_num(dx.max(dy) - dx.min(dy));
    let diagonal = Fixed::from_num(dx.min(dy)) * SQRT_2;
    straight + diagonal
}

/// Diagonal steps may not slip between two blocked orthogonal cells.
fn diagonal_allowed(grid: &Grid, from: CellCoord, dx: i32, dy: i32, locomotion: Locomotion) -> bool {
    if dx == 0 || dy == 0 {
        return true;
    }
    grid.is_passable(from.offset(dx, 0), locomotion) && grid.is_passable(from.offset(0, dy), locomotion)
}

/// Find a route from `start` to `goal`.
///
/// The returned path excludes the start cell and ends at the goal; it is
/// empty when the two coincide. The start cell itself need not be passable,
/// so units nudged onto odd terrain can still leave.
pub fn find_path(
    grid: &Grid,
    start: CellCoord,
    goal: CellCoord,
    locomotion: Locomotion,
    limit: u32,
) -> Result<Vec<CellCoord>, PathError> {
    let (Some(start_index), Some(goal_index)) = (grid.index(start), grid.index(goal)) else {
        return Err(PathError::OutOfBounds);
    };
    if !grid.is_passable(goal, locomotion) {
        return Err(PathError::Blocked(goal));
    }
    if start_index == goal_index {
        return Ok(Vec::new());
    }

    let cells = grid.len();
    let mut g_score = vec![Fixed::MAX; cells];
    let mut came_from = vec![usize::MAX; cells];
    let mut closed = vec![false; cells];
    let mut open = BinaryHeap::new();

    g_score[start_index] = Fixed::ZERO;
    open.push(OpenNode {
        index: start_index,
        f_score: octile_heuristic(start, goal),
    });

    let mut expansions = 0u32;
    while let Some(current) = open.pop() {
        if closed[current.index] {
            continue;
        }
        if current.index == goal_index {
            return Ok(reconstruct_path(grid, &came_from, start_index, goal_index));
        }
        if expansions >= limit {
            return Err(PathError::SearchExhausted(expansions));
        }
        expansions += 1;
        closed[current.index] = true;

        let here = grid.coord(current.index);
        let current_g = g_score[current.index];

        for &(dx, dy) in &DIRECTIONS {
            let next = here.offset(dx, dy);
            let Some(next_index) = grid.index(next) else {
                continue;
            };
            if closed[next_index] || !grid.is_passable(next, locomotion) {
                continue;
            }
            if !diagonal_allowed(grid, here, dx, dy, locomotion) {
                continue;
            }

            let step = if dx != 0 && dy != 0 { SQRT_2 } else { Fixed::ONE };
            let tentative = current_g + step;
            if tentative < g_score[next_index] {
                g_score[next_index] = tentative;
                came_from[next_index] = current.index;
                open.push(OpenNode {
                    index: next_index,
                    f_score: tentative + octile_heuristic(next, goal),
                });
            }
        }
    }

    Err(PathError::NoRoute)
}

fn reconstruct_path(grid: &Grid, came_from: &[usize], start: usize, goal: usize) -> Vec<CellCoord> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(grid.coord(current));
        current = came_from[current];
        if current == usize::MAX {
            break;
        }
    }
    path.reverse();
    path
}

/// Length of a cell path in cell units, diagonals counted as √2.
#[must_use]
pub fn path_cost(start: CellCoord, path: &[CellCoord]) -> Fixed {
    let mut cost = Fixed::ZERO;
    let mut previous = start;
    for &cell in path {
        let diagonal = cell.x != previous.x && cell.y != previous.y;
        cost += if diagonal { SQRT_2 } else { Fixed::ONE };
        previous = cell;
    }
    cost
}
