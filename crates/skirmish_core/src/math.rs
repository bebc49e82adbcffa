//! Fixed-point math for the lockstep simulation.
//!
//! Positions are measured in leptons, 256 to a cell edge, stored as
//! [`Fixed`] so that fractional travel accumulates identically on every
//! peer. Facings use a 32-step compass with 0 pointing north (negative y)
//! and increasing clockwise.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// 32 integer bits and 32 fractional bits.
pub type Fixed = I32F32;

/// Leptons per cell edge.
pub const LEPTONS_PER_CELL: i32 = 256;

/// Half a cell in leptons; a cell center sits at `cell * 256 + 128`.
pub const HALF_CELL: i32 = LEPTONS_PER_CELL / 2;

/// Number of fine facing steps in a full turn.
pub const FACING_STEPS: u8 = 32;

/// √2 in I32F32 bits (1.41421356237 * 2^32).
pub const SQRT_2: Fixed = Fixed::from_bits(6_074_001_000);

/// Fixed-point 2D vector, in leptons when used as a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Values are written as their raw `i64` bits so snapshots round-trip
/// exactly.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Build a vector from whole lepton values.
    #[must_use]
    pub fn from_leptons(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Squared distance; use for comparisons to avoid a square root.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Straight-line distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Scale both components by a fixed-point factor.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Whole lepton coordinates, rounded toward negative infinity.
    #[must_use]
    pub fn to_leptons(self) -> (i32, i32) {
        (self.x.floor().to_num(), self.y.floor().to_num())
    }
}

/// Square root of a fixed-point number by binary search.
///
/// Pure integer arithmetic, so every platform produces the same bits.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = low + (high - low) / 2;
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

// ============================================================================
// Facing
// ============================================================================

/// sin(k * 11.25°) * 1024 for k in 0..=8.
const QUARTER_SINE: [i64; 9] = [0, 200, 392, 569, 724, 851, 946, 1004, 1024];

fn sine_1024(step: u8) -> i64 {
    let step = step % FACING_STEPS;
    let r = usize::from(step % 8);
    match step / 8 {
        0 => QUARTER_SINE[r],
        1 => QUARTER_SINE[8 - r],
        2 => -QUARTER_SINE[r],
        _ => -QUARTER_SINE[8 - r],
    }
}

/// Unit direction for a facing, scaled by 1024, as `(dx, dy)`.
#[must_use]
pub fn facing_vector(facing: u8) -> (i64, i64) {
    // North is negative y, so dy = -cos.
    let sin = sine_1024(facing);
    let cos = sine_1024(facing.wrapping_add(8));
    (sin, -cos)
}

/// Facing that best matches a movement vector.
///
/// Picks the compass step with the largest dot product; ties keep the lower
/// step. A zero vector yields `None`.
#[must_use]
pub fn facing_from_vector(delta: Vec2Fixed) -> Option<u8> {
    if delta == Vec2Fixed::ZERO {
        return None;
    }
    // Reduce to integer leptons with 8 fractional bits kept; plenty for 32 steps.
    let dx = delta.x.to_bits() >> 24;
    let dy = delta.y.to_bits() >> 24;
    if dx == 0 && dy == 0 {
        return None;
    }

    let mut best = 0u8;
    let mut best_dot = i64::MIN;
    for step in 0..FACING_STEPS {
        let (fx, fy) = facing_vector(step);
        let dot = dx * fx + dy * fy;
        if dot > best_dot {
            best_dot = dot;
            best = step;
        }
    }
    Some(best)
}

/// Signed shortest rotation from `from` to `to`, in `-16..=15`.
#[must_use]
pub fn facing_difference(from: u8, to: u8) -> i32 {
    let steps = i32::from(FACING_STEPS);
    let raw = (i32::from(to) - i32::from(from)).rem_euclid(steps);
    if raw >= steps / 2 {
        raw - steps
    } else {
        raw
    }
}

/// Rotate `from` toward `to` by at most `rate` steps.
#[must_use]
pub fn rotate_toward(from: u8, to: u8, rate: u8) -> u8 {
    let diff = facing_difference(from, to);
    let rate = i32::from(rate);
    let step = diff.clamp(-rate, rate);
    let next = (i32::from(from) + step).rem_euclid(i32::from(FACING_STEPS));
    // rem_euclid keeps the value in 0..32.
    u8::try_from(next).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_leptons(3, 0);
        let b = Vec2Fixed::from_leptons(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert_eq!(a.distance(b), Fixed::from_num(5));
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_sqrt_two_constant() {
        let computed = fixed_sqrt(Fixed::from_num(2));
        let diff = (computed - SQRT_2).abs();
        assert!(diff < Fixed::from_num(1) / Fixed::from_num(1_000_000));
    }

    #[test]
    fn test_facing_cardinals() {
        assert_eq!(facing_from_vector(Vec2Fixed::from_leptons(0, -10)), Some(0));
        assert_eq!(facing_from_vector(Vec2Fixed::from_leptons(10, 0)), Some(8));
        assert_eq!(facing_from_vector(Vec2Fixed::from_leptons(0, 10)), Some(16));
        assert_eq!(facing_from_vector(Vec2Fixed::from_leptons(-10, 0)), Some(24));
        assert_eq!(facing_from_vector(Vec2Fixed::from_leptons(10, 10)), Some(12));
        assert_eq!(facing_from_vector(Vec2Fixed::ZERO), None);
    }

    #[test]
    fn test_facing_difference_wraps() {
        assert_eq!(facing_difference(0, 4), 4);
        assert_eq!(facing_difference(4, 0), -4);
        assert_eq!(facing_difference(30, 2), 4);
        assert_eq!(facing_difference(2, 30), -4);
        assert_eq!(facing_difference(0, 16), -16);
    }

    #[test]
    fn test_rotate_toward_limited() {
        assert_eq!(rotate_toward(0, 16, 3), 29);
        assert_eq!(rotate_toward(0, 8, 3), 3);
        assert_eq!(rotate_toward(0, 2, 3), 2);
        assert_eq!(rotate_toward(31, 1, 5), 1);
    }
}
