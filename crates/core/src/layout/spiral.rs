//! Descending spiral with constant arc length between consecutive slots.
//!
//! The angular increment at slot `i` is `radius_start * angle_step / radius(i)`,
//! so `radius(i) * Δangle(i)` is the same for every `i` and neighbours stay
//! evenly spaced as the spiral widens.

use mosaic_protocol::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiralConfig {
    pub radius_start: f64,
    pub radius_growth: f64,
    pub angle_step: f64,
    pub height_step: f64,
    /// `>= 1` selects linear descent, `(0, 1)` geometric decay.
    pub height_decay: f64,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            radius_start: 4.0,
            radius_growth: 0.4,
            angle_step: 0.9,
            height_step: 0.4,
            height_decay: 0.985,
        }
    }
}

impl SpiralConfig {
    pub fn height_policy(&self) -> HeightPolicy {
        if self.height_decay >= 1.0 {
            HeightPolicy::Linear
        } else {
            HeightPolicy::Geometric
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightPolicy {
    /// `total * step * (1 - s / total)`: reaches zero at the last slot.
    Linear,
    /// `total * step * decay^s`: strictly positive, strictly decreasing.
    Geometric,
}

/// Pure slot → position mapping for one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiralGeometry {
    config: SpiralConfig,
    policy: HeightPolicy,
}

impl SpiralGeometry {
    pub fn new(config: SpiralConfig) -> Self {
        let policy = config.height_policy();
        Self { config, policy }
    }

    pub fn config(&self) -> &SpiralConfig {
        &self.config
    }

    pub fn policy(&self) -> HeightPolicy {
        self.policy
    }

    pub fn radius(&self, slot: usize) -> f64 {
        self.config.radius_start + slot as f64 * self.config.radius_growth
    }

    /// Instantaneous angular increment leaving `slot`.
    pub fn angle_step_at(&self, slot: usize) -> f64 {
        self.config.radius_start * self.config.angle_step / self.radius(slot)
    }

    /// Cumulative angle: sum of `angle_step_at(i)` for `i` in `0..slot`.
    ///
    /// Summed in slot order so the result is bit-identical however often it
    /// is re-queried.
    pub fn angle(&self, slot: usize) -> f64 {
        (0..slot).map(|i| self.angle_step_at(i)).sum()
    }

    pub fn height(&self, slot: usize, total_slots: usize) -> f64 {
        let total = total_slots.max(1) as f64;
        let top = total * self.config.height_step;
        match self.policy {
            HeightPolicy::Linear => top * (1.0 - slot as f64 / total),
            HeightPolicy::Geometric => top * self.config.height_decay.powf(slot as f64),
        }
    }

    pub fn position(&self, slot: usize, total_slots: usize) -> Vec3 {
        let angle = self.angle(slot);
        let radius = self.radius(slot);
        Vec3::new(
            angle.cos() * radius,
            self.height(slot, total_slots),
            angle.sin() * radius,
        )
    }

    /// Positions for slots `0..count`, computing the cumulative angle once.
    pub fn positions(&self, count: usize, total_slots: usize) -> Vec<Vec3> {
        let mut angle = 0.0_f64;
        (0..count)
            .map(|slot| {
                let radius = self.radius(slot);
                let p = Vec3::new(
                    angle.cos() * radius,
                    self.height(slot, total_slots),
                    angle.sin() * radius,
                );
                angle += self.angle_step_at(slot);
                p
            })
            .collect()
    }
}

impl Default for SpiralGeometry {
    fn default() -> Self {
        Self::new(SpiralConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometric() -> SpiralGeometry {
        SpiralGeometry::default()
    }

    fn linear() -> SpiralGeometry {
        SpiralGeometry::new(SpiralConfig {
            height_decay: 1.0,
            ..SpiralConfig::default()
        })
    }

    #[test]
    fn arc_length_per_step_is_constant() {
        let g = geometric();
        let expected = g.config().radius_start * g.config().angle_step;
        for slot in [0, 1, 7, 50, 400] {
            let arc = g.radius(slot) * g.angle_step_at(slot);
            assert!((arc - expected).abs() < 1e-9, "slot {slot}: {arc}");
        }
    }

    #[test]
    fn position_is_deterministic() {
        let g = geometric();
        for slot in 0..64 {
            let a = g.position(slot, 100);
            let b = g.position(slot, 100);
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.z.to_bits(), b.z.to_bits());
        }
    }

    #[test]
    fn radius_strictly_increases() {
        let g = geometric();
        for slot in 0..200 {
            assert!(g.radius(slot + 1) > g.radius(slot));
        }
    }

    #[test]
    fn growing_total_never_moves_xz() {
        let g = geometric();
        for slot in 0..30 {
            let before = g.position(slot, 30);
            let after = g.position(slot, 300);
            assert_eq!(before.x, after.x);
            assert_eq!(before.z, after.z);
        }
    }

    #[test]
    fn no_two_slots_share_xz() {
        let g = geometric();
        let points = g.positions(300, 300);
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                let d = ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt();
                assert!(d > 1e-6);
            }
        }
    }

    #[test]
    fn geometric_height_positive_and_decreasing() {
        let g = geometric();
        let mut prev = f64::INFINITY;
        for slot in 0..2_000 {
            let y = g.height(slot, 50);
            assert!(y > 0.0, "slot {slot} collapsed to {y}");
            assert!(y < prev);
            prev = y;
        }
    }

    #[test]
    fn linear_height_reaches_zero_at_total() {
        let g = linear();
        assert_eq!(g.policy(), HeightPolicy::Linear);
        assert!((g.height(0, 10) - 10.0 * 0.4).abs() < 1e-12);
        assert!(g.height(10, 10).abs() < 1e-12);
        assert!(g.height(3, 10) > g.height(4, 10));
    }

    #[test]
    fn bulk_positions_match_single_queries() {
        let g = geometric();
        let bulk = g.positions(40, 40);
        for (slot, p) in bulk.iter().enumerate() {
            let single = g.position(slot, 40);
            assert!(p.distance(single) < 1e-9);
        }
    }

    #[test]
    fn zero_total_slots_is_safe() {
        let g = linear();
        assert!(g.height(0, 0).is_finite());
    }
}
