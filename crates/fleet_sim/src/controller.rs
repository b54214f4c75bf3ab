//! Velocity law and the two-phase force pass.
//!
//! Forces are computed from a frozen [`Body`] snapshot into a [`ForceBuffer`]
//! indexed by agent slot, then applied by the caller in a separate pass.
//! Nothing reads a position that has already moved this tick.

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frozen per-agent input to the force pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: DVec2,
    pub goal: DVec2,
    pub speed_limit: f64,
}

/// Unit vector toward `goal` scaled by `min(distance, speed_limit)`.
pub fn goal_seek(position: DVec2, goal: DVec2, speed_limit: f64) -> DVec2 {
    let delta = goal - position;
    let distance = delta.length();
    if distance > 0.0 {
        delta / distance * distance.min(speed_limit)
    } else {
        DVec2::ZERO
    }
}

/// Uniformly rescales `force` so its magnitude does not exceed `limit`.
pub fn clamp_speed(force: DVec2, limit: f64) -> DVec2 {
    let magnitude = force.length();
    if magnitude > limit && magnitude > 0.0 {
        force * (limit / magnitude)
    } else {
        force
    }
}

/// Short-range inverse-square repulsion between agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repulsion {
    pub gain: f64,
    pub radius: f64,
    pub epsilon: f64,
}

impl Default for Repulsion {
    fn default() -> Self {
        Self {
            gain: 1500.0,
            radius: 50.0,
            epsilon: 1e-8,
        }
    }
}

impl Repulsion {
    /// Force pushing `subject` away from `other`, if within range.
    /// `force(a, b) == -force(b, a)` exactly.
    pub fn force(&self, subject: DVec2, other: DVec2) -> Option<DVec2> {
        let separation = subject - other;
        let distance = separation.length();
        if distance > self.radius {
            return None;
        }
        let magnitude = self.gain / (distance * distance + self.epsilon);
        Some(separation / (distance + self.epsilon) * magnitude)
    }
}

/// Pluggable velocity law. One agent type, many behaviours.
pub trait VelocityPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn goal_term(&self, body: &Body) -> DVec2 {
        goal_seek(body.position, body.goal, body.speed_limit)
    }

    /// Action of `other` on `subject`. The force pass applies the negated
    /// value to `other` as the reaction.
    fn pair_force(&self, subject: &Body, other: &Body) -> Option<DVec2>;
}

/// Goal attraction plus pairwise repulsion.
#[derive(Debug, Clone, Copy)]
pub struct AttractRepel {
    pub repulsion: Repulsion,
}

impl VelocityPolicy for AttractRepel {
    fn name(&self) -> &'static str {
        "attract-repel"
    }

    fn pair_force(&self, subject: &Body, other: &Body) -> Option<DVec2> {
        self.repulsion.force(subject.position, other.position)
    }
}

/// Goal attraction only; agents pass through each other.
#[derive(Debug, Clone, Copy)]
pub struct AttractOnly;

impl VelocityPolicy for AttractOnly {
    fn name(&self) -> &'static str {
        "attract-only"
    }

    fn pair_force(&self, _subject: &Body, _other: &Body) -> Option<DVec2> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VelocityPolicyKind {
    #[default]
    AttractRepel,
    AttractOnly,
}

impl VelocityPolicyKind {
    pub fn build(self, repulsion: Repulsion) -> Box<dyn VelocityPolicy> {
        match self {
            VelocityPolicyKind::AttractRepel => Box::new(AttractRepel { repulsion }),
            VelocityPolicyKind::AttractOnly => Box::new(AttractOnly),
        }
    }
}

/// Per-tick force accumulator indexed by agent slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceBuffer {
    forces: Vec<DVec2>,
}

impl ForceBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            forces: vec![DVec2::ZERO; len],
        }
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn get(&self, slot: usize) -> DVec2 {
        self.forces.get(slot).copied().unwrap_or(DVec2::ZERO)
    }

    pub fn as_slice(&self) -> &[DVec2] {
        &self.forces
    }

    /// Adds body `slot`'s goal term and every action/reaction pair it
    /// initiates.
    fn accumulate_from(&mut self, policy: &dyn VelocityPolicy, bodies: &[Body], slot: usize) {
        let body = &bodies[slot];
        self.forces[slot] += policy.goal_term(body);
        for (other_slot, other) in bodies.iter().enumerate() {
            if other_slot == slot {
                continue;
            }
            if let Some(f) = policy.pair_force(body, other) {
                self.forces[slot] += f;
                self.forces[other_slot] -= f;
            }
        }
    }

    /// Sequential read-only fill over the frozen snapshot.
    pub fn fill(policy: &dyn VelocityPolicy, bodies: &[Body]) -> Self {
        let mut buffer = Self::zeroed(bodies.len());
        for slot in 0..bodies.len() {
            buffer.accumulate_from(policy, bodies, slot);
        }
        buffer
    }

    /// Parallel fill. Each worker folds into its own buffer; the buffers are
    /// summed once every worker is done.
    #[cfg(feature = "parallel")]
    pub fn fill_parallel(policy: &dyn VelocityPolicy, bodies: &[Body]) -> Self {
        use rayon::prelude::*;

        let n = bodies.len();
        (0..n)
            .into_par_iter()
            .fold(
                || Self::zeroed(n),
                |mut acc, slot| {
                    acc.accumulate_from(policy, bodies, slot);
                    acc
                },
            )
            .reduce(
                || Self::zeroed(n),
                |mut a, b| {
                    for (x, y) in a.forces.iter_mut().zip(b.forces) {
                        *x += y;
                    }
                    a
                },
            )
    }

    #[cfg(not(feature = "parallel"))]
    pub fn fill_parallel(policy: &dyn VelocityPolicy, bodies: &[Body]) -> Self {
        Self::fill(policy, bodies)
    }
}

/// Depot geometry. Delivering agents aim for a point on an arc around the
/// anchor so they do not all converge on one spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropZone {
    pub anchor: DVec2,
    pub radius: f64,
    pub arc_start_deg: f64,
    pub arc_end_deg: f64,
}

impl DropZone {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> DVec2 {
        let degrees = if self.arc_end_deg > self.arc_start_deg {
            rng.gen_range(self.arc_start_deg..self.arc_end_deg)
        } else {
            self.arc_start_deg
        };
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.anchor + DVec2::new(cos, sin) * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9
    }

    fn resting(x: f64, y: f64) -> Body {
        let p = DVec2::new(x, y);
        Body { position: p, goal: p, speed_limit: 4.0 }
    }

    #[test]
    fn goal_seek_decelerates_on_approach() {
        let far = goal_seek(DVec2::ZERO, DVec2::new(100.0, 0.0), 4.0);
        assert_eq!(far, DVec2::new(4.0, 0.0));
        let near = goal_seek(DVec2::ZERO, DVec2::new(1.5, 0.0), 4.0);
        assert_eq!(near, DVec2::new(1.5, 0.0));
        assert_eq!(goal_seek(DVec2::ONE, DVec2::ONE, 4.0), DVec2::ZERO);
    }

    #[test]
    fn clamp_preserves_direction() {
        let f = clamp_speed(DVec2::new(30.0, 40.0), 4.0);
        assert!(approx_eq(f.length(), 4.0));
        assert!(approx_eq(f.x / f.y, 0.75));
        assert_eq!(clamp_speed(DVec2::new(1.0, 1.0), 4.0), DVec2::new(1.0, 1.0));
    }

    #[test]
    fn repulsion_is_antisymmetric_and_ranged() {
        let r = Repulsion::default();
        let a = DVec2::new(10.0, 10.0);
        let b = DVec2::new(30.0, 25.0);
        let ab = r.force(a, b).expect("in range");
        let ba = r.force(b, a).expect("in range");
        assert_eq!(ab, -ba);
        assert!(ab.x < 0.0 && ab.y < 0.0, "pushes a away from b");
        assert!(r.force(a, DVec2::new(100.0, 100.0)).is_none());
    }

    #[test]
    fn force_buffer_reaction_is_equal_and_opposite() {
        let policy = AttractRepel { repulsion: Repulsion::default() };
        let bodies = [resting(0.0, 0.0), resting(20.0, 0.0)];
        let buffer = ForceBuffer::fill(&policy, &bodies);
        assert_eq!(buffer.get(0), -buffer.get(1));

        // Each ordered pair adds its action and its reaction.
        let single = Repulsion::default().force(bodies[0].position, bodies[1].position).unwrap();
        assert!(approx_eq(buffer.get(0).x, 2.0 * single.x));
    }

    #[test]
    fn attract_only_ignores_neighbours() {
        let bodies = [resting(0.0, 0.0), resting(1.0, 0.0)];
        let buffer = ForceBuffer::fill(&AttractOnly, &bodies);
        assert_eq!(buffer.get(0), DVec2::ZERO);
        assert_eq!(buffer.get(1), DVec2::ZERO);
    }

    #[test]
    fn parallel_fill_matches_sequential() {
        let policy = AttractRepel { repulsion: Repulsion::default() };
        let bodies: Vec<Body> = (0..16)
            .map(|i| Body {
                position: DVec2::new((i % 4) as f64 * 15.0, (i / 4) as f64 * 15.0),
                goal: DVec2::new(400.0, 400.0),
                speed_limit: 4.0,
            })
            .collect();
        let seq = ForceBuffer::fill(&policy, &bodies);
        let par = ForceBuffer::fill_parallel(&policy, &bodies);
        for slot in 0..bodies.len() {
            assert!(seq.get(slot).distance(par.get(slot)) <= 1e-6);
        }
    }

    #[test]
    fn drop_points_lie_on_the_arc() {
        let zone = DropZone {
            anchor: DVec2::new(800.0, 800.0),
            radius: 40.0,
            arc_start_deg: 180.0,
            arc_end_deg: 270.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = zone.sample(&mut rng);
            assert!(approx_eq(p.distance(zone.anchor), 40.0));
            assert!(p.x <= 800.0 + 1e-9 && p.y <= 800.0 + 1e-9);
        }
    }

    #[test]
    fn policy_kind_builds_named_policy() {
        let r = Repulsion::default();
        assert_eq!(VelocityPolicyKind::AttractRepel.build(r).name(), "attract-repel");
        assert_eq!(VelocityPolicyKind::AttractOnly.build(r).name(), "attract-only");
    }
}
