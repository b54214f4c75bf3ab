use crate::geometry::Rect;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Upper bound on the number of waypoints a lane sweep may generate.
pub const MAX_SWEEP_WAYPOINTS: usize = 100_000;

/// The scanning agent. Follows a fixed waypoint loop at constant speed and
/// reports items inside its sensor radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scanner {
    position: DVec2,
    waypoints: Vec<DVec2>,
    cursor: usize,
    speed: f64,
    sensor_radius: f64,
}

impl Scanner {
    pub fn new(position: DVec2, waypoints: Vec<DVec2>, speed: f64, sensor_radius: f64) -> Self {
        Self {
            position,
            waypoints,
            cursor: 0,
            speed,
            sensor_radius,
        }
    }

    /// Lane-sweep ("zigzag") path over `arena`.
    ///
    /// Lanes sit at `min.x + k * pitch` for `k = 0..=floor(width / pitch)`.
    /// Even lanes run up from `min.y + margin`, odd lanes run down from
    /// `max.y - margin`, one waypoint every `pitch`. The path stops at
    /// [`MAX_SWEEP_WAYPOINTS`].
    pub fn lane_sweep(arena: &Rect, pitch: f64, margin: f64) -> Vec<DVec2> {
        if !(pitch > 0.0) {
            return Vec::new();
        }
        let estimate = Self::lane_sweep_len(arena, pitch, margin);
        if estimate > MAX_SWEEP_WAYPOINTS as f64 {
            tracing::warn!(
                pitch,
                waypoints = estimate,
                max = MAX_SWEEP_WAYPOINTS,
                "Sweep pitch too fine; truncating path"
            );
        }
        let lanes = (arena.width() / pitch).floor() as usize + 1;
        let mut path = Vec::new();
        for k in 0..lanes {
            if path.len() >= MAX_SWEEP_WAYPOINTS {
                break;
            }
            let x = arena.min.x + k as f64 * pitch;
            if k % 2 == 0 {
                let mut y = arena.min.y + margin;
                while y < arena.max.y && path.len() < MAX_SWEEP_WAYPOINTS {
                    path.push(DVec2::new(x, y));
                    y += pitch;
                }
            } else {
                let mut y = arena.max.y - margin;
                while y > arena.min.y && path.len() < MAX_SWEEP_WAYPOINTS {
                    path.push(DVec2::new(x, y));
                    y -= pitch;
                }
            }
        }
        path
    }

    /// Waypoint count [`Scanner::lane_sweep`] would produce, computed without
    /// allocating. Returned as `f64` so absurd pitches cannot overflow.
    pub fn lane_sweep_len(arena: &Rect, pitch: f64, margin: f64) -> f64 {
        if !(pitch > 0.0) {
            return 0.0;
        }
        let lanes = (arena.width() / pitch).floor() + 1.0;
        let per_lane = ((arena.height() - margin) / pitch).ceil().max(0.0);
        lanes * per_lane
    }

    /// Moves one tick toward the current waypoint. Arrival snaps onto the
    /// waypoint and advances the cursor, wrapping after the last one.
    pub fn advance(&mut self) {
        let Some(&target) = self.waypoints.get(self.cursor) else {
            return;
        };
        let delta = target - self.position;
        let distance = delta.length();
        if distance > self.speed {
            self.position += delta / distance * self.speed;
        } else {
            self.position = target;
            self.cursor = (self.cursor + 1) % self.waypoints.len();
        }
    }

    pub fn detects(&self, point: DVec2) -> bool {
        self.position.distance(point) <= self.sensor_radius
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn waypoints(&self) -> &[DVec2] {
        &self.waypoints
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn sensor_radius(&self) -> f64 {
        self.sensor_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_sweep_zigzags_over_default_arena() {
        let arena = Rect::from_size(800.0, 800.0);
        let path = Scanner::lane_sweep(&arena, 200.0, 100.0);

        // Five lanes (x = 0, 200, ..., 800), four waypoints each.
        assert_eq!(path.len(), 20);
        assert_eq!(path[0], DVec2::new(0.0, 100.0));
        assert_eq!(path[3], DVec2::new(0.0, 700.0));
        assert_eq!(path[4], DVec2::new(200.0, 700.0));
        assert_eq!(path[7], DVec2::new(200.0, 100.0));
        assert_eq!(path[19], DVec2::new(800.0, 700.0));
    }

    #[test]
    fn non_positive_pitch_gives_empty_path() {
        let arena = Rect::from_size(10.0, 10.0);
        assert!(Scanner::lane_sweep(&arena, 0.0, 1.0).is_empty());
    }

    #[test]
    fn sweep_length_matches_generated_path() {
        let arena = Rect::from_size(800.0, 800.0);
        assert_eq!(Scanner::lane_sweep_len(&arena, 200.0, 100.0), 20.0);
        assert_eq!(Scanner::lane_sweep_len(&arena, 0.0, 100.0), 0.0);
        // About 2.2 million waypoints, well past the cap.
        assert!(Scanner::lane_sweep_len(&arena, 0.5, 100.0) > MAX_SWEEP_WAYPOINTS as f64);
    }

    #[test]
    fn fine_pitch_is_truncated_at_the_cap() {
        let arena = Rect::from_size(800.0, 800.0);
        let path = Scanner::lane_sweep(&arena, 0.5, 100.0);
        assert_eq!(path.len(), MAX_SWEEP_WAYPOINTS);
    }

    #[test]
    fn advance_snaps_onto_waypoint_and_wraps() {
        let path = vec![DVec2::new(10.0, 0.0), DVec2::new(10.0, 5.0)];
        let mut scanner = Scanner::new(DVec2::ZERO, path, 6.0, 1.0);

        scanner.advance();
        assert_eq!(scanner.position(), DVec2::new(6.0, 0.0));
        assert_eq!(scanner.cursor(), 0);

        scanner.advance();
        assert_eq!(scanner.position(), DVec2::new(10.0, 0.0));
        assert_eq!(scanner.cursor(), 1);

        scanner.advance();
        assert_eq!(scanner.position(), DVec2::new(10.0, 5.0));
        assert_eq!(scanner.cursor(), 0);
    }

    #[test]
    fn stationary_without_waypoints() {
        let mut scanner = Scanner::new(DVec2::new(1.0, 2.0), Vec::new(), 6.0, 1.0);
        scanner.advance();
        assert_eq!(scanner.position(), DVec2::new(1.0, 2.0));
    }

    #[test]
    fn detection_is_inclusive_at_sensor_radius() {
        let scanner = Scanner::new(DVec2::ZERO, Vec::new(), 1.0, 100.0);
        assert!(scanner.detects(DVec2::new(100.0, 0.0)));
        assert!(!scanner.detects(DVec2::new(100.1, 0.0)));
    }
}
