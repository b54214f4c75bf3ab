//! Planar primitives: the arena rectangle and convex cell polygons.
//!
//! Polygons are stored as an ordered vertex ring without a repeated closing
//! vertex. Cells produced by the tessellation are convex and wound
//! counter-clockwise (y up).

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Tolerance used for degenerate-geometry decisions (area, coincidence).
pub const GEOM_EPS: f64 = 1e-9;

/// Axis-aligned rectangle. Used as the arena and as the tessellation clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// A rectangle anchored at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(DVec2::ZERO, DVec2::new(width, height))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Corners in counter-clockwise order starting at `min`.
    pub fn corners(&self) -> [DVec2; 4] {
        [
            self.min,
            DVec2::new(self.max.x, self.min.y),
            self.max,
            DVec2::new(self.min.x, self.max.y),
        ]
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.corners().to_vec())
    }
}

/// A closed polygon given by its vertex ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<DVec2>,
}

impl Polygon {
    pub fn new(vertices: Vec<DVec2>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Shoelace area; positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        self.edges().map(|(a, b)| a.perp_dot(b)).sum::<f64>() * 0.5
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Mean of the vertices.
    pub fn vertex_mean(&self) -> DVec2 {
        if self.vertices.is_empty() {
            return DVec2::ZERO;
        }
        self.vertices.iter().copied().sum::<DVec2>() / self.vertices.len() as f64
    }

    /// Area centroid. Falls back to the vertex mean for zero-area rings.
    pub fn centroid(&self) -> DVec2 {
        let area = self.signed_area();
        if area.abs() <= GEOM_EPS {
            return self.vertex_mean();
        }
        // Shift to a local origin to keep the products small.
        let origin = self.vertices[0];
        let mut acc = DVec2::ZERO;
        for (a, b) in self.edges() {
            let (a, b) = (a - origin, b - origin);
            acc += (a + b) * a.perp_dot(b);
        }
        origin + acc / (6.0 * area)
    }

    /// Point-in-polygon test. Points on the boundary are inside.
    pub fn contains(&self, p: DVec2) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        if self
            .edges()
            .any(|(a, b)| distance_to_segment(p, a, b) <= GEOM_EPS)
        {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Keeps the part of the polygon where `normal · x <= offset`
    /// (Sutherland–Hodgman against a single half-plane).
    pub fn clip_half_plane(&self, normal: DVec2, offset: f64) -> Polygon {
        let n = self.vertices.len();
        if n == 0 {
            return Polygon::new(Vec::new());
        }
        let side = |p: DVec2| normal.dot(p) - offset;
        let mut out = Vec::with_capacity(n + 1);
        for i in 0..n {
            let cur = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            let (dc, dn) = (side(cur), side(next));
            let (cur_in, next_in) = (dc <= 0.0, dn <= 0.0);
            if cur_in {
                out.push(cur);
            }
            if cur_in != next_in {
                let t = dc / (dc - dn);
                out.push(cur + (next - cur) * t);
            }
        }
        Polygon::new(out)
    }

    pub fn clip_to_rect(&self, rect: &Rect) -> Polygon {
        self.clip_half_plane(DVec2::NEG_X, -rect.min.x)
            .clip_half_plane(DVec2::X, rect.max.x)
            .clip_half_plane(DVec2::NEG_Y, -rect.min.y)
            .clip_half_plane(DVec2::Y, rect.max.y)
    }

    /// Reorders the vertices by polar angle about their mean
    /// (counter-clockwise).
    pub fn sorted_ccw(mut self) -> Polygon {
        let c = self.vertex_mean();
        self.vertices.sort_by(|a, b| {
            let ta = (a.y - c.y).atan2(a.x - c.x);
            let tb = (b.y - c.y).atan2(b.x - c.x);
            ta.total_cmp(&tb)
        });
        self
    }

    /// Drops consecutive vertices closer than `GEOM_EPS`, including the
    /// wrap-around pair.
    pub fn dedup(mut self) -> Polygon {
        self.vertices
            .dedup_by(|b, a| a.distance_squared(*b) <= GEOM_EPS * GEOM_EPS);
        while self.vertices.len() > 1 {
            let first = self.vertices[0];
            let last = self.vertices[self.vertices.len() - 1];
            if first.distance_squared(last) <= GEOM_EPS * GEOM_EPS {
                self.vertices.pop();
            } else {
                break;
            }
        }
        self
    }

    /// No two non-adjacent edges touch.
    pub fn is_simple(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let edges: Vec<_> = self.edges().collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                if adjacent {
                    continue;
                }
                if segments_intersect(edges[i].0, edges[i].1, edges[j].0, edges[j].1) {
                    return false;
                }
            }
        }
        true
    }

    /// Non-empty, non-degenerate, simple ring.
    pub fn is_valid_cell(&self) -> bool {
        self.vertices.len() >= 3 && self.area() > GEOM_EPS && self.is_simple()
    }
}

pub fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn orientation(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

fn on_segment(p: DVec2, a: DVec2, b: DVec2) -> bool {
    distance_to_segment(p, a, b) <= GEOM_EPS
}

fn segments_intersect(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    on_segment(p1, q1, q2) || on_segment(p2, q1, q2) || on_segment(q1, p1, p2) || on_segment(q2, p1, p2)
}
