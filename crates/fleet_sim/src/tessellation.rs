//! Bounded Voronoi tessellation.
//!
//! Every cell is the intersection of the bisector half-planes
//! `|x - p_i| <= |x - p_j|` against all other distinct sites. Construction
//! starts from a far square around the diagram centroid, so a cell that is
//! open in the unbounded diagram gets closed by synthetic far vertices lying
//! outward of its open ridges, at least twice the arena diagonal away. The
//! assembled ring is then wound by polar angle and clipped to the arena.

use crate::geometry::{Polygon, Rect, GEOM_EPS};
use glam::DVec2;

/// Sites closer than this are treated as coincident.
pub const COINCIDENT_EPS: f64 = 1e-9;

/// Result of one tessellation pass: one optional cell per input site,
/// in input order.
#[derive(Debug, Clone, Default)]
pub struct Tessellation {
    cells: Vec<Option<Polygon>>,
}

impl Tessellation {
    pub fn cells(&self) -> &[Option<Polygon>] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Option<Polygon>> {
        self.cells
    }

    pub fn cell(&self, site: usize) -> Option<&Polygon> {
        self.cells.get(site).and_then(Option::as_ref)
    }

    /// Number of sites that received a cell.
    pub fn owned(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// The square that stands in for infinity when closing open cells.
#[derive(Debug, Clone, Copy)]
struct FarFrame {
    center: DVec2,
    half_extent: f64,
}

impl FarFrame {
    /// Centred on the bounding box of the sites and the arena corners, so
    /// the square covers the arena even when every site lies outside it.
    fn around(sites: &[DVec2], bounds: &Rect) -> Self {
        let corners = bounds.corners();
        let points = || sites.iter().chain(corners.iter()).copied();
        let (lo, hi) = points().fold((bounds.min, bounds.max), |(lo, hi), p| (lo.min(p), hi.max(p)));
        let center = (lo + hi) * 0.5;
        let reach = points().map(|p| p.distance(center)).fold(0.0_f64, f64::max);
        let half_extent = 2.0 * bounds.diagonal().max(1.0) + reach;
        Self { center, half_extent }
    }

    fn square(&self) -> Polygon {
        let h = DVec2::splat(self.half_extent);
        Rect::new(self.center - h, self.center + h).to_polygon()
    }
}

/// Computes the clipped Voronoi cell of every site.
///
/// Fewer than two distinct sites yields no cells at all. For coincident
/// sites the first one in input order keeps the cell and the duplicates get
/// `None`. A cell that degenerates after clipping is also `None`.
pub fn tessellate(sites: &[DVec2], bounds: &Rect) -> Tessellation {
    let n = sites.len();
    let mut cells = vec![None; n];

    let distinct = distinct_sites(sites);
    if distinct.len() < 2 {
        return Tessellation { cells };
    }

    let kept: Vec<DVec2> = distinct.iter().map(|&i| sites[i]).collect();
    let frame = FarFrame::around(&kept, bounds);

    for (k, &site_idx) in distinct.iter().enumerate() {
        let ring = unbounded_cell(k, &kept, &frame);
        cells[site_idx] = bound_cell(ring, bounds);
    }

    Tessellation { cells }
}

/// Indices of sites that are not coincident with an earlier site.
fn distinct_sites(sites: &[DVec2]) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(sites.len());
    for (i, site) in sites.iter().enumerate() {
        if !site.is_finite() {
            continue;
        }
        let duplicate = kept
            .iter()
            .any(|&j| sites[j].distance(*site) <= COINCIDENT_EPS);
        if !duplicate {
            kept.push(i);
        }
    }
    kept
}

/// Site `k`'s cell in the unbounded diagram, closed by the far frame.
fn unbounded_cell(k: usize, sites: &[DVec2], frame: &FarFrame) -> Polygon {
    let p = sites[k];
    let mut ring = frame.square();
    for (j, q) in sites.iter().enumerate() {
        if j == k {
            continue;
        }
        // |x - p|^2 <= |x - q|^2  <=>  (q - p) . x <= (|q|^2 - |p|^2) / 2
        let normal = *q - p;
        let offset = (q.length_squared() - p.length_squared()) * 0.5;
        ring = ring.clip_half_plane(normal, offset);
        if ring.is_empty() {
            break;
        }
    }
    ring
}

fn bound_cell(ring: Polygon, bounds: &Rect) -> Option<Polygon> {
    if ring.len() < 3 {
        return None;
    }
    let clipped = ring.dedup().sorted_ccw().clip_to_rect(bounds).dedup();
    if clipped.is_valid_cell() && clipped.area() > GEOM_EPS {
        Some(clipped)
    } else {
        None
    }
}
