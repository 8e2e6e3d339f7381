//! Query shapes
//!
//! A look-ahead request carries an arbitrary 2D polygonal region in page
//! pixel space: any number of rings with even-odd fill, so disjoint parts
//! and holes both fall out of the same counting rule.

use crate::grid::PixelRect;

/// A point in page pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Polygonal query region: zero or more rings, even-odd fill.
///
/// Rings with fewer than three points carry no area and are ignored by
/// every query. Overlap tests are positive-area tests: a shape that only
/// touches a rectangle's border does not overlap it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryShape {
    rings: Vec<Vec<PixelPoint>>,
}

impl QueryShape {
    /// The empty region.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Axis-aligned rectangle region.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::polygon(vec![
            PixelPoint::new(min_x, min_y),
            PixelPoint::new(max_x, min_y),
            PixelPoint::new(max_x, max_y),
            PixelPoint::new(min_x, max_y),
        ])
    }

    /// Single-ring polygon region.
    pub fn polygon(points: Vec<PixelPoint>) -> Self {
        Self { rings: vec![points] }
    }

    /// Add a ring. Under even-odd fill an added ring inside the shape
    /// punches a hole; a disjoint ring adds a separate part.
    pub fn with_ring(mut self, points: Vec<PixelPoint>) -> Self {
        self.rings.push(points);
        self
    }

    pub fn rings(&self) -> &[Vec<PixelPoint>] {
        &self.rings
    }

    /// True when no ring carries area.
    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(|ring| ring.len() < 3)
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` over every ring, or
    /// `None` for an empty shape.
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for ring in self.rings.iter().filter(|ring| ring.len() >= 3) {
            for point in ring {
                bounds = Some(match bounds {
                    None => (point.x, point.y, point.x, point.y),
                    Some((x0, y0, x1, y1)) => {
                        (x0.min(point.x), y0.min(point.y), x1.max(point.x), y1.max(point.y))
                    }
                });
            }
        }
        bounds
    }

    /// Even-odd containment test.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in self.rings.iter().filter(|ring| ring.len() >= 3) {
            let mut j = ring.len() - 1;
            for i in 0..ring.len() {
                let (xi, yi) = (ring[i].x, ring[i].y);
                let (xj, yj) = (ring[j].x, ring[j].y);
                if (yi > y) != (yj > y) {
                    let x_cross = xj + (y - yj) * (xi - xj) / (yi - yj);
                    if x < x_cross {
                        inside = !inside;
                    }
                }
                j = i;
            }
        }
        inside
    }

    /// True when the shape and the rectangle share positive area.
    ///
    /// Either some ring edge passes through the rectangle's interior, or
    /// no edge does and the rectangle's center lies inside the region
    /// (the rectangle is then entirely inside or entirely outside).
    pub fn overlaps_rect(&self, rect: &PixelRect) -> bool {
        if rect.is_empty() {
            return false;
        }
        let (x0, y0) = (rect.min_x as f64, rect.min_y as f64);
        let (x1, y1) = (rect.max_x as f64, rect.max_y as f64);

        for ring in self.rings.iter().filter(|ring| ring.len() >= 3) {
            let mut j = ring.len() - 1;
            for i in 0..ring.len() {
                if segment_crosses_interior(ring[j], ring[i], x0, y0, x1, y1) {
                    return true;
                }
                j = i;
            }
        }

        self.contains_point((x0 + x1) * 0.5, (y0 + y1) * 0.5)
    }
}

/// Liang-Barsky clip of segment `a`-`b` against the open rectangle
/// interior. Segments lying on the border clip to zero area and report
/// false.
fn segment_crosses_interior(
    a: PixelPoint,
    b: PixelPoint,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    for (p, q) in [(-dx, a.x - x0), (dx, x1 - a.x), (-dy, a.y - y0), (dy, y1 - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return false;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
    }

    if t0 >= t1 {
        return false;
    }

    // The clipped midpoint must be strictly interior; this rejects
    // segments that only run along the border.
    let mx = a.x + dx * (t0 + t1) * 0.5;
    let my = a.y + dy * (t0 + t1) * 0.5;
    mx > x0 && mx < x1 && my > y0 && my < y1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(min_x: u64, min_y: u64, max_x: u64, max_y: u64) -> PixelRect {
        PixelRect::new(min_x, min_y, max_x, max_y)
    }

    #[test]
    fn empty_shape_has_no_bounds_and_no_overlap() {
        let shape = QueryShape::empty();
        assert!(shape.is_empty());
        assert_eq!(shape.bounding_box(), None);
        assert!(!shape.overlaps_rect(&rect(0, 0, 100, 100)));

        // A degenerate two-point "ring" carries no area either
        let degenerate = QueryShape::polygon(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(50.0, 50.0),
        ]);
        assert!(degenerate.is_empty());
        assert!(!degenerate.overlaps_rect(&rect(0, 0, 100, 100)));
    }

    #[test]
    fn rect_shape_reports_its_bounds() {
        let shape = QueryShape::rect(10.0, 20.0, 110.0, 220.0);
        assert!(!shape.is_empty());
        assert_eq!(shape.bounding_box(), Some((10.0, 20.0, 110.0, 220.0)));
    }

    #[test]
    fn contains_point_is_even_odd() {
        let shape = QueryShape::rect(0.0, 0.0, 100.0, 100.0)
            .with_ring(vec![
                PixelPoint::new(25.0, 25.0),
                PixelPoint::new(75.0, 25.0),
                PixelPoint::new(75.0, 75.0),
                PixelPoint::new(25.0, 75.0),
            ]);

        assert!(shape.contains_point(10.0, 50.0));
        assert!(!shape.contains_point(50.0, 50.0)); // inside the hole
        assert!(!shape.contains_point(150.0, 50.0));
    }

    #[test]
    fn overlap_requires_positive_area() {
        let shape = QueryShape::rect(0.0, 0.0, 100.0, 100.0);

        assert!(shape.overlaps_rect(&rect(50, 50, 150, 150)));
        assert!(shape.overlaps_rect(&rect(20, 20, 80, 80))); // rect inside shape
        // Contact along the x=100 border only
        assert!(!shape.overlaps_rect(&rect(100, 0, 200, 100)));
        // Corner contact at (100, 100) only
        assert!(!shape.overlaps_rect(&rect(100, 100, 200, 200)));
        assert!(!shape.overlaps_rect(&rect(200, 0, 300, 100)));
    }

    #[test]
    fn shape_entirely_inside_rect_overlaps() {
        let shape = QueryShape::rect(40.0, 40.0, 60.0, 60.0);
        assert!(shape.overlaps_rect(&rect(0, 0, 100, 100)));
    }

    #[test]
    fn disjoint_parts_are_all_part_of_the_region() {
        let shape = QueryShape::rect(0.0, 0.0, 10.0, 10.0).with_ring(vec![
            PixelPoint::new(200.0, 200.0),
            PixelPoint::new(210.0, 200.0),
            PixelPoint::new(210.0, 210.0),
            PixelPoint::new(200.0, 210.0),
        ]);

        assert!(shape.overlaps_rect(&rect(0, 0, 50, 50)));
        assert!(shape.overlaps_rect(&rect(190, 190, 250, 250)));
        assert!(!shape.overlaps_rect(&rect(50, 50, 150, 150)));
    }

    #[test]
    fn triangle_overlap_uses_true_geometry_not_the_bounding_box() {
        // Right triangle occupying the lower-left half of (0,0)-(100,100)
        let shape = QueryShape::polygon(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(100.0, 100.0),
            PixelPoint::new(0.0, 100.0),
        ]);

        // Bounding boxes intersect, but the triangle never enters the
        // upper-right quarter's interior beyond the diagonal.
        assert!(!shape.overlaps_rect(&rect(80, 0, 100, 20)));
        assert!(shape.overlaps_rect(&rect(0, 80, 20, 100)));
        assert!(shape.overlaps_rect(&rect(40, 40, 60, 60)));
    }
}
