//! # Quadtree Implementation
//!
//! This is an implementation of a point quadtree, as described in [the wikipedia
//! article](https://en.wikipedia.org/wiki/Quadtree), supporting nearest neighbour queries. It is
//! used to find the closest obstacle to each cell when building distance fields.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of points per QuadTree
pub const CAPACITY: usize = 4;

/// Relative padding added to the half-width of a bounding quad so that points on the edges of the
/// box remain inside after rounding.
const BOUNDING_MARGIN: f64 = 1e-9;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Represents a quad with a centre and half-width. The quad includes its edges.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quad {
    centre: Vector2<f64>,
    half_width: f64
}

/// An implementation of a QuadTree
#[derive(Clone, Debug)]
pub struct QuadTree {
    /// The bounds of this node
    boundary: Quad,

    /// Points stored in this node
    points: Vec<Vector2<f64>>,

    /// Children of the node in the order north west, north east, south west, south east.
    children: Option<Box<[QuadTree; 4]>>,

    /// Number of points in this node and all its children
    len: usize
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum QuadTreeError {
    #[error("The given point {0} was not in the bounds of the quadtree {1:?}")]
    PointNotInBounds(Vector2<f64>, Quad),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Quad {
    /// Creates a new quad with the given `centre` and `half_width`.
    pub fn new(centre: Vector2<f64>, half_width: f64) -> Self {
        Self {
            centre,
            half_width
        }
    }

    /// Creates a square quad containing the axis aligned box between `min` and `max`.
    ///
    /// The quad is padded very slightly beyond the box, so every point of the box including its
    /// edges is contained.
    pub fn bounding(min: Vector2<f64>, max: Vector2<f64>) -> Self {
        let extent = max - min;
        let scale = 1.0 + min[0].abs().max(min[1].abs()).max(max[0].abs()).max(max[1].abs());

        Self::new(
            (min + max) / 2.0,
            extent[0].max(extent[1]) / 2.0 + BOUNDING_MARGIN * scale
        )
    }

    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Returns `true` if `point` is inside this [`Quad`] or on its edge.
    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        (self.centre[0] - self.half_width) <= point[0]
        && (self.centre[0] + self.half_width) >= point[0]
        && (self.centre[1] - self.half_width) <= point[1]
        && (self.centre[1] + self.half_width) >= point[1]
    }

    /// Squared distance from `point` to the closest point of this [`Quad`], zero if the point is
    /// inside.
    pub fn dist_sq_to(&self, point: &Vector2<f64>) -> f64 {
        let dx = ((point[0] - self.centre[0]).abs() - self.half_width).max(0.0);
        let dy = ((point[1] - self.centre[1]).abs() - self.half_width).max(0.0);

        dx * dx + dy * dy
    }
}

impl QuadTree {
    pub fn new(boundary: Quad) -> Self {
        Self {
            boundary,
            points: Vec::new(),
            children: None,
            len: 0
        }
    }

    /// Number of points stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a point into the QuadTree.
    pub fn insert(&mut self, point: Vector2<f64>) -> Result<(), QuadTreeError> {

        // Check if it's in the tree
        if !self.boundary.contains(&point) {
            return Err(QuadTreeError::PointNotInBounds(point, self.boundary));
        }

        self.insert_unchecked(point);
        self.len += 1;

        Ok(())
    }

    /// Find the point in the tree closest to `point`, returning it along with its distance.
    ///
    /// `point` does not need to be inside the tree's boundary. Returns `None` if the tree is
    /// empty.
    pub fn nearest(&self, point: &Vector2<f64>) -> Option<(Vector2<f64>, f64)> {
        let mut best = None;

        self.nearest_recurse(point, &mut best);

        best.map(|(p, d_sq)| (p, d_sq.sqrt()))
    }

    fn insert_unchecked(&mut self, point: Vector2<f64>) {
        // If there's a space in the tree and its's not been divided add it to the points list
        if self.points.len() < CAPACITY && self.children.is_none() {
            self.points.push(point);
            return
        }

        // Otherwise subdivide if needed
        if self.children.is_none() {
            self.subdivide();
        }

        // And add the point to the first quad it will fit into. Rounding in the children's
        // bounds can leave a point on a shared edge outside all of them, in which case it goes to
        // the closest child.
        if let Some(ref mut children) = self.children {
            let index = match children.iter().position(|c| c.boundary.contains(&point)) {
                Some(i) => i,
                None => closest_child(children, &point)
            };

            children[index].insert_unchecked(point);
            children[index].len += 1;
        }
    }

    fn nearest_recurse(&self, point: &Vector2<f64>, best: &mut Option<(Vector2<f64>, f64)>) {
        // Prune this node if it can't contain anything closer than the current best
        if let Some((_, best_d_sq)) = *best {
            if self.boundary.dist_sq_to(point) > best_d_sq {
                return
            }
        }

        for p in self.points.iter() {
            let d_sq = (p - point).norm_squared();
            match *best {
                Some((_, best_d_sq)) if best_d_sq <= d_sq => (),
                _ => *best = Some((*p, d_sq))
            }
        }

        if let Some(ref children) = self.children {
            // Visit the closest children first so that pruning is most effective
            let mut order: [(f64, usize); 4] = [(0.0, 0); 4];
            for (i, child) in children.iter().enumerate() {
                order[i] = (child.boundary.dist_sq_to(point), i);
            }
            order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            for (_, i) in order.iter() {
                children[*i].nearest_recurse(point, best);
            }
        }
    }

    fn subdivide(&mut self) {
        let hw = self.boundary.half_width / 2.0;
        let centre = self.boundary.centre;

        self.children = Some(Box::new([
            QuadTree::new(Quad::new(centre + Vector2::new(-hw, hw), hw)),
            QuadTree::new(Quad::new(centre + Vector2::new(hw, hw), hw)),
            QuadTree::new(Quad::new(centre + Vector2::new(-hw, -hw), hw)),
            QuadTree::new(Quad::new(centre + Vector2::new(hw, -hw), hw)),
        ]));
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Index of the child whose boundary is closest to `point`.
fn closest_child(children: &[QuadTree; 4], point: &Vector2<f64>) -> usize {
    let mut best = 0;

    for (i, child) in children.iter().enumerate().skip(1) {
        if child.boundary.dist_sq_to(point) < children[best].boundary.dist_sq_to(point) {
            best = i;
        }
    }

    best
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_tree() -> (QuadTree, Vec<Vector2<f64>>) {
        let mut qt = QuadTree::new(Quad::new(Vector2::new(5.0, 5.0), 5.0));
        let mut points = Vec::new();

        // Deterministic scatter of points over the boundary, including its edges
        for i in 0..=20 {
            for j in 0..=20 {
                if (i * 7 + j * 3) % 5 == 0 {
                    let p = Vector2::new(i as f64 * 0.5, j as f64 * 0.5);
                    qt.insert(p).unwrap();
                    points.push(p);
                }
            }
        }

        (qt, points)
    }

    #[test]
    fn test_insert() {
        let (qt, points) = grid_tree();

        assert_eq!(qt.len(), points.len());
        assert!(matches!(
            QuadTree::new(Quad::new(Vector2::zeros(), 1.0)).insert(Vector2::new(2.0, 0.0)),
            Err(QuadTreeError::PointNotInBounds(_, _))
        ));
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let (qt, points) = grid_tree();

        for k in 0..100 {
            // Query points inside and outside the boundary
            let q = Vector2::new(
                -2.0 + (k as f64 * 0.37) % 14.0,
                -2.0 + (k as f64 * 0.61) % 14.0
            );

            let brute = points
                .iter()
                .map(|p| (p - q).norm())
                .fold(f64::INFINITY, f64::min);

            let (_, d) = qt.nearest(&q).unwrap();
            assert_relative_eq!(d, brute, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_nearest_empty() {
        let qt = QuadTree::new(Quad::new(Vector2::zeros(), 1.0));
        assert!(qt.is_empty());
        assert!(qt.nearest(&Vector2::zeros()).is_none());
    }

    #[test]
    fn test_quad_bounding() {
        let q = Quad::bounding(Vector2::new(0.0, 0.0), Vector2::new(4.0, 2.0));

        assert!(q.contains(&Vector2::new(0.0, 0.0)));
        assert!(q.contains(&Vector2::new(4.0, 2.0)));
        assert_relative_eq!(q.dist_sq_to(&Vector2::new(7.0, 1.0)), 9.0, epsilon = 1e-6);
        assert!(q.half_width() > 2.0 && q.half_width() < 2.0 + 1e-6);
    }

    #[test]
    fn test_quad_bounding_cell_centres() {
        // Centres of the corner cells of grids with 5 cm cells, computed the same way an
        // occupancy grid does. The midpoint of these rounds away from the true centre.
        for &(nx, ny) in [(100usize, 80usize), (160, 120)].iter() {
            let centre = |x: usize, y: usize| {
                Vector2::new((x as f64 + 0.5) * 0.05, (y as f64 + 0.5) * 0.05)
            };
            let corners = [
                centre(0, 0),
                centre(nx - 1, 0),
                centre(0, ny - 1),
                centre(nx - 1, ny - 1)
            ];

            let mut qt = QuadTree::new(Quad::bounding(corners[0], corners[3]));
            for c in corners.iter() {
                qt.insert(*c).unwrap();
            }
            // Enough points along the bottom edge to force subdivision
            for x in 0..nx {
                qt.insert(centre(x, 0)).unwrap();
            }

            assert_eq!(qt.len(), 4 + nx);
            let (p, d) = qt.nearest(&Vector2::new(-1.0, -1.0)).unwrap();
            assert_eq!(p, centre(0, 0));
            assert_relative_eq!(d, (centre(0, 0) - Vector2::new(-1.0, -1.0)).norm());
        }
    }
}
