//! Gauss quadrature tables and integration points.
//!
//! Rules are keyed by (element shape, point count):
//!
//! | Shape          | Points | Exact for          |
//! |----------------|--------|--------------------|
//! | Triangle       | 1      | linear             |
//! | Triangle       | 3      | quadratic          |
//! | Quadrilateral  | 1      | bilinear           |
//! | Quadrilateral  | 4      | bicubic (2×2)      |
//!
//! Triangle coordinates are area coordinates (ξ, η) with reference area 1/2;
//! quadrilateral coordinates span [-1, 1]².

use std::fmt;

use crate::error::{FemError, Result};
use crate::materials::MaterialStatus;

/// Reference shape of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementShape {
    Triangle,
    Quadrilateral,
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementShape::Triangle => f.write_str("triangle"),
            ElementShape::Quadrilateral => f.write_str("quadrilateral"),
        }
    }
}

/// An integration point with its own material state
#[derive(Debug, Clone, PartialEq)]
pub struct GaussPoint {
    /// Position within the element's rule
    pub index: usize,
    /// Local coordinates (ξ, η)
    pub local: [f64; 2],
    /// Quadrature weight
    pub weight: f64,
    /// Material state, created by `Element::create_material_statuses`
    pub status: Option<MaterialStatus>,
}

/// Ordered set of integration points for one element
#[derive(Debug, Clone, PartialEq)]
pub struct GaussIntegration {
    shape: ElementShape,
    points: Vec<GaussPoint>,
}

impl GaussIntegration {
    /// Build the rule for `shape` with `num_points` points.
    pub fn new(shape: ElementShape, num_points: usize) -> Result<Self> {
        let table = rule(shape, num_points).ok_or(FemError::MissingQuadrature {
            shape,
            points: num_points,
        })?;

        let points = table
            .into_iter()
            .enumerate()
            .map(|(index, (local, weight))| GaussPoint {
                index,
                local,
                weight,
                status: None,
            })
            .collect();

        Ok(Self { shape, points })
    }

    /// Point count used when an element does not request one.
    pub fn default_points(shape: ElementShape) -> usize {
        match shape {
            ElementShape::Triangle => 1,
            ElementShape::Quadrilateral => 4,
        }
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn points(&self) -> &[GaussPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [GaussPoint] {
        &mut self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn rule(shape: ElementShape, num_points: usize) -> Option<Vec<([f64; 2], f64)>> {
    let a = 1.0 / 3.0_f64.sqrt();
    match (shape, num_points) {
        (ElementShape::Triangle, 1) => Some(vec![([1.0 / 3.0, 1.0 / 3.0], 0.5)]),
        (ElementShape::Triangle, 3) => Some(vec![
            ([1.0 / 6.0, 1.0 / 6.0], 1.0 / 6.0),
            ([2.0 / 3.0, 1.0 / 6.0], 1.0 / 6.0),
            ([1.0 / 6.0, 2.0 / 3.0], 1.0 / 6.0),
        ]),
        (ElementShape::Quadrilateral, 1) => Some(vec![([0.0, 0.0], 4.0)]),
        // counter-clockwise from (-,-)
        (ElementShape::Quadrilateral, 4) => Some(vec![
            ([-a, -a], 1.0),
            ([a, -a], 1.0),
            ([a, a], 1.0),
            ([-a, a], 1.0),
        ]),
        _ => None,
    }
}
