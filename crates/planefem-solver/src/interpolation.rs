//! Isoparametric interpolation for 2-D elements.
//!
//! Jacobian convention:
//!
//! ```text
//! J = [ dx/dξ  dy/dξ ]
//!     [ dx/dη  dy/dη ]
//! ```
//!
//! so that global derivatives are `dN/dx = dN/dξ · J⁻ᵀ`.

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use crate::quadrature::ElementShape;

const INVERSE_MAP_MAX_ITER: usize = 25;
const INVERSE_MAP_TOL: f64 = 1e-12;

/// Shape-function family of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolator {
    /// 3-node triangle, N = [ξ, η, 1 - ξ - η]
    LinearTriangle,
    /// 4-node quadrilateral, vertices at (-1,-1), (1,-1), (1,1), (-1,1)
    BilinearQuad,
}

impl Interpolator {
    pub fn for_shape(shape: ElementShape) -> Self {
        match shape {
            ElementShape::Triangle => Interpolator::LinearTriangle,
            ElementShape::Quadrilateral => Interpolator::BilinearQuad,
        }
    }

    pub fn num_nodes(self) -> usize {
        match self {
            Interpolator::LinearTriangle => 3,
            Interpolator::BilinearQuad => 4,
        }
    }

    /// Shape-function values at local coordinates
    pub fn eval_n(self, local: [f64; 2]) -> DVector<f64> {
        let [xi, eta] = local;
        match self {
            Interpolator::LinearTriangle => DVector::from_vec(vec![xi, eta, 1.0 - xi - eta]),
            Interpolator::BilinearQuad => DVector::from_vec(vec![
                0.25 * (1.0 - xi) * (1.0 - eta),
                0.25 * (1.0 + xi) * (1.0 - eta),
                0.25 * (1.0 + xi) * (1.0 + eta),
                0.25 * (1.0 - xi) * (1.0 + eta),
            ]),
        }
    }

    /// Local derivatives, one row per node: `[dN/dξ, dN/dη]`
    pub fn give_derivatives(self, local: [f64; 2]) -> DMatrix<f64> {
        let [xi, eta] = local;
        match self {
            Interpolator::LinearTriangle => {
                DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, -1.0, -1.0])
            }
            Interpolator::BilinearQuad => DMatrix::from_row_slice(
                4,
                2,
                &[
                    -0.25 * (1.0 - eta),
                    -0.25 * (1.0 - xi),
                    0.25 * (1.0 - eta),
                    -0.25 * (1.0 + xi),
                    0.25 * (1.0 + eta),
                    0.25 * (1.0 + xi),
                    -0.25 * (1.0 + eta),
                    0.25 * (1.0 - xi),
                ],
            ),
        }
    }

    /// Jacobian of the local-to-global map
    pub fn jacobian(self, local: [f64; 2], coords: &[[f64; 3]]) -> Matrix2<f64> {
        let dn = self.give_derivatives(local);
        let mut j = Matrix2::zeros();
        for (i, c) in coords.iter().enumerate().take(self.num_nodes()) {
            j[(0, 0)] += dn[(i, 0)] * c[0];
            j[(0, 1)] += dn[(i, 0)] * c[1];
            j[(1, 0)] += dn[(i, 1)] * c[0];
            j[(1, 1)] += dn[(i, 1)] * c[1];
        }
        j
    }

    pub fn det_j(self, local: [f64; 2], coords: &[[f64; 3]]) -> f64 {
        self.jacobian(local, coords).determinant()
    }

    /// Global derivatives, one row per node: `[dN/dx, dN/dy]`.
    ///
    /// Returns `None` when the Jacobian is singular.
    pub fn eval_dndx(self, local: [f64; 2], coords: &[[f64; 3]]) -> Option<DMatrix<f64>> {
        let j_inv = self.jacobian(local, coords).try_inverse()?;
        let dn = self.give_derivatives(local);
        let n = self.num_nodes();

        let mut dndx = DMatrix::zeros(n, 2);
        for i in 0..n {
            let row = Vector2::new(dn[(i, 0)], dn[(i, 1)]);
            // row · J⁻ᵀ
            let g = j_inv * row;
            dndx[(i, 0)] = g[0];
            dndx[(i, 1)] = g[1];
        }
        Some(dndx)
    }

    /// Physical coordinates of a local point
    pub fn local_to_global(self, local: [f64; 2], coords: &[[f64; 3]]) -> [f64; 2] {
        let n = self.eval_n(local);
        let mut x = [0.0; 2];
        for (i, c) in coords.iter().enumerate().take(self.num_nodes()) {
            x[0] += n[i] * c[0];
            x[1] += n[i] * c[1];
        }
        x
    }

    /// Local coordinates of a physical point.
    ///
    /// Closed form for the triangle; Newton iteration on the isoparametric map
    /// for the quadrilateral. `None` if the map is singular or the iteration
    /// does not settle.
    pub fn global_to_local(self, point: [f64; 2], coords: &[[f64; 3]]) -> Option<[f64; 2]> {
        match self {
            Interpolator::LinearTriangle => {
                let [p1, p2, p3] = [coords.first()?, coords.get(1)?, coords.get(2)?];
                let a = Matrix2::new(p1[0] - p3[0], p2[0] - p3[0], p1[1] - p3[1], p2[1] - p3[1]);
                let rhs = Vector2::new(point[0] - p3[0], point[1] - p3[1]);
                let s = a.try_inverse()? * rhs;
                Some([s[0], s[1]])
            }
            Interpolator::BilinearQuad => {
                let scale = self.area(coords).abs().sqrt().max(f64::MIN_POSITIVE);
                let mut local = [0.0, 0.0];
                for _ in 0..INVERSE_MAP_MAX_ITER {
                    let x = self.local_to_global(local, coords);
                    let r = Vector2::new(point[0] - x[0], point[1] - x[1]);
                    if r.norm() <= INVERSE_MAP_TOL * scale {
                        return Some(local);
                    }
                    // d(x, y)/d(ξ, η) = Jᵀ
                    let step = self.jacobian(local, coords).transpose().try_inverse()? * r;
                    local[0] += step[0];
                    local[1] += step[1];
                }
                None
            }
        }
    }

    /// Signed area enclosed by the vertices (positive when counter-clockwise)
    pub fn area(self, coords: &[[f64; 3]]) -> f64 {
        let verts = &coords[..self.num_nodes().min(coords.len())];
        let mut twice = 0.0;
        for (i, a) in verts.iter().enumerate() {
            let b = verts[(i + 1) % verts.len()];
            twice += a[0] * b[1] - b[0] * a[1];
        }
        0.5 * twice
    }
}
