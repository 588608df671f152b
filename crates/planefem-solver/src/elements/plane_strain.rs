//! Plane-strain kinematics.

use nalgebra::DMatrix;

use crate::materials::VOIGT_SIZE;

/// Strain-displacement matrix B (4 × 2n) from global shape-function
/// derivatives `dndx` (n × 2).
///
/// Columns are ordered vertex-major, `[u_1, v_1, u_2, v_2, ...]`. Rows:
///
/// ```text
/// ε_xx = Σ dN_i/dx u_i
/// ε_yy = Σ dN_i/dy v_i
/// ε_zz = 0
/// γ_xy = Σ (dN_i/dy u_i + dN_i/dx v_i)
/// ```
pub fn strain_displacement(dndx: &DMatrix<f64>) -> DMatrix<f64> {
    let n = dndx.nrows();
    let mut b = DMatrix::zeros(VOIGT_SIZE, 2 * n);
    for i in 0..n {
        let dx = dndx[(i, 0)];
        let dy = dndx[(i, 1)];
        b[(0, 2 * i)] = dx;
        b[(1, 2 * i + 1)] = dy;
        b[(3, 2 * i)] = dy;
        b[(3, 2 * i + 1)] = dx;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_of_b() {
        let dndx = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = strain_displacement(&dndx);
        assert_eq!(b.shape(), (4, 4));
        assert_eq!(
            b,
            DMatrix::from_row_slice(
                4,
                4,
                &[
                    1.0, 0.0, 3.0, 0.0, //
                    0.0, 2.0, 0.0, 4.0, //
                    0.0, 0.0, 0.0, 0.0, //
                    2.0, 1.0, 4.0, 3.0,
                ]
            )
        );
    }
}
