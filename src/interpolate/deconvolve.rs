//! Fourier-space deconvolution of the assignment window.

use super::AssignmentMethod;
use crate::mesh::MeshGrid;
use crate::FloatType;
use std::f64::consts::PI;

/// Divide the Fourier grid by the window of the order-p B-spline
/// assignment, `W(k) = prod_d sinc(pi/2 * k_d / k_ny)^p` with
/// `k_ny = pi * M` and `sinc(0) = 1`. This inverts the smoothing the
/// scatter applied to the density field.
pub fn deconvolve_assignment_window<const N: usize>(
    grid: &mut MeshGrid<N>,
    method: AssignmentMethod,
) {
    let order = method.order();
    let knyquist = PI * grid.nmesh() as f64;
    let _span =
        tracing::debug_span!("deconvolve_window", %method, nmesh = grid.nmesh()).entered();

    for index in grid.fourier_range() {
        let kvec = grid.wavevector_from_fourier_index(index);
        let mut sinc = 1.0;
        for k in kvec {
            let arg = 0.5 * PI * k / knyquist;
            sinc *= if arg == 0.0 { 1.0 } else { arg.sin() / arg };
        }
        let mut window = 1.0;
        for _ in 0..order {
            window *= sinc;
        }
        let value = grid.get_fourier_from_index(index);
        grid.set_fourier_from_index(index, value / window as FloatType);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use crate::ComplexType;

    #[test]
    fn zero_mode_untouched_and_nyquist_boosted() {
        let mut grid = MeshGrid::<2>::new(8, 0, 0, &LocalComm).unwrap();
        grid.set_status_real(false);
        grid.fill_fourier(ComplexType::new(1.0, 0.0));
        deconvolve_assignment_window(&mut grid, AssignmentMethod::Cic);
        // sinc(0) = 1: the DC mode stays put.
        assert_eq!(grid.get_fourier(&[0, 0]).re, 1.0);
        // At the last-axis Nyquist plane sinc = 2/pi, so dividing by the
        // squared window scales by (pi/2)^2.
        let expected = (PI / 2.0) * (PI / 2.0);
        assert!((grid.get_fourier(&[0, 4]).re as f64 - expected).abs() < 1e-12);
    }
}
