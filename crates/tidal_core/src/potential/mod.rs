//! Gravitational potentials.
//!
//! A potential implements one thing: the scalar field Φ(q, t), generic over
//! the [`Scalar`] type. Every other field (gradient, Hessian, density, tidal
//! tensor) is obtained by evaluating that same function on dual numbers, so
//! the fields are consistent by construction.

mod builtin;
mod composite;
mod config;
mod multipole;

pub use builtin::{
    HernquistPotential, IsochronePotential, KeplerPotential, MiyamotoNagaiPotential,
    NfwPotential, NullPotential, PlummerPotential,
};
pub use composite::{AnyPotential, CompositePotential};
pub use config::{ParamConfig, PotentialConfig, PotentialKind};
pub use multipole::{MultipoleInnerPotential, MultipoleOuterPotential, MultipolePotential};

use crate::autodiff;
use crate::error::{Result, TidalError};
use crate::traits::Scalar;
use crate::units::UnitSystem;
use nalgebra::{Matrix3, Vector3};

/// A scalar gravitational potential Φ(q, t) in a fixed unit system.
pub trait Potential: Send + Sync {
    /// The unit system positions, times and parameters are expressed in.
    fn units(&self) -> &UnitSystem;

    /// Evaluates Φ at position `q` and time `t`.
    ///
    /// This is the only method implementors provide. It must be written
    /// generically so that dual-number evaluation yields exact derivatives.
    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T;

    fn potential(&self, q: &Vector3<f64>, t: f64) -> f64 {
        self.energy(&[q.x, q.y, q.z], t)
    }

    /// ∇Φ. The gravitational acceleration is its negative.
    fn gradient(&self, q: &Vector3<f64>, t: f64) -> Vector3<f64> {
        Vector3::from(autodiff::gradient(|x| self.energy(x, t), &[q.x, q.y, q.z]))
    }

    fn acceleration(&self, q: &Vector3<f64>, t: f64) -> Vector3<f64> {
        -self.gradient(q, t)
    }

    /// Second derivatives ∂²Φ/∂q_i∂q_j.
    fn hessian(&self, q: &Vector3<f64>, t: f64) -> Matrix3<f64> {
        let h = autodiff::hessian(|x| self.energy(x, t), &[q.x, q.y, q.z]);
        Matrix3::from_fn(|i, j| h[i][j])
    }

    fn laplacian(&self, q: &Vector3<f64>, t: f64) -> f64 {
        self.hessian(q, t).trace()
    }

    /// Mass density from Poisson's equation, ρ = ∇²Φ / 4πG.
    fn density(&self, q: &Vector3<f64>, t: f64) -> f64 {
        self.laplacian(q, t) / (4.0 * std::f64::consts::PI * self.units().g())
    }

    /// Trace-free tidal tensor, T = -(H - tr(H) I / 3).
    fn tidal_tensor(&self, q: &Vector3<f64>, t: f64) -> Matrix3<f64> {
        let h = self.hessian(q, t);
        let third_trace = h.trace() / 3.0;
        -(h - Matrix3::identity() * third_trace)
    }

    /// Curvature of Φ along the radial direction, r̂ᵀ H r̂.
    fn d2potential_dr2(&self, q: &Vector3<f64>, t: f64) -> f64 {
        let r_hat = q / q.norm();
        r_hat.dot(&(self.hessian(q, t) * r_hat))
    }

    fn potential_batch(&self, q: &[Vector3<f64>], t: &[f64]) -> Result<Vec<f64>> {
        map_batch(q, t, |x, ti| self.potential(x, ti))
    }

    fn gradient_batch(&self, q: &[Vector3<f64>], t: &[f64]) -> Result<Vec<Vector3<f64>>> {
        map_batch(q, t, |x, ti| self.gradient(x, ti))
    }

    fn density_batch(&self, q: &[Vector3<f64>], t: &[f64]) -> Result<Vec<f64>> {
        map_batch(q, t, |x, ti| self.density(x, ti))
    }

    fn hessian_batch(&self, q: &[Vector3<f64>], t: &[f64]) -> Result<Vec<Matrix3<f64>>> {
        map_batch(q, t, |x, ti| self.hessian(x, ti))
    }

    fn tidal_tensor_batch(&self, q: &[Vector3<f64>], t: &[f64]) -> Result<Vec<Matrix3<f64>>> {
        map_batch(q, t, |x, ti| self.tidal_tensor(x, ti))
    }
}

/// Length of the broadcast of two batch lengths; a length of one broadcasts.
pub fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    match (a, b) {
        (a, b) if a == b => Ok(a),
        (n, 1) | (1, n) => Ok(n),
        _ => Err(TidalError::usage(format!(
            "batch lengths {a} and {b} cannot be broadcast together"
        ))),
    }
}

/// Applies `f` pointwise over broadcast position and time batches.
pub fn map_batch<R>(
    q: &[Vector3<f64>],
    t: &[f64],
    f: impl Fn(&Vector3<f64>, f64) -> R,
) -> Result<Vec<R>> {
    let n = broadcast_len(q.len(), t.len())?;
    let qi = |i: usize| if q.len() == 1 { &q[0] } else { &q[i] };
    let ti = |i: usize| if t.len() == 1 { t[0] } else { t[i] };
    Ok((0..n).map(|i| f(qi(i), ti(i))).collect())
}

/// Euclidean radius of a generic position.
#[inline]
pub(crate) fn radius<T: Scalar>(q: &[T; 3]) -> T {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;
    use crate::params::CoefficientParameter;
    use crate::units::{Quantity, Unit};
    use nalgebra::DMatrix;

    fn hernquist() -> HernquistPotential {
        HernquistPotential::new(
            Quantity::new(1.0e12, Unit::SOLAR_MASS),
            Quantity::new(1.0, Unit::KILOPARSEC),
            UnitSystem::galactic(),
        )
        .expect("hernquist")
    }

    fn sample_potentials() -> Vec<AnyPotential> {
        let units = UnitSystem::galactic();
        let mut coeffs = DMatrix::zeros(3, 3);
        coeffs[(0, 0)] = -1.0;
        coeffs[(1, 0)] = 0.1;
        coeffs[(1, 1)] = -0.05;
        coeffs[(2, 1)] = 0.02;
        coeffs[(2, 2)] = 0.03;
        let mut t_coeffs = DMatrix::zeros(3, 3);
        t_coeffs[(1, 1)] = 0.04;
        t_coeffs[(2, 2)] = -0.02;
        vec![
            KeplerPotential::new(1.0e11, units).expect("kepler").into(),
            hernquist().into(),
            PlummerPotential::new(1.0e10, 2.0, units).expect("plummer").into(),
            IsochronePotential::new(5.0e10, 3.0, units).expect("isochrone").into(),
            NfwPotential::new(1.0e12, 15.0, units).expect("nfw").into(),
            MiyamotoNagaiPotential::new(6.8e10, 3.0, 0.28, units).expect("mn").into(),
            MultipoleOuterPotential::new(
                1.0e11,
                5.0,
                2,
                CoefficientParameter::from(coeffs.clone()),
                CoefficientParameter::from(t_coeffs.clone()),
                units,
            )
            .expect("outer")
            .into(),
            MultipoleInnerPotential::new(
                1.0e11,
                5.0,
                2,
                CoefficientParameter::from(coeffs.clone()),
                CoefficientParameter::from(t_coeffs.clone()),
                units,
            )
            .expect("inner")
            .into(),
            CompositePotential::milky_way(units).expect("milky way").into(),
        ]
    }

    fn numerical_gradient(p: &impl Potential, q: &Vector3<f64>, t: f64, h: f64) -> Vector3<f64> {
        Vector3::from_fn(|i, _| {
            let mut plus = *q;
            let mut minus = *q;
            plus[i] += h;
            minus[i] -= h;
            (p.potential(&plus, t) - p.potential(&minus, t)) / (2.0 * h)
        })
    }

    fn numerical_laplacian(p: &impl Potential, q: &Vector3<f64>, t: f64, h: f64) -> f64 {
        let centre = p.potential(q, t);
        (0..3)
            .map(|i| {
                let mut plus = *q;
                let mut minus = *q;
                plus[i] += h;
                minus[i] -= h;
                (p.potential(&plus, t) - 2.0 * centre + p.potential(&minus, t)) / (h * h)
            })
            .sum()
    }

    #[test]
    fn gradient_matches_finite_differences_for_all_potentials() {
        let q = Vector3::new(1.3, -2.1, 0.7);
        for pot in sample_potentials() {
            let exact = pot.gradient(&q, 0.0);
            let approx = numerical_gradient(&pot, &q, 0.0, 1e-5);
            let scale = exact.norm().max(1e-12);
            assert!(
                (exact - approx).norm() / scale < 1e-6,
                "{pot:?}: {exact:?} vs {approx:?}"
            );
            let accel = pot.acceleration(&q, 0.0);
            assert!((accel + approx).norm() / scale < 1e-6);
        }
    }

    #[test]
    fn density_obeys_poisson_for_all_potentials() {
        let q = Vector3::new(1.3, -2.1, 0.7);
        for pot in sample_potentials() {
            let g = pot.units().g();
            let exact = pot.density(&q, 0.0);
            let approx = numerical_laplacian(&pot, &q, 0.0, 1e-3) / (4.0 * std::f64::consts::PI * g);
            let scale = pot.hessian(&q, 0.0).amax() / (4.0 * std::f64::consts::PI * g);
            assert!((exact - approx).abs() / scale < 1e-5, "{pot:?}: {exact} vs {approx}");
        }
    }

    #[test]
    fn hernquist_matches_reference_values() {
        let pot = hernquist();
        let q = Vector3::new(1.0, 2.0, 3.0);
        assert!((pot.potential(&q, 0.0) + 0.94871936).abs() < 1e-8);

        let grad = pot.gradient(&q, 0.0);
        let expected = Vector3::new(0.05347411, 0.10694822, 0.16042233);
        assert!((grad - expected).amax() < 1e-8);

        assert!((pot.density(&q, 0.0) / 3.989933e8 - 1.0).abs() < 1e-6);

        let hess = pot.hessian(&q, 0.0);
        let expected = Matrix3::new(
            0.04362645, -0.01969533, -0.02954299,
            -0.01969533, 0.01408345, -0.05908599,
            -0.02954299, -0.05908599, -0.03515487,
        );
        assert!((hess - expected).amax() < 1e-8);
    }

    #[test]
    fn tidal_tensor_is_negative_trace_free_hessian() {
        let pot = hernquist();
        let q = Vector3::new(1.0, 2.0, 3.0);
        let tt = pot.tidal_tensor(&q, 0.0);
        let expected = -Matrix3::new(
            0.0361081, -0.01969533, -0.02954299,
            -0.01969533, 0.00656511, -0.05908599,
            -0.02954299, -0.05908599, -0.04267321,
        );
        assert!((tt - expected).amax() < 1e-7);
        assert!(tt.trace().abs() < 1e-14);
    }

    #[test]
    fn batch_evaluation_broadcasts_time() {
        let pot = hernquist();
        let qs = vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-4.0, 0.5, 1.0)];
        let values = pot.potential_batch(&qs, &[0.0]).expect("broadcast");
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], pot.potential(&qs[1], 0.0));

        let single = pot.gradient_batch(&qs[..1], &[0.0, 1.0, 2.0]).expect("broadcast");
        assert_eq!(single.len(), 3);

        assert_err_contains(pot.density_batch(&qs, &[0.0, 1.0, 2.0]), "cannot be broadcast");
    }

    #[test]
    fn non_finite_position_propagates() {
        let pot = hernquist();
        let q = Vector3::new(f64::NAN, 0.0, 1.0);
        assert!(pot.potential(&q, 0.0).is_nan());
        assert!(pot.gradient(&q, 0.0).iter().any(|v| v.is_nan()));
    }

    #[test]
    fn nan_time_propagates_through_interpolated_parameters() {
        let growing = crate::params::Parameter::interpolated(vec![0.0, 10.0], vec![1.0e12, 2.0e12])
            .expect("series");
        let pot = HernquistPotential::new(growing, 1.0, UnitSystem::galactic()).expect("hernquist");
        let q = Vector3::new(1.0, 2.0, 3.0);
        assert!(pot.potential(&q, 5.0).is_finite());
        assert!(pot.potential(&q, f64::NAN).is_nan());
        assert!(pot.gradient(&q, f64::NAN).iter().all(|v| v.is_nan()));
        assert!(pot.density(&q, f64::NAN).is_nan());
    }
}
