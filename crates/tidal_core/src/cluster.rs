//! Tidal structure of a star cluster orbiting in a host potential.

use crate::coordinates::PhaseSpacePosition;
use crate::error::{Result, TidalError};
use crate::potential::Potential;
use crate::units::{Dimension, Quantity, UnitSystem};
use nalgebra::Vector3;
use serde::Serialize;

/// Inner (L1) and outer (L2) Lagrange points of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagrangePoints {
    pub l1: Vector3<f64>,
    pub l2: Vector3<f64>,
}

/// Ω = x × v / |x|².
pub fn orbital_angular_velocity(x: &Vector3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    x.cross(v) / x.norm_squared()
}

pub fn orbital_angular_velocity_mag(x: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    orbital_angular_velocity(x, v).norm()
}

/// King (1962) tidal radius, r_t = (G m / (Ω² - d²Φ/dr²))^(1/3).
pub fn tidal_radius<P: Potential>(
    potential: &P,
    x: &Vector3<f64>,
    v: &Vector3<f64>,
    mass: f64,
    t: f64,
) -> f64 {
    let omega = orbital_angular_velocity_mag(x, v);
    let d2phi = potential.d2potential_dr2(x, t);
    (potential.units().g() * mass / (omega * omega - d2phi)).cbrt()
}

/// Points a tidal radius inside and outside the cluster along the radial
/// direction.
pub fn lagrange_points<P: Potential>(
    potential: &P,
    x: &Vector3<f64>,
    v: &Vector3<f64>,
    mass: f64,
    t: f64,
) -> LagrangePoints {
    let r_t = tidal_radius(potential, x, v, mass, t);
    let r_hat = x / x.norm();
    LagrangePoints {
        l1: x - r_hat * r_t,
        l2: x + r_hat * r_t,
    }
}

/// Position, velocity and time of a cluster in some potential's units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub x: Vector3<f64>,
    pub v: Vector3<f64>,
    pub t: f64,
}

impl From<(Vector3<f64>, Vector3<f64>, f64)> for Kinematics {
    fn from((x, v, t): (Vector3<f64>, Vector3<f64>, f64)) -> Self {
        Self { x, v, t }
    }
}

impl From<([f64; 3], [f64; 3], f64)> for Kinematics {
    fn from((x, v, t): ([f64; 3], [f64; 3], f64)) -> Self {
        Self {
            x: x.into(),
            v: v.into(),
            t,
        }
    }
}

impl Kinematics {
    /// Converts a single phase-space position into `units`.
    pub fn from_phase_space(w: &PhaseSpacePosition, units: &UnitSystem) -> Result<Self> {
        if w.len() != 1 {
            return Err(TidalError::usage(format!(
                "expected a single phase-space position, got a batch of {}",
                w.len()
            )));
        }
        let w = w.to_units(units);
        Ok(Self {
            x: w.q()[0],
            v: w.p()[0],
            t: w.t()[0],
        })
    }

    pub fn tidal_radius<P: Potential>(&self, potential: &P, mass: f64) -> f64 {
        tidal_radius(potential, &self.x, &self.v, mass, self.t)
    }

    pub fn lagrange_points<P: Potential>(&self, potential: &P, mass: f64) -> LagrangePoints {
        lagrange_points(potential, &self.x, &self.v, mass, self.t)
    }
}

/// Baumgardt (1998) half-mass relaxation time,
/// 0.138 sqrt(M r_hm³ / (G m_avg²)) / ln(0.4 M / m_avg).
pub fn relaxation_time(mass: f64, r_hm: f64, m_avg: f64, g: f64) -> f64 {
    0.138 * (mass * r_hm.powi(3) / (g * m_avg * m_avg)).sqrt() / (0.4 * mass / m_avg).ln()
}

/// [`relaxation_time`] from dimensioned inputs, returned in `units` time.
pub fn relaxation_time_in(
    units: &UnitSystem,
    mass: Quantity,
    r_hm: Quantity,
    m_avg: Quantity,
) -> Result<f64> {
    Ok(relaxation_time(
        units.decompose(mass, Dimension::MASS)?,
        units.decompose(r_hm, Dimension::LENGTH)?,
        units.decompose(m_avg, Dimension::MASS)?,
        units.g(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;
    use crate::potential::{CompositePotential, NfwPotential};
    use crate::units::Unit;

    fn solar_circle(units: &UnitSystem) -> Kinematics {
        let kms = units.convert(1.0, Unit::KM_PER_SECOND);
        Kinematics::from(([8.0, 0.0, 0.0], [0.0, 220.0 * kms, 0.0], 0.0))
    }

    #[test]
    fn milky_way_lagrange_points() {
        let units = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(units).expect("milky way");
        let lp = solar_circle(&units).lagrange_points(&mw, 1.0e4);
        assert!((lp.l1 - Vector3::new(7.97071, 0.0, 0.0)).norm() < 1e-4, "{lp:?}");
        assert!((lp.l2 - Vector3::new(8.02929, 0.0, 0.0)).norm() < 1e-4, "{lp:?}");
    }

    #[test]
    fn nfw_lagrange_points() {
        let units = UnitSystem::galactic();
        let nfw = NfwPotential::new(1.0e12, 15.0, units).expect("nfw");
        let lp = solar_circle(&units).lagrange_points(&nfw, 1.0e4);
        assert!((lp.l1.x - 7.96583).abs() < 1e-4, "{lp:?}");
        assert!((lp.l2.x - 8.03417).abs() < 1e-4, "{lp:?}");
        assert_eq!(lp.l1.y, 0.0);
    }

    #[test]
    fn lagrange_points_are_symmetric() {
        let units = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(units).expect("milky way");
        let x = Vector3::new(3.0, -6.0, 2.5);
        let v = Vector3::new(0.12, 0.08, -0.05);
        let r_t = tidal_radius(&mw, &x, &v, 5.0e4, 0.0);
        let lp = lagrange_points(&mw, &x, &v, 5.0e4, 0.0);
        assert!(r_t > 0.0);
        assert!(((lp.l2 - x).norm() - r_t).abs() < 1e-12);
        assert!(((x - lp.l1).norm() - r_t).abs() < 1e-12);
        assert!(lp.l1.norm() < x.norm() && lp.l2.norm() > x.norm());
    }

    #[test]
    fn zero_mass_collapses_to_the_cluster() {
        let units = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(units).expect("milky way");
        let kin = solar_circle(&units);
        assert_eq!(kin.tidal_radius(&mw, 0.0), 0.0);
        let lp = kin.lagrange_points(&mw, 0.0);
        assert_eq!(lp.l1, kin.x);
        assert_eq!(lp.l2, kin.x);
    }

    #[test]
    fn phase_space_adapter_converts_units() {
        let galactic = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(galactic).expect("milky way");
        let kpc = Unit::KILOPARSEC.si_scale();
        let w = PhaseSpacePosition::single(
            Vector3::new(8.0 * kpc, 0.0, 0.0),
            Vector3::new(0.0, 220.0e3, 0.0),
            0.0,
            UnitSystem::si(),
        );
        let kin = Kinematics::from_phase_space(&w, mw.units()).expect("single");
        let expected = solar_circle(&galactic).lagrange_points(&mw, 1.0e4);
        let lp = kin.lagrange_points(&mw, 1.0e4);
        assert!((lp.l1 - expected.l1).norm() < 1e-10);

        let batch = PhaseSpacePosition::concat(&[w.clone(), w]).expect("same units");
        assert_err_contains(Kinematics::from_phase_space(&batch, &galactic), "batch of 2");
    }

    #[test]
    fn non_finite_inputs_propagate() {
        let units = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(units).expect("milky way");
        let x = Vector3::new(f64::NAN, 0.0, 0.0);
        let lp = lagrange_points(&mw, &x, &Vector3::new(0.0, 0.2, 0.0), 1.0e4, 0.0);
        assert!(lp.l1.x.is_nan() && lp.l2.x.is_nan());
    }

    #[test]
    fn angular_velocity_of_circular_motion() {
        let x = Vector3::new(2.0, 0.0, 0.0);
        let v = Vector3::new(0.0, 0.5, 0.0);
        assert_eq!(orbital_angular_velocity(&x, &v), Vector3::new(0.0, 0.0, 0.25));
        assert_eq!(orbital_angular_velocity_mag(&x, &v), 0.25);
    }

    #[test]
    fn baumgardt_relaxation_time() {
        let units = UnitSystem::galactic();
        let t = relaxation_time(1.0e5, 5.0e-3, 0.5, units.g());
        assert!((t / 1288.678460583513 - 1.0).abs() < 1e-10);
        let t = relaxation_time_in(
            &units,
            Quantity::new(1.0e4, Unit::SOLAR_MASS),
            Quantity::new(10.0, Unit::PARSEC),
            Quantity::new(1.0, Unit::SOLAR_MASS),
        )
        .expect("dimensions match");
        assert!((t / 784.4738836725618 - 1.0).abs() < 1e-10);
        assert_err_contains(
            relaxation_time_in(
                &units,
                Quantity::new(1.0e4, Unit::PARSEC),
                Quantity::new(10.0, Unit::PARSEC),
                Quantity::new(1.0, Unit::SOLAR_MASS),
            ),
            "expected a mass quantity",
        );
    }
}
