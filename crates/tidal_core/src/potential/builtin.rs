use super::{radius, Potential};
use crate::error::Result;
use crate::params::{ParamInput, Parameter};
use crate::traits::Scalar;
use crate::units::{Dimension, UnitSystem};

/// Φ = 0 everywhere.
#[derive(Debug, Clone)]
pub struct NullPotential {
    units: UnitSystem,
}

impl NullPotential {
    pub fn new(units: UnitSystem) -> Self {
        Self { units }
    }
}

impl Potential for NullPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, _q: &[T; 3], _t: f64) -> T {
        T::zero()
    }
}

/// Point mass, Φ = -G m / r.
#[derive(Debug, Clone)]
pub struct KeplerPotential {
    pub m_tot: Parameter,
    units: UnitSystem,
}

impl KeplerPotential {
    pub fn new(m_tot: impl Into<ParamInput>, units: UnitSystem) -> Result<Self> {
        Ok(Self {
            m_tot: m_tot.into().resolve("m_tot", Dimension::MASS, &units)?,
            units,
        })
    }
}

impl Potential for KeplerPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let gm = T::lit(self.units.g() * self.m_tot.value(t));
        -gm / radius(q)
    }
}

/// Hernquist (1990) sphere, Φ = -G m / (r + r_s).
#[derive(Debug, Clone)]
pub struct HernquistPotential {
    pub m_tot: Parameter,
    pub r_s: Parameter,
    units: UnitSystem,
}

impl HernquistPotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        r_s: impl Into<ParamInput>,
        units: UnitSystem,
    ) -> Result<Self> {
        Ok(Self {
            m_tot: m_tot.into().resolve("m_tot", Dimension::MASS, &units)?,
            r_s: r_s.into().resolve("r_s", Dimension::LENGTH, &units)?,
            units,
        })
    }
}

impl Potential for HernquistPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let gm = T::lit(self.units.g() * self.m_tot.value(t));
        let r_s = T::lit(self.r_s.value(t));
        -gm / (radius(q) + r_s)
    }
}

/// Plummer sphere, Φ = -G m / sqrt(r² + b²).
#[derive(Debug, Clone)]
pub struct PlummerPotential {
    pub m_tot: Parameter,
    pub b: Parameter,
    units: UnitSystem,
}

impl PlummerPotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        b: impl Into<ParamInput>,
        units: UnitSystem,
    ) -> Result<Self> {
        Ok(Self {
            m_tot: m_tot.into().resolve("m_tot", Dimension::MASS, &units)?,
            b: b.into().resolve("b", Dimension::LENGTH, &units)?,
            units,
        })
    }
}

impl Potential for PlummerPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let gm = T::lit(self.units.g() * self.m_tot.value(t));
        let b = self.b.value(t);
        let r2 = q[0] * q[0] + q[1] * q[1] + q[2] * q[2];
        -gm / (r2 + T::lit(b * b)).sqrt()
    }
}

/// Hénon isochrone, Φ = -G m / (b + sqrt(r² + b²)).
#[derive(Debug, Clone)]
pub struct IsochronePotential {
    pub m_tot: Parameter,
    pub b: Parameter,
    units: UnitSystem,
}

impl IsochronePotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        b: impl Into<ParamInput>,
        units: UnitSystem,
    ) -> Result<Self> {
        Ok(Self {
            m_tot: m_tot.into().resolve("m_tot", Dimension::MASS, &units)?,
            b: b.into().resolve("b", Dimension::LENGTH, &units)?,
            units,
        })
    }
}

impl Potential for IsochronePotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let gm = T::lit(self.units.g() * self.m_tot.value(t));
        let b = self.b.value(t);
        let r2 = q[0] * q[0] + q[1] * q[1] + q[2] * q[2];
        -gm / (T::lit(b) + (r2 + T::lit(b * b)).sqrt())
    }
}

/// Navarro-Frenk-White halo, Φ = -G m ln(1 + r/r_s) / r.
///
/// `m` is the scale mass, not a total mass (which diverges).
#[derive(Debug, Clone)]
pub struct NfwPotential {
    pub m: Parameter,
    pub r_s: Parameter,
    units: UnitSystem,
}

impl NfwPotential {
    pub fn new(m: impl Into<ParamInput>, r_s: impl Into<ParamInput>, units: UnitSystem) -> Result<Self> {
        Ok(Self {
            m: m.into().resolve("m", Dimension::MASS, &units)?,
            r_s: r_s.into().resolve("r_s", Dimension::LENGTH, &units)?,
            units,
        })
    }
}

impl Potential for NfwPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let r_s = self.r_s.value(t);
        let gm_over_rs = T::lit(self.units.g() * self.m.value(t) / r_s);
        let s = radius(q) / T::lit(r_s);
        -gm_over_rs * s.ln_1p() / s
    }
}

/// Miyamoto-Nagai (1975) disk,
/// Φ = -G m / sqrt(R² + (a + sqrt(z² + b²))²).
#[derive(Debug, Clone)]
pub struct MiyamotoNagaiPotential {
    pub m_tot: Parameter,
    pub a: Parameter,
    pub b: Parameter,
    units: UnitSystem,
}

impl MiyamotoNagaiPotential {
    pub fn new(
        m_tot: impl Into<ParamInput>,
        a: impl Into<ParamInput>,
        b: impl Into<ParamInput>,
        units: UnitSystem,
    ) -> Result<Self> {
        Ok(Self {
            m_tot: m_tot.into().resolve("m_tot", Dimension::MASS, &units)?,
            a: a.into().resolve("a", Dimension::LENGTH, &units)?,
            b: b.into().resolve("b", Dimension::LENGTH, &units)?,
            units,
        })
    }
}

impl Potential for MiyamotoNagaiPotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        let gm = T::lit(self.units.g() * self.m_tot.value(t));
        let a = T::lit(self.a.value(t));
        let b = self.b.value(t);
        let big_r2 = q[0] * q[0] + q[1] * q[1];
        let zb = (q[2] * q[2] + T::lit(b * b)).sqrt();
        let d = a + zb;
        -gm / (big_r2 + d * d).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;
    use crate::units::{Quantity, Unit};
    use nalgebra::Vector3;

    #[test]
    fn kepler_density_vanishes_away_from_origin() {
        let pot = KeplerPotential::new(1.0, UnitSystem::galactic()).expect("kepler");
        let q = Vector3::new(0.5, -1.0, 2.0);
        let g = pot.units().g();
        assert!((pot.potential(&q, 0.0) + g / q.norm()).abs() < 1e-24);
        assert!(pot.density(&q, 0.0).abs() < 1e-10);
    }

    #[test]
    fn plummer_central_density_matches_closed_form() {
        let (m, b) = (1.0e10, 2.0);
        let pot = PlummerPotential::new(m, b, UnitSystem::galactic()).expect("plummer");
        let rho0 = 3.0 * m / (4.0 * std::f64::consts::PI * b.powi(3));
        let q = Vector3::new(1e-3, 0.0, 0.0);
        assert!((pot.density(&q, 0.0) / rho0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn nfw_enclosed_mass_from_circular_velocity() {
        let (m, r_s) = (1.0e12, 15.0);
        let pot = NfwPotential::new(m, r_s, UnitSystem::galactic()).expect("nfw");
        let r = 30.0;
        let q = Vector3::new(r, 0.0, 0.0);
        let enclosed = r * r * pot.gradient(&q, 0.0).x / pot.units().g();
        let s = r / r_s;
        let expected = m * ((1.0 + s).ln() - s / (1.0 + s));
        assert!((enclosed / expected - 1.0).abs() < 1e-12);
    }

    #[test]
    fn miyamoto_nagai_reduces_to_plummer_when_a_is_zero() {
        let units = UnitSystem::galactic();
        let mn = MiyamotoNagaiPotential::new(1.0e10, 0.0, 0.5, units).expect("mn");
        let plummer = PlummerPotential::new(1.0e10, 0.5, units).expect("plummer");
        let q = Vector3::new(0.3, 1.1, -0.4);
        assert!((mn.potential(&q, 0.0) - plummer.potential(&q, 0.0)).abs() < 1e-15);
    }

    #[test]
    fn time_dependent_mass_scales_the_field() {
        let units = UnitSystem::galactic();
        let mass = Parameter::interpolated(vec![0.0, 100.0], vec![1.0e10, 2.0e10]).expect("series");
        let pot = HernquistPotential::new(mass, 1.0, units).expect("hernquist");
        let q = Vector3::new(2.0, 0.0, 0.0);
        let ratio = pot.potential(&q, 100.0) / pot.potential(&q, 0.0);
        assert!((ratio - 2.0).abs() < 1e-14);
        let mid = pot.potential(&q, 50.0) / pot.potential(&q, 0.0);
        assert!((mid - 1.5).abs() < 1e-14);
    }

    #[test]
    fn constructors_reject_wrong_dimensions() {
        let units = UnitSystem::galactic();
        assert_err_contains(
            HernquistPotential::new(
                Quantity::new(1.0, Unit::KILOPARSEC),
                1.0,
                units,
            ),
            "parameter \"m_tot\"",
        );
        assert_err_contains(
            NfwPotential::new(1.0e12, Quantity::new(1.0, Unit::GIGAYEAR), units),
            "expected a length quantity",
        );
    }

    #[test]
    fn null_potential_has_no_field() {
        let pot = NullPotential::new(UnitSystem::galactic());
        let q = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(pot.potential(&q, 0.0), 0.0);
        assert_eq!(pot.gradient(&q, 0.0), Vector3::zeros());
    }
}
