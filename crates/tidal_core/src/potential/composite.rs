use super::{
    HernquistPotential, IsochronePotential, KeplerPotential, MiyamotoNagaiPotential,
    MultipoleInnerPotential, MultipoleOuterPotential, MultipolePotential, NfwPotential,
    NullPotential, PlummerPotential, Potential,
};
use crate::error::{Result, TidalError};
use crate::traits::Scalar;
use crate::units::{Quantity, Unit, UnitSystem};
use std::collections::BTreeSet;

/// Closed set of potentials, used wherever potentials are stored or chosen
/// at runtime (composites, configs, the stream generator).
#[derive(Debug, Clone)]
pub enum AnyPotential {
    Null(NullPotential),
    Kepler(KeplerPotential),
    Hernquist(HernquistPotential),
    Plummer(PlummerPotential),
    Isochrone(IsochronePotential),
    Nfw(NfwPotential),
    MiyamotoNagai(MiyamotoNagaiPotential),
    MultipoleInner(MultipoleInnerPotential),
    MultipoleOuter(MultipoleOuterPotential),
    Multipole(MultipolePotential),
    Composite(CompositePotential),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            AnyPotential::Null($p) => $body,
            AnyPotential::Kepler($p) => $body,
            AnyPotential::Hernquist($p) => $body,
            AnyPotential::Plummer($p) => $body,
            AnyPotential::Isochrone($p) => $body,
            AnyPotential::Nfw($p) => $body,
            AnyPotential::MiyamotoNagai($p) => $body,
            AnyPotential::MultipoleInner($p) => $body,
            AnyPotential::MultipoleOuter($p) => $body,
            AnyPotential::Multipole($p) => $body,
            AnyPotential::Composite($p) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for AnyPotential {
            fn from(p: $ty) -> Self {
                AnyPotential::$variant(p)
            }
        })*
    };
}

impl_from!(
    Null(NullPotential),
    Kepler(KeplerPotential),
    Hernquist(HernquistPotential),
    Plummer(PlummerPotential),
    Isochrone(IsochronePotential),
    Nfw(NfwPotential),
    MiyamotoNagai(MiyamotoNagaiPotential),
    MultipoleInner(MultipoleInnerPotential),
    MultipoleOuter(MultipoleOuterPotential),
    Multipole(MultipolePotential),
    Composite(CompositePotential),
);

impl Potential for AnyPotential {
    fn units(&self) -> &UnitSystem {
        dispatch!(self, p => p.units())
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        dispatch!(self, p => p.energy(q, t))
    }
}

/// A named sum of potentials sharing one unit system.
#[derive(Debug, Clone)]
pub struct CompositePotential {
    components: Vec<(String, AnyPotential)>,
    units: UnitSystem,
}

impl CompositePotential {
    pub fn new(components: Vec<(String, AnyPotential)>) -> Result<Self> {
        let Some((_, first)) = components.first() else {
            return Err(TidalError::config("composite potential needs at least one component"));
        };
        let units = *first.units();
        let mut seen = BTreeSet::new();
        for (name, component) in &components {
            if !seen.insert(name.as_str()) {
                return Err(TidalError::config(format!(
                    "duplicate component name \"{name}\""
                )));
            }
            if *component.units() != units {
                return Err(TidalError::config(format!(
                    "component \"{name}\" does not share the composite's unit system"
                )));
            }
        }
        Ok(Self { components, units })
    }

    /// Bovy (2015)-style Milky Way: disk, halo, bulge and nucleus.
    pub fn milky_way(units: UnitSystem) -> Result<Self> {
        let msun = |m| Quantity::new(m, Unit::SOLAR_MASS);
        let kpc = |l| Quantity::new(l, Unit::KILOPARSEC);
        Self::new(vec![
            (
                "disk".into(),
                MiyamotoNagaiPotential::new(msun(6.8e10), kpc(3.0), kpc(0.28), units)?.into(),
            ),
            (
                "halo".into(),
                NfwPotential::new(msun(5.4e11), kpc(15.62), units)?.into(),
            ),
            (
                "bulge".into(),
                HernquistPotential::new(msun(5.0e9), kpc(1.0), units)?.into(),
            ),
            (
                "nucleus".into(),
                HernquistPotential::new(msun(1.71e9), kpc(0.07), units)?.into(),
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&AnyPotential> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, &AnyPotential)> {
        self.components.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Potential for CompositePotential {
    fn units(&self) -> &UnitSystem {
        &self.units
    }

    fn energy<T: Scalar>(&self, q: &[T; 3], t: f64) -> T {
        self.components
            .iter()
            .fold(T::zero(), |acc, (_, p)| acc + p.energy(q, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;
    use nalgebra::Vector3;

    #[test]
    fn composite_is_sum_of_components() {
        let mw = CompositePotential::milky_way(UnitSystem::galactic()).expect("milky way");
        let q = Vector3::new(8.0, 0.5, 0.2);
        let parts: f64 = mw.components().map(|(_, p)| p.potential(&q, 0.0)).sum();
        assert!((mw.potential(&q, 0.0) - parts).abs() < 1e-15);
        let grad = mw
            .components()
            .fold(Vector3::zeros(), |acc, (_, p)| acc + p.gradient(&q, 0.0));
        assert!((mw.gradient(&q, 0.0) - grad).norm() < 1e-15);
        assert_eq!(mw.len(), 4);
        assert!(mw.get("halo").is_some());
        assert!(mw.get("bar").is_none());
    }

    #[test]
    fn milky_way_circular_speed_at_the_sun() {
        let units = UnitSystem::galactic();
        let mw = CompositePotential::milky_way(units).expect("milky way");
        let q = Vector3::new(8.0, 0.0, 0.0);
        let v_circ = (q.norm() * mw.gradient(&q, 0.0).x).sqrt();
        let km_s = units.convert(1.0, Unit::KM_PER_SECOND);
        let v_kms = v_circ / km_s;
        assert!(v_kms > 200.0 && v_kms < 260.0, "v_circ = {v_kms} km/s");
    }

    #[test]
    fn milky_way_in_other_units_is_the_same_field() {
        let galactic = CompositePotential::milky_way(UnitSystem::galactic()).expect("galactic");
        let si = CompositePotential::milky_way(UnitSystem::si()).expect("si");
        let kpc = Unit::KILOPARSEC.si_scale();
        let q = Vector3::new(8.0, 1.0, 0.5);
        let phi_g = galactic.potential(&q, 0.0);
        let phi_si = si.potential(&(q * kpc), 0.0);
        let factor = UnitSystem::galactic().factor_to(&UnitSystem::si(), crate::units::Dimension::SPECIFIC_ENERGY);
        assert!((phi_g * factor / phi_si - 1.0).abs() < 1e-10);
    }

    #[test]
    fn rejects_empty_duplicate_and_mixed_units() {
        let units = UnitSystem::galactic();
        assert_err_contains(CompositePotential::new(vec![]), "at least one component");

        let kepler = KeplerPotential::new(1.0, units).expect("kepler");
        assert_err_contains(
            CompositePotential::new(vec![
                ("a".into(), kepler.clone().into()),
                ("a".into(), kepler.clone().into()),
            ]),
            "duplicate component name \"a\"",
        );

        let other = KeplerPotential::new(1.0, UnitSystem::solar_system()).expect("kepler");
        assert_err_contains(
            CompositePotential::new(vec![
                ("a".into(), kepler.into()),
                ("b".into(), other.into()),
            ]),
            "component \"b\"",
        );
    }

    #[test]
    fn composites_nest() {
        let units = UnitSystem::galactic();
        let inner = CompositePotential::new(vec![(
            "point".into(),
            KeplerPotential::new(1.0e9, units).expect("kepler").into(),
        )])
        .expect("inner");
        let outer = CompositePotential::new(vec![
            ("nested".into(), inner.clone().into()),
            ("null".into(), NullPotential::new(units).into()),
        ])
        .expect("outer");
        let q = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(outer.potential(&q, 0.0), inner.potential(&q, 0.0));
    }
}
