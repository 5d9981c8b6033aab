//! Unit systems and dimensional bookkeeping.
//!
//! Every potential evaluates in one fixed [`UnitSystem`]. Quantities given in
//! other units are converted through SI scale factors when a potential is
//! built, so the numerical kernels only ever see plain `f64`s.

use crate::error::{Result, TidalError};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Newtonian gravitational constant in m^3 kg^-1 s^-2 (CODATA 2018).
pub const G_SI: f64 = 6.6743e-11;

/// Exponents of the four base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub angle: i8,
}

impl Dimension {
    pub const fn new(length: i8, mass: i8, time: i8, angle: i8) -> Self {
        Self {
            length,
            mass,
            time,
            angle,
        }
    }

    pub const DIMENSIONLESS: Dimension = Dimension::new(0, 0, 0, 0);
    pub const LENGTH: Dimension = Dimension::new(1, 0, 0, 0);
    pub const MASS: Dimension = Dimension::new(0, 1, 0, 0);
    pub const TIME: Dimension = Dimension::new(0, 0, 1, 0);
    pub const ANGLE: Dimension = Dimension::new(0, 0, 0, 1);
    pub const SPEED: Dimension = Dimension::new(1, 0, -1, 0);
    pub const ACCELERATION: Dimension = Dimension::new(1, 0, -2, 0);
    pub const SPECIFIC_ENERGY: Dimension = Dimension::new(2, 0, -2, 0);
    pub const MASS_DENSITY: Dimension = Dimension::new(-3, 1, 0, 0);
    pub const FREQUENCY_SQUARED: Dimension = Dimension::new(0, 0, -2, 0);

    pub fn name(&self) -> String {
        match *self {
            Self::DIMENSIONLESS => "dimensionless".into(),
            Self::LENGTH => "length".into(),
            Self::MASS => "mass".into(),
            Self::TIME => "time".into(),
            Self::ANGLE => "angle".into(),
            Self::SPEED => "speed".into(),
            Self::ACCELERATION => "acceleration".into(),
            Self::SPECIFIC_ENERGY => "specific energy".into(),
            Self::MASS_DENSITY => "mass density".into(),
            d => format!(
                "L^{} M^{} T^{} A^{}",
                d.length, d.mass, d.time, d.angle
            ),
        }
    }
}

/// A named unit: an SI scale factor attached to a dimension.
///
/// Units (de)serialize as their names, e.g. `"kpc"` or `"km/s"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "String")]
pub struct Unit {
    name: &'static str,
    dimension: Dimension,
    scale: f64,
}

const PARSEC_M: f64 = 3.085_677_581_491_367e16;
const JULIAN_YEAR_S: f64 = 3.155_76e7;

impl Unit {
    pub const ONE: Unit = Unit::new("", Dimension::DIMENSIONLESS, 1.0);
    pub const METER: Unit = Unit::new("m", Dimension::LENGTH, 1.0);
    pub const KILOMETER: Unit = Unit::new("km", Dimension::LENGTH, 1.0e3);
    pub const AU: Unit = Unit::new("AU", Dimension::LENGTH, 1.495_978_707e11);
    pub const PARSEC: Unit = Unit::new("pc", Dimension::LENGTH, PARSEC_M);
    pub const KILOPARSEC: Unit = Unit::new("kpc", Dimension::LENGTH, PARSEC_M * 1.0e3);
    pub const KILOGRAM: Unit = Unit::new("kg", Dimension::MASS, 1.0);
    pub const SOLAR_MASS: Unit = Unit::new("Msun", Dimension::MASS, 1.988_409_870_698_051e30);
    pub const SECOND: Unit = Unit::new("s", Dimension::TIME, 1.0);
    pub const YEAR: Unit = Unit::new("yr", Dimension::TIME, JULIAN_YEAR_S);
    pub const MEGAYEAR: Unit = Unit::new("Myr", Dimension::TIME, JULIAN_YEAR_S * 1.0e6);
    pub const GIGAYEAR: Unit = Unit::new("Gyr", Dimension::TIME, JULIAN_YEAR_S * 1.0e9);
    pub const RADIAN: Unit = Unit::new("rad", Dimension::ANGLE, 1.0);
    pub const DEGREE: Unit = Unit::new("deg", Dimension::ANGLE, std::f64::consts::PI / 180.0);
    pub const METER_PER_SECOND: Unit = Unit::new("m/s", Dimension::SPEED, 1.0);
    pub const KM_PER_SECOND: Unit = Unit::new("km/s", Dimension::SPEED, 1.0e3);
    pub const KPC_PER_MYR: Unit = Unit::new(
        "kpc/Myr",
        Dimension::SPEED,
        PARSEC_M * 1.0e3 / (JULIAN_YEAR_S * 1.0e6),
    );

    const ALL: [Unit; 17] = [
        Unit::ONE,
        Unit::METER,
        Unit::KILOMETER,
        Unit::AU,
        Unit::PARSEC,
        Unit::KILOPARSEC,
        Unit::KILOGRAM,
        Unit::SOLAR_MASS,
        Unit::SECOND,
        Unit::YEAR,
        Unit::MEGAYEAR,
        Unit::GIGAYEAR,
        Unit::RADIAN,
        Unit::DEGREE,
        Unit::METER_PER_SECOND,
        Unit::KM_PER_SECOND,
        Unit::KPC_PER_MYR,
    ];

    const fn new(name: &'static str, dimension: Dimension, scale: f64) -> Self {
        Self {
            name,
            dimension,
            scale,
        }
    }

    /// Looks a unit up by name.
    pub fn parse(name: &str) -> Result<Unit> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .find(|u| u.name == trimmed || (trimmed == "dimensionless" && u.name.is_empty()))
            .copied()
            .ok_or_else(|| TidalError::config(format!("unknown unit \"{trimmed}\"")))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Size of one of this unit in SI.
    pub fn si_scale(&self) -> f64 {
        self.scale
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Unit::parse(&name).map_err(de::Error::custom)
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.name.to_string()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value with a unit attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn dimension(&self) -> Dimension {
        self.unit.dimension
    }
}

/// Base units for length, mass, time and angle, plus G expressed in them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UnitSystemRepr", into = "UnitSystemRepr")]
pub struct UnitSystem {
    length: Unit,
    mass: Unit,
    time: Unit,
    angle: Unit,
    g: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct UnitSystemRepr {
    length: Unit,
    mass: Unit,
    time: Unit,
    #[serde(default = "default_angle")]
    angle: Unit,
}

fn default_angle() -> Unit {
    Unit::RADIAN
}

impl TryFrom<UnitSystemRepr> for UnitSystem {
    type Error = TidalError;
    fn try_from(repr: UnitSystemRepr) -> Result<Self> {
        UnitSystem::new(repr.length, repr.mass, repr.time, repr.angle)
    }
}

impl From<UnitSystem> for UnitSystemRepr {
    fn from(units: UnitSystem) -> Self {
        Self {
            length: units.length,
            mass: units.mass,
            time: units.time,
            angle: units.angle,
        }
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::galactic()
    }
}

impl UnitSystem {
    pub fn new(length: Unit, mass: Unit, time: Unit, angle: Unit) -> Result<Self> {
        for (unit, dim) in [
            (length, Dimension::LENGTH),
            (mass, Dimension::MASS),
            (time, Dimension::TIME),
            (angle, Dimension::ANGLE),
        ] {
            if unit.dimension != dim {
                return Err(TidalError::config(format!(
                    "unit \"{}\" cannot be the {} base of a unit system",
                    unit,
                    dim.name()
                )));
            }
        }
        let g = G_SI * mass.scale * time.scale.powi(2) / length.scale.powi(3);
        Ok(Self {
            length,
            mass,
            time,
            angle,
            g,
        })
    }

    fn from_bases(length: Unit, mass: Unit, time: Unit) -> Self {
        let g = G_SI * mass.scale * time.scale.powi(2) / length.scale.powi(3);
        Self {
            length,
            mass,
            time,
            angle: Unit::RADIAN,
            g,
        }
    }

    /// kpc, Msun, Myr, rad.
    pub fn galactic() -> Self {
        Self::from_bases(Unit::KILOPARSEC, Unit::SOLAR_MASS, Unit::MEGAYEAR)
    }

    /// AU, Msun, yr, rad.
    pub fn solar_system() -> Self {
        Self::from_bases(Unit::AU, Unit::SOLAR_MASS, Unit::YEAR)
    }

    /// m, kg, s, rad.
    pub fn si() -> Self {
        Self::from_bases(Unit::METER, Unit::KILOGRAM, Unit::SECOND)
    }

    pub fn length(&self) -> Unit {
        self.length
    }
    pub fn mass(&self) -> Unit {
        self.mass
    }
    pub fn time(&self) -> Unit {
        self.time
    }
    pub fn angle(&self) -> Unit {
        self.angle
    }

    /// The gravitational constant in this system.
    pub fn g(&self) -> f64 {
        self.g
    }

    /// SI size of one system unit of `dim`.
    pub fn scale(&self, dim: Dimension) -> f64 {
        self.length.scale.powi(dim.length as i32)
            * self.mass.scale.powi(dim.mass as i32)
            * self.time.scale.powi(dim.time as i32)
            * self.angle.scale.powi(dim.angle as i32)
    }

    /// Converts `value` expressed in `unit` into this system.
    pub fn convert(&self, value: f64, unit: Unit) -> f64 {
        value * unit.scale / self.scale(unit.dimension)
    }

    /// Converts a quantity into this system, checking its dimension.
    pub fn decompose(&self, quantity: Quantity, expected: Dimension) -> Result<f64> {
        if quantity.dimension() != expected {
            return Err(TidalError::config(format!(
                "expected a {} quantity, got unit \"{}\" ({})",
                expected.name(),
                quantity.unit,
                quantity.dimension().name()
            )));
        }
        Ok(self.convert(quantity.value, quantity.unit))
    }

    /// Factor taking a value of dimension `dim` from this system to `other`.
    pub fn factor_to(&self, other: &UnitSystem, dim: Dimension) -> f64 {
        self.scale(dim) / other.scale(dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;

    #[test]
    fn galactic_gravitational_constant() {
        let g = UnitSystem::galactic().g();
        assert!((g - 4.498502151469554e-12).abs() / g < 1e-12);
    }

    #[test]
    fn km_per_second_in_galactic_units() {
        let units = UnitSystem::galactic();
        let v = units.convert(1.0, Unit::KM_PER_SECOND);
        assert!((v - 1.022712165045695e-3).abs() < 1e-15);
        assert!((units.convert(1.0, Unit::KPC_PER_MYR) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn parse_rejects_unknown_units() {
        assert_eq!(Unit::parse("Msun").map(|u| u.name()), Ok("Msun"));
        assert_err_contains(Unit::parse("furlong"), "unknown unit");
    }

    #[test]
    fn unit_system_rejects_wrong_base_dimension() {
        let result = UnitSystem::new(Unit::SOLAR_MASS, Unit::SOLAR_MASS, Unit::MEGAYEAR, Unit::RADIAN);
        assert_err_contains(result, "length base");
    }

    #[test]
    fn decompose_checks_dimension() {
        let units = UnitSystem::galactic();
        let mass = units
            .decompose(Quantity::new(1.0, Unit::KILOGRAM), Dimension::MASS)
            .expect("mass converts");
        assert!((mass * Unit::SOLAR_MASS.si_scale() - 1.0).abs() < 1e-12);
        assert_err_contains(
            units.decompose(Quantity::new(1.0, Unit::KILOPARSEC), Dimension::MASS),
            "expected a mass quantity",
        );
    }

    #[test]
    fn quantity_deserializes_from_unit_name() {
        let json = String::from(r#"{"value": 8.0, "unit": "kpc"}"#);
        let q: Quantity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(q, Quantity::new(8.0, Unit::KILOPARSEC));
        let owned: Unit = serde_json::from_value(serde_json::json!("km/s")).expect("deserialize");
        assert_eq!(owned, Unit::KM_PER_SECOND);
        let err = serde_json::from_str::<Quantity>(r#"{"value": 1.0, "unit": "furlong"}"#)
            .expect_err("unknown unit");
        assert!(err.to_string().contains("unknown unit \"furlong\""), "{err}");
        assert_eq!(serde_json::to_string(&Unit::SOLAR_MASS).expect("serialize"), r#""Msun""#);
    }

    #[test]
    fn unit_system_serializes_by_name() {
        let json = serde_json::to_string(&UnitSystem::galactic()).expect("serialize");
        assert_eq!(json, r#"{"length":"kpc","mass":"Msun","time":"Myr","angle":"rad"}"#);
        let back: UnitSystem = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, UnitSystem::galactic());

        let bad = serde_json::from_str::<UnitSystem>(r#"{"length":"Msun","mass":"Msun","time":"Myr"}"#);
        assert!(bad.is_err());
    }
}
