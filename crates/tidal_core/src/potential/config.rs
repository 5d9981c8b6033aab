//! Serde-friendly description of a potential, e.g.
//!
//! ```json
//! {
//!   "type": "hernquist",
//!   "units": { "length": "kpc", "mass": "Msun", "time": "Myr" },
//!   "params": { "m_tot": { "value": 1e12, "unit": "Msun" }, "r_s": 1.0 }
//! }
//! ```
//!
//! Bare numbers are taken in the system units. Series times are always in the
//! system's time unit.

use super::{
    AnyPotential, CompositePotential, HernquistPotential, IsochronePotential, KeplerPotential,
    MiyamotoNagaiPotential, MultipoleInnerPotential, MultipoleOuterPotential, MultipolePotential,
    NfwPotential, NullPotential, PlummerPotential,
};
use crate::error::{Result, TidalError};
use crate::params::{CoefficientParameter, ParamInput, Parameter};
use crate::units::{Quantity, Unit, UnitSystem};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotentialKind {
    Null,
    Kepler,
    Hernquist,
    Plummer,
    Isochrone,
    Nfw,
    MiyamotoNagai,
    MultipoleInner,
    MultipoleOuter,
    Multipole,
    Composite,
    MilkyWay,
}

impl PotentialKind {
    pub fn name(&self) -> &'static str {
        match self {
            PotentialKind::Null => "null",
            PotentialKind::Kepler => "kepler",
            PotentialKind::Hernquist => "hernquist",
            PotentialKind::Plummer => "plummer",
            PotentialKind::Isochrone => "isochrone",
            PotentialKind::Nfw => "nfw",
            PotentialKind::MiyamotoNagai => "miyamoto_nagai",
            PotentialKind::MultipoleInner => "multipole_inner",
            PotentialKind::MultipoleOuter => "multipole_outer",
            PotentialKind::Multipole => "multipole",
            PotentialKind::Composite => "composite",
            PotentialKind::MilkyWay => "milky_way",
        }
    }
}

/// One named parameter as written in a config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamConfig {
    Value(f64),
    Quantity {
        value: f64,
        unit: String,
    },
    Series {
        times: Vec<f64>,
        values: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Coefficients(Vec<Vec<f64>>),
    CoefficientSeries {
        times: Vec<f64>,
        values: Vec<Vec<Vec<f64>>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PotentialConfig {
    #[serde(rename = "type")]
    pub kind: PotentialKind,
    /// Defaults to the enclosing composite's units, then to galactic units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitSystem>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l_max: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, PotentialConfig>,
}

impl PotentialConfig {
    pub fn build(&self) -> Result<AnyPotential> {
        self.build_in(None)
    }

    fn build_in(&self, inherited: Option<UnitSystem>) -> Result<AnyPotential> {
        let units = self.units.or(inherited).unwrap_or_default();
        let kind = self.kind;
        if kind != PotentialKind::Composite && !self.components.is_empty() {
            return Err(TidalError::config(format!(
                "{} potential does not take components",
                kind.name()
            )));
        }
        let mut params = Params::new(kind, &self.params);
        let potential: AnyPotential = match kind {
            PotentialKind::Null => NullPotential::new(units).into(),
            PotentialKind::Kepler => KeplerPotential::new(params.scalar("m_tot")?, units)?.into(),
            PotentialKind::Hernquist => {
                HernquistPotential::new(params.scalar("m_tot")?, params.scalar("r_s")?, units)?
                    .into()
            }
            PotentialKind::Plummer => {
                PlummerPotential::new(params.scalar("m_tot")?, params.scalar("b")?, units)?.into()
            }
            PotentialKind::Isochrone => {
                IsochronePotential::new(params.scalar("m_tot")?, params.scalar("b")?, units)?.into()
            }
            PotentialKind::Nfw => {
                NfwPotential::new(params.scalar("m")?, params.scalar("r_s")?, units)?.into()
            }
            PotentialKind::MiyamotoNagai => MiyamotoNagaiPotential::new(
                params.scalar("m_tot")?,
                params.scalar("a")?,
                params.scalar("b")?,
                units,
            )?
            .into(),
            PotentialKind::MultipoleInner => MultipoleInnerPotential::new(
                params.scalar("m_tot")?,
                params.scalar("r_s")?,
                self.l_max()?,
                params.coefficients("Slm")?,
                params.coefficients("Tlm")?,
                units,
            )?
            .into(),
            PotentialKind::MultipoleOuter => MultipoleOuterPotential::new(
                params.scalar("m_tot")?,
                params.scalar("r_s")?,
                self.l_max()?,
                params.coefficients("Slm")?,
                params.coefficients("Tlm")?,
                units,
            )?
            .into(),
            PotentialKind::Multipole => MultipolePotential::new(
                params.scalar("m_tot")?,
                params.scalar("r_s")?,
                self.l_max()?,
                params.coefficients("ISlm")?,
                params.coefficients("ITlm")?,
                params.coefficients("OSlm")?,
                params.coefficients("OTlm")?,
                units,
            )?
            .into(),
            PotentialKind::Composite => {
                let components = self
                    .components
                    .iter()
                    .map(|(name, config)| {
                        config
                            .build_in(Some(units))
                            .map(|p| (name.clone(), p))
                            .map_err(|err| prefix(err, &format!("component \"{name}\"")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                CompositePotential::new(components)?.into()
            }
            PotentialKind::MilkyWay => CompositePotential::milky_way(units)?.into(),
        };
        params.finish()?;
        Ok(potential)
    }

    fn l_max(&self) -> Result<usize> {
        self.l_max.ok_or_else(|| {
            TidalError::config(format!("l_max is required for {} potential", self.kind.name()))
        })
    }
}

fn prefix(err: TidalError, context: &str) -> TidalError {
    match err {
        TidalError::Configuration(msg) => TidalError::config(format!("{context}: {msg}")),
        other => other,
    }
}

/// Tracks which parameters have been consumed so leftovers can be reported.
struct Params<'a> {
    kind: PotentialKind,
    remaining: BTreeMap<&'a str, &'a ParamConfig>,
}

impl<'a> Params<'a> {
    fn new(kind: PotentialKind, params: &'a BTreeMap<String, ParamConfig>) -> Self {
        Self {
            kind,
            remaining: params.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        }
    }

    fn take(&mut self, name: &str) -> Result<&'a ParamConfig> {
        self.remaining.remove(name).ok_or_else(|| {
            TidalError::config(format!(
                "missing parameter \"{name}\" for {} potential",
                self.kind.name()
            ))
        })
    }

    fn scalar(&mut self, name: &str) -> Result<ParamInput> {
        let config = self.take(name)?;
        let input = match config {
            ParamConfig::Value(v) => ParamInput::from(*v),
            ParamConfig::Quantity { value, unit } => {
                ParamInput::from(Quantity::new(*value, parse_unit(name, unit)?))
            }
            ParamConfig::Series {
                times,
                values,
                unit,
            } => {
                let parameter = Parameter::interpolated(times.clone(), values.clone())
                    .map_err(|err| prefix(err, &format!("parameter \"{name}\"")))?;
                match unit {
                    Some(unit) => ParamInput::Scaled {
                        parameter,
                        unit: parse_unit(name, unit)?,
                    },
                    None => ParamInput::Value(parameter),
                }
            }
            ParamConfig::Coefficients(_) | ParamConfig::CoefficientSeries { .. } => {
                return Err(TidalError::config(format!(
                    "parameter \"{name}\" is a scalar, got coefficient matrices"
                )));
            }
        };
        Ok(input)
    }

    fn coefficients(&mut self, name: &str) -> Result<CoefficientParameter> {
        let in_param = |err| prefix(err, &format!("parameter \"{name}\""));
        match self.take(name)? {
            ParamConfig::Coefficients(rows) => Ok(matrix(rows).map_err(in_param)?.into()),
            ParamConfig::CoefficientSeries { times, values } => {
                let matrices = values
                    .iter()
                    .map(|rows| matrix(rows))
                    .collect::<Result<Vec<_>>>()
                    .map_err(in_param)?;
                CoefficientParameter::interpolated(times.clone(), matrices).map_err(in_param)
            }
            _ => Err(TidalError::config(format!(
                "parameter \"{name}\" expects a coefficient matrix"
            ))),
        }
    }

    fn finish(self) -> Result<()> {
        match self.remaining.keys().next() {
            Some(name) => Err(TidalError::config(format!(
                "unknown parameter \"{name}\" for {} potential",
                self.kind.name()
            ))),
            None => Ok(()),
        }
    }
}

fn parse_unit(name: &str, unit: &str) -> Result<Unit> {
    Unit::parse(unit).map_err(|err| prefix(err, &format!("parameter \"{name}\"")))
}

fn matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(TidalError::config("coefficient rows have unequal lengths"));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::assert_err_contains;
    use crate::potential::Potential;
    use nalgebra::Vector3;

    fn parse(json: &str) -> PotentialConfig {
        serde_json::from_str(json).expect("valid config json")
    }

    #[test]
    fn builds_hernquist_from_quantities() {
        let config = parse(
            r#"{
                "type": "hernquist",
                "units": { "length": "kpc", "mass": "Msun", "time": "Myr" },
                "params": {
                    "m_tot": { "value": 1e12, "unit": "Msun" },
                    "r_s": { "value": 1000.0, "unit": "pc" }
                }
            }"#,
        );
        let pot = config.build().expect("builds");
        let q = Vector3::new(1.0, 2.0, 3.0);
        assert!((pot.potential(&q, 0.0) + 0.94871936).abs() < 1e-8);
    }

    #[test]
    fn reports_missing_unknown_and_mistyped_parameters() {
        assert_err_contains(
            parse(r#"{"type": "nfw", "params": {"m": 1e12}}"#).build(),
            "missing parameter \"r_s\" for nfw potential",
        );
        assert_err_contains(
            parse(r#"{"type": "kepler", "params": {"m_tot": 1.0, "r_s": 1.0}}"#).build(),
            "unknown parameter \"r_s\"",
        );
        assert_err_contains(
            parse(r#"{"type": "plummer", "params": {"m_tot": 1.0, "b": {"value": 1.0, "unit": "Myr"}}}"#)
                .build(),
            "parameter \"b\": expected a length quantity",
        );
        assert_err_contains(
            parse(r#"{"type": "kepler", "params": {"m_tot": {"value": 1.0, "unit": "furlong"}}}"#)
                .build(),
            "unknown unit",
        );
        assert_err_contains(
            parse(r#"{"type": "kepler", "params": {"m_tot": [[1.0]]}}"#).build(),
            "is a scalar",
        );
    }

    #[test]
    fn rejects_unknown_fields_and_types() {
        let err = serde_json::from_str::<PotentialConfig>(r#"{"type": "spiral"}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<PotentialConfig>(r#"{"type": "null", "colour": 1}"#);
        assert!(err.is_err());
    }

    #[test]
    fn composite_components_inherit_units() {
        let config = parse(
            r#"{
                "type": "composite",
                "units": { "length": "pc", "mass": "Msun", "time": "Myr" },
                "components": {
                    "bulge": { "type": "hernquist", "params": { "m_tot": 5e9, "r_s": 1000.0 } },
                    "halo": {
                        "type": "nfw",
                        "params": {
                            "m": { "times": [0.0, 100.0], "values": [5e11, 6e11], "unit": "Msun" },
                            "r_s": { "value": 15.0, "unit": "kpc" }
                        }
                    }
                }
            }"#,
        );
        let pot = config.build().expect("builds");
        let AnyPotential::Composite(composite) = &pot else {
            panic!("expected a composite, got {pot:?}");
        };
        assert_eq!(composite.len(), 2);
        assert_eq!(pot.units().length(), Unit::PARSEC);
        let Some(AnyPotential::Nfw(halo)) = composite.get("halo") else {
            panic!("halo should be an NFW potential");
        };
        assert!((halo.r_s.value(0.0) - 15_000.0).abs() < 1e-9);
        assert!((halo.m.value(50.0) - 5.5e11).abs() < 1.0);
    }

    #[test]
    fn component_errors_name_the_component() {
        let config = parse(
            r#"{"type": "composite", "components": {"disk": {"type": "miyamoto_nagai", "params": {"m_tot": 1.0, "a": 1.0}}}}"#,
        );
        assert_err_contains(config.build(), "component \"disk\": missing parameter \"b\"");
    }

    #[test]
    fn builds_multipoles_with_shape_checks() {
        let ok = parse(
            r#"{
                "type": "multipole_outer",
                "l_max": 1,
                "params": {
                    "m_tot": 1e11, "r_s": 2.0,
                    "Slm": [[1.0, 0.0], [0.1, 0.0]],
                    "Tlm": { "times": [0.0, 10.0], "values": [[[0.0, 0.0], [0.0, 0.0]], [[0.0, 0.0], [0.0, 0.2]]] }
                }
            }"#,
        );
        let pot = ok.build().expect("builds");
        assert!(pot.potential(&Vector3::new(1.0, 1.0, 1.0), 5.0).is_finite());

        let mut missing_l_max = ok.clone();
        missing_l_max.l_max = None;
        assert_err_contains(missing_l_max.build(), "l_max is required for multipole_outer");

        let mut wrong_shape = ok;
        wrong_shape.l_max = Some(2);
        assert_err_contains(wrong_shape.build(), "Slm must have the shape");
    }

    #[test]
    fn milky_way_config_matches_constructor() {
        let pot = parse(r#"{"type": "milky_way"}"#).build().expect("builds");
        let mw = CompositePotential::milky_way(UnitSystem::galactic()).expect("milky way");
        let q = Vector3::new(8.0, 0.0, 0.1);
        assert_eq!(pot.potential(&q, 0.0), mw.potential(&q, 0.0));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = parse(r#"{"type": "isochrone", "params": {"m_tot": 1e10, "b": {"value": 2.0, "unit": "kpc"}}}"#);
        let json = serde_json::to_string(&config).expect("serialises");
        let again: PotentialConfig = serde_json::from_str(&json).expect("parses");
        assert_eq!(again.kind, PotentialKind::Isochrone);
        assert_eq!(again.params, config.params);
    }
}
