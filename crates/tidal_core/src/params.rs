//! Time-dependent parameters.
//!
//! A parameter is either constant, a piecewise-linear series, or an explicit
//! function of time. All three are resolved into the owning potential's unit
//! system at construction; evaluation is then a plain `f64 -> f64` lookup.

use crate::error::{Result, TidalError};
use crate::units::{Dimension, Quantity, UnitSystem};
use nalgebra::DMatrix;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

pub type ScalarFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;
pub type MatrixFn = Arc<dyn Fn(f64) -> DMatrix<f64> + Send + Sync>;

/// A scalar physical parameter, already expressed in system units.
#[derive(Clone)]
pub enum Parameter {
    Constant(f64),
    /// Linear interpolation over strictly increasing `times`; clamped to the
    /// end values outside the series.
    Interpolated { times: Vec<f64>, values: Vec<f64> },
    Function(ScalarFn),
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Parameter::Interpolated { times, values } => f
                .debug_struct("Interpolated")
                .field("times", times)
                .field("values", values)
                .finish(),
            Parameter::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl Parameter {
    pub fn constant(value: f64) -> Self {
        Parameter::Constant(value)
    }

    pub fn interpolated(times: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        validate_series(&times, values.len())?;
        Ok(Parameter::Interpolated { times, values })
    }

    pub fn function(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Parameter::Function(Arc::new(f))
    }

    /// Value at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Parameter::Constant(v) => *v,
            Parameter::Interpolated { .. } if t.is_nan() => f64::NAN,
            Parameter::Interpolated { times, values } => {
                let (i, w) = bracket(times, t);
                if w == 0.0 {
                    values[i]
                } else {
                    values[i] + w * (values[i + 1] - values[i])
                }
            }
            Parameter::Function(f) => f(t),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Parameter::Constant(_))
    }

    fn scaled(self, factor: f64) -> Self {
        if factor == 1.0 {
            return self;
        }
        match self {
            Parameter::Constant(v) => Parameter::Constant(v * factor),
            Parameter::Interpolated { times, values } => Parameter::Interpolated {
                times,
                values: values.into_iter().map(|v| v * factor).collect(),
            },
            Parameter::Function(f) => Parameter::Function(Arc::new(move |t| f(t) * factor)),
        }
    }
}

/// How a scalar parameter is handed to a potential constructor.
///
/// Bare numbers and [`Parameter`]s are taken to be in the potential's units
/// already; [`Quantity`]s and [`ParamInput::Scaled`] carry a unit that is
/// checked against the parameter's dimension and converted.
#[derive(Debug, Clone)]
pub enum ParamInput {
    Value(Parameter),
    Quantity(Quantity),
    /// A time-dependent parameter whose values are in `unit`.
    Scaled {
        parameter: Parameter,
        unit: crate::units::Unit,
    },
}

impl From<f64> for ParamInput {
    fn from(value: f64) -> Self {
        ParamInput::Value(Parameter::Constant(value))
    }
}

impl From<Parameter> for ParamInput {
    fn from(value: Parameter) -> Self {
        ParamInput::Value(value)
    }
}

impl From<Quantity> for ParamInput {
    fn from(value: Quantity) -> Self {
        ParamInput::Quantity(value)
    }
}

impl ParamInput {
    /// Resolves into a [`Parameter`] in `units`, checking the dimension.
    pub fn resolve(self, name: &str, dimension: Dimension, units: &UnitSystem) -> Result<Parameter> {
        let with_name = |err: TidalError| match err {
            TidalError::Configuration(msg) => {
                TidalError::config(format!("parameter \"{name}\": {msg}"))
            }
            other => other,
        };
        match self {
            ParamInput::Value(p) => Ok(p),
            ParamInput::Quantity(q) => units
                .decompose(q, dimension)
                .map(Parameter::Constant)
                .map_err(with_name),
            ParamInput::Scaled { parameter, unit } => {
                let factor = units
                    .decompose(Quantity::new(1.0, unit), dimension)
                    .map_err(with_name)?;
                Ok(parameter.scaled(factor))
            }
        }
    }
}

/// A matrix-valued parameter (multipole coefficients).
#[derive(Clone)]
pub enum CoefficientParameter {
    Constant(DMatrix<f64>),
    Interpolated {
        times: Vec<f64>,
        values: Vec<DMatrix<f64>>,
    },
    Function(MatrixFn),
}

impl fmt::Debug for CoefficientParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoefficientParameter::Constant(m) => f.debug_tuple("Constant").field(m).finish(),
            CoefficientParameter::Interpolated { times, values } => f
                .debug_struct("Interpolated")
                .field("times", times)
                .field("nodes", &values.len())
                .finish(),
            CoefficientParameter::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<DMatrix<f64>> for CoefficientParameter {
    fn from(value: DMatrix<f64>) -> Self {
        CoefficientParameter::Constant(value)
    }
}

impl CoefficientParameter {
    pub fn interpolated(times: Vec<f64>, values: Vec<DMatrix<f64>>) -> Result<Self> {
        validate_series(&times, values.len())?;
        Ok(CoefficientParameter::Interpolated { times, values })
    }

    pub fn function(f: impl Fn(f64) -> DMatrix<f64> + Send + Sync + 'static) -> Self {
        CoefficientParameter::Function(Arc::new(f))
    }

    pub fn value(&self, t: f64) -> Cow<'_, DMatrix<f64>> {
        match self {
            CoefficientParameter::Constant(m) => Cow::Borrowed(m),
            CoefficientParameter::Interpolated { values, .. } if t.is_nan() => {
                let (rows, cols) = values[0].shape();
                Cow::Owned(DMatrix::from_element(rows, cols, f64::NAN))
            }
            CoefficientParameter::Interpolated { times, values } => {
                let (i, w) = bracket(times, t);
                if w == 0.0 {
                    Cow::Borrowed(&values[i])
                } else {
                    Cow::Owned(&values[i] + (&values[i + 1] - &values[i]) * w)
                }
            }
            CoefficientParameter::Function(f) => Cow::Owned(f(t)),
        }
    }

    /// Checks that every node (or the value at t = 0 for functions) has the
    /// given square shape.
    pub fn check_shape(&self, name: &str, size: usize) -> Result<()> {
        let bad = |m: &DMatrix<f64>| m.nrows() != size || m.ncols() != size;
        let offending = match self {
            CoefficientParameter::Constant(m) => bad(m).then(|| m.shape()),
            CoefficientParameter::Interpolated { values, .. } => {
                values.iter().find(|m| bad(m)).map(|m| m.shape())
            }
            CoefficientParameter::Function(f) => {
                let m = f(0.0);
                bad(&m).then(|| m.shape())
            }
        };
        match offending {
            Some((rows, cols)) => Err(TidalError::config(format!(
                "{name} must have the shape (l_max + 1, l_max + 1) = ({size}, {size}), got ({rows}, {cols})"
            ))),
            None => Ok(()),
        }
    }
}

fn validate_series(times: &[f64], n_values: usize) -> Result<()> {
    if times.is_empty() {
        return Err(TidalError::config("interpolated series needs at least one node"));
    }
    if times.len() != n_values {
        return Err(TidalError::config(format!(
            "interpolated series has {} times but {} values",
            times.len(),
            n_values
        )));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(TidalError::config("interpolation times must be finite"));
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TidalError::config(
            "interpolation times must be strictly increasing",
        ));
    }
    Ok(())
}

/// Index of the left node and the fractional weight toward the right node.
/// `t` must not be NaN.
fn bracket(times: &[f64], t: f64) -> (usize, f64) {
    let last = times.len() - 1;
    if last == 0 || t <= times[0] {
        return (0, 0.0);
    }
    if t >= times[last] {
        return (last, 0.0);
    }
    let right = times.partition_point(|&x| x <= t);
    let i = right - 1;
    (i, (t - times[i]) / (times[i + 1] - times[i]))
}
