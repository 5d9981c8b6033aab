//! Potential evaluation exposed to JavaScript.
//!
//! Positions travel as flat `[x0, y0, z0, x1, ...]` buffers; matrices come
//! back row-major, nine values per point.

use anyhow::{bail, Context};
use js_sys::Float64Array;
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use tidal_core::cluster::{lagrange_points, tidal_radius};
use tidal_core::potential::{AnyPotential, Potential, PotentialConfig};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmPotential {
    pub(crate) potential: AnyPotential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Potential,
    Gradient,
    Density,
    Hessian,
    TidalTensor,
}

#[derive(Debug, Serialize)]
pub(crate) struct LagrangePayload {
    l1: [f64; 3],
    l2: [f64; 3],
    tidal_radius: f64,
}

pub(crate) fn js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

pub(crate) fn points(flat: &[f64]) -> anyhow::Result<Vec<Vector3<f64>>> {
    if flat.len() % 3 != 0 {
        bail!("Position buffer length {} is not a multiple of 3.", flat.len());
    }
    Ok(flat.chunks_exact(3).map(Vector3::from_column_slice).collect())
}

fn vector3(values: &[f64], name: &str) -> anyhow::Result<Vector3<f64>> {
    if values.len() != 3 {
        bail!("{name} must have 3 components, got {}.", values.len());
    }
    Ok(Vector3::from_column_slice(values))
}

fn flatten_vectors(vectors: &[Vector3<f64>]) -> Vec<f64> {
    vectors.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
}

fn flatten_matrices(matrices: &[Matrix3<f64>]) -> Vec<f64> {
    matrices
        .iter()
        .flat_map(|m| (0..3).flat_map(move |i| (0..3).map(move |j| m[(i, j)])))
        .collect()
}

impl WasmPotential {
    pub(crate) fn from_config(config: PotentialConfig) -> anyhow::Result<Self> {
        let potential = config.build().context("Invalid potential config")?;
        Ok(Self { potential })
    }

    pub(crate) fn evaluate(&self, field: Field, q: &[f64], t: &[f64]) -> anyhow::Result<Vec<f64>> {
        let q = points(q)?;
        let p = &self.potential;
        let flat = match field {
            Field::Potential => p.potential_batch(&q, t)?,
            Field::Density => p.density_batch(&q, t)?,
            Field::Gradient => flatten_vectors(&p.gradient_batch(&q, t)?),
            Field::Hessian => flatten_matrices(&p.hessian_batch(&q, t)?),
            Field::TidalTensor => flatten_matrices(&p.tidal_tensor_batch(&q, t)?),
        };
        Ok(flat)
    }

    pub(crate) fn lagrange(
        &self,
        x: &[f64],
        v: &[f64],
        mass: f64,
        t: f64,
    ) -> anyhow::Result<LagrangePayload> {
        let x = vector3(x, "Position")?;
        let v = vector3(v, "Velocity")?;
        let lp = lagrange_points(&self.potential, &x, &v, mass, t);
        Ok(LagrangePayload {
            l1: lp.l1.into(),
            l2: lp.l2.into(),
            tidal_radius: tidal_radius(&self.potential, &x, &v, mass, t),
        })
    }

    fn field_array(&self, field: Field, q: &[f64], t: &[f64]) -> Result<Float64Array, JsValue> {
        let values = self.evaluate(field, q, t).map_err(js_error)?;
        Ok(Float64Array::from(values.as_slice()))
    }
}

#[wasm_bindgen]
impl WasmPotential {
    /// Builds a potential from a config object (see `PotentialConfig`).
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmPotential, JsValue> {
        console_error_panic_hook::set_once();
        let config: PotentialConfig = from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid potential config: {}", e)))?;
        Self::from_config(config).map_err(js_error)
    }

    pub fn units(&self) -> Result<JsValue, JsValue> {
        to_value(self.potential.units())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn potential(&self, q: Vec<f64>, t: Vec<f64>) -> Result<Float64Array, JsValue> {
        self.field_array(Field::Potential, &q, &t)
    }

    pub fn gradient(&self, q: Vec<f64>, t: Vec<f64>) -> Result<Float64Array, JsValue> {
        self.field_array(Field::Gradient, &q, &t)
    }

    pub fn density(&self, q: Vec<f64>, t: Vec<f64>) -> Result<Float64Array, JsValue> {
        self.field_array(Field::Density, &q, &t)
    }

    pub fn hessian(&self, q: Vec<f64>, t: Vec<f64>) -> Result<Float64Array, JsValue> {
        self.field_array(Field::Hessian, &q, &t)
    }

    pub fn tidal_tensor(&self, q: Vec<f64>, t: Vec<f64>) -> Result<Float64Array, JsValue> {
        self.field_array(Field::TidalTensor, &q, &t)
    }

    /// L1/L2 and the tidal radius of a cluster of `mass` (system units).
    pub fn lagrange_points(
        &self,
        x: Vec<f64>,
        v: Vec<f64>,
        mass: f64,
        t: f64,
    ) -> Result<JsValue, JsValue> {
        let payload = self.lagrange(&x, &v, mass, t).map_err(js_error)?;
        to_value(&payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde::Serialize;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn builds_from_a_js_object() {
        let config = serde_json::json!({"type": "milky_way"});
        let js = config
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .expect("serializes");
        let pot = WasmPotential::new(js).expect("builds");
        let phi = pot.potential(vec![8.0, 0.0, 0.0], vec![0.0]).expect("evaluates");
        assert_eq!(phi.length(), 1);
    }
}
