//! Mock stream generation from JavaScript.

use crate::potential::{js_error, WasmPotential};
use anyhow::Context;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use tidal_core::coordinates::PhaseSpacePosition;
use tidal_core::integrate::IntegratorSettings;
use tidal_core::mockstream::{ExecutionMode, MockStreamGenerator, StreamDF};
use tidal_core::potential::{AnyPotential, Potential, PotentialConfig};
use wasm_bindgen::prelude::*;

/// Progenitor initial condition in the host potential's units.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProgenitorConfig {
    q: [f64; 3],
    p: [f64; 3],
    #[serde(default)]
    t: f64,
    mass: f64,
    /// Optional self-gravity of the progenitor, felt by the tracers.
    #[serde(default)]
    potential: Option<PotentialConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MockStreamRequest {
    #[serde(default)]
    df: StreamDF,
    #[serde(default)]
    seed: u64,
    release_times: Vec<f64>,
    progenitor: ProgenitorConfig,
    #[serde(default)]
    integrator: IntegratorSettings,
    #[serde(default)]
    mode: ExecutionMode,
}

/// Flat `[x0, y0, z0, x1, ...]` positions and velocities with times.
#[derive(Debug, Serialize)]
pub(crate) struct TracksPayload {
    q: Vec<f64>,
    p: Vec<f64>,
    t: Vec<f64>,
}

impl From<&PhaseSpacePosition> for TracksPayload {
    fn from(w: &PhaseSpacePosition) -> Self {
        let flat = |v: &[Vector3<f64>]| v.iter().flat_map(|x| [x.x, x.y, x.z]).collect();
        Self {
            q: flat(w.q()),
            p: flat(w.p()),
            t: w.t().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MockStreamPayload {
    lead: TracksPayload,
    trail: TracksPayload,
    progenitor: TracksPayload,
}

pub(crate) fn run_request(
    potential: &AnyPotential,
    request: MockStreamRequest,
) -> anyhow::Result<MockStreamPayload> {
    let prog = request.progenitor;
    let mut generator = MockStreamGenerator::new(request.df, potential.clone())
        .with_integrator(request.integrator)?;
    if let Some(config) = prog.potential {
        let perturber = config.build().context("Invalid progenitor potential")?;
        generator = generator.with_progenitor_potential(perturber)?;
    }
    let w0 = PhaseSpacePosition::single(prog.q.into(), prog.p.into(), prog.t, *potential.units());
    let (stream, orbit) = generator.run(
        request.seed,
        &request.release_times,
        &w0,
        prog.mass,
        request.mode,
    )?;
    let (Some(lead), Some(trail)) = (stream.lead(), stream.trail()) else {
        anyhow::bail!("Mock stream is missing a tail.");
    };
    Ok(MockStreamPayload {
        lead: lead.into(),
        trail: trail.into(),
        progenitor: (&orbit).into(),
    })
}

#[wasm_bindgen]
impl WasmPotential {
    /// Runs the mock stream generator in this potential. Returns
    /// `{lead, trail, progenitor}`, each with flat `q`, `p` and `t` arrays.
    pub fn generate_mock_stream(&self, request: JsValue) -> Result<JsValue, JsValue> {
        let request: MockStreamRequest = from_value(request)
            .map_err(|e| JsValue::from_str(&format!("Invalid mock stream request: {}", e)))?;
        let payload = run_request(&self.potential, request).map_err(js_error)?;
        to_value(&payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
