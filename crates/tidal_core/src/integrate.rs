//! Orbit integration in a potential.
//!
//! States are flat `[x, y, z, vx, vy, vz]` arrays in the potential's units.
//! Integration never fails: a run that diverges or exhausts its step budget
//! returns a non-finite state and logs a warning.

use crate::coordinates::PhaseSpacePosition;
use crate::error::{Result, TidalError};
use crate::potential::{AnyPotential, Potential};
use crate::solvers::{Tsit5, RK4};
use crate::traits::{AdaptiveSteppable, DynamicalSystem, Steppable};
use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub type State = [f64; 6];

const NAN_STATE: State = [f64::NAN; 6];

/// Equations of motion q' = p, p' = -∇Φ(q, t), optionally with a second
/// potential that travels along a precomputed track.
pub struct OrbitField<'a, P: Potential> {
    potential: &'a P,
    perturber: Option<(&'a AnyPotential, &'a ProgenitorTrack)>,
}

impl<'a, P: Potential> OrbitField<'a, P> {
    pub fn new(potential: &'a P) -> Self {
        Self {
            potential,
            perturber: None,
        }
    }

    /// Adds `perturber`, centred on `track` at every instant.
    pub fn with_perturber(mut self, perturber: &'a AnyPotential, track: &'a ProgenitorTrack) -> Self {
        self.perturber = Some((perturber, track));
        self
    }
}

impl<P: Potential> DynamicalSystem<f64> for OrbitField<'_, P> {
    fn dimension(&self) -> usize {
        6
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let q = Vector3::new(x[0], x[1], x[2]);
        let mut accel = self.potential.acceleration(&q, t);
        if let Some((perturber, track)) = self.perturber {
            accel += perturber.acceleration(&(q - track.position(t)), t);
        }
        out[..3].copy_from_slice(&x[3..6]);
        out[3] = accel.x;
        out[4] = accel.y;
        out[5] = accel.z;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Rk4,
    Tsit5,
    /// Tsit5 with embedded 5(4) error control.
    AdaptiveTsit5 { rtol: f64, atol: f64 },
}

/// How orbits are integrated. `dt` is the fixed step, or the initial and
/// largest step for adaptive methods, in system time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    pub method: Method,
    pub dt: f64,
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: Method::Tsit5,
            dt: 1.0,
            max_steps: 1_000_000,
        }
    }
}

impl IntegratorSettings {
    pub fn fixed(method: Method, dt: f64) -> Self {
        Self {
            method,
            dt,
            ..Self::default()
        }
    }

    pub fn adaptive(rtol: f64, atol: f64, dt_max: f64) -> Self {
        Self {
            method: Method::AdaptiveTsit5 { rtol, atol },
            dt: dt_max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(TidalError::config(format!(
                "integrator dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if self.max_steps == 0 {
            return Err(TidalError::config("integrator max_steps must be at least 1"));
        }
        if let Method::AdaptiveTsit5 { rtol, atol } = self.method {
            if !(rtol.is_finite() && rtol > 0.0 && atol.is_finite() && atol > 0.0) {
                return Err(TidalError::config(format!(
                    "adaptive tolerances must be positive and finite, got rtol={rtol}, atol={atol}"
                )));
            }
        }
        Ok(())
    }
}

/// Integrates `field` from `t0` to `t1` (either direction).
pub fn integrate(
    field: &impl DynamicalSystem<f64>,
    settings: &IntegratorSettings,
    w0: State,
    t0: f64,
    t1: f64,
) -> State {
    if t0 == t1 {
        return w0;
    }
    if !(t0.is_finite() && t1.is_finite()) {
        warn!("cannot integrate between non-finite times t={t0} and t={t1}");
        return NAN_STATE;
    }
    let w = match settings.method {
        Method::Rk4 => fixed_step(&mut RK4::new(6), field, settings, w0, t0, t1),
        Method::Tsit5 => fixed_step(&mut Tsit5::new(6), field, settings, w0, t0, t1),
        Method::AdaptiveTsit5 { rtol, atol } => {
            adaptive_step(field, settings, rtol, atol, w0, t0, t1)
        }
    };
    if w.iter().any(|x| !x.is_finite()) && w0.iter().all(|x| x.is_finite()) {
        warn!("orbit diverged integrating from t={t0} to t={t1}");
    }
    w
}

fn fixed_step(
    stepper: &mut impl Steppable<f64>,
    field: &impl DynamicalSystem<f64>,
    settings: &IntegratorSettings,
    w0: State,
    t0: f64,
    t1: f64,
) -> State {
    let span = t1 - t0;
    let n = (span.abs() / settings.dt).ceil().max(1.0);
    if n > settings.max_steps as f64 {
        warn!(
            "integration from t={t0} to t={t1} needs {n} steps, over the budget of {}",
            settings.max_steps
        );
        return NAN_STATE;
    }
    let n = n as usize;
    let h = span / n as f64;
    let mut w = w0;
    let mut t = t0;
    for i in 0..n {
        stepper.step(field, &mut t, &mut w, h);
        // Recompute from the index so rounding does not accumulate in t.
        t = t0 + (i + 1) as f64 * h;
    }
    w
}

fn adaptive_step(
    field: &impl DynamicalSystem<f64>,
    settings: &IntegratorSettings,
    rtol: f64,
    atol: f64,
    w0: State,
    t0: f64,
    t1: f64,
) -> State {
    let direction = (t1 - t0).signum();
    let mut solver = Tsit5::new(6);
    let mut w = w0;
    let mut t = t0;
    let mut h = settings.dt.min((t1 - t0).abs());
    let mut candidate = [0.0; 6];
    let mut steps = 0;
    while (t1 - t) * direction > 0.0 {
        if steps >= settings.max_steps {
            warn!(
                "adaptive integration stopped at t={t} after {steps} steps (target t={t1})"
            );
            return NAN_STATE;
        }
        steps += 1;
        let remaining = (t1 - t).abs();
        let last = h >= remaining;
        let dt = direction * if last { remaining } else { h };
        let err = solver.trial_step(field, t, &w, dt, rtol, atol, &mut candidate);
        if !err.is_finite() {
            warn!("adaptive integration hit a non-finite error estimate at t={t}");
            return NAN_STATE;
        }
        if err <= 1.0 {
            w = candidate;
            t = if last { t1 } else { t + dt };
        }
        let factor = if err == 0.0 {
            5.0
        } else {
            (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
        };
        h = (dt.abs() * factor).min(settings.dt);
    }
    w
}

/// Integrates through `times` in order, starting from `w0` at `t0`, and
/// returns the state at each time.
pub fn integrate_through(
    field: &impl DynamicalSystem<f64>,
    settings: &IntegratorSettings,
    w0: State,
    t0: f64,
    times: &[f64],
) -> Vec<State> {
    let mut out = Vec::with_capacity(times.len());
    let (mut w, mut t) = (w0, t0);
    for &ti in times {
        w = integrate(field, settings, w, t, ti);
        t = ti;
        out.push(w);
    }
    out
}

/// Orbit of a single phase-space position through `potential`, sampled at
/// `times` (system units). The result is in the potential's units.
pub fn evaluate_orbit<P: Potential>(
    potential: &P,
    w0: &PhaseSpacePosition,
    times: &[f64],
    settings: &IntegratorSettings,
) -> Result<PhaseSpacePosition> {
    settings.validate()?;
    if w0.len() != 1 {
        return Err(TidalError::usage(format!(
            "evaluate_orbit needs a single initial condition, got {}",
            w0.len()
        )));
    }
    let w0 = w0.to_units(potential.units());
    let field = OrbitField::new(potential);
    let states = integrate_through(&field, settings, w0.w(0), w0.t()[0], times);
    from_states(&states, times, potential)
}

pub(crate) fn from_states<P: Potential>(
    states: &[State],
    times: &[f64],
    potential: &P,
) -> Result<PhaseSpacePosition> {
    PhaseSpacePosition::new(
        states.iter().map(|w| Vector3::new(w[0], w[1], w[2])).collect(),
        states.iter().map(|w| Vector3::new(w[3], w[4], w[5])).collect(),
        times.to_vec(),
        *potential.units(),
    )
}

/// Cubic Hermite interpolation of an integrated orbit, using the velocities
/// as the position derivatives. Outside the sampled range the track
/// continues in a straight line.
#[derive(Debug, Clone)]
pub struct ProgenitorTrack {
    times: Vec<f64>,
    states: Vec<State>,
}

impl ProgenitorTrack {
    /// `times` must be strictly monotonic (either direction).
    pub fn new(times: &[f64], states: &[State]) -> Result<Self> {
        if times.is_empty() || times.len() != states.len() {
            return Err(TidalError::usage(format!(
                "progenitor track needs matching non-empty times and states, got {} and {}",
                times.len(),
                states.len()
            )));
        }
        let mut pairs: Vec<(f64, State)> = times.iter().copied().zip(states.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pairs.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(TidalError::usage("progenitor track times must be distinct"));
        }
        let (times, states) = pairs.into_iter().unzip();
        Ok(Self { times, states })
    }

    pub fn position(&self, t: f64) -> Vector3<f64> {
        if t.is_nan() {
            return Vector3::repeat(f64::NAN);
        }
        let pos = |w: &State| Vector3::new(w[0], w[1], w[2]);
        let vel = |w: &State| Vector3::new(w[3], w[4], w[5]);
        let last = self.times.len() - 1;
        if t <= self.times[0] {
            let w = &self.states[0];
            return pos(w) + vel(w) * (t - self.times[0]);
        }
        if t >= self.times[last] {
            let w = &self.states[last];
            return pos(w) + vel(w) * (t - self.times[last]);
        }
        let i = self.times.partition_point(|&x| x <= t) - 1;
        let (ta, tb) = (self.times[i], self.times[i + 1]);
        let (a, b) = (&self.states[i], &self.states[i + 1]);
        let h = tb - ta;
        let s = (t - ta) / h;
        let (s2, s3) = (s * s, s * s * s);
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        pos(a) * h00 + vel(a) * (h10 * h) + pos(b) * h01 + vel(b) * (h11 * h)
    }
}
