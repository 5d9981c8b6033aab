use super::df::{ReleasePair, StreamDistribution};
use crate::coordinates::{CompositePhaseSpacePosition, PhaseSpacePosition};
use crate::error::{Result, TidalError};
use crate::integrate::{
    from_states, integrate, integrate_through, IntegratorSettings, OrbitField, ProgenitorTrack,
    State,
};
use crate::params::{ParamInput, Parameter};
use crate::potential::{AnyPotential, Potential};
use crate::units::Dimension;
use log::debug;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How tracer orbits are scheduled. Both modes give identical streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One tracer after another on the calling thread.
    #[default]
    Sequential,
    /// Tracers spread over the rayon thread pool.
    Parallel,
}

/// A simulated stream: `lead` and `trail` tails, each with one tracer per
/// release time, all evaluated at the final release time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockStream {
    pub particles: CompositePhaseSpacePosition,
    pub release_times: Vec<f64>,
}

impl MockStream {
    pub fn lead(&self) -> Option<&PhaseSpacePosition> {
        self.particles.get("lead")
    }

    pub fn trail(&self) -> Option<&PhaseSpacePosition> {
        self.particles.get("trail")
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Positions ordered lead then trail, each by release index.
    pub fn q(&self) -> Vec<Vector3<f64>> {
        self.particles.q()
    }

    pub fn p(&self) -> Vec<Vector3<f64>> {
        self.particles.p()
    }

    pub fn t(&self) -> Vec<f64> {
        self.particles.t()
    }
}

/// Generates mock streams from a progenitor orbiting in a host potential.
#[derive(Debug, Clone)]
pub struct MockStreamGenerator<D: StreamDistribution, P: Potential> {
    df: D,
    potential: P,
    progenitor_integrator: IntegratorSettings,
    stream_integrator: IntegratorSettings,
    progenitor_potential: Option<AnyPotential>,
}

impl<D: StreamDistribution, P: Potential> MockStreamGenerator<D, P> {
    pub fn new(df: D, potential: P) -> Self {
        Self {
            df,
            potential,
            progenitor_integrator: IntegratorSettings::default(),
            stream_integrator: IntegratorSettings::default(),
            progenitor_potential: None,
        }
    }

    /// Uses `settings` for both the progenitor and the tracers.
    pub fn with_integrator(self, settings: IntegratorSettings) -> Result<Self> {
        self.with_progenitor_integrator(settings)?
            .with_stream_integrator(settings)
    }

    pub fn with_progenitor_integrator(mut self, settings: IntegratorSettings) -> Result<Self> {
        settings.validate()?;
        self.progenitor_integrator = settings;
        Ok(self)
    }

    pub fn with_stream_integrator(mut self, settings: IntegratorSettings) -> Result<Self> {
        settings.validate()?;
        self.stream_integrator = settings;
        Ok(self)
    }

    /// Attaches the progenitor's own potential, which moves with it and acts
    /// on the tracers only.
    pub fn with_progenitor_potential(mut self, potential: AnyPotential) -> Result<Self> {
        if potential.units() != self.potential.units() {
            return Err(TidalError::config(
                "progenitor potential must use the host potential's unit system",
            ));
        }
        self.progenitor_potential = Some(potential);
        Ok(self)
    }

    pub fn potential(&self) -> &P {
        &self.potential
    }

    pub fn df(&self) -> &D {
        &self.df
    }

    /// Integrates the progenitor from `progenitor_w0` through
    /// `release_times`, releases a lead and a trail tracer at each of them
    /// and integrates every tracer to the last release time.
    ///
    /// Returns the stream and the progenitor's orbit at the release times.
    /// Randomness depends only on `seed` and the release index.
    pub fn run(
        &self,
        seed: u64,
        release_times: &[f64],
        progenitor_w0: &PhaseSpacePosition,
        progenitor_mass: impl Into<ParamInput>,
        mode: ExecutionMode,
    ) -> Result<(MockStream, PhaseSpacePosition)> {
        validate_release_times(release_times)?;
        if progenitor_w0.len() != 1 {
            return Err(TidalError::usage(format!(
                "progenitor initial condition must be a single position, got {}",
                progenitor_w0.len()
            )));
        }
        let units = *self.potential.units();
        let mass = progenitor_mass
            .into()
            .resolve("progenitor_mass", Dimension::MASS, &units)?;
        let w0 = progenitor_w0.to_units(&units);
        let n = release_times.len();
        debug!("generating mock stream: {n} release times, {mode:?} mode");

        let host = OrbitField::new(&self.potential);
        let orbit = integrate_through(
            &host,
            &self.progenitor_integrator,
            w0.w(0),
            w0.t()[0],
            release_times,
        );

        let releases: Vec<ReleasePair> = match mode {
            ExecutionMode::Sequential => (0..n)
                .map(|i| self.release(seed, i, &orbit[i], release_times[i], &mass))
                .collect(),
            ExecutionMode::Parallel => (0..n)
                .into_par_iter()
                .map(|i| self.release(seed, i, &orbit[i], release_times[i], &mass))
                .collect(),
        };

        let track = match &self.progenitor_potential {
            Some(_) => Some(ProgenitorTrack::new(release_times, &orbit)?),
            None => None,
        };
        let field = match (&self.progenitor_potential, &track) {
            (Some(perturber), Some(track)) => host.with_perturber(perturber, track),
            _ => OrbitField::new(&self.potential),
        };

        // Tracer k < n is the lead of release k, the rest are trails.
        let t_final = release_times[n - 1];
        let evolve = |k: usize| -> State {
            let pair = &releases[k % n];
            let w = if k < n { pair.lead } else { pair.trail };
            integrate(&field, &self.stream_integrator, w, pair.t, t_final)
        };
        let tracers: Vec<State> = match mode {
            ExecutionMode::Sequential => (0..2 * n).map(evolve).collect(),
            ExecutionMode::Parallel => (0..2 * n).into_par_iter().map(evolve).collect(),
        };

        let finals = vec![t_final; n];
        let mut tails = BTreeMap::new();
        tails.insert("lead".to_string(), from_states(&tracers[..n], &finals, &self.potential)?);
        tails.insert("trail".to_string(), from_states(&tracers[n..], &finals, &self.potential)?);
        let stream = MockStream {
            particles: CompositePhaseSpacePosition::new(tails)?,
            release_times: release_times.to_vec(),
        };
        let progenitor = from_states(&orbit, release_times, &self.potential)?;
        debug!(
            "mock stream done: {} tracers, finite: {}",
            stream.len(),
            stream.particles.is_finite()
        );
        Ok((stream, progenitor))
    }

    fn release(
        &self,
        seed: u64,
        index: usize,
        w: &State,
        t: f64,
        mass: &Parameter,
    ) -> ReleasePair {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        rng.set_stream(index as u64);
        let x = Vector3::new(w[0], w[1], w[2]);
        let v = Vector3::new(w[3], w[4], w[5]);
        self.df
            .sample(&self.potential, &x, &v, mass.value(t), t, &mut rng)
    }
}

fn validate_release_times(times: &[f64]) -> Result<()> {
    if times.is_empty() {
        return Err(TidalError::usage("at least one release time is required"));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(TidalError::usage("release times must be finite"));
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TidalError::usage("release times must be strictly increasing"));
    }
    Ok(())
}
