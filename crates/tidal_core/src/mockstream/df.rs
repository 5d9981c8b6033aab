//! Release distributions: where, and how fast, stripped stars leave the
//! progenitor.

use crate::cluster::{orbital_angular_velocity_mag, tidal_radius};
use crate::integrate::State;
use crate::potential::Potential;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Lead (inner) and trail (outer) tracers released at one stripping time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReleasePair {
    pub t: f64,
    pub lead: State,
    pub trail: State,
}

impl ReleasePair {
    fn new(t: f64, lead: (Vector3<f64>, Vector3<f64>), trail: (Vector3<f64>, Vector3<f64>)) -> Self {
        let flat = |(x, v): (Vector3<f64>, Vector3<f64>)| [x.x, x.y, x.z, v.x, v.y, v.z];
        Self {
            t,
            lead: flat(lead),
            trail: flat(trail),
        }
    }
}

pub trait StreamDistribution: Send + Sync {
    /// Samples the two tracers released by a progenitor of `mass` at (x, v, t).
    fn sample<P: Potential, R: Rng>(
        &self,
        potential: &P,
        x: &Vector3<f64>,
        v: &Vector3<f64>,
        mass: f64,
        t: f64,
        rng: &mut R,
    ) -> ReleasePair;
}

/// Local frame of the progenitor's orbit: radial, azimuthal (along the
/// tangential velocity) and orbit-normal unit vectors.
struct OrbitFrame {
    r_hat: Vector3<f64>,
    phi_hat: Vector3<f64>,
    z_hat: Vector3<f64>,
}

impl OrbitFrame {
    fn new(x: &Vector3<f64>, v: &Vector3<f64>) -> Self {
        let r_hat = x / x.norm();
        let l = x.cross(v);
        let z_hat = l / l.norm();
        let tangential = v - r_hat * v.dot(&r_hat);
        Self {
            r_hat,
            phi_hat: tangential / tangential.norm(),
            z_hat,
        }
    }
}

/// Fardal et al. (2015) release distribution. Offsets are Gaussian in units
/// of the tidal radius (positions) and of Ω r_t (velocities); the azimuthal
/// velocity factor is scaled by the radial position factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FardalStreamDF {
    pub kr_mean: f64,
    pub kr_disp: f64,
    pub kvphi_mean: f64,
    pub kvphi_disp: f64,
    pub kz_mean: f64,
    pub kz_disp: f64,
    pub kvz_mean: f64,
    pub kvz_disp: f64,
}

impl Default for FardalStreamDF {
    fn default() -> Self {
        Self {
            kr_mean: 2.0,
            kr_disp: 0.5,
            kvphi_mean: 0.3,
            kvphi_disp: 0.5,
            kz_mean: 0.0,
            kz_disp: 0.5,
            kvz_mean: 0.0,
            kvz_disp: 0.5,
        }
    }
}

impl StreamDistribution for FardalStreamDF {
    fn sample<P: Potential, R: Rng>(
        &self,
        potential: &P,
        x: &Vector3<f64>,
        v: &Vector3<f64>,
        mass: f64,
        t: f64,
        rng: &mut R,
    ) -> ReleasePair {
        let mut normal = |mean: f64, disp: f64| {
            let z: f64 = rng.sample(StandardNormal);
            mean + disp * z
        };
        let kr = normal(self.kr_mean, self.kr_disp);
        let kvphi = kr * normal(self.kvphi_mean, self.kvphi_disp);
        let kz = normal(self.kz_mean, self.kz_disp);
        let kvz = normal(self.kvz_mean, self.kvz_disp);

        let OrbitFrame {
            r_hat,
            phi_hat,
            z_hat,
        } = OrbitFrame::new(x, v);
        let r_t = tidal_radius(potential, x, v, mass, t);
        let v_circ = orbital_angular_velocity_mag(x, v) * r_t;

        ReleasePair::new(
            t,
            (
                x - (r_hat * kr - z_hat * kz) * r_t,
                v - (phi_hat * kvphi - z_hat * kvz) * v_circ,
            ),
            (
                x + (r_hat * kr + z_hat * kz) * r_t,
                v + (phi_hat * kvphi + z_hat * kvz) * v_circ,
            ),
        )
    }
}

/// Releases exactly at L1 and L2, co-rotating with the progenitor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LagrangeStreamDF;

impl StreamDistribution for LagrangeStreamDF {
    fn sample<P: Potential, R: Rng>(
        &self,
        potential: &P,
        x: &Vector3<f64>,
        v: &Vector3<f64>,
        mass: f64,
        t: f64,
        _rng: &mut R,
    ) -> ReleasePair {
        let frame = OrbitFrame::new(x, v);
        let r_t = tidal_radius(potential, x, v, mass, t);
        let dv = frame.phi_hat * (orbital_angular_velocity_mag(x, v) * r_t);
        let dx = frame.r_hat * r_t;
        ReleasePair::new(t, (x - dx, v - dv), (x + dx, v + dv))
    }
}

/// Runtime choice of release distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDF {
    Fardal(FardalStreamDF),
    Lagrange,
}

impl Default for StreamDF {
    fn default() -> Self {
        StreamDF::Fardal(FardalStreamDF::default())
    }
}

impl StreamDistribution for StreamDF {
    fn sample<P: Potential, R: Rng>(
        &self,
        potential: &P,
        x: &Vector3<f64>,
        v: &Vector3<f64>,
        mass: f64,
        t: f64,
        rng: &mut R,
    ) -> ReleasePair {
        match self {
            StreamDF::Fardal(df) => df.sample(potential, x, v, mass, t, rng),
            StreamDF::Lagrange => LagrangeStreamDF.sample(potential, x, v, mass, t, rng),
        }
    }
}
