//! The `tidal_core` crate models star clusters dissolving in galactic
//! potentials.
//!
//! Key components:
//! - **Potentials**: analytic and multipole potentials written once as a
//!   scalar field; gradients, Hessians, densities and tidal tensors come from
//!   dual-number autodiff.
//! - **Units**: unit systems with a derived gravitational constant, and
//!   dimension-checked parameters that may vary in time.
//! - **Integration**: RK4 and Tsit5 orbit integration, fixed or adaptive.
//! - **Mock streams**: Lagrange points, tidal radii and stream generation
//!   from Fardal-style or Lagrange-point release distributions.
pub mod autodiff;
pub mod cluster;
pub mod coordinates;
pub mod error;
pub mod integrate;
pub mod mockstream;
pub mod params;
pub mod potential;
pub mod solvers;
pub mod traits;
pub mod units;

pub use error::{Result, TidalError};
