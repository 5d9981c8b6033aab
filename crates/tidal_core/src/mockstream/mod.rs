//! Mock stellar streams.
//!
//! A progenitor is integrated through a grid of release times. At each
//! release a [`StreamDistribution`] places one tracer near the inner (lead)
//! and one near the outer (trail) Lagrange point; every tracer is then
//! integrated to the final release time.

mod df;
mod generator;

pub use df::{FardalStreamDF, LagrangeStreamDF, ReleasePair, StreamDF, StreamDistribution};
pub use generator::{ExecutionMode, MockStream, MockStreamGenerator};
