//! WASM bindings for `tidal_core`: potential evaluation and mock stream
//! generation driven by plain JS config objects.

mod potential;
mod stream;

pub use potential::WasmPotential;
