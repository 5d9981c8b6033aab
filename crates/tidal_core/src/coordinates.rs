//! Batched phase-space positions.

use crate::error::{Result, TidalError};
use crate::potential::broadcast_len;
use crate::units::{Dimension, UnitSystem};
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// Positions, velocities and times of a batch of points, in one unit system.
///
/// Construction broadcasts members of length one; afterwards all three have
/// the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSpacePosition {
    q: Vec<Vector3<f64>>,
    p: Vec<Vector3<f64>>,
    t: Vec<f64>,
    units: UnitSystem,
}

fn broadcast<T: Clone>(values: Vec<T>, n: usize) -> Vec<T> {
    if values.len() == n {
        values
    } else {
        vec![values[0].clone(); n]
    }
}

impl PhaseSpacePosition {
    pub fn new(
        q: Vec<Vector3<f64>>,
        p: Vec<Vector3<f64>>,
        t: Vec<f64>,
        units: UnitSystem,
    ) -> Result<Self> {
        let n = broadcast_len(q.len(), p.len())
            .and_then(|n| broadcast_len(n, t.len()))
            .map_err(|_| {
                TidalError::usage(format!(
                    "q, p and t have incompatible lengths {}, {} and {}",
                    q.len(),
                    p.len(),
                    t.len()
                ))
            })?;
        Ok(Self {
            q: broadcast(q, n),
            p: broadcast(p, n),
            t: broadcast(t, n),
            units,
        })
    }

    pub fn single(q: Vector3<f64>, p: Vector3<f64>, t: f64, units: UnitSystem) -> Self {
        Self {
            q: vec![q],
            p: vec![p],
            t: vec![t],
            units,
        }
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn q(&self) -> &[Vector3<f64>] {
        &self.q
    }

    pub fn p(&self) -> &[Vector3<f64>] {
        &self.p
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    /// The `i`-th element as a length-one batch.
    pub fn get(&self, i: usize) -> Option<Self> {
        (i < self.len()).then(|| Self::single(self.q[i], self.p[i], self.t[i], self.units))
    }

    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(TidalError::usage(format!(
                "slice {range:?} out of bounds for length {}",
                self.len()
            )));
        }
        Ok(Self {
            q: self.q[range.clone()].to_vec(),
            p: self.p[range.clone()].to_vec(),
            t: self.t[range].to_vec(),
            units: self.units,
        })
    }

    /// The last element, e.g. the present-day end of an orbit.
    pub fn last(&self) -> Option<Self> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// The `i`-th element as a flat `[x, y, z, vx, vy, vz]` state.
    pub fn w(&self, i: usize) -> [f64; 6] {
        let (q, p) = (self.q[i], self.p[i]);
        [q.x, q.y, q.z, p.x, p.y, p.z]
    }

    pub fn to_units(&self, units: &UnitSystem) -> Self {
        let length = self.units.factor_to(units, Dimension::LENGTH);
        let speed = self.units.factor_to(units, Dimension::SPEED);
        let time = self.units.factor_to(units, Dimension::TIME);
        Self {
            q: self.q.iter().map(|q| q * length).collect(),
            p: self.p.iter().map(|p| p * speed).collect(),
            t: self.t.iter().map(|t| t * time).collect(),
            units: *units,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.q.iter().chain(&self.p).all(|v| v.iter().all(|x| x.is_finite()))
            && self.t.iter().all(|t| t.is_finite())
    }

    /// Joins batches end to end. All parts must share a unit system.
    pub fn concat(parts: &[PhaseSpacePosition]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(TidalError::usage("cannot concatenate zero phase-space positions"));
        };
        if parts.iter().any(|p| p.units != first.units) {
            return Err(TidalError::usage(
                "cannot concatenate phase-space positions in different unit systems",
            ));
        }
        Ok(Self {
            q: parts.iter().flat_map(|p| p.q.iter().copied()).collect(),
            p: parts.iter().flat_map(|p| p.p.iter().copied()).collect(),
            t: parts.iter().flat_map(|p| p.t.iter().copied()).collect(),
            units: first.units,
        })
    }
}

/// Labelled phase-space positions, ordered by label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositePhaseSpacePosition {
    components: BTreeMap<String, PhaseSpacePosition>,
    units: UnitSystem,
}

impl CompositePhaseSpacePosition {
    pub fn new(components: BTreeMap<String, PhaseSpacePosition>) -> Result<Self> {
        let Some(first) = components.values().next() else {
            return Err(TidalError::usage("composite phase-space position has no components"));
        };
        let units = first.units;
        if let Some((label, _)) = components.iter().find(|(_, c)| c.units != units) {
            return Err(TidalError::usage(format!(
                "component \"{label}\" does not share the composite's unit system"
            )));
        }
        Ok(Self { components, units })
    }

    /// Sum of component lengths, with empty components counting as one.
    pub fn len(&self) -> usize {
        self.components.values().map(|c| c.len().max(1)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&PhaseSpacePosition> {
        self.components.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    pub fn q(&self) -> Vec<Vector3<f64>> {
        self.components.values().flat_map(|c| c.q.iter().copied()).collect()
    }

    pub fn p(&self) -> Vec<Vector3<f64>> {
        self.components.values().flat_map(|c| c.p.iter().copied()).collect()
    }

    pub fn t(&self) -> Vec<f64> {
        self.components.values().flat_map(|c| c.t.iter().copied()).collect()
    }

    pub fn to_units(&self, units: &UnitSystem) -> Self {
        Self {
            components: self
                .components
                .iter()
                .map(|(label, c)| (label.clone(), c.to_units(units)))
                .collect(),
            units: *units,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.components.values().all(PhaseSpacePosition::is_finite)
    }
}
