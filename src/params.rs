// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parameter map: the bridge between named physical parameters and the flat
//! vector the minimization algorithms operate on.
//!
//! Each [`Quantity`] is a bounded physical value with a unit. The optimizer
//! never sees physical values directly; it works in *opt space*, where every
//! selected parameter is scaled to [-1, 1] by its bounds. The
//! [`ParameterMap`] owns the quantities, an ordered `opt_map` of the ids
//! exposed to the optimizer, and the conversions in both directions.
//!
//! Parameter ids follow a `gate/channel/component/param` convention, e.g.
//! `rx90p/d1/gauss/amp`.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A bounded physical value with a unit.
///
/// # Invariants
///
/// - `min < max`
/// - `min <= value <= max`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// Physical value.
    pub value: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Unit label, e.g. "Hz 2pi" or "s".
    pub unit: String,
}

impl Quantity {
    /// Create a new bounded quantity.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the bounds are inverted or the value lies outside
    /// them.
    pub fn new(value: f64, min: f64, max: f64, unit: impl Into<String>) -> Result<Self> {
        if !(min < max) {
            return Err(Error::Config(format!(
                "quantity bounds must satisfy min < max, got [{}, {}]",
                min, max
            )));
        }
        if value < min || value > max {
            return Err(Error::Config(format!(
                "quantity value {} outside bounds [{}, {}]",
                value, min, max
            )));
        }
        Ok(Self {
            value,
            min,
            max,
            unit: unit.into(),
        })
    }

    /// Value projected to opt space: `2 (v - min) / (max - min) - 1`.
    pub fn opt_value(&self) -> f64 {
        2.0 * (self.value - self.min) / (self.max - self.min) - 1.0
    }

    /// Set the value from an opt-space coordinate.
    ///
    /// Coordinates outside [-1, 1] are clamped to the bounds, so algorithms
    /// may overshoot freely without producing unphysical values.
    pub fn set_opt_value(&mut self, x: f64) {
        let x = x.clamp(-1.0, 1.0);
        self.value = self.min + (x + 1.0) * (self.max - self.min) / 2.0;
    }

    /// Derivative of the physical value with respect to the opt-space
    /// coordinate: `(max - min) / 2`.
    pub fn scale(&self) -> f64 {
        (self.max - self.min) / 2.0
    }
}

/// Named physical parameters plus the ordered subset exposed for
/// optimization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterMap {
    params: BTreeMap<String, Quantity>,
    opt_map: Vec<String>,
}

impl ParameterMap {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a quantity under the given id.
    pub fn insert(&mut self, id: impl Into<String>, quantity: Quantity) {
        self.params.insert(id.into(), quantity);
    }

    /// Select the parameters exposed to the optimizer, in order.
    ///
    /// # Errors
    ///
    /// Fails if any id is unknown.
    pub fn set_opt_map(&mut self, ids: Vec<String>) -> Result<()> {
        for id in &ids {
            if !self.params.contains_key(id) {
                return Err(Error::Config(format!("opt_map references unknown id '{}'", id)));
            }
        }
        self.opt_map = ids;
        Ok(())
    }

    /// Ids currently exposed to the optimizer.
    pub fn opt_map(&self) -> &[String] {
        &self.opt_map
    }

    /// Number of optimized parameters.
    pub fn opt_len(&self) -> usize {
        self.opt_map.len()
    }

    /// Look up a quantity by id.
    pub fn get(&self, id: &str) -> Option<&Quantity> {
        self.params.get(id)
    }

    /// Physical value of a parameter by id.
    pub fn value(&self, id: &str) -> Option<f64> {
        self.params.get(id).map(|q| q.value)
    }

    /// Current opt-space vector for the selected parameters.
    pub fn opt_vector(&self) -> Array1<f64> {
        self.opt_map
            .iter()
            .map(|id| self.params[id].opt_value())
            .collect()
    }

    /// Write an opt-space vector back into the selected parameters.
    ///
    /// # Errors
    ///
    /// Fails if the vector length does not match the opt map.
    pub fn set_opt_vector(&mut self, x: &ArrayView1<f64>) -> Result<()> {
        if x.len() != self.opt_map.len() {
            return Err(Error::Config(format!(
                "opt vector length {} does not match opt map length {}",
                x.len(),
                self.opt_map.len()
            )));
        }
        for (id, &xi) in self.opt_map.iter().zip(x.iter()) {
            self.params
                .get_mut(id)
                .expect("opt_map ids are validated on insertion")
                .set_opt_value(xi);
        }
        Ok(())
    }

    /// Units of the selected parameters, in opt-map order.
    pub fn opt_units(&self) -> Vec<String> {
        self.opt_map
            .iter()
            .map(|id| self.params[id].unit.clone())
            .collect()
    }

    /// Physical values of the selected parameters, keyed by id.
    pub fn named_values(&self) -> BTreeMap<String, f64> {
        self.opt_map
            .iter()
            .map(|id| (id.clone(), self.params[id].value))
            .collect()
    }

    /// Per-parameter `d(physical)/d(opt)` factors, in opt-map order.
    ///
    /// Used to convert backend gradients (with respect to physical values)
    /// into opt-space gradients for the algorithms.
    pub fn scales(&self) -> Array1<f64> {
        self.opt_map
            .iter()
            .map(|id| self.params[id].scale())
            .collect()
    }

    /// Set a parameter's physical value, clamped to its bounds.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown.
    pub fn set_value(&mut self, id: &str, value: f64) -> Result<()> {
        let q = self
            .params
            .get_mut(id)
            .ok_or_else(|| Error::Config(format!("unknown parameter id '{}'", id)))?;
        q.value = value.clamp(q.min, q.max);
        Ok(())
    }

    /// Seed parameter values from a previous run's best-point file.
    ///
    /// The file holds `{opt_map, units, optim_status: {params: {id: value}}}`
    /// as written by the optimizer's best tracking. Ids present in the file
    /// but unknown here are ignored; values are clamped to bounds.
    pub fn load_best(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let doc: serde_json::Value = serde_json::from_str(&content)?;
        let values = doc
            .pointer("/optim_status/params")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                Error::Serialization(format!(
                    "best-point file {} has no optim_status.params map",
                    path.display()
                ))
            })?;
        for (id, value) in values {
            if let (Some(q), Some(v)) = (self.params.get_mut(id), value.as_f64()) {
                q.value = v.clamp(q.min, q.max);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write as _;

    fn amp() -> Quantity {
        Quantity::new(0.5, 0.0, 1.0, "V").unwrap()
    }

    // =========================================================================
    // Quantity
    // =========================================================================

    #[test]
    fn test_quantity_new_valid() {
        let q = Quantity::new(3.0, 1.0, 5.0, "Hz 2pi").unwrap();
        assert_eq!(q.value, 3.0);
        assert_eq!(q.unit, "Hz 2pi");
    }

    #[test]
    fn test_quantity_new_inverted_bounds() {
        assert!(Quantity::new(0.0, 1.0, -1.0, "").is_err());
    }

    #[test]
    fn test_quantity_new_out_of_bounds() {
        assert!(Quantity::new(2.0, 0.0, 1.0, "").is_err());
    }

    #[test]
    fn test_quantity_opt_value_round_trip() {
        let mut q = Quantity::new(0.25, 0.0, 1.0, "").unwrap();
        let x = q.opt_value();
        assert_relative_eq!(x, -0.5);
        q.set_opt_value(x);
        assert_relative_eq!(q.value, 0.25);
    }

    #[test]
    fn test_quantity_opt_value_at_bounds() {
        let lo = Quantity::new(0.0, 0.0, 1.0, "").unwrap();
        let hi = Quantity::new(1.0, 0.0, 1.0, "").unwrap();
        assert_relative_eq!(lo.opt_value(), -1.0);
        assert_relative_eq!(hi.opt_value(), 1.0);
    }

    #[test]
    fn test_quantity_set_opt_value_clamps() {
        let mut q = amp();
        q.set_opt_value(7.0);
        assert_relative_eq!(q.value, 1.0);
        q.set_opt_value(-7.0);
        assert_relative_eq!(q.value, 0.0);
    }

    #[test]
    fn test_quantity_scale() {
        let q = Quantity::new(0.0, -2.0, 6.0, "").unwrap();
        assert_relative_eq!(q.scale(), 4.0);
    }

    // =========================================================================
    // ParameterMap
    // =========================================================================

    fn sample_map() -> ParameterMap {
        let mut pmap = ParameterMap::new();
        pmap.insert("rx90p/d1/gauss/amp", amp());
        pmap.insert(
            "rx90p/d1/gauss/sigma",
            Quantity::new(4e-9, 1e-9, 10e-9, "s").unwrap(),
        );
        pmap.insert(
            "rx90p/d1/carrier/freq",
            Quantity::new(5e9, 4e9, 6e9, "Hz 2pi").unwrap(),
        );
        pmap.set_opt_map(vec![
            "rx90p/d1/gauss/amp".into(),
            "rx90p/d1/gauss/sigma".into(),
        ])
        .unwrap();
        pmap
    }

    #[test]
    fn test_opt_map_unknown_id() {
        let mut pmap = sample_map();
        let result = pmap.set_opt_map(vec!["rx90p/d1/missing/amp".into()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_opt_vector_round_trip() {
        let mut pmap = sample_map();
        let x = pmap.opt_vector();
        assert_eq!(x.len(), 2);
        pmap.set_opt_vector(&x.view()).unwrap();
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/amp").unwrap(), 0.5);
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/sigma").unwrap(), 4e-9);
    }

    #[test]
    fn test_set_opt_vector_updates_values() {
        let mut pmap = sample_map();
        pmap.set_opt_vector(&Array1::from_vec(vec![1.0, -1.0]).view())
            .unwrap();
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/amp").unwrap(), 1.0);
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/sigma").unwrap(), 1e-9);
    }

    #[test]
    fn test_set_opt_vector_length_mismatch() {
        let mut pmap = sample_map();
        let result = pmap.set_opt_vector(&Array1::from_vec(vec![0.0]).view());
        assert!(result.is_err());
    }

    #[test]
    fn test_opt_units() {
        let pmap = sample_map();
        assert_eq!(pmap.opt_units(), vec!["V".to_string(), "s".to_string()]);
    }

    #[test]
    fn test_named_values_only_opt_params() {
        let pmap = sample_map();
        let values = pmap.named_values();
        assert_eq!(values.len(), 2);
        assert!(values.contains_key("rx90p/d1/gauss/amp"));
        assert!(!values.contains_key("rx90p/d1/carrier/freq"));
    }

    #[test]
    fn test_scales() {
        let pmap = sample_map();
        let scales = pmap.scales();
        assert_relative_eq!(scales[0], 0.5);
        assert_relative_eq!(scales[1], 4.5e-9);
    }

    #[test]
    fn test_load_best() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"opt_map": ["rx90p/d1/gauss/amp"], "units": ["V"],
                "optim_status": {{"goal": 0.01,
                "params": {{"rx90p/d1/gauss/amp": 0.75}}}}}}"#
        )
        .unwrap();

        let mut pmap = sample_map();
        pmap.load_best(f.path()).unwrap();
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/amp").unwrap(), 0.75);
    }

    #[test]
    fn test_load_best_clamps_to_bounds() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"optim_status": {{"params": {{"rx90p/d1/gauss/amp": 3.0}}}}}}"#
        )
        .unwrap();

        let mut pmap = sample_map();
        pmap.load_best(f.path()).unwrap();
        assert_relative_eq!(pmap.value("rx90p/d1/gauss/amp").unwrap(), 1.0);
    }

    #[test]
    fn test_load_best_missing_status() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"something": "else"}}"#).unwrap();

        let mut pmap = sample_map();
        assert!(pmap.load_best(f.path()).is_err());
    }
}
