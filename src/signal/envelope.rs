// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Envelope shapes and signal components.
//!
//! An envelope is evaluated on the gate-relative time axis `t ∈ [0, T]`
//! where `T` is the gate length. All shapes are dimensionless multiples of
//! their `amp` parameter so that amplitude gradients stay analytic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};

/// Envelope shape families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Offset-subtracted gaussian: zero at the window edges.
    Gaussian,
    /// Flat top with tanh rise/fall ramps.
    Flattop,
    /// Gaussian-derivative quadrature (DRAG correction).
    Drag,
}

impl Shape {
    /// Parse a shape name from configuration.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gaussian" => Ok(Shape::Gaussian),
            "flattop" => Ok(Shape::Flattop),
            "drag" => Ok(Shape::Drag),
            other => Err(SignalError::UnknownShape(other.to_string()).into()),
        }
    }

    /// Canonical shape name.
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Gaussian => "gaussian",
            Shape::Flattop => "flattop",
            Shape::Drag => "drag",
        }
    }

    /// Parameters the shape requires beyond `amp`.
    fn required_params(&self) -> &'static [&'static str] {
        match self {
            Shape::Gaussian => &["sigma"],
            Shape::Flattop => &["t_up", "t_down", "ramp"],
            Shape::Drag => &["sigma"],
        }
    }

    /// Shape value at `t` for unit amplitude.
    fn value(&self, t: f64, t_final: f64, params: &BTreeMap<String, f64>) -> f64 {
        match self {
            Shape::Gaussian => {
                let sigma = params["sigma"];
                let mid = t_final / 2.0;
                let g = (-(t - mid).powi(2) / (2.0 * sigma * sigma)).exp();
                let edge = (-mid * mid / (2.0 * sigma * sigma)).exp();
                (g - edge) / (1.0 - edge)
            }
            Shape::Flattop => {
                let t_up = params["t_up"];
                let t_down = params["t_down"];
                let ramp = params["ramp"];
                0.25 * (1.0 + ((t - t_up) / ramp).tanh()) * (1.0 + ((t_down - t) / ramp).tanh())
            }
            Shape::Drag => {
                let sigma = params["sigma"];
                let mid = t_final / 2.0;
                -((t - mid) / sigma) * (-(t - mid).powi(2) / (2.0 * sigma * sigma)).exp()
            }
        }
    }
}

/// What role a component plays on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Additive envelope.
    Envelope(Shape),
    /// Multiplicative carrier, `cos(2π·freq·t + phase)`.
    Carrier,
}

/// A named signal primitive attached to one channel of an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component name, unique per channel (last write wins).
    pub name: String,
    /// Envelope or carrier.
    pub kind: ComponentKind,
    /// Named scalar parameters.
    pub params: BTreeMap<String, f64>,
}

impl Component {
    /// Create an envelope component.
    ///
    /// # Errors
    ///
    /// Fails if `amp` or a shape-required parameter is missing.
    pub fn envelope(
        name: impl Into<String>,
        shape: Shape,
        params: BTreeMap<String, f64>,
    ) -> Result<Self> {
        let name = name.into();
        let mut required = vec!["amp"];
        required.extend_from_slice(shape.required_params());
        for key in required {
            if !params.contains_key(key) {
                return Err(SignalError::MissingParam {
                    component: name,
                    param: key.to_string(),
                }
                .into());
            }
        }
        Ok(Self {
            name,
            kind: ComponentKind::Envelope(shape),
            params,
        })
    }

    /// Create a carrier component.
    pub fn carrier(name: impl Into<String>, freq: f64, phase: f64) -> Self {
        let mut params = BTreeMap::new();
        params.insert("freq".to_string(), freq);
        params.insert("phase".to_string(), phase);
        Self {
            name: name.into(),
            kind: ComponentKind::Carrier,
            params,
        }
    }

    /// Envelope value at gate-relative time `t` (zero for carriers).
    pub fn sample(&self, t: f64, t_final: f64) -> f64 {
        match self.kind {
            ComponentKind::Envelope(shape) => self.params["amp"] * shape.value(t, t_final, &self.params),
            ComponentKind::Carrier => 0.0,
        }
    }

    /// Carrier modulation factor at gate-relative time `t` (1 for envelopes).
    pub fn modulation(&self, t: f64) -> f64 {
        match self.kind {
            ComponentKind::Envelope(_) => 1.0,
            ComponentKind::Carrier => {
                (2.0 * std::f64::consts::PI * self.params["freq"] * t + self.params["phase"]).cos()
            }
        }
    }

    /// Derivative of [`modulation`](Self::modulation) with respect to one
    /// carrier parameter (zero for envelopes).
    pub fn modulation_grad(&self, t: f64, param: &str) -> f64 {
        let ComponentKind::Carrier = self.kind else {
            return 0.0;
        };
        let arg = 2.0 * std::f64::consts::PI * self.params["freq"] * t + self.params["phase"];
        match param {
            "freq" => -arg.sin() * 2.0 * std::f64::consts::PI * t,
            "phase" => -arg.sin(),
            _ => 0.0,
        }
    }

    /// Derivative of [`sample`](Self::sample) with respect to one parameter.
    ///
    /// `amp` is analytic (the shape value itself). Shape parameters use a
    /// central difference of the bare envelope, which costs two shape
    /// evaluations and no simulation.
    pub fn sample_grad(&self, t: f64, t_final: f64, param: &str) -> f64 {
        let ComponentKind::Envelope(shape) = self.kind else {
            return 0.0;
        };
        if param == "amp" {
            return shape.value(t, t_final, &self.params);
        }
        let Some(&p) = self.params.get(param) else {
            return 0.0;
        };
        let h = (p.abs() * 1e-6).max(1e-14);
        let mut plus = self.params.clone();
        plus.insert(param.to_string(), p + h);
        let mut minus = self.params.clone();
        minus.insert(param.to_string(), p - h);
        let amp = self.params["amp"];
        amp * (shape.value(t, t_final, &plus) - shape.value(t, t_final, &minus)) / (2.0 * h)
    }

    /// True for carrier components.
    pub fn is_carrier(&self) -> bool {
        matches!(self.kind, ComponentKind::Carrier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gauss(amp: f64, sigma: f64) -> Component {
        let mut params = BTreeMap::new();
        params.insert("amp".into(), amp);
        params.insert("sigma".into(), sigma);
        Component::envelope("gauss", Shape::Gaussian, params).unwrap()
    }

    fn flattop(amp: f64, t_up: f64, t_down: f64, ramp: f64) -> Component {
        let mut params = BTreeMap::new();
        params.insert("amp".into(), amp);
        params.insert("t_up".into(), t_up);
        params.insert("t_down".into(), t_down);
        params.insert("ramp".into(), ramp);
        Component::envelope("flattop", Shape::Flattop, params).unwrap()
    }

    // =========================================================================
    // Shape parsing
    // =========================================================================

    #[test]
    fn test_shape_from_name() {
        assert_eq!(Shape::from_name("gaussian").unwrap(), Shape::Gaussian);
        assert_eq!(Shape::from_name("flattop").unwrap(), Shape::Flattop);
        assert_eq!(Shape::from_name("drag").unwrap(), Shape::Drag);
        assert!(Shape::from_name("sinc").is_err());
    }

    #[test]
    fn test_shape_name_round_trip() {
        for shape in [Shape::Gaussian, Shape::Flattop, Shape::Drag] {
            assert_eq!(Shape::from_name(shape.name()).unwrap(), shape);
        }
    }

    // =========================================================================
    // Envelope values
    // =========================================================================

    #[test]
    fn test_gaussian_peak_at_center() {
        let c = gauss(0.8, 5e-9);
        let t_final = 20e-9;
        assert_relative_eq!(c.sample(t_final / 2.0, t_final), 0.8, max_relative = 1e-12);
    }

    #[test]
    fn test_gaussian_zero_at_edges() {
        let c = gauss(0.8, 5e-9);
        let t_final = 20e-9;
        assert_relative_eq!(c.sample(0.0, t_final), 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.sample(t_final, t_final), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flattop_plateau_and_edges() {
        let c = flattop(1.0, 5e-9, 45e-9, 1e-9);
        let t_final = 50e-9;
        // Middle of the plateau is ~amp, far edges are ~0.
        assert_relative_eq!(c.sample(25e-9, t_final), 1.0, epsilon = 1e-6);
        assert!(c.sample(0.0, t_final).abs() < 0.01);
        assert!(c.sample(t_final, t_final).abs() < 0.01);
    }

    #[test]
    fn test_drag_antisymmetric() {
        let mut params = BTreeMap::new();
        params.insert("amp".into(), 0.3);
        params.insert("sigma".into(), 4e-9);
        let c = Component::envelope("drag", Shape::Drag, params).unwrap();
        let t_final = 20e-9;
        let left = c.sample(8e-9, t_final);
        let right = c.sample(12e-9, t_final);
        assert_relative_eq!(left, -right, max_relative = 1e-12);
        assert_relative_eq!(c.sample(10e-9, t_final), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_envelope_missing_param() {
        let mut params = BTreeMap::new();
        params.insert("amp".into(), 1.0);
        let result = Component::envelope("gauss", Shape::Gaussian, params);
        assert!(result.is_err());
    }

    // =========================================================================
    // Carrier
    // =========================================================================

    #[test]
    fn test_carrier_modulation() {
        let c = Component::carrier("lo", 1e9, 0.0);
        assert_relative_eq!(c.modulation(0.0), 1.0);
        // Quarter period of a 1 GHz carrier.
        assert_relative_eq!(c.modulation(0.25e-9), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_carrier_samples_zero() {
        let c = Component::carrier("lo", 1e9, 0.0);
        assert_eq!(c.sample(1e-9, 20e-9), 0.0);
        assert!(c.is_carrier());
    }

    #[test]
    fn test_envelope_modulation_is_unity() {
        let c = gauss(1.0, 5e-9);
        assert_eq!(c.modulation(3e-9), 1.0);
    }

    // =========================================================================
    // Gradients
    // =========================================================================

    #[test]
    fn test_amp_gradient_is_shape_value() {
        let c = gauss(0.8, 5e-9);
        let t_final = 20e-9;
        let t = 7e-9;
        let grad = c.sample_grad(t, t_final, "amp");
        assert_relative_eq!(grad * 0.8, c.sample(t, t_final), max_relative = 1e-12);
    }

    #[test]
    fn test_sigma_gradient_matches_finite_difference() {
        let t_final = 20e-9;
        let t = 6e-9;
        let sigma = 5e-9;
        let c = gauss(0.8, sigma);
        let grad = c.sample_grad(t, t_final, "sigma");

        let h = 1e-12;
        let fd = (gauss(0.8, sigma + h).sample(t, t_final)
            - gauss(0.8, sigma - h).sample(t, t_final))
            / (2.0 * h);
        assert_relative_eq!(grad, fd, max_relative = 1e-3);
    }

    #[test]
    fn test_gradient_unknown_param_is_zero() {
        let c = gauss(0.8, 5e-9);
        assert_eq!(c.sample_grad(1e-9, 20e-9, "beta"), 0.0);
    }

    #[test]
    fn test_carrier_gradient_is_zero() {
        let c = Component::carrier("lo", 1e9, 0.0);
        assert_eq!(c.sample_grad(1e-9, 20e-9, "freq"), 0.0);
    }
}
