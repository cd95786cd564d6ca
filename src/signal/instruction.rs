// Copyright 2026 qoctl Contributors
// SPDX-License-Identifier: Apache-2.0

//! One gate's control specification across its drive channels.
//!
//! An [`Instruction`] is built once per gate: channels are declared at
//! construction, components are attached incrementally, then the instruction
//! is handed to the simulation backend. The serialized form
//! `{gate_length, drive_channels}` is stable and consumed by logging and the
//! pulse dump sink.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::error::{Result, SignalError};
use crate::params::ParameterMap;
use crate::signal::envelope::Component;

/// Control-pulse specification for a single gate.
///
/// # Invariants
///
/// - `t_end >= t_start` (checked at construction)
/// - `gate_length` is always derived as `t_end - t_start`, never stored
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Gate name, e.g. "rx90p".
    pub name: String,
    t_start: f64,
    t_end: f64,
    channels: Vec<String>,
    comps: BTreeMap<String, Vec<Component>>,
}

impl Instruction {
    /// Create an instruction with its declared channels and time window.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidWindow` if `t_end < t_start`.
    pub fn new(
        name: impl Into<String>,
        channels: Vec<String>,
        t_start: f64,
        t_end: f64,
    ) -> Result<Self> {
        if t_end < t_start {
            return Err(SignalError::InvalidWindow { t_start, t_end }.into());
        }
        let comps = channels
            .iter()
            .map(|chan| (chan.clone(), Vec::new()))
            .collect();
        Ok(Self {
            name: name.into(),
            t_start,
            t_end,
            channels,
            comps,
        })
    }

    /// Signal start time in seconds.
    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    /// Signal end time in seconds.
    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    /// Gate length, derived from the time window.
    pub fn gate_length(&self) -> f64 {
        self.t_end - self.t_start
    }

    /// Declared channels, in declaration order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Components attached to a channel.
    pub fn components(&self, channel: &str) -> Option<&[Component]> {
        self.comps.get(channel).map(|v| v.as_slice())
    }

    /// Attach a component to a channel.
    ///
    /// A component with the same name already on that channel is replaced
    /// silently (last write wins, position preserved).
    ///
    /// # Errors
    ///
    /// Fails with `UnknownChannel` if the channel was not declared at
    /// construction.
    pub fn add_component(&mut self, comp: Component, channel: &str) -> Result<()> {
        let slot = self.comps.get_mut(channel).ok_or_else(|| SignalError::UnknownChannel {
            channel: channel.to_string(),
            instruction: self.name.clone(),
        })?;
        match slot.iter_mut().find(|c| c.name == comp.name) {
            Some(existing) => *existing = comp,
            None => slot.push(comp),
        }
        Ok(())
    }

    /// Stable serialized form:
    /// `{gate_length, drive_channels: {channel: {name: params}}}`.
    pub fn serialize(&self) -> Value {
        let mut channels = serde_json::Map::new();
        for (chan, comps) in &self.comps {
            let mut entries = serde_json::Map::new();
            for comp in comps {
                let mut params = serde_json::Map::new();
                if let crate::signal::envelope::ComponentKind::Envelope(shape) = comp.kind {
                    params.insert("shape".to_string(), json!(shape.name()));
                }
                for (key, value) in &comp.params {
                    params.insert(key.clone(), json!(value));
                }
                entries.insert(comp.name.clone(), Value::Object(params));
            }
            channels.insert(chan.clone(), Value::Object(entries));
        }
        json!({
            "gate_length": self.gate_length(),
            "drive_channels": Value::Object(channels),
        })
    }

    /// Channel waveform at absolute time `t`: the sum of the channel's
    /// envelopes, modulated by its carriers.
    pub fn sample(&self, channel: &str, t: f64) -> f64 {
        let Some(comps) = self.comps.get(channel) else {
            return 0.0;
        };
        let t_rel = t - self.t_start;
        let t_final = self.gate_length();
        let envelope: f64 = comps.iter().map(|c| c.sample(t_rel, t_final)).sum();
        let modulation: f64 = comps
            .iter()
            .filter(|c| c.is_carrier())
            .map(|c| c.modulation(t_rel))
            .product();
        envelope * modulation
    }

    /// Derivative of [`sample`](Self::sample) with respect to one component
    /// parameter on this channel.
    pub fn sample_grad(&self, channel: &str, comp_name: &str, param: &str, t: f64) -> f64 {
        let Some(comps) = self.comps.get(channel) else {
            return 0.0;
        };
        let t_rel = t - self.t_start;
        let t_final = self.gate_length();
        let Some(comp) = comps.iter().find(|c| c.name == comp_name) else {
            return 0.0;
        };
        if comp.is_carrier() {
            let envelope: f64 = comps.iter().map(|c| c.sample(t_rel, t_final)).sum();
            let others: f64 = comps
                .iter()
                .filter(|c| c.is_carrier() && c.name != comp_name)
                .map(|c| c.modulation(t_rel))
                .product();
            envelope * others * comp.modulation_grad(t_rel, param)
        } else {
            let modulation: f64 = comps
                .iter()
                .filter(|c| c.is_carrier())
                .map(|c| c.modulation(t_rel))
                .product();
            comp.sample_grad(t_rel, t_final, param) * modulation
        }
    }

    /// Push parameter-map values into component parameters.
    ///
    /// Ids follow `gate/channel/component/param`; ids absent from the map
    /// leave the component parameter untouched.
    pub fn apply_params(&mut self, pmap: &ParameterMap) {
        for (chan, comps) in self.comps.iter_mut() {
            for comp in comps.iter_mut() {
                let keys: Vec<String> = comp.params.keys().cloned().collect();
                for key in keys {
                    let id = format!("{}/{}/{}/{}", self.name, chan, comp.name, key);
                    if let Some(value) = pmap.value(&id) {
                        comp.params.insert(key, value);
                    }
                }
            }
        }
    }

    /// Parameter ids this instruction exposes, `gate/channel/component/param`.
    pub fn param_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for (chan, comps) in &self.comps {
            for comp in comps {
                for key in comp.params.keys() {
                    ids.push(format!("{}/{}/{}/{}", self.name, chan, comp.name, key));
                }
            }
        }
        ids
    }
}
