// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Parameter and channel cascade: decides, for every atomic segment, which
//! declared rule wins each quantity, ranked by how narrowly the rule's
//! target selects that segment.

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::datamodel::{Channel, Geometry, Parameter, StartupInfo};
use crate::model_err;

/// A quantity bound to a concrete value, ready for emission.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub value: f64,
}

/// One resolution pass: model-wide assignments plus a block per atomic
/// segment, both in emission order.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct PassBindings {
    pub globals: Vec<Binding>,
    pub per_segment: Vec<Vec<Binding>>,
}

/// The fully resolved model the emitter serializes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub name: String,
    pub geometry: Geometry,
    /// Mechanism names to insert, per atomic segment.
    pub channels: Vec<Vec<String>>,
    /// Quantities applied once, at model construction.
    pub fixed: PassBindings,
    /// Quantities re-applied at every re-initialization.
    pub state: PassBindings,
}

/// State quantities are re-applied on every re-initialization: membrane
/// potential, gating variables, and ion concentrations.  The `v`/`m`/`h`
/// test looks at the first `_` word, the concentration test at the whole
/// name, so a targeted rule like `caInt_Soma` counts as non-state.
pub fn is_state_param(name: &str) -> bool {
    let first = name.split('_').next().unwrap_or(name);
    matches!(first, "v" | "m" | "h") || name.ends_with("Int") || name.ends_with("Ext")
}

/// How narrowly `target` selects the given segment; higher wins.
///
/// With a segment in hand: one of its candidate compartment names scores the
/// total compartment count, a tag it carries scores total minus the tag's
/// compartment count, another segment's candidate name scores -1
/// (inapplicable), anything else scores 0 (global).  Without a segment the
/// score is the best the target could achieve anywhere in the model, with
/// the wildcard tag scoring 0.
pub fn specificity(geo: &Geometry, target: &str, segment: Option<usize>) -> i64 {
    let total = geo.num_compartments as i64;
    match segment {
        Some(idx) => {
            let segment = &geo.segments[idx];
            if segment.compartment_names[0].iter().any(|n| n == target) {
                return total;
            }
            if segment.has_tag(target) {
                let count = geo.tags.count(target).unwrap_or(0) as i64;
                return total - count;
            }
            let named_elsewhere = geo
                .segments
                .iter()
                .enumerate()
                .filter(|(other_idx, _)| *other_idx != idx)
                .any(|(_, other)| other.compartment_names[0].iter().any(|n| n == target));
            if named_elsewhere { -1 } else { 0 }
        }
        None => {
            if let Some(count) = geo.tags.count(target) {
                return total - count as i64;
            }
            let named = geo
                .segments
                .iter()
                .any(|s| s.compartment_names[0].iter().any(|n| n == target));
            if named { total } else { 0 }
        }
    }
}

fn last_word(name: &str) -> &str {
    name.rsplit('_').next().unwrap_or(name)
}

fn strip_target(name: &str) -> &str {
    match name.rfind('_') {
        Some(split_at) => &name[..split_at],
        None => "",
    }
}

/// Resolves every declared rule against the (atomic) geometry.
///
/// Fails if any parameter still lacks a concrete value, so a fittable rule
/// must be pinned or sampled before the model can be built.
pub fn resolve(geo: &Geometry, startup: &StartupInfo, name: &str) -> Result<ResolvedModel> {
    for param in startup.parameters.iter() {
        if param.value.is_nan() {
            return model_err!(
                UnsetParameter,
                format!("parameter '{}' has no concrete value", param.name)
            );
        }
    }

    Ok(ResolvedModel {
        name: name.to_string(),
        geometry: geo.clone(),
        channels: resolve_channels(geo, &startup.channels),
        fixed: resolve_pass(geo, &startup.parameters, false),
        state: resolve_pass(geo, &startup.parameters, true),
    })
}

fn resolve_channels(geo: &Geometry, channels: &[Channel]) -> Vec<Vec<String>> {
    geo.segments
        .iter()
        .map(|segment| {
            let mut mechanisms: Vec<String> = Vec::new();
            for channel in channels {
                let applies = channel.tag == crate::datamodel::WILDCARD_TAG
                    || segment.has_tag(&channel.tag)
                    || segment
                        .compartment_names[0]
                        .iter()
                        .any(|n| *n == channel.tag);
                if applies && !mechanisms.contains(&channel.mechanism) {
                    mechanisms.push(channel.mechanism.clone());
                }
            }
            mechanisms
        })
        .collect()
}

fn resolve_pass(geo: &Geometry, params: &[Parameter], want_state: bool) -> PassBindings {
    let mut globals: Vec<Binding> = Vec::new();
    for param in params {
        if is_state_param(&param.name) != want_state {
            continue;
        }
        if specificity(geo, last_word(&param.name), None) > 0 {
            continue;
        }
        match globals.iter_mut().find(|b| b.name == param.name) {
            Some(binding) => binding.value = param.value,
            None => globals.push(Binding {
                name: param.name.clone(),
                value: param.value,
            }),
        }
    }
    // plain names flush left of targeted ones; stable within each group
    globals.sort_by_key(|b| b.name.contains('_'));

    let mut per_segment = Vec::with_capacity(geo.segments.len());
    for idx in 0..geo.segments.len() {
        let mut bound: Vec<(Binding, i64)> = Vec::new();
        for param in params {
            if is_state_param(&param.name) != want_state {
                continue;
            }
            let rank = specificity(geo, last_word(&param.name), Some(idx));
            if rank <= 0 {
                continue;
            }
            let write_name = strip_target(&param.name);
            if write_name.is_empty() {
                continue;
            }
            match bound.iter_mut().find(|(b, _)| b.name == write_name) {
                Some((binding, held)) => {
                    // later declarations win ties
                    if rank >= *held {
                        binding.value = param.value;
                        *held = rank;
                    }
                }
                None => bound.push((
                    Binding {
                        name: write_name.to_string(),
                        value: param.value,
                    },
                    rank,
                )),
            }
        }
        per_segment.push(bound.into_iter().map(|(binding, _)| binding).collect());
    }

    PassBindings {
        globals,
        per_segment,
    }
}
