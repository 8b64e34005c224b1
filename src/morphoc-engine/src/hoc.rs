// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Serializes a resolved model as a hoc template.  The section ordering,
//! connection rule, and column layout are what the downstream simulation
//! engine expects; emission renders the whole template to a string so a
//! failure never leaves a truncated file behind.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::cascade::{PassBindings, ResolvedModel};
use crate::common::Result;
use crate::datamodel::Geometry;
use crate::graph::node_side;
use crate::model_err;

lazy_static! {
    // quantity name -> (engine name, value scale, unit comment)
    static ref EXACT_TRANSLATIONS: HashMap<&'static str, (&'static str, f64, &'static str)> = {
        let mut table = HashMap::new();
        table.insert("v", ("v(0.5)", 1.0, ""));
        table.insert("specificCapacitance", ("cm", 0.1, " // uF/cm^2"));
        table.insert("axialResistivity", ("Ra", 100.0, " // ohm cm"));
        table
    };
}

/// Maps a quantity name onto the engine's own name, scale, and unit
/// comment.  Concentrations swap their `Ext`/`Int` suffix for the engine's
/// `o`/`i`, gating variables gain their `0` initial-value marker.
fn translate(name: &str, value: f64) -> (String, f64, &'static str) {
    if let Some((engine_name, scale, comment)) = EXACT_TRANSLATIONS.get(name) {
        return ((*engine_name).to_string(), value * scale, comment);
    }
    if let Some(stem) = name.strip_suffix("Ext") {
        return (format!("{stem}o"), value, " // mM");
    }
    if let Some(stem) = name.strip_suffix("Int") {
        return (format!("{stem}i"), value, " // mM");
    }
    match name.split('_').next().unwrap_or(name) {
        "m" => (replace_first_word(name, "m0"), value, ""),
        "h" => (replace_first_word(name, "h0"), value, ""),
        "gBar" => (name.to_string(), value, " // uS/mm^2"),
        _ => (name.to_string(), value, ""),
    }
}

fn replace_first_word(name: &str, with: &str) -> String {
    match name.find('_') {
        Some(split_at) => format!("{with}{}", &name[split_at..]),
        None => with.to_string(),
    }
}

/// Renders `value` the way C's `%g` would: six significant digits,
/// trailing zeros dropped, scientific notation outside [1e-4, 1e6).
pub fn fmt_g(value: f64) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        let fixed = format!("{value:.decimals$}");
        if fixed.contains('.') {
            fixed
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        } else {
            fixed
        }
    }
}

/// Renders the full hoc template for a resolved model.
pub fn emit_model(model: &ResolvedModel) -> Result<String> {
    let geo = &model.geometry;
    if geo.segments.is_empty() {
        return model_err!(EmptyModel, "the geometry contains no segments".to_string());
    }

    let mut out = String::new();
    out.push_str(&format!("begintemplate {}\n\n", model.name));
    for segment in geo.segments.iter() {
        out.push_str(&format!("public {}\n", segment.name));
    }
    out.push('\n');
    for segment in geo.segments.iter() {
        out.push_str(&format!("create {}\n", segment.name));
    }

    out.push_str("\nproc init() {\n");
    out.push_str("  // Create the model segments:\n");
    for segment in geo.segments.iter() {
        out.push_str(&format!("  create {}\n", segment.name));
    }

    out.push_str("\n  // Set first segment as default access:\n");
    out.push_str(&format!("  access {}\n", geo.segments[0].name));

    out.push_str("\n  // Connect the model segments:\n");
    for (idx, segment) in geo.segments.iter().enumerate() {
        for node_idx in [segment.node0, segment.node1] {
            let node = match geo.nodes.get(node_idx) {
                Some(node) => node,
                None => {
                    return model_err!(
                        NodeCountMismatch,
                        format!("'{}' references missing node {node_idx}", segment.name)
                    );
                }
            };
            let lower = node.segments.iter().copied().filter(|&s| s < idx).min();
            if let Some(other_idx) = lower {
                let other = &geo.segments[other_idx];
                out.push_str(&format!(
                    "  connect {}({}), {}({})\n",
                    segment.name,
                    node_side(segment, node_idx)?,
                    other.name,
                    node_side(other, node_idx)?,
                ));
            }
        }
    }

    out.push_str("\n  // Set the physical dimensions of the model segments:\n");
    for segment in geo.segments.iter() {
        out.push_str(&format!("  {} {{\n", segment.name));
        out.push_str(&format!("    diam = {:>19} // um\n", fmt_g(segment.diam_um())));
        out.push_str(&format!("    L    = {:>19} // um\n", fmt_g(segment.length)));
        out.push_str(&format!("    nseg = {}\n", segment.num_compartments));
        out.push_str("  }\n");
    }

    out.push_str("\n  // Add channels to model segments:\n");
    for (segment, mechanisms) in geo.segments.iter().zip(model.channels.iter()) {
        if mechanisms.is_empty() {
            continue;
        }
        out.push_str(&format!("  {} {{\n", segment.name));
        for mechanism in mechanisms {
            out.push_str(&format!("    insert {mechanism}\n"));
        }
        out.push_str("  }\n");
    }

    out.push_str("\n  // Set the value of non-state parameters:\n");
    write_pass(&mut out, geo, &model.fixed);
    out.push_str("}\n");

    out.push_str("\nproc setState() {\n");
    out.push_str("  // Initialize the model:\n");
    out.push_str("  finitialize()\n");
    out.push_str("  fcurrent()\n");
    out.push_str("  // Set the values of state parameters:\n");
    write_pass(&mut out, geo, &model.state);
    out.push_str("}\n");
    out.push_str(&format!("endtemplate {}\n", model.name));

    Ok(out)
}

fn write_pass(out: &mut String, geo: &Geometry, pass: &PassBindings) {
    for binding in pass.globals.iter() {
        let (name, value, comment) = translate(&binding.name, binding.value);
        out.push_str(&format!("  {name:<19}   = {:>19}{comment}\n", fmt_g(value)));
    }
    for (segment, bindings) in geo.segments.iter().zip(pass.per_segment.iter()) {
        out.push_str(&format!("  {} {{\n", segment.name));
        for binding in bindings {
            let (name, value, comment) = translate(&binding.name, binding.value);
            out.push_str(&format!("    {name:<19} = {:>19}{comment}\n", fmt_g(value)));
        }
        out.push_str("  }\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== %g formatting ====================

    #[test]
    fn formats_plain_values() {
        assert_eq!("0", fmt_g(0.0));
        assert_eq!("2", fmt_g(2.0));
        assert_eq!("-65", fmt_g(-65.0));
        assert_eq!("100", fmt_g(100.0));
        assert_eq!("0.1", fmt_g(0.1));
        assert_eq!("999999", fmt_g(999999.0));
        assert_eq!("0.0001", fmt_g(0.0001));
    }

    #[test]
    fn rounds_to_six_significant_digits() {
        assert_eq!("31.4159", fmt_g(31.415926535));
        assert_eq!("0.000123457", fmt_g(0.000123456789));
        assert_eq!("123457", fmt_g(123456.7));
    }

    #[test]
    fn switches_to_scientific_notation() {
        assert_eq!("1e-05", fmt_g(1e-5));
        assert_eq!("1.23457e+08", fmt_g(123456789.0));
        assert_eq!("1.23457e+06", fmt_g(1234567.0));
        assert_eq!("-2.5e-07", fmt_g(-2.5e-7));
        assert_eq!("1e+06", fmt_g(999999.5));
    }

    // ==================== name translation ====================

    #[test]
    fn translates_engine_names() {
        assert_eq!(("v(0.5)".to_string(), -65.0, ""), translate("v", -65.0));

        let (name, value, comment) = translate("specificCapacitance", 1.0);
        assert_eq!("cm", name);
        assert!((value - 0.1).abs() < 1e-12);
        assert_eq!(" // uF/cm^2", comment);

        let (name, value, comment) = translate("axialResistivity", 1.5);
        assert_eq!("Ra", name);
        assert!((value - 150.0).abs() < 1e-12);
        assert_eq!(" // ohm cm", comment);
    }

    #[test]
    fn translates_concentrations_and_gates() {
        assert_eq!(("cao".to_string(), 2.0, " // mM"), translate("caExt", 2.0));
        assert_eq!(("ki".to_string(), 140.0, " // mM"), translate("kInt", 140.0));
        assert_eq!(("m0_NaV".to_string(), 0.05, ""), translate("m_NaV", 0.05));
        assert_eq!(("h0".to_string(), 0.6, ""), translate("h", 0.6));
        assert_eq!(
            ("gBar_NaV".to_string(), 5.0, " // uS/mm^2"),
            translate("gBar_NaV", 5.0)
        );
        assert_eq!(("eLeak".to_string(), -60.0, ""), translate("eLeak", -60.0));
    }
}
