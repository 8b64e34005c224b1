// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Exhaustive sweep over the fittable parameter rules: every rule expands
//! to a fixed number of sample points, every combination is evaluated, and
//! the lowest fit error wins.

use std::time::{Duration, Instant};

use morphoc_engine::datamodel::Distribution;
use morphoc_engine::{Parameter, StartupInfo, sim_err};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::Result;

/// Expands a rule to `num_values` sample points between its bounds.
///
/// Log-distributed rules interpolate in log10 space, keeping the sign of
/// the bounds; everything else interpolates linearly.  A constant rule is
/// its single value no matter how many points were asked for.
pub fn expand_values(param: &Parameter, num_values: usize) -> Vec<f64> {
    if param.is_constant {
        return vec![param.value];
    }
    if num_values <= 1 {
        return vec![param.min];
    }

    let steps = (num_values - 1) as f64;
    (0..num_values)
        .map(|i| {
            let u = i as f64 / steps;
            match param.distribution {
                Distribution::LogDistributed => {
                    let sign = if param.min < 0.0 { -1.0 } else { 1.0 };
                    let lo = param.min.abs().log10();
                    let hi = param.max.abs().log10();
                    sign * 10f64.powf(lo + u * (hi - lo))
                }
                _ => param.min + u * (param.max - param.min),
            }
        })
        .collect()
}

/// The rules a sweep varies, in first-declaration order.  A name declared
/// more than once keeps its first position but its last-declared range.
pub fn fittable_rules(startup: &StartupInfo) -> Vec<Parameter> {
    let mut rules: Vec<Parameter> = Vec::new();
    for param in &startup.parameters {
        if param.is_constant {
            continue;
        }
        match rules.iter_mut().find(|rule| rule.name == param.name) {
            Some(rule) => *rule = param.clone(),
            None => rules.push(param.clone()),
        }
    }
    rules
}

/// Point in the cross product at a flat index; the first list varies
/// slowest.  An empty product has exactly one (empty) combination.
fn combination(lists: &[Vec<f64>], index: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity(lists.len());
    let mut rem = index;
    for list in lists.iter().rev() {
        values.push(list[rem % list.len()]);
        rem /= list.len();
    }
    values.reverse();
    values
}

fn num_combinations(lists: &[Vec<f64>]) -> usize {
    lists.iter().map(Vec::len).product()
}

/// What a finished sweep found.
#[derive(Clone, PartialEq, Debug)]
pub struct BatchOutcome {
    /// Names of the swept rules, parallel to `best_values`.
    pub names: Vec<String>,
    pub best_values: Vec<f64>,
    pub best_error: f64,
    pub best_index: usize,
    pub evaluated: usize,
    pub elapsed: Duration,
}

/// Evaluates every combination of the startup's fittable rules in parallel
/// and returns the one with the lowest fit error.
///
/// `eval` sees a startup with every swept rule pinned, plus the flat index
/// of the combination for labelling per-run scratch files.  An `Err` from
/// `eval` scores as +inf, so one failed run cannot sink the sweep.  Ties go
/// to the lowest index, which makes the outcome deterministic regardless
/// of worker scheduling.
pub fn run_batch<F>(startup: &StartupInfo, num_values: usize, eval: F) -> Result<BatchOutcome>
where
    F: Fn(&StartupInfo, usize) -> Result<f64> + Sync,
{
    let rules = fittable_rules(startup);
    let names: Vec<String> = rules.iter().map(|rule| rule.name.clone()).collect();
    let lists: Vec<Vec<f64>> = rules
        .iter()
        .map(|rule| expand_values(rule, num_values))
        .collect();
    let total = num_combinations(&lists);

    let started = Instant::now();
    let best = (0..total)
        .into_par_iter()
        .map(|index| {
            let mut candidate = startup.clone();
            let values = combination(&lists, index);
            for (name, value) in names.iter().zip(&values) {
                candidate.apply_override(name, *value);
            }
            let error = eval(&candidate, index).unwrap_or(f64::INFINITY);
            (OrderedFloat(error), index)
        })
        .min();

    match best {
        Some((OrderedFloat(best_error), best_index)) => Ok(BatchOutcome {
            best_values: combination(&lists, best_index),
            names,
            best_error,
            best_index,
            evaluated: total,
            elapsed: started.elapsed(),
        }),
        None => sim_err!(
            Generic,
            "the sweep expanded to zero candidate models".to_string()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use morphoc_engine::parse_startup;

    fn range(name: &str, min: f64, max: f64) -> Parameter {
        Parameter::with_range(name, min, max, min, max).unwrap()
    }

    // ==================== expansion ====================

    #[test]
    fn log_rules_expand_geometrically() {
        let values = expand_values(&range("gBar", 1.0, 100.0), 3);
        assert_eq!(3, values.len());
        assert!(approx_eq!(f64, 1.0, values[0], epsilon = 1e-12));
        assert!(approx_eq!(f64, 10.0, values[1], epsilon = 1e-12));
        assert!(approx_eq!(f64, 100.0, values[2], epsilon = 1e-12));
    }

    #[test]
    fn negative_log_rules_keep_their_sign() {
        let values = expand_values(&range("e_K", -100.0, -1.0), 3);
        assert!(approx_eq!(f64, -100.0, values[0], epsilon = 1e-12));
        assert!(approx_eq!(f64, -10.0, values[1], epsilon = 1e-12));
        assert!(approx_eq!(f64, -1.0, values[2], epsilon = 1e-12));
    }

    #[test]
    fn uniform_rules_expand_linearly() {
        let values = expand_values(&range("e", -10.0, 10.0), 5);
        assert_eq!(vec![-10.0, -5.0, 0.0, 5.0, 10.0], values);
    }

    #[test]
    fn degenerate_expansions() {
        let constant = Parameter::constant("leak", 2.5);
        assert_eq!(vec![2.5], expand_values(&constant, 7));
        assert_eq!(vec![1.0], expand_values(&range("gBar", 1.0, 100.0), 1));
    }

    // ==================== rule selection ====================

    #[test]
    fn redeclared_rules_keep_first_position_last_range() {
        let source = "\
parameter gBar_NaV 1.0 10.0
parameter leak 0.3
parameter gBar_KDR 1.0 2.0
parameter gBar_NaV 100.0 1000.0
";
        let startup = parse_startup(source, "s").unwrap();
        let rules = fittable_rules(&startup);

        assert_eq!(2, rules.len());
        assert_eq!("gBar_NaV", rules[0].name);
        assert_eq!((100.0, 1000.0), (rules[0].min, rules[0].max));
        assert_eq!("gBar_KDR", rules[1].name);
    }

    // ==================== combinations ====================

    #[test]
    fn first_rule_varies_slowest() {
        let lists = vec![vec![1.0, 2.0], vec![10.0, 20.0, 30.0]];
        assert_eq!(6, num_combinations(&lists));
        assert_eq!(vec![1.0, 10.0], combination(&lists, 0));
        assert_eq!(vec![1.0, 20.0], combination(&lists, 1));
        assert_eq!(vec![1.0, 30.0], combination(&lists, 2));
        assert_eq!(vec![2.0, 10.0], combination(&lists, 3));
        assert_eq!(vec![2.0, 30.0], combination(&lists, 5));
    }

    #[test]
    fn empty_product_has_one_combination() {
        let lists: Vec<Vec<f64>> = Vec::new();
        assert_eq!(1, num_combinations(&lists));
        assert!(combination(&lists, 0).is_empty());
    }

    // ==================== sweeps ====================

    fn pinned(startup: &StartupInfo, name: &str) -> f64 {
        startup
            .parameters
            .iter()
            .find(|p| p.name == name)
            .unwrap()
            .value
    }

    #[test]
    fn finds_the_minimum_combination() {
        let source = "\
parameter gBar 1.0 100.0
parameter e 0.0 10.0
parameter leak 0.3
";
        let startup = parse_startup(source, "s").unwrap();
        let outcome = run_batch(&startup, 3, |candidate, _| {
            let g = pinned(candidate, "gBar");
            let e = pinned(candidate, "e");
            Ok((g - 10.0).powi(2) + (e - 5.0).powi(2))
        })
        .unwrap();

        assert_eq!(vec!["gBar", "e"], outcome.names);
        assert_eq!(9, outcome.evaluated);
        assert_eq!(4, outcome.best_index);
        assert!(approx_eq!(f64, 10.0, outcome.best_values[0], epsilon = 1e-12));
        assert!(approx_eq!(f64, 5.0, outcome.best_values[1], epsilon = 1e-12));
        assert!(approx_eq!(f64, 0.0, outcome.best_error, epsilon = 1e-12));
    }

    #[test]
    fn failed_runs_rank_behind_any_finished_run() {
        let startup = parse_startup("parameter gBar 1.0 100.0\n", "s").unwrap();
        let outcome = run_batch(&startup, 3, |_, index| {
            if index == 2 {
                Ok(1.0e6)
            } else {
                sim_err!(EngineFailed, "simulated crash".to_string())
            }
        })
        .unwrap();

        assert_eq!(2, outcome.best_index);
        assert_eq!(1.0e6, outcome.best_error);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let startup = parse_startup("parameter gBar 1.0 100.0\n", "s").unwrap();
        let outcome = run_batch(&startup, 4, |_, _| Ok(1.0)).unwrap();
        assert_eq!(0, outcome.best_index);
        assert_eq!(4, outcome.evaluated);
    }

    #[test]
    fn all_constant_startup_runs_once() {
        let startup = parse_startup("parameter leak 0.3\n", "s").unwrap();
        let outcome = run_batch(&startup, 5, |candidate, _| {
            assert!(approx_eq!(f64, 0.3, pinned(candidate, "leak"), ulps = 2));
            Ok(2.0)
        })
        .unwrap();

        assert!(outcome.names.is_empty());
        assert_eq!(1, outcome.evaluated);
        assert_eq!(0, outcome.best_index);
        assert_eq!(2.0, outcome.best_error);
    }
}
