// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Human-facing output of a finished run: the results file naming the best
//! parameter set and the elapsed-time strings printed alongside it.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use morphoc_engine::{fmt_g, sim_err};

use crate::{FIT_ERROR_NAME, Result};

/// Renders a duration in seconds the way the run logs report it, growing
/// units as needed: `12.3s`, `4m 2.25s`, `3h 12m 0.5s`, `2d 0h 4m 1s`.
pub fn format_elapsed(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{}s", fmt_g(seconds));
    }
    let whole = seconds.floor();
    let frac = seconds - whole;
    let mut rest = whole as u64;
    let secs = (rest % 60) as f64 + frac;
    rest /= 60;
    let minutes = rest % 60;
    rest /= 60;
    let hours = rest % 24;
    let days = rest / 24;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {}s", fmt_g(secs))
    } else if hours > 0 {
        format!("{hours}h {minutes}m {}s", fmt_g(secs))
    } else {
        format!("{minutes}m {}s", fmt_g(secs))
    }
}

/// Writes a results file: the fit error first under the reserved `value`
/// name, then one line per parameter.  The format doubles as a parameter
/// override file, so a results file can seed the next run directly.
pub fn write_results(
    writer: &mut dyn Write,
    names: &[String],
    values: &[f64],
    fit_error: f64,
) -> Result<()> {
    if names.len() != values.len() {
        return sim_err!(
            Generic,
            format!(
                "results hold {} names but {} values",
                names.len(),
                values.len(),
            )
        );
    }
    writeln!(writer, "{FIT_ERROR_NAME}                  {}", fmt_value(fit_error))?;
    for (name, value) in names.iter().zip(values) {
        writeln!(writer, "{name}                  {}", fmt_value(*value))?;
    }
    Ok(())
}

pub fn write_results_file(
    path: &Path,
    names: &[String],
    values: &[f64],
    fit_error: f64,
) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_results(&mut writer, names, values, fit_error)?;
    writer.flush()?;
    Ok(())
}

// f64's Display spells NaN uppercase; these files use lowercase
fn fmt_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_overrides;
    use std::io::Cursor;

    // ==================== elapsed time ====================

    #[test]
    fn grows_units_as_needed() {
        assert_eq!("12.3s", format_elapsed(12.3));
        assert_eq!("4m 2.25s", format_elapsed(242.25));
        assert_eq!("3h 12m 0.5s", format_elapsed(11520.5));
        assert_eq!("2d 0h 4m 1s", format_elapsed(173041.0));
    }

    #[test]
    fn boundaries_roll_over() {
        assert_eq!("59.9s", format_elapsed(59.9));
        assert_eq!("1m 0s", format_elapsed(60.0));
        assert_eq!("1h 0m 0s", format_elapsed(3600.0));
        assert_eq!("1d 0h 0m 0s", format_elapsed(86400.0));
    }

    // ==================== results files ====================

    #[test]
    fn writes_the_fit_error_then_each_parameter() {
        let mut out = Vec::new();
        write_results(
            &mut out,
            &["gBar_NaV".to_string(), "e_leak".to_string()],
            &[12.5, -65.0],
            0.125,
        )
        .unwrap();

        let expected = "\
value                  0.125
gBar_NaV                  12.5
e_leak                  -65
";
        assert_eq!(expected, String::from_utf8(out).unwrap());
    }

    #[test]
    fn unknown_fit_error_writes_nan() {
        let mut out = Vec::new();
        write_results(&mut out, &[], &[], f64::NAN).unwrap();
        assert_eq!("value                  nan\n", String::from_utf8(out).unwrap());
    }

    #[test]
    fn results_read_back_as_overrides() {
        let mut out = Vec::new();
        write_results(
            &mut out,
            &["gBar_NaV".to_string()],
            &[12.5],
            0.125,
        )
        .unwrap();

        let mut reader = Cursor::new(out);
        let overrides = read_overrides(&mut reader, "results.txt").unwrap();
        assert_eq!(vec!["gBar_NaV"], overrides.names);
        assert_eq!(vec![12.5], overrides.values);
        assert_eq!(Some(0.125), overrides.fit_error);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut out = Vec::new();
        let err = write_results(&mut out, &["a".to_string()], &[], 0.0).unwrap_err();
        assert_eq!(morphoc_engine::ErrorCode::Generic, err.code);
    }
}
