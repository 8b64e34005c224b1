// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Numeric time-series files, the format current injections and measured
//! reference traces ship in: a sample count on the first line, then one row
//! per sample with the time first and value columns after it.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use morphoc_engine::common::located;
use morphoc_engine::sim_err;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::lines::DataLines;

/// A uniformly sampled series: times plus one or more value columns.  In an
/// injection series, `columns[0]` is the injected current in nA.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct DataSeries {
    pub times: Vec<f64>,
    pub columns: Vec<Vec<f64>>,
}

impl DataSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sampling interval implied by the time span; NaN for fewer than two
    /// samples.
    pub fn dt(&self) -> f64 {
        if self.times.len() < 2 {
            return f64::NAN;
        }
        (self.t_final() - self.t_start()) / (self.times.len() - 1) as f64
    }

    pub fn t_start(&self) -> f64 {
        self.times.first().copied().unwrap_or(f64::NAN)
    }

    pub fn t_final(&self) -> f64 {
        self.times.last().copied().unwrap_or(f64::NAN)
    }

    pub fn column(&self, num: usize) -> Option<&[f64]> {
        self.columns.get(num).map(|column| column.as_slice())
    }
}

pub fn read_series(reader: &mut dyn BufRead, origin: &str) -> Result<DataSeries> {
    let mut lines = DataLines::new(reader);

    let (line_num, count_line) = match lines.next_data()? {
        Some(found) => found,
        None => return sim_err!(BadInjectionSeries, format!("{origin}: empty series file")),
    };
    let declared: usize = match count_line.parse() {
        Ok(count) => count,
        Err(_) => {
            return sim_err!(
                BadInjectionSeries,
                located(
                    origin,
                    line_num,
                    &format!("expected a sample count, got '{count_line}'"),
                )
            );
        }
    };
    if declared < 2 {
        return sim_err!(
            BadInjectionSeries,
            located(
                origin,
                line_num,
                &format!("a series needs at least 2 samples, got {declared}"),
            )
        );
    }

    let mut series = DataSeries::default();
    for row in 0..declared {
        let (line_num, line) = match lines.next_data()? {
            Some(found) => found,
            None => {
                return sim_err!(
                    BadInjectionSeries,
                    format!("{origin}: expected {declared} rows, file ended after {row}")
                );
            }
        };
        let mut values = Vec::new();
        for token in line.split_whitespace() {
            let value: f64 = match token.parse() {
                Ok(value) => value,
                Err(_) => {
                    return sim_err!(
                        BadInjectionSeries,
                        located(
                            origin,
                            line_num,
                            &format!("expected numeric columns, got '{token}'"),
                        )
                    );
                }
            };
            values.push(value);
        }
        if row == 0 {
            if values.len() < 2 {
                return sim_err!(
                    BadInjectionSeries,
                    located(
                        origin,
                        line_num,
                        "a series row needs a time and at least one value column",
                    )
                );
            }
            series.columns = vec![Vec::with_capacity(declared); values.len() - 1];
        } else if values.len() < series.columns.len() + 1 {
            return sim_err!(
                BadInjectionSeries,
                located(
                    origin,
                    line_num,
                    &format!(
                        "row has {} columns, expected {}",
                        values.len(),
                        series.columns.len() + 1,
                    ),
                )
            );
        }
        series.times.push(values[0]);
        // columns beyond the first row's width are dropped
        for (column, value) in series.columns.iter_mut().zip(&values[1..]) {
            column.push(*value);
        }
    }
    Ok(series)
}

/// Writes an injection series in the three-column row layout the driver
/// scans: time, current, and a placeholder third column.
pub fn write_injection(writer: &mut dyn Write, times: &[f64], currents: &[f64]) -> Result<()> {
    if times.len() != currents.len() {
        return sim_err!(
            BadInjectionSeries,
            format!(
                "time and current lengths differ ({} vs {})",
                times.len(),
                currents.len(),
            )
        );
    }
    writeln!(writer, "{}", times.len())?;
    for (t, i) in times.iter().zip(currents) {
        writeln!(writer, "{t:10.2} {i:8.4} {:3.1}", 0.0)?;
    }
    Ok(())
}

pub fn open_series(path: &Path) -> Result<DataSeries> {
    if !path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("series file {} does not exist", path.display())
        );
    }
    let file = std::fs::File::open(path)?;
    read_series(&mut BufReader::new(file), &path.display().to_string())
}

pub fn write_injection_file(path: &Path, times: &[f64], currents: &[f64]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_injection(&mut writer, times, currents)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use morphoc_engine::ErrorCode;

    // ==================== reading ====================

    #[test]
    fn reads_rows_and_derives_dt() {
        let source = "\
3
      0.00   0.0000 0.0
    250.00   0.5000 0.0
    500.00   0.0000 0.0
";
        let series = read_series(&mut source.as_bytes(), "Cell.txt").unwrap();
        assert_eq!(3, series.len());
        assert_eq!(vec![0.0, 250.0, 500.0], series.times);
        assert_eq!(vec![0.0, 0.5, 0.0], series.columns[0]);
        assert_eq!(vec![0.0, 0.0, 0.0], series.columns[1]);
        assert!(approx_eq!(f64, 250.0, series.dt(), ulps = 2));
        assert_eq!(0.0, series.t_start());
        assert_eq!(500.0, series.t_final());
    }

    #[test]
    fn extra_columns_beyond_the_first_row_are_dropped() {
        let source = "2\n0.0 1.0\n1.0 2.0 99.0\n";
        let series = read_series(&mut source.as_bytes(), "d.txt").unwrap();
        assert_eq!(1, series.columns.len());
        assert_eq!(vec![1.0, 2.0], series.columns[0]);
    }

    #[test]
    fn too_few_samples_is_fatal() {
        let err = read_series(&mut "1\n0.0 1.0\n".as_bytes(), "d.txt").unwrap_err();
        assert_eq!(ErrorCode::BadInjectionSeries, err.code);
        assert!(err.get_details().unwrap().contains("at least 2"));
    }

    #[test]
    fn truncated_file_is_fatal() {
        let err = read_series(&mut "3\n0.0 1.0\n1.0 1.0\n".as_bytes(), "d.txt").unwrap_err();
        assert_eq!(ErrorCode::BadInjectionSeries, err.code);
        assert!(err.get_details().unwrap().contains("file ended after 2"));
    }

    #[test]
    fn narrow_row_is_fatal() {
        let err = read_series(&mut "2\n0.0 1.0 5.0\n1.0 1.0\n".as_bytes(), "d.txt").unwrap_err();
        assert_eq!(ErrorCode::BadInjectionSeries, err.code);
        assert!(err.get_details().unwrap().starts_with("d.txt:3:"));
    }

    #[test]
    fn non_numeric_column_is_fatal() {
        let err = read_series(&mut "2\n0.0 one\n1.0 2.0\n".as_bytes(), "d.txt").unwrap_err();
        assert_eq!(ErrorCode::BadInjectionSeries, err.code);
    }

    // ==================== writing ====================

    #[test]
    fn writes_fixed_width_rows() {
        let mut out = Vec::new();
        write_injection(&mut out, &[0.0, 250.0, 500.0], &[0.0, 0.5, 0.0]).unwrap();
        assert_eq!(
            "3\n      0.00   0.0000 0.0\n    250.00   0.5000 0.0\n    500.00   0.0000 0.0\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn written_series_reads_back() {
        let times = vec![0.0, 0.25, 0.5, 0.75];
        let currents = vec![0.0, 0.1, 0.1, 0.0];
        let mut out = Vec::new();
        write_injection(&mut out, &times, &currents).unwrap();

        let series = read_series(&mut out.as_slice(), "d.txt").unwrap();
        assert_eq!(times, series.times);
        assert_eq!(currents, series.columns[0]);
        assert!(approx_eq!(f64, 0.25, series.dt(), ulps = 2));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut out = Vec::new();
        let err = write_injection(&mut out, &[0.0, 1.0], &[0.0]).unwrap_err();
        assert_eq!(ErrorCode::BadInjectionSeries, err.code);
    }
}
