// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Self-describing recorded-trace files: a declared trace count, one header
//! line per trace, then every trace's samples behind a `#<name>` banner.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use morphoc_engine::common::located;
use morphoc_engine::{fmt_g, sim_err};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::lines::DataLines;

/// One recorded waveform, sampled at a fixed interval.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub units: String,
    /// Sampling interval in ms.
    pub dt: f64,
    pub samples: Vec<f64>,
}

impl Trace {
    pub fn new(name: &str, units: &str, dt: f64, samples: Vec<f64>) -> Self {
        Trace {
            name: name.to_string(),
            units: units.to_string(),
            dt,
            samples,
        }
    }
}

pub fn read_traces(reader: &mut dyn BufRead, origin: &str) -> Result<Vec<Trace>> {
    let mut lines = DataLines::new(reader);

    let (line_num, count_line) = match lines.next_data()? {
        Some(found) => found,
        None => return sim_err!(BadTraceHeader, format!("{origin}: empty trace file")),
    };
    let num_traces: usize = match count_line.parse() {
        Ok(count) => count,
        Err(_) => {
            return sim_err!(
                BadTraceHeader,
                located(
                    origin,
                    line_num,
                    &format!("expected a trace count, got '{count_line}'"),
                )
            );
        }
    };

    let mut traces = Vec::with_capacity(num_traces);
    let mut expected = Vec::with_capacity(num_traces);
    for _ in 0..num_traces {
        let (line_num, header) = match lines.next_data()? {
            Some(found) => found,
            None => {
                return sim_err!(
                    BadTraceHeader,
                    format!("{origin}: expected {num_traces} trace headers")
                );
            }
        };
        let tokens: Vec<&str> = header.split_whitespace().collect();
        if tokens.len() < 4 {
            return sim_err!(
                BadTraceHeader,
                located(
                    origin,
                    line_num,
                    &format!("trace header needs name, units, sample count, and dT: '{header}'"),
                )
            );
        }
        // names may contain spaces, so the fixed fields come off the end
        let dt: f64 = parse_field(tokens[tokens.len() - 1], "dT", origin, line_num)?;
        let num_samples = parse_field::<usize>(
            tokens[tokens.len() - 2],
            "sample count",
            origin,
            line_num,
        )?;
        let units = tokens[tokens.len() - 3].to_string();
        let name = tokens[..tokens.len() - 3].join(" ");
        traces.push(Trace {
            name,
            units,
            dt,
            samples: Vec::with_capacity(num_samples),
        });
        expected.push(num_samples);
    }

    for (trace, num_samples) in traces.iter_mut().zip(expected) {
        for _ in 0..num_samples {
            let (line_num, line) = match lines.next_data()? {
                Some(found) => found,
                None => {
                    return sim_err!(
                        BadTraceData,
                        format!(
                            "{origin}: trace '{}' declares {num_samples} samples, \
                             file ended after {}",
                            trace.name,
                            trace.samples.len(),
                        )
                    );
                }
            };
            let sample: f64 = match line.parse() {
                Ok(sample) => sample,
                Err(_) => {
                    return sim_err!(
                        BadTraceData,
                        located(
                            origin,
                            line_num,
                            &format!("expected a sample for trace '{}', got '{line}'", trace.name),
                        )
                    );
                }
            };
            trace.samples.push(sample);
        }
    }
    Ok(traces)
}

fn parse_field<T: std::str::FromStr>(
    token: &str,
    what: &str,
    origin: &str,
    line_num: usize,
) -> Result<T> {
    match token.parse() {
        Ok(value) => Ok(value),
        Err(_) => sim_err!(
            BadTraceHeader,
            located(origin, line_num, &format!("expected a {what}, got '{token}'"))
        ),
    }
}

/// Writes traces in the self-describing layout: all headers first, then each
/// trace's banner and samples at full precision.
pub fn write_traces(writer: &mut dyn Write, traces: &[Trace]) -> Result<()> {
    writeln!(writer, "# number of simulated traces")?;
    writeln!(writer, "{}", traces.len())?;
    writeln!(writer, "# name units numT deltaT")?;
    for trace in traces {
        writeln!(
            writer,
            "{} {} {} {}",
            trace.name,
            trace.units,
            trace.samples.len(),
            fmt_g(trace.dt),
        )?;
    }
    for trace in traces {
        writeln!(writer, "#{}", trace.name)?;
        for sample in &trace.samples {
            writeln!(writer, "{sample:.19}")?;
        }
    }
    Ok(())
}

pub fn open_traces(path: &Path) -> Result<Vec<Trace>> {
    if !path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("trace file {} does not exist", path.display())
        );
    }
    let file = std::fs::File::open(path)?;
    read_traces(&mut BufReader::new(file), &path.display().to_string())
}

pub fn write_trace_file(path: &Path, traces: &[Trace]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_traces(&mut writer, traces)?;
    writer.flush()?;
    Ok(())
}
