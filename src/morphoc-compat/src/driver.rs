// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Renders the per-run driver script and launches the external simulation
//! engine on it.  The driver loads a compiled model template, replays the
//! injection series into it, records the requested waveforms, and writes
//! them out as a trace file for the parent process to collect.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use morphoc_engine::{ResolvedModel, StartupInfo, TraceDirective, fmt_g, model_err, sim_err};

use crate::Result;
use crate::injection;
use crate::trace::{self, Trace};

/// Conventional on-disk names for one model's run: the compiled model, the
/// driver script that simulates it, and the trace file the driver writes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RunFiles {
    pub model_file: PathBuf,
    pub driver_file: PathBuf,
    pub output_file: PathBuf,
}

pub fn run_files(dir: &Path, model_name: &str) -> RunFiles {
    RunFiles {
        model_file: dir.join(format!("{model_name}.hoc")),
        driver_file: dir.join(format!("Simulate{model_name}.hoc")),
        output_file: dir.join(format!("Sim{model_name}.txt")),
    }
}

/// Integration controls for a driver script.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DriverOptions {
    /// CVode absolute and relative tolerance.
    pub tol: f64,
    /// Max integration step in ms; the injection sampling interval when
    /// unset.
    pub integral_step: Option<f64>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            tol: 1.0e-6,
            integral_step: None,
        }
    }
}

/// One replayed current injection: the series file the driver scans and the
/// section the current source attaches to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClampPlan {
    pub file: String,
    pub section: String,
    /// Columns per row in the series file.
    pub num_columns: usize,
    /// Column holding the injected current (time is column 0).
    pub value_column: usize,
}

/// One recorded waveform: the hoc expression sampled and the header fields
/// written for it.
#[derive(Clone, PartialEq, Debug)]
pub struct RecordPlan {
    pub trace_name: String,
    pub target: String,
    pub units: String,
    pub dt: f64,
}

/// Everything the driver template needs, resolved against a compiled model.
#[derive(Clone, PartialEq, Debug)]
pub struct DriverPlan {
    pub model_name: String,
    pub model_file: String,
    pub output_file: String,
    pub tol: f64,
    pub integral_step: f64,
    pub t_start: f64,
    pub t_final: f64,
    pub num_t: usize,
    pub clamps: Vec<ClampPlan>,
    pub records: Vec<RecordPlan>,
}

/// Resolves the startup's trace directives against a compiled model: which
/// sections injections attach to, which hoc expressions get recorded, and
/// the time base the run covers.  Clamp and fit series files are read here,
/// so a missing or malformed data file fails before anything is launched.
pub fn plan_driver(
    model: &ResolvedModel,
    startup: &StartupInfo,
    files: &RunFiles,
    data_dir: &Path,
    options: &DriverOptions,
) -> Result<DriverPlan> {
    let first_section = match model.geometry.segments.first() {
        Some(segment) => segment.name.as_str(),
        None => return model_err!(EmptyModel, "the model contains no sections".to_string()),
    };

    let mut clamps = Vec::new();
    let mut records = Vec::new();
    let mut time_base: Option<injection::DataSeries> = None;
    for directive in &startup.traces {
        match directive {
            TraceDirective::Record { target, dt, .. } => {
                records.push(record_plan(target, model, first_section, *dt));
            }
            TraceDirective::Clamp {
                target,
                file,
                trace_num,
            } => {
                let series = injection::open_series(&in_dir(data_dir, file))?;
                if series.column(*trace_num).is_none() {
                    return sim_err!(
                        BadInjectionSeries,
                        format!("{file} has no trace {trace_num}")
                    );
                }
                clamps.push(ClampPlan {
                    file: in_dir(data_dir, file).display().to_string(),
                    section: section_of(target, model, first_section).to_string(),
                    num_columns: series.columns.len() + 1,
                    value_column: trace_num + 1,
                });
                if time_base.is_none() {
                    time_base = Some(series);
                }
            }
            TraceDirective::Fit {
                target,
                file,
                trace_num,
                ..
            } => {
                let series = injection::open_series(&in_dir(data_dir, file))?;
                if series.column(*trace_num).is_none() {
                    return sim_err!(
                        BadInjectionSeries,
                        format!("{file} has no trace {trace_num}")
                    );
                }
                records.push(record_plan(target, model, first_section, series.dt()));
                if time_base.is_none() {
                    time_base = Some(series);
                }
            }
        }
    }

    if records.is_empty() {
        return sim_err!(
            NoOutputTrace,
            "the startup declares no record or fit directives".to_string()
        );
    }
    if clamps.is_empty() && records.iter().any(|record| record.target.contains("iInjector")) {
        return sim_err!(
            Generic,
            "recording the injected current needs a clamp directive".to_string()
        );
    }

    let (t_start, t_final, num_t, series_dt) = match &time_base {
        Some(series) => (series.t_start(), series.t_final(), series.len(), series.dt()),
        None => {
            if !startup.stop_time.is_finite() {
                return sim_err!(
                    Generic,
                    "no time base: the startup declares neither a clamp/fit series \
                     nor a finite stop time"
                        .to_string()
                );
            }
            (0.0, startup.stop_time, 0, f64::NAN)
        }
    };
    let fallback_dt = records
        .iter()
        .map(|record| record.dt)
        .find(|dt| dt.is_finite() && *dt > 0.0);
    let integral_step = match options.integral_step {
        Some(step) => step,
        None if series_dt.is_finite() => series_dt,
        None => match fallback_dt {
            Some(dt) => dt,
            None => {
                return sim_err!(
                    Generic,
                    "no sampling interval: set an integral step or declare a \
                     clamp series"
                        .to_string()
                );
            }
        },
    };
    let num_t = if num_t > 0 {
        num_t
    } else {
        ((t_final - t_start) / integral_step).round() as usize + 1
    };

    Ok(DriverPlan {
        model_name: model.name.clone(),
        model_file: files.model_file.display().to_string(),
        output_file: files.output_file.display().to_string(),
        tol: options.tol,
        integral_step,
        t_start,
        t_final,
        num_t,
        clamps,
        records,
    })
}

/// Section a directive targets: the last `_` word when it names a model
/// section, otherwise the first section.
fn section_of<'a>(target: &'a str, model: &'a ResolvedModel, first_section: &'a str) -> &'a str {
    match target.rsplit_once('_') {
        Some((_, suffix)) if is_section(model, suffix) => suffix,
        _ => first_section,
    }
}

fn is_section(model: &ResolvedModel, name: &str) -> bool {
    model.geometry.segments.iter().any(|seg| seg.name == name)
}

fn record_plan(target: &str, model: &ResolvedModel, first_section: &str, dt: f64) -> RecordPlan {
    let (quantity, section) = match target.rsplit_once('_') {
        Some((stem, suffix)) if is_section(model, suffix) => (stem, suffix),
        _ => (target, first_section),
    };
    let (expr, units) = match quantity {
        "i" => {
            // the injected current lives on the injector, not a section
            return RecordPlan {
                trace_name: target.to_string(),
                target: "iInjector0.i".to_string(),
                units: "nA".to_string(),
                dt,
            };
        }
        "v" => ("v(0.5)".to_string(), "mV"),
        q if q.ends_with("Int") => (format!("{}i(0.5)", &q[..q.len() - 3]), "mM"),
        q if q.ends_with("Ext") => (format!("{}o(0.5)", &q[..q.len() - 3]), "mM"),
        q => (format!("{q}(0.5)"), "1"),
    };
    RecordPlan {
        trace_name: target.to_string(),
        target: format!("modelCell.{section}.{expr}"),
        units: units.to_string(),
        dt,
    }
}

fn in_dir(dir: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        dir.join(file)
    }
}

/// Renders the driver script for a plan.
pub fn write_driver(plan: &DriverPlan) -> String {
    let mut out = String::new();
    out.push_str("secondorder = 2\n");

    out.push_str("\nobjref cvode\n");
    out.push_str("cvode = new CVode()\n");
    out.push_str("cvode.active(1)\n");
    out.push_str(&format!("cvode.atol({})\n", fmt_g(plan.tol)));
    out.push_str(&format!("cvode.rtol({})\n", fmt_g(plan.tol)));
    out.push_str(&format!("cvode.maxstep({})\n", fmt_g(plan.integral_step)));
    out.push_str(&format!("dt = {}\n", fmt_g(plan.integral_step)));
    out.push_str(&format!("tStart = {}\n", fmt_g(plan.t_start)));
    out.push_str(&format!("tFinal = {}\n", fmt_g(plan.t_final)));
    out.push_str(&format!("numT = {}\n", plan.num_t));

    out.push_str("\nstrdef modelFile, outFile\n");
    out.push_str(&format!("modelFile = \"{}\"\n", plan.model_file));
    out.push_str(&format!("outFile = \"{}\"\n", plan.output_file));

    out.push_str("\n// Load model hoc file:\n");
    out.push_str("load_file(modelFile)\n");
    out.push_str("objectvar modelCell\n");
    out.push_str(&format!("modelCell = new {}()\n", plan.model_name));

    for (num, clamp) in plan.clamps.iter().enumerate() {
        out.push_str("\n// Get time/current trace of perturbing current injection:\n");
        out.push_str(&format!("strdef dataFile{num}\n"));
        out.push_str(&format!("dataFile{num} = \"{}\"\n", clamp.file));
        out.push_str(&format!("objref fileIn{num}, tVec{num}, iVec{num}\n"));
        out.push_str(&format!("fileIn{num} = new File()\n"));
        out.push_str(&format!("fileIn{num}.ropen(dataFile{num})\n"));
        out.push_str(&format!("numT = fileIn{num}.scanvar()\n"));
        out.push_str(&format!("tVec{num} = new Vector(numT)\n"));
        out.push_str(&format!("iVec{num} = new Vector(numT)\n"));
        out.push_str("for(i = 0; i < numT; i = i + 1){\n");
        for column in 0..clamp.num_columns {
            if column == 0 {
                out.push_str(&format!("  tVec{num}.x[i] = fileIn{num}.scanvar()\n"));
            } else if column == clamp.value_column {
                out.push_str(&format!("  iVec{num}.x[i] = fileIn{num}.scanvar()\n"));
            } else {
                out.push_str("  // read and throw away the unused column\n");
                out.push_str(&format!("  dummyV = fileIn{num}.scanvar()\n"));
            }
        }
        out.push_str("}\n");
        out.push_str(&format!("fileIn{num}.close()\n"));
        out.push_str(&format!("tStart = tVec{num}.x[0]\n"));
        out.push_str(&format!("tVec{num}.sub(tStart)\n"));

        out.push_str("\n// Attach the stimulus current injector object:\n");
        out.push_str(&format!("objref iInjector{num}\n"));
        out.push_str(&format!(
            "modelCell.{} iInjector{num} = new IClamp(0.5)\n",
            clamp.section
        ));
        out.push_str(&format!("iInjector{num}.del = 0\n"));
        out.push_str(&format!("iInjector{num}.dur = 1.0e9\n"));
        out.push_str("// ...and inject the appropriate current trace:\n");
        out.push_str(&format!(
            "iVec{num}.play(&iInjector{num}.amp, tVec{num}, 1)\n"
        ));
    }

    out.push_str("\n// Make some recording objects and record some waveforms:\n");
    out.push_str("objref tRecord\n");
    out.push_str("tRecord = new Vector()\n");
    out.push_str(&format!("tRecord.record(&t, {})\n", fmt_g(plan.integral_step)));
    for (num, record) in plan.records.iter().enumerate() {
        out.push_str(&format!("objref recordVec{num}\n"));
        out.push_str(&format!("recordVec{num} = new Vector()\n"));
        out.push_str(&format!(
            "recordVec{num}.record(&{}, {})\n",
            record.target,
            fmt_g(record.dt),
        ));
    }

    out.push_str("\n// Do the simulation:\n");
    out.push_str("tStop = tFinal - tStart + 0.5 * dt\n");
    out.push_str("modelCell.setState()\n");
    out.push_str("modelCell.setState()\n");
    out.push_str("t = 0\n");
    out.push_str("while(t < tStop) {\n");
    out.push_str("  fadvance()\n");
    out.push_str("}\n");

    out.push_str("\n// Output the results:\n");
    out.push_str("wopen(outFile)\n");
    out.push_str("fprint(\"# number of simulated traces\\n\")\n");
    out.push_str(&format!("fprint(\"{}\\n\")\n", plan.records.len()));
    out.push_str("fprint(\"# name units numT deltaT\\n\")\n");
    for (num, record) in plan.records.iter().enumerate() {
        out.push_str(&format!(
            "fprint(\"{} {} %d {}\\n\", recordVec{num}.size())\n",
            record.trace_name,
            record.units,
            fmt_g(record.dt),
        ));
    }
    for (num, record) in plan.records.iter().enumerate() {
        out.push_str(&format!("fprint(\"#{}\\n\")\n", record.trace_name));
        out.push_str(&format!(
            "for(i = 0; i < recordVec{num}.size(); i = i + 1){{\n"
        ));
        out.push_str(&format!("  fprint(\"%.19f\\n\", recordVec{num}.x[i])\n"));
        out.push_str("}\n");
    }
    out.push_str("wopen()\n");

    out
}

pub fn write_driver_file(path: &Path, plan: &DriverPlan) -> Result<()> {
    std::fs::write(path, write_driver(plan))?;
    Ok(())
}

/// Runs `program` on the driver script in its own OS process and collects
/// the traces it wrote.  The run owns a channel pair; the child's outcome is
/// the only message sent on it.  Paths inside the script must resolve from
/// `work_dir`.
pub fn run_engine(program: &str, work_dir: &Path, files: &RunFiles) -> Result<Vec<Trace>> {
    let (sender, receiver) = mpsc::channel::<Result<Vec<Trace>>>();
    let program = program.to_string();
    let work_dir = work_dir.to_path_buf();
    let files = files.clone();

    let worker = thread::spawn(move || {
        let outcome = launch(&program, &work_dir, &files);
        // a send failure means the parent already gave up on the run
        let _ = sender.send(outcome);
    });

    let outcome = match receiver.recv() {
        Ok(outcome) => outcome,
        Err(_) => sim_err!(
            EngineFailed,
            "engine worker exited without reporting".to_string()
        ),
    };
    let _ = worker.join();
    outcome
}

fn launch(program: &str, work_dir: &Path, files: &RunFiles) -> Result<Vec<Trace>> {
    let output = match Command::new(program)
        .arg(&files.driver_file)
        .current_dir(work_dir)
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            return sim_err!(EngineFailed, format!("failed to launch '{program}': {err}"));
        }
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return sim_err!(
            EngineFailed,
            format!(
                "'{program}' exited with {}: {}",
                output.status,
                stderr.trim(),
            )
        );
    }

    if !files.output_file.is_file() {
        return sim_err!(
            NoOutputTrace,
            format!("the engine wrote no trace file {}", files.output_file.display())
        );
    }
    let traces = trace::open_traces(&files.output_file)?;
    if traces.iter().all(|trace| trace.samples.is_empty()) {
        return sim_err!(
            NoOutputTrace,
            format!("engine trace file {} is empty", files.output_file.display())
        );
    }
    Ok(traces)
}

/// Sum over fit directives of the root-mean-square difference between the
/// recorded trace and its reference column, compared over their common
/// prefix.  NaN when the startup declares no fit directives.
pub fn fit_error(startup: &StartupInfo, traces: &[Trace], data_dir: &Path) -> Result<f64> {
    let mut total = 0.0;
    let mut num_fits = 0;
    for directive in &startup.traces {
        let (target, file, trace_num) = match directive {
            TraceDirective::Fit {
                target,
                file,
                trace_num,
                ..
            } => (target, file, *trace_num),
            _ => continue,
        };
        num_fits += 1;

        let recorded = match traces.iter().find(|trace| trace.name == *target) {
            Some(trace) => trace,
            None => {
                return sim_err!(
                    NoOutputTrace,
                    format!("no recorded trace named '{target}' in the engine output")
                );
            }
        };
        let series = injection::open_series(&in_dir(data_dir, file))?;
        let reference = match series.column(trace_num) {
            Some(column) => column,
            None => {
                return sim_err!(
                    BadInjectionSeries,
                    format!("{file} has no trace {trace_num}")
                );
            }
        };
        total += rms(&recorded.samples, reference);
    }
    if num_fits == 0 {
        return Ok(f64::NAN);
    }
    Ok(total)
}

fn rms(recorded: &[f64], reference: &[f64]) -> f64 {
    let len = recorded.len().min(reference.len());
    if len == 0 {
        return f64::INFINITY;
    }
    let sum: f64 = recorded
        .iter()
        .zip(reference)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    (sum / len as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use morphoc_engine::{ErrorCode, Project, parse_geometry, parse_startup};

    const GEOMETRY: &str = "\
<Soma>
0 1 1 20.0 5.0
</Soma>
1 2 1 100.0 1.0
";

    fn fixture(dir: &Path, startup_src: &str) -> (Project, RunFiles) {
        injection::write_injection_file(
            &dir.join("Cell.txt"),
            &[0.0, 250.0, 500.0],
            &[0.0, 0.5, 0.0],
        )
        .unwrap();
        let startup = parse_startup(startup_src, "startup.txt").unwrap();
        let geometry = parse_geometry(GEOMETRY, "cell.txt").unwrap();
        (Project { startup, geometry }, run_files(dir, "Cell"))
    }

    // ==================== planning ====================

    #[test]
    fn plans_sections_time_base_and_units() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             record i 0.5 SimCell.txt\n\
             record v_Soma 0.5 SimCell.txt\n\
             clamp i Cell.txt 0 1.0\n",
        );
        let model = project.compile("Cell").unwrap();
        let plan = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap();

        assert_eq!("Cell", plan.model_name);
        assert_eq!(1, plan.clamps.len());
        assert_eq!("Soma", plan.clamps[0].section);
        assert_eq!(3, plan.clamps[0].num_columns);
        assert_eq!(1, plan.clamps[0].value_column);

        assert_eq!(2, plan.records.len());
        assert_eq!("i", plan.records[0].trace_name);
        assert_eq!("iInjector0.i", plan.records[0].target);
        assert_eq!("nA", plan.records[0].units);
        assert_eq!("modelCell.Soma.v(0.5)", plan.records[1].target);
        assert_eq!("mV", plan.records[1].units);

        assert_eq!(0.0, plan.t_start);
        assert_eq!(500.0, plan.t_final);
        assert_eq!(3, plan.num_t);
        assert!(approx_eq!(f64, 250.0, plan.integral_step, ulps = 2));
    }

    #[test]
    fn fit_directives_record_at_the_reference_interval() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             fit v_Soma Cell.txt 1 50.0\n\
             clamp i Cell.txt 0 1.0\n",
        );
        let model = project.compile("Cell").unwrap();
        let plan = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap();

        assert_eq!(1, plan.records.len());
        assert_eq!("v_Soma", plan.records[0].trace_name);
        assert!(approx_eq!(f64, 250.0, plan.records[0].dt, ulps = 2));
    }

    #[test]
    fn concentration_targets_map_to_range_variables() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             record caInt_Soma 0.5 SimCell.txt\n\
             clamp i Cell.txt 0 1.0\n",
        );
        let model = project.compile("Cell").unwrap();
        let plan = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap();

        assert_eq!("modelCell.Soma.cai(0.5)", plan.records[0].target);
        assert_eq!("mM", plan.records[0].units);
    }

    #[test]
    fn no_recordings_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\nchannel pas *\nparameter v -65.0\nclamp i Cell.txt 0 1.0\n",
        );
        let model = project.compile("Cell").unwrap();
        let err = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap_err();
        assert_eq!(ErrorCode::NoOutputTrace, err.code);
    }

    #[test]
    fn injected_current_needs_a_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             time 500.0\n\
             record i 0.5 SimCell.txt\n",
        );
        let model = project.compile("Cell").unwrap();
        let err = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap_err();
        assert_eq!(ErrorCode::Generic, err.code);
    }

    #[test]
    fn stop_time_stands_in_for_a_missing_series() {
        let dir = tempfile::tempdir().unwrap();
        let (project, files) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             time 500.0\n\
             record v_Soma 0.5 SimCell.txt\n",
        );
        let model = project.compile("Cell").unwrap();
        let plan = plan_driver(
            &model,
            &project.startup,
            &files,
            dir.path(),
            &DriverOptions::default(),
        )
        .unwrap();

        assert_eq!(0.0, plan.t_start);
        assert_eq!(500.0, plan.t_final);
        assert_eq!(0.5, plan.integral_step);
        assert_eq!(1001, plan.num_t);
        assert!(plan.clamps.is_empty());
    }

    // ==================== rendering ====================

    #[test]
    fn renders_the_full_driver_script() {
        let plan = DriverPlan {
            model_name: "Cell".to_string(),
            model_file: "Cell.hoc".to_string(),
            output_file: "SimCell.txt".to_string(),
            tol: 1.0e-6,
            integral_step: 0.5,
            t_start: 0.0,
            t_final: 500.0,
            num_t: 1001,
            clamps: vec![ClampPlan {
                file: "Cell.txt".to_string(),
                section: "Soma".to_string(),
                num_columns: 3,
                value_column: 1,
            }],
            records: vec![RecordPlan {
                trace_name: "v_Soma".to_string(),
                target: "modelCell.Soma.v(0.5)".to_string(),
                units: "mV".to_string(),
                dt: 0.5,
            }],
        };

        let expected = r##"secondorder = 2

objref cvode
cvode = new CVode()
cvode.active(1)
cvode.atol(1e-06)
cvode.rtol(1e-06)
cvode.maxstep(0.5)
dt = 0.5
tStart = 0
tFinal = 500
numT = 1001

strdef modelFile, outFile
modelFile = "Cell.hoc"
outFile = "SimCell.txt"

// Load model hoc file:
load_file(modelFile)
objectvar modelCell
modelCell = new Cell()

// Get time/current trace of perturbing current injection:
strdef dataFile0
dataFile0 = "Cell.txt"
objref fileIn0, tVec0, iVec0
fileIn0 = new File()
fileIn0.ropen(dataFile0)
numT = fileIn0.scanvar()
tVec0 = new Vector(numT)
iVec0 = new Vector(numT)
for(i = 0; i < numT; i = i + 1){
  tVec0.x[i] = fileIn0.scanvar()
  iVec0.x[i] = fileIn0.scanvar()
  // read and throw away the unused column
  dummyV = fileIn0.scanvar()
}
fileIn0.close()
tStart = tVec0.x[0]
tVec0.sub(tStart)

// Attach the stimulus current injector object:
objref iInjector0
modelCell.Soma iInjector0 = new IClamp(0.5)
iInjector0.del = 0
iInjector0.dur = 1.0e9
// ...and inject the appropriate current trace:
iVec0.play(&iInjector0.amp, tVec0, 1)

// Make some recording objects and record some waveforms:
objref tRecord
tRecord = new Vector()
tRecord.record(&t, 0.5)
objref recordVec0
recordVec0 = new Vector()
recordVec0.record(&modelCell.Soma.v(0.5), 0.5)

// Do the simulation:
tStop = tFinal - tStart + 0.5 * dt
modelCell.setState()
modelCell.setState()
t = 0
while(t < tStop) {
  fadvance()
}

// Output the results:
wopen(outFile)
fprint("# number of simulated traces\n")
fprint("1\n")
fprint("# name units numT deltaT\n")
fprint("v_Soma mV %d 0.5\n", recordVec0.size())
fprint("#v_Soma\n")
for(i = 0; i < recordVec0.size(); i = i + 1){
  fprint("%.19f\n", recordVec0.x[i])
}
wopen()
"##;
        assert_eq!(expected, write_driver(&plan));
    }

    // ==================== running ====================

    #[test]
    fn launch_failure_is_an_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = run_files(dir.path(), "Cell");
        let err = run_engine("/no/such/engine", dir.path(), &files).unwrap_err();
        assert_eq!(ErrorCode::EngineFailed, err.code);
    }

    #[test]
    fn missing_output_is_no_output_trace() {
        let dir = tempfile::tempdir().unwrap();
        let files = run_files(dir.path(), "Cell");
        // `true` exits cleanly without writing the trace file
        let err = run_engine("true", dir.path(), &files).unwrap_err();
        assert_eq!(ErrorCode::NoOutputTrace, err.code);
    }

    // ==================== fit error ====================

    #[test]
    fn sums_rms_over_fit_directives() {
        let dir = tempfile::tempdir().unwrap();
        let (project, _) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             fit v_Soma Cell.txt 1 50.0\n\
             clamp i Cell.txt 0 1.0\n",
        );

        // the reference (column 1 of Cell.txt) is all zeros
        let traces = vec![Trace::new("v_Soma", "mV", 250.0, vec![0.0, 1.0, 2.0])];
        let err = fit_error(&project.startup, &traces, dir.path()).unwrap();
        assert!(approx_eq!(f64, (5.0f64 / 3.0).sqrt(), err, ulps = 2));
    }

    #[test]
    fn missing_recorded_trace_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (project, _) = fixture(
            dir.path(),
            "geometry cell.txt\n\
             channel pas *\n\
             parameter v -65.0\n\
             fit v_Soma Cell.txt 1 50.0\n",
        );
        let traces = vec![Trace::new("v_Dendrite", "mV", 0.5, vec![0.0])];
        let err = fit_error(&project.startup, &traces, dir.path()).unwrap_err();
        assert_eq!(ErrorCode::NoOutputTrace, err.code);
    }

    #[test]
    fn no_fit_directives_yields_nan() {
        let startup = parse_startup("geometry cell.txt\n", "startup.txt").unwrap();
        let err = fit_error(&startup, &[], Path::new(".")).unwrap();
        assert!(err.is_nan());
    }
}
