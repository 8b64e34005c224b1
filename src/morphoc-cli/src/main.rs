// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use morphoc_compat::driver::{self, DriverOptions};
use morphoc_compat::engine::{Project, Result, emit_model, fmt_g, sim_err};
use morphoc_compat::trace::Trace;
use morphoc_compat::{ParamOverrides, batch, open_overrides, open_project, report, resume};

const EXIT_FAILURE: i32 = 1;

#[macro_export]
macro_rules! die(
    ($($arg:tt)*) => { {
        use std;
        eprintln!($($arg)*);
        std::process::exit(EXIT_FAILURE)
    } }
);

#[derive(Parser)]
#[command(name = "morphoc", version)]
#[command(about = "Compile branching cable morphologies into compartmental cell models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a startup file into a cell model hoc template
    Compile {
        /// Startup directive file
        startup: PathBuf,
        /// Parameter file pinning rule values from a prior fit
        #[arg(long)]
        params: Option<PathBuf>,
        /// Write the model here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Name of the emitted cell template
        #[arg(long, default_value = "CellModel")]
        name: String,
        /// Dump the resolved model as JSON instead of hoc
        #[arg(long)]
        dump_json: bool,
    },
    /// Compile a model and run one simulation under the external engine
    Simulate {
        /// Startup directive file
        startup: PathBuf,
        /// Parameter file pinning rule values from a prior fit
        #[arg(long)]
        params: Option<PathBuf>,
        /// Simulation engine executable
        #[arg(long, default_value = "nrniv")]
        engine: String,
        /// Directory for the model, driver and trace files
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Name of the emitted cell template
        #[arg(long, default_value = "CellModel")]
        name: String,
        /// CVode absolute and relative tolerance
        #[arg(long, default_value_t = 1.0e-6)]
        tol: f64,
        /// Max integration step in ms; the injection sampling interval when unset
        #[arg(long)]
        integral_step: Option<f64>,
    },
    /// Sweep every combination of the fittable parameter rules
    Batch {
        /// Startup directive file
        startup: PathBuf,
        /// Sample points per fittable rule
        #[arg(long)]
        num_values: usize,
        /// Parameter file pinning rule values from a prior fit
        #[arg(long)]
        params: Option<PathBuf>,
        /// Simulation engine executable
        #[arg(long, default_value = "nrniv")]
        engine: String,
        /// Directory for per-run scratch files
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Worker threads; defaults to one per core
        #[arg(long)]
        jobs: Option<usize>,
        /// Name of the emitted cell template
        #[arg(long, default_value = "CellModel")]
        name: String,
    },
    /// Back up a fit resume file and mark its members for re-evaluation
    ResumeReset {
        /// Resume file written by the fitting optimizer
        resume_file: PathBuf,
        /// Truncate the population to this many members
        #[arg(long)]
        population: Option<usize>,
    },
}

fn load_overrides(params: Option<&Path>) -> Result<Option<ParamOverrides>> {
    match params {
        Some(path) => Ok(Some(open_overrides(path)?)),
        None => Ok(None),
    }
}

// The engine runs with its own working directory, so every path baked into
// the driver script must be absolute.
fn data_dir_of(startup: &Path) -> Result<PathBuf> {
    let dir = match startup.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(fs::canonicalize(dir)?)
}

fn prepare_dir(dir: Option<&Path>, data_dir: &Path) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Ok(fs::canonicalize(dir)?)
        }
        None => Ok(data_dir.to_path_buf()),
    }
}

fn compile(
    startup: &Path,
    params: Option<&Path>,
    output: Option<&Path>,
    name: &str,
    dump_json: bool,
) -> Result<()> {
    let overrides = load_overrides(params)?;
    let project = open_project(startup, overrides.as_ref())?;
    let text = if dump_json {
        let model = project.compile(name)?;
        match serde_json::to_string_pretty(&model) {
            Ok(mut text) => {
                text.push('\n');
                text
            }
            Err(err) => {
                return sim_err!(Generic, format!("cannot serialize {name}: {err}"));
            }
        }
    } else {
        project.compile_to_hoc(name)?
    };
    match output {
        Some(path) => fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn run_once(
    project: &Project,
    engine: &str,
    run_dir: &Path,
    data_dir: &Path,
    name: &str,
    options: &DriverOptions,
) -> Result<(Vec<Trace>, f64)> {
    let model = project.compile(name)?;
    let files = driver::run_files(run_dir, name);
    let plan = driver::plan_driver(&model, &project.startup, &files, data_dir, options)?;
    fs::write(&files.model_file, emit_model(&model)?)?;
    driver::write_driver_file(&files.driver_file, &plan)?;
    let traces = driver::run_engine(engine, run_dir, &files)?;
    let fit = driver::fit_error(&project.startup, &traces, data_dir)?;
    Ok((traces, fit))
}

fn simulate(
    startup: &Path,
    params: Option<&Path>,
    engine: &str,
    dir: Option<&Path>,
    name: &str,
    options: &DriverOptions,
) -> Result<()> {
    let overrides = load_overrides(params)?;
    let project = open_project(startup, overrides.as_ref())?;
    let data_dir = data_dir_of(startup)?;
    let run_dir = prepare_dir(dir, &data_dir)?;

    let started = Instant::now();
    let (traces, fit) = run_once(&project, engine, &run_dir, &data_dir, name, options)?;

    for trace in &traces {
        println!(
            "{}: {} samples of {} at dT {} ms",
            trace.name,
            trace.samples.len(),
            trace.units,
            fmt_g(trace.dt)
        );
    }
    if !fit.is_nan() {
        println!("fit error: {}", fmt_g(fit));
    }
    println!(
        "elapsed: {}",
        report::format_elapsed(started.elapsed().as_secs_f64())
    );
    Ok(())
}

fn run_sweep(
    startup: &Path,
    num_values: usize,
    params: Option<&Path>,
    engine: &str,
    dir: Option<&Path>,
    jobs: Option<usize>,
    name: &str,
) -> Result<()> {
    if let Some(jobs) = jobs {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
        {
            eprintln!("warning: keeping the default worker pool: {err}");
        }
    }

    let overrides = load_overrides(params)?;
    let project = open_project(startup, overrides.as_ref())?;
    let data_dir = data_dir_of(startup)?;
    let sweep_dir = prepare_dir(dir, &data_dir)?;
    let options = DriverOptions::default();

    let outcome = batch::run_batch(&project.startup, num_values, |candidate, index| {
        let run_dir = sweep_dir.join(format!("run{index}"));
        fs::create_dir_all(&run_dir)?;
        let candidate = Project {
            startup: candidate.clone(),
            geometry: project.geometry.clone(),
        };
        let (_, fit) = run_once(&candidate, engine, &run_dir, &data_dir, name, &options)?;
        Ok(fit)
    })?;

    for (rule, value) in outcome.names.iter().zip(&outcome.best_values) {
        println!("{rule} {}", fmt_g(*value));
    }
    println!(
        "best error {} from run {} of {} in {}",
        fmt_g(outcome.best_error),
        outcome.best_index,
        outcome.evaluated,
        report::format_elapsed(outcome.elapsed.as_secs_f64())
    );

    let results_file = sweep_dir.join("batch_results.txt");
    report::write_results_file(
        &results_file,
        &outcome.names,
        &outcome.best_values,
        outcome.best_error,
    )?;
    let resume_file = sweep_dir.join("batch_resume.txt");
    resume::write_resume_file(&resume_file, &outcome.best_values)?;
    println!(
        "wrote {} and {}",
        results_file.display(),
        resume_file.display()
    );
    Ok(())
}

fn reset(resume_file: &Path, population: Option<usize>) -> Result<()> {
    let backup = resume::reset_resume(resume_file, population)?;
    println!(
        "reset {}; original saved as {}",
        resume_file.display(),
        backup.display()
    );
    Ok(())
}

fn main() {
    let app = Cli::parse();
    let outcome = match app.command {
        Command::Compile {
            startup,
            params,
            output,
            name,
            dump_json,
        } => compile(&startup, params.as_deref(), output.as_deref(), &name, dump_json),
        Command::Simulate {
            startup,
            params,
            engine,
            dir,
            name,
            tol,
            integral_step,
        } => {
            let options = DriverOptions { tol, integral_step };
            simulate(
                &startup,
                params.as_deref(),
                &engine,
                dir.as_deref(),
                &name,
                &options,
            )
        }
        Command::Batch {
            startup,
            num_values,
            params,
            engine,
            dir,
            jobs,
            name,
        } => run_sweep(
            &startup,
            num_values,
            params.as_deref(),
            &engine,
            dir.as_deref(),
            jobs,
            &name,
        ),
        Command::ResumeReset {
            resume_file,
            population,
        } => reset(&resume_file, population),
    };
    if let Err(err) = outcome {
        die!("error: {err}");
    }
}
