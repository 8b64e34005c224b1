// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! File-level collaborators around the morphoc compiler: loading startup and
//! geometry files from disk, recorded-trace and injection-series I/O, the
//! simulation driver, batch parameter sweeps, and optimizer resume files.

#![forbid(unsafe_code)]

use std::io::BufRead;
use std::path::{Path, PathBuf};

use morphoc_engine::common::located;
pub use morphoc_engine::{self as engine, Result};
use morphoc_engine::{Project, StartupInfo, parse_geometry, parse_startup, sim_err};
use serde::{Deserialize, Serialize};

pub mod batch;
pub mod driver;
pub mod injection;
mod lines;
pub mod report;
pub mod resume;
pub mod trace;

/// Reserved name carrying a run's fit error in parameter-output files.
pub const FIT_ERROR_NAME: &str = "value";

/// A prior run's parameter output: pinned values plus the fit error the run
/// reported under the reserved `value` name.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ParamOverrides {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub fit_error: Option<f64>,
}

/// Reads a `<name> <value>` parameter file.  `#` starts a comment; a line
/// with any other number of tokens is an error.
pub fn read_overrides(reader: &mut dyn BufRead, origin: &str) -> Result<ParamOverrides> {
    let mut overrides = ParamOverrides::default();
    let mut lines = lines::DataLines::new(reader);
    while let Some((line_num, line)) = lines.next_data()? {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [name, value] => {
                let value: f64 = match value.parse() {
                    Ok(value) => value,
                    Err(_) => {
                        return sim_err!(
                            ExpectedNumber,
                            located(
                                origin,
                                line_num,
                                &format!("expected a number for '{name}', got '{value}'"),
                            )
                        );
                    }
                };
                if *name == FIT_ERROR_NAME {
                    overrides.fit_error = Some(value);
                } else {
                    overrides.names.push(name.to_string());
                    overrides.values.push(value);
                }
            }
            _ => {
                return sim_err!(
                    BadLineArity,
                    located(origin, line_num, "parameter line needs a name and a value")
                );
            }
        }
    }
    Ok(overrides)
}

pub fn open_overrides(path: &Path) -> Result<ParamOverrides> {
    if !path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("parameter file {} does not exist", path.display())
        );
    }
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_overrides(&mut reader, &path.display().to_string())
}

pub fn open_startup(path: &Path) -> Result<StartupInfo> {
    if !path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("startup file {} does not exist", path.display())
        );
    }
    let source = std::fs::read_to_string(path)?;
    parse_startup(&source, &path.display().to_string())
}

/// Loads a startup file and the geometry it names, applying any parameter
/// overrides before the geometry is read so unset rules are already pinned
/// when the project is compiled.
pub fn open_project(path: &Path, overrides: Option<&ParamOverrides>) -> Result<Project> {
    let mut startup = open_startup(path)?;
    if let Some(overrides) = overrides {
        for (name, value) in overrides.names.iter().zip(&overrides.values) {
            startup.apply_override(name, *value);
        }
    }

    let geo_path = resolve_relative(path, &startup.geometry_file);
    if !geo_path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("geometry file {} does not exist", geo_path.display())
        );
    }
    let source = std::fs::read_to_string(&geo_path)?;
    let geometry = parse_geometry(&source, &startup.geometry_file)?;
    Ok(Project { startup, geometry })
}

/// Resolves `file` against the directory `anchor` lives in; absolute paths
/// pass through untouched.
pub fn resolve_relative(anchor: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    match anchor.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file),
        _ => file.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphoc_engine::ErrorCode;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    // ==================== overrides ====================

    #[test]
    fn reads_names_values_and_fit_error() {
        let source = "\
# best member of generation 12
value                  0.125
gBar_NaV               5.25
axialResistivity       1 # ohm*m
";
        let overrides = read_overrides(&mut source.as_bytes(), "resume.txt").unwrap();
        assert_eq!(vec!["gBar_NaV", "axialResistivity"], overrides.names);
        assert_eq!(vec![5.25, 1.0], overrides.values);
        assert_eq!(Some(0.125), overrides.fit_error);
    }

    #[test]
    fn wrong_arity_is_fatal() {
        let err = read_overrides(&mut "gBar 1 2\n".as_bytes(), "p.txt").unwrap_err();
        assert_eq!(ErrorCode::BadLineArity, err.code);
        assert!(err.get_details().unwrap().starts_with("p.txt:1:"));
    }

    #[test]
    fn non_numeric_value_is_fatal() {
        let err = read_overrides(&mut "gBar high\n".as_bytes(), "p.txt").unwrap_err();
        assert_eq!(ErrorCode::ExpectedNumber, err.code);
    }

    // ==================== project loading ====================

    #[test]
    fn opens_a_project_relative_to_the_startup_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "cell.txt",
            "<Soma>\n1 5.0 20.0\n2 5.0 20.0\n1 2 1 100.0 1.0\n</Soma>\n",
        );
        let startup = write_file(
            dir.path(),
            "startup.txt",
            "geometry cell.txt\ntime 500.0\nchannel pas *\nparameter v -65.0\n",
        );

        let project = open_project(&startup, None).unwrap();
        assert_eq!(1, project.geometry.segments.len());
        assert_eq!("cell.txt", project.startup.geometry_file);
    }

    #[test]
    fn overrides_pin_parameters_before_compilation() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "cell.txt",
            "1 5.0 20.0\n2 5.0 20.0\n1 2 1 100.0 1.0\n",
        );
        let startup = write_file(
            dir.path(),
            "startup.txt",
            "geometry cell.txt\nchannel pas *\n\
             parameter gBar_NaV 1.0 100.0 1.0 100.0\nparameter v -65.0\n",
        );
        let params = write_file(dir.path(), "best.txt", "value 0.5\ngBar_NaV 12.5\n");

        let overrides = open_overrides(&params).unwrap();
        let project = open_project(&startup, Some(&overrides)).unwrap();

        let pinned = project
            .startup
            .parameters
            .iter()
            .find(|p| p.name == "gBar_NaV")
            .unwrap();
        assert!(pinned.is_constant);
        assert_eq!(12.5, pinned.value);
        assert_eq!(Some(0.5), overrides.fit_error);
    }

    #[test]
    fn missing_files_are_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let startup = write_file(dir.path(), "startup.txt", "geometry nowhere.txt\n");

        let err = open_project(&startup, None).unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
        assert!(err.get_details().unwrap().contains("nowhere.txt"));

        let err = open_startup(&dir.path().join("absent.txt")).unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }

    #[test]
    fn absolute_geometry_paths_pass_through() {
        let anchor = Path::new("/work/fits/startup.txt");
        assert_eq!(
            PathBuf::from("/data/cell.txt"),
            resolve_relative(anchor, "/data/cell.txt")
        );
        assert_eq!(
            PathBuf::from("/work/fits/cell.txt"),
            resolve_relative(anchor, "cell.txt")
        );
        assert_eq!(
            PathBuf::from("cell.txt"),
            resolve_relative(Path::new("startup.txt"), "cell.txt")
        );
    }
}
