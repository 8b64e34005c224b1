// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Resume files carry an optimizer's population between runs.  This module
//! seeds a fresh single-member file from a known parameter set and resets
//! an existing file so its members are re-evaluated instead of trusted.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use morphoc_engine::common::located;
use morphoc_engine::sim_err;

use crate::Result;

/// Writes a resume file holding a single population member with the given
/// parameter values.  The member's fit error is `nan` and the best value is
/// a sentinel, so the first evaluation always replaces both.
pub fn make_resume(writer: &mut dyn Write, values: &[f64]) -> Result<()> {
    writeln!(writer, "PopulationSize: 1")?;
    writeln!(writer, "NumParameters:  {}", values.len())?;
    writeln!(writer)?;
    writeln!(writer, "CompletedGenerations: 0")?;
    writeln!(writer)?;
    writeln!(writer, "Total elapsed time: 0")?;
    writeln!(writer, "Generation elapsed time: 0")?;
    writeln!(writer)?;
    writeln!(writer, "BestValue: 9.9e99")?;
    write!(writer, "Best Parameters: ")?;
    for value in values {
        write!(writer, " {value}")?;
    }
    writeln!(writer)?;
    writeln!(writer)?;
    writeln!(writer, "Population:")?;
    write!(writer, "  nan")?;
    for value in values {
        write!(writer, " {value}")?;
    }
    writeln!(writer)?;
    Ok(())
}

pub fn write_resume_file(path: &Path, values: &[f64]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    make_resume(&mut writer, values)?;
    writer.flush()?;
    Ok(())
}

/// Resets a resume file in place: the original moves to `<file>.backup`,
/// and the rewritten file keeps its parameter descriptions and population
/// members but forgets every result (best value, generation clock and
/// counter, member fit errors).  `new_population` additionally rewrites the
/// declared population size and truncates the member list to it.
///
/// Returns the backup path.  A failure mid-rewrite moves the backup into
/// place again, so the original file survives either way.
pub fn reset_resume(path: &Path, new_population: Option<usize>) -> Result<PathBuf> {
    let mut backup = path.as_os_str().to_os_string();
    backup.push(".backup");
    let backup = PathBuf::from(backup);

    if backup.exists() {
        return sim_err!(
            BackupExists,
            format!("backup file {} already exists", backup.display())
        );
    }
    if !path.is_file() {
        return sim_err!(
            DoesNotExist,
            format!("resume file {} does not exist", path.display())
        );
    }

    fs::rename(path, &backup)?;
    match rewrite(path, &backup, new_population) {
        Ok(()) => Ok(backup),
        Err(err) => {
            let _ = fs::remove_file(path);
            let _ = fs::rename(&backup, path);
            Err(err)
        }
    }
}

fn rewrite(path: &Path, backup: &Path, new_population: Option<usize>) -> Result<()> {
    let source = fs::read_to_string(backup)?;
    let origin = path.display().to_string();
    let text = rewrite_text(&source, new_population, &origin)?;
    fs::write(path, text)?;
    Ok(())
}

/// The reset transform itself, on text.
///
/// The layout rewritten here is the optimizer's: a parameter description
/// count and that many description lines, the best value, the elapsed time
/// and evaluation counter pairs, then arbitrary lines up to one ending in
/// `# population`, then one line per population member whose first token is
/// the member's fit error.  Blank and `#` lines between header lines pass
/// through untouched.
pub fn rewrite_text(source: &str, new_population: Option<usize>, origin: &str) -> Result<String> {
    let mut out = String::new();
    let mut lines = source.lines().enumerate();

    let (line_num, count_line) = next_data(&mut lines, &mut out, origin)?;
    let num_descriptors: usize = match first_token(count_line).parse() {
        Ok(n) => n,
        Err(_) => {
            return sim_err!(
                BadResumeFile,
                located(origin, line_num, "expected the parameter description count")
            );
        }
    };
    push_line(&mut out, count_line);
    for _ in 0..num_descriptors {
        let (_, line) = next_data(&mut lines, &mut out, origin)?;
        push_line(&mut out, line);
    }

    // best value becomes inf so the next run always improves on it
    let (_, line) = next_data(&mut lines, &mut out, origin)?;
    push_line(&mut out, &line.replacen(first_token(line), "inf", 1));

    // the total clock keeps running, the generation clock restarts
    let (_, line) = next_data(&mut lines, &mut out, origin)?;
    push_line(&mut out, line);
    let (_, line) = next_data(&mut lines, &mut out, origin)?;
    let generation_time = line.split('#').next().unwrap_or("").trim();
    push_line(&mut out, &line.replacen(generation_time, "0.0s", 1));

    // same split for the evaluation counters
    let (_, line) = next_data(&mut lines, &mut out, origin)?;
    push_line(&mut out, line);
    let (_, line) = next_data(&mut lines, &mut out, origin)?;
    push_line(&mut out, &line.replacen(first_token(line), "0", 1));

    loop {
        let (_, line) = next_data(&mut lines, &mut out, origin)?;
        if line.trim_end().ends_with("# population") {
            match new_population {
                Some(size) => push_line(
                    &mut out,
                    &line.replacen(first_token(line), &size.to_string(), 1),
                ),
                None => push_line(&mut out, line),
            }
            break;
        }
        push_line(&mut out, line);
    }

    // member fit errors become nan so every survivor is re-evaluated
    let limit = new_population.unwrap_or(usize::MAX);
    let mut kept = 0;
    for (_, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        kept += 1;
        if kept > limit {
            break;
        }
        push_line(&mut out, &line.replacen(first_token(line), "nan", 1));
    }

    Ok(out)
}

/// Advances to the next data line, copying blank and comment lines through
/// to `out` on the way.  Returns the 1-based line number with the line.
fn next_data<'a>(
    lines: &mut std::iter::Enumerate<std::str::Lines<'a>>,
    out: &mut String,
    origin: &str,
) -> Result<(usize, &'a str)> {
    for (idx, line) in lines {
        let data = line.trim();
        if data.is_empty() || data.starts_with('#') {
            push_line(out, line);
            continue;
        }
        return Ok((idx + 1, line));
    }
    sim_err!(
        BadResumeFile,
        format!("{origin}: file ended inside the header")
    )
}

fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
