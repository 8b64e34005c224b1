// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::error;
use std::fmt;
use std::result;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum ErrorCode {
    NoError,
    Generic,
    DoesNotExist,
    UnknownKeyword,
    BadLineArity,
    ExpectedNumber,
    ExpectedInteger,
    TagAlreadyOpen,
    TagNotOpen,
    UnclosedTag,
    MalformedTag,
    MixedTagAndData,
    BadParameterRange,
    UnsetParameter,
    NodeCountMismatch,
    NodeNotConnected,
    EmptyModel,
    BadTraceHeader,
    BadTraceData,
    BadInjectionSeries,
    BadResumeFile,
    BackupExists,
    EngineFailed,
    NoOutputTrace,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            DoesNotExist => "does_not_exist",
            UnknownKeyword => "unknown_keyword",
            BadLineArity => "bad_line_arity",
            ExpectedNumber => "expected_number",
            ExpectedInteger => "expected_integer",
            TagAlreadyOpen => "tag_already_open",
            TagNotOpen => "tag_not_open",
            UnclosedTag => "unclosed_tag",
            MalformedTag => "malformed_tag",
            MixedTagAndData => "mixed_tag_and_data",
            BadParameterRange => "bad_parameter_range",
            UnsetParameter => "unset_parameter",
            NodeCountMismatch => "node_count_mismatch",
            NodeNotConnected => "node_not_connected",
            EmptyModel => "empty_model",
            BadTraceHeader => "bad_trace_header",
            BadTraceData => "bad_trace_data",
            BadInjectionSeries => "bad_injection_series",
            BadResumeFile => "bad_resume_file",
            BackupExists => "backup_exists",
            EngineFailed => "engine_failed",
            NoOutputTrace => "no_output_trace",
        };

        write!(f, "{name}")
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Startup,
    Geometry,
    Model,
    Simulation,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Simulation,
            code: ErrorCode::Generic,
            details: Some(err.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Startup => "StartupError",
            ErrorKind::Geometry => "GeometryError",
            ErrorKind::Model => "ModelError",
            ErrorKind::Simulation => "SimulationError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! startup_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Startup,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Startup, ErrorCode::$code, None))
    }};
);

#[macro_export]
macro_rules! geo_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Geometry,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Geometry, ErrorCode::$code, None))
    }};
);

#[macro_export]
macro_rules! model_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Model, ErrorCode::$code, None))
    }};
);

#[macro_export]
macro_rules! sim_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Simulation,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Simulation, ErrorCode::$code, None))
    }};
}

/// Prefixes a message with the source file and 1-based line it came from.
pub fn located(origin: &str, line_num: usize, msg: &str) -> String {
    format!("{origin}:{line_num}: {msg}")
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Geometry,
        ErrorCode::TagAlreadyOpen,
        Some(located("cell.txt", 12, "tag 'Soma' is already open")),
    );
    assert_eq!(
        "GeometryError{tag_already_open: cell.txt:12: tag 'Soma' is already open}",
        format!("{err}")
    );

    let err = Error::new(ErrorKind::Model, ErrorCode::EmptyModel, None);
    assert_eq!("ModelError{empty_model}", format!("{err}"));
}
