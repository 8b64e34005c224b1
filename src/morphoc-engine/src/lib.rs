// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod cascade;
pub mod common;
pub mod datamodel;
pub mod geometry;
pub mod graph;
pub mod hoc;
mod namer;
mod project;
mod scan;
pub mod split;
pub mod startup;

pub use self::cascade::{Binding, PassBindings, ResolvedModel, resolve, specificity};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::datamodel::{Geometry, Parameter, StartupInfo, TraceDirective, TraceKind};
pub use self::geometry::parse_geometry;
pub use self::hoc::{emit_model, fmt_g};
pub use self::project::Project;
pub use self::startup::parse_startup;
