// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::cascade::{self, ResolvedModel};
use crate::common::Result;
use crate::datamodel::{Geometry, StartupInfo};
use crate::model_err;
use crate::{graph, hoc, namer, split};

/// A parsed startup file together with the geometry it references.
///
/// Compilation never mutates the project, so one project can be compiled
/// repeatedly under different parameter overrides.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Project {
    pub startup: StartupInfo,
    pub geometry: Geometry,
}

impl Project {
    pub fn new(startup: StartupInfo, geometry: Geometry) -> Self {
        Project { startup, geometry }
    }

    /// Runs the whole pipeline: reconcile nodes, name segments, split to
    /// atomic compartments, resolve the parameter and channel cascade.
    pub fn compile(&self, model_name: &str) -> Result<ResolvedModel> {
        if self.geometry.segments.is_empty() {
            return model_err!(EmptyModel, "the geometry contains no segments".to_string());
        }

        let mut geo = self.geometry.clone();
        graph::connect_nodes(&mut geo)?;
        namer::name_segments(&mut geo);
        split::split_compartments(&mut geo);

        cascade::resolve(&geo, &self.startup, model_name)
    }

    /// Compiles and renders the hoc template in one step.
    pub fn compile_to_hoc(&self, model_name: &str) -> Result<String> {
        hoc::emit_model(&self.compile(model_name)?)
    }
}
