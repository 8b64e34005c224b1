// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Candidate names for a single compartment: its global ordinal plus one
/// `<tag><count>` entry per tag open at declaration time.
pub type CandidateNames = SmallVec<[String; 4]>;

/// The tag selector that matches every compartment.
pub const WILDCARD_TAG: &str = "*";

/// Exponent of the Cantrell approximation to an ellipse's perimeter.
const CANTRELL_S: f64 = 0.825_056;

/// A point in the morphology graph.  Coordinates are in um and stay NaN for
/// nodes synthesized rather than declared (implicit endpoints, split
/// boundaries).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Indices of segments incident on this node.
    pub segments: Vec<usize>,
    /// Global compartment numbers incident on this node.
    pub compartments: Vec<usize>,
}

impl Node {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Node {
            x,
            y,
            z,
            segments: Vec::new(),
            compartments: Vec::new(),
        }
    }

    pub fn blank() -> Self {
        Node::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn has_position(&self) -> bool {
        !(self.x.is_nan() || self.y.is_nan() || self.z.is_nan())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        fn coord_eq(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        coord_eq(self.x, other.x)
            && coord_eq(self.y, other.y)
            && coord_eq(self.z, other.z)
            && self.segments == other.segments
            && self.compartments == other.compartments
    }
}

/// Cross-sectional shape of a cable piece.  Dimensions are in um.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum Profile {
    Circular {
        radius: f64,
    },
    Elliptical {
        semi_major: f64,
        semi_minor: f64,
        angle: f64,
    },
}

impl Profile {
    /// Perimeter in um.  The elliptical case uses Cantrell's parametric
    /// approximation rather than an exact elliptic integral.
    pub fn perimeter(&self) -> f64 {
        match *self {
            Profile::Circular { radius } => 2.0 * PI * radius,
            Profile::Elliptical {
                semi_major: a,
                semi_minor: b,
                ..
            } => {
                let mean_pow = (0.5 * (a.powf(CANTRELL_S) + b.powf(CANTRELL_S)))
                    .powf(-1.0 / CANTRELL_S);
                4.0 * (a + b) - 2.0 * (4.0 - PI) * a * b * mean_pow
            }
        }
    }

    /// Cross-sectional area in um^2.
    pub fn cross_section(&self) -> f64 {
        match *self {
            Profile::Circular { radius } => PI * radius * radius,
            Profile::Elliptical {
                semi_major: a,
                semi_minor: b,
                ..
            } => PI * a * b,
        }
    }
}

/// A cable piece between two nodes, holding one or more compartments until
/// the splitter normalizes it to exactly one.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub node0: usize,
    pub node1: usize,
    pub num_compartments: usize,
    /// Length in um.
    pub length: f64,
    /// Lateral surface area in mm^2.
    pub surface_area: f64,
    /// Cross-sectional area in um^2.
    pub cross_section: f64,
    /// Volume in mm^3.
    pub volume: f64,
    pub profile: Profile,
    /// Tags open when the segment was declared, in open order.
    pub tags: SmallVec<[String; 2]>,
    /// Global compartment numbers, in declaration order.
    pub compartment_nums: Vec<usize>,
    /// Candidate names per compartment, parallel to `compartment_nums`.
    pub compartment_names: Vec<CandidateNames>,
}

impl Segment {
    pub fn new(
        node0: usize,
        node1: usize,
        num_compartments: usize,
        length: f64,
        profile: Profile,
    ) -> Self {
        let surface_area = 1e-6 * profile.perimeter() * length;
        let cross_section = profile.cross_section();
        let volume = 1e-9 * cross_section * length;
        Segment {
            name: String::new(),
            node0,
            node1,
            num_compartments,
            length,
            surface_area,
            cross_section,
            volume,
            profile,
            tags: SmallVec::new(),
            compartment_nums: Vec::new(),
            compartment_names: Vec::new(),
        }
    }

    /// Emitted diameter in um, recovered from the stored mm^2 surface area.
    pub fn diam_um(&self) -> f64 {
        self.surface_area * 1e6 / (self.length * PI)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Registry of tags seen in a geometry file: open order plus a running
/// count of compartments each tag has been applied to.  The wildcard `*`
/// is pre-registered and counts every compartment, which is what makes its
/// specificity zero.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Tags {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Default for Tags {
    fn default() -> Self {
        let mut tags = Tags {
            order: Vec::new(),
            counts: HashMap::new(),
        };
        tags.register(WILDCARD_TAG);
        tags
    }
}

impl Tags {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a tag at count zero; re-registering is a no-op.
    pub fn register(&mut self, name: &str) {
        if !self.counts.contains_key(name) {
            self.order.push(name.to_string());
            self.counts.insert(name.to_string(), 0);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn count(&self, name: &str) -> Option<usize> {
        self.counts.get(name).copied()
    }

    /// Increments a tag's compartment count, returning the pre-increment
    /// value (the next `<tag><n>` ordinal).
    pub fn take_ordinal(&mut self, name: &str) -> usize {
        if !self.counts.contains_key(name) {
            self.order.push(name.to_string());
        }
        let count = self.counts.entry(name.to_string()).or_insert(0);
        let ordinal = *count;
        *count += 1;
        ordinal
    }

    /// Position of a tag in file open order; `*` is always rank 0.
    pub fn open_rank(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.counts[name]))
    }
}

/// How a fittable parameter's start values are drawn within its range.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Distribution {
    Constant,
    Uniform,
    LogDistributed,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Distribution::Constant => "constant",
            Distribution::Uniform => "uniform",
            Distribution::LogDistributed => "log_distributed",
        };
        write!(f, "{name}")
    }
}

/// A named parameter rule: either a constant value or a fittable range
/// with independent start bounds.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub start_min: f64,
    pub start_max: f64,
    pub is_constant: bool,
    pub distribution: Distribution,
}

impl Parameter {
    pub fn constant(name: &str, value: f64) -> Self {
        Parameter {
            name: name.to_string(),
            value,
            min: value,
            max: value,
            start_min: value,
            start_max: value,
            is_constant: true,
            distribution: Distribution::Constant,
        }
    }

    /// Builds a rule from full-range and start-range bounds, enforcing
    /// `min <= start_min <= start_max <= max`.  A degenerate range
    /// (min == max) collapses to a constant.
    pub fn with_range(
        name: &str,
        min: f64,
        max: f64,
        start_min: f64,
        start_max: f64,
    ) -> std::result::Result<Self, String> {
        if !(min <= start_min && start_min <= start_max && start_max <= max) {
            return Err(format!(
                "parameter '{name}' requires min <= startMin <= startMax <= max \
                 (got {min} {max} {start_min} {start_max})"
            ));
        }
        if min == max {
            return Ok(Parameter::constant(name, min));
        }
        let distribution = if min * max > 0.0 {
            Distribution::LogDistributed
        } else {
            Distribution::Uniform
        };
        Ok(Parameter {
            name: name.to_string(),
            value: f64::NAN,
            min,
            max,
            start_min,
            start_max,
            is_constant: false,
            distribution,
        })
    }

    /// Draws a start value within `[start_min, start_max]` according to
    /// the rule's distribution.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self.distribution {
            Distribution::Constant => self.value,
            Distribution::Uniform => {
                let u: f64 = rng.random();
                self.start_min + u * (self.start_max - self.start_min)
            }
            Distribution::LogDistributed => {
                let sign = if self.start_min < 0.0 { -1.0 } else { 1.0 };
                let lo = self.start_min.abs().log10();
                let hi = self.start_max.abs().log10();
                let u: f64 = rng.random();
                sign * 10f64.powf(lo + u * (hi - lo))
            }
        }
    }
}

/// A mechanism inserted into every compartment matching its tag selector.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub mechanism: String,
    pub tag: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TraceKind {
    Record,
    Clamp,
    Fit,
}

/// One `record`/`clamp`/`fit` startup line, in declaration order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum TraceDirective {
    Record {
        target: String,
        dt: f64,
        file: String,
    },
    Clamp {
        target: String,
        file: String,
        trace_num: usize,
    },
    Fit {
        target: String,
        file: String,
        trace_num: usize,
        tau: f64,
    },
}

impl TraceDirective {
    pub fn kind(&self) -> TraceKind {
        match self {
            TraceDirective::Record { .. } => TraceKind::Record,
            TraceDirective::Clamp { .. } => TraceKind::Clamp,
            TraceDirective::Fit { .. } => TraceKind::Fit,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            TraceDirective::Record { target, .. }
            | TraceDirective::Clamp { target, .. }
            | TraceDirective::Fit { target, .. } => target,
        }
    }

    pub fn file(&self) -> &str {
        match self {
            TraceDirective::Record { file, .. }
            | TraceDirective::Clamp { file, .. }
            | TraceDirective::Fit { file, .. } => file,
        }
    }

    /// Sampling interval in ms; NaN when the interval comes from the
    /// clamp/fit data file instead of the directive.
    pub fn dt(&self) -> f64 {
        match self {
            TraceDirective::Record { dt, .. } => *dt,
            _ => f64::NAN,
        }
    }
}

/// Everything the startup file declares.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct StartupInfo {
    pub geometry_file: String,
    pub channel_dir: String,
    /// Simulation stop time in ms; +inf until a `time` directive sets it.
    pub stop_time: f64,
    pub traces: Vec<TraceDirective>,
    pub channels: Vec<Channel>,
    pub parameters: Vec<Parameter>,
}

impl StartupInfo {
    pub fn new() -> Self {
        StartupInfo {
            stop_time: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Pins a parameter to a fixed value, appending a new constant rule if
    /// the name was never declared.  A redeclared name is pinned at every
    /// occurrence so no unset rule survives.
    pub fn apply_override(&mut self, name: &str, value: f64) {
        let mut found = false;
        for param in self.parameters.iter_mut() {
            if param.name == name {
                *param = Parameter::constant(name, value);
                found = true;
            }
        }
        if !found {
            self.parameters.push(Parameter::constant(name, value));
        }
    }
}

/// The morphology graph as parsed: nodes, segments, the tag registry, and
/// running totals over all compartments.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Geometry {
    pub nodes: Vec<Node>,
    pub segments: Vec<Segment>,
    pub tags: Tags,
    pub num_compartments: usize,
    /// Total lateral surface area in mm^2.
    pub surface_area: f64,
    /// Total volume in mm^3.
    pub volume: f64,
}

impl Geometry {
    pub fn new() -> Self {
        Geometry {
            nodes: Vec::new(),
            segments: Vec::new(),
            tags: Tags::new(),
            num_compartments: 0,
            surface_area: 0.0,
            volume: 0.0,
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::new()
    }
}
