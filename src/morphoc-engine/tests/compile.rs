// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! End-to-end compilation tests: startup + geometry text in, hoc template
//! out, with the cascade and splitter exercised through the public API.

use morphoc_engine::graph::check_closure;
use morphoc_engine::{ErrorCode, Project, parse_geometry, parse_startup, specificity};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const STARTUP: &str = "\
geometry cell.txt
time 500.0
channel pas *
channel NaV Soma
parameter specificCapacitance 1.0
parameter axialResistivity 1.0
parameter eLeak -7.5e-6
parameter gBar_NaV_Soma 5.0
parameter v -65.0
";

const GEOMETRY: &str = "\
<Soma>
0 1 1 20.0 5.0
</Soma>
1 2 1 100.0 1.0
";

fn project(startup: &str, geometry: &str) -> Project {
    Project::new(
        parse_startup(startup, "startup.txt").unwrap(),
        parse_geometry(geometry, "cell.txt").unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Template emission
// ---------------------------------------------------------------------------

const EXPECTED_HOC: &str = r#"begintemplate CellModel

public Soma
public Segment1

create Soma
create Segment1

proc init() {
  // Create the model segments:
  create Soma
  create Segment1

  // Set first segment as default access:
  access Soma

  // Connect the model segments:
  connect Segment1(0), Soma(1)

  // Set the physical dimensions of the model segments:
  Soma {
    diam =                  10 // um
    L    =                  20 // um
    nseg = 1
  }
  Segment1 {
    diam =                   2 // um
    L    =                 100 // um
    nseg = 1
  }

  // Add channels to model segments:
  Soma {
    insert pas
    insert NaV
  }
  Segment1 {
    insert pas
  }

  // Set the value of non-state parameters:
  cm                    =                 0.1 // uF/cm^2
  Ra                    =                 100 // ohm cm
  eLeak                 =            -7.5e-06
  Soma {
    gBar_NaV            =                   5 // uS/mm^2
  }
  Segment1 {
  }
}

proc setState() {
  // Initialize the model:
  finitialize()
  fcurrent()
  // Set the values of state parameters:
  v(0.5)                =                 -65
  Soma {
  }
  Segment1 {
  }
}
endtemplate CellModel
"#;

#[test]
fn emits_the_full_template() {
    let hoc = project(STARTUP, GEOMETRY)
        .compile_to_hoc("CellModel")
        .unwrap();
    assert_eq!(EXPECTED_HOC, hoc);
}

// ---------------------------------------------------------------------------
// Geometry quantities
// ---------------------------------------------------------------------------

#[test]
fn unit_cylinder_round_trips_its_diameter() {
    let geometry = "\
0 0 0
10 0 0
0 1 1 10.0 1.0
";
    let geo = parse_geometry(geometry, "cell.txt").unwrap();
    let expected_area = 2.0 * std::f64::consts::PI * 1.0 * 10.0 * 1e-6;
    let expected_volume = std::f64::consts::PI * 1.0 * 10.0 * 1e-9;
    assert!((geo.surface_area - expected_area).abs() < 1e-15);
    assert!((geo.volume - expected_volume).abs() < 1e-18);

    let startup = "geometry cell.txt\n";
    let hoc = Project::new(parse_startup(startup, "s").unwrap(), geo)
        .compile_to_hoc("CellModel")
        .unwrap();
    assert!(
        hoc.contains("    diam =                   2 // um\n"),
        "diameter should come back as exactly 2 um:\n{hoc}"
    );
}

// ---------------------------------------------------------------------------
// Cascade behavior through the public API
// ---------------------------------------------------------------------------

#[test]
fn exact_name_beats_a_3_of_100_tag() {
    let geometry = "\
<Soma>
0 1 3 30.0 2.0
</Soma>
1 2 97 970.0 1.0
";
    let project = project(
        "geometry cell.txt\nparameter gBar_NaV_0 9.0\nparameter gBar_NaV_Soma 5.0\n",
        geometry,
    );

    let resolved = project.compile("Cell").unwrap();
    let geo = &resolved.geometry;
    assert_eq!(100, geo.num_compartments);
    assert_eq!(97, specificity(geo, "Soma", Some(0)));
    assert_eq!(100, specificity(geo, "0", Some(0)));

    // the exact-name rule wins on compartment 0 even though the tag rule
    // was declared later
    assert_eq!(1, resolved.fixed.per_segment[0].len());
    assert_eq!(9.0, resolved.fixed.per_segment[0][0].value);
    assert_eq!(5.0, resolved.fixed.per_segment[1][0].value);
}

#[test]
fn split_model_keeps_closure_and_counts() {
    let resolved = project("geometry cell.txt\n", "<Soma>\n0 1 4 100.0 1.0\n</Soma>\n")
        .compile("Cell")
        .unwrap();
    let geo = &resolved.geometry;

    assert_eq!(4, geo.segments.len());
    assert_eq!(2 + 3, geo.nodes.len());
    check_closure(geo).unwrap();
    assert!(geo.segments.iter().enumerate().all(|(i, s)| {
        s.compartment_nums == vec![i]
    }));
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn nested_parameter_tag_reports_the_offending_line() {
    let source = "geometry cell.txt\n<parameter>\nleak 1.0\n<parameter>\n";
    let err = parse_startup(source, "startup.txt").unwrap_err();
    assert_eq!(ErrorCode::TagAlreadyOpen, err.code);
    assert!(err.get_details().unwrap().starts_with("startup.txt:4:"));
}

#[test]
fn inverted_range_never_reaches_emission() {
    let err = parse_startup("parameter gBar_NaV 10.0 0.1\n", "startup.txt").unwrap_err();
    assert_eq!(ErrorCode::BadParameterRange, err.code);
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn resolved_model_survives_a_json_round_trip() {
    let resolved = project(STARTUP, GEOMETRY).compile("Cell").unwrap();
    let json = serde_json::to_string(&resolved).unwrap();
    let back: morphoc_engine::ResolvedModel = serde_json::from_str(&json).unwrap();
    assert_eq!(resolved, back);
}
