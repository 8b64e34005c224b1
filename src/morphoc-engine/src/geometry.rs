// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Parser for the morphology file.  Lines hold either tag brackets or data;
//! data lines are classified purely by token count: 3 tokens declare a
//! node, 5 a circular segment, 7 an elliptical one.

use smallvec::SmallVec;

use crate::common::{Result, located};
use crate::datamodel::{CandidateNames, Geometry, Node, Profile, Segment, Tags, WILDCARD_TAG};
use crate::geo_err;
use crate::scan::{TagEvent, strip_comment, tag_event};

struct GeoParser<'a> {
    origin: &'a str,
    /// Tags currently open, in open order.  A value passed through the
    /// parse, not ambient state.
    open_tags: Vec<String>,
    geo: Geometry,
}

/// Parses morphology text into a [`Geometry`].  The returned graph still
/// needs [`crate::graph::connect_nodes`] to gain node adjacency.
pub fn parse_geometry(source: &str, origin: &str) -> Result<Geometry> {
    let mut parser = GeoParser {
        origin,
        open_tags: Vec::new(),
        geo: Geometry::new(),
    };

    let mut line_count = 0;
    for (idx, raw_line) in source.lines().enumerate() {
        line_count = idx + 1;
        parser.handle_line(line_count, raw_line)?;
    }

    if !parser.open_tags.is_empty() {
        return geo_err!(
            UnclosedTag,
            located(
                origin,
                line_count,
                &format!("tag '{}' still open at end of file", parser.open_tags[0]),
            )
        );
    }

    Ok(parser.geo)
}

impl<'a> GeoParser<'a> {
    fn handle_line(&mut self, line_num: usize, raw_line: &str) -> Result<()> {
        let tokens: Vec<&str> = strip_comment(raw_line).split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(());
        }

        let mut events = Vec::new();
        for token in tokens.iter() {
            match tag_event(token) {
                Some(Ok(event)) => events.push(event),
                Some(Err(msg)) => {
                    return geo_err!(MalformedTag, located(self.origin, line_num, &msg));
                }
                None => {}
            }
        }

        if !events.is_empty() {
            if events.len() != tokens.len() {
                return geo_err!(
                    MixedTagAndData,
                    located(
                        self.origin,
                        line_num,
                        "a line must be all tag brackets or all data",
                    )
                );
            }
            for event in events {
                self.handle_tag(line_num, event)?;
            }
            return Ok(());
        }

        match tokens.len() {
            3 => {
                let x = self.parse_f64(line_num, tokens[0])?;
                let y = self.parse_f64(line_num, tokens[1])?;
                let z = self.parse_f64(line_num, tokens[2])?;
                self.geo.nodes.push(Node::new(x, y, z));
                Ok(())
            }
            5 => {
                let radius = self.parse_f64(line_num, tokens[4])?;
                let profile = Profile::Circular { radius };
                self.push_segment(line_num, &tokens, profile)
            }
            7 => {
                let semi_major = self.parse_f64(line_num, tokens[4])?;
                let semi_minor = self.parse_f64(line_num, tokens[5])?;
                let angle = self.parse_f64(line_num, tokens[6])?;
                let profile = Profile::Elliptical {
                    semi_major,
                    semi_minor,
                    angle,
                };
                self.push_segment(line_num, &tokens, profile)
            }
            n => geo_err!(
                BadLineArity,
                located(
                    self.origin,
                    line_num,
                    &format!("lines have 3, 5 or 7 data tokens, got {n}"),
                )
            ),
        }
    }

    fn handle_tag(&mut self, line_num: usize, event: TagEvent) -> Result<()> {
        match event {
            TagEvent::Open(name) => {
                if name == WILDCARD_TAG {
                    return geo_err!(
                        MalformedTag,
                        located(self.origin, line_num, "tag name '*' is reserved")
                    );
                }
                if self.open_tags.contains(&name) {
                    return geo_err!(
                        TagAlreadyOpen,
                        located(
                            self.origin,
                            line_num,
                            &format!("tag '{name}' is already open"),
                        )
                    );
                }
                self.geo.tags.register(&name);
                self.open_tags.push(name);
                Ok(())
            }
            TagEvent::Close(name) => match self.open_tags.iter().position(|t| *t == name) {
                Some(pos) => {
                    self.open_tags.remove(pos);
                    Ok(())
                }
                None => geo_err!(
                    TagNotOpen,
                    located(
                        self.origin,
                        line_num,
                        &format!("closing tag '{name}' that is not open"),
                    )
                ),
            },
        }
    }

    fn push_segment(&mut self, line_num: usize, tokens: &[&str], profile: Profile) -> Result<()> {
        let node0 = self.parse_usize(line_num, tokens[0])?;
        let node1 = self.parse_usize(line_num, tokens[1])?;
        let num_compartments = self.parse_usize(line_num, tokens[2])?;
        let length = self.parse_f64(line_num, tokens[3])?;

        if num_compartments == 0 {
            return geo_err!(
                ExpectedInteger,
                located(self.origin, line_num, "compartment count must be positive")
            );
        }

        let mut segment = Segment::new(node0, node1, num_compartments, length, profile);
        segment.tags = SmallVec::from_iter(self.open_tags.iter().cloned());
        assign_compartment_names(&mut self.geo.tags, &mut segment, &self.open_tags);

        self.geo.num_compartments += segment.num_compartments;
        self.geo.surface_area += segment.surface_area;
        self.geo.volume += segment.volume;
        self.geo.segments.push(segment);
        Ok(())
    }

    fn parse_f64(&self, line_num: usize, token: &str) -> Result<f64> {
        match token.parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => geo_err!(
                ExpectedNumber,
                located(
                    self.origin,
                    line_num,
                    &format!("expected a number, got '{token}'"),
                )
            ),
        }
    }

    fn parse_usize(&self, line_num: usize, token: &str) -> Result<usize> {
        match token.parse::<usize>() {
            Ok(value) => Ok(value),
            Err(_) => geo_err!(
                ExpectedInteger,
                located(
                    self.origin,
                    line_num,
                    &format!("expected a non-negative integer, got '{token}'"),
                )
            ),
        }
    }
}

/// Gives each of a segment's compartments its global ordinal plus one
/// `<tag><n>` candidate per open tag, advancing the registry counters.
fn assign_compartment_names(tags: &mut Tags, segment: &mut Segment, open_tags: &[String]) {
    for _ in 0..segment.num_compartments {
        let compartment_num = tags.take_ordinal(WILDCARD_TAG);
        let mut names: CandidateNames = SmallVec::new();
        names.push(compartment_num.to_string());
        for tag in open_tags {
            let ordinal = tags.take_ordinal(tag);
            names.push(format!("{tag}{ordinal}"));
        }
        segment.compartment_nums.push(compartment_num);
        segment.compartment_names.push(names);
    }
}
