// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Assigns each segment the display name used for its hoc section: a tag
//! unique to that segment when one exists, a positional fallback otherwise.

use std::collections::HashSet;

use crate::datamodel::Geometry;

/// Names every segment in place.
///
/// A tag qualifies only if no other segment carries it.  When several
/// qualify, the one whose tag opened earliest in the geometry file wins.
pub fn name_segments(geo: &mut Geometry) {
    let mut names = Vec::with_capacity(geo.segments.len());
    for (idx, segment) in geo.segments.iter().enumerate() {
        let mut shared: HashSet<&str> = HashSet::new();
        for (other_idx, other) in geo.segments.iter().enumerate() {
            if other_idx != idx {
                shared.extend(other.tags.iter().map(String::as_str));
            }
        }

        let unique = segment
            .tags
            .iter()
            .filter(|tag| !shared.contains(tag.as_str()))
            .min_by_key(|tag| geo.tags.open_rank(tag));
        names.push(match unique {
            Some(tag) => tag.clone(),
            None => format!("Segment{idx}"),
        });
    }

    for (segment, name) in geo.segments.iter_mut().zip(names) {
        segment.name = name;
    }
}
