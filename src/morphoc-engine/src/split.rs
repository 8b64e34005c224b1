// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Rewrites the geometry so every segment holds exactly one compartment,
//! the granularity the emitter works at.

use crate::datamodel::{Geometry, Node};

/// Splits every multi-compartment segment into single-compartment pieces,
/// chained end to end through freshly synthesized interior nodes.
///
/// Extensive quantities (length, membrane area, volume) are divided evenly
/// across the pieces.  Afterwards a segment's index equals its compartment
/// number, and every node's incident-segment list is rebuilt from its
/// compartment list.  Already-atomic geometries pass through unchanged.
pub fn split_compartments(geo: &mut Geometry) {
    let old_segments = std::mem::take(&mut geo.segments);
    let mut segments = Vec::with_capacity(geo.num_compartments);

    for segment in old_segments {
        let pieces = segment.num_compartments;
        if pieces == 1 {
            segments.push(segment);
            continue;
        }

        let scale = pieces as f64;
        let mut upstream = segment.node0;
        for i in 0..pieces {
            let mut piece = segment.clone();
            piece.name = format!("{}Compartment{i}", segment.name);
            piece.num_compartments = 1;
            piece.length = segment.length / scale;
            piece.surface_area = segment.surface_area / scale;
            piece.volume = segment.volume / scale;
            piece.compartment_nums = vec![segment.compartment_nums[i]];
            piece.compartment_names = vec![segment.compartment_names[i].clone()];

            piece.node0 = upstream;
            if i + 1 == pieces {
                piece.node1 = segment.node1;
            } else {
                let mut boundary = Node::blank();
                boundary.compartments = vec![
                    segment.compartment_nums[i],
                    segment.compartment_nums[i + 1],
                ];
                geo.nodes.push(boundary);
                piece.node1 = geo.nodes.len() - 1;
            }
            upstream = piece.node1;
            segments.push(piece);
        }
    }

    geo.segments = segments;
    // post-split, segment index == compartment number
    for node in geo.nodes.iter_mut() {
        node.segments = node.compartments.clone();
    }
}
