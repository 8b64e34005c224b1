// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Node reconciliation: after parsing, nodes gain back-references to the
//! segments and boundary compartments incident on them, synthesizing blank
//! nodes when the geometry declared none.

use crate::common::Result;
use crate::datamodel::{Geometry, Node, Segment};
use crate::{geo_err, model_err};

/// Reconciles node and segment adjacency in place.
///
/// If the geometry declared no nodes, one blank node is synthesized per
/// referenced index.  If it declared any, the count must exactly cover the
/// referenced indices.
pub fn connect_nodes(geo: &mut Geometry) -> Result<()> {
    let max_referenced = geo
        .segments
        .iter()
        .map(|s| s.node0.max(s.node1))
        .max();

    let needed = match max_referenced {
        Some(max_idx) => max_idx + 1,
        None => 0,
    };

    if geo.nodes.is_empty() {
        geo.nodes = (0..needed).map(|_| Node::blank()).collect();
    } else if geo.nodes.len() != needed {
        return geo_err!(
            NodeCountMismatch,
            format!(
                "geometry declares {} nodes but segments reference {}",
                geo.nodes.len(),
                needed,
            )
        );
    }

    let Geometry {
        nodes, segments, ..
    } = geo;
    for (idx, segment) in segments.iter().enumerate() {
        nodes[segment.node0].segments.push(idx);
        nodes[segment.node1].segments.push(idx);
        nodes[segment.node0]
            .compartments
            .push(segment.compartment_nums[0]);
        nodes[segment.node1]
            .compartments
            .push(segment.compartment_nums[segment.compartment_nums.len() - 1]);
    }

    Ok(())
}

/// Which end of `segment` touches node `node_idx`: 0 for node0, 1 for node1.
pub fn node_side(segment: &Segment, node_idx: usize) -> Result<usize> {
    if segment.node0 == node_idx {
        Ok(0)
    } else if segment.node1 == node_idx {
        Ok(1)
    } else {
        model_err!(
            NodeNotConnected,
            format!("node {node_idx} is not an endpoint of '{}'", segment.name)
        )
    }
}

/// Verifies bidirectional node/segment closure: every incident list entry
/// points back at a segment that references the node, and vice versa.
pub fn check_closure(geo: &Geometry) -> Result<()> {
    for (idx, segment) in geo.segments.iter().enumerate() {
        for node_idx in [segment.node0, segment.node1] {
            let node = match geo.nodes.get(node_idx) {
                Some(node) => node,
                None => {
                    return geo_err!(
                        NodeCountMismatch,
                        format!("segment {idx} references missing node {node_idx}")
                    );
                }
            };
            if !node.segments.contains(&idx) {
                return geo_err!(
                    Generic,
                    format!("node {node_idx} does not list incident segment {idx}")
                );
            }
        }
        let first = segment.compartment_nums[0];
        let last = segment.compartment_nums[segment.compartment_nums.len() - 1];
        if !geo.nodes[segment.node0].compartments.contains(&first) {
            return geo_err!(
                Generic,
                format!(
                    "node {} does not list boundary compartment {first}",
                    segment.node0
                )
            );
        }
        if !geo.nodes[segment.node1].compartments.contains(&last) {
            return geo_err!(
                Generic,
                format!(
                    "node {} does not list boundary compartment {last}",
                    segment.node1
                )
            );
        }
    }

    for (node_idx, node) in geo.nodes.iter().enumerate() {
        for &seg_idx in node.segments.iter() {
            let segment = match geo.segments.get(seg_idx) {
                Some(segment) => segment,
                None => {
                    return geo_err!(
                        Generic,
                        format!("node {node_idx} lists missing segment {seg_idx}")
                    );
                }
            };
            if segment.node0 != node_idx && segment.node1 != node_idx {
                return geo_err!(
                    Generic,
                    format!("node {node_idx} lists segment {seg_idx} it is not an endpoint of")
                );
            }
        }
    }

    Ok(())
}
