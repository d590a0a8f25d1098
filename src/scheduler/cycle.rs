// src/scheduler/cycle.rs

//! Cycle detection over a resolved graph

use crate::resolver::{DependencyGraph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Find one dependency cycle, returned as a closed path of names
///
/// The path starts and ends with the same package (`a, b, c, a`), and each
/// step follows a depends-on edge. Nodes are visited in name order and
/// edges in target name order, so the reported cycle is reproducible.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut path: Vec<NodeId> = Vec::new();

    let mut starts: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
    starts.sort_by(|a, b| graph.node(*a).name().cmp(graph.node(*b).name()));

    for start in starts {
        if marks[start.0] == Mark::Unvisited {
            if let Some(cycle) = visit(graph, start, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    graph: &DependencyGraph,
    id: NodeId,
    marks: &mut [Mark],
    path: &mut Vec<NodeId>,
) -> Option<Vec<String>> {
    marks[id.0] = Mark::InProgress;
    path.push(id);

    let mut targets: Vec<NodeId> = graph.dependencies(id).iter().map(|e| e.to).collect();
    targets.sort_by(|a, b| graph.node(*a).name().cmp(graph.node(*b).name()));
    targets.dedup();

    for target in targets {
        match marks[target.0] {
            Mark::Unvisited => {
                if let Some(cycle) = visit(graph, target, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::InProgress => {
                let start = path.iter().position(|&n| n == target).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&n| graph.node(n).name().to_string())
                    .collect();
                cycle.push(graph.node(target).name().to_string());
                return Some(cycle);
            }
            Mark::Done => {}
        }
    }

    path.pop();
    marks[id.0] = Mark::Done;
    None
}
