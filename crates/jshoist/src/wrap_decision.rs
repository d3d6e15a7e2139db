//! Wrap decision over one bundle
//!
//! A module keeps a private, lazily invoked scope when
//! - it carries a local trigger (`self_wrapped`, or `should_wrap` set upstream),
//! - some dependent reaches it through a `must_wrap` edge, or
//! - some dependent reaching it statically is itself wrapped.
//!
//! The decision is a forward reachability pass: the first two rules seed a
//! worklist, and every static edge leaving a wrapped module wraps its target.
//! Dynamic edges never propagate ancestry, though their own `must_wrap` flag
//! still seeds. Each module enters the worklist at most once, so cycles
//! terminate without guessing.

use std::collections::VecDeque;

use log::{debug, trace};
use petgraph::{Direction, visit::EdgeRef};
use rustc_hash::FxHashSet;

use crate::{
    error::Result,
    graph::{BundleGraph, ModuleDependencyGraph},
    module_unit::ModuleId,
    types::FxIndexSet,
};

/// Modules wrapped on their own account, before any propagation
fn wrap_roots(graph: &BundleGraph, dependencies: &ModuleDependencyGraph) -> Vec<ModuleId> {
    let mut roots: Vec<ModuleId> = dependencies
        .graph
        .node_weights()
        .filter(|id| {
            graph
                .module(id)
                .is_some_and(|unit| unit.flags.self_wrapped || unit.flags.should_wrap)
        })
        .cloned()
        .collect();
    for edge in dependencies.graph.edge_references() {
        if edge.weight().must_wrap {
            roots.push(dependencies.graph[edge.target()].clone());
        }
    }
    roots
}

/// Close the root set over static edges
fn propagate(dependencies: &ModuleDependencyGraph, roots: Vec<ModuleId>) -> FxHashSet<ModuleId> {
    let mut wrapped = FxHashSet::default();
    let mut queue: VecDeque<ModuleId> = roots.into();
    while let Some(id) = queue.pop_front() {
        if !wrapped.insert(id.clone()) {
            continue;
        }
        let Some(node) = dependencies.node(&id) else {
            continue;
        };
        for edge in dependencies
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| !edge.weight().is_dynamic)
        {
            let target = &dependencies.graph[edge.target()];
            if !wrapped.contains(target) {
                trace!("{target} is wrapped because {id} is");
                queue.push_back(target.clone());
            }
        }
    }
    wrapped
}

/// Decide which members of `bundle` are wrapped and set their `should_wrap`
///
/// Returns the wrapped modules in bundle order.
pub fn mark_wrapped_modules(graph: &mut BundleGraph, bundle: &str) -> Result<FxIndexSet<ModuleId>> {
    let members = graph.bundle(bundle)?.modules.clone();
    let reached = {
        let dependencies = graph.dependency_graph(graph.bundle(bundle)?);
        let roots = wrap_roots(graph, &dependencies);
        propagate(&dependencies, roots)
    };
    let wrapped: FxIndexSet<ModuleId> = members
        .iter()
        .filter(|id| reached.contains(*id))
        .cloned()
        .collect();

    for id in &wrapped {
        graph.try_module_mut(id)?.flags.should_wrap = true;
    }
    debug!(
        "Bundle {bundle}: {} of {} modules wrapped",
        wrapped.len(),
        members.len()
    );
    Ok(wrapped)
}
