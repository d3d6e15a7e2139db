//! Bundle graph consumed by the linker
//!
//! Module-graph construction and dependency resolution happen upstream; this
//! graph only records their results:
//! - the compiled module units,
//! - which module each `(module, specifier)` pair resolved to,
//! - which modules each output bundle contains, in emission order.
//!
//! Within one bundle the module-level edges are materialized as a petgraph
//! graph for the wrap decision and cycle detection.

use log::debug;
use petgraph::{
    Direction,
    algo::is_cyclic_directed,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use rustc_hash::FxHashMap;

use crate::{
    error::{LinkError, Result},
    module_unit::{ModuleId, ModuleUnit},
    types::{FxIndexMap, FxIndexSet},
};

/// An ordered set of modules emitted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// File name, used by formats that load sibling bundles
    pub name: String,
    /// Members in emission order
    pub modules: Vec<ModuleId>,
    pub entries: Vec<ModuleId>,
    /// Members whose exports are requested from other bundles
    pub externally_referenced: FxIndexSet<ModuleId>,
}

impl Bundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            entries: Vec::new(),
            externally_referenced: FxIndexSet::default(),
        }
    }

    #[must_use]
    pub fn with_module(mut self, id: ModuleId) -> Self {
        if !self.modules.contains(&id) {
            self.modules.push(id);
        }
        self
    }

    /// Add a member that is also an entry point
    #[must_use]
    pub fn with_entry(mut self, id: ModuleId) -> Self {
        self = self.with_module(id.clone());
        if !self.entries.contains(&id) {
            self.entries.push(id);
        }
        self
    }

    #[must_use]
    pub fn with_external_reference(mut self, id: ModuleId) -> Self {
        self.externally_referenced.insert(id);
        self
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }
}

/// Annotation of a module-level edge inside one bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeInfo {
    pub must_wrap: bool,
    pub is_dynamic: bool,
}

/// Module-level dependency graph of one bundle
#[derive(Debug)]
pub struct ModuleDependencyGraph {
    pub graph: DiGraph<ModuleId, EdgeInfo>,
    pub node_indices: FxHashMap<ModuleId, NodeIndex>,
}

impl ModuleDependencyGraph {
    pub fn node(&self, id: &ModuleId) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    /// Modules depending on `id`, with the annotation of each edge
    pub fn dependents(&self, id: &ModuleId) -> Vec<(&ModuleId, EdgeInfo)> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| (&self.graph[edge.source()], *edge.weight()))
            .collect()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }
}

#[derive(Debug, Default)]
pub struct BundleGraph {
    modules: FxIndexMap<ModuleId, ModuleUnit>,
    resolutions: FxHashMap<(ModuleId, String), ModuleId>,
    bundles: FxIndexMap<String, Bundle>,
}

impl BundleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, unit: ModuleUnit) -> ModuleId {
        let id = unit.id.clone();
        self.modules.insert(id.clone(), unit);
        id
    }

    pub fn module(&self, id: &ModuleId) -> Option<&ModuleUnit> {
        self.modules.get(id)
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleUnit> {
        self.modules.get_mut(id)
    }

    pub fn try_module(&self, id: &ModuleId) -> Result<&ModuleUnit> {
        self.modules
            .get(id)
            .ok_or_else(|| LinkError::UnknownModule(id.clone()))
    }

    pub fn try_module_mut(&mut self, id: &ModuleId) -> Result<&mut ModuleUnit> {
        self.modules
            .get_mut(id)
            .ok_or_else(|| LinkError::UnknownModule(id.clone()))
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Record that `specifier` in `from` resolved to `target`
    pub fn add_resolution(&mut self, from: &ModuleId, specifier: &str, target: &ModuleId) {
        self.resolutions
            .insert((from.clone(), specifier.to_string()), target.clone());
    }

    pub fn resolved_target(&self, from: &ModuleId, specifier: &str) -> Option<&ModuleId> {
        self.resolutions
            .get(&(from.clone(), specifier.to_string()))
            .filter(|target| self.modules.contains_key(*target))
    }

    pub fn add_bundle(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.name.clone(), bundle);
    }

    pub fn bundle(&self, name: &str) -> Result<&Bundle> {
        self.bundles
            .get(name)
            .ok_or_else(|| LinkError::UnknownBundle(name.to_string()))
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.values()
    }

    /// The first bundle containing `id`
    pub fn bundle_of(&self, id: &ModuleId) -> Option<&Bundle> {
        self.bundles.values().find(|bundle| bundle.contains(id))
    }

    /// Build the module-level dependency graph restricted to one bundle
    pub fn dependency_graph(&self, bundle: &Bundle) -> ModuleDependencyGraph {
        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();
        for id in &bundle.modules {
            node_indices.insert(id.clone(), graph.add_node(id.clone()));
        }

        for id in &bundle.modules {
            let Some(unit) = self.modules.get(id) else {
                continue;
            };
            for dependency in unit.dependencies.values() {
                let Some(target) = self.resolved_target(id, &dependency.specifier) else {
                    continue;
                };
                if let (Some(&from), Some(&to)) = (node_indices.get(id), node_indices.get(target))
                {
                    graph.add_edge(
                        from,
                        to,
                        EdgeInfo {
                            must_wrap: dependency.must_wrap,
                            is_dynamic: dependency.is_dynamic,
                        },
                    );
                }
            }
        }

        debug!(
            "Bundle {}: {} modules, {} internal edges",
            bundle.name,
            graph.node_count(),
            graph.edge_count()
        );
        ModuleDependencyGraph {
            graph,
            node_indices,
        }
    }
}
