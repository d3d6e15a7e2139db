#![allow(dead_code)]

use std::process::Command;

use jshoist::{Bundle, BundleGraph, Config, Dependency, ModuleId, ModuleUnit, link_bundle};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One bundle whose `./<id>` specifiers resolve to the module named `<id>`
#[derive(Debug, Default)]
pub struct BundleBuilder {
    name: String,
    units: Vec<ModuleUnit>,
    entries: Vec<ModuleId>,
    external: Vec<ModuleId>,
}

impl BundleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn module(self, id: &str, source: &str, deps: &[&str]) -> Self {
        self.module_with(id, source, deps.iter().map(|dep| Dependency::new(*dep)).collect())
    }

    pub fn module_with(mut self, id: &str, source: &str, deps: Vec<Dependency>) -> Self {
        let mut unit = ModuleUnit::parse(ModuleId::new(id), format!("src/{id}.js"), source)
            .unwrap_or_else(|err| panic!("module {id} does not parse: {err:#}"));
        for dep in deps {
            unit.add_dependency(dep);
        }
        self.units.push(unit);
        self
    }

    pub fn entry(mut self, id: &str) -> Self {
        self.entries.push(ModuleId::new(id));
        self
    }

    pub fn externally_referenced(mut self, id: &str) -> Self {
        self.external.push(ModuleId::new(id));
        self
    }

    /// Add this bundle's modules and resolutions to `graph`
    pub fn add_to(self, graph: &mut BundleGraph) {
        let mut bundle = Bundle::new(self.name);
        let specifiers: Vec<(ModuleId, Vec<String>)> = self
            .units
            .iter()
            .map(|unit| (unit.id.clone(), unit.dependencies.keys().cloned().collect()))
            .collect();
        for unit in self.units {
            bundle = bundle.with_module(graph.add_module(unit));
        }
        for entry in self.entries {
            bundle = bundle.with_entry(entry);
        }
        for id in self.external {
            bundle = bundle.with_external_reference(id);
        }
        graph.add_bundle(bundle);

        let known: Vec<ModuleId> = graph.module_ids().cloned().collect();
        for (from, specifiers) in specifiers {
            for specifier in specifiers {
                let target = ModuleId::new(specifier.trim_start_matches("./"));
                if known.contains(&target) {
                    graph.add_resolution(&from, &specifier, &target);
                }
            }
        }
    }

    pub fn build(self) -> BundleGraph {
        let mut graph = BundleGraph::new();
        self.add_to(&mut graph);
        graph
    }
}

/// Link `bundle` with `config` and print it
pub fn link_source(graph: &mut BundleGraph, bundle: &str, config: &Config) -> String {
    link_bundle(graph, bundle, config)
        .expect("bundle links")
        .to_source()
}

/// Run a linked bundle with node and capture its output
///
/// Returns `None` when node is not installed.
pub fn run_with_node(source: &str) -> Option<String> {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = dir.path().join("bundle.cjs");
    std::fs::write(&path, source).expect("bundle written");

    let output = Command::new("node").arg(&path).output().ok()?;
    assert!(
        output.status.success(),
        "node failed on\n{source}\nSTDERR:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8(output.stdout).expect("node prints UTF-8"))
}
