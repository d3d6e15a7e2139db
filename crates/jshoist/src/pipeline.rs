//! The full link pass over one bundle
//!
//! normalize every member, decide wrapping, link, then optionally remove
//! dead exports and mangle. Each run starts from the graph's module units;
//! a rebuild simply runs the pipeline again.

use anyhow::{Context, Result};
use log::{debug, info};
use swc_ecma_ast::ModuleItem;

use crate::{
    config::Config,
    dead_exports::eliminate_dead_exports,
    graph::BundleGraph,
    linker,
    mangler::mangle,
    normalizer::normalize,
    output_format::output_format_for,
    printer::{print_minified, print_program},
    wrap_decision::mark_wrapped_modules,
};

/// Counters describing one linked bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub modules: usize,
    pub wrapped_modules: usize,
    pub interop_wrappers: usize,
    /// Bindings removed by dead export elimination
    pub removed_bindings: usize,
    pub mangled_bindings: usize,
}

#[derive(Debug, Clone)]
pub struct LinkedBundle {
    pub name: String,
    pub body: Vec<ModuleItem>,
    pub stats: LinkStats,
}

impl LinkedBundle {
    /// Render the bundle as JavaScript source
    pub fn to_source(&self) -> String {
        print_program(&self.body)
    }

    /// Render the bundle without insignificant whitespace
    pub fn to_minified_source(&self) -> String {
        print_minified(&self.body)
    }
}

/// Link the bundle named `bundle` according to `config`
pub fn link_bundle(graph: &mut BundleGraph, bundle: &str, config: &Config) -> Result<LinkedBundle> {
    let members = graph
        .bundle(bundle)
        .with_context(|| format!("Failed to link bundle {bundle}"))?
        .modules
        .clone();

    for id in &members {
        let unit = graph
            .try_module_mut(id)
            .with_context(|| format!("Bundle {bundle} lists an unknown module"))?;
        normalize(unit);
    }

    mark_wrapped_modules(graph, bundle)
        .with_context(|| format!("Failed to decide wrapped modules of {bundle}"))?;

    let format = output_format_for(config);
    let linked = linker::link(graph, bundle, format.as_ref(), config)
        .with_context(|| format!("Failed to link bundle {bundle}"))?;

    let mut body = linked.body;
    let removed_bindings = if config.tree_shake {
        eliminate_dead_exports(&mut body, &linked.roots)
    } else {
        0
    };
    let mangled_bindings = if config.minify { mangle(&mut body) } else { 0 };

    let stats = LinkStats {
        modules: members.len(),
        wrapped_modules: linked.wrapped_modules,
        interop_wrappers: linked.interop_wrappers,
        removed_bindings,
        mangled_bindings,
    };
    debug!("Bundle {bundle} stats: {stats:?}");
    info!(
        "Linked {bundle}: {} modules, {} wrapped",
        stats.modules, stats.wrapped_modules
    );

    Ok(LinkedBundle {
        name: bundle.to_string(),
        body,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        error::LinkError,
        graph::Bundle,
        module_unit::{ModuleId, ModuleUnit},
    };

    #[test]
    fn test_unknown_bundle_keeps_link_error() {
        let mut graph = BundleGraph::new();
        let err = link_bundle(&mut graph, "missing.js", &Config::default())
            .expect_err("bundle is unknown");
        assert_eq!(
            err.downcast_ref::<LinkError>(),
            Some(&LinkError::UnknownBundle("missing.js".to_string()))
        );
    }

    #[test]
    fn test_stats_count_pipeline_work() {
        let mut graph = BundleGraph::new();
        let unit = ModuleUnit::parse(
            ModuleId::new("a"),
            "a.js",
            "export const unused = 5;\nrun();",
        )
        .expect("parses");
        let id = graph.add_module(unit);
        graph.add_bundle(Bundle::new("main.js").with_module(id));

        let config = Config {
            minify: true,
            ..Config::default()
        };
        let linked = link_bundle(&mut graph, "main.js", &config).expect("links");
        assert_eq!(linked.stats.modules, 1);
        assert_eq!(linked.stats.wrapped_modules, 0);
        // The exports object, its one binding and the unused export helper
        assert_eq!(linked.stats.removed_bindings, 3);
        assert_eq!(linked.to_source(), "run();\n");
        assert!(linked.to_minified_source().starts_with("run()"));
    }
}
