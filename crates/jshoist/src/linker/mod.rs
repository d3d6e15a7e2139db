//! Linking of one normalized bundle into a single program
//!
//! Every member is rewritten against the shared [`SymbolResolver`]: imports
//! become the bindings they resolve to, markers become evaluation calls or
//! disappear, and namespace reads fold to direct references. The rewritten
//! bodies are then assembled in bundle order around the runtime prelude and
//! the output format's imports and exports.
//!
//! Bodies are cloned out of the graph, so the same graph can be linked again.

mod assemble;
mod rewrite;

use log::debug;
use rustc_hash::FxHashSet;
use swc_ecma_ast::{Expr, ModuleItem};
use swc_ecma_visit::{Visit, VisitWith};

use crate::{
    ast_util::as_ident_call,
    config::Config,
    error::{LinkError, Result},
    graph::BundleGraph,
    markers::Marker,
    module_unit::ModuleUnit,
    output_format::OutputFormat,
    resolver::SymbolResolver,
    runtime::{self, Helper},
    types::FxIndexSet,
};

use self::{assemble::ExportSurface, rewrite::ModuleRewriter};

/// A linked bundle before tree shaking and minification
#[derive(Debug)]
pub struct LinkOutput {
    pub body: Vec<ModuleItem>,
    pub wrapped_modules: usize,
    pub interop_wrappers: usize,
    pub helpers: FxIndexSet<Helper>,
    /// Bindings reachable from outside the bundle
    pub roots: FxHashSet<String>,
}

/// Link the members of `bundle_name` into one statement list
///
/// Members must be normalized and carry their final wrap decision.
pub fn link(
    graph: &BundleGraph,
    bundle_name: &str,
    format: &dyn OutputFormat,
    config: &Config,
) -> Result<LinkOutput> {
    let bundle = graph.bundle(bundle_name)?;
    let mut resolver = SymbolResolver::new(graph, bundle, format);

    let surface = ExportSurface::resolve(&mut resolver)?;

    let mut modules: Vec<(&ModuleUnit, Vec<ModuleItem>)> =
        Vec::with_capacity(bundle.modules.len());
    for id in &bundle.modules {
        let unit = graph.try_module(id)?;
        let body = ModuleRewriter::new(&mut resolver, unit).rewrite(unit.body.clone())?;
        let scan = BodyScan::scan(&body);
        if let Some(marker) = scan.leftover_marker {
            return Err(LinkError::MalformedMarker {
                marker,
                path: unit.path.clone(),
                reason: "marker survived linking".to_string(),
            });
        }
        if scan.defines_exports {
            resolver.state_mut().helpers.insert(Helper::Export);
        }
        modules.push((unit, body));
    }

    let output = assemble::assemble(resolver, modules, surface, config.inject_helpers);
    debug!(
        "Linked bundle {bundle_name}: {} statements, {} wrapped modules, {} interop wrappers",
        output.body.len(),
        output.wrapped_modules,
        output.interop_wrappers
    );
    Ok(output)
}

/// Runtime calls left in a rewritten body
#[derive(Debug, Default)]
struct BodyScan {
    leftover_marker: Option<String>,
    /// `$hoist$export` live definitions
    defines_exports: bool,
}

impl BodyScan {
    fn scan(body: &[ModuleItem]) -> Self {
        let mut scan = Self::default();
        body.visit_with(&mut scan);
        scan
    }
}

impl Visit for BodyScan {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.leftover_marker.is_some() {
            return;
        }
        if let Some((name, _)) = as_ident_call(expr) {
            if Marker::is_marker_name(name) {
                self.leftover_marker = Some(name.to_string());
                return;
            }
            if name == runtime::EXPORT {
                self.defines_exports = true;
            }
        }
        expr.visit_children_with(self);
    }
}
