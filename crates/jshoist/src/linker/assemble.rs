//! Final layout of a linked bundle

use rustc_hash::FxHashSet;
use swc_ecma_ast::{Decl, Expr, ModuleItem, Pat, Stmt};

use super::LinkOutput;
use crate::{
    ast_builder as b,
    error::Result,
    graph::{Bundle, BundleGraph},
    module_unit::{ModuleId, ModuleUnit},
    output_format::NamedExports,
    resolver::{Resolution, SymbolResolver},
    runtime::{self, Helper},
    types::FxIndexSet,
    visitors::BindingUsage,
};

/// What the bundle exposes: registry entries and entry exports
#[derive(Debug, Default)]
pub(super) struct ExportSurface {
    bundle_exports: Vec<(ModuleId, Expr)>,
    main_exports: Vec<(ModuleId, Expr, Option<NamedExports>)>,
    roots: FxHashSet<String>,
}

impl ExportSurface {
    /// Resolve the exported surface up front so the exports objects it needs
    /// are declared by the modules that own them
    ///
    /// Entry exports only count when the output format publishes them.
    pub(super) fn resolve(resolver: &mut SymbolResolver<'_>) -> Result<Self> {
        let bundle = resolver.bundle();
        let publishes_entries = resolver.format().publishes_main_export();
        let mut surface = Self::default();

        for id in bundle
            .externally_referenced
            .iter()
            .filter(|id| bundle.contains(id))
        {
            let exports = resolver.exports_of(id);
            surface.add_root(&exports);
            surface.bundle_exports.push((id.clone(), resolver.expr(&exports)));
        }

        for entry in bundle.entries.iter().filter(|_| publishes_entries) {
            let exports = resolver.exports_of(entry);
            surface.add_root(&exports);
            let named = match resolver.static_export_names(entry, &mut FxHashSet::default()) {
                Some(mut names) => {
                    let unit = resolver.graph().try_module(entry)?;
                    if unit.exports.contains_key("default") {
                        names.insert("default".to_string());
                    }
                    let mut named = Vec::with_capacity(names.len());
                    for name in names {
                        let resolution = resolver.resolve_export(entry, &name, entry)?;
                        surface.add_root(&resolution);
                        named.push((name, resolver.expr(&resolution)));
                    }
                    Some(named)
                }
                None => None,
            };
            let exports = resolver.expr(&exports);
            surface.main_exports.push((entry.clone(), exports, named));
        }
        Ok(surface)
    }

    fn add_root(&mut self, resolution: &Resolution) {
        if let Some(binding) = resolution.as_binding() {
            self.roots.insert(binding.to_string());
        }
    }
}

/// Lay out the rewritten members
///
/// Order: sibling bundle imports, runtime prelude, wrapped-module state,
/// member bodies in bundle order, wrapped entry evaluation, registry
/// exports, entry exports.
pub(super) fn assemble(
    resolver: SymbolResolver<'_>,
    modules: Vec<(&ModuleUnit, Vec<ModuleItem>)>,
    surface: ExportSurface,
    inject_helpers: bool,
) -> LinkOutput {
    let graph = resolver.graph();
    let bundle = resolver.bundle();
    let format = resolver.format();
    let mut state = resolver.into_state();
    let interop_wrappers = state.interop_wrappers();

    let mut wrapped_state = Vec::new();
    let mut bodies = Vec::new();
    let mut wrapped_modules = 0;
    for (unit, body) in modules {
        let id = &unit.id;
        let mut prologue: Vec<ModuleItem> = state
            .interop_by_pair
            .swap_remove(id)
            .into_iter()
            .flatten()
            .map(|(binding, value)| b::var_stmt(&binding, value).into())
            .collect();

        if unit.flags.should_wrap {
            wrapped_modules += 1;
            wrapped_state.push(b::var_stmt(&id.executed_ident(), b::boolean(false)).into());
            wrapped_state.push(b::var_stmt(&id.exports_ident(), b::object(Vec::new())).into());
            bodies.push(init_function(id, prologue, body).into());
            continue;
        }

        if state.demanded_exports.contains(id) && !unit.flags.has_exports_identifier {
            prologue.insert(
                0,
                b::var_stmt(&id.exports_ident(), b::object(Vec::new())).into(),
            );
        }
        bodies.extend(prologue);
        bodies.extend(body);
        if let Some((binding, value)) = state.interop_by_source.get(id) {
            bodies.push(b::var_stmt(binding, value.clone()).into());
        }
    }

    for entry in bundle.entries.iter().filter(|entry| {
        graph
            .module(entry)
            .is_some_and(|unit| unit.flags.should_wrap)
    }) {
        bodies.push(b::expr_stmt(b::call_ident(&entry.init_ident(), Vec::new())).into());
    }

    bodies.extend(format.generate_bundle_exports(surface.bundle_exports));
    for (entry, exports, named) in surface.main_exports {
        bodies.extend(format.generate_main_export(&entry, exports, named));
    }

    let mut program =
        format.generate_bundle_imports(&sibling_bundles(graph, bundle, &state.external_modules));

    let mut helpers = std::mem::take(&mut state.helpers);
    wrapped_state.extend(bodies);
    if BindingUsage::collect(&wrapped_state)
        .free
        .contains(runtime::REGISTRY)
    {
        helpers.insert(Helper::Registry);
    }
    if inject_helpers {
        program.extend(runtime::prelude(&helpers));
    }
    program.extend(wrapped_state);

    LinkOutput {
        body: program,
        wrapped_modules,
        interop_wrappers,
        helpers,
        roots: surface.roots,
    }
}

/// Bundles holding the modules reached through the registry
fn sibling_bundles<'g>(
    graph: &'g BundleGraph,
    current: &Bundle,
    external: &FxIndexSet<ModuleId>,
) -> Vec<&'g Bundle> {
    let mut seen = FxHashSet::default();
    external
        .iter()
        .filter_map(|id| graph.bundle_of(id))
        .filter(|bundle| bundle.name != current.name && seen.insert(bundle.name.clone()))
        .collect()
}

/// `function $id$init() { ... }`, evaluating the module body once
///
/// Wrapped bodies hold statements only; lowering removed their module
/// declarations.
fn init_function(id: &ModuleId, prologue: Vec<ModuleItem>, body: Vec<ModuleItem>) -> Stmt {
    let exports = id.exports_ident();
    let executed = id.executed_ident();
    let mut stmts = vec![
        b::if_stmt(
            b::ident(&executed),
            vec![b::return_stmt(Some(b::ident(&exports)))],
            None,
        ),
        b::expr_stmt(b::assign_ident(&executed, b::boolean(true))),
    ];
    stmts.extend(
        prologue
            .into_iter()
            .chain(body)
            .filter_map(|item| match item {
                ModuleItem::Stmt(stmt) => Some(stmt),
                ModuleItem::ModuleDecl(_) => None,
            })
            .filter(|stmt| !declares_empty_exports(stmt, &exports)),
    );
    stmts.push(b::return_stmt(Some(b::ident(&exports))));
    b::function_decl(&id.init_ident(), &[], stmts)
}

/// `var <exports> = {}`; the wrapper state already declares it
fn declares_empty_exports(stmt: &Stmt, exports: &str) -> bool {
    let Stmt::Decl(Decl::Var(decl)) = stmt else {
        return false;
    };
    matches!(
        decl.decls.as_slice(),
        [declarator] if matches!(&declarator.name, Pat::Ident(name) if name.id.sym == *exports)
            && matches!(declarator.init.as_deref(), Some(Expr::Object(object)) if object.props.is_empty())
    )
}
