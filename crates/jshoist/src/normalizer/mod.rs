//! Per-module normalization into canonical form
//!
//! The normalizer rewrites one module's source-level `import`/`export`,
//! `require` and `module.exports` syntax into the canonical form the linker
//! understands:
//! - every top-level binding is renamed to `$<id>$<name>`,
//! - references to other modules become canonical markers,
//! - the exports and imports tables and the module flags are filled in.
//!
//! Modules that cannot be flattened safely (direct `eval`, top-level
//! `return`, free uses of `module`) keep their body inside a private closure
//! instead; see [`self_wrap`].

mod analysis;
mod commonjs;
mod module_decls;
pub(crate) mod renamer;
mod self_wrap;

use log::{debug, trace};
use rustc_hash::FxHashMap;
use swc_ecma_ast::{AssignExpr, AssignOp, Decl, Expr, ModuleItem, Stmt, VarDeclKind};
use swc_ecma_visit::VisitMutWith;

use self::{
    analysis::ModuleAnalysis,
    module_decls::{Lowering, ModuleDeclLowering},
    renamer::Renamer,
};
use crate::{
    ast_builder as b,
    ast_util::{
        as_expr_stmt, as_static_member, is_ident_named, is_valid_identifier, member_prop_name,
    },
    module_unit::{ModuleId, ModuleUnit},
    types::FxIndexSet,
    visitors::{BindingUsage, SideEffectDetector},
};

/// `exports.NAME = value` or `module.exports.NAME = value` as a whole statement
///
/// `is_free` tells whether `exports`/`module` refer to the CommonJS free
/// variables rather than a local binding.
pub(crate) fn static_export_write(
    item: &ModuleItem,
    is_free: impl Fn(&str) -> bool,
) -> Option<(&str, &Expr)> {
    let Expr::Assign(AssignExpr {
        op: AssignOp::Assign,
        left,
        right,
        ..
    }) = as_expr_stmt(item)?
    else {
        return None;
    };
    let target = left.as_simple()?.as_member()?;
    let name = member_prop_name(&target.prop)?;
    let object = target.obj.as_ref();
    let is_exports_object = (is_ident_named(object, "exports") && is_free("exports"))
        || matches!(
            as_static_member(object),
            Some((module, "exports")) if is_ident_named(module, "module") && is_free("module")
        );
    (is_exports_object && is_valid_identifier(name)).then_some((name, right.as_ref()))
}

/// Normalize a module in place
///
/// Normalizing an already normalized unit is a no-op.
pub fn normalize(unit: &mut ModuleUnit) {
    if unit.flags.normalized {
        trace!("Module {} is already normalized", unit.id);
        return;
    }

    let body = std::mem::take(&mut unit.body);
    let analysis = ModuleAnalysis::analyze(&body);
    unit.flags.is_es_module = analysis.has_esm_syntax;

    unit.body = if analysis.requires_self_wrap() {
        debug!(
            "Module {} keeps a private scope (eval: {}, top-level return: {}, free module: {})",
            unit.id,
            analysis.uses_eval,
            analysis.has_top_level_return,
            analysis.unsafe_module_use
        );
        self_wrap::wrap(unit, body, &analysis)
    } else {
        hoist(unit, body, &analysis)
    };

    if !unit.flags.side_effect_free {
        let exports_ident = unit.id.exports_ident();
        unit.flags.side_effect_free =
            !SideEffectDetector::check_module(&unit.body, Some(&exports_ident));
    }
    unit.flags.normalized = true;

    debug!(
        "Normalized {}: {} exports, {} imports, {} wildcard sources, commonjs: {}, esm: {}",
        unit.id,
        unit.exports.len(),
        unit.imports.len(),
        unit.wildcard_sources.len(),
        unit.flags.is_common_js,
        unit.flags.is_es_module
    );
}

/// Top-level renames; names already carrying the prefix are left alone
fn rename_map(id: &ModuleId, top_level: &FxIndexSet<String>) -> FxHashMap<String, String> {
    top_level
        .iter()
        .filter(|name| !id.is_prefixed(name))
        .map(|name| (name.clone(), id.prefixed(name)))
        .collect()
}

/// Flatten a module into the shared scope
fn hoist(
    unit: &mut ModuleUnit,
    body: Vec<ModuleItem>,
    analysis: &ModuleAnalysis,
) -> Vec<ModuleItem> {
    let renames = rename_map(&unit.id, &analysis.top_level);

    let lowered = ModuleDeclLowering::new(&unit.id, Lowering::Hoisted, &renames).lower(body);
    let body = lowered.apply_to(unit);
    let mut body = commonjs::rewrite_hoisted(unit, body, analysis, &renames);

    body.visit_mut_with(&mut Renamer::new(&renames));

    // Cyclic readers see `undefined` instead of hitting the TDZ
    for item in &mut body {
        if let ModuleItem::Stmt(Stmt::Decl(Decl::Var(decl))) = item
            && matches!(decl.kind, VarDeclKind::Let | VarDeclKind::Const)
        {
            decl.kind = VarDeclKind::Var;
        }
    }

    let exports_ident = unit.id.exports_ident();
    let is_hybrid = analysis.has_esm_syntax && analysis.uses_common_js;
    if is_hybrid {
        body.push(
            b::expr_stmt(b::assign_member(
                b::ident(&exports_ident),
                "__esModule",
                b::boolean(true),
            ))
            .into(),
        );
    }
    if BindingUsage::collect(&body).free.contains(&exports_ident) {
        body.insert(0, b::var_stmt(&exports_ident, b::object(Vec::new())).into());
        unit.flags.has_exports_identifier = true;
    }

    unit.flags.is_common_js = analysis.uses_common_js || !analysis.has_esm_syntax;
    body
}
