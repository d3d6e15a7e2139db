//! Removal of unused top-level bindings from a linked bundle
//!
//! A binding is dead when its initializer is pure and every remaining
//! reference only feeds an exports object nobody reads: `X.name = value`
//! statements, `$hoist$export(X, name, getter)` definitions and
//! `$hoist$exportWildcard(X, source)` calls. Dropping a dead exports object
//! frees the bindings it exported, so the pass repeats until nothing changes.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::{AssignExpr, AssignOp, Decl, Expr, ModuleItem, Pat, Stmt};

use crate::{
    ast_builder as b,
    ast_util::{as_expr_stmt, as_ident, as_ident_call, plain_args},
    runtime,
    visitors::{BindingUsage, ExpressionSideEffectDetector, class_has_side_effects},
};

/// Remove dead bindings from `body`, never touching `roots`
///
/// Returns the number of bindings removed.
pub fn eliminate_dead_exports(body: &mut Vec<ModuleItem>, roots: &FxHashSet<String>) -> usize {
    let mut removed = 0;
    loop {
        let dead = dead_bindings(body, roots);
        if dead.is_empty() {
            break;
        }
        trace!("Removing dead bindings: {dead:?}");
        removed += dead.len();
        remove_bindings(body, &dead);
    }
    debug!("Dead export elimination removed {removed} bindings");
    removed
}

fn dead_bindings(body: &[ModuleItem], roots: &FxHashSet<String>) -> FxHashSet<String> {
    let usage = BindingUsage::collect(body);
    let mut sinks: FxHashMap<&str, usize> = FxHashMap::default();
    for item in body {
        if let Some(sink) = export_sink(item) {
            *sinks.entry(sink.object).or_default() += 1;
        }
    }

    let is_dead = |name: &str| {
        !roots.contains(name)
            && usage.declarations.get(name).copied().unwrap_or(0) == 1
            && usage.references(name) == sinks.get(name).copied().unwrap_or(0)
    };

    let mut dead = FxHashSet::default();
    for item in body {
        let ModuleItem::Stmt(Stmt::Decl(decl)) = item else {
            continue;
        };
        match decl {
            Decl::Var(decl) => {
                for declarator in &decl.decls {
                    if let Pat::Ident(name) = &declarator.name
                        && declarator
                            .init
                            .as_deref()
                            .is_none_or(ExpressionSideEffectDetector::is_pure)
                        && is_dead(&name.id.sym)
                    {
                        dead.insert(name.id.sym.to_string());
                    }
                }
            }
            Decl::Fn(func) => {
                if is_dead(&func.ident.sym) {
                    dead.insert(func.ident.sym.to_string());
                }
            }
            Decl::Class(class) => {
                if !class_has_side_effects(&class.class) && is_dead(&class.ident.sym) {
                    dead.insert(class.ident.sym.to_string());
                }
            }
            _ => {}
        }
    }
    dead
}

/// A top-level statement whose only use of `object` is to fill it
#[derive(Debug)]
struct ExportSink<'a> {
    object: &'a str,
    /// What still has to run if the statement goes away
    value: &'a Expr,
}

fn export_sink(item: &ModuleItem) -> Option<ExportSink<'_>> {
    let expr = as_expr_stmt(item)?;
    if let Expr::Assign(AssignExpr {
        op: AssignOp::Assign,
        left,
        right,
        ..
    }) = expr
    {
        let target = left.as_simple()?.as_member()?;
        return Some(ExportSink {
            object: as_ident(&target.obj)?,
            value: right,
        });
    }
    if let Some((destination, _, getter)) = runtime::as_export_call(expr) {
        return Some(ExportSink {
            object: as_ident(destination)?,
            value: getter,
        });
    }
    let (callee, args) = as_ident_call(expr)?;
    if callee != runtime::EXPORT_WILDCARD {
        return None;
    }
    let args = plain_args(args)?;
    let [destination, source] = args.as_slice() else {
        return None;
    };
    Some(ExportSink {
        object: as_ident(destination)?,
        value: source,
    })
}

fn remove_bindings(body: &mut Vec<ModuleItem>, dead: &FxHashSet<String>) {
    let items = std::mem::take(body);
    for item in items {
        if let Some(sink) = export_sink(&item)
            && dead.contains(sink.object)
        {
            if !ExpressionSideEffectDetector::is_pure(sink.value) {
                body.push(b::expr_stmt(sink.value.clone()).into());
            }
            continue;
        }
        match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(mut decl))) => {
                decl.decls.retain(|declarator| {
                    !matches!(&declarator.name, Pat::Ident(name) if dead.contains(name.id.sym.as_str()))
                });
                if !decl.decls.is_empty() {
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(decl))));
                }
            }
            ModuleItem::Stmt(Stmt::Decl(Decl::Fn(ref func)))
                if dead.contains(func.ident.sym.as_str()) => {}
            ModuleItem::Stmt(Stmt::Decl(Decl::Class(ref class)))
                if dead.contains(class.ident.sym.as_str()) => {}
            item => body.push(item),
        }
    }
}
