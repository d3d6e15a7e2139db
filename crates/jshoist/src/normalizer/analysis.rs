//! Pre-normalization scan of a module body
//!
//! Collects everything the rewrite steps need to know up front: whether the
//! module must be wrapped, whether it uses CommonJS idioms, and whether its
//! `exports.NAME` writes are static enough to promote to bindings.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_ecma_ast::{
    ArrowExpr, AssignExpr, Class, Expr, Function, MemberProp, ModuleItem, Prop,
    SimpleAssignTarget, Stmt, UnaryExpr, UnaryOp,
};
use swc_ecma_visit::{Visit, VisitWith};

use super::static_export_write;
use crate::{
    ast_util::{as_ident, as_static_member, is_ident_named, member_prop_name},
    scope::{self, ScopeStack, track_scopes},
    types::FxIndexSet,
    visitors::BindingUsage,
};

#[derive(Debug, Default)]
pub(super) struct ModuleAnalysis {
    pub(super) has_esm_syntax: bool,
    /// A free `eval` reference anywhere in the module
    pub(super) uses_eval: bool,
    pub(super) has_top_level_return: bool,
    /// A free `module` used other than as `module.exports`, `.id`, `.hot` or `typeof`
    pub(super) unsafe_module_use: bool,
    /// Free `module` or `exports` references
    pub(super) uses_common_js: bool,
    pub(super) module_exports_reassigned: bool,
    /// `exports.NAME` written somewhere other than a top-level statement, a
    /// computed write, or the exports object escaping as a value
    pub(super) dynamic_export_writes: bool,
    /// Top-level `exports.NAME = value` statements per name
    pub(super) static_export_writes: FxHashMap<String, usize>,
    pub(super) uses_top_level_this: bool,
    pub(super) top_level: FxIndexSet<String>,
    /// Top-level bindings written after their declaration
    pub(super) reassigned: FxHashSet<String>,
}

impl ModuleAnalysis {
    pub(super) fn analyze(body: &[ModuleItem]) -> Self {
        let usage = BindingUsage::collect(body);
        let reassigned = usage
            .top_level
            .iter()
            .filter(|name| usage.is_reassigned(name))
            .cloned()
            .collect();

        let mut visitor = AnalysisVisitor {
            analysis: Self {
                top_level: usage.top_level,
                reassigned,
                ..Self::default()
            },
            scopes: ScopeStack::new(),
            this_depth: 0,
            body_depth: 0,
        };

        for item in body {
            if matches!(item, ModuleItem::ModuleDecl(_)) {
                visitor.analysis.has_esm_syntax = true;
            }
            let top_level = &visitor.analysis.top_level;
            let is_free = |name: &str| !top_level.contains(name);
            if let Some((name, value)) = static_export_write(item, is_free) {
                let name = name.to_string();
                *visitor
                    .analysis
                    .static_export_writes
                    .entry(name)
                    .or_default() += 1;
                visitor.analysis.uses_common_js = true;
                visitor.visit_expr(value);
                continue;
            }
            item.visit_with(&mut visitor);
        }

        visitor.analysis
    }

    /// The module needs the private-closure treatment
    pub(super) const fn requires_self_wrap(&self) -> bool {
        self.uses_eval || self.has_top_level_return || self.unsafe_module_use
    }

    /// `exports.NAME = value` statements may become bindings
    pub(super) const fn allows_export_promotion(&self) -> bool {
        !self.module_exports_reassigned && !self.dynamic_export_writes
    }
}

#[derive(Debug)]
struct AnalysisVisitor {
    analysis: ModuleAnalysis,
    scopes: ScopeStack,
    /// Functions and classes, which rebind `this`
    this_depth: usize,
    /// Functions and arrows, which own `return`
    body_depth: usize,
}

impl AnalysisVisitor {
    fn is_free(&self, name: &str) -> bool {
        !self.scopes.is_shadowed(name) && !self.analysis.top_level.contains(name)
    }

    fn is_free_ident(&self, expr: &Expr, name: &str) -> bool {
        is_ident_named(expr, name) && self.is_free(name)
    }

    /// `exports` or `module.exports`
    fn is_exports_object(&self, expr: &Expr) -> bool {
        if self.is_free_ident(expr, "exports") {
            return true;
        }
        matches!(
            as_static_member(expr),
            Some((object, "exports")) if self.is_free_ident(object, "module")
        )
    }

    /// A reference to a free variable other than the recognized idioms
    fn note_free(&mut self, name: &str) {
        if !self.is_free(name) {
            return;
        }
        match name {
            "eval" => self.analysis.uses_eval = true,
            "module" => {
                self.analysis.unsafe_module_use = true;
                self.analysis.uses_common_js = true;
            }
            "exports" => {
                // The exports object escapes as a value
                self.analysis.dynamic_export_writes = true;
                self.analysis.uses_common_js = true;
            }
            _ => {}
        }
    }

    fn visit_assignment(&mut self, assign: &AssignExpr) -> bool {
        let Some(SimpleAssignTarget::Member(target)) = assign.left.as_simple() else {
            return false;
        };

        if self.is_free_ident(&target.obj, "module")
            && member_prop_name(&target.prop) == Some("exports")
        {
            self.analysis.module_exports_reassigned = true;
            self.analysis.uses_common_js = true;
            self.visit_expr(&assign.right);
            return true;
        }
        if self.is_exports_object(&target.obj) {
            // Not a top-level statement, or not a static name
            self.analysis.dynamic_export_writes = true;
            self.analysis.uses_common_js = true;
            if let MemberProp::Computed(prop) = &target.prop {
                self.visit_expr(&prop.expr);
            }
            self.visit_expr(&assign.right);
            return true;
        }
        false
    }
}

impl Visit for AnalysisVisitor {
    track_scopes!(visit: constructor, fn_expr, class_expr, block_stmt, catch_clause, for_stmt,
        for_in_stmt, for_of_stmt, switch_stmt);

    fn visit_stmt(&mut self, stmt: &Stmt) {
        if matches!(stmt, Stmt::Return(_)) && self.body_depth == 0 {
            self.analysis.has_top_level_return = true;
        }
        stmt.visit_children_with(self);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::This(_) if self.this_depth == 0 => {
                self.analysis.uses_top_level_this = true;
            }
            Expr::Ident(ident) => self.note_free(&ident.sym),
            Expr::Unary(UnaryExpr {
                op: UnaryOp::TypeOf,
                arg,
                ..
            }) if ["module", "exports", "require"]
                .iter()
                .any(|name| self.is_free_ident(arg, name)) =>
            {
                if as_ident(arg) != Some("require") {
                    self.analysis.uses_common_js = true;
                }
            }
            Expr::Member(member)
                if self.is_free_ident(&member.obj, "module")
                    && matches!(member_prop_name(&member.prop), Some("exports" | "id" | "hot")) =>
            {
                self.analysis.uses_common_js = true;
                if member_prop_name(&member.prop) == Some("exports") {
                    // `module.exports` used as a value rather than `module.exports.NAME`
                    self.analysis.dynamic_export_writes = true;
                }
            }
            Expr::Member(member) if self.is_exports_object(&member.obj) => {
                self.analysis.uses_common_js = true;
                if let MemberProp::Computed(prop) = &member.prop {
                    self.visit_expr(&prop.expr);
                }
            }
            Expr::Assign(assign) => {
                if !self.visit_assignment(assign) {
                    assign.visit_children_with(self);
                }
            }
            _ => expr.visit_children_with(self),
        }
    }

    fn visit_prop(&mut self, prop: &Prop) {
        match prop {
            Prop::Shorthand(ident) => self.note_free(&ident.sym),
            _ => prop.visit_children_with(self),
        }
    }

    fn visit_simple_assign_target(&mut self, target: &SimpleAssignTarget) {
        match target {
            SimpleAssignTarget::Ident(binding) => self.note_free(&binding.id.sym),
            _ => target.visit_children_with(self),
        }
    }

    fn visit_function(&mut self, func: &Function) {
        self.this_depth += 1;
        self.body_depth += 1;
        self.scopes
            .push(scope::function_scope(&func.params, func.body.as_ref()));
        func.visit_children_with(self);
        self.scopes.pop();
        self.this_depth -= 1;
        self.body_depth -= 1;
    }

    fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
        self.body_depth += 1;
        self.scopes.push(scope::arrow_scope(arrow));
        arrow.visit_children_with(self);
        self.scopes.pop();
        self.body_depth -= 1;
    }

    fn visit_class(&mut self, class: &Class) {
        self.this_depth += 1;
        class.visit_children_with(self);
        self.this_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn analyze(source: &str) -> ModuleAnalysis {
        ModuleAnalysis::analyze(&parse_source("m.js", source).expect("parses"))
    }

    #[test]
    fn test_detects_wrap_triggers() {
        assert!(analyze("function f() { eval('1'); }").requires_self_wrap());
        assert!(analyze("return;").requires_self_wrap());
        assert!(!analyze("function f() { return; }").requires_self_wrap());
        assert!(!analyze("var f = () => { return 1; };").requires_self_wrap());
        assert!(analyze("use(module);").requires_self_wrap());
    }

    #[test]
    fn test_safe_module_uses_do_not_wrap() {
        let analysis = analyze("module.exports = 1;\ntypeof module;");
        assert!(!analysis.requires_self_wrap());
        assert!(analysis.uses_common_js);
        assert!(analysis.module_exports_reassigned);
        assert!(!analysis.allows_export_promotion());
    }

    #[test]
    fn test_local_module_binding_is_not_common_js() {
        let analysis = analyze("var module = {};\nuse(module);");
        assert!(!analysis.uses_common_js);
        assert!(!analysis.requires_self_wrap());
    }

    #[test]
    fn test_static_export_writes_are_counted() {
        let analysis = analyze("exports.a = 1;\nexports.a = 2;");
        assert_eq!(analysis.static_export_writes.get("a"), Some(&2));
        assert!(analysis.allows_export_promotion());
    }

    #[test]
    fn test_nested_export_write_disables_promotion() {
        assert!(!analyze("function f() { exports.late = 1; }").allows_export_promotion());
        assert!(!analyze("use({ exports });").allows_export_promotion());
    }

    #[test]
    fn test_module_syntax_and_top_level_this() {
        let analysis = analyze("import './a';\nthis.x = 1;");
        assert!(analysis.has_esm_syntax);
        assert!(analysis.uses_top_level_this);
    }
}
