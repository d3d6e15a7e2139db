//! Visitor for detecting side effects in JavaScript statements
//!
//! The analysis is deliberately conservative: anything that may call user
//! code (calls, property reads through getters, iteration, assignments to
//! something other than the module's own exports object) counts as an effect.

use swc_ecma_ast::{
    AssignExpr, AssignOp, Class, ClassMember, Decl, DefaultDecl, Expr, ExprOrSpread, Key,
    ModuleDecl, ModuleItem, Pat, Prop, PropName, PropOrSpread, Stmt, UnaryExpr, UnaryOp,
};
use swc_ecma_visit::{Visit, VisitWith};

use crate::{
    ast_util::{as_static_member, callee_expr, is_ident_named},
    runtime,
};

/// Visitor for detecting side effects in a module body
#[derive(Debug)]
pub struct SideEffectDetector<'e> {
    /// Writes to `<exports_ident>.name` are the module's export surface, not effects
    exports_ident: Option<&'e str>,
    has_side_effects: bool,
}

/// Simple expression visitor for checking side effects in a single expression
#[derive(Debug, Default)]
pub struct ExpressionSideEffectDetector {
    has_side_effects: bool,
}

impl<'e> SideEffectDetector<'e> {
    pub const fn new(exports_ident: Option<&'e str>) -> Self {
        Self {
            exports_ident,
            has_side_effects: false,
        }
    }

    /// Whether evaluating the top level of `body` has observable effects
    pub fn check_module(body: &[ModuleItem], exports_ident: Option<&str>) -> bool {
        let mut detector = SideEffectDetector::new(exports_ident);
        for item in body {
            detector.check_item(item);
            if detector.has_side_effects {
                break;
            }
        }
        detector.has_side_effects
    }

    fn is_exports_object(&self, expr: &Expr) -> bool {
        self.exports_ident
            .is_some_and(|exports_ident| is_ident_named(expr, exports_ident))
    }

    /// `exports.name = value` or `$hoist$export(exports, "name", getter)`;
    /// yields the part still evaluated eagerly
    fn export_definition<'a>(&self, expr: &'a Expr) -> Option<Option<&'a Expr>> {
        if let Expr::Assign(AssignExpr {
            op: AssignOp::Assign,
            left,
            right,
            ..
        }) = expr
        {
            let target = left.as_simple()?.as_member()?;
            return self.is_exports_object(&target.obj).then_some(Some(right.as_ref()));
        }
        let (dest, _, getter) = runtime::as_export_call(expr)?;
        (self.is_exports_object(dest) && matches!(getter, Expr::Fn(_) | Expr::Arrow(_)))
            .then_some(None)
    }

    fn check_expr(&mut self, expr: &Expr) {
        if ExpressionSideEffectDetector::check(expr) {
            self.has_side_effects = true;
        }
    }

    fn check_item(&mut self, item: &ModuleItem) {
        match item {
            ModuleItem::Stmt(stmt) => self.check_stmt(stmt),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export) => self.check_decl(&export.decl),
                ModuleDecl::ExportNamed(export) if export.src.is_none() => {}
                ModuleDecl::ExportDefaultDecl(export) => match &export.decl {
                    DefaultDecl::Class(class) => {
                        if class_has_side_effects(&class.class) {
                            self.has_side_effects = true;
                        }
                    }
                    DefaultDecl::Fn(_) | DefaultDecl::TsInterfaceDecl(_) => {}
                },
                ModuleDecl::ExportDefaultExpr(export) => self.check_expr(&export.expr),
                // Imports and re-exports evaluate another module
                _ => self.has_side_effects = true,
            },
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty(_) => {}
            Stmt::Decl(decl) => self.check_decl(decl),
            Stmt::Expr(stmt) => match self.export_definition(&stmt.expr) {
                Some(Some(value)) => self.check_expr(value),
                Some(None) => {}
                None => self.check_expr(&stmt.expr),
            },
            // Control flow and everything else
            _ => self.has_side_effects = true,
        }
    }

    fn check_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Fn(_) => {}
            Decl::Var(decl) => {
                for declarator in &decl.decls {
                    let Some(init) = &declarator.init else {
                        continue;
                    };
                    // Destructuring runs getters and iterators
                    if !matches!(declarator.name, Pat::Ident(_)) {
                        self.has_side_effects = true;
                        return;
                    }
                    self.check_expr(init);
                }
            }
            Decl::Class(class) => {
                if class_has_side_effects(&class.class) {
                    self.has_side_effects = true;
                }
            }
            Decl::Using(_) => self.has_side_effects = true,
            _ => {}
        }
    }
}

impl ExpressionSideEffectDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an expression has side effects
    pub fn check(expr: &Expr) -> bool {
        let mut detector = Self::new();
        detector.visit_expr(expr);
        detector.has_side_effects
    }

    /// Convenience inverse of [`Self::check`]
    pub fn is_pure(expr: &Expr) -> bool {
        !Self::check(expr)
    }
}

pub(crate) fn class_has_side_effects(class: &Class) -> bool {
    if !class.decorators.is_empty()
        || class
            .super_class
            .as_deref()
            .is_some_and(ExpressionSideEffectDetector::check)
    {
        return true;
    }
    class.body.iter().any(|member| match member {
        ClassMember::Method(method) => prop_name_has_side_effects(&method.key),
        ClassMember::ClassProp(prop) => {
            prop_name_has_side_effects(&prop.key)
                || (prop.is_static
                    && prop
                        .value
                        .as_deref()
                        .is_some_and(ExpressionSideEffectDetector::check))
        }
        ClassMember::PrivateProp(prop) => {
            prop.is_static
                && prop
                    .value
                    .as_deref()
                    .is_some_and(ExpressionSideEffectDetector::check)
        }
        ClassMember::AutoAccessor(accessor) => {
            matches!(&accessor.key, Key::Public(key) if prop_name_has_side_effects(key))
                || (accessor.is_static
                    && accessor
                        .value
                        .as_deref()
                        .is_some_and(ExpressionSideEffectDetector::check))
        }
        ClassMember::StaticBlock(_) => true,
        _ => false,
    })
}

fn prop_name_has_side_effects(key: &PropName) -> bool {
    match key {
        PropName::Computed(computed) => ExpressionSideEffectDetector::check(&computed.expr),
        _ => false,
    }
}

impl Visit for ExpressionSideEffectDetector {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.has_side_effects {
            return;
        }

        match expr {
            // Creating a closure never runs its body
            Expr::Fn(_) | Expr::Arrow(_) | Expr::Ident(_) | Expr::Lit(_) | Expr::This(_) => {}
            Expr::Class(class) => {
                if class_has_side_effects(&class.class) {
                    self.has_side_effects = true;
                }
            }
            // The interop helper only reads its argument
            Expr::Call(call)
                if callee_expr(call)
                    .is_some_and(|callee| is_ident_named(callee, runtime::INTEROP_DEFAULT)) =>
            {
                call.args.visit_with(self);
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Prop(prop) => match prop.as_ref() {
                            Prop::Shorthand(_) => {}
                            Prop::KeyValue(prop) => {
                                if prop_name_has_side_effects(&prop.key) {
                                    self.has_side_effects = true;
                                }
                                self.visit_expr(&prop.value);
                            }
                            Prop::Method(method) => {
                                if prop_name_has_side_effects(&method.key) {
                                    self.has_side_effects = true;
                                }
                            }
                            Prop::Getter(getter) => {
                                if prop_name_has_side_effects(&getter.key) {
                                    self.has_side_effects = true;
                                }
                            }
                            Prop::Setter(setter) => {
                                if prop_name_has_side_effects(&setter.key) {
                                    self.has_side_effects = true;
                                }
                            }
                            Prop::Assign(_) => self.has_side_effects = true,
                        },
                        PropOrSpread::Spread(_) => self.has_side_effects = true,
                    }
                }
            }
            Expr::Unary(UnaryExpr {
                op: UnaryOp::Delete,
                ..
            }) => self.has_side_effects = true,
            Expr::Array(_)
            | Expr::Unary(_)
            | Expr::Bin(_)
            | Expr::Cond(_)
            | Expr::Seq(_)
            | Expr::Paren(_)
            | Expr::Tpl(_)
            | Expr::MetaProp(_) => expr.visit_children_with(self),
            // Calls, constructions, assignments, property reads, iteration
            _ => self.has_side_effects = true,
        }
    }

    fn visit_expr_or_spread(&mut self, arg: &ExprOrSpread) {
        if arg.spread.is_some() {
            self.has_side_effects = true;
            return;
        }
        self.visit_expr(&arg.expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast_builder as b, parser::parse_source};

    fn is_pure(source: &str) -> bool {
        let body = parse_source("a.js", &format!("({source});")).expect("parses");
        let expr = crate::ast_util::as_expr_stmt(&body[0]).expect("expression");
        ExpressionSideEffectDetector::is_pure(expr)
    }

    #[test]
    fn test_no_side_effects_literals_and_closures() {
        assert!(is_pure("5"));
        assert!(is_pure("a + 'b'"));
        assert!(is_pure("function () { effect(); }"));
        assert!(is_pure("{ x: [1, null], y }"));
        assert!(is_pure("`a${b}c`"));
    }

    #[test]
    fn test_side_effects_calls_and_member_reads() {
        assert!(!is_pure("f()"));
        assert!(!is_pure("a.b"));
        assert!(!is_pure("a = 1"));
        assert!(!is_pure("[...items]"));
        assert!(!is_pure("delete a[0]"));
        assert!(!is_pure("class extends make() {}"));
        assert!(!is_pure("class { static { run(); } }"));
    }

    #[test]
    fn test_interop_call_on_pure_argument_is_pure() {
        let call = runtime::interop_default_call(b::ident("$a$exports"));
        assert!(ExpressionSideEffectDetector::is_pure(&call));
    }

    #[test]
    fn test_module_exports_writes_are_not_effects() {
        let body = parse_source(
            "a.js",
            "var $a$exports = {};\n\
             function $a$foo() {}\n\
             $a$exports.foo = $a$foo;\n\
             $hoist$export($a$exports, \"bar\", function () { return $a$foo; });",
        )
        .expect("parses");
        assert!(!SideEffectDetector::check_module(&body, Some("$a$exports")));
        assert!(SideEffectDetector::check_module(&body, None));
    }

    #[test]
    fn test_side_effects_control_flow() {
        let body = parse_source("a.js", "if (x) {}").expect("parses");
        assert!(SideEffectDetector::check_module(&body, None));
        let body = parse_source("a.js", "import './b';").expect("parses");
        assert!(SideEffectDetector::check_module(&body, None));
    }
}
