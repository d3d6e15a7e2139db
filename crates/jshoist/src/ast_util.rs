//! Shape queries over `swc_ecma_ast` nodes shared by the passes

use once_cell::sync::Lazy;
use regex::Regex;
use swc_atoms::Atom;
use swc_common::DUMMY_SP;
use swc_ecma_ast::{
    AssignPat, CallExpr, Callee, Expr, ExprOrSpread, IdentName, KeyValuePatProp, KeyValueProp, Lit,
    MemberExpr, MemberProp, ModuleExportName, ModuleItem, ObjectPatProp, Pat, Prop, PropName,
    Stmt, Str,
};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

/// Whether `name` can be written as a plain JavaScript identifier
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Name of a plain identifier expression
pub fn as_ident(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.as_str()),
        _ => None,
    }
}

pub fn is_ident_named(expr: &Expr, name: &str) -> bool {
    as_ident(expr) == Some(name)
}

/// Value of a string literal
pub fn as_str_lit(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Lit(Lit::Str(value)) => value.value.as_atom().map(Atom::as_str),
        _ => None,
    }
}

/// Text of a string literal, with lone surrogates replaced
pub fn str_value(value: &Str) -> String {
    value.value.to_atom_lossy().to_string()
}

/// Property name of `obj.name` or `obj["name"]`
pub fn member_prop_name(prop: &MemberProp) -> Option<&str> {
    match prop {
        MemberProp::Ident(name) => Some(name.sym.as_str()),
        MemberProp::Computed(computed) => as_str_lit(&computed.expr),
        MemberProp::PrivateName(_) => None,
    }
}

/// Object and property name of a member access with a static property
pub fn as_static_member(expr: &Expr) -> Option<(&Expr, &str)> {
    match expr {
        Expr::Member(MemberExpr { obj, prop, .. }) => {
            member_prop_name(prop).map(|name| (obj.as_ref(), name))
        }
        _ => None,
    }
}

/// The callee expression of a plain call
pub fn callee_expr(call: &CallExpr) -> Option<&Expr> {
    match &call.callee {
        Callee::Expr(callee) => Some(callee),
        _ => None,
    }
}

/// Callee name and arguments of a call to a plain identifier
pub fn as_ident_call(expr: &Expr) -> Option<(&str, &[ExprOrSpread])> {
    match expr {
        Expr::Call(call) => {
            callee_expr(call).and_then(as_ident).map(|name| (name, call.args.as_slice()))
        }
        _ => None,
    }
}

/// Arguments of a call, when none of them is spread
pub fn plain_args(args: &[ExprOrSpread]) -> Option<Vec<&Expr>> {
    args.iter()
        .map(|arg| arg.spread.is_none().then_some(arg.expr.as_ref()))
        .collect()
}

/// Statically known name of an object key
pub fn prop_name_str(name: &PropName) -> Option<&str> {
    match name {
        PropName::Ident(name) => Some(name.sym.as_str()),
        PropName::Str(value) => value.value.as_atom().map(Atom::as_str),
        _ => None,
    }
}

/// `foo` of `export { x as foo }` or `export { x as "foo" }`
pub fn export_name(name: &ModuleExportName) -> String {
    name.atom().to_string()
}

/// Turn `{ name }` into `{ name: name }` so the value can be rewritten alone
pub fn expand_shorthand(prop: &mut Prop) {
    if let Prop::Shorthand(ident) = prop {
        let key = PropName::Ident(IdentName::new(ident.sym.clone(), ident.span));
        *prop = Prop::KeyValue(KeyValueProp {
            key,
            value: Box::new(Expr::Ident(ident.clone())),
        });
    }
}

/// Turn the pattern `{ name = init }` into `{ name: name = init }`
pub fn expand_assign_pat_prop(prop: &mut ObjectPatProp) {
    if let ObjectPatProp::Assign(assign) = prop {
        let key = PropName::Ident(IdentName::new(assign.key.id.sym.clone(), assign.key.id.span));
        let binding = Box::new(Pat::Ident(assign.key.clone()));
        let value = match assign.value.take() {
            Some(init) => Box::new(Pat::Assign(AssignPat {
                span: DUMMY_SP,
                left: binding,
                right: init,
            })),
            None => binding,
        };
        *prop = ObjectPatProp::KeyValue(KeyValuePatProp { key, value });
    }
}

pub fn as_stmt(item: &ModuleItem) -> Option<&Stmt> {
    match item {
        ModuleItem::Stmt(stmt) => Some(stmt),
        ModuleItem::ModuleDecl(_) => None,
    }
}

/// Expression of an expression statement
pub fn as_expr_stmt(item: &ModuleItem) -> Option<&Expr> {
    match as_stmt(item)? {
        Stmt::Expr(stmt) => Some(&stmt.expr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder as b;

    #[test]
    fn test_static_members_accept_string_keys() {
        let dotted = b::member(b::ident("a"), "x");
        let quoted = b::computed_member(b::ident("a"), b::string("x"));
        let dynamic = b::computed_member(b::ident("a"), b::ident("k"));
        assert_eq!(as_static_member(&dotted).map(|(_, name)| name), Some("x"));
        assert_eq!(as_static_member(&quoted).map(|(_, name)| name), Some("x"));
        assert!(as_static_member(&dynamic).is_none());
    }

    #[test]
    fn test_expanded_shorthands_keep_their_key() {
        let mut body = crate::parser::parse_source("a.js", "var { a = 1, b } = ({ c });")
            .expect("parses");
        let ModuleItem::Stmt(Stmt::Decl(swc_ecma_ast::Decl::Var(decl))) = &mut body[0] else {
            panic!("expected a declaration");
        };
        let Pat::Object(pattern) = &mut decl.decls[0].name else {
            panic!("expected an object pattern");
        };
        for prop in &mut pattern.props {
            expand_assign_pat_prop(prop);
        }
        let init = decl.decls[0].init.as_deref_mut().expect("initializer");
        let Expr::Paren(paren) = init else {
            panic!("expected parentheses");
        };
        let Expr::Object(object) = paren.expr.as_mut() else {
            panic!("expected an object");
        };
        for prop in &mut object.props {
            if let swc_ecma_ast::PropOrSpread::Prop(prop) = prop {
                expand_shorthand(prop);
            }
        }
        let code = crate::printer::print_program(&body);
        assert!(code.contains("a: a = 1"));
        assert!(code.contains("b: b"));
        assert!(code.contains("c: c"));
    }

    #[test]
    fn test_spread_arguments_are_not_plain() {
        let call = b::call_ident("f", vec![b::ident("a")]);
        let (name, args) = as_ident_call(&call).expect("identifier call");
        assert_eq!(name, "f");
        assert_eq!(plain_args(args).map(|args| args.len()), Some(1));

        let spread = vec![ExprOrSpread {
            spread: Some(swc_common::DUMMY_SP),
            expr: Box::new(b::ident("rest")),
        }];
        assert!(plain_args(&spread).is_none());
    }
}
