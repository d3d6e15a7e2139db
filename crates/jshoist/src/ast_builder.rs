//! AST builder module for creating synthetic AST nodes
//!
//! This module provides factory functions for creating nodes that don't
//! originate from source files: the canonical markers, wrapper functions,
//! export definitions and runtime calls the passes insert. Every node gets
//! `DUMMY_SP` and an empty syntax context.

use swc_common::{DUMMY_SP, SyntaxContext};
use swc_ecma_ast::{
    ArrayLit, ArrowExpr, ArrowFunctionBody, AssignExpr, AssignOp, AssignTarget, BinExpr, BinaryOp,
    BindingIdent, BlockStmt, CallExpr, Callee, Class, ClassDecl, ComputedPropName, CondExpr, Decl,
    ExportDefaultExpr, ExportNamedSpecifier, ExportSpecifier, Expr, ExprOrSpread, ExprStmt, FnDecl,
    FnExpr, Function, FunctionBody, Ident, IdentName, IfStmt, ImportDecl, ImportPhase,
    KeyValueProp, Lit, MemberExpr, MemberProp, ModuleDecl, ModuleExportName, ModuleItem,
    NamedExport, NewExpr, Null, ObjectLit, Param, Pat, Prop, PropName, PropOrSpread, ReturnStmt,
    SeqExpr, SimpleAssignTarget, Stmt, Str, ThisExpr, ThrowStmt, UnaryExpr, UnaryOp, VarDecl,
    VarDeclKind, VarDeclarator,
};

use crate::ast_util::is_valid_identifier;

/// Create an identifier node
pub fn id(name: &str) -> Ident {
    Ident::new_no_ctxt(name.into(), DUMMY_SP)
}

/// Create a name expression: `name`
pub fn ident(name: &str) -> Expr {
    Expr::Ident(id(name))
}

/// Create a binding pattern: `name`
pub fn pat(name: &str) -> Pat {
    Pat::Ident(BindingIdent::from(id(name)))
}

pub fn num(value: f64) -> Expr {
    Expr::Lit(Lit::Num(value.into()))
}

pub fn string(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str::from(value)))
}

pub fn boolean(value: bool) -> Expr {
    Expr::Lit(Lit::Bool(value.into()))
}

pub fn null() -> Expr {
    Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))
}

/// `undefined` is a global binding, not a literal
pub fn undefined() -> Expr {
    ident("undefined")
}

pub fn this() -> Expr {
    Expr::This(ThisExpr { span: DUMMY_SP })
}

/// Property key for `name`, quoted when it is not an identifier
pub fn prop_name(name: &str) -> PropName {
    if is_valid_identifier(name) {
        PropName::Ident(IdentName::new(name.into(), DUMMY_SP))
    } else {
        PropName::Str(Str::from(name))
    }
}

/// Create an attribute access: `object.property`
pub fn member(object: Expr, property: &str) -> Expr {
    Expr::Member(member_expr(object, property))
}

fn member_expr(object: Expr, property: &str) -> MemberExpr {
    MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(object),
        prop: MemberProp::Ident(IdentName::new(property.into(), DUMMY_SP)),
    }
}

/// Create a computed access: `object[property]`
pub fn computed_member(object: Expr, property: Expr) -> Expr {
    Expr::Member(computed_member_expr(object, property))
}

fn computed_member_expr(object: Expr, property: Expr) -> MemberExpr {
    MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(object),
        prop: MemberProp::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: Box::new(property),
        }),
    }
}

/// `object.name` when `name` is an identifier, `object["name"]` otherwise
pub fn static_member(object: Expr, name: &str) -> Expr {
    if is_valid_identifier(name) {
        member(object, name)
    } else {
        computed_member(object, string(name))
    }
}

pub fn args(args: Vec<Expr>) -> Vec<ExprOrSpread> {
    args.into_iter()
        .map(|expr| ExprOrSpread {
            spread: None,
            expr: Box::new(expr),
        })
        .collect()
}

pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(callee)),
        args: args(arguments),
        type_args: None,
    })
}

/// Create a call to a plain function name: `name(args...)`
pub fn call_ident(name: &str, arguments: Vec<Expr>) -> Expr {
    call(ident(name), arguments)
}

pub fn new_expr(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::New(NewExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Box::new(callee),
        args: Some(args(arguments)),
        type_args: None,
    })
}

fn assign(left: AssignTarget, value: Expr) -> Expr {
    Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left,
        right: Box::new(value),
    })
}

/// Create a simple assignment expression: `target = value`
pub fn assign_ident(target: &str, value: Expr) -> Expr {
    assign(
        AssignTarget::Simple(SimpleAssignTarget::Ident(BindingIdent::from(id(target)))),
        value,
    )
}

/// Create an attribute assignment expression: `object.property = value`
pub fn assign_member(object: Expr, property: &str, value: Expr) -> Expr {
    assign(
        AssignTarget::Simple(SimpleAssignTarget::Member(member_expr(object, property))),
        value,
    )
}

/// `object[property] = value`
pub fn assign_computed(object: Expr, property: Expr, value: Expr) -> Expr {
    assign(
        AssignTarget::Simple(SimpleAssignTarget::Member(computed_member_expr(object, property))),
        value,
    )
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Bin(BinExpr {
        span: DUMMY_SP,
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unary(op: UnaryOp, arg: Expr) -> Expr {
    Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op,
        arg: Box::new(arg),
    })
}

pub fn not(arg: Expr) -> Expr {
    unary(UnaryOp::Bang, arg)
}

pub fn type_of(arg: Expr) -> Expr {
    unary(UnaryOp::TypeOf, arg)
}

pub fn cond(test: Expr, cons: Expr, alt: Expr) -> Expr {
    Expr::Cond(CondExpr {
        span: DUMMY_SP,
        test: Box::new(test),
        cons: Box::new(cons),
        alt: Box::new(alt),
    })
}

pub fn seq(exprs: Vec<Expr>) -> Expr {
    Expr::Seq(SeqExpr {
        span: DUMMY_SP,
        exprs: exprs.into_iter().map(Box::new).collect(),
    })
}

/// Create an object literal from `(key, value)` pairs
pub fn object(props: Vec<(&str, Expr)>) -> Expr {
    Expr::Object(ObjectLit {
        span: DUMMY_SP,
        props: props
            .into_iter()
            .map(|(key, value)| {
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key: prop_name(key),
                    value: Box::new(value),
                })))
            })
            .collect(),
    })
}

pub fn array(elems: Vec<Expr>) -> Expr {
    Expr::Array(ArrayLit {
        span: DUMMY_SP,
        elems: args(elems).into_iter().map(Some).collect(),
    })
}

pub fn function(params: &[&str], body: Vec<Stmt>) -> Box<Function> {
    Box::new(Function {
        params: params
            .iter()
            .map(|name| Param {
                span: DUMMY_SP,
                decorators: Vec::new(),
                pat: pat(name),
            })
            .collect(),
        body: Some(FunctionBody {
            span: DUMMY_SP,
            stmts: body,
        }),
        ..Function::default()
    })
}

pub fn function_expr(params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::Fn(FnExpr {
        ident: None,
        function: function(params, body),
    })
}

pub fn arrow_expr(params: &[&str], body: Expr) -> Expr {
    Expr::Arrow(ArrowExpr {
        params: params.iter().map(|name| pat(name)).collect(),
        body: Box::new(ArrowFunctionBody::Expr(Box::new(body))),
        ..ArrowExpr::default()
    })
}

/// `function () { return value; }`
pub fn getter(value: Expr) -> Expr {
    function_expr(&[], vec![return_stmt(Some(value))])
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

pub fn var_decl(kind: VarDeclKind, name: &str, init: Option<Expr>) -> Stmt {
    var_decl_pat(kind, pat(name), init)
}

pub fn var_decl_pat(kind: VarDeclKind, name: Pat, init: Option<Expr>) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        kind,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name,
            init: init.map(Box::new),
            definite: false,
        }],
        ..VarDecl::default()
    })))
}

/// `var name = init;`
pub fn var_stmt(name: &str, init: Expr) -> Stmt {
    var_decl(VarDeclKind::Var, name, Some(init))
}

/// `var name;`
pub fn var_uninit(name: &str) -> Stmt {
    var_decl(VarDeclKind::Var, name, None)
}

pub fn let_stmt(name: &str, init: Expr) -> Stmt {
    var_decl(VarDeclKind::Let, name, Some(init))
}

pub fn const_stmt(name: &str, init: Expr) -> Stmt {
    var_decl(VarDeclKind::Const, name, Some(init))
}

pub fn function_decl(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::Decl(Decl::Fn(FnDecl {
        ident: id(name),
        declare: false,
        function: function(params, body),
    }))
}

pub fn class_decl(name: &str, super_class: Option<Expr>) -> Stmt {
    Stmt::Decl(Decl::Class(ClassDecl {
        ident: id(name),
        declare: false,
        class: Box::new(Class {
            super_class: super_class.map(Box::new),
            ..Class::default()
        }),
    }))
}

pub fn return_stmt(arg: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt {
        span: DUMMY_SP,
        arg: arg.map(Box::new),
    })
}

pub fn throw_stmt(arg: Expr) -> Stmt {
    Stmt::Throw(ThrowStmt {
        span: DUMMY_SP,
        arg: Box::new(arg),
    })
}

pub fn block(stmts: Vec<Stmt>) -> BlockStmt {
    BlockStmt {
        stmts,
        ..BlockStmt::default()
    }
}

pub fn if_stmt(test: Expr, cons: Vec<Stmt>, alt: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If(IfStmt {
        span: DUMMY_SP,
        test: Box::new(test),
        cons: Box::new(Stmt::Block(block(cons))),
        alt: alt.map(|alt| Box::new(Stmt::Block(block(alt)))),
    })
}

/// `require('specifier')`
pub fn require(specifier: &str) -> Expr {
    call_ident("require", vec![string(specifier)])
}

/// `import 'source'`
pub fn import_side_effect(source: &str) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
        span: DUMMY_SP,
        specifiers: Vec::new(),
        src: Box::new(Str::from(source)),
        type_only: false,
        with: None,
        phase: ImportPhase::Evaluation,
    }))
}

fn export_name(name: &str) -> ModuleExportName {
    if is_valid_identifier(name) {
        ModuleExportName::Ident(id(name))
    } else {
        ModuleExportName::Str(Str::from(name))
    }
}

/// `export { local as exported, ... }`
pub fn export_named(names: &[(&str, &str)]) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport {
        span: DUMMY_SP,
        specifiers: names
            .iter()
            .map(|(local, exported)| {
                ExportSpecifier::Named(ExportNamedSpecifier {
                    span: DUMMY_SP,
                    orig: ModuleExportName::Ident(id(local)),
                    exported: (local != exported).then(|| export_name(exported)),
                    is_type_only: false,
                })
            })
            .collect(),
        src: None,
        type_only: false,
        with: None,
    }))
}

/// `export default expr;`
pub fn export_default_expr(expr: Expr) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(ExportDefaultExpr {
        span: DUMMY_SP,
        expr: Box::new(expr),
    }))
}
