//! JavaScript emission
//!
//! Trees are emitted with `swc_ecma_codegen` after the `fixer` pass has put
//! parentheses wherever precedence requires them; synthesized nodes never
//! carry `ParenExpr`s of their own.

use log::error;
use swc_common::{DUMMY_SP, SourceMap, sync::Lrc};
use swc_ecma_ast::{Expr, Module, ModuleItem, Stmt};
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, Node, text_writer::JsWriter};
use swc_ecma_transforms_base::fixer::fixer;
use swc_ecma_visit::VisitMutWith;

const INDENT: &str = "  ";

/// Render a statement list as a program, one statement per line
pub fn print_program(body: &[ModuleItem]) -> String {
    render(body.to_vec(), false)
}

/// Render a statement list without insignificant whitespace
pub fn print_minified(body: &[ModuleItem]) -> String {
    render(body.to_vec(), true)
}

pub fn print_stmt(stmt: &Stmt) -> String {
    render(vec![ModuleItem::Stmt(stmt.clone())], false)
}

/// Render a single expression, without a trailing semicolon
pub fn print_expr(expr: &Expr) -> String {
    let mut expr = Box::new(expr.clone());
    expr.visit_mut_with(&mut fixer(None));
    emit(&expr, false)
}

fn render(body: Vec<ModuleItem>, minify: bool) -> String {
    let mut module = Module {
        span: DUMMY_SP,
        body,
        shebang: None,
    };
    module.visit_mut_with(&mut fixer(None));
    emit(&module, minify)
}

fn emit(node: &impl Node, minify: bool) -> String {
    let cm: Lrc<SourceMap> = Lrc::default();
    let mut buf = Vec::new();
    {
        let mut writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        writer.set_indent_str(INDENT);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_minify(minify),
            cm,
            comments: None,
            wr: writer,
        };
        if let Err(err) = node.emit_with(&mut emitter) {
            // Only a codegen bug can fail a write into memory
            error!("Failed to emit JavaScript: {err}");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ast_builder as b, parser::parse_source};

    #[test]
    fn test_round_trips_parsed_source() {
        let body = parse_source("a.js", "var x = 1;\nfunction f(a) {\n  return a + x;\n}\n")
            .expect("parses");
        assert_eq!(
            print_program(&body),
            "var x = 1;\nfunction f(a) {\n  return a + x;\n}\n"
        );
    }

    #[test]
    fn test_synthesized_sequence_callee_is_parenthesized() {
        let callee = b::seq(vec![b::num(0.0), b::member(b::ident("$b$exports"), "f")]);
        let call = b::call(callee, Vec::new());
        assert_eq!(print_expr(&call), "(0, $b$exports.f)()");
    }

    #[test]
    fn test_minified_output_drops_whitespace() {
        let body = vec![
            b::var_stmt("a", b::num(1.0)).into(),
            b::expr_stmt(b::call_ident("f", vec![b::ident("a")])).into(),
        ];
        let code = print_minified(&body);
        assert!(code.starts_with("var a=1;f(a)"));
        assert!(!code.contains('\n'));
    }
}
