//! Parsing compiled module sources into statement lists
//!
//! Sources are parsed as ES modules when they contain module syntax and as
//! scripts otherwise; both come back as a flat `Vec<ModuleItem>`. Top-level
//! `return` is accepted because CommonJS bodies may use it.

use std::path::Path;

use log::trace;
use swc_common::{BytePos, FileName, SourceMap, Spanned, sync::Lrc};
use swc_ecma_ast::{CallExpr, Callee, ModuleDecl, ModuleItem, Program};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax};
use swc_ecma_visit::{Visit, VisitWith};

use crate::{
    ast_util,
    error::{LinkError, Result},
    module_unit::SourceLoc,
    types::FxIndexMap,
};

/// A parsed source and where each specifier first appears in it
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub body: Vec<ModuleItem>,
    pub specifier_locs: FxIndexMap<String, SourceLoc>,
}

/// Parse `source`, reporting syntax errors against `path`
pub fn parse_module(path: &Path, source: &str) -> Result<ParsedModule> {
    let cm: Lrc<SourceMap> = Lrc::default();
    let file = cm.new_source_file(
        Lrc::new(FileName::Real(path.to_path_buf())),
        source.to_string(),
    );
    let syntax = Syntax::Es(EsSyntax {
        allow_return_outside_function: true,
        ..EsSyntax::default()
    });
    let mut parser = Parser::new(syntax, StringInput::from(&*file), None);

    let syntax_error = |err: swc_ecma_parser::error::Error| LinkError::Parse {
        path: path.to_path_buf(),
        message: err.kind().msg().into_owned(),
        loc: source_loc(&cm, err.span().lo),
    };
    let program = parser.parse_program().map_err(syntax_error)?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(syntax_error(err));
    }

    let body: Vec<ModuleItem> = match program {
        Program::Module(module) => module.body,
        Program::Script(script) => script.body.into_iter().map(ModuleItem::Stmt).collect(),
    };

    let mut locator = SpecifierLocator {
        cm: &cm,
        locs: FxIndexMap::default(),
    };
    body.visit_with(&mut locator);
    trace!(
        "Parsed {} ({} statements, {} specifiers)",
        path.display(),
        body.len(),
        locator.locs.len()
    );
    Ok(ParsedModule {
        specifier_locs: locator.locs,
        body,
    })
}

/// Parse `source` and keep only its statements
pub fn parse_source(path: impl AsRef<Path>, source: &str) -> Result<Vec<ModuleItem>> {
    parse_module(path.as_ref(), source).map(|parsed| parsed.body)
}

fn source_loc(cm: &SourceMap, pos: BytePos) -> Option<SourceLoc> {
    let loc = cm.try_lookup_char_pos(pos).ok()?;
    Some(SourceLoc::new(
        u32::try_from(loc.line).unwrap_or(u32::MAX),
        u32::try_from(loc.col.0).unwrap_or(u32::MAX),
    ))
}

/// First position of every `import`/`export ... from`, `require()` and
/// `import()` specifier
struct SpecifierLocator<'a> {
    cm: &'a SourceMap,
    locs: FxIndexMap<String, SourceLoc>,
}

impl SpecifierLocator<'_> {
    fn note(&mut self, specifier: &str, pos: BytePos) {
        if !self.locs.contains_key(specifier)
            && let Some(loc) = source_loc(self.cm, pos)
        {
            self.locs.insert(specifier.to_string(), loc);
        }
    }
}

impl Visit for SpecifierLocator<'_> {
    fn visit_module_decl(&mut self, decl: &ModuleDecl) {
        let source = match decl {
            ModuleDecl::Import(import) => Some(&import.src),
            ModuleDecl::ExportAll(export) => Some(&export.src),
            ModuleDecl::ExportNamed(export) => export.src.as_ref(),
            _ => None,
        };
        if let Some(source) = source
            && let Some(specifier) = source.value.as_atom()
        {
            self.note(specifier, decl.span().lo);
        }
        decl.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        let is_loader = match &call.callee {
            Callee::Import(_) => true,
            Callee::Expr(callee) => ast_util::is_ident_named(callee, "require"),
            Callee::Super(_) => false,
        };
        if is_loader
            && let Some(specifier) = call.args.first().and_then(|arg| ast_util::as_str_lit(&arg.expr))
        {
            self.note(specifier, call.span.lo);
        }
        call.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_script_and_module_sources_both_parse() {
        let script = parse_source("a.js", "var x = require('./b');\nmodule.exports = x;")
            .expect("script parses");
        assert_eq!(script.len(), 2);

        let module = parse_source("b.js", "import x from './c';\nexport default x;")
            .expect("module parses");
        assert!(matches!(module[0], ModuleItem::ModuleDecl(ModuleDecl::Import(_))));
    }

    #[test]
    fn test_top_level_return_is_accepted() {
        let body = parse_source("a.js", "if (done) return;\nrun();").expect("parses");
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_specifiers_are_located() {
        let parsed = parse_module(
            Path::new("a.js"),
            "import x from './b';\n  var y = require('./c');\nrequire('./b');",
        )
        .expect("parses");
        assert_eq!(parsed.specifier_locs.get("./b"), Some(&SourceLoc::new(1, 0)));
        assert_eq!(parsed.specifier_locs.get("./c"), Some(&SourceLoc::new(2, 10)));
    }

    #[test]
    fn test_syntax_errors_name_the_file() {
        let err = parse_source("src/broken.js", "var = 1;").expect_err("does not parse");
        match err {
            LinkError::Parse { path, loc, .. } => {
                assert_eq!(path, Path::new("src/broken.js"));
                assert_eq!(loc.map(|loc| loc.line), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
