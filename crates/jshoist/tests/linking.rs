mod common;

use common::{BundleBuilder, init_logger, link_source};
use jshoist::{
    BundleGraph, Config, Dependency, LinkError, OutputFormatKind,
    dead_exports::eliminate_dead_exports, link_bundle, linker, output_format::GlobalFormat,
};
use pretty_assertions::assert_eq;

fn link_error(graph: &mut BundleGraph) -> LinkError {
    let err = link_bundle(graph, "main.js", &Config::default()).expect_err("link fails");
    err.downcast_ref::<LinkError>()
        .cloned()
        .expect("a link error")
}

const LOG_X: &str = "import { x } from './a';\nlog(x);";

fn wildcard_graph(consumer: &str) -> BundleGraph {
    BundleBuilder::new("main.js")
        .module("b", "export const x = 1;\nexport default 2;", &[])
        .module("a", "export * from './b';", &["./b"])
        .module("c", consumer, &["./a"])
        .entry("c")
        .build()
}

#[test]
fn test_wildcard_reexport_resolves_to_source_binding() {
    init_logger();
    let mut graph = wildcard_graph(LOG_X);
    let source = link_source(&mut graph, "main.js", &Config::default());
    assert!(source.contains("log($b$x);"));
    assert!(!source.contains("$hoist$exportWildcard"));
}

#[test]
fn test_default_does_not_cross_wildcards() {
    init_logger();
    let mut graph = wildcard_graph("import d from './a';\nlog(d);");
    match link_error(&mut graph) {
        LinkError::UnresolvedExport { name, importer, .. } => {
            assert_eq!(name, "default");
            assert!(importer.ends_with("c.js"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_circular_imports_link_through_hoisted_bindings() {
    init_logger();
    let mut graph = BundleBuilder::new("main.js")
        .module(
            "b",
            "import { x } from './a';\nexport function next() {\n  return x + 1;\n}",
            &["./a"],
        )
        .module(
            "a",
            "import { next } from './b';\nexport var x = 1;\nlog(next());",
            &["./b"],
        )
        .entry("a")
        .build();

    let linked = link_bundle(&mut graph, "main.js", &Config::default()).expect("links");
    let source = linked.to_source();
    assert_eq!(linked.stats.wrapped_modules, 0);
    assert!(source.contains("return $a$x + 1;"));
    assert!(source.contains("log($b$next());"));
}

#[test]
fn test_absent_optional_dependency_throws_at_runtime() {
    init_logger();
    let mut graph = BundleBuilder::new("main.js")
        .module_with(
            "a",
            "require('./optional');",
            vec![Dependency::new("./optional").optional()],
        )
        .entry("a")
        .build();

    let source = link_source(&mut graph, "main.js", &Config::default());
    assert!(source.contains("$hoist$missingModule(\"./optional\");"));
    assert!(source.contains("function $hoist$missingModule("));
}

#[test]
fn test_absent_weak_dependency_is_dropped() {
    init_logger();
    let mut graph = BundleBuilder::new("main.js")
        .module_with(
            "a",
            "require('./weak');\nlog(require('./weak'));",
            vec![Dependency::new("./weak").weak()],
        )
        .entry("a")
        .build();

    let source = link_source(&mut graph, "main.js", &Config::default());
    assert!(source.contains("log(undefined);"));
    assert!(!source.contains("./weak"));
}

#[test]
fn test_absent_required_dependency_fails() {
    init_logger();
    let mut graph = BundleBuilder::new("main.js")
        .module("a", "require('./gone');", &["./gone"])
        .entry("a")
        .build();

    match link_error(&mut graph) {
        LinkError::MissingDependency { specifier, path, .. } => {
            assert_eq!(specifier, "./gone");
            assert!(path.ends_with("a.js"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_linking_twice_is_stable() {
    init_logger();
    let mut graph = wildcard_graph(LOG_X);
    let first = link_source(&mut graph, "main.js", &Config::default());
    let second = link_source(&mut graph, "main.js", &Config::default());
    assert_eq!(first, second);
}

#[test]
fn test_dead_export_elimination_reaches_a_fixed_point() {
    init_logger();
    let mut graph = wildcard_graph(LOG_X);
    let config = Config {
        tree_shake: false,
        ..Config::default()
    };
    link_bundle(&mut graph, "main.js", &config).expect("links");

    let mut output = linker::link(&graph, "main.js", &GlobalFormat::default(), &config)
        .expect("links");
    let removed = eliminate_dead_exports(&mut output.body, &output.roots);
    assert!(removed > 0);
    assert_eq!(eliminate_dead_exports(&mut output.body, &output.roots), 0);
}

#[test]
fn test_minified_bundle_has_no_prefixed_bindings() {
    init_logger();
    let mut graph = wildcard_graph(LOG_X);
    let config = Config {
        minify: true,
        ..Config::default()
    };
    let linked = link_bundle(&mut graph, "main.js", &config).expect("links");
    let source = linked.to_source();
    assert!(linked.stats.mangled_bindings > 0);
    assert!(!source.contains("$b$"));
    assert!(!source.contains("$c$"));
    assert!(source.contains("log("));
}

#[test]
fn test_esm_entry_exports_bindings() {
    init_logger();
    let mut graph = wildcard_graph("export { x as y } from './a';");
    let config = Config {
        output_format: OutputFormatKind::Esm,
        ..Config::default()
    };
    let source = link_source(&mut graph, "main.js", &config);
    assert!(source.contains("export { $b$x as y };"));
}

#[test]
fn test_cross_bundle_references_use_registry() {
    init_logger();
    let mut graph = BundleGraph::new();
    BundleBuilder::new("shared.js")
        .module("s", "export const v = 1;", &[])
        .externally_referenced("s")
        .add_to(&mut graph);
    BundleBuilder::new("main.js")
        .module(
            "m",
            "import { v } from './s';\nlog(v);",
            &["./s"],
        )
        .entry("m")
        .add_to(&mut graph);

    let config = Config {
        output_format: OutputFormatKind::CommonJs,
        ..Config::default()
    };
    let shared = link_source(&mut graph, "shared.js", &config);
    assert!(shared.contains("hoistRequire.register(\"s\", $s$exports);"));
    assert!(shared.contains("$hoist$export($s$exports, \"v\", function"));

    let main = link_source(&mut graph, "main.js", &config);
    assert!(main.starts_with("require(\"./shared.js\");\n"));
    assert!(main.contains("var hoistRequire = "));
    assert!(main.contains("log(hoistRequire(\"s\").v);"));
}
