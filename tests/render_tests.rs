mod common;

use common::{TestResult, engine_with, loader_with, values};
use qweb::{CompileOptions, Map, QWebError, RenderOptions, TemplateId, Value};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_scenario_a_if_else() -> TestResult {
    let engine = engine_with(&[(
        "page",
        r#"<div><span t-if="show">Yes</span><span t-else="1">No</span></div>"#,
    )]);
    let options = RenderOptions::new();
    assert_eq!(
        engine.render("page", values(json!({"show": true})), &options)?,
        "<div><span>Yes</span></div>"
    );
    assert_eq!(
        engine.render("page", values(json!({"show": false})), &options)?,
        "<div><span>No</span></div>"
    );
    Ok(())
}

#[test]
fn test_scenario_b_foreach() -> TestResult {
    let engine = engine_with(&[(
        "list",
        r#"<ul><li t-foreach="[10,20,30]" t-as="n" t-esc="n"/></ul>"#,
    )]);
    assert_eq!(
        engine.render("list", Map::new(), &RenderOptions::new())?,
        "<ul><li>10</li><li>20</li><li>30</li></ul>"
    );
    Ok(())
}

#[test]
fn test_scenario_c_set() -> TestResult {
    let engine = engine_with(&[("set", r#"<t t-set="x" t-value="1+1"/><span t-esc="x"/>"#)]);
    assert_eq!(engine.render("set", Map::new(), &RenderOptions::new())?, "<span>2</span>");
    Ok(())
}

#[test]
fn test_scenario_d_call() -> TestResult {
    let engine = engine_with(&[
        ("sub", "<b>hi</b>"),
        ("main", r#"<div t-call="sub"/>"#),
        (
            "leaky",
            r#"<t><t t-set="x" t-value="'callee'"/><t t-esc="x"/></t>"#,
        ),
        ("caller", r#"<t><t t-call="leaky"/>|<t t-esc="x"/></t>"#),
    ]);
    let options = RenderOptions::new();
    assert_eq!(engine.render("main", Map::new(), &options)?, "<div><b>hi</b></div>");
    assert_eq!(
        engine.render("caller", values(json!({"x": "caller"})), &options)?,
        "callee|caller"
    );
    Ok(())
}

#[test]
fn test_scenario_e_reserved_slot() {
    let engine = engine_with(&[]);
    let mut data = Map::new();
    data.insert("0".into(), Value::from("content"));
    // The template does not exist: the value check must fail first.
    let err = engine
        .render("missing", data, &RenderOptions::new())
        .unwrap_err();
    assert!(matches!(err, QWebError::Values(_)));
}

#[test]
fn test_missing_template_is_not_found() {
    let engine = engine_with(&[]);
    let err = engine
        .render("nowhere", Map::new(), &RenderOptions::new())
        .unwrap_err();
    assert!(matches!(err, QWebError::NotFound(name) if name == "nowhere"));
}

#[test]
fn test_templates_by_numeric_id() -> TestResult {
    let loader = qweb_traits::InMemoryLoader::new();
    loader.add_with_id(12, "web.card", "<i>card</i>")?;
    let engine = qweb::Engine::builder().with_loader(Arc::new(loader)).build();
    assert_eq!(engine.render(12i64, Map::new(), &RenderOptions::new())?, "<i>card</i>");
    assert_eq!(engine.render("12", Map::new(), &RenderOptions::new())?, "<i>card</i>");
    Ok(())
}

#[test]
fn test_inline_tree_renders_without_loader() -> TestResult {
    let engine = engine_with(&[("sub", "<b>sub</b>")]);
    let root = qweb_template::xml::parse(r#"<p><t t-call="sub"/></p>"#, "inline")?;
    assert_eq!(
        engine.render(TemplateId::Node(root), Map::new(), &RenderOptions::new())?,
        "<p><b>sub</b></p>"
    );
    // only the called template is cached
    assert_eq!(engine.cache().len(), 1);
    Ok(())
}

#[test]
fn test_blank_lines_collapse_unless_kept() -> TestResult {
    let engine = engine_with(&[("lines", "<pre>a\n\n\nb</pre>")]);
    assert_eq!(
        engine.render("lines", Map::new(), &RenderOptions::new())?,
        "<pre>a\nb</pre>"
    );
    assert_eq!(
        engine.render(
            "lines",
            Map::new(),
            &RenderOptions::new().with_keep_empty_lines(true)
        )?,
        "<pre>a\n\n\nb</pre>"
    );
    Ok(())
}

#[test]
fn test_rendering_twice_is_identical() -> TestResult {
    let engine = engine_with(&[(
        "table",
        r#"<table><tr t-foreach="rows" t-as="row" t-att-class="row_parity"><td t-esc="row['name']"/><td t-out="row['amount']" t-options="{'widget': 'float', 'precision': 2}"/></tr></table>"#,
    )]);
    let data = json!({"rows": [{"name": "a", "amount": 1.5}, {"name": "b<", "amount": 2}]});
    let first = engine.render("table", values(data.clone()), &RenderOptions::new())?;
    let second = engine.render("table", values(data), &RenderOptions::new())?;
    assert_eq!(first, second);
    assert_eq!(
        first,
        r#"<table><tr class="even"><td>a</td><td>1.50</td></tr><tr class="odd"><td>b&lt;</td><td>2.00</td></tr></table>"#
    );
    Ok(())
}

#[test]
fn test_json_mappings_iterate_in_document_order() -> TestResult {
    let engine = engine_with(&[(
        "pairs",
        r#"<dl><t t-foreach="fields" t-as="f"><dt t-esc="f[0]"/><dd t-esc="f_value"/></t></dl>"#,
    )]);
    let output = engine.render(
        "pairs",
        values(json!({"fields": {"zeta": 1, "alpha": 2, "mid": 3}})),
        &RenderOptions::new(),
    )?;
    assert_eq!(
        output,
        "<dl><dt>zeta</dt><dd>1</dd><dt>alpha</dt><dd>2</dd><dt>mid</dt><dd>3</dd></dl>"
    );
    Ok(())
}

#[test]
fn test_static_templates_render_their_source() -> TestResult {
    let source = r#"<section id="s"><h1>Title</h1><p class="a b">Text &amp; more</p><hr/></section>"#;
    let engine = engine_with(&[("static", source)]);
    assert_eq!(engine.render("static", Map::new(), &RenderOptions::new())?, source);
    Ok(())
}

#[test]
fn test_loader_override_applies_to_calls() -> TestResult {
    let engine = engine_with(&[("main", r#"<t t-call="sub"/>"#), ("sub", "<b>engine</b>")]);
    let other = loader_with(&[("main", r#"<t t-call="sub"/>"#), ("sub", "<b>override</b>")]);
    let options = RenderOptions::new().with_loader(Arc::new(other));

    assert_eq!(engine.render("main", Map::new(), &options)?, "<b>override</b>");
    assert_eq!(engine.render("main", Map::new(), &RenderOptions::new())?, "<b>engine</b>");
    Ok(())
}

#[test]
fn test_language_switch_compiles_a_separate_callee() -> TestResult {
    let engine = engine_with(&[
        ("main", r#"<t><t t-call="sub"/><t t-call="sub" t-lang="'fr_FR'"/></t>"#),
        ("sub", "<b>x</b>"),
    ]);
    engine.render("main", Map::new(), &RenderOptions::new())?;
    // main, sub, and sub in French
    assert_eq!(engine.cache().len(), 3);
    Ok(())
}

#[test]
fn test_dev_mode_xml_sees_live_edits() -> TestResult {
    let loader = Arc::new(loader_with(&[("t", "<p>old</p>")]));
    let engine = qweb::Engine::builder().with_loader(loader.clone()).build();
    let options = RenderOptions::new();
    assert_eq!(engine.render("t", Map::new(), &options)?, "<p>old</p>");

    loader.add("t", "<p>new</p>")?;
    assert_eq!(engine.render("t", Map::new(), &options)?, "<p>old</p>");

    engine.set_dev_mode(["xml"]);
    assert_eq!(engine.render("t", Map::new(), &options)?, "<p>new</p>");
    Ok(())
}

#[test]
fn test_errors_carry_template_and_path() {
    let engine = engine_with(&[
        ("sub", r#"<div><p t-esc="1 // zero"/></div>"#),
        ("main", r#"<section><t t-call="sub"/></section>"#),
    ]);
    let err = engine
        .render("main", values(json!({"zero": 0})), &RenderOptions::new())
        .unwrap_err();
    match err {
        QWebError::Render {
            reference, path, ..
        } => {
            assert_eq!(reference, "sub");
            assert_eq!(path, "/div/p");
        }
        other => panic!("expected a render error, got {:?}", other),
    }
}

#[test]
fn test_compile_errors_name_the_template() {
    let engine = engine_with(&[("bad", r#"<div><p t-else="">x</p></div>"#)]);
    let err = engine
        .render("bad", Map::new(), &RenderOptions::new())
        .unwrap_err();
    assert!(matches!(&err, QWebError::Compile { reference, .. } if reference == "bad"));
    assert!(matches!(err.root_cause(), QWebError::Directive(_)));
}

#[test]
fn test_unsafe_expressions_never_render() {
    let engine = engine_with(&[("evil", r#"<t t-esc="x.__class__"/>"#)]);
    let err = engine
        .render("evil", Map::new(), &RenderOptions::new())
        .unwrap_err();
    assert!(matches!(err.root_cause(), QWebError::Unsafe(_)));
}

#[test]
fn test_raise_on_code_accepts_static_templates_only() {
    let engine = engine_with(&[("static", "<p>x</p>"), ("dynamic", r#"<p t-esc="x"/>"#)]);
    let options = RenderOptions::new().with_compile(CompileOptions {
        raise_on_code: true,
        ..Default::default()
    });
    assert!(engine.render("static", Map::new(), &options).is_ok());
    let err = engine.render("dynamic", Map::new(), &options).unwrap_err();
    assert!(matches!(err.root_cause(), QWebError::CodeFound(_)));
}
