//! Integration tests for compiling and rendering templates

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use chunktmpl::{render, Context, Engine, Error, EvalError, ExecutionError, Options, ParseError, Value};

fn ctx(pairs: &[(&str, Value)]) -> Context {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn user() -> Value {
    let mut user = BTreeMap::new();
    user.insert("name".to_string(), Value::from("Ada"));
    user.insert("roles".to_string(), Value::from(vec!["admin", "dev"]));
    Value::from(user)
}

#[test]
fn test_variables_and_attributes() {
    let out = render(
        "{{ user.name }} is {{ user.roles[0] }}, last role {{ user.roles[-1] }}",
        &ctx(&[("user", user())]),
    )
    .unwrap();
    insta::assert_snapshot!(out, @"Ada is admin, last role dev");
}

#[test]
fn test_numeric_attribute_chain() {
    let grid = Value::from(vec![Value::from(vec![1, 2]), Value::from(vec![3, 4])]);
    let out = render("{{ a.1.0 }} {{ a.0.1 }} {{ a[1].1 }}", &ctx(&[("a", grid)])).unwrap();
    assert_eq!(out, "3 2 4");
}

#[test]
fn test_closing_delimiters_inside_strings() {
    let out = render(
        r#"{{ "a}}b" }}|{% if x == "%}" %}yes{% endif %}|{{ '#}' }}"#,
        &ctx(&[("x", Value::from("%}"))]),
    )
    .unwrap();
    assert_eq!(out, "a}}b|yes|#}");
}

#[test]
fn test_missing_values_render_empty() {
    let out = render("[{{ nope }}][{{ user.age }}][{{ user.roles[9] }}]", &ctx(&[("user", user())]))
        .unwrap();
    assert_eq!(out, "[][][]");
}

#[test]
fn test_arithmetic_and_display() {
    let out = render(
        "{{ 7 / 2 }} {{ 8 / 2 }} {{ 7 % 3 }} {{ -(2 + 3) * 2 }} {{ 1.5 + 1 }} {{ 'a' + 1 }} {{ [1, 'x'] }} {{ true }}",
        &Context::new(),
    )
    .unwrap();
    insta::assert_snapshot!(out, @"3.5 4 1 -10 2.5 a1 [1, x] True");
}

#[test]
fn test_comparisons_and_logic() {
    let out = render(
        "{{ 1 < 2 and 'b' > 'a' }} {{ not 1 == 1 or 0 }} {{ 'dev' in user.roles }} {{ 'x' in 'xyz' }}",
        &ctx(&[("user", user())]),
    )
    .unwrap();
    insta::assert_snapshot!(out, @"True False True True");
}

#[test]
fn test_for_loop_variables() {
    let out = render(
        "{% for x in xs %}{{ forloop.counter }}/{{ forloop.length }}:{{ x }}{% if not forloop.last %}, {% endif %}{% endfor %}",
        &ctx(&[("xs", Value::from(vec!["a", "b", "c"]))]),
    )
    .unwrap();
    insta::assert_snapshot!(out, @"1/3:a, 2/3:b, 3/3:c");
}

#[test]
fn test_for_loop_revcounter_and_first() {
    let out = render(
        "{% for x in xs %}{% if forloop.first %}^{% endif %}{{ forloop.revcounter0 }}{% endfor %}",
        &ctx(&[("xs", Value::from(vec![1, 2, 3]))]),
    )
    .unwrap();
    assert_eq!(out, "^210");
}

#[test]
fn test_nested_loops_parentloop() {
    let out = render(
        "{% for row in rows %}{% for c in row %}{{ forloop.parentloop.counter0 }}.{{ forloop.counter0 }} {% endfor %}{% endfor %}",
        &ctx(&[(
            "rows",
            Value::from(vec![Value::from(vec![1, 2]), Value::from(vec![3])]),
        )]),
    )
    .unwrap();
    assert_eq!(out, "0.0 0.1 1.0 ");
}

#[test]
fn test_for_over_map() {
    let mut scores = BTreeMap::new();
    scores.insert("zed".to_string(), Value::from(1));
    scores.insert("amy".to_string(), Value::from(2));
    let context = ctx(&[("scores", Value::from(scores))]);

    assert_eq!(
        render("{% for k, v in scores %}{{ k }}={{ v }};{% endfor %}", &context).unwrap(),
        "amy=2;zed=1;"
    );
    assert_eq!(
        render("{% for name in scores %}{{ name }} {% endfor %}", &context).unwrap(),
        "amy zed "
    );
}

#[test]
fn test_for_index_value_over_list() {
    let out = render(
        "{% for i, x in xs %}{{ i }}:{{ x }} {% endfor %}",
        &ctx(&[("xs", Value::from(vec!["a", "b"]))]),
    )
    .unwrap();
    assert_eq!(out, "0:a 1:b ");
}

#[test]
fn test_for_empty_branch() {
    let source = "{% for x in xs %}{{ x }}{% empty %}nothing{% endfor %}";
    assert_eq!(render(source, &ctx(&[("xs", Value::List(vec![]))])).unwrap(), "nothing");
    assert_eq!(render(source, &Context::new()).unwrap(), "nothing");
}

#[test]
fn test_loop_variable_does_not_leak() {
    let out = render(
        "{% for x in xs %}{% endfor %}[{{ x }}]",
        &ctx(&[("xs", Value::from(vec![1])), ("x", Value::from("outer"))]),
    )
    .unwrap();
    assert_eq!(out, "[outer]");
}

#[test]
fn test_for_over_number_fails() {
    let err = render("{% for x in 5 %}{% endfor %}", &Context::new()).unwrap_err();
    match err {
        Error::Render(ExecutionError::Evaluation(EvalError::NotIterable { kind, span })) => {
            assert_eq!(kind, "int");
            assert_eq!(span, 12..13);
        }
        other => panic!("Expected not-iterable error, got {:?}", other),
    }
}

#[test]
fn test_if_chain() {
    let source = "{% if n > 10 %}big{% elif n > 0 %}small{% else %}none{% endif %}";
    let pick = |n: i64| render(source, &ctx(&[("n", Value::Int(n))])).unwrap();
    assert_eq!(pick(20), "big");
    assert_eq!(pick(5), "small");
    assert_eq!(pick(-1), "none");
}

#[test]
fn test_comments_are_dropped() {
    let out = render("a{# hidden {{ x }} #}b", &Context::new()).unwrap();
    assert_eq!(out, "ab");
}

#[test]
fn test_division_by_zero() {
    let err = render("{{ 1 % 0 }}", &Context::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Render(ExecutionError::Evaluation(EvalError::DivisionByZero { .. }))
    ));
}

#[test]
fn test_strict_undefined() {
    let engine = Engine::with_options(Options::default().with_strict_undefined(true));
    let err = engine.render("{{ ghost }}", &Context::new()).unwrap_err();
    match err {
        Error::Render(ExecutionError::Evaluation(EvalError::UndefinedVariable { name, span })) => {
            assert_eq!(name, "ghost");
            assert_eq!(span, 3..8);
        }
        other => panic!("Expected undefined variable error, got {:?}", other),
    }
}

#[test]
fn test_trim_and_lstrip_blocks() {
    let source = "<ul>\n  {% for x in xs %}\n  <li>{{ x }}</li>\n  {% endfor %}\n</ul>\n";
    let context = ctx(&[("xs", Value::from(vec![1, 2]))]);

    let engine = Engine::with_options(
        Options::default()
            .with_trim_blocks(true)
            .with_lstrip_blocks(true),
    );
    assert_eq!(
        engine.render(source, &context).unwrap(),
        "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>\n"
    );

    let plain = render(source, &context).unwrap();
    assert_eq!(plain, "<ul>\n  \n  <li>1</li>\n  \n  <li>2</li>\n  \n</ul>\n");
}

#[test]
fn test_lstrip_blocks_mid_line() {
    let engine = Engine::with_options(Options::default().with_lstrip_blocks(true));
    let out = engine
        .render("a \t {% if true %}b{% endif %} {{ 'c' }}", &Context::new())
        .unwrap();
    assert_eq!(out, "ab c");
}

#[test]
fn test_parse_error_spans() {
    let cases: &[(&str, fn(&ParseError) -> bool)] = &[
        ("{% if x %}open", |e| matches!(e, ParseError::Unclosed { span, .. } if *span == (0..10))),
        ("ok {% endif %}", |e| matches!(e, ParseError::UnexpectedTag { span, .. } if *span == (3..14))),
        ("{{ 1 + }}", |e| matches!(e, ParseError::Syntax { span, .. } if *span == (7..7))),
        ("{% cycle a %}", |e| matches!(e, ParseError::UnknownTag { span, .. } if *span == (0..13))),
    ];

    for (source, check) in cases {
        match render(source, &Context::new()) {
            Err(Error::Parse(err)) => assert!(check(&err), "{}: unexpected {:?}", source, err),
            other => panic!("{}: expected parse error, got {:?}", source, other),
        }
    }
}

#[test]
fn test_parse_error_report() {
    let source = "line one\n{% priority 1 2 %}x{% endpriority %}";
    let err = match Engine::new().compile_named("report.tmpl", source) {
        Err(Error::Parse(err)) => err,
        other => panic!("Expected parse error, got {:?}", other),
    };
    let report = err.format(source, "report.tmpl");
    assert!(report.contains("priority is malformed"));
    assert!(report.contains("report.tmpl"));
}

#[test]
fn test_context_from_json() {
    let context: Context =
        serde_json::from_str(r#"{"title": "Hi", "tags": ["a", "b"], "n": 2.5, "on": true}"#)
            .unwrap();
    let out = render("{{ title }} {{ tags }} {{ n }} {{ on }}", &context).unwrap();
    assert_eq!(out, "Hi [a, b] 2.5 True");
}

#[test]
fn test_output_forms_agree() {
    let template = Engine::new()
        .compile("{% for x in xs %}{% priority x %}<{{ x }}>{% endpriority %}{% endfor %}")
        .unwrap();
    let context = ctx(&[("xs", Value::from(vec![3, 1, 2]))]);

    let text = template.execute(&context).unwrap();
    let bytes = template.execute_bytes(&context).unwrap();
    let chunks = template.execute_chunks(&context).unwrap();
    let mut buffered = Vec::new();
    template.execute_writer(&context, &mut buffered).unwrap();
    let mut streamed = Vec::new();
    template
        .execute_writer_unbuffered(&context, &mut streamed)
        .unwrap();

    assert_eq!(text, "<3><1><2>");
    assert_eq!(bytes, text.as_bytes());
    assert_eq!(chunktmpl::concat(&chunks), text);
    assert_eq!(buffered, text.as_bytes());
    assert_eq!(streamed, text.as_bytes());
}
