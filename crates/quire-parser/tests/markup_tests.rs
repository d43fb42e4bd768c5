/// Integration tests for the markup parser

use quire_parser::*;

#[test]
fn test_attribute_forms() {
    let src = r#"<Agent name="researcher" description='Finds things' tools={"Read Grep"} strict />"#;
    let tree = parse(src).expect("parse failed");
    let root = &tree.root;

    assert_eq!(root.attr("name").unwrap().value, AttrValue::String("researcher".into()));
    assert_eq!(root.attr("description").unwrap().value, AttrValue::String("Finds things".into()));
    match &root.attr("tools").unwrap().value {
        AttrValue::Expr(e) => assert_eq!(e.expr.kind, ExprKind::String("Read Grep".into())),
        other => panic!("Expected expression attribute, got {:?}", other),
    }
    assert_eq!(root.attr("strict").unwrap().value, AttrValue::Flag);
}

#[test]
fn test_nested_children_and_text() {
    let src = "<Command name=\"c\">\n  <ul>\n    <li>a</li>\n    <li>b</li>\n  </ul>\n</Command>";
    let tree = parse(src).expect("parse failed");
    let elements: Vec<&Element> = tree.root.child_elements().collect();
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].name, "ul");
    let items: Vec<&Element> = elements[0].child_elements().collect();
    assert_eq!(items.len(), 2);
    match &items[1].children[0] {
        Node::Text(t) => assert_eq!(t.value, "b"),
        other => panic!("Expected text, got {:?}", other),
    }
}

#[test]
fn test_expression_child_keeps_source() {
    let src = "<p>Status: {ctx.status ?? 'unknown'}</p>";
    let tree = parse(src).expect("parse failed");
    match &tree.root.children[1] {
        Node::Expr(e) => {
            assert_eq!(e.source, "ctx.status ?? 'unknown'");
            assert!(matches!(e.expr.kind, ExprKind::Binary { op: BinaryOp::Nullish, .. }));
        }
        other => panic!("Expected expression child, got {:?}", other),
    }
}

#[test]
fn test_comments_are_dropped() {
    let src = "<p>a<!-- hidden -->{/* also hidden */}b</p>";
    let tree = parse(src).expect("parse failed");
    let texts: Vec<String> = tree
        .root
        .children
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) => Some(t.value.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_object_attribute_spans_multiple_lines() {
    let src = "<Call fn=\"checkStatus\" args={{\n  path: ctx.path,\n  retries: 3,\n}} />";
    let tree = parse(src).expect("parse failed");
    let AttrValue::Expr(e) = &tree.root.attr("args").unwrap().value else {
        panic!("Expected expression");
    };
    let ExprKind::Object(props) = &e.expr.kind else {
        panic!("Expected object literal");
    };
    assert_eq!(props.len(), 2);
    assert_eq!(props[1].value.kind, ExprKind::Number("3".into()));
}

#[test]
fn test_error_span_points_at_problem() {
    let src = "<Command name=\"c\">\n  <p>unclosed\n</Command>";
    let err = parse(src).unwrap_err();
    let span = err.span();
    let index = LineIndex::new(src);
    let (line, _) = index.location(src, span.start);
    assert_eq!(line, 3);
}

#[test]
fn test_unterminated_root() {
    let err = parse("<Command name=\"c\"><p>x</p>").unwrap_err();
    assert!(matches!(err, ParseError::Unterminated { .. }));
}
