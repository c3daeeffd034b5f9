// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end tree construction: document shape, quirks mode, error
//! codes, error recovery, and the invariants the builder promises.

mod common;

use common::*;

use sapling::dom::{NodeData, RcDom};
use sapling::driver::{parse_document, ParseOpts};
use sapling::interface::{QuirksMode, ReadyState};
use sapling::tendril::TendrilSink;
use sapling::ErrorCode;

#[test]
fn doctype_and_empty_body() {
    let dom = parse("<!DOCTYPE html><html><body></body></html>");

    assert_eq!(dom.errors.borrow().len(), 0, "{:?}", dom.errors.borrow());
    assert_eq!(dom.quirks_mode.get(), QuirksMode::NoQuirks);

    let doctype_name = dom
        .document
        .children
        .borrow()
        .iter()
        .find_map(|child| match child.data {
            NodeData::Doctype { ref name, .. } => Some(name.to_string()),
            _ => None,
        });
    assert_eq!(doctype_name.as_deref(), Some("html"));

    let html = child_elem(&dom.document, "html");
    child_elem(&html, "head");
    child_elem(&html, "body");
}

#[test]
fn missing_doctype_is_quirky() {
    let dom = parse("<html><body>Hi</body></html>");

    assert_eq!(dom.quirks_mode.get(), QuirksMode::Quirks);
    let codes: Vec<_> = dom.errors.borrow().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ErrorCode::DoctypeMissing]);

    let body = body_of(&dom);
    let children = body.children.borrow();
    assert_eq!(children.len(), 1);
    match children[0].data {
        NodeData::Text { ref contents } => assert_eq!(&**contents.borrow(), "Hi"),
        ref other => panic!("expected a text node, got {other:?}"),
    }
}

#[test]
fn srcdoc_document_omits_missing_doctype_error() {
    let mut opts = ParseOpts::default();
    opts.tree_builder.iframe_srcdoc = true;
    let dom = parse_with_opts("<p>embedded", opts);
    assert_eq!(dom.quirks_mode.get(), QuirksMode::NoQuirks);
    assert!(dom.errors.borrow().is_empty(), "{:?}", dom.errors.borrow());
}

#[test]
fn empty_input_builds_the_skeleton() {
    let dom = parse("");

    let codes: Vec<_> = dom.errors.borrow().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ErrorCode::DoctypeMissing]);

    let html = child_elem(&dom.document, "html");
    child_elem(&html, "head");
    let body = child_elem(&html, "body");
    assert!(body.children.borrow().is_empty());
}

#[test]
fn doctype_only_input() {
    let dom = parse("<!DOCTYPE html>");
    assert_eq!(dom.quirks_mode.get(), QuirksMode::NoQuirks);
    assert!(dom.errors.borrow().is_empty());
    // EOF-induced defaults still produce the html/head/body skeleton.
    let html = child_elem(&dom.document, "html");
    child_elem(&html, "head");
    child_elem(&html, "body");
}

#[test]
fn foster_parenting_moves_stray_table_text() {
    let dom = parse("<table>X<tr><td>Y</td></tr></table>");

    let body = body_of(&dom);
    let children = body.children.borrow();

    // "X" is hoisted out as the previous sibling of the table.
    match children[0].data {
        NodeData::Text { ref contents } => assert_eq!(&**contents.borrow(), "X"),
        ref other => panic!("expected foster-parented text, got {other:?}"),
    }
    assert_eq!(elem_name(&children[1]).as_deref(), Some("table"));

    // The row structure is intact, with the implied tbody.
    let table = children[1].clone();
    let tbody = child_elem(&table, "tbody");
    let tr = child_elem(&tbody, "tr");
    let td = child_elem(&tr, "td");
    assert_eq!(text_of(&td), "Y");

    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::TokenNotPossible));
}

#[test]
fn adoption_agency_repairs_misnested_formatting() {
    let dom = parse("<p>1<b>2<i>3</b>4</i>5</p>");

    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(dump(&p), r#"(p "1" (b "2" (i "3")) (i "4") "5")"#);
}

#[test]
fn adoption_agency_bi_misnesting() {
    let dom = parse("<b><i></b></i>");

    let body = body_of(&dom);
    let b = child_elem(&body, "b");
    child_elem(&b, "i");
}

#[test]
fn style_contents_are_a_single_raw_text_node() {
    let dom = parse(
        "<!DOCTYPE html><html><head><style>body{background-color:green !important;}</style></head><body></body></html>",
    );

    assert!(dom.errors.borrow().is_empty(), "{:?}", dom.errors.borrow());
    let html = child_elem(&dom.document, "html");
    let head = child_elem(&html, "head");
    let style = child_elem(&head, "style");

    let children = style.children.borrow();
    assert_eq!(children.len(), 1);
    match children[0].data {
        NodeData::Text { ref contents } => {
            // The payload reaches the CSS collaborator verbatim.
            assert_eq!(
                &**contents.borrow(),
                "body{background-color:green !important;}"
            );
        },
        ref other => panic!("expected raw text, got {other:?}"),
    }
}

#[test]
fn nested_headings_report_and_recover() {
    let dom = parse("<h1>a<h2>b</h2>");
    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::HeadingNested));

    let body = body_of(&dom);
    // The h1 was closed by the h2; they end up as siblings.
    let elems = elem_children(&body);
    let names: Vec<_> = elems.iter().filter_map(elem_name).collect();
    assert_eq!(names, vec!["h1", "h2"]);
}

#[test]
fn nested_forms_are_rejected() {
    let dom = parse("<form><form></form></form>");
    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::FormAlreadyOpen));

    let body = body_of(&dom);
    let form = child_elem(&body, "form");
    assert!(find_child_elem(&form, "form").is_none());
}

#[test]
fn nested_anchor_triggers_agency() {
    let dom = parse("<a>1<a>2</a>");
    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::AnchorNested));

    let body = body_of(&dom);
    let anchors = elem_children(&body);
    assert_eq!(anchors.len(), 2);
    assert_eq!(text_of(&anchors[0]), "1");
    assert_eq!(text_of(&anchors[1]), "2");
}

#[test]
fn stray_doctype_is_ignored_with_an_error() {
    let dom = parse("<!DOCTYPE html><p>x</p><!DOCTYPE html>");
    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::DoctypeTagInappropriate));
    // Exactly one doctype node.
    let doctypes = dom
        .document
        .children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Doctype { .. }))
        .count();
    assert_eq!(doctypes, 1);
}

#[test]
fn single_html_and_body_despite_repeats() {
    let dom = parse("<html><body><p>x<body onload=a><html lang=en>");

    let htmls = dom
        .document
        .children
        .borrow()
        .iter()
        .filter(|child| elem_name(child).as_deref() == Some("html"))
        .count();
    assert_eq!(htmls, 1);

    let html = child_elem(&dom.document, "html");
    let bodies = html
        .children
        .borrow()
        .iter()
        .filter(|child| elem_name(child).as_deref() == Some("body"))
        .count();
    assert_eq!(bodies, 1);

    // Attribute merging from the repeated tags is first-write-wins on the
    // existing elements.
    match html.data {
        NodeData::Element { ref attrs, .. } => {
            assert!(attrs.borrow().iter().any(|a| &*a.name.local == "lang"));
        },
        _ => unreachable!(),
    }
}

#[test]
fn table_in_table_recovers() {
    let dom = parse("<table><table>");
    assert!(dom
        .errors
        .borrow()
        .iter()
        .any(|e| e.code == ErrorCode::TableNesting));
    let body = body_of(&dom);
    // The inner <table> closes the outer; both become siblings.
    assert_eq!(elem_children(&body).len(), 2);
}

#[test]
fn errors_carry_positions() {
    let dom = parse("<!DOCTYPE html>\n<p>a\n<tr>");
    let errors = dom.errors.borrow();
    assert!(!errors.is_empty());
    // The stray <tr> is on line 3.
    let err = errors.last().unwrap();
    assert_eq!(err.line, 3);
    assert!(err.column > 1);
}

#[test]
fn readiness_reaches_complete() {
    let dom = parse("<!DOCTYPE html><p>done");
    assert_eq!(dom.ready_state.get(), ReadyState::Complete);
}

#[test]
fn plaintext_swallows_the_rest() {
    let dom = parse("<plaintext><p>not markup</p>");
    let body = body_of(&dom);
    let plaintext = child_elem(&body, "plaintext");
    assert_eq!(text_of(&plaintext), "<p>not markup</p>");
}

#[test]
fn template_contents_live_outside_the_document() {
    let dom = parse("<!DOCTYPE html><template><td>cell</td></template>");
    let html = child_elem(&dom.document, "html");
    let head = child_elem(&html, "head");
    let template = child_elem(&head, "template");

    // The template element itself has no children...
    assert!(template.children.borrow().is_empty());

    // ...its parsed contents hang off the separate contents fragment,
    // where the InTemplate rules rebuilt the cell.
    match template.data {
        NodeData::Element {
            ref template_contents,
            ..
        } => {
            let contents = template_contents.borrow();
            let contents = contents.as_ref().expect("template has contents");
            let td = child_elem(contents, "td");
            assert_eq!(text_of(&td), "cell");
        },
        _ => unreachable!(),
    }
}

#[test]
fn foreign_content_svg_and_escape() {
    let dom = parse("<!DOCTYPE html><p><svg><title>t</title></svg><i>x</i>");
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    let svg = child_elem(&p, "svg");
    let title = child_elem(&svg, "title");
    assert_eq!(text_of(&title), "t");
    let i = child_elem(&p, "i");
    assert_eq!(text_of(&i), "x");
}

#[test]
fn svg_tag_names_are_case_adjusted() {
    let dom = parse("<!DOCTYPE html><svg><foreignobject><p>hi</p></foreignobject></svg>");
    let body = body_of(&dom);
    let svg = child_elem(&body, "svg");
    let foreign_object = child_elem(&svg, "foreignObject");
    let p = child_elem(&foreign_object, "p");
    assert_eq!(text_of(&p), "hi");
}

#[test]
fn frameset_replaces_body_while_ok() {
    let dom = parse("<html><frameset><frame></frameset>");
    let html = child_elem(&dom.document, "html");
    assert!(find_child_elem(&html, "body").is_none());
    let frameset = child_elem(&html, "frameset");
    child_elem(&frameset, "frame");
}

#[test]
fn select_in_table_is_hoisted_out() {
    let dom = parse("<table><select><option>o</select><tr><td>c</td></tr></table>");
    let body = body_of(&dom);
    // The select is foster-parented before the table.
    let elems = elem_children(&body);
    let names: Vec<_> = elems.iter().filter_map(elem_name).collect();
    assert_eq!(names, vec!["select", "table"]);
}

#[test]
fn reparse_equals_parse() {
    for input in [
        "<!DOCTYPE html><p>1<b>2<i>3</b>4</i>5</p>",
        "<table>X<tr><td>Y</td></tr></table>",
        "<!DOCTYPE html><ul><li>a<li>b</ul><pre>\nkeep</pre>",
        "<!DOCTYPE html><svg><foreignobject><p>hi</p></foreignobject></svg>",
    ] {
        let first = parse(input);
        let serialized = sapling::dom::serialize_to_string(&first);
        let second = parse(&serialized);
        assert_eq!(
            dump(&first.document),
            dump(&second.document),
            "round-trip diverged for {input:?} via {serialized:?}"
        );
    }
}

#[test]
fn exact_errors_expand_messages() {
    let mut opts = ParseOpts::default();
    opts.tree_builder.exact_errors = true;
    let dom: RcDom = parse_document(RcDom::default(), opts).one("<tr>");
    let errors = dom.errors.borrow();
    assert!(errors
        .iter()
        .any(|e| e.message.contains("insertion mode") || e.message.contains("Unexpected")));
}
