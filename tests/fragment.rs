// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fragment parsing: the synthetic root, the reset algorithm, and the
//! tokenizer preconfiguration from the context element.

mod common;

use common::*;

use sapling::dom::RcDom;
use sapling::driver::{parse_fragment, ParseOpts};
use sapling::interface::QualName;
use sapling::tendril::TendrilSink;
use sapling::{local_name, ns};

fn parse_fragment_in(context: &str, input: &str) -> RcDom {
    parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), sapling::LocalName::from(context)),
        vec![],
    )
    .one(input)
}

#[test]
fn td_in_tr_context() {
    let dom = parse_fragment_in("tr", "<td>hi</td>");

    assert!(dom.errors.borrow().is_empty(), "{:?}", dom.errors.borrow());

    // The fragment hangs off the synthetic root.
    let root = child_elem(&dom.document, "html");
    let children = elem_children(&root);
    assert_eq!(children.len(), 1);
    assert_eq!(elem_name(&children[0]).as_deref(), Some("td"));
    assert_eq!(text_of(&children[0]), "hi");
}

#[test]
fn tr_in_tbody_context() {
    let dom = parse_fragment_in("tbody", "<tr><td>a</td><td>b</td></tr>");
    let root = child_elem(&dom.document, "html");
    let tr = child_elem(&root, "tr");
    assert_eq!(elem_children(&tr).len(), 2);
}

#[test]
fn options_in_select_context() {
    let dom = parse_fragment_in("select", "<option>a<option>b");
    let root = child_elem(&dom.document, "html");
    let options = elem_children(&root);
    let names: Vec<_> = options.iter().filter_map(elem_name).collect();
    assert_eq!(names, vec!["option", "option"]);
    assert_eq!(text_of(&options[0]), "a");
    assert_eq!(text_of(&options[1]), "b");
}

#[test]
fn title_context_preconfigures_rcdata() {
    // In a <title> context the tokenizer starts in RCDATA, so markup
    // stays character data.
    let dom = parse_fragment_in("title", "<b>not an element");
    let root = child_elem(&dom.document, "html");
    assert!(elem_children(&root).is_empty());
    assert_eq!(text_of(&root), "<b>not an element");
}

#[test]
fn script_context_preconfigures_script_data(){
    let dom = parse_fragment_in("script", "if (a < b) {}");
    let root = child_elem(&dom.document, "html");
    assert_eq!(text_of(&root), "if (a < b) {}");
}

#[test]
fn plain_div_context() {
    let dom = parse_fragment_in("div", "x<p>y</p>z");
    let root = child_elem(&dom.document, "html");
    assert_eq!(dump(&root), r#"(html "x" (p "y") "z")"#);
}

#[test]
fn fragment_composition_matches_subtree() {
    // Fragment-parsing the serialization of an element against its
    // parent's name reproduces the subtree.
    let doc = parse("<!DOCTYPE html><ul><li>one<li><b>two</b></ul>");
    let body = body_of(&doc);
    let ul = child_elem(&body, "ul");

    let serialized = {
        let mut bytes = vec![];
        sapling::serialize::serialize(
            &mut bytes,
            &sapling::dom::SerializableHandle::from(ul.clone()),
            sapling::serialize::SerializeOpts {
                traversal_scope: sapling::serialize::TraversalScope::ChildrenOnly,
                ..Default::default()
            },
        )
        .unwrap();
        String::from_utf8(bytes).unwrap()
    };

    let fragment = parse_fragment_in("ul", &serialized);
    let root = child_elem(&fragment.document, "html");

    let mut expected = String::new();
    for child in ul.children.borrow().iter() {
        expected.push_str(&dump(child));
    }
    let mut actual = String::new();
    for child in root.children.borrow().iter() {
        actual.push_str(&dump(child));
    }
    assert_eq!(expected, actual);
}
