// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Helpers shared by the integration suites: parse entry points and
//! tree inspection utilities over the reference-counted DOM.

#![allow(dead_code)]

use sapling::dom::{Handle, NodeData, RcDom};
use sapling::driver::{parse_document, ParseOpts};
use sapling::tendril::TendrilSink;

pub fn parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(input)
}

pub fn parse_with_opts(input: &str, opts: ParseOpts) -> RcDom {
    parse_document(RcDom::default(), opts).one(input)
}

/// The first element child with the given local name, or panic.
pub fn child_elem(parent: &Handle, name: &str) -> Handle {
    find_child_elem(parent, name)
        .unwrap_or_else(|| panic!("no <{name}> child under {:?}", parent.data))
}

pub fn find_child_elem(parent: &Handle, name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| elem_name(child).as_deref() == Some(name))
        .cloned()
}

pub fn elem_name(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn elem_children(parent: &Handle) -> Vec<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// All text directly under this node, concatenated.
pub fn text_of(node: &Handle) -> String {
    node.children
        .borrow()
        .iter()
        .filter_map(|child| match child.data {
            NodeData::Text { ref contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

/// The usual path into a parsed document.
pub fn body_of(dom: &RcDom) -> Handle {
    let html = child_elem(&dom.document, "html");
    child_elem(&html, "body")
}

/// Render the tree in a compact lisp-ish form for shape assertions:
/// elements as `(name child child ...)`, text as `"text"`, comments and
/// doctypes tagged. Whitespace-only text between elements is skipped so
/// that re-parse comparisons are insensitive to formatting.
pub fn dump(node: &Handle) -> String {
    let mut out = String::new();
    dump_into(node, &mut out);
    out
}

fn dump_into(node: &Handle, out: &mut String) {
    match node.data {
        NodeData::Document => {
            out.push_str("(#document");
            dump_children(node, out);
            out.push(')');
        },
        NodeData::Doctype { ref name, .. } => {
            out.push_str("(!doctype ");
            out.push_str(name);
            out.push(')');
        },
        NodeData::Text { ref contents } => {
            let contents = contents.borrow();
            if contents.chars().all(|c| c.is_ascii_whitespace()) {
                return;
            }
            out.push('"');
            out.push_str(&contents);
            out.push('"');
        },
        NodeData::Comment { ref contents } => {
            out.push_str("(!-- ");
            out.push_str(contents);
            out.push_str(" --)");
        },
        NodeData::Element { ref name, .. } => {
            out.push('(');
            out.push_str(&name.local);
            dump_children(node, out);
            out.push(')');
        },
    }
}

fn dump_children(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        let before = out.len();
        out.push(' ');
        let len_with_space = out.len();
        dump_into(child, out);
        if out.len() == len_with_space {
            out.truncate(before);
        }
    }
}
