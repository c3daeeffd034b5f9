// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A reference-counted DOM, and the default [`TreeSink`].
//!
//! Good enough to hold a parse result; not a DOM to build a browser on.
//! Nodes own their children and point weakly at their parents, so the
//! parent-child edges decide lifetime even while the tree builder holds
//! extra strong references on its stack and formatting list.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::mem;
use std::rc::{Rc, Weak};

use tendril::StrTendril;

use crate::errors::ParseError;
use crate::interface::{ElementFlags, NodeOrText, QuirksMode, ReadyState, TreeSink};
use crate::interface::{ExpandedName, QualName};
use crate::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope};
use crate::Attribute;

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The document root.
    Document,

    /// `<!DOCTYPE ...>`.
    Doctype {
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    },

    /// A text node.
    Text { contents: RefCell<StrTendril> },

    /// `<!-- ... -->`.
    Comment { contents: StrTendril },

    /// An element.
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,

        /// For `<template>`, the separate fragment its parsed contents
        /// hang from.
        template_contents: RefCell<Option<Handle>>,

        /// Is this an `<annotation-xml>` whose `encoding` makes it an
        /// HTML integration point?
        mathml_annotation_xml_integration_point: bool,

        /// A script the parser already started must not run again if the
        /// host meets it a second time.
        script_already_started: Cell<bool>,
    },
}

/// A DOM node: its payload plus tree edges.
pub struct Node {
    /// Weak link upward; `None` while detached.
    pub parent: RefCell<Option<WeakHandle>>,
    /// Strong links downward, in tree order.
    pub children: RefCell<Vec<Handle>>,
    /// The payload.
    pub data: NodeData,
}

/// Reference to a DOM node.
pub type Handle = Rc<Node>;

/// Weak reference to a DOM node, used for parent pointers.
pub type WeakHandle = Weak<Node>;

impl Node {
    pub fn new(data: NodeData) -> Handle {
        Rc::new(Node {
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            data,
        })
    }

    /// The element's qualified name, if this is an element.
    pub fn name(&self) -> Option<&QualName> {
        match self.data {
            NodeData::Element { ref name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    // Formatting the parent link too would recurse forever.
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Node")
            .field("data", &self.data)
            .field("children", &self.children)
            .finish()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Hand the subtree to an iterative worklist; recursive drops
        // would overflow the stack on a pathologically deep document.
        let mut doomed = mem::take(&mut *self.children.borrow_mut());
        while let Some(node) = doomed.pop() {
            doomed.extend(mem::take(&mut *node.children.borrow_mut()));
            if let NodeData::Element {
                ref template_contents,
                ..
            } = node.data
            {
                doomed.extend(template_contents.borrow_mut().take());
            }
        }
    }
}

fn parent_of(node: &Node) -> Option<Handle> {
    node.parent.borrow().as_ref().and_then(Weak::upgrade)
}

/// The node's parent and its index among that parent's children.
fn position_in_parent(node: &Handle) -> Option<(Handle, usize)> {
    let parent = parent_of(node)?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))
        .expect("node not among its parent's children");
    Some((parent, index))
}

/// Hook a parentless node under `parent` as the last child.
fn attach(parent: &Handle, child: Handle) {
    debug_assert!(
        child.parent.borrow().is_none(),
        "attaching a node that still has a parent"
    );
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

fn detach(node: &Handle) {
    if let Some((parent, index)) = position_in_parent(node) {
        parent.children.borrow_mut().remove(index);
        *node.parent.borrow_mut() = None;
    }
}

/// Absorb text into a node if it is a text node.
fn extend_text_node(node: &Node, text: &str) -> bool {
    match node.data {
        NodeData::Text { ref contents } => {
            contents.borrow_mut().push_slice(text);
            true
        },
        _ => false,
    }
}

fn new_text_node(text: StrTendril) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(text),
    })
}

/// The DOM itself; the result of parsing.
pub struct RcDom {
    /// The document node.
    pub document: Handle,

    /// Parse errors, in source order.
    pub errors: RefCell<Vec<ParseError>>,

    /// Quirks mode, as decided by the doctype.
    pub quirks_mode: Cell<QuirksMode>,

    /// Readiness, advanced by end-of-stream finalization.
    pub ready_state: Cell<ReadyState>,
}

impl Default for RcDom {
    fn default() -> RcDom {
        RcDom {
            document: Node::new(NodeData::Document),
            errors: Default::default(),
            quirks_mode: Cell::new(QuirksMode::NoQuirks),
            ready_state: Cell::new(ReadyState::Loading),
        }
    }
}

impl TreeSink for RcDom {
    type Output = Self;
    fn finish(self) -> Self {
        self
    }

    type Handle = Handle;

    type ElemName<'a>
        = ExpandedName<'a>
    where
        Self: 'a;

    fn parse_error(&self, error: ParseError) {
        self.errors.borrow_mut().push(error);
    }

    fn get_document(&self) -> Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&self, target: &'a Handle) -> ExpandedName<'a> {
        target.name().expect("not an element!").expanded()
    }

    fn same_node(&self, x: &Handle, y: &Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
    }

    fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.set(state);
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> Handle {
        let template_contents = flags.template.then(|| Node::new(NodeData::Document));
        Node::new(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents: RefCell::new(template_contents),
            mathml_annotation_xml_integration_point: flags.mathml_annotation_xml_integration_point,
            script_already_started: Cell::new(false),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Handle {
        Node::new(NodeData::Comment { contents: text })
    }

    fn get_template_contents(&self, target: &Handle) -> Handle {
        let NodeData::Element {
            ref template_contents,
            ..
        } = target.data
        else {
            panic!("not a template element!");
        };
        template_contents
            .borrow()
            .clone()
            .expect("not a template element!")
    }

    fn append(&self, parent: &Handle, child: NodeOrText<Handle>) {
        match child {
            NodeOrText::AppendText(text) => {
                // Merge into a trailing text node when there is one.
                let absorbed = match parent.children.borrow().last() {
                    Some(last) => extend_text_node(last, &text),
                    None => false,
                };
                if !absorbed {
                    attach(parent, new_text_node(text));
                }
            },
            NodeOrText::AppendNode(node) => attach(parent, node),
        }
    }

    fn append_before_sibling(&self, sibling: &Handle, child: NodeOrText<Handle>) {
        let (parent, index) =
            position_in_parent(sibling).expect("append_before_sibling needs a parented sibling");

        let node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => {
                // The previous sibling may be a text node to merge with;
                // the tree builder promises the next one is not.
                if index > 0 {
                    let children = parent.children.borrow();
                    if extend_text_node(&children[index - 1], &text) {
                        return;
                    }
                }
                new_text_node(text)
            },
        };

        detach(&node);
        *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
        parent.children.borrow_mut().insert(index, node);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Handle,
        prev_element: &Handle,
        child: NodeOrText<Handle>,
    ) {
        if parent_of(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        attach(
            &self.document,
            Node::new(NodeData::Doctype {
                name,
                public_id,
                system_id,
            }),
        );
    }

    fn mark_script_already_started(&self, node: &Handle) {
        if let NodeData::Element {
            ref script_already_started,
            ..
        } = node.data
        {
            script_already_started.set(true);
        }
    }

    fn add_attrs_if_missing(&self, target: &Handle, attrs: Vec<Attribute>) {
        let NodeData::Element {
            attrs: ref existing,
            ..
        } = target.data
        else {
            panic!("not an element");
        };
        let mut existing = existing.borrow_mut();
        for attr in attrs {
            if existing.iter().all(|present| present.name != attr.name) {
                existing.push(attr);
            }
        }
    }

    fn remove_from_parent(&self, target: &Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Handle, new_parent: &Handle) {
        let mut moved = mem::take(&mut *node.children.borrow_mut());
        for child in &moved {
            *child.parent.borrow_mut() = Some(Rc::downgrade(new_parent));
        }
        new_parent.children.borrow_mut().append(&mut moved);
    }

    fn is_mathml_annotation_xml_integration_point(&self, target: &Handle) -> bool {
        match target.data {
            NodeData::Element {
                mathml_annotation_xml_integration_point,
                ..
            } => mathml_annotation_xml_integration_point,
            _ => panic!("not an element!"),
        }
    }
}

enum SerializeStep {
    Enter(Handle),
    Leave(QualName),
}

/// Adds the serializer entry point to [`Handle`].
pub struct SerializableHandle(Handle);

impl From<Handle> for SerializableHandle {
    fn from(handle: Handle) -> SerializableHandle {
        SerializableHandle(handle)
    }
}

impl Serialize for SerializableHandle {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        // Depth-first over an explicit stack; Leave markers close the
        // elements on the way back out.
        let mut work: Vec<SerializeStep> = Vec::new();
        match traversal_scope {
            TraversalScope::IncludeNode => work.push(SerializeStep::Enter(self.0.clone())),
            TraversalScope::ChildrenOnly => {
                let children = self.0.children.borrow();
                work.extend(
                    children
                        .iter()
                        .rev()
                        .map(|child| SerializeStep::Enter(child.clone())),
                );
            },
        }

        while let Some(step) = work.pop() {
            match step {
                SerializeStep::Enter(node) => match node.data {
                    NodeData::Element {
                        ref name,
                        ref attrs,
                        ..
                    } => {
                        serializer.start_elem(
                            name.clone(),
                            attrs.borrow().iter().map(|a| (&a.name, &a.value[..])),
                        )?;
                        work.push(SerializeStep::Leave(name.clone()));
                        let children = node.children.borrow();
                        work.extend(
                            children
                                .iter()
                                .rev()
                                .map(|child| SerializeStep::Enter(child.clone())),
                        );
                    },
                    NodeData::Doctype { ref name, .. } => serializer.write_doctype(name)?,
                    NodeData::Text { ref contents } => serializer.write_text(&contents.borrow())?,
                    NodeData::Comment { ref contents } => serializer.write_comment(contents)?,
                    NodeData::Document => panic!("can't serialize the Document node itself"),
                },
                SerializeStep::Leave(name) => serializer.end_elem(name)?,
            }
        }

        Ok(())
    }
}

/// Serialize a document's children (the usual whole-parse entry point)
/// to a string.
pub fn serialize_to_string(dom: &RcDom) -> String {
    let mut out = vec![];
    crate::serialize::serialize(
        &mut out,
        &SerializableHandle(dom.document.clone()),
        SerializeOpts::default(),
    )
    .expect("serialization to a Vec cannot fail");
    String::from_utf8(out).expect("serializer emits UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_merges_adjacent_text() {
        let dom = RcDom::default();
        let parent = dom.get_document();
        dom.append(
            &parent,
            NodeOrText::AppendText(StrTendril::from_slice("Hello, ")),
        );
        dom.append(
            &parent,
            NodeOrText::AppendText(StrTendril::from_slice("World!")),
        );
        let children = parent.children.borrow();
        assert_eq!(children.len(), 1);
        match children[0].data {
            NodeData::Text { ref contents } => {
                assert_eq!(&**contents.borrow(), "Hello, World!");
            },
            _ => panic!("expected text node"),
        }
    }

    #[test]
    fn reparent_moves_all_children() {
        let dom = RcDom::default();
        let a = dom.create_element(
            QualName::new(None, crate::ns!(html), crate::local_name!("div")),
            vec![],
            ElementFlags::default(),
        );
        let b = dom.create_element(
            QualName::new(None, crate::ns!(html), crate::local_name!("span")),
            vec![],
            ElementFlags::default(),
        );
        dom.append(&a, NodeOrText::AppendText(StrTendril::from_slice("x")));
        dom.append(&a, NodeOrText::AppendText(StrTendril::from_slice("y")));
        dom.reparent_children(&a, &b);
        assert!(a.children.borrow().is_empty());
        assert_eq!(b.children.borrow().len(), 1);
    }

    #[test]
    fn detach_clears_the_parent_link() {
        let dom = RcDom::default();
        let parent = dom.get_document();
        let child = dom.create_element(
            QualName::new(None, crate::ns!(html), crate::local_name!("div")),
            vec![],
            ElementFlags::default(),
        );
        dom.append(&parent, NodeOrText::AppendNode(child.clone()));
        assert!(child.parent.borrow().is_some());
        dom.remove_from_parent(&child);
        assert!(child.parent.borrow().is_none());
        assert!(parent.children.borrow().is_empty());
    }
}
