// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The stack of open elements.
//!
//! Each entry caches the element's namespace and local name next to its
//! handle. Element names are immutable once created, so the cache cannot
//! go stale, and it lets every scope query and most of the mode handlers
//! run without calling back into the sink. Handles held here are back
//! references; the DOM's parent-child edges stay authoritative.

use std::cell::RefCell;

use crate::tree_builder::names;
use crate::{local_name, ns, LocalName, Namespace};

/// One entry on the stack: a node plus its cached identity.
pub(crate) struct OpenElement<Handle> {
    pub handle: Handle,
    pub ns: Namespace,
    pub name: LocalName,
}

impl<Handle: Clone> Clone for OpenElement<Handle> {
    fn clone(&self) -> Self {
        OpenElement {
            handle: self.handle.clone(),
            ns: self.ns.clone(),
            name: self.name.clone(),
        }
    }
}

impl<Handle> OpenElement<Handle> {
    pub(crate) fn is_html(&self, name: &LocalName) -> bool {
        self.ns == ns!(html) && self.name == *name
    }
}

/// A scope for "has an element in scope" queries. Walking the stack from
/// the top, the search for a target ends unsuccessfully at the first
/// boundary element of the scope.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum Scope {
    Default,
    ListItem,
    Button,
    Table,
    Select,
}

impl Scope {
    fn is_boundary(self, ns: &Namespace, name: &LocalName) -> bool {
        match self {
            // Select scope is inverted: everything is a boundary except
            // the two elements that may sit between a select and its
            // options.
            Scope::Select => {
                !(*ns == ns!(html)
                    && matches!(*name, local_name!("optgroup") | local_name!("option")))
            },

            Scope::Table => {
                *ns == ns!(html)
                    && matches!(
                        *name,
                        local_name!("html") | local_name!("table") | local_name!("template")
                    )
            },

            Scope::Default | Scope::ListItem | Scope::Button => {
                if *ns == ns!(html) {
                    let base = matches!(
                        *name,
                        local_name!("applet")
                            | local_name!("caption")
                            | local_name!("html")
                            | local_name!("table")
                            | local_name!("td")
                            | local_name!("th")
                            | local_name!("marquee")
                            | local_name!("object")
                            | local_name!("template")
                    );
                    return base
                        || match self {
                            Scope::ListItem => {
                                matches!(*name, local_name!("ol") | local_name!("ul"))
                            },
                            Scope::Button => *name == local_name!("button"),
                            _ => false,
                        };
                }
                // Foreign integration points cap every one of these
                // scopes.
                names::is_mathml_text_integration_point(ns, name)
                    || names::is_annotation_xml(ns, name)
                    || names::is_svg_html_integration_point(ns, name)
            },
        }
    }
}

pub(crate) struct OpenElementStack<Handle> {
    elems: RefCell<Vec<OpenElement<Handle>>>,
}

impl<Handle> Default for OpenElementStack<Handle> {
    fn default() -> Self {
        OpenElementStack {
            elems: RefCell::new(Vec::new()),
        }
    }
}

impl<Handle: Clone> OpenElementStack<Handle> {
    pub(crate) fn is_empty(&self) -> bool {
        self.elems.borrow().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.elems.borrow().len()
    }

    pub(crate) fn push(&self, entry: OpenElement<Handle>) {
        self.elems.borrow_mut().push(entry);
    }

    /// Pop without notifying anyone; the caller decides whether the sink
    /// hears about it.
    pub(crate) fn pop(&self) -> Option<OpenElement<Handle>> {
        self.elems.borrow_mut().pop()
    }

    pub(crate) fn truncate(&self, depth: usize) {
        self.elems.borrow_mut().truncate(depth);
    }

    pub(crate) fn remove(&self, index: usize) -> OpenElement<Handle> {
        self.elems.borrow_mut().remove(index)
    }

    pub(crate) fn insert(&self, index: usize, entry: OpenElement<Handle>) {
        self.elems.borrow_mut().insert(index, entry);
    }

    pub(crate) fn replace(&self, index: usize, entry: OpenElement<Handle>) {
        self.elems.borrow_mut()[index] = entry;
    }

    pub(crate) fn get(&self, index: usize) -> OpenElement<Handle> {
        self.elems.borrow()[index].clone()
    }

    /// The current node. Panics on an empty stack; the rules only consult
    /// the current node when something is open.
    pub(crate) fn current(&self) -> OpenElement<Handle> {
        self.elems.borrow().last().expect("no current element").clone()
    }

    pub(crate) fn current_is_html(&self, name: &LocalName) -> bool {
        match self.elems.borrow().last() {
            Some(entry) => entry.is_html(name),
            None => false,
        }
    }

    /// The root of the stack, which is always the `<html>` element.
    pub(crate) fn root(&self) -> Handle {
        self.elems.borrow()[0].handle.clone()
    }

    pub(crate) fn contains_html(&self, name: &LocalName) -> bool {
        self.elems.borrow().iter().any(|entry| entry.is_html(name))
    }

    /// Index of the topmost entry satisfying `pred`.
    pub(crate) fn position_from_top<F>(&self, pred: F) -> Option<usize>
    where
        F: Fn(&OpenElement<Handle>) -> bool,
    {
        self.elems.borrow().iter().rposition(pred)
    }

    /// Visit every entry root-to-top, for tracing.
    pub(crate) fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&OpenElement<Handle>),
    {
        for entry in self.elems.borrow().iter() {
            visit(entry);
        }
    }

    /// The shallowest special element at or below `depth` on the stack
    /// (that is, searching away from the root).
    pub(crate) fn next_special_from(&self, depth: usize) -> Option<(usize, OpenElement<Handle>)> {
        let elems = self.elems.borrow();
        elems[depth..]
            .iter()
            .position(|entry| names::is_special(&entry.ns, &entry.name))
            .map(|offset| (depth + offset, elems[depth + offset].clone()))
    }

    /// Pop (silently) until the current node satisfies `keep`.
    pub(crate) fn shrink_until<F>(&self, keep: F)
    where
        F: Fn(&OpenElement<Handle>) -> bool,
    {
        let mut elems = self.elems.borrow_mut();
        while let Some(last) = elems.last() {
            if keep(last) {
                return;
            }
            elems.pop();
        }
    }

    //§ has-an-element-in-scope
    /// Is an HTML element with this name in the given scope?
    pub(crate) fn in_scope_html(&self, scope: Scope, target: &LocalName) -> bool {
        self.in_scope(scope, |entry| entry.is_html(target))
    }

    /// Is an element satisfying `pred` in the given scope?
    pub(crate) fn in_scope<F>(&self, scope: Scope, pred: F) -> bool
    where
        F: Fn(&OpenElement<Handle>) -> bool,
    {
        for entry in self.elems.borrow().iter().rev() {
            if pred(entry) {
                return true;
            }
            if scope.is_boundary(&entry.ns, &entry.name) {
                return false;
            }
        }
        // The root <html> element bounds every scope, so the walk cannot
        // actually fall off the end.
        false
    }
    //§ END
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(ns: Namespace, name: LocalName) -> OpenElement<u32> {
        OpenElement {
            handle: 0,
            ns,
            name,
        }
    }

    #[test]
    fn scope_boundaries() {
        assert!(Scope::Default.is_boundary(&ns!(html), &local_name!("table")));
        assert!(!Scope::Default.is_boundary(&ns!(html), &local_name!("ul")));
        assert!(Scope::ListItem.is_boundary(&ns!(html), &local_name!("ul")));
        assert!(Scope::Button.is_boundary(&ns!(html), &local_name!("button")));
        assert!(!Scope::Table.is_boundary(&ns!(html), &local_name!("td")));
        assert!(Scope::Select.is_boundary(&ns!(html), &local_name!("div")));
        assert!(!Scope::Select.is_boundary(&ns!(html), &local_name!("option")));
        // Foreign integration points cap the default scope.
        assert!(Scope::Default.is_boundary(&ns!(svg), &local_name!("title")));
        assert!(Scope::Default.is_boundary(&ns!(mathml), &local_name!("mi")));
    }

    #[test]
    fn scope_walks_stop_at_boundaries() {
        let stack: OpenElementStack<u32> = OpenElementStack::default();
        stack.push(entry(ns!(html), local_name!("html")));
        stack.push(entry(ns!(html), local_name!("body")));
        stack.push(entry(ns!(html), local_name!("p")));
        stack.push(entry(ns!(html), local_name!("table")));
        stack.push(entry(ns!(html), local_name!("td")));

        // The <p> is hidden behind the table boundary...
        assert!(!stack.in_scope_html(Scope::Default, &local_name!("p")));
        // ...but the table itself is in table scope.
        assert!(stack.in_scope_html(Scope::Table, &local_name!("table")));
        assert!(stack.in_scope_html(Scope::Default, &local_name!("td")));
    }

    #[test]
    fn next_special_skips_formatting() {
        let stack: OpenElementStack<u32> = OpenElementStack::default();
        stack.push(entry(ns!(html), local_name!("html")));
        stack.push(entry(ns!(html), local_name!("b")));
        stack.push(entry(ns!(html), local_name!("div")));
        let (depth, found) = stack.next_special_from(1).expect("div is special");
        assert_eq!(depth, 2);
        assert_eq!(found.name, local_name!("div"));
        assert!(stack.next_special_from(1).is_some());
        stack.truncate(2);
        assert!(stack.next_special_from(1).is_none());
    }
}
