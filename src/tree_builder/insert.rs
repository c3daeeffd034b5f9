// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Node creation and insertion, including foster parenting, plus the
//! small structural repairs (implied end tags, closing `<p>`, closing a
//! table cell) the mode handlers lean on.

use std::borrow::Cow::Borrowed;

use mac::format_if;

use crate::errors::ErrorCode;
use crate::interface::{create_element, Attribute, NodeOrText, QualName, TreeSink};
use crate::interface::{AppendNode, AppendText};
use crate::tendril::StrTendril;
use crate::tokenizer::states::RawKind;
use crate::tokenizer::Tag;
use crate::tree_builder::names;
use crate::tree_builder::stack::{OpenElement, Scope};
use crate::tree_builder::types::{InsertPoint, InsertionMode, Step};
use crate::tree_builder::TreeBuilder;
use crate::{expanded_name, local_name, ns, LocalName, Namespace};

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    //§ appropriate-place-for-inserting-a-node
    /// Where would a node inserted right now land? With the fostering
    /// flag up and a table-structural target, the answer is diverted to
    /// just before the nearest table.
    pub(crate) fn insertion_point(
        &self,
        override_target: Option<OpenElement<Handle>>,
    ) -> InsertPoint<Handle> {
        let target = override_target.unwrap_or_else(|| self.open.current());

        let diverted = self.fostering.get()
            && target.ns == ns!(html)
            && names::is_foster_parent_trigger(&target.name);
        if !diverted {
            if target.is_html(&local_name!("template")) {
                return InsertPoint::AppendTo(self.sink.get_template_contents(&target.handle));
            }
            return InsertPoint::AppendTo(target.handle);
        }

        // Hunt down the stack for the table to land in front of; a
        // template found first swallows the insertion instead.
        for depth in (0..self.open.len()).rev() {
            let entry = self.open.get(depth);
            if entry.is_html(&local_name!("template")) {
                return InsertPoint::AppendTo(self.sink.get_template_contents(&entry.handle));
            }
            if entry.is_html(&local_name!("table")) {
                return InsertPoint::BeforeTable {
                    table: entry.handle,
                    fallback: self.open.get(depth - 1).handle,
                };
            }
        }
        InsertPoint::AppendTo(self.open.root())
    }

    pub(crate) fn place(&self, point: InsertPoint<Handle>, child: NodeOrText<Handle>) {
        match point {
            InsertPoint::AppendTo(parent) => self.sink.append(&parent, child),
            InsertPoint::BeforeTable { table, fallback } => {
                self.sink.append_based_on_parent_node(&table, &fallback, child)
            },
        }
    }
    //§ END

    pub(crate) fn add_text(&self, text: StrTendril) -> Step<Handle> {
        let point = self.insertion_point(None);
        self.place(point, AppendText(text));
        Step::Done
    }

    pub(crate) fn add_comment(&self, text: StrTendril) -> Step<Handle> {
        let comment = self.sink.create_comment(text);
        let point = self.insertion_point(None);
        self.place(point, AppendNode(comment));
        Step::Done
    }

    pub(crate) fn add_comment_to_doc(&self, text: StrTendril) -> Step<Handle> {
        let comment = self.sink.create_comment(text);
        self.sink.append(&self.document, AppendNode(comment));
        Step::Done
    }

    pub(crate) fn add_comment_to_root(&self, text: StrTendril) -> Step<Handle> {
        let comment = self.sink.create_comment(text);
        self.sink.append(&self.open.root(), AppendNode(comment));
        Step::Done
    }

    //§ creating-and-inserting-nodes
    pub(crate) fn create_root(&self, attrs: Vec<Attribute>) {
        let root = create_element(
            &self.sink,
            QualName::new(None, ns!(html), local_name!("html")),
            attrs,
        );
        self.open.push(OpenElement {
            handle: root.clone(),
            ns: ns!(html),
            name: local_name!("html"),
        });
        self.sink.append(&self.document, AppendNode(root));
    }

    /// Insert an element for a token and leave it open.
    pub(crate) fn open_html_element(&self, tag: Tag) -> Handle {
        self.insert_element(ns!(html), tag.name, tag.attrs, true)
    }

    /// Insert an element for a token and close it immediately (void
    /// elements and the like).
    pub(crate) fn void_html_element(&self, tag: Tag) -> Handle {
        self.insert_element(ns!(html), tag.name, tag.attrs, false)
    }

    /// Insert an attribute-less element the rules conjured up, e.g. the
    /// implied `<head>` or `<tbody>`.
    pub(crate) fn synthesize(&self, name: LocalName) -> Handle {
        self.insert_element(ns!(html), name, vec![], true)
    }

    pub(crate) fn insert_element(
        &self,
        ns: Namespace,
        name: LocalName,
        attrs: Vec<Attribute>,
        keep_open: bool,
    ) -> Handle {
        let elem = create_element(
            &self.sink,
            QualName::new(None, ns.clone(), name.clone()),
            attrs.clone(),
        );
        let point = self.insertion_point(None);
        self.associate_form_owner(&elem, &ns, &name, &attrs, &point);
        self.place(point, AppendNode(elem.clone()));
        if keep_open {
            self.open.push(OpenElement {
                handle: elem.clone(),
                ns,
                name,
            });
        }
        elem
    }

    /// Tie a form-associatable element to the open form, unless a
    /// template intervenes or a `form` attribute opts a listed element
    /// out.
    fn associate_form_owner(
        &self,
        elem: &Handle,
        ns: &Namespace,
        name: &LocalName,
        attrs: &[Attribute],
        point: &InsertPoint<Handle>,
    ) {
        if *ns != ns!(html) {
            return;
        }
        let associatable = matches!(
            *name,
            local_name!("button")
                | local_name!("fieldset")
                | local_name!("input")
                | local_name!("object")
                | local_name!("output")
                | local_name!("select")
                | local_name!("textarea")
                | local_name!("img")
        );
        if !associatable {
            return;
        }
        let Some(form) = self.form.borrow().clone() else {
            return;
        };
        if self.open.contains_html(&local_name!("template")) {
            return;
        }
        let listed = *name != local_name!("img");
        if listed
            && attrs
                .iter()
                .any(|a| a.name.expanded() == expanded_name!("", "form"))
        {
            return;
        }
        match point {
            InsertPoint::AppendTo(parent) => {
                self.sink.associate_with_form(elem, &form, (parent, None));
            },
            InsertPoint::BeforeTable { table, fallback } => {
                self.sink
                    .associate_with_form(elem, &form, (table, Some(fallback)));
            },
        }
    }
    //§ END

    //§ stack manipulation
    /// Close the current node, telling the sink.
    pub(crate) fn pop(&self) -> OpenElement<Handle> {
        let entry = self.open.pop().expect("popped an empty stack");
        self.sink.pop(&entry.handle);
        entry
    }

    /// Remove a specific element from wherever it sits on the stack.
    pub(crate) fn remove_from_stack(&self, handle: &Handle) {
        if let Some(depth) = self
            .open
            .position_from_top(|e| self.sink.same_node(&e.handle, handle))
        {
            let entry = self.open.remove(depth);
            self.sink.pop(&entry.handle);
        }
    }

    /// Pop until an HTML element with this name has come off; the count
    /// popped is the caller's evidence of mis-nesting.
    pub(crate) fn pop_until_html(&self, name: &LocalName) -> usize {
        let mut popped = 0;
        while let Some(entry) = self.open.pop() {
            popped += 1;
            if entry.is_html(name) {
                break;
            }
        }
        popped
    }

    pub(crate) fn expect_to_close(&self, name: LocalName) {
        if self.pop_until_html(&name) != 1 {
            self.report(
                ErrorCode::TagDoesNotMatchCurrentNode,
                format_if!(
                    self.opts.exact_errors,
                    "Unexpected open element",
                    "Unexpected open element while closing {:?}",
                    name
                ),
            );
        }
    }
    //§ END

    //§ generate-implied-end-tags
    pub(crate) fn pop_implied_ends(&self) {
        self.pop_implied_where(|name| names::ends_implied(name));
    }

    pub(crate) fn pop_implied_ends_except(&self, keep: &LocalName) {
        self.pop_implied_where(|name| *name != *keep && names::ends_implied(name));
    }

    pub(crate) fn pop_implied_ends_thoroughly(&self) {
        self.pop_implied_where(names::ends_implied_thoroughly);
    }

    fn pop_implied_where<F>(&self, implied: F)
    where
        F: Fn(&LocalName) -> bool,
    {
        while !self.open.is_empty() {
            let current = self.open.current();
            if current.ns == ns!(html) && implied(&current.name) {
                self.pop();
            } else {
                return;
            }
        }
    }
    //§ END

    pub(crate) fn close_p_element(&self) {
        self.pop_implied_ends_except(&local_name!("p"));
        self.expect_to_close(local_name!("p"));
    }

    pub(crate) fn close_p_if_in_button_scope(&self) {
        if self.open.in_scope_html(Scope::Button, &local_name!("p")) {
            self.close_p_element();
        }
    }

    pub(crate) fn close_the_cell(&self) {
        self.pop_implied_ends();
        let popped = {
            let mut popped = 0;
            while let Some(entry) = self.open.pop() {
                popped += 1;
                if entry.ns == ns!(html) && names::is_cell(&entry.name) {
                    break;
                }
            }
            popped
        };
        if popped != 1 {
            self.report(
                ErrorCode::TagClosingMismatch,
                Borrowed("expected to close <td> or <th> with cell"),
            );
        }
        self.formatting.clear_to_last_marker();
    }

    /// Closing the body with elements still open is an error for all but
    /// a tolerated few; only the first offender is reported.
    pub(crate) fn audit_body_end(&self) {
        for depth in 0..self.open.len() {
            let entry = self.open.get(depth);
            if entry.ns == ns!(html) && names::is_open_at_body_end_ok(&entry.name) {
                continue;
            }
            self.report(
                ErrorCode::BodyEndedUnexpectedly,
                format_if!(
                    self.opts.exact_errors,
                    "Unexpected open tag at end of body",
                    "Unexpected open tag <{}> at end of body",
                    entry.name
                ),
            );
            return;
        }
    }

    /// The "any other end tag" rule of InBody: close the nearest match,
    /// but give up at a special element.
    pub(crate) fn any_other_end_tag(&self, name: LocalName) {
        for depth in (0..self.open.len()).rev() {
            let entry = self.open.get(depth);
            if entry.is_html(&name) {
                self.pop_implied_ends_except(&name);
                if depth != self.open.len() - 1 {
                    self.report_unexpected(ErrorCode::TagClosingMismatch, &name);
                }
                self.open.truncate(depth);
                return;
            }
            if names::is_special(&entry.ns, &entry.name) {
                self.report(
                    ErrorCode::TagClosedWrong,
                    Borrowed("Found special tag while closing generic tag"),
                );
                return;
            }
        }
        // Walking off the stack without meeting a special element can
        // only happen in fragment parsing.
        self.report_unexpected(ErrorCode::TokenNotPossible, &name);
    }

    //§ parsing-elements-that-contain-only-text
    /// Enter the Text mode for a raw-text or RCDATA element, remembering
    /// the mode to come back to. The tokenizer state change takes effect
    /// when the current token finishes processing.
    pub(crate) fn begin_text_mode(&self, kind: RawKind) -> Step<Handle> {
        self.original_mode.set(Some(self.insertion_mode.get()));
        self.insertion_mode.set(InsertionMode::Text);
        Step::ToRawText(kind)
    }

    pub(crate) fn open_raw_text(&self, tag: Tag, kind: RawKind) -> Step<Handle> {
        self.open_html_element(tag);
        self.begin_text_mode(kind)
    }
    //§ END
}
