// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The list of active formatting elements, and the two algorithms built
//! on it: reconstruction after an insertion point moved, and the
//! adoption agency, which repairs misnested formatting markup.

use std::borrow::Cow::Borrowed;
use std::cell::RefCell;

use crate::errors::ErrorCode;
use crate::interface::{create_element, AppendNode, QualName, TreeSink};
use crate::tokenizer::Tag;
use crate::tree_builder::stack::{OpenElement, Scope};
use crate::tree_builder::TreeBuilder;
use crate::{local_name, ns, LocalName};

/// A list slot: an element entry (with the tag it was created from, for
/// later cloning), or a marker bounding the reopenable region.
pub(crate) enum Slot<Handle> {
    Marker,
    Entry(Handle, Tag),
}

pub(crate) struct ActiveFormattingList<Handle> {
    slots: RefCell<Vec<Slot<Handle>>>,
}

impl<Handle> Default for ActiveFormattingList<Handle> {
    fn default() -> Self {
        ActiveFormattingList {
            slots: RefCell::new(Vec::new()),
        }
    }
}

impl<Handle: Clone> ActiveFormattingList<Handle> {
    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn push_marker(&self) {
        self.slots.borrow_mut().push(Slot::Marker);
    }

    pub(crate) fn push_entry(&self, handle: Handle, tag: Tag) {
        self.slots.borrow_mut().push(Slot::Entry(handle, tag));
    }

    pub(crate) fn insert(&self, index: usize, handle: Handle, tag: Tag) {
        self.slots.borrow_mut().insert(index, Slot::Entry(handle, tag));
    }

    pub(crate) fn replace(&self, index: usize, handle: Handle, tag: Tag) {
        self.slots.borrow_mut()[index] = Slot::Entry(handle, tag);
    }

    pub(crate) fn remove(&self, index: usize) {
        self.slots.borrow_mut().remove(index);
    }

    pub(crate) fn is_marker(&self, index: usize) -> bool {
        matches!(self.slots.borrow()[index], Slot::Marker)
    }

    pub(crate) fn handle_at(&self, index: usize) -> Option<Handle> {
        match &self.slots.borrow()[index] {
            Slot::Marker => None,
            Slot::Entry(handle, _) => Some(handle.clone()),
        }
    }

    pub(crate) fn tag_at(&self, index: usize) -> Tag {
        match &self.slots.borrow()[index] {
            Slot::Marker => panic!("marker has no tag"),
            Slot::Entry(_, tag) => tag.clone(),
        }
    }

    /// Drop entries back to (and including) the nearest marker.
    pub(crate) fn clear_to_last_marker(&self) {
        let mut slots = self.slots.borrow_mut();
        while let Some(slot) = slots.pop() {
            if matches!(slot, Slot::Marker) {
                break;
            }
        }
    }

    /// The most recent entry, above the nearest marker, whose tag name
    /// matches.
    pub(crate) fn latest_with_name(&self, name: &LocalName) -> Option<(usize, Handle, Tag)> {
        for (index, slot) in self.slots.borrow().iter().enumerate().rev() {
            match slot {
                Slot::Marker => return None,
                Slot::Entry(handle, tag) if tag.name == *name => {
                    return Some((index, handle.clone(), tag.clone()));
                },
                Slot::Entry(..) => {},
            }
        }
        None
    }

    /// Index of the entry whose handle satisfies `same`.
    pub(crate) fn position<F>(&self, same: F) -> Option<usize>
    where
        F: Fn(&Handle) -> bool,
    {
        self.slots.borrow().iter().position(|slot| match slot {
            Slot::Marker => false,
            Slot::Entry(handle, _) => same(handle),
        })
    }

    /// Visit every element entry, for tracing.
    pub(crate) fn for_each_handle<F>(&self, mut visit: F)
    where
        F: FnMut(&Handle),
    {
        for slot in self.slots.borrow().iter() {
            if let Slot::Entry(handle, _) = slot {
                visit(handle);
            }
        }
    }

    /// The Noah's-Ark clause: before a new entry for `tag` goes in, at
    /// most two equivalent entries may survive above the nearest marker,
    /// so the earliest of any three is evicted.
    pub(crate) fn thin_matching_entries(&self, tag: &Tag) {
        let mut earliest = None;
        let mut equivalent = 0;
        {
            let slots = self.slots.borrow();
            for (index, slot) in slots.iter().enumerate().rev() {
                match slot {
                    Slot::Marker => break,
                    Slot::Entry(_, existing) => {
                        if existing.equiv_modulo_attr_order(tag) {
                            earliest = Some(index);
                            equivalent += 1;
                        }
                    },
                }
            }
        }
        if equivalent >= 3 {
            self.remove(earliest.expect("counted entries without an index"));
        }
    }
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    pub(crate) fn formatting_index_of(&self, handle: &Handle) -> Option<usize> {
        self.formatting.position(|h| self.sink.same_node(h, handle))
    }

    fn entry_needs_rebuild(&self, index: usize) -> bool {
        if self.formatting.is_marker(index) {
            return false;
        }
        let handle = self.formatting.handle_at(index).expect("checked non-marker");
        self.open
            .position_from_top(|e| self.sink.same_node(&e.handle, &handle))
            .is_none()
    }

    /// Open a formatting element: Noah's Ark, then insertion, then the
    /// list entry.
    pub(crate) fn open_formatting_element(&self, tag: Tag) -> Handle {
        self.formatting.thin_matching_entries(&tag);
        let elem = self.open_html_element(tag.clone());
        self.formatting.push_entry(elem.clone(), tag);
        elem
    }

    //§ reconstruct-the-active-formatting-elements
    /// Reopen list entries whose elements are no longer on the stack:
    /// the run of closed entries after the last marker-or-open one each
    /// get a fresh clone inserted at the current insertion point.
    pub(crate) fn rebuild_formatting(&self) {
        let len = self.formatting.len();
        let mut first = len;
        for index in (0..len).rev() {
            if self.entry_needs_rebuild(index) {
                first = index;
            } else {
                break;
            }
        }

        for index in first..len {
            let tag = self.formatting.tag_at(index);
            let clone = self.open_html_element(tag.clone());
            self.formatting.replace(index, clone, tag);
        }
    }
    //§ END

    //§ adoption-agency-algorithm
    /// Repair misnested formatting markup for an end tag named `subject`.
    ///
    /// The bookmark — the list position where the rebuilt formatting
    /// element is reinserted — is tracked as an index and adjusted as
    /// entries around it are removed, rather than re-resolved through
    /// handle identity at the end.
    pub(crate) fn run_adoption_agency(&self, subject: LocalName) {
        // Trivial case: the subject is current and carries no list entry,
        // so closing it loses nothing.
        if self.open.current_is_html(&subject)
            && self
                .formatting_index_of(&self.open.current().handle)
                .is_none()
        {
            self.pop();
            return;
        }

        // Outer loop, at most eight repairs.
        for _ in 0..8 {
            let Some((fmt_slot, fmt_handle, fmt_tag)) = self.formatting.latest_with_name(&subject)
            else {
                // Nothing to repair; treat it like any other end tag.
                self.any_other_end_tag(subject);
                return;
            };

            let Some(fmt_depth) = self
                .open
                .position_from_top(|e| self.sink.same_node(&e.handle, &fmt_handle))
            else {
                self.report(
                    ErrorCode::FormattingElementNotOpen,
                    Borrowed("Formatting element not open"),
                );
                self.formatting.remove(fmt_slot);
                return;
            };

            if !self
                .open
                .in_scope(Scope::Default, |e| self.sink.same_node(&e.handle, &fmt_handle))
            {
                self.report(
                    ErrorCode::FormattingElementNotInScope,
                    Borrowed("Formatting element not in scope"),
                );
                return;
            }

            if !self.sink.same_node(&self.open.current().handle, &fmt_handle) {
                self.report(
                    ErrorCode::FormattingElementNotCurrent,
                    Borrowed("Formatting element not current node"),
                );
            }

            // The furthest block: the shallowest special element deeper
            // than the formatting element.
            let Some((block_depth, block)) = self.open.next_special_from(fmt_depth) else {
                // None: close everything from the formatting element up
                // and retire its entry.
                self.open.truncate(fmt_depth);
                self.formatting.remove(fmt_slot);
                return;
            };

            let ancestor = self.open.get(fmt_depth - 1);

            // The chain walk: starting at the furthest block, each stack
            // entry between it and the formatting element is either
            // evicted or cloned, and the chain of clones is re-linked
            // bottom-up.
            let mut bookmark = fmt_slot;
            let mut depth = block_depth;
            let mut last = block.handle.clone();
            let mut pass = 0u32;
            loop {
                pass += 1;
                depth -= 1;
                let node = self.open.get(depth);
                if self.sink.same_node(&node.handle, &fmt_handle) {
                    break;
                }

                let slot = self.formatting_index_of(&node.handle);
                if pass > 3 || slot.is_none() {
                    // Worn out or never reopenable: drop it from both
                    // structures.
                    if let Some(slot) = slot {
                        self.formatting.remove(slot);
                        if slot < bookmark {
                            bookmark -= 1;
                        }
                    }
                    self.open.remove(depth);
                    continue;
                }
                let slot = slot.expect("checked above");

                // Clone this entry; the clone replaces the original in
                // both the list and the stack.
                let tag = self.formatting.tag_at(slot);
                let clone = create_element(
                    &self.sink,
                    QualName::new(None, ns!(html), tag.name.clone()),
                    tag.attrs.clone(),
                );
                self.formatting.replace(slot, clone.clone(), tag.clone());
                self.open.replace(
                    depth,
                    OpenElement {
                        handle: clone.clone(),
                        ns: ns!(html),
                        name: tag.name,
                    },
                );

                // While the chain is still anchored at the furthest
                // block, the reinsertion point trails just after this
                // clone's entry.
                if self.sink.same_node(&last, &block.handle) {
                    bookmark = slot + 1;
                }

                self.sink.remove_from_parent(&last);
                self.sink.append(&clone, AppendNode(last));
                last = clone;
            }

            // The finished chain hangs under the common ancestor, with
            // foster parenting if the ancestor calls for it.
            self.sink.remove_from_parent(&last);
            let point = self.insertion_point(Some(ancestor));
            self.place(point, AppendNode(last));

            // A fresh clone of the formatting element takes over the
            // furthest block's children and becomes its last child.
            let fresh = create_element(
                &self.sink,
                QualName::new(None, ns!(html), fmt_tag.name.clone()),
                fmt_tag.attrs.clone(),
            );
            self.sink.reparent_children(&block.handle, &fresh);
            self.sink.append(&block.handle, AppendNode(fresh.clone()));

            // The original's list entry gives way to the clone's, at the
            // bookmark.
            let retired = self
                .formatting_index_of(&fmt_handle)
                .expect("formatting entry vanished during adoption");
            self.formatting.remove(retired);
            if retired < bookmark {
                bookmark -= 1;
            }
            self.formatting.insert(bookmark, fresh.clone(), fmt_tag.clone());

            // Same swap on the stack: original out, clone in directly
            // above the furthest block.
            self.remove_from_stack(&fmt_handle);
            let block_depth_now = self
                .open
                .position_from_top(|e| self.sink.same_node(&e.handle, &block.handle))
                .expect("furthest block vanished during adoption");
            self.open.insert(
                block_depth_now + 1,
                OpenElement {
                    handle: fresh,
                    ns: ns!(html),
                    name: fmt_tag.name,
                },
            );
        }
    }
    //§ END

    /// An `<a>` start tag while another `<a>` is still listed: the old
    /// one is force-closed through the agency and scrubbed from both
    /// structures before the new one opens.
    pub(crate) fn close_stray_anchor(&self, tag: &Tag) {
        let Some((_, stale, _)) = self.formatting.latest_with_name(&local_name!("a")) else {
            return;
        };
        self.report_unexpected(ErrorCode::AnchorNested, tag);
        self.run_adoption_agency(local_name!("a"));
        if let Some(slot) = self.formatting_index_of(&stale) {
            self.formatting.remove(slot);
        }
        self.remove_from_stack(&stale);
    }
}
