// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Types and traits shared between the tokenizer, the tree builder, and
//! DOM implementations.

use std::fmt;

use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;
use crate::errors::ParseError;
use crate::{expanded_name, local_name, LocalName, Namespace, Prefix};

pub use self::NodeOrText::{AppendNode, AppendText};
pub use self::QuirksMode::{LimitedQuirks, NoQuirks, Quirks};
pub use self::ReadyState::{Complete, Interactive, Loading};

/// A namespace-qualified tag or attribute name.
///
/// Everything the tree constructor builds lands in the HTML, SVG, or
/// MathML namespace. Attribute names are namespace-less except for the
/// xlink/xml/xmlns family, which foreign-content adjustment resolves
/// (giving them the only prefixes this parser ever produces).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct QualName {
    pub prefix: Option<Prefix>,
    pub ns: Namespace,
    pub local: LocalName,
}

impl QualName {
    #[inline]
    pub fn new(prefix: Option<Prefix>, ns: Namespace, local: LocalName) -> QualName {
        QualName { prefix, ns, local }
    }

    /// The name without its prefix, for namespace-aware comparisons.
    #[inline]
    pub fn expanded(&self) -> ExpandedName {
        ExpandedName {
            ns: &self.ns,
            local: &self.local,
        }
    }
}

/// A (namespace, local name) pair, borrowed from a [`QualName`] or built by
/// the [`expanded_name!`] macro. Prefixes are ignored on purpose: two names
/// with different prefixes but the same expansion are the same name.
///
/// [`expanded_name!`]: crate::expanded_name
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub ns: &'a Namespace,
    pub local: &'a LocalName,
}

impl fmt::Debug for ExpandedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}:{}", self.ns, self.local)
        }
    }
}

/// Something which can be interrogated for a name, namespace-aware.
///
/// Implemented for [`ExpandedName`]; a [`TreeSink`] whose handles carry
/// richer name data can expose that instead.
pub trait ElemName: fmt::Debug {
    fn ns(&self) -> &Namespace;
    fn local_name(&self) -> &LocalName;

    #[inline]
    fn expanded(&self) -> ExpandedName<'_> {
        ExpandedName {
            ns: self.ns(),
            local: self.local_name(),
        }
    }
}

impl ElemName for ExpandedName<'_> {
    #[inline]
    fn ns(&self) -> &Namespace {
        self.ns
    }

    #[inline]
    fn local_name(&self) -> &LocalName {
        self.local
    }
}

/// One parsed attribute: its (possibly adjusted) name and its value.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    pub name: QualName,
    pub value: StrTendril,
}

//§ quirks-mode
/// A document's quirks mode, set by the doctype seen in the Initial
/// insertion mode. Relaxes a small number of tree-construction checks to
/// match legacy behaviour.
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum QuirksMode {
    /// Full quirks.
    Quirks,
    /// Limited quirks.
    LimitedQuirks,
    /// No quirks: the standards path.
    NoQuirks,
}
//§ END

/// Document readiness, advanced by end-of-stream finalization.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Debug)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Facts about an element the sink needs to know at creation time.
#[derive(Default)]
#[non_exhaustive]
pub struct ElementFlags {
    /// The element is an HTML `<template>`; the sink must give it a
    /// contents fragment for [`TreeSink::get_template_contents`] to hand
    /// back later.
    pub template: bool,

    /// The element is an `<annotation-xml>` whose `encoding` attribute
    /// makes it an HTML integration point.
    pub mathml_annotation_xml_integration_point: bool,
}

/// A constraint on the relationship between an element's namespace+name and
/// its flags: `<template>` and integration-point `<annotation-xml>` are the
/// only flagged cases, so element creation funnels through here.
pub fn create_element<Sink>(sink: &Sink, name: QualName, attrs: Vec<Attribute>) -> Sink::Handle
where
    Sink: TreeSink,
{
    let mut flags = ElementFlags::default();
    match name.expanded() {
        expanded_name!(html "template") => flags.template = true,
        expanded_name!(mathml "annotation-xml") => {
            flags.mathml_annotation_xml_integration_point = attrs.iter().any(|attr| {
                attr.name.expanded() == expanded_name!("", "encoding")
                    && (attr.value.eq_ignore_ascii_case("text/html")
                        || attr.value.eq_ignore_ascii_case("application/xhtml+xml"))
            });
        },
        _ => {},
    }
    sink.create_element(name, attrs, flags)
}

/// A new child for the tree: a prepared node, or bare text the sink may
/// fold into a neighboring text node without allocating.
pub enum NodeOrText<Handle> {
    AppendNode(Handle),
    AppendText(StrTendril),
}

/// The tree the parser builds into.
///
/// The parser holds exclusive mutable access for the whole parse, and
/// every handle it retains (open-element stack, formatting list) is a
/// back reference; the sink's parent-child edges decide ownership.
pub trait TreeSink {
    /// A cheaply clonable reference to a node.
    type Handle: Clone;

    /// What `finish` hands back when parsing completes.
    type Output;

    /// What [`Self::elem_name`] lends out.
    type ElemName<'a>: ElemName
    where
        Self: 'a;

    /// Consume the sink, yielding the overall result.
    fn finish(self) -> Self::Output;

    /// Record a parse error. Never aborts the parse; the position is
    /// already stamped in.
    fn parse_error(&self, error: ParseError);

    /// The document node.
    fn get_document(&self) -> Self::Handle;

    /// The element's name. Only ever called on elements; a sink may
    /// panic otherwise.
    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a>;

    /// Build an element. A `<template>` (`flags.template`) also needs
    /// its contents fragment, to be served by
    /// [`Self::get_template_contents`].
    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle;

    /// Build a comment node.
    fn create_comment(&self, text: StrTendril) -> Self::Handle;

    /// Add a parentless node as the last child, folding adjacent text
    /// nodes together.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>);

    /// The foster-parenting insertion: before `element` if it has a
    /// parent, else as the last child of `prev_element`.
    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    );

    /// Attach the doctype node to the document.
    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    );

    /// Flag a `<script>` the parser already started, so the host does
    /// not run it twice.
    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    /// A node came off the stack of open elements.
    fn pop(&self, _node: &Self::Handle) {}

    /// The contents fragment of a `<template>`. Only ever called on
    /// template elements.
    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle;

    /// Node identity.
    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool;

    /// The doctype decided the quirks mode.
    fn set_quirks_mode(&self, mode: QuirksMode);

    /// Finalization advanced the document's readiness. Sinks without a
    /// readiness notion can ignore this.
    fn set_ready_state(&self, _state: ReadyState) {}

    /// Insert a node directly before `sibling`. The sibling is never a
    /// text node, but the node before it may be, and bare text should
    /// merge into it as in `append`.
    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>);

    /// Copy in any of these attributes the element does not already
    /// have: first write wins. Only ever called on elements.
    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>);

    /// `target` has `form` as its form owner. The nodes are the
    /// insertion anchors in case the sink defers the association.
    fn associate_with_form(
        &self,
        _target: &Self::Handle,
        _form: &Self::Handle,
        _nodes: (&Self::Handle, Option<&Self::Handle>),
    ) {
    }

    /// Unlink the node from its parent, if it has one.
    fn remove_from_parent(&self, target: &Self::Handle);

    /// Move all of `node`'s children to the end of `new_parent`'s.
    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle);

    /// Is this `<annotation-xml>` an HTML integration point (its
    /// `encoding` says text/html or XHTML)?
    fn is_mathml_annotation_xml_integration_point(&self, _handle: &Self::Handle) -> bool {
        false
    }

    /// The tokenizer crossed onto a new source line.
    fn set_current_line(&self, _line: u64) {}
}

/// Trace hooks for a garbage-collected DOM.
pub trait Tracer {
    type Handle;

    /// Upon returning from `trace_handles()`, the `Handle` must not be
    /// dropped until the next call to `trace_handles()`.
    fn trace_handle(&self, node: &Self::Handle);
}

/// The outcome of running a script at a parser suspension point.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum ScriptResult {
    /// Parsing proceeds with the next token.
    Continue,
    /// The host requires the parser to pause; the insertion-point
    /// checkpoint is preserved and [`Parser::resume`] continues the feed.
    ///
    /// [`Parser::resume`]: crate::driver::Parser::resume
    Pause,
    /// The host is tearing the document down; all remaining input is
    /// discarded and the parse proceeds directly to end-of-stream
    /// finalization, leaving the tree in its last coherent state.
    Abort,
}

/// The host environment the parser reports into at defined moments.
///
/// A headless host can use [`NoopHost`]. Scripting semantics themselves are
/// out of scope: the parser calls `prepare_script`/`execute_script` at the
/// Text-mode suspension point and the finalization hooks at end of stream,
/// and otherwise proceeds.
pub trait HostHooks<Handle> {
    /// The `<script>` element has been popped; prepare it for execution.
    fn prepare_script(&self, _element: &Handle) {}

    /// Execute the script. Characters pushed onto `write` model
    /// `document.write`: they are spliced in at the tokenizer's insertion
    /// point before feeding resumes.
    fn execute_script(&self, _element: &Handle, _write: &BufferQueue) -> ScriptResult {
        ScriptResult::Continue
    }

    /// Queue a task on the host's event loop. The default runs it in place,
    /// which is correct for a single-threaded cooperative host.
    fn queue_task(&self, task: Box<dyn FnOnce()>) {
        task();
    }

    /// One cooperative turn of the host event loop, taken while the
    /// finalization predicates below still hold work back.
    fn spin_event_loop(&self) {}

    /// Number of "as-soon-as-possible" scripts still pending.
    fn scripts_as_soon_as_possible(&self) -> usize {
        0
    }

    /// Whether some loading-delay source (stylesheets, images the host
    /// cares about) still blocks the load event.
    fn is_loading_delayed(&self) -> bool {
        false
    }

    /// The `DOMContentLoaded` moment.
    fn dom_content_loaded(&self) {}

    /// The `load` event moment.
    fn load_event(&self) {}
}

/// A host that ignores every hook; the default for headless parsing.
pub struct NoopHost;

impl<Handle> HostHooks<Handle> for NoopHost {}

pub(crate) fn is_void_element(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("area")
            | local_name!("base")
            | local_name!("basefont")
            | local_name!("bgsound")
            | local_name!("br")
            | local_name!("col")
            | local_name!("embed")
            | local_name!("frame")
            | local_name!("hr")
            | local_name!("img")
            | local_name!("input")
            | local_name!("keygen")
            | local_name!("link")
            | local_name!("meta")
            | local_name!("param")
            | local_name!("source")
            | local_name!("track")
            | local_name!("wbr")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns;

    #[test]
    fn ns_macro() {
        assert_eq!(ns!(), Namespace::from(""));

        assert_eq!(ns!(html), Namespace::from("http://www.w3.org/1999/xhtml"));
        assert_eq!(
            ns!(xml),
            Namespace::from("http://www.w3.org/XML/1998/namespace")
        );
        assert_eq!(ns!(xmlns), Namespace::from("http://www.w3.org/2000/xmlns/"));
        assert_eq!(ns!(xlink), Namespace::from("http://www.w3.org/1999/xlink"));
        assert_eq!(ns!(svg), Namespace::from("http://www.w3.org/2000/svg"));
        assert_eq!(
            ns!(mathml),
            Namespace::from("http://www.w3.org/1998/Math/MathML")
        );
    }

    #[test]
    fn expanded_name_ignores_prefix() {
        let plain = QualName::new(None, ns!(xlink), local_name!("href"));
        let prefixed = QualName::new(
            Some(crate::namespace_prefix!("xlink")),
            ns!(xlink),
            local_name!("href"),
        );
        assert_eq!(plain.expanded(), prefixed.expanded());
    }
}
