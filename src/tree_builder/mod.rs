// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The tree constructor.
//!
//! Tokens come in from the tokenizer, the dispatcher decides between the
//! HTML rules for the current insertion mode and the foreign-content
//! rules (by looking at the *adjusted current node*: the fragment
//! context element when the stack holds exactly one element in fragment
//! mode, the top of the stack otherwise), and a mode handler mutates the
//! DOM through the [`TreeSink`]. Handlers answer with a [`Step`], which
//! can switch modes, re-feed the same token, push a tokenizer state
//! change back, or suspend for script execution.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;

use log::{debug, log_enabled, Level};
use mac::format_if;
use tendril::StrTendril;

use self::formatting::ActiveFormattingList;
use self::stack::{OpenElement, OpenElementStack};
use self::types::*;

use crate::errors::{ErrorCode, ParseError, Position};
use crate::interface::{ElemName, QuirksMode, Tracer, TreeSink};
use crate::tokenizer::states as tok_state;
use crate::tokenizer::{self, Doctype, StartTag, Tag, TokenSink, TokenSinkResult};
use crate::util::str::to_escaped_string;
use crate::{local_name, ns, LocalName, Namespace};

mod data;
mod foreign;
mod formatting;
mod insert;
mod modes;
mod names;
mod stack;
mod types;

/// Tree builder options, with an impl for Default.
#[derive(Copy, Clone)]
pub struct TreeBuilderOpts {
    /// Attach token and mode detail to parse errors, at some formatting
    /// cost? Default: false
    pub exact_errors: bool,

    /// Is scripting enabled? When it is, `<noscript>` content is opaque
    /// raw text; when it is not, the content is parsed as markup.
    pub scripting_enabled: bool,

    /// Is this document embedded via the `srcdoc` attribute of an
    /// `<iframe>`? Such documents skip the missing-doctype error and the
    /// quirks-mode heuristics.
    pub iframe_srcdoc: bool,

    /// Should the DOCTYPE (if any) be withheld from the tree?
    pub drop_doctype: bool,

    /// Initial quirks mode. Default: NoQuirks
    pub quirks_mode: QuirksMode,
}

impl Default for TreeBuilderOpts {
    fn default() -> TreeBuilderOpts {
        TreeBuilderOpts {
            exact_errors: false,
            scripting_enabled: true,
            iframe_srcdoc: false,
            drop_doctype: false,
            quirks_mode: QuirksMode::NoQuirks,
        }
    }
}

/// The context element of a fragment parse, with its identity cached the
/// same way stack entries cache theirs.
struct FragmentContext<Handle> {
    element: Handle,
    ns: Namespace,
    name: LocalName,
}

/// The HTML tree builder.
pub struct TreeBuilder<Handle, Sink> {
    opts: TreeBuilderOpts,

    /// Consumer of tree modifications.
    pub sink: Sink,

    /// The document node, owned by the sink.
    document: Handle,

    /// Current insertion mode, plus the mode to return to after Text or
    /// InTableText, plus the per-template mode stack.
    insertion_mode: Cell<InsertionMode>,
    original_mode: Cell<Option<InsertionMode>>,
    template_modes: RefCell<Vec<InsertionMode>>,

    /// The stack of open elements and the list of active formatting
    /// elements. Everything on them is a back reference; the DOM owns
    /// the nodes.
    open: OpenElementStack<Handle>,
    formatting: ActiveFormattingList<Handle>,

    //§ the-element-pointers
    head: RefCell<Option<Handle>>,
    form: RefCell<Option<Handle>>,
    //§ END

    /// Character tokens buffered while InTableText decides whether they
    /// need foster parenting.
    table_text: RefCell<Vec<TextRun>>,

    /// Quirks mode as decided by the doctype.
    quirks_mode: Cell<QuirksMode>,

    /// May a `<frameset>` still replace the body?
    frameset_ok: Cell<bool>,

    /// Eat one upcoming newline (after `<pre>` and `<textarea>`).
    skip_next_newline: Cell<bool>,

    /// Foster parenting in force (the diverted-from-a-table flavour of
    /// the InBody rules).
    fostering: Cell<bool>,

    /// Set for fragment parsing, absent for document parsing.
    fragment: Option<FragmentContext<Handle>>,

    /// Source position of the token in flight, for error reports.
    position: Cell<Position>,
    // Any new field holding a Handle must also be visited by
    // trace_handles() below, or a garbage-collected DOM will free it
    // out from under us.
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    /// Create a tree builder that parses a complete document into `sink`.
    ///
    /// The tree builder is also a `TokenSink`.
    pub fn new(sink: Sink, opts: TreeBuilderOpts) -> TreeBuilder<Handle, Sink> {
        let document = sink.get_document();
        TreeBuilder {
            opts,
            sink,
            document,
            insertion_mode: Cell::new(InsertionMode::Initial),
            original_mode: Cell::new(None),
            template_modes: Default::default(),
            open: Default::default(),
            formatting: Default::default(),
            head: Default::default(),
            form: Default::default(),
            table_text: Default::default(),
            quirks_mode: Cell::new(opts.quirks_mode),
            frameset_ok: Cell::new(true),
            skip_next_newline: Cell::new(false),
            fostering: Cell::new(false),
            fragment: None,
            position: Cell::new(Position::start()),
        }
    }

    /// Create a tree builder for fragment parsing against a context
    /// element: a synthetic `html` root goes on the stack and the
    /// insertion mode is reset against the context.
    ///
    /// The context must be chosen before any token is consumed, which
    /// this constructor-shaped API guarantees.
    pub fn new_for_fragment(
        sink: Sink,
        context: Handle,
        form: Option<Handle>,
        opts: TreeBuilderOpts,
    ) -> TreeBuilder<Handle, Sink> {
        let (ctx_ns, ctx_name) = {
            let name = sink.elem_name(&context);
            (name.ns().clone(), name.local_name().clone())
        };
        let template_modes = if ctx_ns == ns!(html) && ctx_name == local_name!("template") {
            vec![InsertionMode::InTemplate]
        } else {
            vec![]
        };
        let document = sink.get_document();

        let tb = TreeBuilder {
            opts,
            sink,
            document,
            insertion_mode: Cell::new(InsertionMode::Initial),
            original_mode: Cell::new(None),
            template_modes: RefCell::new(template_modes),
            open: Default::default(),
            formatting: Default::default(),
            head: Default::default(),
            form: RefCell::new(form),
            table_text: Default::default(),
            quirks_mode: Cell::new(opts.quirks_mode),
            frameset_ok: Cell::new(true),
            skip_next_newline: Cell::new(false),
            fostering: Cell::new(false),
            fragment: Some(FragmentContext {
                element: context,
                ns: ctx_ns,
                name: ctx_name,
            }),
            position: Cell::new(Position::start()),
        };

        // https://html.spec.whatwg.org/multipage/#parsing-html-fragments
        tb.create_root(vec![]);
        let mode = tb.reset_insertion_mode();
        tb.insertion_mode.set(mode);

        tb
    }

    /// The tokenizer state the fragment algorithm preconfigures from the
    /// context element's tag.
    pub fn tokenizer_state_for_context_elem(&self, scripting_enabled: bool) -> tok_state::State {
        let Some(ctx) = &self.fragment else {
            return tok_state::Data;
        };
        if ctx.ns != ns!(html) {
            return tok_state::Data;
        }
        match ctx.name {
            local_name!("title") | local_name!("textarea") => tok_state::RawData(tok_state::Rcdata),

            local_name!("style")
            | local_name!("xmp")
            | local_name!("iframe")
            | local_name!("noembed")
            | local_name!("noframes") => tok_state::RawData(tok_state::Rawtext),

            local_name!("script") => tok_state::RawData(tok_state::ScriptData),

            local_name!("noscript") if scripting_enabled => {
                tok_state::RawData(tok_state::Rawtext)
            },

            local_name!("plaintext") => tok_state::Plaintext,

            _ => tok_state::Data,
        }
    }

    /// Call the `Tracer`'s `trace_handle` on every handle held in
    /// builder state, to support garbage-collected DOMs.
    pub fn trace_handles(&self, tracer: &dyn Tracer<Handle = Handle>) {
        tracer.trace_handle(&self.document);
        self.open.for_each(|entry| tracer.trace_handle(&entry.handle));
        self.formatting
            .for_each_handle(|handle| tracer.trace_handle(handle));
        if let Some(head) = self.head.borrow().as_ref() {
            tracer.trace_handle(head);
        }
        if let Some(form) = self.form.borrow().as_ref() {
            tracer.trace_handle(form);
        }
        if let Some(ctx) = &self.fragment {
            tracer.trace_handle(&ctx.element);
        }
    }

    /// Are we parsing an HTML fragment?
    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    /// The adjusted current node, with its cached identity.
    pub(crate) fn adjusted_current(&self) -> OpenElement<Handle> {
        if self.open.len() == 1 {
            if let Some(ctx) = &self.fragment {
                return OpenElement {
                    handle: ctx.element.clone(),
                    ns: ctx.ns.clone(),
                    name: ctx.name.clone(),
                };
            }
        }
        self.open.current()
    }

    /// The `<body>`, if it is where a well-formed document keeps it.
    pub(crate) fn body_handle(&self) -> Option<Handle> {
        if self.open.len() <= 1 {
            return None;
        }
        let second = self.open.get(1);
        second
            .is_html(&local_name!("body"))
            .then(|| second.handle)
    }

    pub(crate) fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
        self.sink.set_quirks_mode(mode);
    }

    //§ error reporting
    pub(crate) fn report(&self, code: ErrorCode, message: Cow<'static, str>) {
        self.sink
            .parse_error(ParseError::new(code, message, self.position.get()));
    }

    pub(crate) fn report_unexpected<T: fmt::Debug>(&self, code: ErrorCode, what: &T) {
        self.report(
            code,
            format_if!(
                self.opts.exact_errors,
                "Unexpected token",
                "Unexpected token {} in insertion mode {:?}",
                to_escaped_string(what),
                self.insertion_mode.get()
            ),
        );
    }

    /// Report a token that has no rule here, and drop it.
    pub(crate) fn bad_token<T: fmt::Debug>(&self, what: &T) -> Step<Handle> {
        self.report_unexpected(ErrorCode::TokenNotPossible, what);
        Step::Done
    }
    //§ END

    /// Route one token to the handler for a mode.
    pub(crate) fn handle(&self, mode: InsertionMode, token: Token) -> Step<Handle> {
        if log_enabled!(Level::Debug) {
            debug!("{mode:?} handling {}", to_escaped_string(&token));
        }

        match mode {
            InsertionMode::Initial => self.mode_initial(token),
            InsertionMode::BeforeHtml => self.mode_before_html(token),
            InsertionMode::BeforeHead => self.mode_before_head(token),
            InsertionMode::InHead => self.mode_in_head(token),
            InsertionMode::InHeadNoscript => self.mode_in_head_noscript(token),
            InsertionMode::AfterHead => self.mode_after_head(token),
            InsertionMode::InBody => self.mode_in_body(token),
            InsertionMode::Text => self.mode_text(token),
            InsertionMode::InTable => self.mode_in_table(token),
            InsertionMode::InTableText => self.mode_in_table_text(token),
            InsertionMode::InCaption => self.mode_in_caption(token),
            InsertionMode::InColumnGroup => self.mode_in_column_group(token),
            InsertionMode::InTableBody => self.mode_in_table_body(token),
            InsertionMode::InRow => self.mode_in_row(token),
            InsertionMode::InCell => self.mode_in_cell(token),
            InsertionMode::InSelect => self.mode_in_select(token),
            InsertionMode::InSelectInTable => self.mode_in_select_in_table(token),
            InsertionMode::InTemplate => self.mode_in_template(token),
            InsertionMode::AfterBody => self.mode_after_body(token),
            InsertionMode::InFrameset => self.mode_in_frameset(token),
            InsertionMode::AfterFrameset => self.mode_after_frameset(token),
            InsertionMode::AfterAfterBody => self.mode_after_after_body(token),
            InsertionMode::AfterAfterFrameset => self.mode_after_after_frameset(token),
        }
    }

    /// Run one token (and whatever it turns into) to quiescence.
    fn drive(&self, mut token: Token) -> TokenSinkResult<Handle> {
        // At most one deferred token exists at a time: the tail left
        // behind by a whitespace split.
        let mut deferred: Option<Token> = None;

        loop {
            let needs_ack = matches!(
                &token,
                Token::Tag(Tag {
                    kind: StartTag,
                    self_closing: true,
                    ..
                })
            );

            let step = if self.routes_to_foreign(&token) {
                self.foreign_content(token)
            } else {
                self.handle(self.insertion_mode.get(), token)
            };

            token = match step {
                Step::Done => {
                    if needs_ack {
                        self.report(
                            ErrorCode::SelfClosingNotAcknowledged,
                            Cow::Borrowed("Unacknowledged self-closing tag"),
                        );
                    }
                    match deferred.take() {
                        Some(next) => next,
                        None => return TokenSinkResult::Continue,
                    }
                },
                Step::DoneAckSelfClosing => match deferred.take() {
                    Some(next) => next,
                    None => return TokenSinkResult::Continue,
                },
                Step::Rerun(mode, token) => {
                    self.insertion_mode.set(mode);
                    token
                },
                Step::SplitWhitespace(mut text) => {
                    let Some((head, head_is_ws)) =
                        text.pop_front_char_run(|c| c.is_ascii_whitespace())
                    else {
                        return TokenSinkResult::Continue;
                    };
                    debug_assert!(deferred.is_none());
                    if text.len32() > 0 {
                        deferred = Some(Token::Text(TextRun::unsplit(text)));
                    }
                    Token::Text(TextRun {
                        kind: if head_is_ws {
                            TextKind::Whitespace
                        } else {
                            TextKind::NonWhitespace
                        },
                        text: head,
                    })
                },
                Step::RunScript(node) => {
                    debug_assert!(deferred.is_none());
                    return TokenSinkResult::Script(node);
                },
                Step::ToPlaintext => {
                    debug_assert!(deferred.is_none());
                    return TokenSinkResult::Plaintext;
                },
                Step::ToRawText(kind) => {
                    debug_assert!(deferred.is_none());
                    return TokenSinkResult::RawData(kind);
                },
                Step::SwitchEncoding(label) => {
                    debug_assert!(deferred.is_none());
                    return TokenSinkResult::EncodingIndicator(label);
                },
            };
        }
    }

    //§ tree-construction
    /// The dispatcher's foreign-content decision over the adjusted
    /// current node.
    fn routes_to_foreign(&self, token: &Token) -> bool {
        if matches!(token, Token::Eof) || self.open.is_empty() {
            return false;
        }

        let acn = self.adjusted_current();
        if acn.ns == ns!(html) {
            return false;
        }

        let start_name = match token {
            Token::Tag(tag) if tag.kind == StartTag => Some(&tag.name),
            _ => None,
        };
        let is_character_data = matches!(token, Token::Text(_) | Token::Null);

        if names::is_mathml_text_integration_point(&acn.ns, &acn.name) {
            if is_character_data {
                return false;
            }
            if let Some(name) = start_name {
                if !matches!(*name, local_name!("mglyph") | local_name!("malignmark")) {
                    return false;
                }
            }
        }

        if names::is_svg_html_integration_point(&acn.ns, &acn.name)
            && (is_character_data || start_name.is_some())
        {
            return false;
        }

        if names::is_annotation_xml(&acn.ns, &acn.name) {
            if start_name == Some(&local_name!("svg")) {
                return false;
            }
            if (is_character_data || start_name.is_some())
                && self
                    .sink
                    .is_mathml_annotation_xml_integration_point(&acn.handle)
            {
                return false;
            }
        }

        true
    }
    //§ END

    //§ reset-the-insertion-mode-appropriately
    pub(crate) fn reset_insertion_mode(&self) -> InsertionMode {
        for depth in (0..self.open.len()).rev() {
            let last = depth == 0;
            let entry = match (&self.fragment, last) {
                (Some(ctx), true) => OpenElement {
                    handle: ctx.element.clone(),
                    ns: ctx.ns.clone(),
                    name: ctx.name.clone(),
                },
                _ => self.open.get(depth),
            };
            if entry.ns != ns!(html) {
                continue;
            }

            match entry.name {
                local_name!("select") => {
                    // A select inside a table needs the escape-hatch
                    // mode, unless a template shields it.
                    for shallower in (0..depth).rev() {
                        let ancestor = self.open.get(shallower);
                        if ancestor.is_html(&local_name!("template")) {
                            break;
                        }
                        if ancestor.is_html(&local_name!("table")) {
                            return InsertionMode::InSelectInTable;
                        }
                    }
                    return InsertionMode::InSelect;
                },
                local_name!("td") | local_name!("th") if !last => return InsertionMode::InCell,
                local_name!("tr") => return InsertionMode::InRow,
                local_name!("tbody") | local_name!("thead") | local_name!("tfoot") => {
                    return InsertionMode::InTableBody;
                },
                local_name!("caption") => return InsertionMode::InCaption,
                local_name!("colgroup") => return InsertionMode::InColumnGroup,
                local_name!("table") => return InsertionMode::InTable,
                local_name!("template") => {
                    return *self
                        .template_modes
                        .borrow()
                        .last()
                        .expect("template on stack but no template mode");
                },
                local_name!("head") if !last => return InsertionMode::InHead,
                local_name!("body") => return InsertionMode::InBody,
                local_name!("frameset") => return InsertionMode::InFrameset,
                local_name!("html") => {
                    return match *self.head.borrow() {
                        None => InsertionMode::BeforeHead,
                        Some(_) => InsertionMode::AfterHead,
                    };
                },
                _ => {},
            }
        }
        InsertionMode::InBody
    }
    //§ END

    /// Doctypes never reach the mode handlers; in Initial they decide
    /// the quirks mode, anywhere else they are discarded with an error.
    fn handle_doctype(&self, dt: Doctype) {
        if self.insertion_mode.get() != InsertionMode::Initial {
            self.report(
                ErrorCode::DoctypeTagInappropriate,
                format_if!(
                    self.opts.exact_errors,
                    "DOCTYPE in body",
                    "DOCTYPE in insertion mode {:?}",
                    self.insertion_mode.get()
                ),
            );
            return;
        }

        let (err, quirks) = data::doctype_error_and_quirks(&dt, self.opts.iframe_srcdoc);
        if err {
            self.report(
                ErrorCode::DoctypeInvalid,
                format_if!(self.opts.exact_errors, "Bad DOCTYPE", "Bad DOCTYPE: {:?}", dt),
            );
        }
        if !self.opts.drop_doctype {
            self.sink.append_doctype_to_document(
                dt.name.unwrap_or_default(),
                dt.public_id.unwrap_or_default(),
                dt.system_id.unwrap_or_default(),
            );
        }
        self.set_quirks_mode(quirks);
        self.insertion_mode.set(InsertionMode::BeforeHtml);
    }
}

impl<Handle, Sink> TokenSink for TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    type Handle = Handle;

    fn process_token(
        &self,
        token: tokenizer::Token,
        position: Position,
    ) -> TokenSinkResult<Handle> {
        if position.line != self.position.get().line {
            self.sink.set_current_line(position.line);
        }
        self.position.set(position);
        let drop_leading_lf = self.skip_next_newline.take();

        let token = match token {
            tokenizer::Token::Error(code, message) => {
                self.report(code, message);
                return TokenSinkResult::Continue;
            },
            tokenizer::Token::Doctype(dt) => {
                self.handle_doctype(dt);
                return TokenSinkResult::Continue;
            },
            tokenizer::Token::Tag(tag) => Token::Tag(tag),
            tokenizer::Token::Comment(text) => Token::Comment(text),
            tokenizer::Token::NullCharacter => Token::Null,
            tokenizer::Token::Eof => Token::Eof,
            tokenizer::Token::Characters(mut text) => {
                if drop_leading_lf && text.starts_with('\n') {
                    text.pop_front(1);
                }
                if text.is_empty() {
                    return TokenSinkResult::Continue;
                }
                Token::Text(TextRun::unsplit(text))
            },
        };

        self.drive(token)
    }

    fn end(&self) {
        // Drain the stack top-down so the sink sees orderly closes.
        while let Some(entry) = self.open.pop() {
            self.sink.pop(&entry.handle);
        }
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        !self.open.is_empty() && self.adjusted_current().ns != ns!(html)
    }
}

/// The charset a `<meta>` declares, if any: a `charset` attribute, or an
/// `http-equiv="content-type"` with a charset in its `content`.
fn charset_from_meta(tag: &Tag) -> Option<StrTendril> {
    debug_assert_eq!(tag.name, local_name!("meta"));
    if let Some(charset) = tag.get_attribute(&local_name!("charset")) {
        return Some(charset);
    }

    let http_equiv = tag.get_attribute(&local_name!("http-equiv"))?;
    if !http_equiv.eq_ignore_ascii_case("content-type") {
        return None;
    }
    crate::encoding::extract_a_character_encoding_from_a_meta_element(
        tag.get_attribute(&local_name!("content"))?,
    )
}
