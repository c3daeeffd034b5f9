// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! One handler per insertion mode.
//!
//! Each handler consumes a token and answers with a [`Step`]; the
//! dispatcher in `mod.rs` routes tokens here and loops on the answers.
//! The behaviour is the tree-construction section of the HTML standard,
//! <https://html.spec.whatwg.org/multipage/parsing.html>.

use std::borrow::Cow::Borrowed;

use crate::errors::ErrorCode;
use crate::interface::{create_element, AppendNode, QualName, Quirks, TreeSink};
use crate::tokenizer::states::{Rawtext, Rcdata, ScriptData};
use crate::tokenizer::{EndTag, StartTag, Tag};
use crate::tree_builder::names;
use crate::tree_builder::stack::{OpenElement, Scope};
use crate::tree_builder::types::{InsertionMode, Step, TextKind, Token};
use crate::tree_builder::TreeBuilder;
use crate::{local_name, ns, LocalName};

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    //§ the-initial-insertion-mode
    pub(crate) fn mode_initial(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => Step::Done,
            Token::Comment(text) => self.add_comment_to_doc(text),
            token => {
                // Doctypes were handled before dispatch, so reaching here
                // means the document has none.
                if !self.opts.iframe_srcdoc {
                    self.report(
                        ErrorCode::DoctypeMissing,
                        Borrowed("Missing document type declaration"),
                    );
                    self.set_quirks_mode(Quirks);
                }
                Step::Rerun(InsertionMode::BeforeHtml, token)
            },
        }
    }

    //§ the-before-html-insertion-mode
    fn start_document_root(&self, token: Token) -> Step<Handle> {
        self.create_root(vec![]);
        Step::Rerun(InsertionMode::BeforeHead, token)
    }

    pub(crate) fn mode_before_html(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => Step::Done,
            Token::Comment(text) => self.add_comment_to_doc(text),

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => {
                    self.create_root(tag.attrs);
                    self.insertion_mode.set(InsertionMode::BeforeHead);
                    Step::Done
                },
                (
                    EndTag,
                    local_name!("head")
                    | local_name!("body")
                    | local_name!("html")
                    | local_name!("br"),
                ) => self.start_document_root(Token::Tag(tag)),
                (EndTag, _) => {
                    self.report_unexpected(ErrorCode::TagCannotEndHere, &tag);
                    Step::Done
                },
                _ => self.start_document_root(Token::Tag(tag)),
            },

            token => self.start_document_root(token),
        }
    }

    //§ the-before-head-insertion-mode
    fn synthesize_head(&self, token: Token) -> Step<Handle> {
        *self.head.borrow_mut() = Some(self.synthesize(local_name!("head")));
        Step::Rerun(InsertionMode::InHead, token)
    }

    pub(crate) fn mode_before_head(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => Step::Done,
            Token::Comment(text) => self.add_comment(text),

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (StartTag, local_name!("head")) => {
                    *self.head.borrow_mut() = Some(self.open_html_element(tag));
                    self.insertion_mode.set(InsertionMode::InHead);
                    Step::Done
                },
                (
                    EndTag,
                    local_name!("head")
                    | local_name!("body")
                    | local_name!("html")
                    | local_name!("br"),
                ) => self.synthesize_head(Token::Tag(tag)),
                (EndTag, _) => {
                    self.report_unexpected(ErrorCode::TagCannotEndHere, &tag);
                    Step::Done
                },
                _ => self.synthesize_head(Token::Tag(tag)),
            },

            token => self.synthesize_head(token),
        }
    }

    //§ parsing-main-inhead
    fn leave_head(&self, token: Token) -> Step<Handle> {
        self.pop();
        Step::Rerun(InsertionMode::AfterHead, token)
    }

    pub(crate) fn mode_in_head(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => {
                return Step::SplitWhitespace(run.text)
            },
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                return self.add_text(run.text)
            },
            Token::Comment(text) => return self.add_comment(text),
            Token::Tag(tag) => tag,
            token => return self.leave_head(token),
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),

            (
                StartTag,
                local_name!("base")
                | local_name!("basefont")
                | local_name!("bgsound")
                | local_name!("link")
                | local_name!("meta"),
            ) => {
                let declared_encoding = if tag.name == local_name!("meta") {
                    super::charset_from_meta(&tag)
                } else {
                    None
                };
                self.void_html_element(tag);
                match declared_encoding {
                    Some(label) => Step::SwitchEncoding(label),
                    None => Step::DoneAckSelfClosing,
                }
            },

            (StartTag, local_name!("title")) => self.open_raw_text(tag, Rcdata),

            (StartTag, local_name!("noscript")) if !self.opts.scripting_enabled => {
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InHeadNoscript);
                Step::Done
            },
            (StartTag, local_name!("noframes") | local_name!("style") | local_name!("noscript")) => {
                self.open_raw_text(tag, Rawtext)
            },

            (StartTag, local_name!("script")) => {
                // Script elements skip the usual insertion path so that
                // fragment parsing can mark them already-started first.
                let elem = create_element(
                    &self.sink,
                    QualName::new(None, ns!(html), local_name!("script")),
                    tag.attrs,
                );
                if self.is_fragment() {
                    self.sink.mark_script_already_started(&elem);
                }
                let point = self.insertion_point(None);
                self.place(point, AppendNode(elem.clone()));
                self.open.push(OpenElement {
                    handle: elem,
                    ns: ns!(html),
                    name: local_name!("script"),
                });
                self.begin_text_mode(ScriptData)
            },

            (EndTag, local_name!("head")) => {
                self.pop();
                self.insertion_mode.set(InsertionMode::AfterHead);
                Step::Done
            },

            (EndTag, local_name!("body") | local_name!("html") | local_name!("br")) => {
                self.leave_head(Token::Tag(tag))
            },

            (StartTag, local_name!("template")) => {
                self.open_html_element(tag);
                self.formatting.push_marker();
                self.frameset_ok.set(false);
                self.insertion_mode.set(InsertionMode::InTemplate);
                self.template_modes
                    .borrow_mut()
                    .push(InsertionMode::InTemplate);
                Step::Done
            },

            (EndTag, local_name!("template")) => {
                if !self.open.contains_html(&local_name!("template")) {
                    self.report_unexpected(ErrorCode::TagCannotEndHere, &tag);
                } else {
                    self.pop_implied_ends_thoroughly();
                    self.expect_to_close(local_name!("template"));
                    self.formatting.clear_to_last_marker();
                    self.template_modes.borrow_mut().pop();
                    self.insertion_mode.set(self.reset_insertion_mode());
                }
                Step::Done
            },

            (StartTag, local_name!("head")) | (EndTag, _) => self.bad_token(&tag),

            _ => self.leave_head(Token::Tag(tag)),
        }
    }

    //§ parsing-main-inheadnoscript
    fn bail_noscript(&self, token: Token) -> Step<Handle> {
        self.bad_token(&token);
        self.pop();
        Step::Rerun(InsertionMode::InHead, token)
    }

    pub(crate) fn mode_in_head_noscript(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                self.mode_in_head(Token::Text(run))
            },
            Token::Comment(_) => self.mode_in_head(token),

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (EndTag, local_name!("noscript")) => {
                    self.pop();
                    self.insertion_mode.set(InsertionMode::InHead);
                    Step::Done
                },
                (
                    StartTag,
                    local_name!("basefont")
                    | local_name!("bgsound")
                    | local_name!("link")
                    | local_name!("meta")
                    | local_name!("noframes")
                    | local_name!("style"),
                ) => self.mode_in_head(Token::Tag(tag)),
                (EndTag, local_name!("br")) => self.bail_noscript(Token::Tag(tag)),
                (StartTag, local_name!("head") | local_name!("noscript")) | (EndTag, _) => {
                    self.bad_token(&tag)
                },
                _ => self.bail_noscript(Token::Tag(tag)),
            },

            token => self.bail_noscript(token),
        }
    }

    //§ the-after-head-insertion-mode
    fn synthesize_body(&self, token: Token) -> Step<Handle> {
        self.synthesize(local_name!("body"));
        Step::Rerun(InsertionMode::InBody, token)
    }

    pub(crate) fn mode_after_head(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => {
                return Step::SplitWhitespace(run.text)
            },
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                return self.add_text(run.text)
            },
            Token::Comment(text) => return self.add_comment(text),
            Token::Tag(tag) => tag,
            token => return self.synthesize_body(token),
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),

            (StartTag, local_name!("body")) => {
                self.open_html_element(tag);
                self.frameset_ok.set(false);
                self.insertion_mode.set(InsertionMode::InBody);
                Step::Done
            },

            (StartTag, local_name!("frameset")) => {
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InFrameset);
                Step::Done
            },

            (StartTag, ref name) if names::belongs_in_head(name) => {
                self.report_unexpected(ErrorCode::TagMustBeInHead, &tag);
                // Work as if in head, with the head element briefly back
                // on the stack.
                let head = self.head.borrow().clone().expect("no head element");
                self.open.push(OpenElement {
                    handle: head.clone(),
                    ns: ns!(html),
                    name: local_name!("head"),
                });
                let step = self.mode_in_head(Token::Tag(tag));
                self.remove_from_stack(&head);
                step
            },

            (EndTag, local_name!("template")) => self.mode_in_head(Token::Tag(tag)),

            (EndTag, local_name!("body") | local_name!("html") | local_name!("br")) => {
                self.synthesize_body(Token::Tag(tag))
            },

            (StartTag, local_name!("head")) | (EndTag, _) => self.bad_token(&tag),

            _ => self.synthesize_body(Token::Tag(tag)),
        }
    }

    //§ parsing-main-inbody
    pub(crate) fn mode_in_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => self.bad_token(&token),

            Token::Text(run) => {
                self.rebuild_formatting();
                if run.has_non_whitespace() {
                    self.frameset_ok.set(false);
                }
                self.add_text(run.text)
            },

            Token::Comment(text) => self.add_comment(text),

            Token::Eof => {
                if self.template_modes.borrow().is_empty() {
                    self.audit_body_end();
                    Step::Done
                } else {
                    self.mode_in_template(token)
                }
            },

            Token::Tag(tag) => match tag.kind {
                StartTag => self.in_body_start_tag(tag),
                EndTag => self.in_body_end_tag(tag),
            },
        }
    }

    fn in_body_start_tag(&self, tag: Tag) -> Step<Handle> {
        match tag.name.clone() {
            local_name!("html") => {
                self.report_unexpected(ErrorCode::HtmlTagMisplaced, &tag);
                if !self.open.contains_html(&local_name!("template")) {
                    self.sink.add_attrs_if_missing(&self.open.root(), tag.attrs);
                }
                Step::Done
            },

            name if names::belongs_in_head(&name) => self.mode_in_head(Token::Tag(tag)),

            local_name!("body") => {
                self.report_unexpected(ErrorCode::BodyTagMisplaced, &tag);
                if let Some(body) = self.body_handle() {
                    if self.open.len() != 1
                        && !self.open.contains_html(&local_name!("template"))
                    {
                        self.frameset_ok.set(false);
                        self.sink.add_attrs_if_missing(&body, tag.attrs);
                    }
                }
                Step::Done
            },

            local_name!("frameset") => {
                self.report_unexpected(ErrorCode::FramesetMisplaced, &tag);
                if !self.frameset_ok.get() {
                    return Step::Done;
                }
                let Some(body) = self.body_handle() else {
                    return Step::Done;
                };
                // A frameset replaces the body wholesale.
                self.sink.remove_from_parent(&body);
                self.open.truncate(1);
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InFrameset);
                Step::Done
            },

            name if names::is_plain_block(&name) => {
                self.close_p_if_in_button_scope();
                self.open_html_element(tag);
                Step::Done
            },

            name if names::is_heading(&name) => {
                self.close_p_if_in_button_scope();
                let current = self.open.current();
                if current.ns == ns!(html) && names::is_heading(&current.name) {
                    self.report(ErrorCode::HeadingNested, Borrowed("nested heading tags"));
                    self.pop();
                }
                self.open_html_element(tag);
                Step::Done
            },

            local_name!("pre") | local_name!("listing") => {
                self.close_p_if_in_button_scope();
                self.open_html_element(tag);
                self.skip_next_newline.set(true);
                self.frameset_ok.set(false);
                Step::Done
            },

            local_name!("form") => {
                if self.form.borrow().is_some()
                    && !self.open.contains_html(&local_name!("template"))
                {
                    self.report(ErrorCode::FormAlreadyOpen, Borrowed("nested forms"));
                } else {
                    self.close_p_if_in_button_scope();
                    let elem = self.open_html_element(tag);
                    if !self.open.contains_html(&local_name!("template")) {
                        *self.form.borrow_mut() = Some(elem);
                    }
                }
                Step::Done
            },

            name @ (local_name!("li") | local_name!("dd") | local_name!("dt")) => {
                self.frameset_ok.set(false);

                // Close the nearest open item of the same kind, unless a
                // special element (other than address/div/p) fences it off.
                let list_item = name == local_name!("li");
                let mut reopen: Option<LocalName> = None;
                for depth in (0..self.open.len()).rev() {
                    let entry = self.open.get(depth);
                    if entry.ns == ns!(html) {
                        let same_kind = if list_item {
                            entry.name == local_name!("li")
                        } else {
                            matches!(entry.name, local_name!("dd") | local_name!("dt"))
                        };
                        if same_kind {
                            reopen = Some(entry.name);
                            break;
                        }
                        if matches!(
                            entry.name,
                            local_name!("address") | local_name!("div") | local_name!("p")
                        ) {
                            continue;
                        }
                    }
                    if names::is_special(&entry.ns, &entry.name) {
                        break;
                    }
                }
                if let Some(close) = reopen {
                    self.pop_implied_ends_except(&close);
                    self.expect_to_close(close);
                }

                self.close_p_if_in_button_scope();
                self.open_html_element(tag);
                Step::Done
            },

            local_name!("plaintext") => {
                self.close_p_if_in_button_scope();
                self.open_html_element(tag);
                Step::ToPlaintext
            },

            local_name!("button") => {
                if self.open.in_scope_html(Scope::Default, &local_name!("button")) {
                    self.report(ErrorCode::ButtonInScope, Borrowed("nested buttons"));
                    self.pop_implied_ends();
                    self.pop_until_html(&local_name!("button"));
                }
                self.rebuild_formatting();
                self.open_html_element(tag);
                self.frameset_ok.set(false);
                Step::Done
            },

            local_name!("a") => {
                self.close_stray_anchor(&tag);
                self.rebuild_formatting();
                self.open_formatting_element(tag);
                Step::Done
            },

            local_name!("nobr") => {
                self.rebuild_formatting();
                if self.open.in_scope_html(Scope::Default, &local_name!("nobr")) {
                    self.report(ErrorCode::NobrInScope, Borrowed("Nested <nobr>"));
                    self.run_adoption_agency(local_name!("nobr"));
                    self.rebuild_formatting();
                }
                self.open_formatting_element(tag);
                Step::Done
            },

            name if names::is_plain_formatting(&name) => {
                self.rebuild_formatting();
                self.open_formatting_element(tag);
                Step::Done
            },

            local_name!("applet") | local_name!("marquee") | local_name!("object") => {
                self.rebuild_formatting();
                self.open_html_element(tag);
                self.formatting.push_marker();
                self.frameset_ok.set(false);
                Step::Done
            },

            local_name!("table") => {
                if self.quirks_mode.get() != Quirks {
                    self.close_p_if_in_button_scope();
                }
                self.open_html_element(tag);
                self.frameset_ok.set(false);
                self.insertion_mode.set(InsertionMode::InTable);
                Step::Done
            },

            name @ (local_name!("area")
            | local_name!("br")
            | local_name!("embed")
            | local_name!("img")
            | local_name!("keygen")
            | local_name!("wbr")
            | local_name!("input")) => {
                let hidden_input = name == local_name!("input") && hidden_input(&tag);
                self.rebuild_formatting();
                self.void_html_element(tag);
                if !hidden_input {
                    self.frameset_ok.set(false);
                }
                Step::DoneAckSelfClosing
            },

            local_name!("param") | local_name!("source") | local_name!("track") => {
                self.void_html_element(tag);
                Step::DoneAckSelfClosing
            },

            local_name!("hr") => {
                self.close_p_if_in_button_scope();
                self.void_html_element(tag);
                self.frameset_ok.set(false);
                Step::DoneAckSelfClosing
            },

            local_name!("image") => {
                self.report(
                    ErrorCode::ImageTagNamedWrong,
                    Borrowed("<image> is not an HTML element; treating as <img>"),
                );
                self.in_body_start_tag(Tag {
                    name: local_name!("img"),
                    ..tag
                })
            },

            local_name!("textarea") => {
                self.skip_next_newline.set(true);
                self.frameset_ok.set(false);
                self.open_raw_text(tag, Rcdata)
            },

            local_name!("xmp") => {
                self.close_p_if_in_button_scope();
                self.rebuild_formatting();
                self.frameset_ok.set(false);
                self.open_raw_text(tag, Rawtext)
            },

            local_name!("iframe") => {
                self.frameset_ok.set(false);
                self.open_raw_text(tag, Rawtext)
            },

            local_name!("noembed") => self.open_raw_text(tag, Rawtext),

            local_name!("select") => {
                self.rebuild_formatting();
                self.open_html_element(tag);
                self.frameset_ok.set(false);
                // A select inside table structure needs the escape-hatch
                // mode; note this consults the real current mode, since
                // this handler also runs "as in InBody" for other modes.
                let mode = match self.insertion_mode.get() {
                    InsertionMode::InTable
                    | InsertionMode::InCaption
                    | InsertionMode::InTableBody
                    | InsertionMode::InRow
                    | InsertionMode::InCell => InsertionMode::InSelectInTable,
                    _ => InsertionMode::InSelect,
                };
                self.insertion_mode.set(mode);
                Step::Done
            },

            local_name!("optgroup") | local_name!("option") => {
                if self.open.current_is_html(&local_name!("option")) {
                    self.pop();
                }
                self.rebuild_formatting();
                self.open_html_element(tag);
                Step::Done
            },

            local_name!("rb") | local_name!("rtc") => {
                if self.open.in_scope_html(Scope::Default, &local_name!("ruby")) {
                    self.pop_implied_ends();
                }
                if !self.open.current_is_html(&local_name!("ruby")) {
                    self.bad_token(&tag);
                }
                self.open_html_element(tag);
                Step::Done
            },

            local_name!("rp") | local_name!("rt") => {
                if self.open.in_scope_html(Scope::Default, &local_name!("ruby")) {
                    self.pop_implied_ends_except(&local_name!("rtc"));
                }
                if !self.open.current_is_html(&local_name!("rtc"))
                    && !self.open.current_is_html(&local_name!("ruby"))
                {
                    self.bad_token(&tag);
                }
                self.open_html_element(tag);
                Step::Done
            },

            local_name!("math") => self.enter_foreign_content(tag, ns!(mathml)),
            local_name!("svg") => self.enter_foreign_content(tag, ns!(svg)),

            local_name!("caption")
            | local_name!("col")
            | local_name!("colgroup")
            | local_name!("frame")
            | local_name!("head")
            | local_name!("tbody")
            | local_name!("td")
            | local_name!("tfoot")
            | local_name!("th")
            | local_name!("thead")
            | local_name!("tr") => {
                self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
                Step::Done
            },

            local_name!("noscript") if self.opts.scripting_enabled => {
                self.open_raw_text(tag, Rawtext)
            },

            _ => {
                self.rebuild_formatting();
                self.open_html_element(tag);
                Step::Done
            },
        }
    }

    fn in_body_end_tag(&self, tag: Tag) -> Step<Handle> {
        match tag.name.clone() {
            local_name!("template") => self.mode_in_head(Token::Tag(tag)),

            local_name!("body") => {
                if self.open.in_scope_html(Scope::Default, &local_name!("body")) {
                    self.audit_body_end();
                    self.insertion_mode.set(InsertionMode::AfterBody);
                } else {
                    self.report(
                        ErrorCode::ElementNotInScope,
                        Borrowed("</body> with no <body> in scope"),
                    );
                }
                Step::Done
            },

            local_name!("html") => {
                if self.open.in_scope_html(Scope::Default, &local_name!("body")) {
                    self.audit_body_end();
                    Step::Rerun(InsertionMode::AfterBody, Token::Tag(tag))
                } else {
                    self.report(
                        ErrorCode::ElementNotInScope,
                        Borrowed("</html> with no <body> in scope"),
                    );
                    Step::Done
                }
            },

            local_name!("form") => {
                if self.open.contains_html(&local_name!("template")) {
                    if !self.open.in_scope_html(Scope::Default, &local_name!("form")) {
                        self.report(
                            ErrorCode::FormNotInScope,
                            Borrowed("Form element not in scope on </form>"),
                        );
                        return Step::Done;
                    }
                    self.pop_implied_ends();
                    if !self.open.current_is_html(&local_name!("form")) {
                        self.report(
                            ErrorCode::TagDoesNotMatchCurrentNode,
                            Borrowed("Bad open element on </form>"),
                        );
                    }
                    self.pop_until_html(&local_name!("form"));
                } else {
                    let Some(form) = self.form.borrow_mut().take() else {
                        self.report(
                            ErrorCode::FormNotInScope,
                            Borrowed("Null form element pointer on </form>"),
                        );
                        return Step::Done;
                    };
                    if !self
                        .open
                        .in_scope(Scope::Default, |e| self.sink.same_node(&e.handle, &form))
                    {
                        self.report(
                            ErrorCode::FormNotInScope,
                            Borrowed("Form element not in scope on </form>"),
                        );
                        return Step::Done;
                    }
                    self.pop_implied_ends();
                    let was_current = self.sink.same_node(&self.open.current().handle, &form);
                    self.remove_from_stack(&form);
                    if !was_current {
                        self.report(
                            ErrorCode::TagDoesNotMatchCurrentNode,
                            Borrowed("Bad open element on </form>"),
                        );
                    }
                }
                Step::Done
            },

            local_name!("p") => {
                if !self.open.in_scope_html(Scope::Button, &local_name!("p")) {
                    self.report(ErrorCode::ElementNotInScope, Borrowed("No <p> tag to close"));
                    self.synthesize(local_name!("p"));
                }
                self.close_p_element();
                Step::Done
            },

            name @ (local_name!("li") | local_name!("dd") | local_name!("dt")) => {
                let scope = if name == local_name!("li") {
                    Scope::ListItem
                } else {
                    Scope::Default
                };
                if self.open.in_scope_html(scope, &name) {
                    self.pop_implied_ends_except(&name);
                    self.expect_to_close(name);
                } else {
                    self.report(
                        ErrorCode::ElementNotInScope,
                        Borrowed("No matching tag to close"),
                    );
                }
                Step::Done
            },

            name if names::is_heading(&name) => {
                let any_heading_open = self
                    .open
                    .in_scope(Scope::Default, |e| {
                        e.ns == ns!(html) && names::is_heading(&e.name)
                    });
                if any_heading_open {
                    self.pop_implied_ends();
                    if !self.open.current_is_html(&name) {
                        self.report(
                            ErrorCode::TagClosingMismatch,
                            Borrowed("Closing wrong heading tag"),
                        );
                    }
                    // Any heading closes the section, not just the one
                    // named.
                    while let Some(entry) = self.open.pop() {
                        if entry.ns == ns!(html) && names::is_heading(&entry.name) {
                            break;
                        }
                    }
                } else {
                    self.report(
                        ErrorCode::ElementNotInScope,
                        Borrowed("No heading tag to close"),
                    );
                }
                Step::Done
            },

            name if names::is_formatting(&name) => {
                self.run_adoption_agency(name);
                Step::Done
            },

            name @ (local_name!("applet") | local_name!("marquee") | local_name!("object")) => {
                if self.open.in_scope_html(Scope::Default, &name) {
                    self.pop_implied_ends();
                    self.expect_to_close(name);
                    self.formatting.clear_to_last_marker();
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            name if names::is_closable_block(&name) => {
                if self.open.in_scope_html(Scope::Default, &name) {
                    self.pop_implied_ends();
                    self.expect_to_close(name);
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            local_name!("br") => {
                self.report_unexpected(ErrorCode::TagCannotEndHere, &tag);
                // Recovered as a start tag, shorn of attributes.
                self.in_body_start_tag(Tag {
                    kind: StartTag,
                    attrs: vec![],
                    ..tag
                })
            },

            name => {
                self.any_other_end_tag(name);
                Step::Done
            },
        }
    }

    //§ parsing-main-incdata
    pub(crate) fn mode_text(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) => self.add_text(run.text),

            Token::Eof => {
                self.report_unexpected(ErrorCode::EofInText, &token);
                let current = self.open.current();
                if current.is_html(&local_name!("script")) {
                    self.sink.mark_script_already_started(&current.handle);
                }
                self.pop();
                Step::Rerun(self.original_mode.take().expect("no saved mode"), token)
            },

            Token::Tag(tag) => {
                debug_assert_eq!(tag.kind, EndTag);
                let closed = self.pop();
                self.insertion_mode
                    .set(self.original_mode.take().expect("no saved mode"));
                if tag.name == local_name!("script") {
                    Step::RunScript(closed.handle)
                } else {
                    Step::Done
                }
            },

            // Comments and nulls cannot come out of a raw-text tokenizer
            // state.
            _ => unreachable!("impossible token in Text mode"),
        }
    }

    //§ parsing-main-intable
    fn foster_in_body(&self, token: Token) -> Step<Handle> {
        self.fostering.set(true);
        let step = self.mode_in_body(token);
        self.fostering.set(false);
        step
    }

    fn table_text_or_foster(&self, token: Token) -> Step<Handle> {
        let current = self.open.current();
        if current.ns == ns!(html) && names::is_foster_parent_trigger(&current.name) {
            debug_assert!(self.table_text.borrow().is_empty());
            self.original_mode.set(Some(self.insertion_mode.get()));
            Step::Rerun(InsertionMode::InTableText, token)
        } else {
            self.report_unexpected(ErrorCode::TokenNotPossible, &token);
            self.foster_in_body(token)
        }
    }

    fn shrink_to_table_context(&self) {
        self.open
            .shrink_until(|e| e.ns == ns!(html) && names::is_table_context(&e.name));
    }

    pub(crate) fn mode_in_table(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Null | Token::Text(_) => return self.table_text_or_foster(token),
            Token::Comment(text) => return self.add_comment(text),
            Token::Eof => return self.mode_in_body(token),
            Token::Tag(tag) => tag,
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, local_name!("caption")) => {
                self.shrink_to_table_context();
                self.formatting.push_marker();
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InCaption);
                Step::Done
            },

            (StartTag, local_name!("colgroup")) => {
                self.shrink_to_table_context();
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InColumnGroup);
                Step::Done
            },

            (StartTag, local_name!("col")) => {
                self.shrink_to_table_context();
                self.synthesize(local_name!("colgroup"));
                Step::Rerun(InsertionMode::InColumnGroup, Token::Tag(tag))
            },

            (StartTag, ref name) if names::is_table_section(name) => {
                self.shrink_to_table_context();
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InTableBody);
                Step::Done
            },

            (StartTag, ref name) if names::is_cell(name) || *name == local_name!("tr") => {
                self.shrink_to_table_context();
                self.synthesize(local_name!("tbody"));
                Step::Rerun(InsertionMode::InTableBody, Token::Tag(tag))
            },

            (StartTag, local_name!("table")) => {
                self.report_unexpected(ErrorCode::TableNesting, &tag);
                if self.open.in_scope_html(Scope::Table, &local_name!("table")) {
                    self.pop_until_html(&local_name!("table"));
                    Step::Rerun(self.reset_insertion_mode(), Token::Tag(tag))
                } else {
                    Step::Done
                }
            },

            (EndTag, local_name!("table")) => {
                if self.open.in_scope_html(Scope::Table, &local_name!("table")) {
                    self.pop_until_html(&local_name!("table"));
                    self.insertion_mode.set(self.reset_insertion_mode());
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            (EndTag, local_name!("body") | local_name!("caption") | local_name!("col")
                | local_name!("colgroup") | local_name!("html") | local_name!("tbody")
                | local_name!("td") | local_name!("tfoot") | local_name!("th")
                | local_name!("thead") | local_name!("tr")) => self.bad_token(&tag),

            (StartTag, local_name!("style") | local_name!("script") | local_name!("template"))
            | (EndTag, local_name!("template")) => self.mode_in_head(Token::Tag(tag)),

            (StartTag, local_name!("input")) => {
                self.report_unexpected(ErrorCode::InputUnexpected, &tag);
                if hidden_input(&tag) {
                    self.void_html_element(tag);
                    Step::DoneAckSelfClosing
                } else {
                    self.foster_in_body(Token::Tag(tag))
                }
            },

            (StartTag, local_name!("form")) => {
                self.report_unexpected(ErrorCode::FormAlreadyOpen, &tag);
                if !self.open.contains_html(&local_name!("template"))
                    && self.form.borrow().is_none()
                {
                    *self.form.borrow_mut() = Some(self.void_html_element(tag));
                }
                Step::Done
            },

            _ => {
                self.bad_token(&tag);
                self.foster_in_body(Token::Tag(tag))
            },
        }
    }

    //§ parsing-main-intabletext
    pub(crate) fn mode_in_table_text(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => self.bad_token(&token),

            Token::Text(run) => {
                self.table_text.borrow_mut().push(run);
                Step::Done
            },

            token => {
                // Flush: clean whitespace stays in the table; anything
                // else sends the whole batch through foster parenting.
                let pending = self.table_text.take();
                if pending.iter().any(|run| run.has_non_whitespace()) {
                    self.report(
                        ErrorCode::TokenNotPossible,
                        Borrowed("Non-space table text"),
                    );
                    for run in pending {
                        match self.foster_in_body(Token::Text(run)) {
                            Step::Done => {},
                            _ => panic!("text handling cannot defer"),
                        }
                    }
                } else {
                    for run in pending {
                        self.add_text(run.text);
                    }
                }
                Step::Rerun(self.original_mode.take().expect("no saved mode"), token)
            },
        }
    }

    //§ parsing-main-incaption
    pub(crate) fn mode_in_caption(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Tag(tag) => tag,
            token => return self.mode_in_body(token),
        };

        let closes_caption = match tag.kind {
            StartTag => {
                matches!(tag.name, local_name!("caption") | local_name!("col") | local_name!("colgroup"))
                    || names::is_table_section(&tag.name)
                    || names::is_cell(&tag.name)
                    || tag.name == local_name!("tr")
            },
            EndTag => matches!(tag.name, local_name!("table") | local_name!("caption")),
        };

        if closes_caption {
            if !self.open.in_scope_html(Scope::Table, &local_name!("caption")) {
                self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                return Step::Done;
            }
            self.pop_implied_ends();
            self.expect_to_close(local_name!("caption"));
            self.formatting.clear_to_last_marker();
            if tag.kind == EndTag && tag.name == local_name!("caption") {
                self.insertion_mode.set(InsertionMode::InTable);
                Step::Done
            } else {
                Step::Rerun(InsertionMode::InTable, Token::Tag(tag))
            }
        } else if tag.kind == EndTag
            && (matches!(
                tag.name,
                local_name!("body") | local_name!("col") | local_name!("colgroup")
                    | local_name!("html") | local_name!("tr")
            ) || names::is_table_section(&tag.name)
                || names::is_cell(&tag.name))
        {
            self.bad_token(&tag)
        } else {
            self.mode_in_body(Token::Tag(tag))
        }
    }

    //§ parsing-main-incolgroup
    pub(crate) fn mode_in_column_group(&self, token: Token) -> Step<Handle> {
        let fallback = |token: Token| {
            if self.open.current_is_html(&local_name!("colgroup")) {
                self.pop();
                Step::Rerun(InsertionMode::InTable, token)
            } else {
                self.bad_token(&token)
            }
        };

        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => self.add_text(run.text),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => self.mode_in_body(token),

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (StartTag, local_name!("col")) => {
                    self.void_html_element(tag);
                    Step::DoneAckSelfClosing
                },
                (EndTag, local_name!("colgroup")) => {
                    if self.open.current_is_html(&local_name!("colgroup")) {
                        self.pop();
                        self.insertion_mode.set(InsertionMode::InTable);
                    } else {
                        self.report_unexpected(ErrorCode::TagDoesNotMatchCurrentNode, &tag);
                    }
                    Step::Done
                },
                (EndTag, local_name!("col")) => self.bad_token(&tag),
                (StartTag, local_name!("template")) | (EndTag, local_name!("template")) => {
                    self.mode_in_head(Token::Tag(tag))
                },
                _ => fallback(Token::Tag(tag)),
            },

            token => fallback(token),
        }
    }

    //§ parsing-main-intbody
    pub(crate) fn mode_in_table_body(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Tag(tag) => tag,
            token => return self.mode_in_table(token),
        };

        let shrink_to_section = || {
            self.open
                .shrink_until(|e| e.ns == ns!(html) && names::is_table_body_context(&e.name));
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, local_name!("tr")) => {
                shrink_to_section();
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InRow);
                Step::Done
            },

            (StartTag, ref name) if names::is_cell(name) => {
                self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
                shrink_to_section();
                self.synthesize(local_name!("tr"));
                Step::Rerun(InsertionMode::InRow, Token::Tag(tag))
            },

            (EndTag, ref name) if names::is_table_section(name) => {
                if self.open.in_scope_html(Scope::Table, name) {
                    shrink_to_section();
                    self.pop();
                    self.insertion_mode.set(InsertionMode::InTable);
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            (StartTag, local_name!("caption") | local_name!("col") | local_name!("colgroup"))
            | (StartTag, local_name!("tbody") | local_name!("tfoot") | local_name!("thead"))
            | (EndTag, local_name!("table")) => {
                let section_open = self.open.in_scope(Scope::Table, |e| {
                    e.ns == ns!(html) && names::is_table_section(&e.name)
                });
                if section_open {
                    shrink_to_section();
                    self.pop();
                    Step::Rerun(InsertionMode::InTable, Token::Tag(tag))
                } else {
                    self.bad_token(&tag)
                }
            },

            (EndTag, local_name!("body") | local_name!("caption") | local_name!("col")
                | local_name!("colgroup") | local_name!("html") | local_name!("td")
                | local_name!("th") | local_name!("tr")) => self.bad_token(&tag),

            _ => self.mode_in_table(Token::Tag(tag)),
        }
    }

    //§ parsing-main-intr
    pub(crate) fn mode_in_row(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Tag(tag) => tag,
            token => return self.mode_in_table(token),
        };

        let close_row = || {
            self.open
                .shrink_until(|e| e.ns == ns!(html) && names::is_table_row_context(&e.name));
            let row = self.pop();
            debug_assert!(row.is_html(&local_name!("tr")));
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, ref name) if names::is_cell(name) => {
                self.open
                    .shrink_until(|e| e.ns == ns!(html) && names::is_table_row_context(&e.name));
                self.open_html_element(tag);
                self.insertion_mode.set(InsertionMode::InCell);
                self.formatting.push_marker();
                Step::Done
            },

            (EndTag, local_name!("tr")) => {
                if self.open.in_scope_html(Scope::Table, &local_name!("tr")) {
                    close_row();
                    self.insertion_mode.set(InsertionMode::InTableBody);
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            (StartTag, local_name!("caption") | local_name!("col") | local_name!("colgroup")
                | local_name!("tbody") | local_name!("tfoot") | local_name!("thead")
                | local_name!("tr"))
            | (EndTag, local_name!("table")) => {
                if self.open.in_scope_html(Scope::Table, &local_name!("tr")) {
                    close_row();
                    Step::Rerun(InsertionMode::InTableBody, Token::Tag(tag))
                } else {
                    self.bad_token(&tag)
                }
            },

            (EndTag, ref name) if names::is_table_section(name) => {
                if !self.open.in_scope_html(Scope::Table, name) {
                    return self.bad_token(&tag);
                }
                if self.open.in_scope_html(Scope::Table, &local_name!("tr")) {
                    close_row();
                    Step::Rerun(InsertionMode::InTableBody, Token::Tag(tag))
                } else {
                    Step::Done
                }
            },

            (EndTag, local_name!("body") | local_name!("caption") | local_name!("col")
                | local_name!("colgroup") | local_name!("html") | local_name!("td")
                | local_name!("th")) => self.bad_token(&tag),

            _ => self.mode_in_table(Token::Tag(tag)),
        }
    }

    //§ parsing-main-intd
    pub(crate) fn mode_in_cell(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Tag(tag) => tag,
            token => return self.mode_in_body(token),
        };

        match (tag.kind, tag.name.clone()) {
            (EndTag, ref name) if names::is_cell(name) => {
                if self.open.in_scope_html(Scope::Table, name) {
                    self.pop_implied_ends();
                    self.expect_to_close(name.clone());
                    self.formatting.clear_to_last_marker();
                    self.insertion_mode.set(InsertionMode::InRow);
                } else {
                    self.report_unexpected(ErrorCode::ElementNotInScope, &tag);
                }
                Step::Done
            },

            (StartTag, ref name)
                if matches!(
                    *name,
                    local_name!("caption") | local_name!("col") | local_name!("colgroup")
                        | local_name!("tr")
                ) || names::is_table_section(name)
                    || names::is_cell(name) =>
            {
                let in_cell = self
                    .open
                    .in_scope(Scope::Table, |e| e.ns == ns!(html) && names::is_cell(&e.name));
                if in_cell {
                    self.close_the_cell();
                    Step::Rerun(InsertionMode::InRow, Token::Tag(tag))
                } else {
                    self.bad_token(&tag)
                }
            },

            (EndTag, local_name!("body") | local_name!("caption") | local_name!("col")
                | local_name!("colgroup") | local_name!("html")) => self.bad_token(&tag),

            (EndTag, ref name)
                if *name == local_name!("table")
                    || *name == local_name!("tr")
                    || names::is_table_section(name) =>
            {
                if self.open.in_scope_html(Scope::Table, name) {
                    self.close_the_cell();
                    Step::Rerun(InsertionMode::InRow, Token::Tag(tag))
                } else {
                    self.bad_token(&tag)
                }
            },

            _ => self.mode_in_body(Token::Tag(tag)),
        }
    }

    //§ parsing-main-inselect
    pub(crate) fn mode_in_select(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Null => return self.bad_token(&token),
            Token::Text(run) => return self.add_text(run.text),
            Token::Comment(text) => return self.add_comment(text),
            Token::Eof => return self.mode_in_body(token),
            Token::Tag(tag) => tag,
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),

            (StartTag, local_name!("option")) => {
                if self.open.current_is_html(&local_name!("option")) {
                    self.pop();
                }
                self.open_html_element(tag);
                Step::Done
            },

            (StartTag, local_name!("optgroup")) => {
                if self.open.current_is_html(&local_name!("option")) {
                    self.pop();
                }
                if self.open.current_is_html(&local_name!("optgroup")) {
                    self.pop();
                }
                self.open_html_element(tag);
                Step::Done
            },

            (StartTag, local_name!("hr")) => {
                if self.open.current_is_html(&local_name!("option")) {
                    self.pop();
                }
                if self.open.current_is_html(&local_name!("optgroup")) {
                    self.pop();
                }
                self.open_html_element(tag);
                self.pop();
                Step::DoneAckSelfClosing
            },

            (EndTag, local_name!("optgroup")) => {
                // An option directly inside an optgroup closes with it.
                if self.open.len() >= 2
                    && self.open.current_is_html(&local_name!("option"))
                    && self
                        .open
                        .get(self.open.len() - 2)
                        .is_html(&local_name!("optgroup"))
                {
                    self.pop();
                }
                if self.open.current_is_html(&local_name!("optgroup")) {
                    self.pop();
                } else {
                    self.report_unexpected(ErrorCode::TagDoesNotMatchCurrentNode, &tag);
                }
                Step::Done
            },

            (EndTag, local_name!("option")) => {
                if self.open.current_is_html(&local_name!("option")) {
                    self.pop();
                } else {
                    self.report_unexpected(ErrorCode::TagDoesNotMatchCurrentNode, &tag);
                }
                Step::Done
            },

            (_, local_name!("select")) => {
                let in_scope = self.open.in_scope_html(Scope::Select, &local_name!("select"));
                if !in_scope || tag.kind == StartTag {
                    self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
                }
                if in_scope {
                    self.pop_until_html(&local_name!("select"));
                    self.insertion_mode.set(self.reset_insertion_mode());
                }
                Step::Done
            },

            (StartTag, local_name!("input") | local_name!("keygen") | local_name!("textarea")) => {
                self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
                if self.open.in_scope_html(Scope::Select, &local_name!("select")) {
                    self.pop_until_html(&local_name!("select"));
                    Step::Rerun(self.reset_insertion_mode(), Token::Tag(tag))
                } else {
                    Step::Done
                }
            },

            (StartTag, local_name!("script") | local_name!("template"))
            | (EndTag, local_name!("template")) => self.mode_in_head(Token::Tag(tag)),

            _ => self.bad_token(&tag),
        }
    }

    //§ parsing-main-inselectintable
    pub(crate) fn mode_in_select_in_table(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Tag(tag) => tag,
            token => return self.mode_in_select(token),
        };

        let table_structure = matches!(
            tag.name,
            local_name!("caption") | local_name!("table") | local_name!("tr")
        ) || names::is_table_section(&tag.name)
            || names::is_cell(&tag.name);
        if !table_structure {
            return self.mode_in_select(Token::Tag(tag));
        }

        match tag.kind {
            StartTag => {
                self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
                self.pop_until_html(&local_name!("select"));
                Step::Rerun(self.reset_insertion_mode(), Token::Tag(tag))
            },
            EndTag => {
                self.report_unexpected(ErrorCode::TagCannotEndHere, &tag);
                if self.open.in_scope_html(Scope::Table, &tag.name.clone()) {
                    self.pop_until_html(&local_name!("select"));
                    Step::Rerun(self.reset_insertion_mode(), Token::Tag(tag))
                } else {
                    Step::Done
                }
            },
        }
    }

    //§ parsing-main-intemplate
    fn retarget_template(&self, mode: InsertionMode, token: Token) -> Step<Handle> {
        {
            let mut modes = self.template_modes.borrow_mut();
            modes.pop();
            modes.push(mode);
        }
        Step::Rerun(mode, token)
    }

    pub(crate) fn mode_in_template(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Text(_) | Token::Comment(_) => return self.mode_in_body(token),

            Token::Eof => {
                if !self.open.contains_html(&local_name!("template")) {
                    return Step::Done;
                }
                self.report_unexpected(ErrorCode::TemplateEndedUnexpectedly, &token);
                self.pop_until_html(&local_name!("template"));
                self.formatting.clear_to_last_marker();
                self.template_modes.borrow_mut().pop();
                let mode = self.reset_insertion_mode();
                self.insertion_mode.set(mode);
                return Step::Rerun(mode, token);
            },

            Token::Tag(tag) => tag,
            token => return self.bad_token(&token),
        };

        match (tag.kind, tag.name.clone()) {
            (StartTag, ref name) if names::belongs_in_head(name) => {
                self.mode_in_head(Token::Tag(tag))
            },
            (EndTag, local_name!("template")) => self.mode_in_head(Token::Tag(tag)),

            (StartTag, local_name!("caption") | local_name!("colgroup")) => {
                self.retarget_template(InsertionMode::InTable, Token::Tag(tag))
            },
            (StartTag, ref name) if names::is_table_section(name) => {
                self.retarget_template(InsertionMode::InTable, Token::Tag(tag))
            },
            (StartTag, local_name!("col")) => {
                self.retarget_template(InsertionMode::InColumnGroup, Token::Tag(tag))
            },
            (StartTag, local_name!("tr")) => {
                self.retarget_template(InsertionMode::InTableBody, Token::Tag(tag))
            },
            (StartTag, ref name) if names::is_cell(name) => {
                self.retarget_template(InsertionMode::InRow, Token::Tag(tag))
            },

            (StartTag, _) => self.retarget_template(InsertionMode::InBody, Token::Tag(tag)),

            (EndTag, _) => self.bad_token(&tag),
        }
    }

    //§ parsing-main-afterbody
    pub(crate) fn mode_after_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                self.mode_in_body(Token::Text(run))
            },
            Token::Comment(text) => self.add_comment_to_root(text),
            Token::Eof => Step::Done,

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (EndTag, local_name!("html")) => {
                    if self.is_fragment() {
                        self.report_unexpected(ErrorCode::HtmlTagMisplaced, &tag);
                    } else {
                        self.insertion_mode.set(InsertionMode::AfterAfterBody);
                    }
                    Step::Done
                },
                _ => {
                    self.bad_token(&tag);
                    Step::Rerun(InsertionMode::InBody, Token::Tag(tag))
                },
            },

            token => {
                self.bad_token(&token);
                Step::Rerun(InsertionMode::InBody, token)
            },
        }
    }

    //§ parsing-main-inframeset
    pub(crate) fn mode_in_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => self.add_text(run.text),
            Token::Comment(text) => self.add_comment(text),

            Token::Eof => {
                if self.open.len() != 1 {
                    self.report_unexpected(ErrorCode::CurrentNodeIsNotRoot, &token);
                }
                Step::Done
            },

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (StartTag, local_name!("frameset")) => {
                    self.open_html_element(tag);
                    Step::Done
                },
                (EndTag, local_name!("frameset")) => {
                    if self.open.len() == 1 {
                        self.report_unexpected(ErrorCode::CurrentNodeIsRoot, &tag);
                    } else {
                        self.pop();
                        if !self.is_fragment()
                            && !self.open.current_is_html(&local_name!("frameset"))
                        {
                            self.insertion_mode.set(InsertionMode::AfterFrameset);
                        }
                    }
                    Step::Done
                },
                (StartTag, local_name!("frame")) => {
                    self.void_html_element(tag);
                    Step::DoneAckSelfClosing
                },
                (StartTag, local_name!("noframes")) => self.mode_in_head(Token::Tag(tag)),
                _ => self.bad_token(&tag),
            },

            token => self.bad_token(&token),
        }
    }

    //§ parsing-main-afterframeset
    pub(crate) fn mode_after_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => self.add_text(run.text),
            Token::Comment(text) => self.add_comment(text),
            Token::Eof => Step::Done,

            Token::Tag(tag) => match (tag.kind, tag.name.clone()) {
                (StartTag, local_name!("html")) => self.mode_in_body(Token::Tag(tag)),
                (EndTag, local_name!("html")) => {
                    self.insertion_mode.set(InsertionMode::AfterAfterFrameset);
                    Step::Done
                },
                (StartTag, local_name!("noframes")) => self.mode_in_head(Token::Tag(tag)),
                _ => self.bad_token(&tag),
            },

            token => self.bad_token(&token),
        }
    }

    //§ the-after-after-body-insertion-mode
    pub(crate) fn mode_after_after_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                self.mode_in_body(Token::Text(run))
            },
            Token::Comment(text) => self.add_comment_to_doc(text),
            Token::Eof => Step::Done,

            Token::Tag(tag) if tag.kind == StartTag && tag.name == local_name!("html") => {
                self.mode_in_body(Token::Tag(tag))
            },

            token => {
                self.bad_token(&token);
                Step::Rerun(InsertionMode::InBody, token)
            },
        }
    }

    //§ the-after-after-frameset-insertion-mode
    pub(crate) fn mode_after_after_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Text(run) if run.kind == TextKind::Unsplit => Step::SplitWhitespace(run.text),
            Token::Text(run) if run.kind == TextKind::Whitespace => {
                self.mode_in_body(Token::Text(run))
            },
            Token::Comment(text) => self.add_comment_to_doc(text),
            Token::Eof => Step::Done,

            Token::Tag(tag) if tag.kind == StartTag && tag.name == local_name!("html") => {
                self.mode_in_body(Token::Tag(tag))
            },
            Token::Tag(tag) if tag.kind == StartTag && tag.name == local_name!("noframes") => {
                self.mode_in_head(Token::Tag(tag))
            },

            token => self.bad_token(&token),
        }
    }
}

/// `<input type=hidden>` leaves the frameset-ok flag alone and may stay
/// inside a table.
fn hidden_input(tag: &Tag) -> bool {
    tag.get_attribute(&local_name!("type"))
        .is_some_and(|value| value.eq_ignore_ascii_case("hidden"))
}
