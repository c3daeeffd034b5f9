// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal vocabulary of the tree constructor.
//!
//! The mode names follow the tree-construction section of
//! <https://html.spec.whatwg.org/multipage/parsing.html>; everything else
//! here is private plumbing between the dispatcher and the mode handlers.

use tendril::StrTendril;

use crate::tokenizer::states::RawKind;
use crate::tokenizer::Tag;

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    InHeadNoscript,
    AfterHead,
    InBody,
    Text,
    InTable,
    InTableText,
    InCaption,
    InColumnGroup,
    InTableBody,
    InRow,
    InCell,
    InSelect,
    InSelectInTable,
    InTemplate,
    AfterBody,
    InFrameset,
    AfterFrameset,
    AfterAfterBody,
    AfterAfterFrameset,
}

/// How much we know about the whitespace content of a text run.
///
/// Runs start out `Unsplit`. A handler that only wants a whitespace
/// prefix answers [`Step::SplitWhitespace`]; the dispatcher then carves
/// the run into a classified head and an `Unsplit` tail and re-feeds
/// both, so the handler sees the head again as `Whitespace` or
/// `NonWhitespace`.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum TextKind {
    Unsplit,
    Whitespace,
    NonWhitespace,
}

#[derive(Clone, Debug)]
pub(crate) struct TextRun {
    pub kind: TextKind,
    pub text: StrTendril,
}

impl TextRun {
    pub(crate) fn unsplit(text: StrTendril) -> TextRun {
        TextRun {
            kind: TextKind::Unsplit,
            text,
        }
    }

    /// Does the run contain anything besides ASCII whitespace?
    pub(crate) fn has_non_whitespace(&self) -> bool {
        match self.kind {
            TextKind::Whitespace => false,
            TextKind::NonWhitespace => true,
            TextKind::Unsplit => self.text.chars().any(|c| !c.is_ascii_whitespace()),
        }
    }
}

/// The token alphabet of the tree constructor. Doctypes and tokenizer
/// errors never reach the mode handlers; they are settled up front when
/// the token arrives from the tokenizer.
#[derive(Debug)]
pub(crate) enum Token {
    Tag(Tag),
    Comment(StrTendril),
    Text(TextRun),
    Null,
    Eof,
}

/// What a mode handler asks the dispatcher to do next.
pub(crate) enum Step<Handle> {
    /// The token has been consumed.
    Done,
    /// Consumed, and a self-closing flag on it was acknowledged.
    DoneAckSelfClosing,
    /// Switch modes and run the same token through again.
    Rerun(InsertionMode, Token),
    /// Carve a leading whitespace run off this text and re-feed it.
    SplitWhitespace(StrTendril),
    /// A `</script>` completed; the driver must hand this element to the
    /// host before any more input is tokenized.
    RunScript(Handle),
    /// Put the tokenizer into PLAINTEXT.
    ToPlaintext,
    /// Put the tokenizer into the given raw-text state.
    ToRawText(RawKind),
    /// A `<meta>` declared a character encoding.
    SwitchEncoding(StrTendril),
}

/// Where a new node goes. The second form is the foster-parenting
/// outcome: before the table if the table has a parent, otherwise as the
/// last child of the element under the table on the stack.
pub(crate) enum InsertPoint<Handle> {
    AppendTo(Handle),
    BeforeTable { table: Handle, fallback: Handle },
}
