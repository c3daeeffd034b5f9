// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::borrow::Cow;

use tendril::StrTendril;

use crate::errors::{ErrorCode, Position};
use crate::interface::Attribute;
use crate::tokenizer::states;
use crate::{ns, LocalName};

pub use self::TagKind::{EndTag, StartTag};

/// A `DOCTYPE` token.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Doctype {
    pub name: Option<StrTendril>,
    pub public_id: Option<StrTendril>,
    pub system_id: Option<StrTendril>,
    pub force_quirks: bool,
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum TagKind {
    StartTag,
    EndTag,
}

/// A tag token.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Tag {
    pub kind: TagKind,
    pub name: LocalName,
    pub self_closing: bool,
    pub attrs: Vec<Attribute>,
}

impl Tag {
    /// Equality up to attribute order (and ignoring the self-closing
    /// flag): the comparison the Noah's-Ark clause is defined over.
    pub fn equiv_modulo_attr_order(&self, other: &Tag) -> bool {
        if self.kind != other.kind || self.name != other.name {
            return false;
        }
        if self.attrs.len() != other.attrs.len() {
            return false;
        }

        let mut mine = self.attrs.clone();
        let mut theirs = other.attrs.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    pub(crate) fn get_attribute(&self, name: &LocalName) -> Option<StrTendril> {
        self.attrs
            .iter()
            .find(|attribute| attribute.name.ns == ns!() && attribute.name.local == *name)
            .map(|attribute| attribute.value.clone())
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum Token {
    Doctype(Doctype),
    Tag(Tag),
    Comment(StrTendril),
    Characters(StrTendril),
    NullCharacter,
    Eof,
    Error(ErrorCode, Cow<'static, str>),
}

/// What the token sink instructs the tokenizer to do after each token.
#[derive(Debug, PartialEq)]
#[must_use]
pub enum TokenSinkResult<Handle> {
    Continue,
    /// A `</script>` was processed; the parser must suspend and hand the
    /// element to the script host before feeding continues.
    Script(Handle),
    Plaintext,
    RawData(states::RawKind),
    /// The document indicated that the given encoding label should be used
    /// to parse it. The label has not been validated.
    EncodingIndicator(StrTendril),
}

/// What a single `feed` call produced, once the available input is
/// exhausted or a suspension point is reached.
#[derive(Debug)]
#[must_use]
pub enum TokenizerResult<Handle> {
    /// All available input was consumed.
    Done,
    /// A script element is ready; the driver must run the host hooks and
    /// then feed again.
    Script(Handle),
    /// A late encoding declaration surfaced from a `<meta>` element.
    EncodingIndicator(StrTendril),
}

/// Types which can receive tokens from the tokenizer.
pub trait TokenSink {
    type Handle;

    /// Process a token; `position` is the source location the tokenizer had
    /// reached when it completed the token.
    fn process_token(&self, token: Token, position: Position) -> TokenSinkResult<Self::Handle>;

    /// Signal to the sink that tokenization has reached the end.
    fn end(&self) {}

    /// Used in the markup declaration open state. By default, this always
    /// returns false and thus all CDATA sections are tokenized as bogus
    /// comments. The tree builder overrides it to admit real CDATA inside
    /// foreign content.
    /// <https://html.spec.whatwg.org/multipage/#markup-declaration-open-state>
    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        false
    }
}
