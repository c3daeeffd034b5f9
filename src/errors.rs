// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The parse-error reporter surface.
//!
//! Every divergence from the well-formed path is classified under an
//! [`ErrorCode`], stamped with the tokenizer's source position, and handed to
//! the sink via [`TreeSink::parse_error`]. Reporting never aborts parsing:
//! each error site has a fully specified recovery in the tree-construction
//! rules.
//!
//! [`TreeSink::parse_error`]: crate::interface::TreeSink::parse_error

use std::borrow::Cow;
use std::fmt;

/// A source location, 1-based, counted over the decoded character stream.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    pub fn start() -> Position {
        Position { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Classification of a reportable parse error.
///
/// The tokenizer codes cover malformed markup syntax; the tree-constructor
/// codes cover tokens that are legal in isolation but impossible where they
/// occur. None of these stop the parse.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    // Tokenizer.
    NullCharacter,
    BogusCharacter,
    EndOfFile,
    CharacterReferenceInvalidCode,
    CharacterReferenceInvalidNumber,
    CharacterReferenceNotTerminated,
    TagClosedImmediately,
    ClosingSlashMisplaced,
    AttributeNameInvalid,
    AttributeValueInvalid,
    DoubleAttribute,
    EndTagCannotHaveAttributes,
    EndTagCannotBeSelfClosed,
    CommentEndedUnexpectedly,
    IncorrectlyOpenedComment,
    DoctypeNameInvalid,
    DoctypeIdentifierInvalid,
    DoctypeUnexpected,
    CdataInHtmlContent,

    // Tree constructor.
    DoctypeMissing,
    DoctypeInvalid,
    DoctypeTagInappropriate,
    HtmlTagMisplaced,
    BodyTagMisplaced,
    FramesetMisplaced,
    HeadTagMisplaced,
    TagCannotStartHere,
    TagCannotEndHere,
    TagMustBeInHead,
    HeadingNested,
    AnchorNested,
    NobrInScope,
    ButtonInScope,
    FormAlreadyOpen,
    FormNotInScope,
    TableNesting,
    TokenNotPossible,
    InputUnexpected,
    ImageTagNamedWrong,
    FormattingElementNotFound,
    FormattingElementNotOpen,
    FormattingElementNotInScope,
    FormattingElementNotCurrent,
    ElementNotInScope,
    TagClosedWrong,
    TagDoesNotMatchCurrentNode,
    TagClosingMismatch,
    SelfClosingNotAcknowledged,
    BodyEndedUnexpectedly,
    TemplateEndedUnexpectedly,
    EofInText,
    CurrentNodeIsRoot,
    CurrentNodeIsNotRoot,
    ForeignTagClosedWrong,
    EncodingDeclarationLate,
}

impl ErrorCode {
    /// Stable numeric identity for subscribers that key on integers.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A reportable parse error: classification, human-readable detail, and
/// the source position of the token that triggered it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ParseError {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
    pub line: u64,
    pub column: u64,
}

impl ParseError {
    pub fn new(code: ErrorCode, message: Cow<'static, str>, position: Position) -> ParseError {
        ParseError {
            code,
            message,
            line: position.line,
            column: position.column,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.line, self.column, self.message, self.code
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_carries_position_and_code() {
        let err = ParseError::new(
            ErrorCode::DoctypeMissing,
            "missing doctype".into(),
            Position { line: 3, column: 7 },
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("3:7:"));
        assert!(rendered.contains("DoctypeMissing"));
    }
}
