// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tokenizer-level tests, driven through a logging `TokenSink` the way
//! the tree builder would drive it.

use std::cell::RefCell;

use sapling::buffer_queue::BufferQueue;
use sapling::errors::Position;
use sapling::tendril::StrTendril;
use sapling::tokenizer::states::{RawData, Rawtext};
use sapling::tokenizer::{
    Doctype, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use sapling::ErrorCode;

/// Token log entries, with adjacent character tokens merged the way a
/// downstream consumer would see them.
#[derive(Debug, PartialEq, Eq)]
enum LogEntry {
    Chars(String),
    Tag(Tag),
    Comment(String),
    Doctype(Doctype),
    Error(ErrorCode),
    Eof,
}

struct LogSink {
    log: RefCell<Vec<LogEntry>>,
}

impl LogSink {
    fn new() -> LogSink {
        LogSink {
            log: RefCell::new(vec![]),
        }
    }

    fn push_chars(&self, text: &str) {
        let mut log = self.log.borrow_mut();
        if let Some(LogEntry::Chars(existing)) = log.last_mut() {
            existing.push_str(text);
            return;
        }
        log.push(LogEntry::Chars(text.to_string()));
    }
}

impl TokenSink for LogSink {
    type Handle = ();

    fn process_token(&self, token: Token, _position: Position) -> TokenSinkResult<()> {
        match token {
            Token::Characters(text) => self.push_chars(&text),
            Token::NullCharacter => self.push_chars("\0"),
            Token::Tag(tag) => self.log.borrow_mut().push(LogEntry::Tag(tag)),
            Token::Comment(text) => self
                .log
                .borrow_mut()
                .push(LogEntry::Comment(text.to_string())),
            Token::Doctype(dt) => self.log.borrow_mut().push(LogEntry::Doctype(dt)),
            Token::Error(code, _) => self.log.borrow_mut().push(LogEntry::Error(code)),
            Token::Eof => self.log.borrow_mut().push(LogEntry::Eof),
        }
        TokenSinkResult::Continue
    }
}

fn tokenize_with(input: &str, opts: TokenizerOpts) -> Vec<LogEntry> {
    let tok = Tokenizer::new(LogSink::new(), opts);
    let buffer = BufferQueue::default();
    buffer.push_back(StrTendril::from_slice(input));
    let _ = tok.feed(&buffer);
    tok.end();
    tok.sink.log.into_inner()
}

fn tokenize(input: &str) -> Vec<LogEntry> {
    tokenize_with(input, TokenizerOpts::default())
}

fn tags(log: &[LogEntry]) -> Vec<&Tag> {
    log.iter()
        .filter_map(|e| match e {
            LogEntry::Tag(tag) => Some(tag),
            _ => None,
        })
        .collect()
}

fn chars(log: &[LogEntry]) -> String {
    log.iter()
        .filter_map(|e| match e {
            LogEntry::Chars(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn errors(log: &[LogEntry]) -> Vec<ErrorCode> {
    log.iter()
        .filter_map(|e| match e {
            LogEntry::Error(code) => Some(*code),
            _ => None,
        })
        .collect()
}

#[test]
fn simple_tags_and_text() {
    let log = tokenize("<div class=\"a\">text</div>");
    let tags = tags(&log);
    assert_eq!(tags.len(), 2);
    assert_eq!(&*tags[0].name, "div");
    assert_eq!(tags[0].kind, TagKind::StartTag);
    assert_eq!(tags[0].attrs.len(), 1);
    assert_eq!(&*tags[0].attrs[0].name.local, "class");
    assert_eq!(&*tags[0].attrs[0].value, "a");
    assert_eq!(tags[1].kind, TagKind::EndTag);
    assert_eq!(chars(&log), "text");
}

#[test]
fn tag_names_are_lowercased() {
    let log = tokenize("<DiV CLASS=x></dIv>");
    let tags = tags(&log);
    assert_eq!(&*tags[0].name, "div");
    assert_eq!(&*tags[0].attrs[0].name.local, "class");
    assert_eq!(&*tags[1].name, "div");
}

#[test]
fn duplicate_attributes_keep_the_first() {
    let log = tokenize("<a href=1 href=2>");
    assert!(errors(&log).contains(&ErrorCode::DoubleAttribute));
    let tags = tags(&log);
    assert_eq!(tags[0].attrs.len(), 1);
    assert_eq!(&*tags[0].attrs[0].value, "1");
}

#[test]
fn self_closing_flag() {
    let log = tokenize("<br/>");
    let tags = tags(&log);
    assert!(tags[0].self_closing);
}

#[test]
fn named_and_numeric_character_references() {
    let log = tokenize("&amp; &#65;&#x42; &hellip;");
    assert_eq!(chars(&log), "& AB \u{2026}");
}

#[test]
fn unknown_named_reference_is_literal() {
    let log = tokenize("&bogus; x");
    assert_eq!(chars(&log), "&bogus; x");
    assert!(errors(&log).contains(&ErrorCode::CharacterReferenceInvalidCode));
}

#[test]
fn legacy_reference_without_semicolon() {
    let log = tokenize("a&gtb");
    assert_eq!(chars(&log), "a>b");
    assert!(errors(&log).contains(&ErrorCode::CharacterReferenceNotTerminated));
}

#[test]
fn legacy_reference_suppressed_in_attribute() {
    // "&gt=" inside an attribute value must not resolve.
    let log = tokenize("<a href=\"?x&gt=1\">");
    let tags = tags(&log);
    assert_eq!(&*tags[0].attrs[0].value, "?x&gt=1");
}

#[test]
fn numeric_reference_error_cases() {
    let log = tokenize("&#0;&#xD800;");
    assert_eq!(chars(&log), "\u{fffd}\u{fffd}");
    assert!(errors(&log).contains(&ErrorCode::CharacterReferenceInvalidCode));
}

#[test]
fn windows_1252_numeric_remapping() {
    let log = tokenize("&#146;");
    assert_eq!(chars(&log), "\u{2019}");
}

#[test]
fn comments() {
    let log = tokenize("<!-- hello -- world -->");
    assert!(log
        .iter()
        .any(|e| matches!(e, LogEntry::Comment(text) if text == " hello -- world ")));
}

#[test]
fn bogus_comment_from_processing_instruction() {
    let log = tokenize("<?php echo ?>");
    assert!(log
        .iter()
        .any(|e| matches!(e, LogEntry::Comment(text) if text == "?php echo ?")));
}

#[test]
fn doctype_with_identifiers() {
    let log = tokenize("<!DOCTYPE html PUBLIC \"pub\" 'sys'>");
    let doctype = log
        .iter()
        .find_map(|e| match e {
            LogEntry::Doctype(dt) => Some(dt),
            _ => None,
        })
        .expect("no doctype token");
    assert_eq!(doctype.name.as_deref(), Some("html"));
    assert_eq!(doctype.public_id.as_deref(), Some("pub"));
    assert_eq!(doctype.system_id.as_deref(), Some("sys"));
    assert!(!doctype.force_quirks);
}

#[test]
fn eof_inside_tag_drops_it() {
    let log = tokenize("<div class=");
    assert!(tags(&log).is_empty());
    assert!(errors(&log).contains(&ErrorCode::EndOfFile));
    assert!(matches!(log.last(), Some(LogEntry::Eof)));
}

#[test]
fn rawtext_passes_markup_through() {
    let opts = TokenizerOpts {
        initial_state: Some(RawData(Rawtext)),
        last_start_tag_name: Some("style".to_string()),
        ..TokenizerOpts::default()
    };
    let log = tokenize_with("a { content: \"<b>\" }</style><i>", opts);
    assert_eq!(chars(&log), "a { content: \"<b>\" }");
    let tags = tags(&log);
    assert_eq!(&*tags[0].name, "style");
    assert_eq!(tags[0].kind, TagKind::EndTag);
    assert_eq!(&*tags[1].name, "i");
}

#[test]
fn non_matching_end_tag_in_rawtext_is_text() {
    let opts = TokenizerOpts {
        initial_state: Some(RawData(Rawtext)),
        last_start_tag_name: Some("style".to_string()),
        ..TokenizerOpts::default()
    };
    let log = tokenize_with("x</styl>y", opts);
    assert_eq!(chars(&log), "x</styl>y");
    assert!(tags(&log).is_empty());
}

#[test]
fn crlf_normalization_and_line_tracking() {
    struct PosSink {
        last: std::cell::Cell<Position>,
        text: RefCell<String>,
    }
    impl TokenSink for PosSink {
        type Handle = ();
        fn process_token(&self, token: Token, position: Position) -> TokenSinkResult<()> {
            self.last.set(position);
            if let Token::Characters(t) = token {
                self.text.borrow_mut().push_str(&t);
            }
            TokenSinkResult::Continue
        }
    }

    let sink = PosSink {
        last: std::cell::Cell::new(Position::start()),
        text: RefCell::new(String::new()),
    };
    let tok = Tokenizer::new(sink, TokenizerOpts::default());
    let buffer = BufferQueue::default();
    buffer.push_back(StrTendril::from_slice("a\r\nb\rc\n"));
    let _ = tok.feed(&buffer);
    tok.end();

    // \r\n and bare \r both collapse to \n.
    assert_eq!(&*tok.sink.text.borrow(), "a\nb\nc\n");
    assert_eq!(tok.sink.last.get().line, 4);
}

#[test]
fn split_input_across_buffers() {
    // A tag and a character reference split across feed boundaries must
    // come out whole.
    let tok = Tokenizer::new(LogSink::new(), TokenizerOpts::default());
    let buffer = BufferQueue::default();
    for chunk in ["<di", "v cl", "ass=a>&am", "p; done"] {
        buffer.push_back(StrTendril::from_slice(chunk));
        let _ = tok.feed(&buffer);
    }
    tok.end();
    let log = tok.sink.log.into_inner();
    let tags = tags(&log);
    assert_eq!(&*tags[0].name, "div");
    assert_eq!(&*tags[0].attrs[0].name.local, "class");
    assert_eq!(chars(&log), "& done");
}
