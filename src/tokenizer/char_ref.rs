// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Character reference resolution, as a resumable sub-tokenizer.
//!
//! The main tokenizer hands control here after consuming `&`; this machine
//! consumes at most one character per step so it can suspend cleanly at a
//! buffer boundary and resume when more input arrives. Unconsumed lookahead
//! is pushed back onto the input queue, never buffered privately.

use std::borrow::Cow::Borrowed;

use phf::phf_map;
use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;
use crate::errors::ErrorCode;
use crate::tokenizer::{TokenSink, Tokenizer};

use self::State::*;

pub(super) struct CharRef {
    /// The resulting character(s).
    pub chars: [char; 2],
    /// How many slots in `chars` are valid?
    pub num_chars: u8,
}

pub(super) enum Status {
    Stuck,
    Progress,
    Done,
}

#[derive(Debug)]
enum State {
    Begin,
    Octothorpe,
    Numeric(u32),
    Named,
}

pub(super) struct CharRefTokenizer {
    state: State,
    is_consumed_in_attribute: bool,
    result: Option<CharRef>,

    num: u32,
    num_too_big: bool,
    seen_digit: bool,
    hex_marker: Option<char>,

    name_buf: StrTendril,
}

/// Named references resolved here. The full registry has over two thousand
/// entries; this table carries the ones that occur in real documents with
/// any frequency. Everything else is passed through literally, which is the
/// recovery the data state would apply anyway.
static NAMED_ENTITIES: phf::Map<&'static str, (char, char)> = phf_map! {
    "AElig" => ('\u{c6}', '\0'),
    "AMP" => ('&', '\0'),
    "Aacute" => ('\u{c1}', '\0'),
    "Agrave" => ('\u{c0}', '\0'),
    "Auml" => ('\u{c4}', '\0'),
    "COPY" => ('\u{a9}', '\0'),
    "Ccedil" => ('\u{c7}', '\0'),
    "Delta" => ('\u{394}', '\0'),
    "Eacute" => ('\u{c9}', '\0'),
    "GT" => ('>', '\0'),
    "LT" => ('<', '\0'),
    "Lambda" => ('\u{39b}', '\0'),
    "Ntilde" => ('\u{d1}', '\0'),
    "Omega" => ('\u{3a9}', '\0'),
    "Ouml" => ('\u{d6}', '\0'),
    "Pi" => ('\u{3a0}', '\0'),
    "QUOT" => ('"', '\0'),
    "REG" => ('\u{ae}', '\0'),
    "Sigma" => ('\u{3a3}', '\0'),
    "Uuml" => ('\u{dc}', '\0'),
    "aacute" => ('\u{e1}', '\0'),
    "acirc" => ('\u{e2}', '\0'),
    "aelig" => ('\u{e6}', '\0'),
    "agrave" => ('\u{e0}', '\0'),
    "alpha" => ('\u{3b1}', '\0'),
    "amp" => ('&', '\0'),
    "apos" => ('\'', '\0'),
    "aring" => ('\u{e5}', '\0'),
    "asymp" => ('\u{2248}', '\0'),
    "atilde" => ('\u{e3}', '\0'),
    "auml" => ('\u{e4}', '\0'),
    "beta" => ('\u{3b2}', '\0'),
    "bull" => ('\u{2022}', '\0'),
    "ccedil" => ('\u{e7}', '\0'),
    "cent" => ('\u{a2}', '\0'),
    "copy" => ('\u{a9}', '\0'),
    "dagger" => ('\u{2020}', '\0'),
    "darr" => ('\u{2193}', '\0'),
    "deg" => ('\u{b0}', '\0'),
    "delta" => ('\u{3b4}', '\0'),
    "divide" => ('\u{f7}', '\0'),
    "eacute" => ('\u{e9}', '\0'),
    "ecirc" => ('\u{ea}', '\0'),
    "egrave" => ('\u{e8}', '\0'),
    "ensp" => ('\u{2002}', '\0'),
    "emsp" => ('\u{2003}', '\0'),
    "equiv" => ('\u{2261}', '\0'),
    "euml" => ('\u{eb}', '\0'),
    "euro" => ('\u{20ac}', '\0'),
    "frac12" => ('\u{bd}', '\0'),
    "frac14" => ('\u{bc}', '\0'),
    "frac34" => ('\u{be}', '\0'),
    "gamma" => ('\u{3b3}', '\0'),
    "ge" => ('\u{2265}', '\0'),
    "gt" => ('>', '\0'),
    "harr" => ('\u{2194}', '\0'),
    "hellip" => ('\u{2026}', '\0'),
    "iacute" => ('\u{ed}', '\0'),
    "icirc" => ('\u{ee}', '\0'),
    "iexcl" => ('\u{a1}', '\0'),
    "igrave" => ('\u{ec}', '\0'),
    "infin" => ('\u{221e}', '\0'),
    "int" => ('\u{222b}', '\0'),
    "iquest" => ('\u{bf}', '\0'),
    "iuml" => ('\u{ef}', '\0'),
    "lambda" => ('\u{3bb}', '\0'),
    "laquo" => ('\u{ab}', '\0'),
    "larr" => ('\u{2190}', '\0'),
    "ldquo" => ('\u{201c}', '\0'),
    "le" => ('\u{2264}', '\0'),
    "lrm" => ('\u{200e}', '\0'),
    "lsquo" => ('\u{2018}', '\0'),
    "lt" => ('<', '\0'),
    "mdash" => ('\u{2014}', '\0'),
    "micro" => ('\u{b5}', '\0'),
    "middot" => ('\u{b7}', '\0'),
    "mu" => ('\u{3bc}', '\0'),
    "nbsp" => ('\u{a0}', '\0'),
    "ndash" => ('\u{2013}', '\0'),
    "ne" => ('\u{2260}', '\0'),
    "not" => ('\u{ac}', '\0'),
    "ntilde" => ('\u{f1}', '\0'),
    "oacute" => ('\u{f3}', '\0'),
    "ocirc" => ('\u{f4}', '\0'),
    "oelig" => ('\u{153}', '\0'),
    "ograve" => ('\u{f2}', '\0'),
    "oslash" => ('\u{f8}', '\0'),
    "otilde" => ('\u{f5}', '\0'),
    "ouml" => ('\u{f6}', '\0'),
    "para" => ('\u{b6}', '\0'),
    "pi" => ('\u{3c0}', '\0'),
    "plusmn" => ('\u{b1}', '\0'),
    "pound" => ('\u{a3}', '\0'),
    "prod" => ('\u{220f}', '\0'),
    "quot" => ('"', '\0'),
    "radic" => ('\u{221a}', '\0'),
    "raquo" => ('\u{bb}', '\0'),
    "rarr" => ('\u{2192}', '\0'),
    "rdquo" => ('\u{201d}', '\0'),
    "reg" => ('\u{ae}', '\0'),
    "rlm" => ('\u{200f}', '\0'),
    "rsquo" => ('\u{2019}', '\0'),
    "sect" => ('\u{a7}', '\0'),
    "shy" => ('\u{ad}', '\0'),
    "sigma" => ('\u{3c3}', '\0'),
    "sum" => ('\u{2211}', '\0'),
    "sup1" => ('\u{b9}', '\0'),
    "sup2" => ('\u{b2}', '\0'),
    "sup3" => ('\u{b3}', '\0'),
    "szlig" => ('\u{df}', '\0'),
    "thinsp" => ('\u{2009}', '\0'),
    "times" => ('\u{d7}', '\0'),
    "trade" => ('\u{2122}', '\0'),
    "uacute" => ('\u{fa}', '\0'),
    "ucirc" => ('\u{fb}', '\0'),
    "ugrave" => ('\u{f9}', '\0'),
    "uarr" => ('\u{2191}', '\0'),
    "uuml" => ('\u{fc}', '\0'),
    "yen" => ('\u{a5}', '\0'),
    "yuml" => ('\u{ff}', '\0'),
    "zwj" => ('\u{200d}', '\0'),
    "zwnj" => ('\u{200c}', '\0'),
};

/// References the spec allows without a trailing semicolon.
static LEGACY_NO_SEMICOLON: &[&str] = &[
    "AMP", "COPY", "GT", "LT", "QUOT", "REG", "amp", "copy", "gt", "lt", "nbsp", "quot", "reg",
];

/// Windows-1252 remappings for numeric references in the C1 control range.
fn c1_replacement(n: u32) -> Option<char> {
    match n {
        0x80 => Some('\u{20ac}'),
        0x82 => Some('\u{201a}'),
        0x83 => Some('\u{192}'),
        0x84 => Some('\u{201e}'),
        0x85 => Some('\u{2026}'),
        0x86 => Some('\u{2020}'),
        0x87 => Some('\u{2021}'),
        0x88 => Some('\u{2c6}'),
        0x89 => Some('\u{2030}'),
        0x8a => Some('\u{160}'),
        0x8b => Some('\u{2039}'),
        0x8c => Some('\u{152}'),
        0x8e => Some('\u{17d}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201c}'),
        0x94 => Some('\u{201d}'),
        0x95 => Some('\u{2022}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x98 => Some('\u{2dc}'),
        0x99 => Some('\u{2122}'),
        0x9a => Some('\u{161}'),
        0x9b => Some('\u{203a}'),
        0x9c => Some('\u{153}'),
        0x9e => Some('\u{17e}'),
        0x9f => Some('\u{178}'),
        _ => None,
    }
}

impl CharRefTokenizer {
    pub(super) fn new(is_consumed_in_attribute: bool) -> CharRefTokenizer {
        CharRefTokenizer {
            state: Begin,
            is_consumed_in_attribute,
            result: None,
            num: 0,
            num_too_big: false,
            seen_digit: false,
            hex_marker: None,
            name_buf: StrTendril::new(),
        }
    }

    /// A CharRefTokenizer can only tokenize one character reference,
    /// so this can only be called once.
    pub(super) fn get_result(self) -> CharRef {
        self.result.expect("get_result called before done")
    }

    fn finish_none(&mut self) -> Status {
        self.result = Some(CharRef {
            chars: ['\0', '\0'],
            num_chars: 0,
        });
        Status::Done
    }

    fn finish_one(&mut self, c: char) -> Status {
        self.result = Some(CharRef {
            chars: [c, '\0'],
            num_chars: 1,
        });
        Status::Done
    }

    pub(super) fn step<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) -> Status {
        if self.result.is_some() {
            return Status::Done;
        }

        match self.state {
            Begin => self.do_begin(tokenizer, input),
            Octothorpe => self.do_octothorpe(tokenizer, input),
            Numeric(base) => self.do_numeric(tokenizer, input, base),
            Named => self.do_named(tokenizer, input),
        }
    }

    fn peek<Sink: TokenSink>(
        &self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) -> Option<Option<char>> {
        // Outer None: stuck, waiting for input. Inner None: genuine
        // end of stream.
        match tokenizer.peek(input) {
            Some(c) => Some(Some(c)),
            None if tokenizer.is_at_eof() => Some(None),
            None => None,
        }
    }

    fn do_begin<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) -> Status {
        let c = match self.peek(tokenizer, input) {
            None => return Status::Stuck,
            Some(None) => return self.finish_none(),
            Some(Some(c)) => c,
        };
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => {
                self.state = Named;
                Status::Progress
            },
            '#' => {
                tokenizer.discard_char(input);
                self.state = Octothorpe;
                Status::Progress
            },
            _ => self.finish_none(),
        }
    }

    fn do_octothorpe<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) -> Status {
        let c = match self.peek(tokenizer, input) {
            None => return Status::Stuck,
            Some(None) => {
                input.push_front(StrTendril::from_slice("#"));
                return self.finish_none();
            },
            Some(Some(c)) => c,
        };
        match c {
            'x' | 'X' => {
                tokenizer.discard_char(input);
                self.hex_marker = Some(c);
                self.state = Numeric(16);
            },
            _ => {
                self.hex_marker = None;
                self.state = Numeric(10);
            },
        }
        Status::Progress
    }

    fn unconsume_numeric_prefix(&self, input: &BufferQueue) {
        let mut buf = StrTendril::from_slice("#");
        if let Some(marker) = self.hex_marker {
            buf.push_char(marker);
        }
        input.push_front(buf);
    }

    fn do_numeric<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
        base: u32,
    ) -> Status {
        let c = match self.peek(tokenizer, input) {
            None => return Status::Stuck,
            Some(None) => return self.finish_numeric(tokenizer),
            Some(Some(c)) => c,
        };
        match c.to_digit(base) {
            Some(n) => {
                tokenizer.discard_char(input);
                self.num = self.num.wrapping_mul(base);
                if self.num > 0x10ffff {
                    self.num_too_big = true;
                }
                self.num = self.num.wrapping_add(n);
                self.seen_digit = true;
                Status::Progress
            },

            None if !self.seen_digit => {
                tokenizer.emit_error(
                    ErrorCode::CharacterReferenceInvalidNumber,
                    Borrowed("Numeric character reference without digits"),
                );
                self.unconsume_numeric_prefix(input);
                self.finish_none()
            },

            None => {
                if c == ';' {
                    tokenizer.discard_char(input);
                } else {
                    tokenizer.emit_error(
                        ErrorCode::CharacterReferenceNotTerminated,
                        Borrowed("Semicolon missing after numeric character reference"),
                    );
                }
                self.finish_numeric(tokenizer)
            },
        }
    }

    fn finish_numeric<Sink: TokenSink>(&mut self, tokenizer: &Tokenizer<Sink>) -> Status {
        // char::from_u32 rejects surrogates for us.
        fn conv(n: u32) -> Option<char> {
            char::from_u32(n)
        }

        let (c, error) = match self.num {
            n if n > 0x10ffff || self.num_too_big => ('\u{fffd}', true),
            0x00 => ('\u{fffd}', true),
            0x80..=0x9f => match c1_replacement(self.num) {
                Some(c) => (c, true),
                None => (conv(self.num).unwrap_or('\u{fffd}'), true),
            },
            n => match conv(n) {
                Some(c) => (c, false),
                None => ('\u{fffd}', true),
            },
        };

        if error {
            tokenizer.emit_error(
                ErrorCode::CharacterReferenceInvalidCode,
                Borrowed("Invalid numeric character reference"),
            );
        }
        self.finish_one(c)
    }

    fn do_named<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) -> Status {
        let c = match self.peek(tokenizer, input) {
            None => return Status::Stuck,
            Some(None) => return self.finish_named(tokenizer, input, None),
            Some(Some(c)) => c,
        };
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => {
                tokenizer.discard_char(input);
                self.name_buf.push_char(c);
                Status::Progress
            },
            ';' => {
                tokenizer.discard_char(input);
                self.finish_named(tokenizer, input, Some(';'))
            },
            _ => self.finish_named(tokenizer, input, Some(c)),
        }
    }

    fn finish_named<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
        end_char: Option<char>,
    ) -> Status {
        let name: &str = &self.name_buf;

        if end_char == Some(';') {
            if let Some(&(c1, c2)) = NAMED_ENTITIES.get(name) {
                return self.finish_chars(c1, c2);
            }
            tokenizer.emit_error(
                ErrorCode::CharacterReferenceInvalidCode,
                Borrowed("Unknown named character reference"),
            );
            // Re-tokenize the name and the semicolon as data.
            let mut unconsumed = StrTendril::from_slice(name);
            unconsumed.push_char(';');
            input.push_front(unconsumed);
            return self.finish_none();
        }

        // Legacy references may omit the semicolon; the match is the
        // longest prefix of what we swallowed. Inside an attribute value
        // a match whose next character continues the name (or is '=') is
        // suppressed, so URLs like "?x&gt=1" survive.
        let mut longest: Option<&'static str> = None;
        for candidate in LEGACY_NO_SEMICOLON {
            if name.starts_with(candidate) && candidate.len() > longest.map_or(0, str::len) {
                longest = Some(candidate);
            }
        }
        if let Some(matched) = longest {
            let next_char = name[matched.len()..].chars().next().or(end_char);
            let suppressed = self.is_consumed_in_attribute
                && matches!(next_char, Some('=') | Some('a'..='z' | 'A'..='Z' | '0'..='9'));
            if !suppressed {
                let &(c1, c2) = NAMED_ENTITIES
                    .get(matched)
                    .expect("legacy entity missing from table");
                tokenizer.emit_error(
                    ErrorCode::CharacterReferenceNotTerminated,
                    Borrowed("Character reference does not end with semicolon"),
                );
                let tail = &name[matched.len()..];
                if !tail.is_empty() {
                    input.push_front(StrTendril::from_slice(tail));
                }
                return self.finish_chars(c1, c2);
            }
        }

        input.push_front(std::mem::take(&mut self.name_buf));
        self.finish_none()
    }

    fn finish_chars(&mut self, c1: char, c2: char) -> Status {
        if c2 == '\0' {
            self.finish_one(c1)
        } else {
            self.result = Some(CharRef {
                chars: [c1, c2],
                num_chars: 2,
            });
            Status::Done
        }
    }

    /// The stream ended while a reference was in flight; settle it the same
    /// way a non-matching character would.
    pub(super) fn end_of_file<Sink: TokenSink>(
        &mut self,
        tokenizer: &Tokenizer<Sink>,
        input: &BufferQueue,
    ) {
        while self.result.is_none() {
            match self.step(tokenizer, input) {
                Status::Done => break,
                Status::Stuck => {
                    // With at_eof set, step() always makes progress or
                    // finishes; a stuck machine here is a logic error.
                    self.finish_none();
                    break;
                },
                Status::Progress => (),
            }
        }
    }
}
