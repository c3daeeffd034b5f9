// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML tokenizer: a character-classifying state machine over a
//! [`BufferQueue`] of decoded input.
//!
//! Tokens flow out through a [`TokenSink`], which pushes state switches
//! back in (RCDATA, RAWTEXT, script data, PLAINTEXT). The machine only
//! ever consumes what is buffered and parks cleanly at a buffer
//! boundary, so the driver can feed it incrementally and splice
//! `document.write` output in at the insertion point between feeds.
//!
//! In-flight token state lives in small builder structs ([`TagBuilder`],
//! [`DoctypeBuilder`]) rather than loose fields, and lookahead is a
//! one-character pushback slot plus the shared buffer queue.

pub use self::interface::{Doctype, Tag, TagKind, Token};
pub use self::interface::{EndTag, StartTag};
pub use self::interface::{TokenSink, TokenSinkResult, TokenizerResult};

use std::borrow::Cow::{self, Borrowed};
use std::cell::{Cell, RefCell};
use std::mem;

use log::debug;
use tendril::StrTendril;

use self::char_ref::{CharRef, CharRefTokenizer, Status};
use self::states::{DoctypeIdKind, Public, System};
use self::states::{DoubleQuoted, SingleQuoted, Unquoted};
use self::states::{Rcdata, ScriptData};

use crate::buffer_queue::{BufferQueue, FromSet, NotFromSet, SetResult};
use crate::errors::{ErrorCode, Position};
use crate::interface::Attribute;
use crate::macros::unwrap_or_park;
use crate::util::smallcharset::SmallCharSet;
use crate::util::str::lower_ascii_letter;
use crate::{ns, small_char_set, LocalName, QualName};

mod char_ref;
mod interface;
pub mod states;

/// What one `step` of the machine did.
pub enum Action<Handle> {
    /// Made progress; go again.
    Continue,
    /// Out of input; wait for the next feed.
    Suspend,
    /// A script element must run before tokenization continues.
    Script(Handle),
    /// The document declared a character encoding.
    Encoding(StrTendril),
}

/// Tokenizer options, with an impl for `Default`.
#[derive(Clone)]
pub struct TokenizerOpts {
    /// Also report the input-stream character errors the spec describes
    /// (noncharacters, controls), at a per-character cost? Default: false
    pub exact_errors: bool,

    /// Discard a leading `U+FEFF BYTE ORDER MARK`? Default: true
    pub discard_bom: bool,

    /// Starting state, for fragment parsing, which preconfigures the
    /// state from the context element's tag.
    pub initial_state: Option<states::State>,

    /// Pretend this start tag was already seen, so that an end tag
    /// matching a fragment's context element counts as "appropriate".
    pub last_start_tag_name: Option<String>,
}

impl Default for TokenizerOpts {
    fn default() -> TokenizerOpts {
        TokenizerOpts {
            exact_errors: false,
            discard_bom: true,
            initial_state: None,
            last_start_tag_name: None,
        }
    }
}

/// The tag token under construction.
#[derive(Default)]
struct TagBuilder {
    kind: Option<TagKind>,
    name: StrTendril,
    self_closing: bool,
    attrs: Vec<Attribute>,
    attr_name: StrTendril,
    attr_value: StrTendril,
}

impl TagBuilder {
    fn begin(&mut self, kind: TagKind, first: char) {
        self.clear();
        self.kind = Some(kind);
        self.name.push_char(first);
    }

    fn clear(&mut self) {
        self.kind = None;
        self.name.clear();
        self.self_closing = false;
        self.attrs.clear();
        self.attr_name.clear();
        self.attr_value.clear();
    }

    fn kind(&self) -> TagKind {
        self.kind.expect("no tag under construction")
    }

    /// Commit the pending attribute, if any. Returns false when it was a
    /// duplicate and had to be dropped (first write wins).
    fn commit_attr(&mut self) -> bool {
        if self.attr_name.is_empty() {
            return true;
        }
        let duplicate = self
            .attrs
            .iter()
            .any(|attr| *attr.name.local == *self.attr_name);
        if duplicate {
            self.attr_name.clear();
            self.attr_value.clear();
            return false;
        }
        let local = LocalName::from(&*self.attr_name);
        self.attr_name.clear();
        self.attrs.push(Attribute {
            // Attributes leave the tokenizer namespace-less; foreign
            // content adjustment may rewrite them later.
            name: QualName::new(None, ns!(), local),
            value: mem::take(&mut self.attr_value),
        });
        true
    }

    fn take(&mut self) -> Tag {
        let tag = Tag {
            kind: self.kind(),
            name: LocalName::from(&*self.name),
            self_closing: self.self_closing,
            attrs: mem::take(&mut self.attrs),
        };
        self.clear();
        tag
    }
}

/// The doctype token under construction.
#[derive(Default)]
struct DoctypeBuilder {
    doctype: Doctype,
}

impl DoctypeBuilder {
    fn begin(&mut self) {
        self.doctype = Doctype::default();
    }

    fn push_name(&mut self, c: char) {
        self.doctype
            .name
            .get_or_insert_with(StrTendril::new)
            .push_char(c);
    }

    fn id_mut(&mut self, kind: DoctypeIdKind) -> &mut Option<StrTendril> {
        match kind {
            Public => &mut self.doctype.public_id,
            System => &mut self.doctype.system_id,
        }
    }

    fn start_id(&mut self, kind: DoctypeIdKind) {
        *self.id_mut(kind) = Some(StrTendril::new());
    }

    fn push_id(&mut self, kind: DoctypeIdKind, c: char) {
        self.id_mut(kind)
            .as_mut()
            .expect("doctype identifier not started")
            .push_char(c);
    }

    fn force_quirks(&mut self) {
        self.doctype.force_quirks = true;
    }

    fn take(&mut self) -> Doctype {
        mem::take(&mut self.doctype)
    }
}

/// The HTML tokenizer.
pub struct Tokenizer<Sink> {
    opts: TokenizerOpts,

    /// Destination for tokens.
    pub sink: Sink,

    /// Current machine state.
    state: Cell<states::State>,

    /// No more input will ever arrive; lookahead may stop waiting.
    at_eof: Cell<bool>,

    /// The character-reference sub-machine, while one is in flight.
    char_ref: RefCell<Option<Box<CharRefTokenizer>>>,

    /// One consumed-but-returned character; checked before the queue.
    held: Cell<Option<char>>,

    /// A `\r` was folded to `\n`; swallow an immediately following `\n`.
    half_crlf: Cell<bool>,

    /// Strip a BOM if the first character is one.
    drop_bom: Cell<bool>,

    tag: RefCell<TagBuilder>,
    doctype: RefCell<DoctypeBuilder>,
    comment: RefCell<StrTendril>,

    /// Most recent start tag name, for the "appropriate end tag" check
    /// in raw-text states.
    last_start_tag: RefCell<Option<LocalName>>,

    /// Characters consumed by an `expect` that could not finish in the
    /// available input; replayed on the next attempt.
    lookahead: RefCell<StrTendril>,

    /// Original text of a candidate raw-text end tag, emitted verbatim
    /// if the candidate turns out not to be appropriate.
    raw_end_tag_text: RefCell<StrTendril>,

    /// Position of the character most recently consumed.
    position: Cell<Position>,
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    /// Create a new tokenizer which feeds tokens to a particular
    /// `TokenSink`.
    pub fn new(sink: Sink, mut opts: TokenizerOpts) -> Tokenizer<Sink> {
        let last_start_tag = opts
            .last_start_tag_name
            .take()
            .map(|name| LocalName::from(&*name));
        let state = opts.initial_state.unwrap_or(states::Data);
        let drop_bom = opts.discard_bom;
        Tokenizer {
            opts,
            sink,
            state: Cell::new(state),
            at_eof: Cell::new(false),
            char_ref: RefCell::new(None),
            held: Cell::new(None),
            half_crlf: Cell::new(false),
            drop_bom: Cell::new(drop_bom),
            tag: RefCell::new(TagBuilder::default()),
            doctype: RefCell::new(DoctypeBuilder::default()),
            comment: RefCell::new(StrTendril::new()),
            last_start_tag: RefCell::new(last_start_tag),
            lookahead: RefCell::new(StrTendril::new()),
            raw_end_tag_text: RefCell::new(StrTendril::new()),
            position: Cell::new(Position::start()),
        }
    }

    /// Feed an input string into the tokenizer.
    pub fn feed(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        if input.is_empty() {
            return TokenizerResult::Done;
        }

        if self.drop_bom.get() {
            match input.peek() {
                Some('\u{feff}') => {
                    input.next();
                    self.drop_bom.set(false);
                },
                Some(_) => self.drop_bom.set(false),
                None => return TokenizerResult::Done,
            }
        }

        self.run(input)
    }

    pub fn set_plaintext_state(&self) {
        self.state.set(states::Plaintext);
    }

    /// The source position of the character most recently consumed.
    pub fn position(&self) -> Position {
        self.position.get()
    }

    pub(crate) fn is_at_eof(&self) -> bool {
        self.at_eof.get()
    }

    /// Run the state machine over whatever is buffered.
    fn run(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        loop {
            match self.step(input) {
                Action::Continue => {},
                Action::Suspend => return TokenizerResult::Done,
                Action::Script(node) => return TokenizerResult::Script(node),
                Action::Encoding(label) => return TokenizerResult::EncodingIndicator(label),
            }
        }
    }

    //§ preprocessing-the-input-stream
    /// Fold newlines, track the position, and (optionally) report the
    /// characters the spec calls out as errors in the stream.
    fn preprocess(&self, mut c: char, input: &BufferQueue) -> Option<char> {
        if self.half_crlf.take() && c == '\n' {
            c = input.next()?;
        }
        if c == '\r' {
            self.half_crlf.set(true);
            c = '\n';
        }

        let mut position = self.position.get();
        if c == '\n' {
            position.line += 1;
            position.column = 1;
        } else {
            position.column += 1;
        }
        self.position.set(position);

        if self.opts.exact_errors && is_input_stream_error(c) {
            self.emit_error(
                ErrorCode::BogusCharacter,
                Cow::from(format!("Bad character {c:?}")),
            );
        }

        Some(c)
    }
    //§ END

    /// The next character, honoring the pushback slot.
    fn next_char(&self, input: &BufferQueue) -> Option<char> {
        if let Some(held) = self.held.take() {
            return Some(held);
        }
        input.next().and_then(|c| self.preprocess(c, input))
    }

    /// Return a character to be consumed again. Held characters have
    /// already been preprocessed.
    fn push_back(&self, c: char) {
        debug_assert!(self.held.get().is_none(), "pushback slot occupied");
        self.held.set(Some(c));
    }

    pub(crate) fn peek(&self, input: &BufferQueue) -> Option<char> {
        self.held.get().or_else(|| input.peek())
    }

    pub(crate) fn discard_char(&self, input: &BufferQueue) {
        let _ = self.next_char(input);
    }

    /// Batched consumption: a whole run of characters outside `set`, or
    /// one character from it.
    fn take_run(&self, input: &BufferQueue, set: SmallCharSet) -> Option<SetResult> {
        // The batch path cannot honor pushback, newline folding in
        // progress, or per-character error checks; fall back to single
        // characters whenever any of those is live.
        if self.opts.exact_errors || self.held.get().is_some() || self.half_crlf.get() {
            return self.next_char(input).map(FromSet);
        }

        match input.pop_except_from(set) {
            Some(FromSet(c)) => self.preprocess(c, input).map(FromSet),
            Some(NotFromSet(run)) => {
                // Runs never span newlines; every set in use contains
                // \r and \n.
                let mut position = self.position.get();
                position.column += run.chars().count() as u64;
                self.position.set(position);
                Some(NotFromSet(run))
            },
            None => None,
        }
    }

    /// Case-insensitive lookahead for a fixed word. `None` means the
    /// buffered input is too short to decide; the partial prefix is
    /// parked in `lookahead` and replayed next time.
    fn expect(&self, input: &BufferQueue, word: &str, eq: fn(&u8, &u8) -> bool) -> Option<bool> {
        debug_assert!(self.held.get().is_none(), "lookahead over pushback");
        if self.half_crlf.take() && self.peek(input) == Some('\n') {
            input.next();
        }

        input.push_front(mem::take(&mut *self.lookahead.borrow_mut()));
        match input.eat(word, eq) {
            Some(true) => {
                let mut position = self.position.get();
                position.column += word.len() as u64;
                self.position.set(position);
                Some(true)
            },
            Some(false) => Some(false),
            None if self.at_eof.get() => Some(false),
            None => {
                // Park what we swallowed for the retry.
                while let Some(c) = input.next() {
                    self.lookahead.borrow_mut().push_char(c);
                }
                None
            },
        }
    }

    //§ tokenization
    fn send(&self, token: Token) -> TokenSinkResult<Sink::Handle> {
        self.sink.process_token(token, self.position.get())
    }

    fn send_expecting_continue(&self, token: Token) {
        let answer = self.send(token);
        assert!(matches!(answer, TokenSinkResult::Continue));
    }

    pub(crate) fn emit_error(&self, code: ErrorCode, message: Cow<'static, str>) {
        self.send_expecting_continue(Token::Error(code, message));
    }

    fn error_here(&self, c: char) {
        let state = self.state.get();
        self.emit_error(
            ErrorCode::BogusCharacter,
            Cow::from(format!("Saw {c:?} in state {state:?}")),
        );
    }

    fn send_char(&self, c: char) {
        self.send_expecting_continue(match c {
            '\0' => Token::NullCharacter,
            _ => Token::Characters(StrTendril::from_char(c)),
        });
    }

    fn send_text(&self, text: StrTendril) {
        if text.len32() > 0 {
            self.send_expecting_continue(Token::Characters(text));
        }
    }

    fn send_str(&self, text: &str) {
        self.send_text(StrTendril::from_slice(text));
    }

    fn finish_comment(&self) {
        let text = mem::take(&mut *self.comment.borrow_mut());
        self.send_expecting_continue(Token::Comment(text));
    }

    fn finish_doctype(&self) {
        let doctype = self.doctype.borrow_mut().take();
        self.send_expecting_continue(Token::Doctype(doctype));
    }

    fn commit_attribute(&self) {
        let kept = self.tag.borrow_mut().commit_attr();
        if !kept {
            self.emit_error(ErrorCode::DoubleAttribute, Borrowed("Duplicate attribute"));
        }
    }

    fn start_attribute(&self, c: char) {
        self.commit_attribute();
        self.tag.borrow_mut().attr_name.push_char(c);
    }

    fn is_appropriate_end_tag(&self) -> bool {
        let tag = self.tag.borrow();
        if tag.kind != Some(EndTag) {
            return false;
        }
        match self.last_start_tag.borrow().as_ref() {
            Some(last) => *tag.name == **last,
            None => false,
        }
    }

    /// Close out the tag under construction and hand it to the sink,
    /// applying whatever state switch the sink pushes back.
    fn finish_tag(&self) -> Action<Sink::Handle> {
        self.commit_attribute();
        let tag = self.tag.borrow_mut().take();

        match tag.kind {
            StartTag => {
                *self.last_start_tag.borrow_mut() = Some(tag.name.clone());
            },
            EndTag => {
                if !tag.attrs.is_empty() {
                    self.emit_error(
                        ErrorCode::EndTagCannotHaveAttributes,
                        Borrowed("Attributes on an end tag"),
                    );
                }
                if tag.self_closing {
                    self.emit_error(
                        ErrorCode::EndTagCannotBeSelfClosed,
                        Borrowed("Self-closing end tag"),
                    );
                }
            },
        }

        self.state.set(states::Data);
        match self.send(Token::Tag(tag)) {
            TokenSinkResult::Continue => Action::Continue,
            TokenSinkResult::Plaintext => {
                self.state.set(states::Plaintext);
                Action::Continue
            },
            TokenSinkResult::Script(node) => Action::Script(node),
            TokenSinkResult::RawData(kind) => {
                self.state.set(states::RawData(kind));
                Action::Continue
            },
            TokenSinkResult::EncodingIndicator(label) => Action::Encoding(label),
        }
    }

    //§ character-reference-state
    fn begin_char_ref(&self) -> Action<Sink::Handle> {
        let in_attribute = matches!(self.state.get(), states::AttributeValue(_));
        *self.char_ref.borrow_mut() = Some(Box::new(CharRefTokenizer::new(in_attribute)));
        Action::Continue
    }

    fn deliver_char_ref(&self, char_ref: CharRef) {
        let CharRef { chars, num_chars } = char_ref;

        let resolved: &[char] = if num_chars == 0 {
            &['&']
        } else {
            &chars[..num_chars as usize]
        };

        for &c in resolved {
            match self.state.get() {
                states::Data | states::RawData(Rcdata) => self.send_char(c),
                states::AttributeValue(_) => self.tag.borrow_mut().attr_value.push_char(c),
                state => panic!("character reference resolved in state {state:?}"),
            }
        }
    }

    fn step_char_ref(&self, input: &BufferQueue) -> Action<Sink::Handle> {
        let mut machine = self.char_ref.take().expect("no char ref in flight");
        match machine.step(self, input) {
            Status::Done => {
                self.deliver_char_ref(machine.get_result());
                Action::Continue
            },
            Status::Stuck => {
                *self.char_ref.borrow_mut() = Some(machine);
                Action::Suspend
            },
            Status::Progress => {
                *self.char_ref.borrow_mut() = Some(machine);
                Action::Continue
            },
        }
    }
    //§ END

    fn again_in(&self, c: char, state: states::State) -> Action<Sink::Handle> {
        self.push_back(c);
        self.state.set(state);
        Action::Continue
    }

    fn go(&self, state: states::State) -> Action<Sink::Handle> {
        self.state.set(state);
        Action::Continue
    }

    fn step(&self, input: &BufferQueue) -> Action<Sink::Handle> {
        if self.char_ref.borrow().is_some() {
            return self.step_char_ref(input);
        }

        #[cfg(feature = "trace_tokenizer")]
        log::trace!("state {:?}", self.state.get());

        match self.state.get() {
            states::Data => {
                match unwrap_or_park!(
                    self.take_run(input, small_char_set!('\r' '\0' '&' '<' '\n'))
                ) {
                    FromSet('\0') => {
                        self.emit_error(ErrorCode::NullCharacter, Borrowed("Saw U+0000 in stream"));
                        self.send_char('\0');
                        Action::Continue
                    },
                    FromSet('&') => self.begin_char_ref(),
                    FromSet('<') => self.go(states::TagOpen),
                    FromSet(c) => {
                        self.send_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.send_text(run);
                        Action::Continue
                    },
                }
            },

            states::RawData(kind) => {
                let set = match kind {
                    Rcdata => small_char_set!('\r' '\0' '&' '<' '\n'),
                    _ => small_char_set!('\r' '\0' '<' '\n'),
                };
                match unwrap_or_park!(self.take_run(input, set)) {
                    FromSet('\0') => {
                        self.emit_error(ErrorCode::NullCharacter, Borrowed("Saw U+0000 in stream"));
                        self.send_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet('&') if kind == Rcdata => self.begin_char_ref(),
                    FromSet('<') => self.go(states::RawLessThanSign(kind)),
                    FromSet(c) => {
                        self.send_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.send_text(run);
                        Action::Continue
                    },
                }
            },

            states::Plaintext => {
                match unwrap_or_park!(self.take_run(input, small_char_set!('\r' '\0' '\n'))) {
                    FromSet('\0') => {
                        self.emit_error(ErrorCode::NullCharacter, Borrowed("Saw U+0000 in stream"));
                        self.send_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet(c) => {
                        self.send_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.send_text(run);
                        Action::Continue
                    },
                }
            },

            //§ tag-open-state
            states::TagOpen => match unwrap_or_park!(self.next_char(input)) {
                '!' => self.go(states::MarkupDeclarationOpen),
                '/' => self.go(states::EndTagOpen),
                '?' => {
                    self.error_here('?');
                    self.comment.borrow_mut().clear();
                    self.again_in('?', states::BogusComment)
                },
                c => match lower_ascii_letter(c) {
                    Some(lowered) => {
                        self.tag.borrow_mut().begin(StartTag, lowered);
                        self.go(states::TagName)
                    },
                    None => {
                        self.error_here(c);
                        self.send_char('<');
                        self.again_in(c, states::Data)
                    },
                },
            },

            //§ end-tag-open-state
            states::EndTagOpen => match unwrap_or_park!(self.next_char(input)) {
                '>' => {
                    self.emit_error(
                        ErrorCode::TagClosedImmediately,
                        Borrowed("Saw empty end tag </>"),
                    );
                    self.go(states::Data)
                },
                c => match lower_ascii_letter(c) {
                    Some(lowered) => {
                        self.tag.borrow_mut().begin(EndTag, lowered);
                        self.go(states::TagName)
                    },
                    None => {
                        self.error_here(c);
                        self.comment.borrow_mut().clear();
                        self.again_in(c, states::BogusComment)
                    },
                },
            },

            //§ tag-name-state
            states::TagName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::BeforeAttributeName),
                '/' => self.go(states::SelfClosingStartTag),
                '>' => self.finish_tag(),
                '\0' => {
                    self.error_here('\0');
                    self.tag.borrow_mut().name.push_char('\u{fffd}');
                    Action::Continue
                },
                c => {
                    self.tag.borrow_mut().name.push_char(c.to_ascii_lowercase());
                    Action::Continue
                },
            },

            states::RawLessThanSign(kind) => match unwrap_or_park!(self.next_char(input)) {
                '/' => {
                    self.raw_end_tag_text.borrow_mut().clear();
                    self.go(states::RawEndTagOpen(kind))
                },
                '!' if kind == ScriptData => {
                    // Script-data escaping is not modeled; `<!--` inside
                    // a script passes through as text. Only inline
                    // scripts hiding "</script>" inside a comment notice.
                    self.send_str("<!");
                    self.go(states::RawData(kind))
                },
                c => {
                    self.send_char('<');
                    self.again_in(c, states::RawData(kind))
                },
            },

            states::RawEndTagOpen(kind) => {
                let c = unwrap_or_park!(self.next_char(input));
                match lower_ascii_letter(c) {
                    Some(lowered) => {
                        self.tag.borrow_mut().begin(EndTag, lowered);
                        self.raw_end_tag_text.borrow_mut().push_char(c);
                        self.go(states::RawEndTagName(kind))
                    },
                    None => {
                        self.send_str("</");
                        self.again_in(c, states::RawData(kind))
                    },
                }
            },

            states::RawEndTagName(kind) => {
                let c = unwrap_or_park!(self.next_char(input));
                if self.is_appropriate_end_tag() {
                    match c {
                        '\t' | '\n' | '\x0C' | ' ' => return self.go(states::BeforeAttributeName),
                        '/' => return self.go(states::SelfClosingStartTag),
                        '>' => return self.finish_tag(),
                        _ => {},
                    }
                }

                match lower_ascii_letter(c) {
                    Some(lowered) => {
                        self.tag.borrow_mut().name.push_char(lowered);
                        self.raw_end_tag_text.borrow_mut().push_char(c);
                        Action::Continue
                    },
                    None => {
                        // Not an end tag after all; replay it as text.
                        self.tag.borrow_mut().clear();
                        self.send_str("</");
                        let text = mem::take(&mut *self.raw_end_tag_text.borrow_mut());
                        self.send_text(text);
                        self.again_in(c, states::RawData(kind))
                    },
                }
            },

            //§ before-attribute-name-state
            states::BeforeAttributeName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                '/' => self.go(states::SelfClosingStartTag),
                '>' => self.finish_tag(),
                '\0' => {
                    self.error_here('\0');
                    self.start_attribute('\u{fffd}');
                    self.go(states::AttributeName)
                },
                c => {
                    if matches!(c, '"' | '\'' | '<' | '=') {
                        self.emit_error(
                            ErrorCode::AttributeNameInvalid,
                            Borrowed("Unexpected character at attribute name start"),
                        );
                    }
                    self.start_attribute(c.to_ascii_lowercase());
                    self.go(states::AttributeName)
                },
            },

            //§ attribute-name-state
            states::AttributeName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::AfterAttributeName),
                '/' => self.go(states::SelfClosingStartTag),
                '=' => self.go(states::BeforeAttributeValue),
                '>' => self.finish_tag(),
                '\0' => {
                    self.error_here('\0');
                    self.tag.borrow_mut().attr_name.push_char('\u{fffd}');
                    Action::Continue
                },
                c => {
                    if matches!(c, '"' | '\'' | '<') {
                        self.emit_error(
                            ErrorCode::AttributeNameInvalid,
                            Borrowed("Unexpected character in attribute name"),
                        );
                    }
                    self.tag
                        .borrow_mut()
                        .attr_name
                        .push_char(c.to_ascii_lowercase());
                    Action::Continue
                },
            },

            //§ after-attribute-name-state
            states::AfterAttributeName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                '/' => self.go(states::SelfClosingStartTag),
                '=' => self.go(states::BeforeAttributeValue),
                '>' => self.finish_tag(),
                '\0' => {
                    self.error_here('\0');
                    self.start_attribute('\u{fffd}');
                    self.go(states::AttributeName)
                },
                c => {
                    if matches!(c, '"' | '\'' | '<') {
                        self.emit_error(
                            ErrorCode::AttributeNameInvalid,
                            Borrowed("Unexpected character at attribute name start"),
                        );
                    }
                    self.start_attribute(c.to_ascii_lowercase());
                    self.go(states::AttributeName)
                },
            },

            //§ before-attribute-value-state
            states::BeforeAttributeValue => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                '"' => self.go(states::AttributeValue(DoubleQuoted)),
                '\'' => self.go(states::AttributeValue(SingleQuoted)),
                '>' => {
                    self.emit_error(
                        ErrorCode::AttributeValueInvalid,
                        Borrowed("Missing attribute value"),
                    );
                    self.finish_tag()
                },
                c => self.again_in(c, states::AttributeValue(Unquoted)),
            },

            states::AttributeValue(DoubleQuoted) => {
                match unwrap_or_park!(
                    self.take_run(input, small_char_set!('\r' '"' '&' '\0' '\n'))
                ) {
                    FromSet('"') => self.go(states::AfterAttributeValueQuoted),
                    FromSet('&') => self.begin_char_ref(),
                    FromSet('\0') => {
                        self.error_here('\0');
                        self.tag.borrow_mut().attr_value.push_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet(c) => {
                        self.tag.borrow_mut().attr_value.push_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.tag.borrow_mut().attr_value.push_slice(&run);
                        Action::Continue
                    },
                }
            },

            states::AttributeValue(SingleQuoted) => {
                match unwrap_or_park!(
                    self.take_run(input, small_char_set!('\r' '\'' '&' '\0' '\n'))
                ) {
                    FromSet('\'') => self.go(states::AfterAttributeValueQuoted),
                    FromSet('&') => self.begin_char_ref(),
                    FromSet('\0') => {
                        self.error_here('\0');
                        self.tag.borrow_mut().attr_value.push_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet(c) => {
                        self.tag.borrow_mut().attr_value.push_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.tag.borrow_mut().attr_value.push_slice(&run);
                        Action::Continue
                    },
                }
            },

            states::AttributeValue(Unquoted) => {
                match unwrap_or_park!(self.take_run(
                    input,
                    small_char_set!('\r' '\t' '\n' '\x0C' ' ' '&' '>' '\0')
                )) {
                    FromSet('\t' | '\n' | '\x0C' | ' ') => self.go(states::BeforeAttributeName),
                    FromSet('&') => self.begin_char_ref(),
                    FromSet('>') => self.finish_tag(),
                    FromSet('\0') => {
                        self.error_here('\0');
                        self.tag.borrow_mut().attr_value.push_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet(c) => {
                        if matches!(c, '"' | '\'' | '<' | '=' | '`') {
                            self.emit_error(
                                ErrorCode::AttributeValueInvalid,
                                Borrowed("Unexpected character in unquoted attribute value"),
                            );
                        }
                        self.tag.borrow_mut().attr_value.push_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.tag.borrow_mut().attr_value.push_slice(&run);
                        Action::Continue
                    },
                }
            },

            //§ after-attribute-value-(quoted)-state
            states::AfterAttributeValueQuoted => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::BeforeAttributeName),
                '/' => self.go(states::SelfClosingStartTag),
                '>' => self.finish_tag(),
                c => {
                    self.error_here(c);
                    self.again_in(c, states::BeforeAttributeName)
                },
            },

            //§ self-closing-start-tag-state
            states::SelfClosingStartTag => match unwrap_or_park!(self.next_char(input)) {
                '>' => {
                    self.tag.borrow_mut().self_closing = true;
                    self.finish_tag()
                },
                c => {
                    self.emit_error(
                        ErrorCode::ClosingSlashMisplaced,
                        Borrowed("Unexpected / in tag"),
                    );
                    self.again_in(c, states::BeforeAttributeName)
                },
            },

            //§ bogus-comment-state
            states::BogusComment => match unwrap_or_park!(self.next_char(input)) {
                '>' => {
                    self.finish_comment();
                    self.go(states::Data)
                },
                '\0' => {
                    self.comment.borrow_mut().push_char('\u{fffd}');
                    Action::Continue
                },
                c => {
                    self.comment.borrow_mut().push_char(c);
                    Action::Continue
                },
            },

            //§ markup-declaration-open-state
            states::MarkupDeclarationOpen => {
                if unwrap_or_park!(self.expect(input, "--", u8::eq)) {
                    self.comment.borrow_mut().clear();
                    return self.go(states::CommentStart);
                }
                if unwrap_or_park!(self.expect(input, "doctype", u8::eq_ignore_ascii_case)) {
                    return self.go(states::Doctype);
                }
                if unwrap_or_park!(self.expect(input, "[CDATA[", u8::eq)) {
                    if self
                        .sink
                        .adjusted_current_node_present_but_not_in_html_namespace()
                    {
                        return self.go(states::CdataSection);
                    }
                    self.emit_error(
                        ErrorCode::CdataInHtmlContent,
                        Borrowed("CDATA in HTML content"),
                    );
                    *self.comment.borrow_mut() = StrTendril::from_slice("[CDATA[");
                    return self.go(states::BogusComment);
                }
                self.emit_error(
                    ErrorCode::IncorrectlyOpenedComment,
                    Borrowed("Bad markup declaration"),
                );
                self.comment.borrow_mut().clear();
                self.go(states::BogusComment)
            },

            //§ comment-start-state
            states::CommentStart => match unwrap_or_park!(self.next_char(input)) {
                '-' => self.go(states::CommentStartDash),
                '>' => {
                    self.emit_error(
                        ErrorCode::CommentEndedUnexpectedly,
                        Borrowed("Comment ended prematurely"),
                    );
                    self.finish_comment();
                    self.go(states::Data)
                },
                c => self.again_in(c, states::Comment),
            },

            //§ comment-start-dash-state
            states::CommentStartDash => match unwrap_or_park!(self.next_char(input)) {
                '-' => self.go(states::CommentEnd),
                '>' => {
                    self.emit_error(
                        ErrorCode::CommentEndedUnexpectedly,
                        Borrowed("Comment ended prematurely"),
                    );
                    self.finish_comment();
                    self.go(states::Data)
                },
                c => {
                    self.comment.borrow_mut().push_char('-');
                    self.again_in(c, states::Comment)
                },
            },

            //§ comment-state
            states::Comment => {
                match unwrap_or_park!(self.take_run(input, small_char_set!('\r' '\n' '-' '\0'))) {
                    FromSet('-') => self.go(states::CommentEndDash),
                    FromSet('\0') => {
                        self.error_here('\0');
                        self.comment.borrow_mut().push_char('\u{fffd}');
                        Action::Continue
                    },
                    FromSet(c) => {
                        self.comment.borrow_mut().push_char(c);
                        Action::Continue
                    },
                    NotFromSet(run) => {
                        self.comment.borrow_mut().push_slice(&run);
                        Action::Continue
                    },
                }
            },

            //§ comment-end-dash-state
            states::CommentEndDash => match unwrap_or_park!(self.next_char(input)) {
                '-' => self.go(states::CommentEnd),
                '\0' => {
                    self.error_here('\0');
                    self.comment.borrow_mut().push_slice("-\u{fffd}");
                    self.go(states::Comment)
                },
                c => {
                    let mut comment = self.comment.borrow_mut();
                    comment.push_char('-');
                    comment.push_char(c);
                    drop(comment);
                    self.go(states::Comment)
                },
            },

            //§ comment-end-state
            states::CommentEnd => match unwrap_or_park!(self.next_char(input)) {
                '>' => {
                    self.finish_comment();
                    self.go(states::Data)
                },
                '!' => self.go(states::CommentEndBang),
                '-' => {
                    self.comment.borrow_mut().push_char('-');
                    Action::Continue
                },
                c => {
                    self.comment.borrow_mut().push_slice("--");
                    self.again_in(c, states::Comment)
                },
            },

            //§ comment-end-bang-state
            states::CommentEndBang => match unwrap_or_park!(self.next_char(input)) {
                '-' => {
                    self.comment.borrow_mut().push_slice("--!");
                    self.go(states::CommentEndDash)
                },
                '>' => {
                    self.emit_error(
                        ErrorCode::CommentEndedUnexpectedly,
                        Borrowed("Comment ended with --!>"),
                    );
                    self.finish_comment();
                    self.go(states::Data)
                },
                '\0' => {
                    self.error_here('\0');
                    self.comment.borrow_mut().push_slice("--!\u{fffd}");
                    self.go(states::Comment)
                },
                c => {
                    let mut comment = self.comment.borrow_mut();
                    comment.push_slice("--!");
                    comment.push_char(c);
                    drop(comment);
                    self.go(states::Comment)
                },
            },

            //§ doctype-state
            states::Doctype => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::BeforeDoctypeName),
                c => {
                    self.error_here(c);
                    self.again_in(c, states::BeforeDoctypeName)
                },
            },

            //§ before-doctype-name-state
            states::BeforeDoctypeName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                '\0' => {
                    self.error_here('\0');
                    let mut doctype = self.doctype.borrow_mut();
                    doctype.begin();
                    doctype.push_name('\u{fffd}');
                    drop(doctype);
                    self.go(states::DoctypeName)
                },
                '>' => {
                    self.emit_error(
                        ErrorCode::DoctypeNameInvalid,
                        Borrowed("Missing doctype name"),
                    );
                    let mut doctype = self.doctype.borrow_mut();
                    doctype.begin();
                    doctype.force_quirks();
                    drop(doctype);
                    self.finish_doctype();
                    self.go(states::Data)
                },
                c => {
                    let mut doctype = self.doctype.borrow_mut();
                    doctype.begin();
                    doctype.push_name(c.to_ascii_lowercase());
                    drop(doctype);
                    self.go(states::DoctypeName)
                },
            },

            //§ doctype-name-state
            states::DoctypeName => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::AfterDoctypeName),
                '>' => {
                    self.finish_doctype();
                    self.go(states::Data)
                },
                '\0' => {
                    self.error_here('\0');
                    self.doctype.borrow_mut().push_name('\u{fffd}');
                    Action::Continue
                },
                c => {
                    self.doctype.borrow_mut().push_name(c.to_ascii_lowercase());
                    Action::Continue
                },
            },

            //§ after-doctype-name-state
            states::AfterDoctypeName => {
                if unwrap_or_park!(self.expect(input, "public", u8::eq_ignore_ascii_case)) {
                    return self.go(states::AfterDoctypeKeyword(Public));
                }
                if unwrap_or_park!(self.expect(input, "system", u8::eq_ignore_ascii_case)) {
                    return self.go(states::AfterDoctypeKeyword(System));
                }
                match unwrap_or_park!(self.next_char(input)) {
                    '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                    '>' => {
                        self.finish_doctype();
                        self.go(states::Data)
                    },
                    c => {
                        self.error_here(c);
                        self.doctype.borrow_mut().force_quirks();
                        self.go(states::BogusDoctype)
                    },
                }
            },

            states::AfterDoctypeKeyword(kind) => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => self.go(states::BeforeDoctypeIdentifier(kind)),
                quote @ ('"' | '\'') => {
                    self.emit_error(
                        ErrorCode::DoctypeIdentifierInvalid,
                        Borrowed("Missing whitespace before doctype identifier"),
                    );
                    self.doctype.borrow_mut().start_id(kind);
                    self.go(if quote == '"' {
                        states::DoctypeIdentifierDoubleQuoted(kind)
                    } else {
                        states::DoctypeIdentifierSingleQuoted(kind)
                    })
                },
                '>' => {
                    self.emit_error(
                        ErrorCode::DoctypeIdentifierInvalid,
                        Borrowed("Missing doctype identifier"),
                    );
                    self.doctype.borrow_mut().force_quirks();
                    self.finish_doctype();
                    self.go(states::Data)
                },
                c => {
                    self.error_here(c);
                    self.doctype.borrow_mut().force_quirks();
                    self.go(states::BogusDoctype)
                },
            },

            states::BeforeDoctypeIdentifier(kind) => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                quote @ ('"' | '\'') => {
                    self.doctype.borrow_mut().start_id(kind);
                    self.go(if quote == '"' {
                        states::DoctypeIdentifierDoubleQuoted(kind)
                    } else {
                        states::DoctypeIdentifierSingleQuoted(kind)
                    })
                },
                '>' => {
                    self.emit_error(
                        ErrorCode::DoctypeIdentifierInvalid,
                        Borrowed("Missing doctype identifier"),
                    );
                    self.doctype.borrow_mut().force_quirks();
                    self.finish_doctype();
                    self.go(states::Data)
                },
                c => {
                    self.error_here(c);
                    self.doctype.borrow_mut().force_quirks();
                    self.go(states::BogusDoctype)
                },
            },

            states::DoctypeIdentifierDoubleQuoted(kind) => {
                match unwrap_or_park!(self.next_char(input)) {
                    '"' => self.go(states::AfterDoctypeIdentifier(kind)),
                    '\0' => {
                        self.error_here('\0');
                        self.doctype.borrow_mut().push_id(kind, '\u{fffd}');
                        Action::Continue
                    },
                    '>' => {
                        self.emit_error(
                            ErrorCode::DoctypeIdentifierInvalid,
                            Borrowed("Doctype identifier ended prematurely"),
                        );
                        self.doctype.borrow_mut().force_quirks();
                        self.finish_doctype();
                        self.go(states::Data)
                    },
                    c => {
                        self.doctype.borrow_mut().push_id(kind, c);
                        Action::Continue
                    },
                }
            },

            states::DoctypeIdentifierSingleQuoted(kind) => {
                match unwrap_or_park!(self.next_char(input)) {
                    '\'' => self.go(states::AfterDoctypeIdentifier(kind)),
                    '\0' => {
                        self.error_here('\0');
                        self.doctype.borrow_mut().push_id(kind, '\u{fffd}');
                        Action::Continue
                    },
                    '>' => {
                        self.emit_error(
                            ErrorCode::DoctypeIdentifierInvalid,
                            Borrowed("Doctype identifier ended prematurely"),
                        );
                        self.doctype.borrow_mut().force_quirks();
                        self.finish_doctype();
                        self.go(states::Data)
                    },
                    c => {
                        self.doctype.borrow_mut().push_id(kind, c);
                        Action::Continue
                    },
                }
            },

            states::AfterDoctypeIdentifier(Public) => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => {
                    self.go(states::BetweenDoctypePublicAndSystemIdentifiers)
                },
                '>' => {
                    self.finish_doctype();
                    self.go(states::Data)
                },
                quote @ ('"' | '\'') => {
                    self.emit_error(
                        ErrorCode::DoctypeIdentifierInvalid,
                        Borrowed("Missing whitespace between doctype identifiers"),
                    );
                    self.doctype.borrow_mut().start_id(System);
                    self.go(if quote == '"' {
                        states::DoctypeIdentifierDoubleQuoted(System)
                    } else {
                        states::DoctypeIdentifierSingleQuoted(System)
                    })
                },
                c => {
                    self.error_here(c);
                    self.doctype.borrow_mut().force_quirks();
                    self.go(states::BogusDoctype)
                },
            },

            states::AfterDoctypeIdentifier(System) => match unwrap_or_park!(self.next_char(input)) {
                '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                '>' => {
                    self.finish_doctype();
                    self.go(states::Data)
                },
                c => {
                    self.error_here(c);
                    self.go(states::BogusDoctype)
                },
            },

            states::BetweenDoctypePublicAndSystemIdentifiers => {
                match unwrap_or_park!(self.next_char(input)) {
                    '\t' | '\n' | '\x0C' | ' ' => Action::Continue,
                    '>' => {
                        self.finish_doctype();
                        self.go(states::Data)
                    },
                    quote @ ('"' | '\'') => {
                        self.doctype.borrow_mut().start_id(System);
                        self.go(if quote == '"' {
                            states::DoctypeIdentifierDoubleQuoted(System)
                        } else {
                            states::DoctypeIdentifierSingleQuoted(System)
                        })
                    },
                    c => {
                        self.error_here(c);
                        self.doctype.borrow_mut().force_quirks();
                        self.go(states::BogusDoctype)
                    },
                }
            },

            //§ bogus-doctype-state
            states::BogusDoctype => match unwrap_or_park!(self.next_char(input)) {
                '>' => {
                    self.finish_doctype();
                    self.go(states::Data)
                },
                _ => Action::Continue,
            },

            //§ cdata-section-state
            states::CdataSection => {
                // ']' sits outside the SmallCharSet range, so this state
                // runs character-at-a-time.
                match unwrap_or_park!(self.next_char(input)) {
                    ']' => self.go(states::CdataSectionBracket),
                    c => {
                        self.send_char(c);
                        Action::Continue
                    },
                }
            },

            states::CdataSectionBracket => match unwrap_or_park!(self.next_char(input)) {
                ']' => self.go(states::CdataSectionEnd),
                c => {
                    self.send_char(']');
                    self.again_in(c, states::CdataSection)
                },
            },

            states::CdataSectionEnd => match unwrap_or_park!(self.next_char(input)) {
                ']' => {
                    self.send_char(']');
                    Action::Continue
                },
                '>' => self.go(states::Data),
                c => {
                    self.send_str("]]");
                    self.again_in(c, states::CdataSection)
                },
            },
        }
    }

    /// One step of end-of-stream cleanup; finishes with the EOF token.
    fn step_at_eof(&self) -> Action<Sink::Handle> {
        let eof_error = |state: states::State| {
            self.emit_error(
                ErrorCode::EndOfFile,
                Cow::from(format!("Saw EOF in state {state:?}")),
            );
        };

        let state = self.state.get();
        match state {
            states::Data | states::RawData(_) | states::Plaintext | states::CdataSection => {
                self.send_expecting_continue(Token::Eof);
                Action::Suspend
            },

            states::TagOpen => {
                eof_error(state);
                self.send_char('<');
                self.go(states::Data)
            },

            states::EndTagOpen => {
                eof_error(state);
                self.send_str("</");
                self.go(states::Data)
            },

            // A tag cut off by EOF is dropped entirely.
            states::TagName
            | states::BeforeAttributeName
            | states::AttributeName
            | states::AfterAttributeName
            | states::BeforeAttributeValue
            | states::AttributeValue(_)
            | states::AfterAttributeValueQuoted
            | states::SelfClosingStartTag => {
                eof_error(state);
                self.tag.borrow_mut().clear();
                self.go(states::Data)
            },

            states::RawLessThanSign(kind) => {
                self.send_char('<');
                self.go(states::RawData(kind))
            },

            states::RawEndTagOpen(kind) => {
                self.send_str("</");
                self.go(states::RawData(kind))
            },

            states::RawEndTagName(kind) => {
                self.tag.borrow_mut().clear();
                self.send_str("</");
                let text = mem::take(&mut *self.raw_end_tag_text.borrow_mut());
                self.send_text(text);
                self.go(states::RawData(kind))
            },

            states::MarkupDeclarationOpen => {
                eof_error(state);
                self.comment.borrow_mut().clear();
                self.go(states::BogusComment)
            },

            // A comment cut off by EOF is emitted as-is.
            states::BogusComment
            | states::CommentStart
            | states::CommentStartDash
            | states::Comment
            | states::CommentEndDash
            | states::CommentEnd
            | states::CommentEndBang => {
                self.finish_comment();
                self.go(states::Data)
            },

            states::Doctype | states::BeforeDoctypeName => {
                eof_error(state);
                let mut doctype = self.doctype.borrow_mut();
                doctype.begin();
                doctype.force_quirks();
                drop(doctype);
                self.finish_doctype();
                self.go(states::Data)
            },

            // A doctype cut off by EOF is emitted with force-quirks on.
            states::DoctypeName
            | states::AfterDoctypeName
            | states::AfterDoctypeKeyword(_)
            | states::BeforeDoctypeIdentifier(_)
            | states::DoctypeIdentifierDoubleQuoted(_)
            | states::DoctypeIdentifierSingleQuoted(_)
            | states::AfterDoctypeIdentifier(_)
            | states::BetweenDoctypePublicAndSystemIdentifiers => {
                eof_error(state);
                self.doctype.borrow_mut().force_quirks();
                self.finish_doctype();
                self.go(states::Data)
            },

            states::BogusDoctype => {
                self.finish_doctype();
                self.go(states::Data)
            },

            states::CdataSectionBracket => {
                self.send_char(']');
                self.go(states::CdataSection)
            },

            states::CdataSectionEnd => {
                self.send_str("]]");
                self.go(states::CdataSection)
            },
        }
    }

    /// Signal the end of the input. Settles whatever token was in
    /// flight, emits EOF, and tells the sink.
    pub fn end(&self) {
        self.at_eof.set(true);

        // A character reference in flight settles first; it may push
        // unconsumed text back for re-tokenization.
        let input = BufferQueue::default();
        if let Some(mut machine) = self.char_ref.take() {
            machine.end_of_file(self, &input);
            self.deliver_char_ref(machine.get_result());
        }

        match self.run(&input) {
            TokenizerResult::Done => {},
            // The states that produce these need a '>', which would have
            // kept us out of EOF cleanup.
            _ => debug!("unexpected suspension during tokenizer end"),
        }

        loop {
            match self.step_at_eof() {
                Action::Continue => {},
                _ => break,
            }
        }

        self.sink.end();
    }
}

/// The spec's input-stream character errors: controls, noncharacters.
fn is_input_stream_error(c: char) -> bool {
    match c as u32 {
        0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF => true,
        n => (n & 0xFFFE) == 0xFFFE,
    }
}
