// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! High-level interface to the parser.
//!
//! A [`Parser`] couples the tokenizer, the tree builder, and the input
//! queue whose front is the insertion point. Feed it characters through
//! the [`TendrilSink`] interface (`one`, `process`/`finish`, `read_from`,
//! `from_utf8`), or bytes with an encoding hint through [`BytesParser`].
//! End-of-stream finalization runs in `finish`: readiness advances to
//! Interactive, the open-element stack drains, any pending
//! parsing-blocking script pointer is cleared, `DOMContentLoaded` is
//! queued, the host event loop spins until its predicates clear, and the
//! document completes with a `load` event.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use encoding_rs::Encoding;
use tendril::stream::{TendrilSink, Utf8LossyDecoder};
use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;
use crate::encoding::{encoding_from_label, Confidence, InputStream};
use crate::errors::{ErrorCode, ParseError};
use crate::interface::{create_element, ElemName, QualName, ReadyState, TreeSink};
use crate::interface::{HostHooks, NoopHost, ScriptResult};
use crate::tokenizer::{Tokenizer, TokenizerOpts, TokenizerResult};
use crate::tree_builder::{TreeBuilder, TreeBuilderOpts};
use crate::Attribute;

/// All-encompassing options struct for the parser.
#[derive(Clone, Default)]
pub struct ParseOpts {
    /// Tokenizer options.
    pub tokenizer: TokenizerOpts,

    /// Tree builder options.
    pub tree_builder: TreeBuilderOpts,
}

/// Parse an HTML document.
///
/// The returned `Parser` implements `TendrilSink` and can be used to feed
/// the HTML document in chunks.
pub fn parse_document<Sink>(sink: Sink, opts: ParseOpts) -> Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    let tb = TreeBuilder::new(sink, opts.tree_builder);
    let tok = Tokenizer::new(tb, opts.tokenizer);
    Parser::new(tok)
}

/// Parse an HTML fragment in the context of an element with the given
/// qualified name and attributes.
///
/// The fragment is parsed against a synthetic `html` root; the context
/// element configures the initial tokenizer state and the insertion mode.
/// This must be decided before any token is consumed, which the
/// constructor-shaped API enforces.
pub fn parse_fragment<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_name: QualName,
    context_attrs: Vec<Attribute>,
) -> Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    let context_elem = create_element(&sink, context_name, context_attrs);
    parse_fragment_for_element(sink, opts, context_elem, None)
}

/// Like `parse_fragment`, but with an existing context element and a form
/// element pointer carried over from the surrounding document.
pub fn parse_fragment_for_element<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_element: Sink::Handle,
    form_element: Option<Sink::Handle>,
) -> Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    let context_name = {
        let name = sink.elem_name(&context_element);
        name.local_name().clone()
    };
    let tb = TreeBuilder::new_for_fragment(sink, context_element, form_element, opts.tree_builder);
    let tok_state = tb.tokenizer_state_for_context_elem(opts.tree_builder.scripting_enabled);
    let tok_opts = TokenizerOpts {
        initial_state: Some(tok_state),
        last_start_tag_name: Some(context_name.to_string()),
        ..opts.tokenizer
    };
    let tok = Tokenizer::new(tb, tok_opts);
    Parser::new(tok)
}

/// An HTML parser, ready to receive input.
///
/// The front of `input_buffer` is the tokenizer's insertion point:
/// characters a script writes land there, ahead of network input that has
/// not been tokenized yet.
pub struct Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    pub tokenizer: Tokenizer<TreeBuilder<Sink::Handle, Sink>>,
    pub input_buffer: BufferQueue,

    /// Output of `document.write`, spliced in at the insertion point.
    script_input: BufferQueue,

    host: Rc<dyn HostHooks<Sink::Handle>>,
    pending_parsing_blocking_script: RefCell<Option<Sink::Handle>>,
    paused: Cell<bool>,
    finished: Cell<bool>,
    encoding_indicator: RefCell<Option<StrTendril>>,
}

impl<Sink> Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    fn new(tokenizer: Tokenizer<TreeBuilder<Sink::Handle, Sink>>) -> Self {
        Parser {
            tokenizer,
            input_buffer: BufferQueue::default(),
            script_input: BufferQueue::default(),
            host: Rc::new(NoopHost),
            pending_parsing_blocking_script: RefCell::new(None),
            paused: Cell::new(false),
            finished: Cell::new(false),
            encoding_indicator: RefCell::new(None),
        }
    }

    /// Install a script host. Must happen before input is fed.
    pub fn with_host(mut self, host: Rc<dyn HostHooks<Sink::Handle>>) -> Self {
        self.host = host;
        self
    }

    /// The sink the tree builder writes into.
    pub fn sink(&self) -> &Sink {
        &self.tokenizer.sink.sink
    }

    /// Is the parser paused on a parsing-blocking script?
    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Wrap this parser into a byte-accepting decoder that performs UTF-8
    /// lossy decoding.
    pub fn from_utf8(self) -> Utf8LossyDecoder<Self> {
        Utf8LossyDecoder::new(self)
    }

    /// Wrap this parser into a byte-accepting decoder for the given
    /// encoding hint. With a hint the encoding is certain; without one,
    /// decoding starts as tentative UTF-8 and a `<meta charset>` seen by
    /// the tree builder may re-label the rest of the stream.
    pub fn from_bytes(self, encoding_hint: Option<&'static Encoding>) -> BytesParser<Sink> {
        let (encoding, confidence) = match encoding_hint {
            Some(encoding) => (encoding, Confidence::Certain),
            None => (encoding_rs::UTF_8, Confidence::Tentative),
        };
        BytesParser {
            parser: self,
            input_stream: InputStream::new(encoding, confidence),
        }
    }

    /// Run the tokenizer over everything currently buffered, handling
    /// script suspension points as they surface.
    fn pump(&self) {
        if self.paused.get() {
            return;
        }
        loop {
            match self.tokenizer.feed(&self.input_buffer) {
                TokenizerResult::Done => return,
                TokenizerResult::Script(script) => {
                    self.handle_script(script);
                    if self.paused.get() {
                        return;
                    }
                },
                TokenizerResult::EncodingIndicator(label) => {
                    *self.encoding_indicator.borrow_mut() = Some(label);
                },
            }
        }
    }

    fn handle_script(&self, script: Sink::Handle) {
        self.host.prepare_script(&script);
        match self.host.execute_script(&script, &self.script_input) {
            ScriptResult::Continue => {
                self.script_input.transfer_to_front_of(&self.input_buffer);
            },
            ScriptResult::Pause => {
                *self.pending_parsing_blocking_script.borrow_mut() = Some(script);
                self.paused.set(true);
            },
            ScriptResult::Abort => {
                // Treated as immediate end of stream: the unread input is
                // gone, finalization still runs in finish().
                self.script_input.clear();
                self.input_buffer.clear();
            },
        }
    }

    /// Resume after the host finished a parsing-blocking script. The
    /// insertion-point checkpoint taken at suspension is restored before
    /// feeding continues, so `document.write` output lands where the
    /// script ran.
    pub fn resume(&self) {
        assert!(!self.finished.get(), "resume() on a finished parser");
        self.pending_parsing_blocking_script.borrow_mut().take();
        self.paused.set(false);
        self.script_input.transfer_to_front_of(&self.input_buffer);
        self.pump();
    }

    /// Insert characters at the tokenizer's insertion point, the way
    /// `document.write` does. While the parser is paused the characters
    /// are held back until `resume`.
    pub fn document_write(&self, text: StrTendril) {
        assert!(
            !self.finished.get(),
            "document.write() into a finished parser"
        );
        self.script_input.push_back(text);
        if !self.paused.get() {
            self.script_input.transfer_to_front_of(&self.input_buffer);
            self.pump();
        }
    }

    fn take_encoding_indicator(&self) -> Option<StrTendril> {
        self.encoding_indicator.borrow_mut().take()
    }

    //§ the-end
    fn finalize(&self) {
        let sink = &self.tokenizer.sink.sink;

        // Readiness becomes "interactive"; the EOF token then drains the
        // stack of open elements.
        sink.set_ready_state(ReadyState::Interactive);
        self.tokenizer.end();
        self.finished.set(true);

        // A parsing-blocking script that never ran cannot run anymore.
        self.pending_parsing_blocking_script.borrow_mut().take();

        // DOMContentLoaded is a queued task, not a synchronous call.
        let host = Rc::clone(&self.host);
        self.host
            .queue_task(Box::new(move || host.dom_content_loaded()));

        // Cooperatively spin until the host's completion predicates clear.
        while self.host.scripts_as_soon_as_possible() > 0 || self.host.is_loading_delayed() {
            self.host.spin_event_loop();
        }

        sink.set_ready_state(ReadyState::Complete);
        let host = Rc::clone(&self.host);
        self.host.queue_task(Box::new(move || host.load_event()));
    }
    //§ END
}

impl<Sink> TendrilSink<tendril::fmt::UTF8> for Parser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    type Output = Sink::Output;

    fn process(&mut self, t: StrTendril) {
        assert!(!self.finished.get(), "input into a finished parser");
        self.input_buffer.push_back(t);
        self.pump();
    }

    // dispatch to the tree builder's sink, stamped with the position the
    // decoder reached
    fn error(&mut self, desc: Cow<'static, str>) {
        self.tokenizer.sink.report(ErrorCode::BogusCharacter, desc);
    }

    fn finish(self) -> Self::Output {
        self.script_input.transfer_to_front_of(&self.input_buffer);
        self.pump();
        self.finalize();
        self.tokenizer.sink.sink.finish()
    }
}

/// Drive a parse to completion on the calling task.
///
/// The body is the same synchronous algorithm; the future resolves once
/// finalization (including the host's event-loop spin) has run.
pub async fn parse_to_completion<Sink>(parser: Parser<Sink>, input: StrTendril) -> Sink::Output
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    parser.one(input)
}

/// A parser fed raw bytes, decoding them with confidence tracking.
pub struct BytesParser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    parser: Parser<Sink>,
    input_stream: InputStream,
}

impl<Sink> BytesParser<Sink>
where
    Sink: TreeSink,
    Sink::Handle: 'static,
{
    /// Access the wrapped character parser.
    pub fn str_parser(&self) -> &Parser<Sink> {
        &self.parser
    }

    /// Decode and parse another chunk of the byte stream.
    pub fn write(&self, bytes: &[u8]) {
        self.input_stream.append_bytes(bytes);
        self.drain_decoded();
        if let Some(label) = self.parser.take_encoding_indicator() {
            if let Some(encoding) = encoding_from_label(&label) {
                if self.input_stream.maybe_switch_encoding(encoding).is_none() {
                    self.parser.sink().parse_error(ParseError::new(
                        ErrorCode::EncodingDeclarationLate,
                        Cow::Borrowed("Encoding declaration cannot take effect"),
                        self.parser.tokenizer.position(),
                    ));
                }
            }
        }
    }

    fn drain_decoded(&self) {
        while let Some(buf) = self.input_stream.code_points().pop_front() {
            self.parser.input_buffer.push_back(buf);
        }
        self.parser.pump();
    }

    /// Flush the decoder and run end-of-stream finalization.
    pub fn finish(self) -> Sink::Output {
        self.input_stream.finish_decoding_input();
        while let Some(buf) = self.input_stream.code_points().pop_front() {
            self.parser.input_buffer.push_back(buf);
        }
        <Parser<Sink> as TendrilSink<tendril::fmt::UTF8>>::finish(self.parser)
    }
}
