// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decoding of byte streams into the character stream the tokenizer
//! consumes, with tentative/certain confidence tracking so that a late
//! `<meta charset>` declaration can re-label the rest of the input.

use std::cell::RefCell;

use encoding_rs::{Decoder as EncodingRsDecoder, DecoderResult, Encoding};
use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;

/// How certain the parser is about the input encoding.
///
/// An encoding from a BOM or an explicit transport-layer hint is
/// `Certain`; a guessed or defaulted encoding is `Tentative` and may be
/// switched once by an in-stream declaration.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Confidence {
    Tentative,
    Certain,
}

/// An incremental byte decoder feeding a [`BufferQueue`].
pub struct Decoder {
    inner: EncodingRsDecoder,
    confidence: Confidence,
}

impl Decoder {
    pub fn new(encoding: &'static Encoding, confidence: Confidence) -> Self {
        Self {
            inner: encoding.new_decoder(),
            confidence,
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Decode `bytes` (the final chunk iff `last`) into `output`.
    pub fn decode(&mut self, mut bytes: &[u8], last: bool, output: &BufferQueue) {
        loop {
            let mut chunk = String::with_capacity(
                self.inner
                    .max_utf8_buffer_length(bytes.len())
                    .unwrap_or(8192)
                    .min(8192)
                    .max(4),
            );
            let (result, read) =
                self.inner
                    .decode_to_string_without_replacement(bytes, &mut chunk, last);
            bytes = &bytes[read..];

            match result {
                DecoderResult::InputEmpty => {
                    if !chunk.is_empty() {
                        output.push_back(StrTendril::from_slice(&chunk));
                    }
                    return;
                },
                DecoderResult::OutputFull => {
                    output.push_back(StrTendril::from_slice(&chunk));
                },
                DecoderResult::Malformed(_, _) => {
                    if !chunk.is_empty() {
                        output.push_back(StrTendril::from_slice(&chunk));
                    }
                    output.push_back(StrTendril::from_slice("\u{fffd}"));
                },
            }
        }
    }

    /// Change the encoding for the remainder of the stream, if the current
    /// confidence allows it. Returns the encoding actually selected.
    ///
    /// The already-decoded prefix is not re-parsed; a caller that wants
    /// restart-from-scratch semantics must drive that itself.
    pub fn change_the_encoding_to(
        &mut self,
        new_encoding: &'static Encoding,
    ) -> Option<&'static Encoding> {
        if self.confidence != Confidence::Tentative {
            return None;
        }
        self.inner = new_encoding.new_decoder();
        self.confidence = Confidence::Certain;
        Some(new_encoding)
    }
}

/// Resolve an encoding label from a `<meta>` declaration.
pub fn encoding_from_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// <https://html.spec.whatwg.org/multipage/#algorithm-for-extracting-a-character-encoding-from-a-meta-element>
pub(crate) fn extract_a_character_encoding_from_a_meta_element(
    input: StrTendril,
) -> Option<StrTendril> {
    // Find "charset", skip whitespace, require '='.
    let mut position = 0;
    loop {
        loop {
            let candidate = input.as_bytes().get(position..position + "charset".len())?;
            if candidate.eq_ignore_ascii_case(b"charset") {
                break;
            }

            position += 1;
        }
        position += "charset".len();

        position += input.as_bytes()[position..]
            .iter()
            .take_while(|byte| byte.is_ascii_whitespace())
            .count();

        if input.as_bytes().get(position) == Some(&b'=') {
            break;
        }
    }
    // Skip the "=" and any whitespace after it.
    position += 1;
    position += input.as_bytes()[position..]
        .iter()
        .take_while(|byte| byte.is_ascii_whitespace())
        .count();

    match input.as_bytes().get(position)? {
        quote @ (b'"' | b'\'') => {
            // The value runs to the matching quote, which must be present.
            let length = input.as_bytes()[position + 1..]
                .iter()
                .position(|byte| byte == quote)?;
            Some(input.subtendril(position as u32 + 1, length as u32))
        },
        _ => {
            // The value runs up to whitespace, ';', or the end.
            let length = input.as_bytes()[position..]
                .iter()
                .position(|byte| byte.is_ascii_whitespace() || *byte == b';');
            if let Some(length) = length {
                Some(input.subtendril(position as u32, length as u32))
            } else {
                Some(input.subtendril(position as u32, (input.len() - position) as u32))
            }
        },
    }
}

/// An [`InputStream`] couples a decoder with the queue the tokenizer
/// reads, so the driver can push bytes on one side and characters come
/// out the other.
///
/// <https://html.spec.whatwg.org/#input-stream>
pub struct InputStream {
    input: BufferQueue,
    decoder: RefCell<Decoder>,
}

impl InputStream {
    pub fn new(encoding: &'static Encoding, confidence: Confidence) -> Self {
        Self {
            input: Default::default(),
            decoder: RefCell::new(Decoder::new(encoding, confidence)),
        }
    }

    pub fn append_bytes(&self, data: &[u8]) {
        self.decoder.borrow_mut().decode(data, false, &self.input);
    }

    pub fn code_points(&self) -> &BufferQueue {
        &self.input
    }

    /// Attempt to switch to another encoding for the rest of the stream.
    pub fn maybe_switch_encoding(&self, encoding: &'static Encoding) -> Option<&'static Encoding> {
        if self.decoder.borrow().confidence() == Confidence::Tentative {
            return self.decoder.borrow_mut().change_the_encoding_to(encoding);
        }
        None
    }

    /// Move any input left in the decoding stage to the end of the stream.
    pub fn finish_decoding_input(&self) {
        self.decoder.borrow_mut().decode(&[], true, &self.input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_element_without_charset() {
        assert_eq!(
            extract_a_character_encoding_from_a_meta_element(StrTendril::from_slice("foobar")),
            None
        );
    }

    #[test]
    fn meta_element_with_capitalized_charset() {
        assert_eq!(
            extract_a_character_encoding_from_a_meta_element(StrTendril::from_slice(
                "cHarSet=utf8"
            )),
            Some(StrTendril::from_slice("utf8"))
        );
    }

    #[test]
    fn meta_element_with_quoted_value() {
        assert_eq!(
            extract_a_character_encoding_from_a_meta_element(StrTendril::from_slice(
                "charset='utf8'"
            )),
            Some(StrTendril::from_slice("utf8"))
        );
        assert_eq!(
            extract_a_character_encoding_from_a_meta_element(StrTendril::from_slice(
                "charset=\"utf8"
            )),
            None
        );
    }

    #[test]
    fn meta_element_with_content_type() {
        assert_eq!(
            extract_a_character_encoding_from_a_meta_element(StrTendril::from_slice(
                "text/html; charset=utf8"
            )),
            Some(StrTendril::from_slice("utf8"))
        );
    }

    #[test]
    fn decoder_switches_only_while_tentative() {
        let mut decoder = Decoder::new(encoding_rs::UTF_8, Confidence::Tentative);
        assert!(decoder
            .change_the_encoding_to(encoding_rs::WINDOWS_1252)
            .is_some());
        // The first switch makes the encoding certain.
        assert!(decoder.change_the_encoding_to(encoding_rs::UTF_8).is_none());
    }

    #[test]
    fn decodes_windows_1252_bytes() {
        let stream = InputStream::new(encoding_rs::WINDOWS_1252, Confidence::Certain);
        stream.append_bytes(b"caf\xe9");
        stream.finish_decoding_input();
        let mut out = String::new();
        while let Some(c) = stream.code_points().next() {
            out.push(c);
        }
        assert_eq!(out, "café");
    }
}
