// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Byte-stream input: UTF-8 lossy decoding, explicit encoding hints, and
//! in-stream `<meta charset>` re-labeling.

mod common;

use common::*;

use sapling::dom::RcDom;
use sapling::driver::{parse_document, ParseOpts};
use sapling::tendril::TendrilSink;

#[test]
fn utf8_bytes_through_lossy_decoder() {
    let parser = parse_document(RcDom::default(), ParseOpts::default()).from_utf8();
    let dom = parser.one(&b"<!DOCTYPE html><p>caf\xc3\xa9"[..]);
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(text_of(&p), "caf\u{e9}");
}

#[test]
fn encoding_hint_is_respected() {
    let parser = parse_document(RcDom::default(), ParseOpts::default())
        .from_bytes(Some(encoding_rs::WINDOWS_1252));
    parser.write(b"<!DOCTYPE html><p>caf\xe9");
    let dom = parser.finish();
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(text_of(&p), "caf\u{e9}");
}

#[test]
fn meta_charset_relabels_the_rest_of_the_stream() {
    let parser = parse_document(RcDom::default(), ParseOpts::default()).from_bytes(None);
    parser.write(b"<!DOCTYPE html><meta charset=windows-1252><p>caf");
    parser.write(b"\xe9");
    let dom = parser.finish();
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(text_of(&p), "caf\u{e9}");
}

#[test]
fn meta_http_equiv_content_type_is_recognized() {
    let parser = parse_document(RcDom::default(), ParseOpts::default()).from_bytes(None);
    parser.write(b"<!DOCTYPE html><meta http-equiv=Content-Type content=\"text/html; charset=windows-1252\"><p>a");
    parser.write(b"\xe9");
    let dom = parser.finish();
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(text_of(&p), "a\u{e9}");
}

#[test]
fn invalid_bytes_become_replacement_characters() {
    let parser =
        parse_document(RcDom::default(), ParseOpts::default()).from_bytes(Some(encoding_rs::UTF_8));
    parser.write(b"<!DOCTYPE html><p>a\xffb");
    let dom = parser.finish();
    let body = body_of(&dom);
    let p = child_elem(&body, "p");
    assert_eq!(text_of(&p), "a\u{fffd}b");
}
