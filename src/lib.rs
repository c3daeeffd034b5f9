// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A browser-grade HTML5 parser.
//!
//! The input is a byte or character stream purporting to be an HTML document
//! (or fragment); the output is the document tree the HTML Living Standard's
//! tree-construction algorithm prescribes for that input, including every
//! quirks-mode fallback and error-recovery rule. Tree mutations flow through
//! the [`TreeSink`] trait, so the parser can drive any DOM representation;
//! a reference-counted implementation is provided in [`dom`].
//!
//! ```
//! use sapling::driver::{parse_document, ParseOpts};
//! use sapling::dom::RcDom;
//! use sapling::tendril::TendrilSink;
//!
//! let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
//!     .one("<!DOCTYPE html><title>hi</title><p>Hello, world!");
//! assert!(dom.errors.borrow().is_empty());
//! ```
//!
//! [`TreeSink`]: interface::TreeSink

pub use web_atoms::{local_name, namespace_prefix, namespace_url, ns};
pub use web_atoms::{LocalName, Namespace, Prefix};

pub use crate::errors::{ErrorCode, ParseError, Position};
pub use crate::interface::{Attribute, ExpandedName, QualName};
pub use crate::util::smallcharset::SmallCharSet;

mod macros;

pub mod util {
    pub mod smallcharset;
    pub mod str;
}

pub mod buffer_queue;
pub mod dom;
pub mod driver;
pub mod encoding;
pub mod errors;
pub mod interface;
pub mod serialize;
pub mod tokenizer;
pub mod tree_builder;

/// Re-export of the tendril crate.
pub mod tendril {
    pub use tendril::*;
}

/// An [`ExpandedName`], as a value or as a `match` pattern.
///
/// [`ExpandedName`]: interface/struct.ExpandedName.html
#[macro_export]
macro_rules! expanded_name {
    ("", $local:tt) => {
        $crate::ExpandedName {
            ns: &$crate::ns!(),
            local: &$crate::local_name!($local),
        }
    };
    ($ns:ident $local:tt) => {
        $crate::ExpandedName {
            ns: &$crate::ns!($ns),
            local: &$crate::local_name!($local),
        }
    };
}
