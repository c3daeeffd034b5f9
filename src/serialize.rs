// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Serialization of a parsed tree back to HTML text, per the standard's
//! "serializing HTML fragments": void elements carry no end tag,
//! raw-text containers emit their text unescaped, and the newline a
//! parse would eat right after `<pre>` and friends is put back so a
//! re-parse drops it again.

use std::default::Default;
use std::io::{self, Write};

use log::warn;

use crate::interface::{is_void_element, QualName};
use crate::{local_name, ns, LocalName};

//§ serializing-html-fragments
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum TraversalScope {
    /// The node itself plus its subtree.
    IncludeNode,
    /// Only the subtree: the whole-document and `innerHTML` entry point.
    ChildrenOnly,
}

pub trait Serialize {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer;
}

pub type AttrRef<'a> = (&'a QualName, &'a str);

pub trait Serializer {
    fn start_elem<'a, AttrIter>(&mut self, name: QualName, attrs: AttrIter) -> io::Result<()>
    where
        AttrIter: Iterator<Item = AttrRef<'a>>;

    fn end_elem(&mut self, name: QualName) -> io::Result<()>;

    fn write_text(&mut self, text: &str) -> io::Result<()>;

    fn write_comment(&mut self, text: &str) -> io::Result<()>;

    fn write_doctype(&mut self, name: &str) -> io::Result<()>;
}

#[derive(Copy, Clone)]
pub struct SerializeOpts {
    /// Is scripting enabled? Decides whether `<noscript>` content gets
    /// escaped.
    pub scripting_enabled: bool,

    /// Serialize the root node itself? Default: ChildrenOnly
    pub traversal_scope: TraversalScope,
}

impl Default for SerializeOpts {
    fn default() -> SerializeOpts {
        SerializeOpts {
            scripting_enabled: true,
            traversal_scope: TraversalScope::ChildrenOnly,
        }
    }
}

/// Serialize `node` to `writer`.
pub fn serialize<Wr, T>(writer: Wr, node: &T, opts: SerializeOpts) -> io::Result<()>
where
    Wr: Write,
    T: Serialize,
{
    let mut ser = HtmlSerializer::new(writer, opts);
    node.serialize(&mut ser, opts.traversal_scope)
}

/// Per-open-element bookkeeping for the serializer.
struct OpenTag {
    /// The local name, for HTML-namespace elements only; text escaping
    /// rules key off it.
    html_name: Option<LocalName>,
    /// Void element: children (there are none) and the end tag are
    /// suppressed.
    skip_contents: bool,
    /// Has any child been written yet? The `<pre>` newline fix needs to
    /// know.
    wrote_child: bool,
}

/// The standards-order HTML serializer.
pub struct HtmlSerializer<Wr: Write> {
    writer: Wr,
    opts: SerializeOpts,
    stack: Vec<OpenTag>,
}

/// The entity for `c` in the given context, if it needs one.
fn escape_for(c: char, in_attr_value: bool) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '\u{00A0}' => Some("&nbsp;"),
        '"' if in_attr_value => Some("&quot;"),
        '<' if !in_attr_value => Some("&lt;"),
        '>' if !in_attr_value => Some("&gt;"),
        _ => None,
    }
}

fn unprefixed_name(name: &QualName) -> LocalName {
    match name.ns {
        ns!(html) | ns!(mathml) | ns!(svg) => {},
        ref ns => warn!("element in unexpected namespace {ns:?}"),
    }
    name.local.clone()
}

impl<Wr: Write> HtmlSerializer<Wr> {
    pub fn new(writer: Wr, opts: SerializeOpts) -> Self {
        HtmlSerializer {
            writer,
            opts,
            stack: vec![OpenTag {
                html_name: None,
                skip_contents: false,
                wrote_child: false,
            }],
        }
    }

    fn innermost(&mut self) -> &mut OpenTag {
        self.stack.last_mut().expect("serializer stack underflow")
    }

    /// Write `text` with the context's escapes, in unescaped chunks
    /// between the characters that need replacing.
    fn write_escaped(&mut self, text: &str, in_attr_value: bool) -> io::Result<()> {
        let mut plain_from = 0;
        for (index, c) in text.char_indices() {
            if let Some(entity) = escape_for(c, in_attr_value) {
                self.writer.write_all(text[plain_from..index].as_bytes())?;
                self.writer.write_all(entity.as_bytes())?;
                plain_from = index + c.len_utf8();
            }
        }
        self.writer.write_all(text[plain_from..].as_bytes())
    }

    fn write_attr_name(&mut self, name: &QualName) -> io::Result<()> {
        let prefix: &[u8] = match name.ns {
            ns!() => b"",
            ns!(xml) => b"xml:",
            ns!(xmlns) if name.local != local_name!("xmlns") => b"xmlns:",
            ns!(xmlns) => b"",
            ns!(xlink) => b"xlink:",
            ref ns => {
                warn!("attribute in unexpected namespace {ns:?}");
                b"unknown_namespace:"
            },
        };
        self.writer.write_all(prefix)?;
        self.writer.write_all(name.local.as_bytes())
    }
}

impl<Wr: Write> Serializer for HtmlSerializer<Wr> {
    fn start_elem<'a, AttrIter>(&mut self, name: QualName, attrs: AttrIter) -> io::Result<()>
    where
        AttrIter: Iterator<Item = AttrRef<'a>>,
    {
        let html_name = (name.ns == ns!(html)).then(|| name.local.clone());

        if self.innermost().skip_contents {
            self.stack.push(OpenTag {
                html_name,
                skip_contents: true,
                wrote_child: false,
            });
            return Ok(());
        }

        self.writer.write_all(b"<")?;
        self.writer.write_all(unprefixed_name(&name).as_bytes())?;
        for (attr_name, value) in attrs {
            self.writer.write_all(b" ")?;
            self.write_attr_name(attr_name)?;
            self.writer.write_all(b"=\"")?;
            self.write_escaped(value, true)?;
            self.writer.write_all(b"\"")?;
        }
        self.writer.write_all(b">")?;

        let void = name.ns == ns!(html) && is_void_element(&name.local);

        self.innermost().wrote_child = true;
        self.stack.push(OpenTag {
            html_name,
            skip_contents: void,
            wrote_child: false,
        });

        Ok(())
    }

    fn end_elem(&mut self, name: QualName) -> io::Result<()> {
        let open = self.stack.pop().expect("serializer stack underflow");
        if open.skip_contents {
            return Ok(());
        }

        self.writer.write_all(b"</")?;
        self.writer.write_all(unprefixed_name(&name).as_bytes())?;
        self.writer.write_all(b">")
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        // Reinstate the newline the parser ate right after the start tag
        // of a pre-like element, so a round trip is shape-stable.
        let reinstate_newline = text.starts_with('\n') && {
            let parent = self.innermost();
            !parent.wrote_child
                && matches!(
                    parent.html_name,
                    Some(local_name!("pre"))
                        | Some(local_name!("textarea"))
                        | Some(local_name!("listing"))
                )
        };
        if reinstate_newline {
            self.writer.write_all(b"\n")?;
        }

        let raw = match self.innermost().html_name {
            Some(local_name!("style"))
            | Some(local_name!("script"))
            | Some(local_name!("xmp"))
            | Some(local_name!("iframe"))
            | Some(local_name!("noembed"))
            | Some(local_name!("noframes"))
            | Some(local_name!("plaintext")) => true,

            Some(local_name!("noscript")) => self.opts.scripting_enabled,

            _ => false,
        };

        if raw {
            self.writer.write_all(text.as_bytes())
        } else {
            self.write_escaped(text, false)
        }
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(b"<!--")?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"-->")
    }

    fn write_doctype(&mut self, name: &str) -> io::Result<()> {
        self.writer.write_all(b"<!DOCTYPE ")?;
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(b">")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Sink;

    impl Serialize for Sink {
        fn serialize<S>(&self, serializer: &mut S, _scope: TraversalScope) -> io::Result<()>
        where
            S: Serializer,
        {
            let div = QualName::new(None, ns!(html), local_name!("div"));
            let class = QualName::new(None, ns!(), local_name!("class"));
            serializer.start_elem(div.clone(), vec![(&class, "a<b\"c")].into_iter())?;
            serializer.write_text("x < y & z\u{a0}")?;
            serializer.end_elem(div)?;
            Ok(())
        }
    }

    #[test]
    fn escaping_rules() {
        let mut out = vec![];
        serialize(&mut out, &Sink, SerializeOpts::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<div class=\"a<b&quot;c\">x &lt; y &amp; z&nbsp;</div>"
        );
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        struct Br;
        impl Serialize for Br {
            fn serialize<S>(&self, serializer: &mut S, _scope: TraversalScope) -> io::Result<()>
            where
                S: Serializer,
            {
                let br = QualName::new(None, ns!(html), local_name!("br"));
                serializer.start_elem(br.clone(), std::iter::empty())?;
                serializer.end_elem(br)?;
                Ok(())
            }
        }
        let mut out = vec![];
        serialize(&mut out, &Br, SerializeOpts::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<br>");
    }
}
