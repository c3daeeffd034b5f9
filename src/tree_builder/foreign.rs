// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The rules for parsing tokens in foreign (SVG / MathML) content, and
//! the tag-name and attribute adjustments that go with them.

use phf::phf_map;

use crate::errors::ErrorCode;
use crate::interface::TreeSink;
use crate::tendril::SliceExt;
use crate::tokenizer::{EndTag, StartTag, Tag};
use crate::tree_builder::names;
use crate::tree_builder::types::{Step, Token};
use crate::tree_builder::TreeBuilder;
use crate::{local_name, ns, LocalName, Namespace, Prefix};

/// SVG element names whose camelCase the tokenizer lowercased away.
static SVG_TAG_CASE: phf::Map<&'static str, &'static str> = phf_map! {
    "altglyph" => "altGlyph",
    "altglyphdef" => "altGlyphDef",
    "altglyphitem" => "altGlyphItem",
    "animatecolor" => "animateColor",
    "animatemotion" => "animateMotion",
    "animatetransform" => "animateTransform",
    "clippath" => "clipPath",
    "feblend" => "feBlend",
    "fecolormatrix" => "feColorMatrix",
    "fecomponenttransfer" => "feComponentTransfer",
    "fecomposite" => "feComposite",
    "feconvolvematrix" => "feConvolveMatrix",
    "fediffuselighting" => "feDiffuseLighting",
    "fedisplacementmap" => "feDisplacementMap",
    "fedistantlight" => "feDistantLight",
    "fedropshadow" => "feDropShadow",
    "feflood" => "feFlood",
    "fefunca" => "feFuncA",
    "fefuncb" => "feFuncB",
    "fefuncg" => "feFuncG",
    "fefuncr" => "feFuncR",
    "fegaussianblur" => "feGaussianBlur",
    "feimage" => "feImage",
    "femerge" => "feMerge",
    "femergenode" => "feMergeNode",
    "femorphology" => "feMorphology",
    "feoffset" => "feOffset",
    "fepointlight" => "fePointLight",
    "fespecularlighting" => "feSpecularLighting",
    "fespotlight" => "feSpotLight",
    "fetile" => "feTile",
    "feturbulence" => "feTurbulence",
    "foreignobject" => "foreignObject",
    "glyphref" => "glyphRef",
    "lineargradient" => "linearGradient",
    "radialgradient" => "radialGradient",
    "textpath" => "textPath",
};

/// SVG attribute names with the same problem.
static SVG_ATTR_CASE: phf::Map<&'static str, &'static str> = phf_map! {
    "attributename" => "attributeName",
    "attributetype" => "attributeType",
    "basefrequency" => "baseFrequency",
    "baseprofile" => "baseProfile",
    "calcmode" => "calcMode",
    "clippathunits" => "clipPathUnits",
    "diffuseconstant" => "diffuseConstant",
    "edgemode" => "edgeMode",
    "filterunits" => "filterUnits",
    "glyphref" => "glyphRef",
    "gradienttransform" => "gradientTransform",
    "gradientunits" => "gradientUnits",
    "kernelmatrix" => "kernelMatrix",
    "kernelunitlength" => "kernelUnitLength",
    "keypoints" => "keyPoints",
    "keysplines" => "keySplines",
    "keytimes" => "keyTimes",
    "lengthadjust" => "lengthAdjust",
    "limitingconeangle" => "limitingConeAngle",
    "markerheight" => "markerHeight",
    "markerunits" => "markerUnits",
    "markerwidth" => "markerWidth",
    "maskcontentunits" => "maskContentUnits",
    "maskunits" => "maskUnits",
    "numoctaves" => "numOctaves",
    "pathlength" => "pathLength",
    "patterncontentunits" => "patternContentUnits",
    "patterntransform" => "patternTransform",
    "patternunits" => "patternUnits",
    "pointsatx" => "pointsAtX",
    "pointsaty" => "pointsAtY",
    "pointsatz" => "pointsAtZ",
    "preservealpha" => "preserveAlpha",
    "preserveaspectratio" => "preserveAspectRatio",
    "primitiveunits" => "primitiveUnits",
    "refx" => "refX",
    "refy" => "refY",
    "repeatcount" => "repeatCount",
    "repeatdur" => "repeatDur",
    "requiredextensions" => "requiredExtensions",
    "requiredfeatures" => "requiredFeatures",
    "specularconstant" => "specularConstant",
    "specularexponent" => "specularExponent",
    "spreadmethod" => "spreadMethod",
    "startoffset" => "startOffset",
    "stddeviation" => "stdDeviation",
    "stitchtiles" => "stitchTiles",
    "surfacescale" => "surfaceScale",
    "systemlanguage" => "systemLanguage",
    "tablevalues" => "tableValues",
    "targetx" => "targetX",
    "targety" => "targetY",
    "textlength" => "textLength",
    "viewbox" => "viewBox",
    "viewtarget" => "viewTarget",
    "xchannelselector" => "xChannelSelector",
    "ychannelselector" => "yChannelSelector",
    "zoomandpan" => "zoomAndPan",
};

fn adjust_svg_tag_name(tag: &mut Tag) {
    if let Some(fixed) = SVG_TAG_CASE.get(&tag.name) {
        tag.name = LocalName::from(*fixed);
    }
}

fn adjust_svg_attributes(tag: &mut Tag) {
    for attr in &mut tag.attrs {
        if let Some(fixed) = SVG_ATTR_CASE.get(&attr.name.local) {
            attr.name.local = LocalName::from(*fixed);
        }
    }
}

fn adjust_mathml_attributes(tag: &mut Tag) {
    for attr in &mut tag.attrs {
        if attr.name.local == local_name!("definitionurl") {
            attr.name.local = local_name!("definitionURL");
        }
    }
}

/// Namespaced attributes (xlink:, xml:, xmlns) arrive from the tokenizer
/// as plain names with a colon inside; here they get their prefix and
/// namespace back.
fn adjust_foreign_attributes(tag: &mut Tag) {
    fn resolved(name: &LocalName) -> Option<(Option<Prefix>, Namespace, LocalName)> {
        let (prefix, local) = match name.split_once(':') {
            Some(pair) => pair,
            None if &**name == "xmlns" => {
                return Some((None, ns!(xmlns), local_name!("xmlns")));
            },
            None => return None,
        };
        let ns = match prefix {
            "xlink"
                if matches!(
                    local,
                    "actuate" | "arcrole" | "href" | "role" | "show" | "title" | "type"
                ) =>
            {
                ns!(xlink)
            },
            "xml" if matches!(local, "lang" | "space") => ns!(xml),
            "xmlns" if local == "xlink" => ns!(xmlns),
            _ => return None,
        };
        Some((
            Some(Prefix::from(prefix)),
            ns,
            LocalName::from(local),
        ))
    }

    for attr in &mut tag.attrs {
        if let Some((prefix, ns, local)) = resolved(&attr.name.local) {
            attr.name.prefix = prefix;
            attr.name.ns = ns;
            attr.name.local = local;
        }
    }
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    //§ parsing-main-inforeign
    /// The whole-token handler the dispatcher routes to for foreign
    /// content.
    pub(crate) fn foreign_content(&self, token: Token) -> Step<Handle> {
        let tag = match token {
            Token::Null => {
                self.bad_token(&Token::Null);
                return self.add_text("\u{fffd}".to_tendril());
            },
            Token::Text(run) => {
                if run.has_non_whitespace() {
                    self.frameset_ok.set(false);
                }
                return self.add_text(run.text);
            },
            Token::Comment(text) => return self.add_comment(text),
            Token::Eof => unreachable!("EOF is dispatched to the HTML rules"),
            Token::Tag(tag) => tag,
        };

        match tag.kind {
            StartTag => {
                // <font> only breaks out when it smells like the HTML
                // element, i.e. carries one of its legacy attributes.
                let breakout = if tag.name == local_name!("font") {
                    tag.attrs.iter().any(|a| {
                        a.name.ns == ns!()
                            && matches!(
                                a.name.local,
                                local_name!("color")
                                    | local_name!("face")
                                    | local_name!("size")
                            )
                    })
                } else {
                    names::breaks_out_of_foreign(&tag.name)
                };
                if breakout {
                    self.escape_foreign_content(tag)
                } else {
                    self.open_adjusted_foreign(tag)
                }
            },

            // </br> and </p> break out like their start tags would.
            EndTag if matches!(tag.name, local_name!("br") | local_name!("p")) => {
                self.escape_foreign_content(tag)
            },

            EndTag => self.foreign_end_tag(tag),
        }
    }
    //§ END

    /// Insert a foreign element in the adjusted current node's namespace,
    /// with all three adjustment passes applied.
    fn open_adjusted_foreign(&self, mut tag: Tag) -> Step<Handle> {
        let ns = self.adjusted_current().ns;
        match ns {
            ns!(mathml) => adjust_mathml_attributes(&mut tag),
            ns!(svg) => {
                adjust_svg_tag_name(&mut tag);
                adjust_svg_attributes(&mut tag);
            },
            _ => {},
        }
        adjust_foreign_attributes(&mut tag);
        self.finish_foreign_insert(tag, ns)
    }

    /// `<math>` / `<svg>` seen in InBody: the element opens a foreign
    /// subtree rooted in the given namespace.
    pub(crate) fn enter_foreign_content(&self, mut tag: Tag, ns: Namespace) -> Step<Handle> {
        match ns {
            ns!(mathml) => adjust_mathml_attributes(&mut tag),
            ns!(svg) => adjust_svg_attributes(&mut tag),
            _ => {},
        }
        adjust_foreign_attributes(&mut tag);
        self.finish_foreign_insert(tag, ns)
    }

    fn finish_foreign_insert(&self, tag: Tag, ns: Namespace) -> Step<Handle> {
        if tag.self_closing {
            self.insert_element(ns, tag.name, tag.attrs, false);
            Step::DoneAckSelfClosing
        } else {
            self.insert_element(ns, tag.name, tag.attrs, true);
            Step::Done
        }
    }

    /// An HTML tag that has no business inside foreign content: pop back
    /// to an integration point (or HTML itself) and let the normal rules
    /// have it.
    fn escape_foreign_content(&self, tag: Tag) -> Step<Handle> {
        self.report_unexpected(ErrorCode::TagCannotStartHere, &tag);
        loop {
            let current = self.open.current();
            if current.ns == ns!(html)
                || names::is_mathml_text_integration_point(&current.ns, &current.name)
                || names::is_svg_html_integration_point(&current.ns, &current.name)
            {
                break;
            }
            self.pop();
        }
        self.handle(self.insertion_mode.get(), Token::Tag(tag))
    }

    /// A foreign end tag closes the nearest matching element; HTML
    /// elements further down take over with the HTML rules instead.
    /// Names compare ASCII case-insensitively throughout, since foreign
    /// local names keep their adjusted case.
    fn foreign_end_tag(&self, tag: Tag) -> Step<Handle> {
        let mut depth = self.open.len() - 1;
        let mut reported = false;
        loop {
            if depth == 0 {
                return Step::Done;
            }
            let entry = self.open.get(depth);
            if reported && entry.ns == ns!(html) {
                return self.handle(self.insertion_mode.get(), Token::Tag(tag));
            }
            if entry.name.eq_ignore_ascii_case(&tag.name) {
                self.open.truncate(depth);
                return Step::Done;
            }
            if !reported {
                self.report_unexpected(ErrorCode::ForeignTagClosedWrong, &tag);
                reported = true;
            }
            depth -= 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interface::QualName;
    use crate::tendril::StrTendril;
    use crate::tokenizer::TagKind;

    fn tag_with_attr(name: &str, attr: &str) -> Tag {
        Tag {
            kind: TagKind::StartTag,
            name: LocalName::from(name),
            self_closing: false,
            attrs: vec![crate::interface::Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr)),
                value: StrTendril::from_slice("v"),
            }],
        }
    }

    #[test]
    fn svg_case_restoration() {
        let mut tag = tag_with_attr("foreignobject", "viewbox");
        adjust_svg_tag_name(&mut tag);
        adjust_svg_attributes(&mut tag);
        assert_eq!(&*tag.name, "foreignObject");
        assert_eq!(&*tag.attrs[0].name.local, "viewBox");
    }

    #[test]
    fn xlink_attributes_gain_a_namespace() {
        let mut tag = tag_with_attr("a", "xlink:href");
        adjust_foreign_attributes(&mut tag);
        let name = &tag.attrs[0].name;
        assert_eq!(name.ns, ns!(xlink));
        assert_eq!(&*name.local, "href");
        assert_eq!(name.prefix.as_deref(), Some("xlink"));
    }

    #[test]
    fn unknown_colon_names_pass_through() {
        let mut tag = tag_with_attr("a", "data:foo");
        adjust_foreign_attributes(&mut tag);
        let name = &tag.attrs[0].name;
        assert_eq!(name.ns, ns!());
        assert_eq!(&*name.local, "data:foo");
    }
}
