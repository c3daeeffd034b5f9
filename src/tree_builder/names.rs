// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fixed tag-name categories from the tree-construction rules, as plain
//! predicates over a cached `(namespace, local name)` pair.

use crate::{local_name, ns, LocalName, Namespace};

/// The "special" category. Special elements terminate generic end-tag
/// matching and bound the adoption agency's furthest-block search.
pub(crate) fn is_special(ns: &Namespace, name: &LocalName) -> bool {
    if *ns == ns!(html) {
        return matches!(
            *name,
            local_name!("address")
                | local_name!("applet")
                | local_name!("area")
                | local_name!("article")
                | local_name!("aside")
                | local_name!("base")
                | local_name!("basefont")
                | local_name!("bgsound")
                | local_name!("blockquote")
                | local_name!("body")
                | local_name!("br")
                | local_name!("button")
                | local_name!("caption")
                | local_name!("center")
                | local_name!("col")
                | local_name!("colgroup")
                | local_name!("dd")
                | local_name!("details")
                | local_name!("dir")
                | local_name!("div")
                | local_name!("dl")
                | local_name!("dt")
                | local_name!("embed")
                | local_name!("fieldset")
                | local_name!("figcaption")
                | local_name!("figure")
                | local_name!("footer")
                | local_name!("form")
                | local_name!("frame")
                | local_name!("frameset")
                | local_name!("h1")
                | local_name!("h2")
                | local_name!("h3")
                | local_name!("h4")
                | local_name!("h5")
                | local_name!("h6")
                | local_name!("head")
                | local_name!("header")
                | local_name!("hgroup")
                | local_name!("hr")
                | local_name!("html")
                | local_name!("iframe")
                | local_name!("img")
                | local_name!("input")
                | local_name!("keygen")
                | local_name!("li")
                | local_name!("link")
                | local_name!("listing")
                | local_name!("main")
                | local_name!("marquee")
                | local_name!("menu")
                | local_name!("meta")
                | local_name!("nav")
                | local_name!("noembed")
                | local_name!("noframes")
                | local_name!("noscript")
                | local_name!("object")
                | local_name!("ol")
                | local_name!("p")
                | local_name!("param")
                | local_name!("plaintext")
                | local_name!("pre")
                | local_name!("script")
                | local_name!("search")
                | local_name!("section")
                | local_name!("select")
                | local_name!("source")
                | local_name!("style")
                | local_name!("summary")
                | local_name!("table")
                | local_name!("tbody")
                | local_name!("td")
                | local_name!("template")
                | local_name!("textarea")
                | local_name!("tfoot")
                | local_name!("th")
                | local_name!("thead")
                | local_name!("title")
                | local_name!("tr")
                | local_name!("track")
                | local_name!("ul")
                | local_name!("wbr")
                | local_name!("xmp")
        );
    }
    // The foreign islands count too.
    is_mathml_text_integration_point(ns, name)
        || is_annotation_xml(ns, name)
        || is_svg_html_integration_point(ns, name)
}

/// A MathML text integration point by name alone.
pub(crate) fn is_mathml_text_integration_point(ns: &Namespace, name: &LocalName) -> bool {
    *ns == ns!(mathml)
        && matches!(
            *name,
            local_name!("mi")
                | local_name!("mo")
                | local_name!("mn")
                | local_name!("ms")
                | local_name!("mtext")
        )
}

/// An SVG HTML integration point by name alone. MathML's
/// `<annotation-xml>` can be one as well, but only depending on its
/// `encoding` attribute, which the sink keeps track of.
pub(crate) fn is_svg_html_integration_point(ns: &Namespace, name: &LocalName) -> bool {
    *ns == ns!(svg)
        && matches!(
            *name,
            local_name!("foreignObject") | local_name!("desc") | local_name!("title")
        )
}

pub(crate) fn is_annotation_xml(ns: &Namespace, name: &LocalName) -> bool {
    *ns == ns!(mathml) && *name == local_name!("annotation-xml")
}

/// Tags closed by "generate implied end tags".
pub(crate) fn ends_implied(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("dd")
            | local_name!("dt")
            | local_name!("li")
            | local_name!("option")
            | local_name!("optgroup")
            | local_name!("p")
            | local_name!("rb")
            | local_name!("rp")
            | local_name!("rt")
            | local_name!("rtc")
    )
}

/// The larger implied-end set used when a template is being closed.
pub(crate) fn ends_implied_thoroughly(name: &LocalName) -> bool {
    ends_implied(name)
        || matches!(
            *name,
            local_name!("caption")
                | local_name!("colgroup")
                | local_name!("tbody")
                | local_name!("td")
                | local_name!("tfoot")
                | local_name!("th")
                | local_name!("thead")
                | local_name!("tr")
        )
}

pub(crate) fn is_heading(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("h1")
            | local_name!("h2")
            | local_name!("h3")
            | local_name!("h4")
            | local_name!("h5")
            | local_name!("h6")
    )
}

/// thead / tbody / tfoot, the one test the table-section rules need.
pub(crate) fn is_table_section(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("tbody") | local_name!("tfoot") | local_name!("thead")
    )
}

pub(crate) fn is_cell(name: &LocalName) -> bool {
    matches!(*name, local_name!("td") | local_name!("th"))
}

/// Elements the InTable rules pop back to before inserting structure.
pub(crate) fn is_table_context(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("table") | local_name!("template") | local_name!("html")
    )
}

pub(crate) fn is_table_body_context(name: &LocalName) -> bool {
    is_table_section(name) || matches!(*name, local_name!("template") | local_name!("html"))
}

pub(crate) fn is_table_row_context(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("tr") | local_name!("template") | local_name!("html")
    )
}

/// The targets foster parenting diverts an insertion away from.
pub(crate) fn is_foster_parent_trigger(name: &LocalName) -> bool {
    *name == local_name!("table") || is_table_section(name) || *name == local_name!("tr")
}

/// Metadata tags whose rules live in InHead even when they show up
/// after the head was closed.
pub(crate) fn belongs_in_head(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("base")
            | local_name!("basefont")
            | local_name!("bgsound")
            | local_name!("link")
            | local_name!("meta")
            | local_name!("noframes")
            | local_name!("script")
            | local_name!("style")
            | local_name!("template")
            | local_name!("title")
    )
}

/// The blocks InBody opens after closing an open `<p>`.
pub(crate) fn is_plain_block(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("address")
            | local_name!("article")
            | local_name!("aside")
            | local_name!("blockquote")
            | local_name!("center")
            | local_name!("details")
            | local_name!("dialog")
            | local_name!("dir")
            | local_name!("div")
            | local_name!("dl")
            | local_name!("fieldset")
            | local_name!("figcaption")
            | local_name!("figure")
            | local_name!("footer")
            | local_name!("header")
            | local_name!("hgroup")
            | local_name!("main")
            | local_name!("menu")
            | local_name!("nav")
            | local_name!("ol")
            | local_name!("p")
            | local_name!("search")
            | local_name!("section")
            | local_name!("summary")
            | local_name!("ul")
    )
}

/// End tags the generic block-closing rule in InBody accepts.
pub(crate) fn is_closable_block(name: &LocalName) -> bool {
    is_plain_block(name)
        || matches!(
            *name,
            local_name!("button") | local_name!("listing") | local_name!("pre")
        )
}

/// The formatting set feeding the active-formatting list, minus `<a>`
/// and `<nobr>` which get their own rules.
pub(crate) fn is_plain_formatting(name: &LocalName) -> bool {
    matches!(
        *name,
        local_name!("b")
            | local_name!("big")
            | local_name!("code")
            | local_name!("em")
            | local_name!("font")
            | local_name!("i")
            | local_name!("s")
            | local_name!("small")
            | local_name!("strike")
            | local_name!("strong")
            | local_name!("tt")
            | local_name!("u")
    )
}

/// End tags routed to the adoption agency.
pub(crate) fn is_formatting(name: &LocalName) -> bool {
    is_plain_formatting(name) || matches!(*name, local_name!("a") | local_name!("nobr"))
}

/// Elements that may legitimately still be open when the body ends.
pub(crate) fn is_open_at_body_end_ok(name: &LocalName) -> bool {
    ends_implied(name)
        || is_table_section(name)
        || is_cell(name)
        || matches!(
            *name,
            local_name!("tr") | local_name!("body") | local_name!("html")
        )
}

/// HTML start tags that break out of foreign content.
pub(crate) fn breaks_out_of_foreign(name: &LocalName) -> bool {
    is_heading(name)
        || is_plain_formatting(name)
        || matches!(
            *name,
            local_name!("blockquote")
                | local_name!("body")
                | local_name!("br")
                | local_name!("center")
                | local_name!("dd")
                | local_name!("div")
                | local_name!("dl")
                | local_name!("dt")
                | local_name!("embed")
                | local_name!("head")
                | local_name!("hr")
                | local_name!("img")
                | local_name!("li")
                | local_name!("listing")
                | local_name!("menu")
                | local_name!("meta")
                | local_name!("nobr")
                | local_name!("ol")
                | local_name!("p")
                | local_name!("pre")
                | local_name!("ruby")
                | local_name!("span")
                | local_name!("sub")
                | local_name!("sup")
                | local_name!("table")
                | local_name!("ul")
                | local_name!("var")
        )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn special_covers_foreign_islands() {
        assert!(is_special(&ns!(html), &local_name!("p")));
        assert!(is_special(&ns!(svg), &local_name!("foreignObject")));
        assert!(is_special(&ns!(mathml), &local_name!("mi")));
        assert!(is_special(&ns!(mathml), &local_name!("annotation-xml")));
        assert!(!is_special(&ns!(html), &local_name!("span")));
        assert!(!is_special(&ns!(svg), &local_name!("path")));
    }

    #[test]
    fn formatting_tags() {
        assert!(is_formatting(&local_name!("a")));
        assert!(is_formatting(&local_name!("nobr")));
        assert!(is_plain_formatting(&local_name!("em")));
        assert!(!is_plain_formatting(&local_name!("a")));
        assert!(!is_formatting(&local_name!("div")));
    }

    #[test]
    fn implied_end_sets_nest() {
        assert!(ends_implied(&local_name!("p")));
        assert!(!ends_implied(&local_name!("td")));
        assert!(ends_implied_thoroughly(&local_name!("td")));
        assert!(ends_implied_thoroughly(&local_name!("p")));
    }
}
