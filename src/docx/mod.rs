pub mod drawing;
pub mod placeholders;

use std::fmt::Write as _;

use crate::error::Error;

pub use placeholders::xml_escape;

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefixes the generated drawing markup uses. `wp` and `r` must resolve from
/// the root; the fragment declares `a` and `pic` again where it uses them, so
/// those two are only added when the prefix is still free.
const DRAWING_NAMESPACES: [(&str, &str, bool); 4] = [
    ("wp", WPD_NS, true),
    ("a", DML_NS, false),
    ("pic", PIC_NS, false),
    ("r", REL_NS, true),
];

pub(crate) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

pub(crate) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

/// Prefix of an element as written in `text`, `""` for an unprefixed name.
pub(crate) fn element_prefix<'t>(text: &'t str, node: roxmltree::Node) -> &'t str {
    let tag = text[node.range().start..].trim_start_matches('<');
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    tag[..end].split_once(':').map_or("", |(prefix, _)| prefix)
}

/// `prefix:local`, or just `local` for the default namespace.
pub(crate) fn qualified(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Whether the element's own start tag carries `xmlns` declarations.
pub(crate) fn declares_namespaces(text: &str, node: roxmltree::Node) -> bool {
    let start = node.range().start;
    start_tag_end(text, start).is_some_and(|end| text[start..end].contains("xmlns"))
}

pub(crate) fn parse_body(body: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse(body).map_err(|e| Error::PartMalformed {
        path: "main document".into(),
        reason: e.to_string(),
    })
}

/// Declare any missing drawing namespaces on the document root element.
///
/// Only the root start tag is touched; every other byte is kept. Running it
/// on an already patched body returns the body unchanged. `wp` or `r` already
/// bound to a different URI is reported as malformed, since the generated
/// markup could not resolve against it.
pub fn ensure_namespaces(body: &str) -> Result<String, Error> {
    let xml = parse_body(body)?;
    let root = xml.root_element();

    let mut missing = String::new();
    for (prefix, uri, required) in DRAWING_NAMESPACES {
        match root.lookup_namespace_uri(Some(prefix)) {
            Some(bound) if bound == uri => {}
            Some(other) if !required => {
                log::debug!("Prefix \"{prefix}\" is bound to {other}; drawings declare it locally");
            }
            Some(other) => {
                return Err(Error::PartMalformed {
                    path: "main document".into(),
                    reason: format!("prefix \"{prefix}\" is bound to {other}, expected {uri}"),
                });
            }
            None => {
                let _ = write!(missing, " xmlns:{prefix}=\"{uri}\"");
            }
        }
    }
    if missing.is_empty() {
        return Ok(body.to_string());
    }

    let tag_end = start_tag_end(body, root.range().start).ok_or_else(|| Error::PartMalformed {
        path: "main document".into(),
        reason: "unterminated root start tag".into(),
    })?;
    let insert_at = if body[..tag_end].ends_with('/') {
        tag_end - 1
    } else {
        tag_end
    };
    log::debug!("Declaring drawing namespaces on root:{missing}");

    let mut patched = String::with_capacity(body.len() + missing.len());
    patched.push_str(&body[..insert_at]);
    patched.push_str(&missing);
    patched.push_str(&body[insert_at..]);
    Ok(patched)
}

/// Byte offset of the `>` closing the start tag that begins at `from`.
pub(crate) fn start_tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(from) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}
