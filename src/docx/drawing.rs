use std::collections::HashMap;
use std::ops::Range;

use super::placeholders::{find_tokens, substitute_text, token, xml_escape};
use super::{
    DML_NS, PIC_NS, WPD_NS, XML_NS, declares_namespaces, element_prefix, is_wml, parse_body,
    qualified, start_tag_end, wml,
};
use crate::error::Error;
use crate::model::{ImagePlacement, ImageValue, Outcome};
use crate::package::Container;
use crate::package::parts::{
    ContentTypes, IMAGE_REL_TYPE, Relationship, Relationships, part_dir, resolve_target,
};

pub const EMU_PER_INCH: f64 = 914_400.0;
pub const MM_PER_INCH: f64 = 25.4;

/// Largest extent DrawingML accepts (ST_PositiveCoordinate).
const MAX_EXTENT_EMU: i64 = 27_273_042_316_900;

const PICTURE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

/// Millimetres → EMU (914400 per inch).
pub fn mm_to_emu(size_mm: f64) -> i64 {
    (size_mm / MM_PER_INCH * EMU_PER_INCH).round() as i64
}

/// One past the largest numeric `rId<n>` among `ids`, or 1 if there is none.
/// `None` once the largest id is `u32::MAX`.
///
/// Always recomputed from the table being edited; there is no counter to carry
/// between calls or between documents.
pub fn next_relationship_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<u32> {
    ids.into_iter()
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .map_or(Some(1), |max| max.checked_add(1))
}

/// Markup for one inline picture, placed inside a `w:r`.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingFragment {
    pub relationship_id: String,
    pub extent_emu: i64,
    pub doc_pr_id: u32,
    pub name: String,
    pub file_name: String,
}

impl DrawingFragment {
    pub fn new(
        relationship_id: &str,
        extent_emu: i64,
        doc_pr_id: u32,
        name: &str,
        file_name: &str,
    ) -> Result<Self, String> {
        if extent_emu <= 0 || extent_emu > MAX_EXTENT_EMU {
            return Err(format!("extent {extent_emu} EMU is out of range"));
        }
        if relationship_id.is_empty() {
            return Err("empty relationship id".into());
        }
        Ok(DrawingFragment {
            relationship_id: relationship_id.to_string(),
            extent_emu,
            doc_pr_id,
            name: name.to_string(),
            file_name: file_name.to_string(),
        })
    }

    pub fn to_xml(&self) -> String {
        self.to_xml_with_prefix("w")
    }

    /// Markup with the `drawing` element under `wml_prefix`, the prefix the
    /// enclosing run binds to WordprocessingML (`""` for a default namespace).
    pub fn to_xml_with_prefix(&self, wml_prefix: &str) -> String {
        let drawing = qualified(wml_prefix, "drawing");
        let ext = self.extent_emu;
        let rid = xml_escape(&self.relationship_id);
        let name = xml_escape(&self.name);
        let file_name = xml_escape(&self.file_name);
        format!(
            concat!(
                "<{drawing}>",
                "<wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">",
                "<wp:extent cx=\"{ext}\" cy=\"{ext}\"/>",
                "<wp:effectExtent l=\"0\" t=\"0\" r=\"0\" b=\"0\"/>",
                "<wp:docPr id=\"{id}\" name=\"{name}\"/>",
                "<wp:cNvGraphicFramePr>",
                "<a:graphicFrameLocks xmlns:a=\"{dml}\" noChangeAspect=\"1\"/>",
                "</wp:cNvGraphicFramePr>",
                "<a:graphic xmlns:a=\"{dml}\">",
                "<a:graphicData uri=\"{uri}\">",
                "<pic:pic xmlns:pic=\"{pic}\">",
                "<pic:nvPicPr><pic:cNvPr id=\"0\" name=\"{file_name}\"/><pic:cNvPicPr/></pic:nvPicPr>",
                "<pic:blipFill><a:blip r:embed=\"{rid}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>",
                "<pic:spPr>",
                "<a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{ext}\" cy=\"{ext}\"/></a:xfrm>",
                "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom>",
                "</pic:spPr>",
                "</pic:pic>",
                "</a:graphicData>",
                "</a:graphic>",
                "</wp:inline>",
                "</{drawing}>",
            ),
            drawing = drawing,
            ext = ext,
            id = self.doc_pr_id,
            name = name,
            dml = DML_NS,
            uri = PICTURE_URI,
            pic = PIC_NS,
            file_name = file_name,
            rid = rid,
        )
    }
}

/// Everything an embedding touches besides the body.
pub struct EmbedTarget<'c> {
    pub container: &'c mut Container,
    pub relationships: &'c mut Relationships,
    pub content_types: &'c mut Option<ContentTypes>,
    pub document_path: &'c str,
    pub placement: ImagePlacement,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Embedded {
    pub count: usize,
    pub relationship_id: String,
    pub media_path: String,
}

/// Embed `image` at every `{{key}}` in `body`.
///
/// One media part and one relationship are created per key, shared by all of
/// its occurrences; each occurrence gets its own drawing. All checks run before
/// anything is mutated, so an `Err` leaves body, tables and container as they
/// were. `Ok(None)` means the token does not occur.
pub fn embed_image(
    body: &mut String,
    key: &str,
    image: &ImageValue,
    size_mm: f64,
    target: &mut EmbedTarget,
) -> Result<Option<Embedded>, Error> {
    let raw_count = find_tokens(body, key).len();
    if raw_count == 0 {
        return Ok(None);
    }
    let fail = |reason: String| Error::ImageEmbed {
        key: key.to_string(),
        reason,
    };

    if !size_mm.is_finite() || size_mm <= 0.0 {
        return Err(fail(format!("size must be a positive number of millimetres, got {size_mm}")));
    }
    let (pixel_width, pixel_height) = validate_png(&image.data).map_err(fail)?;

    let xml = parse_body(body).map_err(|e| fail(e.to_string()))?;
    let mut sites = locate_sites(body, &xml, &token(key)).map_err(fail)?;
    if sites.len() != raw_count {
        return Err(fail(format!(
            "{} of {raw_count} occurrences are not inside a text run",
            raw_count - sites.len()
        )));
    }
    let first_doc_pr_id = next_drawing_id(&xml);
    drop(xml);

    let rid = next_relationship_id(target.relationships.ids())
        .map(|n| format!("rId{n}"))
        .ok_or_else(|| fail("no relationship id left in this part".into()))?;
    let media_path = unique_media_path(target, key);
    let file_name = media_path.rsplit('/').next().unwrap_or(&media_path).to_string();
    let media_target = relative_target(part_dir(target.document_path), &media_path);
    let extent = mm_to_emu(size_mm);

    let mut fragments = Vec::with_capacity(sites.len());
    for (i, site) in sites.iter().enumerate() {
        let doc_pr_id = first_doc_pr_id
            .and_then(|first| u32::try_from(i).ok().and_then(|i| first.checked_add(i)))
            .ok_or_else(|| fail("no drawing id left in this document".into()))?;
        let fragment =
            DrawingFragment::new(&rid, extent, doc_pr_id, &format!("QR {key}"), &file_name)
                .map_err(fail)?;
        fragments.push(fragment.to_xml_with_prefix(&site.names.run));
    }

    // Validation done; from here on nothing fails.
    match target.placement {
        ImagePlacement::Inline => {
            for site in &mut sites {
                site.split = None;
            }
        }
        ImagePlacement::Block => {
            let nested = sites.iter().filter(|s| s.split.is_none()).count();
            if nested > 0 {
                log::debug!("{key}: {nested} occurrence(s) cannot get their own paragraph, placed inline");
            }
        }
    }
    for (site, fragment) in sites.iter().zip(&fragments).rev() {
        splice_site(body, site, fragment);
    }

    target.relationships.add(Relationship {
        id: rid.clone(),
        rel_type: IMAGE_REL_TYPE.to_string(),
        target: media_target,
        target_mode: None,
    });
    target.container.write_part(&media_path, image.data.clone());
    let document_path = target.document_path;
    let added = target
        .content_types
        .get_or_insert_with(|| {
            log::warn!("Package has no [Content_Types].xml; creating one");
            ContentTypes::synthesize(document_path)
        })
        .ensure_default("png", "image/png");
    if added {
        log::debug!("Registered png content type");
    }

    log::debug!(
        "Embedded {key}: {media_path} ({pixel_width}x{pixel_height}px) as {rid}, {extent} EMU, {} occurrence(s)",
        sites.len()
    );
    Ok(Some(Embedded {
        count: sites.len(),
        relationship_id: rid,
        media_path,
    }))
}

/// [`embed_image`], degrading to the bracketed fallback text on failure.
/// The failure is returned alongside as a warning.
pub fn embed_image_or_fallback(
    body: &mut String,
    key: &str,
    image: &ImageValue,
    size_mm: f64,
    target: &mut EmbedTarget,
) -> (Outcome, Option<Error>) {
    match embed_image(body, key, image, size_mm, target) {
        Ok(Some(embedded)) => (
            Outcome::Embedded {
                count: embedded.count,
                relationship_id: embedded.relationship_id,
                media_path: embedded.media_path,
            },
            None,
        ),
        Ok(None) => (Outcome::NotFound, None),
        Err(e) => {
            let original = image.source.as_deref().unwrap_or(key);
            let count = substitute_text(body, key, &fallback_text(original));
            log::warn!("{e}; substituted fallback text");
            (
                Outcome::FallbackUsed {
                    count,
                    reason: e.to_string(),
                },
                Some(e),
            )
        }
    }
}

pub fn fallback_text(original: &str) -> String {
    format!("[QR-CODE: {original} - image embedding failed]")
}

fn validate_png(data: &[u8]) -> Result<(u32, u32), String> {
    if data.is_empty() {
        return Err("no image data".into());
    }
    if !matches!(image::guess_format(data), Ok(image::ImageFormat::Png)) {
        return Err("image data is not a PNG".into());
    }
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| format!("invalid PNG: {e}"))?;
    Ok((decoded.width(), decoded.height()))
}

fn next_drawing_id(xml: &roxmltree::Document) -> Option<u32> {
    xml.descendants()
        .filter(|n| n.tag_name().name() == "docPr" && n.tag_name().namespace() == Some(WPD_NS))
        .filter_map(|n| n.attribute("id"))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .map_or(Some(1), |max| max.checked_add(1))
}

fn media_stem(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("qr_{safe}")
}

/// `word/media/qr_<key>.png`, suffixed `_2`, `_3`, … if already taken.
fn unique_media_path(target: &EmbedTarget, key: &str) -> String {
    let dir = part_dir(target.document_path);
    let media_dir = if dir.is_empty() {
        "media".to_string()
    } else {
        format!("{dir}/media")
    };
    let referenced: Vec<String> = target
        .relationships
        .iter()
        .filter(|r| r.target_mode.as_deref() != Some("External"))
        .map(|r| resolve_target(dir, &r.target))
        .collect();
    let taken = |path: &str| target.container.has_part(path) || referenced.iter().any(|r| r == path);

    let stem = media_stem(key);
    let mut path = format!("{media_dir}/{stem}.png");
    let mut n = 2;
    while taken(&path) {
        path = format!("{media_dir}/{stem}_{n}.png");
        n += 1;
    }
    path
}

fn relative_target(source_dir: &str, path: &str) -> String {
    if source_dir.is_empty() {
        return path.to_string();
    }
    path.strip_prefix(source_dir)
        .and_then(|p| p.strip_prefix('/'))
        .map(String::from)
        .unwrap_or_else(|| format!("/{path}"))
}

/// Where a token sits, with what is needed to lift it into its own paragraph.
struct TokenSite {
    token: Range<usize>,
    names: ElementPrefixes,
    /// `>` of the enclosing `w:t` start tag, when the text left in front of the
    /// token ends in whitespace and the element does not preserve it yet.
    preserve_at: Option<usize>,
    split: Option<ParagraphSplit>,
}

/// Prefixes the document uses for the elements around a token, so spliced
/// tags match whatever binding the document chose for WordprocessingML.
#[derive(Clone)]
struct ElementPrefixes {
    text: String,
    run: String,
    paragraph: String,
}

struct ParagraphSplit {
    before_has_content: bool,
    after_has_content: bool,
    ppr: Option<Range<usize>>,
    sect_pr: Option<Range<usize>>,
    rpr: Option<Range<usize>>,
}

/// Occurrences of `needle` inside `w:t` text of a `w:r`. A paragraph split is
/// only offered when the run sits directly in its paragraph, no other
/// occurrence shares that paragraph, and neither start tag declares namespaces
/// that copies of it would lose.
fn locate_sites(
    body: &str,
    xml: &roxmltree::Document,
    needle: &str,
) -> Result<Vec<TokenSite>, String> {
    let mut sites = Vec::new();
    let mut per_paragraph: HashMap<usize, usize> = HashMap::new();
    let mut paragraph_of: Vec<Option<usize>> = Vec::new();

    for text in xml.descendants().filter(|n| n.is_text()) {
        let Some(t) = text.parent().filter(|p| is_wml(*p, "t")) else {
            continue;
        };
        let Some(run) = t.parent().filter(|p| is_wml(*p, "r")) else {
            continue;
        };
        let text_range = text.range();
        let raw = &body[text_range.clone()];
        if !raw.contains(needle) {
            continue;
        }
        if declares_namespaces(body, t) {
            return Err("a text element holding the token declares its own namespaces".into());
        }
        let para = run.parent().filter(|p| is_wml(*p, "p"));
        let names = ElementPrefixes {
            text: element_prefix(body, t).to_string(),
            run: element_prefix(body, run).to_string(),
            paragraph: para.map(|p| element_prefix(body, p).to_string()).unwrap_or_default(),
        };
        let splittable =
            para.filter(|p| !declares_namespaces(body, *p) && !declares_namespaces(body, run));
        let t_start_end = t
            .attribute((XML_NS, "space"))
            .is_none()
            .then(|| start_tag_end(body, t.range().start))
            .flatten();

        for (i, (offset, _)) in raw.match_indices(needle).enumerate() {
            let start = text_range.start + offset;
            let token = start..start + needle.len();
            // Later tokens in this text node end up in reopened, preserving elements.
            let preserve_at = t_start_end.filter(|_| {
                i == 0 && body[text_range.start..token.start].ends_with(char::is_whitespace)
            });
            let split = splittable.map(|p| {
                let content = paragraph_content(p);
                let ppr = wml(p, "pPr");
                ParagraphSplit {
                    before_has_content: content.iter().any(|r| r.end <= token.start)
                        || !body[text_range.start..token.start].trim().is_empty(),
                    after_has_content: content.iter().any(|r| r.start >= token.end)
                        || !body[token.end..text_range.end].trim().is_empty(),
                    ppr: ppr.map(|n| n.range()),
                    sect_pr: ppr.and_then(|n| wml(n, "sectPr")).map(|n| n.range()),
                    rpr: wml(run, "rPr").map(|n| n.range()),
                }
            });
            let para_start = para.map(|p| p.range().start);
            if let Some(ps) = para_start {
                *per_paragraph.entry(ps).or_default() += 1;
            }
            paragraph_of.push(para_start);
            sites.push(TokenSite {
                token,
                names: names.clone(),
                preserve_at,
                split,
            });
        }
    }

    for (site, para) in sites.iter_mut().zip(paragraph_of) {
        if para.is_some_and(|ps| per_paragraph.get(&ps).copied().unwrap_or(0) > 1) {
            site.split = None;
        }
    }
    Ok(sites)
}

/// Ranges of visible content in a paragraph: non-blank text, tabs, symbols and
/// other drawings. Content of nested paragraphs (text boxes) is not counted.
fn paragraph_content(para: roxmltree::Node) -> Vec<Range<usize>> {
    para.descendants()
        .filter(|n| super::placeholders::nearest_paragraph(*n) == Some(para))
        .filter(|n| {
            (is_wml(*n, "t") && n.text().is_some_and(|t| !t.trim().is_empty()))
                || ["drawing", "pict", "object", "tab", "sym"]
                    .iter()
                    .any(|name| is_wml(*n, name))
        })
        .map(|n| n.range())
        .collect()
}

/// Rewrite one site in place. Sites must be applied back to front so earlier
/// ranges stay valid.
///
/// The token is inside `<w:t>`. Inline placement closes that text element,
/// inserts the drawing and reopens it. Block placement additionally closes the
/// paragraph before and/or after the drawing when there is other content on
/// that side, reopening with the same paragraph and run properties. A section
/// break in the paragraph properties moves to the last resulting paragraph.
/// Spliced tags reuse the prefixes the document gives those elements.
fn splice_site(body: &mut String, site: &TokenSite, fragment: &str) {
    let names = &site.names;
    let t = qualified(&names.text, "t");
    let close_t = format!("</{t}>");
    let open_t = format!("<{t} xml:space=\"preserve\">");

    let split = site
        .split
        .as_ref()
        .filter(|s| s.before_has_content || s.after_has_content);

    let mut replacement = String::new();
    match split {
        None => {
            replacement.push_str(&close_t);
            replacement.push_str(fragment);
            replacement.push_str(&open_t);
        }
        Some(split) => {
            let run_tag = qualified(&names.run, "r");
            let para_tag = qualified(&names.paragraph, "p");
            let ppr_full = split.ppr.clone().map(|r| body[r].to_string()).unwrap_or_default();
            let ppr_no_sect = match (&split.ppr, &split.sect_pr) {
                (Some(ppr), Some(sect)) => {
                    format!("{}{}", &body[ppr.start..sect.start], &body[sect.end..ppr.end])
                }
                _ => ppr_full.clone(),
            };
            let rpr = split.rpr.clone().map(|r| body[r].to_string()).unwrap_or_default();
            let reopen =
                |ppr: &str| format!("{close_t}</{run_tag}></{para_tag}><{para_tag}>{ppr}<{run_tag}>{rpr}{open_t}");

            if split.before_has_content {
                let ppr = if split.after_has_content { &ppr_no_sect } else { &ppr_full };
                replacement.push_str(&reopen(ppr));
            }
            replacement.push_str(&close_t);
            replacement.push_str(fragment);
            replacement.push_str(&open_t);
            if split.after_has_content {
                replacement.push_str(&reopen(&ppr_full));
            }
        }
    }

    body.replace_range(site.token.clone(), &replacement);
    if let Some(at) = site.preserve_at {
        body.insert_str(at, " xml:space=\"preserve\"");
    }
    // The first paragraph keeps its original properties minus the section break.
    if let Some(sect) = split.and_then(|s| s.sect_pr.as_ref()) {
        body.replace_range(sect.clone(), "");
    }
}
