#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

pub const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    r#"</Types>"#
);

pub const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

/// rId1 and rId3: the next free id is rId4.
pub const DOCUMENT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>"#,
    r#"</Relationships>"#
);

pub const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#
);

/// A document whose root declares only the `w` namespace.
pub fn document_xml(body_inner: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\r\n",
            r#"<w:document xmlns:w="{}" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml">"#,
            "<w:body>{}<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/></w:sectPr></w:body>",
            "</w:document>"
        ),
        WML_NS, body_inner
    )
}

pub fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

pub fn paragraphs(texts: &[&str]) -> String {
    texts.iter().map(|t| paragraph(t)).collect()
}

pub fn build_docx(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Content types, package rels, document rels, styles and the given body.
pub fn standard_docx(document: &str) -> Vec<u8> {
    build_docx(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("word/styles.xml", STYLES.as_bytes()),
    ])
}

pub fn standard_docx_with(body_inner: &str) -> Vec<u8> {
    standard_docx(&document_xml(body_inner))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgb([0, 0, 0])
        } else {
            image::Rgb([255, 255, 255])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn part_names(docx: &[u8]) -> Vec<String> {
    let zip = zip::ZipArchive::new(Cursor::new(docx)).expect("output is a ZIP archive");
    zip.file_names().map(String::from).collect()
}

pub fn read_part(docx: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(docx)).expect("output is a ZIP archive");
    let mut entry = zip.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).ok()?;
    Some(data)
}

pub fn read_text(docx: &[u8], name: &str) -> Option<String> {
    read_part(docx, name).map(|d| String::from_utf8(d).expect("UTF-8 part"))
}

pub fn body_of(docx: &[u8]) -> String {
    read_text(docx, "word/document.xml").expect("word/document.xml")
}

/// (Id, Type, Target) of every relationship of the main document.
pub fn relationships_of(docx: &[u8]) -> Vec<(String, String, String)> {
    let xml = read_text(docx, "word/_rels/document.xml.rels").expect("document rels");
    let doc = roxmltree::Document::parse(&xml).expect("rels parse");
    doc.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .map(|n| {
            (
                n.attribute("Id").unwrap().to_string(),
                n.attribute("Type").unwrap().to_string(),
                n.attribute("Target").unwrap().to_string(),
            )
        })
        .collect()
}

/// (r:embed id, cx, cy) of every inline picture in the body.
pub fn drawings_of(body: &str) -> Vec<(String, i64, i64)> {
    let doc = roxmltree::Document::parse(body).expect("body parses as XML");
    doc.descendants()
        .filter(|n| n.tag_name().name() == "inline" && n.tag_name().namespace() == Some(WPD_NS))
        .map(|inline| {
            let extent = inline
                .children()
                .find(|n| n.tag_name().name() == "extent")
                .unwrap();
            let blip = inline
                .descendants()
                .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
                .unwrap();
            (
                blip.attribute((REL_NS, "embed")).unwrap().to_string(),
                extent.attribute("cx").unwrap().parse().unwrap(),
                extent.attribute("cy").unwrap().parse().unwrap(),
            )
        })
        .collect()
}

/// Visible text of each top-level body paragraph.
pub fn paragraph_texts(body: &str) -> Vec<String> {
    let doc = roxmltree::Document::parse(body).expect("body parses as XML");
    doc.descendants()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(WML_NS))
        .map(|p| {
            p.descendants()
                .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(WML_NS))
                .filter_map(|t| t.text())
                .collect()
        })
        .collect()
}
