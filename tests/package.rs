mod common;

use qrdocx::Error;
use qrdocx::package::Container;
use qrdocx::package::parts::{
    ContentTypeEntry, ContentTypes, Relationship, Relationships, load_body, load_content_types,
    load_relationships, main_document_path, part_rels_path, resolve_target, store_relationships,
};

#[test]
fn open_rejects_non_zip_bytes() {
    assert!(matches!(
        Container::open(b"definitely not a zip"),
        Err(Error::ContainerCorrupt(_))
    ));
    assert!(matches!(Container::open(&[]), Err(Error::ContainerCorrupt(_))));
}

#[test]
fn open_rejects_truncated_archive() {
    let docx = common::standard_docx_with(&common::paragraph("hello"));
    let truncated = &docx[..docx.len() / 2];
    assert!(matches!(
        Container::open(truncated),
        Err(Error::ContainerCorrupt(_))
    ));
}

#[test]
fn read_write_and_serialize_parts() {
    let docx = common::standard_docx_with(&common::paragraph("hello"));
    let mut container = Container::open(&docx).unwrap();

    assert!(container.has_part("word/document.xml"));
    assert!(matches!(
        container.read_part("word/missing.xml"),
        Err(Error::PartNotFound(p)) if p == "word/missing.xml"
    ));

    container.write_part("word/styles.xml", b"<replaced/>".to_vec());
    container.write_part("word/media/new.png", vec![1, 2, 3]);
    let bytes = container.serialize().unwrap();

    let names = common::part_names(&bytes);
    assert_eq!(names.len(), 6);
    assert!(names.iter().any(|n| n == "word/media/new.png"));
    assert_eq!(common::read_part(&bytes, "word/styles.xml").unwrap(), b"<replaced/>");
    assert_eq!(common::read_part(&bytes, "word/media/new.png").unwrap(), vec![1, 2, 3]);
    assert_eq!(
        common::read_text(&bytes, "word/_rels/document.xml.rels").unwrap(),
        common::DOCUMENT_RELS
    );
}

#[test]
fn read_text_strips_byte_order_mark() {
    let docx = common::build_docx(&[("word/document.xml", "\u{feff}<w:document/>".as_bytes())]);
    let container = Container::open(&docx).unwrap();
    assert_eq!(container.read_text("word/document.xml").unwrap(), "<w:document/>");
}

#[test]
fn missing_body_is_a_missing_required_part() {
    let docx = common::build_docx(&[("[Content_Types].xml", common::CONTENT_TYPES.as_bytes())]);
    let container = Container::open(&docx).unwrap();
    assert!(matches!(
        load_body(&container, "word/document.xml"),
        Err(Error::MissingRequiredPart(_))
    ));
}

#[test]
fn main_document_follows_package_relationships() {
    let rels = concat!(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/document2.xml"/>"#,
        r#"</Relationships>"#
    );
    let docx = common::build_docx(&[
        ("_rels/.rels", rels.as_bytes()),
        ("word/document2.xml", b"<w:document/>"),
    ]);
    let container = Container::open(&docx).unwrap();
    assert_eq!(main_document_path(&container), "word/document2.xml");

    let plain = common::standard_docx_with("");
    assert_eq!(
        main_document_path(&Container::open(&plain).unwrap()),
        "word/document.xml"
    );
}

#[test]
fn relationship_paths() {
    assert_eq!(part_rels_path("word/document.xml"), "word/_rels/document.xml.rels");
    assert_eq!(part_rels_path("document.xml"), "_rels/document.xml.rels");
    assert_eq!(resolve_target("word", "media/image1.png"), "word/media/image1.png");
    assert_eq!(resolve_target("word", "../customXml/item1.xml"), "customXml/item1.xml");
    assert_eq!(resolve_target("word", "/word/media/a.png"), "word/media/a.png");
}

#[test]
fn relationships_parse_and_serialize() {
    let docx = common::standard_docx_with("");
    let container = Container::open(&docx).unwrap();
    let mut rels = load_relationships(&container, "word/document.xml").unwrap();
    assert_eq!(rels.len(), 2);
    assert!(!rels.is_modified());
    let link = rels.get("rId3").unwrap();
    assert_eq!(link.target, "https://example.com/?a=1&b=2");
    assert_eq!(link.target_mode.as_deref(), Some("External"));

    rels.add(Relationship {
        id: "rId4".into(),
        rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image".into(),
        target: "media/qr.png".into(),
        target_mode: None,
    });
    assert!(rels.is_modified());

    let reparsed = Relationships::parse(&rels.to_xml()).unwrap();
    assert_eq!(reparsed.iter().cloned().collect::<Vec<_>>(), rels.iter().cloned().collect::<Vec<_>>());
}

#[test]
fn absent_relationships_part_is_synthesized_empty() {
    let docx = common::build_docx(&[("word/document.xml", common::document_xml("").as_bytes())]);
    let mut container = Container::open(&docx).unwrap();
    let rels = load_relationships(&container, "word/document.xml").unwrap();
    assert!(rels.is_empty());

    // Unmodified: nothing is written.
    store_relationships(&mut container, "word/document.xml", &rels);
    assert!(!container.has_part("word/_rels/document.xml.rels"));
}

#[test]
fn malformed_relationships_part_is_reported() {
    let docx = common::build_docx(&[
        ("word/document.xml", common::document_xml("").as_bytes()),
        ("word/_rels/document.xml.rels", b"<Relationships><oops></Relationships>"),
    ]);
    let container = Container::open(&docx).unwrap();
    assert!(matches!(
        load_relationships(&container, "word/document.xml"),
        Err(Error::PartMalformed { .. })
    ));
}

#[test]
fn content_types_png_default() {
    let docx = common::standard_docx_with("");
    let container = Container::open(&docx).unwrap();
    let mut types = load_content_types(&container).unwrap().unwrap();
    assert_eq!(types.default_for("png"), None);

    assert!(types.ensure_default("png", "image/png"));
    assert!(!types.ensure_default("PNG", "image/png"));
    assert_eq!(types.default_for("png"), Some("image/png"));

    // Defaults stay ahead of Overrides.
    let entries: Vec<_> = types.iter().cloned().collect();
    assert_eq!(
        entries[2],
        ContentTypeEntry::Default {
            extension: "png".into(),
            content_type: "image/png".into()
        }
    );
    let reparsed = ContentTypes::parse(&types.to_xml()).unwrap();
    assert_eq!(reparsed.iter().count(), 5);
}

#[test]
fn absent_content_types_part() {
    let docx = common::build_docx(&[("word/document.xml", common::document_xml("").as_bytes())]);
    let container = Container::open(&docx).unwrap();
    assert!(load_content_types(&container).unwrap().is_none());

    let synthesized = ContentTypes::synthesize("word/document.xml");
    assert!(synthesized.is_modified());
    assert!(synthesized.to_xml().contains(r#"PartName="/word/document.xml""#));
}
