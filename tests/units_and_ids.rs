use qrdocx::docx::drawing::{DrawingFragment, mm_to_emu, next_relationship_id};

#[test]
fn fifty_millimetres_is_1800000_emu() {
    assert_eq!(mm_to_emu(50.0), 1_800_000);
}

#[test]
fn inch_and_fractional_sizes_round_to_nearest() {
    assert_eq!(mm_to_emu(25.4), 914_400);
    assert_eq!(mm_to_emu(1.0), 36_000);
    // 0.00001 mm = 0.36 EMU
    assert_eq!(mm_to_emu(0.00001), 0);
    assert_eq!(mm_to_emu(0.00002), 1);
    for mm in (25..=100).step_by(5) {
        assert_eq!(mm_to_emu(mm as f64), mm as i64 * 36_000);
    }
}

#[test]
fn relationship_id_starts_at_one() {
    assert_eq!(next_relationship_id(std::iter::empty::<&str>()), Some(1));
}

#[test]
fn relationship_id_follows_the_largest_numeric_id() {
    assert_eq!(next_relationship_id(["rId1", "rId3"]), Some(4));
    assert_eq!(next_relationship_id(["rId10", "rId2", "rId9"]), Some(11));
}

#[test]
fn relationship_id_ignores_non_numeric_ids() {
    assert_eq!(next_relationship_id(["R4a9c", "rIdX", "rId2"]), Some(3));
    assert_eq!(next_relationship_id(["hyperlink1"]), Some(1));
}

#[test]
fn relationship_id_space_can_run_out() {
    assert_eq!(next_relationship_id(["rId4294967294"]), Some(u32::MAX));
    assert_eq!(next_relationship_id(["rId1", "rId4294967295"]), None);
}

#[test]
fn relationship_id_recomputed_after_each_addition() {
    let mut ids = vec!["rId1".to_string(), "rId2".to_string()];
    for _ in 0..3 {
        let next = next_relationship_id(ids.iter().map(String::as_str)).unwrap();
        let id = format!("rId{next}");
        assert!(!ids.contains(&id));
        ids.push(id);
    }
    assert_eq!(ids.last().map(String::as_str), Some("rId5"));
}

#[test]
fn fragment_carries_extent_and_relationship() {
    let fragment = DrawingFragment::new("rId7", mm_to_emu(50.0), 3, "QR QR_1", "qr_QR_1.png").unwrap();
    let xml = fragment.to_xml();
    assert!(xml.starts_with("<w:drawing>"));
    assert!(xml.ends_with("</w:drawing>"));
    assert_eq!(xml.matches(r#"cx="1800000" cy="1800000""#).count(), 2);
    assert!(xml.contains(r#"r:embed="rId7""#));
    assert!(xml.contains(r#"<wp:docPr id="3" name="QR QR_1"/>"#));
}

#[test]
fn fragment_rejects_out_of_range_extents() {
    assert!(DrawingFragment::new("rId1", 0, 1, "x", "x.png").is_err());
    assert!(DrawingFragment::new("rId1", -5, 1, "x", "x.png").is_err());
    assert!(DrawingFragment::new("rId1", i64::MAX, 1, "x", "x.png").is_err());
    assert!(DrawingFragment::new("", 100, 1, "x", "x.png").is_err());
}

#[test]
fn fragment_follows_the_document_prefix() {
    let fragment = DrawingFragment::new("rId2", 100, 1, "QR", "qr.png").unwrap();
    let unprefixed = fragment.to_xml_with_prefix("");
    assert!(unprefixed.starts_with("<drawing>"));
    assert!(unprefixed.ends_with("</drawing>"));
    assert!(fragment.to_xml_with_prefix("x").starts_with("<x:drawing>"));
}
