use rich_editor_core::{
    BlockType, Document, Editor, InlineStyle, LeafPath, PluginRegistry, Point, RawContent,
    RawError, Selection,
};

fn sample_raw() -> RawContent {
    RawContent::from_json_str(
        r#"{
            "blocks": [
                {
                    "key": "a1b2c",
                    "text": "Hi 😀 there",
                    "type": "header-two",
                    "depth": 0,
                    "inlineStyleRanges": [
                        { "offset": 3, "length": 2, "style": "BOLD" },
                        { "offset": 6, "length": 5, "style": "ITALIC" }
                    ],
                    "entityRanges": [{ "offset": 6, "length": 5, "key": 0 }],
                    "data": {}
                },
                {
                    "key": "d3e4f",
                    "text": "item",
                    "type": "ordered-list-item",
                    "depth": 1,
                    "inlineStyleRanges": [],
                    "entityRanges": [],
                    "data": {}
                }
            ],
            "entityMap": {
                "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": "https://example.com" } }
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn raw_form_survives_a_document_round_trip() {
    let raw = sample_raw();

    let doc = Document::from_raw(&raw).unwrap();
    assert_eq!(doc.blocks[0].kind, BlockType::HeaderTwo);
    assert_eq!(doc.blocks[1].depth, 1);
    assert_eq!(doc.plain_text(), "Hi 😀 there\nitem");

    assert_eq!(doc.to_raw(), raw);
}

#[test]
fn offsets_count_utf16_code_units() {
    let doc = Document::from_raw(&sample_raw()).unwrap();
    let leaves: Vec<(&str, bool)> = doc.blocks[0]
        .leaves
        .iter()
        .map(|l| (l.text.as_str(), l.style.has(InlineStyle::Bold)))
        .collect();
    assert_eq!(
        leaves,
        vec![("Hi ", false), ("😀", true), (" ", false), ("there", false)]
    );
}

#[test]
fn editor_output_serializes_with_draft_field_names() {
    let mut editor = Editor::from_text("Hello");
    editor.set_selection(Selection {
        anchor: Point::new(LeafPath::new(0, 0), 0),
        focus: Point::new(LeafPath::new(0, 0), 5),
    });
    editor.toggle_inline_style(InlineStyle::Underline).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&editor.to_raw().to_json_pretty().unwrap()).unwrap();
    let block = &json["blocks"][0];
    assert_eq!(block["type"], "unstyled");
    assert_eq!(block["text"], "Hello");
    assert_eq!(block["inlineStyleRanges"][0]["style"], "UNDERLINE");
    assert_eq!(block["inlineStyleRanges"][0]["length"], 5);
    assert!(json["entityMap"].as_object().unwrap().is_empty());
}

#[test]
fn unknown_block_types_and_styles_degrade() {
    let raw = RawContent::from_json_str(
        r#"{
            "blocks": [{
                "key": "x",
                "text": "media",
                "type": "atomic",
                "inlineStyleRanges": [{ "offset": 0, "length": 5, "style": "HIGHLIGHT" }],
                "entityRanges": []
            }],
            "entityMap": {}
        }"#,
    )
    .unwrap();

    let doc = Document::from_raw(&raw).unwrap();
    assert_eq!(doc.blocks[0].kind, BlockType::Unstyled);
    assert!(doc.blocks[0].leaves[0].style.is_empty());
}

#[test]
fn unknown_entity_types_are_errors() {
    let mut raw = sample_raw();
    raw.entity_map.get_mut("0").unwrap().kind = "MENTION".to_string();

    let err = Document::from_raw(&raw).unwrap_err();
    assert!(matches!(err, RawError::UnknownEntityType(kind) if kind == "MENTION"));
}

#[test]
fn ranges_past_the_text_are_errors() {
    let mut raw = sample_raw();
    raw.blocks[1].inline_style_ranges.push(rich_editor_core::RawInlineStyleRange {
        offset: 2,
        length: 10,
        style: "BOLD".to_string(),
    });

    assert!(matches!(
        Document::from_raw(&raw),
        Err(RawError::RangeOutOfBounds { offset: 2, length: 10, .. })
    ));
}

#[test]
fn overflowing_ranges_are_errors() {
    let style_json = r#"{
        "blocks": [{
            "key": "a", "text": "ab", "type": "unstyled", "depth": 0,
            "inlineStyleRanges": [{"offset": 18446744073709551615, "length": 2, "style": "BOLD"}],
            "entityRanges": []
        }],
        "entityMap": {}
    }"#;
    let raw = RawContent::from_json_str(style_json).unwrap();
    assert!(matches!(
        Document::from_raw(&raw),
        Err(RawError::RangeOutOfBounds { offset: usize::MAX, length: 2, .. })
    ));

    let mut raw = sample_raw();
    raw.blocks[0].entity_ranges[0].offset = usize::MAX;
    assert!(matches!(
        Document::from_raw(&raw),
        Err(RawError::RangeOutOfBounds { offset: usize::MAX, .. })
    ));
}

#[test]
fn missing_entity_references_are_errors() {
    let mut raw = sample_raw();
    raw.entity_map.clear();

    assert!(matches!(
        Document::from_raw(&raw),
        Err(RawError::MissingEntity { key: 0, .. })
    ));
}

#[test]
fn duplicate_and_empty_keys_are_regenerated() {
    let mut raw = sample_raw();
    raw.blocks[1].key = raw.blocks[0].key.clone();
    raw.blocks.push(rich_editor_core::RawBlock {
        text: "tail".to_string(),
        kind: "unstyled".to_string(),
        ..Default::default()
    });

    let doc = Document::from_raw(&raw).unwrap();
    let keys: std::collections::HashSet<_> = doc.blocks.iter().map(|b| b.key.clone()).collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(doc.blocks[0].key.as_str(), "a1b2c");
}

#[test]
fn empty_raw_content_yields_one_empty_block() {
    let doc = Document::from_raw(&RawContent::default()).unwrap();
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.plain_text(), "");

    let editor = Editor::new(
        doc.clone(),
        Selection::collapsed(doc.start_point()),
        PluginRegistry::rich_utils(),
    );
    assert_eq!(editor.to_raw().blocks[0].kind, "unstyled");
}

#[test]
fn invalid_json_is_reported() {
    assert!(matches!(
        RawContent::from_json_str("{ not json"),
        Err(RawError::Json(_))
    ));
}
