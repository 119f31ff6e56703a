use rich_editor_core::{
    BLOCK_TYPES, BlockType, Editor, INLINE_STYLES, InlineStyle, LeafPath, Point, Selection,
    block_style_controls, inline_style_controls,
};

#[test]
fn descriptor_tables_match_the_toolbar() {
    let labels: Vec<&str> = BLOCK_TYPES.iter().map(|d| d.label).collect();
    assert_eq!(
        labels,
        vec!["H1", "H2", "H3", "H4", "H5", "H6", "Blockquote", "UL", "OL"]
    );

    let labels: Vec<(&str, InlineStyle)> =
        INLINE_STYLES.iter().map(|d| (d.label, d.style)).collect();
    assert_eq!(
        labels,
        vec![
            ("Bold", InlineStyle::Bold),
            ("Italic", InlineStyle::Italic),
            ("Underline", InlineStyle::Underline),
            ("Monospace", InlineStyle::Code),
        ]
    );
}

#[test]
fn block_controls_mark_the_start_block_type_active() {
    let mut editor = Editor::from_text("Hello");
    assert!(block_style_controls(&editor).iter().all(|c| !c.active));

    editor.toggle_block_type(BlockType::OrderedListItem).unwrap();

    let active: Vec<&str> = block_style_controls(&editor)
        .into_iter()
        .filter(|c| c.active)
        .map(|c| c.label)
        .collect();
    assert_eq!(active, vec!["OL"]);
}

#[test]
fn inline_controls_follow_the_current_style_set() {
    let mut editor = Editor::from_text("Hello");
    editor.set_selection(Selection {
        anchor: Point::new(LeafPath::new(0, 0), 0),
        focus: Point::new(LeafPath::new(0, 0), 5),
    });
    editor.toggle_inline_style(InlineStyle::Bold).unwrap();
    editor.toggle_inline_style(InlineStyle::Code).unwrap();

    let active: Vec<&str> = inline_style_controls(&editor)
        .into_iter()
        .filter(|c| c.active)
        .map(|c| c.label)
        .collect();
    assert_eq!(active, vec!["Bold", "Monospace"]);
}
