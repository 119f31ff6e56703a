use rich_editor_core::{
    BlockKey, BlockType, ContentBlock, Document, Editor, LeafPath, PluginRegistry, Point,
    Selection, TextLeaf,
};

fn editor_with_blocks(blocks: &[(&str, BlockType)], selection: Selection) -> Editor {
    let doc = Document {
        blocks: blocks
            .iter()
            .enumerate()
            .map(|(ix, (text, kind))| {
                ContentBlock::new(BlockKey(format!("b{ix}")), *kind, vec![TextLeaf::plain(*text)])
            })
            .collect(),
        ..Default::default()
    };
    Editor::new(doc, selection, PluginRegistry::rich_utils())
}

fn kinds(editor: &Editor) -> Vec<BlockType> {
    editor.doc().blocks.iter().map(|b| b.kind).collect()
}

#[test]
fn toggling_a_block_type_twice_restores_the_original() {
    let mut editor = Editor::from_text("Hello");

    editor.toggle_block_type(BlockType::HeaderOne).unwrap();
    assert_eq!(editor.current_block_type(), BlockType::HeaderOne);
    assert_eq!(
        editor
            .run_query::<String>("block.current_type", None)
            .unwrap(),
        "header-one"
    );

    editor.toggle_block_type(BlockType::HeaderOne).unwrap();
    assert_eq!(editor.current_block_type(), BlockType::Unstyled);
    assert_eq!(editor.plain_text(), "Hello");
}

#[test]
fn toggle_applies_to_every_selected_block() {
    let mut editor = editor_with_blocks(
        &[
            ("one", BlockType::Unstyled),
            ("two", BlockType::Blockquote),
            ("three", BlockType::Unstyled),
        ],
        Selection {
            anchor: Point::new(LeafPath::new(0, 0), 1),
            focus: Point::new(LeafPath::new(2, 0), 2),
        },
    );

    editor
        .run_command(
            "block.toggle_type",
            Some(serde_json::json!({ "type": "ordered-list-item" })),
        )
        .unwrap();

    assert_eq!(
        kinds(&editor),
        vec![
            BlockType::OrderedListItem,
            BlockType::OrderedListItem,
            BlockType::OrderedListItem,
        ]
    );
}

#[test]
fn selection_ending_at_block_start_excludes_that_block() {
    let mut editor = editor_with_blocks(
        &[("one", BlockType::Unstyled), ("two", BlockType::Unstyled)],
        Selection {
            anchor: Point::new(LeafPath::new(0, 0), 0),
            focus: Point::new(LeafPath::new(1, 0), 0),
        },
    );

    editor.toggle_block_type(BlockType::UnorderedListItem).unwrap();

    assert_eq!(
        kinds(&editor),
        vec![BlockType::UnorderedListItem, BlockType::Unstyled]
    );
}

#[test]
fn start_block_type_decides_between_set_and_reset() {
    let mut editor = editor_with_blocks(
        &[("one", BlockType::HeaderTwo), ("two", BlockType::Unstyled)],
        Selection {
            anchor: Point::new(LeafPath::new(0, 0), 0),
            focus: Point::new(LeafPath::new(1, 0), 3),
        },
    );

    editor.toggle_block_type(BlockType::HeaderTwo).unwrap();

    assert_eq!(kinds(&editor), vec![BlockType::Unstyled, BlockType::Unstyled]);
}

#[test]
fn leaving_a_list_resets_depth() {
    let mut doc = Document::from_text("item");
    doc.blocks[0].kind = BlockType::UnorderedListItem;
    doc.blocks[0].depth = 2;
    let selection = Selection::collapsed(doc.end_point());
    let mut editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    editor.toggle_block_type(BlockType::UnorderedListItem).unwrap();

    assert_eq!(editor.doc().blocks[0].kind, BlockType::Unstyled);
    assert_eq!(editor.doc().blocks[0].depth, 0);
}

#[test]
fn depth_is_clamped_by_normalization() {
    let mut doc = Document::from_text("deep\nflat");
    doc.blocks[0].kind = BlockType::OrderedListItem;
    doc.blocks[0].depth = 9;
    doc.blocks[1].depth = 3;
    let selection = Selection::collapsed(doc.start_point());
    let editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    assert_eq!(editor.doc().blocks[0].depth, rich_editor_core::MAX_LIST_DEPTH);
    assert_eq!(editor.doc().blocks[1].depth, 0);
}

#[test]
fn unknown_block_type_is_rejected() {
    let mut editor = Editor::from_text("Hello");
    let err = editor
        .run_command(
            "block.toggle_type",
            Some(serde_json::json!({ "type": "atomic" })),
        )
        .unwrap_err();
    assert!(err.message().contains("atomic"));
    assert_eq!(editor.version(), 0);
}
