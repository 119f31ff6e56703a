use rich_editor_core::{
    BlockType, Document, Editor, LeafPath, PluginRegistry, Point, Selection,
};

fn editor_at(text: &str, block: usize, offset: usize) -> Editor {
    let doc = Document::from_text(text);
    let selection = Selection::collapsed(Point::new(LeafPath::new(block, 0), offset));
    Editor::new(doc, selection, PluginRegistry::rich_utils())
}

fn insert(editor: &mut Editor, text: &str) {
    editor
        .run_command("edit.insert_text", Some(serde_json::json!({ "text": text })))
        .unwrap();
}

fn block_texts(editor: &Editor) -> Vec<String> {
    editor.doc().blocks.iter().map(|b| b.text()).collect()
}

#[test]
fn typing_into_an_empty_document() {
    let mut editor = Editor::with_rich_utils();

    insert(&mut editor, "Hi");
    insert(&mut editor, "!");

    assert_eq!(editor.plain_text(), "Hi!");
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(LeafPath::new(0, 0), 3))
    );
}

#[test]
fn insert_replaces_a_range_across_blocks() {
    let mut editor = editor_at("one\ntwo\nthree", 0, 1);
    editor.set_selection(Selection {
        anchor: Point::new(LeafPath::new(0, 0), 1),
        focus: Point::new(LeafPath::new(2, 0), 2),
    });

    insert(&mut editor, "X");

    assert_eq!(block_texts(&editor), vec!["oXree".to_string()]);
}

#[test]
fn split_block_moves_the_tail_into_a_new_block() {
    let mut editor = editor_at("HelloWorld", 0, 5);

    editor.run_command("edit.split_block", None).unwrap();

    assert_eq!(block_texts(&editor), vec!["Hello".to_string(), "World".to_string()]);
    assert_ne!(editor.doc().blocks[0].key, editor.doc().blocks[1].key);
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(LeafPath::new(1, 0), 0))
    );
}

#[test]
fn backspace_at_block_start_merges_with_previous_block() {
    let mut editor = editor_at("HelloWorld", 0, 5);
    editor.run_command("edit.split_block", None).unwrap();

    editor.run_command("edit.backspace", None).unwrap();

    assert_eq!(block_texts(&editor), vec!["HelloWorld".to_string()]);
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(LeafPath::new(0, 0), 5))
    );
}

#[test]
fn backspace_and_delete_remove_single_characters() {
    let mut editor = editor_at("naïve", 0, 4);

    editor.run_command("edit.backspace", None).unwrap();
    assert_eq!(editor.plain_text(), "nave");

    editor.run_command("edit.delete", None).unwrap();
    assert_eq!(editor.plain_text(), "nae");
}

#[test]
fn delete_at_block_end_joins_the_next_block() {
    let mut editor = editor_at("ab\ncd", 0, 2);

    editor.run_command("edit.delete", None).unwrap();

    assert_eq!(block_texts(&editor), vec!["abcd".to_string()]);
}

#[test]
fn deleting_at_document_edges_is_a_no_op() {
    let mut editor = editor_at("ab", 0, 0);
    let version = editor.version();
    editor.run_command("edit.backspace", None).unwrap();
    assert_eq!(editor.version(), version);

    let mut editor = editor_at("ab", 0, 2);
    let version = editor.version();
    editor.run_command("edit.delete", None).unwrap();
    assert_eq!(editor.version(), version);
}

#[test]
fn enter_at_end_of_heading_starts_an_unstyled_block() {
    let mut doc = Document::from_text("Title");
    doc.blocks[0].kind = BlockType::HeaderOne;
    let selection = Selection::collapsed(doc.end_point());
    let mut editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    editor.run_command("edit.split_block", None).unwrap();

    assert_eq!(editor.doc().blocks[0].kind, BlockType::HeaderOne);
    assert_eq!(editor.doc().blocks[1].kind, BlockType::Unstyled);
}

#[test]
fn enter_in_list_item_continues_the_list() {
    let mut doc = Document::from_text("first");
    doc.blocks[0].kind = BlockType::UnorderedListItem;
    doc.blocks[0].depth = 1;
    let selection = Selection::collapsed(doc.end_point());
    let mut editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    editor.run_command("edit.split_block", None).unwrap();
    assert_eq!(editor.doc().blocks.len(), 2);
    assert_eq!(editor.doc().blocks[1].kind, BlockType::UnorderedListItem);
    assert_eq!(editor.doc().blocks[1].depth, 1);

    editor.run_command("edit.split_block", None).unwrap();
    assert_eq!(editor.doc().blocks.len(), 2);
    assert_eq!(editor.doc().blocks[1].kind, BlockType::Unstyled);
    assert_eq!(editor.doc().blocks[1].depth, 0);
}

#[test]
fn arrows_move_across_block_boundaries() {
    let mut editor = editor_at("ab\ncd", 1, 0);

    editor.run_command("edit.move_left", None).unwrap();
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(LeafPath::new(0, 0), 2))
    );

    editor.run_command("edit.move_right", None).unwrap();
    editor.run_command("edit.move_right", None).unwrap();
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(LeafPath::new(1, 0), 1))
    );

    editor
        .run_command("edit.move_left", Some(serde_json::json!({ "extend": true })))
        .unwrap();
    assert_eq!(editor.selection().anchor, Point::new(LeafPath::new(1, 0), 1));
    assert_eq!(editor.selection().focus, Point::new(LeafPath::new(1, 0), 0));
}

#[test]
fn moving_does_not_touch_history() {
    let mut editor = editor_at("ab", 0, 1);
    editor.run_command("edit.move_left", None).unwrap();
    assert!(!editor.can_undo());
}
