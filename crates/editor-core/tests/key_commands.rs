use rich_editor_core::{
    BlockType, Document, Editor, HandleValue, InlineStyle, KeyChord, LeafPath, PluginRegistry,
    Point, Selection, default_key_binding,
};

#[test]
fn default_bindings_map_chords_to_command_names() {
    assert_eq!(default_key_binding(&KeyChord::new("b").command()), Some("bold"));
    assert_eq!(default_key_binding(&KeyChord::new("i").command()), Some("italic"));
    assert_eq!(default_key_binding(&KeyChord::new("u").command()), Some("underline"));
    assert_eq!(default_key_binding(&KeyChord::new("j").command()), Some("code"));
    assert_eq!(
        default_key_binding(&KeyChord::new("x").command().shift()),
        Some("strikethrough")
    );
    assert_eq!(default_key_binding(&KeyChord::new("z").command()), Some("undo"));
    assert_eq!(default_key_binding(&KeyChord::new("z").command().shift()), Some("redo"));
    assert_eq!(default_key_binding(&KeyChord::new("backspace")), Some("backspace"));
    assert_eq!(default_key_binding(&KeyChord::new("delete")), Some("delete"));
    assert_eq!(default_key_binding(&KeyChord::new("enter")), Some("split-block"));
    assert_eq!(default_key_binding(&KeyChord::new("b")), None);
    assert_eq!(default_key_binding(&KeyChord::new("x").command()), None);
}

#[test]
fn style_key_commands_are_handled() {
    let mut editor = Editor::from_text("Hello");
    editor.set_selection(Selection {
        anchor: Point::new(LeafPath::new(0, 0), 0),
        focus: Point::new(LeafPath::new(0, 0), 5),
    });

    assert_eq!(editor.handle_key_command("bold"), HandleValue::Handled);
    assert!(editor.current_inline_style().has(InlineStyle::Bold));

    assert_eq!(editor.handle_key_command("strikethrough"), HandleValue::Handled);
    assert!(editor.current_inline_style().has(InlineStyle::Strikethrough));
}

#[test]
fn unknown_and_delete_commands_are_not_handled() {
    let mut editor = Editor::from_text("Hello");
    let version = editor.version();

    assert_eq!(editor.handle_key_command("delete"), HandleValue::NotHandled);
    assert_eq!(editor.handle_key_command("transpose-characters"), HandleValue::NotHandled);
    assert_eq!(editor.version(), version);
    assert_eq!(HandleValue::NotHandled.as_str(), "not-handled");
}

#[test]
fn backspace_inside_text_is_left_to_default_editing() {
    let mut editor = Editor::from_text("Hello");
    assert_eq!(editor.handle_key_command("backspace"), HandleValue::NotHandled);
    assert_eq!(editor.plain_text(), "Hello");
}

#[test]
fn backspace_at_start_of_styled_block_resets_it() {
    let mut doc = Document::from_text("Title");
    doc.blocks[0].kind = BlockType::HeaderOne;
    let selection = Selection::collapsed(doc.start_point());
    let mut editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    assert_eq!(editor.handle_key_command("backspace"), HandleValue::Handled);
    assert_eq!(editor.current_block_type(), BlockType::Unstyled);
    assert_eq!(editor.plain_text(), "Title");

    assert_eq!(editor.handle_key_command("backspace"), HandleValue::NotHandled);
}

#[test]
fn backspace_keeps_code_block_after_non_empty_code_block() {
    let mut doc = Document::from_text("let a = 1;\nlet b = 2;");
    doc.blocks[0].kind = BlockType::CodeBlock;
    doc.blocks[1].kind = BlockType::CodeBlock;
    let selection = Selection::collapsed(Point::new(LeafPath::new(1, 0), 0));
    let mut editor = Editor::new(doc, selection, PluginRegistry::rich_utils());

    assert_eq!(editor.handle_key_command("backspace"), HandleValue::NotHandled);
    assert_eq!(editor.doc().blocks[1].kind, BlockType::CodeBlock);
}

#[test]
fn undo_key_command_is_handled_only_with_history() {
    let mut editor = Editor::from_text("Hello");
    assert_eq!(editor.handle_key_command("undo"), HandleValue::NotHandled);

    editor.toggle_block_type(BlockType::Blockquote).unwrap();
    assert_eq!(editor.handle_key_command("undo"), HandleValue::Handled);
    assert_eq!(editor.current_block_type(), BlockType::Unstyled);
    assert_eq!(editor.handle_key_command("redo"), HandleValue::Handled);
    assert_eq!(editor.current_block_type(), BlockType::Blockquote);
}

#[test]
fn core_registry_has_no_style_key_commands() {
    let doc = Document::from_text("Hello");
    let selection = Selection::collapsed(doc.end_point());
    let mut editor = Editor::new(doc, selection, PluginRegistry::core());

    assert_eq!(editor.handle_key_command("bold"), HandleValue::NotHandled);
}
