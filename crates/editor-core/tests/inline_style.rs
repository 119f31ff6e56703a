use rich_editor_core::{
    Document, Editor, InlineStyle, LeafPath, PluginRegistry, Point, Selection, StyleSet,
};

fn editor_with_range(text: &str, start: usize, end: usize) -> Editor {
    let doc = Document::from_text(text);
    let selection = Selection {
        anchor: Point::new(LeafPath::new(0, 0), start),
        focus: Point::new(LeafPath::new(0, 0), end),
    };
    Editor::new(doc, selection, PluginRegistry::rich_utils())
}

fn leaves(editor: &Editor) -> Vec<(String, bool)> {
    editor.doc().blocks[0]
        .leaves
        .iter()
        .map(|l| (l.text.clone(), l.style.bold))
        .collect()
}

#[test]
fn toggle_bold_only_affects_selection_range() {
    let mut editor = editor_with_range("abcde", 1, 3);

    editor.toggle_inline_style(InlineStyle::Bold).unwrap();

    assert_eq!(
        leaves(&editor),
        vec![
            ("a".to_string(), false),
            ("bc".to_string(), true),
            ("de".to_string(), false),
        ]
    );
    assert!(editor.current_inline_style().has(InlineStyle::Bold));
    assert!(
        editor
            .run_query::<bool>("inline.has_style", Some(serde_json::json!({ "style": "BOLD" })))
            .unwrap()
    );
}

#[test]
fn toggling_twice_removes_the_style_and_merges_leaves() {
    let mut editor = editor_with_range("abcde", 1, 3);

    editor.toggle_inline_style(InlineStyle::Bold).unwrap();
    editor.toggle_inline_style(InlineStyle::Bold).unwrap();

    assert_eq!(leaves(&editor), vec![("abcde".to_string(), false)]);
    assert!(!editor.current_inline_style().has(InlineStyle::Bold));

    let (start, end) = editor.selection().ordered();
    assert_eq!(start, Point::new(LeafPath::new(0, 0), 1));
    assert_eq!(end, Point::new(LeafPath::new(0, 0), 3));
}

#[test]
fn range_membership_follows_the_first_selected_character() {
    let mut editor = editor_with_range("abcd", 0, 2);
    editor.toggle_inline_style(InlineStyle::Italic).unwrap();

    editor.set_selection(Selection {
        anchor: Point::new(LeafPath::new(0, 0), 1),
        focus: Point::new(LeafPath::new(0, 1), 2),
    });
    assert!(editor.current_inline_style().has(InlineStyle::Italic));

    editor.toggle_inline_style(InlineStyle::Italic).unwrap();
    let italic: Vec<bool> = editor.doc().blocks[0]
        .leaves
        .iter()
        .map(|l| l.style.italic)
        .collect();
    let texts: Vec<&str> = editor.doc().blocks[0]
        .leaves
        .iter()
        .map(|l| l.text.as_str())
        .collect();
    assert_eq!(texts, vec!["a", "bcd"]);
    assert_eq!(italic, vec![true, false]);
}

#[test]
fn caret_toggle_styles_the_next_typed_text() {
    let mut editor = Editor::from_text("ab");

    editor.toggle_inline_style(InlineStyle::Bold).unwrap();
    assert!(editor.current_inline_style().has(InlineStyle::Bold));
    assert_eq!(editor.plain_text(), "ab");

    editor
        .run_command("edit.insert_text", Some(serde_json::json!({ "text": "cd" })))
        .unwrap();

    assert_eq!(
        leaves(&editor),
        vec![("ab".to_string(), false), ("cd".to_string(), true)]
    );
    assert!(editor.current_inline_style().has(InlineStyle::Bold));
}

#[test]
fn abandoned_caret_toggle_leaves_no_empty_leaf_behind() {
    let mut editor = editor_with_range("ab", 1, 1);

    editor.toggle_inline_style(InlineStyle::Bold).unwrap();
    assert_eq!(editor.doc().blocks[0].leaves.len(), 3);

    editor.run_command("edit.move_right", None).unwrap();
    assert_eq!(leaves(&editor), vec![("ab".to_string(), false)]);
    assert_eq!(editor.selection().focus, Point::new(LeafPath::new(0, 0), 2));
    assert!(!editor.current_inline_style().has(InlineStyle::Bold));

    assert!(editor.undo());
    assert_eq!(leaves(&editor), vec![("ab".to_string(), false)]);
    assert!(!editor.can_undo());
}

#[test]
fn caret_toggle_in_empty_document_restyles_the_empty_leaf() {
    let mut editor = Editor::with_rich_utils();

    editor.toggle_inline_style(InlineStyle::Underline).unwrap();
    editor.toggle_inline_style(InlineStyle::Code).unwrap();

    assert_eq!(editor.doc().blocks[0].leaves.len(), 1);
    let expected: StyleSet = [InlineStyle::Underline, InlineStyle::Code]
        .into_iter()
        .collect();
    assert_eq!(editor.current_inline_style(), expected);
    assert_eq!(
        editor
            .run_query::<Vec<String>>("inline.current_style", None)
            .unwrap(),
        vec!["UNDERLINE".to_string(), "CODE".to_string()]
    );
}

#[test]
fn collapsed_caret_reports_the_style_before_it() {
    let mut editor = editor_with_range("abcd", 0, 2);
    editor.toggle_inline_style(InlineStyle::Strikethrough).unwrap();

    editor.set_selection(Selection::collapsed(Point::new(LeafPath::new(0, 0), 2)));
    assert!(editor.current_inline_style().has(InlineStyle::Strikethrough));

    editor.set_selection(Selection::collapsed(Point::new(LeafPath::new(0, 1), 1)));
    assert!(!editor.current_inline_style().has(InlineStyle::Strikethrough));
}
