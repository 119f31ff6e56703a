use rich_editor_core::{BlockType, Editor, EntityKind, Mutability};
use rich_editor_html::{
    IMAGE_PLACEHOLDER, ImportError, convert_from_html, export_html, html_to_document,
};

#[test]
fn paragraph_with_bold_text() {
    let raw = convert_from_html("<p>Hello <b>world</b></p>").unwrap();
    assert_eq!(raw.blocks.len(), 1);
    let block = &raw.blocks[0];
    assert_eq!(block.kind, "unstyled");
    assert_eq!(block.text, "Hello world");
    assert_eq!(block.inline_style_ranges.len(), 1);
    assert_eq!(block.inline_style_ranges[0].offset, 6);
    assert_eq!(block.inline_style_ranges[0].length, 5);
    assert_eq!(block.inline_style_ranges[0].style, "BOLD");
}

#[test]
fn nested_lists_keep_their_depth() {
    let doc = html_to_document(
        "<ul><li>one<ul><li>two</li></ul></li><li>three</li></ul><ol><li>four</li></ol>",
    )
    .unwrap();
    let shape: Vec<_> = doc
        .blocks
        .iter()
        .map(|b| (b.kind, b.depth, b.text()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (BlockType::UnorderedListItem, 0, "one".to_string()),
            (BlockType::UnorderedListItem, 1, "two".to_string()),
            (BlockType::UnorderedListItem, 0, "three".to_string()),
            (BlockType::OrderedListItem, 0, "four".to_string()),
        ]
    );
}

#[test]
fn headings_quotes_and_code_blocks() {
    let doc = html_to_document(
        "<h1>Title</h1><blockquote><p>quoted</p></blockquote><pre>let x = 1;\n  y</pre>",
    )
    .unwrap();
    let kinds: Vec<_> = doc.blocks.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockType::HeaderOne,
            BlockType::Blockquote,
            BlockType::CodeBlock
        ]
    );
    assert_eq!(doc.blocks[1].text(), "quoted");
    assert_eq!(doc.blocks[2].text(), "let x = 1;\n  y");
}

#[test]
fn whitespace_collapses_outside_pre() {
    let doc = html_to_document("<p>  a \n\t  b  </p>\n<div>loose   text</div>").unwrap();
    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(doc.blocks[0].text(), "a b");
    assert_eq!(doc.blocks[1].kind, BlockType::Unstyled);
    assert_eq!(doc.blocks[1].text(), "loose text");
}

#[test]
fn line_breaks_stay_inside_the_block() {
    let doc = html_to_document("<p>a<br>b</p>").unwrap();
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].text(), "a\nb");
}

#[test]
fn anchors_become_link_entities() {
    let raw = convert_from_html("<p>Go <a href=\"https://example.com\">here</a></p>").unwrap();
    let block = &raw.blocks[0];
    assert_eq!(block.text, "Go here");
    assert_eq!(block.entity_ranges.len(), 1);
    assert_eq!(block.entity_ranges[0].offset, 3);
    assert_eq!(block.entity_ranges[0].length, 4);
    let entity = &raw.entity_map[&block.entity_ranges[0].key.to_string()];
    assert_eq!(entity.kind, "LINK");
    assert_eq!(entity.data_str("url"), Some("https://example.com"));
}

#[test]
fn images_become_immutable_entities_over_a_placeholder() {
    let doc = html_to_document("<p><img src=\"x.png\" alt=\"pic\"></p>").unwrap();
    let leaf = &doc.blocks[0].leaves[0];
    assert_eq!(leaf.text, IMAGE_PLACEHOLDER);
    let entity = doc.entity(leaf.entity.unwrap()).unwrap();
    assert_eq!(entity.kind, EntityKind::Image);
    assert_eq!(entity.mutability, Mutability::Immutable);
    assert_eq!(entity.src(), Some("x.png"));
    assert_eq!(entity.alt(), Some("pic"));
}

#[test]
fn empty_input_yields_one_empty_block() {
    let doc = html_to_document("").unwrap();
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].kind, BlockType::Unstyled);
    assert!(doc.blocks[0].is_empty());
}

#[test]
fn scripts_and_styles_are_ignored() {
    let doc =
        html_to_document("<style>p { color: red }</style><p>text</p><script>alert(1)</script>")
            .unwrap();
    assert_eq!(doc.plain_text(), "text");
}

#[test]
fn deep_nesting_is_rejected() {
    let html = format!("{}x{}", "<span>".repeat(400), "</span>".repeat(400));
    assert!(matches!(
        html_to_document(&html),
        Err(ImportError::NestingTooDeep(_))
    ));
}

#[test]
fn exported_html_imports_back_to_the_same_text() {
    let mut editor = Editor::from_text("First line\nSecond & last");
    editor.toggle_block_type(BlockType::HeaderTwo).unwrap();

    let doc = html_to_document(&export_html(&editor)).unwrap();
    assert_eq!(doc.plain_text(), editor.plain_text());
    assert_eq!(doc.blocks[0].kind, BlockType::Unstyled);
    assert_eq!(doc.blocks[1].kind, BlockType::HeaderTwo);

    for text in [
        "a  b",
        "  indented",
        "trailing  ",
        "tab\there",
        "\tlead and trail\t",
        "mixed \t  runs\n  after break",
        "   ",
    ] {
        let editor = Editor::from_text(text);
        let doc = html_to_document(&export_html(&editor)).unwrap();
        assert_eq!(doc.plain_text(), text, "{text:?}");
    }
}

#[test]
fn non_breaking_spaces_import_as_plain_spaces() {
    let doc = html_to_document("<p>&nbsp;a&nbsp;&nbsp;b&nbsp;</p>").unwrap();
    assert_eq!(doc.plain_text(), " a  b ");
}

#[test]
fn pre_whitespace_spans_keep_their_text() {
    let doc =
        html_to_document("<p>a<span style=\"color: red; white-space: pre\">\t \t</span>b</p>")
            .unwrap();
    assert_eq!(doc.plain_text(), "a\t \tb");
}
