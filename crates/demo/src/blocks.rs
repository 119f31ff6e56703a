use gpui::prelude::FluentBuilder as _;
use gpui::{
    AnyElement, FontStyle, FontWeight, Hsla, IntoElement, ParentElement, StrikethroughStyle,
    Styled, StyledText, TextRun, TextStyle, UnderlineStyle, div, px,
};
use gpui_component::Theme;
use rich_editor_core::{BlockType, ContentBlock, Document, TextLeaf};

const CARET: &str = "\u{258F}";

/// Colors and fonts the document view draws with.
pub struct Palette {
    pub text: TextStyle,
    pub link: Hsla,
    pub caret: Hsla,
    pub muted: Hsla,
    pub code_bg: Hsla,
    pub mono_font: gpui::SharedString,
}

impl Palette {
    pub fn new(text: TextStyle, theme: &Theme) -> Self {
        let mut text = text;
        text.color = theme.foreground;
        Self {
            text,
            link: theme.blue,
            caret: theme.primary,
            muted: theme.muted_foreground,
            code_bg: theme.muted,
            mono_font: theme.mono_font_family.clone(),
        }
    }

    fn leaf_style(&self, doc: &Document, leaf: &TextLeaf) -> TextStyle {
        let mut style = self.text.clone();
        if leaf.style.bold {
            style.font_weight = FontWeight::BOLD;
        }
        if leaf.style.italic {
            style.font_style = FontStyle::Italic;
        }
        if leaf.style.code {
            style.font_family = self.mono_font.clone();
            style.background_color = Some(self.code_bg);
        }
        if leaf.style.underline {
            style.underline = Some(UnderlineStyle {
                thickness: px(1.),
                color: None,
                wavy: false,
            });
        }
        if leaf.style.strikethrough {
            style.strikethrough = Some(StrikethroughStyle {
                thickness: px(1.),
                ..Default::default()
            });
        }
        if leaf.entity.and_then(|key| doc.entity(key)).is_some() {
            style.color = self.link;
            style.underline = Some(UnderlineStyle {
                thickness: px(1.),
                color: Some(self.link),
                wavy: false,
            });
        }
        style
    }
}

/// Renders every block. `caret` is the block index and byte offset of the
/// focus when the editor has focus.
pub fn render_document(
    doc: &Document,
    caret: Option<(usize, usize)>,
    palette: &Palette,
) -> Vec<AnyElement> {
    let mut ordinals: Vec<usize> = Vec::new();
    doc.blocks
        .iter()
        .enumerate()
        .map(|(ix, block)| {
            let marker = list_marker(block, &mut ordinals);
            let caret = caret.and_then(|(b, offset)| (b == ix).then_some(offset));
            render_block(doc, block, marker, caret, palette)
        })
        .collect()
}

fn list_marker(block: &ContentBlock, ordinals: &mut Vec<usize>) -> Option<String> {
    let depth = usize::from(block.depth);
    match block.kind {
        BlockType::OrderedListItem => {
            ordinals.resize(depth + 1, 0);
            ordinals[depth] += 1;
            Some(format!("{}.", ordinals[depth]))
        }
        BlockType::UnorderedListItem => {
            ordinals.truncate(depth);
            Some(if depth % 2 == 0 { "•" } else { "◦" }.to_string())
        }
        _ => {
            ordinals.clear();
            None
        }
    }
}

fn render_block(
    doc: &Document,
    block: &ContentBlock,
    marker: Option<String>,
    caret: Option<usize>,
    palette: &Palette,
) -> AnyElement {
    let mut text = String::new();
    let mut runs: Vec<TextRun> = Vec::new();
    for leaf in block.leaves.iter().filter(|leaf| !leaf.is_empty()) {
        if let Some(at) = caret.filter(|at| *at >= text.len() && *at < text.len() + leaf.text.len())
        {
            let split = at - text.len();
            let style = palette.leaf_style(doc, leaf);
            push_run(&mut text, &mut runs, &leaf.text[..split], &style);
            push_caret(&mut text, &mut runs, palette);
            push_run(&mut text, &mut runs, &leaf.text[split..], &style);
        } else {
            push_run(&mut text, &mut runs, &leaf.text, &palette.leaf_style(doc, leaf));
        }
    }
    if caret.is_some_and(|at| at >= block.len()) {
        push_caret(&mut text, &mut runs, palette);
    }
    if text.is_empty() {
        // Keep empty blocks one line tall.
        push_run(&mut text, &mut runs, " ", &palette.text);
    }

    let body = div().flex_1().child(StyledText::new(text).with_runs(runs));
    let indent = px(24. * f32::from(block.depth));

    let row = div().flex().flex_row().w_full().py(px(2.));
    let row = match block.kind {
        BlockType::HeaderOne => row.text_size(px(30.)).font_weight(FontWeight::BOLD),
        BlockType::HeaderTwo => row.text_size(px(24.)).font_weight(FontWeight::BOLD),
        BlockType::HeaderThree => row.text_size(px(20.)).font_weight(FontWeight::BOLD),
        BlockType::HeaderFour => row.text_size(px(18.)).font_weight(FontWeight::SEMIBOLD),
        BlockType::HeaderFive => row.text_size(px(16.)).font_weight(FontWeight::SEMIBOLD),
        BlockType::HeaderSix => row.text_size(px(14.)).font_weight(FontWeight::SEMIBOLD),
        BlockType::Blockquote => row
            .border_l_2()
            .border_color(palette.muted)
            .pl(px(12.))
            .text_color(palette.muted),
        BlockType::CodeBlock => row
            .bg(palette.code_bg)
            .rounded(px(4.))
            .px(px(8.))
            .font_family(palette.mono_font.clone()),
        BlockType::Unstyled | BlockType::UnorderedListItem | BlockType::OrderedListItem => row,
    };
    row.when_some(marker, |this, marker| {
        this.pl(indent + px(8.))
            .child(div().w(px(24.)).text_color(palette.muted).child(marker))
    })
    .child(body)
    .into_any_element()
}

fn push_run(text: &mut String, runs: &mut Vec<TextRun>, chunk: &str, style: &TextStyle) {
    if chunk.is_empty() {
        return;
    }
    text.push_str(chunk);
    runs.push(style.to_run(chunk.len()));
}

fn push_caret(text: &mut String, runs: &mut Vec<TextRun>, palette: &Palette) {
    let mut style = palette.text.clone();
    style.color = palette.caret;
    push_run(text, runs, CARET, &style);
}
