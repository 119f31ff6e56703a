use serde::{Deserialize, Serialize};

use rich_editor_core::{
    BlockType, Editor, EntityKind, InlineStyle, RawBlock, RawContent, RawEntity, StyleSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagConfig {
    pub trigger: char,
    pub separator: char,
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            trigger: '#',
            separator: ' ',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Turns `#tag` words into hashtag anchors when set.
    #[serde(default)]
    pub hashtag: Option<HashtagConfig>,
    /// Adds `dir="auto"` to every block element.
    #[serde(default)]
    pub directional: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            hashtag: Some(HashtagConfig::default()),
            directional: true,
        }
    }
}

/// Renders an entity span. `text` is the already rendered markup of the
/// span. Returning `None` falls back to the built-in markup.
pub trait EntityRenderer {
    fn render(&self, entity: &RawEntity, text: &str) -> Option<String>;
}

/// Built-in markup: anchors keep the span text, images carry size styling.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEntityRenderer;

impl EntityRenderer for DefaultEntityRenderer {
    fn render(&self, entity: &RawEntity, text: &str) -> Option<String> {
        default_entity_markup(entity, text)
    }
}

/// Anchors show their URL as the link text and images drop the size
/// styling.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEntityRenderer;

impl EntityRenderer for UrlEntityRenderer {
    fn render(&self, entity: &RawEntity, _text: &str) -> Option<String> {
        match EntityKind::parse(&entity.kind)? {
            EntityKind::Link => {
                let url = attr(entity.data_str("url")?);
                Some(format!("<a href=\"{url}\">{url}</a>"))
            }
            EntityKind::Image => {
                let src = attr(entity.data_str("src")?);
                let alt = attr(entity.data_str("alt").unwrap_or_default());
                Some(format!("<img src=\"{src}\" alt=\"{alt}\"/>"))
            }
        }
    }
}

fn attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

fn default_entity_markup(entity: &RawEntity, text: &str) -> Option<String> {
    match EntityKind::parse(&entity.kind)? {
        EntityKind::Link => {
            let url = attr(entity.data_str("url")?);
            let target = attr(entity.data_str("targetOption").unwrap_or("_self"));
            Some(format!("<a href=\"{url}\" target=\"{target}\">{text}</a>"))
        }
        EntityKind::Image => {
            let src = attr(entity.data_str("src")?);
            let alt = attr(entity.data_str("alt").unwrap_or_default());
            let height = attr(entity.data_str("height").unwrap_or("auto"));
            let width = attr(entity.data_str("width").unwrap_or("auto"));
            let img = format!(
                "<img src=\"{src}\" alt=\"{alt}\" style=\"height: {height};width: {width}\"/>"
            );
            match entity.data_str("alignment").filter(|a| !a.is_empty()) {
                Some(alignment) => Some(format!(
                    "<div style=\"text-align:{};\">{img}</div>",
                    attr(alignment)
                )),
                None => Some(img),
            }
        }
    }
}

/// Renders the whole editor content with the default options and URL-style
/// entities.
pub fn export_html(editor: &Editor) -> String {
    let html = draft_to_html(&editor.to_raw(), &ExportOptions::default(), &UrlEntityRenderer);
    log::debug!("exported HTML:\n{html}");
    html
}

pub fn draft_to_html(
    content: &RawContent,
    options: &ExportOptions,
    renderer: &dyn EntityRenderer,
) -> String {
    let cx = RenderContext {
        content,
        options,
        renderer,
    };

    let mut html = String::new();
    let mut list_blocks: Vec<&RawBlock> = Vec::new();
    for block in &content.blocks {
        if is_list(&block.kind) {
            list_blocks.push(block);
            continue;
        }
        if !list_blocks.is_empty() {
            html.push_str(&cx.list_markup(&list_blocks));
            list_blocks.clear();
        }
        html.push_str(&cx.block_markup(block));
    }
    if !list_blocks.is_empty() {
        html.push_str(&cx.list_markup(&list_blocks));
    }
    html
}

fn is_list(kind: &str) -> bool {
    BlockType::parse(kind).is_some_and(BlockType::is_list)
}

fn block_tag(kind: &str) -> &'static str {
    match BlockType::parse(kind).unwrap_or_default() {
        BlockType::Unstyled => "p",
        BlockType::HeaderOne => "h1",
        BlockType::HeaderTwo => "h2",
        BlockType::HeaderThree => "h3",
        BlockType::HeaderFour => "h4",
        BlockType::HeaderFive => "h5",
        BlockType::HeaderSix => "h6",
        BlockType::Blockquote => "blockquote",
        BlockType::CodeBlock => "pre",
        BlockType::UnorderedListItem => "ul",
        BlockType::OrderedListItem => "ol",
    }
}

struct RenderContext<'a> {
    content: &'a RawContent,
    options: &'a ExportOptions,
    renderer: &'a dyn EntityRenderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Plain,
    Entity(u32),
    Hashtag,
}

/// A span of block text in UTF-16 units.
#[derive(Debug, Clone, Copy)]
struct Section {
    start: usize,
    end: usize,
    kind: SectionKind,
}

/// Block text indexed by UTF-16 unit, with the style in effect on each char.
struct BlockChars {
    chars: Vec<(usize, char)>,
    units: usize,
    styles: Vec<StyleSet>,
    /// Spaces that would collapse or be trimmed when the HTML is read back.
    hard_spaces: Vec<bool>,
}

impl BlockChars {
    fn new(block: &RawBlock) -> Self {
        let mut chars = Vec::new();
        let mut units = 0usize;
        for ch in block.text.chars() {
            chars.push((units, ch));
            units += ch.len_utf16();
        }

        let mut styles = vec![StyleSet::default(); units];
        for range in &block.inline_style_ranges {
            let Some(style) = InlineStyle::parse(&range.style) else {
                continue;
            };
            let start = range.offset.min(units);
            let end = range.offset.saturating_add(range.length).min(units);
            for set in &mut styles[start..end] {
                set.set(style, true);
            }
        }

        let hard_spaces = hard_spaces(&chars);
        Self {
            chars,
            units,
            styles,
            hard_spaces,
        }
    }

    fn style_at(&self, unit: usize) -> StyleSet {
        self.styles.get(unit).copied().unwrap_or_default()
    }

    /// Escaped text of a run with whitespace written so it survives parsing.
    fn markup(&self, start: usize, end: usize) -> String {
        let mut html = String::new();
        let mut buf = [0u8; 4];
        for (ix, (_, ch)) in self
            .chars
            .iter()
            .enumerate()
            .filter(|(_, (unit, _))| *unit >= start && *unit < end)
        {
            match ch {
                ' ' if self.hard_spaces[ix] => html.push_str("&nbsp;"),
                '\n' => html.push_str("<br>"),
                '\t' => html.push_str("<span style=\"white-space:pre\">\t</span>"),
                ch => html.push_str(&html_escape::encode_text(ch.encode_utf8(&mut buf))),
            }
        }
        html
    }
}

/// Leading and trailing spaces of a block, and every space that follows
/// other whitespace, are written as `&nbsp;`.
fn hard_spaces(chars: &[(usize, char)]) -> Vec<bool> {
    let first = chars.iter().position(|(_, ch)| *ch != ' ');
    let last = chars.iter().rposition(|(_, ch)| *ch != ' ');
    chars
        .iter()
        .enumerate()
        .map(|(ix, (_, ch))| {
            if *ch != ' ' {
                return false;
            }
            match (first, last) {
                (Some(first), Some(last)) if ix > first && ix < last => {
                    matches!(chars[ix - 1].1, ' ' | '\t' | '\n')
                }
                _ => true,
            }
        })
        .collect()
}

impl RenderContext<'_> {
    fn dir(&self) -> &'static str {
        if self.options.directional {
            " dir=\"auto\""
        } else {
            ""
        }
    }

    fn block_markup(&self, block: &RawBlock) -> String {
        let tag = block_tag(&block.kind);
        format!(
            "<{tag}{}>{}</{tag}>\n",
            self.dir(),
            self.block_inner_markup(block)
        )
    }

    /// Groups consecutive list items into `ul`/`ol` elements. Deeper items
    /// are collected and rendered as a nested list after the current item.
    fn list_markup(&self, blocks: &[&RawBlock]) -> String {
        let mut html = String::new();
        let mut nested: Vec<&RawBlock> = Vec::new();
        let mut previous: Option<&RawBlock> = None;

        for &block in blocks {
            let mut is_nested = false;
            match previous {
                None => html.push_str(&format!("<{}>\n", block_tag(&block.kind))),
                Some(prev) if prev.kind != block.kind => {
                    if !nested.is_empty() {
                        html.push_str(&self.list_markup(&nested));
                        nested.clear();
                    }
                    html.push_str(&format!("</{}>\n", block_tag(&prev.kind)));
                    html.push_str(&format!("<{}>\n", block_tag(&block.kind)));
                }
                Some(prev) if prev.depth == block.depth => {
                    if !nested.is_empty() {
                        html.push_str(&self.list_markup(&nested));
                        nested.clear();
                    }
                }
                Some(_) => {
                    is_nested = true;
                    nested.push(block);
                }
            }

            if !is_nested {
                html.push_str(&format!(
                    "<li{}>{}</li>\n",
                    self.dir(),
                    self.block_inner_markup(block)
                ));
                previous = Some(block);
            }
        }

        if !nested.is_empty() {
            html.push_str(&self.list_markup(&nested));
        }
        if let Some(prev) = previous {
            html.push_str(&format!("</{}>\n", block_tag(&prev.kind)));
        }
        html
    }

    fn block_inner_markup(&self, block: &RawBlock) -> String {
        let chars = BlockChars::new(block);
        let sections = self.sections(block, &chars);

        sections
            .iter()
            .map(|section| self.section_markup(block, &chars, section))
            .collect()
    }

    fn sections(&self, block: &RawBlock, chars: &BlockChars) -> Vec<Section> {
        let mut ranges: Vec<Section> = block
            .entity_ranges
            .iter()
            .map(|r| Section {
                start: r.offset.min(chars.units),
                end: r.offset.saturating_add(r.length).min(chars.units),
                kind: SectionKind::Entity(r.key),
            })
            .collect();
        if let Some(config) = self.options.hashtag {
            for (start, end) in hashtag_ranges(chars, config) {
                let overlaps = ranges.iter().any(|r| start < r.end && r.start < end);
                if !overlaps {
                    ranges.push(Section {
                        start,
                        end,
                        kind: SectionKind::Hashtag,
                    });
                }
            }
        }
        ranges.sort_by_key(|r| r.start);

        let mut sections = Vec::new();
        let mut last = 0usize;
        for range in ranges {
            if range.start > last {
                sections.push(Section {
                    start: last,
                    end: range.start,
                    kind: SectionKind::Plain,
                });
            }
            last = range.end;
            sections.push(range);
        }
        if last < chars.units {
            sections.push(Section {
                start: last,
                end: chars.units,
                kind: SectionKind::Plain,
            });
        }
        sections
    }

    fn section_markup(&self, block: &RawBlock, chars: &BlockChars, section: &Section) -> String {
        let mut inner = String::new();
        let mut run_start = section.start;
        while run_start < section.end {
            let style = chars.style_at(run_start);
            let mut run_end = run_start + 1;
            while run_end < section.end && chars.style_at(run_end) == style {
                run_end += 1;
            }
            inner.push_str(&styled_markup(chars.markup(run_start, run_end), style));
            run_start = run_end;
        }

        match section.kind {
            SectionKind::Plain => inner,
            SectionKind::Hashtag => {
                format!("<a href=\"{inner}\" class=\"wysiwyg-hashtag\">{inner}</a>")
            }
            SectionKind::Entity(key) => self.entity_markup(block, key, inner),
        }
    }

    fn entity_markup(&self, block: &RawBlock, key: u32, text: String) -> String {
        let Some(entity) = self.content.entity_map.get(&key.to_string()) else {
            log::warn!("block {}: entity {key} is missing, rendering its text", block.key);
            return text;
        };
        if let Some(html) = self.renderer.render(entity, &text) {
            return html;
        }
        match default_entity_markup(entity, &text) {
            Some(html) => html,
            None => {
                log::warn!(
                    "block {}: cannot render {} entity {key}, rendering its text",
                    block.key,
                    entity.kind
                );
                text
            }
        }
    }
}

fn styled_markup(mut content: String, style: StyleSet) -> String {
    for (style_kind, tag) in [
        (InlineStyle::Bold, "strong"),
        (InlineStyle::Italic, "em"),
        (InlineStyle::Underline, "ins"),
        (InlineStyle::Strikethrough, "del"),
        (InlineStyle::Code, "code"),
    ] {
        if style.has(style_kind) {
            content = format!("<{tag}>{content}</{tag}>");
        }
    }
    content
}

/// Hashtags start at the block start or right after a separator and run up
/// to the next separator. A lone trigger is not a hashtag.
fn hashtag_ranges(chars: &BlockChars, config: HashtagConfig) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut ix = 0usize;
    while ix < chars.chars.len() {
        let (start, ch) = chars.chars[ix];
        let at_word_start = ix == 0 || chars.chars[ix - 1].1 == config.separator;
        if ch != config.trigger || !at_word_start {
            ix += 1;
            continue;
        }

        let mut end_ix = ix + 1;
        while end_ix < chars.chars.len() && chars.chars[end_ix].1 != config.separator {
            end_ix += 1;
        }
        if end_ix > ix + 1 {
            let end = chars
                .chars
                .get(end_ix)
                .map(|(unit, _)| *unit)
                .unwrap_or(chars.units);
            ranges.push((start, end));
        }
        ix = end_ix.max(ix + 1);
    }
    ranges
}
