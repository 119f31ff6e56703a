use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use rich_editor_core::{
    BlockType, ContentBlock, Document, Entity, EntityKey, InlineStyle, MAX_LIST_DEPTH, RawContent,
    StyleSet, TextLeaf,
};

use crate::error::{ImportError, Result};

/// Text placed under an image entity so it has a span to attach to.
pub const IMAGE_PLACEHOLDER: &str = "\u{1F4F7}";

/// Elements nested deeper than this are rejected instead of walked.
pub const MAX_NESTING: usize = 256;

const SKIPPED: &[&str] = &["head", "script", "style", "title", "meta", "link", "template"];

const CONTAINERS: &[&str] = &[
    "div", "section", "article", "header", "footer", "main", "aside", "nav", "figure", "body",
    "html",
];

/// Parses an HTML fragment or document into raw content.
pub fn convert_from_html(html: &str) -> Result<RawContent> {
    Ok(html_to_document(html)?.to_raw())
}

pub fn html_to_document(html: &str) -> Result<Document> {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let mut builder = Builder::default();
    builder.walk(&dom.document, Inline::default(), 0)?;
    let doc = builder.finish();
    log::debug!("imported {} blocks from HTML", doc.blocks.len());

    // Round trip through the raw form so keys and ranges get the same
    // checks as any other raw input.
    Ok(Document::from_raw(&doc.to_raw())?)
}

#[derive(Debug, Clone, Copy, Default)]
struct Inline {
    style: StyleSet,
    entity: Option<EntityKey>,
    preformatted: bool,
}

struct Element<'a> {
    tag: &'a str,
    href: Option<String>,
    src: Option<String>,
    alt: Option<String>,
    style: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Container {
    kind: BlockType,
    depth: u8,
}

#[derive(Default)]
struct Builder {
    doc: Document,
    current: Option<ContentBlock>,
    containers: Vec<Container>,
    lists: Vec<BlockType>,
}

impl Builder {
    fn walk(&mut self, node: &Handle, inline: Inline, nesting: usize) -> Result<()> {
        if nesting > MAX_NESTING {
            return Err(ImportError::NestingTooDeep(MAX_NESTING));
        }

        match &node.data {
            NodeData::Document => self.walk_children(node, inline, nesting),
            NodeData::Text { contents } => {
                let text = contents.borrow();
                self.push_text(&text, inline);
                Ok(())
            }
            NodeData::Element { name, attrs, .. } => {
                let tag = name.local.to_ascii_lowercase();
                let attrs = attrs.borrow();
                let attr = |key: &str| {
                    attrs
                        .iter()
                        .find(|a| &*a.name.local == key)
                        .map(|a| a.value.to_string())
                };
                let element = Element {
                    tag: &tag,
                    href: attr("href"),
                    src: attr("src"),
                    alt: attr("alt"),
                    style: attr("style"),
                };
                self.element(node, element, inline, nesting)
            }
            _ => Ok(()),
        }
    }

    fn walk_children(&mut self, node: &Handle, inline: Inline, nesting: usize) -> Result<()> {
        for child in node.children.borrow().iter() {
            self.walk(child, inline, nesting + 1)?;
        }
        Ok(())
    }

    fn element(
        &mut self,
        node: &Handle,
        element: Element<'_>,
        mut inline: Inline,
        nesting: usize,
    ) -> Result<()> {
        let Element {
            tag,
            href,
            src,
            alt,
            style,
        } = element;
        if SKIPPED.contains(&tag) {
            return Ok(());
        }
        if style.as_deref().is_some_and(keeps_whitespace) {
            inline.preformatted = true;
        }

        match tag {
            "ul" | "ol" => {
                self.close_block();
                self.lists.push(if tag == "ul" {
                    BlockType::UnorderedListItem
                } else {
                    BlockType::OrderedListItem
                });
                self.walk_children(node, inline, nesting)?;
                self.lists.pop();
                self.close_block();
            }
            "li" => {
                let kind = self
                    .lists
                    .last()
                    .copied()
                    .unwrap_or(BlockType::UnorderedListItem);
                let depth = (self.lists.len().saturating_sub(1) as u8).min(MAX_LIST_DEPTH);
                self.close_block();
                self.containers.push(Container { kind, depth });
                self.open_block(kind, depth);
                self.walk_children(node, inline, nesting)?;
                self.close_block();
                self.containers.pop();
            }
            "blockquote" | "pre" => {
                let kind = if tag == "pre" {
                    inline.preformatted = true;
                    BlockType::CodeBlock
                } else {
                    BlockType::Blockquote
                };
                self.close_block();
                self.containers.push(Container { kind, depth: 0 });
                self.walk_children(node, inline, nesting)?;
                self.close_block();
                self.containers.pop();
            }
            "p" => {
                let Container { kind, depth } = self.container();
                self.reuse_or_open(kind, depth);
                self.walk_children(node, inline, nesting)?;
                self.close_block();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().unwrap_or(1);
                let kind = BlockType::heading(level).unwrap_or(BlockType::HeaderOne);
                self.reuse_or_open(kind, 0);
                self.walk_children(node, inline, nesting)?;
                self.close_block();
            }
            "br" => self.append("\n", inline),
            "img" => match src {
                Some(src) => {
                    let key = self.create_entity(Entity::image(src, alt));
                    self.append(
                        IMAGE_PLACEHOLDER,
                        Inline {
                            entity: Some(key),
                            ..inline
                        },
                    );
                }
                None => log::debug!("skipping <img> without src"),
            },
            "a" => {
                if let Some(href) = href {
                    inline.entity = Some(self.create_entity(Entity::link(href)));
                }
                self.walk_children(node, inline, nesting)?;
            }
            _ if CONTAINERS.contains(&tag) => {
                self.close_block();
                self.walk_children(node, inline, nesting)?;
                self.close_block();
            }
            _ => {
                if let Some(style) = inline_style_for(tag) {
                    inline.style.set(style, true);
                }
                self.walk_children(node, inline, nesting)?;
            }
        }
        Ok(())
    }

    fn container(&self) -> Container {
        self.containers.last().copied().unwrap_or(Container {
            kind: BlockType::Unstyled,
            depth: 0,
        })
    }

    fn create_entity(&mut self, entity: Entity) -> EntityKey {
        let key = self.doc.next_entity_key();
        self.doc.entity_map.insert(key, entity);
        key
    }

    fn open_block(&mut self, kind: BlockType, depth: u8) {
        self.close_block();
        let key = self.doc.fresh_block_key();
        let mut block = ContentBlock::new(key, kind, Vec::new());
        block.depth = depth;
        self.current = Some(block);
    }

    /// An empty block opened by an enclosing `li` is taken over by the first
    /// paragraph or heading inside it.
    fn reuse_or_open(&mut self, kind: BlockType, depth: u8) {
        match self.current.as_mut() {
            Some(block) if block.leaves.is_empty() => block.kind = kind,
            _ => self.open_block(kind, depth),
        }
    }

    fn close_block(&mut self) {
        let Some(mut block) = self.current.take() else {
            return;
        };
        if block.kind != BlockType::CodeBlock {
            trim_trailing_spaces(&mut block.leaves);
        }
        for leaf in &mut block.leaves {
            if leaf.text.contains('\u{a0}') {
                leaf.text = leaf.text.replace('\u{a0}', " ");
            }
        }
        if block.leaves.is_empty() {
            block.leaves.push(TextLeaf::default());
        }
        self.doc.blocks.push(block);
    }

    fn push_text(&mut self, text: &str, inline: Inline) {
        if inline.preformatted {
            self.append(text, inline);
            return;
        }

        let collapsed = collapse_whitespace(text);
        let after_space = self.current.as_ref().is_none_or(|block| {
            let text = block.text();
            text.is_empty() || text.ends_with([' ', '\n'])
        });
        let collapsed = if after_space {
            collapsed.trim_start_matches(' ')
        } else {
            collapsed.as_str()
        };
        if collapsed.is_empty() {
            return;
        }
        self.append(collapsed, inline);
    }

    fn append(&mut self, text: &str, inline: Inline) {
        if self.current.is_none() {
            let Container { kind, depth } = self.container();
            self.open_block(kind, depth);
        }
        let Some(block) = self.current.as_mut() else {
            return;
        };
        match block.leaves.last_mut() {
            Some(last) if last.style == inline.style && last.entity == inline.entity => {
                last.text.push_str(text);
            }
            _ => block.leaves.push(TextLeaf {
                text: text.to_string(),
                style: inline.style,
                entity: inline.entity,
            }),
        }
    }

    fn finish(mut self) -> Document {
        self.close_block();
        if self.doc.blocks.is_empty() {
            let key = self.doc.fresh_block_key();
            self.doc.blocks.push(ContentBlock::empty(key));
        }
        self.doc
    }
}

fn inline_style_for(tag: &str) -> Option<InlineStyle> {
    match tag {
        "b" | "strong" => Some(InlineStyle::Bold),
        "i" | "em" => Some(InlineStyle::Italic),
        "u" | "ins" => Some(InlineStyle::Underline),
        "s" | "del" | "strike" => Some(InlineStyle::Strikethrough),
        "code" | "kbd" | "samp" | "tt" => Some(InlineStyle::Code),
        _ => None,
    }
}

/// `white-space: pre` and `pre-wrap` keep text as written.
fn keeps_whitespace(style: &str) -> bool {
    style.split(';').any(|decl| {
        decl.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("white-space")
                && matches!(value.trim(), "pre" | "pre-wrap")
        })
    })
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn trim_trailing_spaces(leaves: &mut Vec<TextLeaf>) {
    while let Some(last) = leaves.last_mut() {
        let trimmed = last.text.trim_end_matches(' ').len();
        last.text.truncate(trimmed);
        if !last.text.is_empty() {
            break;
        }
        leaves.pop();
    }
}
