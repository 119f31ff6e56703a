use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type EntityMap = BTreeMap<EntityKey, Entity>;

pub const MAX_LIST_DEPTH: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    #[default]
    Unstyled,
    HeaderOne,
    HeaderTwo,
    HeaderThree,
    HeaderFour,
    HeaderFive,
    HeaderSix,
    Blockquote,
    UnorderedListItem,
    OrderedListItem,
    CodeBlock,
}

impl BlockType {
    pub const ALL: [BlockType; 11] = [
        BlockType::Unstyled,
        BlockType::HeaderOne,
        BlockType::HeaderTwo,
        BlockType::HeaderThree,
        BlockType::HeaderFour,
        BlockType::HeaderFive,
        BlockType::HeaderSix,
        BlockType::Blockquote,
        BlockType::UnorderedListItem,
        BlockType::OrderedListItem,
        BlockType::CodeBlock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Unstyled => "unstyled",
            BlockType::HeaderOne => "header-one",
            BlockType::HeaderTwo => "header-two",
            BlockType::HeaderThree => "header-three",
            BlockType::HeaderFour => "header-four",
            BlockType::HeaderFive => "header-five",
            BlockType::HeaderSix => "header-six",
            BlockType::Blockquote => "blockquote",
            BlockType::UnorderedListItem => "unordered-list-item",
            BlockType::OrderedListItem => "ordered-list-item",
            BlockType::CodeBlock => "code-block",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Heading block for `level` in `1..=6`.
    pub fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(BlockType::HeaderOne),
            2 => Some(BlockType::HeaderTwo),
            3 => Some(BlockType::HeaderThree),
            4 => Some(BlockType::HeaderFour),
            5 => Some(BlockType::HeaderFive),
            6 => Some(BlockType::HeaderSix),
            _ => None,
        }
    }

    pub fn is_list(self) -> bool {
        matches!(
            self,
            BlockType::UnorderedListItem | BlockType::OrderedListItem
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Code,
    Strikethrough,
}

impl InlineStyle {
    pub const ALL: [InlineStyle; 5] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Underline,
        InlineStyle::Code,
        InlineStyle::Strikethrough,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InlineStyle::Bold => "BOLD",
            InlineStyle::Italic => "ITALIC",
            InlineStyle::Underline => "UNDERLINE",
            InlineStyle::Code => "CODE",
            InlineStyle::Strikethrough => "STRIKETHROUGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == s)
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of inline styles carried by one text leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StyleSet {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub strikethrough: bool,
}

impl StyleSet {
    pub fn has(&self, style: InlineStyle) -> bool {
        match style {
            InlineStyle::Bold => self.bold,
            InlineStyle::Italic => self.italic,
            InlineStyle::Underline => self.underline,
            InlineStyle::Code => self.code,
            InlineStyle::Strikethrough => self.strikethrough,
        }
    }

    pub fn set(&mut self, style: InlineStyle, on: bool) {
        match style {
            InlineStyle::Bold => self.bold = on,
            InlineStyle::Italic => self.italic = on,
            InlineStyle::Underline => self.underline = on,
            InlineStyle::Code => self.code = on,
            InlineStyle::Strikethrough => self.strikethrough = on,
        }
    }

    pub fn with(mut self, style: InlineStyle) -> Self {
        self.set(style, true);
        self
    }

    pub fn without(mut self, style: InlineStyle) -> Self {
        self.set(style, false);
        self
    }

    pub fn toggled(self, style: InlineStyle) -> Self {
        if self.has(style) {
            self.without(style)
        } else {
            self.with(style)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = InlineStyle> + '_ {
        InlineStyle::ALL.into_iter().filter(|style| self.has(*style))
    }
}

impl FromIterator<InlineStyle> for StyleSet {
    fn from_iter<I: IntoIterator<Item = InlineStyle>>(iter: I) -> Self {
        iter.into_iter()
            .fold(StyleSet::default(), |set, style| set.with(style))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(pub u32);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Link,
    Image,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Link => "LINK",
            EntityKind::Image => "IMAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LINK" => Some(EntityKind::Link),
            "IMAGE" => Some(EntityKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutability {
    Mutable,
    Immutable,
    Segmented,
}

impl Mutability {
    pub fn as_str(self) -> &'static str {
        match self {
            Mutability::Mutable => "MUTABLE",
            Mutability::Immutable => "IMMUTABLE",
            Mutability::Segmented => "SEGMENTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MUTABLE" => Some(Mutability::Mutable),
            "IMMUTABLE" => Some(Mutability::Immutable),
            "SEGMENTED" => Some(Mutability::Segmented),
            _ => None,
        }
    }
}

/// An annotation attached to a span of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub mutability: Mutability,
    #[serde(default)]
    pub data: Attrs,
}

impl Entity {
    pub fn link(url: impl Into<String>) -> Self {
        let mut data = Attrs::new();
        data.insert("url".to_string(), Value::String(url.into()));
        Self {
            kind: EntityKind::Link,
            mutability: Mutability::Mutable,
            data,
        }
    }

    pub fn image(src: impl Into<String>, alt: Option<String>) -> Self {
        let mut data = Attrs::new();
        data.insert("src".to_string(), Value::String(src.into()));
        if let Some(alt) = alt {
            data.insert("alt".to_string(), Value::String(alt));
        }
        Self {
            kind: EntityKind::Image,
            mutability: Mutability::Immutable,
            data,
        }
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn url(&self) -> Option<&str> {
        self.data_str("url")
    }

    pub fn src(&self) -> Option<&str> {
        self.data_str("src")
    }

    pub fn alt(&self) -> Option<&str> {
        self.data_str("alt")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default)]
    pub style: StyleSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKey>,
}

impl TextLeaf {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: StyleSet::default(),
            entity: None,
        }
    }

    pub fn styled(text: impl Into<String>, style: StyleSet) -> Self {
        Self {
            text: text.into(),
            style,
            entity: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Same style and entity, so the two leaves can be one run.
    pub fn same_format(&self, other: &TextLeaf) -> bool {
        self.style == other.style && self.entity == other.entity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(pub String);

impl BlockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub key: BlockKey,
    #[serde(default)]
    pub kind: BlockType,
    #[serde(default)]
    pub depth: u8,
    #[serde(default)]
    pub leaves: Vec<TextLeaf>,
}

impl ContentBlock {
    pub fn new(key: BlockKey, kind: BlockType, leaves: Vec<TextLeaf>) -> Self {
        Self {
            key,
            kind,
            depth: 0,
            leaves,
        }
    }

    pub fn empty(key: BlockKey) -> Self {
        Self::new(key, BlockType::Unstyled, vec![TextLeaf::default()])
    }

    pub fn text(&self) -> String {
        self.leaves.iter().map(|leaf| leaf.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.leaves.iter().map(|leaf| leaf.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset from the start of the block for a point inside `leaf`.
    pub fn global_offset(&self, leaf: usize, offset: usize) -> usize {
        let mut global = 0usize;
        for (ix, l) in self.leaves.iter().enumerate() {
            if ix < leaf {
                global += l.text.len();
                continue;
            }
            if ix == leaf {
                global += clamp_to_char_boundary(&l.text, offset);
            }
            break;
        }
        global
    }

    /// Maps a block offset back to a leaf point. At a boundary between two
    /// leaves the point stays at the end of the left one. Empty leaves are
    /// only chosen when the block has no text.
    pub fn point_at(&self, block: usize, global: usize) -> Point {
        let mut remaining = global;
        let mut last_text_leaf = None;
        for (ix, leaf) in self.leaves.iter().enumerate() {
            if leaf.is_empty() {
                continue;
            }
            if remaining <= leaf.text.len() {
                return Point::new(
                    LeafPath::new(block, ix),
                    clamp_to_char_boundary(&leaf.text, remaining),
                );
            }
            remaining -= leaf.text.len();
            last_text_leaf = Some(ix);
        }
        match last_text_leaf {
            Some(ix) => Point::new(LeafPath::new(block, ix), self.leaves[ix].text.len()),
            None => Point::new(LeafPath::new(block, 0), 0),
        }
    }

    /// The leaf holding the character that starts at `global`.
    pub fn leaf_at(&self, global: usize) -> Option<&TextLeaf> {
        let mut start = 0usize;
        for leaf in &self.leaves {
            let end = start + leaf.text.len();
            if global >= start && global < end {
                return Some(leaf);
            }
            start = end;
        }
        None
    }

    /// Splits the leaves at a block offset, dropping empty leaves.
    pub fn split_leaves(&self, global: usize) -> (Vec<TextLeaf>, Vec<TextLeaf>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut start = 0usize;
        for leaf in &self.leaves {
            let end = start + leaf.text.len();
            if end <= global {
                if !leaf.is_empty() {
                    left.push(leaf.clone());
                }
            } else if start >= global {
                right.push(leaf.clone());
            } else {
                let at = clamp_to_char_boundary(&leaf.text, global - start);
                let mut head = leaf.clone();
                head.text = leaf.text[..at].to_string();
                let mut tail = leaf.clone();
                tail.text = leaf.text[at..].to_string();
                if !head.is_empty() {
                    left.push(head);
                }
                if !tail.is_empty() {
                    right.push(tail);
                }
            }
            start = end;
        }
        (left, right)
    }

    pub(crate) fn prev_char_boundary(&self, global: usize) -> usize {
        let text = self.text();
        let global = clamp_to_char_boundary(&text, global);
        text[..global]
            .char_indices()
            .next_back()
            .map(|(ix, _)| ix)
            .unwrap_or(0)
    }

    pub(crate) fn next_char_boundary(&self, global: usize) -> usize {
        let text = self.text();
        let global = clamp_to_char_boundary(&text, global);
        text[global..]
            .chars()
            .next()
            .map(|c| global + c.len_utf8())
            .unwrap_or(text.len())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub entity_map: EntityMap,
}

impl Document {
    pub fn empty() -> Self {
        let mut doc = Document::default();
        let key = doc.fresh_block_key();
        doc.blocks.push(ContentBlock::empty(key));
        doc
    }

    /// One unstyled block per line of `text`.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Document::default();
        for line in text.split('\n') {
            let key = doc.fresh_block_key();
            doc.blocks.push(ContentBlock::new(
                key,
                BlockType::Unstyled,
                vec![TextLeaf::plain(line)],
            ));
        }
        doc
    }

    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(ContentBlock::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn block_for_key(&self, key: &BlockKey) -> Option<&ContentBlock> {
        self.blocks.iter().find(|block| &block.key == key)
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entity_map.get(&key)
    }

    pub fn leaf(&self, path: LeafPath) -> Option<&TextLeaf> {
        self.blocks.get(path.block)?.leaves.get(path.leaf)
    }

    /// A five character base-36 key not used by any block.
    pub fn fresh_block_key(&self) -> BlockKey {
        let mut n = self.blocks.len() as u64;
        loop {
            let key = BlockKey(base36_key(n));
            if self.block_for_key(&key).is_none() {
                return key;
            }
            n += 1;
        }
    }

    pub fn next_entity_key(&self) -> EntityKey {
        self.entity_map
            .keys()
            .next_back()
            .map(|key| EntityKey(key.0 + 1))
            .unwrap_or(EntityKey(0))
    }

    pub fn start_point(&self) -> Point {
        Point::new(LeafPath::new(0, 0), 0)
    }

    pub fn end_point(&self) -> Point {
        match self.blocks.len().checked_sub(1) {
            Some(last) => {
                let block = &self.blocks[last];
                block.point_at(last, block.len())
            }
            None => self.start_point(),
        }
    }

    /// Clamps a point onto an existing leaf and char boundary.
    pub fn clamp_point(&self, point: &Point) -> Point {
        let Some(last_block) = self.blocks.len().checked_sub(1) else {
            return Point::new(LeafPath::new(0, 0), 0);
        };
        let block_ix = point.path.block.min(last_block);
        let block = &self.blocks[block_ix];
        let Some(last_leaf) = block.leaves.len().checked_sub(1) else {
            return Point::new(LeafPath::new(block_ix, 0), 0);
        };
        let leaf_ix = point.path.leaf.min(last_leaf);
        let text = &block.leaves[leaf_ix].text;
        Point::new(
            LeafPath::new(block_ix, leaf_ix),
            clamp_to_char_boundary(text, point.offset),
        )
    }
}

fn base36_key(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = [b'0'; 5];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafPath {
    pub block: usize,
    pub leaf: usize,
}

impl LeafPath {
    pub fn new(block: usize, leaf: usize) -> Self {
        Self { block, leaf }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub path: LeafPath,
    pub offset: usize,
}

impl Point {
    pub fn new(path: LeafPath, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order.
    pub fn ordered(&self) -> (Point, Point) {
        if self.focus < self.anchor {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Default, Clone)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

/// Holds the document state of one editor instance. Every transition goes
/// through [`Editor::apply`] or [`Editor::replace_document`].
pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    version: u64,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        let config = EditorConfig::default().with_defaults();
        let mut editor = Self {
            doc,
            selection,
            registry,
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            version: 0,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_plugins() -> Self {
        let doc = Document::empty();
        let selection = Selection::collapsed(doc.start_point());
        Self::new(doc, selection, PluginRegistry::core())
    }

    pub fn with_rich_utils() -> Self {
        let doc = Document::empty();
        let selection = Selection::collapsed(doc.start_point());
        Self::new(doc, selection, PluginRegistry::rich_utils())
    }

    /// Rich-utils editor over plain text, caret at the end.
    pub fn from_text(text: &str) -> Self {
        let doc = Document::from_text(text);
        let selection = Selection::collapsed(doc.end_point());
        Self::new(doc, selection, PluginRegistry::rich_utils())
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config.with_defaults();
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let before = self.selection.clone();
        self.selection = selection;
        self.normalize_selection_in_place();
        if self.selection != before {
            self.drop_stale_style_leaves();
            self.version += 1;
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Bumped on every state transition; unchanged when nothing applied.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => redo_ops.push(inv),
                Err(err) => {
                    log::warn!("undo stopped early: {err}");
                    break;
                }
            }
        }
        redo_ops.reverse();

        self.selection = selection_before.clone();
        self.normalize_in_place();
        self.version += 1;

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => undo_ops.push(inv),
                Err(err) => {
                    log::warn!("redo stopped early: {err}");
                    break;
                }
            }
        }
        undo_ops.reverse();

        self.selection = selection_after.clone();
        self.normalize_in_place();
        self.version += 1;

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        true
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.selection.clone();

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops.iter().cloned() {
            let inv = self.apply_op(op)?;
            inverse_ops.push(inv);
        }

        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }

        let mut inverse_normalize = self.normalize_with_inverse_ops()?;
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        self.normalize_selection_in_place();

        let selection_after = self.selection.clone();

        if let Some(source) = tx.meta.source.as_deref() {
            log::trace!("applied {} ops from {source}", tx.ops.len());
        }

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        self.version += 1;

        Ok(())
    }

    /// Installs a new document wholesale, discarding undo and redo history.
    pub fn replace_document(&mut self, doc: Document) {
        self.doc = doc;
        self.selection = Selection::collapsed(self.doc.start_point());
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.normalize_in_place();
        self.version += 1;
    }

    /// Block type at the start of the selection.
    pub fn current_block_type(&self) -> BlockType {
        let (start, _) = self.selection.ordered();
        self.doc
            .blocks
            .get(start.path.block)
            .map(|block| block.kind)
            .unwrap_or_default()
    }

    /// Inline styles that typing would produce at a caret, or the styles of
    /// the first selected character for a range.
    ///
    /// A caret on an empty leaf, or at the very start of a leaf that is not
    /// the first one, carries an explicit override and reports that leaf's
    /// style.
    pub fn current_inline_style(&self) -> StyleSet {
        let (start, _) = self.selection.ordered();
        let Some(block) = self.doc.blocks.get(start.path.block) else {
            return StyleSet::default();
        };
        let global = block.global_offset(start.path.leaf, start.offset);

        if self.selection.is_collapsed() {
            if let Some(leaf) = block.leaves.get(start.path.leaf) {
                if leaf.is_empty() || (start.offset == 0 && start.path.leaf > 0) {
                    return leaf.style;
                }
            }
            if global > 0 {
                let prev = block.prev_char_boundary(global);
                return block.leaf_at(prev).map(|l| l.style).unwrap_or_default();
            }
            if let Some(leaf) = block.leaf_at(0) {
                return leaf.style;
            }
            return self.style_above(start.path.block);
        }

        if let Some(leaf) = block.leaf_at(global) {
            return leaf.style;
        }
        if global > 0 {
            let prev = block.prev_char_boundary(global);
            return block.leaf_at(prev).map(|l| l.style).unwrap_or_default();
        }
        self.style_above(start.path.block)
    }

    /// Style of the last character of the nearest non-empty block above.
    fn style_above(&self, block: usize) -> StyleSet {
        self.doc.blocks[..block.min(self.doc.blocks.len())]
            .iter()
            .rev()
            .find(|b| !b.is_empty())
            .and_then(|b| b.leaf_at(b.prev_char_boundary(b.len())))
            .map(|leaf| leaf.style)
            .unwrap_or_default()
    }

    pub fn block_for_key(&self, key: &BlockKey) -> Option<&ContentBlock> {
        self.doc.block_for_key(key)
    }

    pub fn plain_text(&self) -> String {
        self.doc.plain_text()
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops() {
            log::warn!("normalization failed: {err}");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = Selection {
            anchor: self.doc.clamp_point(&self.selection.anchor),
            focus: self.doc.clamp_point(&self.selection.focus),
        };
    }

    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let anchor = BlockAnchor::capture(&self.doc, &self.selection.anchor);
        let focus = BlockAnchor::capture(&self.doc, &self.selection.focus);

        let mut inverse_ops: Vec<Op> = Vec::new();
        let mut converged = false;
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                converged = true;
                break;
            }
            for op in ops {
                let inv = self.apply_op(op)?;
                inverse_ops.push(inv);
            }
        }
        if !converged {
            return Err(ApplyError::NormalizeDidNotConverge);
        }

        if !inverse_ops.is_empty() {
            // Leaf merges shift paths; keep the caret at the same place in the text.
            if let Some(point) = anchor.and_then(|a| a.restore(&self.doc)) {
                self.selection.anchor = point;
            }
            if let Some(point) = focus.and_then(|f| f.restore(&self.doc)) {
                self.selection.focus = point;
            }
        }
        Ok(inverse_ops)
    }

    /// An empty leaf in a block with text only carries a pending style while
    /// the caret is on it. Once the caret leaves, the leaf goes and the
    /// removal is folded into the latest undo record.
    fn drop_stale_style_leaves(&mut self) {
        let ops = stale_style_leaf_ops(&self.doc, &self.selection);
        if ops.is_empty() {
            return;
        }

        let anchor = BlockAnchor::capture(&self.doc, &self.selection.anchor);
        let focus = BlockAnchor::capture(&self.doc, &self.selection.focus);
        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in ops {
            match self.apply_op(op) {
                Ok(inv) => inverse_ops.push(inv),
                Err(err) => {
                    log::warn!("dropping stale style leaf failed: {err}");
                    break;
                }
            }
        }
        if let Some(point) = anchor.and_then(|a| a.restore(&self.doc)) {
            self.selection.anchor = point;
        }
        if let Some(point) = focus.and_then(|f| f.restore(&self.doc)) {
            self.selection.focus = point;
        }
        match self.normalize_with_inverse_ops() {
            Ok(mut more) => inverse_ops.append(&mut more),
            Err(err) => log::warn!("normalization failed: {err}"),
        }
        self.normalize_selection_in_place();
        inverse_ops.reverse();

        if let Some(record) = self.undo_stack.last_mut() {
            inverse_ops.append(&mut record.inverse_ops);
            record.inverse_ops = inverse_ops;
            record.selection_after = self.selection.clone();
        }
        self.redo_stack.clear();
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

/// Removals for empty leaves that sit next to other leaves and are under
/// neither end of the selection, last leaf first.
fn stale_style_leaf_ops(doc: &Document, selection: &Selection) -> Vec<Op> {
    let ends = [selection.anchor.path, selection.focus.path];
    let mut ops = Vec::new();
    for (block_ix, block) in doc.blocks.iter().enumerate() {
        if block.leaves.len() < 2 {
            continue;
        }
        for (leaf_ix, leaf) in block.leaves.iter().enumerate().rev() {
            let path = LeafPath::new(block_ix, leaf_ix);
            if leaf.is_empty() && !ends.contains(&path) {
                ops.push(Op::RemoveLeaf { path });
            }
        }
    }
    ops
}

/// A selection point pinned to a block key and a byte offset in its text.
struct BlockAnchor {
    key: BlockKey,
    global: usize,
    point: Point,
}

impl BlockAnchor {
    fn capture(doc: &Document, point: &Point) -> Option<Self> {
        let block = doc.blocks.get(point.path.block)?;
        Some(Self {
            key: block.key.clone(),
            global: block.global_offset(point.path.leaf, point.offset),
            point: point.clone(),
        })
    }

    fn restore(&self, doc: &Document) -> Option<Point> {
        let (ix, block) = doc
            .blocks
            .iter()
            .enumerate()
            .find(|(_, block)| block.key == self.key)?;
        let leaf = block.leaves.get(self.point.path.leaf);
        let unchanged = leaf.is_some_and(|leaf| self.point.offset <= leaf.text.len())
            && block.global_offset(self.point.path.leaf, self.point.offset) == self.global;
        if unchanged {
            return Some(Point::new(
                LeafPath::new(ix, self.point.path.leaf),
                self.point.offset,
            ));
        }
        Some(block.point_at(ix, self.global))
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let leaf = leaf_mut(doc, path)?;
            let offset = clamp_to_char_boundary(&leaf.text, offset);
            leaf.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let leaf = leaf_mut(doc, path)?;
            let start = clamp_to_char_boundary(&leaf.text, range.start);
            let end = clamp_to_char_boundary(&leaf.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = leaf.text[start..end].to_string();
            leaf.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertBlock { index, block } => {
            if index > doc.blocks.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Insert block index out of bounds: {index} > {}",
                    doc.blocks.len()
                )));
            }
            doc.blocks.insert(index, block);
            for point in [&mut selection.anchor, &mut selection.focus] {
                if point.path.block >= index {
                    point.path.block += 1;
                }
            }
            Ok(Op::RemoveBlock { index })
        }
        Op::RemoveBlock { index } => {
            if index >= doc.blocks.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Remove block index out of bounds: {index} >= {}",
                    doc.blocks.len()
                )));
            }
            let removed = doc.blocks.remove(index);
            transform_selection_remove_block(selection, index, doc);
            Ok(Op::InsertBlock {
                index,
                block: removed,
            })
        }
        Op::InsertLeaf { path, leaf } => {
            let block = block_mut(doc, path.block)?;
            if path.leaf > block.leaves.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Insert leaf index out of bounds: {} > {}",
                    path.leaf,
                    block.leaves.len()
                )));
            }
            block.leaves.insert(path.leaf, leaf);
            for point in [&mut selection.anchor, &mut selection.focus] {
                if point.path.block == path.block && point.path.leaf >= path.leaf {
                    point.path.leaf += 1;
                }
            }
            Ok(Op::RemoveLeaf { path })
        }
        Op::RemoveLeaf { path } => {
            let block = block_mut(doc, path.block)?;
            if path.leaf >= block.leaves.len() {
                return Err(ApplyError::InvalidPath(format!(
                    "Remove leaf index out of bounds: {} >= {}",
                    path.leaf,
                    block.leaves.len()
                )));
            }
            let removed = block.leaves.remove(path.leaf);
            transform_selection_remove_leaf(selection, path, &removed, &block.leaves);
            Ok(Op::InsertLeaf {
                path,
                leaf: removed,
            })
        }
        Op::SetBlockType { index, kind } => {
            let block = block_mut(doc, index)?;
            let old = std::mem::replace(&mut block.kind, kind);
            Ok(Op::SetBlockType { index, kind: old })
        }
        Op::SetBlockDepth { index, depth } => {
            let block = block_mut(doc, index)?;
            let old = std::mem::replace(&mut block.depth, depth);
            Ok(Op::SetBlockDepth { index, depth: old })
        }
        Op::SetLeafStyle { path, style } => {
            let leaf = leaf_mut(doc, path)?;
            let old = std::mem::replace(&mut leaf.style, style);
            Ok(Op::SetLeafStyle { path, style: old })
        }
        Op::SetLeafEntity { path, entity } => {
            let leaf = leaf_mut(doc, path)?;
            let old = std::mem::replace(&mut leaf.entity, entity);
            Ok(Op::SetLeafEntity { path, entity: old })
        }
        Op::CreateEntity { key, entity } => {
            if doc.entity_map.contains_key(&key) {
                return Err(ApplyError::DuplicateEntity(key));
            }
            doc.entity_map.insert(key, entity);
            Ok(Op::RemoveEntity { key })
        }
        Op::RemoveEntity { key } => {
            let entity = doc
                .entity_map
                .remove(&key)
                .ok_or(ApplyError::MissingEntity(key))?;
            Ok(Op::CreateEntity { key, entity })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityKey),
    #[error("entity {0} does not exist")]
    MissingEntity(EntityKey),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn block_mut(doc: &mut Document, index: usize) -> Result<&mut ContentBlock, ApplyError> {
    let len = doc.blocks.len();
    doc.blocks.get_mut(index).ok_or_else(|| {
        ApplyError::InvalidPath(format!("Block out of bounds: {index} >= {len}"))
    })
}

fn leaf_mut(doc: &mut Document, path: LeafPath) -> Result<&mut TextLeaf, ApplyError> {
    let block = block_mut(doc, path.block)?;
    let len = block.leaves.len();
    block.leaves.get_mut(path.leaf).ok_or_else(|| {
        ApplyError::InvalidPath(format!("Leaf out of bounds: {} >= {len}", path.leaf))
    })
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: LeafPath,
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: LeafPath,
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_remove_block(selection: &mut Selection, index: usize, doc: &Document) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.block > index {
            point.path.block -= 1;
            continue;
        }
        if point.path.block < index {
            continue;
        }
        // Point was inside the removed block: move it to the end of the one before.
        match index.checked_sub(1).and_then(|prev| doc.blocks.get(prev).map(|b| (prev, b))) {
            Some((prev, block)) => *point = block.point_at(prev, block.len()),
            None => *point = Point::new(LeafPath::new(0, 0), 0),
        }
    }
}

fn transform_selection_remove_leaf(
    selection: &mut Selection,
    path: LeafPath,
    removed: &TextLeaf,
    leaves_after_remove: &[TextLeaf],
) {
    let merge_prefix_len = path.leaf.checked_sub(1).and_then(|left_ix| {
        let left = leaves_after_remove.get(left_ix)?;
        (left.same_format(removed) && left.text.ends_with(&removed.text))
            .then(|| left.text.len().saturating_sub(removed.text.len()))
    });

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.block != path.block {
            continue;
        }
        if point.path.leaf > path.leaf {
            point.path.leaf -= 1;
            continue;
        }
        if point.path.leaf < path.leaf {
            continue;
        }

        match (merge_prefix_len, path.leaf.checked_sub(1)) {
            (Some(prefix), Some(left_ix)) => {
                point.path.leaf = left_ix;
                point.offset = (prefix + point.offset).min(prefix + removed.text.len());
            }
            (None, Some(left_ix)) => {
                point.path.leaf = left_ix;
                point.offset = leaves_after_remove
                    .get(left_ix)
                    .map(|l| l.text.len())
                    .unwrap_or(0);
            }
            (_, None) => {
                point.path.leaf = 0;
                point.offset = 0;
            }
        }
    }
}
