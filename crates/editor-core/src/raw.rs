use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{
    Attrs, BlockKey, BlockType, ContentBlock, Document, Editor, Entity, EntityKey, EntityKind,
    InlineStyle, Mutability, StyleSet, TextLeaf,
};

/// Draft-style serialized content. Offsets and lengths count UTF-16 code
/// units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "default_block_type")]
    pub kind: String,
    #[serde(default)]
    pub depth: u8,
    #[serde(default)]
    pub inline_style_ranges: Vec<RawInlineStyleRange>,
    #[serde(default)]
    pub entity_ranges: Vec<RawEntityRange>,
    #[serde(default)]
    pub data: Attrs,
}

fn default_block_type() -> String {
    BlockType::Unstyled.as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInlineStyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntityRange {
    pub offset: usize,
    pub length: usize,
    pub key: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub mutability: String,
    #[serde(default)]
    pub data: Attrs,
}

impl RawEntity {
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RawError {
    #[error("unknown entity type {0:?}")]
    UnknownEntityType(String),
    #[error("block {block}: range {offset}+{length} is outside the block text")]
    RangeOutOfBounds {
        block: String,
        offset: usize,
        length: usize,
    },
    #[error("block {block}: entity range refers to missing entity {key}")]
    MissingEntity { block: String, key: u32 },
    #[error("invalid raw content JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RawContent {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, RawError> {
        Ok(serde_json::from_str(s)?)
    }
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

impl Document {
    pub fn to_raw(&self) -> RawContent {
        let mut entity_keys: HashMap<EntityKey, u32> = HashMap::new();
        let mut entity_map = BTreeMap::new();
        let mut blocks = Vec::with_capacity(self.blocks.len());

        for block in &self.blocks {
            let leaves: Vec<&TextLeaf> = block.leaves.iter().filter(|l| !l.is_empty()).collect();

            let mut spans = Vec::with_capacity(leaves.len());
            let mut offset = 0usize;
            for leaf in &leaves {
                let len = utf16_len(&leaf.text);
                spans.push((offset, len, *leaf));
                offset += len;
            }

            let mut style_order: Vec<InlineStyle> = Vec::new();
            for (_, _, leaf) in &spans {
                for style in leaf.style.iter() {
                    if !style_order.contains(&style) {
                        style_order.push(style);
                    }
                }
            }

            let mut inline_style_ranges = Vec::new();
            for style in style_order {
                let mut run: Option<(usize, usize)> = None;
                for (start, len, leaf) in &spans {
                    match (leaf.style.has(style), run.as_mut()) {
                        (true, Some((_, run_len))) => *run_len += len,
                        (true, None) => run = Some((*start, *len)),
                        (false, Some(_)) => {
                            if let Some((offset, length)) = run.take() {
                                inline_style_ranges.push(RawInlineStyleRange {
                                    offset,
                                    length,
                                    style: style.as_str().to_string(),
                                });
                            }
                        }
                        (false, None) => {}
                    }
                }
                if let Some((offset, length)) = run {
                    inline_style_ranges.push(RawInlineStyleRange {
                        offset,
                        length,
                        style: style.as_str().to_string(),
                    });
                }
            }

            let mut entity_ranges: Vec<RawEntityRange> = Vec::new();
            for (start, len, leaf) in &spans {
                let Some(key) = leaf.entity else {
                    continue;
                };
                let Some(entity) = self.entity_map.get(&key) else {
                    continue;
                };
                let raw_key = match entity_keys.get(&key) {
                    Some(raw_key) => *raw_key,
                    None => {
                        let raw_key = entity_keys.len() as u32;
                        entity_keys.insert(key, raw_key);
                        entity_map.insert(raw_key.to_string(), raw_entity(entity));
                        raw_key
                    }
                };
                match entity_ranges.last_mut() {
                    Some(last) if last.key == raw_key && last.offset + last.length == *start => {
                        last.length += len;
                    }
                    _ => entity_ranges.push(RawEntityRange {
                        offset: *start,
                        length: *len,
                        key: raw_key,
                    }),
                }
            }

            blocks.push(RawBlock {
                key: block.key.as_str().to_string(),
                text: block.text(),
                kind: block.kind.as_str().to_string(),
                depth: block.depth,
                inline_style_ranges,
                entity_ranges,
                data: Attrs::new(),
            });
        }

        RawContent { blocks, entity_map }
    }

    /// Rebuilds a document from its raw form. Unknown block types and inline
    /// styles degrade with a warning; anything that would lose an entity is an
    /// error.
    pub fn from_raw(raw: &RawContent) -> Result<Document, RawError> {
        let mut doc = Document::default();
        let mut entity_keys: HashMap<&str, EntityKey> = HashMap::new();

        for (ix, (raw_key, raw_entity)) in raw.entity_map.iter().enumerate() {
            let kind = EntityKind::parse(&raw_entity.kind)
                .ok_or_else(|| RawError::UnknownEntityType(raw_entity.kind.clone()))?;
            let mutability = Mutability::parse(&raw_entity.mutability).unwrap_or_else(|| {
                log::warn!(
                    "entity {raw_key}: unknown mutability {:?}, using MUTABLE",
                    raw_entity.mutability
                );
                Mutability::Mutable
            });
            let key = EntityKey(ix as u32);
            entity_keys.insert(raw_key.as_str(), key);
            doc.entity_map.insert(
                key,
                Entity {
                    kind,
                    mutability,
                    data: raw_entity.data.clone(),
                },
            );
        }

        let mut seen_keys: HashSet<String> = HashSet::new();
        for raw_block in &raw.blocks {
            let kind = BlockType::parse(&raw_block.kind).unwrap_or_else(|| {
                log::warn!(
                    "block {}: unknown type {:?}, using unstyled",
                    raw_block.key,
                    raw_block.kind
                );
                BlockType::Unstyled
            });

            let units = utf16_len(&raw_block.text);
            let mut styles = vec![StyleSet::default(); units];
            let mut entities: Vec<Option<EntityKey>> = vec![None; units];

            for range in &raw_block.inline_style_ranges {
                let span = check_range(raw_block, range.offset, range.length, units)?;
                let Some(style) = InlineStyle::parse(&range.style) else {
                    log::warn!(
                        "block {}: ignoring unknown inline style {:?}",
                        raw_block.key,
                        range.style
                    );
                    continue;
                };
                for set in &mut styles[span] {
                    set.set(style, true);
                }
            }

            for range in &raw_block.entity_ranges {
                let span = check_range(raw_block, range.offset, range.length, units)?;
                let key = entity_keys
                    .get(range.key.to_string().as_str())
                    .copied()
                    .ok_or_else(|| RawError::MissingEntity {
                        block: raw_block.key.clone(),
                        key: range.key,
                    })?;
                for slot in &mut entities[span] {
                    *slot = Some(key);
                }
            }

            let mut leaves: Vec<TextLeaf> = Vec::new();
            let mut unit = 0usize;
            for ch in raw_block.text.chars() {
                let style = styles[unit];
                let entity = entities[unit];
                unit += ch.len_utf16();
                match leaves.last_mut() {
                    Some(last) if last.style == style && last.entity == entity => {
                        last.text.push(ch);
                    }
                    _ => leaves.push(TextLeaf {
                        text: ch.to_string(),
                        style,
                        entity,
                    }),
                }
            }
            if leaves.is_empty() {
                leaves.push(TextLeaf::default());
            }

            let key = if raw_block.key.is_empty() || seen_keys.contains(&raw_block.key) {
                doc.fresh_block_key()
            } else {
                BlockKey(raw_block.key.clone())
            };
            seen_keys.insert(key.as_str().to_string());

            doc.blocks.push(ContentBlock {
                key,
                kind,
                depth: raw_block.depth,
                leaves,
            });
        }

        if doc.blocks.is_empty() {
            let key = doc.fresh_block_key();
            doc.blocks.push(ContentBlock::empty(key));
        }

        Ok(doc)
    }
}

fn check_range(
    block: &RawBlock,
    offset: usize,
    length: usize,
    units: usize,
) -> Result<Range<usize>, RawError> {
    match offset.checked_add(length).filter(|end| *end <= units) {
        Some(end) => Ok(offset..end),
        None => Err(RawError::RangeOutOfBounds {
            block: block.key.clone(),
            offset,
            length,
        }),
    }
}

fn raw_entity(entity: &Entity) -> RawEntity {
    RawEntity {
        kind: entity.kind.as_str().to_string(),
        mutability: entity.mutability.as_str().to_string(),
        data: entity.data.clone(),
    }
}

impl Editor {
    pub fn to_raw(&self) -> RawContent {
        self.doc().to_raw()
    }
}
