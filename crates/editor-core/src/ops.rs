use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{BlockType, ContentBlock, Entity, EntityKey, LeafPath, Selection, StyleSet, TextLeaf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        path: LeafPath,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: LeafPath,
        range: Range<usize>,
    },
    InsertBlock {
        index: usize,
        block: ContentBlock,
    },
    RemoveBlock {
        index: usize,
    },
    InsertLeaf {
        path: LeafPath,
        leaf: TextLeaf,
    },
    RemoveLeaf {
        path: LeafPath,
    },
    SetBlockType {
        index: usize,
        kind: BlockType,
    },
    SetBlockDepth {
        index: usize,
        depth: u8,
    },
    SetLeafStyle {
        path: LeafPath,
        style: StyleSet,
    },
    SetLeafEntity {
        path: LeafPath,
        #[serde(default)]
        entity: Option<EntityKey>,
    },
    CreateEntity {
        key: EntityKey,
        entity: Entity,
    },
    RemoveEntity {
        key: EntityKey,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.selection_after.is_none()
    }
}
