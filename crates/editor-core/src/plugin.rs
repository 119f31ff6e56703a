use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{
    BlockType, ContentBlock, Document, Editor, Entity, EntityKey, InlineStyle, LeafPath,
    MAX_LIST_DEPTH, Mutability, Point, Selection, StyleSet, TextLeaf,
};
use crate::ops::{Op, Transaction};

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub handler: Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>,
}

/// Binds a key command name (as produced by a key binding) to a registered
/// command.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCommandSpec {
    pub name: String,
    pub command: String,
    pub args: Option<Value>,
}

impl KeyCommandSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: None,
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document) -> Vec<Op>;
}

pub trait RichEditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
    fn key_commands(&self) -> Vec<KeyCommandSpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
    key_commands: HashMap<String, KeyCommandSpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn RichEditorPlugin>>,
    ) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Normalization, plain editing and history only.
    pub fn core() -> Self {
        let plugins: Vec<Box<dyn RichEditorPlugin>> = vec![
            Box::new(NormalizePlugin),
            Box::new(EditingPlugin),
            Box::new(HistoryPlugin),
        ];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn rich_utils() -> Self {
        let plugins: Vec<Box<dyn RichEditorPlugin>> = vec![
            Box::new(NormalizePlugin),
            Box::new(EditingPlugin),
            Box::new(HistoryPlugin),
            Box::new(BlockTypePlugin),
            Box::new(InlineStylePlugin),
            Box::new(EntityPlugin),
        ];
        Self::new(plugins).expect("rich utils registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn RichEditorPlugin>) -> Result<(), String> {
        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        for key in plugin.key_commands() {
            if self.key_commands.contains_key(&key.name) {
                return Err(format!("Duplicate key command: {}", key.name));
            }
            self.key_commands.insert(key.name.clone(), key);
        }

        log::trace!("registered plugin {}", plugin.id());
        Ok(())
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn key_command(&self, name: &str) -> Option<&KeyCommandSpec> {
        self.key_commands.get(name)
    }

    /// Ops of the first pass with work to do. Passes see a consistent
    /// document, so the caller loops until this comes back empty.
    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(doc);
            if !ops.is_empty() {
                log::trace!("normalize pass {} produced {} ops", pass.id(), ops.len());
                return ops;
            }
        }
        Vec::new()
    }
}

struct NormalizePlugin;

impl RichEditorPlugin for NormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureBlockHasLeaf),
            Box::new(DropDanglingEntityRefs),
            Box::new(ClampBlockDepth),
            Box::new(MergeAdjacentLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        if doc.blocks.is_empty() {
            return vec![Op::InsertBlock {
                index: 0,
                block: ContentBlock::empty(doc.fresh_block_key()),
            }];
        }
        Vec::new()
    }
}

struct EnsureBlockHasLeaf;

impl NormalizePass for EnsureBlockHasLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_block_has_leaf"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        doc.blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.leaves.is_empty())
            .map(|(ix, _)| Op::InsertLeaf {
                path: LeafPath::new(ix, 0),
                leaf: TextLeaf::default(),
            })
            .collect()
    }
}

struct DropDanglingEntityRefs;

impl NormalizePass for DropDanglingEntityRefs {
    fn id(&self) -> &'static str {
        "core.drop_dangling_entity_refs"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (block_ix, block) in doc.blocks.iter().enumerate() {
            for (leaf_ix, leaf) in block.leaves.iter().enumerate() {
                let Some(key) = leaf.entity else {
                    continue;
                };
                if !doc.entity_map.contains_key(&key) {
                    ops.push(Op::SetLeafEntity {
                        path: LeafPath::new(block_ix, leaf_ix),
                        entity: None,
                    });
                }
            }
        }
        ops
    }
}

struct ClampBlockDepth;

impl NormalizePass for ClampBlockDepth {
    fn id(&self) -> &'static str {
        "core.clamp_block_depth"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, block) in doc.blocks.iter().enumerate() {
            let max = if block.kind.is_list() {
                MAX_LIST_DEPTH
            } else {
                0
            };
            if block.depth > max {
                ops.push(Op::SetBlockDepth { index: ix, depth: max });
            }
        }
        ops
    }
}

struct MergeAdjacentLeaves;

impl NormalizePass for MergeAdjacentLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_leaves"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();

        for (block_ix, block) in doc.blocks.iter().enumerate() {
            let leaves = &block.leaves;
            let mut ix = leaves.len();
            while ix > 0 {
                ix -= 1;
                let mut start = ix;
                while start > 0 && leaves[start - 1].same_format(&leaves[ix]) {
                    start -= 1;
                }
                if start == ix {
                    continue;
                }

                // Fold right to left so each removed leaf is a suffix of its
                // left neighbour when it goes.
                let mut carried = leaves[ix].text.clone();
                for right in (start + 1..=ix).rev() {
                    let left = &leaves[right - 1];
                    if !carried.is_empty() {
                        ops.push(Op::InsertText {
                            path: LeafPath::new(block_ix, right - 1),
                            offset: left.text.len(),
                            text: carried.clone(),
                        });
                    }
                    ops.push(Op::RemoveLeaf {
                        path: LeafPath::new(block_ix, right),
                    });
                    carried.insert_str(0, &left.text);
                }

                ix = start;
            }
        }

        ops
    }
}

struct HistoryPlugin;

impl RichEditorPlugin for HistoryPlugin {
    fn id(&self) -> &'static str {
        "history"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("history.undo", |editor, _args| {
                editor.undo();
                Ok(())
            }),
            CommandSpec::new("history.redo", |editor, _args| {
                editor.redo();
                Ok(())
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "history.can_undo".to_string(),
                handler: Arc::new(|editor, _args| Ok(Value::Bool(editor.can_undo()))),
            },
            QuerySpec {
                id: "history.can_redo".to_string(),
                handler: Arc::new(|editor, _args| Ok(Value::Bool(editor.can_redo()))),
            },
        ]
    }

    fn key_commands(&self) -> Vec<KeyCommandSpec> {
        vec![
            KeyCommandSpec::new("undo", "history.undo"),
            KeyCommandSpec::new("redo", "history.redo"),
        ]
    }
}

struct BlockTypePlugin;

impl RichEditorPlugin for BlockTypePlugin {
    fn id(&self) -> &'static str {
        "block.type"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle_type", |editor, args| {
                let kind = arg_str(&args, "type")?;
                let kind = BlockType::parse(kind)
                    .ok_or_else(|| CommandError::new(format!("Unknown block type: {kind}")))?;
                toggle_block_type(editor, kind)
                    .map_err(CommandError::new)
                    .and_then(|tx| apply_unless_empty(editor, tx, "toggle block type"))
            }),
            CommandSpec::new(
                "block.remove_style_on_backspace",
                |editor, _args| match remove_block_style_on_backspace(editor) {
                    Some(tx) => editor.apply(tx).map_err(|e| {
                        CommandError::new(format!("Failed to remove block style: {e}"))
                    }),
                    None => Ok(()),
                },
            ),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec {
            id: "block.current_type".to_string(),
            handler: Arc::new(|editor, _args| {
                Ok(Value::String(editor.current_block_type().as_str().to_string()))
            }),
        }]
    }

    fn key_commands(&self) -> Vec<KeyCommandSpec> {
        vec![KeyCommandSpec::new(
            "backspace",
            "block.remove_style_on_backspace",
        )]
    }
}

struct InlineStylePlugin;

impl RichEditorPlugin for InlineStylePlugin {
    fn id(&self) -> &'static str {
        "inline.style"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("inline.toggle_style", |editor, args| {
                let style = parse_style_arg(&args)?;
                toggle_inline_style(editor, style)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor.apply(tx).map_err(|e| {
                            CommandError::new(format!("Failed to toggle {style}: {e}"))
                        })
                    })
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "inline.current_style".to_string(),
                handler: Arc::new(|editor, _args| {
                    let styles: Vec<&'static str> = editor
                        .current_inline_style()
                        .iter()
                        .map(InlineStyle::as_str)
                        .collect();
                    serde_json::to_value(styles)
                        .map_err(|err| QueryError::new(format!("Failed to encode styles: {err}")))
                }),
            },
            QuerySpec {
                id: "inline.has_style".to_string(),
                handler: Arc::new(|editor, args| {
                    let style = parse_style_arg(&args).map_err(|e| QueryError::new(e.message()))?;
                    Ok(Value::Bool(editor.current_inline_style().has(style)))
                }),
            },
        ]
    }

    fn key_commands(&self) -> Vec<KeyCommandSpec> {
        InlineStyle::ALL
            .into_iter()
            .map(|style| {
                KeyCommandSpec::new(style.as_str().to_ascii_lowercase(), "inline.toggle_style")
                    .args(serde_json::json!({ "style": style.as_str() }))
            })
            .collect()
    }
}

struct EntityPlugin;

impl RichEditorPlugin for EntityPlugin {
    fn id(&self) -> &'static str {
        "entity"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("entity.set_link", |editor, args| {
                let url = arg_str(&args, "url")?.to_string();
                attach_entity(editor, Entity::link(url), "command:entity.set_link")
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to set link: {e}")))
                    })
            }),
            CommandSpec::new("entity.attach_image", |editor, args| {
                let src = arg_str(&args, "src")?.to_string();
                let alt = args
                    .as_ref()
                    .and_then(|v| v.get("alt"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                attach_entity(editor, Entity::image(src, alt), "command:entity.attach_image")
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to attach image: {e}")))
                    })
            }),
            CommandSpec::new("entity.remove", |editor, _args| {
                remove_entity(editor)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to remove entity: {e}")))
                    })
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec {
            id: "entity.at_focus".to_string(),
            handler: Arc::new(|editor, _args| {
                let entity = entity_at_focus(editor).and_then(|key| editor.doc().entity(key));
                serde_json::to_value(entity)
                    .map_err(|err| QueryError::new(format!("Failed to encode entity: {err}")))
            }),
        }]
    }
}

struct EditingPlugin;

impl RichEditorPlugin for EditingPlugin {
    fn id(&self) -> &'static str {
        "edit"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("edit.insert_text", |editor, args| {
                let text = arg_str(&args, "text")?.to_string();
                insert_text(editor, &text)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to insert text: {e}")))
                    })
            }),
            CommandSpec::new("edit.backspace", |editor, _args| {
                match delete_backward(editor).map_err(CommandError::new)? {
                    Some(tx) => editor
                        .apply(tx)
                        .map_err(|e| CommandError::new(format!("Failed to delete: {e}"))),
                    None => Ok(()),
                }
            }),
            CommandSpec::new("edit.delete", |editor, _args| {
                match delete_forward(editor).map_err(CommandError::new)? {
                    Some(tx) => editor
                        .apply(tx)
                        .map_err(|e| CommandError::new(format!("Failed to delete: {e}"))),
                    None => Ok(()),
                }
            }),
            CommandSpec::new("edit.split_block", |editor, _args| {
                split_block(editor)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to split block: {e}")))
                    })
            }),
            CommandSpec::new("edit.move_left", |editor, args| {
                let selection = move_horizontal(editor, Direction::Backward, extend_arg(&args));
                editor.set_selection(selection);
                Ok(())
            }),
            CommandSpec::new("edit.move_right", |editor, args| {
                let selection = move_horizontal(editor, Direction::Forward, extend_arg(&args));
                editor.set_selection(selection);
                Ok(())
            }),
        ]
    }
}

impl Editor {
    pub fn toggle_block_type(&mut self, kind: BlockType) -> Result<(), CommandError> {
        self.run_command(
            "block.toggle_type",
            Some(serde_json::json!({ "type": kind.as_str() })),
        )
    }

    pub fn toggle_inline_style(&mut self, style: InlineStyle) -> Result<(), CommandError> {
        self.run_command(
            "inline.toggle_style",
            Some(serde_json::json!({ "style": style.as_str() })),
        )
    }
}

fn arg_str<'a>(args: &'a Option<Value>, name: &str) -> Result<&'a str, CommandError> {
    args.as_ref()
        .and_then(|v| v.get(name))
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::new(format!("Missing args.{name}")))
}

fn extend_arg(args: &Option<Value>) -> bool {
    args.as_ref()
        .and_then(|v| v.get("extend"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn parse_style_arg(args: &Option<Value>) -> Result<InlineStyle, CommandError> {
    let style = arg_str(args, "style")?;
    InlineStyle::parse(style)
        .ok_or_else(|| CommandError::new(format!("Unknown inline style: {style}")))
}

fn apply_unless_empty(
    editor: &mut Editor,
    tx: Transaction,
    what: &str,
) -> Result<(), CommandError> {
    if tx.ops.is_empty() {
        return Ok(());
    }
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to {what}: {e}")))
}

/// A position as (block index, byte offset within the block text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockPos {
    block: usize,
    global: usize,
}

fn block_pos(doc: &Document, point: &Point) -> BlockPos {
    let global = doc
        .blocks
        .get(point.path.block)
        .map(|block| block.global_offset(point.path.leaf, point.offset))
        .unwrap_or(0);
    BlockPos {
        block: point.path.block,
        global,
    }
}

fn selection_bounds(editor: &Editor) -> (BlockPos, BlockPos) {
    let (start, end) = editor.selection().ordered();
    (
        block_pos(editor.doc(), &start),
        block_pos(editor.doc(), &end),
    )
}

fn block_at(doc: &Document, ix: usize) -> Result<&ContentBlock, String> {
    doc.blocks
        .get(ix)
        .ok_or_else(|| format!("Selection block out of bounds: {ix}"))
}

fn rewrite_block_leaves(
    ops: &mut Vec<Op>,
    block_ix: usize,
    old_count: usize,
    new_leaves: Vec<TextLeaf>,
) {
    for leaf_ix in (0..old_count).rev() {
        ops.push(Op::RemoveLeaf {
            path: LeafPath::new(block_ix, leaf_ix),
        });
    }
    for (leaf_ix, leaf) in new_leaves.into_iter().enumerate() {
        ops.push(Op::InsertLeaf {
            path: LeafPath::new(block_ix, leaf_ix),
            leaf,
        });
    }
}

/// Replaces `start..end` with `inserted`, joining the start and end blocks.
/// The start block keeps its type and depth. Returns the caret after the
/// inserted leaves.
fn replace_range(
    doc: &Document,
    start: BlockPos,
    end: BlockPos,
    inserted: Vec<TextLeaf>,
) -> Result<(Vec<Op>, Point), String> {
    let first = block_at(doc, start.block)?;
    let last = block_at(doc, end.block)?;

    let (mut leaves, _) = first.split_leaves(start.global);
    let (_, tail) = last.split_leaves(end.global);

    leaves.extend(inserted.into_iter().filter(|leaf| !leaf.is_empty()));
    let caret = match leaves.len().checked_sub(1) {
        Some(last_ix) => Point::new(
            LeafPath::new(start.block, last_ix),
            leaves[last_ix].text.len(),
        ),
        None => Point::new(LeafPath::new(start.block, 0), 0),
    };
    leaves.extend(tail);
    if leaves.is_empty() {
        leaves.push(TextLeaf::default());
    }

    let mut ops = Vec::new();
    for ix in (start.block + 1..=end.block).rev() {
        ops.push(Op::RemoveBlock { index: ix });
    }
    rewrite_block_leaves(&mut ops, start.block, first.leaves.len(), leaves);
    Ok((ops, caret))
}

/// Rewrites the leaves of every block touched by `sel` with `apply` run on the
/// selected part, remapping the selection onto the new leaves.
fn apply_leaf_range(
    editor: &Editor,
    sel: &Selection,
    apply: &dyn Fn(&mut TextLeaf),
) -> Result<(Vec<Op>, Selection), String> {
    let doc = editor.doc();
    let (start, end) = sel.ordered();
    let start = block_pos(doc, &start);
    let end = block_pos(doc, &end);

    let mut ops: Vec<Op> = Vec::new();
    let mut new_anchor = sel.anchor.clone();
    let mut new_focus = sel.focus.clone();

    for block_ix in start.block..=end.block {
        let block = block_at(doc, block_ix)?;
        let total_len = block.len();
        if total_len == 0 {
            continue;
        }
        let start_global = if block_ix == start.block {
            start.global
        } else {
            0
        };
        let end_global = if block_ix == end.block {
            end.global
        } else {
            total_len
        };
        if start_global >= end_global {
            continue;
        }

        let (head, rest) = block.split_leaves(start_global);
        let (mut middle, tail) = {
            let mut preview = block.clone();
            preview.leaves = rest;
            preview.split_leaves(end_global - start_global)
        };
        for leaf in &mut middle {
            apply(leaf);
        }
        let new_leaves: Vec<TextLeaf> = head.into_iter().chain(middle).chain(tail).collect();

        let mut preview = block.clone();
        preview.leaves = new_leaves.clone();
        for point in [&mut new_anchor, &mut new_focus] {
            if point.path.block == block_ix {
                let global = block.global_offset(point.path.leaf, point.offset);
                *point = preview.point_at(block_ix, global);
            }
        }

        rewrite_block_leaves(&mut ops, block_ix, block.leaves.len(), new_leaves);
    }

    Ok((
        ops,
        Selection {
            anchor: new_anchor,
            focus: new_focus,
        },
    ))
}

fn toggle_block_type(editor: &Editor, kind: BlockType) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (start, end) = selection_bounds(editor);
    let mut last = end.block;
    if last > start.block && end.global == 0 {
        last -= 1;
    }

    let target = if block_at(doc, start.block)?.kind == kind {
        BlockType::Unstyled
    } else {
        kind
    };

    let mut ops = Vec::new();
    for ix in start.block..=last {
        let block = block_at(doc, ix)?;
        if block.kind != target {
            ops.push(Op::SetBlockType {
                index: ix,
                kind: target,
            });
        }
        if !target.is_list() && block.depth > 0 {
            ops.push(Op::SetBlockDepth {
                index: ix,
                depth: 0,
            });
        }
    }

    Ok(Transaction::new(ops)
        .selection_after(editor.selection().clone())
        .source("command:block.toggle_type"))
}

fn remove_block_style_on_backspace(editor: &Editor) -> Option<Transaction> {
    if !editor.selection().is_collapsed() {
        return None;
    }
    let doc = editor.doc();
    let (start, _) = selection_bounds(editor);
    if start.global != 0 {
        return None;
    }
    let block = doc.blocks.get(start.block)?;
    if block.kind == BlockType::Unstyled {
        return None;
    }
    if block.kind == BlockType::CodeBlock {
        let before = start.block.checked_sub(1).and_then(|ix| doc.blocks.get(ix));
        if before.is_some_and(|b| b.kind == BlockType::CodeBlock && !b.is_empty()) {
            return None;
        }
    }

    let mut ops = vec![Op::SetBlockType {
        index: start.block,
        kind: BlockType::Unstyled,
    }];
    if block.depth > 0 {
        ops.push(Op::SetBlockDepth {
            index: start.block,
            depth: 0,
        });
    }
    Some(
        Transaction::new(ops)
            .selection_after(editor.selection().clone())
            .source("command:block.remove_style_on_backspace"),
    )
}

fn toggle_inline_style(editor: &Editor, style: InlineStyle) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let current = editor.current_inline_style();

    if sel.is_collapsed() {
        let (ops, selection_after) = style_override_at_caret(editor, current.toggled(style))?;
        return Ok(Transaction::new(ops)
            .selection_after(selection_after)
            .source("command:inline.toggle_style"));
    }

    let on = !current.has(style);
    let (ops, selection_after) = apply_leaf_range(editor, &sel, &|leaf| leaf.style.set(style, on))?;
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:inline.toggle_style"))
}

/// Places an empty leaf carrying `style` under the caret, so the next typed
/// text picks it up.
fn style_override_at_caret(
    editor: &Editor,
    style: StyleSet,
) -> Result<(Vec<Op>, Selection), String> {
    let focus = editor.selection().focus.clone();
    let block = block_at(editor.doc(), focus.path.block)?;
    let Some(leaf) = block.leaves.get(focus.path.leaf) else {
        return Err("Selection is not in a text leaf".into());
    };

    if leaf.is_empty() {
        let selection_after = Selection::collapsed(Point::new(focus.path, 0));
        return Ok((
            vec![Op::SetLeafStyle {
                path: focus.path,
                style,
            }],
            selection_after,
        ));
    }

    let cursor = focus.offset.min(leaf.text.len());
    let left = leaf.text.get(..cursor).unwrap_or("").to_string();
    let right = leaf.text.get(cursor..).unwrap_or("").to_string();

    let mut replacement: Vec<TextLeaf> = Vec::new();
    let mut caret_leaf = focus.path.leaf;
    if !left.is_empty() {
        replacement.push(TextLeaf {
            text: left,
            ..leaf.clone()
        });
        caret_leaf += 1;
    }
    replacement.push(TextLeaf::styled("", style));
    if !right.is_empty() {
        replacement.push(TextLeaf {
            text: right,
            ..leaf.clone()
        });
    }

    let mut ops = vec![Op::RemoveLeaf { path: focus.path }];
    for (i, new_leaf) in replacement.into_iter().enumerate() {
        ops.push(Op::InsertLeaf {
            path: LeafPath::new(focus.path.block, focus.path.leaf + i),
            leaf: new_leaf,
        });
    }

    let selection_after =
        Selection::collapsed(Point::new(LeafPath::new(focus.path.block, caret_leaf), 0));
    Ok((ops, selection_after))
}

fn attach_entity(editor: &Editor, entity: Entity, source: &str) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return Err("Select the text to attach to first".into());
    }

    let key = editor.doc().next_entity_key();
    let mut ops = vec![Op::CreateEntity { key, entity }];
    let (range_ops, selection_after) =
        apply_leaf_range(editor, &sel, &|leaf| leaf.entity = Some(key))?;
    ops.extend(range_ops);

    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

fn remove_entity(editor: &Editor) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return Err("Select the text to detach first".into());
    }
    let (ops, selection_after) = apply_leaf_range(editor, &sel, &|leaf| leaf.entity = None)?;
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:entity.remove"))
}

fn entity_at_focus(editor: &Editor) -> Option<EntityKey> {
    let focus = &editor.selection().focus;
    let block = editor.doc().blocks.get(focus.path.block)?;
    let global = block.global_offset(focus.path.leaf, focus.offset);
    block
        .leaf_at(global)
        .or_else(|| block.leaf_at(block.prev_char_boundary(global)))
        .and_then(|leaf| leaf.entity)
}

/// A mutable entity continues into typed text only when the text lands
/// strictly inside it.
fn entity_for_insertion(doc: &Document, start: BlockPos, end: BlockPos) -> Option<EntityKey> {
    if start.global == 0 {
        return None;
    }
    let first = doc.blocks.get(start.block)?;
    let last = doc.blocks.get(end.block)?;
    let before = first.leaf_at(first.prev_char_boundary(start.global))?.entity?;
    let after = last.leaf_at(end.global)?.entity?;
    if before != after {
        return None;
    }
    let entity = doc.entity(before)?;
    (entity.mutability == Mutability::Mutable).then_some(before)
}

fn insert_text(editor: &Editor, text: &str) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (start, end) = selection_bounds(editor);
    let leaf = TextLeaf {
        text: text.to_string(),
        style: editor.current_inline_style(),
        entity: entity_for_insertion(doc, start, end),
    };
    let (ops, caret) = replace_range(doc, start, end, vec![leaf])?;
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("command:edit.insert_text"))
}

fn delete_backward(editor: &Editor) -> Result<Option<Transaction>, String> {
    let doc = editor.doc();
    let (start, end) = selection_bounds(editor);

    let range = if !editor.selection().is_collapsed() {
        Some((start, end))
    } else if start.global > 0 {
        let block = block_at(doc, start.block)?;
        let prev = BlockPos {
            block: start.block,
            global: block.prev_char_boundary(start.global),
        };
        Some((prev, start))
    } else if start.block > 0 {
        let before = block_at(doc, start.block - 1)?;
        let prev = BlockPos {
            block: start.block - 1,
            global: before.len(),
        };
        Some((prev, start))
    } else {
        None
    };

    let Some((from, to)) = range else {
        return Ok(None);
    };
    let (ops, caret) = replace_range(doc, from, to, Vec::new())?;
    Ok(Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source("command:edit.backspace"),
    ))
}

fn delete_forward(editor: &Editor) -> Result<Option<Transaction>, String> {
    let doc = editor.doc();
    let (start, end) = selection_bounds(editor);

    let range = if !editor.selection().is_collapsed() {
        Some((start, end))
    } else {
        let block = block_at(doc, end.block)?;
        if end.global < block.len() {
            let next = BlockPos {
                block: end.block,
                global: block.next_char_boundary(end.global),
            };
            Some((end, next))
        } else if end.block + 1 < doc.blocks.len() {
            let next = BlockPos {
                block: end.block + 1,
                global: 0,
            };
            Some((end, next))
        } else {
            None
        }
    };

    let Some((from, to)) = range else {
        return Ok(None);
    };
    let (ops, caret) = replace_range(doc, from, to, Vec::new())?;
    Ok(Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source("command:edit.delete"),
    ))
}

fn split_block(editor: &Editor) -> Result<Transaction, String> {
    let doc = editor.doc();
    let (start, end) = selection_bounds(editor);
    let first = block_at(doc, start.block)?;
    let last = block_at(doc, end.block)?;

    // Enter on an empty list item leaves the list instead of adding an item.
    if editor.selection().is_collapsed() && first.is_empty() && first.kind.is_list() {
        let mut ops = vec![Op::SetBlockType {
            index: start.block,
            kind: BlockType::Unstyled,
        }];
        if first.depth > 0 {
            ops.push(Op::SetBlockDepth {
                index: start.block,
                depth: 0,
            });
        }
        return Ok(Transaction::new(ops)
            .selection_after(editor.selection().clone())
            .source("command:edit.split_block"));
    }

    let (mut head, _) = first.split_leaves(start.global);
    let (_, mut tail) = last.split_leaves(end.global);
    let at_end = tail.is_empty();
    if head.is_empty() {
        head.push(TextLeaf::default());
    }
    if tail.is_empty() {
        tail.push(TextLeaf::default());
    }

    let is_heading = !matches!(
        first.kind,
        BlockType::Unstyled
            | BlockType::Blockquote
            | BlockType::CodeBlock
            | BlockType::UnorderedListItem
            | BlockType::OrderedListItem
    );
    let kind = if is_heading && at_end {
        BlockType::Unstyled
    } else {
        first.kind
    };
    let new_block = ContentBlock {
        key: doc.fresh_block_key(),
        kind,
        depth: if kind.is_list() { first.depth } else { 0 },
        leaves: tail,
    };

    let mut ops = Vec::new();
    for ix in (start.block + 1..=end.block).rev() {
        ops.push(Op::RemoveBlock { index: ix });
    }
    rewrite_block_leaves(&mut ops, start.block, first.leaves.len(), head);
    ops.push(Op::InsertBlock {
        index: start.block + 1,
        block: new_block,
    });

    let caret = Point::new(LeafPath::new(start.block + 1, 0), 0);
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("command:edit.split_block"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

fn move_horizontal(editor: &Editor, direction: Direction, extend: bool) -> Selection {
    let doc = editor.doc();
    let sel = editor.selection();

    if !extend && !sel.is_collapsed() {
        let (start, end) = sel.ordered();
        return Selection::collapsed(match direction {
            Direction::Backward => start,
            Direction::Forward => end,
        });
    }

    let focus = block_pos(doc, &sel.focus);
    let Some(block) = doc.blocks.get(focus.block) else {
        return sel.clone();
    };

    let target = match direction {
        Direction::Backward if focus.global > 0 => {
            block.point_at(focus.block, block.prev_char_boundary(focus.global))
        }
        Direction::Backward => match focus.block.checked_sub(1) {
            Some(prev) => {
                let before = &doc.blocks[prev];
                before.point_at(prev, before.len())
            }
            None => sel.focus.clone(),
        },
        Direction::Forward if focus.global < block.len() => {
            block.point_at(focus.block, block.next_char_boundary(focus.global))
        }
        Direction::Forward => match doc.blocks.get(focus.block + 1) {
            Some(next) => next.point_at(focus.block + 1, 0),
            None => sel.focus.clone(),
        },
    };

    if extend {
        Selection {
            anchor: sel.anchor.clone(),
            focus: target,
        }
    } else {
        Selection::collapsed(target)
    }
}
