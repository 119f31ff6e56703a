use crate::core::{BlockType, Editor, InlineStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleDescriptor<T: 'static> {
    pub label: &'static str,
    pub style: T,
}

pub const BLOCK_TYPES: &[StyleDescriptor<BlockType>] = &[
    StyleDescriptor {
        label: "H1",
        style: BlockType::HeaderOne,
    },
    StyleDescriptor {
        label: "H2",
        style: BlockType::HeaderTwo,
    },
    StyleDescriptor {
        label: "H3",
        style: BlockType::HeaderThree,
    },
    StyleDescriptor {
        label: "H4",
        style: BlockType::HeaderFour,
    },
    StyleDescriptor {
        label: "H5",
        style: BlockType::HeaderFive,
    },
    StyleDescriptor {
        label: "H6",
        style: BlockType::HeaderSix,
    },
    StyleDescriptor {
        label: "Blockquote",
        style: BlockType::Blockquote,
    },
    StyleDescriptor {
        label: "UL",
        style: BlockType::UnorderedListItem,
    },
    StyleDescriptor {
        label: "OL",
        style: BlockType::OrderedListItem,
    },
];

pub const INLINE_STYLES: &[StyleDescriptor<InlineStyle>] = &[
    StyleDescriptor {
        label: "Bold",
        style: InlineStyle::Bold,
    },
    StyleDescriptor {
        label: "Italic",
        style: InlineStyle::Italic,
    },
    StyleDescriptor {
        label: "Underline",
        style: InlineStyle::Underline,
    },
    StyleDescriptor {
        label: "Monospace",
        style: InlineStyle::Code,
    },
];

/// One control button as it should currently render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState<T> {
    pub label: &'static str,
    pub style: T,
    pub active: bool,
}

pub fn block_style_controls(editor: &Editor) -> Vec<ControlState<BlockType>> {
    let current = editor.current_block_type();
    BLOCK_TYPES
        .iter()
        .map(|d| ControlState {
            label: d.label,
            style: d.style,
            active: d.style == current,
        })
        .collect()
}

pub fn inline_style_controls(editor: &Editor) -> Vec<ControlState<InlineStyle>> {
    let current = editor.current_inline_style();
    INLINE_STYLES
        .iter()
        .map(|d| ControlState {
            label: d.label,
            style: d.style,
            active: current.has(d.style),
        })
        .collect()
}
