use std::rc::Rc;

use gpui::{App, IntoElement, ParentElement, RenderOnce, Styled, Window, div, px};
use gpui_component::Selectable as _;
use rich_editor_core::{BlockType, ControlState, InlineStyle};

use crate::style_button::StyleButton;

type OnBlockType = Rc<dyn Fn(BlockType, &mut Window, &mut App)>;
type OnInlineStyle = Rc<dyn Fn(InlineStyle, &mut Window, &mut App)>;

/// One button per block type; the button for the block under the caret is
/// highlighted.
#[derive(IntoElement)]
pub struct BlockStyleControls {
    controls: Vec<ControlState<BlockType>>,
    on_toggle: OnBlockType,
}

impl BlockStyleControls {
    pub fn new(
        controls: Vec<ControlState<BlockType>>,
        on_toggle: impl Fn(BlockType, &mut Window, &mut App) + 'static,
    ) -> Self {
        Self {
            controls,
            on_toggle: Rc::new(on_toggle),
        }
    }
}

impl RenderOnce for BlockStyleControls {
    fn render(self, _window: &mut Window, _cx: &mut App) -> impl IntoElement {
        let on_toggle = self.on_toggle;
        div()
            .flex()
            .flex_row()
            .flex_wrap()
            .gap(px(2.))
            .children(self.controls.into_iter().map(|control| {
                let on_toggle = on_toggle.clone();
                let style = control.style;
                StyleButton::new(
                    gpui::SharedString::from(format!("block-{}", style.as_str())),
                    control.label,
                )
                .selected(control.active)
                .on_toggle(move |window, cx| (on_toggle)(style, window, cx))
            }))
    }
}

/// One button per inline style; buttons for styles in effect at the caret
/// are highlighted.
#[derive(IntoElement)]
pub struct InlineStyleControls {
    controls: Vec<ControlState<InlineStyle>>,
    on_toggle: OnInlineStyle,
}

impl InlineStyleControls {
    pub fn new(
        controls: Vec<ControlState<InlineStyle>>,
        on_toggle: impl Fn(InlineStyle, &mut Window, &mut App) + 'static,
    ) -> Self {
        Self {
            controls,
            on_toggle: Rc::new(on_toggle),
        }
    }
}

impl RenderOnce for InlineStyleControls {
    fn render(self, _window: &mut Window, _cx: &mut App) -> impl IntoElement {
        let on_toggle = self.on_toggle;
        div()
            .flex()
            .flex_row()
            .gap(px(2.))
            .children(self.controls.into_iter().map(|control| {
                let on_toggle = on_toggle.clone();
                let style = control.style;
                StyleButton::new(
                    gpui::SharedString::from(format!("inline-{}", style.as_str())),
                    control.label,
                )
                .selected(control.active)
                .on_toggle(move |window, cx| (on_toggle)(style, window, cx))
            }))
    }
}
