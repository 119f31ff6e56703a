use std::rc::Rc;

use gpui::InteractiveElement as _;
use gpui::StatefulInteractiveElement as _;
use gpui::prelude::FluentBuilder as _;
use gpui::{
    App, ElementId, IntoElement, MouseButton, ParentElement, RenderOnce, SharedString, Styled,
    Window, div, px,
};
use gpui_component::ActiveTheme as _;
use gpui_component::Selectable;

/// A toolbar toggle. Pressing it never takes focus from the editor, so the
/// selection the toggle applies to survives the click.
#[derive(IntoElement)]
pub struct StyleButton {
    id: ElementId,
    label: SharedString,
    selected: bool,
    on_toggle: Option<Rc<dyn Fn(&mut Window, &mut App)>>,
}

impl StyleButton {
    pub fn new(id: impl Into<ElementId>, label: impl Into<SharedString>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            selected: false,
            on_toggle: None,
        }
    }

    pub fn on_toggle(mut self, on_toggle: impl Fn(&mut Window, &mut App) + 'static) -> Self {
        self.on_toggle = Some(Rc::new(on_toggle));
        self
    }
}

impl Selectable for StyleButton {
    fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    fn is_selected(&self) -> bool {
        self.selected
    }
}

impl RenderOnce for StyleButton {
    fn render(self, _window: &mut Window, cx: &mut App) -> impl IntoElement {
        let theme = cx.theme();

        div()
            .id(self.id)
            .flex()
            .items_center()
            .h(px(28.))
            .px(px(8.))
            .rounded(px(6.))
            .text_size(px(12.))
            .font_weight(gpui::FontWeight::MEDIUM)
            .cursor_pointer()
            .text_color(if self.selected {
                theme.primary
            } else {
                theme.muted_foreground
            })
            .hover(|this| this.bg(theme.muted))
            .on_mouse_down(MouseButton::Left, |_, window, _| {
                window.prevent_default();
            })
            .when_some(self.on_toggle, |this, on_toggle| {
                this.on_click(move |_, window, cx| (on_toggle)(window, cx))
            })
            .child(self.label)
    }
}
