use std::path::{Path, PathBuf};

use base64::Engine as _;
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::ActiveTheme as _;
use gpui_component::WindowExt as _;
use gpui_component::button::{Button, ButtonVariants as _};
use gpui_component::notification::Notification;
use rich_editor_components::{BlockStyleControls, InlineStyleControls};
use rich_editor_core::{
    BlockType, Document, Editor, InlineStyle, KeyChord, block_style_controls, default_key_binding,
    inline_style_controls,
};
use rich_editor_html::{IMAGE_PLACEHOLDER, export_html};
use rich_editor_remote::{ExportPipeline, ImportPipeline, RemoteClient};
use serde_json::{Value, json};

use crate::blocks::{Palette, render_document};

pub struct RichEditorDemo {
    editor: Editor,
    focus_handle: FocusHandle,
    export: ExportPipeline,
    import: ImportPipeline,
    download_name: String,
}

impl RichEditorDemo {
    pub fn view(client: RemoteClient, window: &mut Window, cx: &mut App) -> Entity<Self> {
        cx.new(|cx| Self::new(client, window, cx))
    }

    fn new(client: RemoteClient, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let focus_handle = cx.focus_handle().tab_stop(true);
        window.focus(&focus_handle);
        Self {
            editor: Editor::with_rich_utils(),
            focus_handle,
            download_name: client.config().download_name.clone(),
            export: ExportPipeline::new(client.clone()),
            import: ImportPipeline::new(client),
        }
    }

    /// Runs a command and reports whether it produced a new editor state.
    fn run(&mut self, id: &str, args: Option<Value>) -> bool {
        let version = self.editor.version();
        if let Err(err) = self.editor.run_command(id, args) {
            log::debug!("{id}: {err}");
            return false;
        }
        self.editor.version() != version
    }

    fn on_key_down(&mut self, event: &KeyDownEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let keystroke = &event.keystroke;
        let chord = KeyChord {
            key: keystroke.key.clone(),
            command: keystroke.modifiers.secondary(),
            shift: keystroke.modifiers.shift,
            alt: keystroke.modifiers.alt,
        };

        let handled = match default_key_binding(&chord) {
            Some(name) => self.key_command(name),
            None => self.default_edit(keystroke),
        };
        if handled {
            cx.stop_propagation();
            cx.notify();
        }
    }

    /// Key commands the rich-text layer declines fall back to plain editing.
    fn key_command(&mut self, name: &str) -> bool {
        if self.editor.handle_key_command(name).is_handled() {
            return true;
        }
        let fallback = match name {
            "backspace" => "edit.backspace",
            "delete" => "edit.delete",
            "split-block" => "edit.split_block",
            _ => return false,
        };
        self.run(fallback, None)
    }

    fn default_edit(&mut self, keystroke: &Keystroke) -> bool {
        let extend = json!({ "extend": keystroke.modifiers.shift });
        match keystroke.key.as_str() {
            "left" => self.run("edit.move_left", Some(extend)),
            "right" => self.run("edit.move_right", Some(extend)),
            _ => {
                if keystroke.modifiers.secondary() || keystroke.modifiers.control {
                    return false;
                }
                let Some(text) = keystroke.key_char.clone() else {
                    return false;
                };
                self.run("edit.insert_text", Some(json!({ "text": text })))
            }
        }
    }

    fn toggle_block_type(&mut self, kind: BlockType, cx: &mut Context<Self>) {
        if let Err(err) = self.editor.toggle_block_type(kind) {
            log::debug!("toggle {kind}: {err}");
        }
        cx.notify();
    }

    fn toggle_inline_style(&mut self, style: InlineStyle, cx: &mut Context<Self>) {
        if let Err(err) = self.editor.toggle_inline_style(style) {
            log::debug!("toggle {style}: {err}");
        }
        cx.notify();
    }

    fn log_html(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let html = export_html(&self.editor);
        log::info!("{html}");
        match self.editor.to_raw().to_json_pretty() {
            Ok(json) => log::debug!("raw content:\n{json}"),
            Err(err) => log::warn!("raw content is not serializable: {err}"),
        }
        window.push_notification(
            Notification::new().message(format!("Logged {} bytes of HTML", html.len())),
            cx,
        );
    }

    fn clean(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.editor.replace_document(Document::empty());
        window.focus(&self.focus_handle);
        cx.notify();
    }

    fn export_docx(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let html = export_html(&self.editor);
        let pipeline = self.export.clone();
        let directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let picked = cx.prompt_for_new_path(&directory, Some(&self.download_name));

        cx.spawn_in(window, async move |_, window| {
            let path: PathBuf = picked.await.ok()?.ok()??;
            let result = window
                .background_executor()
                .spawn(async move {
                    let exported = pipeline.submit(&html)?;
                    exported.save_as(&path)?;
                    Ok::<_, rich_editor_remote::RemoteError>(path)
                })
                .await;

            let message = match result {
                Ok(path) => format!("Exported to {}", path.display()),
                Err(err) => format!("Export failed: {err}"),
            };
            window
                .update(|window, cx| {
                    window.push_notification(Notification::new().message(message), cx);
                })
                .ok();

            Some(())
        })
        .detach();
    }

    fn import_document(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let picked = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: false,
            prompt: Some("Import document".into()),
        });
        let pipeline = self.import.clone();
        let this = cx.entity();

        cx.spawn_in(window, async move |_, window| {
            let path: PathBuf = picked.await.ok()?.ok()??.into_iter().next()?;
            let result = window
                .background_executor()
                .spawn({
                    let path = path.clone();
                    async move { pipeline.run(&path) }
                })
                .await;

            window
                .update(|window, cx| match result {
                    Ok(doc) => {
                        _ = this.update(cx, |this, cx| {
                            this.editor.replace_document(doc);
                            cx.notify();
                        });
                        let message = format!("Imported {}", path.display());
                        window.push_notification(Notification::new().message(message), cx);
                    }
                    Err(err) => {
                        let message = format!("Import failed: {err}");
                        window.push_notification(Notification::new().message(message), cx);
                    }
                })
                .ok();

            Some(())
        })
        .detach();
    }

    fn attach_image(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let picked = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: false,
            prompt: Some("Attach image".into()),
        });
        let this = cx.entity();

        cx.spawn_in(window, async move |_, window| {
            let path: PathBuf = picked.await.ok()?.ok()??.into_iter().next()?;
            let loaded = window
                .background_executor()
                .spawn({
                    let path = path.clone();
                    async move { std::fs::read(&path).map(|bytes| data_url(&path, &bytes)) }
                })
                .await;

            window
                .update(|window, cx| match loaded {
                    Ok(src) => {
                        let alt = path
                            .file_name()
                            .map(|name| name.to_string_lossy().to_string());
                        let attached = this.update(cx, |this, cx| {
                            let attached = this.insert_image(src, alt);
                            cx.notify();
                            attached
                        });
                        if !attached {
                            window.push_notification(
                                Notification::new().message("Could not attach the image here"),
                                cx,
                            );
                        }
                    }
                    Err(err) => {
                        let message = format!("Failed to read {}: {err}", path.display());
                        window.push_notification(Notification::new().message(message), cx);
                    }
                })
                .ok();

            Some(())
        })
        .detach();
    }

    /// Attaches the image to the selection, or to a placeholder inserted at
    /// the caret.
    fn insert_image(&mut self, src: String, alt: Option<String>) -> bool {
        if self.editor.selection().is_collapsed() {
            if !self.run(
                "edit.insert_text",
                Some(json!({ "text": IMAGE_PLACEHOLDER })),
            ) {
                return false;
            }
            self.run("edit.move_left", Some(json!({ "extend": true })));
        }
        self.run(
            "entity.attach_image",
            Some(json!({ "src": src, "alt": alt })),
        )
    }

    fn caret(&self, window: &Window) -> Option<(usize, usize)> {
        if !self.focus_handle.is_focused(window) {
            return None;
        }
        let focus = &self.editor.selection().focus;
        let block = self.editor.doc().blocks.get(focus.path.block)?;
        Some((
            focus.path.block,
            block.global_offset(focus.path.leaf, focus.offset),
        ))
    }
}

fn data_url(path: &Path, bytes: &[u8]) -> String {
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

impl Focusable for RichEditorDemo {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for RichEditorDemo {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let palette = Palette::new(window.text_style(), cx.theme());
        let caret = self.caret(window);
        let blocks = render_document(self.editor.doc(), caret, &palette);
        let doc = self.editor.doc();
        let show_placeholder = caret.is_none() && doc.blocks.len() == 1 && doc.blocks[0].is_empty();
        let entity = cx.entity();
        let theme = cx.theme();

        div()
            .size_full()
            .flex()
            .flex_col()
            .bg(theme.muted)
            .child(
                div()
                    .w_full()
                    .flex()
                    .flex_col()
                    .gap(px(4.))
                    .p(px(8.))
                    .bg(theme.background)
                    .border_b_1()
                    .border_color(theme.border)
                    .child(BlockStyleControls::new(block_style_controls(&self.editor), {
                        let entity = entity.clone();
                        move |kind, _window, cx| {
                            entity.update(cx, |this, cx| this.toggle_block_type(kind, cx));
                        }
                    }))
                    .child(InlineStyleControls::new(inline_style_controls(&self.editor), {
                        let entity = entity.clone();
                        move |style, _window, cx| {
                            entity.update(cx, |this, cx| this.toggle_inline_style(style, cx));
                        }
                    }))
                    .child(
                        div()
                            .flex()
                            .flex_row()
                            .gap(px(4.))
                            .child(
                                Button::new("log")
                                    .ghost()
                                    .label("Log")
                                    .tooltip("Log the HTML export")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.log_html(window, cx);
                                    })),
                            )
                            .child(
                                Button::new("clean")
                                    .ghost()
                                    .label("Clean")
                                    .tooltip("Start over with an empty document")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.clean(window, cx);
                                    })),
                            )
                            .child(
                                Button::new("export")
                                    .ghost()
                                    .label("Export")
                                    .tooltip("Export to DOCX")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.export_docx(window, cx);
                                    })),
                            )
                            .child(
                                Button::new("import")
                                    .ghost()
                                    .label("Import")
                                    .tooltip("Replace the content with a converted document")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.import_document(window, cx);
                                    })),
                            )
                            .child(
                                Button::new("attach-image")
                                    .ghost()
                                    .label("Attach image")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.attach_image(window, cx);
                                    })),
                            ),
                    ),
            )
            .child(
                div().flex_1().p(px(16.)).child(
                    div()
                        .id("rich-editor-surface")
                        .track_focus(&self.focus_handle)
                        .on_key_down(cx.listener(Self::on_key_down))
                        .on_mouse_down(
                            MouseButton::Left,
                            cx.listener(|this, _, window, cx| {
                                window.focus(&this.focus_handle);
                                cx.notify();
                            }),
                        )
                        .size_full()
                        .max_w(px(960.))
                        .p(px(24.))
                        .bg(theme.background)
                        .border_1()
                        .border_color(theme.border)
                        .rounded(px(12.))
                        .overflow_y_scroll()
                        .when(show_placeholder, |this| {
                            this.child(
                                div()
                                    .text_color(theme.muted_foreground)
                                    .child("Enter some text..."),
                            )
                        })
                        .when(!show_placeholder, |this| this.children(blocks)),
                ),
            )
    }
}
