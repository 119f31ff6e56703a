use rich_editor_core::{
    CommandError, CommandSpec, Document, Editor, PluginRegistry, RichEditorPlugin, Selection,
};

struct ShoutPlugin;

impl RichEditorPlugin for ShoutPlugin {
    fn id(&self) -> &'static str {
        "shout"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("shout.insert", |editor, _args| {
            editor.run_command(
                "edit.insert_text",
                Some(serde_json::json!({ "text": "HEY" })),
            )
        })]
    }
}

struct ClashingPlugin;

impl RichEditorPlugin for ClashingPlugin {
    fn id(&self) -> &'static str {
        "clash"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("history.undo", |_editor, _args| {
            Err(CommandError::new("never runs"))
        })]
    }
}

#[test]
fn plugin_commands_are_registered_by_id() {
    let mut registry = PluginRegistry::rich_utils();
    registry.register_plugin(Box::new(ShoutPlugin)).unwrap();
    assert!(registry.command("shout.insert").is_some());

    let doc = Document::from_text("");
    let selection = Selection::collapsed(doc.end_point());
    let mut editor = Editor::new(doc, selection, registry);
    editor.run_command("shout.insert", None).unwrap();
    assert_eq!(editor.plain_text(), "HEY");
}

#[test]
fn duplicate_command_ids_are_rejected() {
    let mut registry = PluginRegistry::rich_utils();
    let err = registry.register_plugin(Box::new(ClashingPlugin)).unwrap_err();
    assert!(err.contains("history.undo"));
}

#[test]
fn unknown_commands_are_errors() {
    let mut editor = Editor::with_rich_utils();
    assert!(editor.run_command("shout.insert", None).is_err());
}
