mod blocks;
mod editor_view;

use clap::Parser;
use gpui::*;
use gpui_component::Root;
use rich_editor_remote::{DEFAULT_BASE_URL, RemoteClient, RemoteConfig};

use crate::editor_view::RichEditorDemo;

#[derive(Debug, Parser)]
#[command(name = "rich-editor-demo", about = "Rich text editor with DOCX export and import")]
struct Cli {
    /// Base URL of the document service.
    #[arg(long, env = "RICH_EDITOR_API_BASE", default_value = DEFAULT_BASE_URL)]
    api_base: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let client = RemoteClient::new(RemoteConfig::with_base_url(cli.api_base))?;
    log::info!("document service at {}", client.config().base_url);

    let app = Application::new();
    app.run(move |cx| {
        gpui_component::init(cx);
        cx.activate(true);

        cx.spawn(async move |cx| {
            cx.open_window(
                WindowOptions {
                    titlebar: Some(TitlebarOptions {
                        title: Some("Rich Editor".into()),
                        appears_transparent: false,
                        traffic_light_position: None,
                    }),
                    ..Default::default()
                },
                |window, cx| {
                    let view = RichEditorDemo::view(client, window, cx);
                    cx.new(|cx| Root::new(view, window, cx))
                },
            )?;

            Ok::<_, anyhow::Error>(())
        })
        .detach();
    });
    Ok(())
}
