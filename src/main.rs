use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;

use hr_chat::commands::{self, Workspace};
use hr_chat::config::Config;
use hr_chat::events::UserRole;
use hr_chat::logging;
use hr_chat::ui::App;
use hr_chat::ui::conversation::ConversationManager;

#[derive(Parser)]
#[command(name = "hr-chat")]
#[command(version)]
#[command(about = "Chat with the HR knowledge assistant", long_about = None)]
struct Cli {
    /// Role to ask as (employee, hr, manager)
    #[arg(long, global = true)]
    role: Option<UserRole>,

    /// Backend base URL (overrides config and HR_CHAT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding saved chats
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved chats
    Sessions,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Continue an existing chat instead of starting a new one
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the messages of a chat
    Show { id: String },
    /// Delete a chat and its history
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = &cli.api_url {
        config.set_api_base_url(url);
    }
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    let role = cli.role.unwrap_or(config.default_role);

    logging::init(&config, cli.verbose, cli.command.is_none())?;
    tracing::info!(api = %config.api_base_url, role = %role, "starting hr-chat");

    match cli.command {
        None => {
            let ui = config.ui.clone();
            let workspace = Workspace::open(config);
            let backend = workspace.http_backend()?;
            let controller = workspace.controller(backend, role);

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let manager =
                ConversationManager::new(controller, workspace.sessions.clone(), &ui, events_tx);
            App::new(workspace.sessions.clone(), manager, events_rx)
                .run()
                .await
        }
        Some(Commands::Sessions) => {
            let workspace = Workspace::open_loaded(config);
            commands::list_sessions(&workspace)
        }
        Some(Commands::Ask { query, session }) => {
            let workspace = Workspace::open_loaded(config);
            let backend = workspace.http_backend()?;
            let query = query.join(" ");
            commands::ask(&workspace, backend, &query, session.as_deref(), role).await
        }
        Some(Commands::Show { id }) => {
            let workspace = Workspace::open_loaded(config);
            commands::show_session(&workspace, &id)
        }
        Some(Commands::Delete { id }) => {
            let workspace = Workspace::open_loaded(config);
            commands::delete_session(&workspace, &id)
        }
    }
}
