use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "parley", about = "Parley - terminal client for the Parley chat service")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// API base URL (default: http://localhost:8080/api)
        #[arg(long)]
        api_url: Option<String>,

        /// WebSocket base URL (default: ws://localhost:8080)
        #[arg(long)]
        ws_url: Option<String>,
    },

    /// Create an account and log in
    Register,

    /// Forget the stored session
    Logout,

    /// List your chat rooms
    Rooms,

    /// Create a group room
    CreateRoom {
        /// Room name
        name: String,

        /// Room description
        #[arg(short, long)]
        description: Option<String>,

        /// Member user ids
        #[arg(short, long = "member")]
        members: Vec<i64>,
    },

    /// Open (or create) a direct chat with a user
    Direct {
        /// User id
        user_id: i64,
    },

    /// Add a user to a room
    Invite {
        /// Room id
        room_id: i64,

        /// User id
        user_id: i64,
    },

    /// Remove a user from a room
    Kick {
        /// Room id
        room_id: i64,

        /// User id
        user_id: i64,
    },

    /// List users
    Users {
        /// Filter by name or email
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show recent messages in a room
    Messages {
        /// Room id
        room_id: i64,

        /// Number of messages to fetch
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Join a room and chat interactively
    Chat {
        /// Room id
        room_id: i64,
    },

    /// Show who is online
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Login { api_url, ws_url } => commands::auth::login(api_url, ws_url).await,
        Commands::Register => commands::auth::register().await,
        Commands::Logout => commands::auth::logout(),
        Commands::Rooms => commands::rooms::list().await,
        Commands::CreateRoom {
            name,
            description,
            members,
        } => commands::rooms::create(&name, description, members).await,
        Commands::Direct { user_id } => commands::rooms::direct(user_id).await,
        Commands::Invite { room_id, user_id } => commands::rooms::invite(room_id, user_id).await,
        Commands::Kick { room_id, user_id } => commands::rooms::kick(room_id, user_id).await,
        Commands::Users { search } => commands::users::list(search.as_deref()).await,
        Commands::Messages { room_id, lines } => commands::messages::run(room_id, lines).await,
        Commands::Chat { room_id } => commands::chat::run(room_id).await,
        Commands::Status => commands::status::run().await,
    }
}
