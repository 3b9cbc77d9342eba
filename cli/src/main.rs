mod commands;
mod config;
mod session;
mod spoonacular;
mod supabase;

#[cfg(test)]
mod stub;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    App, cmd_browse, cmd_comment, cmd_favorite, cmd_favorites, cmd_ingredients, cmd_login,
    cmd_logout, cmd_rate, cmd_recipe, cmd_redirect, cmd_register, cmd_rename,
    cmd_reset_password, cmd_search, cmd_suggest, cmd_update_password, cmd_whoami,
};
use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "pantry",
    version,
    about = "Find recipes from what is in your fridge",
    long_about = "\nPick the ingredients you have, find recipes that use them, \
and keep your favorites and ratings in your Supabase account."
)]
struct Cli {
    /// Extra configuration file, read after the defaults and PANTRY_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog ingredients, filter them and preview a selection
    Ingredients {
        /// Show ingredients whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Show every ingredient
        #[arg(long)]
        all: bool,
        /// Ingredient key to select (repeatable)
        #[arg(long = "select", value_name = "KEY")]
        select: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest ingredient keys the recipe API understands
    Suggest {
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find recipes that use the given ingredient keys
    Search {
        /// Ingredient keys (see `pantry ingredients`)
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with your favorite state and rating
    Recipe {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Favorite a recipe, or unfavorite it if it already is
    Favorite {
        id: i64,
        /// Title to store with the favorite (default: fetched from the recipe)
        #[arg(long)]
        title: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a recipe from 0.5 to 5 stars in half steps
    Rate {
        id: i64,
        /// Stars, e.g. 4 or 4.5 (0 keeps your current rating)
        value: String,
        /// Comment to save with the rating
        #[arg(short, long)]
        comment: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Comment on a recipe you have already rated
    Comment {
        id: i64,
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your favorite recipes with your ratings
    Favorites {
        /// Remove this recipe from your favorites first
        #[arg(long, value_name = "ID")]
        remove: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session: pick, search, open and rate in one place
    Browse,
    /// Account management
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create an account (asks for the password)
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Sign in (asks for the password)
    Login {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Sign out and forget the stored session
    Logout {
        #[arg(long)]
        json: bool,
    },
    /// Email a password reset link
    ResetPassword {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Set a new password (asks for it twice)
    UpdatePassword {
        #[arg(long)]
        json: bool,
    },
    /// Change your display name
    Rename {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Show who is signed in
    Whoami {
        #[arg(long)]
        json: bool,
    },
    /// Open a link from an auth email (e.g. a password recovery link)
    Redirect {
        url: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.settings.log_level);
    let app = App::new(&config)?;

    match cli.command {
        Commands::Ingredients {
            search,
            all,
            select,
            json,
        } => cmd_ingredients(&app, search.as_deref(), all, &select, json).await,
        Commands::Suggest { query, json } => cmd_suggest(&app, &query, json).await,
        Commands::Search { keys, json } => cmd_search(&app, &keys, json).await,
        Commands::Recipe { id, json } => cmd_recipe(&app, id, json).await,
        Commands::Favorite { id, title, json } => cmd_favorite(&app, id, title, json).await,
        Commands::Rate {
            id,
            value,
            comment,
            json,
        } => cmd_rate(&app, id, &value, comment.as_deref(), json).await,
        Commands::Comment { id, text, json } => cmd_comment(&app, id, &text, json).await,
        Commands::Favorites { remove, json } => cmd_favorites(&app, remove, json).await,
        Commands::Browse => cmd_browse(&app).await,
        Commands::Auth { command } => match command {
            AuthCommands::Register { name, email, json } => {
                cmd_register(&app, name, email, json).await
            }
            AuthCommands::Login { email, json } => cmd_login(&app, email, json).await,
            AuthCommands::Logout { json } => cmd_logout(&app, json).await,
            AuthCommands::ResetPassword { email, json } => {
                cmd_reset_password(&app, email, json).await
            }
            AuthCommands::UpdatePassword { json } => cmd_update_password(&app, json).await,
            AuthCommands::Rename { name, json } => cmd_rename(&app, &name, json).await,
            AuthCommands::Whoami { json } => cmd_whoami(&app, json).await,
            AuthCommands::Redirect { url, json } => cmd_redirect(&app, &url, json).await,
        },
    }
}
