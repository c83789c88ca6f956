//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use retext_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "retext")]
#[command(version)]
#[command(about = "Apply prompt-driven AI transformations to text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Applies one or more transformations and prints the result
    Transform {
        /// Transformation name or id (repeat to chain, applied in order)
        #[arg(short = 't', long = "transformation", value_name = "NAME", required = true)]
        transformations: Vec<String>,

        /// Read the text from a file instead of stdin
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Interactive editing session with undo/redo over versions
    Session {
        /// Load initial text from a file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage the transformation catalog
    Transforms {
        #[command(subcommand)]
        command: TransformsCommands,
    },

    /// Manage user details injected into prompts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TransformsCommands {
    /// Lists transformations
    List {
        /// Only show one category
        #[arg(short, long)]
        category: Option<String>,
        /// Case-insensitive substring match on name or category
        #[arg(short, long, value_name = "TEXT")]
        search: Option<String>,
    },
    /// Lists categories
    Categories,
    /// Imports markdown prompts from a directory (default: configured prompts dir)
    Import {
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Adds a custom transformation
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "Custom")]
        category: String,
        /// Prompt text sent to the model
        #[arg(long)]
        prompt: String,
    },
    /// Edits a transformation by id
    Edit {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Prompt text sent to the model
        #[arg(long)]
        prompt: Option<String>,
        /// Position within the category (lower first)
        #[arg(long, allow_hyphen_values = true)]
        sort_order: Option<i64>,
    },
    /// Removes a transformation by id
    Remove {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Shows one transformation's prompt
    Show {
        /// Name or id
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(clap::Subcommand)]
enum UserCommands {
    /// Sets a detail (e.g. `name "Dana Reyes"`)
    Set {
        #[arg(value_name = "LABEL")]
        label: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Removes a detail
    Unset {
        #[arg(value_name = "LABEL")]
        label: String,
    },
    /// Lists details
    List,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print a value by dotted key
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Set a value by dotted key
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init(Some(&config::paths::logs_dir())) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    match cli.command {
        Commands::Transform {
            transformations,
            file,
            model,
        } => {
            commands::transform::run(commands::transform::TransformOptions {
                config: &config,
                names: &transformations,
                file: file.as_deref(),
                model_override: model.as_deref(),
            })
            .await
        }

        Commands::Session { file, model } => {
            commands::session::run(&config, file.as_deref(), model.as_deref()).await
        }

        Commands::Transforms { command } => match command {
            TransformsCommands::List { category, search } => {
                commands::transforms::list(&config, category.as_deref(), search.as_deref())
            }
            TransformsCommands::Categories => commands::transforms::categories(&config),
            TransformsCommands::Import { dir } => {
                commands::transforms::import(&config, dir.as_deref())
            }
            TransformsCommands::Add {
                name,
                category,
                prompt,
            } => commands::transforms::add(&name, &category, &prompt),
            TransformsCommands::Edit {
                id,
                name,
                category,
                prompt,
                sort_order,
            } => commands::transforms::edit(
                id,
                &commands::transforms::EditOptions {
                    name: name.as_deref(),
                    category: category.as_deref(),
                    prompt: prompt.as_deref(),
                    sort_order,
                },
            ),
            TransformsCommands::Remove { id } => commands::transforms::remove(id),
            TransformsCommands::Show { name } => commands::transforms::show(&config, &name),
        },

        Commands::User { command } => match command {
            UserCommands::Set { label, value } => commands::user::set(&label, &value),
            UserCommands::Unset { label } => commands::user::unset(&label),
            UserCommands::List => {
                commands::user::list(&config);
                Ok(())
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Get { key } => commands::config::get(&key),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
        },
    }
}
