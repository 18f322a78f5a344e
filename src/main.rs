use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use filoprompt::cli;
use filoprompt::cli::render::RenderOptions;
use filoprompt::model::{OperationType, StyleStrategy};

#[derive(Parser)]
#[command(name = "filoprompt", version)]
#[command(about = "Test email-assistant prompts against real messages", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (default: from config, "127.0.0.1:3000")
        #[arg(long)]
        bind: Option<String>,

        /// SQLite database file (default: <data_dir>/filoprompt.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (defaults to ./filoprompt.toml or ~/.config/filoprompt/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Answer AI calls with the mock client
        #[arg(long)]
        dry_run: bool,
    },

    /// Import .eml files into the test set
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Re-extract bodies of stored emails
    Reparse {
        /// Also rebuild emails that already have a substantial body
        #[arg(long)]
        force_all: bool,

        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Print the clean-for-AI rendering of an .eml file
    Clean { file: PathBuf },

    /// Print the final prompt for an operation
    Render {
        /// new_email, reply_email, forward_email, summarize, extract_action_items, todo
        #[arg(long)]
        operation: OperationType,

        /// Stored email to use as the selected message
        #[arg(long)]
        email: Option<String>,

        /// Prompt file to render instead of the saved operation prompt
        #[arg(long)]
        template: Option<PathBuf>,

        /// The user's draft or instruction
        #[arg(long)]
        input: Option<String>,

        #[arg(long)]
        sender_name: Option<String>,

        #[arg(long)]
        sender_email: Option<String>,

        /// professional, casual, concise, detailed, friendly
        #[arg(long)]
        style: Option<StyleStrategy>,

        #[arg(long)]
        locale: Option<String>,

        #[arg(long)]
        instruction: Option<String>,

        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Diagnose config, API keys, env file and database
    ConfigCheck {
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            db,
            config,
            dry_run,
        } => cli::serve::run(config, bind, db, dry_run).await?,
        Commands::Import { files, db, config } => cli::import::run(config, db, files)?,
        Commands::Reparse {
            force_all,
            db,
            config,
        } => cli::reparse::run(config, db, force_all)?,
        Commands::Clean { file } => cli::clean::run(&file)?,
        Commands::Render {
            operation,
            email,
            template,
            input,
            sender_name,
            sender_email,
            style,
            locale,
            instruction,
            db,
            config,
        } => cli::render::run(RenderOptions {
            config_path: config,
            db,
            operation,
            email_id: email,
            template,
            user_input: input,
            sender_name,
            sender_email,
            style,
            locale,
            custom_instruction: instruction,
        })?,
        Commands::ConfigCheck { db, config } => cli::config_check::run(config, db)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["filoprompt", "serve"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Serve {
                bind,
                db,
                config,
                dry_run,
            } => {
                assert!(bind.is_none());
                assert!(db.is_none());
                assert!(config.is_none());
                assert!(!dry_run);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_serve_with_all_args() {
        let cli = Cli::try_parse_from([
            "filoprompt",
            "-v",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--db",
            "/tmp/x.db",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve {
                bind, db, dry_run, ..
            } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:8080"));
                assert_eq!(db, Some(PathBuf::from("/tmp/x.db")));
                assert!(dry_run);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_import_requires_files() {
        assert!(Cli::try_parse_from(["filoprompt", "import"]).is_err());
        let cli = Cli::try_parse_from(["filoprompt", "import", "a.eml", "b.eml"]).unwrap();
        match cli.command {
            Commands::Import { files, .. } => assert_eq!(files.len(), 2),
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_parse_render_operation() {
        let cli = Cli::try_parse_from([
            "filoprompt",
            "render",
            "--operation",
            "reply_email",
            "--style",
            "casual",
            "--input",
            "sounds good",
        ])
        .unwrap();
        match cli.command {
            Commands::Render {
                operation,
                style,
                input,
                ..
            } => {
                assert_eq!(operation, OperationType::ReplyEmail);
                assert_eq!(style, Some(StyleStrategy::Casual));
                assert_eq!(input.as_deref(), Some("sounds good"));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_render_rejects_unknown_operation() {
        assert!(Cli::try_parse_from(["filoprompt", "render", "--operation", "shout"]).is_err());
    }

    #[test]
    fn test_parse_reparse_and_config_check() {
        let cli = Cli::try_parse_from(["filoprompt", "reparse", "--force-all"]).unwrap();
        assert!(matches!(cli.command, Commands::Reparse { force_all: true, .. }));
        let cli = Cli::try_parse_from(["filoprompt", "config-check"]).unwrap();
        assert!(matches!(cli.command, Commands::ConfigCheck { .. }));
    }

    #[test]
    fn test_parse_missing_subcommand() {
        assert!(Cli::try_parse_from(["filoprompt"]).is_err());
    }
}
