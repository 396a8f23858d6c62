use anyhow::Context;
use clap::{Parser, Subcommand};
use ferrotex_directive::{Config, Sanitizer, SymbolTable, evaluate, render_document, validate};
use log::LevelFilter;
use serde_json::json;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ferrotex")]
#[command(about = "FerroTeX directive sanitizer", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sanitize an expression and emit the result as JSON
    Sanitize {
        /// Expression to sanitize; read from stdin when omitted
        expression: Option<String>,
        /// Read the expression from a file
        #[arg(short, long, value_name = "FILE", conflicts_with = "expression")]
        file: Option<PathBuf>,
        /// JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Print the filled LaTeX wrapper document instead of JSON
        #[arg(long)]
        document: bool,
    },
    /// Run only the denylist pass and report what was neutralized
    Validate {
        /// Expression to validate; read from stdin when omitted
        expression: Option<String>,
    },
    /// Evaluate an \eval{} term
    Eval {
        term: String,
        /// Font size index bound to `fs` and `fontsize`
        #[arg(long, default_value_t = 4)]
        fontsize: i64,
    },
    /// Write the default configuration to a file
    InitConfig {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

fn read_expression(expression: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(expression) = expression {
        return Ok(expression);
    }
    if let Some(path) = file {
        return fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Sanitize {
            expression,
            file,
            config,
            document,
        } => {
            let config = match &config {
                Some(path) => Config::load(path)
                    .with_context(|| format!("loading configuration {}", path.display()))?,
                None => Config::default(),
            };
            let sanitizer = Sanitizer::new(config)?;
            log::debug!(
                "{} extra denylist rule(s), limit {} bytes",
                sanitizer.config().denylist.len(),
                sanitizer.config().max_expression_len
            );
            let input = read_expression(expression, file.as_deref())?;
            let sanitized = sanitizer.sanitize(&input)?;
            if document {
                print!("{}", render_document(&sanitized));
            } else {
                println!("{}", serde_json::to_string_pretty(&sanitized)?);
            }
        }
        Commands::Validate { expression } => {
            let mut text = read_expression(expression, None)?;
            let illegal_count = validate(&mut text);
            let report = json!({ "text": text, "illegal_count": illegal_count });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Eval { term, fontsize } => {
            let mut symbols = SymbolTable::new();
            symbols.insert("fontsize", fontsize);
            symbols.insert("fs", fontsize);
            println!("{}", evaluate(&symbols, &term)?);
        }
        Commands::InitConfig { path } => {
            Config::default().save(&path)?;
            log::info!("wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
