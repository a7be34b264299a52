//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scheme CLI - Extract retail scheme records from brand emails.
#[derive(Debug, Parser)]
#[command(name = "scheme")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format (full result)
    Json,
    /// Flat persisted rows as JSON lines
    Rows,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract schemes from one email
    Extract(ExtractArgs),

    /// Show the classification rule table, optionally scanning text
    Rules(RulesArgs),

    /// Print an extractor configuration preset as TOML
    ShowConfig(ShowConfigArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Email body file ("-" reads stdin)
    pub body: PathBuf,

    /// Email subject (recovered from the body when omitted)
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Extracted table text, as label=path (repeatable)
    #[arg(short, long = "table", value_name = "LABEL=PATH")]
    pub tables: Vec<String>,

    /// Prior summary JSON file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Source document name recorded on every scheme
    #[arg(long)]
    pub source_file: Option<String>,

    /// Extractor configuration TOML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Classification rules TOML file
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Extraction mode (overrides the config file)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Keep the stage trace in the output
    #[arg(long)]
    pub audit: bool,

    /// Model identifier
    #[arg(long, default_value = "qwen/qwen3-next-80b-a3b-instruct")]
    pub model: String,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Chat completions endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Extraction mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Seven-stage pipeline
    Staged,
    /// One prompt, one call
    SingleShot,
}

/// Arguments for the rules command.
#[derive(Debug, Parser)]
pub struct RulesArgs {
    /// Classification rules TOML file (default table when omitted)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Text to scan with the rule table
    #[arg(long)]
    pub classify: Option<String>,

    /// Prefer the group with the most distinct keyword hits
    #[arg(long)]
    pub most_keywords: bool,
}

/// Arguments for the show-config command.
#[derive(Debug, Parser)]
pub struct ShowConfigArgs {
    /// Preset to print
    #[arg(value_enum, default_value = "default")]
    pub preset: PresetArg,
}

/// Configuration preset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// Single-shot, tighter windows
    Aggressive,
    /// Long timeouts, audit on
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "scheme",
            "extract",
            "mail.txt",
            "--subject",
            "JBP Q1",
            "-t",
            "vendors.csv=vendors.txt",
            "--mode",
            "single-shot",
            "--api-key",
            "sk-test",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, CliFormat::Json);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.body, PathBuf::from("mail.txt"));
                assert_eq!(args.subject.as_deref(), Some("JBP Q1"));
                assert_eq!(args.tables, vec!["vendors.csv=vendors.txt".to_string()]);
                assert_eq!(args.mode, Some(ModeArg::SingleShot));
                assert!(!args.audit);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_show_config_default_preset() {
        let cli = Cli::try_parse_from(["scheme", "show-config"]).unwrap();
        match cli.command {
            Command::ShowConfig(args) => assert_eq!(args.preset, PresetArg::Default),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scheme", "rules", "-v", "--no-color"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
    }
}
