//! Rules command implementation.

use crate::cli::RulesArgs;
use crate::error::Result;
use crate::output::Formatter;
use scheme_extractor::{ClassificationRules, TieBreak};
use std::path::Path;
use tracing::debug;

/// Execute the rules command.
pub async fn execute_rules(args: RulesArgs, formatter: &Formatter) -> Result<()> {
    let rules = load_rules(args.rules.as_deref())?;
    let tie_break = if args.most_keywords {
        TieBreak::MostKeywords
    } else {
        TieBreak::FirstMatch
    };

    match &args.classify {
        Some(text) => {
            let hint = rules.classify_hint(text, tie_break);
            println!("{}", formatter.format_match(&hint)?);
        }
        None => println!("{}", formatter.format_rules(&rules, tie_break)?),
    }

    Ok(())
}

/// Load a rule table from TOML, or the default table.
pub fn load_rules(path: Option<&Path>) -> Result<ClassificationRules> {
    match path {
        Some(path) => {
            debug!("Loading classification rules from {}", path.display());
            let contents = std::fs::read_to_string(path)?;
            Ok(ClassificationRules::from_toml(&contents)?)
        }
        None => Ok(ClassificationRules::default()),
    }
}
