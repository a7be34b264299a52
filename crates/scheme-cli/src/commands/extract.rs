//! Extract command implementation.

use crate::cli::{ExtractArgs, ModeArg};
use crate::commands::rules::load_rules;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use scheme_domain::ReasoningProvider;
use scheme_extractor::{
    subject_from_text, ExtractionMode, ExtractionRequest, ExtractionResult, Extractor,
    ExtractorConfig, TableText,
};
use scheme_llm::OpenRouterProvider;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl From<ModeArg> for ExtractionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Staged => ExtractionMode::Staged,
            ModeArg::SingleShot => ExtractionMode::SingleShot,
        }
    }
}

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, formatter: &Formatter) -> Result<()> {
    let config = load_config(&args)?;
    let rules = load_rules(args.rules.as_deref())?;
    let request = build_request(&args)?;

    let mut provider = OpenRouterProvider::new(args.api_key.as_str(), args.model.as_str())?
        .with_timeout(config.stage_timeout_secs)?;
    if let Some(endpoint) = &args.endpoint {
        provider = provider.with_endpoint(endpoint.as_str());
    }

    let extractor = Extractor::try_new(provider, config)?.with_rules(rules);
    let result = extractor.extract(request).await;
    report(&result, formatter)
}

/// Print a result; a failed attempt still prints, then surfaces as an error.
pub fn report(result: &ExtractionResult, formatter: &Formatter) -> Result<()> {
    println!("{}", formatter.format_result(result)?);
    match &result.failure {
        Some(failure) => Err(CliError::Extractor(failure.clone())),
        None => Ok(()),
    }
}

/// Run one attempt against any provider and format the outcome.
pub async fn run_extraction<L>(
    extractor: &Extractor<L>,
    request: ExtractionRequest,
    formatter: &Formatter,
) -> Result<(ExtractionResult, String)>
where
    L: ReasoningProvider + Send + Sync + 'static,
{
    let result = extractor.extract(request).await;
    let rendered = formatter.format_result(&result)?;
    Ok((result, rendered))
}

/// Resolve the extractor configuration from the file and flag overrides.
pub fn load_config(args: &ExtractArgs) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            debug!("Loading extractor config from {}", path.display());
            ExtractorConfig::from_file(path)?
        }
        None => ExtractorConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if args.audit {
        config.audit = true;
    }
    config.validate()?;
    Ok(config)
}

/// Assemble the request from the body, tables and summary files.
pub fn build_request(args: &ExtractArgs) -> Result<ExtractionRequest> {
    let body = read_body(&args.body)?;
    let subject = match &args.subject {
        Some(subject) => subject.clone(),
        None => {
            let recovered = subject_from_text(&body);
            info!("Recovered subject: '{}'", recovered);
            recovered
        }
    };

    let mut request = ExtractionRequest::new(subject, body);
    for arg in &args.tables {
        let (label, path) = parse_table_arg(arg)?;
        let content = std::fs::read_to_string(&path)?;
        request = request.with_table(TableText::new(label, content));
    }

    if let Some(path) = &args.summary {
        let summary = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        request = request.with_prior_summary(summary);
    }

    let source = args.source_file.clone().or_else(|| {
        (args.body.as_path() != Path::new("-"))
            .then(|| args.body.file_name())
            .flatten()
            .map(|name| name.to_string_lossy().into_owned())
    });
    if let Some(source) = source {
        request = request.with_source_file(source);
    }

    Ok(request)
}

/// Split `label=path`; a bare path is labelled with its file name.
pub fn parse_table_arg(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((label, path)) => {
            if label.trim().is_empty() || path.trim().is_empty() {
                return Err(CliError::InvalidInput(format!(
                    "Table must be LABEL=PATH, got '{}'",
                    arg
                )));
            }
            Ok((label.trim().to_string(), PathBuf::from(path.trim())))
        }
        None => {
            let path = PathBuf::from(arg);
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| CliError::InvalidInput(format!("Not a table file: '{}'", arg)))?;
            Ok((label, path))
        }
    }
}

fn read_body(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        return Ok(body);
    }
    Ok(std::fs::read_to_string(path)?)
}
