use clap::Parser;
use scheme_cli::cli::{Cli, Command, ExtractArgs};
use scheme_cli::commands::extract::{build_request, load_config, report, run_extraction};
use scheme_cli::commands::rules::load_rules;
use scheme_cli::{CliError, Formatter, OutputFormat};
use scheme_domain::SchemeType;
use scheme_extractor::{ExtractionMode, Extractor};
use scheme_llm::MockProvider;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SINGLE_SHOT_REPLY: &str = r#"```json
{
  "schemes": [
    {
      "scheme_type": "BUY_SIDE",
      "scheme_sub_type": "PERIODIC_CLAIM",
      "scheme_name": "Acme JBP Q1",
      "duration_start_date": "2024-01-01",
      "duration_end_date": "2024-03-31",
      "discount_type": "Percentage of NLC",
      "discount_value": "5%",
      "vendors": [{"vendor_name": "Acme Corp", "location": "Mumbai", "amount": 20000}],
      "confidence": 0.9
    }
  ]
}
```"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

fn parse_extract(args: &[&str]) -> ExtractArgs {
    let mut argv = vec!["scheme", "extract"];
    argv.extend_from_slice(args);
    argv.extend_from_slice(&["--api-key", "sk-test"]);
    match Cli::try_parse_from(argv).unwrap().command {
        Command::Extract(args) => args,
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_build_request_from_files() {
    let dir = TempDir::new().unwrap();
    let body = write(dir.path(), "acme_jbp.txt", "Please find the Q1 plan attached.");
    let table = write(dir.path(), "vendors.txt", "Vendor,Location,Amount\nAcme Corp,Mumbai,20000");
    let summary = write(dir.path(), "summary.json", r#"{"total": 20000}"#);
    let table_arg = format!("vendors.csv={}", table);

    let args = parse_extract(&[
        &body,
        "--subject",
        "JBP Q1 2024",
        "--table",
        &table_arg,
        "--summary",
        &summary,
    ]);
    let request = build_request(&args).unwrap();

    assert_eq!(request.subject, "JBP Q1 2024");
    assert_eq!(request.body, "Please find the Q1 plan attached.");
    assert_eq!(request.tables.len(), 1);
    assert_eq!(request.tables[0].label, "vendors.csv");
    assert!(request.tables[0].content.contains("Acme Corp"));
    assert_eq!(request.prior_summary.unwrap()["total"], 20000);
    assert_eq!(request.source_file.as_deref(), Some("acme_jbp.txt"));
}

#[test]
fn test_build_request_recovers_subject() {
    let dir = TempDir::new().unwrap();
    let body = write(
        dir.path(),
        "mail.txt",
        "Gmail\nInbox\nMail - Price protection March 2024\n\nDear partner,",
    );

    let args = parse_extract(&[&body, "--source-file", "march_pp.pdf"]);
    let request = build_request(&args).unwrap();

    assert_eq!(request.subject, "Price protection March 2024");
    assert_eq!(request.source_file.as_deref(), Some("march_pp.pdf"));
}

#[test]
fn test_build_request_missing_body() {
    let args = parse_extract(&["/nonexistent/mail.txt"]);
    assert!(matches!(build_request(&args), Err(CliError::Io(_))));
}

#[test]
fn test_load_config_with_overrides() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "extractor.toml", "stage_timeout_secs = 30\n");

    let args = parse_extract(&["mail.txt", "--config", &config, "--mode", "single-shot", "--audit"]);
    let config = load_config(&args).unwrap();

    assert_eq!(config.stage_timeout_secs, 30);
    assert_eq!(config.mode, ExtractionMode::SingleShot);
    assert!(config.audit);
}

#[test]
fn test_load_config_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "extractor.toml", "max_context_chars = 0\n");

    let args = parse_extract(&["mail.txt", "--config", &config]);
    assert!(matches!(load_config(&args), Err(CliError::Extractor(_))));
}

#[test]
fn test_load_rules_from_file() {
    let dir = TempDir::new().unwrap();
    let rules = write(
        dir.path(),
        "rules.toml",
        r#"
[[groups]]
scheme_type = "SELL_SIDE"
scheme_sub_type = "COUPON"
keywords = ["voucher"]
"#,
    );

    let rules = load_rules(Some(Path::new(&rules))).unwrap();
    assert_eq!(rules.groups.len(), 1);
    assert_eq!(rules.groups[0].scheme_type, SchemeType::SellSide);
}

#[tokio::test]
async fn test_run_extraction_single_shot() {
    let dir = TempDir::new().unwrap();
    let body = write(dir.path(), "acme_jbp.txt", "Q1 joint business plan for Acme Corp.");

    let args = parse_extract(&[&body, "--subject", "JBP Q1 2024", "--mode", "single-shot"]);
    let config = load_config(&args).unwrap();
    let request = build_request(&args).unwrap();

    let extractor = Extractor::new(MockProvider::new(SINGLE_SHOT_REPLY), config);
    let formatter = Formatter::new(OutputFormat::Rows, false);
    let (result, rendered) = run_extraction(&extractor, request, &formatter).await.unwrap();

    assert_eq!(extractor.provider().call_count(), 1);
    assert_eq!(result.schemes.len(), 1);
    assert_eq!(result.schemes[0].source_file.as_deref(), Some("acme_jbp.txt"));

    let row: serde_json::Value = serde_json::from_str(rendered.lines().next().unwrap()).unwrap();
    assert_eq!(row["scheme_name"], "Acme JBP Q1");
    assert_eq!(row["discount_type"], "PERCENTAGE");
    assert_eq!(row["discount_value"], 5.0);
    assert_eq!(row["vendors"], "Acme Corp (Mumbai): 20000");
    assert!(report(&result, &formatter).is_ok());
}

#[tokio::test]
async fn test_failed_attempt_reports_error() {
    let dir = TempDir::new().unwrap();
    let body = write(dir.path(), "mail.txt", "Body");

    let args = parse_extract(&[&body, "--subject", "s", "--mode", "single-shot"]);
    let provider = MockProvider::new("");
    provider.push_error(scheme_llm::LlmError::Communication("connection reset".to_string()));
    let extractor = Extractor::new(provider, load_config(&args).unwrap());

    let formatter = Formatter::new(OutputFormat::Json, false);
    let (result, rendered) = run_extraction(&extractor, build_request(&args).unwrap(), &formatter)
        .await
        .unwrap();

    assert!(result.is_terminal());
    assert!(rendered.contains("connection reset"));
    assert!(matches!(report(&result, &formatter), Err(CliError::Extractor(_))));
}
