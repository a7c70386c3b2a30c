//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use biaslens_core::config::{AuditConfig, ConfigOverrides, RunOverrides, load_config};
use biaslens_core::{AuditReport, AuditRequest, Auditor, Backend, BackendKind, Catalog};
use std::path::{Path, PathBuf};

/// Exit status when `--fail-on-concern` is set and the summary lists concerns.
pub const CONCERN_EXIT_STATUS: u8 = 2;

/// Handle a CLI subcommand, returning the process exit status.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<u8> {
    match command {
        Commands::Audit {
            scenario,
            model,
            attributes,
            temperature,
            max_tokens,
            backend,
            concurrency,
            catalog,
            output,
            fail_on_concern,
        } => {
            let options = AuditOptions {
                scenario,
                model,
                attributes,
                temperature,
                max_tokens,
                backend,
                concurrency,
                catalog,
            };
            let report = run_audit(options, workspace).await?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }
            print_summary(&report);
            if fail_on_concern && report.summary.has_concerns() {
                return Ok(CONCERN_EXIT_STATUS);
            }
            Ok(0)
        }
        Commands::Scenarios { catalog } => handle_scenarios(catalog, workspace).map(|()| 0),
        Commands::Backend => handle_backend(workspace).map(|()| 0),
        Commands::Config { action } => handle_config(action, workspace).await.map(|()| 0),
    }
}

/// Command-line overrides for one audit.
struct AuditOptions {
    scenario: String,
    model: Option<String>,
    attributes: Vec<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    backend: Option<BackendKind>,
    concurrency: Option<usize>,
    catalog: Option<PathBuf>,
}

fn workspace_config(
    workspace: &Path,
    overrides: Option<&ConfigOverrides>,
) -> anyhow::Result<AuditConfig> {
    load_config(Some(workspace), overrides)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

async fn run_audit(options: AuditOptions, workspace: &Path) -> anyhow::Result<AuditReport> {
    let overrides = ConfigOverrides {
        catalog_path: options.catalog,
        run: RunOverrides {
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            max_concurrency: options.concurrency,
        },
        ..Default::default()
    };
    let mut config = workspace_config(workspace, Some(&overrides))?;
    if let Some(kind) = options.backend
        && kind != config.backend.kind
    {
        // A configured model belongs to the configured backend.
        config.backend.kind = kind;
        config.backend.model = None;
        config.backend.base_url = None;
    }

    tracing::debug!(
        backend = %config.backend.kind,
        max_concurrency = config.run.max_concurrency,
        "Resolved audit configuration"
    );
    let auditor = Auditor::from_config(&config)?;

    let mut request = AuditRequest::with_run_defaults(options.scenario, &config.run);
    if let Some(model) = options.model {
        request = request.model(model);
    }
    if !options.attributes.is_empty() {
        request = request.attributes(options.attributes);
    }

    Ok(auditor.run(&request).await?)
}

fn print_summary(report: &AuditReport) {
    eprintln!();
    eprintln!(
        "  {} ({} prompts, {} failed)",
        report.summary.overall_assessment, report.num_prompts, report.num_failed
    );
    for concern in &report.summary.concerns {
        eprintln!("  - {concern}");
    }
    eprintln!("  {}", report.summary.recommendation);
}

fn handle_scenarios(catalog: Option<PathBuf>, workspace: &Path) -> anyhow::Result<()> {
    let config = workspace_config(workspace, None)?;
    let catalog = match catalog.or(config.catalog_path) {
        Some(path) => Catalog::from_file(&path)?,
        None => Catalog::reference(),
    };

    let width = catalog
        .scenarios
        .iter()
        .map(|s| s.key.len())
        .max()
        .unwrap_or(0);
    for scenario in &catalog.scenarios {
        println!("  {:<width$}  {}", scenario.key, scenario.description);
    }
    println!();
    println!(
        "  Groups: {} ({} names each)",
        catalog.group_labels().join(", "),
        catalog.names_per_group()
    );
    Ok(())
}

fn handle_backend(workspace: &Path) -> anyhow::Result<()> {
    let config = workspace_config(workspace, None)?;
    let backend = Backend::from_config(&config.backend)?;
    println!("{}", serde_json::to_string_pretty(&backend.info())?);
    Ok(())
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".biaslens");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = AuditConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn mock_options(scenario: &str) -> AuditOptions {
        AuditOptions {
            scenario: scenario.to_string(),
            model: None,
            attributes: Vec::new(),
            temperature: None,
            max_tokens: None,
            backend: Some(BackendKind::Mock),
            concurrency: None,
            catalog: None,
        }
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();

        let config_path = workspace.join(".biaslens").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: AuditConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.backend.kind, BackendKind::Ollama);
        assert_eq!(parsed.run.max_tokens, 300);
        assert_eq!(parsed.thresholds.refusal.concern, 0.15);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        handle_command(Commands::Config { action: ConfigAction::Init }, workspace)
            .await
            .unwrap();
        let config_path = workspace.join(".biaslens").join("config.toml");
        let content_first = std::fs::read_to_string(&config_path).unwrap();

        handle_command(Commands::Config { action: ConfigAction::Init }, workspace)
            .await
            .unwrap();
        let content_second = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content_first, content_second);
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_scenarios_lists_reference_catalog() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Scenarios { catalog: None };
        assert!(handle_command(command, dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_audit_with_mock_backend() {
        let dir = TempDir::new().unwrap();
        let mut options = mock_options("credit");
        options.attributes = vec!["male_asian".into(), "female_asian".into()];
        options.temperature = Some(0.2);

        let report = run_audit(options, dir.path()).await.unwrap();
        assert_eq!(report.backend, "mock");
        assert_eq!(report.model, "mock-model");
        assert_eq!(report.num_prompts, 6);
        assert_eq!(report.parameters.temperature, 0.2);
        assert!(!report.summary.has_concerns());
    }

    #[tokio::test]
    async fn test_audit_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("report.json");
        let command = Commands::Audit {
            scenario: "hiring".into(),
            model: None,
            attributes: Vec::new(),
            temperature: None,
            max_tokens: None,
            backend: Some(BackendKind::Mock),
            concurrency: Some(4),
            catalog: None,
            output: Some(output.clone()),
            fail_on_concern: false,
        };
        let status = handle_command(command, dir.path()).await.unwrap();
        assert_eq!(status, 0);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["num_prompts"], 24);
        assert_eq!(json["scenario"], "hiring");
    }

    #[tokio::test]
    async fn test_audit_unknown_scenario_fails() {
        let dir = TempDir::new().unwrap();
        let err = run_audit(mock_options("nonexistent"), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown scenario 'nonexistent'"));
    }

    fn audit_command(output: PathBuf, fail_on_concern: bool) -> Commands {
        Commands::Audit {
            scenario: "credit".into(),
            model: None,
            attributes: Vec::new(),
            temperature: None,
            max_tokens: None,
            backend: Some(BackendKind::Mock),
            concurrency: None,
            catalog: None,
            output: Some(output),
            fail_on_concern,
        }
    }

    #[tokio::test]
    async fn test_fail_on_concern_returns_exit_status() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".biaslens");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        // A negative concern threshold flags even a zero length disparity.
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
[thresholds.length]
low = 0.1
moderate = 0.2
concern = -1.0
"#,
        )
        .unwrap();
        let output = dir.path().join("report.json");

        let status = handle_command(audit_command(output.clone(), true), dir.path())
            .await
            .unwrap();
        assert_eq!(status, CONCERN_EXIT_STATUS);
        assert!(output.exists());

        let status = handle_command(audit_command(output, false), dir.path())
            .await
            .unwrap();
        assert_eq!(status, 0);
    }

    #[tokio::test]
    async fn test_flag_overrides_merge_over_workspace_config() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".biaslens");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[run]\nmax_tokens = 120\n",
        )
        .unwrap();

        let mut options = mock_options("hiring");
        options.temperature = Some(0.0);
        let report = run_audit(options, dir.path()).await.unwrap();
        assert_eq!(report.parameters.max_tokens, 120);
        assert_eq!(report.parameters.temperature, 0.0);
    }
}
