//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RunConfig, StepName, StepSelection, NO_STRATIFY};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    project_name: String,
    experiment_name: String,
    steps: Vec<StepName>,
    stratify_by: String,
    hyperparameter_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            error_kind: Some("ConfigurationError"),
            warnings: None,
            summary: None,
        };
    }

    let loaded = config_loader::ConfigLoader::load_from_path(&args.config).and_then(|config| {
        let selection = StepSelection::parse(&config.main.steps)?;
        Ok((config, selection))
    });

    match loaded {
        Ok((config, selection)) => {
            let warnings = collect_warnings(&config, &selection);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                error_kind: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    project_name: config.main.project_name.clone(),
                    experiment_name: config.main.experiment_name.clone(),
                    steps: selection.steps().to_vec(),
                    stratify_by: config.modeling.stratify_by.clone(),
                    hyperparameter_count: config.modeling.random_forest.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            error_kind: Some(e.kind()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RunConfig, selection: &StepSelection) -> Vec<String> {
    let mut warnings = Vec::new();
    let modeling = &config.modeling;

    // Not an error: the split itself only uses test_size
    if modeling.test_size + modeling.val_size >= 1.0 {
        warnings.push(format!(
            "test_size + val_size = {:.3} leaves no training rows",
            modeling.test_size + modeling.val_size
        ));
    }

    if modeling.test_size == 0.0 {
        warnings.push("test_size is 0 - test_data.csv will be empty".to_string());
    }

    if selection.contains(StepName::TrainRandomForest) && modeling.random_forest.is_empty() {
        warnings.push(
            "modeling.random_forest is empty - training will use its own defaults".to_string(),
        );
    }

    if selection.contains(StepName::TestRegressionModel) {
        warnings.push(format!(
            "test_regression_model needs '{}:prod' - promote a model first",
            modeling.export_artifact
        ));
    }

    if modeling.stratify_by == NO_STRATIFY && selection.contains(StepName::DataSplit) {
        info!("stratify_by is null - split will not be stratified");
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Project: {}", summary.project_name);
            println!("  Run group: {}", summary.experiment_name);
            let steps: Vec<&str> = summary.steps.iter().map(|s| s.as_str()).collect();
            println!("  Steps: {}", steps.join(", "));
            println!("  Stratify by: {}", summary.stratify_by);
            println!("  Hyperparameters: {}", summary.hyperparameter_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
