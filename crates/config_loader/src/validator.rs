//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则由 `validator` derive 声明 (非空、取值范围)
//! - min_price < max_price
//! - main.steps 为 `all` 或已知步骤列表
//!
//! `test_size + val_size` is deliberately left unchecked.

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, RunConfig, StepSelection};

/// 校验 RunConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RunConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_price_bounds(config)?;
    validate_steps(config)?;
    Ok(())
}

/// 字段级校验
fn validate_fields(config: &RunConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Walk nested validation errors and report the first one by field path
fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_error(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_error(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验价格区间
fn validate_price_bounds(config: &RunConfig) -> Result<(), ContractError> {
    let etl = &config.etl;
    if !etl.min_price.is_finite() || !etl.max_price.is_finite() {
        return Err(ContractError::config_validation(
            "etl.min_price / etl.max_price",
            "price bounds must be finite numbers",
        ));
    }
    if etl.min_price >= etl.max_price {
        return Err(ContractError::config_validation(
            "etl.min_price / etl.max_price",
            format!(
                "min_price ({}) must be < max_price ({})",
                etl.min_price, etl.max_price
            ),
        ));
    }
    Ok(())
}

/// 校验步骤选择
fn validate_steps(config: &RunConfig) -> Result<(), ContractError> {
    StepSelection::parse(&config.main.steps).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DataCheckConfig, EtlConfig, MainConfig, ModelingConfig, TrackingConfig};

    fn minimal_config() -> RunConfig {
        RunConfig {
            main: MainConfig {
                project_name: "nyc_airbnb".into(),
                experiment_name: "development".into(),
                steps: "all".into(),
                components_repository: "components".into(),
                local_components: "src".into(),
            },
            etl: EtlConfig {
                sample: "sample1.csv".into(),
                min_price: 10.0,
                max_price: 350.0,
            },
            data_check: DataCheckConfig { kl_threshold: 0.2 },
            modeling: ModelingConfig {
                test_size: 0.2,
                val_size: 0.2,
                random_seed: 42,
                stratify_by: "null".into(),
                export_artifact: "random_forest_export".into(),
                random_forest: Default::default(),
            },
            tracking: TrackingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_fraction_sum_not_checked() {
        let mut cfg = minimal_config();
        cfg.modeling.test_size = 0.7;
        cfg.modeling.val_size = 0.7;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_test_size_out_of_range() {
        let mut cfg = minimal_config();
        cfg.modeling.test_size = 1.5;
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("modeling.test_size"), "got: {err}");
        assert!(err.contains("[0, 1)"), "got: {err}");
    }

    #[test]
    fn test_empty_project_name() {
        let mut cfg = minimal_config();
        cfg.main.project_name = String::new();
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("main.project_name"), "got: {err}");
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_invalid_price_bounds() {
        let mut cfg = minimal_config();
        cfg.etl.min_price = 400.0;
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("must be < max_price"), "got: {err}");
    }

    #[test]
    fn test_non_positive_kl_threshold() {
        let mut cfg = minimal_config();
        cfg.data_check.kl_threshold = -0.1;
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("kl_threshold must be > 0"), "got: {err}");
    }

    #[test]
    fn test_unknown_step() {
        let mut cfg = minimal_config();
        cfg.main.steps = "download,eda".into();
        let err = validate(&cfg).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("unknown step 'eda'"));
    }
}
