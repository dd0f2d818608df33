//! Configuration validation.
//!
//! Range checks run on the built [`PipelineConfig`] before any data is loaded.
//! An empty universe is accepted; the data port then loads every symbol it has.

use crate::domain::config::{PipelineConfig, build_pipeline_config, invalid};
use crate::domain::error::LsquantError;
use crate::domain::model::supported_models;
use crate::ports::config_port::ConfigPort;

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, LsquantError> {
    let pipeline = build_pipeline_config(config)?;
    validate(&pipeline)?;
    Ok(pipeline)
}

pub fn validate(config: &PipelineConfig) -> Result<(), LsquantError> {
    validate_dates(config)?;
    validate_features(config)?;
    validate_walk_forward(config)?;
    validate_model(config)?;
    validate_portfolio(config)?;
    validate_costs(config)?;
    validate_ann_factor(config)?;
    Ok(())
}

fn validate_dates(config: &PipelineConfig) -> Result<(), LsquantError> {
    if config.start_date >= config.end_date {
        return Err(invalid(
            "universe",
            "start_date",
            "start_date must be before end_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_features(config: &PipelineConfig) -> Result<(), LsquantError> {
    if config.lookback < 2 {
        return Err(invalid(
            "features",
            "lookback",
            "lookback must be at least 2".to_string(),
        ));
    }
    if config.label_horizon < 1 {
        return Err(invalid(
            "features",
            "label_horizon",
            "label_horizon must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_walk_forward(config: &PipelineConfig) -> Result<(), LsquantError> {
    if config.train_window < 1 {
        return Err(invalid(
            "walk_forward",
            "train_window",
            "train_window must be at least 1".to_string(),
        ));
    }
    if config.retrain_freq < 1 {
        return Err(invalid(
            "walk_forward",
            "retrain_freq",
            "retrain_freq must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_model(config: &PipelineConfig) -> Result<(), LsquantError> {
    if !supported_models().any(|m| m == config.model_kind) {
        let known: Vec<&str> = supported_models().collect();
        return Err(invalid(
            "model",
            "kind",
            format!(
                "unsupported model kind '{}' (supported: {})",
                config.model_kind,
                known.join(", ")
            ),
        ));
    }
    if !(config.alpha > 0.0) || !config.alpha.is_finite() {
        return Err(invalid(
            "model",
            "alpha",
            "alpha must be a positive number".to_string(),
        ));
    }
    Ok(())
}

fn validate_portfolio(config: &PipelineConfig) -> Result<(), LsquantError> {
    for (key, value) in [
        ("long_frac", config.long_frac),
        ("short_frac", config.short_frac),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(invalid(
                "portfolio",
                key,
                format!("{key} must be in (0, 1]"),
            ));
        }
    }
    if !(config.gross_leverage > 0.0) || !config.gross_leverage.is_finite() {
        return Err(invalid(
            "portfolio",
            "gross_leverage",
            "gross_leverage must be positive".to_string(),
        ));
    }
    if config.min_symbols < 1 {
        return Err(invalid(
            "portfolio",
            "min_symbols",
            "min_symbols must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_costs(config: &PipelineConfig) -> Result<(), LsquantError> {
    for (key, value) in [
        ("commission_bps", config.commission_bps),
        ("slippage_bps", config.slippage_bps),
    ] {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(invalid(
                "costs",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(())
}

fn validate_ann_factor(config: &PipelineConfig) -> Result<(), LsquantError> {
    if !(config.ann_factor > 0.0) || !config.ann_factor.is_finite() {
        return Err(invalid(
            "metrics",
            "ann_factor",
            "ann_factor must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn check(content: &str) -> Result<PipelineConfig, LsquantError> {
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        validate_pipeline_config(&adapter)
    }

    fn invalid_key(content: &str) -> String {
        match check(content) {
            Err(LsquantError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(check("").is_ok());
    }

    #[test]
    fn empty_universe_means_every_symbol() {
        let config = check("[universe]\nsymbols = ,\n").unwrap();
        assert!(config.universe.is_empty());
    }

    #[test]
    fn dates_must_be_ordered() {
        assert_eq!(
            invalid_key("[universe]\nstart_date = 2024-01-01\nend_date = 2023-01-01\n"),
            "start_date"
        );
    }

    #[test]
    fn lookback_too_short() {
        assert_eq!(invalid_key("[features]\nlookback = 1\n"), "lookback");
    }

    #[test]
    fn zero_horizon() {
        assert_eq!(invalid_key("[features]\nlabel_horizon = 0\n"), "label_horizon");
    }

    #[test]
    fn zero_retrain_freq() {
        assert_eq!(invalid_key("[walk_forward]\nretrain_freq = 0\n"), "retrain_freq");
    }

    #[test]
    fn unknown_model_kind() {
        assert_eq!(invalid_key("[model]\nkind = lightgbm\n"), "kind");
    }

    #[test]
    fn negative_alpha() {
        assert_eq!(invalid_key("[model]\nalpha = -1\n"), "alpha");
    }

    #[test]
    fn zero_alpha() {
        assert_eq!(invalid_key("[model]\nalpha = 0\n"), "alpha");
    }

    #[test]
    fn malformed_numbers_fail_validation() {
        assert_eq!(
            invalid_key("[portfolio]\ngross_leverage = 2,0\ndollar_neutral = nope\n"),
            "gross_leverage"
        );
    }

    #[test]
    fn fractions_bounded() {
        assert_eq!(invalid_key("[portfolio]\nlong_frac = 0\n"), "long_frac");
        assert_eq!(invalid_key("[portfolio]\nshort_frac = 1.5\n"), "short_frac");
    }

    #[test]
    fn leverage_positive() {
        assert_eq!(
            invalid_key("[portfolio]\ngross_leverage = 0\n"),
            "gross_leverage"
        );
    }

    #[test]
    fn negative_costs() {
        assert_eq!(invalid_key("[costs]\nslippage_bps = -0.1\n"), "slippage_bps");
    }

    #[test]
    fn bad_weighting() {
        assert_eq!(invalid_key("[portfolio]\nweighting = rank\n"), "weighting");
    }
}
