use evimpact_core::{AnalysisConfig, SurpriseClassifier};
use serde_json::json;

use crate::cli::ClassifyArgs;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &ClassifyArgs) -> Result<CommandResult, CliError> {
    let mut config = AnalysisConfig::from_env().surprise;
    if let Some(tolerance) = args.tolerance {
        config.relative_tolerance = tolerance;
    }
    config.validate()?;

    let surprise_class = SurpriseClassifier::new(config).classify(args.actual, args.forecast);
    let data = json!({
        "actual": args.actual,
        "forecast": args.forecast,
        "relative_tolerance": config.relative_tolerance,
        "surprise_class": surprise_class,
    });

    Ok(CommandResult::ok(data))
}
