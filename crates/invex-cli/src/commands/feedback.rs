//! Feedback command - record a user correction.

use std::fmt;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde::Deserialize;

use invex_core::AnnotationMap;

use super::{print_json, Context};
use crate::input;

/// Keys a feedback document must contain.
pub const REQUIRED_KEYS: [&str; 3] = ["text", "original", "corrected"];

/// Arguments for the feedback command.
#[derive(Args)]
pub struct FeedbackArgs {
    /// JSON document with `text`, `original` and `corrected`
    #[arg(required = true)]
    feedback_file: PathBuf,
}

/// A feedback document is missing required keys.
#[derive(Debug)]
pub struct MissingKeys(pub Vec<&'static str>);

impl fmt::Display for MissingKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid feedback format, missing: {}", self.0.join(", "))
    }
}

impl std::error::Error for MissingKeys {}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    text: String,
    original: AnnotationMap,
    corrected: AnnotationMap,
}

pub fn run(args: FeedbackArgs, ctx: &Context) -> anyhow::Result<()> {
    let raw = input::read_text(&args.feedback_file)?;
    let request = parse_request(&raw)?;

    let mut engine = ctx.open_engine()?;
    let outcome = engine.record(&request.text, &request.original, &request.corrected)?;

    print_json(&outcome)
}

fn parse_request(raw: &str) -> anyhow::Result<FeedbackRequest> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("feedback file is not valid JSON")?;

    let missing: Vec<&'static str> = REQUIRED_KEYS
        .into_iter()
        .filter(|key| value.get(key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(MissingKeys(missing).into());
    }

    serde_json::from_value(value).context("malformed feedback document")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request = parse_request(
            r#"{"text": "Date: 15/04/2023", "original": {}, "corrected": {"date": "15/04/2023"}}"#,
        )
        .unwrap();
        assert_eq!(request.text, "Date: 15/04/2023");
        assert!(request.original.is_empty());
        assert_eq!(request.corrected.len(), 1);
    }

    #[test]
    fn test_missing_keys() {
        let err = parse_request(r#"{"text": "x"}"#).unwrap_err();
        let missing = err.downcast_ref::<MissingKeys>().unwrap();
        assert_eq!(missing.0, vec!["original", "corrected"]);
    }

    #[test]
    fn test_array_is_missing_every_key() {
        let err = parse_request("[]").unwrap_err();
        assert_eq!(err.downcast_ref::<MissingKeys>().unwrap().0.len(), 3);
    }
}
