//! Short-forecast classification.
//!
//! Rules are evaluated top to bottom and the first match wins. Several
//! patterns overlap ("Partly Cloudy with Thunderstorms" contains both
//! "Cloudy" and "Thunderstorm"), so the order of `RULES` decides the result.

use crate::types::ConditionCategory;

/// How a rule matches the short forecast text
#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// Whole string equals one of these
    Exact(&'static [&'static str]),
    /// String contains this
    Contains(&'static str),
}

impl Pattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Exact(options) => options.iter().any(|o| *o == text),
            Pattern::Contains(needle) => text.contains(needle),
        }
    }
}

const RULES: &[(Pattern, ConditionCategory)] = &[
    (Pattern::Exact(&["Mostly Clear"]), ConditionCategory::MostlyClear),
    (Pattern::Contains("Cloudy"), ConditionCategory::Cloudy),
    (Pattern::Exact(&["Partly Sunny"]), ConditionCategory::PartlySunny),
    (Pattern::Contains("Rain"), ConditionCategory::Rain),
    (Pattern::Exact(&["Sunny", "Mostly Sunny"]), ConditionCategory::Sunny),
    (Pattern::Contains("Thunderstorm"), ConditionCategory::Thunderstorm),
];

/// Classify a short forecast. Total: anything unmatched is `Unknown`.
pub fn classify(short_forecast: &str) -> ConditionCategory {
    RULES
        .iter()
        .find(|(pattern, _)| pattern.matches(short_forecast))
        .map(|(_, category)| *category)
        .unwrap_or(ConditionCategory::Unknown)
}
