//! Question intent detection for the traveler assistant.
//!
//! A question is matched against an ordered list of named patterns; the first
//! match wins. `nearby_issues` comes first because questions about other
//! traffic often also mention issues or positions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// What a traveler question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Is the flight OK, delayed, anomalous.
    Status,
    /// Where the flight is.
    Position,
    /// Climbing, descending, speeding up.
    Trend,
    /// Other traffic in the region. The only intent that delegates.
    NearbyIssues,
    /// Anything else.
    Other,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Status => "status",
            Self::Position => "position",
            Self::Trend => "trend",
            Self::NearbyIssues => "nearby_issues",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A compiled intent pattern.
#[derive(Debug)]
pub struct IntentPattern {
    /// Intent reported when the pattern matches.
    pub intent: Intent,

    /// Description of what this pattern matches.
    pub description: &'static str,

    regex: Regex,
}

impl IntentPattern {
    /// Create a new intent pattern.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(intent: Intent, description: &'static str, pattern: &str) -> Self {
        Self {
            intent,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the question matches this pattern.
    #[must_use]
    pub fn matches(&self, question: &str) -> bool {
        self.regex.is_match(question)
    }
}

/// Get all built-in intent patterns, in priority order.
#[must_use]
pub fn builtin_patterns() -> Vec<IntentPattern> {
    vec![
        IntentPattern::new(
            Intent::NearbyIssues,
            "Other traffic or the wider airspace",
            r"(?i)\b(other\s+(flights?|planes?|aircraft)|nearby|near|around|in\s+the\s+area|airspace|surrounding)\b",
        ),
        IntentPattern::new(
            Intent::Position,
            "Location of the tracked flight",
            r"(?i)\b(where|position|location|located|latitude|longitude|coordinates)\b",
        ),
        IntentPattern::new(
            Intent::Trend,
            "Vertical or speed trend",
            r"(?i)\b(climb(ing|s)?|descend(ing|s)?|descent|trend|rising|dropping|gaining|losing|cruis(e|ing)|vertical)\b",
        ),
        IntentPattern::new(
            Intent::Status,
            "General health of the tracked flight",
            r"(?i)\b(status|on\s+time|delay(ed)?|ok(ay)?|fine|safe|problems?|issues?|anomal(y|ies|ous)|alerts?|land(ed|ing)?|speed|altitude|how\s+is)\b",
        ),
    ]
}

/// Maps free text to an [`Intent`].
#[derive(Debug)]
pub struct IntentClassifier {
    patterns: Vec<IntentPattern>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a classifier with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: builtin_patterns(),
        }
    }

    /// Classify a question.
    #[must_use]
    pub fn classify(&self, question: &str) -> Intent {
        let intent = self
            .patterns
            .iter()
            .find(|p| p.matches(question))
            .map_or(Intent::Other, |p| p.intent);
        trace!(intent = %intent, "Classified question");
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(question: &str) -> Intent {
        IntentClassifier::new().classify(question)
    }

    #[test]
    fn test_nearby_issues() {
        assert_eq!(
            classify("Are there any other flights nearby that are having issues?"),
            Intent::NearbyIssues
        );
        assert_eq!(classify("Anything unusual in the area?"), Intent::NearbyIssues);
        assert_eq!(classify("How busy is the airspace?"), Intent::NearbyIssues);
    }

    #[test]
    fn test_position() {
        assert_eq!(classify("Where is my flight now?"), Intent::Position);
        assert_eq!(classify("What are its coordinates?"), Intent::Position);
    }

    #[test]
    fn test_trend() {
        assert_eq!(classify("Is it descending yet?"), Intent::Trend);
        assert_eq!(classify("Is the plane still climbing?"), Intent::Trend);
    }

    #[test]
    fn test_status() {
        assert_eq!(classify("Is my flight delayed?"), Intent::Status);
        assert_eq!(classify("Any problems with it?"), Intent::Status);
        assert_eq!(classify("What altitude is it at?"), Intent::Status);
    }

    #[test]
    fn test_other() {
        assert_eq!(classify("Tell me a joke"), Intent::Other);
        assert_eq!(classify(""), Intent::Other);
    }

    #[test]
    fn test_patterns_are_ordered_by_priority() {
        let patterns = builtin_patterns();
        assert_eq!(patterns[0].intent, Intent::NearbyIssues);
        assert!(patterns.iter().all(|p| !p.description.is_empty()));
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Intent::NearbyIssues).unwrap(),
            "\"nearby_issues\""
        );
        assert_eq!(Intent::NearbyIssues.to_string(), "nearby_issues");
    }
}
