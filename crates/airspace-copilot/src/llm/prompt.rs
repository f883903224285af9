//! Prompt templates for each persona.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::agent::Persona;

const OPERATIONS_SYSTEM: &str = "You are an expert aviation operations analyst. \
Provide clear, concise, and accurate analysis. Only state facts present in the grounding data.";

const TRAVELER_SYSTEM: &str = "You are a friendly flight tracking assistant for travelers. \
Use plain language suitable for a non-technical reader. Only state facts present in the grounding data.";

/// System prompt for a persona.
#[must_use]
pub fn system_prompt(persona: Persona) -> &'static str {
    match persona {
        Persona::Operations => OPERATIONS_SYSTEM,
        Persona::Traveler => TRAVELER_SYSTEM,
    }
}

/// Append the grounding facts to a prompt.
#[must_use]
pub fn with_grounding(prompt: &str, grounding: &Value) -> String {
    if grounding.is_null() {
        return prompt.to_string();
    }
    let facts = serde_json::to_string_pretty(grounding).unwrap_or_else(|_| grounding.to_string());
    format!("{prompt}\n\nGrounding facts (JSON):\n{facts}")
}

/// Operations: summarize a region.
#[must_use]
pub fn region_summary(
    region_id: &str,
    captured_at: DateTime<Utc>,
    total: usize,
    anomalous: usize,
) -> String {
    format!(
        "You are analyzing airspace operations for {region_id}.\n\
         Data timestamp: {}\n\
         Total flights: {total}\n\
         Anomalous flights: {anomalous}\n\n\
         Provide a concise operational summary including:\n\
         1. Overall airspace status\n\
         2. Critical anomalies requiring attention\n\
         3. Recommended actions\n\n\
         Keep the response under 200 words.",
        captured_at.to_rfc3339()
    )
}

/// Operations: brief regional context for the traveler assistant.
#[must_use]
pub fn delegated_summary(
    region_id: &str,
    captured_at: DateTime<Utc>,
    total: usize,
    anomalous: usize,
    hint: &str,
) -> String {
    format!(
        "The traveler assistant needs regional context for {region_id}.\n\
         Request: {hint}\n\
         Data timestamp: {}\n\
         Total flights: {total}\n\
         Anomalous flights: {anomalous}\n\n\
         State whether other flights in the region show anomalies and which ones.\n\
         Answer in at most three sentences.",
        captured_at.to_rfc3339()
    )
}

/// Operations: summarize the active alerts of a region.
#[must_use]
pub fn alerts_summary(region_id: &str) -> String {
    format!(
        "You are reviewing active flight alerts for {region_id}.\n\
         Provide a brief summary of the most critical issues and any patterns you observe.\n\
         Keep the response under 150 words."
    )
}

/// Traveler: describe a tracked flight.
#[must_use]
pub fn flight_update(flight_id: &str) -> String {
    format!(
        "You are helping a traveler track flight {flight_id}.\n\
         Provide a friendly, clear update including:\n\
         1. Current location in plain terms\n\
         2. Altitude and speed\n\
         3. Flight status (climbing, descending or cruising)\n\
         4. Any concerns or anomalies\n\n\
         Keep the response under 150 words."
    )
}

/// Traveler: answer a free-form question.
#[must_use]
pub fn traveler_question(flight_id: &str, question: &str, has_regional_context: bool) -> String {
    let context = if has_regional_context {
        "\nThe grounding facts include regional context from the operations analyst."
    } else {
        ""
    };
    format!(
        "A traveler tracking flight {flight_id} asks: \"{question}\"{context}\n\n\
         Provide a clear, helpful answer based on the available data.\n\
         Keep the response under 150 words."
    )
}
