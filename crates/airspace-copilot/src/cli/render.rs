//! Plain-text rendering of command results.

use std::fmt::Write;

use crate::agent::{
    AlertsReport, DelegationOutcome, OpsReport, RegionSummary, TrackReport, TravelerAnswer,
};
use crate::flight::AnnotatedFlight;
use crate::query::RegionView;

const FACTS_ONLY: &str = "(narrative unavailable; showing facts only)";

fn measure(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.0} {unit}"))
}

fn position(flight: &AnnotatedFlight) -> String {
    match (flight.flight.latitude, flight.flight.longitude) {
        (Some(lat), Some(lon)) => format!("{lat:.4}, {lon:.4}"),
        _ => "unknown".to_string(),
    }
}

/// One line per flight: id, position, kinematics, verdict.
#[must_use]
pub fn flight_line(flight: &AnnotatedFlight) -> String {
    let status = flight
        .verdict
        .label()
        .map_or_else(|| "normal".to_string(), |label| format!("ALERT: {label}"));
    format!(
        "{:<10} {:<8} {:<20} alt {:>8}  spd {:>7}  vr {:>6}  {}",
        flight.flight.display_id(),
        flight.flight.icao24,
        position(flight),
        measure(flight.flight.altitude, "m"),
        measure(flight.flight.ground_speed, "m/s"),
        measure(flight.flight.vertical_rate, "m/s"),
        status
    )
}

fn summary_block(out: &mut String, summary: &RegionSummary) {
    let _ = writeln!(
        out,
        "Region {} at {}",
        summary.region_id,
        summary.captured_at.to_rfc3339()
    );
    let _ = writeln!(
        out,
        "Flights: {} total, {} normal, {} anomalous",
        summary.total_flights, summary.normal_flights, summary.anomalous_flights
    );
    if !summary.anomalous_callsigns.is_empty() {
        let _ = writeln!(out, "Anomalous: {}", summary.anomalous_callsigns.join(", "));
    }
}

fn narrative_block(out: &mut String, narrative: Option<&str>) {
    out.push('\n');
    out.push_str(narrative.unwrap_or(FACTS_ONLY));
    out.push('\n');
}

/// Operations summary.
#[must_use]
pub fn ops_report(report: &OpsReport) -> String {
    let mut out = String::new();
    summary_block(&mut out, &report.summary);
    for flight in &report.alerts {
        let _ = writeln!(out, "  {}", flight_line(flight));
    }
    narrative_block(&mut out, report.narrative.as_deref());
    out
}

/// Alerts of a region.
#[must_use]
pub fn alerts_report(report: &AlertsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Active alerts in {} at {}: {}",
        report.region_id,
        report.captured_at.to_rfc3339(),
        report.alerts.len()
    );
    for alert in &report.alerts {
        let _ = writeln!(out, "  {:<10} {}  ({})", alert.callsign, alert.label, alert.details);
    }
    narrative_block(&mut out, report.narrative.as_deref());
    out
}

/// Flights of a region.
#[must_use]
pub fn region_view(view: &RegionView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} flights in {} at {}",
        view.flights.len(),
        view.region_id,
        view.captured_at.to_rfc3339()
    );
    for flight in &view.flights {
        let _ = writeln!(out, "  {}", flight_line(flight));
    }
    out
}

/// Result of tracking a flight.
#[must_use]
pub fn track_report(report: &TrackReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tracking {} in {}", report.flight.flight.display_id(), report.region_id);
    let _ = writeln!(out, "  {}", flight_line(&report.flight));
    let _ = writeln!(out, "{}", report.issues);
    narrative_block(&mut out, report.narrative.as_deref());
    out
}

/// Answer to a traveler question.
#[must_use]
pub fn traveler_answer(answer: &TravelerAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Intent: {}", answer.intent);
    match &answer.delegation {
        Some(DelegationOutcome::Completed(result)) => {
            out.push_str("Regional context from operations:\n");
            summary_block(&mut out, &result.facts);
        }
        Some(DelegationOutcome::Unavailable { reason }) => {
            let _ = writeln!(out, "Regional context: {reason}");
        }
        None => {}
    }
    narrative_block(&mut out, answer.narrative.as_deref());
    out
}
