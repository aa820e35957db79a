//! Exercises the per-kind rule condition logic that decides whether an
//! alert should fire, using the same pure helpers `pulse_evaluator::tick`
//! drives against live telemetry. Covers the threshold comparison table,
//! the gap-detection boundary, and the fingerprint scheme that keeps one
//! open alert per (rule, device) / (gap, device) pair.

use chrono::{Duration, Utc};
use pulse_evaluator::conditions::gap_holds;
use pulse_protocol::alert::{gap_fingerprint, rule_fingerprint, ComparisonOp};
use uuid::Uuid;

#[test]
fn threshold_comparisons_cover_the_full_operator_table() {
    assert!(ComparisonOp::Gt.evaluate(41.0, 40.0));
    assert!(!ComparisonOp::Gt.evaluate(40.0, 40.0));
    assert!(ComparisonOp::Gte.evaluate(40.0, 40.0));
    assert!(ComparisonOp::Lt.evaluate(39.0, 40.0));
    assert!(ComparisonOp::Lte.evaluate(40.0, 40.0));
    assert!(ComparisonOp::Eq.evaluate(40.0, 40.0));
    assert!(ComparisonOp::Ne.evaluate(41.0, 40.0));
}

#[test]
fn a_device_with_no_telemetry_at_all_is_always_a_gap() {
    assert!(gap_holds(None, Utc::now(), 300));
}

#[test]
fn gap_detection_boundary_is_strictly_greater_than_the_configured_window() {
    let now = Utc::now();
    let at_boundary = now - Duration::seconds(300);
    let past_boundary = now - Duration::seconds(301);

    assert!(!gap_holds(Some(at_boundary), now, 300), "exactly at the window edge should not yet be a gap");
    assert!(gap_holds(Some(past_boundary), now, 300), "one second past the window edge is a gap");
}

#[test]
fn rule_fingerprints_are_stable_and_scoped_per_device() {
    let rule_id = Uuid::nil();
    let fp_dev1 = rule_fingerprint(rule_id, "dev-1");
    let fp_dev2 = rule_fingerprint(rule_id, "dev-2");

    assert_eq!(fp_dev1, rule_fingerprint(rule_id, "dev-1"), "same rule/device must always fingerprint identically");
    assert_ne!(fp_dev1, fp_dev2, "the same rule firing on two devices must open two distinct alerts");
}

#[test]
fn gap_fingerprints_never_collide_with_rule_fingerprints() {
    let rule_id = Uuid::nil();
    assert_ne!(gap_fingerprint("dev-1"), rule_fingerprint(rule_id, "dev-1"));
}
