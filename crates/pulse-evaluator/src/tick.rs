//! Per-tenant evaluation pass: the evaluator's main unit of work, run
//! either on the periodic tick or in response to a reactive wake-up
//! (`spec.md` §4.3).

use std::collections::HashMap;

use chrono::Utc;
use pulse_db::TenantRole;
use tracing::warn;

use pulse_protocol::alert::{MatchMode, RuleCondition};
use pulse_protocol::device::DeviceState;

use crate::conditions;
use crate::context::EvaluatorContext;
use crate::error::EvalResult;
use crate::lifecycle::{self, Evaluation};
use crate::rollup;

/// Evaluate every enabled rule against every device of `tenant_id`,
/// opening/closing alerts as conditions cross their thresholds.
pub async fn run_tenant(ctx: &EvaluatorContext, tenant_id: &str) -> EvalResult<()> {
    let mut conn = ctx.gateway.acquire_scoped(tenant_id, TenantRole::IotService).await?;
    let now = Utc::now();

    rollup::refresh_tenant(&mut conn, tenant_id, &ctx.config).await?;

    let rules = match ctx.rule_cache.get(tenant_id) {
        Some(rules) => rules,
        None => {
            let rules = pulse_db::rules::load_enabled_for_tenant(&mut conn, tenant_id).await?;
            ctx.rule_cache.put(tenant_id, rules.clone());
            rules
        }
    };

    let mappings = match ctx.mapping_cache.get(tenant_id) {
        Some(mappings) => mappings,
        None => {
            let mappings = pulse_db::mappings::load_for_tenant(&mut conn, tenant_id).await?;
            ctx.mapping_cache.put(tenant_id, mappings.clone());
            mappings
        }
    };

    if rules.is_empty() {
        return Ok(());
    }

    let devices = pulse_db::devices::list_for_tenant(&mut conn, tenant_id).await?;
    let states: HashMap<String, DeviceState> = pulse_db::device_state::rollup_for_tenant(&mut conn, tenant_id)
        .await?
        .into_iter()
        .map(|s| (s.device_id.clone(), s))
        .collect();

    for device in &devices {
        let group_ids = pulse_db::devices::device_group_ids(&mut conn, tenant_id, &device.device_id).await?;
        let silenced =
            pulse_db::maintenance::is_device_silenced(&mut conn, tenant_id, &device.device_id, &group_ids, now)
                .await?;
        let last_telemetry_at = states.get(&device.device_id).and_then(|s| s.last_telemetry_at);

        for rule in rules.iter().filter(|r| r.enabled && r.in_scope(&group_ids)) {
            if let Err(err) = evaluate_rule(
                &mut conn,
                tenant_id,
                rule,
                &device.device_id,
                last_telemetry_at,
                silenced,
                now,
                &mappings,
                ctx,
            )
            .await
            {
                warn!(tenant_id, rule_id = %rule.id, device_id = %device.device_id, error = %err, "rule evaluation failed");
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_rule(
    conn: &mut sqlx::PgConnection,
    tenant_id: &str,
    rule: &pulse_protocol::alert::AlertRule,
    device_id: &str,
    last_telemetry_at: Option<chrono::DateTime<Utc>>,
    silenced: bool,
    now: chrono::DateTime<Utc>,
    mappings: &[pulse_protocol::mapping::MetricMapping],
    ctx: &EvaluatorContext,
) -> EvalResult<()> {
    match &rule.condition {
        RuleCondition::Threshold {
            metric,
            op,
            threshold,
            duration_minutes,
        } => {
            let Some((holds, value)) =
                conditions::threshold_holds(conn, tenant_id, device_id, metric, *op, *threshold, mappings).await?
            else {
                return Ok(());
            };
            let key = format!("{tenant_id}:{}:{device_id}", rule.id);
            if holds {
                let due = ctx.condition_tracker.mark_and_check(&key, *duration_minutes, now);
                if due && !silenced {
                    lifecycle::open_for_rule(conn, tenant_id, rule.id, &rule.name, device_id, rule.severity, Evaluation::Threshold { value })
                        .await?;
                }
            } else {
                ctx.condition_tracker.reset(&key);
                if !silenced {
                    lifecycle::close_for_rule(conn, tenant_id, rule.id, device_id).await?;
                }
            }
        }

        RuleCondition::MultiCondition { conditions: subs, match_mode } => {
            let mut satisfied = Vec::with_capacity(subs.len());
            let mut matched_metrics = Vec::new();
            for sub in subs {
                let Some((holds, _)) =
                    conditions::threshold_holds(conn, tenant_id, device_id, &sub.metric, sub.op, sub.threshold, mappings)
                        .await?
                else {
                    // A scoped metric with no data ever reported: skip the whole rule.
                    return Ok(());
                };
                let key = format!("{tenant_id}:{}:{device_id}:{}", rule.id, sub.metric);
                if holds {
                    let due = ctx.condition_tracker.mark_and_check(&key, sub.duration_minutes, now);
                    satisfied.push(due);
                    if due {
                        matched_metrics.push(sub.metric.clone());
                    }
                } else {
                    ctx.condition_tracker.reset(&key);
                    satisfied.push(false);
                }
            }

            let fires = match match_mode {
                MatchMode::All => satisfied.iter().all(|&s| s),
                MatchMode::Any => satisfied.iter().any(|&s| s),
            };

            if fires && !silenced {
                lifecycle::open_for_rule(
                    conn,
                    tenant_id,
                    rule.id,
                    &rule.name,
                    device_id,
                    rule.severity,
                    Evaluation::MultiCondition { matched: matched_metrics },
                )
                .await?;
            } else if !fires && !silenced {
                lifecycle::close_for_rule(conn, tenant_id, rule.id, device_id).await?;
            }
        }

        RuleCondition::Anomaly {
            metric,
            window_minutes,
            min_samples,
            z_threshold,
        } => {
            let Some((holds, value, mean, stddev)) = conditions::anomaly_holds(
                conn,
                tenant_id,
                device_id,
                metric,
                *window_minutes,
                *min_samples,
                *z_threshold,
                now,
                mappings,
            )
            .await?
            else {
                return Ok(());
            };

            if holds && !silenced {
                lifecycle::open_for_rule(conn, tenant_id, rule.id, &rule.name, device_id, rule.severity, Evaluation::Anomaly { value, mean, stddev })
                    .await?;
            } else if !holds && !silenced {
                lifecycle::close_for_rule(conn, tenant_id, rule.id, device_id).await?;
            }
        }

        RuleCondition::Window {
            metric,
            window_seconds,
            aggregate,
            op,
            threshold,
        } => {
            let Some((holds, aggregated)) =
                conditions::window_holds(conn, tenant_id, device_id, metric, *window_seconds, *aggregate, *op, *threshold, now, mappings)
                    .await?
            else {
                return Ok(());
            };

            if holds && !silenced {
                lifecycle::open_for_rule(conn, tenant_id, rule.id, &rule.name, device_id, rule.severity, Evaluation::Window { aggregated })
                    .await?;
            } else if !holds && !silenced {
                lifecycle::close_for_rule(conn, tenant_id, rule.id, device_id).await?;
            }
        }

        RuleCondition::TelemetryGap { gap_seconds } => {
            let holds = conditions::gap_holds(last_telemetry_at, now, *gap_seconds);
            if silenced {
                return Ok(());
            }
            if holds {
                lifecycle::open_gap(conn, tenant_id, device_id, *gap_seconds).await?;
            } else {
                lifecycle::close_gap(conn, tenant_id, device_id).await?;
            }
        }
    }

    Ok(())
}
