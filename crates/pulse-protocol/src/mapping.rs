//! Raw→normalized metric mapping, applied by the evaluator before
//! comparing a telemetry value against a rule's threshold (`spec.md`
//! §4.3: "pick metric value (apply mapping if name matches a normalized
//! metric)").

use serde::{Deserialize, Serialize};

/// Per-tenant mapping from a raw metric key to a display-normalized one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMapping {
    pub tenant_id: String,
    pub raw_metric: String,
    pub normalized_metric: String,
    pub multiplier: f64,
    pub offset: f64,
    pub display_unit: Option<String>,
}

impl MetricMapping {
    /// `normalized = multiplier * raw + offset`. A `multiplier` of zero
    /// collapses this to `offset` exactly, matching the spec's tie-break.
    pub fn normalize(&self, raw_value: f64) -> f64 {
        self.multiplier * raw_value + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(multiplier: f64, offset: f64) -> MetricMapping {
        MetricMapping {
            tenant_id: "acme".into(),
            raw_metric: "temp_raw".into(),
            normalized_metric: "temp_c".into(),
            multiplier,
            offset,
            display_unit: Some("C".into()),
        }
    }

    #[test]
    fn normalizes_with_multiplier_and_offset() {
        let m = mapping(0.1, -40.0);
        assert_eq!(m.normalize(500.0), 10.0);
    }

    #[test]
    fn zero_multiplier_collapses_to_offset() {
        let m = mapping(0.0, 21.5);
        assert_eq!(m.normalize(9999.0), 21.5);
    }
}
