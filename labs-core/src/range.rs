//! Reference range thresholds and the interpretation rule table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Interpretation of a numeric result against a concept's reference range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpretation {
    OffScaleHigh,
    CriticallyHigh,
    High,
    Normal,
    Low,
    CriticallyLow,
    OffScaleLow,
}

impl Interpretation {
    pub fn as_str(self) -> &'static str {
        match self {
            Interpretation::OffScaleHigh => "OFF_SCALE_HIGH",
            Interpretation::CriticallyHigh => "CRITICALLY_HIGH",
            Interpretation::High => "HIGH",
            Interpretation::Normal => "NORMAL",
            Interpretation::Low => "LOW",
            Interpretation::CriticallyLow => "CRITICALLY_LOW",
            Interpretation::OffScaleLow => "OFF_SCALE_LOW",
        }
    }

    pub fn is_abnormal(self) -> bool {
        self != Interpretation::Normal
    }

    /// Critical or beyond the measurable scale.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            Interpretation::OffScaleHigh
                | Interpretation::CriticallyHigh
                | Interpretation::CriticallyLow
                | Interpretation::OffScaleLow
        )
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold values attached to a concept. Every bound is independently optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRange {
    #[serde(default)]
    pub hi_absolute: Option<f64>,
    #[serde(default)]
    pub hi_critical: Option<f64>,
    #[serde(default)]
    pub hi_normal: Option<f64>,
    #[serde(default)]
    pub low_absolute: Option<f64>,
    #[serde(default)]
    pub low_critical: Option<f64>,
    #[serde(default)]
    pub low_normal: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum Threshold {
    HiAbsolute,
    HiCritical,
    HiNormal,
    LowAbsolute,
    LowCritical,
    LowNormal,
}

impl Threshold {
    fn bound(self, range: &ReferenceRange) -> Option<f64> {
        match self {
            Threshold::HiAbsolute => range.hi_absolute,
            Threshold::HiCritical => range.hi_critical,
            Threshold::HiNormal => range.hi_normal,
            Threshold::LowAbsolute => range.low_absolute,
            Threshold::LowCritical => range.low_critical,
            Threshold::LowNormal => range.low_normal,
        }
    }

    fn breached_by(self, range: &ReferenceRange, value: f64) -> bool {
        let Some(bound) = self.bound(range) else {
            return false;
        };

        match self {
            Threshold::HiAbsolute | Threshold::HiCritical | Threshold::HiNormal => value > bound,
            Threshold::LowAbsolute | Threshold::LowCritical | Threshold::LowNormal => value < bound,
        }
    }
}

// Evaluated top to bottom, first breach wins. Upper bounds are all checked
// before any lower bound; keep this order.
const RULES: [(Threshold, Interpretation); 6] = [
    (Threshold::HiAbsolute, Interpretation::OffScaleHigh),
    (Threshold::HiCritical, Interpretation::CriticallyHigh),
    (Threshold::HiNormal, Interpretation::High),
    (Threshold::LowAbsolute, Interpretation::OffScaleLow),
    (Threshold::LowCritical, Interpretation::CriticallyLow),
    (Threshold::LowNormal, Interpretation::Low),
];

impl ReferenceRange {
    /// Classify `value` against the thresholds that are present.
    pub fn assess(&self, value: f64) -> Interpretation {
        RULES
            .iter()
            .find(|(threshold, _)| threshold.breached_by(self, value))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Interpretation::Normal)
    }

    /// Human readable normal range, only when both normal bounds exist.
    pub fn display_range(&self) -> Option<String> {
        match (self.low_normal, self.hi_normal) {
            (Some(low), Some(high)) => Some(format!("{low} – {high}")),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ReferenceRange::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal_only(low: f64, high: f64) -> ReferenceRange {
        ReferenceRange {
            low_normal: Some(low),
            hi_normal: Some(high),
            ..ReferenceRange::default()
        }
    }

    #[test]
    fn normal_bounds_are_inclusive() {
        let range = normal_only(3.5, 5.0);
        assert_eq!(range.assess(3.5), Interpretation::Normal);
        assert_eq!(range.assess(5.0), Interpretation::Normal);
        assert_eq!(range.assess(4.2), Interpretation::Normal);
        assert_eq!(range.assess(5.01), Interpretation::High);
        assert_eq!(range.assess(3.49), Interpretation::Low);
    }

    #[test]
    fn absolute_bound_is_checked_before_critical() {
        let range = ReferenceRange {
            hi_absolute: Some(100.0),
            hi_critical: Some(90.0),
            ..ReferenceRange::default()
        };
        assert_eq!(range.assess(150.0), Interpretation::OffScaleHigh);
        assert_eq!(range.assess(95.0), Interpretation::CriticallyHigh);
        assert_eq!(range.assess(80.0), Interpretation::Normal);
    }

    #[test]
    fn upper_rules_win_over_lower_rules() {
        // Inverted metadata: the value breaches both hiNormal and lowNormal.
        let range = ReferenceRange {
            hi_normal: Some(1.0),
            low_normal: Some(10.0),
            ..ReferenceRange::default()
        };
        assert_eq!(range.assess(5.0), Interpretation::High);
    }

    #[test]
    fn full_low_side_ladder() {
        let range = ReferenceRange {
            low_absolute: Some(1.0),
            low_critical: Some(2.0),
            low_normal: Some(3.0),
            ..ReferenceRange::default()
        };
        assert_eq!(range.assess(0.5), Interpretation::OffScaleLow);
        assert_eq!(range.assess(1.5), Interpretation::CriticallyLow);
        assert_eq!(range.assess(2.5), Interpretation::Low);
        assert_eq!(range.assess(3.0), Interpretation::Normal);
    }

    #[test]
    fn missing_thresholds_are_skipped() {
        let range = ReferenceRange::default();
        assert!(range.is_empty());
        assert_eq!(range.assess(f64::MAX), Interpretation::Normal);
        assert_eq!(range.assess(f64::MIN), Interpretation::Normal);
    }

    #[test]
    fn display_range_requires_both_normal_bounds() {
        assert_eq!(
            normal_only(12.0, 16.5).display_range().as_deref(),
            Some("12 – 16.5")
        );
        let only_high = ReferenceRange {
            hi_normal: Some(16.5),
            ..ReferenceRange::default()
        };
        assert_eq!(only_high.display_range(), None);
    }

    #[test]
    fn interpretation_serializes_in_upstream_casing() {
        let json = serde_json::to_string(&Interpretation::CriticallyLow).unwrap();
        assert_eq!(json, "\"CRITICALLY_LOW\"");
        assert!(Interpretation::OffScaleHigh.is_critical());
        assert!(!Interpretation::High.is_critical());
        assert!(Interpretation::Low.is_abnormal());
    }
}
