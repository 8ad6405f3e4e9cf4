//! Token totals vs. model context windows.

use std::collections::BTreeMap;

use codecorpus_types::{ModelCompatibility, ModelStatus, TokenCalculationResult};

use crate::model_limits::ModelLimitTable;

/// Classifies a token total against each model's context window.
///
/// `Exceeds` when the total is above the limit, `ApproachingLimit` when it is
/// at or above `approaching_threshold` of the limit, `WithinLimit` otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCompatibilityClassifier {
    approaching_threshold: f64,
}

impl ModelCompatibilityClassifier {
    pub const DEFAULT_APPROACHING_THRESHOLD: f64 = 0.9;

    /// Thresholds outside `(0, 1]` fall back to the default.
    #[must_use]
    pub fn new(approaching_threshold: f64) -> Self {
        let approaching_threshold =
            if approaching_threshold > 0.0 && approaching_threshold <= 1.0 {
                approaching_threshold
            } else {
                Self::DEFAULT_APPROACHING_THRESHOLD
            };
        Self {
            approaching_threshold,
        }
    }

    #[must_use]
    pub const fn approaching_threshold(&self) -> f64 {
        self.approaching_threshold
    }

    #[must_use]
    pub fn classify_total(&self, total: u64, context_limit: u64) -> ModelCompatibility {
        // A zero-sized window only fits an empty prompt.
        if context_limit == 0 {
            let status = if total == 0 {
                ModelStatus::WithinLimit
            } else {
                ModelStatus::Exceeds
            };
            let percentage = if total == 0 { 0.0 } else { 100.0 };
            return ModelCompatibility {
                status,
                percentage,
                context_limit,
            };
        }

        let ratio = total as f64 / context_limit as f64;
        let status = if total > context_limit {
            ModelStatus::Exceeds
        } else if ratio >= self.approaching_threshold {
            ModelStatus::ApproachingLimit
        } else {
            ModelStatus::WithinLimit
        };

        ModelCompatibility {
            status,
            percentage: (ratio * 100.0).min(100.0),
            context_limit,
        }
    }

    #[must_use]
    pub fn classify(
        &self,
        result: &TokenCalculationResult,
        limits: &ModelLimitTable,
    ) -> BTreeMap<String, ModelCompatibility> {
        limits
            .entries()
            .into_iter()
            .map(|(model, limit)| {
                let compat = self.classify_total(result.total_tokens(), limit);
                (model, compat)
            })
            .collect()
    }
}

impl Default for ModelCompatibilityClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_APPROACHING_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use codecorpus_types::{EstimationMode, ModelStatus, TokenCalculationResult, TokenParts};

    use super::ModelCompatibilityClassifier;
    use crate::model_limits::ModelLimitTable;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn approaching_at_92_5_percent() {
        let compat = ModelCompatibilityClassifier::default().classify_total(7_400, 8_000);
        assert_eq!(compat.status, ModelStatus::ApproachingLimit);
        assert!(approx(compat.percentage, 92.5));
        assert_eq!(compat.to_string(), "Approaching limit (92.5%)");
    }

    #[test]
    fn exceeds_caps_percentage() {
        let compat = ModelCompatibilityClassifier::default().classify_total(9_000, 8_000);
        assert_eq!(compat.status, ModelStatus::Exceeds);
        assert!(approx(compat.percentage, 100.0));
    }

    #[test]
    fn boundaries() {
        let classifier = ModelCompatibilityClassifier::default();
        assert_eq!(
            classifier.classify_total(8_000, 8_000).status,
            ModelStatus::ApproachingLimit
        );
        assert_eq!(
            classifier.classify_total(8_001, 8_000).status,
            ModelStatus::Exceeds
        );
        assert_eq!(
            classifier.classify_total(7_200, 8_000).status,
            ModelStatus::ApproachingLimit
        );
        assert_eq!(
            classifier.classify_total(7_199, 8_000).status,
            ModelStatus::WithinLimit
        );
    }

    #[test]
    fn within_limit_percentage() {
        let compat = ModelCompatibilityClassifier::default().classify_total(2_000, 8_000);
        assert_eq!(compat.status, ModelStatus::WithinLimit);
        assert!(approx(compat.percentage, 25.0));
        assert_eq!(compat.context_limit, 8_000);
    }

    #[test]
    fn zero_limit() {
        let classifier = ModelCompatibilityClassifier::default();
        assert_eq!(classifier.classify_total(0, 0).status, ModelStatus::WithinLimit);
        assert_eq!(classifier.classify_total(1, 0).status, ModelStatus::Exceeds);
    }

    #[test]
    fn custom_threshold() {
        let classifier = ModelCompatibilityClassifier::new(0.5);
        assert_eq!(
            classifier.classify_total(4_000, 8_000).status,
            ModelStatus::ApproachingLimit
        );
        assert!(approx(
            ModelCompatibilityClassifier::new(1.5).approaching_threshold(),
            ModelCompatibilityClassifier::DEFAULT_APPROACHING_THRESHOLD
        ));
    }

    #[test]
    fn classify_covers_every_model_in_table() {
        let result = TokenCalculationResult::from_parts(TokenParts {
            prompt_template_tokens: 7_048,
            buffer_percent: 5,
            mode: EstimationMode::Exact,
            ..TokenParts::default()
        });
        // 7_048 + ceil(352.4) = 7_401
        assert_eq!(result.total_tokens(), 7_401);

        let table = ModelLimitTable::empty()
            .with_limit("small", 8_000)
            .with_limit("tiny", 4_000)
            .with_limit("large", 128_000);
        let statuses = ModelCompatibilityClassifier::default().classify(&result, &table);

        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses["small"].status, ModelStatus::ApproachingLimit);
        assert_eq!(statuses["tiny"].status, ModelStatus::Exceeds);
        assert_eq!(statuses["large"].status, ModelStatus::WithinLimit);
    }
}
