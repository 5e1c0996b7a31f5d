use crate::error::ValidationError;
use crate::model::{ParameterField, Parameters};

/// Committed detector parameters plus the operator's working draft.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    committed: Parameters,
    draft: Parameters,
}

impl ParameterStore {
    pub fn committed(&self) -> &Parameters {
        &self.committed
    }

    pub fn draft(&self) -> &Parameters {
        &self.draft
    }

    /// Stage a value. Only per-field checks happen here; the min/max relation
    /// is checked on commit so fields can be edited in any order.
    pub fn set_draft(&mut self, field: ParameterField, value: f64) -> Result<(), ValidationError> {
        // NaN fails this comparison too.
        if !(value.is_finite() && value > 0.0) {
            return Err(ValidationError::NonPositive { field, value });
        }
        self.draft.set(field, value);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<Parameters, ValidationError> {
        let d = self.draft;
        if d.max_duration_ms < d.min_duration_ms {
            return Err(ValidationError::RangeConflict {
                min: d.min_duration_ms,
                max: d.max_duration_ms,
            });
        }
        self.committed = d;
        Ok(d)
    }

    pub fn reset_to_defaults(&mut self) -> Parameters {
        self.committed = Parameters::default();
        self.draft = self.committed;
        self.committed
    }
}

fn describe_values(p: &Parameters) -> String {
    format!(
        "σ={} ms, threshold={}σ, duration {}–{} ms",
        p.kernel_width_ms, p.threshold_sigma, p.min_duration_ms, p.max_duration_ms
    )
}

/// Log line for a successful commit.
pub fn describe_applied(p: &Parameters) -> String {
    format!("Parameters applied: {}", describe_values(p))
}

/// Log line for a reset.
pub fn describe_reset(p: &Parameters) -> String {
    format!("Parameters reset to defaults: {}", describe_values(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_defaults() {
        let store = ParameterStore::default();
        assert_eq!(*store.committed(), Parameters::default());
        assert_eq!(store.committed().threshold_sigma, 3.5);
    }

    #[test]
    fn rejects_non_positive_and_nan() {
        let mut store = ParameterStore::default();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = store
                .set_draft(ParameterField::KernelWidthMs, bad)
                .unwrap_err();
            assert!(matches!(err, ValidationError::NonPositive { .. }));
        }
        assert_eq!(store.draft().kernel_width_ms, 0.1);
    }

    #[test]
    fn range_conflict_keeps_previous_commit() {
        let mut store = ParameterStore::default();
        store.set_draft(ParameterField::KernelWidthMs, 0.3).unwrap();
        store.commit().unwrap();

        store.set_draft(ParameterField::MinDurationMs, 5.0).unwrap();
        let err = store.commit().unwrap_err();
        assert_eq!(err, ValidationError::RangeConflict { min: 5.0, max: 2.0 });
        assert_eq!(store.committed().kernel_width_ms, 0.3);
        assert_eq!(store.committed().min_duration_ms, 0.1);
    }

    #[test]
    fn equal_min_and_max_is_allowed() {
        let mut store = ParameterStore::default();
        store.set_draft(ParameterField::MinDurationMs, 2.0).unwrap();
        let applied = store.commit().unwrap();
        assert_eq!(applied.min_duration_ms, applied.max_duration_ms);
    }

    #[test]
    fn reset_discards_draft_and_commit() {
        let mut store = ParameterStore::default();
        store.set_draft(ParameterField::ThresholdSigma, 9.0).unwrap();
        store.commit().unwrap();
        store.set_draft(ParameterField::ThresholdSigma, 7.0).unwrap();
        let p = store.reset_to_defaults();
        assert_eq!(p, Parameters::default());
        assert_eq!(*store.draft(), Parameters::default());
    }

    #[test]
    fn labels_use_fixed_precision() {
        let p = Parameters {
            kernel_width_ms: 0.2,
            threshold_sigma: 4.0,
            min_duration_ms: 0.1,
            max_duration_ms: 2.0,
        };
        assert_eq!(p.label(ParameterField::KernelWidthMs), "0.20 ms");
        assert_eq!(p.label(ParameterField::ThresholdSigma), "4.0 σ");
        assert_eq!(p.label(ParameterField::MaxDurationMs), "2.00 ms");
    }

    #[test]
    fn reset_line_lists_the_defaults() {
        assert_eq!(
            describe_reset(&Parameters::default()),
            "Parameters reset to defaults: σ=0.1 ms, threshold=3.5σ, duration 0.1–2 ms"
        );
    }
}
