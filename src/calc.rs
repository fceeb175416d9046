use crate::config::PrimaryAnnualDivisor;
use crate::model::{Defect, DefectCode, GradeEntry, Scheme, Subject};
use crate::normalize::SubjectResults;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Number of graded months in the primary school year.
pub const PRIMARY_MONTH_COUNT: usize = 9;

/// Display precision rounding: `floor(100*x + 0.5) / 100`.
pub fn round_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Per-subject weights for one bulletin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientTable {
    by_subject: BTreeMap<String, f64>,
    invalid: BTreeSet<String>,
}

impl CoefficientTable {
    /// Class subjects are authoritative; a coefficient copied onto a grade is
    /// used only for subjects the class does not list.
    pub fn new(subjects: &[Subject], entries: &[GradeEntry], defects: &mut Vec<Defect>) -> Self {
        let mut by_subject: BTreeMap<String, f64> = BTreeMap::new();
        for e in entries {
            if let Some(c) = e.coefficient {
                by_subject.entry(e.subject_id.clone()).or_insert(c);
            }
        }
        for s in subjects {
            by_subject.insert(s.id.clone(), s.coefficient);
        }

        let mut invalid = BTreeSet::new();
        for (id, c) in &by_subject {
            let code = if !c.is_finite() {
                DefectCode::InvalidCoefficient
            } else if *c < 0.0 {
                DefectCode::NegativeCoefficient
            } else {
                continue;
            };
            Defect::new(code, format!("coefficient {} excluded from aggregation", c))
                .subject(id)
                .record(defects);
            invalid.insert(id.clone());
        }

        Self {
            by_subject,
            invalid,
        }
    }

    pub fn from_subjects(subjects: &[Subject], defects: &mut Vec<Defect>) -> Self {
        Self::new(subjects, &[], defects)
    }

    /// Weight to aggregate with, or `None` when the subject is excluded.
    pub fn weight(&self, subject_id: &str) -> Option<f64> {
        if self.invalid.contains(subject_id) {
            return None;
        }
        Some(self.by_subject.get(subject_id).copied().unwrap_or(1.0))
    }

    /// Coefficient as declared, for display.
    pub fn declared(&self, subject_id: &str) -> f64 {
        self.by_subject.get(subject_id).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAverage {
    pub total_weighted: f64,
    pub total_coefficient: f64,
    pub average: Option<f64>,
    pub graded_subjects: usize,
}

pub fn compute_period_average(results: &SubjectResults, coefficients: &CoefficientTable) -> PeriodAverage {
    let mut total_weighted = 0.0_f64;
    let mut total_coefficient = 0.0_f64;
    let mut graded_subjects = 0_usize;

    for (subject_id, result) in results {
        let Some(r) = result else {
            continue;
        };
        let Some(c) = coefficients.weight(subject_id) else {
            continue;
        };
        total_weighted += r * c;
        total_coefficient += c;
        if c > 0.0 {
            graded_subjects += 1;
        }
    }

    let average = if total_coefficient > 0.0 {
        Some(round_2_decimals(total_weighted / total_coefficient))
    } else {
        None
    };

    PeriodAverage {
        total_weighted: round_2_decimals(total_weighted),
        total_coefficient,
        average,
        graded_subjects,
    }
}

/// Annual average from the per-period averages laid out in scheme order.
pub fn compute_annual_average(
    period_averages: &[Option<f64>],
    scheme: Scheme,
    divisor: PrimaryAnnualDivisor,
) -> Option<f64> {
    match scheme {
        Scheme::Primary => {
            let with_data = period_averages.iter().filter(|a| a.is_some()).count();
            if with_data == 0 {
                return None;
            }
            let sum: f64 = period_averages.iter().map(|a| a.unwrap_or(0.0)).sum();
            let denom = match divisor {
                PrimaryAnnualDivisor::FixedNine => PRIMARY_MONTH_COUNT,
                PrimaryAnnualDivisor::MonthsWithData => with_data,
            };
            Some(round_2_decimals(sum / denom as f64))
        }
        Scheme::Secondary => {
            let positive: Vec<f64> = period_averages
                .iter()
                .flatten()
                .copied()
                .filter(|a| *a > 0.0)
                .collect();
            if positive.is_empty() {
                None
            } else {
                Some(round_2_decimals(
                    positive.iter().sum::<f64>() / positive.len() as f64,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects(coefs: &[(&str, f64)]) -> Vec<Subject> {
        coefs.iter()
            .map(|(id, c)| Subject {
                id: id.to_string(),
                name: id.to_string(),
                coefficient: *c,
            })
            .collect()
    }

    fn results(coefs: &[(&str, Option<f64>)]) -> SubjectResults {
        coefs.iter().map(|(id, r)| (id.to_string(), *r)).collect()
    }

    #[test]
    fn round_half_up_on_scaled_value() {
        assert_eq!(round_2_decimals(13.0), 13.0);
        assert_eq!(round_2_decimals(12.3456), 12.35);
        assert_eq!(round_2_decimals(12.344), 12.34);
        assert_eq!(round_2_decimals(0.0), 0.0);
    }

    #[test]
    fn weighted_average_skips_undefined_results() {
        let mut defects = Vec::new();
        let table = CoefficientTable::from_subjects(
            &subjects(&[("fr", 2.0), ("math", 1.0), ("svt", 3.0)]),
            &mut defects,
        );
        let avg = compute_period_average(
            &results(&[("fr", Some(14.5)), ("math", Some(10.0)), ("svt", None)]),
            &table,
        );
        assert_eq!(avg.average, Some(13.0));
        assert_eq!(avg.total_weighted, 39.0);
        assert_eq!(avg.total_coefficient, 3.0);
        assert_eq!(avg.graded_subjects, 2);
        assert!(defects.is_empty());
    }

    #[test]
    fn no_results_means_no_average() {
        let table = CoefficientTable::default();
        let avg = compute_period_average(&results(&[("fr", None)]), &table);
        assert_eq!(avg.average, None);
        assert_eq!(avg.total_coefficient, 0.0);
    }

    #[test]
    fn zero_coefficient_contributes_nothing() {
        let mut defects = Vec::new();
        let table =
            CoefficientTable::from_subjects(&subjects(&[("fr", 0.0), ("math", 1.0)]), &mut defects);
        let avg = compute_period_average(
            &results(&[("fr", Some(2.0)), ("math", Some(16.0))]),
            &table,
        );
        assert_eq!(avg.average, Some(16.0));
        assert_eq!(avg.graded_subjects, 1);
    }

    #[test]
    fn negative_coefficient_is_flagged_and_excluded() {
        let mut defects = Vec::new();
        let table =
            CoefficientTable::from_subjects(&subjects(&[("fr", -2.0), ("math", 1.0)]), &mut defects);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].code, DefectCode::NegativeCoefficient);
        let avg = compute_period_average(
            &results(&[("fr", Some(20.0)), ("math", Some(8.0))]),
            &table,
        );
        assert_eq!(avg.average, Some(8.0));
    }

    #[test]
    fn class_coefficient_beats_grade_copy() {
        let mut defects = Vec::new();
        let entries = vec![
            GradeEntry {
                subject_id: "fr".into(),
                subject_name: None,
                kind: None,
                note: 10.0,
                date: None,
                coefficient: Some(5.0),
            },
            GradeEntry {
                subject_id: "eps".into(),
                subject_name: None,
                kind: None,
                note: 10.0,
                date: None,
                coefficient: Some(4.0),
            },
        ];
        let table = CoefficientTable::new(&subjects(&[("fr", 2.0)]), &entries, &mut defects);
        assert_eq!(table.weight("fr"), Some(2.0));
        assert_eq!(table.weight("eps"), Some(4.0));
        assert_eq!(table.weight("unknown"), Some(1.0));
    }

    #[test]
    fn primary_annual_divides_by_nine() {
        let mut months = vec![None; 9];
        months[0] = Some(12.0);
        months[1] = Some(15.0);
        assert_eq!(
            compute_annual_average(&months, Scheme::Primary, PrimaryAnnualDivisor::FixedNine),
            Some(3.0)
        );
        assert_eq!(
            compute_annual_average(&months, Scheme::Primary, PrimaryAnnualDivisor::MonthsWithData),
            Some(13.5)
        );
        assert_eq!(
            compute_annual_average(&[None; 9], Scheme::Primary, PrimaryAnnualDivisor::FixedNine),
            None
        );
    }

    #[test]
    fn secondary_annual_ignores_empty_cycles() {
        let cycles = [Some(12.0), None, Some(0.0)];
        assert_eq!(
            compute_annual_average(&cycles, Scheme::Secondary, PrimaryAnnualDivisor::FixedNine),
            Some(12.0)
        );
        let cycles = [Some(12.0), Some(13.0), None];
        assert_eq!(
            compute_annual_average(&cycles, Scheme::Secondary, PrimaryAnnualDivisor::FixedNine),
            Some(12.5)
        );
        assert_eq!(
            compute_annual_average(&[None, None, None], Scheme::Secondary, PrimaryAnnualDivisor::FixedNine),
            None
        );
    }
}
