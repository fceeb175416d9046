use crate::calc::round_2_decimals;
use crate::model::{de_id, PeriodKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAverage {
    #[serde(alias = "student_id", deserialize_with = "de_id")]
    pub student_id: String,
    #[serde(default, alias = "moyenne")]
    pub average: Option<f64>,
}

impl StudentAverage {
    pub fn new(student_id: impl Into<String>, average: Option<f64>) -> Self {
        Self {
            student_id: student_id.into(),
            average,
        }
    }

    /// Missing or non-finite averages rank as 0.
    fn value(&self) -> f64 {
        self.average.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRank {
    pub student_id: String,
    pub average: f64,
    /// 1-based; 0 means not ranked.
    pub rank: u32,
}

/// Competition ranking of one class for one period.
///
/// Every student takes part, including those without grades (ranked last).
/// A student whose average is within `epsilon` of the one ranked just above
/// shares that rank, and the next distinct average resumes at its 1-based
/// position: `[20, 20, 18]` ranks as `[1, 1, 3]`. When nobody has a positive
/// average the whole class is unranked (all 0). Output follows input order.
pub fn rank_period(averages: &[StudentAverage], epsilon: f64) -> Vec<StudentRank> {
    let mut ranks = vec![0_u32; averages.len()];

    if averages.iter().any(|a| a.value() > 0.0) {
        let mut order: Vec<usize> = (0..averages.len()).collect();
        order.sort_by(|&i, &j| {
            averages[j]
                .value()
                .partial_cmp(&averages[i].value())
                .unwrap_or(Ordering::Equal)
                .then_with(|| averages[i].student_id.cmp(&averages[j].student_id))
        });

        let mut prev: Option<(f64, u32)> = None;
        for (pos, &i) in order.iter().enumerate() {
            let v = averages[i].value();
            let rank = match prev {
                Some((pv, pr)) if (pv - v).abs() < epsilon => pr,
                _ => pos as u32 + 1,
            };
            ranks[i] = rank;
            prev = Some((v, rank));
        }
    }

    averages
        .iter()
        .zip(ranks)
        .map(|(a, rank)| StudentRank {
            student_id: a.student_id.clone(),
            average: a.value(),
            rank,
        })
        .collect()
}

pub fn rank_of(ranks: &[StudentRank], student_id: &str) -> Option<u32> {
    ranks
        .iter()
        .find(|r| r.student_id == student_id)
        .map(|r| r.rank)
        .filter(|r| *r > 0)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    #[serde(alias = "student_id", alias = "eleve", deserialize_with = "de_id")]
    pub student_id: String,
    #[serde(alias = "rang")]
    pub rank: u32,
}

/// Server-side ranking of a class for one period.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    pub period: PeriodKey,
    #[serde(default)]
    pub entries: Vec<RankingEntry>,
}

impl RankingSnapshot {
    pub fn rank_of(&self, student_id: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.student_id == student_id)
            .map(|e| e.rank)
            .filter(|r| *r > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPeriodStats {
    pub highest: f64,
    pub lowest: f64,
    pub mean: f64,
    pub graded_students: usize,
}

/// Class-wide figures over the students that have a positive average.
pub fn class_period_stats(averages: &[StudentAverage]) -> Option<ClassPeriodStats> {
    let graded: Vec<f64> = averages
        .iter()
        .map(StudentAverage::value)
        .filter(|v| *v > 0.0)
        .collect();
    if graded.is_empty() {
        return None;
    }
    let highest = graded.iter().copied().fold(f64::MIN, f64::max);
    let lowest = graded.iter().copied().fold(f64::MAX, f64::min);
    let mean = graded.iter().sum::<f64>() / graded.len() as f64;
    Some(ClassPeriodStats {
        highest,
        lowest,
        mean: round_2_decimals(mean),
        graded_students: graded.len(),
    })
}
