use crate::calc::round_2_decimals;
use crate::model::{
    Defect, DefectCode, GradeEntry, GradeType, PeriodKey, RawGradeEntry, Scheme, Subject, SCALE_20,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Effective /20 note per subject for one period. `None` means "no grade",
/// which is different from an earned 0.
pub type SubjectResults = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPeriod {
    pub period: PeriodKey,
    pub entries: Vec<GradeEntry>,
    pub results: SubjectResults,
    pub defects: Vec<Defect>,
}

/// Resolves raw store entries into the canonical shape and drops the ones
/// that cannot be graded.
pub fn canonicalize(raw: &[RawGradeEntry], period: PeriodKey) -> (Vec<GradeEntry>, Vec<Defect>) {
    let mut entries = Vec::with_capacity(raw.len());
    let mut defects = Vec::new();

    for r in raw {
        let Some(subject_id) = r.subject_id() else {
            Defect::new(DefectCode::MissingSubject, "grade without a subject reference")
                .period(period)
                .record(&mut defects);
            continue;
        };
        let kind = match period.scheme() {
            Scheme::Primary => None,
            Scheme::Secondary => match r.kind {
                Some(k) => Some(k),
                None => {
                    Defect::new(
                        DefectCode::MissingGradeType,
                        "secondary grade without classe/composition type",
                    )
                    .subject(&subject_id)
                    .period(period)
                    .record(&mut defects);
                    continue;
                }
            },
        };

        let scale = kind.map(GradeType::scale).unwrap_or(SCALE_20);
        if !r.note.is_finite() || r.note < 0.0 || r.note > scale {
            Defect::new(
                DefectCode::NoteOutOfScale,
                format!("note {} outside 0..{}", r.note, scale),
            )
            .subject(&subject_id)
            .period(period)
            .record(&mut defects);
            continue;
        }

        entries.push(GradeEntry {
            subject_name: r.subject_name().map(str::to_string),
            coefficient: r.subject_coefficient(),
            subject_id,
            kind,
            note: r.note,
            date: r.date,
        });
    }

    (entries, defects)
}

/// Derives one result per subject. Every class subject gets a key, graded or not.
pub fn subject_results(period: PeriodKey, entries: &[GradeEntry], subjects: &[Subject]) -> SubjectResults {
    // Latest dated entry wins per (subject, type); undated entries sort first
    // and equal dates keep the later one in input order.
    let mut latest: BTreeMap<(&str, Option<GradeType>), &GradeEntry> = BTreeMap::new();
    for e in entries {
        let key = (e.subject_id.as_str(), e.kind);
        match latest.get(&key).map(|prev| prev.date > e.date) {
            Some(true) => {
                tracing::debug!(subject = %e.subject_id, %period, "older duplicate grade ignored");
            }
            Some(false) => {
                tracing::debug!(subject = %e.subject_id, %period, "duplicate grade replaced by later entry");
                latest.insert(key, e);
            }
            None => {
                latest.insert(key, e);
            }
        }
    }

    let mut out: SubjectResults = subjects.iter().map(|s| (s.id.clone(), None)).collect();
    for e in entries {
        out.entry(e.subject_id.clone()).or_insert(None);
    }

    for (subject_id, result) in out.iter_mut() {
        *result = match period.scheme() {
            Scheme::Primary => latest.get(&(subject_id.as_str(), None)).map(|e| e.note),
            Scheme::Secondary => {
                let classe = latest.get(&(subject_id.as_str(), Some(GradeType::Classe)));
                let composition = latest.get(&(subject_id.as_str(), Some(GradeType::Composition)));
                match (classe, composition) {
                    (Some(c), Some(k)) => Some(round_2_decimals((c.note + k.note / 2.0) / 2.0)),
                    _ => None,
                }
            }
        };
    }
    out
}

pub fn normalize_period(period: PeriodKey, raw: &[RawGradeEntry], subjects: &[Subject]) -> NormalizedPeriod {
    let (entries, defects) = canonicalize(raw, period);
    let results = subject_results(period, &entries, subjects);
    NormalizedPeriod {
        period,
        entries,
        results,
        defects,
    }
}
