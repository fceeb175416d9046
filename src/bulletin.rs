use crate::calc::{compute_annual_average, compute_period_average, CoefficientTable, PeriodAverage};
use crate::config::EngineConfig;
use crate::model::{BulletinRecord, Defect, GradeEntry, PeriodKey, Scheme};
use crate::normalize::{canonicalize, subject_results, SubjectResults};
use crate::ranking::{
    class_period_stats, rank_of, rank_period, ClassPeriodStats, RankingSnapshot, StudentAverage,
    StudentRank,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Where a displayed average or rank came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Server,
    Snapshot,
    Local,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSources {
    pub average: ValueSource,
    pub rank: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub id: String,
    pub name: String,
    pub coefficient: f64,
    pub per_period: Vec<Option<f64>>,
}

/// Render-ready report card of one student. Period-indexed vectors follow
/// `periods`; absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinView {
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub scheme: Scheme,
    pub periods: Vec<String>,
    pub subjects: Vec<SubjectRow>,
    pub period_totals: Vec<Option<f64>>,
    pub period_coefficients: Vec<f64>,
    pub period_averages: Vec<Option<f64>>,
    /// 0 means not ranked.
    pub ranks: Vec<u32>,
    pub class_size: usize,
    pub class_stats: Vec<Option<ClassPeriodStats>>,
    pub annual_average: Option<f64>,
    pub annual_source: ValueSource,
    pub sources: Vec<PeriodSources>,
    pub defects: Vec<Defect>,
}

struct EvaluatedPeriod {
    key: PeriodKey,
    results: SubjectResults,
    local: PeriodAverage,
    server_average: Option<f64>,
    server_rank: Option<u32>,
}

struct Evaluated<'a> {
    record: &'a BulletinRecord,
    scheme: Scheme,
    periods: Vec<EvaluatedPeriod>,
    coefficients: CoefficientTable,
    subject_names: BTreeMap<String, String>,
    defects: Vec<Defect>,
}

struct ClassTable {
    ranks: Vec<StudentRank>,
    stats: Option<ClassPeriodStats>,
}

/// Server values of 0 mean "not computed".
fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

fn pick<T: Copy>(candidates: &[(Option<T>, ValueSource)]) -> (Option<T>, ValueSource) {
    candidates
        .iter()
        .find_map(|(v, src)| v.map(|v| (Some(v), *src)))
        .unwrap_or((None, ValueSource::None))
}

fn evaluate(record: &BulletinRecord) -> Evaluated<'_> {
    let scheme = record.scheme();
    let subjects = &record.classe.subjects;
    let mut defects = Vec::new();

    let mut canonical = Vec::new();
    for p in record.period_records() {
        let (entries, d) = canonicalize(&p.grades, p.key);
        defects.extend(d);
        canonical.push((p, entries));
    }

    let all_entries: Vec<GradeEntry> = canonical
        .iter()
        .flat_map(|(_, entries)| entries.iter().cloned())
        .collect();
    let coefficients = CoefficientTable::new(subjects, &all_entries, &mut defects);

    let mut subject_names: BTreeMap<String, String> = BTreeMap::new();
    for e in &all_entries {
        if let Some(name) = &e.subject_name {
            subject_names
                .entry(e.subject_id.clone())
                .or_insert_with(|| name.clone());
        }
    }

    let periods = canonical
        .into_iter()
        .map(|(p, entries)| {
            let results = subject_results(p.key, &entries, subjects);
            let local = compute_period_average(&results, &coefficients);
            EvaluatedPeriod {
                key: p.key,
                results,
                local,
                server_average: positive(p.average),
                server_rank: p.rank.filter(|r| *r > 0),
            }
        })
        .collect();

    Evaluated {
        record,
        scheme,
        periods,
        coefficients,
        subject_names,
        defects,
    }
}

impl Evaluated<'_> {
    fn student_id(&self) -> &str {
        &self.record.student.id
    }

    fn period_average(&self, pos: usize, config: &EngineConfig) -> (Option<f64>, ValueSource) {
        let p = &self.periods[pos];
        let server = (p.server_average, ValueSource::Server);
        let local = (p.local.average, ValueSource::Local);
        if config.prefer_server_values {
            pick(&[server, local])
        } else {
            pick(&[local, server])
        }
    }
}

fn class_tables(class: &[&Evaluated<'_>], scheme: Scheme, config: &EngineConfig) -> Vec<ClassTable> {
    (0..PeriodKey::all(scheme).len())
        .map(|pos| {
            let averages: Vec<StudentAverage> = class
                .iter()
                .map(|e| StudentAverage::new(e.student_id(), e.period_average(pos, config).0))
                .collect();
            ClassTable {
                ranks: rank_period(&averages, config.tie_epsilon),
                stats: class_period_stats(&averages),
            }
        })
        .collect()
}

fn build_view(
    me: &Evaluated<'_>,
    tables: Option<(&[ClassTable], usize)>,
    snapshots: &[RankingSnapshot],
    config: &EngineConfig,
) -> BulletinView {
    let record = me.record;
    let student_id = me.student_id();
    let n = me.periods.len();

    let mut period_totals = Vec::with_capacity(n);
    let mut period_coefficients = Vec::with_capacity(n);
    let mut period_averages = Vec::with_capacity(n);
    let mut ranks = Vec::with_capacity(n);
    let mut class_stats = Vec::with_capacity(n);
    let mut sources = Vec::with_capacity(n);

    for (pos, p) in me.periods.iter().enumerate() {
        let (average, average_source) = me.period_average(pos, config);

        let server = (p.server_rank, ValueSource::Server);
        let snapshot = (
            snapshots
                .iter()
                .filter(|s| s.period == p.key)
                .find_map(|s| s.rank_of(student_id)),
            ValueSource::Snapshot,
        );
        let local = (
            tables.and_then(|(t, _)| rank_of(&t[pos].ranks, student_id)),
            ValueSource::Local,
        );
        let (rank, rank_source) = if config.prefer_server_values {
            pick(&[server, snapshot, local])
        } else {
            pick(&[local, server, snapshot])
        };

        period_totals.push(p.local.average.map(|_| p.local.total_weighted));
        period_coefficients.push(p.local.total_coefficient);
        period_averages.push(average);
        ranks.push(rank.unwrap_or(0));
        class_stats.push(tables.and_then(|(t, _)| t[pos].stats));
        sources.push(PeriodSources {
            average: average_source,
            rank: rank_source,
        });
    }

    let local_annual =
        compute_annual_average(&period_averages, me.scheme, config.primary_annual_divisor);
    let server_annual = positive(record.moyenne_annuelle);
    let (annual_average, annual_source) = if config.prefer_server_values {
        pick(&[(server_annual, ValueSource::Server), (local_annual, ValueSource::Local)])
    } else {
        pick(&[(local_annual, ValueSource::Local), (server_annual, ValueSource::Server)])
    };

    let class_ids: BTreeSet<&str> = record.classe.subjects.iter().map(|s| s.id.as_str()).collect();
    let extra_ids: BTreeSet<&str> = me
        .periods
        .iter()
        .flat_map(|p| p.results.keys().map(String::as_str))
        .filter(|id| !class_ids.contains(id))
        .collect();

    let row = |id: &str, name: String| SubjectRow {
        id: id.to_string(),
        name,
        coefficient: me.coefficients.declared(id),
        per_period: me
            .periods
            .iter()
            .map(|p| p.results.get(id).copied().flatten())
            .collect(),
    };
    let mut subjects: Vec<SubjectRow> = record
        .classe
        .subjects
        .iter()
        .map(|s| row(&s.id, s.name.clone()))
        .collect();
    subjects.extend(extra_ids.into_iter().map(|id| {
        let name = me
            .subject_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string());
        row(id, name)
    }));

    BulletinView {
        student_id: student_id.to_string(),
        student_name: record.student.name.clone(),
        class_id: record.classe.id.clone(),
        scheme: me.scheme,
        periods: me.periods.iter().map(|p| p.key.label().to_string()).collect(),
        subjects,
        period_totals,
        period_coefficients,
        period_averages,
        ranks,
        class_size: tables
            .map(|(_, size)| size)
            .unwrap_or(record.classe.student_count),
        class_stats,
        annual_average,
        annual_source,
        sources,
        defects: me.defects.clone(),
    }
}

fn same_group(a: &BulletinRecord, b: &BulletinRecord) -> bool {
    a.classe.id == b.classe.id && a.scheme() == b.scheme()
}

/// Bulletin of one student. `peers` are the class's other bulletins and
/// enable local ranking; without them only server or snapshot ranks show.
pub fn assemble(
    record: &BulletinRecord,
    peers: &[BulletinRecord],
    snapshots: &[RankingSnapshot],
    config: &EngineConfig,
) -> BulletinView {
    let me = evaluate(record);

    let mut others = Vec::new();
    for p in peers {
        if p.student.id == record.student.id {
            continue;
        }
        if !same_group(p, record) {
            tracing::debug!(
                student = %p.student.id,
                class = %p.classe.id,
                "peer bulletin from another class or scheme skipped"
            );
            continue;
        }
        others.push(evaluate(p));
    }

    if others.is_empty() {
        return build_view(&me, None, snapshots, config);
    }

    let mut class: Vec<&Evaluated<'_>> = vec![&me];
    class.extend(others.iter());
    let tables = class_tables(&class, me.scheme, config);
    build_view(&me, Some((tables.as_slice(), class.len())), snapshots, config)
}

/// Bulletins of every supplied student, each ranked against the other
/// records of the same class and scheme. Output follows input order.
pub fn assemble_class(
    records: &[BulletinRecord],
    snapshots: &[RankingSnapshot],
    config: &EngineConfig,
) -> Vec<BulletinView> {
    let evaluated: Vec<Evaluated<'_>> = records.iter().map(evaluate).collect();

    let mut groups: BTreeMap<(&str, Scheme), Vec<usize>> = BTreeMap::new();
    for (i, e) in evaluated.iter().enumerate() {
        groups
            .entry((e.record.classe.id.as_str(), e.scheme))
            .or_default()
            .push(i);
    }

    let mut views: Vec<Option<BulletinView>> = vec![None; evaluated.len()];
    for ((class_id, scheme), members) in &groups {
        let class: Vec<&Evaluated<'_>> = members.iter().map(|&i| &evaluated[i]).collect();
        let tables = class_tables(&class, *scheme, config);
        tracing::debug!(class = %class_id, students = class.len(), "class ranked");
        for &i in members {
            views[i] = Some(build_view(
                &evaluated[i],
                Some((tables.as_slice(), class.len())),
                snapshots,
                config,
            ));
        }
    }
    views.into_iter().flatten().collect()
}
