use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Scale of a primary monthly grade and of a secondary `classe` grade.
pub const SCALE_20: f64 = 20.0;
/// Scale of a secondary `composition` grade.
pub const SCALE_40: f64 = 40.0;

fn default_coefficient() -> f64 {
    1.0
}

/// Ids arrive from the record store either as strings or as integers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdRepr {
    Text(String),
    Int(i64),
}

impl From<IdRepr> for String {
    fn from(v: IdRepr) -> Self {
        match v {
            IdRepr::Text(s) => s.trim().to_string(),
            IdRepr::Int(n) => n.to_string(),
        }
    }
}

pub fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(d).map(String::from)
}

pub fn de_opt_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(d)?.map(String::from))
}

/// Accepts `YYYY-MM-DD` or any timestamp starting with it. Unparseable dates
/// are dropped; they only order duplicate entries.
fn de_opt_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| {
        let head = s.trim().get(..10)?.to_string();
        NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, alias = "nom")]
    pub name: String,
    #[serde(default = "default_coefficient")]
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, alias = "nom")]
    pub name: String,
    #[serde(default, alias = "class_id", alias = "classe_id", deserialize_with = "de_opt_id")]
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, alias = "nom")]
    pub name: Option<String>,
    #[serde(default, alias = "matieres")]
    pub subjects: Vec<Subject>,
    #[serde(default, alias = "student_count", alias = "effectif")]
    pub student_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[serde(alias = "primaire")]
    Primary,
    #[serde(alias = "secondaire")]
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    Oct,
    Nov,
    Dec,
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
}

impl Month {
    /// School-year order.
    pub const ALL: [Month; 9] = [
        Month::Oct,
        Month::Nov,
        Month::Dec,
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
        }
    }

    pub fn position(self) -> usize {
        self as usize
    }

    /// Calendar month number (1..=12) to school month. July to September have no grades.
    pub fn from_calendar(n: i64) -> Option<Month> {
        match n {
            10 => Some(Month::Oct),
            11 => Some(Month::Nov),
            12 => Some(Month::Dec),
            1 => Some(Month::Jan),
            2 => Some(Month::Feb),
            3 => Some(Month::Mar),
            4 => Some(Month::Apr),
            5 => Some(Month::May),
            6 => Some(Month::Jun),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Month> {
        let folded: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'é' | 'è' | 'ê' => 'e',
                'û' | 'ù' => 'u',
                other => other,
            })
            .filter(|c| !matches!(c, '.' | ' '))
            .collect();
        if let Ok(n) = folded.parse::<i64>() {
            return Month::from_calendar(n);
        }
        match folded.as_str() {
            "oct" | "october" | "octobre" => Some(Month::Oct),
            "nov" | "november" | "novembre" => Some(Month::Nov),
            "dec" | "december" | "decembre" => Some(Month::Dec),
            "jan" | "january" | "janv" | "janvier" => Some(Month::Jan),
            "feb" | "february" | "fev" | "fevr" | "fevrier" => Some(Month::Feb),
            "mar" | "march" | "mars" => Some(Month::Mar),
            "apr" | "april" | "avr" | "avril" => Some(Month::Apr),
            "may" | "mai" => Some(Month::May),
            "jun" | "june" | "juin" => Some(Month::Jun),
            _ => None,
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let repr = IdRepr::deserialize(d)?;
        let parsed = match &repr {
            IdRepr::Text(s) => Month::parse(s),
            IdRepr::Int(n) => Month::from_calendar(*n),
        };
        parsed.ok_or_else(|| serde::de::Error::custom(format!("unknown school month: {repr:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cycle {
    First,
    Second,
    Third,
}

impl Cycle {
    pub const ALL: [Cycle; 3] = [Cycle::First, Cycle::Second, Cycle::Third];

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn position(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Cycle::First => "1er trimestre",
            Cycle::Second => "2e trimestre",
            Cycle::Third => "3e trimestre",
        }
    }

    pub fn from_number(n: i64) -> Option<Cycle> {
        match n {
            1 => Some(Cycle::First),
            2 => Some(Cycle::Second),
            3 => Some(Cycle::Third),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Cycle> {
        let t = raw.trim().to_lowercase();
        if let Some(d) = t.chars().find(|c| c.is_ascii_digit()) {
            return Cycle::from_number(i64::from(d.to_digit(10)?));
        }
        if t.starts_with("premier") || t.starts_with("first") {
            Some(Cycle::First)
        } else if t.starts_with("deux") || t.starts_with("second") {
            Some(Cycle::Second)
        } else if t.starts_with("trois") || t.starts_with("third") {
            Some(Cycle::Third)
        } else {
            None
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Cycle {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Cycle {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let repr = IdRepr::deserialize(d)?;
        let parsed = match &repr {
            IdRepr::Text(s) => Cycle::parse(s),
            IdRepr::Int(n) => Cycle::from_number(*n),
        };
        parsed.ok_or_else(|| serde::de::Error::custom(format!("unknown cycle: {repr:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeType {
    Classe,
    Composition,
}

impl GradeType {
    pub fn scale(self) -> f64 {
        match self {
            GradeType::Classe => SCALE_20,
            GradeType::Composition => SCALE_40,
        }
    }
}

/// One grading period of either scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PeriodKey {
    Month(Month),
    Cycle(Cycle),
}

impl PeriodKey {
    pub fn scheme(self) -> Scheme {
        match self {
            PeriodKey::Month(_) => Scheme::Primary,
            PeriodKey::Cycle(_) => Scheme::Secondary,
        }
    }

    pub fn position(self) -> usize {
        match self {
            PeriodKey::Month(m) => m.position(),
            PeriodKey::Cycle(c) => c.position(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PeriodKey::Month(m) => m.label(),
            PeriodKey::Cycle(c) => c.label(),
        }
    }

    pub fn all(scheme: Scheme) -> Vec<PeriodKey> {
        match scheme {
            Scheme::Primary => Month::ALL.iter().copied().map(PeriodKey::Month).collect(),
            Scheme::Secondary => Cycle::ALL.iter().copied().map(PeriodKey::Cycle).collect(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `matiere` is sometimes a bare id and sometimes an embedded subject.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SubjectRef {
    Id(IdRepr),
    Inline {
        #[serde(alias = "_id", deserialize_with = "de_id")]
        id: String,
        #[serde(default, alias = "nom")]
        name: Option<String>,
        #[serde(default)]
        coefficient: Option<f64>,
    },
}

impl SubjectRef {
    pub fn id(&self) -> String {
        match self {
            SubjectRef::Id(v) => String::from(v.clone()),
            SubjectRef::Inline { id, .. } => id.trim().to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SubjectRef::Id(_) => None,
            SubjectRef::Inline { name, .. } => name.as_deref(),
        }
    }

    pub fn coefficient(&self) -> Option<f64> {
        match self {
            SubjectRef::Id(_) => None,
            SubjectRef::Inline { coefficient, .. } => *coefficient,
        }
    }
}

/// Grade entry as the record store sends it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradeEntry {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    /// Foreign key to the subject. Stores may send it next to `matiere`.
    #[serde(
        default,
        rename = "matiere_id",
        alias = "matiereId",
        alias = "subjectId",
        deserialize_with = "de_opt_id"
    )]
    pub matiere_id: Option<String>,
    /// The subject relation: a bare id or the loaded subject object.
    #[serde(default, alias = "subject")]
    pub matiere: Option<SubjectRef>,
    #[serde(default, rename = "type")]
    pub kind: Option<GradeType>,
    pub note: f64,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub coefficient: Option<f64>,
}

impl RawGradeEntry {
    /// The explicit foreign key wins; otherwise the relation's own id.
    pub fn subject_id(&self) -> Option<String> {
        self.matiere_id
            .clone()
            .or_else(|| self.matiere.as_ref().map(SubjectRef::id))
            .filter(|id| !id.is_empty())
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.matiere.as_ref().and_then(SubjectRef::name)
    }

    /// Coefficient carried by the loaded subject, then the grade's own copy.
    pub fn subject_coefficient(&self) -> Option<f64> {
        self.matiere
            .as_ref()
            .and_then(SubjectRef::coefficient)
            .or(self.coefficient)
    }
}

/// Canonical grade entry; every stage after normalization works on this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<GradeType>,
    pub note: f64,
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    #[serde(alias = "month")]
    pub mois: Month,
    #[serde(default, alias = "grades")]
    pub notes: Vec<RawGradeEntry>,
    #[serde(default, alias = "rang")]
    pub rank: Option<u32>,
    #[serde(default, alias = "average")]
    pub moyenne: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    #[serde(alias = "trimestre")]
    pub cycle: Cycle,
    #[serde(default, alias = "grades")]
    pub notes: Vec<RawGradeEntry>,
    #[serde(default, alias = "rang")]
    pub rank: Option<u32>,
    #[serde(default, alias = "average")]
    pub moyenne: Option<f64>,
}

/// Server-assembled report card container for one student.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletinRecord {
    #[serde(alias = "eleve")]
    pub student: Student,
    #[serde(alias = "class")]
    pub classe: ClassInfo,
    #[serde(default)]
    pub scheme: Option<Scheme>,
    #[serde(default, alias = "months")]
    pub mois: Option<Vec<MonthRecord>>,
    #[serde(default)]
    pub cycles: Option<Vec<CycleRecord>>,
    #[serde(default, alias = "moyenne_annuelle", alias = "annualAverage")]
    pub moyenne_annuelle: Option<f64>,
}

/// One period of a bulletin, borrowed from its record.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord<'a> {
    pub key: PeriodKey,
    pub grades: Cow<'a, [RawGradeEntry]>,
    pub rank: Option<u32>,
    pub average: Option<f64>,
}

type PeriodParts<'a> = (&'a [RawGradeEntry], Option<u32>, Option<f64>);

impl<'a> PeriodRecord<'a> {
    /// Several records for the same period pool their grades; the first
    /// server rank and average found are kept.
    fn merged(key: PeriodKey, parts: Vec<PeriodParts<'a>>) -> Self {
        let grades = match parts.as_slice() {
            [] => Cow::Borrowed(<&[RawGradeEntry]>::default()),
            [(grades, _, _)] => Cow::Borrowed(*grades),
            _ => {
                tracing::warn!(
                    period = %key,
                    records = parts.len(),
                    "duplicate period records merged"
                );
                Cow::Owned(
                    parts
                        .iter()
                        .flat_map(|(grades, _, _)| grades.iter().cloned())
                        .collect(),
                )
            }
        };
        PeriodRecord {
            key,
            grades,
            rank: parts.iter().find_map(|p| p.1),
            average: parts.iter().find_map(|p| p.2),
        }
    }
}

impl BulletinRecord {
    pub fn scheme(&self) -> Scheme {
        match (self.scheme, &self.cycles) {
            (Some(s), _) => s,
            (None, Some(_)) => Scheme::Secondary,
            (None, None) => Scheme::Primary,
        }
    }

    /// Every period of the scheme in canonical order. Periods the record
    /// does not carry come back empty; repeated periods are merged.
    pub fn period_records(&self) -> Vec<PeriodRecord<'_>> {
        PeriodKey::all(self.scheme())
            .into_iter()
            .map(|key| {
                let parts: Vec<PeriodParts<'_>> = match key {
                    PeriodKey::Month(m) => self
                        .mois
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .filter(|r| r.mois == m)
                        .map(|r| (r.notes.as_slice(), r.rank, r.moyenne))
                        .collect(),
                    PeriodKey::Cycle(c) => self
                        .cycles
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .filter(|r| r.cycle == c)
                        .map(|r| (r.notes.as_slice(), r.rank, r.moyenne))
                        .collect(),
                };
                PeriodRecord::merged(key, parts)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectCode {
    NoteOutOfScale,
    MissingGradeType,
    MissingSubject,
    NegativeCoefficient,
    InvalidCoefficient,
}

/// A data defect: the offending value is left out of aggregation and
/// reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
    pub code: DefectCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodKey>,
}

impl Defect {
    pub fn new(code: DefectCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            subject_id: None,
            period: None,
        }
    }

    pub fn subject(mut self, subject_id: &str) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn period(mut self, period: PeriodKey) -> Self {
        self.period = Some(period);
        self
    }

    pub(crate) fn record(self, sink: &mut Vec<Defect>) {
        tracing::warn!(
            code = ?self.code,
            subject = self.subject_id.as_deref().unwrap_or("-"),
            period = self.period.map(PeriodKey::label).unwrap_or("-"),
            "{}",
            self.message
        );
        sink.push(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn month_parses_french_and_numbers() {
        assert_eq!(Month::parse("Février"), Some(Month::Feb));
        assert_eq!(Month::parse("decembre"), Some(Month::Dec));
        assert_eq!(Month::parse("10"), Some(Month::Oct));
        assert_eq!(Month::parse("Mai"), Some(Month::May));
        assert_eq!(Month::parse("juillet"), None);
        assert_eq!(Month::from_calendar(8), None);
    }

    #[test]
    fn cycle_parses_labels() {
        assert_eq!(Cycle::parse("1er trimestre"), Some(Cycle::First));
        assert_eq!(Cycle::parse("Deuxième trimestre"), Some(Cycle::Second));
        assert_eq!(Cycle::parse("3"), Some(Cycle::Third));
        assert_eq!(Cycle::parse("4"), None);
    }

    #[test]
    fn matiere_accepts_id_or_object() {
        let by_id: RawGradeEntry =
            serde_json::from_value(json!({ "matiere_id": 7, "note": 12 })).expect("by id");
        assert_eq!(by_id.subject_id().as_deref(), Some("7"));

        let inline: RawGradeEntry = serde_json::from_value(json!({
            "matiere": { "_id": "fr", "nom": "Français", "coefficient": 3 },
            "type": "composition",
            "note": 31.5,
            "date": "2024-11-02T08:00:00.000Z"
        }))
        .expect("inline");
        assert_eq!(inline.subject_id().as_deref(), Some("fr"));
        assert_eq!(inline.subject_name(), Some("Français"));
        assert_eq!(inline.subject_coefficient(), Some(3.0));
        assert_eq!(inline.kind, Some(GradeType::Composition));
        assert_eq!(inline.date, NaiveDate::from_ymd_opt(2024, 11, 2));
    }

    #[test]
    fn foreign_key_and_loaded_relation_together() {
        let both: RawGradeEntry = serde_json::from_value(json!({
            "matiere_id": 3,
            "matiere": { "id": 3, "nom": "Dictée", "coefficient": 2 },
            "note": 12,
            "coefficient": 1
        }))
        .expect("both shapes");
        assert_eq!(both.subject_id().as_deref(), Some("3"));
        assert_eq!(both.subject_name(), Some("Dictée"));
        assert_eq!(both.subject_coefficient(), Some(2.0));

        let bare: RawGradeEntry =
            serde_json::from_value(json!({ "matiere": "fr", "note": 9 })).expect("bare");
        assert_eq!(bare.subject_id().as_deref(), Some("fr"));

        let none: RawGradeEntry = serde_json::from_value(json!({ "note": 9 })).expect("no subject");
        assert_eq!(none.subject_id(), None);
    }

    #[test]
    fn bulletin_scheme_and_full_period_layout() {
        let rec: BulletinRecord = serde_json::from_value(json!({
            "student": { "id": "s1", "name": "Awa" },
            "classe": { "id": "c1", "subjects": [] },
            "cycles": [ { "cycle": 2, "notes": [], "rank": 4 } ]
        }))
        .expect("record");
        assert_eq!(rec.scheme(), Scheme::Secondary);
        let periods = rec.period_records();
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].rank, None);
        assert_eq!(periods[1].rank, Some(4));
        assert_eq!(periods[1].key, PeriodKey::Cycle(Cycle::Second));
    }

    #[test]
    fn repeated_month_records_pool_their_grades() {
        let rec: BulletinRecord = serde_json::from_value(json!({
            "student": { "id": "s1" },
            "classe": { "id": "c1", "subjects": [] },
            "mois": [
                { "mois": "Mars", "notes": [ { "matiere_id": "fr", "note": 12 } ] },
                { "mois": "Oct", "notes": [] },
                { "mois": "Mar", "notes": [ { "matiere_id": "math", "note": 8 } ], "rank": 3 }
            ]
        }))
        .expect("record");
        let periods = rec.period_records();
        let march = &periods[5];
        assert_eq!(march.key, PeriodKey::Month(Month::Mar));
        assert_eq!(march.grades.len(), 2);
        assert_eq!(march.rank, Some(3));
        assert!(matches!(periods[0].grades, Cow::Borrowed(_)));
    }

    #[test]
    fn period_key_wire_shape() {
        let v = serde_json::to_value(PeriodKey::Month(Month::Jan)).expect("ser");
        assert_eq!(v, json!({ "kind": "month", "value": "Jan" }));
        let back: PeriodKey =
            serde_json::from_value(json!({ "kind": "cycle", "value": "2e trimestre" })).expect("de");
        assert_eq!(back, PeriodKey::Cycle(Cycle::Second));
    }
}
