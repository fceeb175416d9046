use bulletind::bulletin::{assemble, assemble_class};
use bulletind::config::{EngineConfig, PrimaryAnnualDivisor};
use bulletind::model::{BulletinRecord, DefectCode, Scheme};
use serde_json::json;

fn record(v: serde_json::Value) -> BulletinRecord {
    serde_json::from_value(v).expect("bulletin record")
}

fn french_math_class() -> serde_json::Value {
    json!({
        "id": "6A",
        "subjects": [
            { "id": "fr", "name": "French", "coefficient": 2 },
            { "id": "math", "name": "Math", "coefficient": 1 }
        ]
    })
}

#[test]
fn secondary_cycle_scenario_weights_by_coefficient() {
    let rec = record(json!({
        "student": { "id": "s1", "name": "Moussa" },
        "classe": french_math_class(),
        "cycles": [ { "cycle": 1, "notes": [
            { "matiere_id": "fr", "type": "classe", "note": 14 },
            { "matiere_id": "fr", "type": "composition", "note": 30 },
            { "matiere_id": "math", "type": "classe", "note": 10 },
            { "matiere_id": "math", "type": "composition", "note": 20 }
        ] } ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    assert_eq!(view.scheme, Scheme::Secondary);
    assert_eq!(view.subjects[0].per_period[0], Some(14.5));
    assert_eq!(view.subjects[1].per_period[0], Some(10.0));
    assert_eq!(view.period_averages[0], Some(13.0));
    assert_eq!(view.period_totals[0], Some(39.0));
    assert_eq!(view.period_coefficients[0], 3.0);
}

#[test]
fn partial_secondary_entry_is_outside_numerator_and_denominator() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": french_math_class(),
        "cycles": [ { "cycle": 1, "notes": [
            { "matiere_id": "fr", "type": "classe", "note": 14 },
            { "matiere_id": "fr", "type": "composition", "note": 30 },
            { "matiere_id": "math", "type": "classe", "note": 2 }
        ] } ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    assert_eq!(view.subjects[1].per_period[0], None);
    assert_eq!(view.period_averages[0], Some(14.5));
    assert_eq!(view.period_coefficients[0], 2.0);
    assert!(view.defects.is_empty());
}

#[test]
fn empty_primary_month_is_blank_and_counts_zero_in_annual() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": french_math_class(),
        "mois": [
            { "mois": "Oct", "notes": [ { "matiere_id": "fr", "note": 18 }, { "matiere_id": "math", "note": 9 } ] },
            { "mois": "Nov", "notes": [] }
        ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    assert_eq!(view.periods.len(), 9);
    assert_eq!(view.period_averages[0], Some(15.0));
    assert_eq!(view.period_averages[1], None);
    assert_eq!(view.period_totals[1], None);
    // 15 / 9
    assert_eq!(view.annual_average, Some(1.67));

    let relaxed = EngineConfig {
        primary_annual_divisor: PrimaryAnnualDivisor::MonthsWithData,
        ..EngineConfig::default()
    };
    let view = assemble(&rec, &[], &[], &relaxed);
    assert_eq!(view.annual_average, Some(15.0));
}

#[test]
fn secondary_annual_divides_by_cycles_with_data() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": { "id": "6A", "subjects": [ { "id": "fr", "coefficient": 1 } ] },
        "cycles": [
            { "cycle": 1, "notes": [
                { "matiere_id": "fr", "type": "classe", "note": 12 },
                { "matiere_id": "fr", "type": "composition", "note": 24 }
            ] },
            { "cycle": 3, "notes": [
                { "matiere_id": "fr", "type": "classe", "note": 16 },
                { "matiere_id": "fr", "type": "composition", "note": 32 }
            ] }
        ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    assert_eq!(view.period_averages, vec![Some(12.0), None, Some(16.0)]);
    assert_eq!(view.annual_average, Some(14.0));
}

#[test]
fn zero_grade_is_distinct_from_missing_grade() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": french_math_class(),
        "mois": [ { "mois": "Jan", "notes": [ { "matiere_id": "math", "note": 0 } ] } ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    let jan = 3;
    assert_eq!(view.subjects[0].per_period[jan], None);
    assert_eq!(view.subjects[1].per_period[jan], Some(0.0));
    assert_eq!(view.period_averages[jan], Some(0.0));

    let text = serde_json::to_value(&view).expect("serialize view");
    assert!(text.pointer("/subjects/0/perPeriod/3").expect("cell").is_null());
    assert_eq!(
        text.pointer("/subjects/1/perPeriod/3").and_then(|v| v.as_f64()),
        Some(0.0)
    );
}

#[test]
fn defective_grades_are_reported_without_failing_the_render() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": {
            "id": "6A",
            "subjects": [
                { "id": "fr", "coefficient": 2 },
                { "id": "dessin", "coefficient": -1 }
            ]
        },
        "cycles": [ { "cycle": "2e trimestre", "notes": [
            { "matiere_id": "fr", "type": "classe", "note": 12 },
            { "matiere_id": "fr", "type": "composition", "note": 28 },
            { "matiere_id": "dessin", "type": "classe", "note": 20 },
            { "matiere_id": "dessin", "type": "composition", "note": 40 },
            { "matiere_id": "fr", "type": "composition", "note": 55, "date": "2025-03-01" }
        ] } ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    assert_eq!(view.period_averages[1], Some(13.0));
    let codes: Vec<DefectCode> = view.defects.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DefectCode::NoteOutOfScale));
    assert!(codes.contains(&DefectCode::NegativeCoefficient));
}

#[test]
fn class_assembly_ranks_each_student() {
    let make = |id: &str, fr: f64, math: f64| {
        record(json!({
            "student": { "id": id },
            "classe": french_math_class(),
            "mois": [ { "mois": "Dec", "notes": [
                { "matiere_id": "fr", "note": fr },
                { "matiere_id": "math", "note": math }
            ] } ]
        }))
    };
    let records = vec![
        make("s1", 12.0, 12.0),
        make("s2", 15.0, 6.0),
        make("s3", 10.0, 10.0),
        record(json!({ "student": { "id": "s4" }, "classe": french_math_class(), "mois": [] })),
    ];

    let views = assemble_class(&records, &[], &EngineConfig::default());
    let dec = 2;
    let ranks: Vec<u32> = views.iter().map(|v| v.ranks[dec]).collect();
    // s1 and s2 both average 12.
    assert_eq!(ranks, vec![1, 1, 3, 4]);
    assert!(views.iter().all(|v| v.ranks[0] == 0));
    assert_eq!(views[0].class_size, 4);
    let stats = views[0].class_stats[dec].expect("december stats");
    assert_eq!(stats.graded_students, 3);
    assert_eq!(stats.lowest, 10.0);
}

#[test]
fn grade_with_foreign_key_and_loaded_subject_still_renders() {
    let rec = record(json!({
        "student": { "id": "s1" },
        "classe": french_math_class(),
        "mois": [ { "mois": "Fevrier", "notes": [
            { "matiere_id": "fr", "matiere": { "id": "fr", "nom": "Français" }, "note": 12 },
            { "matiereId": "math", "matiere": "math", "note": 15 },
            { "note": 19 }
        ] } ]
    }));

    let view = assemble(&rec, &[], &[], &EngineConfig::default());
    let feb = 4;
    assert_eq!(view.subjects[0].per_period[feb], Some(12.0));
    assert_eq!(view.subjects[1].per_period[feb], Some(15.0));
    assert_eq!(view.period_averages[feb], Some(13.0));
    let codes: Vec<DefectCode> = view.defects.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![DefectCode::MissingSubject]);
}
