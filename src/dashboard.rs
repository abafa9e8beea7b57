use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{ComplianceRecord, DietChart, Patient};
use crate::query::DashboardPeriod;
use crate::report::round2;

/// A patient averaging strictly above this counts as well adhering.
const GOOD_COMPLIANCE: f64 = 80.0;
const RECENT_PATIENTS: usize = 5;
const RECENT_DIET_CHARTS: usize = 5;
const RECENT_COMPLIANCE: usize = 10;

pub struct DashboardInput<'a> {
    pub patients: &'a [Patient],
    pub diet_charts: &'a [DietChart],
    pub records: &'a [ComplianceRecord],
    pub period: DashboardPeriod,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub patient_statistics: PatientCounts,
    pub diet_chart_statistics: DietChartCounts,
    pub compliance_statistics: PracticeCompliance,
    pub recent_activity: RecentActivity,
    pub health_insights: HealthInsights,
    pub period: &'static str,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientCounts {
    pub total_patients: usize,
    pub active_patients: usize,
    pub patients_by_dosha: BTreeMap<String, usize>,
    /// Patients created since the start of the selected period.
    pub new_patients_this_month: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DietChartCounts {
    pub total_diet_charts: usize,
    pub active_diet_charts: usize,
    pub charts_by_focus: BTreeMap<String, usize>,
    pub average_duration: f64,
}

/// Practice-wide rates are two-decimal means over scored rows, keyed on
/// when the row was written rather than the day it describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeCompliance {
    pub overall_compliance_rate: f64,
    pub compliance_this_week: f64,
    pub patients_with_good_compliance: usize,
    /// This week's rate minus last week's.
    pub compliance_trend: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub recent_patients: Vec<RecentPatient>,
    pub recent_diet_charts: Vec<RecentDietChart>,
    pub recent_compliance: Vec<RecentCompliance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPatient {
    pub id: i32,
    pub name: String,
    pub dosha: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentDietChart {
    pub id: i32,
    pub patient_id: i32,
    pub dietary_focus: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentCompliance {
    pub id: i32,
    pub patient_id: i32,
    pub compliance_percentage: Option<i32>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthInsights {
    pub common_health_conditions: BTreeMap<String, usize>,
    pub dietary_habits_distribution: BTreeMap<String, usize>,
    pub average_bmi_by_dosha: BTreeMap<String, f64>,
}

pub fn build_dashboard(input: &DashboardInput<'_>) -> Dashboard {
    Dashboard {
        patient_statistics: patient_counts(input.patients, input.period.start(input.now)),
        diet_chart_statistics: diet_chart_counts(input.diet_charts),
        compliance_statistics: practice_compliance(input.records, input.now),
        recent_activity: recent_activity(input),
        health_insights: health_insights(input.patients),
        period: input.period.as_str(),
        generated_at: input.now,
    }
}

fn patient_counts(patients: &[Patient], period_start: DateTime<Utc>) -> PatientCounts {
    let mut patients_by_dosha = BTreeMap::new();
    for patient in patients {
        *patients_by_dosha.entry(patient.dosha.clone()).or_insert(0) += 1;
    }

    PatientCounts {
        total_patients: patients.len(),
        active_patients: patients.iter().filter(|p| p.status == "Active").count(),
        patients_by_dosha,
        new_patients_this_month: patients
            .iter()
            .filter(|p| p.created_at >= period_start)
            .count(),
    }
}

fn diet_chart_counts(charts: &[DietChart]) -> DietChartCounts {
    let mut charts_by_focus = BTreeMap::new();
    for focus in charts.iter().filter_map(|c| c.dietary_focus.as_ref()) {
        *charts_by_focus.entry(focus.clone()).or_insert(0) += 1;
    }

    let durations: Vec<f64> = charts
        .iter()
        .filter_map(|c| c.duration)
        .map(f64::from)
        .collect();

    DietChartCounts {
        total_diet_charts: charts.len(),
        active_diet_charts: charts.iter().filter(|c| c.status == "Active").count(),
        charts_by_focus,
        average_duration: round2(mean(&durations).unwrap_or(0.0)),
    }
}

fn practice_compliance(records: &[ComplianceRecord], now: DateTime<Utc>) -> PracticeCompliance {
    let this_week_start = now - Duration::days(7);
    let last_week_start = now - Duration::days(14);

    let scored = |keep: &dyn Fn(&ComplianceRecord) -> bool| -> f64 {
        let values: Vec<f64> = records
            .iter()
            .filter(|r| keep(*r))
            .filter_map(|r| r.compliance_percentage)
            .map(f64::from)
            .collect();
        mean(&values).unwrap_or(0.0)
    };

    let overall = scored(&|_| true);
    let this_week = scored(&|r| r.created_at >= this_week_start);
    let last_week = scored(&|r| r.created_at >= last_week_start && r.created_at < this_week_start);

    let mut by_patient: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(pct) = record.compliance_percentage {
            by_patient
                .entry(record.patient_id)
                .or_default()
                .push(f64::from(pct));
        }
    }
    let patients_with_good_compliance = by_patient
        .values()
        .filter(|values| mean(values).is_some_and(|avg| avg > GOOD_COMPLIANCE))
        .count();

    PracticeCompliance {
        overall_compliance_rate: round2(overall),
        compliance_this_week: round2(this_week),
        patients_with_good_compliance,
        compliance_trend: round2(this_week - last_week),
    }
}

fn recent_activity(input: &DashboardInput<'_>) -> RecentActivity {
    let mut patients: Vec<&Patient> = input.patients.iter().collect();
    patients.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let mut charts: Vec<&DietChart> = input.diet_charts.iter().collect();
    charts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let mut records: Vec<&ComplianceRecord> = input.records.iter().collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    RecentActivity {
        recent_patients: patients
            .into_iter()
            .take(RECENT_PATIENTS)
            .map(|p| RecentPatient {
                id: p.id,
                name: p.name.clone(),
                dosha: p.dosha.clone(),
                status: p.status.clone(),
                created_at: p.created_at,
            })
            .collect(),
        recent_diet_charts: charts
            .into_iter()
            .take(RECENT_DIET_CHARTS)
            .map(|c| RecentDietChart {
                id: c.id,
                patient_id: c.patient_id,
                dietary_focus: c.dietary_focus.clone(),
                status: c.status.clone(),
                created_at: c.created_at,
            })
            .collect(),
        recent_compliance: records
            .into_iter()
            .take(RECENT_COMPLIANCE)
            .map(|r| RecentCompliance {
                id: r.id,
                patient_id: r.patient_id,
                compliance_percentage: r.compliance_percentage,
                date: r.date,
                created_at: r.created_at,
            })
            .collect(),
    }
}

fn health_insights(patients: &[Patient]) -> HealthInsights {
    let mut common_health_conditions = BTreeMap::new();
    for conditions in patients.iter().filter_map(|p| p.health_conditions.as_deref()) {
        for condition in conditions.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            *common_health_conditions
                .entry(condition.to_string())
                .or_insert(0) += 1;
        }
    }

    let mut dietary_habits_distribution = BTreeMap::new();
    for habits in patients.iter().filter_map(|p| p.dietary_habits.as_ref()) {
        *dietary_habits_distribution.entry(habits.clone()).or_insert(0) += 1;
    }

    let mut bmi_by_dosha: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for patient in patients {
        if let Some(bmi) = patient.bmi {
            bmi_by_dosha.entry(patient.dosha.clone()).or_default().push(bmi);
        }
    }
    let average_bmi_by_dosha = bmi_by_dosha
        .into_iter()
        .filter_map(|(dosha, values)| mean(&values).map(|avg| (dosha, round2(avg))))
        .collect();

    HealthInsights {
        common_health_conditions,
        dietary_habits_distribution,
        average_bmi_by_dosha,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn render_dashboard_markdown(dashboard: &Dashboard) -> String {
    let mut output = String::new();
    let patients = &dashboard.patient_statistics;
    let charts = &dashboard.diet_chart_statistics;
    let compliance = &dashboard.compliance_statistics;

    let _ = writeln!(output, "# Practice Dashboard");
    let _ = writeln!(
        output,
        "Generated {} (period: {})",
        dashboard.generated_at.format("%Y-%m-%d %H:%M UTC"),
        dashboard.period
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Patients");
    let _ = writeln!(
        output,
        "- {} total, {} active, {} new this {}",
        patients.total_patients,
        patients.active_patients,
        patients.new_patients_this_month,
        dashboard.period
    );
    for (dosha, count) in &patients.patients_by_dosha {
        let _ = writeln!(output, "- {dosha}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Diet charts");
    let _ = writeln!(
        output,
        "- {} total, {} active, average duration {:.2} days",
        charts.total_diet_charts, charts.active_diet_charts, charts.average_duration
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Compliance");
    let _ = writeln!(
        output,
        "- Overall {:.2}%, this week {:.2}% ({:+.2} vs last week)",
        compliance.overall_compliance_rate,
        compliance.compliance_this_week,
        compliance.compliance_trend
    );
    let _ = writeln!(
        output,
        "- {} patients above {GOOD_COMPLIANCE}%",
        compliance.patients_with_good_compliance
    );

    let insights = &dashboard.health_insights;
    if !insights.common_health_conditions.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Common health conditions");
        for (condition, count) in &insights.common_health_conditions {
            let _ = writeln!(output, "- {condition}: {count}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn patient(id: i32, dosha: &str, created_at: DateTime<Utc>) -> Patient {
        Patient {
            id,
            name: format!("Patient {id}"),
            age: 40,
            gender: "Female".to_string(),
            dosha: dosha.to_string(),
            phone: None,
            email: None,
            height: None,
            weight: None,
            bmi: None,
            dietary_habits: None,
            meal_frequency: None,
            water_intake: None,
            health_conditions: None,
            allergies: None,
            status: "Active".to_string(),
            created_at,
        }
    }

    fn chart(id: i32, focus: Option<&str>, duration: Option<i32>, status: &str) -> DietChart {
        DietChart {
            id,
            patient_id: 1,
            duration,
            target_calories: None,
            dietary_focus: focus.map(str::to_string),
            special_instructions: None,
            total_calories: None,
            total_protein: None,
            total_carbs: None,
            total_fat: None,
            dosha_balance_score: None,
            rasa_score: None,
            digestibility_score: None,
            status: status.to_string(),
            created_at: days_ago(i64::from(id)),
            updated_at: days_ago(i64::from(id)),
        }
    }

    fn record(
        id: i32,
        patient_id: i32,
        pct: Option<i32>,
        written: DateTime<Utc>,
    ) -> ComplianceRecord {
        ComplianceRecord {
            id,
            patient_id,
            diet_chart_id: None,
            date: written.date_naive(),
            compliance_percentage: pct,
            meals_followed: 4,
            meals_total: 5,
            notes: None,
            created_at: written,
        }
    }

    fn build(
        patients: &[Patient],
        charts: &[DietChart],
        records: &[ComplianceRecord],
        period: DashboardPeriod,
    ) -> Dashboard {
        build_dashboard(&DashboardInput {
            patients,
            diet_charts: charts,
            records,
            period,
            now: now(),
        })
    }

    #[test]
    fn patient_counts_follow_the_period() {
        let mut inactive = patient(3, "Kapha", days_ago(40));
        inactive.status = "Inactive".to_string();
        let patients = vec![
            patient(1, "Vata", days_ago(2)),
            patient(2, "Vata", days_ago(25)),
            inactive,
        ];

        let month = build(&patients, &[], &[], DashboardPeriod::Month);
        let stats = &month.patient_statistics;
        assert_eq!(stats.total_patients, 3);
        assert_eq!(stats.active_patients, 2);
        assert_eq!(stats.patients_by_dosha.get("Vata"), Some(&2));
        assert_eq!(stats.patients_by_dosha.get("Kapha"), Some(&1));
        // February 1st onwards.
        assert_eq!(stats.new_patients_this_month, 1);
        assert_eq!(month.period, "month");

        let quarter = build(&patients, &[], &[], DashboardPeriod::Quarter);
        assert_eq!(quarter.patient_statistics.new_patients_this_month, 3);
    }

    #[test]
    fn chart_counts_skip_missing_focus_and_duration() {
        let charts = vec![
            chart(1, Some("weight loss"), Some(30), "Active"),
            chart(2, Some("weight loss"), Some(45), "Active"),
            chart(3, None, None, "Completed"),
        ];
        let stats = build(&[], &charts, &[], DashboardPeriod::Month).diet_chart_statistics;

        assert_eq!(
            stats,
            DietChartCounts {
                total_diet_charts: 3,
                active_diet_charts: 2,
                charts_by_focus: BTreeMap::from([("weight loss".to_string(), 2)]),
                average_duration: 37.5,
            }
        );
    }

    #[test]
    fn weekly_rates_use_write_time_and_skip_nulls() {
        let records = vec![
            record(1, 1, Some(90), days_ago(1)),
            record(2, 1, None, days_ago(2)),
            record(3, 1, Some(85), days_ago(3)),
            record(4, 2, Some(70), days_ago(8)),
            record(5, 2, Some(75), days_ago(10)),
            record(6, 3, Some(60), days_ago(30)),
        ];
        let stats = build(&[], &[], &records, DashboardPeriod::Week).compliance_statistics;

        assert_eq!(
            stats,
            PracticeCompliance {
                overall_compliance_rate: 76.0,
                compliance_this_week: 87.5,
                patients_with_good_compliance: 1,
                compliance_trend: 15.0,
            }
        );
    }

    #[test]
    fn good_compliance_is_strictly_above_eighty() {
        let records = vec![
            record(1, 1, Some(80), days_ago(1)),
            record(2, 1, Some(80), days_ago(2)),
            record(3, 2, Some(81), days_ago(1)),
            record(4, 3, None, days_ago(1)),
        ];
        let stats = build(&[], &[], &records, DashboardPeriod::Month).compliance_statistics;
        assert_eq!(stats.patients_with_good_compliance, 1);
    }

    #[test]
    fn no_records_means_zero_rates() {
        let stats = build(&[], &[], &[], DashboardPeriod::Month).compliance_statistics;
        assert_eq!(stats.overall_compliance_rate, 0.0);
        assert_eq!(stats.compliance_this_week, 0.0);
        assert_eq!(stats.compliance_trend, 0.0);
        assert_eq!(stats.patients_with_good_compliance, 0);
    }

    #[test]
    fn recent_activity_is_newest_first_and_capped() {
        let patients: Vec<Patient> = (1..=7)
            .map(|id| patient(id, "Vata", days_ago(10 - i64::from(id))))
            .collect();
        let records: Vec<ComplianceRecord> = (1..=12)
            .map(|id| record(id, 1, Some(80), days_ago(i64::from(id))))
            .collect();
        let activity = build(&patients, &[], &records, DashboardPeriod::Month).recent_activity;

        let patient_ids: Vec<i32> = activity.recent_patients.iter().map(|p| p.id).collect();
        assert_eq!(patient_ids, vec![7, 6, 5, 4, 3]);
        assert_eq!(activity.recent_compliance.len(), 10);
        assert_eq!(activity.recent_compliance[0].id, 1);
        assert!(activity.recent_diet_charts.is_empty());
    }

    #[test]
    fn health_insights_split_conditions_and_average_bmi() {
        let mut first = patient(1, "Vata", days_ago(1));
        first.health_conditions = Some("Hypertension, Acid reflux".to_string());
        first.dietary_habits = Some("Vegetarian".to_string());
        first.bmi = Some(24.0);
        let mut second = patient(2, "Vata", days_ago(1));
        second.health_conditions = Some(" Hypertension ,,".to_string());
        second.dietary_habits = Some("Vegetarian".to_string());
        second.bmi = Some(25.34);
        let third = patient(3, "Kapha", days_ago(1));

        let insights =
            build(&[first, second, third], &[], &[], DashboardPeriod::Month).health_insights;

        assert_eq!(
            insights,
            HealthInsights {
                common_health_conditions: BTreeMap::from([
                    ("Acid reflux".to_string(), 1),
                    ("Hypertension".to_string(), 2),
                ]),
                dietary_habits_distribution: BTreeMap::from([("Vegetarian".to_string(), 2)]),
                average_bmi_by_dosha: BTreeMap::from([("Vata".to_string(), 24.67)]),
            }
        );
    }

    #[test]
    fn dashboard_json_shape() {
        let dashboard = build(&[], &[], &[], DashboardPeriod::Year);
        let value = serde_json::to_value(&dashboard).unwrap();

        for key in [
            "patient_statistics",
            "diet_chart_statistics",
            "compliance_statistics",
            "recent_activity",
            "health_insights",
            "generated_at",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["period"], "year");
        assert_eq!(value["compliance_statistics"]["compliance_trend"], 0.0);
    }

    #[test]
    fn markdown_lists_sections() {
        let mut sick = patient(1, "Pitta", days_ago(1));
        sick.health_conditions = Some("PCOS".to_string());
        let dashboard = build(&[sick], &[], &[], DashboardPeriod::Week);
        let markdown = render_dashboard_markdown(&dashboard);

        assert!(markdown.starts_with("# Practice Dashboard"));
        assert!(markdown.contains("- 1 total, 1 active, 1 new this week"));
        assert!(markdown.contains("## Common health conditions"));
        assert!(markdown.contains("- PCOS: 1"));
    }
}
