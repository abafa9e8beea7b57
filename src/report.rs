use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::{self, RECENT_WINDOW_DAYS};
use crate::models::{
    ComplianceEntry, ComplianceRecord, DietChart, Meal, MealFood, Patient, Trend,
};
use crate::query::DateRange;

/// Below this overall compliance the plan is flagged as too demanding.
const LOW_COMPLIANCE: i32 = 70;

pub struct ReportInput<'a> {
    pub patient: &'a Patient,
    pub diet_charts: &'a [DietChart],
    pub records: &'a [ComplianceRecord],
    /// Meals and their foods for `diet_charts`; `None` unless requested.
    pub meal_plan: Option<(&'a [Meal], &'a [MealFood])>,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientReport {
    pub patient_overview: PatientOverview,
    pub diet_chart_history: DietChartHistory,
    pub compliance_analysis: Option<ComplianceAnalysis>,
    pub meal_pattern_analysis: Option<MealPatternAnalysis>,
    pub recommendations: Recommendations,
    pub report_metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientOverview {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub dosha: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub bmi_analysis: Option<BmiAnalysis>,
    pub dietary_habits: Option<String>,
    pub meal_frequency: Option<i32>,
    pub water_intake: Option<f64>,
    pub health_conditions: Option<String>,
    pub allergies: Option<String>,
    pub status: String,
    pub health_assessment: HealthAssessment,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthAssessment {
    pub total_diet_charts: usize,
    pub compliance_records: usize,
    pub average_compliance: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BmiAnalysis {
    pub value: f64,
    pub category: BmiCategory,
    pub height: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DietChartHistory {
    pub total_charts: usize,
    pub progression: Vec<ChartProgression>,
    pub effectiveness_analysis: EffectivenessAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartProgression {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub duration: Option<i32>,
    pub target_calories: Option<i32>,
    pub dietary_focus: Option<String>,
    pub dosha_balance_score: Option<i32>,
    pub rasa_score: Option<i32>,
    pub digestibility_score: Option<i32>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessAnalysis {
    pub average_dosha_score: Option<f64>,
    pub average_rasa_score: Option<f64>,
    pub average_digestibility_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceAnalysis {
    pub overall_compliance: i32,
    pub total_records: usize,
    pub best_period: Option<ReportPeriod>,
    pub worst_period: Option<ReportPeriod>,
    pub trend: Trend,
    pub compliance_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub date: NaiveDate,
    pub compliance: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub compliance: Option<i32>,
    pub meals_followed: i32,
    pub meals_total: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPatternAnalysis {
    pub total_meals: usize,
    pub meal_type_distribution: BTreeMap<String, usize>,
    pub average_calories_per_meal: f64,
    pub nutritional_patterns: NutritionalPatterns,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NutritionalPatterns {
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_calories: f64,
    pub thermal_properties: BTreeMap<String, usize>,
    pub rasa_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub category: &'static str,
    pub priority: Priority,
    pub message: String,
    pub suggestion: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub total: usize,
    pub high_priority: usize,
    pub suggestions: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub period: PeriodBounds,
    pub includes_meals: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodBounds {
    pub start_date: String,
    pub end_date: String,
}

pub fn build_patient_report(input: &ReportInput<'_>) -> PatientReport {
    let compliance_analysis = analyze_compliance(input.records);
    let meal_pattern_analysis = match input.meal_plan {
        Some((meals, foods)) if !input.diet_charts.is_empty() => {
            Some(analyze_meals(meals, foods))
        }
        _ => None,
    };
    let recommendations = recommend(input.patient, compliance_analysis.as_ref());
    let patient = input.patient;

    PatientReport {
        patient_overview: PatientOverview {
            id: patient.id,
            name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender.clone(),
            dosha: patient.dosha.clone(),
            phone: patient.phone.clone(),
            email: patient.email.clone(),
            bmi_analysis: match (patient.height, patient.weight) {
                (Some(height), Some(weight)) => bmi_analysis(height, weight),
                _ => None,
            },
            dietary_habits: patient.dietary_habits.clone(),
            meal_frequency: patient.meal_frequency,
            water_intake: patient.water_intake,
            health_conditions: patient.health_conditions.clone(),
            allergies: patient.allergies.clone(),
            status: patient.status.clone(),
            health_assessment: HealthAssessment {
                total_diet_charts: input.diet_charts.len(),
                compliance_records: input.records.len(),
                average_compliance: compliance_analysis.as_ref().map(|c| c.overall_compliance),
            },
        },
        diet_chart_history: chart_history(input.diet_charts),
        compliance_analysis,
        meal_pattern_analysis,
        recommendations,
        report_metadata: ReportMetadata {
            generated_at: input.generated_at,
            period: PeriodBounds {
                start_date: period_label(input.range.start),
                end_date: period_label(input.range.end),
            },
            includes_meals: input.meal_plan.is_some(),
        },
    }
}

/// Height in centimetres, weight in kilograms.
pub fn bmi_analysis(height: f64, weight: f64) -> Option<BmiAnalysis> {
    if height <= 0.0 || weight <= 0.0 {
        return None;
    }

    let meters = height / 100.0;
    let bmi = weight / (meters * meters);
    let category = if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    };

    Some(BmiAnalysis {
        value: round2(bmi),
        category,
        height,
        weight,
    })
}

pub fn dosha_guidance(dosha: &str) -> Option<&'static str> {
    match dosha {
        "Vata" => Some("Focus on warm, cooked foods and regular meal times"),
        "Pitta" => Some("Emphasize cooling foods and avoid excessive spicy meals"),
        "Kapha" => Some("Include more stimulating spices and lighter meals"),
        _ => None,
    }
}

fn analyze_compliance(records: &[ComplianceRecord]) -> Option<ComplianceAnalysis> {
    if records.is_empty() {
        return None;
    }

    let mut newest_first: Vec<ComplianceEntry> = records.iter().map(|r| r.entry()).collect();
    newest_first.sort_by(|a, b| b.date.cmp(&a.date));

    let summary = analytics::summarize(&newest_first);
    let to_period = |day: &crate::models::DayScore| ReportPeriod {
        date: day.date,
        compliance: day.compliance_percentage,
    };

    Some(ComplianceAnalysis {
        overall_compliance: summary.average_compliance,
        total_records: summary.total_records,
        best_period: summary.best_day.as_ref().map(to_period),
        worst_period: summary.worst_day.as_ref().map(to_period),
        trend: analytics::recent_window_trend(&newest_first, RECENT_WINDOW_DAYS),
        compliance_history: newest_first
            .iter()
            .map(|entry| HistoryEntry {
                date: entry.date,
                compliance: entry.compliance_percentage,
                meals_followed: entry.meals_followed,
                meals_total: entry.meals_total,
            })
            .collect(),
    })
}

fn chart_history(charts: &[DietChart]) -> DietChartHistory {
    let average = |score: fn(&DietChart) -> Option<i32>| {
        if charts.is_empty() {
            return None;
        }
        let total: i64 = charts.iter().map(|c| i64::from(score(c).unwrap_or(0))).sum();
        Some(round2(total as f64 / charts.len() as f64))
    };

    DietChartHistory {
        total_charts: charts.len(),
        progression: charts
            .iter()
            .map(|chart| ChartProgression {
                id: chart.id,
                created_at: chart.created_at,
                duration: chart.duration,
                target_calories: chart.target_calories,
                dietary_focus: chart.dietary_focus.clone(),
                dosha_balance_score: chart.dosha_balance_score,
                rasa_score: chart.rasa_score,
                digestibility_score: chart.digestibility_score,
                status: chart.status.clone(),
            })
            .collect(),
        effectiveness_analysis: EffectivenessAnalysis {
            average_dosha_score: average(|c| c.dosha_balance_score),
            average_rasa_score: average(|c| c.rasa_score),
            average_digestibility_score: average(|c| c.digestibility_score),
        },
    }
}

fn analyze_meals(meals: &[Meal], foods: &[MealFood]) -> MealPatternAnalysis {
    let mut meal_type_distribution = BTreeMap::new();
    for meal in meals {
        let key = meal.meal_type.clone().unwrap_or_else(|| "unknown".to_string());
        *meal_type_distribution.entry(key).or_insert(0) += 1;
    }

    let total_calories: f64 = meals.iter().map(|m| m.total_calories.unwrap_or(0.0)).sum();
    let average_calories_per_meal = if meals.is_empty() {
        0.0
    } else {
        round2(total_calories / meals.len() as f64)
    };

    let mut patterns = NutritionalPatterns::default();
    for food in foods {
        patterns.total_protein += food.protein.unwrap_or(0.0);
        patterns.total_carbs += food.carbs.unwrap_or(0.0);
        patterns.total_fat += food.fat.unwrap_or(0.0);
        patterns.total_calories += food.calories.unwrap_or(0.0);

        if let Some(thermal) = &food.thermal_property {
            *patterns.thermal_properties.entry(thermal.clone()).or_insert(0) += 1;
        }
        if let Some(rasa) = &food.rasa {
            *patterns.rasa_distribution.entry(rasa.clone()).or_insert(0) += 1;
        }
    }
    patterns.total_protein = round2(patterns.total_protein);
    patterns.total_carbs = round2(patterns.total_carbs);
    patterns.total_fat = round2(patterns.total_fat);
    patterns.total_calories = round2(patterns.total_calories);

    MealPatternAnalysis {
        total_meals: meals.len(),
        meal_type_distribution,
        average_calories_per_meal,
        nutritional_patterns: patterns,
    }
}

fn recommend(patient: &Patient, compliance: Option<&ComplianceAnalysis>) -> Recommendations {
    let mut suggestions = Vec::new();

    if let Some(analysis) = compliance {
        if analysis.overall_compliance < LOW_COMPLIANCE {
            suggestions.push(Recommendation {
                category: "compliance",
                priority: Priority::High,
                message: "Consider simplifying the diet plan to improve adherence".to_string(),
                suggestion: "Focus on 2-3 key meals per day initially",
            });
        }

        if analysis.trend == Trend::Declining {
            suggestions.push(Recommendation {
                category: "compliance",
                priority: Priority::Medium,
                message: "Compliance is declining - schedule a consultation".to_string(),
                suggestion: "Review current challenges and adjust plan accordingly",
            });
        }
    }

    if let Some(guidance) = dosha_guidance(&patient.dosha) {
        suggestions.push(Recommendation {
            category: "dosha",
            priority: Priority::Medium,
            message: format!("{} balancing", patient.dosha),
            suggestion: guidance,
        });
    }

    Recommendations {
        total: suggestions.len(),
        high_priority: suggestions
            .iter()
            .filter(|s| s.priority == Priority::High)
            .count(),
        suggestions,
    }
}

fn period_label(bound: Option<NaiveDate>) -> String {
    bound
        .map(|date| date.to_string())
        .unwrap_or_else(|| "All time".to_string())
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn render_markdown(report: &PatientReport) -> String {
    let mut output = String::new();
    let overview = &report.patient_overview;
    let period = &report.report_metadata.period;

    let _ = writeln!(output, "# Patient Report: {}", overview.name);
    let _ = writeln!(
        output,
        "Generated {} for {} to {}",
        report.report_metadata.generated_at.format("%Y-%m-%d %H:%M UTC"),
        period.start_date,
        period.end_date
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- {} years, {}, {} constitution ({})",
        overview.age, overview.gender, overview.dosha, overview.status
    );
    match &overview.bmi_analysis {
        Some(bmi) => {
            let _ = writeln!(output, "- BMI {:.2} ({:?})", bmi.value, bmi.category);
        }
        None => {
            let _ = writeln!(output, "- BMI not available");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Compliance");
    match &report.compliance_analysis {
        None => {
            let _ = writeln!(output, "No compliance records for this period.");
        }
        Some(analysis) => {
            let _ = writeln!(
                output,
                "- Overall {}% across {} records, trend {}",
                analysis.overall_compliance, analysis.total_records, analysis.trend
            );
            if let (Some(best), Some(worst)) = (&analysis.best_period, &analysis.worst_period) {
                let _ = writeln!(output, "- Best day {} at {}%", best.date, best.compliance);
                let _ = writeln!(output, "- Worst day {} at {}%", worst.date, worst.compliance);
            }
            for entry in analysis.compliance_history.iter().take(7) {
                let pct = entry
                    .compliance
                    .map(|p| format!("{p}%"))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(
                    output,
                    "- {}: {} ({}/{} meals)",
                    entry.date, pct, entry.meals_followed, entry.meals_total
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Diet Charts");
    let history = &report.diet_chart_history;
    if history.progression.is_empty() {
        let _ = writeln!(output, "No diet charts for this period.");
    } else {
        for chart in history.progression.iter() {
            let _ = writeln!(
                output,
                "- Chart {} ({}): {} for {} days, {} kcal",
                chart.id,
                chart.status,
                chart.dietary_focus.as_deref().unwrap_or("general"),
                chart.duration.map_or_else(|| "?".to_string(), |d| d.to_string()),
                chart.target_calories.map_or_else(|| "?".to_string(), |c| c.to_string())
            );
        }
    }

    if let Some(meals) = &report.meal_pattern_analysis {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Meal Patterns");
        let _ = writeln!(
            output,
            "- {} meals, {:.2} kcal per meal on average",
            meals.total_meals, meals.average_calories_per_meal
        );
        for (meal_type, count) in meals.meal_type_distribution.iter() {
            let _ = writeln!(output, "- {meal_type}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if report.recommendations.suggestions.is_empty() {
        let _ = writeln!(output, "No recommendations.");
    } else {
        for rec in report.recommendations.suggestions.iter() {
            let _ = writeln!(
                output,
                "- [{:?}] {}: {}",
                rec.priority, rec.message, rec.suggestion
            );
        }
    }

    output
}
