use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One day of adherence, as handed to the analytics functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub date: NaiveDate,
    pub compliance_percentage: Option<i32>,
    pub meals_followed: i32,
    pub meals_total: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayScore {
    pub date: NaiveDate,
    pub compliance_percentage: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub average_compliance: i32,
    pub total_records: usize,
    #[serde(rename = "compliance_trend")]
    pub trend: Trend,
    pub best_day: Option<DayScore>,
    pub worst_day: Option<DayScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub dosha: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub dietary_habits: Option<String>,
    pub meal_frequency: Option<i32>,
    pub water_intake: Option<f64>,
    pub health_conditions: Option<String>,
    pub allergies: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DietChart {
    pub id: i32,
    pub patient_id: i32,
    pub duration: Option<i32>,
    pub target_calories: Option<i32>,
    pub dietary_focus: Option<String>,
    pub special_instructions: Option<String>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
    pub dosha_balance_score: Option<i32>,
    pub rasa_score: Option<i32>,
    pub digestibility_score: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceRecord {
    pub id: i32,
    pub patient_id: i32,
    pub diet_chart_id: Option<i32>,
    pub date: NaiveDate,
    pub compliance_percentage: Option<i32>,
    pub meals_followed: i32,
    pub meals_total: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ComplianceRecord {
    pub fn entry(&self) -> ComplianceEntry {
        ComplianceEntry {
            date: self.date,
            compliance_percentage: self.compliance_percentage,
            meals_followed: self.meals_followed,
            meals_total: self.meals_total,
        }
    }
}

/// A compliance row joined with the patient it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ChartComplianceRecord {
    #[serde(flatten)]
    pub record: ComplianceRecord,
    pub patient_name: String,
    pub patient_age: i32,
    pub patient_gender: String,
    pub patient_dosha: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
}

/// A compliance row joined with its diet chart, when it has one.
#[derive(Debug, Clone, Serialize)]
pub struct PatientComplianceRecord {
    #[serde(flatten)]
    pub record: ComplianceRecord,
    pub diet_chart: Option<DietChart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i32,
    pub diet_chart_id: i32,
    pub meal_type: Option<String>,
    pub meal_time: Option<String>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealFood {
    pub id: i32,
    pub meal_id: i32,
    pub food_name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub thermal_property: Option<String>,
    pub digestibility: Option<String>,
    pub rasa: Option<String>,
    pub dosha_effect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}
