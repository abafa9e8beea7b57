use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{ingest, query};
use crate::models::{
    ChartComplianceRecord, ComplianceEntry, ComplianceRecord, DietChart, Meal, MealFood,
    Patient, PatientComplianceRecord,
};
use crate::query::{DateRange, Page, SortOrder};

/// Which owner a set of compliance rows is filtered by.
#[derive(Debug, Clone, Copy)]
pub enum EntryScope {
    Chart(i32),
    Patient(i32),
}

impl EntryScope {
    fn column(&self) -> &'static str {
        match self {
            EntryScope::Chart(_) => "diet_chart_id",
            EntryScope::Patient(_) => "patient_id",
        }
    }

    fn id(&self) -> i32 {
        match self {
            EntryScope::Chart(id) | EntryScope::Patient(id) => *id,
        }
    }
}

const RECORD_COLUMNS: &str = "cr.id, cr.patient_id, cr.diet_chart_id, cr.date, \
     cr.compliance_percentage, cr.meals_followed, cr.meals_total, cr.notes, cr.created_at";

const RANGE_FILTER: &str =
    "($2::date IS NULL OR cr.date >= $2) AND ($3::date IS NULL OR cr.date <= $3)";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct SeedChart {
    duration: i32,
    target_calories: i32,
    dietary_focus: &'static str,
    special_instructions: &'static str,
    totals: [f64; 4],
    scores: [i32; 3],
    status: &'static str,
    created_on: &'static str,
    updated_on: &'static str,
}

/// One chart per seeded patient, in patient order.
const SEED_CHARTS: [SeedChart; 5] = [
    SeedChart {
        duration: 30,
        target_calories: 1500,
        dietary_focus: "weight loss",
        special_instructions: "Follow Vata-pacifying diet with warm, cooked foods. Avoid cold and raw foods. Include ginger tea before meals to enhance digestion. Eat regular meals at consistent times. Include ghee and sesame oil for healthy fats. Avoid excessive fasting and maintain stable blood sugar levels.",
        totals: [1485.5, 85.2, 195.8, 42.6],
        scores: [88, 82, 91],
        status: "Active",
        created_on: "2024-01-15",
        updated_on: "2024-01-15",
    },
    SeedChart {
        duration: 60,
        target_calories: 1800,
        dietary_focus: "weight loss",
        special_instructions: "Pitta-balancing diet with cooling foods and bitter tastes. Avoid spicy, oily, and fried foods. Include plenty of fresh vegetables and fruits. Drink cool water between meals. Avoid eating during peak sun hours. Include coconut water and mint to cool the system. Practice moderation in all meals.",
        totals: [1795.3, 102.7, 238.4, 58.9],
        scores: [92, 87, 89],
        status: "Active",
        created_on: "2024-01-20",
        updated_on: "2024-01-20",
    },
    SeedChart {
        duration: 45,
        target_calories: 1200,
        dietary_focus: "digestive health",
        special_instructions: "Kapha-reducing diet with light, warm, and spicy foods. Avoid dairy, cold foods, and excessive sweets. Include plenty of vegetables and legumes. Drink warm water throughout the day. Fast periodically to improve digestion. Use warming spices like ginger, black pepper, and turmeric. Eat largest meal at noon.",
        totals: [1195.8, 68.4, 158.9, 35.2],
        scores: [85, 79, 94],
        status: "Active",
        created_on: "2024-02-01",
        updated_on: "2024-02-01",
    },
    SeedChart {
        duration: 90,
        target_calories: 2000,
        dietary_focus: "therapeutic",
        special_instructions: "Therapeutic Ayurvedic diet for chronic conditions. Focus on easily digestible foods with healing properties. Include medicinal herbs like turmeric, ashwagandha, and triphala. Avoid processed foods and refined sugars. Eat fresh, organic produce when possible. Include therapeutic preparations like kitchari and medicated ghee. Follow strict meal timing.",
        totals: [1985.6, 118.3, 264.7, 72.1],
        scores: [95, 90, 93],
        status: "Active",
        created_on: "2024-02-10",
        updated_on: "2024-02-10",
    },
    SeedChart {
        duration: 21,
        target_calories: 1600,
        dietary_focus: "immunity boost",
        special_instructions: "Immunity-boosting Ayurvedic diet with rasayana foods. Include vitamin C rich fruits, immunity-boosting spices like turmeric and ginger. Consume chyawanprash daily. Include plenty of cooked vegetables and whole grains. Avoid refined and processed foods. Drink golden milk before bed. Include seasonal fruits and maintain food freshness.",
        totals: [1588.9, 94.6, 212.3, 48.7],
        scores: [78, 84, 87],
        status: "Completed",
        created_on: "2024-01-10",
        updated_on: "2024-02-15",
    },
];

/// (patient number, date, percentage, meals followed, meals total, notes);
/// patient N follows seeded chart N.
const SEED_COMPLIANCE: [(usize, &str, i32, i32, i32, &str); 30] = [
    (1, "2024-01-01", 92, 5, 5, "Excellent adherence, following all meal timings perfectly"),
    (1, "2024-01-02", 88, 4, 5, "Missed evening snack due to work meeting"),
    (1, "2024-01-03", 95, 5, 5, "Perfect day! Meal prep on Sunday really helped"),
    (1, "2024-01-04", 90, 5, 5, "All meals followed, portion control maintained well"),
    (1, "2024-01-05", 85, 4, 5, "Skipped mid-morning snack, otherwise good adherence"),
    (1, "2024-01-06", 93, 5, 5, "Feeling energetic, following schedule religiously"),
    (2, "2024-01-01", 82, 4, 5, "New Year celebration affected dinner timing"),
    (2, "2024-01-02", 85, 4, 5, "Good progress, missed afternoon snack"),
    (2, "2024-01-03", 78, 4, 5, "Stress eating at work, portion sizes increased"),
    (2, "2024-01-04", 88, 5, 5, "Better control today, all meals on time"),
    (2, "2024-01-05", 80, 4, 5, "Weekend social event disrupted evening meal"),
    (2, "2024-01-06", 86, 5, 5, "Back on track, feeling motivated"),
    (3, "2024-01-01", 75, 3, 5, "Single parent challenges, rushed meals"),
    (3, "2024-01-02", 70, 3, 5, "Kids sick, could not maintain meal schedule"),
    (3, "2024-01-03", 83, 4, 5, "Better day, meal prepping helped"),
    (3, "2024-01-04", 72, 3, 5, "Work deadline pressure, grabbed quick meals"),
    (3, "2024-01-05", 85, 4, 5, "Weekend allowed better meal planning"),
    (3, "2024-01-06", 78, 4, 5, "Improving gradually, need more support"),
    (4, "2024-01-01", 95, 5, 5, "Perfect start to the year, all goals met"),
    (4, "2024-01-02", 92, 5, 5, "Slight portion increase at dinner but within limits"),
    (4, "2024-01-03", 88, 4, 5, "Travel day, missed one snack but maintained quality"),
    (4, "2024-01-04", 95, 5, 5, "Excellent discipline, feeling very satisfied"),
    (4, "2024-01-05", 90, 5, 5, "All meals followed, minor timing adjustment"),
    (4, "2024-01-06", 94, 5, 5, "Consistently maintaining high standards"),
    (5, "2024-01-01", 79, 4, 5, "Airport delays affected meal timing"),
    (5, "2024-01-02", 75, 3, 5, "Business travel, limited healthy options"),
    (5, "2024-01-03", 82, 4, 5, "Hotel room service, did best with available options"),
    (5, "2024-01-04", 76, 4, 5, "Client dinner, managed portions but not ideal foods"),
    (5, "2024-01-05", 80, 4, 5, "Back home, getting back on track"),
    (5, "2024-01-06", 81, 4, 5, "Weekend recovery, meal prep for next week"),
];

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let patients = vec![
        ("Priya Sharma", 34, "Female", "Vata", "priya.sharma@example.com", 165.0, 68.0, "Vegetarian", "Hypothyroidism, Anxiety"),
        ("Rajesh Kumar", 45, "Male", "Pitta", "rajesh.kumar@example.com", 175.0, 88.0, "Mixed diet", "Hypertension, Acid reflux"),
        ("Anita Desai", 29, "Female", "Kapha", "anita.desai@example.com", 160.0, 72.0, "Vegetarian", "PCOS"),
        ("Vikram Singh", 52, "Male", "Vata-Pitta", "vikram.singh@example.com", 170.0, 74.0, "Eggetarian", "Type 2 diabetes, Hypertension"),
        ("Meera Iyer", 38, "Female", "Pitta-Kapha", "meera.iyer@example.com", 158.0, 61.0, "Vegan", ""),
    ];

    let mut patient_ids = Vec::new();
    for (name, age, gender, dosha, email, height, weight, habits, conditions) in patients {
        let id: i32 = sqlx::query(
            r#"
            INSERT INTO ayur_diet.patients
            (name, age, gender, dosha, email, height, weight, bmi, dietary_habits, meal_frequency, health_conditions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 5, NULLIF($10, ''))
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, dosha = EXCLUDED.dosha, updated_at = now()
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(age)
        .bind(gender)
        .bind(dosha)
        .bind(email)
        .bind(height)
        .bind(weight)
        .bind(weight / ((height / 100.0) * (height / 100.0)))
        .bind(habits)
        .bind(conditions)
        .fetch_one(pool)
        .await?
        .get("id");
        patient_ids.push(id);
    }

    let mut chart_ids = Vec::new();
    for (patient_id, chart) in patient_ids.iter().zip(SEED_CHARTS.iter()) {
        let existing: Option<i32> = sqlx::query(
            "SELECT id FROM ayur_diet.diet_charts WHERE patient_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(patient_id)
        .fetch_optional(pool)
        .await?
        .map(|row| row.get("id"));

        let chart_id = match existing {
            Some(id) => id,
            None => sqlx::query(
                r#"
                INSERT INTO ayur_diet.diet_charts
                (patient_id, duration, target_calories, dietary_focus, special_instructions,
                 total_calories, total_protein, total_carbs, total_fat,
                 dosha_balance_score, rasa_score, digestibility_score, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING id
                "#,
            )
            .bind(patient_id)
            .bind(chart.duration)
            .bind(chart.target_calories)
            .bind(chart.dietary_focus)
            .bind(chart.special_instructions)
            .bind(chart.totals[0])
            .bind(chart.totals[1])
            .bind(chart.totals[2])
            .bind(chart.totals[3])
            .bind(chart.scores[0])
            .bind(chart.scores[1])
            .bind(chart.scores[2])
            .bind(chart.status)
            .bind(start_of_day(chart.created_on)?)
            .bind(start_of_day(chart.updated_on)?)
            .fetch_one(pool)
            .await?
            .get("id"),
        };
        chart_ids.push(chart_id);
    }

    if let Some(first_chart) = chart_ids.first() {
        seed_meal_plan(pool, *first_chart).await?;
    }

    for (patient, date, pct, followed, total, notes) in SEED_COMPLIANCE {
        let (Some(patient_id), Some(chart_id)) =
            (patient_ids.get(patient - 1), chart_ids.get(patient - 1))
        else {
            continue;
        };
        let day = query::parse_date("date", date)?;

        sqlx::query(
            r#"
            INSERT INTO ayur_diet.compliance_records
            (patient_id, diet_chart_id, date, compliance_percentage, meals_followed, meals_total,
             notes, source_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(patient_id)
        .bind(chart_id)
        .bind(day)
        .bind(pct)
        .bind(followed)
        .bind(total)
        .bind(notes)
        .bind(format!("seed-{patient_id}-{date}"))
        .bind(start_of_day(date)?)
        .execute(pool)
        .await?;
    }

    info!(patients = patient_ids.len(), charts = chart_ids.len(), "seed complete");
    Ok(())
}

fn start_of_day(date: &str) -> anyhow::Result<DateTime<Utc>> {
    let day = query::parse_date("date", date)?;
    let midnight = day.and_hms_opt(0, 0, 0).context("invalid seed timestamp")?;
    Ok(Utc.from_utc_datetime(&midnight))
}

async fn seed_meal_plan(pool: &PgPool, chart_id: i32) -> anyhow::Result<()> {
    let already: i64 = sqlx::query("SELECT COUNT(*) AS n FROM ayur_diet.meals WHERE diet_chart_id = $1")
        .bind(chart_id)
        .fetch_one(pool)
        .await?
        .get("n");
    if already > 0 {
        return Ok(());
    }

    let plan = vec![
        ("breakfast", "07:30", "Moong dal khichdi", 320.0, 12.4, 52.1, 6.3, "warming", "sweet"),
        ("lunch", "12:30", "Basmati rice with ghee", 410.0, 7.8, 78.2, 9.5, "neutral", "sweet"),
        ("snack", "16:00", "Ginger tea with dates", 140.0, 1.2, 33.0, 0.4, "warming", "pungent"),
        ("dinner", "19:00", "Vegetable soup", 210.0, 6.1, 30.4, 5.2, "warming", "salty"),
    ];

    for (meal_type, meal_time, food, calories, protein, carbs, fat, thermal, rasa) in plan {
        let meal_id: i32 = sqlx::query(
            r#"
            INSERT INTO ayur_diet.meals
            (diet_chart_id, meal_type, meal_time, total_calories, total_protein, total_carbs, total_fat)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(chart_id)
        .bind(meal_type)
        .bind(meal_time)
        .bind(calories)
        .bind(protein)
        .bind(carbs)
        .bind(fat)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO ayur_diet.meal_foods
            (meal_id, food_name, quantity, unit, calories, protein, carbs, fat,
             thermal_property, digestibility, rasa, dosha_effect)
            VALUES ($1, $2, 1, 'serving', $3, $4, $5, $6, $7, 'easy', $8, 'balances Vata')
            "#,
        )
        .bind(meal_id)
        .bind(food)
        .bind(calories)
        .bind(protein)
        .bind(carbs)
        .bind(fat)
        .bind(thermal)
        .bind(rasa)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let rows = ingest::read_path(csv_path)?;
    let mut inserted = 0usize;

    for row in rows {
        let source_key = row
            .source_key
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO ayur_diet.compliance_records
            (patient_id, diet_chart_id, date, compliance_percentage, meals_followed, meals_total, notes, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(row.patient_id)
        .bind(row.diet_chart_id)
        .bind(row.date)
        .bind(row.compliance_percentage)
        .bind(row.meals_followed)
        .bind(row.meals_total)
        .bind(&row.notes)
        .bind(&source_key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to import compliance row {source_key}"))?;

        if result.rows_affected() > 0 {
            inserted += 1;
        } else {
            debug!(%source_key, "compliance row already present");
        }
    }

    Ok(inserted)
}

const PATIENT_COLUMNS: &str = "id, name, age, gender, dosha, phone, email, height, weight, bmi, \
     dietary_habits, meal_frequency, water_intake, health_conditions, allergies, status, created_at";

pub async fn fetch_patient(pool: &PgPool, id: i32) -> anyhow::Result<Option<Patient>> {
    let row = sqlx::query(&format!(
        "SELECT {PATIENT_COLUMNS} FROM ayur_diet.patients WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(patient_from_row))
}

/// Every patient, newest first.
pub async fn fetch_all_patients(pool: &PgPool) -> anyhow::Result<Vec<Patient>> {
    let rows = sqlx::query(&format!(
        "SELECT {PATIENT_COLUMNS} FROM ayur_diet.patients ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(patient_from_row).collect())
}

/// Every diet chart, newest first.
pub async fn fetch_all_diet_charts(pool: &PgPool) -> anyhow::Result<Vec<DietChart>> {
    let rows = sqlx::query("SELECT * FROM ayur_diet.diet_charts ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| diet_chart_from_row(row, "")).collect())
}

/// Every compliance row, most recently written first.
pub async fn fetch_all_compliance_records(pool: &PgPool) -> anyhow::Result<Vec<ComplianceRecord>> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM ayur_diet.compliance_records cr \
         ORDER BY cr.created_at DESC, cr.id DESC"
    );
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    debug!(count = rows.len(), "fetched all compliance records");
    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn fetch_diet_chart(pool: &PgPool, id: i32) -> anyhow::Result<Option<DietChart>> {
    let row = sqlx::query("SELECT * FROM ayur_diet.diet_charts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| diet_chart_from_row(&row, "")))
}

/// Diet charts for a patient, newest first, optionally limited to charts
/// created inside `range`.
pub async fn fetch_patient_diet_charts(
    pool: &PgPool,
    patient_id: i32,
    range: DateRange,
) -> anyhow::Result<Vec<DietChart>> {
    let rows = sqlx::query(
        "SELECT * FROM ayur_diet.diet_charts \
         WHERE patient_id = $1 \
         AND ($2::date IS NULL OR created_at::date >= $2) \
         AND ($3::date IS NULL OR created_at::date <= $3) \
         ORDER BY created_at DESC",
    )
    .bind(patient_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| diet_chart_from_row(row, "")).collect())
}

pub async fn fetch_chart_records(
    pool: &PgPool,
    chart_id: i32,
    range: DateRange,
    page: Page,
) -> anyhow::Result<Vec<ChartComplianceRecord>> {
    let query = format!(
        "SELECT {RECORD_COLUMNS}, p.name AS patient_name, p.age AS patient_age, \
         p.gender AS patient_gender, p.dosha AS patient_dosha, \
         p.phone AS patient_phone, p.email AS patient_email \
         FROM ayur_diet.compliance_records cr \
         JOIN ayur_diet.patients p ON p.id = cr.patient_id \
         WHERE cr.diet_chart_id = $1 AND {RANGE_FILTER} \
         ORDER BY cr.date DESC, cr.id DESC \
         LIMIT $4 OFFSET $5"
    );

    let rows = sqlx::query(&query)
        .bind(chart_id)
        .bind(range.start)
        .bind(range.end)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| ChartComplianceRecord {
            record: record_from_row(row),
            patient_name: row.get("patient_name"),
            patient_age: row.get("patient_age"),
            patient_gender: row.get("patient_gender"),
            patient_dosha: row.get("patient_dosha"),
            patient_phone: row.get("patient_phone"),
            patient_email: row.get("patient_email"),
        })
        .collect())
}

pub async fn fetch_patient_records(
    pool: &PgPool,
    patient_id: i32,
    range: DateRange,
    page: Page,
    order: SortOrder,
) -> anyhow::Result<Vec<PatientComplianceRecord>> {
    let direction = order.sql();
    let query = format!(
        "SELECT {RECORD_COLUMNS}, \
         dc.id AS dc_id, dc.patient_id AS dc_patient_id, dc.duration AS dc_duration, \
         dc.target_calories AS dc_target_calories, dc.dietary_focus AS dc_dietary_focus, \
         dc.special_instructions AS dc_special_instructions, \
         dc.total_calories AS dc_total_calories, dc.total_protein AS dc_total_protein, \
         dc.total_carbs AS dc_total_carbs, dc.total_fat AS dc_total_fat, \
         dc.dosha_balance_score AS dc_dosha_balance_score, dc.rasa_score AS dc_rasa_score, \
         dc.digestibility_score AS dc_digestibility_score, dc.status AS dc_status, \
         dc.created_at AS dc_created_at, dc.updated_at AS dc_updated_at \
         FROM ayur_diet.compliance_records cr \
         LEFT JOIN ayur_diet.diet_charts dc ON dc.id = cr.diet_chart_id \
         WHERE cr.patient_id = $1 AND {RANGE_FILTER} \
         ORDER BY cr.date {direction}, cr.id {direction} \
         LIMIT $4 OFFSET $5"
    );

    let rows = sqlx::query(&query)
        .bind(patient_id)
        .bind(range.start)
        .bind(range.end)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let chart_id: Option<i32> = row.get("dc_id");
            PatientComplianceRecord {
                record: record_from_row(row),
                diet_chart: chart_id.map(|_| diet_chart_from_row(row, "dc_")),
            }
        })
        .collect())
}

/// Every entry in the window, unpaginated, oldest first.
pub async fn fetch_entries(
    pool: &PgPool,
    scope: EntryScope,
    range: DateRange,
) -> anyhow::Result<Vec<ComplianceEntry>> {
    let query = format!(
        "SELECT cr.date, cr.compliance_percentage, cr.meals_followed, cr.meals_total \
         FROM ayur_diet.compliance_records cr \
         WHERE cr.{} = $1 AND {RANGE_FILTER} \
         ORDER BY cr.date ASC",
        scope.column()
    );

    let rows = sqlx::query(&query)
        .bind(scope.id())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(pool)
        .await?;

    debug!(?scope, count = rows.len(), "fetched compliance entries");

    Ok(rows
        .iter()
        .map(|row| ComplianceEntry {
            date: row.get("date"),
            compliance_percentage: row.get("compliance_percentage"),
            meals_followed: row.get("meals_followed"),
            meals_total: row.get("meals_total"),
        })
        .collect())
}

/// Full compliance rows for the patient report, newest first.
pub async fn fetch_patient_history(
    pool: &PgPool,
    patient_id: i32,
    range: DateRange,
) -> anyhow::Result<Vec<ComplianceRecord>> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM ayur_diet.compliance_records cr \
         WHERE cr.patient_id = $1 AND {RANGE_FILTER} \
         ORDER BY cr.date DESC"
    );

    let rows = sqlx::query(&query)
        .bind(patient_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn fetch_meals(pool: &PgPool, chart_ids: &[i32]) -> anyhow::Result<Vec<Meal>> {
    let rows = sqlx::query(
        "SELECT id, diet_chart_id, meal_type, meal_time, total_calories, total_protein, \
         total_carbs, total_fat FROM ayur_diet.meals WHERE diet_chart_id = ANY($1) ORDER BY id",
    )
    .bind(chart_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Meal {
            id: row.get("id"),
            diet_chart_id: row.get("diet_chart_id"),
            meal_type: row.get("meal_type"),
            meal_time: row.get("meal_time"),
            total_calories: row.get("total_calories"),
            total_protein: row.get("total_protein"),
            total_carbs: row.get("total_carbs"),
            total_fat: row.get("total_fat"),
        })
        .collect())
}

pub async fn fetch_meal_foods(pool: &PgPool, meal_ids: &[i32]) -> anyhow::Result<Vec<MealFood>> {
    if meal_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT id, meal_id, food_name, quantity, unit, calories, protein, carbs, fat, \
         thermal_property, digestibility, rasa, dosha_effect \
         FROM ayur_diet.meal_foods WHERE meal_id = ANY($1) ORDER BY id",
    )
    .bind(meal_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| MealFood {
            id: row.get("id"),
            meal_id: row.get("meal_id"),
            food_name: row.get("food_name"),
            quantity: row.get("quantity"),
            unit: row.get("unit"),
            calories: row.get("calories"),
            protein: row.get("protein"),
            carbs: row.get("carbs"),
            fat: row.get("fat"),
            thermal_property: row.get("thermal_property"),
            digestibility: row.get("digestibility"),
            rasa: row.get("rasa"),
            dosha_effect: row.get("dosha_effect"),
        })
        .collect())
}

fn patient_from_row(row: &PgRow) -> Patient {
    Patient {
        id: row.get("id"),
        name: row.get("name"),
        age: row.get("age"),
        gender: row.get("gender"),
        dosha: row.get("dosha"),
        phone: row.get("phone"),
        email: row.get("email"),
        height: row.get("height"),
        weight: row.get("weight"),
        bmi: row.get("bmi"),
        dietary_habits: row.get("dietary_habits"),
        meal_frequency: row.get("meal_frequency"),
        water_intake: row.get("water_intake"),
        health_conditions: row.get("health_conditions"),
        allergies: row.get("allergies"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

fn record_from_row(row: &PgRow) -> ComplianceRecord {
    ComplianceRecord {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        diet_chart_id: row.get("diet_chart_id"),
        date: row.get("date"),
        compliance_percentage: row.get("compliance_percentage"),
        meals_followed: row.get("meals_followed"),
        meals_total: row.get("meals_total"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    }
}

/// `prefix` selects aliased columns when the chart comes from a join.
fn diet_chart_from_row(row: &PgRow, prefix: &str) -> DietChart {
    let col = |name: &str| format!("{prefix}{name}");
    DietChart {
        id: row.get(col("id").as_str()),
        patient_id: row.get(col("patient_id").as_str()),
        duration: row.get(col("duration").as_str()),
        target_calories: row.get(col("target_calories").as_str()),
        dietary_focus: row.get(col("dietary_focus").as_str()),
        special_instructions: row.get(col("special_instructions").as_str()),
        total_calories: row.get(col("total_calories").as_str()),
        total_protein: row.get(col("total_protein").as_str()),
        total_carbs: row.get(col("total_carbs").as_str()),
        total_fat: row.get(col("total_fat").as_str()),
        dosha_balance_score: row.get(col("dosha_balance_score").as_str()),
        rasa_score: row.get(col("rasa_score").as_str()),
        digestibility_score: row.get(col("digestibility_score").as_str()),
        status: row.get(col("status").as_str()),
        created_at: row.get(col("created_at").as_str()),
        updated_at: row.get(col("updated_at").as_str()),
    }
}
