use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod analytics;
mod config;
mod dashboard;
mod db;
mod error;
mod ingest;
mod listing;
mod models;
mod query;
mod report;

use error::AppError;
use query::{DashboardPeriod, DateRange, Page, SortOrder};

#[derive(Parser)]
#[command(name = "ayurdiet-compliance")]
#[command(about = "Diet chart compliance tracking for Ayurvedic dietitians", long_about = None)]
struct Cli {
    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
    /// Log debug output
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample patients, diet charts and compliance records
    Seed,
    /// Import compliance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Summarize compliance records in a CSV file without a database
    Summarize {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
        /// Days per window for the recent trend
        #[arg(long, default_value_t = analytics::RECENT_WINDOW_DAYS)]
        recent_days: usize,
    },
    /// List compliance records and statistics for a diet chart
    Chart {
        chart_id: i32,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List compliance records and statistics for a patient
    Patient {
        patient_id: i32,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        page: PageArgs,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
    },
    /// Practice-wide statistics across every patient
    Dashboard {
        #[arg(long, value_enum, default_value_t = DashboardPeriod::Month)]
        period: DashboardPeriod,
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },
    /// Generate a comprehensive patient report
    Report {
        patient_id: i32,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        include_meals: bool,
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
}

impl WindowArgs {
    fn range(&self) -> Result<DateRange, AppError> {
        DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

#[derive(clap::Args)]
struct PageArgs {
    #[arg(long)]
    limit: Option<i64>,
    #[arg(long)]
    offset: Option<i64>,
}

/// Validates listing arguments before anything is looked up, so a bad date
/// is reported ahead of a missing chart or patient.
fn listing_params(
    id: i32,
    entity: &'static str,
    window: &WindowArgs,
    page: &PageArgs,
) -> Result<(i32, DateRange, Page), AppError> {
    let id = query::require_id(id, entity)?;
    let range = window.range()?;
    Ok((id, range, Page::new(page.limit, page.offset)))
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        match error.downcast_ref::<AppError>() {
            Some(app) => {
                eprintln!("error[{}]: {error:#}", app.code());
                std::process::exit(if app.is_client_error() { 2 } else { 1 });
            }
            None => {
                eprintln!("error: {error:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Commands::Summarize {
            csv,
            window,
            recent_days,
        } => summarize_csv(&csv, &window, recent_days),
        command => run_with_db(command).await,
    }
}

fn summarize_csv(
    csv: &std::path::Path,
    window: &WindowArgs,
    recent_days: usize,
) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct OfflineSummary {
        statistics: models::ComplianceSummary,
        recent_trend: models::Trend,
    }

    let range = window.range()?;
    let entries: Vec<models::ComplianceEntry> = ingest::read_path(csv)?
        .iter()
        .map(|row| row.entry())
        .filter(|entry| range.contains(entry.date))
        .collect();
    info!(count = entries.len(), "summarizing compliance entries");

    print_json(&OfflineSummary {
        statistics: analytics::summarize(&entries),
        recent_trend: analytics::recent_window_trend(&entries, recent_days),
    })
}

async fn run_with_db(command: Commands) -> anyhow::Result<()> {
    let pool = connect().await?;

    match command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} compliance records from {}.", csv.display());
        }
        Commands::Summarize {
            csv,
            window,
            recent_days,
        } => {
            summarize_csv(&csv, &window, recent_days)?;
        }
        Commands::Chart {
            chart_id,
            window,
            page,
        } => {
            let (chart_id, range, page) = listing_params(chart_id, "chart", &window, &page)?;
            if db::fetch_diet_chart(&pool, chart_id).await?.is_none() {
                return Err(AppError::ChartNotFound(chart_id).into());
            }

            let records = db::fetch_chart_records(&pool, chart_id, range, page).await?;
            let entries = db::fetch_entries(&pool, db::EntryScope::Chart(chart_id), range).await?;
            print_json(&listing::chart_listing(records, &entries, page))?;
        }
        Commands::Patient {
            patient_id,
            window,
            page,
            order,
        } => {
            let (patient_id, range, page) =
                listing_params(patient_id, "patient", &window, &page)?;
            ensure_patient(&pool, patient_id).await?;

            let records =
                db::fetch_patient_records(&pool, patient_id, range, page, order).await?;
            let entries =
                db::fetch_entries(&pool, db::EntryScope::Patient(patient_id), range).await?;
            print_json(&listing::patient_listing(records, &entries, page))?;
        }
        Commands::Dashboard { period, format } => {
            let patients = db::fetch_all_patients(&pool).await?;
            let diet_charts = db::fetch_all_diet_charts(&pool).await?;
            let records = db::fetch_all_compliance_records(&pool).await?;

            let board = dashboard::build_dashboard(&dashboard::DashboardInput {
                patients: &patients,
                diet_charts: &diet_charts,
                records: &records,
                period,
                now: chrono::Utc::now(),
            });

            match format {
                ReportFormat::Json => print_json(&board)?,
                ReportFormat::Markdown => {
                    println!("{}", dashboard::render_dashboard_markdown(&board))
                }
            }
        }
        Commands::Report {
            patient_id,
            window,
            include_meals,
            format,
            out,
        } => {
            let patient_id = query::require_id(patient_id, "patient")?;
            let range = window.range()?;
            let patient = ensure_patient(&pool, patient_id).await?;

            let diet_charts = db::fetch_patient_diet_charts(&pool, patient_id, range).await?;
            let records = db::fetch_patient_history(&pool, patient_id, range).await?;

            let (meals, foods) = if include_meals && !diet_charts.is_empty() {
                let chart_ids: Vec<i32> = diet_charts.iter().map(|c| c.id).collect();
                let meals = db::fetch_meals(&pool, &chart_ids).await?;
                let meal_ids: Vec<i32> = meals.iter().map(|m| m.id).collect();
                let foods = db::fetch_meal_foods(&pool, &meal_ids).await?;
                (meals, foods)
            } else {
                (Vec::new(), Vec::new())
            };

            let report = report::build_patient_report(&report::ReportInput {
                patient: &patient,
                diet_charts: &diet_charts,
                records: &records,
                meal_plan: include_meals.then_some((meals.as_slice(), foods.as_slice())),
                range,
                generated_at: chrono::Utc::now(),
            });

            let rendered = match format {
                ReportFormat::Json => serde_json::to_string_pretty(&report)?,
                ReportFormat::Markdown => report::render_markdown(&report),
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let config = config::Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    info!(max_connections = config.max_connections, "connected to Postgres");
    Ok(pool)
}

async fn ensure_patient(pool: &PgPool, patient_id: i32) -> anyhow::Result<models::Patient> {
    db::fetch_patient(pool, patient_id)
        .await?
        .ok_or_else(|| AppError::PatientNotFound(patient_id).into())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("AYURDIET_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Option<&str>) -> WindowArgs {
        WindowArgs {
            start_date: start.map(str::to_string),
            end_date: None,
        }
    }

    fn page() -> PageArgs {
        PageArgs {
            limit: Some(500),
            offset: None,
        }
    }

    #[test]
    fn listing_params_reject_bad_dates_before_any_lookup() {
        let err = listing_params(7, "chart", &window(Some("2024-1-5")), &page()).unwrap_err();
        assert_eq!(err.code(), "INVALID_DATE_FORMAT");

        let err = listing_params(0, "patient", &window(Some("2024-1-5")), &page()).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATIENT_ID");
    }

    #[test]
    fn listing_params_clamp_the_page() {
        let (id, range, page) =
            listing_params(3, "patient", &window(Some("2024-01-05")), &page()).unwrap();
        assert_eq!(id, 3);
        assert!(range.start.is_some());
        assert_eq!(page, Page { limit: 100, offset: 0 });
    }

    #[test]
    fn cli_parses_dashboard_period() {
        let cli = Cli::try_parse_from(["ayurdiet-compliance", "dashboard", "--period", "quarter"])
            .unwrap();
        match cli.command {
            Commands::Dashboard { period, .. } => assert_eq!(period, DashboardPeriod::Quarter),
            _ => panic!("expected dashboard command"),
        }
    }
}
