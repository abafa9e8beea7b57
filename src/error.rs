use thiserror::Error;

/// Failures surfaced to whoever invoked a command, each with a stable code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid {field} format. Use YYYY-MM-DD (got '{value}')")]
    InvalidDate { field: &'static str, value: String },

    #[error("Valid {entity} ID is required")]
    InvalidId { entity: &'static str },

    #[error("Patient not found: {0}")]
    PatientNotFound(i32),

    #[error("Diet chart not found: {0}")]
    ChartNotFound(i32),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidDate { .. } => "INVALID_DATE_FORMAT",
            AppError::InvalidId { entity: "patient" } => "INVALID_PATIENT_ID",
            AppError::InvalidId { entity: "chart" } => "INVALID_CHART_ID",
            AppError::InvalidId { .. } => "INVALID_ID",
            AppError::PatientNotFound(_) => "PATIENT_NOT_FOUND",
            AppError::ChartNotFound(_) => "CHART_NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Bad input rather than a missing row.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidDate { .. } | AppError::InvalidId { .. } | AppError::Validation(_)
        )
    }
}
