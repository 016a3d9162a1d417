use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::training::{CreateTraining, Training, TrainingEnrollment},
    state::AppState,
    types::{EnrollmentId, TrainingId},
    validation::validate_payload,
};

pub async fn create_training(
    State(state): State<AppState>,
    Json(payload): Json<CreateTraining>,
) -> Result<(StatusCode, Json<Training>), AppError> {
    validate_payload(&payload)?;
    let training = payload.into_training(Utc::now());
    state.trainings.create(&training).await?;
    Ok((StatusCode::CREATED, Json(training)))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    Path(training_id): Path<TrainingId>,
) -> Result<Json<Vec<TrainingEnrollment>>, AppError> {
    if state.trainings.find(training_id).await?.is_none() {
        return Err(AppError::NotFound("Training not found".to_string()));
    }
    Ok(Json(state.trainings.list_enrollments(training_id).await?))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<TrainingEnrollment>, AppError> {
    Ok(Json(state.trainings.confirm_payment(id, Utc::now()).await?))
}

/// Marks the installation done and applies the training's entitlement grants.
pub async fn complete_installation(
    State(state): State<AppState>,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<TrainingEnrollment>, AppError> {
    let (enrollment, trainee) = state
        .trainings
        .complete_installation(id, Utc::now())
        .await?;
    tracing::info!(
        enrollment_id = %enrollment.id,
        trainee = %trainee.email,
        "Training installation completed"
    );
    Ok(Json(enrollment))
}

pub async fn cancel_enrollment(
    State(state): State<AppState>,
    Path(id): Path<EnrollmentId>,
) -> Result<Json<TrainingEnrollment>, AppError> {
    Ok(Json(state.trainings.cancel(id, Utc::now()).await?))
}
