use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        training::{TrainingEnrollment, TrainingResponse},
        user::User,
    },
    state::AppState,
    types::TrainingId,
};

pub async fn list_trainings(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrainingResponse>>, AppError> {
    Ok(Json(state.trainings.list_with_counts().await?))
}

pub async fn enroll(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(training_id): Path<TrainingId>,
) -> Result<(StatusCode, Json<TrainingEnrollment>), AppError> {
    let enrollment = state
        .trainings
        .enroll(training_id, user.id, &user.email, Utc::now())
        .await?;
    tracing::info!(
        enrollment_id = %enrollment.id,
        training_id = %training_id,
        user_id = %user.id,
        "Training enrollment created"
    );
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<TrainingEnrollment>>, AppError> {
    Ok(Json(
        state.trainings.list_enrollments_for_user(user.id).await?,
    ))
}
