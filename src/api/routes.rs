//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    ApplicantDetails, Application, ApplicationStatus, ApplicationSummary, DomainError,
    OperationContext, RoomView, Student,
};
use crate::engine::{
    CreateRoomCommand, CreateStudentCommand, Engines, RegisterCommand, RegistrationResult,
    SubmitApplicationCommand,
};
use crate::error::AppError;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub room_number: String,
    pub capacity: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateStudentRequest {
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentResponse {
    pub id: Uuid,
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub program: Option<String>,
    pub year_of_study: Option<u8>,
    pub assigned_room: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            student_id: student.student_id,
            name: student.name,
            email: student.email,
            phone: student.phone,
            program: student.program,
            year_of_study: student.year_of_study,
            assigned_room: student.assigned_room,
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitApplicationRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub student_id: String,
    pub program: String,
    pub year_of_study: u8,
    pub room_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub application_id: String,
    pub status: ApplicationStatus,
    pub room_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub student_id: String,
    pub program: String,
    pub year_of_study: u8,
    pub submitted_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<Application> for ApplicationResponse {
    fn from(application: Application) -> Self {
        let applicant = application.applicant;
        Self {
            id: application.id,
            application_id: application.application_id.to_string(),
            status: application.status,
            room_id: application.room_id,
            name: applicant.name,
            email: applicant.email,
            phone: applicant.phone,
            student_id: applicant.student_id,
            program: applicant.program,
            year_of_study: applicant.year_of_study,
            submitted_at: application.submitted_at,
            processed_at: application.processed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub application_code: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub application_code: String,
    pub email: String,
    pub password: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<Engines> {
    Router::new()
        // Rooms
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/:room_id", get(get_room).delete(delete_room))
        .route("/rooms/:room_id/assign/:student_id", put(assign_student))
        .route("/rooms/:room_id/remove/:student_id", put(remove_student))
        // Students
        .route("/students", post(create_student))
        .route("/students/:student_id", get(get_student))
        // Applications
        .route("/applications", post(submit_application))
        .route("/applications/verify", post(verify_code))
        .route("/applications/:application_id", get(get_application))
        .route("/applications/:application_id/status", put(update_status))
        .route("/applications/:application_id/cancel", put(cancel_application))
        // Registration
        .route("/auth/register", post(register))
}

fn require_admin(context: &OperationContext) -> Result<(), AppError> {
    if context.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden("administrator role required".to_string()).into())
    }
}

// =========================================================================
// Rooms
// =========================================================================

async fn create_room(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    require_admin(&context)?;

    let room = engines
        .records
        .create_room(CreateRoomCommand::new(request.room_number, request.capacity))
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(State(engines): State<Engines>) -> Result<Json<Vec<RoomView>>, AppError> {
    Ok(Json(engines.assignments.list_rooms().await?))
}

async fn get_room(
    State(engines): State<Engines>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(engines.assignments.room_view(room_id).await?))
}

async fn delete_room(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&context)?;
    engines.records.delete_room(room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /rooms/:room_id/assign/:student_id
async fn assign_student(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Path((room_id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomView>, AppError> {
    require_admin(&context)?;
    Ok(Json(engines.assignments.assign(room_id, student_id).await?))
}

/// PUT /rooms/:room_id/remove/:student_id
async fn remove_student(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Path((room_id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomView>, AppError> {
    require_admin(&context)?;
    Ok(Json(engines.assignments.unassign(room_id, student_id).await?))
}

// =========================================================================
// Students
// =========================================================================

async fn create_student(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    require_admin(&context)?;

    let command = CreateStudentCommand {
        student_id: request.student_id,
        name: request.name,
        email: request.email,
        phone: request.phone,
        program: request.program,
        year_of_study: request.year_of_study,
    };
    let student = engines.records.create_student(command).await?;

    Ok((StatusCode::CREATED, Json(student.into())))
}

async fn get_student(
    State(engines): State<Engines>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentResponse>, AppError> {
    Ok(Json(engines.records.get_student(student_id).await?.into()))
}

// =========================================================================
// Applications
// =========================================================================

/// POST /applications
async fn submit_application(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let applicant = ApplicantDetails {
        name: request.name,
        email: request.email,
        phone: request.phone,
        student_id: request.student_id,
        program: request.program,
        year_of_study: request.year_of_study,
    };

    let application = engines
        .applications
        .submit(SubmitApplicationCommand::new(applicant, request.room_id), &context)
        .await?;

    Ok((StatusCode::CREATED, Json(application.into())))
}

/// GET /applications/:application_id (record id or application code)
async fn get_application(
    State(engines): State<Engines>,
    Path(reference): Path<String>,
) -> Result<Json<ApplicationResponse>, AppError> {
    Ok(Json(engines.applications.get(&reference).await?.into()))
}

/// PUT /applications/:application_id/status
async fn update_status(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Path(reference): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let status: ApplicationStatus = request.status.parse()?;

    let application = engines
        .applications
        .update_status(&reference, status, &context)
        .await?;

    Ok(Json(application.into()))
}

/// PUT /applications/:application_id/cancel
async fn cancel_application(
    State(engines): State<Engines>,
    Extension(context): Extension<OperationContext>,
    Path(reference): Path<String>,
) -> Result<Json<ApplicationResponse>, AppError> {
    Ok(Json(engines.applications.cancel(&reference, &context).await?.into()))
}

/// POST /applications/verify
async fn verify_code(
    State(engines): State<Engines>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<ApplicationSummary>, AppError> {
    let summary = engines
        .registration
        .verify_code(&request.application_code, &request.email)
        .await?;
    Ok(Json(summary))
}

// =========================================================================
// Registration
// =========================================================================

/// POST /auth/register
async fn register(
    State(engines): State<Engines>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResult>), AppError> {
    let result = engines
        .registration
        .register(RegisterCommand::new(
            request.application_code,
            request.email,
            request.password,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}
