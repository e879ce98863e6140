//! # API REST
//!
//! HTTP surface for medical records and their versioned clinical notes.
//!
//! Every route except `/health` and the OpenAPI documents requires the gateway headers
//! (`x-api-key`, `x-user-id`, `x-user-role`). Business rules live in `hms-core`; handlers only
//! authenticate, check capabilities, and translate errors into status codes.

mod error;

use api_shared::auth::{API_KEY_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use api_shared::{
    Actor, ClinicalNoteHistoryEntryDto, ClinicalNoteListRes, ClinicalNoteRes,
    ClinicalNoteVersionDto, CommitNoteReq, CreateMedicalRecordReq, DoctorDto, DoctorRes,
    ErrorRes, HealthRes, HealthService, MedicalRecordDto, MedicalRecordRes, ReconcileData,
    ReconcileRes, RegisterDoctorReq,
};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, State,
    },
    http::{request::Parts, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use hms_core::{
    CoreConfig, DoctorService, MedicalRecordService, NewMedicalRecord, RecordResult,
};
use hms_types::Role;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            cfg,
            api_key: api_key.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_clinical_notes,
        commit_clinical_note,
        reconcile_clinical_notes,
        create_medical_record,
        get_medical_record,
        register_doctor
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        CommitNoteReq,
        ClinicalNoteVersionDto,
        ClinicalNoteHistoryEntryDto,
        ClinicalNoteListRes,
        ClinicalNoteRes,
        CreateMedicalRecordReq,
        MedicalRecordDto,
        MedicalRecordRes,
        RegisterDoctorReq,
        DoctorDto,
        DoctorRes,
        ReconcileData,
        ReconcileRes
    ))
)]
pub struct ApiDoc;

/// Builds the application router, including Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/doctors", post(register_doctor))
        .route("/medical-records", post(create_medical_record))
        .route("/medical-records/:id", get(get_medical_record))
        .route(
            "/medical-records/:id/clinical-notes",
            get(list_clinical_notes).post(commit_clinical_note),
        )
        .route(
            "/medical-records/:id/clinical-notes/reconcile",
            post(reconcile_clinical_notes),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The authenticated caller, built from the gateway headers.
pub struct Caller(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let actor = Actor::authenticate(
            &state.api_key,
            header(headers, API_KEY_HEADER),
            header(headers, USER_ID_HEADER),
            header(headers, USER_ROLE_HEADER),
        )?;
        Ok(Self(actor))
    }
}

fn record_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    match path {
        Ok(Path(id)) => Ok(id),
        Err(e) => {
            tracing::debug!("rejected medical record id: {}", e);
            Err(ApiError::BadRequest("Invalid medical record id"))
        }
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(e) => {
            tracing::debug!("rejected request body: {}", e);
            Err(ApiError::BadRequest("Invalid request body"))
        }
    }
}

/// Runs a store operation off the async runtime; SQLite calls block while waiting for locks.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> RecordResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and schema status", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    let cfg = state.cfg.clone();
    match tokio::task::spawn_blocking(move || HealthService::check_health(&cfg)).await {
        Ok(res) => Json(res),
        Err(e) => {
            tracing::error!("health check task failed: {}", e);
            Json(HealthRes {
                ok: false,
                message: "Health check failed".into(),
                schema: "unknown".into(),
            })
        }
    }
}

#[utoipa::path(
    get,
    path = "/medical-records/{id}/clinical-notes",
    params(("id" = i64, Path, description = "Medical record id")),
    responses(
        (
            status = 200,
            description = "Clinical note history, newest first",
            body = ClinicalNoteListRes
        ),
        (status = 400, description = "Invalid medical record id", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_clinical_notes(
    State(state): State<AppState>,
    Caller(actor): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ClinicalNoteListRes>, ApiError> {
    let id = record_id(path)?;
    tracing::debug!(
        "{} {} listing clinical notes of record {}",
        actor.role,
        actor.user_id,
        id
    );

    let cfg = state.cfg.clone();
    let history =
        run_blocking(move || MedicalRecordService::with_id(cfg, id).list_history()).await?;

    Ok(Json(ClinicalNoteListRes {
        success: true,
        data: history.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/medical-records/{id}/clinical-notes",
    params(("id" = i64, Path, description = "Medical record id")),
    request_body = CommitNoteReq,
    responses(
        (status = 201, description = "New current version", body = ClinicalNoteRes),
        (status = 400, description = "Notes missing, blank or too long", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Caller may not edit these notes", body = ErrorRes),
        (status = 404, description = "Medical record not found", body = ErrorRes),
        (status = 409, description = "Concurrent edit; retry", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn commit_clinical_note(
    State(state): State<AppState>,
    Caller(actor): Caller,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CommitNoteReq>, JsonRejection>,
) -> Result<(StatusCode, Json<ClinicalNoteRes>), ApiError> {
    actor.require_doctor()?;
    let id = record_id(path)?;
    let req = json_body(body)?;
    let notes = req
        .notes
        .filter(|n| !n.trim().is_empty())
        .ok_or(ApiError::BadRequest("Notes are required"))?;
    let change_reason = req.change_reason;

    let cfg = state.cfg.clone();
    let version = run_blocking(move || {
        MedicalRecordService::with_id(cfg, id).commit_note(
            &actor.user_id,
            &notes,
            change_reason.as_deref(),
        )
    })
    .await?;

    tracing::info!(
        "clinical notes of record {} now at version {}",
        version.medical_record_id,
        version.version_number
    );
    Ok((
        StatusCode::CREATED,
        Json(ClinicalNoteRes {
            success: true,
            data: version.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/medical-records/{id}/clinical-notes/reconcile",
    params(("id" = i64, Path, description = "Medical record id")),
    responses(
        (status = 200, description = "Reconciliation outcome", body = ReconcileRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Admin only", body = ErrorRes),
        (status = 404, description = "Medical record not found", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn reconcile_clinical_notes(
    State(state): State<AppState>,
    Caller(actor): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ReconcileRes>, ApiError> {
    actor.require_admin()?;
    let id = record_id(path)?;

    let cfg = state.cfg.clone();
    let outcome = run_blocking(move || MedicalRecordService::with_id(cfg, id).reconcile()).await?;

    Ok(Json(ReconcileRes {
        success: true,
        data: outcome.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/medical-records",
    request_body = CreateMedicalRecordReq,
    responses(
        (status = 201, description = "Medical record created", body = MedicalRecordRes),
        (status = 400, description = "Invalid request", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Doctor or admin only", body = ErrorRes),
        (status = 409, description = "Appointment already has a record", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn create_medical_record(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<CreateMedicalRecordReq>, JsonRejection>,
) -> Result<(StatusCode, Json<MedicalRecordRes>), ApiError> {
    actor.require_record_author()?;
    let req = json_body(body)?;

    let doctor_id = match (req.doctor_id, actor.role) {
        (Some(doctor_id), _) => doctor_id,
        (None, Role::Doctor) => actor.user_id,
        (None, _) => return Err(ApiError::BadRequest("doctor_id is required")),
    };
    let new = NewMedicalRecord {
        patient_id: req.patient_id,
        doctor_id,
        appointment_id: req.appointment_id,
        notes: req.notes,
        treatment_plan: req.treatment_plan,
        prescriptions: req.prescriptions,
        lab_request: req.lab_request,
    };

    let cfg = state.cfg.clone();
    let record = run_blocking(move || MedicalRecordService::new(cfg).create(new)?.get()).await?;

    tracing::info!("created medical record {}", record.id);
    Ok((
        StatusCode::CREATED,
        Json(MedicalRecordRes {
            success: true,
            data: record.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/medical-records/{id}",
    params(("id" = i64, Path, description = "Medical record id")),
    responses(
        (status = 200, description = "Medical record", body = MedicalRecordRes),
        (status = 400, description = "Invalid medical record id", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 404, description = "Medical record not found", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_medical_record(
    State(state): State<AppState>,
    Caller(_actor): Caller,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MedicalRecordRes>, ApiError> {
    let id = record_id(path)?;

    let cfg = state.cfg.clone();
    let record = run_blocking(move || MedicalRecordService::with_id(cfg, id).get()).await?;

    Ok(Json(MedicalRecordRes {
        success: true,
        data: record.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/doctors",
    request_body = RegisterDoctorReq,
    responses(
        (status = 201, description = "Doctor registered or updated", body = DoctorRes),
        (status = 400, description = "Invalid request", body = ErrorRes),
        (status = 401, description = "Unauthenticated", body = ErrorRes),
        (status = 403, description = "Admin only", body = ErrorRes),
        (status = 500, description = "Internal error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn register_doctor(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<RegisterDoctorReq>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorRes>), ApiError> {
    actor.require_admin()?;
    let req = json_body(body)?;

    let cfg = state.cfg.clone();
    let doctor = run_blocking(move || {
        DoctorService::new(cfg).register(&req.id, &req.name, &req.specialization)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(DoctorRes {
            success: true,
            data: doctor.into(),
        }),
    ))
}
