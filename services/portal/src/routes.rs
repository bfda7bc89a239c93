//! Portal service routes

use axum::{
    Extension, Form, Json, Router,
    extract::{Query, State},
    http::header,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use common::rowstore::CellRef;

use crate::{
    AppState,
    approval::{ApprovalRequest, MAX_APPROVAL_ATTEMPTS},
    call_session::{CallSession, generate_call_id},
    error::{PortalError, PortalResult},
    middleware::{AuthenticatedPhone, SESSION_COOKIE, session_middleware},
    models::students_from_rows,
    otp::{OtpVerifyError, generate_code},
    permission::{
        Channel, DateRange, PermissionStatus, append_permission, find_pending_cell,
        find_student_row_by_name, timestamp_label,
    },
    validation::{international_phone, normalize_phone, validate_date_range, validate_phone},
    voice::{DigitAction, entry_document, entry_url, error_document, respond},
};

/// OTP validity communicated to the client, in seconds
const OTP_EXPIRES_IN: u64 = 300;

/// Request for OTP issuance
#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

/// Request for OTP verification
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub code: String,
}

/// Request to submit a leave date range
#[derive(Deserialize)]
pub struct AddPermissionRequest {
    /// 1-based row of the student (header is row 1)
    pub student_row: u32,
    pub student_name: String,
    pub start_date: String,
    pub end_date: String,
    /// Suppress the automatic approval call
    #[serde(default)]
    pub skip_voice_call: bool,
}

/// Request for an SMS approval code
#[derive(Deserialize)]
pub struct ApprovalSmsRequest {
    pub phone_number: String,
    pub student_name: String,
    pub start_date: String,
    pub end_date: String,
    pub student_row: u32,
}

/// Request to verify an SMS approval code
#[derive(Deserialize)]
pub struct VerifyApprovalRequest {
    pub code: String,
}

/// Request to start an approval call
#[derive(Deserialize)]
pub struct StartCallRequest {
    pub phone_number: String,
    pub student_name: String,
}

/// Call id carried by the voice webhook URLs
#[derive(Deserialize)]
pub struct CallIdQuery {
    pub id: Option<String>,
}

/// Digit posted by the telephony provider
#[derive(Deserialize)]
pub struct DigitForm {
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
}

/// Create the router for the portal service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/my/students", get(my_students))
        .route("/api/permissions", post(add_permission))
        .route("/api/approvals/sms", post(send_approval_sms))
        .route("/api/approvals/sms/verify", post(verify_approval_sms))
        .route("/api/calls", post(start_call))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/otp/send", post(send_otp))
        .route("/api/otp/verify", post(verify_otp))
        .route("/api/auth/check", get(check_auth))
        .route("/api/auth/logout", post(logout))
        .route("/api/students", get(students))
        .route("/api/voice/webhook", post(voice_webhook))
        .route("/api/voice/response", post(voice_response))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "portal",
    }))
}

/// Issue an OTP and text it to the parent
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> PortalResult<Json<Value>> {
    validate_phone(&payload.phone_number).map_err(PortalError::Validation)?;
    let phone = normalize_phone(&payload.phone_number);

    let decision = state.rate_limiter.check(&phone).await;
    if !decision.allowed {
        return Err(PortalError::RateLimited {
            minutes: decision.remaining_minutes.unwrap_or(1),
        });
    }

    let code = state.otp_store.issue(&phone).await;
    debug!("OTP for {}: {}", phone, code);

    let message = format!(
        "İzin portalı doğrulama kodunuz: {code}\n\nBu kod 5 dakika geçerlidir. Kodu kimseyle paylaşmayın."
    );
    state
        .sms_gateway
        .send(&payload.phone_number, &message)
        .await
        .map_err(|err| {
            error!("OTP SMS could not be sent: {}", err);
            PortalError::Upstream(err.to_string())
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Doğrulama kodu gönderildi",
        "expires_in": OTP_EXPIRES_IN,
        "remaining_attempts": decision.remaining_attempts,
    })))
}

/// Verify an OTP and open an authenticated session
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<VerifyOtpRequest>,
) -> PortalResult<(CookieJar, Json<Value>)> {
    if payload.code.trim().is_empty() {
        return Err(PortalError::Validation("Doğrulama kodu gerekli".to_string()));
    }
    validate_phone(&payload.phone_number).map_err(PortalError::Validation)?;
    let phone = normalize_phone(&payload.phone_number);

    state
        .otp_store
        .verify(&phone, payload.code.trim())
        .await
        .map_err(|err| match err {
            OtpVerifyError::NotFound => {
                PortalError::NotFound("Doğrulama kodu bulunamadı".to_string())
            }
            OtpVerifyError::Expired => {
                PortalError::Expired("Doğrulama kodu süresi dolmuş".to_string())
            }
            OtpVerifyError::AttemptsExceeded => PortalError::AttemptsExceeded,
            OtpVerifyError::Mismatch => {
                PortalError::Validation("Geçersiz doğrulama kodu".to_string())
            }
        })?;

    let session_id = state.session_store.create(&phone).await;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(24))
        .path("/")
        .build();

    Ok((
        jar.add(cookie),
        Json(json!({
            "success": true,
            "message": "Doğrulama başarılı",
        })),
    ))
}

/// Validate the session cookie
pub async fn check_auth(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<Json<Value>> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    let phone = state
        .session_store
        .validate(&session_id)
        .await
        .ok_or(PortalError::Unauthorized)?;

    Ok(Json(json!({
        "authenticated": true,
        "phone": phone,
    })))
}

/// Revoke the session and clear the cookie
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.session_store.revoke(cookie.value()).await;
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .path("/")
        .build();

    (
        jar.add(removal),
        Json(json!({
            "success": true,
            "message": "Çıkış başarılı",
        })),
    )
}

/// List the authenticated parent's children
pub async fn my_students(
    State(state): State<AppState>,
    Extension(AuthenticatedPhone(phone)): Extension<AuthenticatedPhone>,
) -> PortalResult<Json<Value>> {
    let rows = state.row_store.read_all().await?;
    let students: Vec<_> = students_from_rows(&rows)
        .into_iter()
        .filter(|student| student.belongs_to(&phone))
        .collect();

    if students.is_empty() {
        return Err(PortalError::NotFound(
            "Kayıt bulunamadı. Lütfen telefon numaranızı kontrol edin.".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "count": students.len(),
        "students": students,
    })))
}

/// Admin listing of every student
pub async fn students(State(state): State<AppState>) -> PortalResult<impl IntoResponse> {
    let rows = state.row_store.read_all().await?;
    let students = students_from_rows(&rows);

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(json!(students)),
    ))
}

/// Submit a leave request: write the pending marker into the first free
/// permission slot, then start the approval call unless suppressed
pub async fn add_permission(
    State(state): State<AppState>,
    Extension(AuthenticatedPhone(phone)): Extension<AuthenticatedPhone>,
    Json(payload): Json<AddPermissionRequest>,
) -> PortalResult<Json<Value>> {
    if payload.student_row < 2 {
        return Err(PortalError::Validation("Geçersiz öğrenci satırı".to_string()));
    }
    validate_date_range(&payload.start_date, &payload.end_date)
        .map_err(PortalError::Validation)?;

    let range = DateRange::new(&payload.start_date, &payload.end_date);
    let status = PermissionStatus::Pending(range);
    let cell = append_permission(state.row_store.as_ref(), payload.student_row, &status).await?;

    let mut message = "İzin eklendi".to_string();
    if !payload.skip_voice_call && !payload.student_name.trim().is_empty() {
        // The permission is already written; a failed call only loses
        // the automatic approval, so it is logged and swallowed.
        match initiate_call(&state, &payload.student_name, &phone).await {
            Ok((call_id, _)) => {
                info!("Approval call started, call id {}", call_id);
                message = "İzin eklendi ve onay araması başlatıldı".to_string();
            }
            Err(err) => error!("Approval call could not be started: {}", err),
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": message,
        "permission": status.render(),
        "cell": cell.a1(),
        "row": cell.row,
    })))
}

/// Issue an SMS approval code for a submitted leave request
pub async fn send_approval_sms(
    State(state): State<AppState>,
    Extension(AuthenticatedPhone(_)): Extension<AuthenticatedPhone>,
    Json(payload): Json<ApprovalSmsRequest>,
) -> PortalResult<Json<Value>> {
    validate_phone(&payload.phone_number).map_err(PortalError::Validation)?;
    validate_date_range(&payload.start_date, &payload.end_date)
        .map_err(PortalError::Validation)?;
    if payload.student_name.trim().is_empty() || payload.student_row < 2 {
        return Err(PortalError::Validation(
            "Öğrenci adı ve satır indeksi gerekli".to_string(),
        ));
    }

    let code = generate_code();
    let request = ApprovalRequest::new(
        &payload.student_name,
        &payload.start_date,
        &payload.end_date,
        payload.student_row,
        &payload.phone_number,
    );
    let expires_at = request.expiry;
    state.approval_store.store(&code, request).await;

    let message = format!(
        "İzin portalı: {} için {} - {} tarihleri arasında izin talebini onaylamak için kodu giriniz: {code}\nBu kod 30 dakika geçerlidir.",
        payload.student_name, payload.start_date, payload.end_date
    );
    state
        .sms_gateway
        .send(&payload.phone_number, &message)
        .await
        .map_err(|err| {
            error!("Approval SMS could not be sent: {}", err);
            PortalError::Upstream(err.to_string())
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "SMS onay kodu gönderildi",
        "expires_at": expires_at,
    })))
}

/// Verify an SMS approval code and patch the pending cell
pub async fn verify_approval_sms(
    State(state): State<AppState>,
    Json(payload): Json<VerifyApprovalRequest>,
) -> PortalResult<Json<Value>> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(PortalError::Validation("Doğrulama kodu gerekli".to_string()));
    }

    let request = state
        .approval_store
        .verify(code)
        .await
        .ok_or_else(|| PortalError::NotFound("Geçersiz veya süresi dolmuş kod".to_string()))?;

    if request.attempts >= MAX_APPROVAL_ATTEMPTS {
        state.approval_store.delete(code).await;
        return Err(PortalError::AttemptsExceeded);
    }

    let range = DateRange::new(&request.start_date, &request.end_date);
    let cell = apply_sms_approval(&state, code, request.student_row, &range).await?;

    state.approval_store.delete(code).await;
    info!(
        "Leave request for {} approved via SMS at {}",
        request.student_name, cell
    );

    Ok(Json(json!({
        "success": true,
        "message": "İzin başarıyla onaylandı",
        "student_name": request.student_name,
        "date_range": range.to_string(),
        "updated_cell": cell.a1(),
    })))
}

/// Overwrite the pending marker with the approved one.
///
/// Leaves the code consumable on a row-store failure; only the failed
/// processing attempt is counted against it.
async fn apply_sms_approval(
    state: &AppState,
    code: &str,
    row: u32,
    range: &DateRange,
) -> PortalResult<CellRef> {
    let store = state.row_store.as_ref();

    let cell = match find_pending_cell(store, row, range).await {
        Ok(Some(cell)) => cell,
        Ok(None) => {
            return Err(PortalError::NotFound("Bekleyen izin bulunamadı".to_string()));
        }
        Err(err) => {
            state.approval_store.record_attempt(code).await;
            return Err(err.into());
        }
    };

    let status = PermissionStatus::Approved {
        range: Some(range.clone()),
        channel: Channel::Sms,
        at: timestamp_label(),
    };

    if let Err(err) = store.write_cell(cell, &status.render()).await {
        state.approval_store.record_attempt(code).await;
        return Err(err.into());
    }

    Ok(cell)
}

/// Start an approval call for a leave request
pub async fn start_call(
    State(state): State<AppState>,
    Extension(AuthenticatedPhone(_)): Extension<AuthenticatedPhone>,
    Json(payload): Json<StartCallRequest>,
) -> PortalResult<Json<Value>> {
    validate_phone(&payload.phone_number).map_err(PortalError::Validation)?;
    if payload.student_name.trim().is_empty() {
        return Err(PortalError::Validation("Öğrenci adı gerekli".to_string()));
    }

    let (call_id, call_sid) =
        initiate_call(&state, &payload.student_name, &payload.phone_number).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Arama başlatıldı",
        "call_id": call_id,
        "call_sid": call_sid,
    })))
}

/// Create the call session and place the outbound call
async fn initiate_call(
    state: &AppState,
    student_name: &str,
    parent_phone: &str,
) -> PortalResult<(String, String)> {
    let phone = international_phone(parent_phone);
    let call_id = generate_call_id();

    state
        .call_sessions
        .set(&call_id, CallSession::new(student_name, &phone))
        .await;

    let webhook_url = format!("{}{}", state.config.public_base_url, entry_url(&call_id));
    debug!("Voice webhook URL: {}", webhook_url);

    let call_sid = state
        .voice_gateway
        .place_call(&phone, &webhook_url)
        .await
        .map_err(|err| {
            error!("Voice call could not be placed: {}", err);
            PortalError::Upstream(err.to_string())
        })?;

    Ok((call_id, call_sid))
}

/// Voice entry webhook: the provider fetches what to speak once the
/// call connects
pub async fn voice_webhook(
    State(state): State<AppState>,
    Query(query): Query<CallIdQuery>,
) -> impl IntoResponse {
    let document = match query.id.as_deref() {
        Some(call_id) => {
            let session = state.call_sessions.get(call_id).await;
            if session.is_none() {
                warn!("Voice webhook for unknown call id {}", call_id);
            }
            entry_document(session.as_ref(), call_id)
        }
        None => {
            warn!("Voice webhook without call id");
            error_document()
        }
    };

    xml_response(document)
}

/// Voice digit-response webhook: resolve the collected digit
pub async fn voice_response(
    State(state): State<AppState>,
    Query(query): Query<CallIdQuery>,
    Form(form): Form<DigitForm>,
) -> impl IntoResponse {
    let Some(call_id) = query.id.as_deref() else {
        warn!("Voice response without call id");
        return xml_response(error_document());
    };

    let Some(session) = state.call_sessions.get(call_id).await else {
        warn!("Voice response for unknown call id {}", call_id);
        return xml_response(error_document());
    };

    let action = DigitAction::from_digit(form.digits.as_deref());
    info!(
        "Voice response {:?} for {} (call id {})",
        action, session.student_name, call_id
    );

    let outcome = respond(action, call_id, &timestamp_label());

    if let Some(status) = &outcome.decision {
        // Best-effort relative to the call: the spoken outcome has
        // already been decided, a failed write is only logged.
        if let Err(err) = write_call_decision(&state, &session.student_name, status).await {
            error!("Row-store write after call decision failed: {}", err);
        }
    }

    if outcome.end_session {
        state.call_sessions.delete(call_id).await;
    }

    xml_response(outcome.document)
}

/// Locate the student by name scan and append the decision marker
async fn write_call_decision(
    state: &AppState,
    student_name: &str,
    status: &PermissionStatus,
) -> PortalResult<()> {
    let store = state.row_store.as_ref();

    match find_student_row_by_name(store, student_name).await? {
        Some(row) => {
            append_permission(store, row, status).await?;
            Ok(())
        }
        None => {
            warn!("No row found for student {}", student_name);
            Ok(())
        }
    }
}

fn xml_response(document: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/xml")], document)
}
