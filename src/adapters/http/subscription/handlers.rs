//! HTTP handlers for the subscriber and admin endpoints.
//!
//! These connect axum routes to the application layer handlers held in
//! [`GateAppState`].

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use secrecy::SecretString;

use crate::application::handlers::subscription::{
    AdmissionArbiter, BulkResolveCommand, BulkResolveHandler, ExtendSubscriptionCommand,
    ExtendSubscriptionHandler, ForceRemoveCommand, ForceRemoveHandler, ListSubscribersHandler,
    RecordDepartureHandler, RegenerateInviteCommand, RegenerateInviteHandler, SubscribeCommand,
    SubscribeHandler, SubscriberHistoryHandler, SubscriberHistoryQuery, SweepExpiredHandler,
    SweepOutcome, ValidatePhoneCommand, ValidatePhoneHandler,
};
use crate::application::{InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::GroupId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{Clock, MembershipPlatform, SubscriptionStore, SweepLock};

use super::dto::{
    BulkResolveRequest, ErrorResponse, ExtendRequest, ExtendResponse, HistoryResponse,
    PhoneRequest, RegenerateResponse, SubscribeRequest, SubscribeResponse,
    SubscriberListResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Deployment settings the handlers are built with.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub group: GroupId,
    pub invite_ttl: Duration,
    pub announce_chat: Option<GroupId>,
    pub bulk_resolve_delay: Duration,
    /// Expected webhook secret token; `None` disables the check.
    pub webhook_secret: Option<SecretString>,
}

/// Shared state for every route. Cloned per request.
#[derive(Clone)]
pub struct GateAppState {
    pub subscribe: Arc<SubscribeHandler>,
    pub extend: Arc<ExtendSubscriptionHandler>,
    pub regenerate: Arc<RegenerateInviteHandler>,
    pub validate_phone: ValidatePhoneHandler,
    pub list_subscribers: Arc<ListSubscribersHandler>,
    pub history: Arc<SubscriberHistoryHandler>,
    pub force_remove: Arc<ForceRemoveHandler>,
    pub sweep: Arc<SweepExpiredHandler>,
    pub bulk_resolve: Arc<BulkResolveHandler>,
    pub arbiter: Arc<AdmissionArbiter>,
    pub departures: Arc<RecordDepartureHandler>,
    pub webhook_secret: Option<SecretString>,
    pub clock: Arc<dyn Clock>,
}

impl GateAppState {
    /// Build every handler over the given adapters.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        platform: Arc<dyn MembershipPlatform>,
        sweep_lock: Arc<dyn SweepLock>,
        clock: Arc<dyn Clock>,
        settings: GateSettings,
    ) -> Self {
        let issuer = InviteIssuer::new(platform.clone(), settings.group, settings.invite_ttl);
        let notifier = SubscriberNotifier::new(platform.clone(), settings.announce_chat);

        let subscribe = Arc::new(SubscribeHandler::new(
            store.clone(),
            platform.clone(),
            issuer.clone(),
            notifier.clone(),
            clock.clone(),
        ));

        Self {
            subscribe: subscribe.clone(),
            extend: Arc::new(ExtendSubscriptionHandler::new(
                store.clone(),
                subscribe,
                issuer.clone(),
                notifier.clone(),
                clock.clone(),
            )),
            regenerate: Arc::new(RegenerateInviteHandler::new(
                store.clone(),
                issuer.clone(),
                notifier.clone(),
                clock.clone(),
            )),
            validate_phone: ValidatePhoneHandler::new(),
            list_subscribers: Arc::new(ListSubscribersHandler::new(store.clone())),
            history: Arc::new(SubscriberHistoryHandler::new(store.clone())),
            force_remove: Arc::new(ForceRemoveHandler::new(
                store.clone(),
                platform.clone(),
                settings.group,
                clock.clone(),
            )),
            sweep: Arc::new(SweepExpiredHandler::new(
                store.clone(),
                platform.clone(),
                issuer.clone(),
                notifier.clone(),
                sweep_lock,
                clock.clone(),
            )),
            bulk_resolve: Arc::new(BulkResolveHandler::new(
                platform.clone(),
                settings.bulk_resolve_delay,
            )),
            arbiter: Arc::new(AdmissionArbiter::new(
                store.clone(),
                platform,
                issuer,
                notifier,
                clock.clone(),
            )),
            departures: Arc::new(RecordDepartureHandler::new(
                store,
                settings.group,
                clock.clone(),
            )),
            webhook_secret: settings.webhook_secret,
            clock,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriber Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions
pub async fn subscribe(
    State(state): State<GateAppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .subscribe
        .handle(SubscribeCommand {
            phone: request.phone,
            duration_days: request.duration_days,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse::new(result, state.clock.now())),
    ))
}

/// POST /api/subscriptions/extend
pub async fn extend(
    State(state): State<GateAppState>,
    Json(request): Json<ExtendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .extend
        .handle(ExtendSubscriptionCommand {
            phone: request.phone,
            extra_days: request.extra_days,
        })
        .await?;

    Ok(Json(ExtendResponse::new(result, state.clock.now())))
}

/// POST /api/subscriptions/regenerate
pub async fn regenerate(
    State(state): State<GateAppState>,
    Json(request): Json<PhoneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .regenerate
        .handle(RegenerateInviteCommand {
            phone: request.phone,
        })
        .await?;

    Ok(Json(RegenerateResponse::new(result, state.clock.now())))
}

/// POST /api/subscriptions/validate-phone
pub async fn validate_phone(
    State(state): State<GateAppState>,
    Json(request): Json<PhoneRequest>,
) -> impl IntoResponse {
    Json(state.validate_phone.handle(ValidatePhoneCommand {
        phone: request.phone,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/subscribers
pub async fn list_subscribers(
    State(state): State<GateAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.list_subscribers.handle().await?;
    Ok(Json(SubscriberListResponse::new(listing, state.clock.now())))
}

/// GET /api/admin/history/:phone
pub async fn subscriber_history(
    State(state): State<GateAppState>,
    Path(phone): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .history
        .handle(SubscriberHistoryQuery { phone })
        .await?;
    Ok(Json(HistoryResponse::new(entries)))
}

/// DELETE /api/admin/subscribers/:platform_id
pub async fn force_remove(
    State(state): State<GateAppState>,
    Path(platform_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .force_remove
        .handle(ForceRemoveCommand { platform_id })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/sweep
pub async fn trigger_sweep(State(state): State<GateAppState>) -> Result<Response, ApiError> {
    match state.sweep.handle().await? {
        SweepOutcome::Completed(report) => Ok(Json(report).into_response()),
        SweepOutcome::Skipped => Ok((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "SWEEP_SKIPPED",
                "A sweep is already running",
            )),
        )
            .into_response()),
    }
}

/// POST /api/admin/resolve
pub async fn bulk_resolve(
    State(state): State<GateAppState>,
    Json(request): Json<BulkResolveRequest>,
) -> impl IntoResponse {
    Json(
        state
            .bulk_resolve
            .handle(BulkResolveCommand {
                phones: request.phones,
            })
            .await,
    )
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Maps `SubscriptionError` onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(SubscriptionError);

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SubscriptionError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            SubscriptionError::AlreadyMember(_)
            | SubscriptionError::AlreadyPending(_)
            | SubscriptionError::InvalidState { .. } => StatusCode::CONFLICT,
            SubscriptionError::NotFound(_) => StatusCode::NOT_FOUND,
            SubscriptionError::IdentityNotResolvable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SubscriptionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SubscriptionError::PlatformUnavailable(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0.message(), "request failed");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        let mut response = (status, Json(body)).into_response();
        if let SubscriptionError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
