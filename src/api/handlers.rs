//! HTTP handlers.
//!
//! Every handler authorizes first and only then touches the store.

use crate::{
    api::{
        AppState,
        auth::{authenticate, bearer_token},
        error::ApiResult,
    },
    core::{
        recurring::ProcessingReport,
        rule::{
            NewRule, RuleUpdate, create_rule, delete_rule, get_rule_for_owner, list_rules,
            set_active, update_rule,
        },
        schedule::{Frequency, format_instant, parse_date},
        transaction::{
            DateRange, NewTransaction, TransactionKind, TransactionUpdate, create_transaction,
            delete_transaction, list_transactions, update_transaction,
        },
        triggers::{
            CatchUpResult, authorize_scheduled, catch_up_for_user, run_manual, run_scheduled,
        },
    },
    entities::{recurring_rule, transaction},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

/// Body of `POST /api/transactions`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    amount: f64,
    kind: TransactionKind,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
    /// Defaults to the time of the request
    occurred_at: Option<String>,
}

/// Query string of `GET /api/transactions`
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    from: Option<String>,
    to: Option<String>,
}

impl RangeQuery {
    fn into_range(self) -> Result<Option<DateRange>> {
        if self.from.is_none() && self.to.is_none() {
            return Ok(None);
        }
        let from = self.from.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;
        if from.zip(to).is_some_and(|(from, to)| from > to) {
            return Err(Error::Validation {
                message: "'from' must not be after 'to'".to_string(),
            });
        }
        Ok(Some(DateRange { from, to }))
    }
}

/// Body of `POST /api/rules`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    kind: TransactionKind,
    #[serde(default)]
    category: String,
    description: String,
    amount: f64,
    frequency: Frequency,
    start_date: String,
}

/// Body of `POST /api/rules/{id}/toggle`; without `active` the flag is flipped
#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    active: Option<bool>,
}

/// Liveness probe
pub async fn health_check() -> &'static str {
    "ok"
}

/// `POST /api/cron/recurring`: the external scheduler's entry point.
pub async fn scheduled_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ProcessingReport>> {
    authorize_scheduled(&state.config.recurring, bearer_token(&headers))?;
    let report = run_scheduled(&state.db, &state.config, Utc::now()).await?;
    Ok(Json(report))
}

/// `POST /api/admin/recurring/run`: the scheduled job, run by an administrator.
pub async fn admin_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ProcessingReport>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let report = run_manual(&state.db, &state.config, &caller, Utc::now()).await?;
    Ok(Json(report))
}

/// `POST /api/recurring/process`: drains the caller's overdue cycles.
pub async fn catch_up(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CatchUpResult>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let result = catch_up_for_user(&state.db, &state.config, &caller, Utc::now()).await?;
    Ok(Json(result))
}

/// Lists the caller's transactions, optionally within `?from=&to=`.
pub async fn get_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<transaction::Model>>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let range = query.into_range()?;
    Ok(Json(list_transactions(&state.db, &caller, range).await?))
}

/// Records a manual transaction for the caller; `occurredAt` defaults to now.
pub async fn post_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<transaction::Model>)> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let new = NewTransaction {
        owner_id: caller,
        amount: body.amount,
        kind: body.kind,
        category: body.category,
        description: body.description,
        occurred_at: body
            .occurred_at
            .unwrap_or_else(|| format_instant(Utc::now())),
        source_rule_id: None,
    };
    let created = create_transaction(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edits one of the caller's transactions, 404 when it is not theirs.
pub async fn put_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<TransactionUpdate>,
) -> ApiResult<Json<transaction::Model>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(update_transaction(&state.db, &id, &caller, update).await?))
}

/// Deleting an unknown id is a no-op and still answers 204.
pub async fn remove_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    delete_transaction(&state.db, &id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists the caller's rules, paused ones included.
pub async fn get_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<recurring_rule::Model>>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(list_rules(&state.db, &caller).await?))
}

/// Creates a rule whose cursor starts at `startDate`.
pub async fn post_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRuleRequest>,
) -> ApiResult<(StatusCode, Json<recurring_rule::Model>)> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let new = NewRule {
        owner_id: caller,
        kind: body.kind,
        category: body.category,
        description: body.description,
        amount: body.amount,
        frequency: body.frequency,
        start_date: parse_date(&body.start_date)?,
    };
    let created = create_rule(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edits a rule's template fields. The start date and cursor stay as they are.
pub async fn put_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<RuleUpdate>,
) -> ApiResult<Json<recurring_rule::Model>> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(update_rule(&state.db, &id, &caller, update).await?))
}

/// Deletes one of the caller's rules and keeps the transactions it generated.
pub async fn remove_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    delete_rule(&state.db, &id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answers with the updated rule, or 204 when the id is unknown to the caller.
pub async fn toggle_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ToggleRequest>>,
) -> ApiResult<Response> {
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let requested = body.and_then(|Json(b)| b.active);

    let active = match requested {
        Some(active) => active,
        None => match get_rule_for_owner(&state.db, &id, &caller).await? {
            Some(rule) => !rule.active,
            None => return Ok(StatusCode::NO_CONTENT.into_response()),
        },
    };

    Ok(match set_active(&state.db, &id, &caller, active).await? {
        Some(rule) => Json(rule).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
