use crate::config::Config;
use crate::dashboard::{self, DashboardError, DashboardView};
use crate::models::{
    Activity, ActivityGoal, ActivityOrder, DailyEntry, GoalCompletion, NewActivity,
    NewActivityGoal, NewDailyEntry, NewWeeklyGoal, NewWeeklyReflection, ValidationError,
    WeeklyGoal, WeeklyReflection, format_date, parse_date, parse_week_start,
};
use crate::planner::{self, CarryForward, PlannerError};
use crate::store::{EntryFilter, Store, StoreError, WeekFilter};
use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/api/activities",
            get(list_activities).post(create_activity),
        )
        .route("/api/activities/order", put(reorder_activities))
        .route(
            "/api/activities/:id",
            get(get_activity).delete(delete_activity),
        )
        .route("/api/entries", get(list_entries).post(upsert_entry))
        .route("/api/entries/:id", get(get_entry))
        .route("/api/goals", get(list_goals).post(upsert_goal))
        .route("/api/goals/:id", get(get_goal))
        .route(
            "/api/goals/carry-forward/:week_start_date",
            post(carry_forward_week),
        )
        .route(
            "/api/activity-goals",
            get(list_activity_goals).post(create_activity_goal),
        )
        .route(
            "/api/activity-goals/:id",
            patch(toggle_activity_goal).delete(delete_activity_goal),
        )
        .route(
            "/api/reflections",
            get(list_reflections).post(upsert_reflection),
        )
        .route("/api/reflections/:id", get(get_reflection))
        .route("/api/dashboard", get(dashboard_current_week))
        .route("/api/dashboard/:week_start_date", get(dashboard_for_week))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct EntriesQuery {
    activity_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WeekQuery {
    activity_id: Option<String>,
    week_start_date: Option<String>,
}

async fn root(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "message": "Momentum Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn list_activities(State(state): State<ApiState>) -> ApiResult<Json<Vec<Activity>>> {
    let activities = with_store(&state, |store| Ok(store.list_active_activities()?)).await?;
    Ok(Json(activities))
}

async fn create_activity(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Activity>> {
    let activity = decode::<NewActivity>(payload)?.validated()?;
    let created = with_store(&state, move |store| Ok(store.insert_activity(&activity)?)).await?;

    info!(activity_id = %created.id, name = %created.name, "activity created");
    Ok(Json(created))
}

async fn get_activity(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    let activity = with_store(&state, move |store| {
        store
            .get_activity(&id)?
            .ok_or_else(|| ApiError::NotFound("Activity not found".to_string()))
    })
    .await?;

    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deactivated = with_store(&state, move |store| {
        store
            .deactivate_activity(&id)?
            .ok_or_else(|| ApiError::NotFound("Activity not found".to_string()))
    })
    .await?;

    info!(activity_id = %deactivated.id, "activity deactivated");
    Ok(Json(json!({ "message": "Activity deleted successfully" })))
}

async fn reorder_activities(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Vec<Activity>>> {
    let order = decode::<ActivityOrder>(payload)?.validated()?;
    let activities = with_store(&state, move |store| {
        let active = store.list_active_activities()?;
        if let Some(missing) = order
            .activity_ids
            .iter()
            .find(|id| !active.iter().any(|activity| &activity.id == *id))
        {
            return Err(ApiError::NotFound(format!("Activity not found: {missing}")));
        }

        // Activities left out of the request keep their relative order after the listed ones.
        let sequence = order
            .activity_ids
            .iter()
            .cloned()
            .chain(
                active
                    .into_iter()
                    .map(|activity| activity.id)
                    .filter(|id| !order.activity_ids.contains(id)),
            )
            .collect::<Vec<_>>();
        for (position, id) in sequence.iter().enumerate() {
            store
                .set_display_order(id, position as i64)?
                .ok_or_else(|| ApiError::NotFound(format!("Activity not found: {id}")))?;
        }

        Ok(store.list_active_activities()?)
    })
    .await?;

    info!(count = activities.len(), "activities reordered");
    Ok(Json(activities))
}

async fn list_entries(
    State(state): State<ApiState>,
    Query(query): Query<EntriesQuery>,
) -> ApiResult<Json<Vec<DailyEntry>>> {
    let filter = EntryFilter {
        activity_id: non_blank(query.activity_id),
        start_date: optional_date("start_date", query.start_date)?,
        end_date: optional_date("end_date", query.end_date)?,
    };

    let entries = with_store(&state, move |store| Ok(store.list_entries(&filter)?)).await?;
    Ok(Json(entries))
}

async fn upsert_entry(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<DailyEntry>> {
    let entry = decode::<NewDailyEntry>(payload)?.validated()?;
    let saved = with_store(&state, move |store| Ok(store.upsert_entry(&entry)?)).await?;

    info!(
        activity_id = %saved.activity_id,
        entry_date = %saved.entry_date,
        value_amount = saved.value_amount,
        "daily entry saved"
    );
    Ok(Json(saved))
}

async fn get_entry(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DailyEntry>> {
    let entry = with_store(&state, move |store| {
        store
            .get_entry(&id)?
            .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))
    })
    .await?;

    Ok(Json(entry))
}

async fn list_goals(
    State(state): State<ApiState>,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<Vec<WeeklyGoal>>> {
    let filter = week_filter(query)?;
    let goals = with_store(&state, move |store| Ok(store.list_goals(&filter)?)).await?;
    Ok(Json(goals))
}

async fn upsert_goal(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<WeeklyGoal>> {
    let goal = decode::<NewWeeklyGoal>(payload)?.validated()?;
    let saved = with_store(&state, move |store| Ok(store.upsert_goal(&goal)?)).await?;

    info!(
        activity_id = %saved.activity_id,
        week_start_date = %saved.week_start_date,
        target_value = saved.target_value,
        "weekly goal saved"
    );
    Ok(Json(saved))
}

async fn get_goal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WeeklyGoal>> {
    let goal = with_store(&state, move |store| {
        store
            .get_goal(&id)?
            .ok_or_else(|| ApiError::NotFound("Goal not found".to_string()))
    })
    .await?;

    Ok(Json(goal))
}

async fn carry_forward_week(
    State(state): State<ApiState>,
    Path(week_start_date): Path<String>,
) -> ApiResult<Json<CarryForward>> {
    let carried = with_store(&state, move |store| {
        Ok(planner::carry_forward(store, &week_start_date)?)
    })
    .await?;

    Ok(Json(carried))
}

async fn list_activity_goals(
    State(state): State<ApiState>,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<Vec<ActivityGoal>>> {
    let filter = week_filter(query)?;
    let items = with_store(&state, move |store| Ok(store.list_activity_goals(&filter)?)).await?;
    Ok(Json(items))
}

async fn create_activity_goal(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<ActivityGoal>> {
    let item = decode::<NewActivityGoal>(payload)?.validated()?;
    let created = with_store(&state, move |store| Ok(store.insert_activity_goal(&item)?)).await?;

    info!(
        activity_id = %created.activity_id,
        week_start_date = %created.week_start_date,
        "checklist item added"
    );
    Ok(Json(created))
}

async fn toggle_activity_goal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<ActivityGoal>> {
    let GoalCompletion { completed } = decode::<GoalCompletion>(payload)?;
    let item = with_store(&state, move |store| {
        store
            .set_activity_goal_completed(&id, completed)?
            .ok_or_else(|| ApiError::NotFound("Activity goal not found".to_string()))
    })
    .await?;

    info!(item_id = %item.id, completed = item.completed, "checklist item toggled");
    Ok(Json(item))
}

async fn delete_activity_goal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deleted = with_store(&state, move |store| {
        store
            .delete_activity_goal(&id)?
            .ok_or_else(|| ApiError::NotFound("Activity goal not found".to_string()))
    })
    .await?;

    info!(item_id = %deleted.id, "checklist item deleted");
    Ok(Json(json!({ "message": "Activity goal deleted successfully" })))
}

async fn list_reflections(
    State(state): State<ApiState>,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<Vec<WeeklyReflection>>> {
    let filter = week_filter(query)?;
    let reflections =
        with_store(&state, move |store| Ok(store.list_reflections(&filter)?)).await?;
    Ok(Json(reflections))
}

async fn upsert_reflection(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<WeeklyReflection>> {
    let reflection = decode::<NewWeeklyReflection>(payload)?.validated()?;
    let saved = with_store(&state, move |store| Ok(store.upsert_reflection(&reflection)?)).await?;

    info!(
        activity_id = %saved.activity_id,
        week_start_date = %saved.week_start_date,
        "weekly reflection saved"
    );
    Ok(Json(saved))
}

async fn get_reflection(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WeeklyReflection>> {
    let reflection = with_store(&state, move |store| {
        store
            .get_reflection(&id)?
            .ok_or_else(|| ApiError::NotFound("Reflection not found".to_string()))
    })
    .await?;

    Ok(Json(reflection))
}

async fn dashboard_for_week(
    State(state): State<ApiState>,
    Path(week_start_date): Path<String>,
) -> ApiResult<Json<DashboardView>> {
    let view = with_store(&state, move |store| {
        Ok(dashboard::build_dashboard(store, &week_start_date)?)
    })
    .await?;

    Ok(Json(view))
}

async fn dashboard_current_week(State(state): State<ApiState>) -> ApiResult<Json<DashboardView>> {
    let week_start_date = format_date(dashboard::current_week_start());
    dashboard_for_week(State(state), Path(week_start_date)).await
}

async fn with_store<T, F>(state: &ApiState, task: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> ApiResult<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || task(store.as_ref()))
        .await
        .context("Store worker task failed")?
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ValidationError> {
    serde_json::from_value(payload).map_err(|error| ValidationError::Payload(error.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_date(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    non_blank(value)
        .map(|value| parse_date(field, &value).map(format_date))
        .transpose()
}

fn week_filter(query: WeekQuery) -> Result<WeekFilter, ValidationError> {
    let week_start_date = non_blank(query.week_start_date)
        .map(|value| parse_week_start("week_start_date", &value).map(format_date))
        .transpose()?;

    Ok(WeekFilter {
        activity_id: non_blank(query.activity_id),
        week_start_date,
    })
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Rejected(message) => Self::BadRequest(message),
            StoreError::Unavailable(error) => Self::Internal(error),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(value: DashboardError) -> Self {
        match value {
            DashboardError::Validation(error) => error.into(),
            DashboardError::Store(error) => error.into(),
        }
    }
}

impl From<PlannerError> for ApiError {
    fn from(value: PlannerError) -> Self {
        match value {
            PlannerError::Validation(error) => error.into(),
            PlannerError::Store(error) => error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                warn!(error = %message, "request rejected");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                error!(error = %format!("{error:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
