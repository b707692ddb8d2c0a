use super::{EntryFilter, Store, StoreError, StoreResult, WeekFilter};
use crate::models::{
    Activity, ActivityGoal, DailyEntry, NewActivity, NewActivityGoal, NewDailyEntry,
    NewWeeklyGoal, NewWeeklyReflection, WeeklyGoal, WeeklyReflection, now_timestamp,
};
use anyhow::{Context, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt::Display;
use std::time::Duration;
use url::Url;

const REST_PREFIX: &str = "rest/v1";
const PREFER_RETURN: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

pub struct RestStore {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    table: &'static str,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
}

impl TableQuery {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{value}"))
    }

    pub fn eq_opt(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    pub fn gte_opt(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.filter(column, format!("gte.{value}")),
            None => self,
        }
    }

    pub fn lte_opt(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.filter(column, format!("lte.{value}")),
            None => self,
        }
    }

    pub fn within(self, column: &str, values: &[String]) -> Self {
        let list = values
            .iter()
            .map(|value| quote_list_value(value))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({list})"))
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        let suffix = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        self.order.push(format!("{column}.{suffix}"));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn params(&self) -> Vec<(String, String)> {
        std::iter::once(("select".to_string(), "*".to_string()))
            .chain(self.filters.iter().cloned())
            .chain(
                (!self.order.is_empty()).then(|| ("order".to_string(), self.order.join(","))),
            )
            .chain(self.limit.map(|limit| ("limit".to_string(), limit.to_string())))
            .collect()
    }

    fn filter(mut self, column: &str, expression: String) -> Self {
        self.filters.push((column.to_string(), expression));
        self
    }
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid REST store URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("REST store URL must use http or https: {base_url}");
        }
        if api_key.trim().is_empty() {
            bail!("REST store API key is empty");
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            timeout: Duration::from_secs(timeout_seconds.max(1)),
        })
    }

    pub fn endpoint(&self, table: &str) -> String {
        format!("{}/{REST_PREFIX}/{table}", self.base_url)
    }

    fn client(&self) -> StoreResult<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(&self.api_key).context("Failed to build apikey header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("Failed to build Authorization header")?,
        );

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create REST store HTTP client")?;

        Ok(client)
    }

    fn select<T: DeserializeOwned>(&self, query: &TableQuery) -> StoreResult<Vec<T>> {
        let request = self
            .client()?
            .get(self.endpoint(query.table))
            .query(&query.params());
        send(request)
    }

    fn first<T: DeserializeOwned>(&self, query: &TableQuery) -> StoreResult<Option<T>> {
        let request = self
            .client()?
            .get(self.endpoint(query.table))
            .query(&query.params());
        Ok(send_by_id(request)?.into_iter().next())
    }

    fn next_display_order(&self, query: TableQuery) -> StoreResult<i64> {
        let last = self.select::<Value>(&query.order("display_order", Direction::Desc).limit(1))?;
        Ok(last
            .first()
            .and_then(|row| row.get("display_order"))
            .and_then(Value::as_i64)
            .map_or(0, |order| order + 1))
    }

    fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
        on_conflict: Option<&str>,
    ) -> StoreResult<T> {
        let prefer = if on_conflict.is_some() {
            PREFER_UPSERT
        } else {
            PREFER_RETURN
        };
        let mut request = self
            .client()?
            .post(self.endpoint(table))
            .header("Prefer", prefer)
            .json(body);
        if let Some(columns) = on_conflict {
            request = request.query(&[("on_conflict", columns)]);
        }

        send::<T>(request)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Rejected(format!("Failed to save {table} row")))
    }

    fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        body: &B,
    ) -> StoreResult<Option<T>> {
        let request = self
            .client()?
            .patch(self.endpoint(query.table))
            .query(&query.params())
            .header("Prefer", PREFER_RETURN)
            .json(body);
        Ok(send_by_id(request)?.into_iter().next())
    }

    fn delete<T: DeserializeOwned>(&self, query: &TableQuery) -> StoreResult<Option<T>> {
        let request = self
            .client()?
            .delete(self.endpoint(query.table))
            .query(&query.params())
            .header("Prefer", PREFER_RETURN);
        Ok(send_by_id(request)?.into_iter().next())
    }
}

#[derive(Serialize)]
struct OrderedRow<'a, T: Serialize> {
    #[serde(flatten)]
    row: &'a T,
    display_order: i64,
}

#[derive(Serialize)]
struct ChecklistRow<'a> {
    activity_id: &'a str,
    week_start_date: &'a str,
    goal_text: &'a str,
    completed: bool,
    display_order: i64,
}

impl Store for RestStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    fn list_active_activities(&self) -> StoreResult<Vec<Activity>> {
        self.select(
            &TableQuery::table("activities")
                .eq("is_active", true)
                .order("display_order", Direction::Asc)
                .order("created_at", Direction::Asc),
        )
    }

    fn insert_activity(&self, activity: &NewActivity) -> StoreResult<Activity> {
        let display_order = self.next_display_order(TableQuery::table("activities"))?;
        self.insert(
            "activities",
            &OrderedRow {
                row: activity,
                display_order,
            },
            None,
        )
    }

    fn get_activity(&self, id: &str) -> StoreResult<Option<Activity>> {
        self.first(&TableQuery::table("activities").eq("id", id))
    }

    fn deactivate_activity(&self, id: &str) -> StoreResult<Option<Activity>> {
        self.update(
            &TableQuery::table("activities").eq("id", id),
            &json!({ "is_active": false }),
        )
    }

    fn set_display_order(&self, id: &str, display_order: i64) -> StoreResult<Option<Activity>> {
        self.update(
            &TableQuery::table("activities").eq("id", id),
            &json!({ "display_order": display_order }),
        )
    }

    fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<DailyEntry>> {
        self.select(
            &TableQuery::table("daily_entries")
                .eq_opt("activity_id", filter.activity_id.as_deref())
                .gte_opt("entry_date", filter.start_date.as_deref())
                .lte_opt("entry_date", filter.end_date.as_deref())
                .order("entry_date", Direction::Desc)
                .order("created_at", Direction::Asc),
        )
    }

    fn upsert_entry(&self, entry: &NewDailyEntry) -> StoreResult<DailyEntry> {
        self.insert("daily_entries", entry, Some("activity_id,entry_date"))
    }

    fn get_entry(&self, id: &str) -> StoreResult<Option<DailyEntry>> {
        self.first(&TableQuery::table("daily_entries").eq("id", id))
    }

    fn entries_on_dates(
        &self,
        activity_id: &str,
        dates: &[String],
    ) -> StoreResult<Vec<DailyEntry>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        self.select(
            &TableQuery::table("daily_entries")
                .eq("activity_id", activity_id)
                .within("entry_date", dates)
                .order("entry_date", Direction::Asc),
        )
    }

    fn list_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyGoal>> {
        self.select(&week_query("weekly_goals", filter))
    }

    fn upsert_goal(&self, goal: &NewWeeklyGoal) -> StoreResult<WeeklyGoal> {
        self.insert("weekly_goals", goal, Some("activity_id,week_start_date"))
    }

    fn get_goal(&self, id: &str) -> StoreResult<Option<WeeklyGoal>> {
        self.first(&TableQuery::table("weekly_goals").eq("id", id))
    }

    fn find_goal(
        &self,
        activity_id: &str,
        week_start_date: &str,
    ) -> StoreResult<Option<WeeklyGoal>> {
        self.first(
            &TableQuery::table("weekly_goals")
                .eq("activity_id", activity_id)
                .eq("week_start_date", week_start_date),
        )
    }

    fn list_reflections(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyReflection>> {
        self.select(&week_query("weekly_reflections", filter))
    }

    fn upsert_reflection(
        &self,
        reflection: &NewWeeklyReflection,
    ) -> StoreResult<WeeklyReflection> {
        self.insert(
            "weekly_reflections",
            reflection,
            Some("activity_id,week_start_date"),
        )
    }

    fn get_reflection(&self, id: &str) -> StoreResult<Option<WeeklyReflection>> {
        self.first(&TableQuery::table("weekly_reflections").eq("id", id))
    }

    fn find_reflection(
        &self,
        activity_id: &str,
        week_start_date: &str,
    ) -> StoreResult<Option<WeeklyReflection>> {
        self.first(
            &TableQuery::table("weekly_reflections")
                .eq("activity_id", activity_id)
                .eq("week_start_date", week_start_date),
        )
    }

    fn list_activity_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<ActivityGoal>> {
        self.select(
            &week_filter_query("activity_goals", filter)
                .order("display_order", Direction::Asc)
                .order("created_at", Direction::Asc),
        )
    }

    fn insert_activity_goal(&self, goal: &NewActivityGoal) -> StoreResult<ActivityGoal> {
        let display_order = match goal.display_order {
            Some(order) => order,
            None => self.next_display_order(
                TableQuery::table("activity_goals")
                    .eq("activity_id", &goal.activity_id)
                    .eq("week_start_date", &goal.week_start_date),
            )?,
        };

        self.insert(
            "activity_goals",
            &ChecklistRow {
                activity_id: &goal.activity_id,
                week_start_date: &goal.week_start_date,
                goal_text: &goal.goal_text,
                completed: false,
                display_order,
            },
            None,
        )
    }

    fn set_activity_goal_completed(
        &self,
        id: &str,
        completed: bool,
    ) -> StoreResult<Option<ActivityGoal>> {
        self.update(
            &TableQuery::table("activity_goals").eq("id", id),
            &json!({
                "completed": completed,
                "completed_at": completed.then(now_timestamp),
            }),
        )
    }

    fn delete_activity_goal(&self, id: &str) -> StoreResult<Option<ActivityGoal>> {
        self.delete(&TableQuery::table("activity_goals").eq("id", id))
    }
}

fn week_filter_query(table: &'static str, filter: &WeekFilter) -> TableQuery {
    TableQuery::table(table)
        .eq_opt("activity_id", filter.activity_id.as_deref())
        .eq_opt("week_start_date", filter.week_start_date.as_deref())
}

fn week_query(table: &'static str, filter: &WeekFilter) -> TableQuery {
    week_filter_query(table, filter).order("created_at", Direction::Desc)
}

fn execute(request: RequestBuilder) -> StoreResult<(StatusCode, String)> {
    let response: Response = request.send().context("REST store request failed")?;
    let status = response.status();
    let body = response
        .text()
        .context("Failed to read REST store response body")?;
    Ok((status, body))
}

fn send<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<Vec<T>> {
    let (status, body) = execute(request)?;
    decode_rows(status, &body)
}

// An id that is not a valid uuid cannot match any row.
fn send_by_id<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<Vec<T>> {
    let (status, body) = execute(request)?;
    if is_invalid_id(status, &body) {
        return Ok(Vec::new());
    }
    decode_rows(status, &body)
}

fn decode_rows<T: DeserializeOwned>(status: StatusCode, body: &str) -> StoreResult<Vec<T>> {
    check_status(status, body)?;

    let rows = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse REST store response: {body}"))?;
    Ok(rows)
}

fn is_invalid_id(status: StatusCode, body: &str) -> bool {
    status == StatusCode::BAD_REQUEST
        && serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|payload| payload.get("code").and_then(Value::as_str).map(str::to_string))
            .is_some_and(|code| code == INVALID_TEXT_REPRESENTATION)
}

fn check_status(status: StatusCode, body: &str) -> StoreResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let auth_failure = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);
    if status.is_client_error() && !auth_failure {
        return Err(StoreError::Rejected(error_message(body)));
    }

    Err(StoreError::Unavailable(anyhow!(
        "REST store error {status}: {}",
        error_message(body)
    )))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(query: &TableQuery) -> Vec<(String, String)> {
        query.params()
    }

    #[test]
    fn active_activities_query_matches_wire_format() {
        let query = TableQuery::table("activities")
            .eq("is_active", true)
            .order("display_order", Direction::Asc)
            .order("created_at", Direction::Asc);

        assert_eq!(
            pairs(&query),
            vec![
                ("select".to_string(), "*".to_string()),
                ("is_active".to_string(), "eq.true".to_string()),
                (
                    "order".to_string(),
                    "display_order.asc,created_at.asc".to_string()
                ),
            ]
        );
    }

    #[test]
    fn limit_is_sent_after_order() {
        let query = TableQuery::table("activities")
            .order("display_order", Direction::Desc)
            .limit(1);

        assert_eq!(
            query.params().last(),
            Some(&("limit".to_string(), "1".to_string()))
        );
    }

    #[test]
    fn malformed_uuid_is_treated_as_missing_row() {
        let invalid = r#"{"code":"22P02","message":"invalid input syntax for type uuid: \"abc\""}"#;
        let duplicate = r#"{"code":"23505","message":"duplicate key"}"#;

        assert!(is_invalid_id(StatusCode::BAD_REQUEST, invalid));
        assert!(!is_invalid_id(StatusCode::BAD_REQUEST, duplicate));
        assert!(!is_invalid_id(StatusCode::INTERNAL_SERVER_ERROR, invalid));
    }

    #[test]
    fn entry_filter_skips_missing_bounds() {
        let query = TableQuery::table("daily_entries")
            .eq_opt("activity_id", None)
            .gte_opt("entry_date", Some("2025-01-06"))
            .lte_opt("entry_date", None)
            .order("entry_date", Direction::Desc)
            .order("created_at", Direction::Asc);

        assert_eq!(
            pairs(&query),
            vec![
                ("select".to_string(), "*".to_string()),
                ("entry_date".to_string(), "gte.2025-01-06".to_string()),
                (
                    "order".to_string(),
                    "entry_date.desc,created_at.asc".to_string()
                ),
            ]
        );
    }

    #[test]
    fn membership_filter_lists_and_quotes_values() {
        let dates = vec!["2025-01-06".to_string(), "a,b".to_string()];
        let query = TableQuery::table("daily_entries").within("entry_date", &dates);

        assert_eq!(
            query.params()[1],
            (
                "entry_date".to_string(),
                "in.(2025-01-06,\"a,b\")".to_string()
            )
        );
    }

    #[test]
    fn client_errors_are_rejections_with_store_message() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        let error = check_status(StatusCode::CONFLICT, body).expect_err("conflict");

        match error {
            StoreError::Rejected(message) => {
                assert_eq!(message, "duplicate key value violates unique constraint")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn server_and_auth_errors_are_unavailable() {
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "upstream down"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, "{\"message\":\"bad key\"}"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(check_status(StatusCode::OK, "[]").is_ok());
    }

    #[test]
    fn endpoint_joins_table_under_rest_prefix() {
        let store = RestStore::new("https://example.supabase.co/", "key", 10).expect("store");
        assert_eq!(
            store.endpoint("weekly_goals"),
            "https://example.supabase.co/rest/v1/weekly_goals"
        );
    }

    #[test]
    fn rejects_invalid_url_and_empty_key() {
        assert!(RestStore::new("not a url", "key", 10).is_err());
        assert!(RestStore::new("ftp://example.com", "key", 10).is_err());
        assert!(RestStore::new("https://example.com", "  ", 10).is_err());
    }

    mod wire {
        use super::*;
        use axum::extract::State;
        use axum::http::{HeaderMap, Method, Uri};
        use axum::Router;
        use std::sync::{Arc, Mutex};

        const KEY: &str = "service-key";
        const ACTIVITY_ID: &str = "8c3a4f9e-2b1d-4d6e-9f0a-1b2c3d4e5f60";

        #[derive(Debug, Clone)]
        struct Recorded {
            method: Method,
            path: String,
            query: Vec<(String, String)>,
            headers: HeaderMap,
            body: String,
        }

        impl Recorded {
            fn header(&self, name: &str) -> Option<&str> {
                self.headers.get(name).and_then(|value| value.to_str().ok())
            }

            fn query_value(&self, name: &str) -> Option<&str> {
                self.query
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.as_str())
            }

            fn json(&self) -> Value {
                serde_json::from_str(&self.body).expect("json body")
            }
        }

        type Log = Arc<Mutex<Vec<Recorded>>>;

        fn activity_row(display_order: i64, is_active: bool) -> Value {
            json!({
                "id": ACTIVITY_ID,
                "name": "Study",
                "is_active": is_active,
                "activity_type": "time",
                "target_unit": "hours",
                "display_order": display_order,
                "created_at": "2025-01-06T08:00:00.000000+00:00"
            })
        }

        fn respond(request: &Recorded) -> (StatusCode, String) {
            let rows = |rows: Value| (StatusCode::OK, rows.to_string());
            match (request.method.as_str(), request.path.as_str()) {
                ("GET", "/rest/v1/activities") if request.query_value("id") == Some("eq.abc") => (
                    StatusCode::BAD_REQUEST,
                    json!({ "code": "22P02", "message": "invalid input syntax for type uuid" })
                        .to_string(),
                ),
                ("GET", "/rest/v1/activities") => rows(json!([activity_row(4, true)])),
                ("POST", "/rest/v1/activities") => rows(json!([activity_row(5, true)])),
                ("PATCH", "/rest/v1/activities") => rows(json!([])),
                ("POST", "/rest/v1/daily_entries") => {
                    let mut row = request.json();
                    row["id"] = json!("e1");
                    row["created_at"] = json!("2025-01-06T09:00:00.000000+00:00");
                    (StatusCode::CREATED, json!([row]).to_string())
                }
                _ => (StatusCode::NOT_FOUND, json!({ "message": "no route" }).to_string()),
            }
        }

        async fn record(
            State(log): State<Log>,
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: String,
        ) -> (StatusCode, String) {
            let query = url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
                .into_owned()
                .collect();
            let request = Recorded {
                method,
                path: uri.path().to_string(),
                query,
                headers,
                body,
            };
            let reply = respond(&request);
            log.lock().expect("log lock").push(request);
            reply
        }

        async fn start() -> (RestStore, Log) {
            let log = Log::default();
            let app = Router::new()
                .fallback(record)
                .with_state(Arc::clone(&log));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("listener bound");
            let addr = listener.local_addr().expect("local addr");
            tokio::spawn(async move {
                axum::serve(listener, app).await.expect("server runs");
            });

            let store = RestStore::new(&format!("http://{addr}"), KEY, 5).expect("store");
            (store, log)
        }

        fn take(log: &Log) -> Vec<Recorded> {
            std::mem::take(&mut *log.lock().expect("log lock"))
        }

        #[tokio::test]
        async fn upsert_sends_merge_preference_and_conflict_columns() {
            let (store, log) = start().await;

            let saved = tokio::task::spawn_blocking(move || {
                store.upsert_entry(&NewDailyEntry {
                    activity_id: ACTIVITY_ID.to_string(),
                    entry_date: "2025-01-06".to_string(),
                    value_amount: 2.5,
                })
            })
            .await
            .expect("blocking task")
            .expect("entry saved");

            assert_eq!(saved.id, "e1");
            assert_eq!(saved.value_amount, 2.5);
            assert_eq!(saved.entry_date, "2025-01-06");

            let requests = take(&log);
            assert_eq!(requests.len(), 1);
            let request = &requests[0];
            assert_eq!(request.method, Method::POST);
            assert_eq!(request.path, "/rest/v1/daily_entries");
            assert_eq!(
                request.query,
                vec![("on_conflict".to_string(), "activity_id,entry_date".to_string())]
            );
            assert_eq!(request.header("apikey"), Some(KEY));
            assert_eq!(request.header("authorization"), Some("Bearer service-key"));
            assert_eq!(request.header("prefer"), Some(PREFER_UPSERT));
            assert_eq!(request.header("content-type"), Some("application/json"));
            assert_eq!(
                request.json(),
                json!({
                    "activity_id": ACTIVITY_ID,
                    "entry_date": "2025-01-06",
                    "value_amount": 2.5
                })
            );
        }

        #[tokio::test]
        async fn insert_appends_after_the_highest_display_order() {
            let (store, log) = start().await;

            let created = tokio::task::spawn_blocking(move || {
                store.insert_activity(&NewActivity::new("Study", Default::default()))
            })
            .await
            .expect("blocking task")
            .expect("activity created");
            assert_eq!(created.display_order, 5);

            let requests = take(&log);
            assert_eq!(requests.len(), 2);

            let lookup = &requests[0];
            assert_eq!(lookup.method, Method::GET);
            assert_eq!(lookup.query_value("order"), Some("display_order.desc"));
            assert_eq!(lookup.query_value("limit"), Some("1"));

            let insert = &requests[1];
            assert_eq!(insert.method, Method::POST);
            assert_eq!(insert.header("prefer"), Some(PREFER_RETURN));
            assert_eq!(insert.query_value("on_conflict"), None);
            assert_eq!(insert.json()["display_order"], json!(5));
            assert_eq!(insert.json()["name"], json!("Study"));
        }

        #[tokio::test]
        async fn soft_delete_patches_by_id_and_maps_zero_rows_to_none() {
            let (store, log) = start().await;

            let outcome = tokio::task::spawn_blocking(move || {
                let deactivated = store.deactivate_activity(ACTIVITY_ID)?;
                let malformed = store.get_activity("abc")?;
                let listed = store.list_active_activities()?;
                Ok::<_, StoreError>((deactivated, malformed, listed))
            })
            .await
            .expect("blocking task");
            let (deactivated, malformed, listed) = outcome.expect("store calls succeed");

            assert!(deactivated.is_none());
            assert!(malformed.is_none());
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].name, "Study");
            assert_eq!(listed[0].display_order, 4);

            let requests = take(&log);
            let patch = &requests[0];
            assert_eq!(patch.method, Method::PATCH);
            assert_eq!(patch.path, "/rest/v1/activities");
            assert_eq!(
                patch.query_value("id"),
                Some(format!("eq.{ACTIVITY_ID}").as_str())
            );
            assert_eq!(patch.header("prefer"), Some(PREFER_RETURN));
            assert_eq!(patch.json(), json!({ "is_active": false }));

            let list = &requests[2];
            assert_eq!(list.query_value("is_active"), Some("eq.true"));
            assert_eq!(
                list.query_value("order"),
                Some("display_order.asc,created_at.asc")
            );
        }
    }
}
