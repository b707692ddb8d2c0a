pub mod queries;
pub mod rest;
pub mod sqlite;

use crate::config::{Config, StoreBackend};
use crate::models::{
    Activity, ActivityGoal, DailyEntry, NewActivity, NewActivityGoal, NewDailyEntry,
    NewWeeklyGoal, NewWeeklyReflection, WeeklyGoal, WeeklyReflection,
};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub activity_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekFilter {
    pub activity_id: Option<String>,
    pub week_start_date: Option<String>,
}

pub trait Store: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn list_active_activities(&self) -> StoreResult<Vec<Activity>>;
    fn insert_activity(&self, activity: &NewActivity) -> StoreResult<Activity>;
    fn get_activity(&self, id: &str) -> StoreResult<Option<Activity>>;
    fn deactivate_activity(&self, id: &str) -> StoreResult<Option<Activity>>;
    fn set_display_order(&self, id: &str, display_order: i64) -> StoreResult<Option<Activity>>;

    fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<DailyEntry>>;
    fn upsert_entry(&self, entry: &NewDailyEntry) -> StoreResult<DailyEntry>;
    fn get_entry(&self, id: &str) -> StoreResult<Option<DailyEntry>>;
    fn entries_on_dates(&self, activity_id: &str, dates: &[String])
    -> StoreResult<Vec<DailyEntry>>;

    fn list_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyGoal>>;
    fn upsert_goal(&self, goal: &NewWeeklyGoal) -> StoreResult<WeeklyGoal>;
    fn get_goal(&self, id: &str) -> StoreResult<Option<WeeklyGoal>>;
    fn find_goal(&self, activity_id: &str, week_start_date: &str)
    -> StoreResult<Option<WeeklyGoal>>;

    fn list_reflections(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyReflection>>;
    fn upsert_reflection(&self, reflection: &NewWeeklyReflection)
    -> StoreResult<WeeklyReflection>;
    fn get_reflection(&self, id: &str) -> StoreResult<Option<WeeklyReflection>>;
    fn find_reflection(
        &self,
        activity_id: &str,
        week_start_date: &str,
    ) -> StoreResult<Option<WeeklyReflection>>;

    fn list_activity_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<ActivityGoal>>;
    fn insert_activity_goal(&self, goal: &NewActivityGoal) -> StoreResult<ActivityGoal>;
    fn set_activity_goal_completed(
        &self,
        id: &str,
        completed: bool,
    ) -> StoreResult<Option<ActivityGoal>>;
    fn delete_activity_goal(&self, id: &str) -> StoreResult<Option<ActivityGoal>>;
}

pub fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.db_path)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Rest => {
            let base_url = config
                .rest_url
                .clone()
                .context("store_backend is `rest` but rest_url is not set")?;
            let api_key = config
                .rest_api_key
                .clone()
                .context("store_backend is `rest` but rest_api_key is not set")?;
            let store = RestStore::new(&base_url, &api_key, config.rest_timeout_seconds)?;
            Ok(Arc::new(store))
        }
    }
}
