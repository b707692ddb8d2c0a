use crate::models::{
    Activity, ActivityType, DailyEntry, ValidationError, format_date, parse_week_start,
};
use crate::store::{Store, StoreError, StoreResult};
use anyhow::anyhow;
use chrono::{Datelike, Days, Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::thread;
use thiserror::Error;

const DAYS_IN_WEEK: usize = 7;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub week_start_date: String,
    pub week_dates: Vec<String>,
    pub activities: Vec<ActivityWeek>,
    pub weekly_summary: WeeklySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityWeek {
    pub activity_id: String,
    pub name: String,
    pub activity_type: ActivityType,
    pub target_unit: String,
    pub target_value: f64,
    pub realized_value: f64,
    pub percentage_complete: f64,
    pub reflection_text: String,
    pub daily_values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub total_target_hours: f64,
    pub total_realized_hours: f64,
    pub overall_percentage: f64,
}

pub fn build_dashboard(
    store: &dyn Store,
    week_start_date: &str,
) -> Result<DashboardView, DashboardError> {
    let monday = parse_week_start("week_start_date", week_start_date)?;
    let week_start_date = format_date(monday);
    let week_dates = week_dates(monday);

    let activities = store.list_active_activities()?;
    if activities.is_empty() {
        return Ok(DashboardView {
            week_start_date,
            week_dates,
            activities: Vec::new(),
            weekly_summary: WeeklySummary::default(),
        });
    }

    let activities = fetch_weeks(store, &activities, &week_start_date, &week_dates)?;
    let weekly_summary = summarize_week(&activities);

    Ok(DashboardView {
        week_start_date,
        week_dates,
        activities,
        weekly_summary,
    })
}

pub fn week_dates(monday: NaiveDate) -> Vec<String> {
    monday
        .iter_days()
        .take(DAYS_IN_WEEK)
        .map(format_date)
        .collect()
}

pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let offset = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(offset).unwrap_or(NaiveDate::MIN)
}

pub fn current_week_start() -> NaiveDate {
    week_start_of(Local::now().date_naive())
}

pub fn summarize_activity(
    activity: &Activity,
    target_value: f64,
    reflection_text: String,
    week_dates: &[String],
    entries: &[DailyEntry],
) -> ActivityWeek {
    let empty_week = week_dates
        .iter()
        .map(|date| (date.clone(), 0.0))
        .collect::<BTreeMap<_, _>>();
    let daily_values = entries.iter().fold(empty_week, |mut acc, entry| {
        if let Some(value) = acc.get_mut(&entry.entry_date) {
            *value = entry.value_amount;
        }
        acc
    });
    let realized_value = daily_values.values().sum::<f64>();

    ActivityWeek {
        activity_id: activity.id.clone(),
        name: activity.name.clone(),
        activity_type: activity.activity_type,
        target_unit: activity.target_unit.clone(),
        target_value,
        realized_value,
        percentage_complete: percentage(realized_value, target_value),
        reflection_text,
        daily_values,
    }
}

pub fn summarize_week(activities: &[ActivityWeek]) -> WeeklySummary {
    let (total_target_hours, total_realized_hours) = activities
        .iter()
        .filter(|activity| activity.activity_type == ActivityType::Time)
        .fold((0.0, 0.0), |(target, realized), activity| {
            (
                target + activity.target_value,
                realized + activity.realized_value,
            )
        });

    WeeklySummary {
        total_target_hours,
        total_realized_hours,
        overall_percentage: percentage(total_realized_hours, total_target_hours),
    }
}

pub fn percentage(realized: f64, target: f64) -> f64 {
    if target > 0.0 {
        round_2(realized / target * 100.0)
    } else {
        0.0
    }
}

// Half-way values go to the even hundredth.
fn round_2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn fetch_weeks(
    store: &dyn Store,
    activities: &[Activity],
    week_start_date: &str,
    week_dates: &[String],
) -> StoreResult<Vec<ActivityWeek>> {
    thread::scope(|scope| {
        let handles = activities
            .iter()
            .map(|activity| {
                scope.spawn(move || fetch_week(store, activity, week_start_date, week_dates))
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().map_err(|_| {
                    StoreError::Unavailable(anyhow!("dashboard worker thread panicked"))
                })?
            })
            .collect()
    })
}

fn fetch_week(
    store: &dyn Store,
    activity: &Activity,
    week_start_date: &str,
    week_dates: &[String],
) -> StoreResult<ActivityWeek> {
    let target_value = store
        .find_goal(&activity.id, week_start_date)?
        .map(|goal| goal.target_value)
        .unwrap_or(0.0);
    let reflection_text = store
        .find_reflection(&activity.id, week_start_date)?
        .map(|reflection| reflection.reflection_text)
        .unwrap_or_default();
    let entries = store.entries_on_dates(&activity.id, week_dates)?;

    Ok(summarize_activity(
        activity,
        target_value,
        reflection_text,
        week_dates,
        &entries,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActivityGoal, NewActivity, NewActivityGoal, NewDailyEntry, NewWeeklyGoal,
        NewWeeklyReflection, WeeklyGoal, WeeklyReflection,
    };
    use crate::store::{EntryFilter, SqliteStore, WeekFilter};
    use chrono::Weekday;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WEEK: &str = "2025-01-06";

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn add_activity(store: &SqliteStore, name: &str, activity_type: ActivityType) -> Activity {
        store
            .insert_activity(&NewActivity::new(name, activity_type))
            .expect("activity inserted")
    }

    fn set_goal(store: &SqliteStore, activity: &Activity, target_value: f64) {
        store
            .upsert_goal(&NewWeeklyGoal {
                activity_id: activity.id.clone(),
                week_start_date: WEEK.to_string(),
                target_value,
            })
            .expect("goal saved");
    }

    fn log(store: &SqliteStore, activity: &Activity, entry_date: &str, value_amount: f64) {
        store
            .upsert_entry(&NewDailyEntry {
                activity_id: activity.id.clone(),
                entry_date: entry_date.to_string(),
                value_amount,
            })
            .expect("entry saved");
    }

    #[test]
    fn week_dates_are_seven_consecutive_days_from_monday() {
        assert_eq!(
            week_dates(date("2024-12-30")),
            [
                "2024-12-30",
                "2024-12-31",
                "2025-01-01",
                "2025-01-02",
                "2025-01-03",
                "2025-01-04",
                "2025-01-05",
            ]
        );
    }

    #[test]
    fn week_start_of_rolls_back_to_monday() {
        assert_eq!(week_start_of(date("2025-01-12")), date("2025-01-06"));
        assert_eq!(week_start_of(date("2025-01-06")), date("2025-01-06"));
        assert_eq!(week_start_of(date("2025-01-01")), date("2024-12-30"));
    }

    #[test]
    fn percentage_never_divides_by_zero() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
    }

    #[test]
    fn percentage_rounds_half_to_even() {
        assert_eq!(percentage(1.0, 800.0), 0.12);
        assert_eq!(percentage(1.0, 8.0), 12.5);
    }

    #[test]
    fn week_at_the_end_of_the_calendar_is_a_validation_error() {
        let store = CountingStore::new(Vec::new());
        let last_monday = format_date(NaiveDate::MAX.week(Weekday::Mon).first_day());

        let error = build_dashboard(&store, &last_monday).expect_err("week overflows");

        assert!(matches!(
            error,
            DashboardError::Validation(ValidationError::WeekOutOfRange { .. })
        ));
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn estudio_example_realizes_sixty_percent() {
        let store = SqliteStore::open_in_memory().expect("store");
        let estudio = add_activity(&store, "Estudio", ActivityType::Time);
        set_goal(&store, &estudio, 10.0);
        log(&store, &estudio, "2025-01-06", 2.0);
        log(&store, &estudio, "2025-01-07", 3.0);
        log(&store, &estudio, "2025-01-08", 1.0);

        let view = build_dashboard(&store, WEEK).expect("dashboard built");
        let week = &view.activities[0];

        assert_eq!(view.week_dates.len(), 7);
        assert_eq!(week.realized_value, 6.0);
        assert_eq!(week.percentage_complete, 60.0);
        assert_eq!(week.daily_values.len(), 7);
        assert_eq!(
            week.daily_values
                .iter()
                .filter(|(_, value)| **value == 0.0)
                .count(),
            4
        );
        assert_eq!(view.weekly_summary.overall_percentage, 60.0);
    }

    #[test]
    fn empty_week_defaults_everything_to_zero() {
        let store = SqliteStore::open_in_memory().expect("store");
        add_activity(&store, "Reading", ActivityType::Time);
        let other = add_activity(&store, "Other week", ActivityType::Time);
        log(&store, &other, "2025-01-13", 4.0);

        let view = build_dashboard(&store, WEEK).expect("dashboard built");

        view.activities.iter().for_each(|week| {
            assert_eq!(week.target_value, 0.0);
            assert_eq!(week.reflection_text, "");
            assert_eq!(week.realized_value, 0.0);
            assert_eq!(week.percentage_complete, 0.0);
            assert!(week.daily_values.values().all(|value| *value == 0.0));
        });
    }

    #[test]
    fn zero_target_reports_zero_percent_even_with_progress() {
        let store = SqliteStore::open_in_memory().expect("store");
        let running = add_activity(&store, "Running", ActivityType::Time);
        log(&store, &running, "2025-01-09", 5.0);

        let view = build_dashboard(&store, WEEK).expect("dashboard built");

        assert_eq!(view.activities[0].realized_value, 5.0);
        assert_eq!(view.activities[0].percentage_complete, 0.0);
        assert_eq!(view.weekly_summary.overall_percentage, 0.0);
    }

    #[test]
    fn only_time_activities_count_toward_totals() {
        let store = SqliteStore::open_in_memory().expect("store");
        let study = add_activity(&store, "Study", ActivityType::Time);
        let pushups = add_activity(&store, "Push-ups", ActivityType::Count);
        set_goal(&store, &study, 10.0);
        set_goal(&store, &pushups, 20.0);
        log(&store, &study, "2025-01-06", 5.0);
        log(&store, &pushups, "2025-01-10", 20.0);

        let view = build_dashboard(&store, WEEK).expect("dashboard built");

        assert_eq!(view.activities.len(), 2);
        assert_eq!(view.activities[1].percentage_complete, 100.0);
        assert_eq!(
            view.weekly_summary,
            WeeklySummary {
                total_target_hours: 10.0,
                total_realized_hours: 5.0,
                overall_percentage: 50.0,
            }
        );
    }

    #[test]
    fn reflections_and_creation_order_are_kept() {
        let store = SqliteStore::open_in_memory().expect("store");
        let first = add_activity(&store, "First", ActivityType::Time);
        add_activity(&store, "Second", ActivityType::Count);
        store
            .upsert_reflection(&NewWeeklyReflection {
                activity_id: first.id.clone(),
                week_start_date: WEEK.to_string(),
                reflection_text: "steady week".to_string(),
            })
            .expect("reflection saved");

        let view = build_dashboard(&store, WEEK).expect("dashboard built");
        let names = view
            .activities
            .iter()
            .map(|week| week.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, ["First", "Second"]);
        assert_eq!(view.activities[0].reflection_text, "steady week");
    }

    #[test]
    fn deactivated_activities_are_left_out() {
        let store = SqliteStore::open_in_memory().expect("store");
        let dropped = add_activity(&store, "Dropped", ActivityType::Time);
        add_activity(&store, "Kept", ActivityType::Time);
        store
            .deactivate_activity(&dropped.id)
            .expect("deactivated");

        let view = build_dashboard(&store, WEEK).expect("dashboard built");

        assert_eq!(view.activities.len(), 1);
        assert_eq!(view.activities[0].name, "Kept");
    }

    #[test]
    fn no_activities_short_circuits() {
        let store = CountingStore::new(Vec::new());
        let view = build_dashboard(&store, WEEK).expect("dashboard built");

        assert!(view.activities.is_empty());
        assert_eq!(view.weekly_summary, WeeklySummary::default());
        assert_eq!(store.calls(), 1);
    }

    #[test]
    fn invalid_week_fails_before_any_fetch() {
        let store = CountingStore::new(Vec::new());

        let malformed = build_dashboard(&store, "01/06/2025").expect_err("malformed");
        let tuesday = build_dashboard(&store, "2025-01-07").expect_err("tuesday");

        assert!(matches!(
            malformed,
            DashboardError::Validation(ValidationError::InvalidDate { .. })
        ));
        assert!(matches!(
            tuesday,
            DashboardError::Validation(ValidationError::NotMonday { .. })
        ));
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn lookup_failure_fails_the_whole_view() {
        let activity = Activity {
            id: "a1".to_string(),
            name: "Study".to_string(),
            is_active: true,
            activity_type: ActivityType::Time,
            target_unit: "hours".to_string(),
            display_order: 0,
            created_at: "2025-01-01T00:00:00.000000Z".to_string(),
        };
        let store = CountingStore::new(vec![activity]);

        let error = build_dashboard(&store, WEEK).expect_err("lookup fails");

        assert!(matches!(
            error,
            DashboardError::Store(StoreError::Unavailable(_))
        ));
    }

    struct CountingStore {
        activities: Vec<Activity>,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new(activities: Vec<Activity>) -> Self {
            Self {
                activities,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail<T>(&self) -> StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable(anyhow!("store offline")))
        }
    }

    impl Store for CountingStore {
        fn backend_name(&self) -> &'static str {
            "counting"
        }

        fn list_active_activities(&self) -> StoreResult<Vec<Activity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.activities.clone())
        }

        fn insert_activity(&self, _activity: &NewActivity) -> StoreResult<Activity> {
            self.fail()
        }

        fn get_activity(&self, _id: &str) -> StoreResult<Option<Activity>> {
            self.fail()
        }

        fn deactivate_activity(&self, _id: &str) -> StoreResult<Option<Activity>> {
            self.fail()
        }

        fn set_display_order(&self, _id: &str, _order: i64) -> StoreResult<Option<Activity>> {
            self.fail()
        }

        fn list_entries(&self, _filter: &EntryFilter) -> StoreResult<Vec<DailyEntry>> {
            self.fail()
        }

        fn upsert_entry(&self, _entry: &NewDailyEntry) -> StoreResult<DailyEntry> {
            self.fail()
        }

        fn get_entry(&self, _id: &str) -> StoreResult<Option<DailyEntry>> {
            self.fail()
        }

        fn entries_on_dates(
            &self,
            _activity_id: &str,
            _dates: &[String],
        ) -> StoreResult<Vec<DailyEntry>> {
            self.fail()
        }

        fn list_goals(&self, _filter: &WeekFilter) -> StoreResult<Vec<WeeklyGoal>> {
            self.fail()
        }

        fn upsert_goal(&self, _goal: &NewWeeklyGoal) -> StoreResult<WeeklyGoal> {
            self.fail()
        }

        fn get_goal(&self, _id: &str) -> StoreResult<Option<WeeklyGoal>> {
            self.fail()
        }

        fn find_goal(&self, _activity_id: &str, _week: &str) -> StoreResult<Option<WeeklyGoal>> {
            self.fail()
        }

        fn list_reflections(&self, _filter: &WeekFilter) -> StoreResult<Vec<WeeklyReflection>> {
            self.fail()
        }

        fn upsert_reflection(
            &self,
            _reflection: &NewWeeklyReflection,
        ) -> StoreResult<WeeklyReflection> {
            self.fail()
        }

        fn get_reflection(&self, _id: &str) -> StoreResult<Option<WeeklyReflection>> {
            self.fail()
        }

        fn find_reflection(
            &self,
            _activity_id: &str,
            _week: &str,
        ) -> StoreResult<Option<WeeklyReflection>> {
            self.fail()
        }

        fn list_activity_goals(&self, _filter: &WeekFilter) -> StoreResult<Vec<ActivityGoal>> {
            self.fail()
        }

        fn insert_activity_goal(&self, _goal: &NewActivityGoal) -> StoreResult<ActivityGoal> {
            self.fail()
        }

        fn set_activity_goal_completed(
            &self,
            _id: &str,
            _completed: bool,
        ) -> StoreResult<Option<ActivityGoal>> {
            self.fail()
        }

        fn delete_activity_goal(&self, _id: &str) -> StoreResult<Option<ActivityGoal>> {
            self.fail()
        }
    }
}
