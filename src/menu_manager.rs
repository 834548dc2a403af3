//! Menu retrieval behind a single `get_menu` call: resolving which day to
//! show, downloading the plan with forward-skip on missing days, parsing and
//! a time-bounded in-memory cache in front of it all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as Days, Local, NaiveDate, Timelike, Weekday};
use chrono::Datelike;
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;

use crate::constants::MEAL_PLAN_URL_BASE;
use crate::data_backend::mensa_parser::parse_menu;
use crate::data_types::mensa_data_types::Menu;
use crate::errors::MenuError;

/// Each 404 advances the requested day by one; after this many attempts the
/// lookup is given up.
const FETCH_MAX_ATTEMPTS: u32 = 20;

const CACHE_MAX_LEN: usize = 20;
const CACHE_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Which day's plan to show right now: weekends roll over to the next
/// Monday, and from 16:00 on workdays the next day is shown.
pub fn resolve_menu_day(now: DateTime<Local>) -> NaiveDate {
    let day = now.date_naive();
    match now.weekday() {
        Weekday::Sat => day + Days::days(2),
        Weekday::Sun => day + Days::days(1),
        _ if now.hour() >= 16 => day + Days::days(1),
        _ => day,
    }
}

struct CacheEntry {
    menu: Menu,
    inserted: Instant,
}

/// Plan cache bounded in entry count and age. Entries past the age bound are
/// treated as misses on read; the size bound evicts the oldest entry.
#[derive(Default)]
pub struct MenuCache {
    entries: HashMap<(u32, NaiveDate), CacheEntry>,
}

impl MenuCache {
    pub fn get(&self, key: &(u32, NaiveDate), now: Instant) -> Option<&Menu> {
        self.entries
            .get(key)
            .filter(|entry| now.duration_since(entry.inserted) < CACHE_MAX_AGE)
            .map(|entry| &entry.menu)
    }

    pub fn insert(&mut self, key: (u32, NaiveDate), menu: Menu, now: Instant) {
        if self.entries.len() >= CACHE_MAX_LEN && !self.entries.contains_key(&key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, CacheEntry { menu, inserted: now });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Downloads the plan page for the given cafeteria, starting at
/// `initial_day`. Days the server has no plan for are skipped forward;
/// anything but 200/404 is an upstream problem and surfaces as an error.
pub async fn download_menu(
    client: &Client,
    mensa_id: u32,
    initial_day: NaiveDate,
) -> Result<(String, NaiveDate), MenuError> {
    let mut day = initial_day;

    for _ in 0..FETCH_MAX_ATTEMPTS {
        let url = format!(
            "{}/speiseplan_{}_{}_-de.html",
            MEAL_PLAN_URL_BASE,
            day.format("%Y-%m-%d"),
            mensa_id
        );
        log::debug!("Lade {}", url);

        let response = client.get(&url).send().await?;
        match response.status() {
            StatusCode::OK => return Ok((response.text().await?, day)),
            StatusCode::NOT_FOUND => day += Days::days(1),
            status => return Err(MenuError::BadStatus(status)),
        }
    }

    Err(MenuError::DaysExhausted(FETCH_MAX_ATTEMPTS))
}

/// The component everything else talks to. Clones share one HTTP client and
/// one cache.
#[derive(Clone, Default)]
pub struct MenuManager {
    client: Client,
    cache: Arc<Mutex<MenuCache>>,
}

impl MenuManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached plan lookup. The cache key uses the *initially* resolved day,
    /// not the day eventually served after 404 forward-skips, so two initial
    /// days skipping to the same served day cache separately.
    pub async fn get_menu(&self, mensa_id: u32) -> Result<Menu, MenuError> {
        let initial_day = resolve_menu_day(Local::now());
        let key = (mensa_id, initial_day);

        // the lock spans fetch and parse, so concurrent callers can't
        // download the same plan twice
        let mut cache = self.cache.lock().await;
        if let Some(menu) = cache.get(&key, Instant::now()) {
            log::debug!("Cache-Treffer für Mensa {} ({})", mensa_id, initial_day);
            return Ok(menu.clone());
        }

        let (html, served_day) = download_menu(&self.client, mensa_id, initial_day).await?;
        let menu = parse_menu(&html, mensa_id, served_day);
        cache.insert(key, menu.clone(), Instant::now());

        Ok(menu)
    }

    /// Drops all cached plans; the next lookups fetch fresh data. Runs
    /// before every scheduled broadcast.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, hour: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, hour, min, 0).unwrap()
    }

    #[test]
    fn weekday_morning_stays_on_same_day() {
        // Tuesday 10:00
        let day = resolve_menu_day(local(2026, 8, 4, 10, 0));
        assert_eq!(day, NaiveDate::from_ymd_opt(2026, 8, 4).unwrap());
    }

    #[test]
    fn weekday_afternoon_advances_one_day() {
        // Tuesday 16:30 -> Wednesday
        let day = resolve_menu_day(local(2026, 8, 4, 16, 30));
        assert_eq!(day, NaiveDate::from_ymd_opt(2026, 8, 5).unwrap());
    }

    #[test]
    fn cutoff_is_exactly_sixteen() {
        assert_eq!(
            resolve_menu_day(local(2026, 8, 4, 15, 59)),
            NaiveDate::from_ymd_opt(2026, 8, 4).unwrap()
        );
        assert_eq!(
            resolve_menu_day(local(2026, 8, 4, 16, 0)),
            NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
        );
    }

    #[test]
    fn weekend_always_maps_to_monday() {
        let monday = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        // Saturday, morning and evening
        assert_eq!(resolve_menu_day(local(2026, 8, 8, 9, 0)), monday);
        assert_eq!(resolve_menu_day(local(2026, 8, 8, 20, 0)), monday);
        // Sunday, morning and evening
        assert_eq!(resolve_menu_day(local(2026, 8, 9, 9, 0)), monday);
        assert_eq!(resolve_menu_day(local(2026, 8, 9, 23, 0)), monday);
    }

    fn menu(mensa_id: u32) -> Menu {
        Menu::new(mensa_id, "07.08.2026".to_string())
    }

    fn key(mensa_id: u32) -> (u32, NaiveDate) {
        (mensa_id, NaiveDate::from_ymd_opt(2026, 8, 7).unwrap())
    }

    #[test]
    fn cache_hit_within_age_window() {
        let mut cache = MenuCache::default();
        let now = Instant::now();

        cache.insert(key(421), menu(421), now);
        assert!(cache.get(&key(421), now + Duration::from_secs(30 * 60)).is_some());
    }

    #[test]
    fn cache_entry_expires_after_age_bound() {
        let mut cache = MenuCache::default();
        let now = Instant::now();

        cache.insert(key(421), menu(421), now);
        assert!(cache.get(&key(421), now + Duration::from_secs(60 * 60)).is_none());
    }

    #[test]
    fn cache_is_bounded_in_size_and_drops_oldest() {
        let mut cache = MenuCache::default();
        let start = Instant::now();

        for i in 0..21 {
            cache.insert(key(400 + i), menu(400 + i), start + Duration::from_secs(u64::from(i)));
        }

        assert_eq!(cache.len(), 20);
        // the first inserted entry was replaced
        assert!(cache.get(&key(400), start + Duration::from_secs(30)).is_none());
        assert!(cache.get(&key(420), start + Duration::from_secs(30)).is_some());
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = MenuCache::default();
        cache.insert(key(421), menu(421), Instant::now());

        cache.clear();
        assert!(cache.is_empty());
    }
}
