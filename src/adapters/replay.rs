//! Offline browsing session that replays a recorded calendar.
//!
//! A fixture lists the weeks a booking calendar shows, one page per week.
//! Clicking the next-page control replaces the document, so element handles
//! taken before the click go stale exactly like on the live site.

use crate::config::settings::Selectors;
use crate::domain::ports::{BrowsingSession, SessionFactory, SessionResult};
use crate::utils::error::{Result, SessionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarFixture {
    pub weeks: Vec<WeekFixture>,
    /// Whether a cookie banner is shown on load.
    #[serde(default)]
    pub cookie_banner: bool,
    /// Week (0-based) during which the browser stops responding.
    #[serde(default)]
    pub disconnect_on_week: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeekFixture {
    pub days: Vec<DayFixture>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DayFixture {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    /// Number of slot enumerations that fail as stale before succeeding.
    #[serde(default)]
    pub stale_reads: u32,
}

impl DayFixture {
    pub fn new(label: &str, slots: &[&str]) -> Self {
        Self {
            label: Some(label.to_string()),
            slots: slots.iter().map(|s| s.to_string()).collect(),
            stale_reads: 0,
        }
    }

    pub fn with_stale_reads(mut self, stale_reads: u32) -> Self {
        self.stale_reads = stale_reads;
        self
    }
}

impl CalendarFixture {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_weeks(weeks: Vec<Vec<DayFixture>>) -> Self {
        Self {
            weeks: weeks.into_iter().map(|days| WeekFixture { days }).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayElement {
    Day { generation: u64, index: usize },
    Label { generation: u64, index: usize },
    Slot { generation: u64, index: usize, slot: usize },
    NextButton { generation: u64 },
    CookieButton,
}

impl ReplayElement {
    fn generation(&self) -> Option<u64> {
        match self {
            ReplayElement::Day { generation, .. }
            | ReplayElement::Label { generation, .. }
            | ReplayElement::Slot { generation, .. }
            | ReplayElement::NextButton { generation } => Some(*generation),
            ReplayElement::CookieButton => None,
        }
    }
}

#[derive(Debug)]
struct ReplayState {
    week: usize,
    generation: u64,
    loaded: bool,
    cookie_banner: bool,
    stale_budget: HashMap<(usize, usize), u32>,
}

pub struct ReplaySession {
    fixture: CalendarFixture,
    selectors: Selectors,
    state: Mutex<ReplayState>,
    closed: Arc<AtomicUsize>,
}

impl ReplaySession {
    pub fn new(fixture: CalendarFixture, selectors: Selectors) -> Self {
        let stale_budget = fixture
            .weeks
            .iter()
            .enumerate()
            .flat_map(|(week, w)| {
                w.days
                    .iter()
                    .enumerate()
                    .map(move |(index, d)| ((week, index), d.stale_reads))
            })
            .collect();

        Self {
            state: Mutex::new(ReplayState {
                week: 0,
                generation: 0,
                loaded: false,
                cookie_banner: fixture.cookie_banner,
                stale_budget,
            }),
            fixture,
            selectors,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> SessionResult<MutexGuard<'_, ReplayState>> {
        self.state
            .lock()
            .map_err(|_| SessionError::transport("replay state poisoned"))
    }

    /// Locks the state after checking the connection and the handle's age.
    fn live(&self, element: Option<&ReplayElement>) -> SessionResult<MutexGuard<'_, ReplayState>> {
        let state = self.state()?;
        if self.fixture.disconnect_on_week == Some(state.week) {
            return Err(SessionError::transport("replayed browser disconnected"));
        }
        if !state.loaded {
            return Err(SessionError::transport("no page loaded"));
        }
        if let Some(generation) = element.and_then(ReplayElement::generation) {
            if generation != state.generation {
                return Err(SessionError::Stale);
            }
        }
        Ok(state)
    }

    fn day(&self, week: usize, index: usize) -> Option<&DayFixture> {
        self.fixture.weeks.get(week)?.days.get(index)
    }
}

#[async_trait]
impl BrowsingSession for ReplaySession {
    type Element = ReplayElement;

    async fn goto(&self, url: &str) -> SessionResult<()> {
        let mut state = self.state()?;
        tracing::debug!("replaying calendar for {}", url);
        state.loaded = true;
        state.week = 0;
        state.generation += 1;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> SessionResult<Vec<ReplayElement>> {
        let state = self.live(None)?;
        if selector != self.selectors.day {
            return Ok(Vec::new());
        }
        let count = self
            .fixture
            .weeks
            .get(state.week)
            .map(|w| w.days.len())
            .unwrap_or(0);
        Ok((0..count)
            .map(|index| ReplayElement::Day {
                generation: state.generation,
                index,
            })
            .collect())
    }

    async fn find_within(
        &self,
        parent: &ReplayElement,
        selector: &str,
    ) -> SessionResult<ReplayElement> {
        let state = self.live(Some(parent))?;
        match parent {
            ReplayElement::Day { generation, index } if selector == self.selectors.day_label => {
                match self.day(state.week, *index).and_then(|d| d.label.as_ref()) {
                    Some(_) => Ok(ReplayElement::Label {
                        generation: *generation,
                        index: *index,
                    }),
                    None => Err(SessionError::not_found(selector)),
                }
            }
            _ => Err(SessionError::not_found(selector)),
        }
    }

    async fn find_all_within(
        &self,
        parent: &ReplayElement,
        selector: &str,
    ) -> SessionResult<Vec<ReplayElement>> {
        let mut state = self.live(Some(parent))?;
        let ReplayElement::Day { generation, index } = parent else {
            return Ok(Vec::new());
        };
        if selector != self.selectors.slot {
            return Ok(Vec::new());
        }

        let week = state.week;
        if let Some(remaining) = state.stale_budget.get_mut(&(week, *index)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SessionError::Stale);
            }
        }

        let count = self.day(week, *index).map(|d| d.slots.len()).unwrap_or(0);
        Ok((0..count)
            .map(|slot| ReplayElement::Slot {
                generation: *generation,
                index: *index,
                slot,
            })
            .collect())
    }

    async fn wait_clickable(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> SessionResult<ReplayElement> {
        let state = self.live(None)?;
        let timeout = || SessionError::Timeout {
            selector: selector.to_string(),
        };

        if selector == self.selectors.next_page {
            if state.week + 1 < self.fixture.weeks.len() {
                return Ok(ReplayElement::NextButton {
                    generation: state.generation,
                });
            }
            return Err(timeout());
        }
        if selector == self.selectors.cookie_accept && state.cookie_banner {
            return Ok(ReplayElement::CookieButton);
        }
        Err(timeout())
    }

    async fn click(&self, element: &ReplayElement) -> SessionResult<()> {
        let mut state = self.live(Some(element))?;
        match element {
            ReplayElement::NextButton { .. } => {
                state.week += 1;
                state.generation += 1;
            }
            ReplayElement::CookieButton => state.cookie_banner = false,
            _ => {}
        }
        Ok(())
    }

    async fn force_click(&self, element: &ReplayElement) -> SessionResult<()> {
        self.click(element).await
    }

    async fn text(&self, element: &ReplayElement) -> SessionResult<String> {
        let state = self.live(Some(element))?;
        let text = match element {
            ReplayElement::Label { index, .. } => self
                .day(state.week, *index)
                .and_then(|d| d.label.clone())
                .unwrap_or_default(),
            ReplayElement::Slot { index, slot, .. } => self
                .day(state.week, *index)
                .and_then(|d| d.slots.get(*slot).cloned())
                .unwrap_or_default(),
            _ => String::new(),
        };
        Ok(text.trim().to_string())
    }

    async fn close(self) -> SessionResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens [`ReplaySession`]s over one fixture and counts teardowns.
pub struct ReplayFactory {
    fixture: CalendarFixture,
    selectors: Selectors,
    closed: Arc<AtomicUsize>,
}

impl ReplayFactory {
    pub fn new(fixture: CalendarFixture, selectors: Selectors) -> Self {
        Self {
            fixture,
            selectors,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions closed so far.
    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ReplayFactory {
    type Session = ReplaySession;

    async fn open(&self) -> SessionResult<ReplaySession> {
        let mut session = ReplaySession::new(self.fixture.clone(), self.selectors.clone());
        session.closed = Arc::clone(&self.closed);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(weeks: Vec<Vec<DayFixture>>) -> ReplaySession {
        ReplaySession::new(CalendarFixture::from_weeks(weeks), Selectors::default())
    }

    #[tokio::test]
    async fn test_handles_go_stale_after_pagination() {
        let selectors = Selectors::default();
        let session = session(vec![
            vec![DayFixture::new("14 jul", &["10:00"])],
            vec![DayFixture::new("21 jul", &["11:00"])],
        ]);
        session.goto("https://example.com").await.unwrap();

        let days = session.find_all(&selectors.day).await.unwrap();
        let next = session
            .wait_clickable(&selectors.next_page, Duration::from_secs(1))
            .await
            .unwrap();
        session.force_click(&next).await.unwrap();

        let result = session.find_within(&days[0], &selectors.day_label).await;
        assert_eq!(result, Err(SessionError::Stale));

        let fresh = session.find_all(&selectors.day).await.unwrap();
        let label = session
            .find_within(&fresh[0], &selectors.day_label)
            .await
            .unwrap();
        assert_eq!(session.text(&label).await.unwrap(), "21 jul");
    }

    #[tokio::test]
    async fn test_last_week_has_no_next_control() {
        let selectors = Selectors::default();
        let session = session(vec![vec![DayFixture::new("14 jul", &["10:00"])]]);
        session.goto("https://example.com").await.unwrap();

        let result = session
            .wait_clickable(&selectors.next_page, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(SessionError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_stale_budget_is_consumed() {
        let selectors = Selectors::default();
        let session = session(vec![vec![
            DayFixture::new("14 jul", &["10:00"]).with_stale_reads(1)
        ]]);
        session.goto("https://example.com").await.unwrap();

        let days = session.find_all(&selectors.day).await.unwrap();
        assert_eq!(
            session.find_all_within(&days[0], &selectors.slot).await,
            Err(SessionError::Stale)
        );
        assert_eq!(
            session
                .find_all_within(&days[0], &selectors.slot)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_fixture_parses_from_json() {
        let fixture: CalendarFixture = serde_json::from_str(
            r#"{
                "weeks": [
                    {"days": [{"label": "14 jul", "slots": ["10:00"]}, {"slots": []}]}
                ],
                "cookie_banner": true
            }"#,
        )
        .unwrap();

        assert!(fixture.cookie_banner);
        assert_eq!(fixture.weeks[0].days.len(), 2);
        assert_eq!(fixture.weeks[0].days[1].label, None);
        assert_eq!(fixture.disconnect_on_week, None);
    }

    #[test]
    fn test_fixture_rejects_unknown_keys() {
        let result = serde_json::from_str::<CalendarFixture>(
            r#"{"weeks": [{"days": []}], "has_next": true}"#,
        );
        assert!(result.is_err());

        let result = serde_json::from_str::<CalendarFixture>(
            r#"{"weeks": [{"days": [{"label": "14 jul", "slot": ["10:00"]}]}]}"#,
        );
        assert!(result.is_err());
    }
}
