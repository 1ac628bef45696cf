use crate::config::settings::{Selectors, Timing};
use crate::domain::model::DayReading;
use crate::domain::ports::{BrowsingSession, SessionResult};
use crate::utils::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The day has no label or no bookable slot.
    Empty,
    /// The day could not be found again after going stale.
    Vanished,
    /// Every read attempt hit a stale element.
    StillStale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(DayReading),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub extraction: Extraction,
    pub stale_retries: usize,
}

impl ExtractOutcome {
    fn new(extraction: Extraction, stale_retries: usize) -> Self {
        Self {
            extraction,
            stale_retries,
        }
    }
}

/// Reads one calendar day, retrying when the page replaces the day's node
/// underneath us.
pub struct SlotExtractor<'a> {
    selectors: &'a Selectors,
    timing: &'a Timing,
}

impl<'a> SlotExtractor<'a> {
    pub fn new(selectors: &'a Selectors, timing: &'a Timing) -> Self {
        Self { selectors, timing }
    }

    /// `ordinal` is the position of `day` in the enumeration it came from.
    ///
    /// Stale reads are retried with a freshly located day. `NotFound` and
    /// transport errors are returned to the caller.
    pub async fn extract<S: BrowsingSession>(
        &self,
        session: &S,
        day: S::Element,
        ordinal: usize,
    ) -> SessionResult<ExtractOutcome> {
        let attempts = self.timing.stale_attempts.max(1);
        let mut day = day;
        let mut known_label: Option<String> = None;
        let mut retries = 0;

        for attempt in 1..=attempts {
            match self.read_day(session, &day, &mut known_label).await {
                Ok(Some(reading)) => {
                    return Ok(ExtractOutcome::new(Extraction::Found(reading), retries));
                }
                Ok(None) => {
                    return Ok(ExtractOutcome::new(
                        Extraction::Skipped(SkipReason::Empty),
                        retries,
                    ));
                }
                Err(SessionError::Stale) if attempt < attempts => {
                    retries += 1;
                    tracing::warn!(
                        "   ... stale element on day {}, retrying ({}/{})",
                        ordinal + 1,
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(self.timing.stale_retry_delay).await;

                    match self
                        .reacquire(session, ordinal, known_label.as_deref())
                        .await?
                    {
                        Some(fresh) => day = fresh,
                        None => {
                            tracing::debug!("day {} is gone from the page", ordinal + 1);
                            return Ok(ExtractOutcome::new(
                                Extraction::Skipped(SkipReason::Vanished),
                                retries,
                            ));
                        }
                    }
                }
                Err(SessionError::Stale) => {
                    tracing::warn!(
                        "   ... day {} still stale after {} attempts, skipping",
                        ordinal + 1,
                        attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ExtractOutcome::new(
            Extraction::Skipped(SkipReason::StillStale),
            retries,
        ))
    }

    async fn read_day<S: BrowsingSession>(
        &self,
        session: &S,
        day: &S::Element,
        known_label: &mut Option<String>,
    ) -> SessionResult<Option<DayReading>> {
        let label_element = session.find_within(day, &self.selectors.day_label).await?;
        let label = session.text(&label_element).await?;
        if !label.is_empty() {
            *known_label = Some(label.clone());
        }

        let slots = session.find_all_within(day, &self.selectors.slot).await?;
        let mut times = Vec::with_capacity(slots.len());
        for slot in &slots {
            let text = session.text(slot).await?;
            let text = text.trim();
            if !text.is_empty() {
                times.push(text.to_string());
            }
        }

        if label.is_empty() || times.is_empty() {
            return Ok(None);
        }

        Ok(Some(DayReading { label, times }))
    }

    /// Finds the day again in a fresh enumeration. Matches on the label when
    /// one was read, otherwise on position.
    async fn reacquire<S: BrowsingSession>(
        &self,
        session: &S,
        ordinal: usize,
        known_label: Option<&str>,
    ) -> SessionResult<Option<S::Element>> {
        let days = session.find_all(&self.selectors.day).await?;

        let Some(label) = known_label else {
            return Ok(days.into_iter().nth(ordinal));
        };

        for candidate in days {
            match self.label_of(session, &candidate).await {
                Ok(text) if text == label => return Ok(Some(candidate)),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            }
        }

        Ok(None)
    }

    async fn label_of<S: BrowsingSession>(
        &self,
        session: &S,
        day: &S::Element,
    ) -> SessionResult<String> {
        let label_element = session.find_within(day, &self.selectors.day_label).await?;
        session.text(&label_element).await
    }
}
