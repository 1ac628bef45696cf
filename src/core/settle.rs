use crate::config::settings::{Selectors, Timing};
use crate::domain::ports::{BrowsingSession, SessionResult};
use crate::utils::error::SessionError;
use tokio::time::Instant;

/// Waits for a freshly paginated calendar to stop changing before it is read.
///
/// A page counts as settled once its day labels differ from the previous
/// page and two consecutive polls agree. The wait is bounded; on timeout the
/// page is read as it is.
pub struct PageSettler<'a> {
    selectors: &'a Selectors,
    timing: &'a Timing,
    previous: Option<Vec<String>>,
}

impl<'a> PageSettler<'a> {
    pub fn new(selectors: &'a Selectors, timing: &'a Timing) -> Self {
        Self {
            selectors,
            timing,
            previous: None,
        }
    }

    /// Returns the day elements of the settled page, enumerated fresh.
    pub async fn settle<S: BrowsingSession>(
        &mut self,
        session: &S,
    ) -> SessionResult<Vec<S::Element>> {
        let deadline = Instant::now() + self.timing.settle_timeout;
        let mut last_seen: Option<Vec<String>> = None;

        loop {
            let days = self.enumerate(session).await?;
            let signature = self.signature(session, &days).await?;

            if let Some(signature) = signature {
                let changed = self.previous.as_ref() != Some(&signature);
                if changed && last_seen.as_ref() == Some(&signature) {
                    tracing::debug!("page settled with {} day(s)", days.len());
                    self.previous = Some(signature);
                    return Ok(days);
                }
                last_seen = Some(signature);
            } else {
                last_seen = None;
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    "page did not settle within {:?}, reading it as is",
                    self.timing.settle_timeout
                );
                if last_seen.is_some() {
                    self.previous = last_seen;
                }
                return Ok(days);
            }

            tokio::time::sleep(self.timing.settle_poll).await;
        }
    }

    async fn enumerate<S: BrowsingSession>(&self, session: &S) -> SessionResult<Vec<S::Element>> {
        match session.find_all(&self.selectors.day).await {
            Ok(days) => Ok(days),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Labels of `days` in order, or `None` while the page is still mutating.
    async fn signature<S: BrowsingSession>(
        &self,
        session: &S,
        days: &[S::Element],
    ) -> SessionResult<Option<Vec<String>>> {
        let mut labels = Vec::with_capacity(days.len());
        for day in days {
            let label = match session.find_within(day, &self.selectors.day_label).await {
                Ok(element) => session.text(&element).await,
                Err(e) => Err(e),
            };
            match label {
                Ok(text) => labels.push(text),
                Err(SessionError::NotFound { .. }) => labels.push(String::new()),
                Err(SessionError::Stale) => return Ok(None),
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => return Ok(None),
            }
        }
        Ok(Some(labels))
    }
}
