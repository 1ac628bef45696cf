use crate::config::settings::{Selectors, Timing};
use crate::core::extractor::{Extraction, SlotExtractor};
use crate::core::settle::PageSettler;
use crate::domain::model::{ScanReport, StopReason};
use crate::domain::ports::{BrowsingSession, SessionResult};

/// Walks the weekly pages of the booking calendar and collects every day
/// with bookable slots.
///
/// Nothing that goes wrong on a single day stops the scan. A missing
/// next-page control ends pagination early, and a dead session ends the scan
/// with whatever was collected so far.
pub struct CalendarScanner<'a> {
    selectors: &'a Selectors,
    timing: &'a Timing,
    page_count: usize,
}

impl<'a> CalendarScanner<'a> {
    pub fn new(selectors: &'a Selectors, timing: &'a Timing, page_count: usize) -> Self {
        Self {
            selectors,
            timing,
            page_count,
        }
    }

    pub async fn scan<S: BrowsingSession>(&self, session: &S) -> ScanReport {
        let mut report = ScanReport::new();
        self.scan_into(session, &mut report).await;
        report
    }

    /// Fills `report` as pages are read, so a caller that abandons the scan
    /// midway still holds everything collected up to that point.
    pub async fn scan_into<S: BrowsingSession>(&self, session: &S, report: &mut ScanReport) {
        let extractor = SlotExtractor::new(self.selectors, self.timing);
        let mut settler = PageSettler::new(self.selectors, self.timing);

        for page in 0..self.page_count {
            tracing::info!("🔍 Analyzing week {}...", page + 1);

            if let Err(e) = self
                .scan_page(session, &extractor, &mut settler, report)
                .await
            {
                tracing::error!("❌ Browser session lost on week {}: {}", page + 1, e);
                report.stop_reason = StopReason::SessionLost(e.to_string());
                return;
            }
            report.pages_visited += 1;

            if page + 1 == self.page_count {
                break;
            }

            match self.next_page(session).await {
                Ok(()) => tracing::info!("   ➡️  Moving on to the next week..."),
                Err(e) if e.is_fatal() => {
                    tracing::error!("❌ Browser session lost while paginating: {}", e);
                    report.stop_reason = StopReason::SessionLost(e.to_string());
                    return;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Could not find the next-week control: {}", e);
                    report.stop_reason = StopReason::PaginationUnavailable;
                    return;
                }
            }
        }
    }

    /// Only fatal session errors escape.
    async fn scan_page<S: BrowsingSession>(
        &self,
        session: &S,
        extractor: &SlotExtractor<'_>,
        settler: &mut PageSettler<'_>,
        report: &mut ScanReport,
    ) -> SessionResult<()> {
        let days = settler.settle(session).await?;
        tracing::debug!("{} available day(s) on this page", days.len());

        for (ordinal, day) in days.into_iter().enumerate() {
            let outcome = match extractor.extract(session, day, ordinal).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!("skipping day {}: {}", ordinal + 1, e);
                    report.days_skipped += 1;
                    continue;
                }
            };
            report.stale_retries += outcome.stale_retries;

            match outcome.extraction {
                Extraction::Found(reading) => {
                    report.days_read += 1;
                    let count = reading.times.len();
                    let label = reading.label.clone();
                    if report.slots.insert_if_absent(reading.label, reading.times) {
                        tracing::info!("   -> Found {} slot(s) for {}", count, label);
                    } else {
                        tracing::debug!("{} already recorded, keeping first reading", label);
                    }
                }
                Extraction::Skipped(reason) => {
                    tracing::debug!("skipping day {}: {:?}", ordinal + 1, reason);
                    report.days_skipped += 1;
                }
            }
        }

        Ok(())
    }

    async fn next_page<S: BrowsingSession>(&self, session: &S) -> SessionResult<()> {
        let button = session
            .wait_clickable(&self.selectors.next_page, self.timing.wait_timeout)
            .await?;
        session.force_click(&button).await
    }
}
