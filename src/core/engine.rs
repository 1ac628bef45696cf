use crate::config::settings::ScrapeSettings;
use crate::core::normalizer::DateNormalizer;
use crate::core::scanner::CalendarScanner;
use crate::core::store::ResultStore;
use crate::domain::model::{PersistReport, ScanReport, StopReason};
use crate::domain::ports::{
    BrowsingSession, ConfigProvider, SessionFactory, SessionResult, Storage,
};
use crate::utils::error::{Result, ScrapeError};
use std::future::Future;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scan: ScanReport,
    pub persist: PersistReport,
}

/// Runs one scrape: browse the calendar, close the browser, write the file.
///
/// The browser is closed on every path out of the browsing phase, and an
/// output file is written even when browsing fails.
pub struct ScrapeEngine<F: SessionFactory, S: Storage> {
    factory: F,
    store: ResultStore<S>,
    settings: ScrapeSettings,
}

impl<F: SessionFactory, S: Storage> ScrapeEngine<F, S> {
    pub fn new(factory: F, storage: S, settings: ScrapeSettings) -> Self {
        let store = ResultStore::new(
            storage,
            DateNormalizer::new(settings.months.clone()),
            settings.output_path(),
        );
        Self {
            factory,
            store,
            settings,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), but stops browsing as soon as `shutdown`
    /// completes. The browser is still closed and the days read so far are
    /// still written.
    pub async fn run_until<Fut>(&self, shutdown: Fut) -> Result<RunSummary>
    where
        Fut: Future<Output = ()>,
    {
        tracing::info!("🤖 Starting the calendar scraper for {}", self.settings.target_url());
        let today = self.settings.today();

        let session = match self.factory.open().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("❌ Could not start a browser session: {}", e);
                self.store.persist(&ScanReport::lost(e.to_string()).slots, today).await?;
                return Err(e.into());
            }
        };

        let scan = self.browse(session, shutdown).await;
        tracing::info!(
            "📊 Visited {} week(s), {} day(s) with slots, {} skipped, {} stale retries",
            scan.pages_visited,
            scan.days_read,
            scan.days_skipped,
            scan.stale_retries
        );

        let persist = self.store.persist(&scan.slots, today).await?;

        match &scan.stop_reason {
            StopReason::SessionLost(message) => Err(ScrapeError::PartialScanError {
                message: message.clone(),
            }),
            StopReason::Interrupted => Err(ScrapeError::PartialScanError {
                message: "interrupted before every week was read".to_string(),
            }),
            _ => Ok(RunSummary { scan, persist }),
        }
    }

    async fn browse<Fut>(&self, session: F::Session, shutdown: Fut) -> ScanReport
    where
        Fut: Future<Output = ()>,
    {
        let mut report = ScanReport::new();

        let interrupted = tokio::select! {
            _ = self.visit(&session, &mut report) => false,
            _ = shutdown => true,
        };
        if interrupted {
            tracing::warn!("🛑 Interrupted, closing the browser and saving what was read");
            report.stop_reason = StopReason::Interrupted;
        }

        match session.close().await {
            Ok(()) => tracing::info!("✅ Scraping finished, browser closed."),
            Err(e) => tracing::warn!("⚠️ Browser did not close cleanly: {}", e),
        }

        report
    }

    async fn visit<B: BrowsingSession>(&self, session: &B, report: &mut ScanReport) {
        if let Err(e) = session.goto(self.settings.target_url()).await {
            tracing::error!("❌ Could not open {}: {}", self.settings.target_url(), e);
            report.stop_reason = StopReason::SessionLost(e.to_string());
            return;
        }

        if let Err(e) = self.accept_cookies(session).await {
            tracing::error!("❌ Browser session lost on the cookie banner: {}", e);
            report.stop_reason = StopReason::SessionLost(e.to_string());
            return;
        }

        CalendarScanner::new(
            &self.settings.selectors,
            &self.settings.timing,
            self.settings.page_count(),
        )
        .scan_into(session, report)
        .await
    }

    /// A banner that never shows up is assumed to be already dismissed.
    async fn accept_cookies<B: BrowsingSession>(&self, session: &B) -> SessionResult<()> {
        let banner = session
            .wait_clickable(
                &self.settings.selectors.cookie_accept,
                self.settings.timing.wait_timeout,
            )
            .await;

        let outcome = match banner {
            Ok(button) => session.click(&button).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => tracing::info!("🍪 Cookies accepted."),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::info!("🍪 No cookie banner found or it was already accepted.");
                tracing::debug!("cookie banner: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::replay::{CalendarFixture, DayFixture, ReplayFactory};
    use crate::config::settings::Timing;
    use crate::utils::error::SessionError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_json(&self, path: &str) -> Option<serde_json::Value> {
            let files = self.files.lock().await;
            files
                .get(path)
                .map(|data| serde_json::from_slice(data).unwrap())
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn describe(&self, path: &str) -> String {
            path.to_string()
        }
    }

    struct UnreachableDriver;

    #[async_trait]
    impl SessionFactory for UnreachableDriver {
        type Session = crate::adapters::replay::ReplaySession;

        async fn open(&self) -> SessionResult<Self::Session> {
            Err(SessionError::transport("connection refused"))
        }
    }

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            target_url: "https://example.com/calendar".to_string(),
            output_path: "api/horarios.json".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 12, 15),
            timing: Timing {
                wait_timeout: Duration::from_millis(10),
                settle_poll: Duration::from_millis(1),
                settle_timeout: Duration::from_millis(50),
                stale_retry_delay: Duration::from_millis(1),
                stale_attempts: 3,
            },
            ..ScrapeSettings::default()
        }
    }

    fn december_fixture() -> CalendarFixture {
        let mut fixture = CalendarFixture::from_weeks(vec![
            vec![DayFixture::new("20 dic", &["09:00"])],
            vec![DayFixture::new("05 ene", &["10:00"])],
        ]);
        fixture.cookie_banner = true;
        fixture
    }

    #[tokio::test]
    async fn test_run_writes_sorted_output_and_closes_browser() {
        let settings = settings();
        let factory = ReplayFactory::new(december_fixture(), settings.selectors.clone());
        let storage = MockStorage::new();
        let engine = ScrapeEngine::new(factory, storage.clone(), settings);

        let summary = engine.run().await.unwrap();

        assert_eq!(summary.persist.written, 2);
        assert_eq!(summary.scan.stop_reason, StopReason::PaginationUnavailable);
        assert_eq!(engine.factory.closed_sessions(), 1);
        assert_eq!(
            storage.get_json("api/horarios.json").await.unwrap(),
            serde_json::json!([
                {"fecha": "2024-12-20", "horas": ["09:00"]},
                {"fecha": "2025-01-05", "horas": ["10:00"]}
            ])
        );
    }

    #[tokio::test]
    async fn test_unreachable_driver_still_writes_empty_file() {
        let storage = MockStorage::new();
        let engine = ScrapeEngine::new(UnreachableDriver, storage.clone(), settings());

        let result = engine.run().await;

        assert!(matches!(
            result,
            Err(ScrapeError::SessionError(SessionError::Transport { .. }))
        ));
        assert_eq!(
            storage.get_json("api/horarios.json").await.unwrap(),
            serde_json::json!([])
        );
    }

    #[tokio::test]
    async fn test_interrupt_closes_browser_and_saves_partial_results() {
        let settings = ScrapeSettings {
            timing: Timing {
                stale_retry_delay: Duration::from_secs(30),
                ..settings().timing
            },
            ..settings()
        };
        let fixture = CalendarFixture::from_weeks(vec![
            vec![DayFixture::new("20 dic", &["09:00"])],
            vec![DayFixture::new("27 dic", &["10:00"]).with_stale_reads(3)],
        ]);
        let factory = ReplayFactory::new(fixture, settings.selectors.clone());
        let storage = MockStorage::new();
        let engine = ScrapeEngine::new(factory, storage.clone(), settings);

        let result = engine
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(matches!(result, Err(ScrapeError::PartialScanError { .. })));
        assert_eq!(engine.factory.closed_sessions(), 1);
        assert_eq!(
            storage.get_json("api/horarios.json").await.unwrap(),
            serde_json::json!([{"fecha": "2024-12-20", "horas": ["09:00"]}])
        );
    }

    #[tokio::test]
    async fn test_session_loss_saves_partial_results_then_fails() {
        let settings = settings();
        let mut fixture = december_fixture();
        fixture.disconnect_on_week = Some(1);
        let factory = ReplayFactory::new(fixture, settings.selectors.clone());
        let storage = MockStorage::new();
        let engine = ScrapeEngine::new(factory, storage.clone(), settings);

        let result = engine.run().await;

        assert!(matches!(result, Err(ScrapeError::PartialScanError { .. })));
        assert_eq!(engine.factory.closed_sessions(), 1);
        assert_eq!(
            storage.get_json("api/horarios.json").await.unwrap(),
            serde_json::json!([{"fecha": "2024-12-20", "horas": ["09:00"]}])
        );
    }
}
