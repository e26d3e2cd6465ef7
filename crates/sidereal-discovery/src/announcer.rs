//! Periodic re-announcement of this node's services.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::announcement::{DiscoveryAnnouncementClient, DEFAULT_DELAY, MIN_DELAY};
use crate::config::DiscoveryConfig;
use crate::error::AnnouncerError;
use crate::types::ServiceAnnouncement;

/// Observable lifecycle of an [`Announcer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncerState {
    /// Created but never started; nothing has been published.
    NotStarted,
    /// The publishing task is running.
    Running,
    /// Destroyed; the announcer cannot be started again.
    Destroyed,
}

enum Lifecycle {
    NotStarted,
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Destroyed,
}

impl Lifecycle {
    const fn state(&self) -> AnnouncerState {
        match self {
            Self::NotStarted => AnnouncerState::NotStarted,
            Self::Running { .. } => AnnouncerState::Running,
            Self::Destroyed => AnnouncerState::Destroyed,
        }
    }
}

/// State shared between the announcer handle and its publishing task.
#[derive(Debug)]
struct Shared {
    client: Arc<dyn DiscoveryAnnouncementClient>,
    announcements: DashMap<Uuid, ServiceAnnouncement>,
    wake: Notify,
    default_delay: Duration,
    min_delay: Duration,
}

impl Shared {
    fn snapshot(&self) -> Vec<ServiceAnnouncement> {
        self.announcements
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Publish the current set once and return the delay before the next publish.
    ///
    /// A registry max-age below `min_delay` is raised to it.
    async fn publish(&self) -> Duration {
        let services = self.snapshot();
        match self.client.announce(&services).await {
            Ok(max_age) => {
                let delay = max_age.max(self.min_delay);
                debug!(
                    services = services.len(),
                    next_in_secs = delay.as_secs_f64(),
                    "services announced"
                );
                delay
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_in_secs = self.default_delay.as_secs(),
                    "service announcement failed"
                );
                self.default_delay
            }
        }
    }

    async fn run(self: Arc<Self>, mut delay: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
                () = self.wake.notified() => debug!("forced announcement"),
            }
            delay = self.publish().await;
        }
        debug!("announcement task stopped");
    }
}

/// Keeps this node's service announcements registered.
///
/// After [`start`](Self::start) a single background task republishes the
/// full announcement set whenever the registry's max-age elapses, so the
/// registry never sees overlapping publishes from one node. Announcements can
/// be added or removed at any time and are picked up by the next cycle.
///
/// [`destroy`](Self::destroy) stops the task and withdraws the node's
/// announcement. Dropping a running announcer stops the task but cannot
/// withdraw; call `destroy` for a clean shutdown.
pub struct Announcer {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for Announcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Announcer")
            .field("announcements", &self.shared.announcements.len())
            .field("default_delay", &self.shared.default_delay)
            .field("min_delay", &self.shared.min_delay)
            .finish_non_exhaustive()
    }
}

impl Announcer {
    /// Create an announcer that will publish `announcements` once started.
    pub fn new(
        client: Arc<dyn DiscoveryAnnouncementClient>,
        announcements: impl IntoIterator<Item = ServiceAnnouncement>,
    ) -> Self {
        Self::with_default_delay(client, announcements, DEFAULT_DELAY)
    }

    /// Like [`new`](Self::new), retrying failed publishes after `default_delay`.
    pub fn with_default_delay(
        client: Arc<dyn DiscoveryAnnouncementClient>,
        announcements: impl IntoIterator<Item = ServiceAnnouncement>,
        default_delay: Duration,
    ) -> Self {
        Self::with_delays(client, announcements, default_delay, MIN_DELAY)
    }

    /// Create an announcer whose retry delay and publish floor come from `config`.
    pub fn from_config(
        client: Arc<dyn DiscoveryAnnouncementClient>,
        announcements: impl IntoIterator<Item = ServiceAnnouncement>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self::with_delays(
            client,
            announcements,
            config.announce_default_delay(),
            config.announce_min_delay(),
        )
    }

    fn with_delays(
        client: Arc<dyn DiscoveryAnnouncementClient>,
        announcements: impl IntoIterator<Item = ServiceAnnouncement>,
        default_delay: Duration,
        min_delay: Duration,
    ) -> Self {
        let announcements = announcements
            .into_iter()
            .map(|announcement| (announcement.id(), announcement))
            .collect();

        Self {
            shared: Arc::new(Shared {
                client,
                announcements,
                wake: Notify::new(),
                default_delay,
                min_delay,
            }),
            lifecycle: Mutex::new(Lifecycle::NotStarted),
        }
    }

    /// Publish the announcements and keep them published.
    ///
    /// The first publish completes before this returns. Starting a running
    /// announcer does nothing; starting a destroyed one is an error.
    pub async fn start(&self) -> Result<(), AnnouncerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Destroyed => return Err(AnnouncerError::Destroyed),
        }

        let delay = self.shared.publish().await;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&self.shared).run(delay, cancel.clone()));
        *lifecycle = Lifecycle::Running { cancel, task };

        info!(
            services = self.shared.announcements.len(),
            "announcer started"
        );
        Ok(())
    }

    /// Stop publishing and withdraw this node's announcement.
    ///
    /// Safe to call repeatedly. An announcer that was never started makes no
    /// registry call. Withdrawal failures are logged.
    pub async fn destroy(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Lifecycle::Running { cancel, task } =
            std::mem::replace(&mut *lifecycle, Lifecycle::Destroyed)
        else {
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "announcement task ended abnormally");
        }

        if let Err(e) = self.shared.client.unannounce().await {
            warn!(error = %e, "failed to withdraw announcement");
        }
        info!("announcer destroyed");
    }

    /// Add (or replace, by id) an announcement. Published on the next cycle.
    pub fn add_service_announcement(&self, announcement: ServiceAnnouncement) {
        self.shared
            .announcements
            .insert(announcement.id(), announcement);
    }

    /// Remove an announcement by id. Unknown ids are ignored.
    pub fn remove_service_announcement(&self, id: Uuid) {
        self.shared.announcements.remove(&id);
    }

    /// Snapshot of the current announcement set.
    pub fn service_announcements(&self) -> Vec<ServiceAnnouncement> {
        self.shared.snapshot()
    }

    /// Publish now instead of waiting for the current delay to elapse.
    ///
    /// A request made before `start` is honoured once the publishing task runs.
    pub fn force_announce(&self) {
        self.shared.wake.notify_one();
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> AnnouncerState {
        self.lifecycle.lock().await.state()
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = self.lifecycle.get_mut() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails every announce when asked to.
    #[derive(Debug, Default)]
    struct CountingClient {
        announces: AtomicUsize,
        unannounces: AtomicUsize,
        fail: bool,
        max_age: Option<Duration>,
    }

    #[async_trait]
    impl DiscoveryAnnouncementClient for CountingClient {
        async fn announce(&self, _: &[ServiceAnnouncement]) -> Result<Duration> {
            self.announces.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DiscoveryError::AnnouncementStatus {
                    status: 503,
                    body: "unavailable".to_owned(),
                });
            }
            Ok(self.max_age.unwrap_or(Duration::from_secs(60)))
        }

        async fn unannounce(&self) -> Result<()> {
            self.unannounces.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn announcement() -> ServiceAnnouncement {
        ServiceAnnouncement::builder("foo").property("a", "apple").build()
    }

    #[tokio::test]
    async fn destroy_without_start_makes_no_calls() {
        let client = Arc::new(CountingClient::default());
        let announcer = Announcer::new(client.clone(), [announcement()]);

        announcer.destroy().await;

        assert_eq!(client.announces.load(Ordering::SeqCst), 0);
        assert_eq!(client.unannounces.load(Ordering::SeqCst), 0);
        assert_eq!(announcer.state().await, AnnouncerState::Destroyed);
        assert_eq!(announcer.start().await, Err(AnnouncerError::Destroyed));
    }

    #[tokio::test]
    async fn start_publishes_before_returning() {
        let client = Arc::new(CountingClient::default());
        let announcer = Announcer::new(client.clone(), [announcement()]);

        announcer.start().await.unwrap();
        assert_eq!(client.announces.load(Ordering::SeqCst), 1);
        assert_eq!(announcer.state().await, AnnouncerState::Running);

        announcer.destroy().await;
    }

    #[tokio::test]
    async fn destroy_unannounces_once() {
        let client = Arc::new(CountingClient::default());
        let announcer = Announcer::new(client.clone(), [announcement()]);

        announcer.start().await.unwrap();
        announcer.destroy().await;
        announcer.destroy().await;

        assert_eq!(client.unannounces.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_publish_retries_after_default_delay() {
        let client = Arc::new(CountingClient {
            fail: true,
            ..CountingClient::default()
        });
        let announcer =
            Announcer::with_default_delay(client.clone(), [announcement()], Duration::from_secs(5));

        announcer.start().await.unwrap();
        assert_eq!(client.announces.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(client.announces.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.announces.load(Ordering::SeqCst), 3);

        announcer.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_age_is_raised_to_min_delay() {
        let client = Arc::new(CountingClient {
            max_age: Some(Duration::ZERO),
            ..CountingClient::default()
        });
        let announcer = Announcer::new(client.clone(), [announcement()]);

        announcer.start().await.unwrap();
        tokio::time::sleep(MIN_DELAY / 2).await;
        assert_eq!(client.announces.load(Ordering::SeqCst), 1);

        tokio::time::sleep(MIN_DELAY).await;
        assert_eq!(client.announces.load(Ordering::SeqCst), 2);

        announcer.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn config_sets_retry_delay_and_floor() {
        let mut config = DiscoveryConfig::default();
        config.announce_default_delay_secs = 3;
        config.announce_min_delay_ms = 500;

        let failing = Arc::new(CountingClient {
            fail: true,
            ..CountingClient::default()
        });
        let retrying = Announcer::from_config(failing.clone(), [announcement()], &config);
        retrying.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(failing.announces.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(failing.announces.load(Ordering::SeqCst), 2);
        retrying.destroy().await;

        let eager = Arc::new(CountingClient {
            max_age: Some(Duration::from_millis(1)),
            ..CountingClient::default()
        });
        let floored = Announcer::from_config(eager.clone(), [announcement()], &config);
        floored.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(eager.announces.load(Ordering::SeqCst), 3);
        floored.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn force_announce_skips_the_wait() {
        let client = Arc::new(CountingClient::default());
        let announcer = Announcer::new(client.clone(), [announcement()]);

        announcer.start().await.unwrap();
        announcer.force_announce();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(client.announces.load(Ordering::SeqCst), 2);
        announcer.destroy().await;
    }

    #[tokio::test]
    async fn announcements_can_change_before_start() {
        let client = Arc::new(CountingClient::default());
        let first = announcement();
        let announcer = Announcer::new(client, [first.clone()]);

        let second = announcement();
        announcer.add_service_announcement(second.clone());
        announcer.remove_service_announcement(first.id());
        announcer.remove_service_announcement(Uuid::new_v4());

        assert_eq!(announcer.service_announcements(), vec![second]);
    }
}
