use {
    super::{
        AllocationError,
        AllocationResult,
        ClientError,
        ConfigError,
        IdSource,
        ProtocolError,
        Range,
        RangeClient,
        RangeStatus,
        TransportError,
        range::LeasedRange,
    },
    async_trait::async_trait,
    parking_lot::RwLock,
    std::{future::Future, sync::Arc, time::Duration},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

/// Per-instance allocation settings.
///
/// Fixed at construction, never altered afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeManagerConfig {
    /// Identity presented to the authority.
    pub service_id: String,

    /// Number of ids requested per lease.
    pub range_size: i64,

    /// Optional placement hint forwarded with lease requests.
    pub region: Option<String>,

    /// Deadline for every remote call made by the manager.
    pub lease_timeout: Option<Duration>,
}

impl RangeManagerConfig {
    /// Default lease width.
    pub const DEFAULT_RANGE_SIZE: i64 = 1000;

    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            range_size: Self::DEFAULT_RANGE_SIZE,
            region: None,
            lease_timeout: None,
        }
    }

    /// Checks the settings can be presented to the authority.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_id.trim().is_empty() {
            return Err(ConfigError::EmptyServiceId);
        }
        if self.range_size <= 0 {
            return Err(ConfigError::NonPositiveRangeSize(self.range_size));
        }
        Ok(())
    }
}

/// Hands out unique ids from ranges leased from a remote authority.
///
/// Ids are claimed lock-free from the current range; the authority is only
/// contacted when the range runs out. Exhaustion handling (report the old
/// range, lease a new one, install it) happens under a single async lock, so
/// concurrent callers that notice exhaustion at the same time result in one
/// report and one lease.
///
/// Remote failures leave the manager exactly as it was before the failing
/// call, and the next [`next_id`](Self::next_id) starts over.
pub struct RangeManager<C> {
    client: C,
    config: RangeManagerConfig,

    /// Currently held range. Write-locked only to swap in a new range.
    current: RwLock<Option<Arc<LeasedRange>>>,

    /// Serializes rollovers. Held across the remote calls.
    rollover: Mutex<()>,
}

impl<C: RangeClient> RangeManager<C> {
    /// Creates a manager that leases its first range lazily.
    pub fn new(client: C, config: RangeManagerConfig) -> AllocationResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            current: RwLock::new(None),
            rollover: Mutex::new(()),
        })
    }

    /// Returns the next unique id.
    ///
    /// Leases a range first if none is held or the held one is used up.
    /// Dropping the returned future mid-lease is safe: nothing is installed
    /// until the lease completes.
    pub async fn next_id(&self) -> AllocationResult<i64> {
        if let Some(id) = self.try_claim() {
            return Ok(id);
        }

        let _rollover = self.rollover.lock().await;

        // Another caller may have installed a fresh range while we waited.
        if let Some(id) = self.try_claim() {
            return Ok(id);
        }

        self.roll_over().await
    }

    /// Snapshot of the range currently held, if any.
    pub fn current_range(&self) -> Option<Range> {
        self.current.read().as_ref().map(|range| range.snapshot())
    }

    /// Manager settings.
    pub fn config(&self) -> &RangeManagerConfig {
        &self.config
    }

    /// Transport used by the manager.
    ///
    /// Hosts use it for readiness checks via
    /// [`health_check`](RangeClient::health_check).
    pub fn client(&self) -> &C {
        &self.client
    }

    fn try_claim(&self) -> Option<i64> {
        self.current.read().as_ref().and_then(|range| range.claim())
    }

    /// Reports the exhausted range (if not yet reported), leases a new one and
    /// claims its first id.
    ///
    /// Must be called with the rollover lock held.
    async fn roll_over(&self) -> AllocationResult<i64> {
        let previous = self.current.read().clone();
        if let Some(previous) = previous.as_deref() {
            if !previous.is_reported() {
                self.report_exhausted(previous).await?;
            }
        }

        let leased = self.lease().await?;
        let range = leased.range();
        info!(
            service_id = %self.config.service_id,
            range_id = %range.range_id,
            start_id = range.start_id,
            end_id = range.end_id,
            "Leased new id range"
        );

        // Claimed before publishing, so the leaser always gets the first id.
        let id = leased.claim().ok_or_else(|| {
            AllocationError::Lease(
                ProtocolError::InvertedBounds {
                    start_id: range.start_id,
                    end_id: range.end_id,
                }
                .into(),
            )
        })?;
        *self.current.write() = Some(Arc::new(leased));

        Ok(id)
    }

    async fn report_exhausted(&self, range: &LeasedRange) -> AllocationResult<()> {
        debug_assert!(range.is_exhausted());
        let range_id = range.range().range_id.clone();

        let result = self
            .remote(
                self.client
                    .report_status(&range_id, &self.config.service_id, RangeStatus::Exhausted),
            )
            .await;
        if let Err(source) = result {
            warn!(range_id = %range_id, error = %source, "Failed to report exhausted range");
            return Err(AllocationError::Report { range_id, source });
        }

        range.mark_reported();
        debug!(range_id = %range_id, "Reported range as exhausted");
        Ok(())
    }

    async fn lease(&self) -> AllocationResult<LeasedRange> {
        let config = &self.config;
        let result = self
            .remote(self.client.request_range(
                &config.service_id,
                config.range_size,
                config.region.as_deref(),
            ))
            .await
            .and_then(|range| range.validate(&config.service_id).map(|_| range));

        match result {
            Ok(range) => Ok(LeasedRange::new(range)),
            Err(err) => {
                warn!(service_id = %config.service_id, error = %err, "Failed to lease id range");
                Err(AllocationError::Lease(err))
            }
        }
    }

    /// Applies the configured deadline to a remote call.
    async fn remote<T>(
        &self,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        match self.config.lease_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => call.await,
        }
    }
}

#[async_trait]
impl<C: RangeClient> IdSource for RangeManager<C> {
    async fn next_id(&self) -> AllocationResult<i64> {
        RangeManager::next_id(self).await
    }

    fn current_range(&self) -> Option<Range> {
        RangeManager::current_range(self)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::ClientResult,
        std::{
            collections::VecDeque,
            sync::atomic::{AtomicUsize, Ordering},
        },
    };

    #[derive(Default)]
    struct StubClient {
        ranges: parking_lot::Mutex<VecDeque<ClientResult<Range>>>,
        leases: AtomicUsize,
        reports: AtomicUsize,
    }

    impl StubClient {
        fn with(ranges: Vec<ClientResult<Range>>) -> Self {
            Self {
                ranges: parking_lot::Mutex::new(ranges.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RangeClient for StubClient {
        async fn request_range(
            &self,
            _service_id: &str,
            _size: i64,
            _region: Option<&str>,
        ) -> ClientResult<Range> {
            self.leases.fetch_add(1, Ordering::SeqCst);
            self.ranges
                .lock()
                .pop_front()
                .unwrap_or(Err(ClientError::NotServing("no more ranges".into())))
        }

        async fn report_status(&self, _: &str, _: &str, _: RangeStatus) -> ClientResult<()> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn health_check(&self) -> ClientResult<()> {
            Ok(())
        }
    }

    fn range(range_id: &str, start_id: i64, end_id: i64) -> Range {
        Range {
            range_id: range_id.to_string(),
            start_id,
            end_id,
            service_id: "svc".to_string(),
            status: RangeStatus::Active,
        }
    }

    #[test]
    fn config_validation() {
        assert!(RangeManagerConfig::new("svc").validate().is_ok());
        assert_eq!(
            RangeManagerConfig::new("  ").validate(),
            Err(ConfigError::EmptyServiceId)
        );

        let mut config = RangeManagerConfig::new("svc");
        config.range_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveRangeSize(0)));
        assert!(RangeManager::new(StubClient::default(), config).is_err());
    }

    #[tokio::test]
    async fn lazy_first_lease() {
        let manager = RangeManager::new(
            StubClient::with(vec![Ok(range("a", 10, 12))]),
            RangeManagerConfig::new("svc"),
        )
        .unwrap();
        assert!(manager.current_range().is_none());
        assert_eq!(manager.client().leases.load(Ordering::SeqCst), 0);

        assert_eq!(manager.next_id().await.unwrap(), 10);
        assert_eq!(manager.next_id().await.unwrap(), 11);
        assert_eq!(manager.client().leases.load(Ordering::SeqCst), 1);

        let current = manager.current_range().unwrap();
        assert_eq!(current.range_id, "a");
        assert_eq!(current.start_id, 12);
        assert_eq!(current.end_id, 12);
    }

    #[tokio::test]
    async fn single_id_ranges() {
        let manager = RangeManager::new(
            StubClient::with(vec![Ok(range("a", 0, 0)), Ok(range("b", 5, 5))]),
            RangeManagerConfig::new("svc"),
        )
        .unwrap();

        assert_eq!(manager.next_id().await.unwrap(), 0);
        assert_eq!(manager.next_id().await.unwrap(), 5);
        assert_eq!(manager.client().reports.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current_range().unwrap().status, RangeStatus::Exhausted);
    }

    #[tokio::test]
    async fn foreign_range_is_not_installed() {
        let mut foreign = range("x", 0, 9);
        foreign.service_id = "someone-else".to_string();
        let manager = RangeManager::new(
            StubClient::with(vec![Ok(foreign)]),
            RangeManagerConfig::new("svc"),
        )
        .unwrap();

        let err = manager.next_id().await.unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Lease(ClientError::Protocol(ProtocolError::ForeignRange { .. }))
        ));
        assert!(err.is_protocol());
        assert!(manager.current_range().is_none());
    }
}
