use {
    super::{AllocationResult, AllocatorConfig, GrpcClient, RangeClient, RangeManager, RangeManagerConfig},
    std::time::Duration,
};

/// Range manager builder.
pub struct RangeManagerBuilder<C>(C, RangeManagerConfig);

impl<C: RangeClient> RangeManagerBuilder<C> {
    /// Create new builder leasing ranges for `service_id` through `client`.
    pub fn new(client: C, service_id: impl Into<String>) -> Self {
        Self(client, RangeManagerConfig::new(service_id))
    }

    /// Create new builder from complete settings.
    pub fn with_config(client: C, config: RangeManagerConfig) -> Self {
        Self(client, config)
    }

    /// Number of ids requested per lease.
    pub fn with_range_size(mut self, range_size: i64) -> Self {
        self.1.range_size = range_size;
        self
    }

    /// Placement hint forwarded to the authority.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.1.region = Some(region.into());
        self
    }

    /// Deadline for every remote call made by the manager.
    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.1.lease_timeout = Some(timeout);
        self
    }

    /// Build the range manager.
    ///
    /// Fails if the service id is empty or the range size is not positive.
    pub fn build(self) -> AllocationResult<RangeManager<C>> {
        RangeManager::new(self.0, self.1)
    }
}

impl RangeManagerBuilder<GrpcClient> {
    /// Connect to the authority described by `config` and build a manager on
    /// top of the connection.
    pub async fn connect(config: &AllocatorConfig) -> AllocationResult<RangeManager<GrpcClient>> {
        config.validate()?;
        let client = GrpcClient::connect(&config.client_config())
            .await
            .map_err(super::AllocationError::Lease)?;
        Self::with_config(client, config.manager_config()).build()
    }
}
