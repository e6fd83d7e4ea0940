pub mod grpc;
pub mod proto;

use {
    super::{ClientResult, Range, RangeStatus},
    async_trait::async_trait,
    std::{sync::Arc, time::Duration},
};

pub use grpc::GrpcClient;

/// Connection settings for the range authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Authority endpoint, e.g. `http://allocator:50051`.
    pub address: String,

    /// Upper bound on establishing the connection.
    pub dial_timeout: Duration,

    /// Deadline attached to every call, if any.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            dial_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

/// Transport to the remote range authority.
///
/// Every method is a single remote call: implementations neither retry nor
/// cache, so that the caller always knows whether a lease happened. Retry
/// policy belongs to [`RangeManager`](crate::RangeManager) or its host.
#[async_trait]
pub trait RangeClient: Send + Sync {
    /// Leases a new range of `size` ids for `service_id`.
    ///
    /// On success the range is exclusively owned by `service_id`.
    async fn request_range(
        &self,
        service_id: &str,
        size: i64,
        region: Option<&str>,
    ) -> ClientResult<Range>;

    /// Informs the authority that a range changed its status.
    async fn report_status(
        &self,
        range_id: &str,
        service_id: &str,
        status: RangeStatus,
    ) -> ClientResult<()>;

    /// Succeeds only if the authority is serving.
    async fn health_check(&self) -> ClientResult<()>;
}

#[async_trait]
impl<T: RangeClient + ?Sized> RangeClient for Arc<T> {
    async fn request_range(
        &self,
        service_id: &str,
        size: i64,
        region: Option<&str>,
    ) -> ClientResult<Range> {
        (**self).request_range(service_id, size, region).await
    }

    async fn report_status(
        &self,
        range_id: &str,
        service_id: &str,
        status: RangeStatus,
    ) -> ClientResult<()> {
        (**self).report_status(range_id, service_id, status).await
    }

    async fn health_check(&self) -> ClientResult<()> {
        (**self).health_check().await
    }
}
