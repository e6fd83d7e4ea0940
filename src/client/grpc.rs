//! gRPC transport to the range authority.

use {
    super::{
        ClientConfig,
        RangeClient,
        proto::{
            AllocateRangeRequest,
            AllocateRangeResponse,
            HealthResponse,
            RangeMessage,
            ServiceStatus,
            UpdateRangeStatusRequest,
        },
    },
    crate::{ClientError, ClientResult, ProtocolError, Range, RangeStatus, TransportError},
    async_trait::async_trait,
    std::time::Duration,
    tonic::{
        Request,
        client::Grpc,
        codec::ProstCodec,
        codegen::http::uri::PathAndQuery,
        transport::{Channel, Endpoint},
    },
    tracing::{debug, warn},
};

/// Request path of a method of `rangeallocator.v1.RangeAllocator`.
macro_rules! method_path {
    ($method:literal) => {
        concat!("/rangeallocator.v1.RangeAllocator/", $method)
    };
}

const ALLOCATE_RANGE: &str = method_path!("AllocateRange");
const UPDATE_RANGE_STATUS: &str = method_path!("UpdateRangeStatus");
const GET_HEALTH: &str = method_path!("GetHealth");

/// [`RangeClient`] speaking gRPC to a remote authority.
///
/// Cloning is cheap: clones share the underlying channel.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    inner: Grpc<Channel>,
    request_timeout: Option<Duration>,
}

impl GrpcClient {
    /// Connects to the authority, waiting at most `dial_timeout`.
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let endpoint = endpoint(config)?;
        let channel = tokio::time::timeout(config.dial_timeout, endpoint.connect())
            .await
            .map_err(|_| TransportError::Timeout(config.dial_timeout))?
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        debug!(address = %config.address, "Connected to range authority");
        Ok(Self::with_channel(channel, config.request_timeout))
    }

    /// Creates a client that connects on first use.
    pub fn connect_lazy(config: &ClientConfig) -> ClientResult<Self> {
        let channel = endpoint(config)?.connect_lazy();
        Ok(Self::with_channel(channel, config.request_timeout))
    }

    /// Wraps an already established channel.
    pub fn with_channel(channel: Channel, request_timeout: Option<Duration>) -> Self {
        Self {
            inner: Grpc::new(channel),
            request_timeout,
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> ClientResult<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let mut request = Request::new(message);
        if let Some(timeout) = self.request_timeout {
            request.set_timeout(timeout);
        }

        let call = grpc.unary(
            request,
            PathAndQuery::from_static(path),
            ProstCodec::<Req, Resp>::default(),
        );
        let response = match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => call.await,
        };

        response.map(|r| r.into_inner()).map_err(|status| {
            warn!(path, code = ?status.code(), message = status.message(), "Range authority call failed");
            TransportError::from(status).into()
        })
    }
}

fn endpoint(config: &ClientConfig) -> ClientResult<Endpoint> {
    if config.address.is_empty() {
        return Err(TransportError::InvalidAddress {
            address: String::new(),
            reason: "empty address".to_string(),
        }
        .into());
    }

    let mut endpoint = Endpoint::from_shared(config.address.clone())
        .map_err(|err| TransportError::InvalidAddress {
            address: config.address.clone(),
            reason: err.to_string(),
        })?
        .connect_timeout(config.dial_timeout);
    if let Some(timeout) = config.request_timeout {
        endpoint = endpoint.timeout(timeout);
    }

    Ok(endpoint)
}

/// Range carried by a lease response.
fn leased(response: AllocateRangeResponse) -> ClientResult<Range> {
    let range = response.range.ok_or(ProtocolError::MissingRange)?;
    Ok(Range::try_from(range)?)
}

/// Succeeds only if the authority reports itself as serving.
fn health(response: HealthResponse) -> ClientResult<()> {
    match ServiceStatus::from_i32(response.status) {
        Some(ServiceStatus::Serving) => Ok(()),
        _ => Err(ClientError::NotServing(
            response
                .details
                .unwrap_or_else(|| format!("status {}", response.status)),
        )),
    }
}

#[async_trait]
impl RangeClient for GrpcClient {
    async fn request_range(
        &self,
        service_id: &str,
        size: i64,
        region: Option<&str>,
    ) -> ClientResult<Range> {
        if size <= 0 {
            return Err(ClientError::NonPositiveSize(size));
        }

        let request = AllocateRangeRequest {
            service_id: service_id.to_string(),
            size: Some(size),
            region: region.map(str::to_string),
        };

        leased(self.unary(ALLOCATE_RANGE, request).await?)
    }

    async fn report_status(
        &self,
        range_id: &str,
        service_id: &str,
        status: RangeStatus,
    ) -> ClientResult<()> {
        let request = UpdateRangeStatusRequest {
            range_id: range_id.to_string(),
            service_id: service_id.to_string(),
            status: status.as_i32(),
        };

        let _: RangeMessage = self.unary(UPDATE_RANGE_STATUS, request).await?;
        Ok(())
    }

    async fn health_check(&self) -> ClientResult<()> {
        health(self.unary(GET_HEALTH, ()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> ClientConfig {
        ClientConfig {
            address: address.to_string(),
            dial_timeout: Duration::from_millis(200),
            request_timeout: Some(Duration::from_millis(200)),
        }
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(matches!(
            endpoint(&config("")),
            Err(ClientError::Transport(TransportError::InvalidAddress { .. }))
        ));
        assert!(matches!(
            endpoint(&config("not a uri")),
            Err(ClientError::Transport(TransportError::InvalidAddress { .. }))
        ));
        assert!(endpoint(&config("http://127.0.0.1:50051")).is_ok());
    }

    #[tokio::test]
    async fn unreachable_authority() {
        // Nothing listens on a port that was just released.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = GrpcClient::connect(&config(&format!("http://{addr}"))).await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn lazy_client_surfaces_transport_errors() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GrpcClient::connect_lazy(&config(&format!("http://{addr}"))).unwrap();
        let result = client.request_range("svc", 10, None).await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert!(matches!(
            client.health_check().await,
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn lease_response_mapping() {
        let range = leased(AllocateRangeResponse {
            range: Some(RangeMessage {
                range_id: "r-1".to_string(),
                start_id: 0,
                end_id: 4,
                service_id: "svc".to_string(),
                status: RangeStatus::Active.as_i32(),
            }),
        })
        .unwrap();
        assert_eq!(range.range_id, "r-1");
        assert_eq!(range.width(), 5);

        assert_eq!(
            leased(AllocateRangeResponse { range: None }),
            Err(ClientError::Protocol(ProtocolError::MissingRange))
        );
    }

    #[test]
    fn health_response_mapping() {
        let response = |status: ServiceStatus, details: Option<&str>| HealthResponse {
            status: status as i32,
            details: details.map(str::to_string),
        };

        assert_eq!(health(response(ServiceStatus::Serving, None)), Ok(()));
        assert_eq!(
            health(response(ServiceStatus::NotServing, Some("draining"))),
            Err(ClientError::NotServing("draining".to_string()))
        );
        assert_eq!(
            health(response(ServiceStatus::NotServing, None)),
            Err(ClientError::NotServing("status 2".to_string()))
        );
        assert_eq!(
            health(response(ServiceStatus::Unspecified, None)),
            Err(ClientError::NotServing("status 0".to_string()))
        );
        assert_eq!(
            health(HealthResponse {
                status: 7,
                details: None,
            }),
            Err(ClientError::NotServing("status 7".to_string()))
        );
    }

    #[tokio::test]
    async fn non_positive_size_is_rejected_locally() {
        // Nothing listens here; a request that went out would fail with a transport error.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GrpcClient::connect_lazy(&config(&format!("http://{addr}"))).unwrap();
        for size in [0, -1, i64::MIN] {
            assert_eq!(
                client.request_range("svc", size, None).await,
                Err(ClientError::NonPositiveSize(size))
            );
        }
    }
}
