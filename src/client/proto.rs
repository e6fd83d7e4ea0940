//! Wire types of the `rangeallocator.v1.RangeAllocator` gRPC service.

use crate::{ProtocolError, Range, RangeStatus};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RangeMessage {
    #[prost(string, tag = "1")]
    pub range_id: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub start_id: i64,
    #[prost(int64, tag = "3")]
    pub end_id: i64,
    #[prost(string, tag = "4")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(int32, tag = "5")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllocateRangeRequest {
    #[prost(string, tag = "1")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(int64, optional, tag = "2")]
    pub size: ::core::option::Option<i64>,
    #[prost(string, optional, tag = "3")]
    pub region: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllocateRangeResponse {
    #[prost(message, optional, tag = "1")]
    pub range: ::core::option::Option<RangeMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRangeStatusRequest {
    #[prost(string, tag = "1")]
    pub range_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(string, optional, tag = "2")]
    pub details: ::core::option::Option<::prost::alloc::string::String>,
}

/// Serving state reported by the authority's health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Unspecified = 0,
    Serving = 1,
    NotServing = 2,
}

impl ServiceStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ServiceStatus::Unspecified),
            1 => Some(ServiceStatus::Serving),
            2 => Some(ServiceStatus::NotServing),
            _ => None,
        }
    }
}

impl TryFrom<RangeMessage> for Range {
    type Error = ProtocolError;

    fn try_from(msg: RangeMessage) -> Result<Self, Self::Error> {
        Ok(Range {
            status: RangeStatus::try_from(msg.status)?,
            range_id: msg.range_id,
            start_id: msg.start_id,
            end_id: msg.end_id,
            service_id: msg.service_id,
        })
    }
}
