//! Leased ID-range allocation for short-link generation.
//!
//! A [`RangeManager`] leases contiguous ranges of integer ids from a remote
//! authority (through a [`RangeClient`]) and hands them out one by one,
//! contacting the authority only when the current range runs out.
//! [`ShortLinkGenerator`] turns those ids into short tokens.

mod builder;
pub mod client;
mod config;
mod error;
mod manager;
mod range;
pub mod shortener;

use {async_trait::async_trait, std::sync::Arc};

pub use {
    builder::RangeManagerBuilder,
    client::{ClientConfig, GrpcClient, RangeClient},
    config::{AllocationSection, AllocatorConfig, AuthoritySection},
    error::{
        AllocationError,
        AllocationResult,
        ClientError,
        ClientResult,
        ConfigError,
        ProtocolError,
        TransportError,
    },
    manager::{RangeManager, RangeManagerConfig},
    range::{Range, RangeStatus},
    shortener::{Base62, EncodeError, Encoder, ShortLinkGenerator},
};

/// Source of unique ids.
///
/// Consumers depend on this rather than on [`RangeManager`] directly, so that
/// the allocator can be replaced in tests.
#[async_trait]
pub trait IdSource: Send + Sync {
    /// Returns an id that no other call, on any instance sharing the same
    /// authority, has returned or will return.
    async fn next_id(&self) -> AllocationResult<i64>;

    /// Snapshot of the range ids are currently served from.
    ///
    /// `None` until the first range has been leased.
    fn current_range(&self) -> Option<Range>;
}

#[async_trait]
impl<T: IdSource + ?Sized> IdSource for Arc<T> {
    async fn next_id(&self) -> AllocationResult<i64> {
        (**self).next_id().await
    }

    fn current_range(&self) -> Option<Range> {
        (**self).current_range()
    }
}
