//! Messages delivered to the engine's single logical thread.
//!
//! Everything asynchronous (channel frames, background revalidations,
//! fire-and-forget submits) lands here; the engine applies messages in
//! arrival order and never shares mutable state with a task.

use stockroom_api_types::{ChannelKind, PageEnvelope, RawChannelMessage};
use stockroom_core::{Bill, EquipmentItem, Handout, IssueRequest, RecordId};
use stockroom_store::PartitionKey;

use crate::gateway::GatewayError;

#[derive(Debug)]
pub enum EngineMessage {
    /// A raw frame read off one of the push channels.
    Channel {
        channel: ChannelKind,
        frame: RawChannelMessage,
    },
    /// A push channel (re)connected.
    ChannelUp { channel: ChannelKind },
    /// A push channel dropped; the manager will reconnect with backoff.
    ChannelDown {
        channel: ChannelKind,
        reason: String,
    },
    /// A background revalidation finished for an issue-requests key.
    RequestsPageFetched {
        key: PartitionKey,
        result: Result<PageEnvelope<IssueRequest>, GatewayError>,
    },
    /// A background revalidation finished for an items key.
    ItemsPageFetched {
        key: PartitionKey,
        result: Result<PageEnvelope<EquipmentItem>, GatewayError>,
    },
    /// A background revalidation finished for a bills key.
    BillsPageFetched {
        key: PartitionKey,
        result: Result<PageEnvelope<Bill>, GatewayError>,
    },
    /// A background revalidation finished for a handouts key.
    HandoutsPageFetched {
        key: PartitionKey,
        result: Result<PageEnvelope<Handout>, GatewayError>,
    },
    /// A fire-and-forget submit call completed.
    SubmitFinished {
        id: RecordId,
        result: Result<IssueRequest, GatewayError>,
    },
}
