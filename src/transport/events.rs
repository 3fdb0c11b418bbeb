//! Events delivered by the transport collaborator

use bytes::Bytes;

use crate::types::{
    AttributeHandle, ConnectionHandle, DeviceAddress, ServiceHandle, SubeventId, SyncHandle,
    Uuid16,
};

/// Completion status carried by transport events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The procedure completed successfully
    Ok,
    /// The procedure failed with a transport status code
    Error(u16),
}

impl Status {
    /// Check for success
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// The raw status code (`0` for success)
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 0,
            Status::Error(code) => code,
        }
    }
}

/// Completeness of a periodic-train subevent report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    /// The full payload was received
    Complete,
    /// More data was expected but the report was cut short
    Partial,
    /// Reception failed mid-report
    Truncated,
}

/// Whether a GATT write demands an acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Write request; the requester expects a response
    Request,
    /// Write command; fire-and-forget
    Command,
}

/// One event from the transport's event stream
#[derive(Debug, Clone)]
pub enum BleEvent {
    /// The radio stack has started; commands may be issued from now on
    Boot,

    /// An advertisement or scan response was seen while scanning
    AdvertisementReport {
        /// Advertiser address
        address: DeviceAddress,
        /// Advertiser address type, passed through to `open_link`
        address_type: u8,
        /// Whether the advertiser accepts connections
        connectable: bool,
        /// Whether the advertiser answers scan requests
        scannable: bool,
        /// Raw advertisement payload (length-prefixed AD fields)
        data: Bytes,
    },

    /// A link was opened
    LinkOpened {
        /// The new link
        link: ConnectionHandle,
        /// Remote device address
        address: DeviceAddress,
    },

    /// A link was closed
    LinkClosed {
        /// The closed link
        link: ConnectionHandle,
        /// Transport reason code
        reason: u16,
    },

    /// Connection parameters were negotiated on a link
    ConnectionParameters {
        /// The affected link
        link: ConnectionHandle,
    },

    /// A service was found during discovery
    ServiceDiscovered {
        /// The link discovery ran on
        link: ConnectionHandle,
        /// Handle of the discovered service
        service: ServiceHandle,
        /// Identifier of the discovered service
        uuid: Uuid16,
    },

    /// A characteristic was found during discovery
    CharacteristicDiscovered {
        /// The link discovery ran on
        link: ConnectionHandle,
        /// Handle of the discovered characteristic
        characteristic: AttributeHandle,
        /// Identifier of the discovered characteristic
        uuid: Uuid16,
    },

    /// A discovery or write procedure ran to completion
    ProcedureCompleted {
        /// The link the procedure ran on
        link: ConnectionHandle,
        /// Procedure outcome
        result: Status,
    },

    /// A remote writer wrote one of the locally hosted characteristics
    WriteRequest {
        /// The link the write arrived on
        link: ConnectionHandle,
        /// The characteristic written
        characteristic: AttributeHandle,
        /// Written value
        value: Bytes,
        /// Whether the writer expects an acknowledgment
        kind: WriteKind,
    },

    /// The periodic train needs payload data for the upcoming interval
    SubeventDataRequest {
        /// First subevent data is requested for
        start: SubeventId,
        /// Number of subevents data is requested for
        count: u8,
    },

    /// Out-of-band synchronization info was received over a link
    SyncTransferReceived {
        /// Transfer outcome; no sync state exists on failure
        status: Status,
        /// The link the transfer arrived on
        link: ConnectionHandle,
        /// Handle of the acquired synchronization
        sync: SyncHandle,
        /// Train interval in units of 1.25 ms
        train_interval: u16,
    },

    /// A periodic-train subevent was received
    SubeventReport {
        /// The synchronization the report belongs to
        sync: SyncHandle,
        /// Which subevent was received
        subevent: SubeventId,
        /// Completeness of the received data
        data_status: DataStatus,
        /// Broadcast payload
        payload: Bytes,
    },

    /// A periodic-train synchronization was lost
    SyncClosed {
        /// The lost synchronization
        sync: SyncHandle,
    },
}
