//! Identity newtypes for links, nodes and discovered attributes

use std::fmt;

/// Handle identifying one open link on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u8);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Network identity assigned to a peripheral node at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u8);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id_{}", self.0)
    }
}

/// Index of one reply-slot group within a periodic-train interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubeventId(pub u8);

/// Handle of a discovered GATT service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u32);

/// Handle of a discovered (or locally hosted) GATT characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeHandle(pub u16);

/// Handle of an established periodic-train synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncHandle(pub u16);

/// 16-bit assigned service/characteristic identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid16(pub u16);

impl Uuid16 {
    /// Little-endian byte representation, as it appears on the air
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Parse from the little-endian on-air representation
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl fmt::Display for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Six-byte device address as reported by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(pub [u8; 6]);

impl DeviceAddress {
    /// The two low-order bytes, used as a short identity in logs
    #[must_use]
    pub fn short(self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reversed so the address reads most-significant byte first
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
