//! Directory of discovered peripheral nodes
//!
//! A fixed-capacity table keyed by link identity. Entries occupy a dense
//! prefix; removal compacts by shifting later entries left. Under the
//! default [`NodeIdPolicy::Permanent`] an entry's `node_id` is assigned at
//! add time and never renumbered, so identity and table position diverge
//! after removals.

use crate::types::{
    AttributeHandle, ConnectionHandle, DeviceAddress, NodeId, NodeIdPolicy, ServiceHandle,
};

/// Gateway-side record of one connected peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorNode {
    /// Network identity assigned at connect time
    pub node_id: NodeId,
    /// Link the peripheral is connected over
    pub link: ConnectionHandle,
    /// Remote device address
    pub address: DeviceAddress,
    /// Discovered configuration-service handle
    pub service: Option<ServiceHandle>,
    /// Discovered node-id characteristic handle
    pub node_id_char: Option<AttributeHandle>,
    /// Discovered subevent-id characteristic handle
    pub subevent_char: Option<AttributeHandle>,
    /// Discovered wall-clock characteristic handle
    pub wall_clock_char: Option<AttributeHandle>,
    /// Discovered clock-correction characteristic handle
    pub clock_correction_char: Option<AttributeHandle>,
    /// Whether the provisioning sequence completed for this node
    pub synchronized: bool,
}

impl SensorNode {
    fn new(node_id: NodeId, link: ConnectionHandle, address: DeviceAddress) -> Self {
        Self {
            node_id,
            link,
            address,
            service: None,
            node_id_char: None,
            subevent_char: None,
            wall_clock_char: None,
            clock_correction_char: None,
            synchronized: false,
        }
    }
}

/// Dense, fixed-capacity table of [`SensorNode`] entries
#[derive(Debug)]
pub struct Directory {
    nodes: Vec<SensorNode>,
    capacity: usize,
    policy: NodeIdPolicy,
}

impl Directory {
    /// Create an empty directory
    #[must_use]
    pub fn new(capacity: usize, policy: NodeIdPolicy) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Number of active entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the directory holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Configured maximum number of entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the directory is at capacity
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    /// Append a new entry, assigning the lowest identity not in use
    ///
    /// While the table has seen no removals this is the table length, so
    /// identities come out sequential under either policy.
    ///
    /// # Panics
    ///
    /// Panics when the directory is already full. The caller must check
    /// [`Directory::is_full`] before opening a link; a breach here is a
    /// programming error, not a normal control-flow case.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, link: ConnectionHandle, address: DeviceAddress) -> NodeId {
        assert!(
            self.nodes.len() < self.capacity,
            "directory capacity {} exceeded",
            self.capacity
        );
        let node_id = match self.policy {
            // positions stay dense and renumbered, so length is free
            NodeIdPolicy::PositionBased => NodeId(self.nodes.len() as u8),
            NodeIdPolicy::Permanent => {
                let mut id = 0;
                while self.nodes.iter().any(|node| node.node_id == NodeId(id)) {
                    id += 1;
                }
                NodeId(id)
            }
        };
        self.nodes.push(SensorNode::new(node_id, link, address));
        node_id
    }

    /// Remove the entry for a link, compacting the table
    ///
    /// Later entries shift left by one position. Returns the removed
    /// entry's id, or `None` when the link has no entry.
    #[allow(clippy::cast_possible_truncation)]
    pub fn remove(&mut self, link: ConnectionHandle) -> Option<NodeId> {
        let index = self.find(link)?;
        let removed = self.nodes.remove(index);
        if self.policy == NodeIdPolicy::PositionBased {
            for (i, node) in self.nodes.iter_mut().enumerate() {
                node.node_id = NodeId(i as u8);
            }
        }
        Some(removed.node_id)
    }

    /// Locate an entry by link identity
    #[must_use]
    pub fn find(&self, link: ConnectionHandle) -> Option<usize> {
        self.nodes.iter().position(|node| node.link == link)
    }

    /// Entry at a table position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SensorNode> {
        self.nodes.get(index)
    }

    /// Mutable entry for a link
    pub fn find_mut(&mut self, link: ConnectionHandle) -> Option<&mut SensorNode> {
        self.nodes.iter_mut().find(|node| node.link == link)
    }

    /// Entry for a link
    #[must_use]
    pub fn find_node(&self, link: ConnectionHandle) -> Option<&SensorNode> {
        self.nodes.iter().find(|node| node.link == link)
    }

    /// Iterate over active entries in table order
    pub fn iter(&self) -> impl Iterator<Item = &SensorNode> {
        self.nodes.iter()
    }
}
