//! Static port topology.
//!
//! Maps the owning device's input ports to the physical-address subtrees
//! hanging off them.  A port registered as `1.0.0.0` owns every address of
//! the form `1.x.x.x`; zero nibbles in the port root act as wildcards for
//! the levels below it.

use cec_core::{PhysicalAddress, PortId};

use crate::application::action::Topology;

/// Fixed port map built at startup.
pub struct StaticTopology {
    ports: Vec<(PortId, PhysicalAddress)>,
}

impl StaticTopology {
    /// Builds the map from `(port, subtree root)` pairs.  The root `0.0.0.0`
    /// must not be registered: it would claim every address.
    pub fn new(ports: Vec<(PortId, PhysicalAddress)>) -> Self {
        debug_assert!(ports.iter().all(|(_, root)| root.raw() != 0));
        StaticTopology { ports }
    }

    /// An empty map, for devices with no switched inputs.
    pub fn unrouted() -> Self {
        StaticTopology { ports: Vec::new() }
    }
}

fn nibbles(address: PhysicalAddress) -> [u8; 4] {
    let raw = address.raw();
    [
        ((raw >> 12) & 0xF) as u8,
        ((raw >> 8) & 0xF) as u8,
        ((raw >> 4) & 0xF) as u8,
        (raw & 0xF) as u8,
    ]
}

/// Whether `address` sits inside the subtree rooted at `root`.
fn in_subtree(root: PhysicalAddress, address: PhysicalAddress) -> bool {
    if !address.is_valid() {
        return false;
    }
    let r = nibbles(root);
    let a = nibbles(address);
    for level in 0..4 {
        if r[level] == 0 {
            return true;
        }
        if r[level] != a[level] {
            return false;
        }
    }
    true
}

impl Topology for StaticTopology {
    fn port_for(&self, address: PhysicalAddress) -> Option<PortId> {
        self.ports
            .iter()
            .find(|(_, root)| in_subtree(*root, address))
            .map(|(port, _)| *port)
    }

    fn physical_address_of_port(&self, port: PortId) -> Option<PhysicalAddress> {
        self.ports
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, root)| *root)
    }
}
