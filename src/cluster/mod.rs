//! Cluster topology
//!
//! Slot ownership is read from CLUSTER SLOTS and exposed two ways: as a
//! shard list (`SlotOwner`) and as per-node slot sets (`NodeSlotMap`).

pub mod slots;
pub mod topology;

pub use slots::{
    owner_for_key, owner_for_slot, slot_for_key, RedisSlots, SlotOwner, SlotRange, MAX_SLOT,
    SLOT_COUNT,
};
pub use topology::{
    compare_ownership, parse_node_slot_map, parse_ownership, resolve_node_slot_map,
    resolve_node_slot_map_with, resolve_ownership, resolve_ownership_with, NodeSlotMap,
    TOPOLOGY_COMMAND,
};
