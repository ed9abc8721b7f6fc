//! Cluster topology resolution via CLUSTER SLOTS
//!
//! Reply shape, one entry per contiguous slot range:
//! ```text
//! 1) 1) (integer) 0          <- first slot
//!    2) (integer) 5460       <- last slot
//!    3) 1) "10.0.0.1"        <- master ip
//!       2) (integer) 6379    <- master port
//!       3) "node-id"         <- optional trailing fields, ignored
//!    4) 1) "10.0.0.2"        <- replicas follow in reported order
//!       2) (integer) 6379
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use super::slots::{RedisSlots, SlotOwner, SlotRange, MAX_SLOT};
use crate::client::{RedisClient, RedisClientExt};
use crate::config::ServiceRewrite;
use crate::utils::{ClusterError, RespValue};

/// Command used to query slot ownership
pub const TOPOLOGY_COMMAND: (&str, &[&str]) = ("CLUSTER", &["SLOTS"]);

/// Per-node slot sets plus the union over the whole cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSlotMap {
    /// Slots served by each address, master or replica
    pub nodes: BTreeMap<String, RedisSlots>,
    /// Every reported range once, for coverage checks
    pub all: RedisSlots,
}

/// One decoded shard entry; `roles[0]` is the master
struct ShardEntry {
    range: SlotRange,
    roles: Vec<String>,
}

/// Query the slot owners, rewriting addresses with the client's configured
/// service names
pub fn resolve_ownership<C: RedisClient + ?Sized>(
    client: &C,
) -> Result<Vec<SlotOwner>, ClusterError> {
    resolve_ownership_with(client, client.service_rewrite().as_ref())
}

/// Query the slot owners with an explicit address rewrite
pub fn resolve_ownership_with<C: RedisClient + ?Sized>(
    client: &C,
    rewrite: Option<&ServiceRewrite>,
) -> Result<Vec<SlotOwner>, ClusterError> {
    let (cmd, args) = TOPOLOGY_COMMAND;
    let reply = client.do_cmd(cmd, args)?;
    let owners = parse_ownership(&reply, rewrite)?;
    debug!("Resolved {} slot owners", owners.len());
    Ok(owners)
}

/// Decode a CLUSTER SLOTS reply into owners sorted by left boundary
pub fn parse_ownership(
    reply: &RespValue,
    rewrite: Option<&ServiceRewrite>,
) -> Result<Vec<SlotOwner>, ClusterError> {
    let mut owners: Vec<SlotOwner> = parse_shards(reply, rewrite)?
        .into_iter()
        .map(|shard| {
            let mut roles = shard.roles.into_iter();
            // parse_shard guarantees a master role
            let master = roles.next().unwrap_or_default();
            SlotOwner {
                master,
                replicas: roles.collect(),
                slot_left_boundary: shard.range.left,
                slot_right_boundary: shard.range.right,
            }
        })
        .collect();

    owners.sort_by_key(|o| o.slot_left_boundary);
    Ok(owners)
}

/// Query the per-node slot map using the client's configured service names
pub fn resolve_node_slot_map<C: RedisClient + ?Sized>(
    client: &C,
) -> Result<NodeSlotMap, ClusterError> {
    resolve_node_slot_map_with(client, client.service_rewrite().as_ref())
}

pub fn resolve_node_slot_map_with<C: RedisClient + ?Sized>(
    client: &C,
    rewrite: Option<&ServiceRewrite>,
) -> Result<NodeSlotMap, ClusterError> {
    let (cmd, args) = TOPOLOGY_COMMAND;
    let reply = client.do_cmd(cmd, args)?;
    let map = parse_node_slot_map(&reply, rewrite)?;
    debug!(
        "Resolved slot map for {} nodes covering {} slots",
        map.nodes.len(),
        map.all.slot_count()
    );
    Ok(map)
}

/// Decode a CLUSTER SLOTS reply into per-address slot sets
///
/// Every role of a shard is credited with its range. All sets come back
/// sorted by left boundary.
pub fn parse_node_slot_map(
    reply: &RespValue,
    rewrite: Option<&ServiceRewrite>,
) -> Result<NodeSlotMap, ClusterError> {
    let mut map = NodeSlotMap::default();

    for shard in parse_shards(reply, rewrite)? {
        for addr in shard.roles {
            map.nodes.entry(addr).or_default().push(shard.range);
        }
        map.all.push(shard.range);
    }

    for slots in map.nodes.values_mut() {
        slots.sort();
    }
    map.all.sort();
    Ok(map)
}

/// True when both lists describe the same slot boundaries in the same order
///
/// Addresses are ignored: a failover that keeps the ranges compares equal.
pub fn compare_ownership(a: &[SlotOwner], b: &[SlotOwner]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.slot_left_boundary == y.slot_left_boundary
                && x.slot_right_boundary == y.slot_right_boundary
        })
}

fn parse_shards(
    reply: &RespValue,
    rewrite: Option<&ServiceRewrite>,
) -> Result<Vec<ShardEntry>, ClusterError> {
    let entries = reply
        .as_array()
        .ok_or_else(|| ClusterError::malformed("reply".to_string(), "expected array", reply))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_shard(i, entry, rewrite))
        .collect()
}

fn parse_shard(
    index: usize,
    entry: &RespValue,
    rewrite: Option<&ServiceRewrite>,
) -> Result<ShardEntry, ClusterError> {
    let position = format!("reply[{}]", index);
    let fields = match entry.as_array() {
        Some(fields) if fields.len() >= 3 => fields,
        Some(_) => {
            return Err(ClusterError::malformed(
                position,
                "expected slot range and at least one node",
                entry,
            ))
        }
        None => return Err(ClusterError::malformed(position, "expected array", entry)),
    };

    let left = parse_slot(&position, 0, &fields[0])?;
    let right = parse_slot(&position, 1, &fields[1])?;
    if left > right {
        return Err(ClusterError::malformed(
            position,
            format!("slot range {}-{} is inverted", left, right),
            entry,
        ));
    }

    let roles = fields[2..]
        .iter()
        .enumerate()
        .map(|(j, node)| parse_node(&format!("{}[{}]", position, j + 2), node, rewrite))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ShardEntry {
        range: SlotRange::new(left, right),
        roles,
    })
}

fn parse_slot(position: &str, field: usize, value: &RespValue) -> Result<u16, ClusterError> {
    let position = format!("{}[{}]", position, field);
    let slot = value
        .as_i64()
        .ok_or_else(|| ClusterError::malformed(position.clone(), "expected integer slot", value))?;

    u16::try_from(slot)
        .ok()
        .filter(|s| *s <= MAX_SLOT)
        .ok_or_else(|| {
            ClusterError::malformed(position, format!("slot {} out of range", slot), value)
        })
}

/// Decode `[ip, port, ...]` into `ip:port`
fn parse_node(
    position: &str,
    node: &RespValue,
    rewrite: Option<&ServiceRewrite>,
) -> Result<String, ClusterError> {
    let fields = match node.as_array() {
        Some(fields) if fields.len() >= 2 => fields,
        _ => {
            return Err(ClusterError::malformed(
                position.to_string(),
                "expected [ip, port, ...]",
                node,
            ))
        }
    };

    let ip = match &fields[0] {
        RespValue::SimpleString(s) => s.clone(),
        RespValue::BulkString(b) => String::from_utf8(b.clone()).map_err(|_| {
            ClusterError::malformed(format!("{}[0]", position), "ip is not utf-8", &fields[0])
        })?,
        other => {
            return Err(ClusterError::malformed(
                format!("{}[0]", position),
                "expected ip string",
                other,
            ))
        }
    };

    let port = fields[1]
        .as_i64()
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| {
            ClusterError::malformed(format!("{}[1]", position), "expected port", &fields[1])
        })?;

    let address = format!("{}:{}", ip, port);
    Ok(match rewrite {
        Some(rule) => rule.apply(&address),
        None => address,
    })
}
