//! Agent configuration loading.
//!
//! The agent reads one JSON document at startup describing the VRFs,
//! VLANs (with any static neighbors), ports and neighbor timing. The
//! configuration seeds the initial switch state and the RIB's VRF set;
//! it is never written back.

use crate::neighbor::NeighborCacheConfig;
use fabric_state::{
    AggregatePort, NeighborEntryFields, NeighborTable, Port, SwitchState, Vlan,
};
use fabric_types::{
    AggregatePortId, InterfaceId, IpAddress, MacAddress, PortDescriptor, PortId, RouterId, VlanId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_true() -> bool {
    true
}

fn default_max_probes() -> u8 {
    5
}

fn default_stale_interval_secs() -> u64 {
    10
}

fn default_base_reachable_secs() -> u64 {
    30
}

/// A statically configured neighbor, programmed REACHABLE at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticNeighborConfig {
    pub ip: IpAddress,
    pub mac: MacAddress,
    pub port: PortDescriptor,
    pub interface: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanConfig {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<u32>,
    #[serde(default)]
    pub static_neighbors: Vec<StaticNeighborConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_true")]
    pub admin_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePortConfig {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub members: Vec<u32>,
}

/// Neighbor timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborTimersConfig {
    #[serde(default = "default_max_probes")]
    pub max_probes: u8,
    #[serde(default = "default_stale_interval_secs")]
    pub stale_interval_secs: u64,
    #[serde(default = "default_base_reachable_secs")]
    pub base_reachable_secs: u64,
}

impl Default for NeighborTimersConfig {
    fn default() -> Self {
        NeighborTimersConfig {
            max_probes: default_max_probes(),
            stale_interval_secs: default_stale_interval_secs(),
            base_reachable_secs: default_base_reachable_secs(),
        }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub vrfs: Vec<u32>,
    #[serde(default)]
    pub vlans: Vec<VlanConfig>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub aggregate_ports: Vec<AggregatePortConfig>,
    #[serde(default)]
    pub neighbor: Option<NeighborTimersConfig>,
}

impl AgentConfig {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for vlan in &self.vlans {
            VlanId::new(vlan.id)
                .map_err(|e| ConfigError::Invalid(format!("vlan {}: {}", vlan.id, e)))?;
        }
        Ok(())
    }

    /// VRFs the RIB accepts updates for. The default VRF always exists.
    pub fn vrf_ids(&self) -> Vec<RouterId> {
        let mut vrfs: Vec<RouterId> = self.vrfs.iter().copied().map(RouterId).collect();
        if !vrfs.contains(&RouterId::DEFAULT) {
            vrfs.push(RouterId::DEFAULT);
        }
        vrfs.sort();
        vrfs
    }

    /// Timing knobs for the neighbor caches.
    pub fn cache_config(&self) -> NeighborCacheConfig {
        let timers = self.neighbor.clone().unwrap_or_default();
        NeighborCacheConfig {
            max_probes: timers.max_probes,
            stale_interval: Duration::from_secs(timers.stale_interval_secs),
            base_reachable: Duration::from_secs(timers.base_reachable_secs),
        }
    }

    /// Builds the initial switch state: ports, aggregates and VLANs with
    /// their static neighbors already in the tables.
    pub fn initial_state(&self) -> Result<Arc<SwitchState>, ConfigError> {
        let mut state = Arc::new(SwitchState::new());

        for port in &self.ports {
            state = state.with_port(Arc::new(Port::new(
                PortId(port.id),
                port.name.clone(),
                port.admin_up,
            )));
        }

        for aggregate in &self.aggregate_ports {
            state = state.with_aggregate_port(Arc::new(AggregatePort::new(
                AggregatePortId(aggregate.id),
                aggregate.name.clone(),
                aggregate.members.iter().copied().map(PortId).collect(),
            )));
        }

        for vlan_config in &self.vlans {
            let id = VlanId::new(vlan_config.id)
                .map_err(|e| ConfigError::Invalid(format!("vlan {}: {}", vlan_config.id, e)))?;
            let mut vlan = Vlan::new(
                id,
                vlan_config.name.clone(),
                vlan_config.interfaces.iter().copied().map(InterfaceId).collect(),
            );

            let mut arp = BTreeMap::new();
            let mut ndp = BTreeMap::new();
            for neighbor in &vlan_config.static_neighbors {
                match neighbor.ip {
                    IpAddress::V4(v4) => {
                        arp.insert(
                            v4,
                            Arc::new(NeighborEntryFields::new(
                                v4,
                                neighbor.mac,
                                neighbor.port,
                                InterfaceId(neighbor.interface),
                            )),
                        );
                    }
                    IpAddress::V6(v6) => {
                        ndp.insert(
                            v6,
                            Arc::new(NeighborEntryFields::new(
                                v6,
                                neighbor.mac,
                                neighbor.port,
                                InterfaceId(neighbor.interface),
                            )),
                        );
                    }
                }
            }
            if !arp.is_empty() {
                vlan = vlan.with_arp_table(Arc::new(NeighborTable::from_entries(arp)));
            }
            if !ndp.is_empty() {
                vlan = vlan.with_ndp_table(Arc::new(NeighborTable::from_entries(ndp)));
            }

            state = state.with_vlan(Arc::new(vlan));
        }

        Ok(state)
    }
}
