//! Test doubles shared by the integration suites.

use async_trait::async_trait;
use fabric_state::RouteNextHopEntry;
use fabric_types::{
    InterfaceId, IpAddress, IpPrefix, Ipv4Address, Ipv6Address, MacAddress, PortId, RouterId,
    VlanId,
};
use fabricd::hw::HwSwitch;
use fabricd::packet::{PacketError, PacketIo};
use std::collections::HashSet;
use std::sync::Mutex;

/// Records every probe instead of transmitting it.
#[derive(Debug, Default)]
pub struct RecordingPacketIo {
    pub probes: Mutex<Vec<(VlanId, InterfaceId, IpAddress)>>,
    pub fail_sends: Mutex<bool>,
}

impl RecordingPacketIo {
    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_sends.lock().unwrap() = failing;
    }

    fn record(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: IpAddress,
    ) -> Result<(), PacketError> {
        self.probes.lock().unwrap().push((vlan, intf, target));
        if *self.fail_sends.lock().unwrap() {
            Err(PacketError::Transmit("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PacketIo for RecordingPacketIo {
    async fn send_arp_request(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv4Address,
    ) -> Result<(), PacketError> {
        self.record(vlan, intf, IpAddress::V4(target))
    }

    async fn send_ndp_solicitation(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv6Address,
    ) -> Result<(), PacketError> {
        self.record(vlan, intf, IpAddress::V6(target))
    }

    async fn send_packet_switched(&self, _buf: Vec<u8>) -> Result<(), PacketError> {
        Ok(())
    }
}

/// Hardware double with a settable hit table and a programming journal.
#[derive(Debug, Default)]
pub struct FakeHwSwitch {
    pub hits: Mutex<HashSet<IpAddress>>,
    pub journal: Mutex<Vec<String>>,
}

impl FakeHwSwitch {
    pub fn set_hit(&self, ip: IpAddress, hit: bool) {
        let mut hits = self.hits.lock().unwrap();
        if hit {
            hits.insert(ip);
        } else {
            hits.remove(&ip);
        }
    }

    pub fn journal_snapshot(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn log(&self, line: String) {
        self.journal.lock().unwrap().push(line);
    }
}

impl HwSwitch for FakeHwSwitch {
    fn is_hit(&self, ip: IpAddress) -> bool {
        self.hits.lock().unwrap().contains(&ip)
    }

    fn ecmp_width(&self) -> usize {
        64
    }

    fn attach_acl_counter(&self, acl: &str) {
        self.log(format!("acl-attach {}", acl));
    }

    fn detach_acl_counter(&self, acl: &str) {
        self.log(format!("acl-detach {}", acl));
    }

    fn destroy_acl_counter(&self, acl: &str) {
        self.log(format!("acl-destroy {}", acl));
    }

    fn set_port_loopback(&self, port: PortId, enabled: bool) {
        self.log(format!("loopback {} {}", port, enabled));
    }

    fn route_added(&self, vrf: RouterId, prefix: IpPrefix, _forward: &RouteNextHopEntry) {
        self.log(format!("route-add {} {}", vrf, prefix));
    }

    fn route_changed(
        &self,
        vrf: RouterId,
        prefix: IpPrefix,
        _old: &RouteNextHopEntry,
        _new: &RouteNextHopEntry,
    ) {
        self.log(format!("route-change {} {}", vrf, prefix));
    }

    fn route_removed(&self, vrf: RouterId, prefix: IpPrefix) {
        self.log(format!("route-del {} {}", vrf, prefix));
    }

    fn neighbor_added(&self, vlan: VlanId, ip: IpAddress, mac: MacAddress) {
        self.log(format!("neigh-add {} {} {}", vlan, ip, mac));
    }

    fn neighbor_removed(&self, vlan: VlanId, ip: IpAddress) {
        self.log(format!("neigh-del {} {}", vlan, ip));
    }
}
