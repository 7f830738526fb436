//! Per-site router configuration.

use crate::config::Settings;
use crate::site::{Site, Tunnel, WanEndpoint};

/// IPSec profile every tunnel interface is protected with
pub const IPSEC_PROFILE: &str = "VPN-LAB-PROFILE";
/// Group policy shared by all tunnel groups
pub const GROUP_POLICY: &str = "VPN-LAB-POLICY";
/// Route map applied outbound on primary tunnels
pub const PRIMARY_ROUTE_MAP: &str = "PRIMARY-OUT";
/// Route map applied outbound on backup tunnels
pub const BACKUP_ROUTE_MAP: &str = "BACKUP-OUT";

const EBGP_MULTIHOP: u8 = 2;

/// Renders the configuration of one site.
///
/// Rendering only reads the site, so the same site always produces the same
/// text.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfigRenderer<'a> {
    settings: &'a Settings,
}

impl<'a> DeviceConfigRenderer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn render(&self, site: &Site) -> String {
        let mut config = format!(
            "!\n! Configuration for {} ({})\n! Site ID: {}\n! Role: {}\n",
            site.name,
            site.location,
            site.site_id,
            if site.is_hub { "Hub" } else { "Spoke" }
        );
        if let Some(wan) = site.primary_wan() {
            config.push_str(&format!("! Primary WAN: {} {}\n", wan.interface_name, wan.ip));
        }
        config.push_str("!\n");

        config.push_str(&self.failover_policy(site));
        config.push_str(&self.interfaces(site));
        config.push_str(&self.crypto(site));
        config.push_str(&self.bgp(site));
        config
    }

    fn failover_policy(&self, site: &Site) -> String {
        let mut config = String::from("\n! WAN Failover Policy\n");
        if !site.is_multi_wan() {
            return config;
        }

        config.push_str(INSPECTION_POLICY);

        for (index, wan) in site.wan_endpoints.iter().enumerate() {
            if let Some(track) = wan.track_id {
                config.push_str(&self.uplink_tracking(wan, track, index + 1));
            }
        }
        config
    }

    /// SLA probe towards the uplink gateway plus a default route that is
    /// withdrawn when the probe fails
    fn uplink_tracking(&self, wan: &WanEndpoint, track: u32, distance: usize) -> String {
        let settings = self.settings;
        format!(
            "
sla monitor {track}
 type echo protocol ipIcmpEcho {gateway} interface {nameif}
 num-packets {packets}
 timeout {timeout}
 frequency {frequency}
sla monitor schedule {track} life forever start-time now
track {track} rtr {track} reachability
route {nameif} 0.0.0.0 0.0.0.0 {gateway} {distance} track {track}
",
            gateway = wan.gateway,
            nameif = wan.nameif(),
            packets = settings.sla_num_packets,
            timeout = settings.sla_timeout.saturating_mul(1000),
            frequency = settings.sla_frequency,
        )
    }

    fn interfaces(&self, site: &Site) -> String {
        let bfd = &self.settings.bfd;
        let mut config = format!(
            "
! BFD Template Configuration
bfd-template multi-hop INTERFACES
 interval min-tx {} min-rx {} multiplier {}

bfd-template single-hop default
 interval min-tx {} min-rx {} multiplier {}

bfd slow-timers 2000
",
            bfd.multi_hop.min_tx,
            bfd.multi_hop.min_rx,
            bfd.multi_hop.multiplier,
            bfd.single_hop.min_tx,
            bfd.single_hop.min_rx,
            bfd.single_hop.multiplier,
        );

        if let Some((ip, netmask)) = site.inside_address() {
            config.push_str(&format!(
                "
interface {}
 nameif inside
 security-level 100
 ip address {} {}
 no shutdown
",
                self.settings.inside_interface, ip, netmask
            ));
        }

        for wan in &site.wan_endpoints {
            config.push_str(&format!(
                "
interface {}
 nameif {}
 security-level 0
 ip address {} {}
 bfd interval {} min_rx {} multiplier {}
",
                wan.interface_name,
                wan.nameif(),
                wan.ip,
                wan.netmask,
                bfd.interface.min_tx,
                bfd.interface.min_rx,
                bfd.interface.multiplier,
            ));
        }

        for tunnel in &site.tunnels {
            config.push_str(&format!(
                "
interface {name}
 nameif SVTI-{location}-{name}
 ip address {ip} {netmask}
 tunnel source interface {source}
 tunnel destination {destination}
 tunnel mode ipsec ipv4
 tunnel protection ipsec profile {IPSEC_PROFILE}
",
                name = tunnel.name,
                location = site.location,
                ip = tunnel.local_ip,
                netmask = tunnel.subnet.netmask(),
                source = tunnel.source_wan.nameif(),
                destination = tunnel.destination_wan.ip,
            ));
        }

        config
    }

    fn crypto(&self, site: &Site) -> String {
        let mut config = format!(
            "
! IPSec and IKEv2 Configuration
crypto ikev2 policy 1
 encryption aes-256
 integrity sha512 sha384 sha256
 group 21 20 14
 prf sha256
 lifetime seconds 86400

crypto ipsec ikev2 ipsec-proposal VPN-LAB
 protocol esp encryption aes-256
 protocol esp integrity sha-512

! VPN Group Policy Configuration
group-policy {GROUP_POLICY} internal
group-policy {GROUP_POLICY} attributes
 vpn-tunnel-protocol ikev2
 ipv6-tunnel-protocol none
 split-tunnel-policy tunnelall
 split-tunnel-network-list none
 default-domain none
 dns-server none
 dhcp-network-scope none

crypto ipsec profile {IPSEC_PROFILE}
 set ikev2 ipsec-proposal VPN-LAB
 set security-association lifetime seconds 1000

! Tunnel Group Configurations
"
        );

        for tunnel in &site.tunnels {
            config.push_str(&tunnel_group(tunnel, &site.pre_shared_key));
        }
        config.push('\n');
        config
    }

    fn bgp(&self, site: &Site) -> String {
        let settings = self.settings;
        let local_as = site.local_as();
        let mut config = format!(
            "
! BGP Configuration
router bgp {local_as}
 bgp log-neighbor-changes
 bgp bestpath compare-routerid

 community-list standard PRIMARY permit {primary}
 community-list standard BACKUP permit {backup}

 address-family ipv4 unicast
",
            primary = settings.primary_community,
            backup = settings.backup_community,
        );

        for tunnel in &site.tunnels {
            config.push_str(&bgp_neighbor(tunnel));
        }

        for network in &site.local_networks {
            config.push_str(&format!("  network {} mask {}\n", network.ip(), network.netmask()));
        }
        if let Some(inside) = site.inside_network() {
            config.push_str(&format!("  network {} mask {}\n", inside.network(), inside.netmask()));
        }

        let prepend: String = std::iter::repeat(format!(" {}", local_as))
            .take(settings.as_prepend_count as usize)
            .collect();

        config.push_str(&format!(
            "  no auto-summary
  no synchronization
 exit-address-family

! Route Maps for Path Selection
route-map {PRIMARY_ROUTE_MAP} permit 10
 set community {primary}

route-map {BACKUP_ROUTE_MAP} permit 10
 set community {backup}
 set as-path prepend{prepend}
",
            primary = settings.primary_community,
            backup = settings.backup_community,
        ));
        config
    }
}

fn tunnel_group(tunnel: &Tunnel, pre_shared_key: &str) -> String {
    let peer = tunnel.destination_wan.ip;
    format!(
        "
tunnel-group {peer} type ipsec-l2l
tunnel-group {peer} general-attributes
 default-group-policy {GROUP_POLICY}
tunnel-group {peer} ipsec-attributes
 ikev2 remote-authentication pre-shared-key {pre_shared_key}
 ikev2 local-authentication pre-shared-key {pre_shared_key}
tunnel-group {peer} ikev2-ipsec-attributes
 isakmp keepalive threshold 15 retry 3
"
    )
}

fn bgp_neighbor(tunnel: &Tunnel) -> String {
    let neighbor = tunnel.remote_ip;
    let (fall_over, route_map) = if tunnel.is_primary {
        ("fall-over bfd single-hop", PRIMARY_ROUTE_MAP)
    } else {
        ("fall-over bfd", BACKUP_ROUTE_MAP)
    };
    format!(
        "  neighbor {neighbor} remote-as {remote_as}
  neighbor {neighbor} ebgp-multihop {EBGP_MULTIHOP}
  neighbor {neighbor} {fall_over}
  neighbor {neighbor} activate
  neighbor {neighbor} send-community
  neighbor {neighbor} route-map {route_map} out
",
        remote_as = tunnel.remote_as,
    )
}

const INSPECTION_POLICY: &str = "
! Interface health monitoring policy
policy-map type inspect dns preset_dns_map
 parameters
  message-length maximum client auto
  message-length maximum 512
  no tcp-inspection

policy-map global_policy
 class class-default
  inspect dns preset_dns_map
  inspect ftp
  inspect h323 h225
  inspect h323 ras
  inspect rsh
  inspect rtsp
  inspect esmtp
  inspect sqlnet
  inspect skinny
  inspect sunrpc
  inspect xdmcp
  inspect sip
  inspect netbios
  inspect tftp
  inspect ip-options
  inspect icmp
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SiteRecord;
    use crate::topology::{Topology, TopologyBuilder};

    fn built_sites() -> Vec<Site> {
        let settings = Settings::default();
        let records = [
            SiteRecord::new("HQ", 1)
                .with_location("NYC")
                .with_wan("GigabitEthernet0/0", "203.0.113.2/30", "203.0.113.1")
                .with_wan("GigabitEthernet0/1", "198.51.100.2/30", "198.51.100.1")
                .with_local_network("10.1.0.0/24")
                .with_local_network("10.1.1.0 255.255.255.0")
                .with_as(65001)
                .with_pre_shared_key("hq-key"),
            SiteRecord::new("Branch", 2)
                .with_location("LA")
                .with_wan("GigabitEthernet0/0", "192.0.2.2/30", "192.0.2.1")
                .with_local_network("10.2.0.0/24")
                .with_as(65002),
        ];
        let mut sites: Vec<Site> = records
            .iter()
            .map(|r| Site::from_record(r, &settings).unwrap())
            .collect();
        TopologyBuilder::new(&settings)
            .unwrap()
            .build(&mut sites, &Topology::hub_spoke(&["HQ"]))
            .unwrap();
        sites
    }

    #[test]
    fn test_render_is_pure() {
        let settings = Settings::default();
        let renderer = DeviceConfigRenderer::new(&settings);
        let sites = built_sites();
        let before = sites[0].clone();

        let first = renderer.render(&sites[0]);
        let second = renderer.render(&sites[0]);
        assert_eq!(first, second);
        assert_eq!(sites[0].tunnels, before.tunnels);
        assert_eq!(sites[0].wan_endpoints, before.wan_endpoints);
    }

    #[test]
    fn test_header_and_interfaces() {
        let settings = Settings::default();
        let sites = built_sites();
        let config = DeviceConfigRenderer::new(&settings).render(&sites[0]);

        assert!(config.starts_with(
            "!\n! Configuration for HQ (NYC)\n! Site ID: 1\n! Role: Hub\n! Primary WAN: GigabitEthernet0/0 203.0.113.2\n!\n"
        ));
        assert!(config.contains("interface Vlan17\n nameif inside\n security-level 100\n ip address 10.1.0.1 255.255.255.0\n"));
        assert!(config.contains("interface GigabitEthernet0/1\n nameif outside-gigabitethernet0_1\n"));
        assert!(config.contains(" bfd interval 100 min_rx 100 multiplier 5\n"));
        assert!(config.contains("interface tunnel100\n nameif SVTI-NYC-tunnel100\n"));
        assert!(config.contains(" ip address 172.26.0.2 255.255.255.248\n"));
        assert!(config.contains(" tunnel destination 192.0.2.2\n"));
    }

    #[test]
    fn test_failover_block_only_for_multi_wan() {
        let settings = Settings::default();
        let renderer = DeviceConfigRenderer::new(&settings);
        let sites = built_sites();

        let hq = renderer.render(&sites[0]);
        assert!(hq.contains("policy-map global_policy"));
        assert!(hq.contains("sla monitor 100\n type echo protocol ipIcmpEcho 203.0.113.1 interface outside-gigabitethernet0_0\n"));
        assert!(hq.contains("route outside-gigabitethernet0_1 0.0.0.0 0.0.0.0 198.51.100.1 2 track 101\n"));
        assert!(hq.contains(" num-packets 2\n timeout 1000\n frequency 5\n"));

        let branch = renderer.render(&sites[1]);
        assert!(branch.contains("! WAN Failover Policy\n"));
        assert!(!branch.contains("policy-map"));
        assert!(!branch.contains("sla monitor"));
    }

    #[test]
    fn test_tunnel_groups_use_site_key() {
        let settings = Settings::default();
        let renderer = DeviceConfigRenderer::new(&settings);
        let sites = built_sites();

        let hq = renderer.render(&sites[0]);
        assert_eq!(hq.matches("type ipsec-l2l").count(), 2);
        assert!(hq.contains("tunnel-group 192.0.2.2 type ipsec-l2l\n"));
        assert!(hq.contains(" ikev2 remote-authentication pre-shared-key hq-key\n"));

        let branch = renderer.render(&sites[1]);
        assert!(branch.contains("tunnel-group 203.0.113.2 type ipsec-l2l\n"));
        assert!(branch.contains("tunnel-group 198.51.100.2 type ipsec-l2l\n"));
        assert!(branch.contains(" ikev2 local-authentication pre-shared-key cisco123\n"));
    }

    #[test]
    fn test_bgp_section() {
        let settings = Settings::default();
        let renderer = DeviceConfigRenderer::new(&settings);
        let sites = built_sites();
        let branch = renderer.render(&sites[1]);

        assert!(branch.contains("router bgp 65002\n"));
        assert!(branch.contains(" community-list standard PRIMARY permit 65000:100\n"));
        // primary tunnel: both ends on their first WAN
        assert!(branch.contains(
            "  neighbor 172.26.0.2 remote-as 65001\n  neighbor 172.26.0.2 ebgp-multihop 2\n  neighbor 172.26.0.2 fall-over bfd single-hop\n"
        ));
        assert!(branch.contains("  neighbor 172.26.0.2 route-map PRIMARY-OUT out\n"));
        // backup tunnel towards HQ's second WAN
        let backup = sites[1].tunnels.iter().find(|t| !t.is_primary).unwrap();
        assert!(branch.contains(&format!("  neighbor {} fall-over bfd\n", backup.remote_ip)));
        assert!(branch.contains(&format!("  neighbor {} route-map BACKUP-OUT out\n", backup.remote_ip)));

        assert!(branch.contains("  network 10.2.0.0 mask 255.255.255.0\n"));
        assert!(branch.contains(" set as-path prepend 65002 65002 65002\n"));
        assert!(branch.ends_with(" set as-path prepend 65002 65002 65002\n"));
    }

    #[test]
    fn test_sla_settings_are_rendered() {
        let mut settings = Settings::default();
        settings.sla_num_packets = 4;
        settings.sla_timeout = u32::MAX;
        let sites = built_sites();
        let hq = DeviceConfigRenderer::new(&settings).render(&sites[0]);

        assert!(hq.contains(" num-packets 4\n"));
        assert!(!hq.contains("\n threshold "));
        assert!(hq.contains(&format!(" timeout {}\n", u32::MAX)));
    }

    #[test]
    fn test_prepend_count_follows_settings() {
        let mut settings = Settings::default();
        settings.as_prepend_count = 1;
        let sites = built_sites();
        let config = DeviceConfigRenderer::new(&settings).render(&sites[0]);
        assert!(config.contains(" set as-path prepend 65001\n"));
    }

    #[test]
    fn test_site_without_local_networks() {
        let settings = Settings::default();
        let record = SiteRecord::new("Bare", 9)
            .with_wan("Gi0/0", "192.0.2.10/30", "192.0.2.9")
            .with_as(65009);
        let site = Site::from_record(&record, &settings).unwrap();
        let config = DeviceConfigRenderer::new(&settings).render(&site);
        assert!(!config.contains("nameif inside"));
        assert!(!config.contains("  network "));
    }
}
