#[cfg(test)]
mod topology_regression_tests {
    use std::collections::{HashMap, HashSet};
    use std::io::Write;
    use std::net::Ipv4Addr;
    use tempfile::NamedTempFile;

    use meshgen::config::Settings;
    use meshgen::config_loader::load_inventory;
    use meshgen::inventory::{Inventory, SiteRecord};
    use meshgen::ip::TunnelAddressPool;
    use meshgen::orchestrator::{build_network, render_all};
    use meshgen::render::{DeviceConfigRenderer, InternetRouterRenderer};
    use meshgen::site::Site;
    use meshgen::topology::{Topology, TopologyBuilder};
    use meshgen::MeshError;

    /// Inventory with `n` sites of `k` WAN uplinks each
    fn inventory(n: u32, k: u32) -> Inventory {
        let sites = (1..=n)
            .map(|id| {
                let mut record = SiteRecord::new(&format!("site{:02}", id), id)
                    .with_location(&format!("loc{}", id))
                    .with_local_network(&format!("10.{}.0.0/24", id))
                    .with_as(65000 + id);
                for w in 0..k {
                    record = record.with_wan(
                        &format!("GigabitEthernet0/{}", w),
                        &format!("100.{}.{}.2/30", id, w),
                        &format!("100.{}.{}.1", id, w),
                    );
                }
                record
            })
            .collect();
        Inventory {
            settings: Settings::default(),
            sites,
        }
    }

    fn sites(inventory: &Inventory) -> Vec<Site> {
        inventory
            .sites
            .iter()
            .map(|r| Site::from_record(r, &inventory.settings).unwrap())
            .collect()
    }

    fn c2(n: usize) -> usize {
        n * (n - 1) / 2
    }

    #[test]
    fn test_pool_example_pair() {
        let mut pool = TunnelAddressPool::new("172.26.0.0/15".parse().unwrap(), 29).unwrap();
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 1, 1);

        let forward = pool.allocate_pair(a, b).unwrap();
        let reverse = pool.allocate_pair(b, a).unwrap();
        assert_eq!((forward.local, forward.remote), (reverse.remote, reverse.local));
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_pool_n_plus_one_exhausts() {
        // /26 holds eight /29 subnets
        let mut pool = TunnelAddressPool::new("10.99.0.0/26".parse().unwrap(), 29).unwrap();
        let mut subnets = HashSet::new();
        for i in 0..8u8 {
            let lease = pool
                .allocate_pair(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, i))
                .unwrap();
            assert!(subnets.insert(lease.subnet));
        }
        let err = pool
            .allocate_pair(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 200))
            .unwrap_err();
        assert!(matches!(err, MeshError::PoolExhausted { .. }));
    }

    #[test]
    fn test_full_mesh_tunnel_count() {
        for (n, k) in [(2u32, 1u32), (3, 2), (6, 2)] {
            let inventory = inventory(n, k);
            let mut sites = sites(&inventory);
            let report = TopologyBuilder::new(&inventory.settings)
                .unwrap()
                .build(&mut sites, &Topology::FullMesh)
                .unwrap();

            let (n, k) = (n as usize, k as usize);
            let total: usize = sites.iter().map(|s| s.tunnels.len()).sum();
            assert_eq!(total, 2 * c2(n) * k * k);
            assert_eq!(report.tunnels, total);
            assert_eq!(report.subnets_allocated as usize, c2(n) * k * k);
        }
    }

    #[test]
    fn test_hub_spoke_edge_set() {
        let inventory = inventory(7, 1);
        let hubs = ["site02", "site05", "site07"];
        let mut sites = sites(&inventory);
        let report = TopologyBuilder::new(&inventory.settings)
            .unwrap()
            .build(&mut sites, &Topology::hub_spoke(&hubs))
            .unwrap();

        let (h, s) = (3, 4);
        assert_eq!(report.site_pairs, c2(h) + h * s);

        let hub_set: HashSet<&str> = hubs.iter().copied().collect();
        let mut pairs = HashSet::new();
        for site in &sites {
            assert_eq!(site.is_hub, hub_set.contains(site.name.as_str()));
            for tunnel in &site.tunnels {
                assert!(
                    site.is_hub || hub_set.contains(tunnel.remote_site.as_str()),
                    "spoke {} connected to spoke {}",
                    site.name,
                    tunnel.remote_site
                );
                let mut pair = [site.name.clone(), tunnel.remote_site.clone()];
                pair.sort();
                pairs.insert(pair);
            }
        }
        assert_eq!(pairs.len(), c2(h) + h * s);
    }

    #[test]
    fn test_primary_flag_only_on_primary_pair() {
        let inventory = inventory(2, 2);
        let mut sites = sites(&inventory);
        TopologyBuilder::new(&inventory.settings)
            .unwrap()
            .build(&mut sites, &Topology::FullMesh)
            .unwrap();

        for site in &sites {
            assert_eq!(site.tunnels.len(), 4);
            for tunnel in &site.tunnels {
                let both_first = tunnel.source_wan.interface_name == "GigabitEthernet0/0"
                    && tunnel.destination_wan.interface_name == "GigabitEthernet0/0";
                assert_eq!(tunnel.is_primary, both_first);
            }
        }
    }

    #[test]
    fn test_tunnel_numbers_unique_per_site() {
        let inventory = inventory(5, 2);
        let mut sites = sites(&inventory);
        TopologyBuilder::new(&inventory.settings)
            .unwrap()
            .build(&mut sites, &Topology::FullMesh)
            .unwrap();

        for site in &sites {
            let names: HashSet<&str> = site.tunnels.iter().map(|t| t.name.as_str()).collect();
            assert_eq!(names.len(), site.tunnels.len());
            assert_eq!(site.tunnels_numbered() as usize, site.tunnels.len());
        }
    }

    #[test]
    fn test_tunnel_base_wraps_at_modulus() {
        let mut inventory = inventory(2, 1);
        inventory.sites[0].site_id = 99;
        let mut sites = sites(&inventory);
        let mut builder = TopologyBuilder::new(&inventory.settings).unwrap();
        builder.build(&mut sites, &Topology::FullMesh).unwrap();
        assert_eq!(sites[0].tunnels[0].number, 9900);

        let mut sites = sites_with_id(&inventory, 100);
        builder.build(&mut sites, &Topology::FullMesh).unwrap();
        // 100 * 100 wraps to 0 under the modulus
        assert_eq!(sites[0].tunnels[0].number, 0);
    }

    fn sites_with_id(inventory: &Inventory, site_id: u32) -> Vec<Site> {
        let mut inventory = inventory.clone();
        inventory.sites[0].site_id = site_id;
        sites(&inventory)
    }

    #[test]
    fn test_tunnel_overflow_error() {
        let mut inventory = inventory(3, 2);
        inventory.settings.tunnel_number_ceiling = 105;
        let mut sites = sites(&inventory);
        let err = TopologyBuilder::new(&inventory.settings)
            .unwrap()
            .build(&mut sites, &Topology::FullMesh)
            .unwrap_err();
        match err {
            MeshError::TunnelNumberOverflow { site, number, ceiling } => {
                assert_eq!(site, "site02");
                assert_eq!(number, 200);
                assert_eq!(ceiling, 105);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_render_is_byte_identical() {
        let inventory = inventory(4, 2);
        let network = build_network(&inventory, &Topology::hub_spoke(&["site01"])).unwrap();
        let renderer = DeviceConfigRenderer::new(&inventory.settings);

        for site in &network.sites {
            assert_eq!(renderer.render(site), renderer.render(site));
        }
        let router = InternetRouterRenderer::new(&inventory.settings);
        assert_eq!(router.render(&network.sites), router.render(&network.sites));
    }

    #[test]
    fn test_whole_pipeline_is_deterministic() {
        let run = || {
            let inventory = inventory(5, 2);
            let network = build_network(&inventory, &Topology::FullMesh).unwrap();
            render_all(&network.sites, &inventory.settings, true)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_one_bgp_neighbor_per_tunnel() {
        let inventory = inventory(3, 2);
        let network = build_network(&inventory, &Topology::FullMesh).unwrap();
        let renderer = DeviceConfigRenderer::new(&inventory.settings);

        for site in &network.sites {
            let config = renderer.render(site);
            assert_eq!(config.matches(" remote-as ").count(), site.tunnels.len());
            assert_eq!(config.matches("route-map PRIMARY-OUT out").count(), 2);
            assert_eq!(config.matches("route-map BACKUP-OUT out").count(), 6);
        }
    }

    #[test]
    fn test_internet_router_covers_every_wan() {
        let inventory = inventory(3, 2);
        let network = build_network(&inventory, &Topology::FullMesh).unwrap();
        let config = InternetRouterRenderer::new(&inventory.settings).render(&network.sites);

        assert_eq!(config.matches("\ninterface GigabitEthernet0/").count(), 6);
        assert!(config.contains("interface GigabitEthernet0/6\n"));
        assert_eq!(config.lines().filter(|l| l.starts_with(" network ")).count(), 6);
    }

    #[test]
    fn test_peer_to_peer_from_yaml() {
        let yaml = r#"
sites:
  - name: East
    site_id: 10
    location: BOS
    wan:
      - { interface: Gi0/0, address: 198.51.100.10/30, gateway: 198.51.100.9 }
      - { interface: Gi0/1, address: 198.51.100.14 255.255.255.252, gateway: 198.51.100.13 }
    local_networks: ["10.10.0.0/16"]
    bgp_as: [65010]
  - name: West
    site_id: 20
    location: SEA
    wan:
      - { interface: Gi0/0, address: 203.0.113.10/30, gateway: 203.0.113.9 }
    local_networks: ["10.20.0.0/16"]
    bgp_as: [65020]
  - name: North
    site_id: 30
    wan:
      - { interface: Gi0/0, address: 192.0.2.10/30, gateway: 192.0.2.9 }
    bgp_as: [65030]
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        let inventory = load_inventory(temp_file.path()).unwrap();

        let network = build_network(&inventory, &Topology::peer_to_peer(&["West", "East"])).unwrap();
        let by_name: HashMap<&str, &Site> = network.sites.iter().map(|s| (s.name.as_str(), s)).collect();
        assert_eq!(by_name.len(), 2);
        assert_eq!(by_name["East"].tunnels.len(), 2);
        assert_eq!(by_name["West"].tunnels.len(), 2);
        assert_eq!(by_name["East"].tunnels[0].name, "tunnel1000");
        assert_eq!(by_name["West"].tunnels[1].name, "tunnel2001");
        assert!(by_name["East"].wan_endpoints.iter().all(|w| w.track_id.is_some()));
    }
}
