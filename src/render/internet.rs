//! Upstream "internet" router configuration.
//!
//! The synthetic router owns the gateway address of every WAN uplink and
//! advertises each uplink network into BGP, so lab sites can reach each
//! other's WAN addresses.

use crate::config::Settings;
use crate::site::Site;

#[derive(Debug, Clone, Copy)]
pub struct InternetRouterRenderer<'a> {
    settings: &'a Settings,
}

impl<'a> InternetRouterRenderer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Render one interface per WAN endpoint, in site order then WAN order
    pub fn render(&self, sites: &[Site]) -> String {
        let name = &self.settings.internet_router_name;
        let as_number = self.settings.internet_router_as;
        let mut config = format!("!\n! Configuration for {name}\n! AS Number: {as_number}\n!\n");

        let uplinks: Vec<_> = sites
            .iter()
            .flat_map(|site| site.wan_endpoints.iter().map(move |wan| (site, wan)))
            .collect();

        for (index, (site, wan)) in uplinks.iter().enumerate() {
            config.push_str(&format!(
                "
interface GigabitEthernet0/{}
 description WAN-{} {} {}
 ip address {} {}
 no shutdown
",
                index + 1,
                site.name,
                wan.interface_name,
                wan.network(),
                wan.gateway,
                wan.netmask
            ));
        }

        config.push_str(&format!(
            "
router bgp {as_number}
 bgp log-neighbor-changes
 bgp bestpath compare-routerid
"
        ));
        for (_, wan) in &uplinks {
            config.push_str(&format!(
                " network {} mask {}\n",
                wan.network().network(),
                wan.netmask
            ));
        }

        config
    }
}
