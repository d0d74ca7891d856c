use netdev::Interface;
use std::net::Ipv4Addr;

/// An IPv4 address assigned to a usable local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub address: Ipv4Addr,
}

/// IPv4 addresses of interfaces that are up, not loopback and not
/// point-to-point, in the order the OS reports them.
pub fn list_local_interfaces() -> Vec<LocalInterface> {
    netdev::get_interfaces()
        .into_iter()
        .filter(is_listenable)
        .flat_map(|iface| {
            let name = iface.name.clone();
            iface
                .ipv4
                .into_iter()
                .map(move |net| LocalInterface {
                    name: name.clone(),
                    address: net.addr(),
                })
        })
        .collect()
}

pub fn list_local_ipv4_addresses() -> Vec<Ipv4Addr> {
    list_local_interfaces()
        .into_iter()
        .map(|iface| iface.address)
        .collect()
}

fn is_listenable(iface: &Interface) -> bool {
    iface.is_up() && !iface.is_loopback() && !iface.is_point_to_point()
}
