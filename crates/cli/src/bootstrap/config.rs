use anyhow::Context;
use ecs_forwarder_domain::{CliOverrides, Config};
use ecs_forwarder_infrastructure::system::list_local_interfaces;

/// Load the layered configuration. Validation is left to the caller so a
/// missing bind address can be reported with the list of candidates first.
pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, overrides).context("Failed to load configuration")?;
    Ok(config)
}

/// Print the IPv4 addresses the forwarder could listen on.
pub fn print_local_addresses() {
    let interfaces = list_local_interfaces();

    if interfaces.is_empty() {
        println!("No usable IPv4 interfaces found");
        return;
    }

    println!("Available local IPv4 addresses:");
    for iface in interfaces {
        println!("  {:<15}  ({})", iface.address, iface.name);
    }
}
