//! Two-controller multipath failover walkthrough
//!
//! This example builds the ALUA layout of a dual-controller array, prints
//! the REPORT TARGET GROUPS response an initiator would see, then fails
//! controller A over and prints the response again.

use alua_target::{AluaRegistry, AluaState, CancelToken};

fn main() -> Result<(), alua_target::AluaError> {
    env_logger::init();

    let registry = AluaRegistry::new();
    let cancel = CancelToken::new();

    println!("Setting up a dual-controller array:");
    println!("  controller_a: ports 0x0101, 0x0102 (optimized for disk1)");
    println!("  controller_b: port  0x0201        (non-optimized for disk1)");
    println!();

    registry.create_group_with_id("controller_a", 0x0001, &cancel)?;
    registry.add_target("controller_a", "iqn.2025-12.local:ctrl-a.p1", 0x0101)?;
    registry.add_target("controller_a", "iqn.2025-12.local:ctrl-a.p2", 0x0102)?;
    registry.add_device_state("controller_a", "disk1", AluaState::ActiveOptimized)?;

    registry.create_group_with_id("controller_b", 0x0002, &cancel)?;
    registry.add_target("controller_b", "iqn.2025-12.local:ctrl-b.p1", 0x0201)?;
    registry.add_device_state("controller_b", "disk1", AluaState::ActiveNonOptimized)?;

    let response = registry.report_target_groups("disk1", 0)?;
    println!("REPORT TARGET GROUPS for disk1 ({} bytes):", response.len());
    println!("  {}", hex::encode(&response));
    println!();

    println!("Failing over: controller_a -> unavailable, controller_b -> active");
    registry.set_group_state("controller_a", AluaState::Unavailable)?;
    registry.set_group_state("controller_b", AluaState::ActiveOptimized)?;

    let response = registry.report_target_groups("disk1", 0)?;
    println!("REPORT TARGET GROUPS for disk1 ({} bytes):", response.len());
    println!("  {}", hex::encode(&response));
    println!();

    for name in registry.group_names() {
        let info = registry.lookup_group(&name)?;
        println!(
            "  group '{}' (id {:#06x}): state {}, {} ports, {} devices",
            info.name, info.group_id, info.state, info.target_count, info.device_count
        );
    }

    Ok(())
}
