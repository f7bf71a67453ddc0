//! Inspect the interfaces of another process's network namespace
//!
//! Run with: sudo cargo run --example inspect_pid -- <pid>

use netjoin_core::ProcessId;
use netjoin_namespace::NamespaceHandle;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let pid: ProcessId = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "1".to_string())
        .parse()?;

    if !is_root() {
        println!("⚠️  Joining a foreign namespace needs CAP_SYS_ADMIN, expect EPERM");
    }

    println!("🔍 Interfaces of PID {pid}");
    println!("{:-<60}", "");

    let handle = NamespaceHandle::open(pid)?;
    for iface in handle.interfaces()? {
        let mac = iface
            .hardware_addr
            .map_or_else(String::new, |addr| addr.to_string());
        println!(
            "  {:>3} {:<16} {:<17} up={} running={}",
            iface.index, iface.name, mac, iface.up, iface.running
        );
    }
    handle.close()?;

    Ok(())
}
