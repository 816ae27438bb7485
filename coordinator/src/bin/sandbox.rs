//! Sandbox harness: runs the zone manager against the in-memory
//! loopback transport with scripted peers, then prints the resulting
//! assignment table. Useful for eyeballing the protocol without a real
//! transport.

use clap::Parser;
use coordinator::loopback::{LoopbackTransport, PeerScript};
use coordinator::manager::{LocalZoneEvent, ZoneManager, ZoneManagerConfig};
use coordinator::zone::AuthorityRef;
use log::info;
use shared::Vec3;
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Number of simulated peer servers
    #[clap(short, long, default_value = "3")]
    peers: u32,
    /// Number of zones laid out along the x axis
    #[clap(short, long, default_value = "4")]
    zones: u32,
    /// Spacing between zone centers
    #[clap(short, long, default_value = "1000.0")]
    spacing: f32,
    /// Also register the local process as a zone candidate
    #[clap(long)]
    with_self: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let transport = LoopbackTransport::start(Duration::from_secs(5));
    let config = ZoneManagerConfig::new("127.0.0.1:9000".parse()?);
    let (manager, handle, mut local_events) = ZoneManager::new(config, transport.handle());
    tokio::spawn(manager.run());

    // Zones first: they queue up unassigned until candidates appear.
    for i in 0..args.zones {
        let center = Vec3::new(i as f32 * args.spacing, 0.0, 0.0);
        let descriptor = handle.create_zone(center).await?;
        info!("Requested zone {} at x={}", descriptor.id, center.x);
    }

    if args.with_self {
        handle.add_self();
    }

    for peer in 0..args.peers {
        transport.set_script(peer, PeerScript::Accept(format!("10.0.0.{}:7000", peer + 1)));
        handle.peer_connected(peer, format!("192.168.0.{}:7000", peer + 1).parse()?);
    }

    // Let the handshakes settle.
    sleep(Duration::from_millis(100)).await;

    println!("zone        authority         public address        available");
    for status in handle.zones().await? {
        let authority = match status.authority {
            Some(AuthorityRef::Local) => "local".to_string(),
            Some(AuthorityRef::Remote(peer)) => format!("peer {}", peer),
            None => "-".to_string(),
        };
        println!(
            "{:<10}  {:<16}  {:<20}  {}",
            status.descriptor.id,
            authority,
            status.descriptor.public_addr.as_deref().unwrap_or("-"),
            status.available
        );
    }

    while let Ok(event) = local_events.try_recv() {
        match event {
            LocalZoneEvent::ZoneAssigned(zone) => {
                println!("local zone server took zone {}", zone.id)
            }
            LocalZoneEvent::PeerAdded(zone) => {
                println!("local zone server learned of neighbor {}", zone.id)
            }
        }
    }

    let probe = Vec3::new(50.0, 0.0, 0.0);
    match handle.find_zone(probe).await? {
        Some(status) => println!(
            "lookup at x={} -> zone {} ({})",
            probe.x,
            status.descriptor.id,
            status.descriptor.public_addr.as_deref().unwrap_or("-")
        ),
        None => println!("lookup at x={} -> no authority available", probe.x),
    }

    handle.shutdown();
    Ok(())
}
