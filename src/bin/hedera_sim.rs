use std::collections::HashMap;
use std::error::Error;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hedera_rs::ctrl::{Controller, ControllerConfig, PacketOutcome, Scheme};
use hedera_rs::net::{MacAddr, NodeName, Packet};
use hedera_rs::routing::{Path, PathChoice};
use hedera_rs::sched::LinkKey;
use hedera_rs::sim::{ControllerWorld, HostSend, SimTime, Simulator, SwitchUp};
use hedera_rs::topo::fat_tree::{FatTreeOpts, build_fat_tree};
use hedera_rs::traffic::{Results, TrafficMatrix, estimate_throughputs, mean, stddev};

const IPERF_PORT_BASE: u16 = 5001;
const CLIENT_PORT_BASE: u16 = 40000;

#[derive(Debug, Parser)]
#[command(
    name = "hedera-sim",
    about = "Run a traffic matrix through the reactive GFF controller on a simulated fat tree"
)]
struct Args {
    /// Fat-tree arity (even)
    #[arg(long, default_value_t = 4)]
    k: usize,

    /// Traffic matrix JSON (sender index -> receiver indices); defaults to stride 1
    #[arg(long)]
    traffic: Option<PathBuf>,

    /// Controller config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override placement scheme: gff or ecmp
    #[arg(long)]
    scheme: Option<Scheme>,

    /// Override path choice: st, random or hashed
    #[arg(long)]
    routing: Option<PathChoice>,

    /// Link speed used for the throughput estimate
    #[arg(long, default_value_t = 1.0)]
    link_gbps: f64,

    /// Merge `{scheme}_mean_gbps` / `{scheme}_stddev_gbps` into this JSON file
    #[arg(long)]
    results: Option<PathBuf>,
}

fn host_frame(src: NodeName, dst: NodeName, src_port: u16, dst_port: u16) -> Vec<u8> {
    Packet::udp(src.mac(), dst.mac(), src.ip(), dst.ip(), src_port, dst_port).to_bytes()
}

fn path_str(path: &[NodeName]) -> String {
    path.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join("->")
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(p) => ControllerConfig::from_json_file(p)?,
        None => ControllerConfig::default(),
    };
    if let Some(s) = args.scheme {
        config.scheme = s;
    }
    if let Some(r) = args.routing {
        config.routing = r;
    }
    let scheme = config.scheme;

    let fat = build_fat_tree(&FatTreeOpts { k: args.k })?;
    let n = fat.hosts.len();
    let pairs = match &args.traffic {
        Some(p) => TrafficMatrix::load(p)?.pairs(n)?,
        None => (0..n).map(|i| (i, (i + 1) % n)).collect(),
    };

    let mut sim = Simulator::default();
    let mut world = ControllerWorld::new(Controller::new(fat.topo.clone(), config));

    for (i, sw) in fat.topo.switches().into_iter().enumerate() {
        sim.schedule(SimTime::from_micros(i as u64), SwitchUp { dpid: sw.dpid() });
    }

    // 每台主机先广播一次，让控制器学到 MAC 位置
    let announce_at = SimTime::from_millis(1);
    for (i, &host) in fat.hosts.iter().enumerate() {
        let data = Packet::arp(host.mac(), MacAddr::BROADCAST).to_bytes();
        sim.schedule(
            announce_at.saturating_add(SimTime::from_micros(10 * i as u64)),
            HostSend { host, data },
        );
    }

    let flows_at = SimTime::from_millis(10);
    let again_at = SimTime::from_millis(50);
    let mut flow_ids: Vec<(NodeName, NodeName, u16)> = Vec::new();
    for (i, &(s, d)) in pairs.iter().enumerate() {
        if s == d {
            continue;
        }
        let (src, dst) = (fat.hosts[s], fat.hosts[d]);
        let dst_port = IPERF_PORT_BASE.wrapping_add(i as u16);
        let src_port = CLIENT_PORT_BASE.wrapping_add(i as u16);
        let offset = SimTime::from_micros(10 * i as u64);
        for base in [flows_at, again_at] {
            sim.schedule(
                base.saturating_add(offset),
                HostSend {
                    host: src,
                    data: host_frame(src, dst, src_port, dst_port),
                },
            );
        }
        flow_ids.push((src, dst, dst_port));
    }

    sim.run(&mut world);

    let mut installed: HashMap<(Ipv4Addr, Ipv4Addr, u16), Path> = HashMap::new();
    for rec in &world.packet_ins {
        let (Some(pkt), PacketOutcome::Forwarded { path: Some(path), .. }) =
            (&rec.packet, &rec.outcome)
        else {
            continue;
        };
        let Some(ip) = pkt.ipv4() else {
            continue;
        };
        let Some((_, dst_port)) = ip.l4.ports() else {
            continue;
        };
        installed
            .entry((ip.src, ip.dst, dst_port))
            .or_insert_with(|| path.clone());
    }

    let mut flow_links = Vec::new();
    for &(src, dst, dst_port) in &flow_ids {
        let Some(path) = installed.get(&(src.ip(), dst.ip(), dst_port)) else {
            println!("flow {src} -> {dst} port {dst_port} unrouted");
            continue;
        };
        println!("flow {src} -> {dst} port {dst_port} path {}", path_str(path));
        let mut hops = vec![src];
        hops.extend(path.iter().copied());
        hops.push(dst);
        flow_links.push(
            hops.windows(2)
                .map(|w| LinkKey::new(w[0], w[1]))
                .collect::<Vec<_>>(),
        );
    }

    let stats = world.controller.stats();
    println!(
        "summary scheme={} k={} flows={} routed={} packet_ins={} floods={} rules_installed={} delivered={} dropped={} max_link_usage={:.3}",
        scheme,
        args.k,
        flow_ids.len(),
        flow_links.len(),
        stats.packet_ins,
        stats.floods,
        stats.rules_installed,
        world.fabric.total_delivered(),
        world.fabric.dropped,
        world.controller.scheduler().max_link_usage(),
    );

    let rates = estimate_throughputs(&flow_links, args.link_gbps);
    let (mean_gbps, stddev_gbps) = (mean(&rates), stddev(&rates));
    println!("throughput mean_gbps={mean_gbps:.4} stddev_gbps={stddev_gbps:.4}");

    if let Some(path) = &args.results {
        let mut results = Results::load_or_default(path)?;
        results.record(&scheme.to_string(), mean_gbps, stddev_gbps);
        results.save(path)?;
        println!("results saved to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hedera-sim: {e}");
            ExitCode::FAILURE
        }
    }
}
