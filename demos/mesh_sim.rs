use std::collections::VecDeque;
use std::time::Duration;

use meshnode::board::SimBoard;
use meshnode::radio::SimRadio;
use meshnode::{logging, Node, NodeConfig, NodeId};

const SENSOR: usize = 0;
const RELAY: usize = 1;
const GATEWAY: usize = 2;

/// Nodes within radio range of each other: sensor <-> relay <-> gateway
fn neighbours(idx: usize) -> &'static [usize] {
    match idx {
        SENSOR => &[RELAY],
        RELAY => &[SENSOR, GATEWAY],
        _ => &[RELAY],
    }
}

fn main() {
    if let Err(e) = logging::init(true) {
        eprintln!("{}", e);
    }

    let base = NodeConfig {
        backoff_min: Duration::from_millis(50),
        backoff_max: Duration::from_millis(300),
        heartbeat_period: Some(Duration::from_secs(5)),
        frame_selftest: true,
        ..NodeConfig::default()
    };
    let configs = [
        NodeConfig { node_id: NodeId(1), ..base.clone() },
        NodeConfig { node_id: NodeId(2), ..base.clone() },
        NodeConfig { node_id: NodeId(10), is_gateway: true, ..base.clone() },
    ];

    let mut nodes: Vec<Node<SimRadio, SimBoard>> = Vec::new();
    for (idx, config) in configs.into_iter().enumerate() {
        let board = SimBoard::new(0x10 + idx as u8, 3900);
        match Node::with_seed(config, SimRadio::new(), board, idx as u64) {
            Ok(mut node) => {
                if let Err(e) = node.start() {
                    eprintln!("Radio init failed on node {}: {}", idx, e);
                }
                nodes.push(node);
            }
            Err(e) => {
                eprintln!("Invalid configuration for node {}: {}", idx, e);
                return;
            }
        }
    }

    let mut serial: Vec<VecDeque<u8>> = vec![VecDeque::new(); nodes.len()];
    let scan_lines = [(500u32, "433, 868"), (4000, "915"), (8000, "433 434 435 436 437 438")];

    println!("Simulating 12 s: sensor -> relay -> gateway");
    let mut now_ms = 0u32;
    while now_ms <= 12_000 {
        for (at, line) in scan_lines.iter() {
            if *at == now_ms {
                serial[SENSOR].extend(line.bytes());
                serial[SENSOR].push_back(b'\n');
            }
        }
        // Battery sags on the sensor halfway through
        if now_ms == 6000 {
            nodes[SENSOR].board_mut().battery_mv = 3200;
        }

        for (node, input) in nodes.iter_mut().zip(serial.iter_mut()) {
            node.tick(now_ms, input);
        }

        // Deliver everything transmitted this tick to the neighbours
        for idx in 0..nodes.len() {
            let frames = nodes[idx].radio_mut().take_sent();
            for frame in frames {
                for &peer in neighbours(idx) {
                    nodes[peer].radio_mut().inbox.push_back(frame.clone());
                }
            }
        }

        now_ms += 10;
    }

    let names = ["sensor", "relay", "gateway"];
    for (name, node) in names.iter().zip(nodes.iter()) {
        match serde_json::to_string(&node.stats()) {
            Ok(json) => println!("{:<8} {}", name, json),
            Err(e) => eprintln!("Failed to serialize stats: {}", e),
        }
    }

    println!(
        "gateway received {} reports, relay forwarded {} frames",
        nodes[GATEWAY].stats().reports_received,
        nodes[RELAY].stats().relayed
    );
}
