use poolnet::observer::{render_grid, NetworkAdapter};
use poolnet::prelude::*;

const SIZE: u32 = 256;
const ROW: u32 = 16;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }

    let (command, rest) = match args.get(1) {
        Some(c) => (c.as_str(), &args[2..]),
        None => ("demo", &args[1..]),
    };
    let steps = match rest.first().map(|s| s.parse::<usize>()) {
        None => 600,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("Invalid step count: {e}");
            std::process::exit(2);
        }
    };

    match command {
        "demo" => run_demo(steps, false),
        "stats-json" => run_demo(steps, true),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }
}

fn print_help() {
    println!("poolnet demo");
    println!();
    println!("USAGE:");
    println!("  poolnet [demo] [steps]      run the shape sequence demo");
    println!("  poolnet stats-json [steps]  run the demo and print stats as JSON");
    println!("  poolnet --help              show this help");
}

/// Three shapes shown in blocks of repeated frames, the way a sorted dataset
/// presents one label after another.
fn shape(kind: usize, shift: u32) -> SparseVector {
    let mut input = SparseVector::default();
    for i in 0..ROW {
        let (x, y) = match kind {
            0 => (i, 7 + shift % 3),
            1 => (4 + shift % 3, i),
            _ => (i, i),
        };
        input.insert(y * ROW + x + 1, 1.0);
    }
    input
}

fn run_demo(steps: usize, json: bool) {
    let config = NetworkConfig::single(SIZE, "A2", ROW, 2).with_seed(42);
    let mut network = match Network::new(config) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Invalid network: {e}");
            std::process::exit(1);
        }
    };

    let labels = ["horizontal", "vertical", "diagonal"];
    for t in 0..steps {
        let kind = (t / 20) % labels.len();
        let input = shape(kind, t as u32);
        network.timestep(&[input], Some(labels[kind]));
    }

    if json {
        match serde_json::to_string_pretty(&network.stats()) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to serialize stats: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let snapshot = NetworkAdapter::new(&network).snapshot();
    println!("{}", snapshot.stats);
    for layer in &snapshot.layers {
        println!();
        println!(
            "layer {}  output {}  unpredicted {}  thinking {}  ({:.2}%)",
            layer.id,
            layer.output.len(),
            layer.unpredicted.len(),
            layer.thinking.len(),
            layer.output_ratio * 100.0
        );
        println!("{}", render_grid(SIZE, ROW, layer.output.iter().copied()));
    }
}
