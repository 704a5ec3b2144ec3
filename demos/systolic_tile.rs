//! Load two weight tiles into a systolic cluster and broadcast one
//! activation stream past both.
//!
//! ```bash
//! cargo run --example systolic_tile
//! ```

use atreides_sim::config::GpuConfig;
use atreides_sim::fixed::{from_f64, to_f64};
use atreides_sim::systolic::{ClusterInputs, SystolicCluster};

fn print_tile(title: &str, words: &[u16], n: usize) {
    println!("{}:", title);
    for row in words.chunks(n) {
        let cells: Vec<String> = row.iter().map(|w| format!("{:+.4}", to_f64(*w))).collect();
        println!("  [{}]", cells.join(", "));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = GpuConfig::default();
    let n = config.array_size;
    let mut cluster = SystolicCluster::from_config(&config);

    let tiles: Vec<Vec<u16>> = (0..cluster.num_arrays())
        .map(|t| {
            (0..n * n)
                .map(|i| from_f64(0.125 * ((i + t) % 4) as f64 - 0.125))
                .collect()
        })
        .collect();
    for (t, tile) in tiles.iter().enumerate() {
        cluster.load_weights(t, tile);
        print_tile(&format!("Weights, array {}", t), tile, n);
    }

    let activations: Vec<u16> = (0..n * n).map(|i| from_f64(0.5 - 0.0625 * i as f64)).collect();
    print_tile("Activations", &activations, n);

    let zeros = vec![0u16; n];
    let mut clear = ClusterInputs::broadcast(&zeros, &zeros);
    clear.clear_acc = true;
    cluster.clock(&clear);

    let cycles = 1 + cluster.stream_activations(&activations, n);

    for t in 0..cluster.num_arrays() {
        print_tile(&format!("Accumulators, array {}", t), &cluster.results(t), n);
    }
    println!("{} edges after weight load", cycles);
}
