//! Step the 2x2 FMA matmul kernel cycle by cycle and print every snapshot.
//!
//! ```bash
//! cargo run --example trace_matmul
//! ```

use anyhow::Result;

use atreides_sim::config::GpuConfig;
use atreides_sim::gpu::{format_memory, Gpu};
use atreides_sim::isa::disassemble;
use atreides_sim::testing::kernels;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let kernel = kernels::matmul_mixed();
    println!("{}: {}", kernel.name, kernel.description);
    for (pc, word) in kernel.program.iter().enumerate() {
        println!("  {:2}: {:04X}  {}", pc, word, disassemble(*word));
    }
    println!();

    let config = GpuConfig {
        num_cores: 1,
        ..Default::default()
    };
    let mut gpu = Gpu::new(config)?;
    gpu.load_program(&kernel.program)?;
    gpu.load_data(0, &kernel.data)?;
    print!("{}", format_memory(&gpu.data_memory().dump(0, 12), 0, "Initial data"));

    gpu.launch(kernel.thread_count);
    while !gpu.is_done() {
        gpu.step();
        print!("{}", gpu.snapshot());
        if gpu.cycles() > 2_000 {
            anyhow::bail!("kernel did not finish");
        }
    }

    println!();
    print!("{}", format_memory(&gpu.data_memory().dump(8, 4), 8, "Result C"));
    println!("Expected: {:04X?}", kernel.expected);
    println!();
    print!("{}", gpu.stats());
    Ok(())
}
