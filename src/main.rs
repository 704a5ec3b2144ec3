//! atreides-sim: cycle-accurate simulator for the Atreides SIMT GPU

use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};

use atreides_sim::config::{Config, GpuConfig, Variant};
use atreides_sim::gpu::{format_memory, Gpu};
use atreides_sim::isa::disassemble;
use atreides_sim::memory::MemoryImage;
use atreides_sim::testing::{self, kernels, KernelOutcome};

const USAGE: &str = "\
Usage: atreides-sim <command> [options]

Commands:
  run <program> --threads N [--data <image>] [--variant v1|v2]
                [--dump START:COUNT] [--stats]
                                 Run a program image
  kernel <name|all> [--variant v1|v2]
                                 Run built-in kernels and check their results
  disasm <program>               Disassemble a program image
  config                         Print a sample configuration file

Images are text hex (one or more 16-bit words per line, '#' or '//'
comments, '@addr' origins) or raw little-endian words when named *.bin.

Set RUST_LOG=trace for a per-cycle trace.";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    match command.as_str() {
        "run" => cmd_run(rest),
        "kernel" => cmd_kernel(rest),
        "disasm" => cmd_disasm(rest),
        "config" => cmd_config(),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Value following `flag`, if present.
fn option<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => match args.get(i + 1) {
            Some(value) => Ok(Some(value.as_str())),
            None => bail!("{} needs a value", flag),
        },
        None => Ok(None),
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = !matches!(arg.as_str(), "--stats");
            continue;
        }
        return Some(arg.as_str());
    }
    None
}

/// Resolve the layered configuration, then apply a `--variant` override.
fn load_config(args: &[String]) -> Result<GpuConfig> {
    let mut config = Config::get().clone();
    if let Some(variant) = option(args, "--variant")? {
        let variant: Variant = variant.parse()?;
        config.variant = Some(variant);
        config.program_addr_bits = None;
        config.data_addr_bits = None;
    }
    Ok(config.resolve()?)
}

fn load_image(path: &str) -> Result<MemoryImage> {
    MemoryImage::from_file(Path::new(path)).with_context(|| format!("loading {}", path))
}

fn parse_dump(range: &str) -> Result<(u16, usize)> {
    let (start, count) = range
        .split_once(':')
        .with_context(|| format!("--dump expects START:COUNT, got '{}'", range))?;
    let start = parse_number(start).with_context(|| format!("bad dump start '{}'", start))?;
    let count = parse_number(count).with_context(|| format!("bad dump count '{}'", count))?;
    Ok((start as u16, count as usize))
}

fn parse_number(text: &str) -> Result<u32> {
    let text = text.trim();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => text.parse()?,
    };
    Ok(value)
}

fn cmd_run(args: &[String]) -> Result<()> {
    let Some(program_path) = positional(args) else {
        bail!("run needs a program image\n\n{}", USAGE);
    };
    let threads = option(args, "--threads")?.context("run needs --threads N")?;
    let threads: u8 = threads
        .parse()
        .with_context(|| format!("--threads must be 0..=255, got '{}'", threads))?;
    let config = load_config(args)?;

    let program = load_image(program_path)?;
    let mut gpu = Gpu::new(config)?;
    gpu.load_program(&program.flatten())
        .with_context(|| format!("loading {} into program memory", program_path))?;
    if let Some(data_path) = option(args, "--data")? {
        let data = load_image(data_path)?;
        gpu.load_data_image(&data)
            .with_context(|| format!("loading {} into data memory", data_path))?;
    }

    gpu.launch(threads);
    let stats = gpu.run()?;
    println!("Done after {} cycles", stats.cycles);

    if let Some(range) = option(args, "--dump")? {
        let (start, count) = parse_dump(range)?;
        print!("{}", format_memory(&gpu.data_memory().dump(start, count), start, "Data memory"));
    }

    if args.iter().any(|a| a == "--stats") {
        println!();
        print!("{}", stats);
        let program_grants = gpu.program_arbiter().stats();
        let data_grants = gpu.data_arbiter().stats();
        println!(
            "Program controller: {} grants, {} contention cycles",
            program_grants.total_grants(),
            program_grants.contention_cycles
        );
        println!(
            "Data controller:    {} grants (reads {:?}, writes {:?}), {} contention cycles",
            data_grants.total_grants(),
            data_grants.read_grants,
            data_grants.write_grants,
            data_grants.contention_cycles
        );
        for d in gpu.divergences() {
            println!(
                "Divergence: core {} block {} pc {} targets {:?} -> {}",
                d.core,
                d.block_id,
                d.pc,
                d.targets.as_slice(),
                d.taken
            );
        }
    }
    Ok(())
}

fn cmd_kernel(args: &[String]) -> Result<()> {
    let name = positional(args).unwrap_or("all");
    let config = load_config(args)?;

    let selected = if name == "all" {
        kernels::all()
    } else {
        match kernels::by_name(name) {
            Some(kernel) => vec![kernel],
            None => {
                let names: Vec<_> = kernels::all().iter().map(|k| k.name).collect();
                bail!("unknown kernel '{}' (available: {})", name, names.join(", "));
            }
        }
    };

    let mut failed = 0;
    for kernel in &selected {
        let outcome = testing::run_kernel(kernel, &config);
        match &outcome {
            KernelOutcome::Pass { cycles } => {
                println!("PASS  {:<20} {:>6} cycles  {}", kernel.name, cycles, kernel.description);
            }
            KernelOutcome::Mismatch { cycles, mismatches } => {
                failed += 1;
                println!("FAIL  {:<20} {:>6} cycles  {} wrong words", kernel.name, cycles, mismatches.len());
                for m in mismatches {
                    println!(
                        "        mem[{}] = 0x{:04X}, expected 0x{:04X}",
                        m.address, m.actual, m.expected
                    );
                }
            }
            KernelOutcome::Fail { message, cycles } => {
                failed += 1;
                println!("FAIL  {:<20} {:>6} cycles  {}", kernel.name, cycles, message);
            }
            KernelOutcome::Timeout { cycles } => {
                failed += 1;
                println!("TIME  {:<20} {:>6} cycles", kernel.name, cycles);
            }
            KernelOutcome::LoadError { message } => {
                failed += 1;
                println!("LOAD  {:<20} {}", kernel.name, message);
            }
        }
    }

    println!();
    println!("{}/{} kernels passed", selected.len() - failed, selected.len());
    if failed > 0 {
        bail!("{} kernel(s) failed", failed);
    }
    Ok(())
}

fn cmd_disasm(args: &[String]) -> Result<()> {
    let Some(path) = positional(args) else {
        bail!("disasm needs a program image\n\n{}", USAGE);
    };
    let image = load_image(path)?;
    for segment in &image.segments {
        for (i, word) in segment.words.iter().enumerate() {
            let addr = segment.base as usize + i;
            println!("{:04X}:  {:04X}  {}", addr, word, disassemble(*word));
        }
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    print!("{}", Config::sample_config());
    println!();
    match Config::user_config_path() {
        Some(path) => println!("# User config path: {}", path.display()),
        None => println!("# No user config directory on this platform"),
    }
    let resolved = Config::get().resolve()?;
    println!("# Effective configuration:");
    for line in toml::to_string(&resolved)?.lines() {
        println!("#   {}", line);
    }
    Ok(())
}
