//! vpu-emu: drive a segment transfer through the vector memory pipeline.

use std::env;

use anyhow::{bail, Context};
use vpu_emu::isa::{Direction, InstructionGenerator, Lmul, SegmentDescriptor, Sew};
use vpu_emu::{Config, Vpu};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = Config::load();

    // Defaults mirror the reference validation run: 20 segments of 160
    // bytes, 5120 bytes apart, loaded from the memory base.
    let mut pattern_path: Option<String> = None;
    let mut direction = Direction::Load;
    let mut segments = 20u64;
    let mut stride = 5120u64;
    let mut length = 160u64;
    let mut mem_base = config.mem_base;
    let mut vrf_base = 0u64;
    let mut sew_bits = 8u32;
    let mut lmul_value = 1u64;
    let mut print_program = false;
    let mut dump_mem = false;
    let mut dump_vrf = false;
    let mut dump_layout = false;

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        let mut numeric = |name: &str| -> anyhow::Result<u64> {
            let value = iter
                .next()
                .with_context(|| format!("{name} needs a value"))?;
            parse_number(value).with_context(|| format!("bad value for {name}: {value}"))
        };
        match arg.as_str() {
            "--store" => direction = Direction::Store,
            "--segments" => segments = numeric("--segments")?,
            "--stride" => stride = numeric("--stride")?,
            "--length" => length = numeric("--length")?,
            "--base" => mem_base = numeric("--base")?,
            "--vrf-base" => vrf_base = numeric("--vrf-base")?,
            "--sew" => sew_bits = numeric("--sew")? as u32,
            "--lmul" => lmul_value = numeric("--lmul")?,
            "--print-program" => print_program = true,
            "--dump-mem" => dump_mem = true,
            "--dump-vrf" => dump_vrf = true,
            "--dump-layout" => dump_layout = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other if !other.starts_with('-') => pattern_path = Some(other.to_string()),
            other => bail!("unknown option {other} (see --help)"),
        }
    }

    let sew = Sew::from_bits(sew_bits).with_context(|| format!("unsupported SEW {sew_bits}"))?;
    let lmul = match lmul_value {
        1 => Lmul::M1,
        2 => Lmul::M2,
        4 => Lmul::M4,
        8 => Lmul::M8,
        other => bail!("unsupported LMUL {other} (expected 1, 2, 4 or 8)"),
    };

    let mut vpu = Vpu::new(&config)?;

    if let Some(path) = &pattern_path {
        let pattern = std::fs::read(path).with_context(|| format!("reading pattern {path}"))?;
        vpu.preload(&pattern)?;
        log::info!("Preloaded {} bytes from {path}", pattern.len());
    }

    let mut generator = InstructionGenerator::new(config.vlen);
    generator.vset(sew, lmul)?;

    let descriptor = SegmentDescriptor {
        count: segments,
        stride_bytes: stride,
        length_bytes: length,
        mem_base,
        vrf_base,
    };
    let program = generator.generate(&descriptor, direction)?;
    println!(
        "Generated {} instructions for {} segments of {} B ({})",
        program.len(),
        segments,
        length,
        match direction {
            Direction::Load => "load",
            Direction::Store => "store",
        }
    );

    if print_program {
        for instruction in &program {
            println!("{instruction}");
        }
    }

    vpu.run(&program)?;
    println!("Run complete.");

    if dump_layout {
        print!("{}", vpu.vrf.layout_map());
    }
    if dump_vrf {
        print!("{}", vpu.vrf.dump());
    }
    if dump_mem {
        print!("{}", vpu.memory.dump());
    }

    Ok(())
}

/// Parse a decimal or `0x`-prefixed hex number.
fn parse_number(text: &str) -> anyhow::Result<u64> {
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)?
    } else {
        text.parse()?
    };
    Ok(value)
}

fn print_usage() {
    println!("vpu-emu [pattern.bin] [options]");
    println!();
    println!("Options:");
    println!("  --store            generate a store stream (default: load)");
    println!("  --segments N       number of runs (default 20)");
    println!("  --stride N         bytes between run starts (default 5120)");
    println!("  --length N         bytes per run (default 160)");
    println!("  --base ADDR        main-memory address of the first run");
    println!("  --vrf-base ADDR    register-file byte address (default 0)");
    println!("  --sew N            element width in bits (default 8)");
    println!("  --lmul N           register-group multiplier (default 1)");
    println!("  --print-program    print the generated mnemonics");
    println!("  --dump-mem         dump memory contents after the run");
    println!("  --dump-vrf         dump register-file contents after the run");
    println!("  --dump-layout      print the element layout map");
}
