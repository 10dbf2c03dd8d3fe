//! `hlscnn`: run the `cnn_top` MNIST core on a KV260 and report accuracy.
//!
//! ```text
//! USAGE:
//!   hlscnn evaluate -w weights.bin -i images.bin -l labels.bin   Classify a test set
//!   hlscnn evaluate ... --simulate                                Dry run, no hardware
//!   hlscnn map                                                    Print the address map
//! ```
//!
//! Exit status: 0 when the run completes (whatever the accuracy), 2 when the
//! device cannot be opened or mapped, 1 for any other failure.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hlscnn_driver::{
    dataset::TestSetSource, DevMemBus, EngineConfig, EvaluationHarness, EvaluationReport,
    HlsCnnError, ImageFormat, InferenceEngine, LabelFormat, MemoryMap, PollPolicy, RegisterBus,
    SampleOutcome, SimulatedCore, DEFAULT_DEVICE,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const RULE: &str = "========================================";

/// Exit status when the device cannot be brought up.
const EXIT_DEVICE_UNAVAILABLE: u8 = 2;

#[derive(Parser)]
#[command(name = "hlscnn", about = "KV260 HLS CNN accelerator driver", version)]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    hw: HardwareArgs,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args)]
struct HardwareArgs {
    /// Physical memory device node.
    #[arg(long, env = "HLSCNN_DEVICE", default_value = DEFAULT_DEVICE, global = true)]
    device: PathBuf,

    /// `s_axi_control` base address.
    #[arg(long, value_parser = parse_address, global = true)]
    ctrl_base: Option<u64>,

    /// Image staging BRAM base address.
    #[arg(long, value_parser = parse_address, global = true)]
    image_base: Option<u64>,

    /// Weight staging BRAM base address.
    #[arg(long, value_parser = parse_address, global = true)]
    weights_base: Option<u64>,

    /// Address increment between staged elements (1 for the shipped bitstream).
    #[arg(long, global = true)]
    stride: Option<u64>,

    /// Give up waiting for ap_done after this many milliseconds (default: wait forever).
    #[arg(long, env = "HLSCNN_POLL_TIMEOUT_MS", global = true)]
    poll_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load weights, classify a labelled test set and print the accuracy report.
    Evaluate(EvaluateArgs),
    /// Print the resolved address map and register layout.
    Map,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Weight dump: little-endian Q16.16 words.
    #[arg(short, long)]
    weights: PathBuf,

    /// Test images.
    #[arg(short, long)]
    images: PathBuf,

    /// Test labels.
    #[arg(short, long)]
    labels: PathBuf,

    /// Image file encoding.
    #[arg(long, value_enum, default_value_t = ImageArg::Fixed)]
    image_format: ImageArg,

    /// Label file encoding.
    #[arg(long, value_enum, default_value_t = LabelArg::Raw)]
    label_format: LabelArg,

    /// Evaluate at most this many samples.
    #[arg(short = 'n', long, default_value_t = hlscnn_chip::layout::DEFAULT_TEST_IMAGES)]
    limit: usize,

    /// Run against the software core instead of /dev/mem.
    #[arg(long)]
    simulate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImageArg {
    /// Raw Q16.16 words, pre-normalized
    Fixed,
    /// MNIST IDX3 bytes
    Idx,
}

impl From<ImageArg> for ImageFormat {
    fn from(arg: ImageArg) -> Self {
        match arg {
            ImageArg::Fixed => Self::Fixed,
            ImageArg::Idx => Self::Idx,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LabelArg {
    /// One byte per label
    Raw,
    /// MNIST IDX1
    Idx,
}

impl From<LabelArg> for LabelFormat {
    fn from(arg: LabelArg) -> Self {
        match arg {
            LabelArg::Raw => Self::Raw,
            LabelArg::Idx => Self::Idx,
        }
    }
}

/// Accept `0x`-prefixed hex or plain decimal.
fn parse_address(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let unavailable = e
                .downcast_ref::<HlsCnnError>()
                .is_some_and(HlsCnnError::is_device_unavailable);
            if unavailable {
                ExitCode::from(EXIT_DEVICE_UNAVAILABLE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = engine_config(&cli.hw);
    match &cli.command {
        Cmd::Evaluate(args) => cmd_evaluate(&cli.hw, config, args),
        Cmd::Map => cmd_map(&config),
    }
}

fn engine_config(hw: &HardwareArgs) -> EngineConfig {
    let defaults = MemoryMap::default();
    let memory_map = MemoryMap {
        control_base: hw.ctrl_base.unwrap_or(defaults.control_base),
        image_base: hw.image_base.unwrap_or(defaults.image_base),
        weights_base: hw.weights_base.unwrap_or(defaults.weights_base),
        element_stride: hw.stride.unwrap_or(defaults.element_stride),
        ..defaults
    };
    EngineConfig::new()
        .with_memory_map(memory_map)
        .with_poll_policy(PollPolicy::from_timeout_ms(hw.poll_timeout_ms))
}

fn cmd_evaluate(hw: &HardwareArgs, config: EngineConfig, args: &EvaluateArgs) -> Result<()> {
    config.memory_map.validate()?;

    // Datasets first: a bad file should not cost a device open
    let weights = hlscnn_driver::load_weights(&args.weights)
        .with_context(|| format!("reading weights from {}", args.weights.display()))?;
    let source = TestSetSource {
        images: &args.images,
        image_format: args.image_format.into(),
        labels: &args.labels,
        label_format: args.label_format.into(),
    };
    let cases = hlscnn_driver::load_test_set(&source, Some(args.limit))
        .with_context(|| format!("reading test set from {}", args.images.display()))?;

    tracing::info!(
        "{} test cases, limit {}, simulate={}",
        cases.len(),
        args.limit,
        args.simulate
    );

    let bus: Box<dyn RegisterBus> = if args.simulate {
        Box::new(SimulatedCore::constant(0.0).with_memory_map(config.memory_map))
    } else {
        Box::new(DevMemBus::open(&hw.device, &config.memory_map)?)
    };

    println!();
    println!("{RULE}");
    println!("  CNN MNIST Inference on KV260");
    if args.simulate {
        println!("  (simulated core, no hardware)");
    }
    println!("{RULE}");
    println!();

    let mut engine = InferenceEngine::new(bus, config)?;

    println!("Loading weights into BRAM...");
    engine.load_weights(&weights)?;
    println!("Load weights done!");
    println!();

    println!("Running inference on {} test images...", cases.len());
    println!();
    let (report, error) =
        EvaluationHarness::new(&mut engine).evaluate_partial(&cases, |outcome, _| {
            println!("{}", outcome_line(outcome));
        });

    println!();
    println!("{RULE}");
    println!("  RESULTS");
    println!("{RULE}");
    println!("{report}");
    println!("{RULE}");
    println!();

    if let Some(e) = error {
        println!("Evaluation stopped after {} of {} samples.", report.total, cases.len());
        return Err(anyhow::Error::new(e)
            .context(format!("inference failed on sample {}", report.total)));
    }
    println!("{}", verdict(&report));
    Ok(())
}

/// Per-sample console line with its pass/fail mark.
fn outcome_line(outcome: &SampleOutcome) -> String {
    let mark = if outcome.passed() { '✓' } else { '✗' };
    format!("{outcome} {mark}")
}

/// Closing line of a completed run.
fn verdict(report: &EvaluationReport) -> &'static str {
    if report.total == 0 {
        "No samples evaluated."
    } else if report.all_passed() {
        "✓✓✓ ALL TESTS PASSED! ✓✓✓"
    } else {
        "Some tests failed."
    }
}

fn cmd_map(config: &EngineConfig) -> Result<()> {
    let map = &config.memory_map;
    map.validate()?;

    println!("Control block  : {:#010x} (+{:#x})", map.control_base, map.control_window);
    println!("  ap_ctrl      : {:#010x}", map.control_register());
    println!("  out_model    : {:#010x}", map.output_register());
    println!(
        "Image BRAM     : {:#010x} ({} words, {} bytes)",
        map.image_base,
        hlscnn_chip::layout::IMAGE_LEN,
        map.staging_span(hlscnn_chip::layout::IMAGE_LEN)
    );
    println!(
        "Weight BRAM    : {:#010x} ({} words, {} bytes)",
        map.weights_base,
        hlscnn_chip::layout::WEIGHTS_LEN,
        map.staging_span(hlscnn_chip::layout::WEIGHTS_LEN)
    );
    println!("Element stride : {} byte(s)", map.element_stride);
    match config.poll_policy {
        PollPolicy::Unbounded => println!("Poll policy    : unbounded"),
        PollPolicy::Timeout(limit) => println!("Poll policy    : timeout {limit:?}"),
        PollPolicy::MaxPolls(max) => println!("Poll policy    : at most {max} polls"),
    }
    Ok(())
}
