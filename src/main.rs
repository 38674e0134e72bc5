//! Meanforge - compute-shader generator for spatial mean reductions
//!
//! # Usage
//!
//! ```bash
//! # Print the generated template and its geometry
//! meanforge generate -H 32 -W 32 -C 4
//!
//! # Same, with every placeholder bound, as JSON
//! meanforge generate -H 32 -W 32 -C 4 --bind --format json
//!
//! # Only show the strategy and geometry
//! meanforge plan -H 224 -W 224 -C 64 --config meanforge.toml
//!
//! # Validate a tuning file
//! meanforge check-config meanforge.toml
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use meanforge_gpu::{logging, Axis, MeanKernelGenerator, MeanforgeConfig, ReductionSpec};

#[derive(Parser)]
#[command(name = "meanforge")]
#[command(version = "0.1.0")]
#[command(about = "Meanforge - spatial mean compute-shader generator", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ExtentArgs {
    /// Input height
    #[arg(short = 'H', long)]
    height: u32,

    /// Input width
    #[arg(short = 'W', long)]
    width: u32,

    /// Input channels
    #[arg(short = 'C', long)]
    channels: u32,

    /// Axes to reduce, comma separated
    #[arg(long, value_delimiter = ',', default_value = "height,width")]
    axes: Vec<String>,

    /// TOML file with [tuning] and [limits] sections
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the kernel bundle
    Generate {
        #[command(flatten)]
        extents: ExtentArgs,

        /// Resolve placeholders before printing
        #[arg(long)]
        bind: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the selected strategy and geometry only
    Plan {
        #[command(flatten)]
        extents: ExtentArgs,
    },

    /// Validate a configuration file
    CheckConfig {
        /// Path to the TOML file
        file: PathBuf,
    },

    /// Show default tuning and device limits
    Info,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    logging::init_from_verbosity(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            extents,
            bind,
            format,
        } => generate(&extents, bind, format),
        Commands::Plan { extents } => plan(&extents),
        Commands::CheckConfig { file } => check_config(&file),
        Commands::Info => {
            show_info();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_generator(path: Option<&Path>) -> Result<MeanKernelGenerator, String> {
    let config = match path {
        Some(path) => MeanforgeConfig::load(path).map_err(|e| e.to_string())?,
        None => {
            log::debug!("no --config given, using default tuning and limits");
            MeanforgeConfig::default()
        }
    };
    Ok(MeanKernelGenerator::from_config(&config))
}

fn parse_spec(extents: &ExtentArgs) -> Result<ReductionSpec, String> {
    let axes = extents
        .axes
        .iter()
        .map(|name| Axis::from_name(name).ok_or_else(|| format!("unknown axis '{}'", name)))
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ReductionSpec::new(
        extents.height,
        extents.width,
        extents.channels,
        axes,
    ))
}

fn generate(extents: &ExtentArgs, bind: bool, format: OutputFormat) -> Result<(), String> {
    let generator = load_generator(extents.config.as_deref())?;
    let spec = parse_spec(extents)?;
    let mut kernel = generator.generate(&spec).map_err(|e| e.to_string())?;

    if bind {
        kernel.source = kernel.render_default().map_err(|e| e.to_string())?;
        kernel.shared_variables.clear();
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&kernel)
                .map_err(|e| format!("Failed to serialize kernel: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("// strategy:  {}", kernel.strategy);
            println!("// workload:  {:?}", kernel.geometry.workload);
            println!("// workgroup: {:?}", kernel.geometry.workgroup);
            println!(
                "// shared:    {} slots ({} bytes)",
                kernel.geometry.shared_memory_elements,
                kernel.shared_memory_bytes()
            );
            for param in &kernel.parameters {
                println!("// param {} = {}", param.name, param.value);
            }
            for var in &kernel.shared_variables {
                println!("{}", var.declaration());
            }
            println!("{}", kernel.source);
        }
    }
    Ok(())
}

fn plan(extents: &ExtentArgs) -> Result<(), String> {
    let generator = load_generator(extents.config.as_deref())?;
    let spec = parse_spec(extents)?;
    let plan = generator.plan(&spec).map_err(|e| e.to_string())?;

    println!("Strategy:        {}", plan.strategy);
    println!("Elements:        {}", plan.element_count);
    println!("Channel groups:  {}", plan.channel_groups);
    println!("Task size:       {}", plan.task_size);
    println!("Workload:        {:?}", plan.geometry.workload);
    println!("Workgroup:       {:?}", plan.geometry.workgroup);
    println!("Workgroup count: {:?}", plan.geometry.workgroup_count());
    println!(
        "Shared memory:   {} slots ({} bytes)",
        plan.geometry.shared_memory_elements,
        plan.geometry.shared_memory_bytes()
    );
    Ok(())
}

fn check_config(file: &Path) -> Result<(), String> {
    let config = MeanforgeConfig::load(file).map_err(|e| e.to_string())?;
    println!("{} is valid", file.display());
    println!("{:#?}", config);
    Ok(())
}

fn show_info() {
    let config = MeanforgeConfig::default();
    println!("Meanforge v0.1.0");
    println!();
    println!("Tuning defaults:");
    println!("  parallel-threshold:               {}", config.tuning.parallel_threshold);
    println!("  tile:                             {}x{}", config.tuning.tile_x, config.tuning.tile_y);
    println!(
        "  max-channel-groups-per-workgroup: {}",
        config.tuning.max_channel_groups_per_workgroup
    );
    println!();
    println!("Device limit defaults:");
    println!("  max-shared-memory-bytes: {}", config.limits.max_shared_memory_bytes);
    println!("  max-invocations:         {}", config.limits.max_invocations);
    println!("  max-workgroup-size:      {:?}", config.limits.max_workgroup_size);
}
