//! Filterkit CLI: apply a filter chain to an image.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use filterkit::config::Config;
use filterkit::filters::FilterStage;
use filterkit::frame::Frame;
use filterkit::shader::{GpuContext, ShaderPipeline, WgpuPipeline};
use filterkit::software::SoftwarePipeline;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Where filters are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// GPU if an adapter is available, otherwise software
    Auto,
    /// wgpu render pipeline
    Gpu,
    /// Host-side evaluation
    Software,
}

/// Apply GPU fragment-shader filters to an image.
#[derive(Parser, Debug)]
#[command(name = "filterkit")]
#[command(about = "Apply levels, polar pixellate and vignette filters to an image")]
struct Args {
    /// Input image path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output image path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// YAML filter chain
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Execution backend
    #[arg(long, value_enum, default_value = "auto")]
    backend: Backend,

    /// Print each stage's GLSL fragment shader and exit
    #[arg(long)]
    print_shaders: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading filter chain from {:?}", path);
            Config::load(path)?
        }
        None => {
            info!("No filter chain given, passing the image through");
            Config::default()
        }
    };
    let stages = config.stages();

    if args.print_shaders {
        for (i, stage) in stages.iter().enumerate() {
            println!("// stage {}: {}", i, stage.filter().name());
            print!("{}", stage.fragment_shader().source);
        }
        return Ok(());
    }

    let input = args.input.context("--input is required")?;
    let output = args.output.context("--output is required")?;

    let image = image::open(&input).with_context(|| format!("opening {:?}", input))?;
    let frame = Frame::from_image(&image);
    info!("Loaded {:?} ({}x{})", input, frame.width, frame.height);

    let mut pipeline = create_pipeline(args.backend, stages)?;
    let start = std::time::Instant::now();
    let result = pipeline.process_frame(&frame)?;
    info!("Filtered in {:?}", start.elapsed());

    result
        .into_image()?
        .save(&output)
        .with_context(|| format!("writing {:?}", output))?;
    info!("Wrote {:?}", output);
    Ok(())
}

fn create_pipeline(backend: Backend, stages: Vec<FilterStage>) -> Result<Box<dyn ShaderPipeline>> {
    match backend {
        Backend::Software => Ok(Box::new(SoftwarePipeline::new(stages))),
        Backend::Gpu => {
            let context = GpuContext::new()?;
            info!("Using GPU adapter {}", context.adapter_name());
            Ok(Box::new(WgpuPipeline::new(context, stages)?))
        }
        Backend::Auto => match GpuContext::new() {
            Ok(context) => {
                info!("Using GPU adapter {}", context.adapter_name());
                Ok(Box::new(WgpuPipeline::new(context, stages)?))
            }
            Err(e) => {
                warn!("{}. Falling back to software filtering.", e);
                Ok(Box::new(SoftwarePipeline::new(stages)))
            }
        },
    }
}
