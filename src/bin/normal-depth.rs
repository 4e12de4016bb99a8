use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "normal-depth", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct a depth map PNG from a normal map PNG.
    Reconstruct(ReconstructArgs),
    /// Write the intermediate gradient field as a PNG.
    Gradient(GradientArgs),
    /// Print the WGSL of the gradient-extraction program.
    Shader(ShaderArgs),
}

#[derive(Parser, Debug)]
struct ReconstructArgs {
    /// Input normal map.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Options JSON; flags below override its fields.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Fraction of the maximum direction count, in [0, 1].
    #[arg(long)]
    quality: Option<f32>,

    /// Radial perspective correction strength.
    #[arg(long)]
    perspective: Option<f32>,

    /// Ray launch layout.
    #[arg(long, value_enum)]
    frame: Option<FrameChoice>,

    /// Keep integration noise on invalid pixels.
    #[arg(long, default_value_t = false)]
    no_mask: bool,

    /// Separate validity mask image.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Override integration worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,
}

#[derive(Parser, Debug)]
struct GradientArgs {
    /// Input normal map.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Flip green (DirectX-style normal maps).
    #[arg(long, default_value_t = false)]
    directx: bool,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,
}

#[derive(Parser, Debug)]
struct ShaderArgs {
    /// Target width.
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Target height.
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Flip green (DirectX-style normal maps).
    #[arg(long, default_value_t = false)]
    directx: bool,

    /// Also print the vertex stage.
    #[arg(long, default_value_t = false)]
    vertex: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

impl From<BackendChoice> for normal_depth::BackendKind {
    fn from(c: BackendChoice) -> Self {
        match c {
            BackendChoice::Cpu => Self::Cpu,
            #[cfg(feature = "gpu")]
            BackendChoice::Gpu => Self::Gpu,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FrameChoice {
    Circular,
    Rectangular,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Reconstruct(args) => cmd_reconstruct(args),
        Command::Gradient(args) => cmd_gradient(args),
        Command::Shader(args) => cmd_shader(args),
    }
}

fn read_opts(path: &Path) -> anyhow::Result<normal_depth::ReconstructOpts> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read options '{}'", path.display()))?;
    Ok(normal_depth::ReconstructOpts::from_json_str(&s)?)
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_reconstruct(args: ReconstructArgs) -> anyhow::Result<()> {
    let mut opts = match &args.opts {
        Some(path) => read_opts(path)?,
        None => normal_depth::ReconstructOpts::default(),
    };
    if let Some(q) = args.quality {
        opts.quality = q;
    }
    if let Some(f) = args.perspective {
        opts.perspective_factor = f;
    }
    if let Some(frame) = args.frame {
        opts.frame = match frame {
            FrameChoice::Circular => normal_depth::FramePolicy::Circular,
            FrameChoice::Rectangular => normal_depth::FramePolicy::Rectangular,
        };
    }
    if args.no_mask {
        opts.mask = false;
    }
    if args.threads.is_some() {
        opts.threading.threads = args.threads;
    }

    let normal = normal_depth::PixelGrid::open(&args.in_path)?;
    let mut req = normal_depth::ReconstructRequest::new(normal).with_opts(opts);
    if let Some(mask) = &args.mask {
        req = req.with_mask(normal_depth::PixelGrid::open(mask)?);
    }

    let reconstructor = normal_depth::Reconstructor::new(args.backend.into());
    let done = reconstructor
        .reconstruct_with_stats(&req)?
        .context("reconstruction was cancelled")?;

    ensure_parent(&args.out)?;
    done.depth.save_png(&args.out)?;

    eprintln!(
        "wrote {} ({}x{}, {} directions, {} workers)",
        args.out.display(),
        done.depth.width(),
        done.depth.height(),
        done.stats.angles_integrated,
        done.stats.workers
    );
    if done.stats.overflowed {
        eprintln!("warning: depth accumulator overflowed; output is approximate");
    }
    Ok(())
}

fn cmd_gradient(args: GradientArgs) -> anyhow::Result<()> {
    let normal = Arc::new(normal_depth::PixelGrid::open(&args.in_path)?);
    let mut ctx = normal_depth::RasterContext::with_backend(args.backend.into())?;
    let field = normal_depth::extract_gradient(&mut ctx, &normal, convention(args.directx))?;

    ensure_parent(&args.out)?;
    field.grid().save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_shader(args: ShaderArgs) -> anyhow::Result<()> {
    let mut ctx = normal_depth::RasterContext::with_backend(normal_depth::BackendKind::Cpu)?;
    let program =
        normal_depth::gradient_program(&mut ctx, args.width, args.height, convention(args.directx))?;
    if args.vertex {
        println!("{}", program.vertex_source());
    }
    print!("{}", program.fragment_source());
    Ok(())
}

fn convention(directx: bool) -> normal_depth::NormalConvention {
    if directx {
        normal_depth::NormalConvention::DirectX
    } else {
        normal_depth::NormalConvention::OpenGl
    }
}
