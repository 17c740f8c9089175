use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use bam_pvrz_core::prelude::*;
use clap::{ArgAction, Args, Parser, Subcommand};
use image::ImageReader;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "bam-pvrz",
    about = "Inspect, unpack, pack and relocate BAM V2 sprite containers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress=false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
    #[command(flatten)]
    naming: NamingArgs,
}

#[derive(Args, Debug, Clone)]
struct NamingArgs {
    /// File name prefix of page files
    #[arg(long, default_value = "MOS", global = true, help_heading = "Pages")]
    page_name: String,
    /// Extension of page files
    #[arg(long, default_value = "pvrz", global = true, help_heading = "Pages")]
    page_ext: String,
}

impl NamingArgs {
    fn to_naming(&self) -> PageNaming {
        PageNaming {
            prefix: self.page_name.clone(),
            extension: self.page_ext.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print frames and cycles of a container
    Info(InfoArgs),
    /// Decode a container and write every frame as PNG
    Unpack(UnpackArgs),
    /// Build a container and its pages from a YAML manifest
    Pack(PackArgs),
    /// Move a container's pages to another page prefix
    Reassign(ReassignArgs),
    /// List the page files a container references
    Linked(LinkedArgs),
    /// Delete a container together with its page files
    Delete(DeleteArgs),
}

#[derive(Parser, Debug, Clone)]
struct InfoArgs {
    /// BAM file
    bam: PathBuf,
    /// Emit the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser, Debug, Clone)]
struct UnpackArgs {
    /// BAM file
    bam: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
    /// File name prefix of the written frames (`<prefix><index>.png`)
    #[arg(long, default_value = "frame_")]
    name: String,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// YAML manifest describing frames and cycles
    #[arg(help_heading = "Input/Output")]
    manifest: PathBuf,
    /// Output BAM file; pages are written next to it
    #[arg(short, long, help_heading = "Input/Output")]
    output: PathBuf,

    // Pages
    /// Page prefix (page ids are prefix * 1000 + local index); overrides the manifest.
    /// Defaults to the smallest prefix unused next to the output
    #[arg(long, help_heading = "Pages")]
    prefix: Option<u32>,
    /// Block format: dxt1 | dxt5; overrides the manifest
    #[arg(long, help_heading = "Pages")]
    format: Option<String>,
    /// Max page width; overrides the manifest
    #[arg(long, help_heading = "Pages")]
    max_width: Option<u32>,
    /// Max page height; overrides the manifest
    #[arg(long, help_heading = "Pages")]
    max_height: Option<u32>,

    // Compression
    /// External compressor executable (default: $BAM_PVRZ_TEXCONV, then `texconv`)
    #[arg(long, conflicts_with = "builtin", help_heading = "Compression")]
    texconv: Option<PathBuf>,
    /// Use the built-in ISPC encoder instead of the external tool
    #[arg(long, default_value_t = false, help_heading = "Compression")]
    builtin: bool,

    /// Print the merged write options (after manifest/CLI) and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[derive(Parser, Debug, Clone)]
struct ReassignArgs {
    /// BAM file, rewritten in place
    bam: PathBuf,
    /// New page prefix
    #[arg(long)]
    prefix: u32,
}

#[derive(Parser, Debug, Clone)]
struct LinkedArgs {
    /// BAM file
    bam: PathBuf,
    /// Print page ids instead of file names
    #[arg(long, default_value_t = false)]
    ids: bool,
}

#[derive(Parser, Debug, Clone)]
struct DeleteArgs {
    /// BAM file
    bam: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let naming = cli.naming.to_naming();
    match &cli.command {
        Commands::Info(args) => run_info(args, &naming),
        Commands::Unpack(args) => run_unpack(args, &naming),
        Commands::Pack(args) => run_pack(args, &naming, cli.progress && !cli.quiet),
        Commands::Reassign(args) => run_reassign(args, &naming),
        Commands::Linked(args) => run_linked(args, &naming),
        Commands::Delete(args) => run_delete(args, &naming),
    }
}

fn run_info(args: &InfoArgs, naming: &PageNaming) -> anyhow::Result<()> {
    let bam = read_bam_file(&args.bam, naming)
        .with_context(|| format!("read {}", args.bam.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&bam.summary())?);
    } else {
        println!("{bam}");
    }
    Ok(())
}

fn run_unpack(args: &UnpackArgs, naming: &PageNaming) -> anyhow::Result<()> {
    let start = Instant::now();
    let bam = read_bam_file(&args.bam, naming)
        .with_context(|| format!("read {}", args.bam.display()))?;
    let written = bam
        .save_frames(&args.out_dir, &args.name)
        .with_context(|| format!("write frames to {}", args.out_dir.display()))?;
    info!(
        frames = written.len(),
        out_dir = %args.out_dir.display(),
        time = %fmt_dur(start.elapsed()),
        "unpacked"
    );
    Ok(())
}

fn run_pack(args: &PackArgs, naming: &PageNaming, show_progress: bool) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.manifest)
        .with_context(|| format!("read manifest {}", args.manifest.display()))?;
    let manifest: Manifest = serde_yaml::from_str(&text)
        .with_context(|| format!("parse manifest {}", args.manifest.display()))?;
    let base = args.manifest.parent().unwrap_or_else(|| Path::new("."));

    let opts = manifest.write_options(args, naming, page_dir_of(&args.output))?;
    opts.validate()?;
    if args.print_config {
        println!("{}", serde_yaml::to_string(&opts)?);
        return Ok(());
    }

    let bam = manifest.build(base, show_progress)?;
    debug!(frames = bam.frame_count(), cycles = bam.cycle_count(), "manifest loaded");

    let start = Instant::now();
    let compressor: Box<dyn BlockCompressor> = if args.builtin {
        Box::new(IspcCompressor)
    } else {
        Box::new(Texconv::from_config(&TexconvConfig {
            program: args.texconv.clone(),
        }))
    };
    let written = write_bam_file(&bam, &args.output, &opts, compressor.as_ref())
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(
        bam = %written.bam_path.display(),
        pages = written.page_paths.len(),
        time = %fmt_dur(start.elapsed()),
        "packed"
    );
    Ok(())
}

fn run_reassign(args: &ReassignArgs, naming: &PageNaming) -> anyhow::Result<()> {
    reassign_file(&args.bam, args.prefix, naming)
        .with_context(|| format!("reassign {} to prefix {}", args.bam.display(), args.prefix))?;
    Ok(())
}

fn run_linked(args: &LinkedArgs, naming: &PageNaming) -> anyhow::Result<()> {
    let data = fs::read(&args.bam).with_context(|| format!("read {}", args.bam.display()))?;
    for id in linked_pages(&data)? {
        if args.ids {
            println!("{id}");
        } else {
            println!("{}", naming.file_name(id));
        }
    }
    Ok(())
}

fn run_delete(args: &DeleteArgs, naming: &PageNaming) -> anyhow::Result<()> {
    let removed = delete_bam(&args.bam, naming)
        .with_context(|| format!("delete {}", args.bam.display()))?;
    for p in removed {
        println!("{}", p.display());
    }
    Ok(())
}

/// Directory the pages of a container at `path` live in.
fn page_dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// `pack` input: frames are loaded from images relative to the manifest.
///
/// ```yaml
/// page_prefix: 17
/// format: dxt5
/// frames:
///   - image: walk/0.png
///     center: [16, 40]
///   - size: [0, 0]
/// cycles:
///   - [0, 1, 0]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    page_prefix: Option<u32>,
    format: Option<String>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    frames: Vec<ManifestFrame>,
    #[serde(default)]
    cycles: Vec<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFrame {
    image: Option<PathBuf>,
    /// Declared size of a frame without an image
    size: Option<[i16; 2]>,
    #[serde(default)]
    center: [i16; 2],
}

impl Manifest {
    /// Merges manifest and CLI options. Without an explicit prefix the smallest
    /// one unused in `page_dir` is taken, so existing pages are never overwritten.
    fn write_options(
        &self,
        args: &PackArgs,
        naming: &PageNaming,
        page_dir: &Path,
    ) -> anyhow::Result<WriteOptions> {
        let mut opts = WriteOptions {
            naming: naming.clone(),
            ..Default::default()
        };
        opts.page_prefix = match args.prefix.or(self.page_prefix) {
            Some(v) => v,
            None => {
                let free = PageDirectory::new(page_dir, naming.clone())
                    .free_prefix()
                    .with_context(|| format!("scan {} for page files", page_dir.display()))?;
                info!(prefix = free, dir = %page_dir.display(), "using free page prefix");
                free
            }
        };
        if let Some(s) = args.format.as_deref().or(self.format.as_deref()) {
            opts.format = parse_format(s)?;
        }
        if let Some(v) = args.max_width.or(self.max_width) {
            opts.packer.max_width = v;
        }
        if let Some(v) = args.max_height.or(self.max_height) {
            opts.packer.max_height = v;
        }
        Ok(opts)
    }

    fn build(&self, base: &Path, show_progress: bool) -> anyhow::Result<Bam> {
        use indicatif::{ProgressBar, ProgressStyle};
        let bar = if show_progress {
            let b = ProgressBar::new(self.frames.len() as u64);
            b.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
                )?,
            );
            Some(b)
        } else {
            None
        };

        let mut bam = Bam::new();
        for (idx, f) in self.frames.iter().enumerate() {
            let [cx, cy] = f.center;
            let frame = match (&f.image, f.size) {
                (Some(rel), _) => {
                    let path = base.join(rel);
                    if let Some(b) = &bar {
                        b.set_message(path.display().to_string());
                    }
                    let img = load_image(&path)?;
                    Frame::from_image(img, cx, cy)
                        .with_context(|| format!("frame {idx} ({})", path.display()))?
                }
                (None, Some([w, h])) => Frame::new(w, h, cx, cy),
                (None, None) => anyhow::bail!("frame {idx} has neither `image` nor `size`"),
            };
            bam.add_frame(frame);
            if let Some(b) = &bar {
                b.inc(1);
            }
        }
        if let Some(b) = &bar {
            b.finish_and_clear();
        }

        if self.cycles.is_empty() {
            // one cycle showing every frame once
            let c = bam.add_cycle();
            for idx in 0..bam.frame_count() {
                bam.add_frame_to_cycle(c, idx)?;
            }
        }
        for (ci, cycle) in self.cycles.iter().enumerate() {
            let c = bam.add_cycle();
            for &idx in cycle {
                bam.add_frame_to_cycle(c, idx)
                    .with_context(|| format!("cycle {ci}"))?;
            }
        }
        Ok(bam)
    }
}

fn parse_format(s: &str) -> anyhow::Result<TextureFormat> {
    s.parse::<TextureFormat>()
        .map_err(|_| anyhow::anyhow!("unknown texture format: {} (expected dxt1 or dxt5)", s))
}

fn load_image(p: &Path) -> anyhow::Result<image::RgbaImage> {
    let img = ImageReader::open(p)
        .with_context(|| format!("open {}", p.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decode {}", p.display()))?;
    Ok(img.to_rgba8())
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}us", d.as_micros())
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
