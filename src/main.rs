use clap::{Parser, Subcommand};
use compartment_geometry::compartment_container::CompartmentContainer;
use compartment_geometry::config::CompartmentConfig;
use compartment_geometry::error::{CompartmentError, Result};
use compartment_geometry::init_config::JobConfig;
use compartment_geometry::io::{self, SaveFormat};
use rand::rngs::StdRng;
use rand::SeedableRng;
use compartment_geometry::config;
use compartment_geometry::geometry::PointInSpace;
use palette::Srgb;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DECIMALS: usize = config::NUMBER_OF_DECIMALS_FOR_GRAPHICS_COORDINATES as usize;

#[derive(Parser)]
#[command(name = "compartment_geometry")]
#[command(about = "Build, inspect and sample compartment containers", long_about = None)]
struct Cli {
    /// Compartment config TOML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a container from a job description
    New {
        /// Job TOML file
        job: PathBuf,
        /// Add a sphere compartment with this name (repeatable)
        #[arg(long = "sphere", value_name = "NAME")]
        spheres: Vec<String>,
        /// Add an xy-layer compartment with this name (repeatable)
        #[arg(long = "layer", value_name = "NAME")]
        layers: Vec<String>,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Output format (guessed from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<SaveFormat>,
        /// Gzip the output
        #[arg(long, default_value_t = false)]
        compress: bool,
    },
    /// Print box, bulk and compartments of a saved container
    Inspect { file: PathBuf },
    /// Draw random points or non-overlapping spheres in the free volume
    Sample {
        file: PathBuf,
        /// Number of free-volume points
        #[arg(long, conflicts_with = "spheres")]
        points: Option<usize>,
        /// Number of spheres
        #[arg(long, requires = "radius")]
        spheres: Option<usize>,
        /// Sphere radius in DPD units
        #[arg(long)]
        radius: Option<f64>,
        /// Start positions of this molecule in --compartment
        #[arg(long, value_name = "NAME", requires = "compartment", conflicts_with_all = ["points", "spheres"])]
        molecule: Option<String>,
        /// Compartment block for --spheres or --molecule
        #[arg(long, value_name = "BLOCK")]
        compartment: Option<String>,
        /// Random seed (defaults to the container's geometry seed)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let result = run(cli);

    #[cfg(feature = "profiling")]
    compartment_geometry::PROFILER.lock().log_and_clear();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CompartmentConfig::load_from_file(path)?,
        None => CompartmentConfig::default(),
    };
    match cli.command {
        Commands::New { job, spheres, layers, output, format, compress } => {
            let job = JobConfig::load_from_file(&job)?.to_job_definition()?;
            let mut container = CompartmentContainer::new(job, config)?;
            for name in &spheres {
                container.add_compartment_sphere(name)?;
            }
            for name in &layers {
                container.add_compartment_xy_layer(name)?;
            }
            let format = format
                .or_else(|| SaveFormat::from_path(&output))
                .unwrap_or_default();
            io::save_container(&output, &container, format, compress)?;
            log::info!(
                "created container with {} compartments and {} particles",
                container.compartments().len(),
                container.total_number_of_particles()
            );
        }
        Commands::Inspect { file } => {
            let mut container = load(&file, config)?;
            print!("{}", describe(&container));
            print!("{}", describe_display(&mut container));
        }
        Commands::Sample { file, points, spheres, radius, molecule, compartment, seed } => {
            let mut container = load(&file, config)?;
            let seed = seed.unwrap_or_else(|| container.geometry_random_seed());
            let mut rng = StdRng::seed_from_u64(seed);
            if let (Some(name), Some(block)) = (&molecule, &compartment) {
                let row = container
                    .molecules()
                    .iter()
                    .position(|m| &m.name == name)
                    .ok_or_else(|| CompartmentError::invalid(format!("unknown molecule {name}")))?;
                for p in container.molecule_positions(block, row, &mut rng)? {
                    println!("{}", format_point(&p));
                }
                return Ok(());
            }
            let trials = container.config().number_of_trials;
            let compartment_box = container.compartment_box_mut();
            match (points, spheres) {
                (Some(count), _) => {
                    for p in compartment_box.fill_free_volume_random_points(count, trials, &mut rng) {
                        println!("{}", format_point(&p));
                    }
                }
                (None, Some(count)) => {
                    let radius = radius.ok_or_else(|| CompartmentError::invalid("--radius is required"))?;
                    let placed = match &compartment {
                        Some(block) => compartment_box
                            .non_overlapping_random_spheres_in_body(block, count, radius, trials, &mut rng),
                        None => compartment_box.non_overlapping_random_spheres(count, radius, trials, &mut rng),
                    }
                    .ok_or_else(|| CompartmentError::invalid("spheres could not be placed"))?;
                    for s in placed {
                        println!("{} {:.*}", format_point(&s.center), DECIMALS, s.radius);
                    }
                }
                (None, None) => {
                    return Err(CompartmentError::invalid(
                        "one of --points, --spheres or --molecule with --compartment is required",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn load(path: &Path, config: CompartmentConfig) -> Result<CompartmentContainer> {
    let container = io::load_container(path, config)?;
    log::info!(
        "loaded {} with {} compartments",
        path.display(),
        container.compartments().len()
    );
    if container.has_error() {
        log::warn!("{} has compartments outside the simulation box", path.display());
    }
    Ok(container)
}

fn describe(container: &CompartmentContainer) -> String {
    use std::fmt::Write;
    let job = container.job();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "box {} x {} x {} (DPD), density {}, 1 DPD = {:.4} A, seed {}",
        job.x_length,
        job.y_length,
        job.z_length,
        job.density,
        container.length_conversion_factor(),
        container.geometry_random_seed()
    );
    let _ = writeln!(out, "bulk");
    for row in container.bulk() {
        let _ = writeln!(
            out,
            "  {:<16} {:>7.2}% {:>10}  {}",
            row.molecule, row.percent, row.quantity, row.orientation.selected
        );
    }
    for c in container.compartments() {
        let g = c.geometry();
        let center = g.center();
        let _ = writeln!(
            out,
            "{} '{}' center {} volume {:.*}{}",
            c.block_name(),
            c.specified_name(),
            format_point(&center),
            DECIMALS,
            g.volume(),
            c.error().map(|e| format!("  [{e}]")).unwrap_or_default()
        );
        for row in c.rows().iter().filter(|r| r.quantity > 0) {
            let _ = writeln!(
                out,
                "  {:<16} {:>7.2}% {:>10}  surface {:>6.2}%  {}",
                row.molecule, row.percent, row.quantity, row.surface_percent, row.orientation.selected
            );
        }
    }
    out
}

fn format_point(p: &PointInSpace) -> String {
    format!("{:.*} {:.*} {:.*}", DECIMALS, p.x, DECIMALS, p.y, DECIMALS, p.z)
}

/// Back-to-front display list of the default view with depth-cued colors.
fn describe_display(container: &mut CompartmentContainer) -> String {
    use std::fmt::Write;
    let sphere_color = Srgb::new(0.25f32, 0.55, 0.95);
    let layer_color = Srgb::new(0.95f32, 0.65, 0.25);
    let compartment_box = container.compartment_box_mut();
    let view = compartment_box.box_view();
    let mut out = String::new();
    let Some(bodies) = compartment_box.bodies_for_display(0.0) else {
        return out;
    };
    let _ = writeln!(out, "display {view:?}");
    for body in bodies {
        let base = if body.is_sphere() { sphere_color } else { layer_color };
        let color: Srgb<u8> = body.display_color(base).into_format();
        let _ = writeln!(
            out,
            "  {} #{:02x}{:02x}{:02x}",
            body.key(),
            color.red,
            color.green,
            color.blue
        );
    }
    out
}
