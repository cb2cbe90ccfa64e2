#[macro_use]
extern crate log;

use std::error::Error;
use std::fs::File;
use std::process::exit;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use log::LevelFilter;
use pbr::ProgressBar;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use structopt::StructOpt;

use candela::camera::cornell_camera;
use candela::film::{Frame, FrameMetadata};
use candela::output::{channel_average, read_exr, rms_error, write_exr, write_metadata};
use candela::scene::cornell_box;
use candela::technique::render_frame;
use candela::{technique_from_name, TechniqueSettings};

#[derive(Debug, StructOpt)]
#[structopt(name = "candela", rename_all = "kebab-case")]
enum Opt {
    /// Render the built-in scene with the selected estimator.
    Render {
        /// PT, BPT0/1/2/b, VCM0/1/2/b or UPG
        #[structopt(short, long, default_value = "BPT1")]
        technique: String,
        #[structopt(short, long, default_value = "output/beauty.exr")]
        output: String,
        /// Paths traced per pixel (one per frame).
        #[structopt(short, long, default_value = "64")]
        samples: usize,
        #[structopt(long, default_value = "512")]
        width: usize,
        #[structopt(long, default_value = "512")]
        height: usize,
        #[structopt(long, default_value = "1")]
        seed: u64,
        #[structopt(long)]
        threads: Option<usize>,
        /// Bounces before Russian roulette starts.
        #[structopt(long, default_value = "3")]
        min_subpath: usize,
        #[structopt(long, default_value = "0.75")]
        roulette: f32,
        /// Photon subpaths per frame (VCM/UPG).
        #[structopt(long, default_value = "100000")]
        num_photons: usize,
        /// Maximum photons gathered per merge (biased VCM).
        #[structopt(long, default_value = "100")]
        num_gather: usize,
        /// Merge radius in world units (VCM/UPG).
        #[structopt(long, default_value = "0.02")]
        radius: f32,
        /// MIS exponent for the b-suffixed techniques.
        #[structopt(long, default_value = "1.0")]
        beta: f32,
        #[structopt(long, default_value = "warn")]
        print_log_level: String,
        #[structopt(long, default_value = "info")]
        write_log_level: String,
    },
    /// Report the per-channel average of a saved image.
    Avg { image: String },
    /// Report the RMS error between two saved images.
    Rms { image: String, reference: String },
}

fn parse_log_level(level: &str, default: LevelFilter) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => default,
    }
}

fn init_logging(print_level: &str, write_level: &str) {
    let _ = CombinedLogger::init(vec![
        TermLogger::new(
            parse_log_level(print_level, LevelFilter::Warn),
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(
            parse_log_level(write_level, LevelFilter::Info),
            simplelog::Config::default(),
            File::create("candela.log").unwrap_or_else(|_| File::create("/dev/null").unwrap()),
        ),
    ]);
}

#[allow(clippy::too_many_arguments)]
fn run_render(
    technique_name: String,
    output: String,
    samples: usize,
    width: usize,
    height: usize,
    seed: u64,
    threads: Option<usize>,
    settings: TechniqueSettings,
) -> Result<(), Box<dyn Error>> {
    if samples == 0 || width == 0 || height == 0 {
        return Err("samples and resolution must be positive".into());
    }

    let threads = threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();

    let mut technique = technique_from_name(&technique_name, &settings)
        .map_err(|e| -> Box<dyn Error> { e.into() })?;
    let scene = cornell_box();
    let camera = cornell_camera();
    let mut frame = Frame::new(width, height);

    // cancellation is polled between tiles; an embedder can flip this
    // flag from a signal handler or UI thread
    let cancel = AtomicBool::new(false);

    info!(
        "rendering {}x{} with {} ({} samples, {} threads, seed {})",
        width,
        height,
        technique.name(),
        samples,
        threads,
        seed
    );

    let start = Instant::now();
    let mut progress = ProgressBar::new(samples as u64);
    progress.message("frames ");

    for _ in 0..samples {
        if !render_frame(
            technique.as_mut(),
            &scene,
            &camera,
            &mut frame,
            seed,
            &cancel,
        ) {
            warn!("render cancelled after {} samples", frame.num_samples);
            break;
        }
        progress.inc();
    }
    progress.finish();

    let elapsed = start.elapsed().as_secs_f64();
    let image = frame.to_rgb();

    if let Some(parent) = std::path::Path::new(&output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_exr(&output, &image)?;

    let metadata = FrameMetadata {
        technique: technique.name(),
        num_samples: frame.num_samples,
        resolution: (width, height),
        num_intersect_rays: scene.num_intersect_rays(),
        num_occluded_rays: scene.num_occluded_rays(),
        epsilon: frame.epsilon,
        total_time: elapsed,
    };
    write_metadata(&output, &metadata)?;

    println!(
        "{}: {} samples in {:.1}s, epsilon {:.3e}, {} intersect rays, {} shadow rays",
        metadata.technique,
        metadata.num_samples,
        elapsed,
        metadata.epsilon,
        metadata.num_intersect_rays,
        metadata.num_occluded_rays,
    );

    if scene.num_invariant_violations() > 0 {
        warn!(
            "{} invariant violations during render",
            scene.num_invariant_violations()
        );
    }

    Ok(())
}

fn is_io_error(error: &Box<dyn Error>) -> bool {
    error.downcast_ref::<std::io::Error>().is_some()
        || error.source().map_or(false, |source| {
            source.downcast_ref::<std::io::Error>().is_some()
        })
        || error.to_string().contains("No such file")
}

fn main() {
    let opt = Opt::from_args();

    let code = match opt {
        Opt::Render {
            technique,
            output,
            samples,
            width,
            height,
            seed,
            threads,
            min_subpath,
            roulette,
            num_photons,
            num_gather,
            radius,
            beta,
            print_log_level,
            write_log_level,
        } => {
            init_logging(&print_log_level, &write_log_level);
            if !(0.0..=1.0).contains(&roulette) || roulette <= 0.0 {
                eprintln!("roulette must be in (0, 1]");
                exit(1);
            }
            let settings = TechniqueSettings {
                min_subpath,
                roulette,
                num_photons,
                num_gather,
                radius,
                beta,
            };
            match run_render(
                technique, output, samples, width, height, seed, threads, settings,
            ) {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("render failed: {}", error);
                    if error.to_string().starts_with("unknown technique")
                        || error.to_string().starts_with("samples and resolution")
                    {
                        1
                    } else if is_io_error(&error) {
                        2
                    } else {
                        3
                    }
                }
            }
        }
        Opt::Avg { image } => match read_exr(&image) {
            Ok(image) => {
                let [r, g, b] = channel_average(&image);
                if !(r.is_finite() && g.is_finite() && b.is_finite()) {
                    eprintln!("non-finite channel average");
                    3
                } else {
                    println!("{:.6} {:.6} {:.6}", r, g, b);
                    0
                }
            }
            Err(error) => {
                eprintln!("cannot read {}: {}", image, error);
                2
            }
        },
        Opt::Rms { image, reference } => {
            match (read_exr(&image), read_exr(&reference)) {
                (Ok(a), Ok(b)) => match rms_error(&a, &b) {
                    Ok(rms) if rms.is_finite() => {
                        println!("{:.6}", rms);
                        0
                    }
                    Ok(_) => {
                        eprintln!("non-finite rms");
                        3
                    }
                    Err(error) => {
                        eprintln!("{}", error);
                        1
                    }
                },
                (Err(error), _) | (_, Err(error)) => {
                    eprintln!("cannot read input: {}", error);
                    2
                }
            }
        }
    };

    exit(code);
}
