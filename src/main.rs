use clap::Parser;
use std::error::Error;

use physarust::{
    PngSnapshot, Presenter, SettingsStore, SimParameters, Simulation, SimulationConfig,
};

#[cfg(feature = "ui")]
mod visualization;

#[cfg(feature = "ui")]
use macroquad::prelude::*;

// Headless runs log progress this often.
const STATS_EVERY: u64 = 120;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run without a window: step a fixed number of ticks and write a PNG snapshot
    #[arg(long)]
    headless: bool,

    /// Number of ticks to run in headless mode
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Snapshot path for headless mode
    #[arg(short, long, default_value = "physarust.png")]
    output: String,

    /// Configuration file path (YAML or JSON). If not specified, searches for config.yaml, config.yml, or config.json in current directory.
    #[arg(short, long)]
    config: Option<String>,

    /// Preset to run, overriding the one named in the configuration
    #[arg(short, long)]
    preset: Option<String>,

    /// Seed for the initial agent placement
    #[arg(long)]
    seed: Option<u64>,

    /// Print the available presets and exit
    #[arg(long)]
    list_presets: bool,
}

#[cfg(not(feature = "ui"))]
fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "ui")]
#[macroquad::main(window_conf)]
async fn main() {
    init_logging();
    let args = Args::parse();

    if args.headless || args.list_presets {
        if let Err(e) = run(&args) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let (config, params) = match load(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = ui_main(config, params).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// Safe to call more than once; `window_conf` may already have set it up.
fn init_logging() {
    use env_logger::Env;
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

/// Load configuration from file or use default, then apply command-line overrides
fn load(args: &Args) -> Result<(SimulationConfig, SimParameters), Box<dyn Error>> {
    let mut config = match args.config.as_deref() {
        Some(path) => SimulationConfig::from_file(path)
            .map_err(|e| format!("Failed to load config from {}: {}", path, e))?,
        None => SimulationConfig::from_default_paths(),
    };
    if let Some(preset) = &args.preset {
        config.preset = preset.clone();
        config.parameters = None;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    let params = config.resolve_parameters()?;
    Ok((config, params))
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.list_presets {
        let store = match args.config.as_deref() {
            Some(path) => SimulationConfig::from_file(path)?.settings_store(),
            None => SettingsStore::builtin(),
        };
        print_presets(&store);
        return Ok(());
    }
    let (config, params) = load(args)?;
    headless_main(&config, params, args.ticks, &args.output)
}

fn print_presets(store: &SettingsStore) {
    for preset in store.iter() {
        let p = &preset.params;
        println!(
            "{:<14} agents={:<8} speed={:<8} turn={:<6} fade={:<5} blur={:<5} range={:<6} rotation={}",
            preset.name,
            p.agent_count,
            p.move_speed,
            p.turn_speed,
            p.fade_rate,
            p.blur_rate,
            p.sense_range,
            p.sense_rotation
        );
    }
}

/// Headless mode - fixed time step, snapshot at the end
fn headless_main(
    config: &SimulationConfig,
    params: SimParameters,
    ticks: u64,
    output: &str,
) -> Result<(), Box<dyn Error>> {
    let mut sim = Simulation::initialize(config, params)?;
    let mut frame = sim.new_frame();
    let mut snapshot = PngSnapshot::new(output);

    for _ in 0..ticks {
        sim.tick(config.time_step);
        if sim.tick_index() % STATS_EVERY == 0 {
            let stats = sim.stats();
            log::info!(
                "tick {}: total intensity {:.1}, peak {:.3}",
                stats.tick_index,
                stats.total_intensity,
                stats.max_intensity
            );
        }
    }

    sim.render(&mut frame);
    snapshot.present(&frame)?;
    log::info!("snapshot written to {}", snapshot.path().display());
    sim.shutdown();
    Ok(())
}

#[cfg(feature = "ui")]
async fn ui_main(config: SimulationConfig, params: SimParameters) -> Result<(), Box<dyn Error>> {
    use visualization::WindowPresenter;

    let mut presenter = WindowPresenter::new(&config)?;
    let mut sim = Simulation::initialize(&config, params)?;
    let mut frame = sim.new_frame();

    loop {
        let dt = get_frame_time().min(config.max_frame_time);
        match sim.tick_and_present(dt, &mut frame, &mut presenter) {
            Ok(()) => {}
            Err(never) => match never {},
        }
        next_frame().await;
    }
}

#[cfg(feature = "ui")]
fn window_conf() -> Conf {
    // Runs before `main`, so set up logging here for config warnings.
    init_logging();
    let args = Args::parse();
    // Size the window from the same config `main` loads, falling back to defaults
    let config = match args.config.as_deref() {
        Some(path) => SimulationConfig::from_file(path).unwrap_or_default(),
        None => SimulationConfig::from_default_paths(),
    };
    let scale = (1280.0 / config.width.max(1) as f32).max(1.0);

    Conf {
        window_title: "Physarum Trail Simulation".to_owned(),
        window_width: (config.width as f32 * scale) as i32,
        window_height: (config.height as f32 * scale) as i32,
        ..Default::default()
    }
}
