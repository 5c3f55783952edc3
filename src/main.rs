use std::process::ExitCode;

use pingpong_particles::{SimConfig, Simulation};

const USAGE: &str = "usage: pingpong-particles [config.json] [--headless <frames>]";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = None;
    let mut headless = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--headless" => match args.next().and_then(|n| n.parse::<u32>().ok()) {
                Some(frames) => headless = Some(frames),
                None => {
                    eprintln!("{}", USAGE);
                    return ExitCode::FAILURE;
                }
            },
            "-h" | "--help" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            path => config_path = Some(path.to_string()),
        }
    }

    let config = match config_path {
        Some(path) => match SimConfig::load(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                log::error!("{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => SimConfig::default(),
    };

    let simulation = Simulation::from_config(config);
    let result = match headless {
        Some(frames) => simulation.run_headless(frames).map(|_| ()),
        None => simulation.run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
