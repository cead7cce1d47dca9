use clap::Parser;

use std::sync::atomic::Ordering;

use callwatch_config::{Config, RunMode, toml_config};
use callwatch_core::debug;
use callwatch_engine::{AmiRunner, FileRunner};
use callwatch_events::{ConsoleSubscriber, JsonDumpSubscriber, TracingReporter};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> Config {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Callwatch AMI call-event translator",
    long_about = "Turns the switch's low-level management event stream into \
                  high-level call events, from a live connection or a recorded \
                  replay file"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with connection/replay parameters")]
    config: String,

    /// Replay this JSON event file instead of the configured source
    #[arg(long)]
    replay: Option<String>,

    /// Write the emitted call events to this file as a JSON array
    #[arg(long)]
    dump_json: Option<String>,
}

fn run_replay(events_file: &str, dump_json: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match dump_json {
        Some(dump_path) => {
            let subscriber = JsonDumpSubscriber::new(dump_path);
            let mut runner = FileRunner::from_file(events_file, subscriber, TracingReporter)?;
            runner.run()?;
            runner.handler().subscriber().write_out()?;
            eprintln!(" -> wrote {} events to {}", runner.handler().subscriber().events().len(), dump_path);
        }
        None => {
            let mut runner = FileRunner::from_file(events_file, ConsoleSubscriber, TracingReporter)?;
            runner.run()?;
        }
    }
    Ok(())
}

fn run_ami(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let ami_cfg = cfg.ami.clone().expect("checked at config load");
    let mut runner = AmiRunner::new(ami_cfg, ConsoleSubscriber, TracingReporter);

    // Ctrl+C clears the running flag for a graceful shutdown
    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })?;

    runner.run()?;
    Ok(())
}

fn main() {
    eprintln!("callwatch {}", callwatch_core::STACK_VERSION);

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.debug_log.clone());

    let result = if let Some(replay_file) = &args.replay {
        run_replay(replay_file, args.dump_json.as_deref())
    } else {
        match cfg.mode {
            RunMode::Replay => {
                let events_file = cfg.replay.as_ref().expect("checked at config load").events_file.clone();
                run_replay(&events_file, args.dump_json.as_deref())
            }
            RunMode::Ami => run_ami(&cfg),
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
