use log::{info, error, debug, warn};
use hs_reconnect::{Config, NetworkToggle, ReconnectService};
use hs_reconnect::config::parse_duration_secs;
use anyhow::Result;
use std::env;
use std::path::PathBuf;

const EXIT_FAILURE: i32 = 1;
const EXIT_RULE_LEAKED: i32 = 2;

fn print_help(program: &str) {
    println!("hs-reconnect - force a game client to reconnect");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("\nUsage: {} [OPTIONS]\n", program);
    println!("Blocks the client's outbound traffic for a moment, then unblocks it.");
    println!("Must be run as administrator.\n");
    println!("Options:");
    println!("  --help, -h               Show this help message");
    println!("  --version, -v            Show version information");
    println!("  --debug                  Enable debug logging");
    println!("  --json                   Print the outcome as JSON");
    println!("  --check                  Report privileges, process and rule state; change nothing");
    println!("  --cleanup                Delete a firewall rule left behind by a failed run");
    println!("  --exec-name <name>       Process image name to target");
    println!("  --rule-name <name>       Name of the temporary firewall rule");
    println!("  --duration <seconds>     How long to keep traffic blocked");
    println!("  --env-file <path>        Read settings from this file instead of ./.env");
    println!("\nEnvironment Variables:");
    println!("  EXEC_NAME=<name>         Process image name (default: Hearthstone.exe)");
    println!("  NEW_RULE_NAME=<name>     Firewall rule name (default: BlockHearthstoneTemp)");
    println!("  SLEEP_INTERVAL=<secs>    Block duration (default: 2.0)");
    println!("  LOG_LEVEL=<level>        Log level (error|warn|info|debug)");
    println!("  RUST_LOG=<level>         Overrides LOG_LEVEL");
}

/// Value following `flag`, if present
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) || args.contains(&"-v".to_string()) {
        println!("hs-reconnect {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help(&args[0]);
        return Ok(());
    }

    let debug_mode = args.contains(&"--debug".to_string());
    let json_output = args.contains(&"--json".to_string());
    let check_mode = args.contains(&"--check".to_string());
    let cleanup_mode = args.contains(&"--cleanup".to_string());

    let env_file = flag_value(&args, "--env-file");
    let mut config = match &env_file {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load()?,
    };
    if let Some(name) = flag_value(&args, "--exec-name") {
        config.exec_name = name;
    }
    if let Some(name) = flag_value(&args, "--rule-name") {
        config.rule_name = name;
    }
    if let Some(value) = flag_value(&args, "--duration") {
        config.block_duration_secs = parse_duration_secs(&value)?;
    }
    config.validate()?;

    // Initialize logging with debug level if --debug flag is present
    if debug_mode {
        env::set_var("RUST_LOG", "debug");
    } else if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", &config.log_level);
    }
    env_logger::init();

    debug!("Command line args: {:?}", args);
    debug!("Settings file: {}", env_file.as_deref().unwrap_or(".env (optional)"));
    info!(
        "Configuration loaded: exec_name={}, rule_name={}, block_duration={}s",
        config.exec_name, config.rule_name, config.block_duration_secs
    );

    let service = ReconnectService::new(config, NetworkToggle::system());

    if check_mode {
        let diagnosis = service.diagnose();
        if json_output {
            println!("{}", serde_json::to_string_pretty(&diagnosis)?);
            return Ok(());
        }
        println!("Elevated: {} ({})", diagnosis.elevation.is_elevated, diagnosis.elevation.detail);
        for line in &diagnosis.elevation.guidance {
            println!("  {}", line);
        }
        match (&diagnosis.process, &diagnosis.process_error) {
            (Some(p), _) => println!("Process: {} (PID {}) at {}", p.name, p.pid, p.executable_path.display()),
            (None, Some(e)) => println!("Process: {}", e),
            (None, None) => println!("Process: unknown"),
        }
        match (diagnosis.rule_present, &diagnosis.rule_error) {
            (Some(true), _) => println!("Rule \"{}\": PRESENT (run --cleanup to remove it)", service.config().rule_name),
            (Some(false), _) => println!("Rule \"{}\": not present", service.config().rule_name),
            (None, Some(e)) => println!("Rule \"{}\": unknown ({})", service.config().rule_name, e),
            (None, None) => println!("Rule \"{}\": unknown", service.config().rule_name),
        }
        return Ok(());
    }

    if cleanup_mode {
        match service.cleanup_rule().await {
            Ok(true) => println!("Removed firewall rule \"{}\"", service.config().rule_name),
            Ok(false) => println!("No firewall rule named \"{}\"", service.config().rule_name),
            Err(e) => {
                error!("Cleanup failed: {}", e);
                eprintln!("Error: {}", e);
                std::process::exit(EXIT_FAILURE);
            }
        }
        return Ok(());
    }

    let outcome = service.reconnect().await;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(report) = &outcome.report {
        println!(
            "Reconnected {} (PID {}): blocked for {} ms",
            service.config().exec_name,
            report.pid,
            report.actual_block_ms
        );
    } else if let Some(message) = &outcome.message {
        eprintln!("Error: {}", message);
    }

    if let Some(rule) = &outcome.leaked_rule {
        warn!("Firewall rule \"{}\" is still active", rule);
        eprintln!("WARNING: manual firewall cleanup may be required. Run: hs-reconnect --cleanup --rule-name \"{}\"", rule);
        std::process::exit(EXIT_RULE_LEAKED);
    }
    if !outcome.success {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}
