//! Check-in operator tool
//!
//! Prints the QR payload for the configured secret, runs a check-in
//! decision from the command line, and shows zone distances for a point.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tiani_checkin::domain::{ActivityWindow, CheckInAttempt, Decision, GeoPoint};
use tiani_checkin::infra::Config;
use tiani_checkin::services::{distance_km, CheckInGate, GeofenceEvaluator};

#[derive(Parser, Debug)]
#[command(name = "checkin-cli", about = "Tiani check-in operator tool")]
struct Args {
    /// TOML configuration file (built-in development config when omitted)
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the payload to encode in the check-in QR code
    Payload,
    /// Evaluate a check-in attempt
    Verify {
        /// Scanned QR text
        #[arg(long)]
        payload: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Attempt time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Activity start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Activity end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Show the distance from a point to every configured zone
    Zones {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Invalid configuration in {path}")),
        None => {
            let config = Config::default().with_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let gate = CheckInGate::from_config(&config);

    match args.command {
        Command::Payload => {
            println!("{}", gate.qr().build_payload());
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { payload, lat, lon, at, start, end } => {
            let attempt =
                CheckInAttempt::new(payload, GeoPoint::new(lat, lon), at.unwrap_or_else(Utc::now));
            let window = ActivityWindow::new(start, end);

            match gate.evaluate(&attempt, &window) {
                Decision::Accepted => {
                    println!("accepted");
                    Ok(ExitCode::SUCCESS)
                }
                Decision::Rejected(reason) => {
                    println!("rejected: {} ({})", reason, reason.message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Zones { lat, lon } => {
            let point = GeoPoint::new(lat, lon);
            println!("{:<20} {:>12} {:>10}  inside", "zone", "distance_km", "radius_km");
            for zone in gate.geofence().zones() {
                let dist = distance_km(point, zone.center);
                let inside = GeofenceEvaluator::zone_contains(zone, point);
                println!("{:<20} {:>12.3} {:>10.3}  {}", zone.name, dist, zone.radius_km, inside);
            }
            if let Some((zone, dist)) = gate.geofence().nearest_zone(point) {
                println!("nearest: {} ({:.3} km)", zone.name, dist);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
