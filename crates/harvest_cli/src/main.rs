//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `harvest_core` linkage.
//! - Migrate a plantation JSON file and report its contents and slot
//!   conflicts, without writing anything back.
//!
//! # Exit codes
//! - `0` clean, `2` conflicts found, `1` unreadable input.

use clap::{Parser, Subcommand};
use harvest_core::migration::{DocumentRecord, PlantationRecord};
use harvest_core::{find_overlaps, migrate_document, migrate_plantation, MigrationReport};
use harvest_core::{PlantationDocument, SegmentOverlap};
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "harvest_cli", version, about = "Perpetual-harvest planner tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log level for the rolling log file.
    #[arg(long, global = true, default_value = harvest_core::default_log_level())]
    log_level: String,

    /// Log directory; relative paths resolve against the working directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Migrate a stored plantation or document and list slot conflicts.
    Check {
        /// Plantation or document JSON file.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    start_logging(&cli);

    match cli.command {
        None => {
            println!("harvest_core ping={}", harvest_core::ping());
            println!("harvest_core version={}", harvest_core::core_version());
            ExitCode::SUCCESS
        }
        Some(Command::Check { path }) => match check(&path) {
            Ok(0) => ExitCode::SUCCESS,
            Ok(_) => ExitCode::from(2),
            Err(message) => {
                eprintln!("error: {message}");
                ExitCode::FAILURE
            }
        },
    }
}

fn start_logging(cli: &Cli) {
    let log_dir = match resolve_log_dir(cli.log_dir.as_deref()) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            return;
        }
    };
    if let Err(err) = harvest_core::init_logging(&cli.log_level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn resolve_log_dir(requested: Option<&Path>) -> std::io::Result<PathBuf> {
    match requested {
        Some(dir) if dir.is_absolute() => Ok(dir.to_path_buf()),
        Some(dir) => Ok(std::env::current_dir()?.join(dir)),
        None => Ok(std::env::temp_dir().join("harvest_cli").join("logs")),
    }
}

/// Prints a report and returns the number of conflicts found.
fn check(path: &Path) -> Result<usize, String> {
    let shown = path.display();
    let raw = std::fs::read_to_string(path).map_err(|err| format!("{shown}: {err}"))?;
    let value = serde_json::from_str::<Value>(&raw).map_err(|err| format!("{shown}: {err}"))?;

    let (document, report) = if is_plantation_record(&value) {
        let record = serde_json::from_value::<PlantationRecord>(value)
            .map_err(|err| format!("{shown}: {err}"))?;
        let (plantation, report) = migrate_plantation(record);
        println!(
            "plantation id={} owner={} name={:?} public={}",
            plantation.id, plantation.owner_id, plantation.name, plantation.is_public
        );
        (plantation.document, report)
    } else {
        let record = serde_json::from_value::<DocumentRecord>(value)
            .map_err(|err| format!("{shown}: {err}"))?;
        migrate_document(record)
    };

    print_counts(&document);
    print_report(&report);
    let overlaps = find_overlaps(&document);
    for overlap in &overlaps {
        print_overlap(&document, overlap);
    }
    println!("conflicts={}", overlaps.len());
    if overlaps.is_empty() {
        info!("event=cli_check module=cli status=ok path={shown}");
    } else {
        warn!(
            "event=cli_check module=cli status=conflicts path={} conflicts={}",
            shown,
            overlaps.len()
        );
    }
    Ok(overlaps.len())
}

fn is_plantation_record(value: &Value) -> bool {
    value.get("id").is_some() && value.get("ownerId").is_some()
}

fn print_counts(document: &PlantationDocument) {
    let segments = document
        .plants
        .iter()
        .map(|plant| plant.segments.len())
        .sum::<usize>();
    println!(
        "spaces={} strains={} seeds={} plants={} segments={}",
        document.spaces.len(),
        document.strains.len(),
        document.inventory.len(),
        document.plants.len(),
        segments
    );
}

fn print_report(report: &MigrationReport) {
    if report.is_clean() {
        println!("migration=clean");
        return;
    }
    println!(
        "migration legacy_plants={} legacy_light_schedules={} healed_plants={} assigned_codes={} dropped_seeds={}",
        report.legacy_plants,
        report.legacy_light_schedules,
        report.healed_plants,
        report.assigned_codes,
        report.dropped_seeds
    );
}

fn print_overlap(document: &PlantationDocument, overlap: &SegmentOverlap) {
    let code = |plant_id: &str| {
        document
            .plants
            .iter()
            .find(|plant| plant.id == plant_id)
            .map_or(plant_id.to_string(), |plant| plant.code.clone())
    };
    let cells = overlap
        .cells
        .iter()
        .map(|cell| format!("{},{}", cell.x, cell.y))
        .collect::<Vec<_>>()
        .join(";");
    println!(
        "conflict space={} cells={} from={} to={} plants={} {}",
        overlap.space_id,
        cells,
        overlap.start,
        overlap.end,
        code(&overlap.first.plant_id),
        code(&overlap.second.plant_id)
    );
}

#[cfg(test)]
mod tests {
    use super::{check, resolve_log_dir, Cli, Command};
    use clap::Parser;
    use serde_json::json;
    use std::path::{Path, PathBuf};

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["harvest_cli"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.log_level, harvest_core::default_log_level());
        assert_eq!(cli.log_dir, None);
    }

    #[test]
    fn check_takes_a_path_and_global_log_flags() {
        let cli = Cli::try_parse_from([
            "harvest_cli",
            "check",
            "garden.json",
            "--log-level",
            "debug",
            "--log-dir",
            "/tmp/harvest-logs",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Check {
                path: PathBuf::from("garden.json")
            })
        );
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/harvest-logs")));
    }

    #[test]
    fn unknown_subcommands_and_missing_paths_are_rejected() {
        assert!(Cli::try_parse_from(["harvest_cli", "export"]).is_err());
        assert!(Cli::try_parse_from(["harvest_cli", "check"]).is_err());
    }

    #[test]
    fn log_dir_is_always_absolute() {
        assert!(resolve_log_dir(None).unwrap().is_absolute());
        assert!(resolve_log_dir(Some(Path::new("logs"))).unwrap().is_absolute());
        assert_eq!(
            resolve_log_dir(Some(Path::new("/var/log/harvest"))).unwrap(),
            PathBuf::from("/var/log/harvest")
        );
    }

    #[test]
    fn check_counts_only_concurrent_slot_sharing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garden.json");
        let document = json!({
            "spaces": [
                { "id": "A", "name": "Tent", "x": 0, "y": 0, "width": 2, "height": 2 }
            ],
            "plants": [
                { "id": "p1", "code": "P-1", "spaceId": "A", "gridX": 0, "gridY": 0,
                  "startedAt": "2024-01-01" },
                { "id": "p2", "code": "P-2", "spaceId": "A", "gridX": 0, "gridY": 0,
                  "startedAt": "2024-06-01" },
                { "id": "p3", "code": "P-3", "spaceId": "A", "gridX": 1, "gridY": 1,
                  "startedAt": "2024-06-15" },
                { "id": "p4", "code": "P-4", "spaceId": "A", "gridX": 1, "gridY": 1,
                  "startedAt": "2024-07-01" }
            ]
        });
        std::fs::write(&path, document.to_string()).unwrap();

        assert_eq!(check(&path).unwrap(), 1);
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = check(&missing).unwrap_err();
        assert!(err.contains("missing.json"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(check(&broken).is_err());
    }
}
