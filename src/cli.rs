use std::env;
use std::path::{Path, PathBuf};

use crate::data::{DataRepo, Roster};
use crate::parallel::{run_sweep, SweepVariant, WorkerPool};
use crate::sim::Simulation;
use crate::{apl, report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Simulate,
    Sweep,
    Parse,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("simulate") => Some(Command::Simulate),
        Some("sweep") => Some(Command::Sweep),
        Some("parse") => Some(Command::Parse),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Sweep) => handle_sweep(args),
        Some(Command::Parse) => handle_parse(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("usage: crucible <simulate|sweep|parse|validate>");
            2
        }
    }
}

/// Data directory from CRUCIBLE_DATA, falling back to the built-in demo
/// tables so the binary runs without any files on disk.
fn load_data() -> Result<DataRepo, i32> {
    match env::var("CRUCIBLE_DATA") {
        Ok(dir) => DataRepo::load_dir(Path::new(&dir)).map_err(|err| {
            eprintln!("failed to load data from '{dir}': {err}");
            1
        }),
        Err(_) => Ok(DataRepo::demo()),
    }
}

fn load_roster(path: &str) -> Result<Roster, i32> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        eprintln!("failed to read roster '{path}': {err}");
        1
    })?;
    serde_json::from_str(&text).map_err(|err| {
        eprintln!("bad roster '{path}': {err}");
        1
    })
}

fn handle_simulate(args: &[String]) -> i32 {
    let Some(roster_path) = args.get(2) else {
        eprintln!("usage: crucible simulate <roster.json> [ticks] [--csv <dir>]");
        return 2;
    };
    let ticks = parse_u64_arg(args.get(3), "ticks", 3600);
    let csv_dir = args
        .iter()
        .position(|arg| arg == "--csv")
        .and_then(|pos| args.get(pos + 1))
        .map(PathBuf::from);

    let data = match load_data() {
        Ok(data) => data,
        Err(code) => return code,
    };
    let roster = match load_roster(roster_path) {
        Ok(roster) => roster,
        Err(code) => return code,
    };

    let mut sim = match Simulation::init(roster, data) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("initialization failed: {err}");
            return 1;
        }
    };
    if let Err(err) = sim.run(ticks) {
        eprintln!("run failed at tick {}: {err}", sim.tick);
        return 1;
    }

    if let Some(dir) = csv_dir {
        if let Err(err) = export_csv(&sim.report, &dir) {
            eprintln!("csv export failed: {err}");
            return 1;
        }
    }

    match sim.report.summary_json() {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize summary: {err}");
            1
        }
    }
}

fn export_csv(report: &report::Report, dir: &Path) -> crate::sim::SimResult<()> {
    std::fs::create_dir_all(dir)?;
    report.write_hits_csv(&dir.join("hits.csv"))?;
    report.write_buffs_csv(&dir.join("buffs.csv"))?;
    Ok(())
}

fn handle_sweep(args: &[String]) -> i32 {
    let Some(roster_path) = args.get(2) else {
        eprintln!("usage: crucible sweep <roster.json> [runs] [ticks] [workers]");
        return 2;
    };
    let runs = parse_u64_arg(args.get(3), "runs", 16) as usize;
    let ticks = parse_u64_arg(args.get(4), "ticks", 3600);
    let workers = parse_u64_arg(args.get(5), "workers", 0) as usize;

    let data = match load_data() {
        Ok(data) => data,
        Err(code) => return code,
    };
    let base = match load_roster(roster_path) {
        Ok(roster) => roster,
        Err(code) => return code,
    };

    let variants: Vec<SweepVariant> = (0..runs)
        .map(|i| {
            let mut roster = base.clone();
            roster.seed = base.seed.wrapping_add(i as u64);
            SweepVariant { label: format!("seed-{}", roster.seed), roster }
        })
        .collect();

    let pool = if workers == 0 {
        WorkerPool::default_workers()
    } else {
        match WorkerPool::with_workers(workers) {
            Ok(pool) => pool,
            Err(err) => {
                eprintln!("failed to build worker pool: {err}");
                return 1;
            }
        }
    };
    let outcomes = run_sweep(&variants, &data, ticks, &pool);

    println!("label\tticks\ttotal_damage\tdamage_per_tick\tstatus");
    let mut failures = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "{}\t{}\t{:.2}\t{:.4}\tok",
                outcome.label, summary.ticks, summary.total_damage, summary.damage_per_tick
            ),
            Err(err) => {
                failures += 1;
                println!("{}\t-\t-\t-\tfailed: {err}", outcome.label);
            }
        }
    }
    if failures == outcomes.len() && !outcomes.is_empty() {
        1
    } else {
        0
    }
}

fn handle_parse(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: crucible parse <rotation-file>");
        return 2;
    };
    let source = crate::data::AplSource::File(PathBuf::from(path));
    let text = match apl::read_source(&source) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read rotation '{path}': {err}");
            return 1;
        }
    };
    let records = apl::parse(&text);
    if records.is_empty() {
        eprintln!("no usable rotation lines in '{path}'");
        return 1;
    }
    for record in &records {
        println!("{:>3}  {record}", record.priority);
    }
    0
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(roster_path) = args.get(2) else {
        eprintln!("usage: crucible validate <roster.json>");
        return 2;
    };
    let data = match load_data() {
        Ok(data) => data,
        Err(code) => return code,
    };
    let roster = match load_roster(roster_path) {
        Ok(roster) => roster,
        Err(code) => return code,
    };
    match Simulation::init(roster, data) {
        Ok(sim) => {
            println!(
                "validation passed: {} characters, {} rotation entries",
                sim.chars.len(),
                sim.records.len()
            );
            0
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            1
        }
    }
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                if !value.starts_with("--") {
                    eprintln!("invalid {name} '{value}', defaulting to {default}");
                }
            }
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("crucible")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn command_parsing() {
        assert_eq!(parse_command(&args(&["simulate"])), Some(Command::Simulate));
        assert_eq!(parse_command(&args(&["sweep"])), Some(Command::Sweep));
        assert_eq!(parse_command(&args(&["parse"])), Some(Command::Parse));
        assert_eq!(parse_command(&args(&["validate"])), Some(Command::Validate));
        assert_eq!(parse_command(&args(&["bogus"])), None);
        assert_eq!(parse_command(&args(&[])), None);
    }

    #[test]
    fn unknown_command_exits_with_usage() {
        assert_eq!(run_with_args(&args(&["bogus"])), 2);
        assert_eq!(run_with_args(&args(&[])), 2);
    }

    #[test]
    fn missing_required_path_exits_with_usage() {
        assert_eq!(run_with_args(&args(&["simulate"])), 2);
        assert_eq!(run_with_args(&args(&["validate"])), 2);
        assert_eq!(run_with_args(&args(&["parse"])), 2);
    }

    #[test]
    fn numeric_arg_fallback() {
        assert_eq!(parse_u64_arg(Some(&"300".to_string()), "ticks", 3600), 300);
        assert_eq!(parse_u64_arg(Some(&"abc".to_string()), "ticks", 3600), 3600);
        assert_eq!(parse_u64_arg(None, "ticks", 3600), 3600);
    }
}
