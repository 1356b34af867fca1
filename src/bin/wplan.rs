//! wplan CLI - width-based planning over JSON problem documents.
//!
//! Usage:
//! - `wplan <problem.json> [--out <dir>] [--opt key=value]...` - solve
//! - `wplan help` - show help
//!
//! Every `--opt` pair lands in the engine configuration verbatim, e.g.
//! `--opt driver=iw --opt width.max=2 --opt timeout_ms=60000`.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExit;
use std::time::Instant;

use wplan::config::Config;
use wplan::driver::solve;
use wplan::loader::load_problem_file;
use wplan::search::ExitCode;

fn main() -> ProcessExit {
    wplan::trace::init_subscriber();

    let mut args = std::env::args().skip(1);
    let problem_path = match args.next().as_deref() {
        None | Some("help") | Some("--help") | Some("-h") => {
            print_help();
            return ProcessExit::SUCCESS;
        }
        Some(path) => PathBuf::from(path),
    };

    let mut out_dir = PathBuf::from(".");
    let mut config = Config::new();
    let rest: Vec<String> = args.collect();
    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => match iter.next() {
                Some(dir) => out_dir = PathBuf::from(dir),
                None => {
                    eprintln!("--out requires a directory");
                    return ProcessExit::from(2);
                }
            },
            "--opt" => match iter.next() {
                Some(pair) => match pair.split_once('=') {
                    Some((key, value)) => config.set(key, value),
                    None => {
                        eprintln!("--opt requires key=value, got '{}'", pair);
                        return ProcessExit::from(2);
                    }
                },
                None => {
                    eprintln!("--opt requires key=value");
                    return ProcessExit::from(2);
                }
            },
            other => {
                eprintln!("unknown argument: {}", other);
                print_help();
                return ProcessExit::from(2);
            }
        }
    }

    let start = Instant::now();
    let problem = match load_problem_file(&problem_path) {
        Ok(problem) => problem,
        Err(err) => {
            eprintln!("{}", err);
            return ProcessExit::from(2);
        }
    };

    let outcome = match solve(&problem, &config) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{}", err);
            return ProcessExit::from(2);
        }
    };

    let total_time = start.elapsed().as_secs_f64();
    if let Err(err) = std::fs::create_dir_all(&out_dir)
        .and_then(|_| outcome.write(&out_dir, total_time))
    {
        eprintln!("cannot write outputs: {}", err);
        return ProcessExit::from(2);
    }

    eprintln!(
        "result: {:?} | plan length {} | expanded {} | generated {} | {:.3}s",
        outcome.exit,
        outcome.plan.len(),
        outcome.stats.expanded(),
        outcome.stats.generated(),
        outcome.search_time,
    );

    match outcome.exit {
        ExitCode::PlanFound => ProcessExit::SUCCESS,
        ExitCode::Unsolvable => ProcessExit::from(10),
        ExitCode::OutOfMemory => ProcessExit::from(11),
        ExitCode::OutOfTime => ProcessExit::from(12),
        ExitCode::ValidationFailed => ProcessExit::from(13),
    }
}

fn print_help() {
    println!("wplan - best-first width search planner\n");
    println!("Usage:");
    println!("  wplan <problem.json> [--out <dir>] [--opt key=value]...");
    println!();
    println!("Options (via --opt):");
    println!("  driver=bfws|iw|bfs|lifted     search variant (default bfws)");
    println!("  bfws.type=F0|F1|F2|F5         open-list ordering (default F5)");
    println!("  width.max=N                   IW maximum width");
    println!("  search_width=N                BFWS novelty width cap");
    println!("  simulation_width=N            IW-simulation width cap");
    println!("  timeout_ms=N  memory_mb=N     resource limits");
}
