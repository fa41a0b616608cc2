//! A command line interface to the delivery route planning engine.

mod commands;

use crate::commands::diff::{get_diff_app, run_diff};
use crate::commands::plan::{get_plan_app, run_plan};
use crate::commands::*;
use clap::Command;
use std::process;

fn main() {
    let matches = get_app().get_matches();

    let result = match matches.subcommand() {
        Some(("plan", plan_matches)) => run_plan(plan_matches, create_write_buffer),
        Some(("diff", diff_matches)) => run_diff(diff_matches, create_write_buffer),
        _ => Err("no subcommand was used. Use -h to print help information.".to_string()),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn get_app() -> Command {
    Command::new("Delivery Route Planner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A command line interface to plan delivery routes and inspect route changes")
        .subcommand(get_plan_app())
        .subcommand(get_diff_app())
}
