#[cfg(test)]
#[path = "../../tests/unit/commands/plan_test.rs"]
mod plan_test;

use super::*;
use routeplan_cli::core::models::read_config;
use routeplan_cli::core::prelude::*;
use routeplan_cli::extensions::plan::{plan_stops, write_plan};
use std::sync::Arc;

const STOPS_ARG_NAME: &str = "STOPS";
const CONFIG_ARG_NAME: &str = "config";
const GROUP_COUNT_ARG_NAME: &str = "group-count";
const MAX_STOPS_ARG_NAME: &str = "max-stops";
const SEED_ARG_NAME: &str = "seed";
const LOG_ARG_NAME: &str = "log";
const OUT_RESULT_ARG_NAME: &str = "out-result";

pub fn get_plan_app() -> Command {
    Command::new("plan")
        .about("Distributes stops into capacity-bounded routes and orders every route")
        .arg(Arg::new(STOPS_ARG_NAME).help("Sets the file with depot and stops to plan").required(true).index(1))
        .arg(
            Arg::new(CONFIG_ARG_NAME)
                .help("Specifies path to the config file")
                .short('c')
                .long(CONFIG_ARG_NAME)
                .required(false),
        )
        .arg(
            Arg::new(GROUP_COUNT_ARG_NAME)
                .help("Amount of routes to create, overrides config")
                .short('g')
                .long(GROUP_COUNT_ARG_NAME)
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new(MAX_STOPS_ARG_NAME)
                .help("Max amount of stops in one route, overrides config")
                .short('m')
                .long(MAX_STOPS_ARG_NAME)
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new(SEED_ARG_NAME)
                .help("Specifies random seed to get repeatable results")
                .short('s')
                .long(SEED_ARG_NAME)
                .value_parser(clap::value_parser!(u64))
                .required(false),
        )
        .arg(
            Arg::new(LOG_ARG_NAME)
                .help("Specifies whether planning messages are logged to stderr")
                .short('l')
                .long(LOG_ARG_NAME)
                .action(ArgAction::SetTrue),
        )
        .arg(create_out_result_arg(OUT_RESULT_ARG_NAME))
}

pub fn run_plan(
    matches: &ArgMatches,
    out_writer_func: fn(Option<File>) -> BufWriter<Box<dyn Write>>,
) -> Result<(), String> {
    let config = get_config(matches)?;
    let environment = get_environment(matches);

    let stops_path = matches.get_one::<String>(STOPS_ARG_NAME).ok_or("stops file is not specified")?;
    let stops_reader = BufReader::new(open_file(stops_path, "stops"));

    let output = plan_stops(stops_reader, &config, &environment).map_err(|err| format!("cannot plan routes: {err}"))?;

    let out_result = matches.get_one::<String>(OUT_RESULT_ARG_NAME).map(|path| create_file(path, "out result"));

    write_plan(out_writer_func(out_result), &output).map_err(|err| err.to_string())
}

fn get_config(matches: &ArgMatches) -> Result<Config, String> {
    let mut config = matches
        .get_one::<String>(CONFIG_ARG_NAME)
        .map(|path| read_config(BufReader::new(open_file(path, "config"))))
        .transpose()
        .map_err(|err| format!("cannot read config: {err}"))?
        .unwrap_or_default();

    let group_count = matches.get_one::<usize>(GROUP_COUNT_ARG_NAME).copied();
    let max_stops = matches.get_one::<usize>(MAX_STOPS_ARG_NAME).copied();

    if group_count.is_some() || max_stops.is_some() {
        let planning = config.planning.get_or_insert_with(Default::default);
        planning.group_count = group_count.or(planning.group_count);
        planning.max_stops_per_group = max_stops.or(planning.max_stops_per_group);
    }

    let limits = config.clustering_limits();
    if limits.group_count == 0 || limits.max_stops_per_group == 0 {
        return Err("group count and max stops should be positive".to_string());
    }

    Ok(config)
}

fn get_environment(matches: &ArgMatches) -> Environment {
    let random: Arc<dyn Random> = match matches.get_one::<u64>(SEED_ARG_NAME) {
        Some(seed) => Arc::new(DefaultRandom::with_seed(*seed)),
        None => Arc::new(DefaultRandom::default()),
    };

    let logger: InfoLogger =
        if matches.get_flag(LOG_ARG_NAME) { Arc::new(|msg: &str| eprintln!("{msg}")) } else { Arc::new(|_: &str| {}) };

    Environment::new(random, logger)
}
