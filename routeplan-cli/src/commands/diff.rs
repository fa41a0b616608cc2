#[cfg(test)]
#[path = "../../tests/unit/commands/diff_test.rs"]
mod diff_test;

use super::*;
use routeplan_cli::extensions::diff::{diff_stops, write_diff};

const OLD_STOPS_ARG_NAME: &str = "OLD_STOPS";
const NEW_STOPS_ARG_NAME: &str = "NEW_STOPS";
const MARK_ARG_NAME: &str = "mark";
const OUT_RESULT_ARG_NAME: &str = "out-result";

pub fn get_diff_app() -> Command {
    Command::new("diff")
        .about("Detects changes between committed and candidate stop lists of one route")
        .arg(Arg::new(OLD_STOPS_ARG_NAME).help("Sets the file with committed stops").required(true).index(1))
        .arg(Arg::new(NEW_STOPS_ARG_NAME).help("Sets the file with candidate stops").required(true).index(2))
        .arg(
            Arg::new(MARK_ARG_NAME)
                .help("Specifies whether candidate stops annotated with their modification are written too")
                .long(MARK_ARG_NAME)
                .action(ArgAction::SetTrue),
        )
        .arg(create_out_result_arg(OUT_RESULT_ARG_NAME))
}

pub fn run_diff(
    matches: &ArgMatches,
    out_writer_func: fn(Option<File>) -> BufWriter<Box<dyn Write>>,
) -> Result<(), String> {
    let old_path = matches.get_one::<String>(OLD_STOPS_ARG_NAME).ok_or("old stops file is not specified")?;
    let new_path = matches.get_one::<String>(NEW_STOPS_ARG_NAME).ok_or("new stops file is not specified")?;

    let output = diff_stops(
        BufReader::new(open_file(old_path, "old stops")),
        BufReader::new(open_file(new_path, "new stops")),
        matches.get_flag(MARK_ARG_NAME),
    )
    .map_err(|err| format!("cannot detect changes: {err}"))?;

    let out_result = matches.get_one::<String>(OUT_RESULT_ARG_NAME).map(|path| create_file(path, "out result"));

    write_diff(out_writer_func(out_result), &output).map_err(|err| err.to_string())
}
