pub mod diff;
pub mod plan;

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write, stdout};
use std::process;

/// Creates a buffer which writes into given file or into stdout.
pub(crate) fn create_write_buffer(out_file: Option<File>) -> BufWriter<Box<dyn Write>> {
    if let Some(out_file) = out_file {
        BufWriter::new(Box::new(out_file))
    } else {
        BufWriter::new(Box::new(stdout()))
    }
}

fn open_file(path: &str, description: &str) -> File {
    File::open(path).unwrap_or_else(|err| {
        eprintln!("cannot open {description} file '{path}': '{err}'");
        process::exit(1);
    })
}

fn create_file(path: &str, description: &str) -> File {
    File::create(path).unwrap_or_else(|err| {
        eprintln!("cannot create {description} file '{path}': '{err}'");
        process::exit(1);
    })
}

fn create_out_result_arg(name: &'static str) -> Arg {
    Arg::new(name).help("Specifies path to the file for result output").short('o').long(name).required(false)
}
