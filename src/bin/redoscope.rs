// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{arg, Arg, ArgMatches, Command};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
//
use redoscope::analysis::{basic_blocks, extend};
use redoscope::bytecode::{decode, pretty_print};
use redoscope::pump::{pump_report, witness_bytes, PumpRequest};

fn main() -> Result<(), Box<dyn Error>> {
    // Parse command-line arguments
    let matches = Command::new("redoscope")
        .about("ReDoS discovery toolkit for linear regexp bytecode")
        .version("0.1.0")
        .subcommand_required(true)
        .arg(arg!(--verbose "Show verbose output"))
        .subcommand(
            Command::new("decode")
                .about("Decode a regexp bytecode file into a listing")
                .arg(Arg::new("file").required(true))
                .visible_alias("d"),
        )
        .subcommand(
            Command::new("blocks")
                .about("Decompose a regexp bytecode file into extended basic blocks")
                .arg(Arg::new("file").required(true))
                .visible_alias("b"),
        )
        .subcommand(
            Command::new("pump")
                .about("Pump a fuzzer witness and classify the regexp's growth")
                .arg(Arg::new("bregexp").long("bregexp").required(true))
                .arg(Arg::new("flags").long("flags"))
                .arg(Arg::new("witness").long("witness").required(true))
                .arg(Arg::new("width").long("width").default_value("1"))
                .arg(Arg::new("ptime").long("ptime").default_value("240000"))
                .arg(Arg::new("sampler-binary").long("sampler-binary"))
                .visible_alias("p"),
        )
        .get_matches();
    // Extract top-level flags
    let verbose = matches.is_present("verbose");
    // Initialise logging
    if verbose {
        init_logging(LevelFilter::Debug);
    } else {
        init_logging(LevelFilter::Info);
    }
    // Dispatch on outcome
    let ok = match matches.subcommand() {
        Some(("decode", args)) => decode_file(args),
        Some(("blocks", args)) => blocks_file(args),
        Some(("pump", args)) => pump_witness(args),
        _ => unreachable!(),
    }?;
    // Determine appropriate exit code
    let exitcode = if ok { 0 } else { 1 };
    // Done
    std::process::exit(exitcode);
}

/// Decode a given bytecode file and print its listing.
fn decode_file(args: &ArgMatches) -> Result<bool, Box<dyn Error>> {
    let filename = args.get_one::<String>("file").unwrap();
    // Read the raw program
    let bytes = fs::read(filename)?;
    // Decode into an instruction stream
    let program = decode(&bytes)?;
    // Print the listing
    print!("{}", pretty_print(&program));
    //
    Ok(true)
}

/// Decode a given bytecode file and print its extended-block
/// decomposition.
fn blocks_file(args: &ArgMatches) -> Result<bool, Box<dyn Error>> {
    let filename = args.get_one::<String>("file").unwrap();
    // Read the raw program
    let bytes = fs::read(filename)?;
    // Decode into an instruction stream
    let program = decode(&bytes)?;
    // Build the control-flow graph and merge
    let blocks = extend(basic_blocks(&program));
    // Print the blocks
    for block in &blocks {
        println!("-----------------");
        print!("{}", pretty_print(block.instructions()));
        if !block.side_exits().is_empty() {
            let exits: Vec<String> = block
                .side_exits()
                .iter()
                .filter_map(|id| blocks.iter().find(|b| b.id() == *id))
                .map(|b| format!("{:#x}", b.start_pc()))
                .collect();
            println!("side exits: {}", exits.join(", "));
        }
    }
    //
    Ok(true)
}

/// Pump a witness against its regexp and print the resulting report.
fn pump_witness(args: &ArgMatches) -> Result<bool, Box<dyn Error>> {
    // Extract the regexp
    let regexp = BASE64.decode(args.get_one::<String>("bregexp").unwrap())?;
    let flags = match args.get_one::<String>("flags") {
        Some(flags) => flags.clone(),
        None => String::new(),
    };
    // Extract the witness, regularising its escaped form
    let width: usize = args.get_one::<String>("width").unwrap().parse()?;
    let witness = witness_bytes(args.get_one::<String>("witness").unwrap(), width)?;
    let ptime: u64 = args.get_one::<String>("ptime").unwrap().parse()?;
    // Locate the sampler binary
    let binary = match args.get_one::<String>("sampler-binary") {
        Some(binary) => PathBuf::from(binary),
        None => match std::env::var("REDOSCOPE_SAMPLER") {
            Ok(binary) => PathBuf::from(binary),
            Err(_) => {
                eprintln!("no sampler binary; use --sampler-binary or REDOSCOPE_SAMPLER");
                return Ok(false);
            }
        },
    };
    // Run the pump end-to-end
    let request = PumpRequest {
        regexp,
        flags,
        witness,
        width,
        budget: Duration::from_millis(ptime),
    };
    let report = pump_report(&binary, None, &request)?;
    // Print the report
    println!("{}", serde_json::to_string_pretty(&report)?);
    //
    Ok(true)
}

/// Initialise logging using a suitable pattern.
pub fn init_logging(level: LevelFilter) {
    let encoder = PatternEncoder::new("[{l}] {m}{n}");
    //
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(encoder))
        .build();
    //
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .unwrap();
    //
    let _handle = log4rs::init_config(config).unwrap();
}
