/*****************************************************************************************[main.rs]
Copyright (c) 2003-2006, Niklas Een, Niklas Sorensson (MiniSat)
Copyright (c) 2007-2010, Niklas Sorensson (MiniSat)

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

#[cfg(not(feature = "logging"))]
#[macro_use]
pub(crate) mod log {
    macro_rules! debug {
        ($( $x:expr ),*) => {};
    }
}

#[cfg(not(feature = "logging"))]
mod env_logger {
    pub fn init() {}
}

#[cfg(feature = "logging")]
extern crate env_logger;

#[cfg(feature = "logging")]
#[macro_use]
extern crate log;

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::exit;

use clap::{App, Arg};
use flate2::bufread::GzDecoder;

use chuisat::{BasicCallbacks, Callbacks, Cooperation, Lit, Solver, SolverOpts, TransactionDb};

mod system;

fn main() {
    env_logger::init();
    let exitcode = main2().unwrap_or_else(|err| {
        eprintln!("{}", err);
        exit(1)
    });
    exit(exitcode);
}

/// Printing callbacks: streams each itemset as it is found (verbosity 3).
struct CB {
    verbosity: i32,
}

impl Callbacks for CB {
    fn on_model(&mut self, items: &[Lit]) {
        if self.verbosity >= 3 {
            let mut out = String::new();
            for (i, l) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&(l.var().idx() + 1).to_string());
            }
            println!("{}", out);
        }
    }
}

/// MiniSat traditionally spells long options with a single dash
/// (`-minutil=7`); rewrite them to the double-dash form clap expects.
fn normalize_args() -> Vec<String> {
    env::args()
        .enumerate()
        .map(|(i, a)| {
            if i > 0
                && a.len() > 2
                && a.starts_with('-')
                && !a.starts_with("--")
                && a[1..].contains('=')
            {
                format!("-{}", a)
            } else {
                a
            }
        })
        .collect()
}

fn main2() -> io::Result<i32> {
    let resource = system::ResourceMeasure::new();

    let matches = App::new("chuisat")
        .version("0.1.0")
        .about("Closed high-utility itemset mining by SAT model enumeration")
        .arg(Arg::with_name("input-file").required(true))
        .arg(
            Arg::with_name("minutil")
                .long("minutil")
                .help("The minimum utility threshold")
                .default_value("1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("closed")
                .long("closed")
                .help("Enumerate closed itemsets only (1) or all (0)")
                .default_value("1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbosity")
                .long("verb")
                .help("Verbosity: 1 = statistics, 3 = also print each itemset")
                .default_value("1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("nthreads")
                .long("nthreads")
                .help("Number of portfolio workers")
                .default_value("1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("dimacs")
                .long("dimacs")
                .help("Export the first subtree's CNF to this file and exit")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("var-decay")
                .long("var-decay")
                .help("The variable activity decay factor")
                .default_value("0.95")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("clause-decay")
                .long("cla-decay")
                .help("The clause activity decay factor")
                .default_value("0.999")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("random-var-freq")
                .long("rnd-freq")
                .help("The frequency with which the decision heuristic tries to choose a random variable")
                .default_value("0.0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("random-seed")
                .long("rnd-seed")
                .help("Used by the random variable selection")
                .default_value("91648253.0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ccmin-mode")
                .long("ccmin-mode")
                .help("Controls conflict clause minimization (0=none, 1=basic, 2=deep)")
                .default_value("2")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("phase-saving")
                .long("phase-saving")
                .help("Controls the level of phase saving (0=none, 1=limited, 2=full)")
                .default_value("2")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("luby-restart")
                .long("luby")
                .conflicts_with("no-luby-restart")
                .help("Use the Luby restart sequence [default]"),
        )
        .arg(
            Arg::with_name("no-luby-restart")
                .long("no-luby")
                .help("Do not use the Luby restart sequence"),
        )
        .arg(
            Arg::with_name("restart-first")
                .long("rfirst")
                .help("The base restart interval")
                .default_value("100")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("restart-inc")
                .long("rinc")
                .help("Restart interval increase factor")
                .default_value("2.0")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("garbage-frac")
                .long("gc-frac")
                .help("The fraction of wasted memory allowed before a garbage collection is triggered")
                .default_value("0.20")
                .takes_value(true),
        )
        .get_matches_from(normalize_args());

    let mut solver_opts = SolverOpts::default();
    solver_opts.var_decay = matches
        .value_of("var-decay")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.var_decay);
    solver_opts.clause_decay = matches
        .value_of("clause-decay")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.clause_decay);
    solver_opts.random_var_freq = matches
        .value_of("random-var-freq")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.random_var_freq);
    solver_opts.random_seed = matches
        .value_of("random-seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.random_seed);
    solver_opts.ccmin_mode = matches
        .value_of("ccmin-mode")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.ccmin_mode);
    solver_opts.phase_saving = matches
        .value_of("phase-saving")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.phase_saving);
    solver_opts.luby_restart = !matches.is_present("no-luby-restart");
    solver_opts.restart_first = matches
        .value_of("restart-first")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.restart_first);
    solver_opts.restart_inc = matches
        .value_of("restart-inc")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.restart_inc);
    solver_opts.garbage_frac = matches
        .value_of("garbage-frac")
        .and_then(|s| s.parse().ok())
        .unwrap_or(solver_opts.garbage_frac);

    if !solver_opts.check() {
        eprintln!("Invalid option value");
        exit(1);
    }

    let min_supp: i64 = parse_or_die(&matches, "minutil");
    let closed: i32 = parse_or_die(&matches, "closed");
    let verbosity: i32 = parse_or_die(&matches, "verbosity");
    let nthreads: usize = parse_or_die(&matches, "nthreads");
    if closed != 0 && closed != 1 {
        eprintln!("ERROR! option \"closed\" must be 0 or 1");
        exit(1);
    }
    if verbosity != 1 && verbosity != 3 {
        eprintln!("ERROR! option \"verb\" must be 1 or 3");
        exit(1);
    }
    if nthreads < 1 {
        eprintln!("ERROR! option \"nthreads\" must be at least 1");
        exit(1);
    }

    let input_file = matches.value_of("input-file").expect("required arg");
    debug!("mine file {}", input_file);
    let file = BufReader::new(File::open(input_file)?);
    let db = read_input_autogz(file)?;

    if verbosity >= 1 {
        println!("c nb items              : {:<12}", db.nb_items);
        println!("c nb transactions       : {:<12}", db.nb_trans());
    }

    let coop = Cooperation::new(nthreads, min_supp, closed == 1);

    if let Some(path) = matches.value_of("dimacs") {
        return export_dimacs(&db, &coop, &solver_opts, path);
    }

    if nthreads == 1 {
        // single solver, streaming output
        let mut solver = Solver::new(solver_opts, CB { verbosity });
        solver.init_mining(&db, &coop, 0);
        solver.solve(&db, &coop);
        if verbosity >= 1 {
            solver.print_stats();
            println!("c CPU time              : {:.3}s", resource.cpu_time());
        }
    } else {
        let result = chuisat::portfolio::mine(&db, &coop, &solver_opts);
        if verbosity >= 3 {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for p in &result.patterns {
                let line: Vec<String> = p.iter().map(|i| (i + 1).to_string()).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        if verbosity >= 1 {
            println!("c restarts              : {}", result.restarts);
            println!("c conflicts             : {:<12}", result.conflicts);
            println!("c decisions             : {:<12}", result.decisions);
            println!("c propagations          : {:<12}", result.propagations);
            println!("c patterns              : {:<12}", result.patterns.len());
            println!("c CPU time              : {:.3}s", resource.cpu_time());
        }
    }

    Ok(0)
}

fn parse_or_die<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> T {
    match matches.value_of(name).and_then(|s| s.parse().ok()) {
        Some(v) => v,
        None => {
            eprintln!("ERROR! bad value for option \"{}\"", name);
            exit(1);
        }
    }
}

/// Encode the first feasible subtree and write its CNF; file problems are
/// reported on stderr with a non-zero exit.
fn export_dimacs(
    db: &TransactionDb,
    coop: &Cooperation,
    opts: &SolverOpts,
    path: &str,
) -> io::Result<i32> {
    let mut solver = Solver::new(opts.clone(), BasicCallbacks::new());
    solver.init_mining(db, coop, 0);
    solver.encode_first_subtree(db);
    let file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("could not open file {}: {}", path, e);
            return Ok(1);
        }
    };
    let mut out = BufWriter::new(file);
    solver.to_dimacs(&mut out)?;
    out.flush()?;
    Ok(0)
}

fn read_input_autogz<R: BufRead>(mut input: R) -> io::Result<TransactionDb> {
    let is_gz = input.fill_buf()?.starts_with(b"\x1F\x8B");
    if is_gz {
        chuisat::db::parse(&mut BufReader::new(GzDecoder::new(input)))
    } else {
        chuisat::db::parse(&mut input)
    }
}

