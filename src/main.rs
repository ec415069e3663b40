//! cmdplan: print how command lines parse.
//!
//! Reads lines from the command line (or stdin, one per line) and prints
//! each line's execution plan: the programs, their arguments, redirections
//! and how each program leads to the next.
//!
//! ```text
//! cmdplan [--cursor N] [--json] [--subst] [--dump-config] [LINE ...]
//! ```

use std::io::BufRead;
use std::process::ExitCode;

use cmdplan::config::Config;
use cmdplan::logging;
use cmdplan::parse::{CmdContext, Syntax};
use cmdplan::plan::{ExecContext, ExecPlan};

const USAGE: &str = "usage: cmdplan [--cursor N] [--json] [--subst] [--dump-config] [LINE ...]";

#[derive(Debug, Default)]
struct Options {
    cursor: Option<usize>,
    json: bool,
    subst: bool,
    dump_config: bool,
    lines: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => opts.json = true,
            "--subst" => opts.subst = true,
            "--dump-config" => opts.dump_config = true,
            "--cursor" => {
                let value = args.next().ok_or("--cursor requires a value")?;
                let cursor = value
                    .parse()
                    .map_err(|_| format!("invalid cursor offset: {value}"))?;
                opts.cursor = Some(cursor);
            }
            "-h" | "--help" => return Err(USAGE.into()),
            "--" => {
                opts.lines.extend(args.by_ref());
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            _ => opts.lines.push(arg),
        }
    }
    Ok(opts)
}

/// Quote argv for display the way a POSIX shell would read it back.
fn quote_args(cmd: &CmdContext) -> String {
    shlex::try_join(cmd.texts()).unwrap_or_else(|_| format!("{:?}", cmd.texts()))
}

fn print_context(index: usize, ctx: &ExecContext) {
    println!("  [{index}] {}", quote_args(&ctx.cmd));
    let streams = [
        ("stdin", &ctx.stdin),
        ("stdout", &ctx.stdout),
        ("stderr", &ctx.stderr),
    ];
    for (name, target) in streams {
        if !target.is_default() {
            println!("      {name}: {target}");
        }
    }
    if !ctx.wait_for_completion {
        println!("      no wait");
    }
    if ctx.run_on_second_console {
        println!("      second console");
    }
    if let Some(relation) = ctx.next_relation {
        println!("      then {}", relation.as_str());
    }
}

fn print_plan(plan: &ExecPlan) {
    for (index, ctx) in plan.commands.iter().enumerate() {
        print_context(index, ctx);
    }
    if let Some(current) = plan.current {
        println!(
            "  cursor: program {} argument {} offset {}",
            current.program, current.arg, current.offset
        );
    }
    if !plan.wait_for_completion {
        println!("  background: {}", quote_args(&plan.entire_command.cmd));
    }
}

fn print_substitutions(syntax: &Syntax, line: &str, cursor: usize) {
    let set = syntax.find_substitutions(line);
    if set.is_empty() {
        println!("  no substitutions");
        return;
    }
    let next = set.next_region_to_evaluate();
    for entry in &set.entries {
        let state = if entry.terminated {
            "terminated"
        } else if entry.abandoned {
            "abandoned"
        } else {
            "open"
        };
        println!(
            "  {}depth {} {} {}..{} {state}: {}",
            if next == Some(entry) { "* " } else { "  " },
            entry.depth,
            if entry.new_style { "$()" } else { "``" },
            entry.start,
            entry.end,
            entry.text(line)
        );
    }
    if let Some(entry) = set.best_region_at_offset(cursor) {
        println!("  cursor region: {}", entry.text(line));
    }
}

/// Parse one line and print the result. Returns false on error.
fn process_line(syntax: &Syntax, opts: &Options, line: &str) -> bool {
    let cursor = opts.cursor.unwrap_or_else(|| line.chars().count());
    if opts.subst {
        println!("{line}");
        print_substitutions(syntax, line, cursor);
        return true;
    }

    let result = syntax
        .tokenize(line, cursor)
        .and_then(|seq| syntax.build_plan(&seq));
    logging::record_plan(line, &result);

    match result {
        Ok(plan) if opts.json => match serde_json::to_string_pretty(&plan) {
            Ok(json) => {
                println!("{json}");
                true
            }
            Err(e) => {
                eprintln!("cmdplan: {e}");
                false
            }
        },
        Ok(plan) => {
            println!("{line}");
            print_plan(&plan);
            true
        }
        Err(e) => {
            eprintln!("cmdplan: {line:?}: {e}");
            false
        }
    }
}

fn main() -> ExitCode {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("cmdplan: {e}; using defaults");
        Config::default_config()
    });
    logging::init(&config.logging);

    if opts.dump_config {
        return match config.to_toml() {
            Ok(toml) => {
                print!("{toml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("cmdplan: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let syntax = Syntax::from_config(&config);
    let mut ok = true;
    if opts.lines.is_empty() {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => ok &= process_line(&syntax, &opts, &line),
                Err(e) => {
                    eprintln!("cmdplan: failed to read stdin: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    } else {
        for line in &opts.lines {
            ok &= process_line(&syntax, &opts, line);
        }
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
