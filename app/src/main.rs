use std::process::ExitCode;

mod cli;
mod describe;
mod outcome;
mod pipeline;

use cli::CliError;
use outcome::Outcome;

fn init_logger(level: log::LevelFilter) {
    // RUST_LOG, when set, wins over the command line.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let env_options = std::env::var(cli::OPTIONS_ENV).ok();

    let outcome = match cli::parse(&args, env_options.as_deref()) {
        Ok(invocation) => {
            init_logger(invocation.tool.log_level());
            pipeline::run(invocation)
        }
        Err(CliError::Display(text)) => Ok(Outcome::Display(text)),
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(Outcome::Display(text)) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::Rendered(summary)) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("fxdo: {:#}", e);
            ExitCode::from(2)
        }
    }
}
