//! Logging configuration for the Ark node.

use crate::args::LogArgs;
use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` env var if set, or a level chosen by `-v`
/// 3. Apply any custom filter from `--log.filter`
pub fn init_logging(args: &LogArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(args))
        .without_time()
        .try_init()
        .map_err(|e| eyre!("failed to initialize logging: {e}"))?;

    if !args.quiet {
        log_startup_banner();
    }

    Ok(())
}

fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',') {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring invalid log directive {directive:?}: {e}"),
            }
        }
    }

    filter
}

fn log_startup_banner() {
    println!(
        r#"
   __ _ _ __| | __
  / _` | '__| |/ /
 | (_| | |  |   <
  \__,_|_|  |_|\_\

 Ark Node v{}
"#,
        crate::version::VERSION
    );
}
