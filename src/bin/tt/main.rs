#![deny(unsafe_code)]

mod cli;

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser as _;

use cli::Command;
use ttconv::convert::{convert, infer_format};
use ttconv::{Config, Error, Format, Result};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(0),
        Err(Error::Usage(msg)) => {
            eprintln!("tt: {}", msg);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("tt: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    let Command::Convert(args) = cli.command;

    let config = Config::load(args.config_file.as_deref(), args.config.as_deref())?;
    init_logging(&config);

    let itype = resolve_format(args.itype.as_deref(), &args.input, "--itype")?;
    let otype = resolve_format(args.otype.as_deref(), &args.output, "--otype")?;

    let input = fs::read_to_string(&args.input)?;

    let show_progress = config.general.progress_bar.unwrap_or(true);
    let mut bar = ProgressBar::new(show_progress);
    let output = convert(&input, itype, otype, &config, &args.filters, &mut |step, total| bar.update(step, total))?;
    bar.finish();

    fs::write(&args.output, output)?;
    Ok(())
}

fn resolve_format(explicit: Option<&str>, path: &Path, flag: &str) -> Result<Format> {
    match explicit {
        Some(name) => Format::from_name(name).ok_or_else(|| Error::Usage(format!("unrecognized {} value: {:?}", flag, name))),
        None => infer_format(path).ok_or_else(|| Error::Usage(format!("cannot infer a format from {:?}; pass {}", path, flag))),
    }
}

fn init_logging(config: &Config) {
    let level = config.general.log_level.unwrap_or_default().as_filter();
    env_logger::Builder::new().filter_level(level).format_timestamp(None).init();
}

/// A synchronous stderr line-redraw (sec. 10.7): not a dedicated
/// progress-bar crate, just `\r`-overwritten percent output.
struct ProgressBar {
    enabled: bool,
    drawn: bool,
}

impl ProgressBar {
    fn new(enabled: bool) -> Self {
        Self { enabled, drawn: false }
    }

    fn update(&mut self, step: usize, total: usize) {
        if !self.enabled {
            return;
        }
        let pct = if total == 0 { 100 } else { (step * 100 / total).min(100) };
        eprint!("\rconverting... {:3}%", pct);
        let _ = std::io::stderr().flush();
        self.drawn = true;
    }

    fn finish(&self) {
        if self.drawn {
            eprintln!();
        }
    }
}
