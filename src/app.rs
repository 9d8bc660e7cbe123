//! Top-level application orchestration.
//!
//! `src/main.rs` only initializes logging and maps errors to exit codes; this
//! module parses arguments, loads configuration, opens the store and runs one
//! command.

use std::io;

use clap::Parser;

use crate::cli::{ClearArgs, Cli, Command, FitArgs, SampleArgs, ShowArgs, TargetArg};
use crate::config::Config;
use crate::data::{SampleConfig, generate_survey, write_survey};
use crate::domain::{FitRequest, PointStyleTable};
use crate::error::SedError;
use crate::render::{AsciiRenderer, JsonChartRenderer, Renderer};
use crate::report;
use crate::store::{CsvStore, RecordStore, TargetKey};
use crate::target::Target;

/// Entry point for the `sed` binary.
pub fn run() -> Result<(), SedError> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    run_command(cli.command, &config)
}

/// Run one parsed command against `config`.
pub fn run_command(command: Command, config: &Config) -> Result<(), SedError> {
    match command {
        Command::Targets => {
            let (store, _) = open_store(config)?;
            handle_targets(&store)
        }
        Command::Show(args) => {
            let (store, styles) = open_store(config)?;
            handle_show(&store, &styles, &args, config)
        }
        Command::Fit(args) => {
            let (mut store, styles) = open_store(config)?;
            handle_fit(&mut store, &styles, args)
        }
        Command::Clear(args) => {
            let (mut store, styles) = open_store(config)?;
            handle_clear(&mut store, &styles, &args)
        }
        Command::Fits(args) => {
            let (store, styles) = open_store(config)?;
            handle_fits(&store, &styles, &args)
        }
        Command::Sample(args) => handle_sample(&args),
    }
}

/// Open the configured store and load its point-style table once.
fn open_store(config: &Config) -> Result<(CsvStore, PointStyleTable), SedError> {
    let store = CsvStore::open(&config.data_dir)?;
    let styles = store.read_point_styles()?;
    log::debug!(
        "opened store {} ({} point styles)",
        store.dir().display(),
        styles.len()
    );
    Ok((store, styles))
}

fn handle_targets(store: &dyn RecordStore) -> Result<(), SedError> {
    print!("{}", report::format_target_list(&store.list_targets()?));
    Ok(())
}

fn handle_show(store: &dyn RecordStore, styles: &PointStyleTable, args: &ShowArgs, config: &Config) -> Result<(), SedError> {
    let target = Target::load(store, TargetKey::parse(&args.target), styles)?;
    let fits = target.saved_fits(store)?;
    let chart = target.chart(&fits);

    print!("{}", report::format_target_summary(&target));
    print!("{}", report::format_saved_fits(target.name(), &fits));

    let width = args.width.unwrap_or(config.plot_width);
    let height = args.height.unwrap_or(config.plot_height);
    AsciiRenderer::new(io::stdout().lock(), width, height).render(&chart)?;

    if let Some(path) = &args.export {
        JsonChartRenderer::create(path)?.render(&chart)?;
        log::info!("wrote chart JSON to {}", path.display());
    }
    Ok(())
}

fn handle_fit(store: &mut dyn RecordStore, styles: &PointStyleTable, args: FitArgs) -> Result<(), SedError> {
    let mut target = Target::load(&*store, TargetKey::parse(&args.target), styles)?;

    let mut request = FitRequest::new(args.kind, args.range)
        .with_exclusions(args.exclude)
        .with_subtract(args.subtract)
        .with_line_style(args.line_style);
    if let Some(held) = args.hold {
        request = request.with_held(held);
    }

    let outcome = target.create_fit(store, request)?;
    print!(
        "{}",
        report::format_fit_outcome(target.name(), &outcome, &target.hold_descriptor())
    );
    Ok(())
}

fn handle_clear(store: &mut dyn RecordStore, styles: &PointStyleTable, args: &ClearArgs) -> Result<(), SedError> {
    let target = Target::load(&*store, TargetKey::parse(&args.target), styles)?;
    let removed = target.clear_fits(store, args.kind)?;
    println!("Removed {removed} {} fit(s) from {}.", args.kind, target.name());
    Ok(())
}

fn handle_fits(store: &dyn RecordStore, styles: &PointStyleTable, args: &TargetArg) -> Result<(), SedError> {
    let target = Target::load(store, TargetKey::parse(&args.target), styles)?;
    print!("{}", report::format_saved_fits(target.name(), &target.saved_fits(store)?));
    Ok(())
}

fn handle_sample(args: &SampleArgs) -> Result<(), SedError> {
    let survey = generate_survey(&SampleConfig {
        targets: args.targets,
        seed: args.seed,
        points_per_target: args.points,
    })?;
    let store = CsvStore::create(&args.out)?;
    write_survey(&store, &survey)?;
    println!(
        "Wrote {} synthetic targets to {}.",
        survey.records.len(),
        store.dir().display()
    );
    Ok(())
}
