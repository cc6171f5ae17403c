mod bootstrap;

use anyhow::Result;
use report_core::error::ReportError;
use report_core::settings::Settings;
use report_core::time_utils::TimezoneHandler;
use report_data::reader::available_files;
use report_runtime::jobs::{self, Providers};
use report_runtime::providers::{
    ColumnChooser, ConsoleChooser, ConsoleValues, FirstCandidate, SpecialValuesSource,
    StaticValues,
};
use report_ui::render::{render, NumberFormat};

/// Special account values: `--special-values` file, the console prompt, or
/// nothing when prompting is disabled.
fn special_values_source(settings: &Settings) -> Result<Box<dyn SpecialValuesSource>> {
    if settings.report != "traffic" {
        return Ok(Box::new(StaticValues::default()));
    }
    Ok(match &settings.special_values {
        Some(path) => Box::new(StaticValues::load(path)?),
        None if settings.no_prompt => Box::new(StaticValues::default()),
        None => Box::new(ConsoleValues),
    })
}

fn print_available_files(err: &anyhow::Error) {
    if let Some(ReportError::NoMatchingFiles { dir, .. }) = err.downcast_ref::<ReportError>() {
        let files = available_files(dir);
        if files.is_empty() {
            eprintln!("{} contains no files", dir.display());
        } else {
            eprintln!("Available files in {}:", dir.display());
            for name in files {
                eprintln!("  - {name}");
            }
        }
    }
}

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("payreport v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        "Report: {}, timezone: {}, thresholds: +{}% / -{}%",
        settings.report,
        settings.timezone,
        settings.growth_threshold,
        settings.decline_threshold
    );

    let fmt = NumberFormat {
        locale: settings.locale()?,
        currency: settings.currency.clone(),
    };
    let now = TimezoneHandler::new(&settings.timezone).now();

    let mut console_chooser = ConsoleChooser::default();
    let mut first_candidate = FirstCandidate;
    let columns: &mut dyn ColumnChooser = if settings.no_prompt {
        &mut first_candidate
    } else {
        &mut console_chooser
    };
    let mut special_values = special_values_source(&settings)?;

    let providers = Providers {
        columns,
        special_values: special_values.as_mut(),
    };

    match jobs::run(&settings, providers, now) {
        Ok(output) => {
            print!("{}", render(&output, &fmt));
            Ok(())
        }
        Err(e) => {
            print_available_files(&e);
            Err(e)
        }
    }
}
