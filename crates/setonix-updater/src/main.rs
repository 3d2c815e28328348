//! Standalone updater: waits for the application to exit, copies the files of
//! an extracted update over it and starts it again.

#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

mod app;
mod args;
mod error;
mod logging;
mod prompt;
mod settings;

use std::process::ExitCode;

use log::{info, warn};

use crate::app::UpdaterContext;
use crate::error::AppError;
use crate::prompt::{DialogPrompt, LogPrompt, Prompt};
use crate::settings::UpdaterSettings;

fn main() -> ExitCode {
    let (settings, settings_error) = UpdaterSettings::load_or_default();
    logging::init_logging(&settings);
    info!("Setonix updater {} starting", env!("CARGO_PKG_VERSION"));
    if let Some(error) = settings_error {
        warn!("Using default settings: {error}");
    }

    let prompt: Box<dyn Prompt> = if settings.show_dialogs {
        Box::new(DialogPrompt::default())
    } else {
        Box::new(LogPrompt::new(settings.headless_retry_limit))
    };

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let result = UpdaterContext::from_environment(&settings)
        .and_then(|context| app::run(&raw_args, &context, prompt.as_ref()))
        .and_then(|restart| restart.spawn());

    match result {
        Ok(_) => {
            info!("Update finished");
            ExitCode::SUCCESS
        }
        Err(error) => {
            match error {
                AppError::Aborted => prompt.info(&error.to_string()),
                _ => prompt.error(&error.to_string()),
            }
            ExitCode::from(error.exit_code())
        }
    }
}
