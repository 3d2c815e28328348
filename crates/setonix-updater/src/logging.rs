#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use setonix_platform::AppPaths;

use crate::settings::UpdaterSettings;

const LEVEL_MARKER_PREFIX: &str = "setonix_loglevel.";

struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn ensure_file(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }

        Ok(())
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_file()?;
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("log file not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), File::flush)
    }
}

/// Cut `log_path` down to its newest half, at a line boundary, once it grows
/// past `max_log_size` bytes.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    let Ok(metadata) = std::fs::metadata(log_path) else {
        return;
    };
    if metadata.len() <= max_log_size {
        return;
    }
    let Ok(contents) = std::fs::read(log_path) else {
        return;
    };
    let half = contents.len() / 2;
    let keep_from = contents[half..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(half, |pos| half + pos + 1);
    if let Err(error) = std::fs::write(log_path, &contents[keep_from..]) {
        eprintln!("Could not trim {}: {error}", log_path.display());
    }
}

fn daily_log_file(log_dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    log_dir.join(format!("setonix_updater_{}.log", date.format("%Y-%m-%d")))
}

fn marker_level(extension: &str) -> Option<LevelFilter> {
    match extension.to_ascii_lowercase().as_str() {
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Most verbose of the base level and any `setonix_loglevel.<level>` marker
/// file present in `marker_dir`.
fn effective_level(debug_enabled: bool, marker_dir: &Path) -> LevelFilter {
    let base = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    let Ok(entries) = std::fs::read_dir(marker_dir) else {
        return base;
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let extension = name.get(..LEVEL_MARKER_PREFIX.len()).and_then(|prefix| {
                prefix
                    .eq_ignore_ascii_case(LEVEL_MARKER_PREFIX)
                    .then(|| &name[LEVEL_MARKER_PREFIX.len()..])
            })?;
            marker_level(extension)
        })
        .fold(base, std::cmp::Ord::max)
}

pub fn init_logging(settings: &UpdaterSettings) {
    let level = effective_level(settings.debug_logging, &setonix_platform::temp_root());

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("setonix")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    let log_path = AppPaths::new().ok().and_then(|paths| {
        paths.ensure_dirs().ok()?;
        Some(daily_log_file(
            &paths.log_dir(),
            chrono::Utc::now().date_naive(),
        ))
    });
    if let Some(log_path) = &log_path {
        trim_log_file_if_oversized(log_path, settings.max_log_size_bytes);
        if let Ok(writer) = ResilientFileWriter::new(log_path.clone()) {
            loggers.push(WriteLogger::new(level, config, writer));
        }
    }

    if loggers.is_empty() || CombinedLogger::init(loggers).is_err() {
        return;
    }
    log::set_max_level(level);

    if let Some(log_path) = log_path {
        log::info!("Logging at {level} to {}", log_path.display());
    }
}
