//! Command line of the updater:
//! `setonix_updater <callingProcessID> <applicationPath> [/lang:xx] [passthrough...]`.

use std::path::{Path, PathBuf};

use setonix_core::{Locale, LocaleParseError};
use thiserror::Error;

const LANGUAGE_SWITCH: &str = "lang:";
const EMPTY_COMMAND_LINE: &str = "(empty command line)";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("expected a process id and an application path, got {found} argument(s)")]
    MissingArguments { found: usize },
    #[error("'{0}' is not a valid process id")]
    InvalidProcessId(String),
    #[error("application {} does not exist", .0.display())]
    ApplicationNotFound(PathBuf),
    #[error(transparent)]
    InvalidLanguage(#[from] LocaleParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterArguments {
    calling_pid: u32,
    application_path: PathBuf,
    language: Option<Locale>,
    passthrough: Vec<String>,
}

impl UpdaterArguments {
    /// Parse the arguments after the program name.
    ///
    /// # Errors
    /// Returns an error when the process id or application path is missing
    /// or invalid, or when the language switch names no valid locale.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ArgumentError> {
        let mut language = None;
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.as_ref();
            match language_value(arg) {
                Some(value) if language.is_none() => language = Some(Locale::parse(value)?),
                _ => positional.push(arg),
            }
        }

        let [pid, application, passthrough @ ..] = positional.as_slice() else {
            return Err(ArgumentError::MissingArguments {
                found: positional.len(),
            });
        };

        let calling_pid = pid
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or_else(|| ArgumentError::InvalidProcessId((*pid).to_string()))?;

        let application_path = PathBuf::from(application);
        if !application_path.is_file() {
            return Err(ArgumentError::ApplicationNotFound(application_path));
        }

        Ok(Self {
            calling_pid,
            application_path,
            language,
            passthrough: passthrough.iter().map(ToString::to_string).collect(),
        })
    }

    #[must_use]
    pub fn calling_pid(&self) -> u32 {
        self.calling_pid
    }

    #[must_use]
    pub fn application_path(&self) -> &Path {
        &self.application_path
    }

    /// Directory the application lives in; the files of the update are
    /// applied relative to it.
    #[must_use]
    pub fn target_root(&self) -> &Path {
        self.application_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
    }

    #[must_use]
    pub fn language(&self) -> Option<&Locale> {
        self.language.as_ref()
    }

    #[must_use]
    pub fn passthrough(&self) -> &[String] {
        &self.passthrough
    }
}

/// `xx` from `/lang:xx` or `-lang:xx`, matched case-insensitively.
fn language_value(arg: &str) -> Option<&str> {
    let rest = arg.strip_prefix(['/', '-'])?;
    let switch = rest.get(..LANGUAGE_SWITCH.len())?;
    if !switch.eq_ignore_ascii_case(LANGUAGE_SWITCH) {
        return None;
    }
    let value = &rest[LANGUAGE_SWITCH.len()..];
    (value.len() >= 2).then_some(value)
}

/// The command line as shown in error messages.
pub fn display_command_line<S: AsRef<str>>(args: &[S]) -> String {
    if args.iter().all(|arg| arg.as_ref().trim().is_empty()) {
        return EMPTY_COMMAND_LINE.to_string();
    }
    args.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
