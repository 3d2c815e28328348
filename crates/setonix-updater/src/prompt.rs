use std::cell::Cell;

use log::{error, info, warn};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

pub const ERROR_TITLE: &str = "Setonix Updater";

/// How the updater talks to the person in front of the screen.
pub trait Prompt {
    fn error(&self, message: &str);

    fn info(&self, message: &str);

    /// Ask whether to try again. `false` means the user gave up.
    fn retry(&self, message: &str) -> bool;
}

/// Native message boxes.
pub struct DialogPrompt {
    title: String,
}

impl DialogPrompt {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    fn dialog(&self, level: MessageLevel, message: &str) -> MessageDialog {
        MessageDialog::new()
            .set_level(level)
            .set_title(self.title.as_str())
            .set_description(message)
    }
}

impl Default for DialogPrompt {
    fn default() -> Self {
        Self::new(ERROR_TITLE)
    }
}

impl Prompt for DialogPrompt {
    fn error(&self, message: &str) {
        error!("{message}");
        self.dialog(MessageLevel::Error, message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }

    fn info(&self, message: &str) {
        info!("{message}");
        self.dialog(MessageLevel::Info, message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }

    fn retry(&self, message: &str) -> bool {
        warn!("{message}");
        let answer = self
            .dialog(MessageLevel::Warning, message)
            .set_buttons(MessageButtons::OkCancelCustom(
                "Retry".to_string(),
                "Cancel".to_string(),
            ))
            .show();
        match answer {
            MessageDialogResult::Ok | MessageDialogResult::Yes => true,
            MessageDialogResult::Custom(label) => label == "Retry",
            _ => false,
        }
    }
}

/// Headless prompt: logs every message and agrees to retry until its budget
/// is spent.
pub struct LogPrompt {
    retries_left: Cell<u32>,
}

impl LogPrompt {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retries_left: Cell::new(max_retries),
        }
    }
}

impl Prompt for LogPrompt {
    fn error(&self, message: &str) {
        error!("{message}");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn retry(&self, message: &str) -> bool {
        let left = self.retries_left.get();
        if left == 0 {
            warn!("{message} Giving up.");
            return false;
        }
        warn!("{message} Retrying ({left} left).");
        self.retries_left.set(left - 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{LogPrompt, Prompt};

    #[test]
    fn log_prompt_stops_retrying_after_its_budget() {
        let prompt = LogPrompt::new(2);
        assert!(prompt.retry("Please close Setonix."));
        assert!(prompt.retry("Please close Setonix."));
        assert!(!prompt.retry("Please close Setonix."));
        assert!(!prompt.retry("Please close Setonix."));
    }

    #[test]
    fn log_prompt_without_budget_gives_up_at_once() {
        assert!(!LogPrompt::new(0).retry("Please close Setonix."));
    }
}
