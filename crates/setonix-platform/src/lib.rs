mod commands;
mod locale;
mod paths;
mod process;

pub use commands::HideWindow;
pub use locale::system_locale;
pub use paths::{AppPaths, AppPathsError, temp_root};
pub use process::{ExitWait, is_process_running, wait_for_exit, wait_for_exit_or_abort};
