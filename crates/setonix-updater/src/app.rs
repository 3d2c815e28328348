use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

use log::{debug, info};
use setonix_core::{
    DeleteRecycler, Locale, Recycler, UpdateManifest, UpdateTask, Updater,
    cleanup_argument, handle_temp_folder_cleanup,
};
use setonix_platform::{ExitWait, HideWindow, wait_for_exit_or_abort};

use crate::args::{UpdaterArguments, display_command_line};
use crate::error::AppError;
use crate::prompt::Prompt;
use crate::settings::UpdaterSettings;

/// Everything the updater needs besides its command line.
#[derive(Debug, Clone)]
pub struct UpdaterContext {
    /// Extracted update; the updater executable lives here.
    pub source_root: PathBuf,
    pub temp_root: PathBuf,
    pub system_locale: Option<String>,
    pub poll_interval: Duration,
    pub recycle_replaced_files: bool,
}

impl UpdaterContext {
    /// # Errors
    /// Returns an error when the updater cannot locate its own directory.
    pub fn from_environment(settings: &UpdaterSettings) -> Result<Self, AppError> {
        let exe = std::env::current_exe().map_err(AppError::SourceRootUnavailable)?;
        let source_root = exe.parent().map(Path::to_path_buf).ok_or_else(|| {
            AppError::SourceRootUnavailable(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no parent directory", exe.display()),
            ))
        })?;

        Ok(Self {
            source_root,
            temp_root: setonix_platform::temp_root(),
            system_locale: setonix_platform::system_locale(),
            poll_interval: settings.exit_poll_interval(),
            recycle_replaced_files: settings.recycle_replaced_files,
        })
    }
}

/// The application launch that completes an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restart {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Restart {
    /// # Errors
    /// Returns an error when the application cannot be started.
    pub fn spawn(&self) -> Result<Child, AppError> {
        info!("Restarting {}", self.program.display());
        let mut command = Command::new(&self.program);
        command.args(&self.args).hide_window();
        if let Some(dir) = self.program.parent() {
            command.current_dir(dir);
        }
        command.spawn().map_err(|source| AppError::Restart {
            path: self.program.clone(),
            source,
        })
    }
}

/// Apply the update in `context.source_root` for the application named on
/// the command line and describe how to restart it.
///
/// # Errors
/// Returns an error for invalid arguments, an invalid manifest, an aborted
/// wait for the application or a failed file replacement.
pub fn run(
    raw_args: &[String],
    context: &UpdaterContext,
    prompt: &dyn Prompt,
) -> Result<Restart, AppError> {
    let (args, cleanups) = handle_temp_folder_cleanup(raw_args, &context.temp_root);
    for outcome in cleanups.iter().filter(|outcome| !outcome.is_clean()) {
        debug!("Temp folder cleanup: {outcome:?}");
    }

    let arguments = UpdaterArguments::parse(&args).map_err(|source| AppError::InvalidArguments {
        command_line: display_command_line(raw_args),
        source,
    })?;

    let culture = resolve_culture(arguments.language(), context.system_locale.as_deref());
    info!("Using culture {culture}");

    let manifest = UpdateManifest::from_update_root(&context.source_root, culture)
        .map_err(AppError::InvalidManifest)?;
    let strings = manifest.strings();
    info!("{} {}", strings.get("title"), strings.get("wait"));

    let app_name = match strings.get("appname") {
        "" => arguments
            .application_path()
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned()),
        name => name.to_string(),
    };
    let please_close = format!("Please close {app_name} so the update can continue.");
    match wait_for_exit_or_abort(arguments.calling_pid(), context.poll_interval, || {
        prompt.retry(&please_close)
    }) {
        ExitWait::Exited => {}
        ExitWait::Aborted => return Err(AppError::Aborted),
    }

    let target_root = arguments.target_root();
    if context.recycle_replaced_files {
        apply(
            &Updater::new(&context.source_root, target_root),
            manifest.tasks(),
        )?;
    } else {
        apply(
            &Updater::with_recycler(&context.source_root, target_root, DeleteRecycler),
            manifest.tasks(),
        )?;
    }

    let mut restart_args = arguments.passthrough().to_vec();
    restart_args.push(cleanup_argument(&context.source_root));
    Ok(Restart {
        program: arguments.application_path().to_path_buf(),
        args: restart_args,
    })
}

fn apply<R: Recycler>(updater: &Updater<R>, tasks: &[UpdateTask]) -> Result<(), AppError> {
    let total = tasks.len();
    let mut done = 0;
    updater.perform_updates(tasks, |file_name| {
        done += 1;
        info!("Updating {file_name} ({done}/{total})");
    })?;
    Ok(())
}

fn resolve_culture(requested: Option<&Locale>, system: Option<&str>) -> Locale {
    requested
        .cloned()
        .or_else(|| system.and_then(|name| Locale::parse(name).ok()))
        .unwrap_or_else(Locale::invariant)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::time::Duration;

    use setonix_core::{Locale, cleanup_argument};

    use super::{UpdaterContext, resolve_culture, run};
    use crate::error::AppError;
    use crate::prompt::Prompt;

    const MANIFEST: &str = r#"<manifest>
  <folder path="."><file name="setonix.exe"/></folder>
  <folder path="lib"><file name="core.dll"/></folder>
  <messages>
    <message language="en" key="appname">Setonix</message>
    <message language="de" key="appname">Setonix DE</message>
  </messages>
</manifest>"#;

    #[derive(Default)]
    struct ScriptedPrompt {
        retries: RefCell<VecDeque<bool>>,
        shown: RefCell<Vec<String>>,
    }

    impl ScriptedPrompt {
        fn answering(retries: &[bool]) -> Self {
            Self {
                retries: RefCell::new(retries.iter().copied().collect()),
                shown: RefCell::default(),
            }
        }
    }

    impl Prompt for ScriptedPrompt {
        fn error(&self, message: &str) {
            self.shown.borrow_mut().push(message.to_string());
        }

        fn info(&self, message: &str) {
            self.shown.borrow_mut().push(message.to_string());
        }

        fn retry(&self, message: &str) -> bool {
            self.shown.borrow_mut().push(message.to_string());
            self.retries.borrow_mut().pop_front().unwrap_or(false)
        }
    }

    struct Fixture {
        temp: tempfile::TempDir,
        target: tempfile::TempDir,
        context: UpdaterContext,
    }

    impl Fixture {
        fn new(manifest: &str) -> Self {
            let temp = tempfile::tempdir().expect("temp root should be created");
            let target = tempfile::tempdir().expect("target should be created");
            let source_root = temp.path().join("setonix_update");
            write(&source_root, "update.manifest", manifest);
            write(&source_root, "setonix.exe", "new app");
            write(&source_root, "lib/core.dll", "new core");
            write(target.path(), "setonix.exe", "old app");

            let context = UpdaterContext {
                source_root,
                temp_root: temp.path().to_path_buf(),
                system_locale: None,
                poll_interval: Duration::from_millis(50),
                recycle_replaced_files: false,
            };
            Self {
                temp,
                target,
                context,
            }
        }

        fn application(&self) -> String {
            self.target.path().join("setonix.exe").display().to_string()
        }
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("parent should be created");
        }
        std::fs::write(path, content).expect("file should be written");
    }

    #[cfg(unix)]
    fn exited_pid() -> String {
        let mut child = std::process::Command::new("true")
            .spawn()
            .expect("true should spawn");
        child.wait().expect("child should be reaped");
        child.id().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn applies_update_and_plans_restart_with_cleanup_argument() {
        let fixture = Fixture::new(MANIFEST);
        let stale = fixture.temp.path().join("setonix_update_1");
        std::fs::create_dir(&stale).expect("stale folder should be created");

        let args = vec![
            cleanup_argument(&stale),
            exited_pid(),
            fixture.application(),
            "report.stx".to_string(),
        ];
        let prompt = ScriptedPrompt::default();
        let restart = run(&args, &fixture.context, &prompt).expect("update should succeed");

        assert!(!stale.exists());
        assert_eq!(
            std::fs::read_to_string(fixture.target.path().join("setonix.exe"))
                .expect("app should be readable"),
            "new app"
        );
        assert_eq!(
            std::fs::read_to_string(fixture.target.path().join("lib/core.dll"))
                .expect("library should be readable"),
            "new core"
        );
        assert_eq!(restart.program, fixture.target.path().join("setonix.exe"));
        assert_eq!(
            restart.args,
            vec![
                "report.stx".to_string(),
                cleanup_argument(&fixture.context.source_root)
            ]
        );
        assert!(prompt.shown.borrow().is_empty());
    }

    #[test]
    fn invalid_arguments_report_the_command_line() {
        let fixture = Fixture::new(MANIFEST);
        let prompt = ScriptedPrompt::default();

        let error = run(&[], &fixture.context, &prompt).expect_err("no arguments should fail");
        assert!(matches!(error, AppError::InvalidArguments { ref command_line, .. }
            if command_line == "(empty command line)"));

        let args = vec!["not-a-pid".to_string(), fixture.application()];
        let error = run(&args, &fixture.context, &prompt).expect_err("bad pid should fail");
        assert!(matches!(error, AppError::InvalidArguments { ref command_line, .. }
            if command_line.starts_with("not-a-pid ")));
    }

    #[cfg(unix)]
    #[test]
    fn invalid_manifest_stops_before_touching_files() {
        let fixture = Fixture::new("<manifest><folder path=\".\"><patch name=\"x\"/></folder></manifest>");
        let args = vec![exited_pid(), fixture.application()];

        let error = run(&args, &fixture.context, &ScriptedPrompt::default())
            .expect_err("invalid manifest should fail");
        assert!(matches!(error, AppError::InvalidManifest(_)));
        assert_eq!(
            std::fs::read_to_string(fixture.target.path().join("setonix.exe"))
                .expect("app should be readable"),
            "old app"
        );
    }

    #[cfg(unix)]
    #[test]
    fn cancelling_the_wait_aborts_the_update() {
        let fixture = Fixture::new(MANIFEST);
        let mut running = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("sleep should spawn");
        let args = vec![
            running.id().to_string(),
            fixture.application(),
            "/lang:de".to_string(),
        ];
        let prompt = ScriptedPrompt::answering(&[true, false]);

        let result = run(&args, &fixture.context, &prompt);
        let _ = running.kill();
        let _ = running.wait();

        assert!(matches!(result, Err(AppError::Aborted)));
        assert_eq!(
            *prompt.shown.borrow(),
            vec![
                "Please close Setonix DE so the update can continue.".to_string(),
                "Please close Setonix DE so the update can continue.".to_string(),
            ]
        );
        assert_eq!(
            std::fs::read_to_string(fixture.target.path().join("setonix.exe"))
                .expect("app should be readable"),
            "old app"
        );
    }

    #[cfg(unix)]
    #[test]
    fn missing_update_file_fails_the_run() {
        let fixture = Fixture::new(MANIFEST);
        std::fs::remove_file(fixture.context.source_root.join("lib/core.dll"))
            .expect("file should be removable");
        let args = vec![exited_pid(), fixture.application()];

        let error = run(&args, &fixture.context, &ScriptedPrompt::default())
            .expect_err("missing file should fail");
        assert!(matches!(error, AppError::Update(_)));
        assert!(error.to_string().contains("core.dll"));
    }

    #[test]
    fn culture_prefers_switch_then_system_then_english() {
        let german = Locale::parse("de").expect("locale");
        assert_eq!(resolve_culture(Some(&german), Some("fr_FR.UTF-8")), german);
        assert_eq!(
            resolve_culture(None, Some("fr_FR.UTF-8")),
            Locale::parse("fr-FR").expect("locale")
        );
        assert_eq!(resolve_culture(None, Some("garbage!")), Locale::invariant());
        assert_eq!(resolve_culture(None, None), Locale::invariant());
    }
}
