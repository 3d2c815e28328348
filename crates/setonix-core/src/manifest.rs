//! The local update manifest shipped inside every update archive.
//!
//! ```xml
//! <manifest>
//!   <folder path=".">
//!     <file name="app.exe"/>
//!   </folder>
//!   <messages>
//!     <message language="en" key="title">Updating</message>
//!   </messages>
//! </manifest>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::strings::{Locale, LocaleParseError, LocalizedStrings};

/// File name of the manifest at the root of an extracted update.
pub const MANIFEST_FILE_NAME: &str = "update.manifest";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("manifest root element must be <manifest>, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("unsupported update task <{0}>")]
    UnknownTask(String),
    #[error("unsafe path in manifest: {0}")]
    UnsafePath(String),
    #[error("invalid message language: {0}")]
    Language(#[from] LocaleParseError),
    #[error("duplicate message '{key}' for language {language}")]
    DuplicateMessage { language: String, key: String },
}

/// Replace one file of the installation with the copy from the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFileTask {
    path: String,
}

impl UpdateFileTask {
    /// Build a task for `file_name` inside `folder` (relative to the
    /// installation root; `.` or empty is the root itself).
    ///
    /// # Errors
    /// Returns [`ManifestError::UnsafePath`] for absolute folders, `..`
    /// components or file names containing separators.
    pub fn new(folder: &str, file_name: &str) -> Result<Self, ManifestError> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\'])
        {
            return Err(ManifestError::UnsafePath(file_name.to_string()));
        }

        let folder = normalize_folder(folder)?;
        let path = if folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{folder}/{file_name}")
        };
        Ok(Self { path })
    }

    /// Relative path with `/` separators, e.g. `app.exe` or `lib/core.dll`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// `root` joined with this task's relative path.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.path
            .split('/')
            .fold(root.to_path_buf(), |acc, part| acc.join(part))
    }
}

impl fmt::Display for UpdateFileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateFileTask: {}", self.path)
    }
}

fn normalize_folder(folder: &str) -> Result<String, ManifestError> {
    let unsafe_path = || ManifestError::UnsafePath(folder.to_string());

    let unified = folder.trim().replace('\\', "/");
    if unified.starts_with('/') || unified.contains(':') {
        return Err(unsafe_path());
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(unsafe_path()),
            part => parts.push(part),
        }
    }
    Ok(parts.join("/"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTask {
    File(UpdateFileTask),
}

impl fmt::Display for UpdateTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(task) => task.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateManifest {
    tasks: Vec<UpdateTask>,
    strings: LocalizedStrings,
}

impl UpdateManifest {
    /// Load `update.manifest` from the root of an extracted update.
    ///
    /// # Errors
    /// See [`UpdateManifest::from_file`].
    pub fn from_update_root(root: &Path, culture: Locale) -> Result<Self, ManifestError> {
        Self::from_file(&root.join(MANIFEST_FILE_NAME), culture)
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or is not a valid
    /// manifest.
    pub fn from_file(path: &Path, culture: Locale) -> Result<Self, ManifestError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml, culture)
    }

    /// Parse manifest XML. String lookups use `culture`.
    ///
    /// # Errors
    /// Returns an error for malformed XML, missing required attributes,
    /// unknown task elements, unsafe paths, invalid languages and duplicate
    /// messages.
    pub fn parse(xml: &str, culture: Locale) -> Result<Self, ManifestError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "manifest" {
            return Err(ManifestError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let mut tasks = Vec::new();
        let mut strings = LocalizedStrings::new(culture);

        for folder in children_named(root, "folder") {
            let folder_path = required_attribute(folder, "folder", "path")?;
            for entry in folder.children().filter(roxmltree::Node::is_element) {
                match entry.tag_name().name() {
                    "file" => {
                        let file_name = required_attribute(entry, "file", "name")?;
                        tasks.push(UpdateTask::File(UpdateFileTask::new(folder_path, file_name)?));
                    }
                    other => return Err(ManifestError::UnknownTask(other.to_string())),
                }
            }
        }

        for messages in children_named(root, "messages") {
            for message in children_named(messages, "message") {
                let language = required_attribute(message, "message", "language")?;
                let key = required_attribute(message, "message", "key")?;
                let language = Locale::parse(language)?;
                let text = inner_text(message);
                if !strings.add(&language, key, text.trim()) {
                    return Err(ManifestError::DuplicateMessage {
                        language: language.name(),
                        key: key.to_string(),
                    });
                }
            }
        }

        debug!("Parsed update manifest with {} task(s)", tasks.len());
        Ok(Self { tasks, strings })
    }

    #[must_use]
    pub fn tasks(&self) -> &[UpdateTask] {
        &self.tasks
    }

    #[must_use]
    pub fn strings(&self) -> &LocalizedStrings {
        &self.strings
    }
}

impl fmt::Display for UpdateManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateManifest: {} task(s)", self.tasks.len())
    }
}

fn children_named<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

/// All text below `node`, so comments or markup inside a message do not cut
/// it short.
fn inner_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(roxmltree::Node::is_text)
        .filter_map(|text| text.text())
        .collect()
}

fn required_attribute<'a>(
    node: roxmltree::Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ManifestError> {
    node.attribute(attribute)
        .ok_or(ManifestError::MissingAttribute { element, attribute })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ManifestError, UpdateFileTask, UpdateManifest, UpdateTask};
    use crate::strings::Locale;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest>
  <folder path=".">
    <file name="app.exe"/>
    <file name="app.exe.config"/>
  </folder>
  <folder path="lib\native">
    <file name="core.dll"/>
  </folder>
  <messages>
    <message language="en" key="title">  Updating Setonix  </message>
    <message language="en" key="appname">Setonix</message>
    <message language="de" key="title">Setonix wird aktualisiert</message>
  </messages>
</manifest>"#;

    fn file_paths(manifest: &UpdateManifest) -> Vec<&str> {
        manifest
            .tasks()
            .iter()
            .map(|task| match task {
                UpdateTask::File(file) => file.path(),
            })
            .collect()
    }

    #[test]
    fn parses_tasks_in_document_order() {
        let manifest = UpdateManifest::parse(SAMPLE, Locale::invariant())
            .expect("sample manifest should parse");
        assert_eq!(
            file_paths(&manifest),
            vec!["app.exe", "app.exe.config", "lib/native/core.dll"]
        );
        assert_eq!(manifest.to_string(), "UpdateManifest: 3 task(s)");
    }

    #[test]
    fn message_text_spans_comments_and_child_elements() {
        let xml = r#"<manifest>
  <messages>
    <message language="en" key="title"> Updating <!-- v2 -->Setonix </message>
    <message language="en" key="wait">Please <b>wait</b>.</message>
  </messages>
</manifest>"#;
        let manifest =
            UpdateManifest::parse(xml, Locale::invariant()).expect("manifest should parse");
        assert_eq!(manifest.strings().get("title"), "Updating Setonix");
        assert_eq!(manifest.strings().get("wait"), "Please wait.");
    }

    #[test]
    fn root_folder_yields_bare_file_name() {
        let task = UpdateFileTask::new(".", "app.exe").expect("task should build");
        assert_eq!(task.path(), "app.exe");
        assert_eq!(task.file_name(), "app.exe");

        let task = UpdateFileTask::new("", "app.exe").expect("task should build");
        assert_eq!(task.path(), "app.exe");
    }

    #[test]
    fn folder_paths_are_normalized() {
        let task = UpdateFileTask::new("./plugins\\extra/", "x.dll").expect("task should build");
        assert_eq!(task.path(), "plugins/extra/x.dll");
        assert_eq!(task.file_name(), "x.dll");
        assert_eq!(
            task.resolve(Path::new("root")),
            Path::new("root").join("plugins").join("extra").join("x.dll")
        );
    }

    #[test]
    fn unsafe_paths_are_rejected() {
        for (folder, name) in [
            ("..", "evil.dll"),
            ("lib/../..", "evil.dll"),
            ("/etc", "passwd"),
            ("C:\\Windows", "evil.dll"),
            (".", "../evil.dll"),
            (".", ""),
        ] {
            assert!(
                matches!(
                    UpdateFileTask::new(folder, name),
                    Err(ManifestError::UnsafePath(_))
                ),
                "{folder:?}/{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn messages_use_requested_culture() {
        let german = UpdateManifest::parse(SAMPLE, Locale::parse("de-CH").expect("locale"))
            .expect("sample manifest should parse");
        assert_eq!(german.strings().get("title"), "Setonix wird aktualisiert");
        assert_eq!(german.strings().get("appname"), "Setonix");

        let english = UpdateManifest::parse(SAMPLE, Locale::invariant())
            .expect("sample manifest should parse");
        assert_eq!(english.strings().get("title"), "Updating Setonix");
        assert_eq!(english.strings().get("wait"), "");
    }

    #[test]
    fn missing_attributes_fail_the_whole_manifest() {
        let xml = r#"<manifest><folder><file name="a"/></folder></manifest>"#;
        assert!(matches!(
            UpdateManifest::parse(xml, Locale::invariant()),
            Err(ManifestError::MissingAttribute {
                element: "folder",
                attribute: "path"
            })
        ));

        let xml = r#"<manifest><folder path="."><file/></folder></manifest>"#;
        assert!(matches!(
            UpdateManifest::parse(xml, Locale::invariant()),
            Err(ManifestError::MissingAttribute {
                element: "file",
                attribute: "name"
            })
        ));

        let xml = r#"<manifest><messages><message key="k">t</message></messages></manifest>"#;
        assert!(matches!(
            UpdateManifest::parse(xml, Locale::invariant()),
            Err(ManifestError::MissingAttribute {
                element: "message",
                attribute: "language"
            })
        ));
    }

    #[test]
    fn unknown_task_kinds_fail_loudly() {
        let xml = r#"<manifest><folder path="."><patch name="a.bin"/></folder></manifest>"#;
        assert!(matches!(
            UpdateManifest::parse(xml, Locale::invariant()),
            Err(ManifestError::UnknownTask(ref name)) if name == "patch"
        ));
    }

    #[test]
    fn duplicate_messages_are_rejected() {
        let xml = r#"<manifest><messages>
            <message language="en" key="title">A</message>
            <message language="EN" key="title">B</message>
        </messages></manifest>"#;
        assert!(matches!(
            UpdateManifest::parse(xml, Locale::invariant()),
            Err(ManifestError::DuplicateMessage { .. })
        ));
    }

    #[test]
    fn wrong_root_and_broken_xml_are_rejected() {
        assert!(matches!(
            UpdateManifest::parse("<versions/>", Locale::invariant()),
            Err(ManifestError::UnexpectedRoot(ref root)) if root == "versions"
        ));
        assert!(matches!(
            UpdateManifest::parse("<manifest>", Locale::invariant()),
            Err(ManifestError::Xml(_))
        ));
    }

    #[test]
    fn from_update_root_reads_manifest_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join(super::MANIFEST_FILE_NAME), SAMPLE)
            .expect("manifest should be written");

        let manifest = UpdateManifest::from_update_root(temp.path(), Locale::invariant())
            .expect("manifest should load");
        assert_eq!(manifest.tasks().len(), 3);

        let missing = UpdateManifest::from_update_root(&temp.path().join("nope"), Locale::invariant());
        assert!(matches!(missing, Err(ManifestError::Read { .. })));
    }
}
