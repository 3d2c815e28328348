//! The remote version list and the rule that picks the current release.
//!
//! ```xml
//! <versions>
//!   <version id="1.4.2">
//!     <name>Setonix 1.4.2</name>
//!     <release-date>2024-03-17</release-date>
//!     <url>https://example.org/setonix-1.4.2.zip</url>
//!   </version>
//! </versions>
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::version::{Version, VersionParseError};

const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum VersionListError {
    #[error("version list is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("version list root element must be <versions>, found <{0}>")]
    UnexpectedRoot(String),
    #[error("<version> entry is missing its 'id' attribute")]
    MissingId,
    #[error("invalid version id '{id}': {source}")]
    InvalidVersion {
        id: String,
        #[source]
        source: VersionParseError,
    },
    #[error("version {version} is missing required field <{field}>")]
    MissingRequiredField {
        field: &'static str,
        version: String,
    },
    #[error("version {version} has invalid release date '{value}'")]
    InvalidReleaseDate { version: String, value: String },
    #[error("version list contains no versions")]
    Empty,
    #[error(
        "highest version {highest} is not the most recently released version {latest}"
    )]
    Ambiguous { highest: Version, latest: Version },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: Version,
    pub name: String,
    pub release_date: NaiveDate,
    pub url: String,
}

/// Parse every `<version>` entry of a version list.
///
/// Any incomplete entry invalidates the whole list.
///
/// # Errors
/// Returns an error for malformed XML, a wrong root element, a missing or
/// invalid `id`, and a missing, empty or malformed `name`, `release-date` or
/// `url`.
pub fn parse_version_list(xml: &str) -> Result<Vec<VersionInfo>, VersionListError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "versions" {
        return Err(VersionListError::UnexpectedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    root.children()
        .filter(|node| node.is_element() && node.tag_name().name() == "version")
        .map(parse_entry)
        .collect()
}

fn parse_entry(node: roxmltree::Node<'_, '_>) -> Result<VersionInfo, VersionListError> {
    let id = node.attribute("id").ok_or(VersionListError::MissingId)?;
    let version = Version::parse(id).map_err(|source| VersionListError::InvalidVersion {
        id: id.to_string(),
        source,
    })?;

    let field = |field: &'static str| {
        node.children()
            .find(|child| child.is_element() && child.tag_name().name() == field)
            .and_then(|child| child.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| VersionListError::MissingRequiredField {
                field,
                version: id.to_string(),
            })
    };

    let name = field("name")?;
    let raw_date = field("release-date")?;
    let url = field("url")?;
    let release_date = NaiveDate::parse_from_str(raw_date, RELEASE_DATE_FORMAT).map_err(|_| {
        VersionListError::InvalidReleaseDate {
            version: id.to_string(),
            value: raw_date.to_string(),
        }
    })?;

    Ok(VersionInfo {
        version,
        name: name.to_string(),
        release_date,
        url: url.to_string(),
    })
}

/// Pick the authoritative current release: the entry that is both the
/// highest version and the latest release date. Ties keep the first entry.
///
/// # Errors
/// Returns [`VersionListError::Empty`] for an empty list and
/// [`VersionListError::Ambiguous`] when the two criteria pick different
/// entries.
pub fn resolve_current_version(entries: &[VersionInfo]) -> Result<&VersionInfo, VersionListError> {
    let mut highest: Option<usize> = None;
    let mut latest: Option<usize> = None;

    for (index, entry) in entries.iter().enumerate() {
        if highest.is_none_or(|best| entry.version.is_newer_than(&entries[best].version)) {
            highest = Some(index);
        }
        if latest.is_none_or(|best| entry.release_date > entries[best].release_date) {
            latest = Some(index);
        }
    }

    match (highest, latest) {
        (Some(highest), Some(latest)) if highest == latest => Ok(&entries[highest]),
        (Some(highest), Some(latest)) => Err(VersionListError::Ambiguous {
            highest: entries[highest].version,
            latest: entries[latest].version,
        }),
        _ => Err(VersionListError::Empty),
    }
}

/// Parse a version list and resolve its current release in one step.
///
/// # Errors
/// See [`parse_version_list`] and [`resolve_current_version`].
pub fn select_current_version(xml: &str) -> Result<VersionInfo, VersionListError> {
    let entries = parse_version_list(xml)?;
    resolve_current_version(&entries).cloned()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        VersionInfo, VersionListError, parse_version_list, resolve_current_version,
        select_current_version,
    };
    use crate::version::Version;

    fn entry(id: &str, name: &str, date: &str, url: &str) -> String {
        format!(
            "<version id=\"{id}\"><name>{name}</name><release-date>{date}</release-date><url>{url}</url></version>"
        )
    }

    fn list(entries: &[String]) -> String {
        format!("<versions>{}</versions>", entries.concat())
    }

    fn info(version: Version, date: (i32, u32, u32)) -> VersionInfo {
        VersionInfo {
            version,
            name: format!("Setonix {version}"),
            release_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            url: format!("https://updates.example/{version}.zip"),
        }
    }

    #[test]
    fn parses_complete_entries() {
        let xml = list(&[
            entry("1.0", "First", "2023-01-10", "https://u/1.0.zip"),
            entry("1.1.3", "Second", "2023-06-02", "https://u/1.1.3.zip"),
        ]);
        let entries = parse_version_list(&xml).expect("version list should parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].version, Version::with_revision(1, 1, 3));
        assert_eq!(entries[1].name, "Second");
        assert_eq!(
            entries[1].release_date,
            NaiveDate::from_ymd_opt(2023, 6, 2).expect("valid date")
        );
        assert_eq!(entries[1].url, "https://u/1.1.3.zip");
    }

    #[test]
    fn incomplete_entry_invalidates_whole_list() {
        let xml = list(&[
            entry("1.0", "First", "2023-01-10", "https://u/1.0.zip"),
            "<version id=\"1.1\"><name>Second</name><release-date>2023-06-02</release-date></version>".to_string(),
        ]);
        assert!(matches!(
            parse_version_list(&xml),
            Err(VersionListError::MissingRequiredField { field: "url", ref version }) if version == "1.1"
        ));

        let xml = list(&[entry("1.0", "", "2023-01-10", "https://u/1.0.zip")]);
        assert!(matches!(
            parse_version_list(&xml),
            Err(VersionListError::MissingRequiredField { field: "name", .. })
        ));
    }

    #[test]
    fn malformed_ids_and_dates_are_rejected() {
        let xml = list(&[entry("1", "One", "2023-01-10", "https://u/1.zip")]);
        assert!(matches!(
            parse_version_list(&xml),
            Err(VersionListError::InvalidVersion { .. })
        ));

        let xml = list(&[entry("1.0", "One", "10.01.2023", "https://u/1.zip")]);
        assert!(matches!(
            parse_version_list(&xml),
            Err(VersionListError::InvalidReleaseDate { .. })
        ));

        let xml = "<versions><version><name>x</name></version></versions>";
        assert!(matches!(
            parse_version_list(xml),
            Err(VersionListError::MissingId)
        ));
    }

    #[test]
    fn single_consistent_winner_is_selected() {
        let entries = vec![
            info(Version::new(1, 0), (2023, 1, 10)),
            info(Version::with_revision(1, 2, 0), (2024, 2, 1)),
            info(Version::with_revision(1, 1, 5), (2023, 9, 30)),
        ];
        let current = resolve_current_version(&entries).expect("current version should resolve");
        assert_eq!(current.version, Version::with_revision(1, 2, 0));
    }

    #[test]
    fn disagreeing_version_and_date_is_ambiguous() {
        let entries = vec![
            info(Version::with_revision(2, 0, 0), (2023, 1, 10)),
            info(Version::with_revision(1, 9, 9), (2024, 2, 1)),
        ];
        assert!(matches!(
            resolve_current_version(&entries),
            Err(VersionListError::Ambiguous { highest, latest })
                if highest == Version::with_revision(2, 0, 0) && latest == Version::with_revision(1, 9, 9)
        ));
    }

    #[test]
    fn empty_list_has_no_current_version() {
        assert!(matches!(
            resolve_current_version(&[]),
            Err(VersionListError::Empty)
        ));
        assert!(matches!(
            select_current_version("<versions/>"),
            Err(VersionListError::Empty)
        ));
    }

    #[test]
    fn select_current_version_parses_and_resolves() {
        let xml = list(&[
            entry("3.0.1", "Old", "2022-11-01", "https://u/3.0.1.zip"),
            entry("3.1", "New", "2023-04-12", "https://u/3.1.zip"),
        ]);
        let current = select_current_version(&xml).expect("current version should resolve");
        assert_eq!(current.version, Version::new(3, 1));
        assert_eq!(current.url, "https://u/3.1.zip");
    }

    #[test]
    fn wrong_root_is_rejected() {
        assert!(matches!(
            parse_version_list("<manifest/>"),
            Err(VersionListError::UnexpectedRoot(_))
        ));
    }
}
