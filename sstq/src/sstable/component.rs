//! The `<table>-<generation>-<format>-<component>.db` naming convention and
//! directory-level helpers built on it.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Serialize;
use strum::EnumString;

use crate::{
    codec::header::detect_format,
    error::{Error, ErrorCode, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Serialize, strum::Display)]
pub enum Component {
    Data,
    Index,
    Statistics,
    Filter,
    Summary,
    CompressionInfo,
}

impl Component {
    /// Companions expected to sit next to a Data component.
    pub const COMPANIONS: [Component; 5] = [
        Component::Index,
        Component::Statistics,
        Component::Filter,
        Component::Summary,
        Component::CompressionInfo,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SstableName {
    pub table: String,
    pub generation: u64,
    pub format: String,
    pub component: Component,
}

impl SstableName {
    /// Parse `<table>-<generation>-<format>-<component>.db`. Table names may
    /// themselves contain dashes, so the trailing three segments are fixed
    /// and the rest belongs to the table.
    pub fn parse(path: &Path) -> Result<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            return Err(Error::new(
                ErrorCode::InvalidExtension,
                format!("not an sstable file: {}", path.display()),
            ));
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| bad_name(path))?;

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 4 {
            return Err(bad_name(path));
        }
        let component = Component::from_str(parts[parts.len() - 1]).map_err(|_| bad_name(path))?;
        let format = parts[parts.len() - 2].to_string();
        let generation: u64 = parts[parts.len() - 3].parse().map_err(|_| bad_name(path))?;
        let table = parts[..parts.len() - 3].join("-");
        if table.is_empty() {
            return Err(bad_name(path));
        }

        Ok(Self {
            table,
            generation,
            format,
            component,
        })
    }

    pub fn file_name(&self, component: Component) -> String {
        format!(
            "{}-{}-{}-{}.db",
            self.table, self.generation, self.format, component
        )
    }

    /// Path of a sibling component of the same sstable.
    pub fn sibling(&self, data_path: &Path, component: Component) -> PathBuf {
        match data_path.parent() {
            Some(dir) => dir.join(self.file_name(component)),
            None => PathBuf::from(self.file_name(component)),
        }
    }
}

fn bad_name(path: &Path) -> Error {
    Error::new(
        ErrorCode::InvalidExtension,
        format!(
            "file name does not follow <table>-<generation>-<format>-<component>.db: {}",
            path.display()
        ),
    )
}

/// One Data component found by [`discover_sstables`].
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredSstable {
    pub path: PathBuf,
    pub name: SstableName,
    pub size: u64,
}

/// All Data components in a directory, sorted by path.
pub fn discover_sstables(dir: &Path) -> Result<Vec<DiscoveredSstable>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(name) = SstableName::parse(&path) {
            if name.component == Component::Data {
                let size = entry.metadata()?.len();
                found.push(DiscoveredSstable { path, name, size });
            }
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub file_size: u64,
    pub missing_companions: Vec<Component>,
}

/// Pre-flight check of one Data file: naming, readability, magic word and
/// companion presence. Problems are reported, not raised, so a caller can
/// inspect a whole directory in one pass.
pub fn validate_sstable(path: &Path) -> ValidationReport {
    let mut report = ValidationReport {
        valid: true,
        errors: vec![],
        warnings: vec![],
        file_size: 0,
        missing_companions: vec![],
    };

    let name = match SstableName::parse(path) {
        Ok(name) => Some(name),
        Err(err) => {
            report.errors.push(err.to_string());
            None
        }
    };

    match std::fs::metadata(path) {
        Ok(meta) => report.file_size = meta.len(),
        Err(err) => report.errors.push(format!("cannot stat file: {err}")),
    }

    match std::fs::read(path) {
        Ok(bytes) => match detect_format(&bytes) {
            Ok(info) if !info.recognized => report
                .warnings
                .push("unrecognized sstable format magic".to_string()),
            Ok(_) => {}
            Err(err) => report.errors.push(err.to_string()),
        },
        Err(err) => report.errors.push(format!("cannot read file: {err}")),
    }

    if let Some(name) = name {
        if name.component != Component::Data {
            report
                .errors
                .push(format!("expected a Data component, found {}", name.component));
        }
        for component in Component::COMPANIONS {
            if !name.sibling(path, component).exists() {
                report.missing_companions.push(component);
                report
                    .warnings
                    .push(format!("missing companion file: {component}"));
            }
        }
    }

    report.valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_naming_convention() {
        let name = SstableName::parse(Path::new("/tmp/users-1-oa-Data.db")).unwrap();
        assert_eq!(name.table, "users");
        assert_eq!(name.generation, 1);
        assert_eq!(name.format, "oa");
        assert_eq!(name.component, Component::Data);
    }

    #[test]
    fn table_names_may_contain_dashes() {
        let name = SstableName::parse(Path::new("user-events-12-nb-Statistics.db")).unwrap();
        assert_eq!(name.table, "user-events");
        assert_eq!(name.generation, 12);
        assert_eq!(name.component, Component::Statistics);
    }

    #[test]
    fn rejects_wrong_extension_and_shape() {
        for bad in ["users-1-oa-Data.txt", "users.db", "users-x-oa-Data.db", "users-1-oa-Blob.db"] {
            let err = SstableName::parse(Path::new(bad)).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidExtension, "{bad}");
        }
    }

    #[test]
    fn sibling_paths_share_the_directory() {
        let name = SstableName::parse(Path::new("/data/ks/users-3-oa-Data.db")).unwrap();
        assert_eq!(
            name.sibling(Path::new("/data/ks/users-3-oa-Data.db"), Component::Index),
            PathBuf::from("/data/ks/users-3-oa-Index.db")
        );
    }

    #[test]
    fn discovery_lists_data_components_with_names_and_sizes() {
        use crate::{cql::value::CqlValue, sstable::builder::SstableBuilder};

        let dir = tempfile::tempdir().unwrap();
        let mut builder = SstableBuilder::users();
        builder.partition(
            vec![CqlValue::Uuid(uuid::Uuid::from_u128(1))],
            vec![vec![CqlValue::Text("a".into()), CqlValue::Int(1)]],
        );
        builder.write_to(dir.path()).unwrap();

        let found = discover_sstables(dir.path()).unwrap();
        // Companions sit in the same directory but only Data is listed.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.table, "users");
        assert_eq!(found[0].name.component, Component::Data);
        assert!(found[0].size > 0);
        assert!(found[0].path.ends_with("users-1-oa-Data.db"));
    }

    #[test]
    fn validation_flags_a_missing_file() {
        let report = validate_sstable(Path::new("/nonexistent/users-1-oa-Data.db"));
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }
}
