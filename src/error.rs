// error.rs
// Error kinds for every export stage. Rendering problems live in
// lineage::render::RenderError because they are reported as data, not raised.

use crate::db::models::ObjectCategory;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database connection to {target} failed: {source}")]
    ConnectionFailure {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to fetch dependencies: {0}")]
    DependencyQueryFailure(#[source] sqlx::Error),

    #[error("failed to fetch {category}: {source}")]
    CatalogQueryFailure {
        category: ObjectCategory,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to write graph description {}: {source}", .path.display())]
    DescriptionWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize lineage manifest as JSON: {0}")]
    ManifestJson(#[source] serde_json::Error),

    #[error("failed to serialize lineage manifest as YAML: {0}")]
    ManifestYaml(#[source] serde_yaml::Error),
}

impl ExportError {
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ExportError::ConnectionFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn connection_failure_names_target_and_keeps_cause() {
        let error = ExportError::ConnectionFailure {
            target: "invalid_server_name/invalid_database".to_string(),
            source: sqlx::Error::Protocol("host not found".to_string()),
        };

        let message = error.to_string();

        assert!(message.contains("invalid_server_name/invalid_database"));
        assert!(message.contains("host not found"));
        assert!(error.source().is_some());
        assert!(error.is_connection_failure());
    }

    #[test]
    fn catalog_query_failure_names_category() {
        let error = ExportError::CatalogQueryFailure {
            category: ObjectCategory::Views,
            source: sqlx::Error::Protocol("permission denied".to_string()),
        };

        assert!(error.to_string().contains("views"));
        assert!(!error.is_connection_failure());
    }

    #[test]
    fn description_write_failure_includes_path() {
        let error = ExportError::DescriptionWriteFailure {
            path: PathBuf::from("/readonly/db_lineage.gv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(error.to_string().contains("/readonly/db_lineage.gv"));
    }

    #[test]
    fn manifest_failure_keeps_serde_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ExportError::ManifestJson(cause);

        assert!(error.to_string().contains("JSON"));
        assert!(error.source().is_some());
    }
}
