// Data structures for catalog rows and connection settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How the session authenticates against the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Use the identity of the calling OS process.
    Trusted,
    Credentialed,
}

#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            username: None,
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn auth_mode(&self) -> AuthMode {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => AuthMode::Credentialed,
            _ => AuthMode::Trusted,
        }
    }

    /// `host/database`, used in log lines and error messages.
    pub fn target(&self) -> String {
        format!("{}/{}", self.host, self.database)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    View,
    Procedure,
    ScalarFunction,
    TableFunction,
    InlineTableFunction,
    Unknown,
}

impl ObjectKind {
    /// Maps a catalog type code (`USER_TABLE`, `VIEW`, ...) to a kind.
    pub fn from_type_desc(type_desc: Option<&str>) -> Self {
        match type_desc.map(str::trim) {
            Some("USER_TABLE") => ObjectKind::Table,
            Some("VIEW") => ObjectKind::View,
            Some("SQL_STORED_PROCEDURE") => ObjectKind::Procedure,
            Some("SQL_SCALAR_FUNCTION") => ObjectKind::ScalarFunction,
            Some("SQL_TABLE_VALUED_FUNCTION") => ObjectKind::TableFunction,
            Some("SQL_INLINE_TABLE_VALUED_FUNCTION") => ObjectKind::InlineTableFunction,
            _ => ObjectKind::Unknown,
        }
    }

    pub fn is_function(self) -> bool {
        matches!(
            self,
            ObjectKind::ScalarFunction | ObjectKind::TableFunction | ObjectKind::InlineTableFunction
        )
    }
}

/// One row of the dependency catalog query: the referencing (dependent)
/// object and the object it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRow {
    pub referencing_schema: String,
    pub referencing_name: String,
    pub referencing_kind: ObjectKind,
    /// The catalog may fail to resolve the schema of the referenced side.
    pub referenced_schema: Option<String>,
    pub referenced_name: String,
    pub referenced_kind: ObjectKind,
}

impl DependencyRow {
    /// Builds a row from catalog type codes, in query column order.
    pub fn from_catalog(
        referencing: (&str, &str, &str),
        referenced: (Option<&str>, &str, &str),
    ) -> Self {
        Self {
            referencing_schema: referencing.0.to_string(),
            referencing_name: referencing.1.to_string(),
            referencing_kind: ObjectKind::from_type_desc(Some(referencing.2)),
            referenced_schema: referenced.0.map(str::to_string),
            referenced_name: referenced.1.to_string(),
            referenced_kind: ObjectKind::from_type_desc(Some(referenced.2)),
        }
    }
}

/// A schema object fetched for file export. Tables carry no definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogObject {
    pub schema: String,
    pub name: String,
    pub definition: Option<String>,
}

impl CatalogObject {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    Procedures,
    Views,
    Tables,
}

impl ObjectCategory {
    pub const ALL: [ObjectCategory; 3] = [
        ObjectCategory::Procedures,
        ObjectCategory::Views,
        ObjectCategory::Tables,
    ];

    pub fn subdir(self) -> &'static str {
        match self {
            ObjectCategory::Procedures => "sprocs",
            ObjectCategory::Views => "views",
            ObjectCategory::Tables => "tables",
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectCategory::Procedures => "stored procedures",
            ObjectCategory::Views => "views",
            ObjectCategory::Tables => "tables",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("USER_TABLE"), ObjectKind::Table)]
    #[case(Some("VIEW"), ObjectKind::View)]
    #[case(Some("SQL_STORED_PROCEDURE"), ObjectKind::Procedure)]
    #[case(Some("SQL_SCALAR_FUNCTION"), ObjectKind::ScalarFunction)]
    #[case(Some("SQL_TABLE_VALUED_FUNCTION"), ObjectKind::TableFunction)]
    #[case(Some("SQL_INLINE_TABLE_VALUED_FUNCTION"), ObjectKind::InlineTableFunction)]
    #[case(Some("SYSTEM_TABLE"), ObjectKind::Unknown)]
    #[case(None, ObjectKind::Unknown)]
    fn type_codes_map_to_kinds(#[case] code: Option<&str>, #[case] expected: ObjectKind) {
        assert_eq!(ObjectKind::from_type_desc(code), expected);
    }

    #[test]
    fn username_selects_credentialed_auth() {
        let params = ConnectionParams::new("localhost", "TestDB").with_credentials("sa", None);

        assert_eq!(params.auth_mode(), AuthMode::Credentialed);
    }

    #[test]
    fn missing_or_empty_username_selects_trusted_auth() {
        let params = ConnectionParams::new("localhost", "TestDB");
        assert_eq!(params.auth_mode(), AuthMode::Trusted);

        let params = params.with_credentials("", Some("secret".to_string()));
        assert_eq!(params.auth_mode(), AuthMode::Trusted);
    }

    #[test]
    fn category_subdirectories() {
        let dirs: Vec<_> = ObjectCategory::ALL.iter().map(|c| c.subdir()).collect();

        assert_eq!(dirs, vec!["sprocs", "views", "tables"]);
    }

    #[test]
    fn dependency_row_keeps_unresolved_schema() {
        let row = DependencyRow::from_catalog(
            ("dbo", "OrdersView", "VIEW"),
            (None, "Orders", "USER_TABLE"),
        );

        assert_eq!(row.referenced_schema, None);
        assert_eq!(row.referenced_kind, ObjectKind::Table);
        assert_eq!(row.referencing_kind, ObjectKind::View);
    }
}
