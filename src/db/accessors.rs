// db/accessors.rs
// Catalog access: opening a session and running the read-only catalog queries.

use super::models::*;
use crate::error::ExportError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{self, Row};
use tracing::{debug, error, info};

/// An open catalog session. Every session must be closed by its owner.
#[async_trait]
pub trait CatalogAccessor: Send {
    async fn fetch_dependencies(&mut self) -> Result<Vec<DependencyRow>, ExportError>;
    async fn fetch_objects(&mut self, category: ObjectCategory) -> Result<Vec<CatalogObject>, ExportError>;
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn CatalogAccessor>, ExportError>;
}

// ------------------- PostgreSQL -------------------

const EXCLUDED_SCHEMAS: &str = "('pg_catalog', 'information_schema')";

/// Intra-database dependencies between tables, views, procedures and
/// functions. View edges come from their rewrite rules, routine edges from
/// bodies the server tracks. Both endpoints must be tracked objects.
const DEPENDENCIES_QUERY: &str = r#"
WITH object_info AS (
    SELECT c.oid AS object_id,
           'pg_class'::regclass::oid AS class_id,
           n.nspname::text AS schema_name,
           c.relname::text AS object_name,
           CASE WHEN c.relkind IN ('r', 'p') THEN 'USER_TABLE' ELSE 'VIEW' END AS type_desc
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p', 'v', 'm')
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
    UNION ALL
    SELECT p.oid,
           'pg_proc'::regclass::oid,
           n.nspname::text,
           p.proname::text,
           CASE
               WHEN p.prokind = 'p' THEN 'SQL_STORED_PROCEDURE'
               WHEN p.proretset AND l.lanname = 'sql' THEN 'SQL_INLINE_TABLE_VALUED_FUNCTION'
               WHEN p.proretset THEN 'SQL_TABLE_VALUED_FUNCTION'
               ELSE 'SQL_SCALAR_FUNCTION'
           END
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    JOIN pg_catalog.pg_language l ON l.oid = p.prolang
    WHERE p.prokind IN ('f', 'p')
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
),
expression_dependencies AS (
    SELECT 'pg_class'::regclass::oid AS referencing_class,
           r.ev_class AS referencing_id,
           d.refclassid AS referenced_class,
           d.refobjid AS referenced_id
    FROM pg_catalog.pg_depend d
    JOIN pg_catalog.pg_rewrite r
      ON d.classid = 'pg_rewrite'::regclass AND d.objid = r.oid
    WHERE d.deptype = 'n'
      AND d.refobjid <> r.ev_class
    UNION ALL
    SELECT d.classid, d.objid, d.refclassid, d.refobjid
    FROM pg_catalog.pg_depend d
    WHERE d.classid = 'pg_proc'::regclass
      AND d.deptype = 'n'
)
SELECT DISTINCT
    oi_ref.schema_name AS referencing_schema_name,
    oi_ref.object_name AS referencing_object_name,
    oi_ref.type_desc AS referencing_object_type,
    oi_target.schema_name AS referenced_schema_name,
    oi_target.object_name AS referenced_object_name,
    oi_target.type_desc AS referenced_object_type
FROM expression_dependencies ed
JOIN object_info oi_ref
  ON oi_ref.class_id = ed.referencing_class AND oi_ref.object_id = ed.referencing_id
JOIN object_info oi_target
  ON oi_target.class_id = ed.referenced_class AND oi_target.object_id = ed.referenced_id
ORDER BY referencing_schema_name, referencing_object_name
"#;

const ROUTINES_QUERY: &str = r#"
SELECT n.nspname::text AS object_schema,
       p.proname::text AS object_name,
       pg_catalog.pg_get_functiondef(p.oid) AS definition
FROM pg_catalog.pg_proc p
JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
WHERE p.prokind IN ('f', 'p')
  AND n.nspname NOT IN ('pg_catalog', 'information_schema')
  AND n.nspname NOT LIKE 'pg\_toast%'
  AND NOT EXISTS (
      SELECT 1 FROM pg_catalog.pg_depend d
      WHERE d.classid = 'pg_proc'::regclass AND d.objid = p.oid AND d.deptype = 'e'
  )
ORDER BY object_schema, object_name
"#;

pub struct PostgresAccessor {
    pool: sqlx::Pool<sqlx::Postgres>,
}

impl PostgresAccessor {
    pub async fn new(params: &ConnectionParams) -> Result<Self, ExportError> {
        let target = params.target();
        info!(db = %target, auth = ?params.auth_mode(), "Connecting to {}...", target);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(params.connect_timeout)
            .connect_with(connect_options(params))
            .await
            .map_err(|source| {
                error!("Error connecting to database {}: {}", target, source);
                ExportError::ConnectionFailure { target: target.clone(), source }
            })?;
        info!("Connection successful.");
        Ok(Self { pool })
    }

    fn views_query() -> String {
        format!(
            "SELECT table_schema::text AS object_schema, table_name::text AS object_name, \
             view_definition::text AS definition \
             FROM information_schema.views \
             WHERE table_schema NOT IN {EXCLUDED_SCHEMAS} \
             ORDER BY object_schema, object_name"
        )
    }

    fn tables_query() -> String {
        format!(
            "SELECT table_schema::text AS object_schema, table_name::text AS object_name, \
             NULL::text AS definition \
             FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' AND table_schema NOT IN {EXCLUDED_SCHEMAS} \
             ORDER BY object_schema, object_name"
        )
    }

    async fn fetch_rows(&self, query: &str) -> Result<Vec<PgRow>, sqlx::Error> {
        sqlx::query(query).fetch_all(&self.pool).await
    }
}

#[async_trait]
impl CatalogAccessor for PostgresAccessor {
    async fn fetch_dependencies(&mut self) -> Result<Vec<DependencyRow>, ExportError> {
        info!("Fetching object dependencies from pg_depend...");
        let rows = self.fetch_rows(DEPENDENCIES_QUERY).await.map_err(|e| {
            error!("Error fetching dependencies: {}", e);
            ExportError::DependencyQueryFailure(e)
        })?;
        let dependencies = rows
            .iter()
            .map(dependency_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ExportError::DependencyQueryFailure)?;
        info!(count = dependencies.len(), "Found {} dependency relationships.", dependencies.len());
        Ok(dependencies)
    }

    async fn fetch_objects(&mut self, category: ObjectCategory) -> Result<Vec<CatalogObject>, ExportError> {
        info!("Fetching {} definitions...", category);
        let query = match category {
            ObjectCategory::Procedures => ROUTINES_QUERY.to_string(),
            ObjectCategory::Views => Self::views_query(),
            ObjectCategory::Tables => Self::tables_query(),
        };
        let to_error = |source| ExportError::CatalogQueryFailure { category, source };
        let rows = self.fetch_rows(&query).await.map_err(to_error)?;
        let objects = rows
            .iter()
            .map(object_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_error)?;
        info!(count = objects.len(), "Found {} {}.", objects.len(), category);
        Ok(objects)
    }

    async fn close(&mut self) {
        self.pool.close().await;
        info!("Database connection closed.");
    }
}

pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn CatalogAccessor>, ExportError> {
        Ok(Box::new(PostgresAccessor::new(params).await?))
    }
}

fn connect_options(params: &ConnectionParams) -> PgConnectOptions {
    let mut options = PgConnectOptions::new().database(&params.database);
    options = if params.host.starts_with('/') {
        options.socket(&params.host)
    } else {
        match split_host_port(&params.host) {
            (host, Some(port)) => options.host(host).port(port),
            (host, None) => options.host(host),
        }
    };
    if params.auth_mode() == AuthMode::Credentialed {
        if let Some(username) = params.username.as_deref() {
            options = options.username(username);
        }
        // An empty password is still a password.
        if let Some(password) = params.password.as_deref() {
            options = options.password(password);
        }
    } else {
        debug!("Using trusted authentication for {}", params.target());
    }
    options
}

/// Splits `host:port`. Bare IPv6 addresses are left untouched.
fn split_host_port(host: &str) -> (&str, Option<u16>) {
    if let Some((name, port)) = host.rsplit_once(':') {
        let bracketed = name.starts_with('[') && name.ends_with(']');
        if !name.contains(':') || bracketed {
            if let Ok(port) = port.parse::<u16>() {
                return (name, Some(port));
            }
        }
    }
    (host, None)
}

fn dependency_from_row(row: &PgRow) -> Result<DependencyRow, sqlx::Error> {
    let referencing_schema: String = row.try_get("referencing_schema_name")?;
    let referencing_name: String = row.try_get("referencing_object_name")?;
    let referencing_type: String = row.try_get("referencing_object_type")?;
    let referenced_schema: Option<String> = row.try_get("referenced_schema_name")?;
    let referenced_name: String = row.try_get("referenced_object_name")?;
    let referenced_type: String = row.try_get("referenced_object_type")?;
    Ok(DependencyRow::from_catalog(
        (referencing_schema.as_str(), referencing_name.as_str(), referencing_type.as_str()),
        (referenced_schema.as_deref(), referenced_name.as_str(), referenced_type.as_str()),
    ))
}

fn object_from_row(row: &PgRow) -> Result<CatalogObject, sqlx::Error> {
    Ok(CatalogObject {
        schema: row.try_get("object_schema")?,
        name: row.try_get("object_name")?,
        definition: row.try_get("definition")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("localhost", "localhost", None)]
    #[case("db.internal:6432", "db.internal", Some(6432))]
    #[case("[::1]:5433", "[::1]", Some(5433))]
    #[case("::1", "::1", None)]
    #[case("host:notaport", "host:notaport", None)]
    fn splits_host_and_port(#[case] input: &str, #[case] host: &str, #[case] port: Option<u16>) {
        assert_eq!(split_host_port(input), (host, port));
    }

    #[test]
    fn credentialed_options_carry_username() {
        let params = ConnectionParams::new("localhost:5433", "TestDB")
            .with_credentials("exporter", Some("secret".to_string()));

        let options = connect_options(&params);

        assert_eq!(options.get_username(), "exporter");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("TestDB"));
    }

    #[test]
    fn dependency_query_filters_and_orders() {
        assert!(DEPENDENCIES_QUERY.contains("SELECT DISTINCT"));
        assert!(DEPENDENCIES_QUERY.contains("ORDER BY referencing_schema_name, referencing_object_name"));
        assert!(DEPENDENCIES_QUERY.contains("d.refobjid <> r.ev_class"));
    }

    #[test]
    fn table_query_selects_only_base_tables() {
        let query = PostgresAccessor::tables_query();

        assert!(query.contains("table_type = 'BASE TABLE'"));
        assert!(query.contains("NULL::text AS definition"));
    }
}
