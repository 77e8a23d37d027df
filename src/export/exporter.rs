// export/exporter.rs
// Handles writing exported objects and lineage manifests to files

use crate::db::models::{CatalogObject, ObjectCategory, ObjectKind};
use crate::error::ExportError;
use crate::lineage::graph::LineageGraph;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DEFAULT_BATCH_SEPARATOR: &str = "GO";

/// Makes `raw` safe to use as a file name: each run of path separators,
/// wildcard/reserved characters or whitespace becomes a single `_`.
pub fn sanitize_filename(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_run = false;

    for ch in raw.trim().chars() {
        let reserved = ch.is_whitespace() || matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|');
        if reserved {
            if !in_run {
                cleaned.push('_');
                in_run = true;
            }
        } else {
            cleaned.push(ch);
            in_run = false;
        }
    }

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

pub fn object_file_name(object: &CatalogObject) -> String {
    format!("{}.{}.sql", sanitize_filename(&object.schema), sanitize_filename(&object.name))
}

/// Writes one `.sql` file per catalog object into a category subdirectory.
pub struct DefinitionWriter {
    batch_separator: String,
}

impl Default for DefinitionWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SEPARATOR)
    }
}

impl DefinitionWriter {
    pub fn new(batch_separator: impl Into<String>) -> Self {
        Self {
            batch_separator: batch_separator.into(),
        }
    }

    pub fn file_content(&self, object: &CatalogObject, category: ObjectCategory) -> String {
        let qualified = object.qualified_name();
        match (category, object.definition.as_deref().map(str::trim)) {
            (ObjectCategory::Tables, _) => format!(
                "-- Placeholder for table {}\n-- Definition needs to be scripted separately.\n{}",
                qualified, self.batch_separator
            ),
            (_, Some(definition)) if !definition.is_empty() => {
                format!("{}\n{}", definition, self.batch_separator)
            }
            _ => {
                warn!("No definition found for {} {}", category.subdir(), qualified);
                format!("-- No definition found for {}\n{}", qualified, self.batch_separator)
            }
        }
    }

    /// Returns how many files were written. Objects that share a file name
    /// (overloaded routines) go into one file, each followed by its own
    /// separator. A failure to create the directory aborts; a failure on a
    /// single file is logged and skipped.
    pub fn save_definitions(
        &self,
        objects: &[CatalogObject],
        category: ObjectCategory,
        output_dir: &Path,
    ) -> Result<usize, ExportError> {
        let output_path = output_dir.join(category.subdir());
        fs::create_dir_all(&output_path).map_err(|source| ExportError::OutputWriteFailure {
            path: output_path.clone(),
            source,
        })?;

        let mut files: Vec<(String, Vec<String>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for object in objects {
            let file_name = object_file_name(object);
            let content = self.file_content(object, category);
            match positions.get(&file_name) {
                Some(&index) => {
                    debug!("{} shares {} with an earlier object", object.qualified_name(), file_name);
                    files[index].1.push(content);
                }
                None => {
                    positions.insert(file_name.clone(), files.len());
                    files.push((file_name, vec![content]));
                }
            }
        }

        let mut count = 0;
        for (file_name, contents) in &files {
            let file_path = output_path.join(file_name);
            match fs::write(&file_path, contents.join("\n")) {
                Ok(()) => {
                    debug!("Saved definition to {}", file_path.display());
                    count += 1;
                }
                Err(e) => error!("Error writing file {}: {}", file_path.display(), e),
            }
        }
        info!(category = category.subdir(), count, "Saved {} files to {}", count, output_path.display());
        Ok(count)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ManifestFormat::Json => "json",
            ManifestFormat::Yaml => "yaml",
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ManifestNode {
    pub key: String,
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
}

#[derive(Serialize, Debug, Clone)]
pub struct ManifestEdge {
    pub from: String,
    pub to: String,
}

/// Machine-readable copy of a lineage graph.
#[derive(Serialize, Debug, Clone)]
pub struct LineageManifest {
    pub database: String,
    pub graph_name: String,
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<ManifestNode>,
    pub edges: Vec<ManifestEdge>,
}

impl LineageManifest {
    pub fn from_graph(database: &str, graph: &LineageGraph) -> Self {
        Self {
            database: database.to_string(),
            graph_name: graph.name().to_string(),
            generated_at: Utc::now(),
            nodes: graph
                .nodes()
                .map(|node| ManifestNode {
                    key: node.key.to_string(),
                    schema: node.key.schema.clone(),
                    name: node.key.name.clone(),
                    kind: node.kind,
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| ManifestEdge {
                    from: edge.from.to_string(),
                    to: edge.to.to_string(),
                })
                .collect(),
        }
    }
}

pub struct ManifestExporter;

impl ManifestExporter {
    pub fn export_manifest_to_file(
        &self,
        manifest: &LineageManifest,
        output_dir: &Path,
        base_name: &str,
        format: ManifestFormat,
    ) -> Result<PathBuf, ExportError> {
        let serialized = match format {
            ManifestFormat::Json => serde_json::to_string_pretty(manifest).map_err(ExportError::ManifestJson)?,
            ManifestFormat::Yaml => serde_yaml::to_string(manifest).map_err(ExportError::ManifestYaml)?,
        };
        let path = output_dir.join(format!("{}.{}", base_name, format.extension()));
        let to_error = |source| ExportError::OutputWriteFailure { path: path.clone(), source };
        let mut file = File::create(&path).map_err(to_error)?;
        file.write_all(serialized.as_bytes()).map_err(to_error)?;
        info!("Lineage manifest saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DependencyRow;
    use crate::lineage::graph::build_graph;
    use rstest::rstest;

    fn object(schema: &str, name: &str, definition: Option<&str>) -> CatalogObject {
        CatalogObject {
            schema: schema.to_string(),
            name: name.to_string(),
            definition: definition.map(str::to_string),
        }
    }

    mod sanitize_filename {
        use super::*;

        #[rstest]
        #[case("My Data/Base:1", "My_Data_Base_1")]
        #[case("", "_")]
        #[case("   ", "_")]
        #[case("  TestDB  ", "TestDB")]
        #[case("a\\b*c?d\"e<f>g|h", "a_b_c_d_e_f_g_h")]
        #[case("a / \\ b", "a_b")]
        #[case("sales.orders", "sales.orders")]
        #[case("Ünïcode_ok", "Ünïcode_ok")]
        fn applies_collapse_rule(#[case] input: &str, #[case] expected: &str) {
            assert_eq!(sanitize_filename(input), expected);
        }

        #[test]
        fn object_file_names_are_schema_qualified() {
            let obj = object("dbo", "usp Get/Orders", None);

            assert_eq!(object_file_name(&obj), "dbo.usp_Get_Orders.sql");
        }
    }

    mod definition_writer {
        use super::*;

        #[test]
        fn definition_is_trimmed_and_terminated_by_separator() {
            let writer = DefinitionWriter::default();
            let obj = object("dbo", "v", Some("\n  CREATE VIEW v AS SELECT 1  \n"));

            let content = writer.file_content(&obj, ObjectCategory::Views);

            assert_eq!(content, "CREATE VIEW v AS SELECT 1\nGO");
        }

        #[test]
        fn missing_definition_writes_comment() {
            let writer = DefinitionWriter::default();
            let obj = object("dbo", "p", None);

            let content = writer.file_content(&obj, ObjectCategory::Procedures);

            assert_eq!(content, "-- No definition found for dbo.p\nGO");
        }

        #[test]
        fn tables_get_placeholder() {
            let writer = DefinitionWriter::new(";");
            let obj = object("sales", "Orders", None);

            let content = writer.file_content(&obj, ObjectCategory::Tables);

            assert!(content.contains("Placeholder for table sales.Orders"));
            assert!(content.contains("Definition needs to be scripted separately."));
            assert!(content.ends_with("\n;"));
        }

        #[test]
        fn saves_one_file_per_object_in_category_subdir() {
            let temp_dir = tempfile::tempdir().unwrap();
            let writer = DefinitionWriter::default();
            let objects = vec![
                object("dbo", "usp_A", Some("CREATE PROCEDURE usp_A AS SELECT 1")),
                object("dbo", "usp_B", Some("CREATE PROCEDURE usp_B AS SELECT 2")),
            ];

            let count = writer
                .save_definitions(&objects, ObjectCategory::Procedures, temp_dir.path())
                .unwrap();

            assert_eq!(count, 2);
            let content = fs::read_to_string(temp_dir.path().join("sprocs").join("dbo.usp_A.sql")).unwrap();
            assert_eq!(content, "CREATE PROCEDURE usp_A AS SELECT 1\nGO");
            assert!(temp_dir.path().join("sprocs").join("dbo.usp_B.sql").is_file());
        }

        #[test]
        fn overloaded_routines_share_one_file() {
            let temp_dir = tempfile::tempdir().unwrap();
            let writer = DefinitionWriter::default();
            let objects = vec![
                object("public", "f", Some("CREATE FUNCTION f(int)")),
                object("public", "g", Some("CREATE FUNCTION g()")),
                object("public", "f", Some("CREATE FUNCTION f(text)")),
            ];

            let count = writer
                .save_definitions(&objects, ObjectCategory::Procedures, temp_dir.path())
                .unwrap();

            assert_eq!(count, 2);
            let sprocs = temp_dir.path().join("sprocs");
            assert_eq!(fs::read_dir(&sprocs).unwrap().count(), 2);
            let content = fs::read_to_string(sprocs.join("public.f.sql")).unwrap();
            assert_eq!(content, "CREATE FUNCTION f(int)\nGO\nCREATE FUNCTION f(text)\nGO");
        }

        #[test]
        fn empty_category_still_creates_directory() {
            let temp_dir = tempfile::tempdir().unwrap();

            let count = DefinitionWriter::default()
                .save_definitions(&[], ObjectCategory::Tables, temp_dir.path())
                .unwrap();

            assert_eq!(count, 0);
            assert!(temp_dir.path().join("tables").is_dir());
        }
    }

    mod manifest {
        use super::*;

        fn graph() -> LineageGraph {
            let deps = vec![DependencyRow::from_catalog(
                ("dbo", "OrdersView", "VIEW"),
                (Some("dbo"), "Orders", "USER_TABLE"),
            )];
            build_graph(&deps, "TestDB_lineage")
        }

        #[test]
        fn manifest_mirrors_graph() {
            let manifest = LineageManifest::from_graph("TestDB", &graph());

            assert_eq!(manifest.graph_name, "TestDB_lineage");
            assert_eq!(manifest.nodes.len(), 2);
            assert_eq!(manifest.nodes[0].key, "dbo.Orders");
            assert_eq!(manifest.nodes[0].kind, ObjectKind::Table);
            assert_eq!(manifest.edges[0].from, "dbo.Orders");
            assert_eq!(manifest.edges[0].to, "dbo.OrdersView");
        }

        #[test]
        fn json_manifest_is_written() {
            let temp_dir = tempfile::tempdir().unwrap();
            let manifest = LineageManifest::from_graph("TestDB", &graph());

            let path = ManifestExporter
                .export_manifest_to_file(&manifest, temp_dir.path(), "TestDB_lineage", ManifestFormat::Json)
                .unwrap();

            assert_eq!(path, temp_dir.path().join("TestDB_lineage.json"));
            let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(value["database"], "TestDB");
            assert_eq!(value["nodes"][1]["kind"], "view");
        }

        #[test]
        fn yaml_manifest_is_written() {
            let temp_dir = tempfile::tempdir().unwrap();
            let manifest = LineageManifest::from_graph("TestDB", &graph());

            let path = ManifestExporter
                .export_manifest_to_file(&manifest, temp_dir.path(), "TestDB_lineage", ManifestFormat::Yaml)
                .unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert!(path.ends_with("TestDB_lineage.yaml"));
            assert!(content.contains("graph_name: TestDB_lineage"));
        }
    }
}
