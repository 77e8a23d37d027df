// app/export_flow.rs
// Runs the lineage and schema exports against one catalog session each.

use crate::db::accessors::{CatalogAccessor, Connector};
use crate::db::models::{ConnectionParams, ObjectCategory};
use crate::error::ExportError;
use crate::export::exporter::{
    sanitize_filename, DefinitionWriter, LineageManifest, ManifestExporter, ManifestFormat,
};
use crate::lineage::emit::emit;
use crate::lineage::graph::build_graph;
use crate::lineage::render::GraphRenderer;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// `output/<sanitized database name>`
pub fn default_output_dir(database: &str) -> PathBuf {
    Path::new("output").join(sanitize_filename(database))
}

/// Base file name for the lineage description, image and manifest.
pub fn lineage_base_name(database: &str) -> String {
    format!("{}_lineage", sanitize_filename(database))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineageStage {
    Connected,
    DependenciesFetched,
    GraphBuilt,
    DescriptionWritten,
    Rendered,
    RenderFailed,
    Closed,
}

#[derive(Debug, Clone)]
pub struct LineageSettings {
    pub output_dir: PathBuf,
    pub skip_render: bool,
    pub manifest_format: Option<ManifestFormat>,
}

/// Status of a lineage run that got past the hard-failure stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportResult {
    pub dependencies_fetched: bool,
    pub description_written: bool,
    pub render_error: Option<String>,
    pub description_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
}

/// Connects, fetches dependencies, builds and emits the lineage graph.
///
/// Connection, query and description-write failures are returned as errors;
/// a render failure is carried in the result. The session is closed on every
/// path once it has been opened.
pub async fn generate_lineage(
    connector: &dyn Connector,
    params: &ConnectionParams,
    settings: &LineageSettings,
    renderer: &dyn GraphRenderer,
) -> Result<ExportResult, ExportError> {
    let mut accessor = connector.connect(params).await?;
    debug!(stage = ?LineageStage::Connected);
    let result = lineage_stages(accessor.as_mut(), params, settings, renderer).await;
    accessor.close().await;
    debug!(stage = ?LineageStage::Closed);
    if let Err(e) = &result {
        error!("Lineage generation failed: {}", e);
    }
    result
}

async fn lineage_stages(
    accessor: &mut dyn CatalogAccessor,
    params: &ConnectionParams,
    settings: &LineageSettings,
    renderer: &dyn GraphRenderer,
) -> Result<ExportResult, ExportError> {
    let dependencies = accessor.fetch_dependencies().await?;
    debug!(stage = ?LineageStage::DependenciesFetched, count = dependencies.len());
    let mut result = ExportResult {
        dependencies_fetched: true,
        ..ExportResult::default()
    };

    if dependencies.is_empty() {
        warn!("No dependencies found to generate lineage graph.");
        return Ok(result);
    }

    let base_name = lineage_base_name(&params.database);
    let graph = build_graph(&dependencies, &base_name);
    debug!(stage = ?LineageStage::GraphBuilt, nodes = graph.node_count(), edges = graph.edge_count());

    let outcome = emit(&graph, &settings.output_dir, &base_name, settings.skip_render, renderer).await?;
    debug!(stage = ?LineageStage::DescriptionWritten);
    result.description_written = outcome.description_written;
    result.description_path = Some(outcome.description_path);
    result.image_path = outcome.image_path;
    if let Some(e) = &outcome.render_error {
        if e.is_tool_missing() {
            warn!("Skipping image; Graphviz is not installed or not on PATH.");
        }
    }
    result.render_error = outcome.render_error.map(|e| e.to_string());
    if !settings.skip_render {
        let stage = match result.render_error {
            Some(_) => LineageStage::RenderFailed,
            None => LineageStage::Rendered,
        };
        debug!(stage = ?stage);
    }

    if let Some(format) = settings.manifest_format {
        let manifest = LineageManifest::from_graph(&params.database, &graph);
        let path = ManifestExporter.export_manifest_to_file(&manifest, &settings.output_dir, &base_name, format)?;
        result.manifest_path = Some(path);
    }

    Ok(result)
}

/// Files written per category, and the categories whose fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaExportSummary {
    pub written: Vec<(ObjectCategory, usize)>,
    pub failed: Vec<ObjectCategory>,
}

impl SchemaExportSummary {
    pub fn written_for(&self, category: ObjectCategory) -> usize {
        self.written
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total_written(&self) -> usize {
        self.written.iter().map(|(_, n)| n).sum()
    }
}

/// Exports procedures, views and table placeholders under `output_dir`.
///
/// A failed fetch for one category is logged and the others still run.
/// Connection failures and failures to create output directories abort.
pub async fn export_schema(
    connector: &dyn Connector,
    params: &ConnectionParams,
    output_dir: &Path,
    writer: &DefinitionWriter,
) -> Result<SchemaExportSummary, ExportError> {
    let mut accessor = connector.connect(params).await?;
    let result = schema_stages(accessor.as_mut(), output_dir, writer).await;
    accessor.close().await;
    match &result {
        Ok(summary) => info!(
            files = summary.total_written(),
            failed = summary.failed.len(),
            "Schema export process completed."
        ),
        Err(e) => error!("An unexpected error occurred during export: {}", e),
    }
    result
}

async fn schema_stages(
    accessor: &mut dyn CatalogAccessor,
    output_dir: &Path,
    writer: &DefinitionWriter,
) -> Result<SchemaExportSummary, ExportError> {
    let mut summary = SchemaExportSummary::default();
    for category in ObjectCategory::ALL {
        match accessor.fetch_objects(category).await {
            Ok(objects) => {
                let count = writer.save_definitions(&objects, category, output_dir)?;
                summary.written.push((category, count));
            }
            Err(e) => {
                error!("Error fetching {}: {}", category, e);
                summary.failed.push(category);
            }
        }
    }
    Ok(summary)
}
