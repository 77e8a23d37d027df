// lineage/emit.rs
// Writes the DOT description to disk and optionally renders it.

use super::dot::to_dot;
use super::graph::LineageGraph;
use super::render::{GraphRenderer, RenderError};
use crate::error::ExportError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug)]
pub struct EmitOutcome {
    pub description_path: PathBuf,
    pub description_written: bool,
    pub image_path: Option<PathBuf>,
    pub render_error: Option<RenderError>,
}

fn write_description(path: &Path, dot: &str) -> Result<(), ExportError> {
    fs::write(path, dot).map_err(|source| ExportError::DescriptionWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `<output_dir>/<base_name>.gv` and, unless `skip_render`, renders it.
///
/// Render failures are returned in the outcome instead of raised. The
/// description is written again after every render attempt, so it is on disk
/// afterwards even if the renderer removed it.
pub async fn emit(
    graph: &LineageGraph,
    output_dir: &Path,
    base_name: &str,
    skip_render: bool,
    renderer: &dyn GraphRenderer,
) -> Result<EmitOutcome, ExportError> {
    fs::create_dir_all(output_dir).map_err(|source| ExportError::DescriptionWriteFailure {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let description_path = output_dir.join(format!("{base_name}.gv"));
    let dot = to_dot(graph);
    write_description(&description_path, &dot)?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Lineage DOT graph saved to {}",
        description_path.display()
    );

    let mut image_path = None;
    let mut render_error = None;
    if skip_render {
        info!("Rendering skipped.");
    } else {
        match renderer.render(&description_path).await {
            Ok(path) => {
                info!("Lineage graph rendered to {}", path.display());
                image_path = Some(path);
            }
            Err(e) => {
                error!("Graph rendering failed: {}", e);
                render_error = Some(e);
            }
        }
        write_description(&description_path, &dot)?;
    }

    Ok(EmitOutcome {
        description_written: description_path.is_file(),
        description_path,
        image_path,
        render_error,
    })
}
