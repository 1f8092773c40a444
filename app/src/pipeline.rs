//! Turns a parsed command line into a graph and computes it.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use fxhost::util::timing::{ScopedTimer, measure_info};
use fxhost::{FrameRange, Graph, Host, HostConfig, NodeId};
use log::{info, warn};

use crate::cli::{self, Invocation, ToolOptions};
use crate::describe;
use crate::outcome::{Outcome, RenderSummary};

fn host_config(tool: &ToolOptions) -> Result<HostConfig> {
    let mut config = match &tool.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read configuration {}", path.display()))?;
            let mut config = HostConfig::from_toml_str(&text)
                .with_context(|| format!("invalid configuration {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => HostConfig::load(),
    };
    config.plugin_paths.extend(tool.plugin_paths.iter().cloned());
    if let Some(workers) = tool.nb_cores {
        config.workers = workers;
    }
    Ok(config)
}

fn start_host(tool: &ToolOptions) -> Result<Arc<Host>> {
    let host = Host::new(host_config(tool)?)?;
    let report = measure_info("Plugin discovery", || host.load_plugins());
    if !report.failures.is_empty() {
        warn!("{} plugin(s) could not be loaded", report.failures.len());
    }
    if report.described > 0 && host.config().cache_path.is_some() {
        if let Err(e) = host.save_configured_cache() {
            warn!("Could not update the plugin cache: {}", e);
        }
    }
    info!("{} plugin(s) available", host.plugins().len());
    Ok(Arc::new(host))
}

/// `--range` values as a frame range. A single value is one frame.
pub fn requested_range(values: Option<&[f64]>) -> Result<Option<FrameRange>> {
    let range = match values {
        None | Some([]) => return Ok(None),
        Some([frame]) => FrameRange::new(*frame, *frame, 1.0)?,
        Some([start, end]) => FrameRange::new(*start, *end, 1.0)?,
        Some([start, end, step]) => FrameRange::new(*start, *end, *step)?,
        Some(other) => bail!("--range takes at most 3 values, got {}", other.len()),
    };
    Ok(Some(range))
}

pub fn run(invocation: Invocation) -> Result<Outcome> {
    let host = start_host(&invocation.tool)?;
    if invocation.tool.nodes {
        return Ok(Outcome::Display(describe::plugin_list(&host.cache().plugins_by_id())));
    }
    if invocation.nodes.is_empty() {
        return Ok(Outcome::Display(cli::usage()));
    }

    let mut graph = Graph::new(host);
    let mut ids: Vec<NodeId> = Vec::with_capacity(invocation.nodes.len());
    let mut displays = Vec::new();
    for command in &invocation.nodes {
        let id = graph
            .create_node(&command.name)
            .with_context(|| format!("cannot create node '{}'", command.name))?;
        graph
            .apply_arguments(id, &command.options.values)
            .with_context(|| format!("bad arguments for '{}'", command.name))?;
        if command.options.wants_display() {
            displays.push(describe::node_details(graph.node(id)?, &command.options)?);
        }
        ids.push(id);
    }
    if !displays.is_empty() {
        return Ok(Outcome::Display(displays.join("\n")));
    }

    graph.connect_chain(&ids)?;
    let Some(&target) = ids.last() else {
        bail!("no node to compute");
    };
    let range = match requested_range(invocation.tool.range.as_deref())? {
        Some(range) => range,
        None => graph.compute_time_domain(target)?,
    };

    let timer = ScopedTimer::info("fxdo compute");
    let report = graph.compute(target, range)?;
    Ok(Outcome::Rendered(RenderSummary {
        target: graph.node(target)?.name().to_string(),
        first_frame: range.start,
        last_frame: range.end,
        frames: range.frame_count(),
        renders: report.renders.len(),
        elapsed_ms: timer.elapsed_ms(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_range() {
        assert_eq!(requested_range(None).unwrap(), None);
        assert_eq!(requested_range(Some(&[4.0][..])).unwrap(), Some(FrameRange::single(4.0)));
        let range = requested_range(Some(&[0.0, 10.0, 2.0][..])).unwrap().unwrap();
        assert_eq!(range.frames(), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(requested_range(Some(&[5.0, 1.0][..])).is_err());
        assert!(requested_range(Some(&[0.0, 1.0, 1.0, 1.0][..])).is_err());
    }

    #[test]
    fn test_tool_options_override_config() {
        let tool = ToolOptions {
            nb_cores: Some(3),
            plugin_paths: vec!["/opt/fx".into()],
            config: Some(std::env::temp_dir().join("fxdo-missing-config.toml")),
            ..ToolOptions::default()
        };
        assert!(host_config(&tool).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        fs::write(&path, "plugin_paths = [\"/usr/lib/fx\"]\nworkers = 2\n").unwrap();
        let tool = ToolOptions {
            config: Some(path),
            ..tool
        };
        let config = host_config(&tool).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.plugin_paths.last().unwrap().to_str(), Some("/opt/fx"));
    }
}
