//! Text shown for `--nodes` and the node display options.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use fxhost::graph::Node;
use fxhost::plugin::Plugin;
use fxhost::property::PropertySet;

use crate::cli::NodeOptions;

/// One `key = values` line per property, sorted by key.
pub fn property_lines(set: &PropertySet) -> String {
    let mut keys: Vec<&str> = set.keys().collect();
    keys.sort_unstable();
    let mut out = String::new();
    for key in keys {
        let values = match set.get_all(key) {
            Ok(values) => values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            Err(e) => format!("<{}>", e),
        };
        let _ = writeln!(out, "  {} = {}", key, values);
    }
    out
}

pub fn plugin_list(plugins: &[Arc<Plugin>]) -> String {
    let mut out = String::new();
    for plugin in plugins {
        let (major, minor) = plugin.version();
        let _ = writeln!(
            out,
            "{:<36} {:<24} v{}.{}  [{}]",
            plugin.raw_identifier(),
            plugin.label(),
            major,
            minor,
            plugin.supported_contexts().join(", ")
        );
    }
    if out.is_empty() {
        out.push_str("No plugins found. Set FXHOST_PLUGIN_PATH or use --plugin-path.\n");
    }
    out
}

fn clip_list(node: &Node) -> String {
    let instance = node.instance();
    let mut out = String::new();
    for clip in instance.clips() {
        let direction = if clip.is_output() { "output" } else { "input" };
        let optional = if clip.is_optional() { ", optional" } else { "" };
        let components: Vec<&str> = clip.supported_components().iter().map(|c| c.name()).collect();
        let _ = writeln!(
            out,
            "  {:<16} {}{}  [{}]",
            clip.name(),
            direction,
            optional,
            components.join(", ")
        );
    }
    out
}

fn param_list(node: &Node) -> String {
    let instance = node.instance();
    let mut out = String::new();
    for (index, param) in instance.params().iter().enumerate() {
        let _ = write!(
            out,
            "  {:>2}  {:<16} {:<10} = {}",
            index,
            param.name(),
            param.param_type(),
            param.get()
        );
        let options = param.choice_options();
        if !options.is_empty() {
            let _ = write!(out, "  ({})", options.join("|"));
        }
        let hint = param.hint();
        if !hint.is_empty() {
            let _ = write!(out, "  {}", hint);
        }
        out.push('\n');
    }
    out
}

fn node_help(node: &Node) -> String {
    let plugin = node.plugin();
    let (major, minor) = plugin.version();
    let mut out = format!(
        "{} ({} v{}.{}) in the {} context\n",
        plugin.label(),
        plugin.raw_identifier(),
        major,
        minor,
        node.context()
    );
    out.push_str("\nParameters (positional in this order, or name=value):\n");
    out.push_str(&param_list(node));
    out.push_str("\nClips:\n");
    out.push_str(&clip_list(node));
    out
}

/// Everything `options` asks to see about `node`, in a fixed order.
pub fn node_details(node: &Node, options: &NodeOptions) -> Result<String> {
    let mut sections = Vec::new();
    if options.help {
        sections.push(node_help(node));
    }
    if options.version {
        let (major, minor) = node.plugin().version();
        sections.push(format!("{} {}.{}\n", node.plugin().raw_identifier(), major, minor));
    }
    if options.attributes {
        let description = node
            .plugin()
            .description()
            .ok_or_else(|| anyhow!("{} has not been described", node.plugin().raw_identifier()))?;
        sections.push(format!("Attributes of {}:\n{}", node.name(), property_lines(description.properties())));
    }
    if options.properties {
        sections.push(format!(
            "Properties of {}:\n{}",
            node.name(),
            property_lines(node.instance().properties())
        ));
    }
    if options.clips {
        sections.push(format!("Clips of {}:\n{}", node.name(), clip_list(node)));
    }
    if let Some(name) = &options.clip {
        let clip = node
            .clip(name)
            .ok_or_else(|| anyhow!("node '{}' has no clip '{}'", node.name(), name))?;
        sections.push(format!("Clip {}:\n{}", name, property_lines(clip.properties())));
    }
    if options.parameters {
        sections.push(format!("Parameters of {}:\n{}", node.name(), param_list(node)));
    }
    if let Some(name) = &options.param {
        let lines = node
            .with_param(name, |param| property_lines(param.properties()))
            .with_context(|| format!("node '{}'", node.name()))?;
        sections.push(format!("Parameter {}:\n{}", name, lines));
    }
    Ok(sections.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhost::property::PropertySpec;

    #[test]
    fn test_property_lines_are_sorted() {
        let set = PropertySet::from_specs([
            PropertySpec::string("label", "blur"),
            PropertySpec::doubles("size", &[1.0, 2.5]),
            PropertySpec::int("enabled", 1),
        ])
        .unwrap();
        assert_eq!(
            property_lines(&set),
            "  enabled = 1\n  label = \"blur\"\n  size = 1, 2.5\n"
        );
    }

    #[test]
    fn test_empty_plugin_list_explains_itself() {
        assert!(plugin_list(&[]).contains("FXHOST_PLUGIN_PATH"));
    }
}
