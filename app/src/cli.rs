//! Command line layout: `fxdo [options] // node [args]... // node [args]...`.
//!
//! The first segment and an options-only last segment configure fxdo
//! itself. Every other segment starts with a node name followed by node
//! options and parameter values.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use thiserror::Error;

pub const SEPARATOR: &str = "//";
pub const OPTIONS_ENV: &str = "FXDO_OPTIONS";

#[derive(Error, Debug)]
pub enum CliError {
    /// Help or version text requested with a tool option.
    #[error("{0}")]
    Display(String),
    #[error("{0}")]
    Usage(String),
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => CliError::Display(err.to_string()),
            _ => CliError::Usage(err.to_string()),
        }
    }
}

#[derive(Parser, Debug, Default, Clone, PartialEq)]
#[command(
    name = "fxdo",
    version,
    about = "Build a chain of plugin nodes and compute it",
    after_help = "Nodes follow the options, each introduced by //:\n  fxdo --range 0 9 // reader file=in.png // invert // writer out.png"
)]
pub struct ToolOptions {
    /// List every available node and exit
    #[arg(long)]
    pub nodes: bool,

    /// Frames to compute: START [END [STEP]]
    #[arg(long, num_args = 1..=3, value_name = "FRAME", allow_negative_numbers = true)]
    pub range: Option<Vec<f64>>,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Nodes rendered at once within a frame
    #[arg(long = "nb-cores", value_name = "N")]
    pub nb_cores: Option<usize>,

    /// Host configuration file used instead of the user's host.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Extra directory searched for plugin binaries
    #[arg(long = "plugin-path", value_name = "DIR")]
    pub plugin_paths: Vec<std::path::PathBuf>,
}

impl ToolOptions {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Info
        }
    }
}

/// What a node segment asks to see instead of computing.
#[derive(Parser, Debug, Default, Clone, PartialEq)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true,
    allow_negative_numbers = true
)]
pub struct NodeOptions {
    #[arg(short = 'h', long)]
    pub help: bool,
    #[arg(short = 'v', long)]
    pub version: bool,
    #[arg(short = 'a', long)]
    pub attributes: bool,
    #[arg(short = 'p', long)]
    pub properties: bool,
    #[arg(short = 'c', long)]
    pub clips: bool,
    #[arg(long, value_name = "NAME")]
    pub clip: Option<String>,
    #[arg(short = 'P', long)]
    pub parameters: bool,
    #[arg(long, value_name = "NAME")]
    pub param: Option<String>,
    /// Parameter values: positional in declaration order, or `name=value`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub values: Vec<String>,
}

impl NodeOptions {
    pub fn wants_display(&self) -> bool {
        self.help
            || self.version
            || self.attributes
            || self.properties
            || self.clips
            || self.clip.is_some()
            || self.parameters
            || self.param.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCommand {
    pub name: String,
    pub options: NodeOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: ToolOptions,
    pub nodes: Vec<NodeCommand>,
}

/// Splits `args` on `//`. The first segment is always present.
pub fn split_segments(args: &[String]) -> Vec<Vec<String>> {
    let mut segments = vec![Vec::new()];
    for arg in args {
        if arg == SEPARATOR {
            segments.push(Vec::new());
        } else if let Some(last) = segments.last_mut() {
            last.push(arg.clone());
        }
    }
    segments
}

fn is_options_segment(segment: &[String]) -> bool {
    segment.first().is_none_or(|first| first.starts_with('-'))
}

/// Parses the arguments after the program name. `env_options` holds the
/// value of `FXDO_OPTIONS`, applied before the command line.
pub fn parse(args: &[String], env_options: Option<&str>) -> Result<Invocation, CliError> {
    let mut segments = split_segments(args);
    let mut tool_args: Vec<String> = vec!["fxdo".to_string()];
    if let Some(env) = env_options {
        tool_args.extend(env.split_whitespace().map(str::to_string));
    }
    tool_args.extend(segments.remove(0));

    if segments.last().is_some_and(|last| is_options_segment(last)) {
        if let Some(trailing) = segments.pop() {
            tool_args.extend(trailing);
        }
    }
    let tool = ToolOptions::try_parse_from(&tool_args)?;

    let mut nodes = Vec::with_capacity(segments.len());
    for segment in segments {
        let Some((name, rest)) = segment.split_first() else {
            continue;
        };
        if name.starts_with('-') {
            return Err(CliError::Usage(format!(
                "expected a node name after {}, found option '{}'",
                SEPARATOR, name
            )));
        }
        let options = NodeOptions::try_parse_from(rest).map_err(|e| {
            CliError::Usage(format!("node '{}': {}", name, e.to_string().trim_end()))
        })?;
        nodes.push(NodeCommand {
            name: name.clone(),
            options,
        });
    }
    Ok(Invocation { tool, nodes })
}

pub fn usage() -> String {
    ToolOptions::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_segments() {
        let segments = split_segments(&args("--verbose // reader a.png // invert"));
        assert_eq!(segments, vec![args("--verbose"), args("reader a.png"), args("invert")]);
        assert_eq!(split_segments(&[]), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_nodes_and_values() {
        let invocation = parse(&args("--range 0 9 2 // reader level=0.5 // blur 3 -1 // writer -c"), None).unwrap();
        assert_eq!(invocation.tool.range, Some(vec![0.0, 9.0, 2.0]));
        let names: Vec<&str> = invocation.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["reader", "blur", "writer"]);
        assert_eq!(invocation.nodes[0].options.values, args("level=0.5"));
        assert_eq!(invocation.nodes[1].options.values, args("3 -1"));
        assert!(invocation.nodes[2].options.clips);
        assert!(invocation.nodes[2].options.wants_display());
        assert!(!invocation.nodes[0].options.wants_display());
    }

    #[test]
    fn test_trailing_and_environment_options() {
        let invocation = parse(&args("// reader // --nb-cores 4"), Some("--quiet")).unwrap();
        assert_eq!(invocation.nodes.len(), 1);
        assert_eq!(invocation.tool.nb_cores, Some(4));
        assert!(invocation.tool.quiet);
        assert_eq!(invocation.tool.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn test_node_options() {
        let invocation = parse(&args("// blur --param radius -P -h"), None).unwrap();
        let options = &invocation.nodes[0].options;
        assert_eq!(options.param.as_deref(), Some("radius"));
        assert!(options.parameters);
        assert!(options.help);
    }

    #[test]
    fn test_help_is_a_display() {
        assert!(matches!(parse(&args("--help"), None), Err(CliError::Display(_))));
        assert!(matches!(parse(&args("--version"), None), Err(CliError::Display(_))));
        assert!(matches!(parse(&args("--bogus"), None), Err(CliError::Usage(_))));
        assert!(matches!(parse(&args("// -c reader"), None), Err(CliError::Usage(_))));
    }
}
