//! Node arguments typed on a command line.
//!
//! A bare token sets the next parameter in declaration order; `name=value`
//! sets a parameter by name. Once a keyword has been given, bare tokens are
//! rejected.

use once_cell::sync::Lazy;
use regex::Regex;

use super::node::Node;
use crate::error::{HostError, Result};
use crate::param::ParamError;
use crate::param::expression::parse_expression;

static ARGUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s)(?:([a-zA-Z_][a-zA-Z0-9_]*)=)?(.*)$").expect("argument pattern is valid")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentTarget {
    Position(usize),
    Name(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeArgument {
    pub target: ArgumentTarget,
    pub value: String,
}

pub fn parse_arguments<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<NodeArgument>> {
    let mut arguments = Vec::with_capacity(tokens.len());
    let mut position = 0;
    let mut seen_keyword = false;
    for token in tokens {
        let token = token.as_ref();
        let captures = ARGUMENT.captures(token).ok_or_else(|| HostError::ParameterParse {
            param: String::new(),
            text: token.to_string(),
            reason: "malformed argument".to_string(),
        })?;
        let value = captures.get(2).map_or("", |m| m.as_str()).to_string();
        let target = match captures.get(1) {
            Some(name) => {
                seen_keyword = true;
                ArgumentTarget::Name(name.as_str().to_string())
            }
            None if seen_keyword => {
                return Err(HostError::ParameterParse {
                    param: String::new(),
                    text: token.to_string(),
                    reason: "Non-keyword parameter after keyword parameter".to_string(),
                });
            }
            None => {
                position += 1;
                ArgumentTarget::Position(position - 1)
            }
        };
        arguments.push(NodeArgument { target, value });
    }
    Ok(arguments)
}

/// Parses every argument against `node`'s parameters and only then writes
/// them, so a bad argument leaves the node untouched.
pub fn apply_arguments<S: AsRef<str>>(node: &Node, tokens: &[S]) -> Result<()> {
    let arguments = parse_arguments(tokens)?;
    let mut instance = node.instance_mut();

    let mut resolved = Vec::with_capacity(arguments.len());
    for argument in &arguments {
        let index = match &argument.target {
            ArgumentTarget::Position(i) if *i < instance.params().len() => *i,
            ArgumentTarget::Position(i) => {
                return Err(HostError::ParameterParse {
                    param: format!("#{}", i),
                    text: argument.value.clone(),
                    reason: format!("'{}' takes {} positional parameters", node.name(), instance.params().len()),
                });
            }
            ArgumentTarget::Name(name) => instance
                .params()
                .iter()
                .position(|p| p.name() == name)
                .ok_or_else(|| ParamError::UnknownParam(name.clone()))?,
        };
        let param = &instance.params()[index];
        parse_expression(param.param_type(), &argument.value, &param.choice_options()).map_err(|reason| {
            HostError::ParameterParse {
                param: param.name().to_string(),
                text: argument.value.clone(),
                reason,
            }
        })?;
        resolved.push((index, argument.value.as_str()));
    }

    // A write can still fail after parsing, e.g. a component of a keyed
    // parameter. Earlier writes are then rolled back.
    let saved: Vec<_> = resolved
        .iter()
        .filter_map(|(index, _)| instance.param_at(*index).map(|p| (*index, p.snapshot())))
        .collect();
    let outcome = resolved.iter().try_for_each(|(index, text)| match instance.param_at_mut(*index) {
        Some(param) => param.set_value_from_expression(text),
        None => Ok(()),
    });
    if let Err(e) = outcome {
        for (index, state) in saved.into_iter().rev() {
            if let Some(param) = instance.param_at_mut(index) {
                param.restore(state);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_then_keyword() {
        let args = parse_arguments(&["0.5", "radius=3", "label=a=b"]).unwrap();
        assert_eq!(args[0].target, ArgumentTarget::Position(0));
        assert_eq!(args[0].value, "0.5");
        assert_eq!(args[1].target, ArgumentTarget::Name("radius".to_string()));
        assert_eq!(args[2].value, "a=b");
    }

    #[test]
    fn test_positional_after_keyword_is_rejected() {
        let err = parse_arguments(&["radius=3", "4"]).unwrap_err();
        match err {
            HostError::ParameterParse { text, reason, .. } => {
                assert_eq!(text, "4");
                assert_eq!(reason, "Non-keyword parameter after keyword parameter");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bare_value_with_symbols() {
        let args = parse_arguments(&["[1]=0.5", "=x"]).unwrap();
        assert_eq!(args[0].target, ArgumentTarget::Position(0));
        assert_eq!(args[0].value, "[1]=0.5");
        assert_eq!(args[1].value, "=x");
    }
}
