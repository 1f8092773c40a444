//! Textual parameter values as typed on a command line.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ParamType, ParamValue};

static INDEXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\s*(\d+)\s*\]\s*=\s*(.+)$").expect("valid indexed assignment regex"));

/// A parsed expression: the whole value or a single component.
#[derive(Clone, PartialEq, Debug)]
pub enum Assignment {
    Whole(ParamValue),
    Component { index: usize, value: f64 },
}

pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn parse_number(text: &str, param_type: ParamType) -> Result<f64, String> {
    let text = text.trim();
    let integral = param_type.value_kind() == crate::property::PropertyKind::Int;
    if let Some(percent) = text.strip_suffix('%') {
        if integral {
            return Err(format!("'{}' is not an integer", text));
        }
        return percent
            .trim()
            .parse::<f64>()
            .map(|v| v / 100.0)
            .map_err(|_| format!("'{}' is not a number", text));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| format!("'{}' is not a number", text))?;
    if !value.is_finite() {
        return Err(format!("'{}' is not a finite number", text));
    }
    if integral && value.fract() != 0.0 {
        return Err(format!("'{}' is not an integer", text));
    }
    Ok(value)
}

fn components(text: &str) -> Vec<&str> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|t| t.strip_suffix(')')))
        .unwrap_or(text);
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Parses `text` for a parameter of `param_type`.
///
/// Choice parameters accept an option index or label from `choice_options`.
/// A single number given to a multi-component type is applied to every
/// component.
pub fn parse_expression(
    param_type: ParamType,
    text: &str,
    choice_options: &[String],
) -> Result<Assignment, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() && param_type != ParamType::String {
        return Err("empty value".to_string());
    }

    if let Some(caps) = INDEXED.captures(trimmed) {
        if !param_type.is_numeric() || param_type.dimension() < 2 {
            return Err(format!("{} parameters have no components", param_type));
        }
        let index: usize = caps[1]
            .parse()
            .map_err(|_| format!("bad component index '{}'", &caps[1]))?;
        if index >= param_type.dimension() {
            return Err(format!(
                "component {} out of range for {} ({} components)",
                index,
                param_type,
                param_type.dimension()
            ));
        }
        let value = parse_number(&caps[2], param_type)?;
        return Ok(Assignment::Component { index, value });
    }

    let value = match param_type {
        ParamType::String => ParamValue::Text(unquote(text).to_string()),
        ParamType::Boolean => {
            let flag = parse_bool(trimmed).ok_or_else(|| format!("'{}' is not a boolean", trimmed))?;
            ParamValue::from(flag)
        }
        ParamType::Choice => {
            let label = unquote(trimmed);
            let index = match label.parse::<usize>() {
                Ok(index) => index,
                Err(_) => choice_options
                    .iter()
                    .position(|option| option.eq_ignore_ascii_case(label))
                    .ok_or_else(|| {
                        format!("'{}' is not one of: {}", label, choice_options.join(", "))
                    })?,
            };
            if !choice_options.is_empty() && index >= choice_options.len() {
                return Err(format!(
                    "choice index {} out of range ({} options)",
                    index,
                    choice_options.len()
                ));
            }
            ParamValue::scalar(index as f64)
        }
        _ => {
            let parts = components(trimmed);
            let n = param_type.dimension();
            let values = parts
                .iter()
                .map(|part| parse_number(part, param_type))
                .collect::<Result<Vec<_>, _>>()?;
            match values.len() {
                len if len == n => ParamValue::Numbers(values),
                1 => ParamValue::Numbers(vec![values[0]; n]),
                len => {
                    return Err(format!(
                        "{} expects {} values, got {}",
                        param_type, n, len
                    ));
                }
            }
        }
    };
    Ok(Assignment::Whole(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole(param_type: ParamType, text: &str) -> ParamValue {
        match parse_expression(param_type, text, &[]).unwrap() {
            Assignment::Whole(value) => value,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalars() {
        assert_eq!(whole(ParamType::Double, "2.5"), ParamValue::scalar(2.5));
        assert_eq!(whole(ParamType::Double, "50%"), ParamValue::scalar(0.5));
        assert_eq!(whole(ParamType::Integer, " 7 "), ParamValue::scalar(7.0));
        assert!(parse_expression(ParamType::Integer, "7.5", &[]).is_err());
        assert!(parse_expression(ParamType::Double, "abc", &[]).is_err());
    }

    #[test]
    fn test_multi_component_forms() {
        let expected = ParamValue::Numbers(vec![1.0, 2.0]);
        assert_eq!(whole(ParamType::Double2D, "1,2"), expected);
        assert_eq!(whole(ParamType::Double2D, "[1, 2]"), expected);
        assert_eq!(whole(ParamType::Double2D, "(1 2)"), expected);
        assert_eq!(whole(ParamType::Rgb, "0.5"), ParamValue::Numbers(vec![0.5; 3]));
        assert!(parse_expression(ParamType::Rgba, "1,2", &[]).is_err());
    }

    #[test]
    fn test_indexed_assignment() {
        assert_eq!(
            parse_expression(ParamType::Rgba, "[3]=0.25", &[]).unwrap(),
            Assignment::Component { index: 3, value: 0.25 }
        );
        assert!(parse_expression(ParamType::Rgb, "[3]=1", &[]).is_err());
        assert!(parse_expression(ParamType::Double, "[0]=1", &[]).is_err());
    }

    #[test]
    fn test_booleans_strings_and_choices() {
        assert_eq!(whole(ParamType::Boolean, "yes"), ParamValue::scalar(1.0));
        assert_eq!(whole(ParamType::Boolean, "Off"), ParamValue::scalar(0.0));
        assert_eq!(whole(ParamType::String, "\"a b\""), ParamValue::Text("a b".into()));

        let options = vec!["nearest".to_string(), "bilinear".to_string()];
        assert_eq!(
            parse_expression(ParamType::Choice, "Bilinear", &options).unwrap(),
            Assignment::Whole(ParamValue::scalar(1.0))
        );
        assert_eq!(
            parse_expression(ParamType::Choice, "0", &options).unwrap(),
            Assignment::Whole(ParamValue::scalar(0.0))
        );
        assert!(parse_expression(ParamType::Choice, "2", &options).is_err());
        assert!(parse_expression(ParamType::Choice, "cubic", &options).is_err());
    }
}
