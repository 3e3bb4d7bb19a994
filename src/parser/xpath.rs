//! Translation of a small XPath subset into CSS selectors.
//!
//! Supported: location paths made of `/` and `//` steps, element names or
//! `*`, the predicates `[@a]`, `[@a='v']`, `[contains(@a,'v')]`,
//! `[starts-with(@a,'v')]`, `[n]` and `[last()]`, and an optional trailing
//! `/text()` or `/@attr`.

use super::rules::NodeTarget;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XPathQuery {
    pub selector: String,
    pub target: NodeTarget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Root,
    Child,
    Descendant,
}

pub(crate) fn translate(expression: &str) -> Result<XPathQuery, String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err("empty expression".to_string());
    }

    let (path, target) = split_target(expression);
    let steps = split_steps(path)?;

    let mut selector = String::new();
    for (index, (axis, step)) in steps.iter().enumerate() {
        let compound = translate_step(step)?;
        match axis {
            Axis::Root => {
                selector.push_str(&compound);
                selector.push_str(":root");
            }
            Axis::Child => {
                selector.push_str(" > ");
                selector.push_str(&compound);
            }
            Axis::Descendant => {
                if index > 0 {
                    selector.push(' ');
                }
                selector.push_str(&compound);
            }
        }
    }

    Ok(XPathQuery { selector, target })
}

fn split_target(expression: &str) -> (&str, NodeTarget) {
    if let Some(path) = expression.strip_suffix("/text()") {
        return (path, NodeTarget::OwnText);
    }
    if let Some(index) = expression.rfind("/@") {
        let name = &expression[index + 2..];
        if is_name(name) {
            return (&expression[..index], NodeTarget::Attr(name.to_string()));
        }
    }
    (expression, NodeTarget::Text)
}

fn split_steps(path: &str) -> Result<Vec<(Axis, String)>, String> {
    let mut steps = Vec::new();
    let mut axis = Axis::Descendant;
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut leading = true;
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            current.push(c);
            if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' if depth > 0 => {
                quote = Some(c);
                current.push(c);
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                if depth == 0 {
                    return Err("unbalanced ']'".to_string());
                }
                depth -= 1;
                current.push(c);
            }
            '/' if depth == 0 => {
                let next_axis = if chars.peek() == Some(&'/') {
                    chars.next();
                    Axis::Descendant
                } else {
                    Axis::Child
                };

                if leading {
                    axis = match next_axis {
                        Axis::Descendant => Axis::Descendant,
                        _ => Axis::Root,
                    };
                    leading = false;
                    continue;
                }
                if current.is_empty() {
                    return Err("empty location step".to_string());
                }
                steps.push((axis, std::mem::take(&mut current)));
                axis = next_axis;
            }
            _ => {
                leading = false;
                current.push(c);
            }
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '['".to_string());
    }
    if current.is_empty() {
        return Err("expression must end with a location step".to_string());
    }
    steps.push((axis, current));
    Ok(steps)
}

fn translate_step(step: &str) -> Result<String, String> {
    let name_end = step.find('[').unwrap_or(step.len());
    let name = step[..name_end].trim();
    let wildcard = name == "*";
    if !wildcard && !is_name(name) {
        return Err(format!("unsupported node test '{name}'"));
    }

    let mut compound = name.to_string();
    let mut rest = &step[name_end..];
    while !rest.is_empty() {
        let inner_end = closing_bracket(rest)
            .ok_or_else(|| format!("unbalanced predicate in '{step}'"))?;
        compound.push_str(&translate_predicate(&rest[1..inner_end], wildcard)?);
        rest = &rest[inner_end + 1..];
    }
    Ok(compound)
}

/// Index of the `]` matching the `[` at position 0.
fn closing_bracket(input: &str) -> Option<usize> {
    if !input.starts_with('[') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (index, c) in input.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn translate_predicate(predicate: &str, wildcard: bool) -> Result<String, String> {
    let predicate = predicate.trim();

    if let Ok(position) = predicate.parse::<usize>() {
        if position == 0 {
            return Err("positions start at 1".to_string());
        }
        return Ok(if wildcard {
            format!(":nth-child({position})")
        } else {
            format!(":nth-of-type({position})")
        });
    }

    if predicate == "last()" {
        return Ok(if wildcard {
            ":last-child".to_string()
        } else {
            ":last-of-type".to_string()
        });
    }

    for (function, operator) in [("contains(", "*="), ("starts-with(", "^=")] {
        if let Some(args) = predicate
            .strip_prefix(function)
            .and_then(|p| p.strip_suffix(')'))
        {
            let (attribute, literal) = args
                .split_once(',')
                .ok_or_else(|| format!("expected two arguments in '{predicate}'"))?;
            let name = attribute_name(attribute)?;
            let value = parse_literal(literal)?;
            return Ok(format!("[{name}{operator}{}]", css_string(&value)));
        }
    }

    if predicate.starts_with('@') {
        return match predicate.split_once('=') {
            Some((attribute, literal)) => {
                let name = attribute_name(attribute)?;
                let value = parse_literal(literal)?;
                Ok(format!("[{name}={}]", css_string(&value)))
            }
            None => Ok(format!("[{}]", attribute_name(predicate)?)),
        };
    }

    Err(format!("unsupported predicate '[{predicate}]'"))
}

fn attribute_name(raw: &str) -> Result<&str, String> {
    let raw = raw.trim();
    match raw.strip_prefix('@') {
        Some(name) if is_name(name) => Ok(name),
        _ => Err(format!("expected an attribute reference, found '{raw}'")),
    }
}

fn parse_literal(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('\'' | '"')), Some(close)) if open == close && raw.len() >= 2 => {
            Ok(raw[1..raw.len() - 1].to_string())
        }
        _ => Err(format!("expected a quoted string, found '{raw}'")),
    }
}

fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}
