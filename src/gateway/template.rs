//! `{name}` placeholder templates for tool paths and broadcast payloads.
//!
//! Templates are parsed once, at config load, into literal and placeholder
//! segments. Rendering is all-or-nothing: every placeholder must be present in
//! the parameter map or no string is produced.
//!
//! Tool paths go through [`Template::render_path`], which percent-encodes each
//! value so it stays inside one path segment. Broadcast payloads use
//! [`Template::render`] and keep values as-is.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed '{{' at byte {position} in template {template:?}")]
    Unclosed { template: String, position: usize },

    #[error("unmatched '}}' at byte {position} in template {template:?}")]
    StrayClose { template: String, position: usize },

    #[error("invalid placeholder name {name:?} in template {template:?}")]
    InvalidName { template: String, name: String },
}

/// A parameter the template needs but the request did not supply.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing parameter '{0}'")]
pub struct MissingParameter(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed {
                            template: source.to_string(),
                            position: pos,
                        });
                    }
                    if !is_valid_name(&name) {
                        return Err(TemplateError::InvalidName {
                            template: source.to_string(),
                            name,
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(TemplateError::StrayClose {
                        template: source.to_string(),
                        position: pos,
                    })
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder from `params`, values verbatim.
    ///
    /// Fails on the first placeholder (in template order) that `params` lacks.
    pub fn render(&self, params: &Map<String, Value>) -> Result<String, MissingParameter> {
        self.render_with(params, |value| value)
    }

    /// Like [`render`](Self::render), but every value is percent-encoded so
    /// `/`, `?`, `#` and friends cannot leave the segment it was placed in.
    pub fn render_path(&self, params: &Map<String, Value>) -> Result<String, MissingParameter> {
        self.render_with(params, |value| urlencoding::encode(&value).into_owned())
    }

    fn render_with(
        &self,
        params: &Map<String, Value>,
        encode: impl Fn(String) -> String,
    ) -> Result<String, MissingParameter> {
        if let Some(missing) = self.placeholders().find(|name| !params.contains_key(*name)) {
            return Err(MissingParameter(missing.to_string()));
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = params.get(name) {
                        out.push_str(&encode(stringify(value)));
                    }
                }
            }
        }
        Ok(out)
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Template::parse(&value)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text form of a parameter value: strings verbatim, everything else as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_mixed_scalars() {
        let t = Template::parse("/nodes/{id}/children/{depth}/{flag}").unwrap();
        let out = t
            .render(&params(json!({"id": "abc", "depth": 2, "flag": true})))
            .unwrap();
        assert_eq!(out, "/nodes/abc/children/2/true");
    }

    #[test]
    fn no_placeholders_renders_verbatim() {
        let t = Template::parse("/messages").unwrap();
        assert_eq!(t.placeholders().count(), 0);
        assert_eq!(t.render(&Map::new()).unwrap(), "/messages");
    }

    #[test]
    fn missing_parameter_is_named() {
        let t = Template::parse("{conversation_id}:{text}").unwrap();
        let err = t.render(&params(json!({"conversation_id": "c1"}))).unwrap_err();
        assert_eq!(err, MissingParameter("text".into()));
    }

    #[test]
    fn first_missing_in_template_order() {
        let t = Template::parse("/{a}/{b}").unwrap();
        let err = t.render(&Map::new()).unwrap_err();
        assert_eq!(err.0, "a");
    }

    #[test]
    fn repeated_placeholder_substitutes_everywhere() {
        let t = Template::parse("{x}-{x}").unwrap();
        assert_eq!(t.render(&params(json!({"x": 1.5}))).unwrap(), "1.5-1.5");
    }

    #[test]
    fn path_values_stay_in_one_segment() {
        let t = Template::parse("/nodes/{id}/children").unwrap();
        let out = t.render_path(&params(json!({"id": "a/b#c?d=1"}))).unwrap();
        assert_eq!(out, "/nodes/a%2Fb%23c%3Fd%3D1/children");
    }

    #[test]
    fn path_keeps_unreserved_and_encodes_json_values() {
        let t = Template::parse("/x/{a}/{b}").unwrap();
        let out = t
            .render_path(&params(json!({"a": "node-1_v2.~", "b": [1, 2]})))
            .unwrap();
        assert_eq!(out, "/x/node-1_v2.~/%5B1%2C2%5D");
    }

    #[test]
    fn payload_render_keeps_values_raw() {
        let t = Template::parse("{conversation_id}:{text}").unwrap();
        let out = t
            .render(&params(json!({"conversation_id": "c/1", "text": "a b#c"})))
            .unwrap();
        assert_eq!(out, "c/1:a b#c");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(matches!(
            Template::parse("/nodes/{id"),
            Err(TemplateError::Unclosed { position: 7, .. })
        ));
        assert!(matches!(
            Template::parse("/nodes/id}"),
            Err(TemplateError::StrayClose { .. })
        ));
        assert!(matches!(
            Template::parse("/nodes/{}"),
            Err(TemplateError::InvalidName { .. })
        ));
        assert!(matches!(
            Template::parse("/nodes/{a b}"),
            Err(TemplateError::InvalidName { .. })
        ));
    }

    #[test]
    fn deserializes_from_yaml_string() {
        let t: Template = serde_yaml::from_str("\"/nodes/{id}\"").unwrap();
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["id"]);
        assert!(serde_yaml::from_str::<Template>("\"/nodes/{id\"").is_err());
    }

    #[test]
    fn stringify_null_and_structures_as_json() {
        assert_eq!(stringify(&Value::Null), "null");
        assert_eq!(stringify(&json!([1, 2])), "[1,2]");
        assert_eq!(stringify(&json!("plain")), "plain");
    }
}
