use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigurationError, PatternError, UrlError};
use crate::sum::{SumType, SumTypeRegistry};

static SEGMENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid segment name regex"));

/// Default expansion for a placeholder without a rule.
pub const DEFAULT_SEGMENT_RULE: &str = "[^/]+";

/// Regular expression rule, kept with an anchored compiled copy for validation.
#[derive(Clone)]
pub struct RegexRule {
    source: String,
    anchored: Regex,
}

impl RegexRule {
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whole-value match against the rule.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

impl fmt::Debug for RegexRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexRule").field(&self.source).finish()
    }
}

/// Constraint attached to a placeholder.
#[derive(Debug, Clone)]
pub enum Rule {
    Regex(RegexRule),
    SumType(Arc<SumType>),
}

impl Rule {
    /// Whether `value` is a legal segment value.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Rule::Regex(rule) => rule.accepts(value),
            Rule::SumType(sum) => sum.match_segment(value).is_ok(),
        }
    }
}

pub type RuleMap = HashMap<String, Rule>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A route pattern after prefix joining and rule extraction.
///
/// `pattern` keeps placeholders as bare `{name}`; the rules live in the rule map.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: String,
    segments: Vec<Segment>,
    rules: RuleMap,
}

impl CompiledPattern {
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn rules(&self) -> &RuleMap {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `params` into the pattern, producing a concrete path.
    pub fn expand(&self, params: &[(&str, &str)]) -> Result<String, UrlError> {
        let mut out = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = params
                        .iter()
                        .rfind(|(k, _)| k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| UrlError::MissingParam(name.clone()))?;
                    let allowed = match self.rules.get(name) {
                        Some(rule) => rule.accepts(value),
                        None => !value.is_empty() && !value.contains('/'),
                    };
                    if !allowed {
                        return Err(UrlError::RuleViolation {
                            segment: name.clone(),
                            value: value.to_string(),
                        });
                    }
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(out)
    }
}

/// Join a route prefix and a pattern with exactly one slash between them.
///
/// An empty prefix and an empty pattern join to `/`.
#[must_use]
pub fn join_prefix(route_prefix: &str, pattern: &str) -> String {
    format!(
        "{}/{}",
        route_prefix.trim_end_matches('/'),
        pattern.trim_start_matches('/')
    )
}

/// Consume a balanced `{...}` body. `input` starts right after the opening brace.
///
/// Returns the body and the text following the matching `}`.
fn extract_braces(input: &str) -> Option<(&str, &str)> {
    let mut depth = 1usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&input[..idx], &input[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Compile `pattern` under `route_prefix`, resolving `<dotted.SumType>` rules against `sums`.
pub fn compile(
    pattern: &str,
    route_prefix: &str,
    sums: &SumTypeRegistry,
) -> Result<CompiledPattern, ConfigurationError> {
    let full = join_prefix(route_prefix, pattern);
    let mut segments = Vec::new();
    let mut rules = RuleMap::new();
    let mut normalized = String::with_capacity(full.len());
    let mut literal = String::new();
    let mut rest = full.as_str();

    while let Some(ch) = rest.chars().next() {
        match ch {
            '{' => {
                let (body, tail) =
                    extract_braces(&rest[1..]).ok_or_else(|| PatternError::UnexpectedEnd {
                        fragment: rest.to_string(),
                    })?;
                let fragment = &rest[..rest.len() - tail.len()];
                let (name, rule) = body.split_once(':').unwrap_or((body, ""));

                if !SEGMENT_NAME.is_match(name) {
                    return Err(PatternError::InvalidName {
                        name: name.to_string(),
                        fragment: fragment.to_string(),
                    }
                    .into());
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Placeholder(n) if n == name))
                {
                    return Err(PatternError::DuplicateName {
                        name: name.to_string(),
                        pattern: full.clone(),
                    }
                    .into());
                }
                if let Some(rule) = parse_rule(name, rule, sums)? {
                    rules.insert(name.to_string(), rule);
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
                normalized.push('{');
                normalized.push_str(name);
                normalized.push('}');
                rest = tail;
            }
            '}' => {
                return Err(PatternError::UnbalancedClose {
                    fragment: rest.to_string(),
                }
                .into())
            }
            _ => {
                literal.push(ch);
                normalized.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(CompiledPattern {
        pattern: normalized,
        segments,
        rules,
    })
}

fn parse_rule(
    segment: &str,
    expr: &str,
    sums: &SumTypeRegistry,
) -> Result<Option<Rule>, ConfigurationError> {
    if expr.is_empty() {
        return Ok(None);
    }
    if let Some(path) = expr.strip_prefix('<').and_then(|e| e.strip_suffix('>')) {
        let sum = sums
            .resolve(path)
            .ok_or_else(|| ConfigurationError::UnresolvedSumType {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
        if sum.literal_texts().is_empty() {
            return Err(ConfigurationError::SumTypeNotRoutable {
                path: path.to_string(),
            });
        }
        return Ok(Some(Rule::SumType(Arc::clone(sum))));
    }

    let anchored =
        Regex::new(&format!("^(?:{expr})$")).map_err(|e| ConfigurationError::InvalidRule {
            segment: segment.to_string(),
            rule: expr.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Some(Rule::Regex(RegexRule {
        source: expr.to_string(),
        anchored,
    })))
}

/// Expand a compiled pattern into the anchored regex the router matches with.
///
/// Every placeholder becomes a named capture group: a sum type rule is the
/// alternation of its variants' values, a regex rule is used as written, and a
/// bare placeholder matches one path segment.
#[must_use]
pub fn render_runtime_pattern(compiled: &CompiledPattern) -> String {
    let mut out = String::with_capacity(compiled.pattern.len() + 16);
    out.push('^');
    for segment in &compiled.segments {
        match segment {
            Segment::Literal(text) => out.push_str(&regex::escape(text)),
            Segment::Placeholder(name) => {
                let body = match compiled.rules.get(name) {
                    Some(Rule::Regex(rule)) => format!("(?:{})", rule.source),
                    Some(Rule::SumType(sum)) => {
                        let values: Vec<String> = sum
                            .literal_texts()
                            .iter()
                            .map(|t| regex::escape(t))
                            .collect();
                        format!("(?:{})", values.join("|"))
                    }
                    None => DEFAULT_SEGMENT_RULE.to_string(),
                };
                out.push_str("(?P<");
                out.push_str(name);
                out.push('>');
                out.push_str(&body);
                out.push(')');
            }
        }
    }
    out.push('$');
    out
}
