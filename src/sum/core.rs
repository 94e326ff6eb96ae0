use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::error::ConfigurationError;

static VARIANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][0-9A-Z_]*$").expect("valid variant name regex"));

static DOTTED_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid dotted path regex")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Errors raised when matching values against a [`SumType`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SumError {
    /// The offered value is not any variant's value.
    #[error("Variant value {value} is not a part of the type {sum_type}: {valid}")]
    Mismatch {
        sum_type: String,
        value: String,
        valid: String,
    },

    /// An inline match does not line up with the variant set.
    #[error("Pattern matching on {sum_type} is invalid: {fault}")]
    Pattern { sum_type: String, fault: PatternFault },

    /// A payload of the wrong type was offered to a value-carrying variant.
    #[error("Variant {variant} carries {expected}, got {found}")]
    PayloadType {
        variant: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl SumError {
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, SumError::Mismatch { .. })
    }
}

/// Why an inline match was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternFault {
    #[error("unknown variant {0:?}")]
    UnknownVariant(String),

    #[error("case {0:?} is listed more than once")]
    DuplicateCase(String),

    #[error("non-exhaustive cases, missing {}", .0.join(", "))]
    NonExhaustive(Vec<String>),
}

/// Primitive value carried by a literal variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
}

impl Literal {
    /// Text form used in URL segments and runtime patterns.
    ///
    /// Floats always keep a fractional part, so `Float(1.0)` is `"1.0"` and never
    /// collides with `Int(1)`.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            Literal::Str(s) => s.clone(),
            Literal::Int(i) => i.to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Float(f) => format!("{f:?}"),
        }
    }

    fn key(&self) -> Option<LiteralKey> {
        match self {
            Literal::Str(s) => Some(LiteralKey::Str(s.clone())),
            Literal::Int(i) => Some(LiteralKey::Int(*i)),
            Literal::Bool(b) => Some(LiteralKey::Bool(*b)),
            Literal::Float(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{s:?}"),
            other => f.write_str(&other.canonical_text()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(i64::from(value))
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// Payload type of a value-carrying variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// What a variant is identified by.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantTag {
    Literal(Literal),
    Type(TypeTag),
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantTag::Literal(lit) => lit.fmt(f),
            VariantTag::Type(tag) => write!(f, "<{}>", tag.name),
        }
    }
}

/// One member of a closed variant set.
///
/// Variants compare equal when they belong to the same sum type and share a name.
#[derive(Debug, Clone)]
pub struct Variant {
    sum_type: Arc<str>,
    name: Arc<str>,
    tag: VariantTag,
    ordinal: usize,
}

impl Variant {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn sum_type(&self) -> &str {
        &self.sum_type
    }

    #[must_use]
    pub fn tag(&self) -> &VariantTag {
        &self.tag
    }

    /// Literal value, `None` for value-carrying variants.
    #[must_use]
    pub fn value(&self) -> Option<&Literal> {
        match &self.tag {
            VariantTag::Literal(lit) => Some(lit),
            VariantTag::Type(_) => None,
        }
    }

    /// Position in declaration order.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Wrap `data` as an instance of this value-carrying variant.
    pub fn instance<T: Any + Send + Sync>(&self, data: T) -> Result<VariantInstance, SumError> {
        match &self.tag {
            VariantTag::Type(tag) if tag.id == TypeId::of::<T>() => Ok(VariantInstance {
                variant: self.clone(),
                data: Arc::new(data),
            }),
            VariantTag::Type(tag) => Err(SumError::PayloadType {
                variant: self.to_string(),
                expected: tag.name,
                found: std::any::type_name::<T>(),
            }),
            VariantTag::Literal(_) => Err(SumError::PayloadType {
                variant: self.to_string(),
                expected: "a literal value",
                found: std::any::type_name::<T>(),
            }),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.sum_type == other.sum_type && self.name == other.name
    }
}

impl Eq for Variant {}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sum_type, self.name)
    }
}

/// A value-carrying variant together with its payload.
#[derive(Clone)]
pub struct VariantInstance {
    variant: Variant,
    data: Arc<dyn Any + Send + Sync>,
}

impl VariantInstance {
    #[must_use]
    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    #[must_use]
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for VariantInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantInstance")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// Value offered to [`SumType::match_value`].
#[derive(Clone, Copy)]
pub enum Scrutinee<'a> {
    Str(&'a str),
    Int(i64),
    Bool(bool),
    Float(f64),
    Object(&'a (dyn Any + Send + Sync)),
}

impl<'a> Scrutinee<'a> {
    #[must_use]
    pub fn object<T: Any + Send + Sync>(value: &'a T) -> Self {
        Scrutinee::Object(value)
    }

    fn describe(&self) -> String {
        match self {
            Scrutinee::Str(s) => format!("{s:?}"),
            Scrutinee::Int(i) => i.to_string(),
            Scrutinee::Bool(b) => b.to_string(),
            Scrutinee::Float(f) => f.to_string(),
            Scrutinee::Object(_) => "<object>".to_string(),
        }
    }
}

impl<'a> From<&'a str> for Scrutinee<'a> {
    fn from(value: &'a str) -> Self {
        Scrutinee::Str(value)
    }
}

impl<'a> From<&'a String> for Scrutinee<'a> {
    fn from(value: &'a String) -> Self {
        Scrutinee::Str(value)
    }
}

impl From<i64> for Scrutinee<'_> {
    fn from(value: i64) -> Self {
        Scrutinee::Int(value)
    }
}

impl From<i32> for Scrutinee<'_> {
    fn from(value: i32) -> Self {
        Scrutinee::Int(i64::from(value))
    }
}

impl From<bool> for Scrutinee<'_> {
    fn from(value: bool) -> Self {
        Scrutinee::Bool(value)
    }
}

impl From<f64> for Scrutinee<'_> {
    fn from(value: f64) -> Self {
        Scrutinee::Float(value)
    }
}

impl<'a> From<&'a VariantInstance> for Scrutinee<'a> {
    fn from(value: &'a VariantInstance) -> Self {
        Scrutinee::Object(value.data.as_ref())
    }
}

/// A closed, exhaustively enumerable set of variants.
///
/// Built once through [`SumType::builder`] and shared by `Arc`. Matching follows
/// first-match-in-declaration-order semantics; primitive literals go through a
/// precomputed index, which is equivalent because literal values are unique.
pub struct SumType {
    path: Arc<str>,
    variants: Vec<Variant>,
    terms: Vec<String>,
    literal_index: HashMap<LiteralKey, usize>,
    text_index: HashMap<String, usize>,
    type_index: HashMap<TypeId, usize>,
}

impl SumType {
    pub fn builder(path: impl Into<String>) -> SumTypeBuilder {
        SumTypeBuilder {
            path: path.into(),
            variants: Vec::new(),
            terms: Vec::new(),
        }
    }

    /// Fully qualified dotted path, e.g. `solo.apps.accounts.AuthProvider`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the dotted path.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    #[must_use]
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name() == name)
    }

    #[must_use]
    pub fn contract_terms(&self) -> &[String] {
        &self.terms
    }

    /// Canonical texts of the literal variants, in declaration order, without duplicates.
    #[must_use]
    pub fn literal_texts(&self) -> Vec<String> {
        let mut out: Vec<(usize, String)> = self
            .text_index
            .iter()
            .map(|(text, idx)| (*idx, text.clone()))
            .collect();
        out.sort();
        out.into_iter().map(|(_, text)| text).collect()
    }

    /// Resolve a value to the first variant it matches.
    pub fn match_value<'a>(&self, value: impl Into<Scrutinee<'a>>) -> Result<&Variant, SumError> {
        let value = value.into();
        let found = match value {
            Scrutinee::Str(s) => self
                .literal_index
                .get(&LiteralKey::Str(s.to_string()))
                .copied(),
            Scrutinee::Int(i) => self.literal_index.get(&LiteralKey::Int(i)).copied(),
            Scrutinee::Bool(b) => self.literal_index.get(&LiteralKey::Bool(b)).copied(),
            Scrutinee::Float(f) => self.variants.iter().position(
                |v| matches!(v.tag, VariantTag::Literal(Literal::Float(x)) if x == f),
            ),
            Scrutinee::Object(obj) => self.type_index.get(&obj.type_id()).copied(),
        };
        match found {
            Some(idx) => Ok(&self.variants[idx]),
            None => Err(self.mismatch(value.describe())),
        }
    }

    /// Resolve the text of a URL segment to a literal variant.
    pub fn match_segment(&self, text: &str) -> Result<&Variant, SumError> {
        self.text_index
            .get(text)
            .map(|idx| &self.variants[*idx])
            .ok_or_else(|| self.mismatch(format!("{text:?}")))
    }

    /// Build an exhaustive matcher from `(variant name, arm)` pairs.
    ///
    /// Every variant must be covered exactly once; unknown names are rejected.
    pub fn inline_match<'s, S, F, I>(&'s self, cases: I) -> Result<InlineMatch<'s, F>, SumError>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, F)>,
    {
        let mut arms: Vec<Option<F>> = self.variants.iter().map(|_| None).collect();
        for (name, arm) in cases {
            let name = name.as_ref();
            let Some(variant) = self.variant(name) else {
                return Err(self.pattern_fault(PatternFault::UnknownVariant(name.to_string())));
            };
            let slot = &mut arms[variant.ordinal];
            if slot.is_some() {
                return Err(self.pattern_fault(PatternFault::DuplicateCase(name.to_string())));
            }
            *slot = Some(arm);
        }

        let missing: Vec<String> = self
            .variants
            .iter()
            .zip(&arms)
            .filter(|(_, arm)| arm.is_none())
            .map(|(v, _)| v.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(self.pattern_fault(PatternFault::NonExhaustive(missing)));
        }

        Ok(InlineMatch {
            sum: self,
            arms: arms.into_iter().flatten().collect(),
        })
    }

    fn mismatch(&self, value: String) -> SumError {
        let valid = self
            .variants
            .iter()
            .map(|v| format!("{} => {}", v.tag, v.name))
            .collect::<Vec<_>>()
            .join(", ");
        SumError::Mismatch {
            sum_type: self.path.to_string(),
            value,
            valid,
        }
    }

    fn pattern_fault(&self, fault: PatternFault) -> SumError {
        SumError::Pattern {
            sum_type: self.path.to_string(),
            fault,
        }
    }
}

impl fmt::Debug for SumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumType")
            .field("path", &self.path)
            .field(
                "variants",
                &self.variants.iter().map(Variant::name).collect::<Vec<_>>(),
            )
            .field("contract", &self.terms)
            .finish()
    }
}

/// Exhaustive dispatch table produced by [`SumType::inline_match`].
pub struct InlineMatch<'s, F> {
    sum: &'s SumType,
    arms: Vec<F>,
}

impl<F> InlineMatch<'_, F> {
    /// Arm for the variant `value` matches.
    pub fn resolve<'a>(&self, value: impl Into<Scrutinee<'a>>) -> Result<&F, SumError> {
        let variant = self.sum.match_value(value)?;
        Ok(&self.arms[variant.ordinal])
    }

    /// Arm for an already resolved variant of the same sum type.
    #[must_use]
    pub fn arm(&self, variant: &Variant) -> Option<&F> {
        if variant.sum_type() != self.sum.path() {
            return None;
        }
        self.arms.get(variant.ordinal)
    }
}

/// Declarative builder for [`SumType`].
#[derive(Debug)]
pub struct SumTypeBuilder {
    path: String,
    variants: Vec<(String, VariantTag)>,
    terms: Vec<String>,
}

impl SumTypeBuilder {
    /// Variant identified by a primitive literal.
    #[must_use]
    pub fn variant(mut self, name: &str, value: impl Into<Literal>) -> Self {
        self.variants
            .push((name.to_string(), VariantTag::Literal(value.into())));
        self
    }

    /// Short form: the value is the lowercased name.
    #[must_use]
    pub fn unit(mut self, name: &str) -> Self {
        let value = Literal::Str(name.to_lowercase());
        self.variants.push((name.to_string(), VariantTag::Literal(value)));
        self
    }

    /// Variant carrying a payload of type `T`.
    #[must_use]
    pub fn carrying<T: Any + Send + Sync>(mut self, name: &str) -> Self {
        self.variants
            .push((name.to_string(), VariantTag::Type(TypeTag::of::<T>())));
        self
    }

    /// Contract terms every variant must bind before the registry is built.
    #[must_use]
    pub fn contract<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Arc<SumType>, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidSumType {
            path: self.path.clone(),
            reason,
        };

        if !DOTTED_PATH.is_match(&self.path) {
            return Err(invalid("path must be a dotted identifier".to_string()));
        }
        if self.variants.is_empty() {
            return Err(invalid("at least one variant is required".to_string()));
        }

        let path: Arc<str> = Arc::from(self.path.as_str());
        let mut variants = Vec::with_capacity(self.variants.len());
        let mut literal_index = HashMap::new();
        let mut text_index = HashMap::new();
        let mut type_index = HashMap::new();
        let mut floats: Vec<f64> = Vec::new();

        for (ordinal, (name, tag)) in self.variants.iter().enumerate() {
            if !VARIANT_NAME.is_match(name) {
                return Err(invalid(format!(
                    "variant name {name:?} must match ^[A-Z][0-9A-Z_]*$"
                )));
            }
            if variants.iter().any(|v: &Variant| v.name() == name) {
                return Err(invalid(format!("variant {name:?} is declared twice")));
            }
            match tag {
                VariantTag::Literal(lit) => {
                    if let Some(key) = lit.key() {
                        if literal_index.insert(key, ordinal).is_some() {
                            return Err(invalid(format!("value {lit} is used by two variants")));
                        }
                    } else if let Literal::Float(f) = lit {
                        if floats.contains(f) {
                            return Err(invalid(format!("value {lit} is used by two variants")));
                        }
                        floats.push(*f);
                    }
                    text_index.entry(lit.canonical_text()).or_insert(ordinal);
                }
                VariantTag::Type(tt) => {
                    type_index.entry(tt.id).or_insert(ordinal);
                }
            }
            variants.push(Variant {
                sum_type: Arc::clone(&path),
                name: Arc::from(name.as_str()),
                tag: tag.clone(),
                ordinal,
            });
        }

        let mut terms: Vec<String> = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            if !IDENTIFIER.is_match(term) {
                return Err(invalid(format!("contract term {term:?} is not an identifier")));
            }
            if terms.contains(term) {
                return Err(invalid(format!("contract term {term:?} is declared twice")));
            }
            terms.push(term.clone());
        }

        Ok(Arc::new(SumType {
            path,
            variants,
            terms,
            literal_index,
            text_index,
            type_index,
        }))
    }
}
