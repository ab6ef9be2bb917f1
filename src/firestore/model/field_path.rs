use std::fmt::{Display, Formatter};

use crate::firestore::constants::DOCUMENT_ID_FIELD;
use crate::firestore::error::{malformed_path, FirestoreResult};

/// Ordered list of field name components addressing a value inside a document.
///
/// Ordering is component-wise, which is the order used for field masks and transforms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<S, I>(segments: I) -> FirestoreResult<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(malformed_path("FieldPath must contain at least one segment"));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(malformed_path(format!(
                "FieldPath {segments:?} contains an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    /// Parses a dotted field path such as `a.b.c` or ``a.`b.c`.d``.
    ///
    /// Back-tick quoted segments may contain any character; `\` escapes the next
    /// character inside quotes. Outside quotes `~ * / [ ]` are rejected.
    pub fn from_dot_separated(path: &str) -> FirestoreResult<Self> {
        if path.is_empty() {
            return Err(malformed_path("FieldPath string cannot be empty"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut chars = path.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' if quoted => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => {
                        return Err(malformed_path(format!(
                            "Trailing escape character in field path {path:?}"
                        )))
                    }
                },
                '`' => quoted = !quoted,
                '.' if !quoted => {
                    if current.is_empty() {
                        return Err(malformed_path(format!(
                            "Field path {path:?} contains an empty segment"
                        )));
                    }
                    segments.push(std::mem::take(&mut current));
                }
                '~' | '*' | '/' | '[' | ']' if !quoted => {
                    return Err(malformed_path(format!(
                        "Invalid character '{ch}' in field path {path:?}; quote the segment with back-ticks"
                    )));
                }
                _ => current.push(ch),
            }
        }

        if quoted {
            return Err(malformed_path(format!("Unterminated back-tick in field path {path:?}")));
        }
        if current.is_empty() {
            return Err(malformed_path(format!(
                "Field path {path:?} contains an empty segment"
            )));
        }
        segments.push(current);
        Ok(Self { segments })
    }

    pub fn document_id() -> Self {
        Self {
            segments: vec![DOCUMENT_ID_FIELD.to_string()],
        }
    }

    pub fn is_document_id(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == DOCUMENT_ID_FIELD
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Returns the path with `segment` appended. The segment is taken literally.
    pub fn child(&self, segment: impl Into<String>) -> FirestoreResult<Self> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// True when `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(other.segments.iter()).all(|(l, r)| l == r)
    }

    /// Dotted rendering used in field masks and transforms.
    pub fn canonical_string(&self) -> String {
        self.segments
            .iter()
            .map(|segment| quote_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn quote_segment(segment: &str) -> String {
    if is_simple_segment(segment) {
        return segment.to_string();
    }
    let mut quoted = String::with_capacity(segment.len() + 2);
    quoted.push('`');
    for ch in segment.chars() {
        if ch == '`' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}

/// Trait that converts common user inputs into a validated [`FieldPath`].
pub trait IntoFieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        Ok(self)
    }
}

impl<'a> IntoFieldPath for &'a FieldPath {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for String {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        FieldPath::from_dot_separated(&self)
    }
}

impl<'a> IntoFieldPath for &'a str {
    fn into_field_path(self) -> FirestoreResult<FieldPath> {
        FieldPath::from_dot_separated(self)
    }
}
