/// Dotted field paths and partial updates against a board document.
///
/// A path such as `columns.col-1.cardIds` names one field of the document.
/// Segments are percent-encoded when rendered so ids containing `.` or `%`
/// survive the dotted form.
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::StoreError;

const SEGMENT: &AsciiSet = &CONTROLS.add(b'.').add(b'%');

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidPath(segments.join(".")));
        }
        Ok(Self(segments))
    }

    /// Top-level field.
    pub fn field(name: &str) -> Self {
        Self(vec![name.to_string()])
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// `true` if `self` is `other` or one of its ancestors.
    pub fn covers(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let segments = raw
            .split('.')
            .map(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .map(|d| d.into_owned())
                    .map_err(|_| StoreError::InvalidPath(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(segments).map_err(|_| StoreError::InvalidPath(raw.to_string()))
    }

    /// Value at this path, if every segment resolves.
    pub fn lookup<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |node, seg| node.get(seg))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", utf8_percent_encode(seg, SEGMENT))?;
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        FieldPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// New value for a path, or removal of the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchValue {
    Set(Value),
    Delete,
}

/// A partial-path write: only the named fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialUpdate {
    entries: BTreeMap<FieldPath, PatchValue>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: FieldPath, value: Value) -> &mut Self {
        self.entries.insert(path, PatchValue::Set(value));
        self
    }

    pub fn delete(&mut self, path: FieldPath) -> &mut Self {
        self.entries.insert(path, PatchValue::Delete);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &FieldPath) -> Option<&PatchValue> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &PatchValue)> {
        self.entries.iter()
    }

    /// Rendered paths, for logs and outcomes.
    pub fn path_strings(&self) -> Vec<String> {
        self.entries.keys().map(ToString::to_string).collect()
    }

    /// Reject updates where one path is nested inside another.
    pub fn check_disjoint(&self) -> Result<(), StoreError> {
        let paths: Vec<&FieldPath> = self.entries.keys().collect();
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                if a.covers(b) || b.covers(a) {
                    return Err(StoreError::Rejected(format!(
                        "overlapping paths '{}' and '{}'",
                        a, b
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply to a JSON document. Intermediate objects are created as needed.
    pub fn apply_to(&self, doc: &mut Value) -> Result<(), StoreError> {
        self.check_disjoint()?;
        for (path, value) in &self.entries {
            let (last, parents) = match path.segments().split_last() {
                Some(split) => split,
                None => return Err(StoreError::InvalidPath(path.to_string())),
            };

            let mut node = &mut *doc;
            for seg in parents {
                let obj = node.as_object_mut().ok_or_else(|| {
                    StoreError::Rejected(format!("'{}' crosses a non-object field", path))
                })?;
                node = obj
                    .entry(seg.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }

            let obj = node.as_object_mut().ok_or_else(|| {
                StoreError::Rejected(format!("'{}' crosses a non-object field", path))
            })?;
            match value {
                PatchValue::Set(v) => {
                    obj.insert(last.clone(), v.clone());
                }
                PatchValue::Delete => {
                    obj.remove(last);
                }
            }
        }
        Ok(())
    }
}
