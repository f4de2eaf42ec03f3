//! Label spaces and the dataset label mapping.
//!
//! Three encodings meet here:
//! - [`ModelCode`]: what the prediction backend emits. Fixed meaning
//!   (0 = negative, 1 = neutral, 2 = positive).
//! - [`DatasetCode`]: what an externally authored CSV contains. Its meaning is
//!   defined only through a [`LabelMapping`].
//! - [`SemanticClass`]: the canonical meaning both resolve to.
//!
//! Raw integers from either code space are never compared directly; compare
//! their resolved classes with [`labels_equal_by_concept`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of sentiment classes.
pub const NUM_CLASSES: usize = 3;

// ---------------------------------------------------------------------------
// Semantic classes
// ---------------------------------------------------------------------------

/// Canonical sentiment meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticClass {
    Negative,
    Neutral,
    Positive,
}

impl SemanticClass {
    pub const ALL: [SemanticClass; NUM_CLASSES] = [Self::Negative, Self::Neutral, Self::Positive];

    pub fn index(self) -> usize {
        match self {
            Self::Negative => 0,
            Self::Neutral => 1,
            Self::Positive => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }

    /// Case-insensitive parse of a class name (`negative`, `neg`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "negative" | "neg" => Some(Self::Negative),
            "neutral" | "neu" => Some(Self::Neutral),
            "positive" | "pos" => Some(Self::Positive),
            _ => None,
        }
    }
}

impl fmt::Display for SemanticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Code spaces
// ---------------------------------------------------------------------------

/// Parse a raw label cell. Only `0`, `1` and `2` are accepted; anything else
/// (including the empty string) is absent.
fn parse_code(s: &str) -> Option<u8> {
    match s.trim() {
        "0" => Some(0),
        "1" => Some(1),
        "2" => Some(2),
        _ => None,
    }
}

/// Integer label as it appears in an externally supplied file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DatasetCode(u8);

impl DatasetCode {
    pub const ALL: [DatasetCode; NUM_CLASSES] = [DatasetCode(0), DatasetCode(1), DatasetCode(2)];

    /// `None` when `raw` is outside `0..=2`.
    pub fn new(raw: i64) -> Option<Self> {
        (0..NUM_CLASSES as i64).contains(&raw).then(|| Self(raw as u8))
    }

    pub fn parse(s: &str) -> Option<Self> {
        parse_code(s).map(Self)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for DatasetCode {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw as i64).ok_or_else(|| format!("dataset code out of range: {raw}"))
    }
}

impl From<DatasetCode> for u8 {
    fn from(code: DatasetCode) -> u8 {
        code.0
    }
}

impl fmt::Display for DatasetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer label emitted by the prediction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ModelCode(u8);

impl ModelCode {
    pub fn new(raw: i64) -> Option<Self> {
        (0..NUM_CLASSES as i64).contains(&raw).then(|| Self(raw as u8))
    }

    pub fn parse(s: &str) -> Option<Self> {
        parse_code(s).map(Self)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Fixed identity: 0 = negative, 1 = neutral, 2 = positive.
    pub fn to_semantic_class(self) -> SemanticClass {
        match self.0 {
            0 => SemanticClass::Negative,
            1 => SemanticClass::Neutral,
            _ => SemanticClass::Positive,
        }
    }
}

impl TryFrom<u8> for ModelCode {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw as i64).ok_or_else(|| format!("model code out of range: {raw}"))
    }
}

impl From<ModelCode> for u8 {
    fn from(code: ModelCode) -> u8 {
        code.0
    }
}

impl fmt::Display for ModelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve a raw backend integer through the fixed model identity.
pub fn from_model_code(raw: i64) -> Option<SemanticClass> {
    ModelCode::new(raw).map(ModelCode::to_semantic_class)
}

// ---------------------------------------------------------------------------
// Label mapping
// ---------------------------------------------------------------------------

/// Mapping from [`DatasetCode`] to [`SemanticClass`].
///
/// Every mutation goes through [`LabelMapping::set`], which swaps the
/// displaced class onto the code that previously held the target class, so a
/// bijective mapping stays bijective. A mapping read from persisted state via
/// [`LabelMapping::normalize`] is not re-validated; see
/// [`LabelMapping::is_bijective`] and [`LabelMapping::repaired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PartialLabelMapping", into = "PartialLabelMapping")]
pub struct LabelMapping {
    classes: [SemanticClass; NUM_CLASSES],
}

impl Default for LabelMapping {
    fn default() -> Self {
        Self {
            classes: SemanticClass::ALL,
        }
    }
}

impl LabelMapping {
    /// Build from explicit entries for codes 0, 1 and 2. No validation.
    pub fn from_classes(classes: [SemanticClass; NUM_CLASSES]) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> [SemanticClass; NUM_CLASSES] {
        self.classes
    }

    pub fn to_semantic_class(&self, code: DatasetCode) -> SemanticClass {
        self.classes[code.slot()]
    }

    /// Resolve a raw dataset integer; `None` when it is not a valid code.
    pub fn resolve(&self, raw: i64) -> Option<SemanticClass> {
        DatasetCode::new(raw).map(|code| self.to_semantic_class(code))
    }

    /// Inverse lookup. Falls back to the class's own index when no code maps
    /// to `class`, which only happens for a malformed mapping.
    pub fn to_dataset_code(&self, class: SemanticClass) -> DatasetCode {
        self.classes
            .iter()
            .position(|c| *c == class)
            .map(|slot| DatasetCode(slot as u8))
            .unwrap_or(DatasetCode(class.index() as u8))
    }

    /// Map `code` to `class`, moving the displaced class onto whichever code
    /// held `class` before.
    pub fn set(&self, code: DatasetCode, class: SemanticClass) -> Self {
        let mut next = *self;
        let displaced = self.classes[code.slot()];
        if displaced == class {
            return next;
        }
        if let Some(other) = self.classes.iter().position(|c| *c == class) {
            next.classes[other] = displaced;
        }
        next.classes[code.slot()] = class;
        next
    }

    /// Fill missing entries of a partially specified mapping with the identity
    /// default for that key.
    pub fn normalize(partial: &PartialLabelMapping) -> Self {
        let defaults = SemanticClass::ALL;
        Self {
            classes: [
                partial.zero.unwrap_or(defaults[0]),
                partial.one.unwrap_or(defaults[1]),
                partial.two.unwrap_or(defaults[2]),
            ],
        }
    }

    pub fn is_bijective(&self) -> bool {
        let mut seen = [false; NUM_CLASSES];
        for class in self.classes {
            if std::mem::replace(&mut seen[class.index()], true) {
                return false;
            }
        }
        true
    }

    /// Return a bijective mapping that keeps as many entries as possible.
    ///
    /// Codes are visited in ascending order; the first code to claim a class
    /// keeps it, later colliding codes receive the unused classes in ascending
    /// class order.
    pub fn repaired(&self) -> Self {
        if self.is_bijective() {
            return *self;
        }
        let mut used = [false; NUM_CLASSES];
        let mut slots: [Option<SemanticClass>; NUM_CLASSES] = [None; NUM_CLASSES];
        for (slot, class) in self.classes.iter().enumerate() {
            if !used[class.index()] {
                used[class.index()] = true;
                slots[slot] = Some(*class);
            }
        }
        let mut unused = SemanticClass::ALL
            .into_iter()
            .filter(|c| !used[c.index()]);
        let mut classes = self.classes;
        for (slot, resolved) in slots.iter().enumerate() {
            classes[slot] = match resolved {
                Some(class) => *class,
                None => unused.next().unwrap_or(SemanticClass::ALL[slot]),
            };
        }
        Self { classes }
    }

    /// `(code, class)` pairs in code order.
    pub fn entries(&self) -> impl Iterator<Item = (DatasetCode, SemanticClass)> + '_ {
        DatasetCode::ALL
            .into_iter()
            .map(move |code| (code, self.to_semantic_class(code)))
    }
}

/// Persisted shape of a [`LabelMapping`]: `{"0": "negative", ...}` with any
/// key allowed to be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialLabelMapping {
    #[serde(rename = "0", default, skip_serializing_if = "Option::is_none")]
    pub zero: Option<SemanticClass>,
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    pub one: Option<SemanticClass>,
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    pub two: Option<SemanticClass>,
}

impl From<PartialLabelMapping> for LabelMapping {
    fn from(partial: PartialLabelMapping) -> Self {
        LabelMapping::normalize(&partial)
    }
}

impl From<LabelMapping> for PartialLabelMapping {
    fn from(mapping: LabelMapping) -> Self {
        let [zero, one, two] = mapping.classes;
        Self {
            zero: Some(zero),
            one: Some(one),
            two: Some(two),
        }
    }
}

/// Compare a dataset label with a model label by meaning.
///
/// True only when both resolve to a class and the classes are identical.
pub fn labels_equal_by_concept(
    dataset_raw: Option<i64>,
    model_raw: Option<i64>,
    mapping: &LabelMapping,
) -> bool {
    match (
        dataset_raw.and_then(|raw| mapping.resolve(raw)),
        model_raw.and_then(from_model_code),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
