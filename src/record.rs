//! Decoded records passed between readers and writers.
//!
//! The registry and pipeline never look inside a [`Record`]; each plugin
//! accepts the variants it can serialise and rejects the rest.

/// A biological sequence with optional canonical Phred qualities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Identifier (text up to the first whitespace of the header).
    pub id:          String,
    /// Rest of the header line, possibly empty.
    pub description: String,
    pub sequence:    Vec<u8>,
    /// One canonical Phred value per base, never encoded characters.
    pub quality:     Option<Vec<u8>>,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id:          id.into(),
            description: String::new(),
            sequence:    sequence.into(),
            quality:     None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<Vec<u8>>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// A tree kept in its Newick text form, terminating `;` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    pub newick: String,
}

impl TreeRecord {
    pub fn new(newick: impl Into<String>) -> Self {
        Self { newick: newick.into() }
    }
}

/// Square matrix of pairwise distances between labelled objects.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    pub ids:  Vec<String>,
    /// Row-major, `ids.len()` rows of `ids.len()` values.
    pub data: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    pub fn new(ids: Vec<String>, data: Vec<Vec<f64>>) -> Self {
        Self { ids, data }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.ids.iter().position(|id| id == a)?;
        let j = self.ids.iter().position(|id| id == b)?;
        Some(self.data[i][j])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Sequence(SequenceRecord),
    Tree(TreeRecord),
    Matrix(DistanceMatrix),
}

impl Record {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Sequence(_) => "sequence",
            Record::Tree(_)     => "tree",
            Record::Matrix(_)   => "distance matrix",
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceRecord> {
        match self {
            Record::Sequence(s) => Some(s),
            _                   => None,
        }
    }
}

impl From<SequenceRecord> for Record {
    fn from(r: SequenceRecord) -> Self { Record::Sequence(r) }
}

impl From<TreeRecord> for Record {
    fn from(r: TreeRecord) -> Self { Record::Tree(r) }
}

impl From<DistanceMatrix> for Record {
    fn from(r: DistanceMatrix) -> Self { Record::Matrix(r) }
}
