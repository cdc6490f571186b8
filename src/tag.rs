/*!
This module contains the USAS tag model: the `Tag` value object, the `TagSet`
grouping attached to a single token and the `TagSchema` describing which
tagset version the codes were parsed under.

A USAS code is a top-level category letter followed by dot-separated numeric
refinements, e.g. `A1.1.1`. The code may carry trailing markers: runs of `+`
or `-` for polarity, and the single-letter markers `m` (male), `f` (female),
`n` (neuter), `c` (antecedent), `%` and `@` (rarity). The literal `PUNCT`
(and the aliases `PUNC`, `-`, `.`, `,`, `!` used by some corpora) denotes
punctuation. Several codes joined by `/` form one ambiguity group, e.g.
`F2/O4.5`, of which the first listed code is the primary tag.
*/
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display};

/// Raw labels that some corpora use in the tag slot of punctuation tokens.
const PUNCTUATION_ALIASES: [&str; 6] = ["PUNCT", "PUNC", "-", ".", ",", "!"];

/// An immutable description of the tagset version the tags of a corpus were
/// expressed in. Two runs configured with different schemas must never be
/// compared or merged; the check happens once per run, not per token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSchema {
    version: String,
}

impl TagSchema {
    pub fn new<S: Into<String>>(version: S) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// The standard USAS tagset.
impl Default for TagSchema {
    fn default() -> Self {
        Self::new("usas")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum TagKind {
    Code { category: char, levels: Vec<u32> },
    Punctuation,
}

/// Auxiliary single-letter markers a USAS code can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagMarkers {
    pub male: bool,
    pub female: bool,
    pub neuter: bool,
    pub antecedent: bool,
    pub rarity_percent: bool,
    pub rarity_at: bool,
}

impl TagMarkers {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A single USAS tag. Immutable value object: created once by parsing, never
/// mutated. Equality and hashing cover the full parsed value, including the
/// polarity markers, so a `Tag` can be used as a set element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    kind: TagKind,
    positive_markers: u8,
    negative_markers: u8,
    markers: TagMarkers,
}

impl Tag {
    /// Parses a single USAS code such as `A1.1.1`, `E2-` or `S2mf`. The text
    /// must not contain the `/` ambiguity delimiter; use `TagSet::parse` for
    /// grouped codes.
    pub fn parse(raw: &str, _schema: &TagSchema) -> Result<Self, MalformedTagError> {
        let trimmed = raw.trim();
        if PUNCTUATION_ALIASES.contains(&trimmed) {
            return Ok(Self {
                kind: TagKind::Punctuation,
                positive_markers: 0,
                negative_markers: 0,
                markers: TagMarkers::default(),
            });
        }
        let mut chars = trimmed.chars().peekable();
        let category = match chars.next() {
            Some(c) if c.is_ascii_uppercase() => c,
            _ => return Err(MalformedTagError::new(raw)),
        };
        let mut levels = Vec::new();
        let first = take_number(&mut chars).ok_or_else(|| MalformedTagError::new(raw))?;
        levels.push(first);
        while chars.peek() == Some(&'.') {
            chars.next();
            let level = take_number(&mut chars).ok_or_else(|| MalformedTagError::new(raw))?;
            levels.push(level);
        }
        let mut positive_markers: u8 = 0;
        let mut negative_markers: u8 = 0;
        let mut markers = TagMarkers::default();
        for c in chars {
            match c {
                '+' => positive_markers += 1,
                '-' => negative_markers += 1,
                'm' => markers.male = true,
                'f' => markers.female = true,
                'n' => markers.neuter = true,
                'c' => markers.antecedent = true,
                '%' => markers.rarity_percent = true,
                '@' => markers.rarity_at = true,
                _ => return Err(MalformedTagError::new(raw)),
            }
        }
        Ok(Self {
            kind: TagKind::Code { category, levels },
            positive_markers,
            negative_markers,
            markers,
        })
    }

    /// Number of hierarchy segments: `A1.1.1` has depth 3, `Z5` depth 1.
    pub fn depth(&self) -> usize {
        match &self.kind {
            TagKind::Code { levels, .. } => levels.len(),
            TagKind::Punctuation => 1,
        }
    }

    /// Count of leading hierarchy segments equal between the two tags. The
    /// result is 0 when the top-level segments differ and is symmetric in
    /// its arguments.
    pub fn shared_prefix_depth(&self, other: &Tag) -> usize {
        match (&self.kind, &other.kind) {
            (TagKind::Punctuation, TagKind::Punctuation) => 1,
            (
                TagKind::Code {
                    category: cat_a,
                    levels: levels_a,
                },
                TagKind::Code {
                    category: cat_b,
                    levels: levels_b,
                },
            ) => {
                if cat_a != cat_b {
                    return 0;
                }
                let shared = levels_a
                    .iter()
                    .zip(levels_b.iter())
                    .take_while(|(a, b)| a == b)
                    .count();
                // The top-level segment is the category letter plus the
                // first number; they only match together.
                if shared == 0 {
                    0
                } else {
                    shared
                }
            }
            _ => 0,
        }
    }

    /// The top-level segment, e.g. `"A1"` for `A1.1.1` or `"PUNCT"`. Used as
    /// the per-category key in reports.
    pub fn top_level(&self) -> String {
        match &self.kind {
            TagKind::Code { category, levels } => format!("{}{}", category, levels[0]),
            TagKind::Punctuation => String::from("PUNCT"),
        }
    }

    /// `Z99` is the USAS bucket for words the tagger could not match.
    pub fn is_unmatched(&self) -> bool {
        matches!(&self.kind, TagKind::Code { category: 'Z', levels } if levels.as_slice() == [99])
    }

    pub fn is_punctuation(&self) -> bool {
        matches!(self.kind, TagKind::Punctuation)
    }

    /// Number of `+` polarity markers.
    pub fn positive_markers(&self) -> u8 {
        self.positive_markers
    }

    /// Number of `-` polarity markers.
    pub fn negative_markers(&self) -> u8 {
        self.negative_markers
    }

    pub fn markers(&self) -> &TagMarkers {
        &self.markers
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<u32> {
    let mut digits = String::new();
    while let Some(c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    digits.parse().ok()
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TagKind::Punctuation => write!(f, "PUNCT")?,
            TagKind::Code { category, levels } => {
                write!(f, "{}{}", category, levels[0])?;
                for level in &levels[1..] {
                    write!(f, ".{}", level)?;
                }
            }
        }
        for _ in 0..self.positive_markers {
            write!(f, "+")?;
        }
        for _ in 0..self.negative_markers {
            write!(f, "-")?;
        }
        if !self.markers.is_empty() {
            let flags = [
                (self.markers.male, 'm'),
                (self.markers.female, 'f'),
                (self.markers.neuter, 'n'),
                (self.markers.antecedent, 'c'),
                (self.markers.rarity_percent, '%'),
                (self.markers.rarity_at, '@'),
            ];
            for (set, c) in flags {
                if set {
                    write!(f, "{}", c)?;
                }
            }
        }
        Ok(())
    }
}

/// The tags attached to one token. The gold side of a corpus uses a multi-tag
/// set to express annotator ambiguity; the predicted side is normally a
/// singleton but is not required to be. The first listed tag is the primary
/// one. Absence of any tag is an explicit empty set, which is distinct from a
/// set containing only the `Z99` unmatched tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Builds a set from tags, keeping first occurrences and insertion order.
    pub fn new(tags: Vec<Tag>) -> Self {
        let mut deduped: Vec<Tag> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        Self { tags: deduped }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses an ambiguity group such as `F2/O4.5`. Whitespace-only input is
    /// the explicit empty set.
    pub fn parse(raw: &str, schema: &TagSchema) -> Result<Self, MalformedTagError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }
        let tags: Result<Vec<Tag>, MalformedTagError> = trimmed
            .split('/')
            .map(|code| Tag::parse(code, schema))
            .collect();
        Ok(Self::new(tags?))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// The first-listed tag, if any.
    pub fn primary(&self) -> Option<&Tag> {
        self.tags.first()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }
}

impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        Self { tags: vec![tag] }
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.tags {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}", tag)?;
            first = false;
        }
        Ok(())
    }
}

/// Splits the whitespace-separated output of the USAS tagger for a sequence
/// of tokens into one `TagSet` per token, e.g.
/// `"L1 E3- Z2/S2mf"` becomes three sets.
pub fn parse_tag_groups(text: &str, schema: &TagSchema) -> Result<Vec<TagSet>, MalformedTagError> {
    text.split_whitespace()
        .map(|group| TagSet::parse(group, schema))
        .collect()
}

/// Error raised when an input code cannot be parsed into the hierarchy
/// model. Never silently dropped: skipping a tag would bias the metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTagError {
    raw: String,
    position: Option<usize>,
}

impl MalformedTagError {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self {
            raw: raw.into(),
            position: None,
        }
    }

    /// Attaches the corpus position of the offending token.
    pub(crate) fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// The raw tag text that failed to parse.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The 0-based position of the token carrying the bad tag, when known.
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl Display for MalformedTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "Cannot parse `{}` (token position {}) as a USAS tag",
                self.raw, position
            ),
            None => write!(f, "Cannot parse `{}` as a USAS tag", self.raw),
        }
    }
}

impl Error for MalformedTagError {}
