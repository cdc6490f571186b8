/*
 * One corpus position with its gold and predicted tag sets. Corpus parsers
 * build these; the evaluation core only ever reads them.
 */
use crate::tag::{MalformedTagError, TagSchema, TagSet};
use serde::{Deserialize, Serialize};

/// A single annotated token. `position` is 0-based and unique within a
/// corpus; insertion order is token order. Position order matters for
/// attributing misses to locations, not for the aggregate metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAnnotation {
    position: usize,
    text: String,
    gold: TagSet,
    predicted: TagSet,
}

impl TokenAnnotation {
    pub fn new<S: Into<String>>(position: usize, text: S, gold: TagSet, predicted: TagSet) -> Self {
        Self {
            position,
            text: text.into(),
            gold,
            predicted,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// The surface text of the token.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn gold(&self) -> &TagSet {
        &self.gold
    }

    pub fn predicted(&self) -> &TagSet {
        &self.predicted
    }
}

/// Builds positioned annotations from `(text, raw gold tags, raw predicted
/// tags)` rows, the handoff format of the corpus parsers. The first
/// malformed tag aborts the whole corpus with the offending position
/// attached; a corpus with a bad tag is invalid input and scoring any of its
/// tokens would overstate accuracy.
pub fn annotations_from_rows<'a, I>(
    rows: I,
    schema: &TagSchema,
) -> Result<Vec<TokenAnnotation>, MalformedTagError>
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    let mut annotations = Vec::new();
    for (position, (text, raw_gold, raw_pred)) in rows.into_iter().enumerate() {
        let gold = TagSet::parse(raw_gold, schema).map_err(|e| e.at(position))?;
        let predicted = TagSet::parse(raw_pred, schema).map_err(|e| e.at(position))?;
        annotations.push(TokenAnnotation::new(position, text, gold, predicted));
    }
    Ok(annotations)
}
