/*!
The comparison engine. Reduces one (gold `TagSet`, predicted `TagSet`) pair
to a single `MatchOutcome` and a credit value under a `MatchingPolicy`.

Credit is kept as an exact rational in `[0, 1]` rather than a float so that
aggregation over tokens is exactly associative: partial aggregates merged in
any order produce bit-identical reports.
*/
use crate::tag::TagSet;
use enum_iterator::Sequence;
use num::rational::Ratio;
use num::{One, Zero};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

/// Exact per-token credit in `[0, 1]`.
pub type Credit = Ratio<u64>;

/// How predicted tags are matched against gold tags. The policy is supplied
/// once per evaluation run and applied uniformly to every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize)]
pub enum MatchingPolicy {
    /// Only an exact tag hit counts as correct.
    ExactOnly,
    /// Partial credit by shared-prefix depth over the matched gold depth.
    HierarchyWeighted,
    /// Any member of an ambiguous gold set counts as correct; hits on a
    /// non-primary member are recorded as `AmbiguousHit`.
    AmbiguityTolerant,
    /// Both of the above.
    HierarchyWeightedAmbiguityTolerant,
}

impl MatchingPolicy {
    pub fn hierarchy_weighted(&self) -> bool {
        matches!(
            self,
            Self::HierarchyWeighted | Self::HierarchyWeightedAmbiguityTolerant
        )
    }

    pub fn ambiguity_tolerant(&self) -> bool {
        matches!(
            self,
            Self::AmbiguityTolerant | Self::HierarchyWeightedAmbiguityTolerant
        )
    }

    /// All recognized policies, in declaration order.
    pub fn all() -> impl Iterator<Item = MatchingPolicy> {
        enum_iterator::all::<MatchingPolicy>()
    }
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self::ExactOnly
    }
}

impl Display for MatchingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactOnly => "exact_only",
            Self::HierarchyWeighted => "hierarchy_weighted",
            Self::AmbiguityTolerant => "ambiguity_tolerant",
            Self::HierarchyWeightedAmbiguityTolerant => "hierarchy_weighted+ambiguity_tolerant",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingPolicyError(String);

impl Display for ParsingPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not parse the {} into a `MatchingPolicy`",
            self.0
        )
    }
}
impl Error for ParsingPolicyError {}

impl FromStr for MatchingPolicy {
    type Err = ParsingPolicyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact_only" | "exact" => Ok(Self::ExactOnly),
            "hierarchy_weighted" | "hierarchy" => Ok(Self::HierarchyWeighted),
            "ambiguity_tolerant" | "ambiguity" => Ok(Self::AmbiguityTolerant),
            "hierarchy_weighted+ambiguity_tolerant" | "ambiguity_tolerant+hierarchy_weighted" => {
                Ok(Self::HierarchyWeightedAmbiguityTolerant)
            }
            _ => Err(ParsingPolicyError(String::from(s))),
        }
    }
}

/// The match classification of one token under a given policy. Exactly one
/// outcome is produced per scoreable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// A predicted tag equals a gold tag, or is a full-credit hierarchical
    /// descendant of one under a hierarchy-weighted policy.
    Exact,
    /// A predicted tag shares the first `depth` segments with a gold tag
    /// without full credit.
    HierarchicalPartial(usize),
    /// The hit was on a member of a multi-tag gold set other than the
    /// primary tag.
    AmbiguousHit,
    /// No relation between the predicted and gold tags.
    Miss,
}

/// The result of comparing one token's tag sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenComparison {
    pub outcome: MatchOutcome,
    /// Credit in `[0, 1]` contributed to the precision/recall numerators.
    pub credit: Credit,
    /// Top-level segment of the matched gold tag, of the primary gold tag on
    /// a miss, or of the primary predicted tag when the gold set is empty.
    pub category: String,
}

/// Reduces one token's (gold, predicted) pair to an outcome and a credit.
/// Returns `None` when both sets are empty: such a token carries no taggable
/// content and must be excluded from every denominator rather than counted
/// as correct.
pub fn compare(gold: &TagSet, predicted: &TagSet, policy: MatchingPolicy) -> Option<TokenComparison> {
    match (gold.primary(), predicted.primary()) {
        (None, None) => None,
        (None, Some(pred_primary)) => Some(TokenComparison {
            outcome: MatchOutcome::Miss,
            credit: Credit::zero(),
            category: pred_primary.top_level(),
        }),
        (Some(gold_primary), None) => Some(TokenComparison {
            outcome: MatchOutcome::Miss,
            credit: Credit::zero(),
            category: gold_primary.top_level(),
        }),
        (Some(gold_primary), Some(_)) => {
            // Exact intersection first, preferring the primary gold tag so
            // that the classification is stable under gold-set reordering of
            // the non-primary members.
            if let Some((gold_index, matched)) = gold
                .iter()
                .enumerate()
                .find(|(_, gold_tag)| predicted.contains(gold_tag))
            {
                let outcome = if policy.ambiguity_tolerant() && gold_index != 0 {
                    MatchOutcome::AmbiguousHit
                } else {
                    MatchOutcome::Exact
                };
                return Some(TokenComparison {
                    outcome,
                    credit: Credit::one(),
                    category: matched.top_level(),
                });
            }
            if policy.hierarchy_weighted() {
                if let Some(hit) = best_hierarchical_hit(gold, predicted) {
                    let outcome = if hit.credit.is_one() {
                        if policy.ambiguity_tolerant() && hit.gold_index != 0 {
                            MatchOutcome::AmbiguousHit
                        } else {
                            MatchOutcome::Exact
                        }
                    } else {
                        MatchOutcome::HierarchicalPartial(hit.depth)
                    };
                    return Some(TokenComparison {
                        outcome,
                        credit: hit.credit,
                        category: hit.category,
                    });
                }
            }
            Some(TokenComparison {
                outcome: MatchOutcome::Miss,
                credit: Credit::zero(),
                category: gold_primary.top_level(),
            })
        }
    }
}

struct HierarchicalHit {
    credit: Credit,
    depth: usize,
    gold_index: usize,
    category: String,
}

/// Best shared-prefix match over every (predicted, gold) pair: a tagger is
/// not penalized here for also offering a correct tag alongside extras (the
/// aggregator charges extra tags through the precision denominator). Credit
/// is shared depth over the depth of the matched gold tag. Ties on credit
/// prefer the primary gold tag, then the deeper shared prefix.
fn best_hierarchical_hit(gold: &TagSet, predicted: &TagSet) -> Option<HierarchicalHit> {
    let mut best: Option<HierarchicalHit> = None;
    for predicted_tag in predicted.iter() {
        for (gold_index, gold_tag) in gold.iter().enumerate() {
            let depth = predicted_tag.shared_prefix_depth(gold_tag);
            if depth == 0 {
                continue;
            }
            let credit = Credit::new(depth as u64, gold_tag.depth() as u64);
            let better = match &best {
                None => true,
                Some(current) => {
                    credit > current.credit
                        || (credit == current.credit && gold_index < current.gold_index)
                        || (credit == current.credit
                            && gold_index == current.gold_index
                            && depth > current.depth)
                }
            };
            if better {
                best = Some(HierarchicalHit {
                    credit,
                    depth,
                    gold_index,
                    category: gold_tag.top_level(),
                });
            }
        }
    }
    best
}

/// Error raised when an evaluation run is configured with tags parsed under
/// a different tagset version than the run expects. Checked once per run,
/// never per token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMismatchError {
    expected: String,
    found: String,
}

impl PolicyMismatchError {
    pub(crate) fn new<S: Into<String>>(expected: S, found: S) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl Display for PolicyMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tagset version mismatch: the run is configured for `{}` but the corpus was parsed under `{}`",
            self.expected, self.found
        )
    }
}
impl Error for PolicyMismatchError {}
