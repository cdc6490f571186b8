/*!
This library evaluates semantic taggers that emit USAS tags. It compares a
gold-annotated corpus against a tagger's predictions and computes precision,
recall and F1, overall and per top-level category, with configurable credit
for near misses.

# TAGS
A USAS tag is a category letter followed by dot-separated numeric levels,
for instance `A1.1.1` (general actions, making) or `O4.3` (colour). Deeper
levels refine their parent, so `A1.1.1` is a descendant of `A1.1` and `A1`.
Tags may carry polarity runs (`E2-`, `A5.1++`) and lexical markers (`S2.1m`,
`A10%`); punctuation is written `PUNCT` (the aliases `PUNC`, `-`, `.`, `,`
and `!` normalize to it) and `Z99` marks a word the tagger could not match.
A token may be annotated with several candidate tags joined by `/`, such as
`F2/O4.5`; the first member is the primary tag.

# MATCHING POLICIES
The credit a predicted tag earns against a gold set depends on the
`MatchingPolicy` of the run:
* `ExactOnly`: full credit when a predicted tag equals any member of the
    gold set, nothing otherwise.
* `HierarchyWeighted`: when there is no exact hit, an ancestor or
    descendant of a gold tag earns partial credit proportional to the
    shared prefix depth.
* `AmbiguityTolerant`: the same intersection test, but a hit on a
    non-primary member of the gold set is flagged `AmbiguousHit` and feeds
    a separate strict breakdown without changing the credit.
* `HierarchyWeightedAmbiguityTolerant`: both relaxations at once.

# Terminology
* A token is one corpus position: its surface text, a gold tag set and a
    predicted tag set.
* A category is the top-level segment of a tag, such as `A1` for `A1.1.1`.
    Per-category scores are keyed by the gold primary tag's category.
* A corpus is a named, ordered list of tokens. Reports over disjoint parts
    of a corpus can be merged and are identical to a single pass over the
    whole.
*/

mod annotation;
mod config;
mod matching;
mod metrics;
mod reporter;
mod tag;

// The public api starts here
pub use tag::{parse_tag_groups, MalformedTagError, Tag, TagMarkers, TagSchema, TagSet};

pub use annotation::{annotations_from_rows, TokenAnnotation};

pub use matching::{
    compare, Credit, MatchOutcome, MatchingPolicy, ParsingPolicyError, PolicyMismatchError,
    TokenComparison,
};

pub use metrics::{
    evaluate, evaluate_rows, DivByZeroStrat, DivisionByZeroError, EvaluationError,
    ParsingDivisionByZeroStrategyError,
};

pub use reporter::{IncompatiblePolicyError, MissExample, Report, ScoreSummary};

pub use config::{EvalConfig, EvalConfigBuilder};

/// Evaluates a tagger's output against gold annotations, starting from raw
/// `(text, gold tags, predicted tags)` rows. The returned `Report` holds the
/// overall and per-category scores and can be prettyprinted or merged with
/// reports over other parts of the corpus.
///
/// #Example
/// ```rust
/// use usasev::{evaluation_report, EvalConfigBuilder, MatchingPolicy};
///
/// let rows = vec![
///     ("ground", "A1.1.1", "A1.1.1"),
///     ("dust", "O4.1.1.1", "O4.1"),
///     (",", "PUNCT", "PUNCT"),
///     ("of", "Z5", "Z5"),
/// ];
/// let config = EvalConfigBuilder::default()
///     .policy(MatchingPolicy::HierarchyWeighted)
///     .build();
///
/// let report = evaluation_report("demo", rows, &config).unwrap();
/// let expected_report = "Class, Precision, Recall, Fscore, Support
/// Overall_Micro, 0.875, 0.875, 0.875, 4
/// Overall_Strict, 0.875, 0.875, 0.875, 4
/// Overall_Macro, 0.875, 0.875, 0.875, 4
/// Overall_Weighted, 0.875, 0.875, 0.875, 4
/// A1, 1, 1, 1, 1
/// O4, 0.5, 0.5, 0.5, 1
/// PUNCT, 1, 1, 1, 1
/// Z5, 1, 1, 1, 1\n";
///
/// assert_eq!(expected_report, report.to_string());
/// ```
pub fn evaluation_report(
    corpus_name: &str,
    rows: Vec<(&str, &str, &str)>,
    config: &EvalConfig,
) -> Result<Report, EvaluationError> {
    evaluate_rows(corpus_name, rows, config.schema(), config)
}
