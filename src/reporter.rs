/**
This module holds the `Report` value type: the immutable summary of an
evaluation run. Construction is the only mutation point; everything else is
read-only access and a dataframe-style `Display`. Equality is structural, so
golden-value regression tests can compare reports directly.
*/
use crate::matching::MatchingPolicy;
use crate::metrics::{
    macro_average, summarize_tallies, weighted_average, CorpusTally, DivByZeroStrat,
    EvaluationError, Tally,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display};

/// Precision/recall/F1 triple plus the support (count of tokens with a
/// non-empty gold set) it was computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub precision: f32,
    pub recall: f32,
    pub fscore: f32,
    pub support: usize,
}

impl Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.precision, self.recall, self.fscore, self.support
        )
    }
}

/// One missed token, kept for corpus debugging. Positions are 0-based within
/// the named corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissExample {
    corpus: String,
    position: usize,
    text: String,
}

impl MissExample {
    pub(crate) fn new<S: Into<String>>(corpus: S, position: usize, text: S) -> Self {
        Self {
            corpus: corpus.into(),
            position,
            text: text.into(),
        }
    }

    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Error raised when merging two reports that were not produced under the
/// same matching policy, tagset version and numeric configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatiblePolicyError {
    left: String,
    right: String,
}

impl Display for IncompatiblePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot merge reports produced under different configurations: `{}` vs `{}`",
            self.left, self.right
        )
    }
}
impl Error for IncompatiblePolicyError {}

/// The immutable result of one evaluation run (or of merged runs). Holds the
/// raw tallies, so reports over disjoint token partitions can be merged with
/// exact sums and the ratios recomputed at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    policy: MatchingPolicy,
    schema_version: String,
    zero_division: DivByZeroStrat,
    parallel: bool,
    max_miss_examples: usize,
    corpora: BTreeMap<String, CorpusTally>,
    misses: Vec<MissExample>,
    overall: ScoreSummary,
    overall_strict: ScoreSummary,
    overall_macro: ScoreSummary,
    overall_weighted: ScoreSummary,
    categories: BTreeMap<String, ScoreSummary>,
    per_corpus: BTreeMap<String, ScoreSummary>,
}

impl Report {
    pub(crate) fn build(
        policy: MatchingPolicy,
        schema_version: String,
        zero_division: DivByZeroStrat,
        parallel: bool,
        max_miss_examples: usize,
        corpora: BTreeMap<String, CorpusTally>,
        misses: Vec<MissExample>,
    ) -> Result<Self, EvaluationError> {
        let mut combined = CorpusTally::default();
        for corpus_tally in corpora.values() {
            combined.combine(corpus_tally);
        }
        // Categories with zero gold occurrences are omitted rather than
        // reported as 0/0; their predictions still count in the overall
        // precision denominator through the combined tally.
        let reported: Vec<(&String, &Tally)> = combined
            .categories
            .iter()
            .filter(|(_, tally)| tally.gold_tokens > 0)
            .collect();
        let category_tallies: Vec<&Tally> = reported.iter().map(|(_, tally)| *tally).collect();
        let category_summaries =
            summarize_tallies(&category_tallies, false, zero_division, parallel)?;
        let categories: BTreeMap<String, ScoreSummary> = reported
            .iter()
            .map(|(name, _)| (*name).clone())
            .zip(category_summaries.iter().copied())
            .collect();
        let overall = summarize_tallies(&[&combined.overall], false, zero_division, parallel)?[0];
        let overall_strict =
            summarize_tallies(&[&combined.overall], true, zero_division, parallel)?[0];
        let overall_macro = macro_average(&category_summaries);
        let overall_weighted = weighted_average(&category_summaries)?;
        let corpus_overalls: Vec<&Tally> = corpora.values().map(|c| &c.overall).collect();
        let corpus_summaries = summarize_tallies(&corpus_overalls, false, zero_division, parallel)?;
        let per_corpus: BTreeMap<String, ScoreSummary> = corpora
            .keys()
            .cloned()
            .zip(corpus_summaries.iter().copied())
            .collect();
        Ok(Self {
            policy,
            schema_version,
            zero_division,
            parallel,
            max_miss_examples,
            corpora,
            misses,
            overall,
            overall_strict,
            overall_macro,
            overall_weighted,
            categories,
            per_corpus,
        })
    }

    /// Combines two reports computed over disjoint token partitions of the
    /// same corpus, or over distinct corpora. Tallies are summed exactly and
    /// the ratios recomputed, so the result equals a single-pass evaluation
    /// of the concatenated input.
    pub fn merge(self, other: Report) -> Result<Report, EvaluationError> {
        if self.policy != other.policy
            || self.schema_version != other.schema_version
            || self.zero_division != other.zero_division
        {
            return Err(IncompatiblePolicyError {
                left: format!(
                    "{} / {} / {:?}",
                    self.policy, self.schema_version, self.zero_division
                ),
                right: format!(
                    "{} / {} / {:?}",
                    other.policy, other.schema_version, other.zero_division
                ),
            }
            .into());
        }
        let mut corpora = self.corpora;
        for (name, corpus_tally) in other.corpora {
            match corpora.get_mut(&name) {
                Some(existing) => existing.combine(&corpus_tally),
                None => {
                    corpora.insert(name, corpus_tally);
                }
            }
        }
        let mut misses = self.misses;
        misses.extend(other.misses);
        // Both inputs honored their own cap; the merged report honors the
        // receiver's.
        misses.truncate(self.max_miss_examples);
        Report::build(
            self.policy,
            self.schema_version,
            self.zero_division,
            self.parallel,
            self.max_miss_examples,
            corpora,
            misses,
        )
    }

    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Micro-averaged scores pooled over every token of every corpus.
    pub fn overall(&self) -> ScoreSummary {
        self.overall
    }

    /// Like `overall`, but ambiguous hits (matches on a non-primary gold
    /// tag) earn no credit.
    pub fn overall_strict(&self) -> ScoreSummary {
        self.overall_strict
    }

    /// Unweighted mean over the per-category scores.
    pub fn overall_macro(&self) -> ScoreSummary {
        self.overall_macro
    }

    /// Support-weighted mean over the per-category scores.
    pub fn overall_weighted(&self) -> ScoreSummary {
        self.overall_weighted
    }

    /// Scores per top-level tag segment, for categories that occur in the
    /// gold annotation.
    pub fn category_metrics(&self) -> &BTreeMap<String, ScoreSummary> {
        &self.categories
    }

    pub fn corpus_names(&self) -> impl Iterator<Item = &str> {
        self.per_corpus.keys().map(String::as_str)
    }

    pub fn corpus_metrics(&self, name: &str) -> Option<&ScoreSummary> {
        self.per_corpus.get(name)
    }

    pub fn miss_examples(&self) -> impl Iterator<Item = &MissExample> {
        self.misses.iter()
    }

    /// Count of tokens that matched a non-primary member of an ambiguous
    /// gold set.
    pub fn ambiguous_hits(&self) -> usize {
        self.corpora.values().map(|c| c.overall.ambiguous).sum()
    }

    /// Tokens with neither gold nor predicted tags, excluded from every
    /// denominator.
    pub fn unscored_tokens(&self) -> usize {
        self.corpora.values().map(|c| c.unscored_tokens).sum()
    }

    /// True when no token contributed to any denominator: the run evaluated
    /// an empty (or entirely untagged) corpus and every ratio is the
    /// zero-division placeholder.
    pub fn is_degenerate(&self) -> bool {
        self.corpora
            .values()
            .all(|c| c.overall.gold_tokens == 0 && c.overall.pred_tags == 0)
    }
}

/// The report acts as a dataframe when displayed: overall rows first, then
/// one row per category in ascending order.
impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        writeln!(f, "Overall_Micro, {}", self.overall)?;
        writeln!(f, "Overall_Strict, {}", self.overall_strict)?;
        writeln!(f, "Overall_Macro, {}", self.overall_macro)?;
        writeln!(f, "Overall_Weighted, {}", self.overall_weighted)?;
        for (name, summary) in &self.categories {
            writeln!(f, "{}, {}", name, summary)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::annotations_from_rows;
    use crate::config::EvalConfigBuilder;
    use crate::metrics::{evaluate, evaluate_rows, EvaluationError};
    use crate::tag::TagSchema;

    fn report(rows: Vec<(&'static str, &'static str, &'static str)>) -> Report {
        let config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::ExactOnly)
            .build();
        evaluate_rows("corpus", rows, &TagSchema::default(), &config).unwrap()
    }

    #[test]
    fn display_renders_a_dataframe() {
        let actual = report(vec![
            ("a", "A1", "A1"),
            ("b", "A1", "B2"),
            ("c", "B2", "B2"),
            ("d", "B2", "B2"),
        ]);
        let expected = "Class, Precision, Recall, Fscore, Support
Overall_Micro, 0.75, 0.75, 0.75, 4
Overall_Strict, 0.75, 0.75, 0.75, 4
Overall_Macro, 0.75, 0.75, 0.75, 4
Overall_Weighted, 0.75, 0.75, 0.75, 4
A1, 0.5, 0.5, 0.5, 2
B2, 1, 1, 1, 2\n";
        assert_eq!(actual.to_string(), expected);
    }

    #[test]
    fn structural_equality_for_identical_inputs() {
        let rows = vec![("a", "A1", "A1"), ("b", "B2", "C1")];
        assert_eq!(report(rows.clone()), report(rows));
    }

    #[test]
    fn merge_of_partitions_equals_whole_pass() {
        let schema = TagSchema::default();
        let config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::HierarchyWeighted)
            .build();
        let rows = vec![
            ("a", "A1.1.1", "A1.1.1"),
            ("b", "A1.2", "B2"),
            ("c", "B2", "B2"),
            ("d", "", "Z99"),
            ("e", "E2-", "E2-"),
        ];
        let annotations = annotations_from_rows(rows, &schema).unwrap();
        let whole = evaluate("corpus", annotations.clone(), &config).unwrap();
        // Split at an arbitrary boundary; token positions stay global, so the
        // merged report must be indistinguishable from the single pass.
        let (front, back) = annotations.split_at(2);
        let part_a = evaluate("corpus", front.to_vec(), &config).unwrap();
        let part_b = evaluate("corpus", back.to_vec(), &config).unwrap();
        let merged = part_a.merge(part_b).unwrap();
        assert_eq!(merged, whole);
    }

    #[test]
    fn merge_keeps_distinct_corpora_separate() {
        let config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::ExactOnly)
            .build();
        let schema = TagSchema::default();
        let first =
            evaluate_rows("first", vec![("a", "A1", "A1")], &schema, &config).unwrap();
        let second =
            evaluate_rows("second", vec![("b", "B2", "C1")], &schema, &config).unwrap();
        let merged = first.merge(second).unwrap();
        let names: Vec<_> = merged.corpus_names().collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(merged.corpus_metrics("first").unwrap().support, 1);
        assert!((merged.overall().precision - 0.5).abs() < 1e-6);
    }

    #[test]
    fn merge_respects_the_miss_example_cap() {
        let config = EvalConfigBuilder::default().max_miss_examples(1).build();
        let schema = TagSchema::default();
        let first = evaluate_rows(
            "first",
            vec![("a", "A1", "B2"), ("b", "A1", "B2")],
            &schema,
            &config,
        )
        .unwrap();
        assert_eq!(first.miss_examples().count(), 1);
        let second =
            evaluate_rows("second", vec![("c", "A1", "B2")], &schema, &config).unwrap();
        let merged = first.merge(second).unwrap();
        assert_eq!(merged.miss_examples().count(), 1);
    }

    #[test]
    fn merge_rejects_different_policies() {
        let schema = TagSchema::default();
        let exact_config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::ExactOnly)
            .build();
        let lenient_config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::AmbiguityTolerant)
            .build();
        let a = evaluate_rows("c", vec![("a", "A1", "A1")], &schema, &exact_config).unwrap();
        let b = evaluate_rows("c", vec![("b", "B2", "B2")], &schema, &lenient_config).unwrap();
        assert!(matches!(
            a.merge(b),
            Err(EvaluationError::IncompatiblePolicy(_))
        ));
    }
}
