/**
This module folds per-token match outcomes into precision, recall and F1,
per category and overall. The fold is a pure monoid over `Tally` values:
associative and commutative over disjoint token partitions, so partial
aggregates computed by independent workers merge into the same report as a
single pass, exactly. Ratios are recomputed from the tallies only at the
end.
*/
use crate::annotation::TokenAnnotation;
use crate::config::EvalConfig;
use crate::matching::{compare, Credit, MatchOutcome, PolicyMismatchError};
use crate::reporter::{IncompatiblePolicyError, MissExample, Report, ScoreSummary};
use crate::tag::{MalformedTagError, TagSchema};
use ahash::HashMap as AHashMap;
use core::fmt;
use ndarray::{ArcArray, Array, Array1, ArrayViewMut, Dimension, Zip};
use ndarray_stats::errors::MultiInputError;
use ndarray_stats::SummaryStatisticsExt;
use num::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// How do we handle cases with a division by zero? The evaluation metrics
/// use `ReplaceBy0` by default: a category or run with an empty denominator
/// scores 0 rather than raising. `ReturnError` stops the computation and is
/// only useful when a zero denominator indicates broken input.
pub enum DivByZeroStrat {
    /// Replace denominator equal to `0` by `1` for the calculations
    ReplaceBy1,
    /// Returns an error
    ReturnError,
    /// Returns 0 when the denominator is 0
    ReplaceBy0,
}

impl Default for DivByZeroStrat {
    fn default() -> Self {
        Self::ReplaceBy0
    }
}

#[derive(Debug)]
pub struct ParsingDivisionByZeroStrategyError(String);

impl Display for ParsingDivisionByZeroStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse the {} into a `DivByZeroStrat`", self.0)
    }
}
impl Error for ParsingDivisionByZeroStrategyError {}

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby1" | "replacebyone" => Ok(DivByZeroStrat::ReplaceBy1),
            "replaceby0" | "replacebyzero" => Ok(DivByZeroStrat::ReplaceBy0),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivisionByZeroError;

impl Display for DivisionByZeroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encountered division by zero")
    }
}
impl Error for DivisionByZeroError {}

/// The additive state of the metrics fold. Credit sums are exact rationals,
/// so `combine` is exactly associative and commutative: results never depend
/// on worker count or partition boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Sum of per-token credit.
    pub(crate) credit: Credit,
    /// Credit sum excluding `AmbiguousHit` tokens, for the strict breakdown.
    pub(crate) strict_credit: Credit,
    /// Count of predicted tags (precision denominator). A token offering
    /// several tags contributes only its best credit to the numerator but
    /// every tag to the denominator, so spurious extras lower precision.
    pub(crate) pred_tags: usize,
    /// Count of tokens with a non-empty gold set (recall denominator).
    pub(crate) gold_tokens: usize,
    pub(crate) exact: usize,
    pub(crate) ambiguous: usize,
    pub(crate) partial: usize,
    pub(crate) miss: usize,
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            credit: Credit::zero(),
            strict_credit: Credit::zero(),
            pred_tags: 0,
            gold_tokens: 0,
            exact: 0,
            ambiguous: 0,
            partial: 0,
            miss: 0,
        }
    }
}

impl Tally {
    pub(crate) fn record(
        &mut self,
        outcome: MatchOutcome,
        credit: Credit,
        has_gold: bool,
        pred_tags: usize,
    ) {
        self.pred_tags += pred_tags;
        if has_gold {
            self.gold_tokens += 1;
        }
        self.credit += credit;
        match outcome {
            MatchOutcome::Exact => {
                self.exact += 1;
                self.strict_credit += credit;
            }
            MatchOutcome::HierarchicalPartial(_) => {
                self.partial += 1;
                self.strict_credit += credit;
            }
            MatchOutcome::AmbiguousHit => self.ambiguous += 1,
            MatchOutcome::Miss => self.miss += 1,
        }
    }

    pub(crate) fn combine(&mut self, other: &Tally) {
        self.credit += other.credit;
        self.strict_credit += other.strict_credit;
        self.pred_tags += other.pred_tags;
        self.gold_tokens += other.gold_tokens;
        self.exact += other.exact;
        self.ambiguous += other.ambiguous;
        self.partial += other.partial;
        self.miss += other.miss;
    }

    pub(crate) fn credit_f32(&self) -> f32 {
        ratio_to_f32(self.credit)
    }

    pub(crate) fn strict_credit_f32(&self) -> f32 {
        ratio_to_f32(self.strict_credit)
    }
}

fn ratio_to_f32(ratio: Credit) -> f32 {
    *ratio.numer() as f32 / *ratio.denom() as f32
}

/// Per-corpus aggregate: the overall tally plus one tally per top-level
/// category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusTally {
    pub(crate) overall: Tally,
    pub(crate) categories: BTreeMap<String, Tally>,
    /// Tokens with neither gold nor predicted tags, excluded from every
    /// denominator. Tracked so the exclusion is visible, not silent.
    pub(crate) unscored_tokens: usize,
}

impl CorpusTally {
    pub(crate) fn combine(&mut self, other: &CorpusTally) {
        self.overall.combine(&other.overall);
        for (category, tally) in &other.categories {
            self.categories
                .entry(category.clone())
                .or_default()
                .combine(tally);
        }
        self.unscored_tokens += other.unscored_tokens;
    }
}

/// Enum error encompassing the failures that can happen while evaluating a
/// corpus or merging reports.
#[derive(Debug, Clone)]
pub enum EvaluationError {
    MalformedTag(MalformedTagError),
    PolicyMismatch(PolicyMismatchError),
    IncompatiblePolicy(IncompatiblePolicyError),
    DivisionByZero(DivisionByZeroError),
    Input(MultiInputError),
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTag(err) => Display::fmt(err, f),
            Self::PolicyMismatch(err) => Display::fmt(err, f),
            Self::IncompatiblePolicy(err) => Display::fmt(err, f),
            Self::DivisionByZero(err) => Display::fmt(err, f),
            Self::Input(err) => Display::fmt(err, f),
        }
    }
}
impl Error for EvaluationError {}

impl From<MalformedTagError> for EvaluationError {
    fn from(value: MalformedTagError) -> Self {
        Self::MalformedTag(value)
    }
}
impl From<PolicyMismatchError> for EvaluationError {
    fn from(value: PolicyMismatchError) -> Self {
        Self::PolicyMismatch(value)
    }
}
impl From<IncompatiblePolicyError> for EvaluationError {
    fn from(value: IncompatiblePolicyError) -> Self {
        Self::IncompatiblePolicy(value)
    }
}
impl From<DivisionByZeroError> for EvaluationError {
    fn from(value: DivisionByZeroError) -> Self {
        Self::DivisionByZero(value)
    }
}
impl From<MultiInputError> for EvaluationError {
    fn from(value: MultiInputError) -> Self {
        Self::Input(value)
    }
}

/// The single entry point of the evaluation core. Folds a finite,
/// single-pass stream of token annotations into a `Report`, deterministic
/// for a given input and configuration. An empty stream produces a
/// degenerate report rather than an error.
pub fn evaluate<I>(
    corpus_name: &str,
    tokens: I,
    config: &EvalConfig,
) -> Result<Report, EvaluationError>
where
    I: IntoIterator<Item = TokenAnnotation>,
{
    let policy = config.policy();
    let mut overall = Tally::default();
    let mut categories: AHashMap<String, Tally> = AHashMap::default();
    let mut unscored_tokens = 0usize;
    let mut misses: Vec<MissExample> = Vec::new();
    for token in tokens {
        let comparison = match compare(token.gold(), token.predicted(), policy) {
            Some(comparison) => comparison,
            None => {
                unscored_tokens += 1;
                continue;
            }
        };
        let has_gold = !token.gold().is_empty();
        let pred_tags = token.predicted().len();
        overall.record(comparison.outcome, comparison.credit, has_gold, pred_tags);
        categories
            .entry(comparison.category.clone())
            .or_default()
            .record(comparison.outcome, comparison.credit, has_gold, pred_tags);
        if comparison.outcome == MatchOutcome::Miss && misses.len() < config.max_miss_examples() {
            misses.push(MissExample::new(corpus_name, token.position(), token.text()));
        }
    }
    let corpus_tally = CorpusTally {
        overall,
        categories: categories.into_iter().collect(),
        unscored_tokens,
    };
    let mut corpora = BTreeMap::new();
    corpora.insert(String::from(corpus_name), corpus_tally);
    Ok(Report::build(
        policy,
        config.schema().version().to_string(),
        config.zero_division(),
        config.parallel(),
        config.max_miss_examples(),
        corpora,
        misses,
    )?)
}

/// Convenience path for corpus parsers: checks the tagset version once for
/// the whole run, parses the raw `(text, gold, predicted)` rows into
/// annotations, then evaluates. The first malformed tag aborts the corpus
/// with its token position; no token of that corpus is scored.
pub fn evaluate_rows<'a, I>(
    corpus_name: &str,
    rows: I,
    parsed_under: &TagSchema,
    config: &EvalConfig,
) -> Result<Report, EvaluationError>
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    config.check_schema(parsed_under)?;
    let annotations = crate::annotation::annotations_from_rows(rows, parsed_under)?;
    evaluate(corpus_name, annotations, config)
}

/// Computes one `ScoreSummary` per tally, vectorized. `strict` swaps the
/// credit numerator for the one excluding ambiguous hits.
pub(crate) fn summarize_tallies(
    tallies: &[&Tally],
    strict: bool,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<Vec<ScoreSummary>, DivisionByZeroError> {
    if tallies.is_empty() {
        return Ok(Vec::new());
    }
    let credit: Array1<f32> = tallies
        .iter()
        .map(|t| {
            if strict {
                t.strict_credit_f32()
            } else {
                t.credit_f32()
            }
        })
        .collect();
    let mut pred: Array1<f32> = tallies.iter().map(|t| t.pred_tags as f32).collect();
    let mut gold: Array1<f32> = tallies.iter().map(|t| t.gold_tokens as f32).collect();
    let arc_credit = credit.to_shared();
    let precision = prf_divide(arc_credit.clone(), pred.view_mut(), parallel, zero_division)?;
    let recall = prf_divide(arc_credit, gold.view_mut(), parallel, zero_division)?;
    // F1 = 2PR / (P + R), guarded so that F1 = 0 exactly when P = R = 0.
    let denom = precision.clone() + recall.view();
    let denom_non_zero = if parallel {
        par_replace(denom, 0.0, 1.0)
    } else {
        replace(denom, 0.0, 1.0)
    };
    let fscore = 2.0 * precision.clone() * recall.view() / denom_non_zero;
    let summaries = itertools::multizip((
        precision.iter(),
        recall.iter(),
        fscore.iter(),
        tallies.iter(),
    ))
    .map(|(p, r, f, t)| ScoreSummary {
        precision: *p,
        recall: *r,
        fscore: *f,
        support: t.gold_tokens,
    })
    .collect();
    Ok(summaries)
}

/// Unweighted mean of per-category summaries (macro average). Not a
/// substitute for the micro overall: the macro average over-weights rare
/// categories, which is why both are reported.
pub(crate) fn macro_average(summaries: &[ScoreSummary]) -> ScoreSummary {
    if summaries.is_empty() {
        return ScoreSummary::default();
    }
    let precision: Array1<f32> = summaries.iter().map(|s| s.precision).collect();
    let recall: Array1<f32> = summaries.iter().map(|s| s.recall).collect();
    let fscore: Array1<f32> = summaries.iter().map(|s| s.fscore).collect();
    let support = summaries.iter().map(|s| s.support).sum();
    ScoreSummary {
        precision: precision.mean().unwrap_or(0.0),
        recall: recall.mean().unwrap_or(0.0),
        fscore: fscore.mean().unwrap_or(0.0),
        support,
    }
}

/// Support-weighted mean of per-category summaries.
pub(crate) fn weighted_average(
    summaries: &[ScoreSummary],
) -> Result<ScoreSummary, MultiInputError> {
    let support: usize = summaries.iter().map(|s| s.support).sum();
    if summaries.is_empty() || support == 0 {
        return Ok(ScoreSummary {
            support,
            ..ScoreSummary::default()
        });
    }
    let weights: Array1<f32> = summaries.iter().map(|s| s.support as f32).collect();
    let precision: Array1<f32> = summaries.iter().map(|s| s.precision).collect();
    let recall: Array1<f32> = summaries.iter().map(|s| s.recall).collect();
    let fscore: Array1<f32> = summaries.iter().map(|s| s.fscore).collect();
    Ok(ScoreSummary {
        precision: precision.weighted_mean(&weights)?,
        recall: recall.weighted_mean(&weights)?,
        fscore: fscore.weighted_mean(&weights)?,
        support,
    })
}

fn prf_divide<D: Dimension>(
    numerator: ArcArray<f32, D>,
    denominator: ArrayViewMut<f32, D>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> Result<ArcArray<f32, D>, DivisionByZeroError> {
    let (mut result, zero_mask) = if parallel {
        par_prf_divide_results_and_mask(numerator, denominator)
    } else {
        prf_divide_results_and_mask(numerator, denominator)
    };

    match zero_division {
        DivByZeroStrat::ReturnError => {
            if zero_mask.iter().any(|m| *m == 0.0) {
                Err(DivisionByZeroError)
            } else {
                Ok(result)
            }
        }
        DivByZeroStrat::ReplaceBy1 => {
            if parallel {
                result = par_replace(result, 0.0, 1.0);
            } else {
                result = replace(result, 0.0, 1.0);
            }
            Ok(result)
        }
        DivByZeroStrat::ReplaceBy0 => {
            let final_result = result * zero_mask;
            Ok(final_result)
        }
    }
}

/// This function computes the result in parallel. For a synchronous version,
/// see `prf_divide_results_and_mask`.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn par_prf_divide_results_and_mask<D: Dimension>(
    numerator: ArcArray<f32, D>,
    mut denominator: ArrayViewMut<f32, D>,
) -> (ArcArray<f32, D>, Array<f32, D>) {
    let zero_at_mask =
        Zip::from(&mut denominator).par_map_collect(|d| if *d == 0.0 { 0.0 } else { 1.0 });
    denominator.par_mapv_inplace(|v| if v == 0.0 { 1.0 } else { v });
    (numerator / denominator, zero_at_mask)
}

/// This function computes the result synchronously. For a parallel version,
/// see `par_prf_divide_results_and_mask`.
fn prf_divide_results_and_mask<D: Dimension>(
    numerator: ArcArray<f32, D>,
    mut denominator: ArrayViewMut<f32, D>,
) -> (ArcArray<f32, D>, Array<f32, D>) {
    let zero_at_mask =
        Zip::from(&mut denominator).map_collect(|d| if *d == 0.0 { 0.0 } else { 1.0 });
    denominator.mapv_inplace(|v| if v == 0.0 { 1.0 } else { v });
    (numerator / denominator, zero_at_mask)
}

/// Helper function to replace values from an array.
fn replace<D: Dimension>(
    mut array: ArcArray<f32, D>,
    replaced: f32,
    new_value: f32,
) -> ArcArray<f32, D> {
    array.mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Helper function to replace values from an array in parallel.
fn par_replace<D: Dimension>(
    mut array: ArcArray<f32, D>,
    replaced: f32,
    new_value: f32,
) -> ArcArray<f32, D> {
    array.par_mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalConfigBuilder;
    use crate::matching::MatchingPolicy;
    use crate::tag::TagSet;
    use ndarray::array;
    use rstest::rstest;

    fn config(policy: MatchingPolicy) -> EvalConfig {
        EvalConfigBuilder::default().policy(policy).build()
    }

    fn rows_report(rows: Vec<(&str, &str, &str)>, policy: MatchingPolicy) -> Report {
        evaluate_rows("test", rows, &TagSchema::default(), &config(policy)).unwrap()
    }

    #[test]
    fn tally_record_tracks_denominators_separately() {
        let mut tally = Tally::default();
        tally.record(MatchOutcome::Miss, Credit::zero(), false, 1);
        tally.record(MatchOutcome::Exact, Credit::new(1, 1), true, 2);
        assert_eq!(tally.pred_tags, 3);
        assert_eq!(tally.gold_tokens, 1);
        assert_eq!(tally.credit, Credit::new(1, 1));
    }

    #[test]
    fn tally_combine_is_field_wise_addition() {
        let mut a = Tally::default();
        a.record(
            MatchOutcome::HierarchicalPartial(2),
            Credit::new(2, 3),
            true,
            1,
        );
        let mut b = Tally::default();
        b.record(MatchOutcome::AmbiguousHit, Credit::new(1, 1), true, 1);
        let mut combined = a.clone();
        combined.combine(&b);
        assert_eq!(combined.credit, Credit::new(5, 3));
        assert_eq!(combined.strict_credit, Credit::new(2, 3));
        assert_eq!(combined.partial, 1);
        assert_eq!(combined.ambiguous, 1);
        assert_eq!(combined.gold_tokens, 2);
    }

    #[test]
    fn weighted_average_weights_by_support() {
        let summaries = [
            ScoreSummary {
                precision: 0.5,
                recall: 0.5,
                fscore: 0.5,
                support: 2,
            },
            ScoreSummary {
                precision: 1.0,
                recall: 1.0,
                fscore: 1.0,
                support: 1,
            },
        ];
        let weighted = weighted_average(&summaries).unwrap();
        assert!((weighted.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((weighted.recall - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(weighted.support, 3);
    }

    #[test]
    fn exact_only_full_agreement() {
        let report = rows_report(
            vec![("a", "A1.1.1", "A1.1.1"), ("b", "B2", "B2")],
            MatchingPolicy::ExactOnly,
        );
        let overall = report.overall();
        assert_eq!(overall.precision, 1.0);
        assert_eq!(overall.recall, 1.0);
        assert_eq!(overall.fscore, 1.0);
        assert_eq!(overall.support, 2);
    }

    #[test]
    fn hierarchy_weighted_partial_credit() {
        let report = rows_report(
            vec![("a", "A1.1.1", "A1.1.2")],
            MatchingPolicy::HierarchyWeighted,
        );
        let overall = report.overall();
        assert!((overall.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((overall.recall - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn spurious_prediction_lowers_precision_not_recall() {
        // Second token has no gold tags: precision denominator 2, recall 1.
        let report = rows_report(
            vec![("a", "A1", "A1"), ("b", "", "Z99")],
            MatchingPolicy::ExactOnly,
        );
        let overall = report.overall();
        assert!((overall.precision - 0.5).abs() < 1e-6);
        assert!((overall.recall - 1.0).abs() < 1e-6);
        assert_eq!(overall.support, 1);
    }

    #[test]
    fn extra_predicted_tags_are_charged_to_precision() {
        // The best predicted tag earns the credit, but every offered tag
        // counts in the precision denominator.
        let report = rows_report(vec![("a", "A1", "A1/B2/C3")], MatchingPolicy::ExactOnly);
        let overall = report.overall();
        assert!((overall.precision - 1.0 / 3.0).abs() < 1e-6);
        assert!((overall.recall - 1.0).abs() < 1e-6);
        assert_eq!(overall.support, 1);
    }

    #[test]
    fn missed_gold_lowers_recall_not_precision() {
        let report = rows_report(
            vec![("a", "A1", "A1"), ("b", "B2", "")],
            MatchingPolicy::ExactOnly,
        );
        let overall = report.overall();
        assert!((overall.precision - 1.0).abs() < 1e-6);
        assert!((overall.recall - 0.5).abs() < 1e-6);
    }

    #[test]
    fn tokens_without_any_tags_are_excluded_not_counted_correct() {
        let report = rows_report(
            vec![("a", "A1", "A1"), ("b", "", ""), ("c", "", "")],
            MatchingPolicy::ExactOnly,
        );
        let overall = report.overall();
        assert_eq!(overall.precision, 1.0);
        assert_eq!(overall.support, 1);
        assert_eq!(report.unscored_tokens(), 2);
    }

    #[test]
    fn empty_corpus_is_a_degenerate_report() {
        let report = evaluate(
            "empty",
            Vec::<TokenAnnotation>::new(),
            &config(MatchingPolicy::ExactOnly),
        )
        .unwrap();
        assert!(report.is_degenerate());
        let overall = report.overall();
        assert_eq!(overall.precision, 0.0);
        assert_eq!(overall.recall, 0.0);
        assert_eq!(overall.fscore, 0.0);
        assert_eq!(overall.support, 0);
    }

    #[test]
    fn malformed_tag_aborts_the_corpus() {
        let rows = vec![("a", "A1", "A1"), ("b", "totally/broken", "A1")];
        let err = evaluate_rows(
            "test",
            rows,
            &TagSchema::default(),
            &config(MatchingPolicy::ExactOnly),
        )
        .unwrap_err();
        match err {
            EvaluationError::MalformedTag(tag_err) => {
                assert_eq!(tag_err.position(), Some(1));
                assert_eq!(tag_err.raw(), "totally");
            }
            other => panic!("expected a malformed tag error, got {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_is_checked_once_per_run() {
        let rows = vec![("a", "A1", "A1")];
        let other_schema = TagSchema::new("usas-v2");
        let err = evaluate_rows(
            "test",
            rows,
            &other_schema,
            &config(MatchingPolicy::ExactOnly),
        )
        .unwrap_err();
        assert!(matches!(err, EvaluationError::PolicyMismatch(_)));
    }

    #[test]
    fn categories_with_zero_gold_occurrences_are_omitted() {
        let report = rows_report(
            vec![("a", "A1", "A1"), ("b", "", "Z99")],
            MatchingPolicy::ExactOnly,
        );
        let categories = report.category_metrics();
        assert!(categories.contains_key("A1"));
        assert!(!categories.contains_key("Z99"));
    }

    #[test]
    fn miss_examples_carry_position_and_text() {
        let report = rows_report(
            vec![("fine", "A1", "A1"), ("wrong", "B2", "C1")],
            MatchingPolicy::ExactOnly,
        );
        let misses: Vec<_> = report.miss_examples().collect();
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].position(), 1);
        assert_eq!(misses[0].text(), "wrong");
        assert_eq!(misses[0].corpus(), "test");
    }

    #[test]
    fn miss_examples_are_capped() {
        let config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::ExactOnly)
            .max_miss_examples(2)
            .build();
        let rows = (0..10).map(|_| ("w", "A1", "B2")).collect::<Vec<_>>();
        let report = evaluate_rows("test", rows, &TagSchema::default(), &config).unwrap();
        assert_eq!(report.miss_examples().count(), 2);
    }

    #[test]
    fn strict_overall_excludes_ambiguous_hits() {
        let report = rows_report(
            vec![("a", "A1.1.1/B2", "B2"), ("b", "C1", "C1")],
            MatchingPolicy::AmbiguityTolerant,
        );
        let lenient = report.overall();
        let strict = report.overall_strict();
        assert!((lenient.precision - 1.0).abs() < 1e-6);
        assert!((strict.precision - 0.5).abs() < 1e-6);
        assert_eq!(report.ambiguous_hits(), 1);
    }

    #[rstest]
    #[case(MatchingPolicy::ExactOnly)]
    #[case(MatchingPolicy::HierarchyWeighted)]
    #[case(MatchingPolicy::AmbiguityTolerant)]
    #[case(MatchingPolicy::HierarchyWeightedAmbiguityTolerant)]
    fn metrics_stay_in_unit_interval(#[case] policy: MatchingPolicy) {
        let rows = vec![
            ("a", "A1.1.1/B2", "A1.1.2"),
            ("b", "", "Z99"),
            ("c", "E2-", ""),
            ("d", "S7.1+", "S7.1+"),
            ("e", "X5.2", "B2/X5.2"),
        ];
        let report = rows_report(rows, policy);
        for summary in [
            report.overall(),
            report.overall_strict(),
            report.overall_macro(),
        ] {
            assert!((0.0..=1.0).contains(&summary.precision));
            assert!((0.0..=1.0).contains(&summary.recall));
            assert!((0.0..=1.0).contains(&summary.fscore));
        }
    }

    #[test]
    fn fscore_is_zero_exactly_when_both_are_zero() {
        let report = rows_report(vec![("a", "A1", "B2")], MatchingPolicy::ExactOnly);
        let overall = report.overall();
        assert_eq!(overall.precision, 0.0);
        assert_eq!(overall.recall, 0.0);
        assert_eq!(overall.fscore, 0.0);
    }

    #[test]
    fn division_by_zero_strategy_can_be_opted_into_error() {
        let config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::ExactOnly)
            .division_by_zero(DivByZeroStrat::ReturnError)
            .build();
        // A gold-empty token creates a zero recall denominator in its category.
        let rows = vec![("a", "", "Z99")];
        let res = evaluate_rows("test", rows, &TagSchema::default(), &config);
        assert!(matches!(res, Err(EvaluationError::DivisionByZero(_))));
    }

    #[test]
    fn test_prf_divide_results_and_mask() {
        let numerator = array![1., 2., 4., 5.].into_shared();
        let mut cloned = numerator.clone();
        let mut same_cloned = numerator.clone();
        let (div_result, zero_mask) =
            prf_divide_results_and_mask(numerator.clone(), same_cloned.view_mut());
        let (par_div_result, par_zero_mask) =
            par_prf_divide_results_and_mask(numerator, cloned.view_mut());
        assert_eq!(zero_mask, Array::ones(div_result.raw_dim()));
        assert_eq!(par_zero_mask, Array::ones(par_div_result.raw_dim()));
        assert_eq!(div_result, array![1., 1., 1., 1.].into_shared());
        assert_eq!(par_div_result, array![1., 1., 1., 1.].into_shared());
    }

    #[test]
    fn test_replace_0s_by_1s() {
        let to_be_replaced = array![1.0, 0.0, 0.0, -1.0, 100.0].to_shared();
        let synchronous_actual = replace(to_be_replaced.clone(), 0.0, 1.0);
        let parallel_actual = par_replace(to_be_replaced, 0.0, 1.0);
        let expected = array![1.0, 1.0, 1.0, -1.0, 100.0].into_shared();
        assert_eq!(synchronous_actual, expected);
        assert_eq!(parallel_actual, expected);
    }

    #[test]
    fn parallel_and_sequential_reports_agree() {
        let rows = vec![
            ("a", "A1.1.1/B2", "A1.1.2"),
            ("b", "", "Z99"),
            ("c", "E2-", "E2-"),
            ("d", "S7.1+", "S7.1"),
        ];
        let sequential = rows_report(
            rows.clone(),
            MatchingPolicy::HierarchyWeightedAmbiguityTolerant,
        );
        let parallel_config = EvalConfigBuilder::default()
            .policy(MatchingPolicy::HierarchyWeightedAmbiguityTolerant)
            .parallel(true)
            .build();
        let parallel =
            evaluate_rows("test", rows, &TagSchema::default(), &parallel_config).unwrap();
        assert_eq!(sequential.overall(), parallel.overall());
        assert_eq!(sequential.category_metrics(), parallel.category_metrics());
    }

    #[test]
    fn per_category_attribution_follows_the_gold_tag() {
        let report = rows_report(
            vec![
                ("a", "A1.1.1", "A1.1.1"),
                ("b", "A1.2", "B2"),
                ("c", "B2", "B2"),
            ],
            MatchingPolicy::ExactOnly,
        );
        let categories = report.category_metrics();
        let a1 = categories.get("A1").unwrap();
        assert_eq!(a1.support, 2);
        assert!((a1.recall - 0.5).abs() < 1e-6);
        let b2 = categories.get("B2").unwrap();
        assert_eq!(b2.support, 1);
        assert!((b2.recall - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unscored_tokens_alone_make_a_degenerate_report() {
        let tokens = vec![TokenAnnotation::new(
            0,
            "x",
            TagSet::empty(),
            TagSet::empty(),
        )];
        let report = evaluate("test", tokens, &config(MatchingPolicy::ExactOnly)).unwrap();
        assert!(report.is_degenerate());
        assert_eq!(report.unscored_tokens(), 1);
    }
}
