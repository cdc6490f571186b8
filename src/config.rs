/*
 * This module contains the `EvalConfig` struct and its builder. A config
 * fixes everything about a run besides the corpus itself: matching policy,
 * tagset version, division-by-zero strategy and the parallel toggle. Reports
 * remember their config, so two runs can only be merged when these agree.
 */
use crate::matching::{MatchingPolicy, PolicyMismatchError};
use crate::metrics::DivByZeroStrat;
use crate::tag::TagSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

const DEFAULT_MAX_MISS_EXAMPLES: usize = 25;

/// Configuration of a single evaluation run. Built with
/// `EvalConfigBuilder`; the default configuration uses exact matching, the
/// default USAS tagset and scores 0 on empty denominators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    policy: MatchingPolicy,
    zero_division: DivByZeroStrat,
    /// Can we use multiple cores to compute the final score tables? The fold
    /// itself is single-pass either way; this only parallelizes the ratio
    /// arrays at the end.
    parallel: bool,
    /// How many missed tokens to retain as examples in the report.
    max_miss_examples: usize,
    schema: TagSchema,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfigBuilder::default().build()
    }
}

impl EvalConfig {
    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    pub fn zero_division(&self) -> DivByZeroStrat {
        self.zero_division
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn max_miss_examples(&self) -> usize {
        self.max_miss_examples
    }

    pub fn schema(&self) -> &TagSchema {
        &self.schema
    }

    /// Scores are meaningless when the corpus tags and the run configuration
    /// come from different tagset versions, so this is checked once per run,
    /// before any token is compared.
    pub fn check_schema(&self, parsed_under: &TagSchema) -> Result<(), PolicyMismatchError> {
        if self.schema.version() != parsed_under.version() {
            return Err(PolicyMismatchError::new(
                self.schema.version(),
                parsed_under.version(),
            ));
        }
        Ok(())
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Matching policy: {}\n Tagset version: {}\n Strategy when encountering a division by zero: {:?}\n Using parallel computations: {}\n Retained miss examples: {}",
            self.policy,
            self.schema.version(),
            self.zero_division,
            self.parallel,
            self.max_miss_examples
        )
    }
}

/// This builder can be used to build and customize an `EvalConfig`
/// structure.
#[derive(Clone, Debug)]
pub struct EvalConfigBuilder {
    policy: MatchingPolicy,
    zero_division: DivByZeroStrat,
    parallel: bool,
    max_miss_examples: usize,
    schema: TagSchema,
}

impl Default for EvalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalConfigBuilder {
    pub fn new() -> Self {
        Self {
            policy: MatchingPolicy::default(),
            zero_division: DivByZeroStrat::default(),
            parallel: false,
            max_miss_examples: DEFAULT_MAX_MISS_EXAMPLES,
            schema: TagSchema::default(),
        }
    }

    pub fn policy(mut self, policy: MatchingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn division_by_zero(mut self, division_by_zero: DivByZeroStrat) -> Self {
        self.zero_division = division_by_zero;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn max_miss_examples(mut self, max_miss_examples: usize) -> Self {
        self.max_miss_examples = max_miss_examples;
        self
    }

    pub fn schema(mut self, schema: TagSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn build(self) -> EvalConfig {
        EvalConfig {
            policy: self.policy,
            zero_division: self.zero_division,
            parallel: self.parallel,
            max_miss_examples: self.max_miss_examples,
            schema: self.schema,
        }
    }
}
