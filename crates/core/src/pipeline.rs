//! Stages and pipelines.
//!
//! Both are generic over the rule handle so the evaluator can store its
//! own prepared form (`Arc` of a rule plus whatever it caches) without the
//! core knowing about it.

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// How a stage decides whether it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Every rule's `when` must be true.
    All,
    /// At least one rule's `when` must be true.
    Either,
}

impl MatchPolicy {
    /// Decide a stage from its rules' `when` results. A stage without rules
    /// never matches.
    pub fn decide(self, results: &[bool]) -> bool {
        if results.is_empty() {
            return false;
        }
        match self {
            MatchPolicy::All => results.iter().all(|r| *r),
            MatchPolicy::Either => results.iter().any(|r| *r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stage<R> {
    pub number: i32,
    pub policy: MatchPolicy,
    pub rules: Vec<R>,
}

impl<R> Stage<R> {
    pub fn new(number: i32, policy: MatchPolicy, rules: Vec<R>) -> Self {
        Stage {
            number,
            policy,
            rules,
        }
    }
}

/// A named, immutable sequence of stages in ascending stage order.
#[derive(Debug, Clone)]
pub struct Pipeline<R> {
    id: String,
    name: String,
    stages: Vec<Stage<R>>,
}

impl<R> Pipeline<R> {
    /// Sorts the stages by number; two stages with the same number are a
    /// build error.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mut stages: Vec<Stage<R>>,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        stages.sort_by_key(|s| s.number);
        if let Some(pair) = stages.windows(2).find(|w| w[0].number == w[1].number) {
            return Err(BuildError::DuplicateStage {
                pipeline: name,
                stage: pair[0].number,
            });
        }
        Ok(Pipeline {
            id: id.into(),
            name,
            stages,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage<R>] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_sorted() {
        let p = Pipeline::new(
            "p1",
            "main",
            vec![
                Stage::new(10, MatchPolicy::All, vec!["b"]),
                Stage::new(-1, MatchPolicy::Either, vec!["a"]),
            ],
        )
        .unwrap();
        let numbers: Vec<i32> = p.stages().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![-1, 10]);
    }

    #[test]
    fn duplicate_stage_numbers_are_rejected() {
        let err = Pipeline::new(
            "p1",
            "main",
            vec![
                Stage::new(1, MatchPolicy::All, vec!["a"]),
                Stage::new(1, MatchPolicy::All, vec!["b"]),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateStage {
                pipeline: "main".to_string(),
                stage: 1
            }
        );
    }

    #[test]
    fn policies_decide() {
        assert!(MatchPolicy::All.decide(&[true, true]));
        assert!(!MatchPolicy::All.decide(&[true, false]));
        assert!(MatchPolicy::Either.decide(&[false, true]));
        assert!(!MatchPolicy::Either.decide(&[false, false]));
    }

    #[test]
    fn empty_stage_never_matches() {
        assert!(!MatchPolicy::All.decide(&[]));
        assert!(!MatchPolicy::Either.decide(&[]));
    }
}
