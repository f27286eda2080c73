use std::fmt;

use crate::{
    error::{OrchestratorError, PreconditionKind},
    models::RecommendationRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Popular,
    Content,
    Item,
    Collaborative,
    Hybrid,
}

/// Immutable description of one recommendation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySpec {
    pub kind: StrategyKind,
    pub name: &'static str,
    /// Needs `subject.user_id`
    pub requires_auth: bool,
    /// Needs `subject.movie_id`
    pub requires_subject_item: bool,
    pub description: &'static str,
}

impl fmt::Display for StrategySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The fixed registry. Names are unique and matched case-sensitively.
pub const STRATEGIES: [StrategySpec; 5] = [
    StrategySpec {
        kind: StrategyKind::Popular,
        name: "popular",
        requires_auth: false,
        requires_subject_item: false,
        description: "Globally popular movies ranked by weighted rating",
    },
    StrategySpec {
        kind: StrategyKind::Content,
        name: "content",
        requires_auth: false,
        requires_subject_item: true,
        description: "Movies with similar genres to a reference movie",
    },
    StrategySpec {
        kind: StrategyKind::Item,
        name: "item",
        requires_auth: false,
        requires_subject_item: true,
        description: "Movies rated alike by the same users as a reference movie",
    },
    StrategySpec {
        kind: StrategyKind::Collaborative,
        name: "collaborative",
        requires_auth: true,
        requires_subject_item: false,
        description: "Movies enjoyed by users with similar taste",
    },
    StrategySpec {
        kind: StrategyKind::Hybrid,
        name: "hybrid",
        requires_auth: true,
        requires_subject_item: false,
        description: "Blend of collaborative, content and popularity signals",
    },
];

pub fn all() -> &'static [StrategySpec] {
    &STRATEGIES
}

pub fn names() -> impl Iterator<Item = &'static str> {
    STRATEGIES.iter().map(|s| s.name)
}

pub fn resolve(name: &str) -> Result<&'static StrategySpec, OrchestratorError> {
    STRATEGIES
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| OrchestratorError::UnknownStrategy(name.to_string()))
}

/// Checks the request carries what the strategy needs. Pure; runs before any I/O.
pub fn validate(
    spec: &StrategySpec,
    request: &RecommendationRequest,
) -> Result<(), PreconditionKind> {
    if spec.requires_auth && request.subject.user_id.is_none() {
        return Err(PreconditionKind::MissingAuth);
    }
    if spec.requires_subject_item && request.subject.movie_id.is_none() {
        return Err(PreconditionKind::MissingSubjectItem);
    }
    Ok(())
}
