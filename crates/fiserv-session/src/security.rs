//! Challenge questions and the registry of pre-configured answers.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;

/// A challenge question the portal may present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityQuestion {
    Sport,
    Employer,
    Car,
}

/// The kind of answer a user registers. Paired one-to-one with [`SecurityQuestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityAnswerKind {
    Sport,
    Employer,
    Car,
}

impl SecurityQuestion {
    pub const ALL: [SecurityQuestion; 3] = [Self::Sport, Self::Employer, Self::Car];

    /// Literal phrase the challenge page renders for this question.
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Sport => "What is your favorite sports team?",
            Self::Employer => "What is the name of your first employer?",
            Self::Car => "What was the model of your first car?",
        }
    }

    pub fn answer_kind(self) -> SecurityAnswerKind {
        match self {
            Self::Sport => SecurityAnswerKind::Sport,
            Self::Employer => SecurityAnswerKind::Employer,
            Self::Car => SecurityAnswerKind::Car,
        }
    }
}

impl SecurityAnswerKind {
    pub fn question(self) -> SecurityQuestion {
        match self {
            Self::Sport => SecurityQuestion::Sport,
            Self::Employer => SecurityQuestion::Employer,
            Self::Car => SecurityQuestion::Car,
        }
    }
}

impl fmt::Display for SecurityAnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sport => "sport",
            Self::Employer => "employer",
            Self::Car => "car",
        })
    }
}

/// Plaintext answers keyed by answer kind.
#[derive(Clone, Default)]
pub struct SecurityAnswerRegistry {
    answers: HashMap<SecurityAnswerKind, String>,
}

impl SecurityAnswerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register answers, replacing any earlier answer of the same kind.
    pub fn register<I, S>(&mut self, answers: I)
    where
        I: IntoIterator<Item = (SecurityAnswerKind, S)>,
        S: Into<String>,
    {
        for (kind, answer) in answers {
            self.answers.insert(kind, answer.into());
        }
    }

    /// Resolve a presented question to its answer. Empty answers count as missing.
    pub fn answer_for(&self, question: SecurityQuestion) -> Result<&str, ConfigError> {
        let kind = question.answer_kind();
        match self.answers.get(&kind) {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Err(ConfigError::MissingAnswer(kind)),
        }
    }

    /// Kinds that have a non-empty answer.
    pub fn registered_kinds(&self) -> Vec<SecurityAnswerKind> {
        let mut kinds: Vec<_> = self
            .answers
            .iter()
            .filter(|(_, a)| !a.is_empty())
            .map(|(k, _)| *k)
            .collect();
        kinds.sort_by_key(|k| k.question().phrase());
        kinds
    }
}

impl fmt::Debug for SecurityAnswerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityAnswerRegistry")
            .field("registered", &self.registered_kinds())
            .finish()
    }
}
