//! Project and settings validation.
//!
//! Hydration is lenient: anything the graph can represent is loaded and
//! left for [`lint`](cardplay_core::lint) to report. These checks are the
//! strict counterpart, run by hosts that want to reject a project file
//! before touching a graph.
//!
//! # Example
//!
//! ```rust,ignore
//! use cardplay_config::{ProjectFile, validate_project};
//!
//! let project = ProjectFile::load("groove.toml")?;
//! validate_project(&project, &registries)?;
//! ```

use std::collections::BTreeSet;

use cardplay_core::{ParamError, ParamValue, RegistrySet, check_params};
use thiserror::Error;

use crate::project::{ProjectFile, parse_endpoint};
use crate::settings::EngineSettings;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Two cards share an id.
    #[error("duplicate card id: {0}")]
    DuplicateCard(String),

    /// Unknown card type.
    #[error("card '{card}' has unknown type '{card_type}'")]
    UnknownCardType {
        /// Card id.
        card: String,
        /// The unregistered type.
        card_type: String,
    },

    /// A parameter fails its schema.
    #[error("card '{card}': {error}")]
    InvalidParam {
        /// Card id.
        card: String,
        /// Schema failure.
        error: ParamError,
    },

    /// A stack lists a card that is not defined.
    #[error("stack '{stack}' lists unknown card '{card}'")]
    UnknownStackMember {
        /// Stack id.
        stack: String,
        /// Missing card id.
        card: String,
    },

    /// An edge endpoint is not of the form `node:port`.
    #[error("invalid endpoint '{0}' (expected node:port)")]
    InvalidEndpoint(String),

    /// An edge references a card that is not defined.
    #[error("edge '{edge}' references unknown card '{card}'")]
    UnknownEdgeNode {
        /// Edge as written.
        edge: String,
        /// Missing card id.
        card: String,
    },

    /// A card reads a container the project does not define.
    #[error("card '{card}' reads missing container '{container}'")]
    MissingContainer {
        /// Card id.
        card: String,
        /// Container name.
        container: String,
    },

    /// An engine setting is out of its valid range.
    #[error("invalid setting '{setting}': {reason}")]
    InvalidSetting {
        /// Dotted setting name.
        setting: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl ValidationError {
    /// Folds a list into `Ok`, the single error, or [`ValidationError::Multiple`].
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }

    /// Flattens nested [`ValidationError::Multiple`] values.
    pub fn flatten(&self) -> Vec<&ValidationError> {
        match self {
            ValidationError::Multiple(errors) => errors.iter().flat_map(ValidationError::flatten).collect(),
            other => vec![other],
        }
    }
}

/// Card parameter naming the container a card reads.
const CONTAINER_PARAM: &str = "container";

/// Checks a project file against `registries` without building a graph.
///
/// Pass the registries the project will be hydrated into, with its packs
/// already installed, or every pack card shows up as unknown.
pub fn validate_project(project: &ProjectFile, registries: &RegistrySet) -> ValidationResult<()> {
    let mut errors = Vec::new();
    if let Err(e) = validate_settings(&project.engine) {
        errors.push(e);
    }

    let mut ids = BTreeSet::new();
    for card in &project.cards {
        if !ids.insert(card.id.as_str()) {
            errors.push(ValidationError::DuplicateCard(card.id.clone()));
        }
        match registries.card(&card.card_type) {
            Some(def) => {
                errors.extend(check_params(&def.params, &card.params).into_iter().map(|error| {
                    ValidationError::InvalidParam {
                        card: card.id.clone(),
                        error,
                    }
                }));
                let container = def
                    .reader(&card.params)
                    .get(CONTAINER_PARAM)
                    .and_then(ParamValue::as_str);
                if let Some(name) = container
                    && !project.containers.contains_key(name)
                {
                    errors.push(ValidationError::MissingContainer {
                        card: card.id.clone(),
                        container: name.to_string(),
                    });
                }
            }
            None if card.ports.is_some() => {}
            None => errors.push(ValidationError::UnknownCardType {
                card: card.id.clone(),
                card_type: card.card_type.clone(),
            }),
        }
    }

    for stack in &project.stacks {
        for member in &stack.cards {
            if !ids.contains(member.as_str()) {
                errors.push(ValidationError::UnknownStackMember {
                    stack: stack.id.clone(),
                    card: member.clone(),
                });
            }
        }
    }

    for edge in &project.edges {
        for side in [&edge.from, &edge.to] {
            match parse_endpoint(side) {
                Some((node, _)) if !ids.contains(node) => errors.push(ValidationError::UnknownEdgeNode {
                    edge: edge.to_string(),
                    card: node.to_string(),
                }),
                Some(_) => {}
                None => errors.push(ValidationError::InvalidEndpoint(side.clone())),
            }
        }
    }

    ValidationError::collect(errors)
}

/// Checks engine settings for values the executor cannot run with.
pub fn validate_settings(settings: &EngineSettings) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let mut invalid = |setting: &str, reason: &str| {
        errors.push(ValidationError::InvalidSetting {
            setting: setting.to_string(),
            reason: reason.to_string(),
        });
    };

    let transport = &settings.transport;
    if !transport.bpm.is_finite() || transport.bpm <= 0.0 {
        invalid("transport.bpm", "must be a positive number");
    }
    if transport.ppq == 0 {
        invalid("transport.ppq", "must be at least 1");
    }
    if transport.sample_rate == 0 {
        invalid("transport.sample_rate", "must be at least 1");
    }

    let executor = &settings.executor;
    if executor.batch_ticks.is_some_and(|b| b <= 0) {
        invalid("executor.batch_ticks", "must be at least 1 tick");
    }
    if executor.capture_capacity == Some(0) {
        invalid("executor.capture_capacity", "must be at least 1 event");
    }
    if executor.max_invocations == Some(0) {
        invalid("executor.max_invocations", "a zero budget runs nothing");
    }

    ValidationError::collect(errors)
}
