//! Configuration errors for machine definitions.

use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single problem found in a machine definition or its implementation.
///
/// `location` describes where the reference was written, for example
/// `state 'open' on 'TRIGGER_CLICK'` or `watch 'value'`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("State '{state}' is declared more than once")]
    DuplicateState { state: String },

    #[error("Initial state '{state}' is not declared")]
    UnknownInitial { state: String },

    #[error("Transition in {location} targets undeclared state '{target}'")]
    UnknownTarget { location: String, target: String },

    #[error("Computed value '{name}' shadows a context field of the same name")]
    ComputedShadowsField { name: String },

    #[error("Unknown guard '{name}' referenced in {location}")]
    UnknownGuard { name: String, location: String },

    #[error("Unknown action '{name}' referenced in {location}")]
    UnknownAction { name: String, location: String },

    #[error("Unknown activity '{name}' referenced in {location}")]
    UnknownActivity { name: String, location: String },

    #[error("Activity '{name}' in {location} is deferred but no scheduler is configured")]
    MissingScheduler { name: String, location: String },
}

/// Errors that can occur when building or constructing a machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Machine '{machine}' is misconfigured: {}", summarize(.errors))]
    Invalid {
        machine: String,
        errors: Vec<ConfigError>,
    },
}

impl BuildError {
    /// Every configuration error found, empty for `MissingInitialState`.
    pub fn errors(&self) -> &[ConfigError] {
        match self {
            BuildError::MissingInitialState => &[],
            BuildError::Invalid { errors, .. } => errors,
        }
    }
}

fn summarize(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) type Check = Validation<(), NonEmptyVec<ConfigError>>;

pub(crate) fn check(ok: bool, error: impl FnOnce() -> ConfigError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Collapse every check into one result, keeping ALL failures.
pub(crate) fn finish(machine: &str, checks: Vec<Check>) -> Result<(), BuildError> {
    match Validation::all_vec(checks) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(BuildError::Invalid {
            machine: machine.to_string(),
            errors: errors.iter().cloned().collect(),
        }),
    }
}
