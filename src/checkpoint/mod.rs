//! Checkpoint and resume functionality for machines.
//!
//! A checkpoint captures where a machine is (state, context, history) so a
//! widget can be torn down and rebuilt without losing its place, e.g. across
//! a page navigation. Actions, activities and subscribers are not part of a
//! checkpoint: resuming binds the same definition and implementation again
//! and `start()` re-runs the entry actions and activities of the saved state.

use crate::builder::MachineDefinition;
use crate::core::{State, StateHistory};
use crate::effects::{Implementation, Machine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable checkpoint of a machine instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Checkpoint<S: State> {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// Id of the machine the checkpoint was taken from
    pub machine_id: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    pub state: S,

    /// Context fields; computed values are derived again on resume.
    pub context: Map<String, Value>,

    pub history: StateHistory<S>,
}

impl<S: State> Checkpoint<S> {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Parse a checkpoint, rejecting formats this version cannot read.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(())
    }
}

impl<S: State> Machine<S> {
    /// Capture the current state, context and history.
    pub fn checkpoint(&self) -> Checkpoint<S> {
        let (state, context, history) = self.inspect(|state, context, history| {
            (state.clone(), context.fields().clone(), history.clone())
        });
        Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            machine_id: self.id().to_string(),
            timestamp: Utc::now(),
            state,
            context,
            history,
        }
    }

    /// Rebuild an unstarted machine positioned at the checkpointed state.
    /// The checkpointed context is merged over the definition's defaults and
    /// becomes the instance's initial context.
    pub fn resume(
        definition: &MachineDefinition<S>,
        implementation: &Implementation<S>,
        checkpoint: Checkpoint<S>,
    ) -> Result<Self, CheckpointError> {
        checkpoint.check_version()?;
        if !definition.declares(&checkpoint.state) {
            return Err(CheckpointError::ValidationFailed(format!(
                "state '{}' is not declared by machine '{}'",
                checkpoint.state.name(),
                definition.id()
            )));
        }

        tracing::debug!(
            machine = definition.id(),
            checkpoint = %checkpoint.id,
            state = checkpoint.state.name(),
            "resuming from checkpoint"
        );
        let context = definition.instantiate_context(checkpoint.context);
        let machine = Machine::assemble(
            definition,
            implementation,
            context,
            checkpoint.state,
            None,
            checkpoint.history,
        )?;
        Ok(machine)
    }
}
