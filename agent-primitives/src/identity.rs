//! Identity of the remote agent this gateway fronts.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Immutable `(agent id, alias id, execution role)` triple.
///
/// Built once from configuration and shared read-only by every turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    agent_id: String,
    alias_id: String,
    execution_role_ref: String,
}

impl AgentIdentity {
    /// Starts building an [`AgentIdentity`].
    #[must_use]
    pub fn builder() -> AgentIdentityBuilder {
        AgentIdentityBuilder::default()
    }

    /// Identifier of the remote agent.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Alias (deployment) of the remote agent.
    #[must_use]
    pub fn alias_id(&self) -> &str {
        &self.alias_id
    }

    /// Reference to the role the agent executes under.
    #[must_use]
    pub fn execution_role_ref(&self) -> &str {
        &self.execution_role_ref
    }
}

/// Builder for [`AgentIdentity`].
#[derive(Debug, Default)]
pub struct AgentIdentityBuilder {
    agent_id: Option<String>,
    alias_id: Option<String>,
    execution_role_ref: Option<String>,
}

impl AgentIdentityBuilder {
    /// Sets the agent identifier.
    #[must_use]
    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Sets the alias identifier.
    #[must_use]
    pub fn alias_id(mut self, alias_id: impl Into<String>) -> Self {
        self.alias_id = Some(alias_id.into());
        self
    }

    /// Sets the execution role reference.
    #[must_use]
    pub fn execution_role_ref(mut self, role: impl Into<String>) -> Self {
        self.execution_role_ref = Some(role.into());
        self
    }

    /// Consumes the builder and returns the identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIdentifier`] naming the first field that is
    /// absent or blank.
    pub fn build(self) -> crate::Result<AgentIdentity> {
        Ok(AgentIdentity {
            agent_id: required(self.agent_id, "agent_id")?,
            alias_id: required(self.alias_id, "alias_id")?,
            execution_role_ref: required(self.execution_role_ref, "execution_role_ref")?,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> crate::Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(Error::MissingIdentifier { field }),
    }
}
