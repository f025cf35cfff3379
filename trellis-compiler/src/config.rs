//! Compiler configuration
//!
//! Everything that used to be a file-level constant in hand-written pipeline
//! scripts (the shared secret name, how strict to be) is passed in explicitly
//! through `CompilerConfig`. There is no process-wide state.

use serde::{Deserialize, Serialize};
use trellis_core::domain::credential::{CredentialRef, CredentialScope};

use crate::error::{PipelineError, Result};

/// How `finalize` treats parameters that no node binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Dangling parameters are logged as warnings
    #[default]
    Permissive,
    /// Dangling parameters fail with `DanglingParameter`
    Strict,
}

/// Graph builder and compiler configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Dangling parameter policy
    pub strictness: Strictness,

    /// Credentials injected into every node matched by `credential_scope`
    pub credentials: Vec<CredentialRef>,

    /// Scope for `credentials`; the default matches no node
    pub credential_scope: CredentialScope,
}

impl CompilerConfig {
    /// Creates a permissive configuration with no default credentials
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strict configuration
    pub fn strict() -> Self {
        Self::default().with_strictness(Strictness::Strict)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Adds a credential injected into every in-scope node
    pub fn with_credential(mut self, name: &str) -> Result<Self> {
        let credential =
            CredentialRef::new(name).map_err(|e| PipelineError::InvalidCredentialName {
                name: e.name,
                reason: e.reason.to_string(),
            })?;
        if !self.credentials.contains(&credential) {
            self.credentials.push(credential);
        }
        Ok(self)
    }

    pub fn with_credential_scope(mut self, scope: CredentialScope) -> Self {
        self.credential_scope = scope;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strictness == Strictness::Strict
    }

    /// Validates the configuration
    ///
    /// Fails when default credentials are configured with a scope that
    /// names no node or capability, which would silently inject nothing.
    pub fn validate(&self) -> Result<()> {
        let names_nothing = match &self.credential_scope {
            CredentialScope::AllNodes => false,
            CredentialScope::Capabilities(names) | CredentialScope::Nodes(names) => names.is_empty(),
        };
        if let Some(credential) = self.credentials.first().filter(|_| names_nothing) {
            return Err(PipelineError::EmptyCredentialScope {
                credential: credential.to_string(),
            });
        }
        Ok(())
    }
}
