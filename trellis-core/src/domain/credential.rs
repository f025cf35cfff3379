//! Credential references and injection scopes
//!
//! A credential reference only names secret material held elsewhere (for
//! example a Kubernetes secret). The execution engine looks it up at run time;
//! nothing in Trellis ever sees the secret values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::template::Template;

const MAX_NAME_LEN: usize = 253;

/// Error returned for a malformed credential name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid credential name '{name}': {reason}")]
pub struct CredentialNameError {
    pub name: String,
    pub reason: &'static str,
}

/// Named pointer to externally stored secret material
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialRef(String);

impl CredentialRef {
    /// Validates `name` as a Kubernetes-style resource name
    pub fn new(name: impl Into<String>) -> Result<Self, CredentialNameError> {
        let name = name.into();
        let fail = |reason| CredentialNameError {
            name: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(fail("name is empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(fail("name is longer than 253 characters"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(fail(
                "only lowercase letters, digits, '-' and '.' are allowed",
            ));
        }

        let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
            return Err(fail("name must start and end with a letter or digit"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CredentialRef {
    type Error = CredentialNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CredentialRef::new(value)
    }
}

impl From<CredentialRef> for String {
    fn from(value: CredentialRef) -> Self {
        value.0
    }
}

/// Which nodes a credential injector may decorate
///
/// The default is an empty capability set, which matches no node at all:
/// credentials reach a node only when a caller opts it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialScope {
    /// Every node in the pipeline
    AllNodes,
    /// Nodes whose template declares at least one of these capabilities
    Capabilities(BTreeSet<String>),
    /// Nodes with these ids
    Nodes(BTreeSet<String>),
}

impl CredentialScope {
    pub fn capabilities<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CredentialScope::Capabilities(capabilities.into_iter().map(Into::into).collect())
    }

    pub fn nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CredentialScope::Nodes(nodes.into_iter().map(Into::into).collect())
    }

    /// Whether a node with this id and template is in scope
    pub fn matches(&self, node_id: &str, template: &Template) -> bool {
        match self {
            CredentialScope::AllNodes => true,
            CredentialScope::Capabilities(caps) => {
                caps.iter().any(|cap| template.has_capability(cap))
            }
            CredentialScope::Nodes(ids) => ids.contains(node_id),
        }
    }
}

impl Default for CredentialScope {
    fn default() -> Self {
        CredentialScope::Capabilities(BTreeSet::new())
    }
}

/// Error returned when a scope expression cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeParseError {
    #[error("invalid credential scope '{0}': expected 'all', 'capabilities:a,b' or 'nodes:x,y'")]
    Syntax(String),

    #[error("credential scope '{0}' names nothing")]
    Empty(String),
}

impl FromStr for CredentialScope {
    type Err = ScopeParseError;

    /// Parses `all`, `capabilities:a,b` or `nodes:x,y`
    ///
    /// The singular `capability:` and `node:` prefixes are accepted too. A
    /// list that names nothing is rejected rather than producing a scope
    /// that matches no node.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(CredentialScope::AllNodes);
        }

        let (kind, list) = s
            .split_once(':')
            .ok_or_else(|| ScopeParseError::Syntax(s.to_string()))?;
        let values: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        let build: fn(Vec<String>) -> CredentialScope = match kind.trim() {
            "capabilities" | "capability" => CredentialScope::capabilities,
            "nodes" | "node" => CredentialScope::nodes,
            _ => return Err(ScopeParseError::Syntax(s.to_string())),
        };
        if values.is_empty() {
            return Err(ScopeParseError::Empty(s.to_string()));
        }
        Ok(build(values))
    }
}
