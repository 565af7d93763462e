//! Endpoint policy lookup.
//!
//! # Responsibilities
//! - Store the ordered endpoint policies
//! - Look up the first policy matching a (method, path) pair
//! - Return matched policy or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; first match wins
//! - Explicit NoMatch rather than silent default

use std::collections::HashMap;

use axum::http::Method;

use crate::routing::matcher::{PathPattern, PatternError};
use crate::security::identity::Role;

/// Authorization rule for one method + path pattern.
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    pub method: Method,
    pub pattern: PathPattern,
    pub allowed_roles: Vec<Role>,
    pub requires_auth: bool,
}

impl EndpointPolicy {
    pub fn new(
        method: Method,
        pattern: &str,
        allowed_roles: &[Role],
        requires_auth: bool,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            allowed_roles: allowed_roles.to_vec(),
            requires_auth,
        })
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// A policy matched against a request, with captured route parameters.
#[derive(Debug, Clone)]
pub struct PolicyMatch<'a> {
    pub policy: &'a EndpointPolicy,
    pub params: HashMap<String, String>,
}

/// Ordered list of endpoint policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: Vec<EndpointPolicy>,
}

impl PolicyTable {
    pub fn new(policies: Vec<EndpointPolicy>) -> Self {
        Self { policies }
    }

    /// First policy whose method and pattern match.
    pub fn find(&self, method: &Method, path: &str) -> Option<PolicyMatch<'_>> {
        self.policies.iter().find_map(|policy| {
            if policy.method != *method {
                return None;
            }
            policy
                .pattern
                .captures(path)
                .map(|params| PolicyMatch { policy, params })
        })
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// The shipped policy set for the users/projects/tasks API.
    pub fn standard() -> Result<Self, PatternError> {
        use Role::*;

        const READERS: &[Role] = &[Admin, Developer, Tester, Designer];
        const WRITERS: &[Role] = &[Admin, Developer];
        const INSPECTORS: &[Role] = &[Admin, Developer, Tester];
        const ADMINS: &[Role] = &[Admin];
        const EVERYONE: &[Role] = &Role::ALL;

        let rules: &[(Method, &str, &[Role], bool)] = &[
            (Method::GET, "/users", READERS, true),
            (Method::GET, "/projects", READERS, true),
            (Method::GET, "/tasks", READERS, true),
            (Method::POST, "/users", ADMINS, true),
            (Method::POST, "/projects", WRITERS, true),
            (Method::POST, "/tasks", WRITERS, true),
            (Method::PUT, "/projects/{id}", WRITERS, true),
            (Method::PUT, "/tasks/{id}", WRITERS, true),
            (Method::DELETE, "/users/{id}", ADMINS, true),
            (Method::DELETE, "/projects/{id}", ADMINS, true),
            (Method::DELETE, "/tasks/{id}", ADMINS, true),
            (Method::GET, "/projects/{id}/tasks", INSPECTORS, true),
            (Method::GET, "/projects/{id}/tasks/pending", INSPECTORS, true),
            (Method::GET, "/users/{id}/tasks", INSPECTORS, true),
            (Method::GET, "/statistics", READERS, true),
            (Method::GET, "/statistics/{*section}", READERS, true),
            (Method::GET, "/config", ADMINS, true),
            (Method::PUT, "/config", ADMINS, true),
            (Method::PATCH, "/config", ADMINS, true),
            (Method::GET, "/bulkhead/metrics", EVERYONE, false),
            (Method::GET, "/health", EVERYONE, false),
            (Method::POST, "/auth/change-role", EVERYONE, false),
            (Method::GET, "/", EVERYONE, false),
        ];

        let policies = rules
            .iter()
            .map(|(method, pattern, roles, auth)| {
                EndpointPolicy::new(method.clone(), pattern, roles, *auth)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(policies))
    }
}
