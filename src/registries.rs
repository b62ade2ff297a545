//! Bundles the three pluggable registries (variables, operations,
//! assignments) that the condition and executor compilers need together
//! (spec §3: `Condition`/`Executor` compilation resolves names against all
//! three).

use std::sync::Arc;

use crate::assignment::AssignmentRegistry;
use crate::operation::OperationRegistry;
use crate::variable::VariableRegistry;

pub struct Registries {
    pub variables: VariableRegistry,
    pub operations: OperationRegistry,
    pub assignments: AssignmentRegistry,
}

impl Registries {
    pub fn with_builtins() -> Self {
        Registries {
            variables: VariableRegistry::with_builtins(),
            operations: OperationRegistry::with_builtins(),
            assignments: AssignmentRegistry::with_builtins(),
        }
    }

    pub fn with_clock(clock: Arc<dyn crate::variable::Clock>) -> Self {
        Registries {
            variables: VariableRegistry::with_clock(clock),
            operations: OperationRegistry::with_builtins(),
            assignments: AssignmentRegistry::with_builtins(),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::with_builtins()
    }
}
