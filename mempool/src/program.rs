//! Registered "program" sub-ledgers (§9 Design Note: "Layer-2 programs as
//! dynamically registered sub-ledgers").
//!
//! Execution semantics of a program/sub-ledger are out of this system's
//! scope (§1); [`ProgramLedger`] is deliberately a minimal marker so that
//! the mempool can route a transaction by its `program_id` without knowing
//! anything about what that sub-ledger actually does.

use std::collections::HashMap;

use obscura_core::Hash;

pub trait ProgramLedger: Send + Sync {
    fn program_id(&self) -> Hash;
}

#[derive(Default)]
pub struct ProgramRegistry {
    programs: HashMap<Hash, Box<dyn ProgramLedger>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        ProgramRegistry { programs: HashMap::new() }
    }

    pub fn register(&mut self, program: Box<dyn ProgramLedger>) {
        self.programs.insert(program.program_id(), program);
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.programs.contains_key(id)
    }
}
