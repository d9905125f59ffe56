#![allow(missing_docs)]

//! Per-execution mutable state: the register file and bound parameters.

use smallvec::SmallVec;

use crate::error::{InternalError, Result};
use crate::query::value::Value;

/// Register file plus positional parameters for one execution.
///
/// Registers are allocated once, up front, and start out `MISSING`. A state is
/// owned by exactly one execution; compiled plans are shared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluatorState {
    registers: Vec<Value>,
    parameters: Vec<Value>,
}

impl EvaluatorState {
    /// State with `register_count` registers and no parameters.
    pub fn new(register_count: usize) -> Self {
        Self {
            registers: vec![Value::Missing; register_count],
            parameters: Vec::new(),
        }
    }

    /// Binds positional parameters; `parameters[0]` is parameter 1.
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    pub fn register(&self, index: usize) -> Result<&Value> {
        let len = self.registers.len();
        self.registers
            .get(index)
            .ok_or_else(|| InternalError::RegisterOutOfRange { index, len }.into())
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> Result<()> {
        let len = self.registers.len();
        let slot = self
            .registers
            .get_mut(index)
            .ok_or(InternalError::RegisterOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// All registers, by index.
    pub fn registers(&self) -> &[Value] {
        &self.registers
    }

    /// Parameter at 1-based `position`, if bound.
    pub fn parameter(&self, position: usize) -> Option<&Value> {
        position
            .checked_sub(1)
            .and_then(|index| self.parameters.get(index))
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

/// Stores a value into one fixed register.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SetVariable {
    index: usize,
}

impl SetVariable {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set(&self, state: &mut EvaluatorState, value: Value) -> Result<()> {
        state.set_register(self.index, value)
    }
}

/// Sets a fixed group of registers to `NULL`; used by outer joins for the side
/// that produced no row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NullPadding {
    registers: SmallVec<[usize; 8]>,
}

impl NullPadding {
    pub fn new(registers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            registers: registers.into_iter().collect(),
        }
    }

    /// Register indices covered, in declaration order.
    pub fn registers(&self) -> &[usize] {
        &self.registers
    }

    pub fn apply(&self, state: &mut EvaluatorState) -> Result<()> {
        for &index in &self.registers {
            state.set_register(index, Value::Null)?;
        }
        Ok(())
    }
}
