//! Test cases: generated arguments plus the results considered correct.

use crate::error::{GTesterError, Result};
use crate::value::{render_list, Value};
use std::fmt;

/// One snapshot of arguments and its acceptable results.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestCase {
    args: Vec<Value>,
    #[cfg_attr(feature = "serde", serde(default))]
    accepted: Vec<Value>,
}

impl TestCase {
    /// A case with explicit acceptable results, for fixed-list checks.
    pub fn new(args: Vec<Value>, accepted: Vec<Value>) -> Self {
        TestCase { args, accepted }
    }

    /// A freshly generated case with no acceptable results yet.
    pub fn from_args(args: Vec<Value>) -> Self {
        TestCase {
            args,
            accepted: Vec::new(),
        }
    }

    /// Call arguments, in order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or(GTesterError::MissingArgument {
            index,
            len: self.args.len(),
        })
    }

    /// Answers the candidate may give.
    pub fn accepted(&self) -> &[Value] {
        &self.accepted
    }

    pub(crate) fn set_accepted(&mut self, accepted: Vec<Value>) {
        self.accepted = accepted;
    }

    /// Whether `answer` is structurally equal to any acceptable result.
    pub fn accepts(&self, answer: &Value) -> bool {
        self.accepted.iter().any(|ok| ok == answer)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "args={} accepted={}",
            render_list(&self.args),
            render_list(&self.accepted)
        )
    }
}
