//! Virtual machine for query evaluation
//!
//! This module implements the small stack machine that executes compiled
//! queries against one entry at a time. Entry content is loaded only when a
//! `text` test is actually reached, so name-only queries never touch the
//! store.

use crate::error::CorpusError;
use crate::query::{Condition, Field};
use std::borrow::Cow;

/// VM instructions for query evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a constant
    Push(bool),
    /// Run a test and push its outcome
    Check(Field, Condition),
    /// Negate the top of the stack
    Not,
    /// Jump to target if the top of the stack is false (leaves it in place)
    JumpIfFalse(usize),
    /// Jump to target if the top of the stack is true (leaves it in place)
    JumpIfTrue(usize),
    /// Discard the top of the stack
    Pop,
}

type Loader<'a> = &'a dyn Fn(&str) -> Result<String, CorpusError>;

/// One entry as seen by the VM
pub struct EntryView<'a> {
    name: &'a str,
    content: Option<Cow<'a, str>>,
    loader: Option<Loader<'a>>,
}

impl<'a> EntryView<'a> {
    /// An entry whose content is fetched on demand through `loader`
    pub fn new(name: &'a str, loader: Loader<'a>) -> Self {
        Self {
            name,
            content: None,
            loader: Some(loader),
        }
    }

    /// An entry whose content is already known
    pub fn with_content(name: &'a str, content: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name,
            content: Some(content.into()),
            loader: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Entry content, loading it on first use
    pub fn content(&mut self) -> Result<&str, CorpusError> {
        if self.content.is_none() {
            let load = self
                .loader
                .ok_or_else(|| CorpusError::NotFound(self.name.to_string()))?;
            self.content = Some(Cow::Owned(load(self.name)?));
        }
        Ok(self.content.as_deref().unwrap_or_default())
    }

    /// Whether content has been loaded
    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }
}

/// The query evaluation virtual machine
#[derive(Debug, Clone)]
pub struct VM {
    /// Compiled opcodes
    opcodes: Vec<Instruction>,
}

impl VM {
    /// Create a new VM with the given opcodes
    pub fn new(opcodes: Vec<Instruction>) -> Self {
        Self { opcodes }
    }

    pub fn opcodes(&self) -> &[Instruction] {
        &self.opcodes
    }

    /// Evaluate the program against one entry
    ///
    /// Returns false for an empty program.
    pub fn execute(&self, entry: &mut EntryView<'_>) -> Result<bool, CorpusError> {
        let mut stack: Vec<bool> = Vec::with_capacity(8);
        let mut ip = 0;

        while ip < self.opcodes.len() {
            match &self.opcodes[ip] {
                Instruction::Push(value) => stack.push(*value),
                Instruction::Check(field, condition) => {
                    let outcome = match field {
                        Field::Name => condition.is_match(entry.name()),
                        Field::Text => condition.is_match(entry.content()?),
                    };
                    stack.push(outcome);
                }
                Instruction::Not => {
                    if let Some(top) = stack.last_mut() {
                        *top = !*top;
                    }
                }
                Instruction::JumpIfFalse(target) => {
                    if stack.last() == Some(&false) {
                        ip = *target;
                        continue;
                    }
                }
                Instruction::JumpIfTrue(target) => {
                    if stack.last() == Some(&true) {
                        ip = *target;
                        continue;
                    }
                }
                Instruction::Pop => {
                    stack.pop();
                }
            }
            ip += 1;
        }

        Ok(stack.pop().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(field: Field, s: &str) -> Instruction {
        Instruction::Check(field, Condition::Contains(s.to_string()))
    }

    #[test]
    fn test_single_check() {
        let vm = VM::new(vec![contains(Field::Text, "cat")]);

        let mut entry = EntryView::with_content("a", "The cat sat.".to_string());
        assert!(vm.execute(&mut entry).unwrap());

        let mut entry = EntryView::with_content("b", "Dogs run fast.".to_string());
        assert!(!vm.execute(&mut entry).unwrap());
    }

    #[test]
    fn test_not() {
        let vm = VM::new(vec![contains(Field::Text, "cat"), Instruction::Not]);
        let mut entry = EntryView::with_content("b", "Dogs run fast.".to_string());
        assert!(vm.execute(&mut entry).unwrap());
    }

    #[test]
    fn test_and_short_circuits() {
        // name test fails, so the text test must never load content
        let vm = VM::new(vec![
            contains(Field::Name, "x"),
            Instruction::JumpIfFalse(4),
            Instruction::Pop,
            contains(Field::Text, "cat"),
        ]);

        let loader = |_: &str| -> Result<String, CorpusError> {
            panic!("content should not be loaded")
        };
        let mut entry = EntryView::new("a", &loader);
        assert!(!vm.execute(&mut entry).unwrap());
        assert!(!entry.is_loaded());
    }

    #[test]
    fn test_or_short_circuits() {
        let vm = VM::new(vec![
            contains(Field::Name, "a"),
            Instruction::JumpIfTrue(4),
            Instruction::Pop,
            contains(Field::Text, "cat"),
        ]);

        let loader = |_: &str| -> Result<String, CorpusError> {
            panic!("content should not be loaded")
        };
        let mut entry = EntryView::new("a", &loader);
        assert!(vm.execute(&mut entry).unwrap());
    }

    #[test]
    fn test_lazy_content_loading() {
        let vm = VM::new(vec![contains(Field::Text, "run")]);
        let loader = |name: &str| -> Result<String, CorpusError> {
            assert_eq!(name, "b");
            Ok("Dogs run fast.".to_string())
        };
        let mut entry = EntryView::new("b", &loader);
        assert!(!entry.is_loaded());
        assert!(vm.execute(&mut entry).unwrap());
        assert!(entry.is_loaded());
    }

    #[test]
    fn test_loader_error_propagates() {
        let vm = VM::new(vec![contains(Field::Text, "run")]);
        let loader =
            |name: &str| -> Result<String, CorpusError> { Err(CorpusError::NotFound(name.to_string())) };
        let mut entry = EntryView::new("gone", &loader);
        assert!(matches!(
            vm.execute(&mut entry),
            Err(CorpusError::NotFound(name)) if name == "gone"
        ));
    }

    #[test]
    fn test_empty_program_is_false() {
        let vm = VM::new(Vec::new());
        let mut entry = EntryView::with_content("a", String::new());
        assert!(!vm.execute(&mut entry).unwrap());
    }
}
