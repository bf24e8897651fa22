//! Query compilation to VM opcodes
//!
//! This module compiles a parsed query expression into short-circuiting VM
//! opcodes, and picks an anchor: the cheapest index lookup whose result is a
//! superset of the matching entries. Every candidate produced by the anchor is
//! still verified by the VM.

use crate::query::{Condition, Expr, Field, QueryError, parse_query};
use crate::vm::{Instruction, VM};

/// Literals shorter than this cannot be looked up in the trigram index
pub const MIN_INDEXED_LITERAL: usize = 3;

/// Selectivity estimate for choosing the best anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Selectivity {
    /// Provably empty
    Empty = 4,
    /// Very selective (e.g., exact entry name)
    High = 3,
    /// Moderately selective (e.g., text literal via trigrams)
    Medium = 2,
    /// Low selectivity (full scan)
    Low = 1,
}

/// Candidate plan for a compiled query
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    /// Scan every entry
    All,
    /// No entry can match
    Nothing,
    /// Only the entry with this exact name
    Name(String),
    /// Entries whose content contains this literal (trigram lookup)
    Substring(String),
    /// Union of several plans
    Union(Vec<Anchor>),
}

impl Anchor {
    fn selectivity(&self) -> Selectivity {
        match self {
            Anchor::All => Selectivity::Low,
            Anchor::Nothing => Selectivity::Empty,
            Anchor::Name(_) => Selectivity::High,
            Anchor::Substring(_) => Selectivity::Medium,
            // A union is as selective as its least selective member
            Anchor::Union(parts) => parts
                .iter()
                .map(Anchor::selectivity)
                .min()
                .unwrap_or(Selectivity::Empty),
        }
    }
}

/// A query ready for execution
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    source: String,
    expr: Expr,
    vm: VM,
    anchor: Anchor,
}

impl CompiledQuery {
    /// The query text this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }
}

/// Parse and compile a query string
pub fn compile_query(query: &str) -> Result<CompiledQuery, QueryError> {
    let expr = parse_query(query)?;
    Ok(compile_expr(query, expr))
}

/// Compile an already parsed expression
fn compile_expr(source: &str, expr: Expr) -> CompiledQuery {
    let mut opcodes = Vec::new();
    emit(&expr, &mut opcodes);
    let anchor = select_anchor(&expr);

    CompiledQuery {
        source: source.to_string(),
        expr,
        vm: VM::new(opcodes),
        anchor,
    }
}

/// Append the opcodes for one expression
///
/// Each expression leaves exactly one value on the stack.
fn emit(expr: &Expr, opcodes: &mut Vec<Instruction>) {
    match expr {
        Expr::Const(value) => opcodes.push(Instruction::Push(*value)),
        Expr::Test(field, condition) => opcodes.push(Instruction::Check(*field, condition.clone())),
        Expr::Not(inner) => {
            emit(inner, opcodes);
            opcodes.push(Instruction::Not);
        }
        Expr::And(items) => emit_chain(items, opcodes, Instruction::JumpIfFalse, true),
        Expr::Or(items) => emit_chain(items, opcodes, Instruction::JumpIfTrue, false),
    }
}

/// Compile a short-circuit chain: a JUMP end; POP; b JUMP end; POP; c; end:
fn emit_chain(
    items: &[Expr],
    opcodes: &mut Vec<Instruction>,
    jump: fn(usize) -> Instruction,
    empty_value: bool,
) {
    let Some((last, init)) = items.split_last() else {
        opcodes.push(Instruction::Push(empty_value));
        return;
    };

    let mut patches = Vec::with_capacity(init.len());
    for item in init {
        emit(item, opcodes);
        patches.push(opcodes.len());
        opcodes.push(jump(0)); // patched below
        opcodes.push(Instruction::Pop);
    }
    emit(last, opcodes);

    let end = opcodes.len();
    for at in patches {
        opcodes[at] = jump(end);
    }
}

/// Choose the candidate plan for an expression
fn select_anchor(expr: &Expr) -> Anchor {
    match expr {
        Expr::Const(true) => Anchor::All,
        Expr::Const(false) => Anchor::Nothing,
        Expr::Test(Field::Name, Condition::Equals(name)) => Anchor::Name(name.clone()),
        Expr::Test(Field::Text, condition) => match condition.required_literal() {
            Some(literal) if literal.len() >= MIN_INDEXED_LITERAL => {
                Anchor::Substring(literal.to_string())
            }
            _ => Anchor::All,
        },
        Expr::Test(Field::Name, _) => Anchor::All,
        // Negation says nothing about which entries can match
        Expr::Not(_) => Anchor::All,
        Expr::And(items) => {
            // And is as selective as its most selective member
            let mut best = Anchor::All;
            for item in items {
                let anchor = select_anchor(item);
                if anchor.selectivity() > best.selectivity() {
                    best = anchor;
                }
            }
            best
        }
        Expr::Or(items) => {
            let mut parts = Vec::new();
            for item in items {
                match select_anchor(item) {
                    Anchor::All => return Anchor::All,
                    Anchor::Nothing => {}
                    Anchor::Union(inner) => parts.extend(inner),
                    anchor => parts.push(anchor),
                }
            }
            match parts.len() {
                0 => Anchor::Nothing,
                1 => parts.remove(0),
                _ => Anchor::Union(parts),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::EntryView;

    fn eval(query: &str, name: &str, content: &str) -> bool {
        let compiled = compile_query(query).unwrap();
        let mut entry = EntryView::with_content(name, content.to_string());
        compiled.vm().execute(&mut entry).unwrap()
    }

    #[test]
    fn test_compile_simple_test() {
        let compiled = compile_query("contains(text,'cat')").unwrap();
        assert_eq!(
            compiled.vm().opcodes(),
            &[Instruction::Check(
                Field::Text,
                Condition::Contains("cat".to_string())
            )]
        );
        assert_eq!(compiled.source(), "contains(text,'cat')");
    }

    #[test]
    fn test_compile_and_chain() {
        let compiled = compile_query("contains(name,'a') and contains(text,'b')").unwrap();
        assert_eq!(
            compiled.vm().opcodes(),
            &[
                Instruction::Check(Field::Name, Condition::Contains("a".to_string())),
                Instruction::JumpIfFalse(4),
                Instruction::Pop,
                Instruction::Check(Field::Text, Condition::Contains("b".to_string())),
            ]
        );
    }

    #[test]
    fn test_compile_and_execute() {
        let query = "(contains(text,'cat') or contains(text,'dog')) and not(ends-with(text,'!'))";
        assert!(eval(query, "a", "The cat sat."));
        assert!(eval(query, "b", "A dog barked."));
        assert!(!eval(query, "c", "The cat sat!"));
        assert!(!eval(query, "d", "Birds fly."));
    }

    #[test]
    fn test_compile_nested_chains() {
        let query = "contains(text,'a') and (contains(text,'b') or contains(text,'c')) and contains(text,'d')";
        assert!(eval(query, "x", "a c d"));
        assert!(eval(query, "x", "a b d"));
        assert!(!eval(query, "x", "a d"));
        assert!(!eval(query, "x", "b c d"));
    }

    #[test]
    fn test_name_tests() {
        assert!(eval("starts-with(name,'wr-p')", "wr-p-1.xml", ""));
        assert!(!eval("starts-with(name,'wr-p')", "ws-u-1.xml", ""));
        assert!(eval("matches(name,'[0-9]+\\.xml$')", "corpus/12.xml", ""));
    }

    #[test]
    fn test_anchor_literal_text() {
        let compiled = compile_query("contains(text,'cat')").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::Substring("cat".to_string()));

        // Too short for the trigram index
        let compiled = compile_query("contains(text,'ca')").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::All);

        let compiled = compile_query("matches(text,'cat')").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::All);
    }

    #[test]
    fn test_anchor_selection_in_and() {
        let compiled =
            compile_query("contains(text,'cat') and equals(name,'a') and not(contains(text,'x'))")
                .unwrap();
        assert_eq!(compiled.anchor(), &Anchor::Name("a".to_string()));

        let compiled = compile_query("contains(text,'cat') and false()").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::Nothing);
    }

    #[test]
    fn test_anchor_union_in_or() {
        let compiled = compile_query("contains(text,'cat') or equals(name,'b')").unwrap();
        assert_eq!(
            compiled.anchor(),
            &Anchor::Union(vec![
                Anchor::Substring("cat".to_string()),
                Anchor::Name("b".to_string()),
            ])
        );

        // One unindexable branch forces a scan
        let compiled = compile_query("contains(text,'cat') or not(contains(text,'dog'))").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::All);

        let compiled = compile_query("false() or contains(text,'cat')").unwrap();
        assert_eq!(compiled.anchor(), &Anchor::Substring("cat".to_string()));
    }

    #[test]
    fn test_constants() {
        assert!(eval("true()", "a", ""));
        assert!(!eval("false()", "a", ""));
        assert_eq!(compile_query("true()").unwrap().anchor(), &Anchor::All);
    }
}
