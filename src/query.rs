//! Query language parser
//!
//! Parses query strings into an expression AST using the pest grammar in
//! `query.pest`. A query is a boolean combination of string tests over an
//! entry's `text` (its content) or its `name`.

use memchr::memmem;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use regex::Regex;
use std::fmt::Debug;
use std::ops::Range;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query.pest"]
struct QueryParser;

/// Error type for query parsing failures
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    ParseError(#[from] pest::error::Error<Rule>),

    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// The part of an entry a test looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Text,
    Name,
}

/// A string test: either a literal comparison or a regex
#[derive(Clone)]
pub enum Condition {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Equals(String),
    Matches(String, Regex), // Pattern string + compiled regex
}

// Manual Debug implementation
impl Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Contains(s) => f.debug_tuple("Contains").field(s).finish(),
            Condition::StartsWith(s) => f.debug_tuple("StartsWith").field(s).finish(),
            Condition::EndsWith(s) => f.debug_tuple("EndsWith").field(s).finish(),
            Condition::Equals(s) => f.debug_tuple("Equals").field(s).finish(),
            Condition::Matches(pattern, _) => f.debug_tuple("Matches").field(pattern).finish(),
        }
    }
}

// Manual PartialEq implementation (compare pattern strings, not compiled regex)
impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Condition::Contains(a), Condition::Contains(b)) => a == b,
            (Condition::StartsWith(a), Condition::StartsWith(b)) => a == b,
            (Condition::EndsWith(a), Condition::EndsWith(b)) => a == b,
            (Condition::Equals(a), Condition::Equals(b)) => a == b,
            (Condition::Matches(a, _), Condition::Matches(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Condition {
    /// Test a haystack against this condition
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Condition::Contains(needle) => {
                needle.is_empty() || memmem::find(haystack.as_bytes(), needle.as_bytes()).is_some()
            }
            Condition::StartsWith(prefix) => haystack.starts_with(prefix.as_str()),
            Condition::EndsWith(suffix) => haystack.ends_with(suffix.as_str()),
            Condition::Equals(value) => haystack == value,
            Condition::Matches(_, re) => re.is_match(haystack),
        }
    }

    /// Byte ranges of the haystack matched by this condition, in order
    ///
    /// Occurrences of a literal never overlap. Empty matches are dropped.
    pub fn spans(&self, haystack: &str) -> Vec<Range<usize>> {
        let spans: Vec<Range<usize>> = match self {
            Condition::Contains(needle) => {
                if needle.is_empty() {
                    Vec::new()
                } else {
                    memmem::find_iter(haystack.as_bytes(), needle.as_bytes())
                        .map(|start| start..start + needle.len())
                        .collect()
                }
            }
            Condition::StartsWith(prefix) if haystack.starts_with(prefix.as_str()) => {
                vec![0..prefix.len()]
            }
            Condition::EndsWith(suffix) if haystack.ends_with(suffix.as_str()) => {
                vec![haystack.len() - suffix.len()..haystack.len()]
            }
            Condition::Equals(value) if haystack == value => vec![0..haystack.len()],
            Condition::Matches(_, re) => re.find_iter(haystack).map(|m| m.range()).collect(),
            _ => Vec::new(),
        };

        spans.into_iter().filter(|span| !span.is_empty()).collect()
    }

    /// The literal every matching haystack must contain, if there is one
    pub fn required_literal(&self) -> Option<&str> {
        match self {
            Condition::Contains(s)
            | Condition::StartsWith(s)
            | Condition::EndsWith(s)
            | Condition::Equals(s) => Some(s),
            Condition::Matches(_, _) => None,
        }
    }
}

/// Query expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(bool),
    Test(Field, Condition),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// Parse a query string into an expression
pub fn parse_query(input: &str) -> Result<Expr, QueryError> {
    let mut pairs = QueryParser::parse(Rule::query, input)?;

    // query = SOI ~ expr ~ EOI; the grammar guarantees the expr is there
    let query_pair = pairs.next().ok_or_else(|| empty_query(input))?;
    let expr_pair = query_pair
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::expr)
        .ok_or_else(|| empty_query(input))?;

    parse_expr(expr_pair)
}

fn empty_query(input: &str) -> QueryError {
    QueryError::ParseError(pest::error::Error::new_from_pos(
        pest::error::ErrorVariant::CustomError {
            message: "empty query".to_string(),
        },
        pest::Position::from_start(input),
    ))
}

/// Parse a disjunction: term or term ...
fn parse_expr(pair: Pair<Rule>) -> Result<Expr, QueryError> {
    let terms = pair
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::or_op)
        .map(parse_term)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collapse(terms, Expr::Or))
}

/// Parse a conjunction: factor and factor ...
fn parse_term(pair: Pair<Rule>) -> Result<Expr, QueryError> {
    let factors = pair
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::and_op)
        .map(parse_factor)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collapse(factors, Expr::And))
}

fn collapse(mut items: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        combine(items)
    }
}

fn parse_factor(pair: Pair<Rule>) -> Result<Expr, QueryError> {
    match pair.as_rule() {
        Rule::expr => parse_expr(pair),
        Rule::negation => {
            let inner = pair.into_inner().map(parse_expr).next();
            match inner {
                Some(expr) => Ok(Expr::Not(Box::new(expr?))),
                None => Ok(Expr::Const(true)),
            }
        }
        Rule::constant => {
            let is_true = pair
                .into_inner()
                .next()
                .is_some_and(|lit| lit.as_rule() == Rule::true_lit);
            Ok(Expr::Const(is_true))
        }
        Rule::call => parse_call(pair),
        _ => unreachable!("Unexpected factor: {:?}", pair.as_rule()),
    }
}

/// Parse a test: function(field, 'value')
fn parse_call(pair: Pair<Rule>) -> Result<Expr, QueryError> {
    let mut function = "";
    let mut field = Field::Text;
    let mut value = String::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::function => function = part.as_str(),
            Rule::field => {
                field = if part.as_str() == "name" {
                    Field::Name
                } else {
                    Field::Text
                }
            }
            Rule::string_literal => {
                value = part
                    .into_inner()
                    .next()
                    .map(|inner| inner.as_str().to_string())
                    .unwrap_or_default();
            }
            _ => {}
        }
    }

    let condition = match function {
        "contains" => Condition::Contains(value),
        "starts-with" => Condition::StartsWith(value),
        "ends-with" => Condition::EndsWith(value),
        "equals" => Condition::Equals(value),
        _ => {
            let re = Regex::new(&value).map_err(|source| QueryError::InvalidRegex {
                pattern: value.clone(),
                source,
            })?;
            Condition::Matches(value, re)
        }
    };

    Ok(Expr::Test(field, condition))
}
