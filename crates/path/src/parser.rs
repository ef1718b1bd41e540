//! A `nom`-based parser for scalar path expressions.

use super::ast::*;
use crate::error::PathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parser ---

pub fn parse_path(input: &str) -> Result<PathExpr, PathError> {
    match path_expr(input.trim()) {
        Ok(("", path)) => Ok(path),
        Ok((rem, _)) => Err(PathError::Parse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(PathError::Parse(input.to_string(), e.to_string())),
    }
}

/// Parses a path at the start of `input`, leaving whatever follows it.
///
/// Template parsers embed this to read `{$x/a/text()}` blocks in place.
pub fn path_expr(input: &str) -> IResult<&str, PathExpr> {
    let (i, variable) = variable_reference(input)?;
    let (i, steps) = many0(preceded(char('/'), step)).parse(i)?;
    Ok((
        i,
        PathExpr {
            variable: variable.to_string(),
            steps,
        },
    ))
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

// --- Name Parsers ---

pub fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

pub fn variable_reference(input: &str) -> IResult<&str, &str> {
    preceded(char('$'), nc_name).parse(input)
}

// --- Step Parsers ---

fn text_test(input: &str) -> IResult<&str, Step> {
    value(
        Step::Text,
        terminated(tag("text"), pair(ws(char('(')), char(')'))),
    )
    .parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    alt((
        // `text()` must win over a column that happens to be called `text`.
        text_test,
        map(preceded(char('@'), nc_name), |name: &str| {
            Step::Attribute(name.to_string())
        }),
        map(nc_name, |name: &str| Step::Child(name.to_string())),
    ))
    .parse(input)
}
