// Selector grammar for the operations that take a bare string payload:
// "" selects everything, "3" selects the first three columns, and
// "age, fare" selects by name.

use nom::{
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res},
    multi::separated_list1,
    sequence::delimited,
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    First(usize),
    Names(Vec<String>),
}

/// Parse a selector string. The grammar is total: anything that is not
/// empty and not a whole non-negative integer is read as a comma-separated
/// name list (names may contain spaces; empty segments are dropped).
pub fn parse_selector(input: &str) -> Selector {
    if input.trim().is_empty() {
        return Selector::All;
    }
    if let Ok((_, n)) = all_consuming(ws(count))(input) {
        return Selector::First(n);
    }
    match all_consuming(name_list)(input) {
        Ok((_, names)) if names.is_empty() => Selector::All,
        Ok((_, names)) => Selector::Names(names),
        Err(_) => Selector::Names(vec![input.trim().to_string()]),
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn count(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

fn name_list(input: &str) -> IResult<&str, Vec<String>> {
    map(
        separated_list1(char(','), name_segment),
        |segments: Vec<String>| segments.into_iter().filter(|s| !s.is_empty()).collect(),
    )(input)
}

fn name_segment(input: &str) -> IResult<&str, String> {
    map(
        nom::bytes::complete::take_till(|c| c == ','),
        |s: &str| s.trim().to_string(),
    )(input)
}
