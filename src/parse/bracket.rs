//! Bracket atoms: `[isotope? symbol chirality? hcount? charge? class?]`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize},
    error::{convert_error, VerboseError},
    multi::many1_count,
    sequence::{pair, preceded},
    IResult,
};

pub type Error<'a> = VerboseError<&'a str>;

pub type Res<'a, T> = IResult<&'a str, T, Error<'a>>;

/// The fields of a bracket atom, before the symbol is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketAtom<'a> {
    pub isotope: Option<u16>,
    pub symbol: &'a str,
    pub aromatic: bool,
    pub hydrogens: u8,
    pub charge: i8,
    pub class: Option<u32>,
}

/// Parse the text between `[` and `]`. The error is a readable trace of
/// where the parse stopped.
pub fn parse_bracket_atom(content: &str) -> Result<BracketAtom<'_>, String> {
    match all_consuming(bracket_atom)(content) {
        Ok((_, atom)) => Ok(atom),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(convert_error(content, e)),
        Err(nom::Err::Incomplete(_)) => Err("incomplete bracket atom".to_string()),
    }
}

fn bracket_atom(input: &str) -> Res<BracketAtom> {
    let (input, isotope) = opt(isotope)(input)?;
    let (input, (symbol, aromatic)) = alt((
        map(element_symbol, |s| (s, false)),
        map(aromatic_symbol, |s| (s, true)),
    ))(input)?;
    let (input, _) = opt(chirality)(input)?;
    let (input, hydrogens) = opt(hydrogen_count)(input)?;
    let (input, charge) = opt(charge)(input)?;
    let (input, class) = opt(atom_class)(input)?;
    Ok((
        input,
        BracketAtom {
            isotope,
            symbol,
            aromatic,
            hydrogens: hydrogens.unwrap_or(0),
            charge: charge.unwrap_or(0),
            class,
        },
    ))
}

fn isotope(input: &str) -> Res<u16> {
    map_res(digit1, str::parse::<u16>)(input)
}

fn element_symbol(input: &str) -> Res<&str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        opt(satisfy(|c| c.is_ascii_lowercase())),
    ))(input)
}

fn aromatic_symbol(input: &str) -> Res<&str> {
    alt((
        tag("se"),
        tag("as"),
        tag("b"),
        tag("c"),
        tag("n"),
        tag("o"),
        tag("p"),
        tag("s"),
    ))(input)
}

// Recognized and discarded.
fn chirality(input: &str) -> Res<&str> {
    recognize(preceded(
        char('@'),
        opt(alt((
            tag("@"),
            recognize(pair(
                alt((tag("TH"), tag("AL"), tag("SP"), tag("TB"), tag("OH"))),
                digit1,
            )),
        ))),
    ))(input)
}

fn hydrogen_count(input: &str) -> Res<u8> {
    preceded(
        char('H'),
        map(opt(map_res(digit1, str::parse::<u8>)), |n| n.unwrap_or(1)),
    )(input)
}

fn charge(input: &str) -> Res<i8> {
    alt((
        map(
            pair(one_of("+-"), map_res(digit1, str::parse::<i8>)),
            |(sign, n)| if sign == '+' { n } else { -n },
        ),
        map(many1_count(char('+')), |n| n as i8),
        map(many1_count(char('-')), |n| -(n as i8)),
    ))(input)
}

fn atom_class(input: &str) -> Res<u32> {
    preceded(char(':'), map_res(digit1, str::parse::<u32>))(input)
}
