//! Feature template parser.
//!
//! A template is a whitespace separated list of feature functions:
//!
//! ```text
//! input.word input(1).word stack.tag stack(1) { word pred-tag } input.length(max=5):len
//! ```
//!
//! Each function is a name with an optional argument list, an optional
//! `:alias` and optional nested functions, given either as a single `.child`
//! or as a `{ ... }` group. An argument list starts with an optional integer
//! argument followed by `name=value` parameters; values are bare tokens or
//! double quoted strings with `\` escapes.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, anychar, char, digit1, multispace0, none_of},
    combinator::{cut, map, map_res, opt, recognize},
    multi::{fold_many0, many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::descriptor::{FeatureExtractorDescriptor, FeatureFunctionDescriptor, Parameter};
use crate::errors::{Error, Result};

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
}

fn integer(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i32>())(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((preceded(char('\\'), anychar), none_of("\\\""))),
            String::new,
            |mut value, c| {
                value.push(c);
                value
            },
        ),
        cut(char('"')),
    )(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !"(),=\"{}".contains(c))(input)
}

fn value(input: &str) -> IResult<&str, String> {
    alt((quoted, map(bare, String::from)))(input)
}

fn parameter(input: &str) -> IResult<&str, Parameter> {
    map(
        separated_pair(
            identifier,
            tuple((multispace0, char('='), multispace0)),
            cut(value),
        ),
        |(name, value)| Parameter::new(name, value),
    )(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

/// `( [integer] [, name=value]* )`
fn arguments(input: &str) -> IResult<&str, (i32, Vec<Parameter>)> {
    let (input, _) = pair(char('('), multispace0)(input)?;
    let (input, argument) = opt(integer)(input)?;
    let (input, parameters) = if argument.is_some() {
        many0(preceded(comma, cut(parameter)))(input)?
    } else {
        separated_list0(comma, parameter)(input)?
    };
    let (input, _) = cut(pair(multispace0, char(')')))(input)?;
    Ok((input, (argument.unwrap_or(0), parameters)))
}

fn children(input: &str) -> IResult<&str, Vec<FeatureFunctionDescriptor>> {
    alt((
        map(preceded(char('.'), cut(feature)), |child| vec![child]),
        preceded(
            pair(multispace0, char('{')),
            cut(terminated(
                many0(preceded(multispace0, feature)),
                pair(multispace0, char('}')),
            )),
        ),
    ))(input)
}

fn feature(input: &str) -> IResult<&str, FeatureFunctionDescriptor> {
    let (input, type_name) = identifier(input)?;
    let (input, args) = opt(arguments)(input)?;
    let (input, name) = opt(preceded(char(':'), cut(identifier)))(input)?;
    let (input, features) = opt(children)(input)?;

    let (argument, parameters) = args.unwrap_or_default();
    Ok((
        input,
        FeatureFunctionDescriptor {
            type_name: type_name.to_string(),
            name: name.map(String::from),
            argument,
            parameters,
            features: features.unwrap_or_default(),
        },
    ))
}

fn parse_error(source: &str, remaining: &str, message: &str) -> Error {
    let position = source.len() - remaining.len();
    log::error!("invalid feature template at offset {}: {}", position, message);
    Error::Parse {
        position,
        message: message.to_string(),
    }
}

/// Parse a feature template into a descriptor
///
/// Errors carry the byte offset of the first input that could not be parsed.
pub fn parse(source: &str) -> Result<FeatureExtractorDescriptor> {
    let parsed: IResult<&str, Vec<FeatureFunctionDescriptor>> =
        terminated(many0(preceded(multispace0, feature)), multispace0)(source);
    match parsed {
        Ok(("", features)) => Ok(FeatureExtractorDescriptor { features }),
        Ok((rest, _)) => Err(parse_error(source, rest, "expected feature function")),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let message = format!("unexpected input ({})", e.code.description());
            Err(parse_error(source, e.input, &message))
        }
        Err(nom::Err::Incomplete(_)) => Err(parse_error(source, "", "unexpected end of input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> FeatureFunctionDescriptor {
        let mut descriptor = parse(source).unwrap();
        assert_eq!(descriptor.features.len(), 1);
        descriptor.features.remove(0)
    }

    #[test]
    fn test_parse_simple() {
        let descriptor = parse("input.word  stack.tag\n").unwrap();
        assert_eq!(descriptor.features.len(), 2);
        let input = &descriptor.features[0];
        assert_eq!(input.type_name, "input");
        assert_eq!(input.argument, 0);
        assert_eq!(input.features.len(), 1);
        assert_eq!(input.features[0].type_name, "word");
        assert_eq!(descriptor.features[1].features[0].type_name, "tag");
        assert!(parse("").unwrap().features.is_empty());
        assert!(parse("  \n ").unwrap().features.is_empty());
    }

    #[test]
    fn test_parse_arguments() {
        let f = parse_one("input(-1).length(max=5, unit=\"a \\\"b\\\"\")");
        assert_eq!(f.argument, -1);
        let length = &f.features[0];
        assert_eq!(length.type_name, "length");
        assert_eq!(length.argument, 0);
        assert_eq!(
            length.parameters,
            vec![Parameter::new("max", "5"), Parameter::new("unit", "a \"b\"")]
        );

        let f = parse_one("stack( 2 , stride=2 ).word(min-freq=1,max-num-terms=100)");
        assert_eq!(f.argument, 2);
        assert_eq!(f.parameters, vec![Parameter::new("stride", "2")]);
        assert_eq!(f.features[0].parameters.len(), 2);
        assert_eq!(f.features[0].parameters[1].name, "max-num-terms");
    }

    #[test]
    fn test_parse_groups_and_aliases() {
        let f = parse_one("stack(1):s1 { word:w pred-tag input.head.label }");
        assert_eq!(f.name.as_deref(), Some("s1"));
        assert_eq!(f.features.len(), 3);
        assert_eq!(f.features[0].name.as_deref(), Some("w"));
        assert_eq!(f.features[1].type_name, "pred-tag");
        assert_eq!(f.features[2].features[0].features[0].type_name, "label");
        assert!(parse_one("input {}").features.is_empty());
    }

    #[test]
    fn test_round_trip_text() {
        let source = "input.word:w0 stack(1) { tag length(max=5) } input(2).word(sep=\"a b\")";
        let descriptor = parse(source).unwrap();
        assert_eq!(descriptor.to_string(), source);
        assert_eq!(parse(&descriptor.to_string()).unwrap(), descriptor);
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("input(1", 7),
            ("input.", 6),
            ("input { word", 12),
            ("word(max=)", 9),
            ("input.word )", 11),
            ("word(x=\"open", 12),
            ("word:", 5),
        ];
        for (source, expected) in cases.iter() {
            match parse(source) {
                Err(Error::Parse { position, .. }) => {
                    assert_eq!(position, *expected, "position for {:?}", source)
                }
                other => panic!("unexpected result for {:?}: {:?}", source, other),
            }
        }
        assert!(parse("input(1").unwrap_err().is_configuration());
    }
}
