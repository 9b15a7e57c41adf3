//! Literal argument encoding
//!
//! Node parameters are passed to the remote callable as literal arguments:
//! sequences become `ARRAY_CONSTRUCT(...)`, booleans `TRUE`/`FALSE`, strings
//! single-quoted literals. [`parse_args`] reads the same grammar back, so a
//! rendered argument list can be checked against the values it came from.

use crate::domain::definition::{INPUT_DATA, IS_LOCAL, OUTPUT_DATA, Parameters, Value};
use crate::error::LiteralError;

/// Parameters that lead every invocation, in this order
pub const CANONICAL_PARAMETERS: [&str; 3] = [INPUT_DATA, OUTPUT_DATA, IS_LOCAL];

/// Renders a single-quoted string literal
///
/// Backslashes are doubled and single quotes are written as `''`.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => quote_string(s),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(|item| quote_string(item)).collect();
            format!("ARRAY_CONSTRUCT({})", items.join(", "))
        }
    }
}

pub fn render_args(args: &[Value]) -> String {
    args.iter().map(render_value).collect::<Vec<_>>().join(", ")
}

/// Orders node parameters into the callable's argument list
///
/// `input_data`, `output_data` and `is_local` always come first so the call
/// matches the registered signature; a missing sequence becomes an empty one
/// and a missing flag becomes `false`. Any other parameters follow in
/// declaration order.
pub fn invocation_args(parameters: &Parameters) -> Vec<Value> {
    let mut args = vec![
        parameters
            .get(INPUT_DATA)
            .cloned()
            .unwrap_or(Value::Sequence(Vec::new())),
        parameters
            .get(OUTPUT_DATA)
            .cloned()
            .unwrap_or(Value::Sequence(Vec::new())),
        parameters
            .get(IS_LOCAL)
            .cloned()
            .unwrap_or(Value::Bool(false)),
    ];

    args.extend(
        parameters
            .iter()
            .filter(|(key, _)| !CANONICAL_PARAMETERS.contains(key))
            .map(|(_, value)| value.clone()),
    );

    args
}

/// Parses a rendered argument list back into values
pub fn parse_args(input: &str) -> Result<Vec<Value>, LiteralError> {
    let mut parser = Parser {
        chars: input.char_indices().peekable(),
        input,
    };
    let mut values = Vec::new();

    parser.skip_whitespace();
    if parser.at_end() {
        return Ok(values);
    }

    loop {
        values.push(parser.value()?);
        parser.skip_whitespace();
        match parser.next() {
            None => return Ok(values),
            Some((_, ',')) => parser.skip_whitespace(),
            Some((pos, c)) => return Err(LiteralError::Unexpected { found: c, pos }),
        }
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some((_, '\'')) => self.string().map(Value::String),
            Some((start, c)) if c.is_ascii_alphabetic() => {
                let word = self.word();
                match word.to_ascii_uppercase().as_str() {
                    "TRUE" => Ok(Value::Bool(true)),
                    "FALSE" => Ok(Value::Bool(false)),
                    "ARRAY_CONSTRUCT" => self.sequence().map(Value::Sequence),
                    _ => Err(LiteralError::UnknownKeyword {
                        word: word.to_string(),
                        pos: start,
                    }),
                }
            }
            Some((pos, c)) => Err(LiteralError::Unexpected { found: c, pos }),
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.peek().map(|(pos, _)| pos).unwrap_or(self.input.len());
        let mut end = start;
        while let Some((pos, c)) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        &self.input[start..end]
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        // opening quote
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.next() {
                None => return Err(LiteralError::UnterminatedString),
                Some((_, '\\')) => match self.next() {
                    Some((_, c)) => out.push(c),
                    None => return Err(LiteralError::UnterminatedString),
                },
                Some((_, '\'')) => {
                    if matches!(self.peek(), Some((_, '\''))) {
                        self.chars.next();
                        out.push('\'');
                    } else {
                        return Ok(out);
                    }
                }
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn sequence(&mut self) -> Result<Vec<String>, LiteralError> {
        self.skip_whitespace();
        match self.next() {
            Some((_, '(')) => {}
            Some((pos, c)) => return Err(LiteralError::Unexpected { found: c, pos }),
            None => return Err(LiteralError::UnexpectedEnd),
        }

        let mut items = Vec::new();
        self.skip_whitespace();
        if matches!(self.peek(), Some((_, ')'))) {
            self.chars.next();
            return Ok(items);
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some((_, '\'')) => items.push(self.string()?),
                Some((pos, c)) => return Err(LiteralError::Unexpected { found: c, pos }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
            self.skip_whitespace();
            match self.next() {
                Some((_, ',')) => continue,
                Some((_, ')')) => return Ok(items),
                Some((pos, c)) => return Err(LiteralError::Unexpected { found: c, pos }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn housing_params() -> Parameters {
        Parameters::new()
            .with(INPUT_DATA, Value::sequence(["housing"]))
            .with(OUTPUT_DATA, Value::sequence(["processed_housing"]))
            .with(IS_LOCAL, true)
    }

    #[test]
    fn test_render_housing_parameters() {
        let rendered = render_args(&invocation_args(&housing_params()));
        assert_eq!(
            rendered,
            "ARRAY_CONSTRUCT('housing'), ARRAY_CONSTRUCT('processed_housing'), TRUE"
        );
    }

    #[test]
    fn test_housing_parameters_parse_back_in_order() {
        let rendered = render_args(&invocation_args(&housing_params()));
        let parsed = parse_args(&rendered).unwrap();
        assert_eq!(
            parsed,
            vec![
                Value::sequence(["housing"]),
                Value::sequence(["processed_housing"]),
                Value::Bool(true),
            ]
        );
    }

    #[test]
    fn test_canonical_parameters_lead_and_default() {
        let params = Parameters::new()
            .with("mode", "fast")
            .with(OUTPUT_DATA, Value::sequence(["metrics"]));

        assert_eq!(
            invocation_args(&params),
            vec![
                Value::Sequence(vec![]),
                Value::sequence(["metrics"]),
                Value::Bool(false),
                Value::from("fast"),
            ]
        );
    }

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(quote_string("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_parse_empty_sequence_and_keywords() {
        let parsed = parse_args("ARRAY_CONSTRUCT( ), false , 'x'").unwrap();
        assert_eq!(
            parsed,
            vec![Value::Sequence(vec![]), Value::Bool(false), Value::from("x")]
        );
        assert!(parse_args("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            parse_args("'open"),
            Err(LiteralError::UnterminatedString)
        ));
        assert!(matches!(
            parse_args("NULL"),
            Err(LiteralError::UnknownKeyword { .. })
        ));
        assert!(matches!(
            parse_args("TRUE FALSE"),
            Err(LiteralError::Unexpected { found: 'F', .. })
        ));
        assert!(matches!(
            parse_args("ARRAY_CONSTRUCT('a',"),
            Err(LiteralError::UnexpectedEnd)
        ));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            ".*".prop_map(Value::String),
            prop::collection::vec(".*", 0..4).prop_map(Value::Sequence),
        ]
    }

    proptest! {
        #[test]
        fn rendered_args_parse_back(values in prop::collection::vec(value_strategy(), 0..5)) {
            let rendered = render_args(&values);
            prop_assert_eq!(parse_args(&rendered).unwrap(), values);
        }
    }
}
