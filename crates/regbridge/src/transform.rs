//! Transform parameter file parser.
//!
//! The file is a flat list of declarations, one per line:
//!
//! ```text
//! // comment
//! (Transform "TranslationTransform")
//! (NumberOfParameters 2)
//! (TransformParameters -2.4571 0.3162)
//! (Size 256 256)
//! ```
//!
//! Unquoted tokens that look numeric become numbers; everything else is kept
//! as text. Lines that do not have the `(Key Value)` shape are skipped.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;

use crate::error::{RegistrationError, RegistrationResult};

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Numbers(Vec<f64>),
    Texts(Vec<String>),
}

impl ParamValue {
    /// Returns the value as a single number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a single string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a numeric sequence. A lone number is a sequence of one.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            ParamValue::Number(n) => Some(vec![*n]),
            ParamValue::Numbers(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn as_count(&self) -> Option<usize> {
        self.as_number()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize)
    }

    fn as_integers(&self) -> Option<Vec<i64>> {
        self.as_numbers()?
            .into_iter()
            .map(|n| (n.fract() == 0.0).then_some(n as i64))
            .collect()
    }

    fn as_flag(&self) -> Option<bool> {
        match self.as_text()? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    fn as_string(&self) -> Option<String> {
        self.as_text().map(str::to_string)
    }
}

/// Contents of a transform parameter file.
///
/// Documented keys are lifted into typed fields. Keys that are unknown, or
/// whose value does not have the expected type, land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransformRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_parameters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_parameters: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_transform_parameters_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_combine_transforms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_image_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_image_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_internal_image_pixel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_internal_image_pixel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_direction_cosines: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_of_rotation_point: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resample_interpolator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resampler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pixel_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_image_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_image_pixel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress_result_image: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ParamValue>,
}

fn assign<T>(
    slot: &mut Option<T>,
    value: ParamValue,
    convert: impl Fn(&ParamValue) -> Option<T>,
) -> Option<ParamValue> {
    match convert(&value) {
        Some(v) => {
            *slot = Some(v);
            None
        }
        None => Some(value),
    }
}

impl TransformRecord {
    /// Records one declaration. Later declarations of a key replace earlier ones.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        let leftover = match key.as_str() {
            "Transform" => assign(&mut self.transform, value, ParamValue::as_string),
            "NumberOfParameters" => {
                assign(&mut self.number_of_parameters, value, ParamValue::as_count)
            }
            "TransformParameters" => {
                assign(&mut self.transform_parameters, value, ParamValue::as_numbers)
            }
            "InitialTransformParametersFileName" => assign(
                &mut self.initial_transform_parameters_file_name,
                value,
                ParamValue::as_string,
            ),
            "HowToCombineTransforms" => {
                assign(&mut self.how_to_combine_transforms, value, ParamValue::as_string)
            }
            "FixedImageDimension" => {
                assign(&mut self.fixed_image_dimension, value, ParamValue::as_count)
            }
            "MovingImageDimension" => {
                assign(&mut self.moving_image_dimension, value, ParamValue::as_count)
            }
            "FixedInternalImagePixelType" => assign(
                &mut self.fixed_internal_image_pixel_type,
                value,
                ParamValue::as_string,
            ),
            "MovingInternalImagePixelType" => assign(
                &mut self.moving_internal_image_pixel_type,
                value,
                ParamValue::as_string,
            ),
            "Size" => assign(&mut self.size, value, ParamValue::as_integers),
            "Index" => assign(&mut self.index, value, ParamValue::as_integers),
            "Spacing" => assign(&mut self.spacing, value, ParamValue::as_numbers),
            "Origin" => assign(&mut self.origin, value, ParamValue::as_numbers),
            "Direction" => assign(&mut self.direction, value, ParamValue::as_numbers),
            "UseDirectionCosines" => {
                assign(&mut self.use_direction_cosines, value, ParamValue::as_flag)
            }
            "CenterOfRotationPoint" => {
                assign(&mut self.center_of_rotation_point, value, ParamValue::as_numbers)
            }
            "ResampleInterpolator" => {
                assign(&mut self.resample_interpolator, value, ParamValue::as_string)
            }
            "Resampler" => assign(&mut self.resampler, value, ParamValue::as_string),
            "DefaultPixelValue" => {
                assign(&mut self.default_pixel_value, value, ParamValue::as_number)
            }
            "ResultImageFormat" => {
                assign(&mut self.result_image_format, value, ParamValue::as_string)
            }
            "ResultImagePixelType" => {
                assign(&mut self.result_image_pixel_type, value, ParamValue::as_string)
            }
            "CompressResultImage" => {
                assign(&mut self.compress_result_image, value, ParamValue::as_flag)
            }
            _ => Some(value),
        };

        if let Some(value) = leftover {
            self.extra.insert(key, value);
        }
    }

    /// Looks up a key that has no typed field.
    pub fn extra(&self, key: &str) -> Option<&ParamValue> {
        self.extra.get(key)
    }
}

/// Parses a transform parameter file.
pub fn parse_transform(path: &Path) -> RegistrationResult<TransformRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RegistrationError::MissingResultFile {
            path: path.to_path_buf(),
        },
        _ => RegistrationError::Io(e),
    })?;
    Ok(parse_transform_str(&content))
}

/// Parses transform parameter text.
pub fn parse_transform_str(content: &str) -> TransformRecord {
    let mut record = TransformRecord::default();
    for line in content.lines() {
        if let Some((key, value)) = parse_line(line) {
            record.insert(key, value);
        }
    }
    record
}

#[derive(Debug, PartialEq)]
enum Token {
    Quoted(String),
    Bare(String),
}

fn parse_line(line: &str) -> Option<(&str, ParamValue)> {
    let line = strip_comment(line).trim();
    let inner = line.strip_prefix('(')?.strip_suffix(')')?.trim();

    let (key, rest) = match inner.find(char::is_whitespace) {
        Some(split) => (&inner[..split], inner[split..].trim()),
        None => (inner, ""),
    };
    if !is_identifier(key) {
        return None;
    }

    let rest = strip_brackets(rest);
    let tokens = tokenize(rest)?;
    Some((key, value_from_tokens(tokens)?))
}

/// Cuts a trailing `//` comment that is not inside a quoted string.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'/' if !in_quotes && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn strip_brackets(value: &str) -> &str {
    for (open, close) in [('[', ']'), ('(', ')')] {
        if let Some(inner) = value.strip_prefix(open).and_then(|v| v.strip_suffix(close)) {
            return inner.trim();
        }
    }
    value
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits on whitespace, keeping quoted strings whole. `None` on an unterminated quote.
fn tokenize(value: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = value.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next()? {
                    '"' => break,
                    ch => text.push(ch),
                }
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut text = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' {
                    break;
                }
                text.push(ch);
                chars.next();
            }
            tokens.push(Token::Bare(text));
        }
    }

    Some(tokens)
}

fn parse_number(raw: &str) -> Option<f64> {
    let numeric_syntax = raw.chars().any(|c| c.is_ascii_digit())
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if numeric_syntax {
        raw.parse().ok()
    } else {
        None
    }
}

fn value_from_tokens(tokens: Vec<Token>) -> Option<ParamValue> {
    match tokens.len() {
        0 => None,
        1 => Some(match tokens.into_iter().next()? {
            Token::Quoted(s) => ParamValue::Text(s),
            Token::Bare(s) => parse_number(&s)
                .map(ParamValue::Number)
                .unwrap_or(ParamValue::Text(s)),
        }),
        _ => {
            let numbers: Option<Vec<f64>> = tokens
                .iter()
                .map(|t| match t {
                    Token::Bare(s) => parse_number(s),
                    Token::Quoted(_) => None,
                })
                .collect();
            Some(match numbers {
                Some(numbers) => ParamValue::Numbers(numbers),
                None => ParamValue::Texts(
                    tokens
                        .into_iter()
                        .map(|t| match t {
                            Token::Quoted(s) | Token::Bare(s) => s,
                        })
                        .collect(),
                ),
            })
        }
    }
}
