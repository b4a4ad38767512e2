//! Frame decoder
//!
//! Turns one `\r\n`-stripped line of space-separated decimal tokens into a
//! [`Frame`]. Two wire shapes exist:
//!
//! - [`FrameShape::PackedBytes`] (radio bridge): `node lsb msb [lsb msb ...]`,
//!   each value is a little-endian signed 16-bit pair
//! - [`FrameShape::PlainValues`] (socket feed): `node value [value ...]`
//!
//! Lines starting with `>` or `->` are bridge chatter and decode to
//! [`Frame::Info`].

use contracts::Reading;

use crate::error::DecodeError;

/// Wire shape of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    /// Node id followed by lsb/msb byte pairs
    PackedBytes,
    /// Node id followed by signed integers
    PlainValues,
}

impl FrameShape {
    fn min_tokens(self) -> usize {
        match self {
            Self::PackedBytes => 3,
            Self::PlainValues => 2,
        }
    }
}

/// Outcome of decoding a well-formed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Sensor data
    Reading(Reading),
    /// Informational line, not data
    Info(String),
}

/// Decode a single line
pub fn decode(line: &str, shape: FrameShape) -> Result<Frame, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let Some(first) = tokens.first() else {
        return Err(DecodeError::Empty);
    };
    if matches!(*first, ">" | "->") {
        return Ok(Frame::Info(line.trim().to_string()));
    }

    let min = shape.min_tokens();
    if tokens.len() < min {
        return Err(DecodeError::TooFewTokens {
            count: tokens.len(),
            min,
        });
    }

    let reading = match shape {
        FrameShape::PackedBytes => decode_packed(&tokens)?,
        FrameShape::PlainValues => decode_plain(&tokens)?,
    };
    Ok(Frame::Reading(reading))
}

fn decode_packed(tokens: &[&str]) -> Result<Reading, DecodeError> {
    if tokens.len() % 2 == 0 {
        return Err(DecodeError::EvenTokenCount {
            count: tokens.len(),
        });
    }

    let node_id = parse_token::<i64>(tokens[0])?;
    let values = tokens[1..]
        .chunks_exact(2)
        .map(|pair| {
            let lsb = i64::from(parse_token::<i32>(pair[0])?);
            let msb = i64::from(parse_token::<i32>(pair[1])?);
            Ok(combine_bytes(lsb, msb))
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(Reading::new(node_id, values))
}

fn decode_plain(tokens: &[&str]) -> Result<Reading, DecodeError> {
    let node_id = parse_token::<i64>(tokens[0])?;
    let values = tokens[1..]
        .iter()
        .map(|token| parse_token::<i64>(token))
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(Reading::new(node_id, values))
}

/// `lsb + 256 * msb`, folded into the signed range above 32768
fn combine_bytes(lsb: i64, msb: i64) -> i64 {
    let value = lsb + 256 * msb;
    if value > 32768 {
        value - 65536
    } else {
        value
    }
}

fn parse_token<T: std::str::FromStr>(token: &str) -> Result<T, DecodeError> {
    token.parse().map_err(|_| DecodeError::NotNumeric {
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(line: &str, shape: FrameShape) -> Reading {
        match decode(line, shape) {
            Ok(Frame::Reading(reading)) => reading,
            other => panic!("expected reading for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_packed_frame() {
        let r = reading("10 69 6 144 0", FrameShape::PackedBytes);
        assert_eq!(r, Reading::new(10, vec![1605, 144]));
    }

    #[test]
    fn test_packed_negative_values() {
        // 0xFFFF -> -1, 0x8001 -> -32767
        let r = reading("5 255 255 1 128", FrameShape::PackedBytes);
        assert_eq!(r.values, vec![-1, -32767]);
    }

    #[test]
    fn test_packed_boundary_stays_positive() {
        // exactly 32768 is not folded
        let r = reading("5 0 128", FrameShape::PackedBytes);
        assert_eq!(r.values, vec![32768]);
    }

    #[test]
    fn test_packed_even_token_count() {
        assert_eq!(
            decode("10 69 6 144", FrameShape::PackedBytes),
            Err(DecodeError::EvenTokenCount { count: 4 })
        );
    }

    #[test]
    fn test_packed_too_few_tokens() {
        assert_eq!(
            decode("10 69", FrameShape::PackedBytes),
            Err(DecodeError::TooFewTokens { count: 2, min: 3 })
        );
    }

    #[test]
    fn test_non_numeric_token() {
        assert_eq!(
            decode("10 69 x6", FrameShape::PackedBytes),
            Err(DecodeError::NotNumeric {
                token: "x6".to_string()
            })
        );
        assert!(matches!(
            decode("10 1.5", FrameShape::PlainValues),
            Err(DecodeError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_informational_lines() {
        assert_eq!(
            decode("> starting", FrameShape::PackedBytes),
            Ok(Frame::Info("> starting".to_string()))
        );
        assert!(matches!(
            decode("-> 15i", FrameShape::PackedBytes),
            Ok(Frame::Info(_))
        ));
        // '>' glued to text is not a marker token
        assert!(decode(">starting", FrameShape::PackedBytes).is_err());
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(decode("", FrameShape::PackedBytes), Err(DecodeError::Empty));
        assert_eq!(decode("   ", FrameShape::PlainValues), Err(DecodeError::Empty));
    }

    #[test]
    fn test_plain_frame() {
        let r = reading("15 -3 1664 0", FrameShape::PlainValues);
        assert_eq!(r, Reading::new(15, vec![-3, 1664, 0]));
    }

    #[test]
    fn test_plain_too_few_tokens() {
        assert_eq!(
            decode("15", FrameShape::PlainValues),
            Err(DecodeError::TooFewTokens { count: 1, min: 2 })
        );
    }

    #[test]
    fn test_extra_whitespace_is_ignored() {
        let r = reading("  10   69 6\t", FrameShape::PackedBytes);
        assert_eq!(r, Reading::new(10, vec![1605]));
    }
}
