//! Console input
//!
//! Blocking reads from the host's input stream for the two read-side
//! virtual routines. Reads go through `BufRead` so that the integer
//! scanner can stop at the first non-digit without consuming it.

use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("error reading from stdin: {0}")]
    Io(#[from] io::Error),
    #[error("expected a signed decimal integer on stdin")]
    NotAnInteger,
}

fn peek(input: &mut dyn BufRead) -> io::Result<Option<u8>> {
    let buf = input.fill_buf()?;
    Ok(buf.first().copied())
}

/// Read one byte from the console. End of input reads as all ones, so
/// programs can test for it with a full-word load.
pub fn read_char(input: &mut dyn BufRead) -> Result<u32, ConsoleError> {
    match peek(input)? {
        Some(byte) => {
            input.consume(1);
            Ok(byte.into())
        }
        None => Ok(0xffff_ffff),
    }
}

/// Read a signed decimal integer from the console: skip leading
/// whitespace, accept an optional sign and then digits, and stop at
/// (without consuming) the first non-digit. Fails if no digits are
/// present or the value does not fit in an i32.
pub fn read_int(input: &mut dyn BufRead) -> Result<i32, ConsoleError> {
    while let Some(byte) = peek(input)? {
        if !byte.is_ascii_whitespace() {
            break;
        }
        input.consume(1);
    }

    let mut token = String::new();
    if let Some(byte @ (b'+' | b'-')) = peek(input)? {
        token.push(byte as char);
        input.consume(1);
    }
    while let Some(byte) = peek(input)? {
        if !byte.is_ascii_digit() {
            break;
        }
        token.push(byte as char);
        input.consume(1);
    }

    if !token.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(ConsoleError::NotAnInteger);
    }
    token.parse().map_err(|_| ConsoleError::NotAnInteger)
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::Cursor;

    #[test]
    fn check_read_char() {
        let mut input = Cursor::new(b"Ab");
        assert_eq!(read_char(&mut input).unwrap(), 0x41);
        assert_eq!(read_char(&mut input).unwrap(), 0x62);
        assert_eq!(read_char(&mut input).unwrap(), 0xffff_ffff);
    }

    #[test]
    fn check_read_int() {
        let mut input = Cursor::new(b"42");
        assert_eq!(read_int(&mut input).unwrap(), 42);
    }

    #[test]
    fn check_read_int_skips_whitespace_and_signs() {
        let mut input = Cursor::new(b"  \t\n -17");
        assert_eq!(read_int(&mut input).unwrap(), -17);
        let mut input = Cursor::new(b"+99");
        assert_eq!(read_int(&mut input).unwrap(), 99);
    }

    #[test]
    fn check_read_int_stops_at_first_non_digit() {
        let mut input = Cursor::new(b"123abc");
        assert_eq!(read_int(&mut input).unwrap(), 123);
        // The trailing bytes are still in the stream
        assert_eq!(read_char(&mut input).unwrap(), u32::from(b'a'));
    }

    #[test]
    fn check_read_int_rejects_junk() {
        assert!(read_int(&mut Cursor::new(b"abc")).is_err());
        assert!(read_int(&mut Cursor::new(b"-")).is_err());
        assert!(read_int(&mut Cursor::new(b"")).is_err());
        // Does not fit in an i32
        assert!(read_int(&mut Cursor::new(b"99999999999")).is_err());
    }
}
