use std::io::{self, BufRead};

const BOM: &[u8] = b"\xef\xbb\xbf";

/// Consume a leading UTF-8 byte order mark, if any.
pub(crate) fn strip_bom<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<()> {
    let input = reader.fill_buf()?;

    if input.starts_with(BOM) {
        reader.consume(BOM.len());
    }

    Ok(())
}

#[inline]
pub(crate) fn trim_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}

pub(crate) fn trim_trailing_crlf(line: &str) -> &str {
    if let Some(stripped) = line.strip_suffix("\r\n") {
        stripped
    } else if let Some(stripped) = line.strip_suffix('\n') {
        stripped
    } else {
        line.strip_suffix('\r').unwrap_or(line)
    }
}

/// Read one physical line, terminator included, lossily decoding it.
/// Returns `false` at end of input.
pub(crate) fn read_line<R: BufRead + ?Sized>(
    reader: &mut R,
    scratch: &mut Vec<u8>,
    line: &mut String,
) -> io::Result<bool> {
    scratch.clear();
    line.clear();

    if reader.read_until(b'\n', scratch)? == 0 {
        return Ok(false);
    }

    line.push_str(&String::from_utf8_lossy(scratch));

    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_trim_trailing_crlf() {
        assert_eq!(trim_trailing_crlf("a,b\r\n"), "a,b");
        assert_eq!(trim_trailing_crlf("a,b\n"), "a,b");
        assert_eq!(trim_trailing_crlf("a,b\r"), "a,b");
        assert_eq!(trim_trailing_crlf("\n"), "");
        assert_eq!(trim_trailing_crlf(""), "");
    }

    #[test]
    fn test_strip_bom() -> io::Result<()> {
        let mut reader = Cursor::new(b"\xef\xbb\xbfa,b".to_vec());
        strip_bom(&mut reader)?;

        let mut rest = String::new();
        reader.read_line(&mut rest)?;
        assert_eq!(rest, "a,b");

        assert_eq!(trim_bom("\u{feff}x"), "x");

        Ok(())
    }

    #[test]
    fn test_read_line() -> io::Result<()> {
        let mut reader = Cursor::new("a\r\nb");
        let mut scratch = Vec::new();
        let mut line = String::new();

        assert!(read_line(&mut reader, &mut scratch, &mut line)?);
        assert_eq!(line, "a\r\n");
        assert!(read_line(&mut reader, &mut scratch, &mut line)?);
        assert_eq!(line, "b");
        assert!(!read_line(&mut reader, &mut scratch, &mut line)?);

        Ok(())
    }
}
