//! Sequential reader over the flat, delimiter-tolerant weight token stream.
//!
//! Commas and whitespace are separators, not structure. Stages consume the
//! stream in a single fixed global order; a stage joining mid-stream skips
//! exactly the token count owned by the segments ordered before its own.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::compute::WeightMatrix;
use crate::error::{PipelineErr, Result};

fn is_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b',')
}

/// Sequential token reader over any buffered byte source.
pub struct WeightStream<R> {
    reader: R,
    tokens_read: usize,
}

impl WeightStream<BufReader<File>> {
    /// Opens the weight source at `path`.
    ///
    /// # Returns
    /// A stream positioned at token 0, or `WeightSourceUnavailable` if the
    /// file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(PipelineErr::WeightSourceUnavailable)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> WeightStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            tokens_read: 0,
        }
    }

    /// Number of tokens consumed so far.
    pub fn tokens_read(&self) -> usize {
        self.tokens_read
    }

    /// Returns the next numeric token.
    ///
    /// Skips separator bytes, then parses the maximal non-separator run as a
    /// floating-point literal; the separator terminating the literal is also
    /// consumed. A parse failure or an exhausted stream is fatal
    /// `MalformedWeightData`.
    pub fn next(&mut self) -> Result<f64> {
        let token = self.next_token()?;
        match token.parse::<f64>() {
            Ok(value) => {
                self.tokens_read += 1;
                Ok(value)
            }
            Err(_) => Err(PipelineErr::MalformedWeightData {
                token_index: self.tokens_read,
                detail: format!("not a floating-point literal: {token:?}"),
            }),
        }
    }

    /// Discards the next `n` tokens.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.next()?;
        }
        Ok(())
    }

    /// Reads `neuron_count * input_width` tokens into a row-major matrix,
    /// one row per neuron.
    pub fn read_matrix(&mut self, neuron_count: usize, input_width: usize) -> Result<WeightMatrix> {
        let len = neuron_count * input_width;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(self.next()?);
        }
        Ok(WeightMatrix::new(neuron_count, input_width, data))
    }

    fn next_token(&mut self) -> Result<String> {
        // Skip leading separators.
        loop {
            let buf = self
                .reader
                .fill_buf()
                .map_err(PipelineErr::WeightSourceUnavailable)?;
            if buf.is_empty() {
                return Err(self.end_of_stream());
            }
            match buf.iter().position(|b| !is_separator(*b)) {
                Some(start) => {
                    self.reader.consume(start);
                    break;
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }

        // Collect bytes up to the next separator; consume that separator too.
        let mut token = Vec::new();
        loop {
            let buf = self
                .reader
                .fill_buf()
                .map_err(PipelineErr::WeightSourceUnavailable)?;
            if buf.is_empty() {
                break;
            }
            match buf.iter().position(|b| is_separator(*b)) {
                Some(end) => {
                    token.extend_from_slice(&buf[..end]);
                    self.reader.consume(end + 1);
                    break;
                }
                None => {
                    token.extend_from_slice(buf);
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }

        Ok(String::from_utf8_lossy(&token).into_owned())
    }

    fn end_of_stream(&self) -> PipelineErr {
        PipelineErr::MalformedWeightData {
            token_index: self.tokens_read,
            detail: "unexpected end of weight stream".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(text: &'static str) -> WeightStream<Cursor<&'static [u8]>> {
        WeightStream::new(Cursor::new(text.as_bytes()))
    }

    #[test]
    fn tokenizes_mixed_separators() {
        let mut ws = stream("1.5, 2.5  ,3\n-4e2,,  0.25,");
        for expected in [1.5, 2.5, 3.0, -400.0, 0.25] {
            assert_eq!(ws.next().unwrap(), expected);
        }
        assert_eq!(ws.tokens_read(), 5);

        let err = ws.next().unwrap_err();
        assert!(matches!(
            err,
            PipelineErr::MalformedWeightData { token_index: 5, .. }
        ));
    }

    #[test]
    fn skip_discards_exactly_n_tokens() {
        let mut ws = stream("0, 1, 2, 3, 4");
        ws.skip(3).unwrap();
        assert_eq!(ws.next().unwrap(), 3.0);
        assert_eq!(ws.tokens_read(), 4);
    }

    #[test]
    fn malformed_literal_reports_token_index() {
        let mut ws = stream("1.5, abc, 2.0");
        ws.next().unwrap();
        let err = ws.next().unwrap_err();
        match err {
            PipelineErr::MalformedWeightData {
                token_index,
                detail,
            } => {
                assert_eq!(token_index, 1);
                assert!(detail.contains("abc"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn read_matrix_is_row_major_by_neuron() {
        let mut ws = stream("1, 2, 3, 4, 5, 6");
        let matrix = ws.read_matrix(3, 2).unwrap();
        assert_eq!(matrix.row(0), &[1.0, 2.0]);
        assert_eq!(matrix.row(1), &[3.0, 4.0]);
        assert_eq!(matrix.row(2), &[5.0, 6.0]);
    }

    #[test]
    fn read_matrix_fails_on_short_stream() {
        let mut ws = stream("1, 2, 3");
        let err = ws.read_matrix(2, 2).unwrap_err();
        assert!(matches!(
            err,
            PipelineErr::MalformedWeightData { token_index: 3, .. }
        ));
    }
}
