//! Line-oriented user input

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Source of user lines, stdin in the binary and an in-memory buffer in tests
pub struct InputReader<R> {
    lines: Lines<R>,
}

impl InputReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> InputReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Waits for the next line; `None` once the input is closed
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_lines_until_eof() {
        let mut input = InputReader::new(BufReader::new(&b"hello\n/join 4\r\nlast"[..]));

        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("/join 4"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }
}
