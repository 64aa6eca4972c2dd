//! Line filter applied to the merged output of `glslangValidator`.

use std::{
    ffi::{OsStr, OsString},
    io::{self, BufRead, BufReader, Read, Write},
};

/// Diagnostic printed by `glslangValidator` for every `#version 450` shader.
pub const NOISY_DIAGNOSTIC: &str = "version 450 is not yet complete";

/// Lazy iterator over the lines of a reader.
///
/// Each item has its `\n` terminator removed, along with a `\r` right before it.
/// Iteration ends on end of stream. A read error is logged and also ends iteration.
#[derive(Debug)]
pub struct OutputLines<R> {
    /// Source of the lines.
    reader: R,
    /// Set once end of stream or an error was seen.
    done: bool,
}

impl<R: BufRead> OutputLines<R> {
    /// Creates an iterator over the lines of `reader`.
    #[inline]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for OutputLines<R> {
    type Item = Vec<u8>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
            Err(err) => {
                log::debug!("treating read error as end of output: {err}");
                self.done = true;
                None
            }
        }
    }
}

/// Decides which output lines are relayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct LineFilter {
    /// Lines exactly equal to this are dropped; ninja prints the source file name already.
    pub echoed: Option<OsString>,
}

impl LineFilter {
    /// Creates a filter dropping lines equal to `echoed`, if given.
    #[inline]
    #[must_use]
    pub fn new(echoed: Option<&OsStr>) -> Self {
        Self {
            echoed: echoed.map(OsStr::to_os_string),
        }
    }

    /// Creates a filter dropping lines equal to the last of the original (not rewritten) `args`.
    #[inline]
    #[must_use]
    pub fn from_args<S: AsRef<OsStr>>(args: &[S]) -> Self {
        Self::new(args.last().map(AsRef::as_ref))
    }

    /// Whether `line` (without its terminator) is relayed.
    #[inline]
    #[must_use]
    pub fn keeps(&self, line: &[u8]) -> bool {
        if contains(line, NOISY_DIAGNOSTIC.as_bytes()) {
            return false;
        }
        match &self.echoed {
            Some(echoed) => line != echoed.as_encoded_bytes(),
            None => true,
        }
    }

    /// Reads `reader` line by line until end of stream and writes every kept line,
    /// followed by `\n`, to `writer`.
    ///
    /// The writer is flushed after each line so output shows up as the compiler produces it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `writer` fails. Read errors end the relay instead.
    #[inline]
    pub fn relay<R: Read, W: Write>(&self, reader: R, mut writer: W) -> io::Result<RelayStats> {
        let mut stats = RelayStats::default();
        for line in OutputLines::new(BufReader::new(reader)) {
            if !self.keeps(&line) {
                log::trace!("suppressed `{}`", String::from_utf8_lossy(&line));
                stats.suppressed += 1;
                continue;
            }
            writer.write_all(&line)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            stats.relayed += 1;
        }
        Ok(stats)
    }
}

/// Counts of lines seen by [`LineFilter::relay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct RelayStats {
    /// Lines written out.
    pub relayed: usize,
    /// Lines dropped.
    pub suppressed: usize,
}

/// Whether `needle` occurs anywhere in `haystack`.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[cfg(test)]
mod test {
    use super::*;

    fn relay_str(filter: &LineFilter, input: &str) -> (String, RelayStats) {
        let mut output = Vec::new();
        let stats = filter.relay(input.as_bytes(), &mut output).unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    #[test_log::test]
    fn drops_echoed_file_name() {
        let filter = LineFilter::from_args(&["-V", "shader.vert", "shader.vert"]);
        let (output, stats) = relay_str(&filter, "shader.vert\ncompilation OK\n");
        assert_eq!(output, "compilation OK\n");
        assert_eq!(stats.relayed, 1);
        assert_eq!(stats.suppressed, 1);
    }

    #[test_log::test]
    fn drops_noisy_diagnostic_and_file_name() {
        let filter = LineFilter::from_args(&["spv_1.0", "x.vert"]);
        let (output, _) = relay_str(
            &filter,
            "warning: version 450 is not yet complete\nnote: foo\nx.vert\n",
        );
        assert_eq!(output, "note: foo\n");
    }

    #[test_log::test]
    fn noisy_diagnostic_dropped_anywhere() {
        let filter = LineFilter::default();
        let (output, stats) = relay_str(
            &filter,
            "a\nversion 450 is not yet complete\nb\nWARNING: 0:1: version 450 is not yet complete; most version-specific features are present, but some are missing.\nc",
        );
        assert_eq!(output, "a\nb\nc\n");
        assert_eq!(stats.suppressed, 2);
    }

    #[test_log::test]
    fn every_echo_is_dropped() {
        let filter = LineFilter::new(Some(OsStr::new("x.vert")));
        let (output, stats) = relay_str(&filter, "x.vert\none\nx.vert\ntwo\nx.vert\n");
        assert_eq!(output, "one\ntwo\n");
        assert_eq!(stats.suppressed, 3);
    }

    #[test_log::test]
    fn only_exact_echo_is_dropped() {
        let filter = LineFilter::new(Some(OsStr::new("x.vert")));
        assert!(filter.keeps(b"x.vert: error"));
        assert!(filter.keeps(b" x.vert"));
        assert!(filter.keeps(b"x.ver"));
        assert!(!filter.keeps(b"x.vert"));
    }

    #[test_log::test]
    fn echo_matches_original_not_rewritten_argument() {
        let filter = LineFilter::from_args(&["-V", "spv_x.vert"]);
        assert!(!filter.keeps(b"spv_x.vert"));
        assert!(filter.keeps(b"spv_x_vert"));
    }

    #[test_log::test]
    fn no_arguments_drops_only_noise() {
        let filter = LineFilter::from_args::<&str>(&[]);
        assert_eq!(filter.echoed, None);
        assert!(filter.keeps(b""));
        assert!(filter.keeps(b"anything"));
        assert!(!filter.keeps(NOISY_DIAGNOSTIC.as_bytes()));
    }

    #[test_log::test]
    fn order_is_preserved() {
        let filter = LineFilter::new(Some(OsStr::new("skip")));
        let (output, _) = relay_str(&filter, "3\n1\nskip\n2\n1\n");
        assert_eq!(output, "3\n1\n2\n1\n");
    }

    #[test_log::test]
    fn blank_lines_do_not_end_the_relay() {
        let filter = LineFilter::default();
        let (output, stats) = relay_str(&filter, "first\n\nsecond\n");
        assert_eq!(output, "first\n\nsecond\n");
        assert_eq!(stats.relayed, 3);
    }

    #[test_log::test]
    fn crlf_terminators_are_normalized() {
        let filter = LineFilter::new(Some(OsStr::new("x.vert")));
        let (output, _) = relay_str(&filter, "x.vert\r\nnote\r\n");
        assert_eq!(output, "note\n");
    }

    #[test_log::test]
    fn lines_iterator_strips_terminators() {
        let lines = OutputLines::new("a\r\nb\n\nc\rd\ne".as_bytes()).collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                b"a".to_vec(),
                b"b".to_vec(),
                Vec::new(),
                b"c\rd".to_vec(),
                b"e".to_vec()
            ]
        );
    }

    #[test_log::test]
    fn substring_search() {
        assert!(contains(b"abc", b""));
        assert!(contains(b"", b""));
        assert!(contains(b"abc", b"bc"));
        assert!(!contains(b"ab", b"abc"));
        assert!(!contains(b"", b"a"));
    }

    #[test_log::test]
    fn empty_stream_relays_nothing() {
        let (output, stats) = relay_str(&LineFilter::default(), "");
        assert!(output.is_empty());
        assert_eq!(stats, RelayStats::default());
    }

    #[test_log::test]
    fn read_error_ends_the_relay() {
        /// Yields some bytes, then fails.
        struct Failing(bool);

        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 {
                    return Err(io::Error::other("broken"));
                }
                self.0 = true;
                let chunk = b"kept\n";
                buf[..chunk.len()].copy_from_slice(chunk);
                Ok(chunk.len())
            }
        }

        let mut output = Vec::new();
        let stats = LineFilter::default()
            .relay(Failing(false), &mut output)
            .unwrap();
        assert_eq!(output, b"kept\n");
        assert_eq!(stats.relayed, 1);
    }

    #[test_log::test]
    fn write_error_is_returned() {
        /// Rejects every write.
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = LineFilter::default()
            .relay("line\n".as_bytes(), Closed)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test_log::test]
    fn non_utf8_lines_are_relayed_verbatim() {
        let mut output = Vec::new();
        LineFilter::default()
            .relay(&b"\xff\xfe\n"[..], &mut output)
            .unwrap();
        assert_eq!(output, b"\xff\xfe\n");
    }
}
