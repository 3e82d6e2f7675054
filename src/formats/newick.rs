//! Newick trees.
//!
//! A file holds one or more trees, each terminated by `;`.  Terminators and
//! parentheses inside single-quoted labels or `[...]` comments do not count.
//! Trees are kept as text; the reader only checks that parentheses balance.

use crate::error::{IoError, Result};
use crate::options::Options;
use crate::plugin::{FormatPlugin, SniffVerdict};
use crate::record::{Record, TreeRecord};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, Output, RecordReader, RecordSink};

use super::unsupported_record;

const NAME: &str = "newick";

pub struct NewickFormat;

impl FormatPlugin for NewickFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Newick trees, one record per ';'-terminated tree"
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        let text = view.text();
        let body = skip_leading_comments(&text);
        let matched = match body.chars().next() {
            None               => false,
            Some('(')          => sniff_nested(body, view.is_complete()),
            Some('>' | '@')    => false,
            Some(_)            => sniff_bare(body),
        };
        if matched {
            SniffVerdict::Matched(Options::new())
        } else {
            SniffVerdict::NoMatch
        }
    }

    fn open_reader(
        &self,
        input:    Input,
        _aux:     AuxChannels<Input>,
        _options: &Options,
    ) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(NewickReader { input }))
    }

    fn open_writer(
        &self,
        output:   Output,
        _aux:     AuxChannels<Output>,
        _options: &Options,
    ) -> Result<Box<dyn RecordSink>> {
        Ok(Box::new(NewickSink { output, buf: Vec::new() }))
    }
}

// ── Scanner ──────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Step {
    More,
    /// The character was the terminating `;`.
    End,
}

#[derive(Debug, Default)]
struct Scanner {
    depth:      i64,
    in_quote:   bool,
    in_comment: bool,
}

impl Scanner {
    fn feed(&mut self, c: char) -> std::result::Result<Step, &'static str> {
        if self.in_quote {
            // `''` inside a label toggles out and straight back in.
            if c == '\'' {
                self.in_quote = false;
            }
            return Ok(Step::More);
        }
        if self.in_comment {
            if c == ']' {
                self.in_comment = false;
            }
            return Ok(Step::More);
        }
        match c {
            '\'' => self.in_quote = true,
            '['  => self.in_comment = true,
            '('  => self.depth += 1,
            ')'  => {
                self.depth -= 1;
                if self.depth < 0 {
                    return Err("unmatched ')'");
                }
            }
            ';' => {
                if self.depth != 0 {
                    return Err("unbalanced parentheses before ';'");
                }
                return Ok(Step::End);
            }
            _ => {}
        }
        Ok(Step::More)
    }
}

// ── Sniffing ─────────────────────────────────────────────────────────────────

/// Drop leading whitespace and `[...]` comments.
fn skip_leading_comments(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('[') {
            return trimmed;
        }
        match trimmed.find(']') {
            Some(i) => text = &trimmed[i + 1..],
            None    => return "",
        }
    }
}

/// A tree opening with `(`: balanced up to its `;`, or still open when the
/// prefix was cut short.
fn sniff_nested(body: &str, complete: bool) -> bool {
    let mut scanner = Scanner::default();
    for c in body.chars() {
        match scanner.feed(c) {
            Ok(Step::End)  => return true,
            Ok(Step::More) => {}
            Err(_)         => return false,
        }
    }
    !complete
}

/// A single-leaf tree such as `a;` or `'x y':0.5;`.  Outside quotes and
/// comments it holds no whitespace or tree punctuation, and its `;` must lie
/// inside the prefix.
fn sniff_bare(body: &str) -> bool {
    let mut scanner = Scanner::default();
    for c in body.chars() {
        let literal = scanner.in_quote || scanner.in_comment;
        if !literal && (c.is_whitespace() || matches!(c, '(' | ')' | ',')) {
            return false;
        }
        match scanner.feed(c) {
            Ok(Step::End)  => return true,
            Ok(Step::More) => {}
            Err(_)         => return false,
        }
    }
    false
}

// ── Reader ───────────────────────────────────────────────────────────────────

struct NewickReader {
    input: Input,
}

impl RecordReader for NewickReader {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let mut scanner = Scanner::default();
        let mut tree = String::new();
        let mut start = 0usize;

        while let Some(line) = self.input.next_line()? {
            if tree.trim().is_empty() {
                tree.clear();
                start = self.input.line_number();
            } else {
                tree.push('\n');
            }
            for (i, c) in line.char_indices() {
                let step = scanner
                    .feed(c)
                    .map_err(|msg| IoError::format(NAME, self.input.line_number(), msg))?;
                if step == Step::End {
                    tree.push_str(&line[..=i]);
                    let rest = line[i + 1..].to_owned();
                    if !rest.trim().is_empty() {
                        self.input.unread(rest);
                    }
                    return Ok(Some(TreeRecord::new(tree.trim()).into()));
                }
            }
            tree.push_str(&line);
        }

        if tree.trim().is_empty() {
            Ok(None)
        } else {
            Err(IoError::format(NAME, start, "tree is not terminated by ';'"))
        }
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct NewickSink {
    output: Output,
    buf:    Vec<u8>,
}

impl RecordSink for NewickSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let tree = match record {
            Record::Tree(t) => t,
            other           => return Err(unsupported_record(NAME, other)),
        };
        let text = tree.newick.trim();
        self.buf.clear();
        self.buf.extend_from_slice(text.as_bytes());
        if !text.ends_with(';') {
            self.buf.push(b';');
        }
        self.buf.push(b'\n');
        self.output.commit(&self.buf)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        self.output.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(text: &str) -> Result<Vec<String>> {
        let mut reader = NewickFormat.open_reader(Input::from_bytes("mem", text), AuxChannels::empty(), &Options::new())?;
        let mut out = Vec::new();
        while let Some(Record::Tree(t)) = reader.next_record()? {
            out.push(t.newick);
        }
        Ok(out)
    }

    #[test]
    fn splits_on_terminators() {
        let trees = read_all("(a,b)c; ((x:1,y:2)z);\n(\n 'q;r', s\n);\n").unwrap();
        assert_eq!(trees, vec!["(a,b)c;", "((x:1,y:2)z);", "(\n 'q;r', s\n);"]);
    }

    #[test]
    fn comments_hide_terminators() {
        let trees = read_all("(a[;note],b);").unwrap();
        assert_eq!(trees, vec!["(a[;note],b);"]);
    }

    #[test]
    fn unterminated_and_unbalanced() {
        assert!(matches!(read_all("(a,b)\n"), Err(IoError::Format { line: 1, .. })));
        assert!(matches!(read_all("(a,b));"), Err(IoError::Format { .. })));
    }

    #[test]
    fn sniffer() {
        assert!(matches!(NewickFormat.sniff(&SniffView::new(b"(a,b);", true)), SniffVerdict::Matched(_)));
        assert!(matches!(NewickFormat.sniff(&SniffView::new(b"((a,b", false)), SniffVerdict::Matched(_)));
        assert_eq!(NewickFormat.sniff(&SniffView::new(b"((a,b", true)), SniffVerdict::NoMatch);
        assert_eq!(NewickFormat.sniff(&SniffView::new(b">a\nACGT", true)), SniffVerdict::NoMatch);
    }

    #[test]
    fn sniffer_accepts_leaves_and_leading_comments() {
        for text in [&b"a;\n"[..], b"[note](a,b);\n", b"  [x] [y]\n'q r':0.5;\n", b"[c]leaf[d];"] {
            assert!(matches!(NewickFormat.sniff(&SniffView::new(text, true)), SniffVerdict::Matched(_)));
        }
        for text in [&b"a b;\n"[..], b"abc\n", b"[open", b"@r;\nA\n", b",a,b\na,0,1;\n"] {
            assert_eq!(NewickFormat.sniff(&SniffView::new(text, true)), SniffVerdict::NoMatch);
        }
        assert_eq!(NewickFormat.sniff(&SniffView::new(b"a;", false)), SniffVerdict::Matched(Options::new()));
    }

    #[test]
    fn single_leaf_and_commented_trees_read() {
        let trees = read_all("a;\n[note](a,b);\n").unwrap();
        assert_eq!(trees, vec!["a;", "[note](a,b);"]);
    }
}
