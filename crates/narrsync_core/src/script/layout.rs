//! Block structure of a visual program.

use super::dialect::ScriptDialect;
use super::{ScriptError, ScriptResult};

/// One segment block: from its marker line up to (not including)
/// `end_line`.
///
/// A block ends at the next marker, at the first code line indented less
/// than the block's statements, or at the end of the program. Line numbers
/// are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentBlock {
    pub index: usize,
    pub marker_line: usize,
    pub end_line: usize,
    /// Indentation of the marker line.
    pub marker_indent: String,
    /// Indentation of the block's statements: that of its first code line,
    /// or of the marker when the block has no code. Holds use it.
    pub indent: String,
    /// Last line in the block that is neither blank nor a comment.
    pub last_code_line: Option<usize>,
}

impl SegmentBlock {
    /// Line after which a hold for this block is inserted.
    pub fn insertion_line(&self) -> usize {
        self.last_code_line.unwrap_or(self.marker_line)
    }
}

/// A program split into lines with its segment blocks located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    lines: Vec<String>,
    blocks: Vec<SegmentBlock>,
    trailing_newline: bool,
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn is_code(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

impl ProgramLayout {
    /// Locate the segment blocks of `source`.
    ///
    /// Programs that already carry tagged holds are rejected so a program
    /// is never extended twice.
    pub fn parse(source: &str, dialect: &ScriptDialect) -> ScriptResult<Self> {
        let lines: Vec<String> = source.lines().map(str::to_string).collect();

        if let Some(line) = lines.iter().position(|l| dialect.is_hold(l)) {
            return Err(ScriptError::AlreadyAdjusted { line: line + 1 });
        }

        let markers: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| dialect.is_marker(l))
            .map(|(i, _)| i)
            .collect();

        if markers.is_empty() {
            return Err(ScriptError::NoMarkers {
                prefix: dialect.marker_prefix.clone(),
            });
        }

        let blocks = markers
            .iter()
            .enumerate()
            .map(|(index, &marker_line)| {
                let limit = markers.get(index + 1).copied().unwrap_or(lines.len());
                let marker_indent = indent_of(&lines[marker_line]).to_string();
                let indent = (marker_line + 1..limit)
                    .find(|&j| is_code(&lines[j]))
                    .map(|j| indent_of(&lines[j]).to_string())
                    .unwrap_or_else(|| marker_indent.clone());

                let end_line = (marker_line + 1..limit)
                    .find(|&j| is_code(&lines[j]) && indent_of(&lines[j]).len() < indent.len())
                    .unwrap_or(limit);

                let last_code_line = (marker_line + 1..end_line)
                    .rev()
                    .find(|&j| is_code(&lines[j]));

                SegmentBlock {
                    index,
                    marker_line,
                    end_line,
                    marker_indent,
                    indent,
                    last_code_line,
                }
            })
            .collect();

        Ok(Self {
            lines,
            blocks,
            trailing_newline: source.ends_with('\n'),
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn blocks(&self) -> &[SegmentBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&SegmentBlock> {
        self.blocks.get(index)
    }

    pub fn segment_count(&self) -> usize {
        self.blocks.len()
    }

    /// Marker lines (trimmed) in program order.
    pub fn marker_lines(&self) -> Vec<String> {
        self.blocks
            .iter()
            .map(|b| self.lines[b.marker_line].trim().to_string())
            .collect()
    }

    /// Join lines back into program text, keeping the original trailing
    /// newline convention.
    pub fn join(&self, lines: &[String]) -> String {
        let mut text = lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }
}
