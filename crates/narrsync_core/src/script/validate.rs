//! Checks run on a rewritten program before it is accepted.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use super::dialect::ScriptDialect;
use crate::process::{expand_args, last_output_line, run_with_timeout, CommandOutcome};

/// A rewritten program awaiting validation.
#[derive(Debug, Clone)]
pub struct CandidateProgram<'a> {
    pub source: &'a str,
    /// 0-based lines holding inserted instructions.
    pub inserted_lines: &'a [usize],
    /// Marker lines (trimmed) of the original program, in order.
    pub expected_markers: Vec<String>,
    pub dialect: &'a ScriptDialect,
}

/// Accepts or rejects a rewritten program.
pub trait ProgramValidator: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` carries a human-readable reason.
    fn validate(&self, candidate: &CandidateProgram<'_>) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single(char),
    Triple(char),
}

/// Language-agnostic soundness check.
///
/// Tracks brackets, single/double/triple-quoted strings with backslash
/// escapes, and `#` comments. Rejects the program when brackets or strings
/// are unbalanced, when an inserted line starts inside an open bracket or
/// string, or when the segment markers differ from the original.
///
/// Inserted lines are also checked against the indentation of the
/// statement before them: directly after a block header (a statement
/// ending in `:`) they must be indented deeper than the header, anywhere
/// else no deeper than that statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    fn check_nesting(source: &str, inserted: &[usize]) -> Result<(), String> {
        let mut brackets: Vec<(char, usize)> = Vec::new();
        let mut string: Option<(Quote, usize)> = None;
        // Start line and indent width of the latest statement
        let mut statement: Option<(usize, usize)> = None;
        // Latest code line, if it ended a block header
        let mut header: Option<usize> = None;

        for (line_no, line) in source.lines().enumerate() {
            let starts_statement = brackets.is_empty() && string.is_none();
            let indent = line.len() - line.trim_start().len();

            if inserted.contains(&line_no) {
                if let Some(&(open, at)) = brackets.last() {
                    return Err(format!(
                        "inserted line {} is inside '{}' opened on line {}",
                        line_no + 1,
                        open,
                        at + 1
                    ));
                }
                if let Some((_, at)) = string {
                    return Err(format!(
                        "inserted line {} is inside a string started on line {}",
                        line_no + 1,
                        at + 1
                    ));
                }
                match (header, statement) {
                    (Some(at), Some((_, width))) if indent <= width => {
                        return Err(format!(
                            "inserted line {} is not indented under the block header on line {}",
                            line_no + 1,
                            at + 1
                        ));
                    }
                    (None, Some((at, width))) if indent > width => {
                        return Err(format!(
                            "inserted line {} is indented deeper than the statement on line {}",
                            line_no + 1,
                            at + 1
                        ));
                    }
                    _ => {}
                }
            }

            let chars: Vec<char> = line.chars().collect();
            let mut last_significant: Option<char> = None;
            let mut k = 0;
            while k < chars.len() {
                let c = chars[k];
                if !c.is_whitespace() && !(string.is_none() && c == '#') {
                    last_significant = Some(c);
                }
                match string {
                    Some((quote, _)) => {
                        if c == '\\' {
                            k += 2;
                            continue;
                        }
                        match quote {
                            Quote::Triple(q) if c == q && chars[k..].starts_with(&[q, q, q]) => {
                                string = None;
                                k += 3;
                                continue;
                            }
                            Quote::Single(q) if c == q => string = None,
                            _ => {}
                        }
                        k += 1;
                    }
                    None => {
                        match c {
                            '#' => break,
                            '\'' | '"' => {
                                if chars[k..].starts_with(&[c, c, c]) {
                                    string = Some((Quote::Triple(c), line_no));
                                    k += 3;
                                    continue;
                                }
                                string = Some((Quote::Single(c), line_no));
                            }
                            '(' | '[' | '{' => brackets.push((c, line_no)),
                            ')' | ']' | '}' => {
                                let expected = match c {
                                    ')' => '(',
                                    ']' => '[',
                                    _ => '{',
                                };
                                match brackets.pop() {
                                    Some((open, _)) if open == expected => {}
                                    Some((open, at)) => {
                                        return Err(format!(
                                            "line {}: '{}' does not close '{}' from line {}",
                                            line_no + 1,
                                            c,
                                            open,
                                            at + 1
                                        ))
                                    }
                                    None => {
                                        return Err(format!(
                                            "line {}: unmatched '{}'",
                                            line_no + 1,
                                            c
                                        ))
                                    }
                                }
                            }
                            _ => {}
                        }
                        k += 1;
                    }
                }
            }

            if last_significant.is_some() {
                if starts_statement {
                    statement = Some((line_no, indent));
                }
                header = (brackets.is_empty() && string.is_none() && last_significant == Some(':'))
                    .then_some(line_no);
            }

            // Single-quoted strings end with the line unless continued
            if let Some((Quote::Single(_), at)) = string {
                if !line.ends_with('\\') {
                    return Err(format!("line {}: unterminated string", at + 1));
                }
            }
        }

        if let Some((open, at)) = brackets.last() {
            return Err(format!("'{}' opened on line {} is never closed", open, at + 1));
        }
        if let Some((_, at)) = string {
            return Err(format!("string started on line {} is never closed", at + 1));
        }
        Ok(())
    }

    fn check_markers(candidate: &CandidateProgram<'_>) -> Result<(), String> {
        let found: Vec<String> = candidate
            .source
            .lines()
            .filter(|l| candidate.dialect.is_marker(l))
            .map(|l| l.trim().to_string())
            .collect();

        if found != candidate.expected_markers {
            return Err(format!(
                "segment markers changed (expected {}, found {})",
                candidate.expected_markers.len(),
                found.len()
            ));
        }
        Ok(())
    }
}

impl ProgramValidator for StructuralValidator {
    fn name(&self) -> &str {
        "structural check"
    }

    fn validate(&self, candidate: &CandidateProgram<'_>) -> Result<(), String> {
        Self::check_nesting(candidate.source, candidate.inserted_lines)?;
        Self::check_markers(candidate)
    }
}

/// Runs an external checker (e.g. `python3 -m py_compile {path}`) on the
/// candidate written to `path`.
pub struct CommandValidator {
    name: String,
    argv: Vec<String>,
    path: PathBuf,
    timeout: Option<Duration>,
}

impl CommandValidator {
    /// `None` when `argv` is empty.
    pub fn new(argv: Vec<String>, path: impl Into<PathBuf>) -> Option<Self> {
        let name = argv.first()?.clone();
        Some(Self {
            name,
            argv,
            path: path.into(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ProgramValidator for CommandValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, candidate: &CandidateProgram<'_>) -> Result<(), String> {
        fs::write(&self.path, candidate.source)
            .map_err(|e| format!("cannot write {}: {}", self.path.display(), e))?;

        let args = expand_args(&self.argv, &[("path", self.path.display().to_string())]);
        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..]);

        match run_with_timeout(&mut cmd, self.timeout, None) {
            Ok(CommandOutcome::Finished(output)) if output.status.success() => Ok(()),
            Ok(CommandOutcome::Finished(output)) => Err(last_output_line(&output)),
            Ok(CommandOutcome::TimedOut { .. }) => Err("validator timed out".to_string()),
            Ok(CommandOutcome::Cancelled) => Err("validator was cancelled".to_string()),
            Err(e) => Err(format!("failed to run {}: {}", self.name, e)),
        }
    }
}

/// Runs validators in order and stops at the first rejection.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn ProgramValidator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: ProgramValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl ProgramValidator for ValidatorChain {
    fn name(&self) -> &str {
        "validation"
    }

    fn validate(&self, candidate: &CandidateProgram<'_>) -> Result<(), String> {
        for validator in &self.validators {
            validator
                .validate(candidate)
                .map_err(|e| format!("{}: {}", validator.name(), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(
        source: &'a str,
        inserted: &'a [usize],
        markers: &[&str],
        dialect: &'a ScriptDialect,
    ) -> CandidateProgram<'a> {
        CandidateProgram {
            source,
            inserted_lines: inserted,
            expected_markers: markers.iter().map(|m| m.to_string()).collect(),
            dialect,
        }
    }

    #[test]
    fn accepts_balanced_program() {
        let dialect = ScriptDialect::default();
        let source = "# SEGMENT 1\nplay(Text(\"a (b\"), [1, 2])\ns = '''multi\n) line'''\nwait(1)\n";
        let c = candidate(source, &[4], &["# SEGMENT 1"], &dialect);
        assert!(StructuralValidator.validate(&c).is_ok());
    }

    #[test]
    fn rejects_insertion_inside_brackets() {
        let dialect = ScriptDialect::default();
        let source = "# SEGMENT 1\nplay(\n    wait(1)\n)\n";
        let c = candidate(source, &[2], &["# SEGMENT 1"], &dialect);
        let err = StructuralValidator.validate(&c).unwrap_err();
        assert!(err.contains("inside '('"));
    }

    #[test]
    fn rejects_insertion_inside_triple_string() {
        let dialect = ScriptDialect::default();
        let source = "# SEGMENT 1\nx = \"\"\"\nwait(1)\n\"\"\"\n";
        let c = candidate(source, &[2], &["# SEGMENT 1"], &dialect);
        let err = StructuralValidator.validate(&c).unwrap_err();
        assert!(err.contains("inside a string"));
    }

    #[test]
    fn checks_indentation_of_inserted_lines() {
        let dialect = ScriptDialect::default();
        let markers = ["# SEGMENT 1"];

        // Same level as the statement before it, or dedented out of a loop
        let ok = "# SEGMENT 1\n    for x in xs:\n        play(x)\n    wait(1)\n";
        assert!(StructuralValidator.validate(&candidate(ok, &[3], &markers, &dialect)).is_ok());

        // First statement of a body
        let body = "def construct(self):\n    # SEGMENT 1\n    wait(1)\n";
        assert!(StructuralValidator.validate(&candidate(body, &[2], &markers, &dialect)).is_ok());

        let deeper = "# SEGMENT 1\n    play(x)\n        wait(1)\n";
        let err = StructuralValidator
            .validate(&candidate(deeper, &[2], &markers, &dialect))
            .unwrap_err();
        assert!(err.contains("deeper than the statement on line 2"));

        let after_header = "# SEGMENT 1\n    if ready:  # wait for it\n    wait(1)\n";
        let err = StructuralValidator
            .validate(&candidate(after_header, &[2], &markers, &dialect))
            .unwrap_err();
        assert!(err.contains("block header on line 2"));
    }

    #[test]
    fn colon_inside_string_or_brackets_is_not_a_header() {
        let dialect = ScriptDialect::default();
        let markers = ["# SEGMENT 1"];
        let source = "# SEGMENT 1\nsay(\"ready:\")\nx = items[1:\n]\nwait(1)\n";
        let c = candidate(source, &[4], &markers, &dialect);
        assert!(StructuralValidator.validate(&c).is_ok());
    }

    #[test]
    fn rejects_unbalanced_source() {
        let dialect = ScriptDialect::default();
        let unclosed = candidate("# SEGMENT 1\nplay(x\n", &[], &["# SEGMENT 1"], &dialect);
        assert!(StructuralValidator.validate(&unclosed).is_err());

        let mismatched = candidate("# SEGMENT 1\nplay(x]\n", &[], &["# SEGMENT 1"], &dialect);
        assert!(StructuralValidator.validate(&mismatched).is_err());

        let string = candidate("# SEGMENT 1\nt = 'abc\n", &[], &["# SEGMENT 1"], &dialect);
        assert!(StructuralValidator.validate(&string).is_err());
    }

    #[test]
    fn ignores_brackets_in_comments_and_escapes() {
        let dialect = ScriptDialect::default();
        let source = "# SEGMENT 1\nplay(x)  # closes (\nt = \"say \\\"(\\\"\"\n";
        let c = candidate(source, &[], &["# SEGMENT 1"], &dialect);
        assert!(StructuralValidator.validate(&c).is_ok());
    }

    #[test]
    fn rejects_changed_markers() {
        let dialect = ScriptDialect::default();
        let source = "# SEGMENT 1\nplay()\n";
        let c = candidate(source, &[], &["# SEGMENT 1", "# SEGMENT 2"], &dialect);
        let err = StructuralValidator.validate(&c).unwrap_err();
        assert!(err.contains("markers changed"));
    }

    #[test]
    fn chain_prefixes_failing_validator() {
        let dialect = ScriptDialect::default();
        let chain = ValidatorChain::new().with(StructuralValidator);
        assert_eq!(chain.len(), 1);
        let c = candidate("# SEGMENT 1\nplay(\n", &[], &["# SEGMENT 1"], &dialect);
        let err = chain.validate(&c).unwrap_err();
        assert!(err.starts_with("structural check: "));
    }

    #[test]
    fn command_validator_requires_argv() {
        assert!(CommandValidator::new(Vec::new(), "/tmp/x.py").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_validator_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dialect = ScriptDialect::default();
        let path = dir.path().join("candidate.py");

        let passing = CommandValidator::new(
            vec!["sh".into(), "-c".into(), "test -s \"$0\"".into(), "{path}".into()],
            &path,
        )
        .unwrap();
        let c = candidate("# SEGMENT 1\nplay()\n", &[], &["# SEGMENT 1"], &dialect);
        assert!(passing.validate(&c).is_ok());
        assert!(path.exists());

        let failing = CommandValidator::new(
            vec!["sh".into(), "-c".into(), "echo 'SyntaxError' >&2; exit 1".into()],
            &path,
        )
        .unwrap()
        .with_timeout(Duration::from_secs(10));
        assert_eq!(failing.validate(&c).unwrap_err(), "SyntaxError");
    }
}
