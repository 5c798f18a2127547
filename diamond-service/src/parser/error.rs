// Topology parse and validation errors
// YAML errors with line context, path-scoped validation errors and join list checks

use std::fmt;

/// Category of a [`ParseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed YAML or a value of the wrong shape
    YamlSyntax,
    /// Unreadable topology file
    IoError,
    /// Parsed fine but failed semantic checks
    ValidationError,
}

/// Failure to load a topology, located in the source text when possible
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    pub column: usize,
    /// Source lines around the error
    pub context: String,
    pub suggestion: Option<String>,
    pub kind: ParseErrorKind,
}

pub type ParseResult<T> = Result<T, ParseError>;

impl ParseError {
    pub fn new(message: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
            context: String::new(),
            suggestion: None,
            kind,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach `radius` lines of source on each side of the error line
    pub fn with_source_context(mut self, source: &str, radius: usize) -> Self {
        if self.line == 0 {
            return self;
        }
        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(radius + 1);
        let end = (self.line + radius).min(lines.len());

        let mut context = String::new();
        for (i, text) in lines.iter().enumerate().take(end).skip(start) {
            let number = i + 1;
            let marker = if number == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", marker, number, text));
            if number == self.line && self.column > 0 {
                context.push_str(&format!("       | {}^\n", " ".repeat(self.column - 1)));
            }
        }
        self.context = context;
        self
    }

    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));
        let message = err.to_string();
        let suggestion = suggest_fix(&message);

        let mut error = ParseError::new(message, ParseErrorKind::YamlSyntax)
            .at(line, column)
            .with_source_context(source, 2);
        error.suggestion = suggestion;
        error
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }
        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }
        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

fn suggest_fix(message: &str) -> Option<String> {
    if message.contains("missing field `name`") {
        return Some("every job needs a 'name'".to_string());
    }
    if message.contains("missing field `projects`") {
        return Some("triggers list their children as 'projects: a, b'".to_string());
    }
    if message.contains("unknown variant") && message.contains("success") {
        return Some("outcomes are success, unstable, failure or aborted".to_string());
    }
    if message.contains("unknown variant") && message.contains("echo") {
        return Some("post-join steps are 'trigger', 'echo' or 'fail'".to_string());
    }
    None
}

/// Outcome of checking a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    /// Accepted, but probably not what the user meant
    Warning(String),
    Error(String),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Validation::Error(_))
    }
}

/// Semantic problem found in a topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub path: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error at '{}': {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_error_has_location_and_context() {
        let source = "jobs:\n  - name: a\n    outcome: sideways\n";
        let yaml_err = serde_yaml::from_str::<crate::parser::Topology>(source).unwrap_err();
        let err = ParseError::from_yaml_error(&yaml_err, source);

        assert_eq!(err.kind, ParseErrorKind::YamlSyntax);
        assert_eq!(err.line, 3);
        assert!(err.context.contains(">    3 |     outcome: sideways"));
        assert!(err.suggestion.unwrap().contains("unstable"));
    }

    #[test]
    fn test_error_without_location() {
        let err = ParseError::new("failed to read file", ParseErrorKind::IoError);
        assert_eq!(err.to_string(), "error: failed to read file\n");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("no such project 'jion'", "jobs.root.join.projects")
            .with_suggestion("did you mean 'join'?");
        assert_eq!(
            err.to_string(),
            "validation error at 'jobs.root.join.projects': no such project 'jion' (did you mean 'join'?)"
        );
    }

    #[test]
    fn test_validation_states() {
        assert!(Validation::Ok.is_ok());
        assert!(!Validation::Warning("w".into()).is_error());
        assert!(Validation::Error("e".into()).is_error());
    }
}
