// Output formatting helpers for CLI commands

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

pub fn dim(message: &str) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

/// Color a line by outcome: green for success, yellow for unstable, red otherwise
pub fn outcome_line(outcome: diamond_service::Outcome, message: &str) {
    use diamond_service::Outcome;
    let color = match outcome {
        Outcome::Success => "32",
        Outcome::Unstable => "33",
        Outcome::Failure | Outcome::Aborted => "31",
    };
    eprintln!("\x1b[{}m{}\x1b[0m", color, message);
}

/// Barrier lifecycle line, indented under the run that owns it
pub fn barrier(message: &str) {
    eprintln!("\x1b[35m    \u{25c7}\x1b[0m {}", message);
}

/// Print run output (indented)
pub fn run_output(line: &str) {
    println!("        | {}", line);
}

pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}
