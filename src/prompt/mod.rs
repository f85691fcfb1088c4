//! Operator input. The crawl blocks on a terminal line in exactly two
//! places: login credentials and emails no directory can resolve. Both go
//! through this trait so everything above it is testable without a TTY.

use std::io::{self, BufRead, Write};

pub trait Prompter {
    /// Ask the operator for portal credentials. Called again after every
    /// rejected login; retries are unbounded.
    fn credentials(&mut self) -> io::Result<(String, String)>;

    /// Ask the operator for an email address no directory could resolve.
    fn unknown_email(&mut self, name: &str) -> io::Result<String>;
}

pub struct ConsolePrompter;

impl ConsolePrompter {
    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Prompter for ConsolePrompter {
    fn credentials(&mut self) -> io::Result<(String, String)> {
        let mut out = io::stdout();
        write!(out, "Username: ")?;
        out.flush()?;
        let username = self.read_line()?;
        write!(out, "Password: ")?;
        out.flush()?;
        let password = self.read_line()?;
        Ok((username, password))
    }

    fn unknown_email(&mut self, name: &str) -> io::Result<String> {
        let mut out = io::stdout();
        write!(out, "Email needed for {:?}: ", name)?;
        out.flush()?;
        self.read_line()
    }
}
