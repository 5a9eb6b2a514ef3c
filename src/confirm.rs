use std::io::{self, BufRead, Write};

/// Gate asked before anything leaves the machine.
pub trait Confirm {
    fn confirm(&mut self, url: &str, payload: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str, &str) -> bool,
{
    fn confirm(&mut self, url: &str, payload: &str) -> bool {
        self(url, payload)
    }
}

/// Interactive y/n prompt. Anything other than `y` or `n` asks again; end of
/// input or a read error counts as `n`.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, url: &str, payload: &str) -> io::Result<bool> {
        let rule = "=".repeat(50);
        writeln!(self.output, "\n{rule}")?;
        writeln!(self.output, "--- PENDING REQUEST CONFIRMATION ---")?;
        writeln!(self.output, "URL: {url}")?;
        writeln!(self.output, "Payload: {payload}")?;
        writeln!(self.output, "{rule}")?;

        let mut line = String::new();
        loop {
            write!(self.output, "Proceed with sending this request? (y/n): ")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => writeln!(self.output, "Please enter 'y' or 'n'.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, url: &str, payload: &str) -> bool {
        self.ask(url, payload).unwrap_or(false)
    }
}
