//! Line-oriented [`ChoicePrompt`] for terminals.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::gate::{Choice, ChoicePrompt, PromptRequest};

type SharedInput = Arc<Mutex<Box<dyn BufRead + Send>>>;
type SharedOutput = Arc<Mutex<Box<dyn Write + Send>>>;

/// Prints the three options and reads a number until one is picked.
///
/// Reading happens on a dedicated thread so the awaiting gate does not block
/// the async runtime. End of input drops the responder, which the gate
/// reports as an unresolved prompt.
#[derive(Clone)]
pub struct TerminalPrompt {
    input: SharedInput,
    output: SharedOutput,
}

impl TerminalPrompt {
    pub fn new(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(input))),
            output: Arc::new(Mutex::new(Box::new(output))),
        }
    }

    /// Prompt on the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl ChoicePrompt for TerminalPrompt {
    fn present(&self, request: PromptRequest) {
        let input = self.input.clone();
        let output = self.output.clone();

        let spawned = std::thread::Builder::new()
            .name("envfetch-prompt".into())
            .spawn(move || {
                let PromptRequest {
                    title,
                    message,
                    labels,
                    responder,
                } = request;

                let mut input = input.lock().unwrap_or_else(|e| e.into_inner());
                let mut output = output.lock().unwrap_or_else(|e| e.into_inner());
                match ask(&mut **input, &mut **output, &title, &message, &labels) {
                    Ok(choice) => {
                        responder.resolve(choice);
                    }
                    Err(e) => warn!(error = %e, "prompt closed without a choice"),
                }
            });

        if let Err(e) = spawned {
            warn!(error = %e, "failed to start prompt thread");
        }
    }
}

fn ask(
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    title: &str,
    message: &str,
    labels: &[String; 3],
) -> io::Result<Choice> {
    writeln!(output, "\n{}\n{}\n", title, message)?;
    for (i, label) in labels.iter().enumerate() {
        writeln!(output, "  [{}] {}", i + 1, label)?;
    }

    let mut line = String::new();
    loop {
        write!(output, "choose 1-3: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }

        let picked = line
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(Choice::from_index);
        match picked {
            Some(choice) => return Ok(choice),
            None => writeln!(output, "please enter 1, 2 or 3")?,
        }
    }
}
