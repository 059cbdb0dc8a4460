use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::error::{IngestError, IngestResult};
use crate::types::ConfirmationDecision;

/// Interactive terminal used for overwrite confirmations.
pub trait Console: Send {
    /// Write `text` without a trailing newline and flush it.
    fn write_prompt(&mut self, text: &str) -> io::Result<()>;

    /// Write `text` followed by a newline.
    fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// Read the next whitespace-separated token, or `None` once input is closed.
    fn read_token(&mut self) -> io::Result<Option<String>>;
}

/// A [`Console`] over any buffered reader and writer.
///
/// Input is consumed token by token, so several answers on one line are used in turn and blank
/// lines are ignored.
pub struct LineConsole<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

/// The process terminal.
pub type StdConsole = LineConsole<BufReader<Stdin>, Stdout>;

impl<R, W> LineConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    /// Give back the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl StdConsole {
    /// Console reading stdin and writing stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> Console for LineConsole<R, W> {
    fn write_prompt(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()
    }

    fn read_token(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_owned));
        }
    }
}

/// Serializes overwrite prompts across concurrently running workers.
///
/// Only the holder of a [`GateToken`] can talk to the console, so prompt text and answers of
/// different sources never interleave. Acquisition order among waiting workers is unspecified.
pub struct ConfirmationGate {
    console: Mutex<Box<dyn Console>>,
}

impl ConfirmationGate {
    /// Create a gate guarding `console`.
    pub fn new(console: impl Console + 'static) -> Self {
        Self {
            console: Mutex::new(Box::new(console)),
        }
    }

    /// Gate over the process terminal.
    pub fn stdio() -> Self {
        Self::new(StdConsole::stdio())
    }

    /// Block until the caller is the sole holder of the console.
    pub fn acquire(&self) -> GateToken<'_> {
        let start = Instant::now();
        let (console, waited) = match self.console.try_lock() {
            Ok(guard) => (guard, Duration::ZERO),
            Err(TryLockError::Poisoned(poisoned)) => (poisoned.into_inner(), Duration::ZERO),
            Err(TryLockError::WouldBlock) => {
                let guard = self.console.lock().unwrap_or_else(PoisonError::into_inner);
                (guard, start.elapsed())
            }
        };
        GateToken { console, waited }
    }
}

impl std::fmt::Debug for ConfirmationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationGate").finish_non_exhaustive()
    }
}

/// Exclusive possession of the console, held across one prompt-decide cycle.
///
/// Dropping the token releases the gate.
pub struct GateToken<'a> {
    console: MutexGuard<'a, Box<dyn Console>>,
    waited: Duration,
}

impl GateToken<'_> {
    /// Time spent blocked before the gate was granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Ask whether the existing data of `source` should be overwritten.
    ///
    /// Only `y` and `n` are accepted; any other answer re-displays the prompt while the gate
    /// stays held. Closed input is an error.
    pub fn prompt(&mut self, source: &str) -> IngestResult<ConfirmationDecision> {
        let console_err = |e: io::Error| IngestError::Console {
            source_name: source.to_owned(),
            source: e,
        };
        let text = format!("{source}: data exist. Overwrite? (y/n) ");
        loop {
            self.console.write_prompt(&text).map_err(console_err)?;
            let Some(answer) = self.console.read_token().map_err(console_err)? else {
                return Err(console_err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "console input closed before an answer was given",
                )));
            };
            match answer.as_str() {
                "y" => return Ok(ConfirmationDecision::Overwrite),
                "n" => return Ok(ConfirmationDecision::Skip),
                _ => {
                    tracing::debug!(source, answer = %answer, "rejected overwrite answer");
                    self.console.write_line("Not a valid answer!").map_err(console_err)?;
                }
            }
        }
    }

    /// Relinquish the gate.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{ConfirmationGate, Console, LineConsole};
    use crate::error::IngestError;
    use crate::types::ConfirmationDecision;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn gate_with_input(input: &str) -> (ConfirmationGate, SharedBuf) {
        let out = SharedBuf::default();
        let console = LineConsole::new(Cursor::new(input.as_bytes().to_vec()), out.clone());
        (ConfirmationGate::new(console), out)
    }

    #[test]
    fn yes_and_no_map_to_decisions() {
        let (gate, out) = gate_with_input("y\nn\n");
        assert_eq!(gate.acquire().prompt("contacts-au").unwrap(), ConfirmationDecision::Overwrite);
        assert_eq!(gate.acquire().prompt("contacts-ca").unwrap(), ConfirmationDecision::Skip);
        assert_eq!(
            out.text(),
            "contacts-au: data exist. Overwrite? (y/n) contacts-ca: data exist. Overwrite? (y/n) "
        );
    }

    #[test]
    fn invalid_answer_reprompts() {
        let (gate, out) = gate_with_input("yes\n\nY n\n");
        let mut token = gate.acquire();
        assert_eq!(token.prompt("contacts-uk").unwrap(), ConfirmationDecision::Skip);
        token.release();

        let prompt = "contacts-uk: data exist. Overwrite? (y/n) ";
        let expected = format!("{prompt}Not a valid answer!\n{prompt}Not a valid answer!\n{prompt}");
        assert_eq!(out.text(), expected);
    }

    #[test]
    fn closed_input_is_a_console_error() {
        let (gate, _) = gate_with_input("maybe\n");
        let err = gate.acquire().prompt("contacts-us").unwrap_err();
        assert!(matches!(err, IngestError::Console { ref source_name, .. } if source_name == "contacts-us"));
        assert_eq!(err.operation(), "Confirm overwrite");
    }

    #[test]
    fn line_console_hands_back_its_streams() {
        let mut console = LineConsole::new(Cursor::new(b"y n\n\nmaybe\n".to_vec()), Vec::new());
        assert_eq!(console.read_token().unwrap().as_deref(), Some("y"));
        console.write_prompt("? ").unwrap();
        assert_eq!(console.read_token().unwrap().as_deref(), Some("n"));
        assert_eq!(console.read_token().unwrap().as_deref(), Some("maybe"));
        assert_eq!(console.read_token().unwrap(), None);
        console.write_line("bye").unwrap();

        let (input, output) = console.into_inner();
        assert_eq!(input.position(), input.get_ref().len() as u64);
        assert_eq!(output, b"? bye\n");
    }

    /// Records prompt/answer pairs and the number of simultaneous users of the console.
    struct CountingConsole {
        log: Arc<Mutex<Vec<String>>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl Console for CountingConsole {
        fn write_prompt(&mut self, text: &str) -> io::Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.log.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn write_line(&mut self, _text: &str) -> io::Result<()> {
            Ok(())
        }
        fn read_token(&mut self) -> io::Result<Option<String>> {
            std::thread::sleep(Duration::from_millis(5));
            self.log.lock().unwrap().push("answer".to_string());
            let _ = self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Some("n".to_string()))
        }
    }

    #[test]
    fn concurrent_prompts_never_interleave() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let max_active = Arc::new(AtomicUsize::new(0));
        let gate = ConfirmationGate::new(CountingConsole {
            log: Arc::clone(&log),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::clone(&max_active),
        });

        let sources = ["a", "b", "c", "d"];
        std::thread::scope(|s| {
            for name in sources {
                let gate = &gate;
                s.spawn(move || {
                    let mut token = gate.acquire();
                    assert_eq!(token.prompt(name).unwrap(), ConfirmationDecision::Skip);
                });
            }
        });

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        let log = log.lock().unwrap().clone();
        assert_eq!(log.len(), 8);
        let mut prompted: Vec<&str> = Vec::new();
        for pair in log.chunks(2) {
            assert_eq!(pair[1], "answer");
            let source = pair[0].split(':').next().unwrap();
            prompted.push(source);
        }
        prompted.sort_unstable();
        assert_eq!(prompted, sources);
    }

    #[test]
    fn second_holder_waits_for_release() {
        let (gate, _) = gate_with_input("");
        let token = gate.acquire();
        assert_eq!(token.waited(), Duration::ZERO);

        std::thread::scope(|s| {
            let waiter = s.spawn(|| gate.acquire().waited());
            std::thread::sleep(Duration::from_millis(20));
            token.release();
            assert!(waiter.join().unwrap() > Duration::ZERO);
        });
    }
}
