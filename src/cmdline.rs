use crate::interpreter::Interpreter;
use crate::printer::{pr_str, PrintMode};
use crate::reader;
use crate::types::Value;

use linefeed::{DefaultTerminal, Interface, ReadResult, Terminal};
use std::path::PathBuf;

const PROMPT: &str = "tramp> ";
const CONTINUATION_PROMPT: &str = "  ...> ";

pub fn setup() -> std::io::Result<Interface<DefaultTerminal>> {
    let interface = linefeed::Interface::new("tramp")?;
    interface.set_prompt(PROMPT)?;
    if let Some(path) = history_path() {
        interface.load_history(path).ok();
    };
    Ok(interface)
}

fn history_path() -> Option<PathBuf> {
    match dirs::data_dir() {
        Some(mut path) => {
            path.push(".tramp_history");
            Some(path)
        }
        None => None,
    }
}

pub fn save_history<T: Terminal>(interface: &Interface<T>) -> std::io::Result<()> {
    match history_path() {
        Some(path) => interface.save_history(path),
        None => Ok(()),
    }
}

/// Read, evaluate and render every form in `text`. `Ok(None)` means the
/// last value was unspecified and there is nothing to show.
pub fn rep(interp: &mut Interpreter, text: &str) -> Result<Option<String>, String> {
    match interp.eval_str(text) {
        Ok(Value::Unspecified) => Ok(None),
        Ok(v) => Ok(Some(pr_str(
            &mut interp.heap,
            v,
            PrintMode::ReadableRepresentation,
        ))),
        Err(e) => {
            let message = interp.describe(&e);
            interp.collect();
            Err(message)
        }
    }
}

/// Lines are gathered until they make up complete forms, then handed to
/// `processor` together.
pub fn repl<T: Terminal>(interface: &Interface<T>, mut processor: impl FnMut(&str) -> String) {
    let mut pending = String::new();
    loop {
        match interface.read_line() {
            Ok(ReadResult::Eof) => break,
            Ok(ReadResult::Signal(sig)) => {
                writeln!(interface, "Received signal {:?}", sig).ok();
            }
            Ok(ReadResult::Input(line)) => {
                interface.add_history_unique(line.clone());
                pending.push_str(&line);
                pending.push('\n');
                if !reader::is_complete(&pending) {
                    interface.set_prompt(CONTINUATION_PROMPT).ok();
                    continue;
                }
                interface.set_prompt(PROMPT).ok();
                let output = processor(&pending);
                pending.clear();
                if !output.is_empty() {
                    writeln!(interface, "{}", output).ok();
                }
            }
            Err(e) => {
                writeln!(interface, "Error: {}", e).ok();
                break;
            }
        }
    }
}
