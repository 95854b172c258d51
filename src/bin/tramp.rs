use ansi_term::Colour::Red;
use std::io::Read;
use std::process;
use tramp_lisp::{cmdline, Config, Interpreter};

/// Stack for the evaluation thread.
const STACK_SIZE: usize = 64 * 1024 * 1024;

/// Defaults, overridden by `TRAMP_STEP_BUDGET`, `TRAMP_MAX_DEPTH` and
/// `TRAMP_COLLECT`.
fn config_from_env() -> Config {
    let mut config = Config::default();
    if let Ok(budget) = std::env::var("TRAMP_STEP_BUDGET") {
        match budget.parse() {
            Ok(steps) => config.step_budget = steps,
            Err(_) => log::warn!("ignoring TRAMP_STEP_BUDGET={}", budget),
        }
    }
    if let Ok(depth) = std::env::var("TRAMP_MAX_DEPTH") {
        match depth.parse() {
            Ok(depth) => config.max_depth = depth,
            Err(_) => log::warn!("ignoring TRAMP_MAX_DEPTH={}", depth),
        }
    }
    if let Ok(collect) = std::env::var("TRAMP_COLLECT") {
        config.collect_between_forms = !matches!(collect.as_str(), "0" | "off");
    }
    log::debug!("{:?}", config);
    config
}

fn fail(message: &str) -> ! {
    eprintln!("{}", Red.paint(message));
    process::exit(1)
}

fn run_script(interp: &mut Interpreter, name: &str, text: &str) {
    if let Err(message) = cmdline::rep(interp, text) {
        fail(&format!("{}: {}", name, message));
    }
}

fn main() -> std::io::Result<()> {
    pretty_env_logger::init();
    let driver = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(drive)?;
    match driver.join() {
        Ok(result) => result,
        Err(_) => fail("interpreter thread panicked"),
    }
}

fn drive() -> std::io::Result<()> {
    let mut interp = Interpreter::with_config(config_from_env());
    let files: Vec<String> = std::env::args().skip(1).collect();

    if !files.is_empty() {
        for file in files {
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(e) => fail(&format!("{}: {}", file, e)),
            };
            run_script(&mut interp, &file, &text);
        }
        return Ok(());
    }

    if !atty::is(atty::Stream::Stdin) {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        run_script(&mut interp, "<stdin>", &text);
        return Ok(());
    }

    let interface = cmdline::setup()?;
    cmdline::repl(&interface, |input| match cmdline::rep(&mut interp, input) {
        Ok(Some(text)) => text,
        Ok(None) => String::new(),
        Err(message) => Red.paint(message).to_string(),
    });
    cmdline::save_history(&interface)
}
