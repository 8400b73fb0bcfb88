use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();
static VERBOSE: OnceLock<bool> = OnceLock::new();
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

fn use_color() -> bool {
    static USE_COLOR: OnceLock<bool> = OnceLock::new();
    *USE_COLOR.get_or_init(|| env::var_os("NO_COLOR").is_none())
}

fn is_tty() -> bool {
    static IS_TTY: OnceLock<bool> = OnceLock::new();
    *IS_TTY.get_or_init(|| io::stderr().is_terminal())
}

fn paint(code: &str, text: &str) -> String {
    if use_color() {
        format!("\u{1b}[{}m{}\u{1b}[0m", code, text)
    } else {
        text.to_string()
    }
}

fn dim(text: &str) -> String {
    paint("2", text)
}

fn green(text: &str) -> String {
    paint("32", text)
}

fn blue(text: &str) -> String {
    paint("34", text)
}

fn yellow(text: &str) -> String {
    paint("33", text)
}

fn red(text: &str) -> String {
    paint("31", text)
}

/// Enables diagnostic logging. Only the first call has an effect.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) {
    let _ = VERBOSE.set(verbose);

    if let Some(path) = log_file
        && let Ok(file) = OpenOptions::new().create(true).append(true).open(path)
    {
        let _ = LOG_FILE.set(Mutex::new(file));
    }
}

pub fn is_logging_enabled() -> bool {
    VERBOSE.get().copied().unwrap_or(false) || LOG_FILE.get().is_some()
}

pub fn verbose(message: &str) {
    tracing::debug!("{}", message);

    if let Some(file) = LOG_FILE.get()
        && let Ok(mut file) = file.lock()
    {
        let _ = writeln!(file, "[{}ms] {}", elapsed_ms(), message);
    }

    if VERBOSE.get().copied().unwrap_or(false) {
        eprintln!("{}", dim(message));
    }
}

fn elapsed_ms() -> u128 {
    START_TIME
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

pub fn header(command: &str, version: &str) {
    START_TIME.get_or_init(Instant::now);
    eprintln!("{}", dim(&format!("ippm {} v{}", command, version)));
    eprintln!();
}

pub fn step(label: &str, detail: &str) {
    if is_tty() {
        eprint!("\r\u{1b}[K{} {}\n", label, dim(detail));
        let _ = io::stderr().flush();
    } else {
        eprintln!("{} {}", label, dim(detail));
    }
}

pub fn added(name: &str, version: &str) {
    let mark = green("+");
    println!("{} {}@{}", mark, name, version);
}

pub fn package(identity: &str, address: Option<&str>, dependencies: &[(String, String)]) {
    let prefix = if dependencies.is_empty() { "─" } else { "┬" };
    let label = if identity.is_empty() {
        "root project"
    } else {
        identity
    };
    println!("{} {} {}", prefix, green(label), address.unwrap_or(""));

    for (index, (name, version)) in dependencies.iter().enumerate() {
        let branch = if index + 1 == dependencies.len() {
            "└─"
        } else {
            "├─"
        };
        println!("{} {}", branch, blue(&format!("{}@{}", name, version)));
    }

    println!();
}

pub fn summary(count: usize, seconds: f32) {
    println!();
    let time_str = if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else {
        format!("{:.2}s", seconds)
    };
    let noun = if count == 1 { "package" } else { "packages" };
    println!("{} {} locked {}", count, noun, dim(&format!("[{}]", time_str)));
}

pub fn warn(message: &str) {
    let tag = yellow("warn");
    eprintln!("{} {}", tag, message);
}

pub fn error(message: &str) {
    let tag = red("error");
    eprintln!("{} {}", tag, message);
}

pub fn info(message: &str) {
    println!("{}", message);
}
