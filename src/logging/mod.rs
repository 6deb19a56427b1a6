mod connected_to_journal;

use std::{
    io::{self, Write},
    time::SystemTime,
};

use anstyle::{AnsiColor, Effects, Style};
use connected_to_journal::connected_to_journal;
use env_logger::{Env, fmt::Formatter};
use log::{
    Level, Record,
    kv::{self, Key, Source, Value, VisitSource},
};

/// Logs to stderr, honouring `RUST_LOG`. Under systemd the lines carry
/// syslog priorities instead of timestamps and colours.
pub fn init() {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if connected_to_journal() {
        builder.format(journal_line);
    } else {
        builder.format(terminal_line);
    }
    builder.init();
}

fn priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Error => AnsiColor::Red.on_default().effects(Effects::BOLD),
        Level::Warn => AnsiColor::Yellow.on_default(),
        Level::Info => AnsiColor::Green.on_default(),
        Level::Debug => AnsiColor::Blue.on_default(),
        Level::Trace => AnsiColor::Cyan.on_default(),
    }
}

fn journal_line(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    write!(
        buf,
        "<{}>{}: {}",
        priority(record.level()),
        record.target(),
        record.args()
    )?;
    write_fields(buf, record.key_values())?;
    writeln!(buf)
}

fn terminal_line(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    let subtle = AnsiColor::BrightBlack.on_default();
    let level_style = level_style(record.level());

    write!(buf, "{subtle}[{subtle:#}")?;
    match jiff::Timestamp::try_from(SystemTime::now()) {
        Ok(now) => write!(buf, "{now:.3} ")?,
        Err(_) => write!(buf, "timestamp_error ")?,
    }
    write!(
        buf,
        "{level_style}{}{level_style:#} {}",
        record.level(),
        record.target()
    )?;
    if let Some(line) = record.line() {
        write!(buf, ":{line}")?;
    }
    write!(buf, "{subtle}]{subtle:#} {}", record.args())?;
    write_fields(buf, record.key_values())?;
    writeln!(buf)
}

/// Appends structured fields as ` key=value`.
fn write_fields<W: Write>(out: &mut W, fields: &dyn Source) -> io::Result<()> {
    struct Fields<'w, W>(&'w mut W);

    impl<'kvs, W: Write> VisitSource<'kvs> for Fields<'_, W> {
        fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
            write!(self.0, " {key}={value}").map_err(|_| kv::Error::msg("log output not writable"))
        }
    }

    fields
        .visit(&mut Fields(out))
        .map_err(|e| io::Error::other(e.to_string()))
}
