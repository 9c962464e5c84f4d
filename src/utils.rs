use crate::error::AmpcovError;
use env_logger::{fmt::Color, Builder};
use log::{Level, LevelFilter};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

pub fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            let timestamp = buf.timestamp();

            let mut red_style = buf.style();
            red_style.set_color(Color::Red).set_bold(true);
            let mut green_style = buf.style();
            green_style.set_color(Color::Green).set_bold(true);
            let mut white_style = buf.style();
            white_style.set_color(Color::White).set_bold(false);
            let mut orange_style = buf.style();
            orange_style
                .set_color(Color::Rgb(255, 102, 0))
                .set_bold(true);
            let mut apricot_style = buf.style();
            apricot_style
                .set_color(Color::Rgb(255, 195, 0))
                .set_bold(true);

            let msg = match record.level() {
                Level::Warn => (
                    orange_style.value(record.level()),
                    orange_style.value(record.args()),
                ),
                Level::Info => (
                    green_style.value(record.level()),
                    white_style.value(record.args()),
                ),
                Level::Debug => (
                    apricot_style.value(record.level()),
                    apricot_style.value(record.args()),
                ),
                Level::Error => (
                    red_style.value(record.level()),
                    red_style.value(record.args()),
                ),
                _ => (
                    white_style.value(record.level()),
                    white_style.value(record.args()),
                ),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                white_style.value(timestamp),
                msg.0,
                msg.1
            )
        })
        .filter(None, LevelFilter::Info)
        .init();
}

/// Opens a plain or compressed table for line-wise reading.
///
/// Compression is detected from the file content by `niffler`, so the
/// path extension does not have to match.
pub fn get_table_reader(path: &Path) -> Result<Box<dyn BufRead>, AmpcovError> {
    let file = File::open(path)?;
    let (reader, _format) = niffler::get_reader(Box::new(file))?;
    Ok(Box::new(BufReader::new(reader)))
}

/// Extracts the final path component of a directory or file as a `String`.
pub fn file_name_string(path: &Path) -> Result<String, AmpcovError> {
    path.file_name()
        .ok_or(AmpcovError::FileNameConversionError)
        .and_then(|os_str| {
            os_str
                .to_str()
                .map(String::from)
                .ok_or(AmpcovError::FileNameConversionError)
        })
}
