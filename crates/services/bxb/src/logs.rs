use std::{fs::File, io::Write, path::PathBuf};

use strip_ansi_escapes::strip;
use tracing::{error, info};

use crate::prelude::*;
use crate::run_output::BxRunOutput;

pub fn dump_logs_to_temporary_file(output: &BxRunOutput) {
    match create_temp_and_dump(output) {
        Ok(path) => info!("Logs written to temporary file: {:?}", path),
        Err(e) => error!("Failed to create temporary file and dump logs: {}", e),
    }
}

fn strip_ansi_codes(input: &str) -> String {
    String::from_utf8_lossy(&strip(input.as_bytes())).to_string()
}

pub fn create_temp_and_dump(output: &BxRunOutput) -> Result<PathBuf> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let path = std::env::temp_dir().join(format!("bx_logs_{timestamp}.txt"));
    let mut file = File::create(&path)?;
    dump_logs_internal(output, &mut file, true)?;
    Ok(path)
}

pub fn dump_logs<W: Write>(output: &BxRunOutput, writer: W) -> Result<()> {
    dump_logs_internal(output, writer, false)
}

fn dump_logs_internal<W: Write>(output: &BxRunOutput, mut writer: W, strip_ansi: bool) -> Result<()> {
    for case in output.suite.cases.iter() {
        let Some(logs) = output.logs.get(&case.id) else {
            continue;
        };
        writeln!(writer, "========================")?;
        writeln!(writer, "Log outputs for {}", case.name)?;
        writeln!(writer, "========================")?;
        for line in logs {
            if strip_ansi {
                writeln!(writer, "{}", strip_ansi_codes(line))?;
            } else {
                writeln!(writer, "{line}")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}
