use super::AdapterError;
use crate::config::ChildCommand;
use std::io::{BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const STDERR_TAIL_BYTES: usize = 4096;
const TERM_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub(crate) struct ChildOutput {
    pub stdout: String,
    pub stderr_tail: String,
}

pub(crate) fn run_child(
    command: &ChildCommand,
    input: String,
    timeout: Duration,
    stop: &AtomicBool,
) -> Result<ChildOutput, AdapterError> {
    let program = command.program.clone();

    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AdapterError::MissingBinary { program })
        }
        Err(source) => return Err(AdapterError::Spawn { program, source }),
    };

    let mut stdin = child.stdin.take().ok_or_else(|| AdapterError::Io {
        program: program.clone(),
        source: std::io::Error::other("missing stdin pipe"),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| AdapterError::Io {
        program: program.clone(),
        source: std::io::Error::other("missing stdout pipe"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| AdapterError::Io {
        program: program.clone(),
        source: std::io::Error::other("missing stderr pipe"),
    })?;

    // The request can be megabytes of base64; write it off-thread so a child
    // that floods stdout before draining stdin cannot deadlock us.
    let stdin_writer = thread::spawn(move || {
        let _ = stdin.write_all(input.as_bytes());
    });
    let stdout_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_string(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_string(&mut buf);
        buf
    });

    let start = Instant::now();
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if stop.load(Ordering::Relaxed) {
                    terminate_child(&mut child);
                    let _ = stdin_writer.join();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(AdapterError::Cancelled { program });
                }
                if start.elapsed() > timeout {
                    terminate_child(&mut child);
                    let _ = stdin_writer.join();
                    let _ = stdout_reader.join();
                    let stderr = stderr_reader.join().unwrap_or_default();
                    return Err(AdapterError::Timeout {
                        program,
                        timeout_ms: timeout.as_millis() as u64,
                        stderr_tail: tail_of(&stderr),
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(source) => return Err(AdapterError::Io { program, source }),
        }
    };

    let _ = stdin_writer.join();
    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !exit_status.success() {
        return Err(AdapterError::NonZeroExit {
            program,
            exit_code: exit_status.code().unwrap_or(-1),
            stderr_tail: tail_of(&stderr),
        });
    }

    Ok(ChildOutput {
        stdout,
        stderr_tail: tail_of(&stderr),
    })
}

pub(crate) fn parse_child_json(
    program: &str,
    output: &ChildOutput,
) -> Result<serde_json::Value, AdapterError> {
    let trimmed = output.stdout.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::Parse {
            program: program.to_string(),
            reason: "stdout was empty".to_string(),
            stderr_tail: output.stderr_tail.clone(),
        });
    }
    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|err| AdapterError::Parse {
            program: program.to_string(),
            reason: err.to_string(),
            stderr_tail: output.stderr_tail.clone(),
        })?;
    if let Some(message) = value.get("error").and_then(serde_json::Value::as_str) {
        if !message.is_empty() {
            return Err(AdapterError::ChildError {
                program: program.to_string(),
                message: message.to_string(),
            });
        }
    }
    Ok(value)
}

fn terminate_child(child: &mut Child) {
    send_signal(child.id(), "-TERM");
    let grace_start = Instant::now();
    while grace_start.elapsed() < TERM_GRACE {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn send_signal(pid: u32, signal: &str) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg(signal)
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, signal);
    }
}

fn tail_of(stderr: &str) -> String {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr.to_string();
    }
    let mut start = stderr.len() - STDERR_TAIL_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].to_string()
}
