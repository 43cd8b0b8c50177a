// Helper functions shared by the extractor and transcoder backends

use lazy_static::lazy_static;
use regex::Regex;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{timeout, Duration as TokioDuration};

lazy_static! {
    // ESC, then a CSI-style parameter / intermediate / final byte run
    static ref ANSI_RE: Regex = Regex::new(r"\x1B[@-_][0-?]*[ -/]*[@-~]").unwrap();
}

/// Remove terminal control sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Progress text as it should appear in a log view
pub fn clean_progress(raw: &str) -> String {
    strip_ansi(raw).trim().to_string()
}

/// Which pipe a line came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Stdout(String),
    Stderr(String),
}

/// Forward every line of `reader` into `tx`, tagged by `wrap`
pub fn forward_lines<R>(
    reader: R,
    tx: UnboundedSender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

/// Run command to completion, optionally bounded by a timeout
///
/// `Ok(None)` means the timeout fired and the child was killed.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: Option<u64>,
) -> Result<Option<std::process::Output>, std::io::Error> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| missing_pipe(program, "stdout"))?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| missing_pipe(program, "stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match timeout_secs {
        None => child.wait().await?,
        Some(secs) => match timeout(TokioDuration::from_secs(secs), child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Ok(None);
            }
        },
    };

    let stdout = stdout_task.await.map_err(join_error)??;
    let stderr = stderr_task.await.map_err(join_error)??;
    Ok(Some(std::process::Output { status, stdout, stderr }))
}

/// Last few non-empty lines, for error messages
pub fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

fn missing_pipe(program: &str, pipe: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("Failed to capture {} from {}", pipe, program),
    )
}

fn join_error(e: tokio::task::JoinError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("reader task failed: {}", e))
}
