//! Remote invocation (§4.5): sending bound arguments to a source's child
//! interpreter and reading back its result, bridging sync and async calling
//! conventions and honoring cancellation.
//!
//! The wire format here is newline-framed JSON in both directions: one JSON
//! object written to the child's stdin per call, one JSON object read back
//! from its stdout per produced value. `TypeTag` and `CallOutput` were
//! designed to round-trip through JSON (see [`crate::descriptor`]) precisely
//! so this boundary never needs anything richer than `serde_json`.
//!
//! Each call spawns its own runner process rather than reusing one long-lived
//! worker per source: the sync/async bridging this module would otherwise
//! need to do to keep a worker's event loop alive across calls is pushed onto
//! the child instead, which already has to start one per call to run a
//! coroutine or drain a generator. A source with import-time side effects
//! meant to persist across calls is out of scope (§1 non-goals).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::context::CallContext;
use crate::descriptor::Shape;
use crate::error::IndexError;
use crate::inline::{CallOutput, ValueStream};

/// One call request written to the child's stdin.
#[derive(Serialize)]
struct CallRequest<'a> {
    symbol: &'a str,
    args: &'a Value,
}

/// One frame read back from the child's stdout.
#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CallFrame {
    Ok { value: Value },
    Error { message: String },
    /// Sentinel closing a generator-shaped call; no further frames follow.
    Done,
}

/// Spawns a source's runner subprocess per call and speaks its wire protocol.
pub struct Invoker {
    source_root: PathBuf,
    python_bin: String,
    /// The source's declared env vars (§4.2) — the only variables besides
    /// `PATH` visible to a spawned runner. Host variables never leak in.
    env_vars: HashMap<String, String>,
}

impl Invoker {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            python_bin: "python3".to_string(),
            env_vars: HashMap::new(),
        }
    }

    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    pub fn with_env_vars(mut self, env_vars: HashMap<String, String>) -> Self {
        self.env_vars = env_vars;
        self
    }

    /// Invoke `symbol` with already-bound `args`, honoring `shape` and `ctx`'s
    /// cancellation. Sync/async bridging happens inside the child process —
    /// the runner script awaits coroutines and drains generators itself,
    /// since it's the side with an event loop (or none at all) to bridge.
    #[tracing::instrument(skip(self, args, ctx), fields(symbol, shape = ?shape))]
    pub async fn call(
        &self,
        symbol: &str,
        args: Value,
        shape: Shape,
        ctx: &CallContext,
    ) -> Result<CallOutput, IndexError> {
        if ctx.is_cancelled() {
            return Err(IndexError::Cancelled {
                tool_id: symbol.to_string(),
            });
        }

        let mut child = self.spawn_child(symbol)?;
        self.write_request(&mut child, symbol, &args).await?;

        if shape.is_generator() {
            let stream = Self::frame_stream(child, symbol.to_string(), ctx.cancellation().clone());
            Ok(CallOutput::Stream(Box::pin(stream) as ValueStream))
        } else {
            let value = Self::read_single(&mut child, symbol).await?;
            let _ = child.wait().await;
            Ok(CallOutput::Single(value))
        }
    }

    fn spawn_child(&self, symbol: &str) -> Result<Child, IndexError> {
        Command::new(&self.python_bin)
            .arg("-c")
            .arg(RUNNER_SCRIPT)
            .current_dir(&self.source_root)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .envs(&self.env_vars)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IndexError::invocation(symbol, format!("could not spawn runner: {e}")))
    }

    async fn write_request(
        &self,
        child: &mut Child,
        symbol: &str,
        args: &Value,
    ) -> Result<(), IndexError> {
        let request = CallRequest { symbol, args };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| IndexError::invocation(symbol, format!("could not encode request: {e}")))?;
        line.push('\n');

        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| IndexError::invocation(symbol, "runner stdin unavailable"))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| IndexError::invocation(symbol, format!("could not write request: {e}")))
    }

    async fn read_single(child: &mut Child, symbol: &str) -> Result<Value, IndexError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| IndexError::invocation(symbol, "runner stdout unavailable"))?;
        let mut reader = BufReader::new(stdout).lines();
        let line = reader
            .next_line()
            .await
            .map_err(|e| IndexError::invocation(symbol, format!("could not read response: {e}")))?
            .ok_or_else(|| IndexError::invocation(symbol, "runner closed its output unexpectedly"))?;
        decode_frame(&line, symbol)
    }

    /// Build a stream that reads frames from the child's stdout until the
    /// `Done` sentinel, cancelling the child if the caller's token fires
    /// mid-stream.
    fn frame_stream(
        mut child: Child,
        symbol: String,
        cancellation: tokio_util::sync::CancellationToken,
    ) -> impl futures::Stream<Item = Result<Value, IndexError>> {
        let stdout = child.stdout.take();
        stream::unfold(
            (child, stdout.map(|s| BufReader::new(s).lines()), symbol, cancellation, false),
            move |(mut child, reader, symbol, cancellation, done)| async move {
                if done {
                    return None;
                }
                let mut reader = reader?;

                let line = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        let _ = child.start_kill();
                        return Some((
                            Err(IndexError::Cancelled { tool_id: symbol.clone() }),
                            (child, Some(reader), symbol, cancellation, true),
                        ));
                    }
                    line = reader.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => match decode_frame(&line, &symbol) {
                        Ok(value) => Some((Ok(value), (child, Some(reader), symbol, cancellation, false))),
                        Err(e) if is_done_sentinel(&line) => {
                            let _ = e;
                            None
                        }
                        Err(e) => Some((Err(e), (child, Some(reader), symbol, cancellation, true))),
                    },
                    Ok(None) => None,
                    Err(e) => Some((
                        Err(IndexError::invocation(&symbol, format!("could not read response: {e}"))),
                        (child, Some(reader), symbol, cancellation, true),
                    )),
                }
            },
        )
    }
}

fn is_done_sentinel(line: &str) -> bool {
    matches!(
        serde_json::from_str::<CallFrame>(line.trim()),
        Ok(CallFrame::Done)
    )
}

fn decode_frame(line: &str, symbol: &str) -> Result<Value, IndexError> {
    if line.trim().is_empty() {
        return Err(IndexError::invocation(symbol, "runner closed its output unexpectedly"));
    }
    let frame: CallFrame = serde_json::from_str(line.trim())
        .map_err(|e| IndexError::invocation(symbol, format!("could not decode response: {e}")))?;
    match frame {
        CallFrame::Ok { value } => Ok(value),
        CallFrame::Error { message } => Err(IndexError::invocation(symbol, message)),
        CallFrame::Done => Err(IndexError::invocation(symbol, "runner closed before producing a value")),
    }
}

/// Bootstrap run inside the child interpreter: read one newline-framed JSON
/// request from stdin, invoke the named symbol, write one newline-framed JSON
/// response per produced value. Kept short deliberately — this only has to
/// exercise the wire contract [`Invoker`] speaks; actual call dispatch is the
/// source's own already-imported code.
const RUNNER_SCRIPT: &str = r#"
import sys, json, importlib, inspect, asyncio

def _encode(value):
    return json.dumps({"status": "ok", "value": value})

def _encode_error(exc):
    return json.dumps({"status": "error", "message": str(exc)})

def _run(symbol, args):
    module_name, _, attr = symbol.rpartition(".")
    module = importlib.import_module(module_name)
    fn = getattr(module, attr)
    result = fn(**args)
    if inspect.iscoroutine(result):
        result = asyncio.run(result)
    if inspect.isasyncgen(result):
        async def _drain():
            async for item in result:
                print(_encode(item), flush=True)
        asyncio.run(_drain())
        print(json.dumps({"status": "done"}), flush=True)
        return
    if inspect.isgenerator(result):
        for item in result:
            print(_encode(item), flush=True)
        print(json.dumps({"status": "done"}), flush=True)
        return
    print(_encode(result), flush=True)

line = sys.stdin.readline().strip()
if line:
    request = json.loads(line)
    try:
        _run(request["symbol"], request["args"])
    except Exception as exc:  # surfaced to the host as an Invocation error
        print(_encode_error(exc), flush=True)
"#;
