//! Out-of-process sandbox: one interpreter child per call.
//!
//! Protocol: the request is written to the child's stdin as a single JSON
//! line, then stdin is closed.
//!
//! ```text
//! {"module": "<source>", "args": [...]}          call the default export
//! {"module": "<source>", "check_export": true}  is the default export a function?
//! ```
//!
//! The child answers on stdout with exactly one JSON object:
//!
//! ```text
//! {"ok": <value>}            returned value (check_export: true or false)
//! {"error": "<message>"}     the function threw
//! {"compile_error": "<msg>"} the module failed to load
//! ```
//!
//! A non-zero exit is a runtime failure carrying stderr. A child still
//! running when the budget elapses is killed.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use folio_config::{ConfigError, SandboxConfig};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::invariance::ensure_round_trip_invariant;
use crate::{ExecutionFailed, Sandbox, ScriptModule};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_STDERR_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum Response {
    Ok(Value),
    Error(String),
    CompileError(String),
}

/// Sandbox that delegates every call to a fresh interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    program: String,
    args: Vec<String>,
    budget: Duration,
    max_output_bytes: usize,
}

impl ProcessSandbox {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, budget: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            budget,
            max_output_bytes: 1024 * 1024,
        }
    }

    /// Build from the `[sandbox]` config section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when no interpreter is set.
    pub fn from_config(config: &SandboxConfig) -> Result<Self, ConfigError> {
        let (program, args) = config.interpreter_command()?;
        Ok(Self::new(program, args.to_vec(), config.timeout())
            .with_max_output_bytes(config.max_output_bytes))
    }

    #[must_use]
    pub const fn with_max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }

    fn call(&self, request: &Value) -> Result<Response, ExecutionFailed> {
        let mut line = serde_json::to_vec(request)
            .map_err(|e| ExecutionFailed::internal(format!("failed to encode request: {e}")))?;
        line.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ExecutionFailed::internal(format!("failed to spawn '{}': {e}", self.program))
            })?;

        let stdin = child.stdin.take();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A child that never reads its input closes the pipe early.
                let _ = stdin.write_all(&line);
            }
        });
        let stdout = spawn_reader(child.stdout.take(), self.max_output_bytes);
        let stderr = spawn_reader(child.stderr.take(), MAX_STDERR_CHARS * 4);

        let status = self.wait_within_budget(&mut child)?;
        let _ = writer.join();
        let (stdout, stdout_truncated) = join_reader(stdout)?;
        let (stderr, _) = join_reader(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            let cause = if stderr.is_empty() {
                format!("interpreter exited with {status}")
            } else {
                truncate_chars(stderr, MAX_STDERR_CHARS)
            };
            return Err(ExecutionFailed::runtime(cause));
        }
        if stdout_truncated {
            return Err(ExecutionFailed::internal(format!(
                "interpreter output exceeded {} bytes",
                self.max_output_bytes
            )));
        }

        serde_json::from_slice(&stdout).map_err(|e| {
            ExecutionFailed::internal(format!("malformed interpreter response: {e}"))
        })
    }

    fn wait_within_budget(&self, child: &mut Child) -> Result<ExitStatus, ExecutionFailed> {
        let deadline = Instant::now() + self.budget;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(
                        program = %self.program,
                        budget_ms = self.budget.as_millis(),
                        "interpreter killed after exceeding budget"
                    );
                    return Err(ExecutionFailed::timeout(self.budget));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(ExecutionFailed::internal(format!(
                        "failed to wait for interpreter: {e}"
                    )));
                }
            }
        }
    }
}

impl Sandbox for ProcessSandbox {
    fn module_default_exports_function(&self, module: &ScriptModule) -> bool {
        let request = json!({"module": module.source(), "check_export": true});
        match self.call(&request) {
            Ok(Response::Ok(Value::Bool(exports_function))) => exports_function,
            Ok(_) => false,
            Err(failure) => {
                tracing::debug!(module = %module, %failure, "export check failed");
                false
            }
        }
    }

    fn execute_sync_function(
        &self,
        module: &ScriptModule,
        args: &[Value],
    ) -> Result<Value, ExecutionFailed> {
        let request = json!({"module": module.source(), "args": args});
        match self.call(&request)? {
            Response::Ok(value) => ensure_round_trip_invariant(value),
            Response::Error(message) => Err(ExecutionFailed::runtime(message)),
            Response::CompileError(message) => Err(ExecutionFailed::compile(message)),
        }
    }
}

type Reader = Option<JoinHandle<io::Result<(Vec<u8>, bool)>>>;

/// Read up to `limit` bytes, then drain the rest so the child never blocks on
/// a full pipe. The flag reports whether anything was dropped.
fn spawn_reader<R: Read + Send + 'static>(source: Option<R>, limit: usize) -> Reader {
    source.map(|mut source| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
            (&mut source).take(cap).read_to_end(&mut buf)?;
            let truncated = buf.len() > limit;
            if truncated {
                buf.truncate(limit);
                io::copy(&mut source, &mut io::sink())?;
            }
            Ok((buf, truncated))
        })
    })
}

fn join_reader(reader: Reader) -> Result<(Vec<u8>, bool), ExecutionFailed> {
    let Some(handle) = reader else {
        return Ok((Vec::new(), false));
    };
    handle
        .join()
        .map_err(|_| ExecutionFailed::internal("output reader panicked"))?
        .map_err(|e| ExecutionFailed::internal(format!("failed to read interpreter output: {e}")))
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
