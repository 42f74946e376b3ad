use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_millis(2000);

/// Executes untrusted script text. Never fails: problems are reported as
/// `Error: ...` lines in the returned output.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, source: &str) -> String;
}

// Runs inside a fresh `node` process per call. The script body becomes an
// async function evaluated in a new vm context with a null-prototype global.
// Console and timers live entirely inside that context: the host only calls
// into it and reads back JSON strings, so no host-realm function or object is
// ever reachable from sandboxed code. String code generation is disabled.
const NODE_HARNESS: &str = r##"
'use strict';
const vm = require('vm');
const timeoutMs = Number(process.argv[1]) || 2000;
const emit = (event) => process.stdout.write(JSON.stringify(event) + '\n');
const describe = (err) => {
  try {
    if (err !== null && typeof err === 'object' && 'message' in err) return String(err.message);
    return String(err);
  } catch (_) {
    return 'Uncaught exception';
  }
};
const PRELUDE = `(() => {
  'use strict';
  const apply = Reflect.apply;
  const stringify = JSON.stringify;
  const toText = String;
  const toNumber = Number;
  const now = Date.now;
  const then = Promise.prototype.then;
  const pending = [];
  const timers = [];
  let nextId = 1;
  let settled = false;
  const record = (kind, text) => { pending[pending.length] = [kind, text]; };
  const render = (value) => {
    if (typeof value === 'string') return value;
    if (value !== null && typeof value === 'object') {
      try { const json = stringify(value); if (json !== undefined) return json; } catch (_) {}
    }
    return toText(value);
  };
  const describe = (err) => {
    try {
      if (err !== null && typeof err === 'object' && 'message' in err) return toText(err.message);
      return toText(err);
    } catch (_) {
      return 'Uncaught exception';
    }
  };
  const log = (...args) => {
    let line = '';
    for (let i = 0; i < args.length; i++) line += (i > 0 ? ' ' : '') + render(args[i]);
    record('log', line);
  };
  globalThis.console = { log, warn: log, error: log, info: log };
  globalThis.setTimeout = (fn, ms, ...args) => {
    const id = nextId++;
    const delay = toNumber(ms) || 0;
    timers[timers.length] = { id, at: now() + (delay > 0 ? delay : 0), fn, args };
    return id;
  };
  globalThis.clearTimeout = (id) => {
    for (let i = 0; i < timers.length; i++) {
      if (timers[i].id === id) timers[i].fn = null;
    }
  };
  const tick = () => {
    const current = now();
    const limit = nextId;
    for (;;) {
      let due = -1;
      for (let i = 0; i < timers.length; i++) {
        const t = timers[i];
        if (t.fn === null || t.id >= limit || t.at > current) continue;
        if (due < 0 || t.at < timers[due].at) due = i;
      }
      if (due < 0) break;
      const t = timers[due];
      const fn = t.fn;
      t.fn = null;
      try {
        if (typeof fn === 'function') apply(fn, undefined, t.args);
      } catch (err) {
        record('error', describe(err));
      }
    }
    let live = 0;
    let next = -1;
    for (let i = 0; i < timers.length; i++) {
      const t = timers[i];
      if (t.fn === null) continue;
      timers[live++] = t;
      if (next < 0 || t.at < next) next = t.at;
    }
    timers.length = live;
    const state = stringify({ events: pending, settled, wait: next < 0 ? -1 : next - now() });
    pending.length = 0;
    return state;
  };
  const track = (result) => {
    try {
      apply(then, result, [
        () => { settled = true; },
        (err) => { record('error', describe(err)); settled = true; },
      ]);
    } catch (_) {
      settled = true;
    }
  };
  return { tick, track };
})()`;
const keepAlive = setInterval(() => {}, 1 << 30);
let finished = false;
const finish = () => {
  if (finished) return;
  finished = true;
  emit({ type: 'done' });
  clearInterval(keepAlive);
};
const pump = (tick) => {
  if (finished) return;
  let state;
  try {
    const raw = tick();
    if (typeof raw !== 'string') throw new Error('Sandbox state was not readable');
    state = JSON.parse(raw);
  } catch (err) {
    emit({ type: 'error', message: describe(err) });
    finish();
    return;
  }
  const events = Array.isArray(state.events) ? state.events : [];
  for (const event of events) {
    const text = Array.isArray(event) ? String(event[1]) : '';
    emit(event[0] === 'error' ? { type: 'error', message: text } : { type: 'log', line: text });
  }
  if (state.settled === true) {
    finish();
    return;
  }
  const wait = typeof state.wait === 'number' && state.wait >= 0 ? Math.min(state.wait, 1000) : 10;
  setTimeout(() => pump(tick), wait);
};
process.on('uncaughtException', (err) => emit({ type: 'error', message: describe(err) }));
process.on('unhandledRejection', (err) => emit({ type: 'error', message: describe(err) }));
let source = '';
process.stdin.setEncoding('utf8');
process.stdin.on('data', (chunk) => { source += chunk; });
process.stdin.on('end', () => {
  let tick;
  try {
    const context = vm.createContext(Object.create(null), {
      codeGeneration: { strings: false, wasm: false },
    });
    const api = vm.runInContext(PRELUDE, context);
    tick = api.tick;
    const track = api.track;
    const result = vm.runInContext('(async function() {\n' + source + '\n})()', context, {
      timeout: timeoutMs,
    });
    track(result);
  } catch (err) {
    emit({ type: 'error', message: describe(err) });
    finish();
    return;
  }
  setImmediate(() => pump(tick));
});
"##;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SandboxEvent {
    Log { line: String },
    Error { message: String },
    Done,
}

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NodeSandbox {
    program: String,
    timeout: Duration,
    permission_flag: OnceCell<Option<&'static str>>,
}

impl Default for NodeSandbox {
    fn default() -> Self {
        Self::new("node", DEFAULT_SANDBOX_TIMEOUT)
    }
}

impl NodeSandbox {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.trim().to_string(),
            timeout,
            permission_flag: OnceCell::new(),
        }
    }

    /// Flag enabling node's permission model, resolved once per sandbox.
    /// With no `--allow-*` grants the process cannot touch the file system,
    /// spawn children or load addons.
    async fn permission_flag(&self) -> Option<&'static str> {
        *self
            .permission_flag
            .get_or_init(|| detect_permission_flag(&self.program))
            .await
    }

    fn command(&self, permission_flag: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(flag) = permission_flag {
            cmd.arg(flag);
        }
        cmd.arg("-e")
            .arg(NODE_HARNESS)
            .arg(self.timeout.as_millis().to_string())
            .env_clear()
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // PATH only, so a bare program name still resolves.
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }
}

#[async_trait]
impl CodeRunner for NodeSandbox {
    async fn run(&self, source: &str) -> String {
        let permission_flag = self.permission_flag().await;
        let mut child = match self.command(permission_flag).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start sandbox runtime '{}': {}", self.program, e);
                return format!("Error: Failed to start sandbox runtime: {}", e);
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let mut captured = Vec::new();

        let outcome = tokio::time::timeout(
            self.timeout,
            collect_events(stdin, stdout, source, &mut captured),
        )
        .await;

        match outcome {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                captured.push("Error: Sandbox exited before the script completed".to_string());
            }
            Ok(Err(e)) => {
                captured.push(format!("Error: {}", e));
            }
            Err(_) => {
                warn!(
                    "Sandboxed script exceeded {} ms; process killed",
                    self.timeout.as_millis()
                );
                captured.push(format!(
                    "Error: Execution timed out after {} ms",
                    self.timeout.as_millis()
                ));
            }
        }

        // Reporting `done` does not mean the process will exit on its own.
        if let Err(e) = child.kill().await {
            debug!("Sandbox process already gone: {}", e);
        }

        captured.join("\n")
    }
}

async fn detect_permission_flag(program: &str) -> Option<&'static str> {
    let version_check = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();
    let version = match tokio::time::timeout(VERSION_CHECK_TIMEOUT, version_check).await {
        Ok(Ok(output)) => String::from_utf8_lossy(&output.stdout).into_owned(),
        _ => return None,
    };

    let flag = permission_flag_for(&version);
    match flag {
        Some(flag) => debug!("Sandbox runtime {} uses {}", version.trim(), flag),
        None => warn!(
            "Sandbox runtime '{}' has no permission model; isolation relies on the vm context only",
            version.trim()
        ),
    }
    flag
}

/// Maps `node --version` output to the flag that turns on its permission
/// model: `--permission` once stable, `--experimental-permission` from 20.
fn permission_flag_for(version: &str) -> Option<&'static str> {
    let mut parts = version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);

    match (major, minor) {
        (24.., _) | (23, 5..) | (22, 13..) => Some("--permission"),
        (20.., _) => Some("--experimental-permission"),
        _ => None,
    }
}

/// Feeds the script to the harness and records its events in order.
/// Returns whether the harness reported completion.
async fn collect_events(
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    source: &str,
    captured: &mut Vec<String>,
) -> std::io::Result<bool> {
    let mut stdin = stdin.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sandbox stdin unavailable")
    })?;
    stdin.write_all(source.as_bytes()).await?;
    stdin.shutdown().await?;
    drop(stdin);

    let stdout = stdout.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sandbox stdout unavailable")
    })?;
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        match serde_json::from_str::<SandboxEvent>(&line) {
            Ok(SandboxEvent::Log { line }) => captured.push(line),
            Ok(SandboxEvent::Error { message }) => captured.push(format!("Error: {}", message)),
            Ok(SandboxEvent::Done) => return Ok(true),
            Err(_) => debug!("Ignoring unexpected sandbox output: {}", line),
        }
    }
    Ok(false)
}
