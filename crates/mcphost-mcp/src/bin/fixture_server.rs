//! Scriptable stdio tool server used by the integration tests.
//!
//! Behaviour is selected through the environment:
//!
//! - `FIXTURE_MODE`: `normal` (default), `exit` (exit 3 before reading
//!   anything), `no-init` (reject `initialize`), `hang` (never answer
//!   `tools/call`), `slow` (answer each call after `FIXTURE_DELAY_MS`, with
//!   a thread per call, reporting the peak number of overlapping calls),
//!   `crash` (exit 1 on the first `tools/call` without answering)
//! - `FIXTURE_TOOLS`: comma separated tool names, default `echo`
//! - `FIXTURE_NAME`: server name reported by `initialize`
//! - `FIXTURE_PAGE_SIZE`: paginate `tools/list` with this many tools per page
//!
//! Tools: `echo` returns `arguments.text`; `fail` returns an `isError`
//! result; `learn` adds `arguments.name` to the catalog and then sends
//! `notifications/tools/list_changed`; anything else returns its own name.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Exit,
    NoInit,
    Hang,
    Slow,
    Crash,
}

impl Mode {
    fn from_env() -> Self {
        match std::env::var("FIXTURE_MODE").as_deref() {
            Ok("exit") => Self::Exit,
            Ok("no-init") => Self::NoInit,
            Ok("hang") => Self::Hang,
            Ok("slow") => Self::Slow,
            Ok("crash") => Self::Crash,
            _ => Self::Normal,
        }
    }
}

struct Fixture {
    mode: Mode,
    name: String,
    tools: Mutex<Vec<String>>,
    page_size: Option<usize>,
    delay: Duration,
    out: Arc<Mutex<io::Stdout>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Fixture {
    fn from_env() -> Self {
        let tools = std::env::var("FIXTURE_TOOLS")
            .unwrap_or_else(|_| "echo".to_string())
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        let delay_ms = std::env::var("FIXTURE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);

        Self {
            mode: Mode::from_env(),
            name: std::env::var("FIXTURE_NAME").unwrap_or_else(|_| "fixture".to_string()),
            tools: Mutex::new(tools),
            page_size: std::env::var("FIXTURE_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0),
            delay: Duration::from_millis(delay_ms),
            out: Arc::new(Mutex::new(io::stdout())),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn send(&self, message: &Value) {
        send(&self.out, message);
    }

    fn catalog(&self) -> Vec<String> {
        self.tools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn handle(&self, message: &Value) {
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return;
        };
        let Some(id) = message.get("id").cloned() else {
            // Notifications need no answer.
            return;
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        match method {
            "initialize" if self.mode == Mode::NoInit => self.send(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32603, "message": "initialization refused" }
            })),
            "initialize" => self.send(&ok(
                &id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": self.name, "version": "0.0.1" }
                }),
            )),
            "tools/list" => self.send(&ok(&id, self.tools_page(&params))),
            "tools/call" => self.call(id, &params),
            "ping" => self.send(&ok(&id, json!({}))),
            _ => self.send(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            })),
        }
    }

    fn tools_page(&self, params: &Value) -> Value {
        let describe = |name: &String| {
            json!({
                "name": name,
                "description": format!("{name} from {}", self.name),
                "inputSchema": {
                    "type": "object",
                    "properties": { "text": { "type": "string" } }
                }
            })
        };

        let tools = self.catalog();
        let Some(size) = self.page_size else {
            return json!({ "tools": tools.iter().map(describe).collect::<Vec<_>>() });
        };
        let start: usize = params
            .get("cursor")
            .and_then(Value::as_str)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (start + size).min(tools.len());
        let page: Vec<Value> = tools[start.min(end)..end].iter().map(describe).collect();
        if end < tools.len() {
            json!({ "tools": page, "nextCursor": end.to_string() })
        } else {
            json!({ "tools": page })
        }
    }

    fn call(&self, id: Value, params: &Value) {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.mode {
            Mode::Hang => {}
            Mode::Crash => {
                eprintln!("fixture crashing on tools/call");
                std::process::exit(1);
            }
            Mode::Slow => {
                let out = Arc::clone(&self.out);
                let active = Arc::clone(&self.active);
                let peak = Arc::clone(&self.peak);
                let delay = self.delay;
                thread::spawn(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(delay);
                    let seen = peak.load(Ordering::SeqCst);
                    active.fetch_sub(1, Ordering::SeqCst);
                    send(
                        &out,
                        &ok(
                            &id,
                            json!({ "content": [{ "type": "text", "text": format!("peak={seen}") }] }),
                        ),
                    );
                });
            }
            _ if name == "learn" => {
                let learned = arguments
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("learned")
                    .to_string();
                self.tools
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(learned.clone());
                self.send(&ok(
                    &id,
                    json!({ "content": [{ "type": "text", "text": learned }] }),
                ));
                self.send(&json!({
                    "jsonrpc": "2.0",
                    "method": "notifications/tools/list_changed"
                }));
            }
            _ => self.send(&ok(&id, tool_result(&name, &arguments))),
        }
    }
}

fn tool_result(name: &str, arguments: &Value) -> Value {
    match name {
        "echo" => {
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            json!({ "content": [{ "type": "text", "text": text }] })
        }
        "fail" => json!({
            "content": [{ "type": "text", "text": "tool failed on purpose" }],
            "isError": true
        }),
        other => json!({ "content": [{ "type": "text", "text": other }] }),
    }
}

fn ok(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn send(out: &Mutex<io::Stdout>, message: &Value) {
    let mut out = out.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    // A closed stdout means the host is gone; nothing left to do.
    let _ = writeln!(out, "{message}").and_then(|()| out.flush());
}

fn main() {
    let fixture = Fixture::from_env();
    if fixture.mode == Mode::Exit {
        eprintln!("fixture exiting on request");
        std::process::exit(3);
    }
    eprintln!("fixture '{}' ready with {} tools", fixture.name, fixture.catalog().len());

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(message) => fixture.handle(&message),
            Err(e) => eprintln!("fixture: unparseable line: {e}"),
        }
    }
}
