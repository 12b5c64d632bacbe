#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

const DEBOUNCE_VARS: [&str; 6] = [
    "PLANBOOK_DEBOUNCE_SCORES_MS",
    "PLANBOOK_DEBOUNCE_EXAM_SCORES_MS",
    "PLANBOOK_DEBOUNCE_QUALITATIVE_MS",
    "PLANBOOK_DEBOUNCE_ATTENDANCE_MS",
    "PLANBOOK_DEBOUNCE_UNIT_HOURS_MS",
    "PLANBOOK_DEBOUNCE_UNIT_EXAM_SCORES_MS",
];

/// Sidecar with no server configured.
pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_with(None, 60_000)
}

/// Sidecar talking to `server_url`, every save kind debounced by `debounce_ms`.
pub fn spawn_with(server_url: Option<&str>, debounce_ms: u64) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_planbookd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("PLANBOOK_SERVER_URL")
        .env_remove("PLANBOOK_CSRF_TOKEN")
        .env_remove("PLANBOOK_SESSION_COOKIE")
        .env("PLANBOOK_LOG", "debug")
        .env("PLANBOOK_HTTP_TIMEOUT_MS", "5000");
    for var in DEBOUNCE_VARS {
        cmd.env(var, debounce_ms.to_string());
    }
    if let Some(url) = server_url {
        cmd.env("PLANBOOK_SERVER_URL", url);
    }
    let mut child = cmd.spawn().expect("spawn planbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

/// Returns the `error` object of a failed response.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} should fail: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or(Value::Null)
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub query: String,
    pub body: Option<Value>,
}

type Routes = HashMap<String, VecDeque<(u16, String)>>;

/// Minimal HTTP/1.1 stand-in for the lesson-planning server.
///
/// Replies come from a per-route queue; the last reply of a queue repeats.
/// Unrouted requests get a 404 with an error body.
#[derive(Clone)]
pub struct FakeServer {
    pub url: String,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let server = FakeServer {
            url: format!("http://{}", addr),
            routes: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let worker = server.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let worker = worker.clone();
                thread::spawn(move || worker.serve(stream));
            }
        });
        server
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: Value) -> &Self {
        self.routes
            .lock()
            .expect("lock")
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    pub fn route_text(&self, method: &str, path: &str, body: &str) -> &Self {
        self.routes
            .lock()
            .expect("lock")
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back((200, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Polls until `count` requests hit the route or `timeout` passes.
    pub fn wait_for(&self, method: &str, path: &str, count: usize, timeout: Duration) -> Vec<Recorded> {
        let start = Instant::now();
        loop {
            let hits = self.requests_to(method, path);
            if hits.len() >= count || start.elapsed() > timeout {
                return hits;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn reply_for(&self, method: &str, path: &str) -> (u16, String) {
        let mut routes = self.routes.lock().expect("lock");
        match routes.get_mut(&format!("{} {}", method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("queued reply"),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => (
                404,
                json!({ "status": "error", "message": format!("no route for {} {}", method, path) })
                    .to_string(),
            ),
        }
    }

    fn serve(&self, stream: TcpStream) {
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("").to_string();
        let target = parts.next().unwrap_or("").to_string();
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target.clone(), String::new()),
        };

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).is_err() {
                return;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0u8; content_length];
        if content_length > 0 && reader.read_exact(&mut body).is_err() {
            return;
        }
        let body = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        };

        self.requests.lock().expect("lock").push(Recorded {
            method: method.clone(),
            path: path.clone(),
            query,
            body,
        });

        let (status, text) = self.reply_for(&method, &path);
        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            text.len(),
            text
        );
        let mut stream = stream;
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
    }
}

/// Gradebook payload: two units, a qualitative template, three students in two groups.
pub fn gradebook_payload() -> Value {
    json!({
        "students": [
            {"id": 1, "roll_number": 1, "student_id": "S001", "first_name": "Anan", "last_name": "K",
             "midterm_score": 15, "final_score": null, "alerts": {}},
            {"id": 2, "roll_number": 2, "student_id": "S002", "first_name": "Bua", "last_name": "P",
             "midterm_score": null, "final_score": null, "alerts": {"ร": "ขาดส่งงาน"}},
            {"id": 3, "roll_number": 3, "student_id": "S003", "first_name": "Chai", "last_name": "T",
             "midterm_score": 10, "final_score": 20, "alerts": {}}
        ],
        "units_data": [
            {"unit_id": 10, "title": "Unit A", "items": [
                {"id": 100, "name": "Quiz", "max_score": 10, "learning_unit_id": 10, "is_group_assignment": false},
                {"id": 101, "name": "Project", "max_score": 20, "learning_unit_id": 10, "is_group_assignment": true}
            ]},
            {"unit_id": 20, "title": "Unit B", "items": [
                {"id": 200, "name": "Lab", "max_score": 10, "learning_unit_id": 20}
            ]}
        ],
        "scores": {
            "1-100": {"score": 8},
            "1-101": {"score": 15}
        },
        "groups": [
            {"id": 7, "name": "Red", "learning_unit_id": 10},
            {"id": 8, "name": "Blue", "learning_unit_id": 10}
        ],
        "unit_group_map": {
            "10": {"1": "Red", "2": "Red", "3": "Blue"}
        },
        "qualitative_assessment_data": [
            {"template_id": 1, "template_name": "Desirable traits",
             "rubrics": [{"label": "ดีเยี่ยม", "value": 3}, {"label": "ดี", "value": 2}, {"label": "ผ่าน", "value": 1}],
             "main_topics": [
                {"main_topic_id": 500, "main_topic_name": "Discipline", "learning_unit_id": 10,
                 "selected_sub_topics": [{"id": 501, "name": "On time"}, {"id": 502, "name": "Uniform"}]}
             ]}
        ],
        "is_midterm_enabled": true,
        "is_final_enabled": true,
        "grand_max_score": 100,
        "total_midterm_max_score": 20,
        "total_final_max_score": 30
    })
}

/// Cell value of `key` in the row of `student` within a view or edit result.
pub fn cell_value(rows: &Value, student: i64, key: &str) -> Option<String> {
    rows.as_array()?
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_i64()) == Some(student))?
        .get("cells")?
        .as_array()?
        .iter()
        .find(|c| c.get("key").and_then(|k| k.as_str()) == Some(key))?
        .get("value")?
        .as_str()
        .map(|s| s.to_string())
}

pub fn row<'a>(rows: &'a Value, student: i64) -> &'a Value {
    rows.as_array()
        .expect("rows array")
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_i64()) == Some(student))
        .expect("row for student")
}
