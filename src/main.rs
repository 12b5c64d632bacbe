mod api;
mod calc;
mod config;
mod db;
mod grouping;
mod ipc;
mod logging;
mod model;
mod outbox;
mod propagate;
mod view;

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use api::types::SaveReply;
use api::ApiError;
use outbox::PendingBatch;
use tracing::{debug, error, info};

/// Longest the loop sleeps when nothing is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

enum Event {
    Line(String),
    Saved(PendingBatch, Result<SaveReply, ApiError>),
    InputClosed,
}

fn spawn_reader(tx: Sender<Event>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "stdin read failed");
                    break;
                }
            };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::InputClosed);
    });
}

/// Sends a batch on its own worker; the result comes back as `Event::Saved`.
fn dispatch(state: &mut ipc::AppState, tx: &Sender<Event>, batch: PendingBatch) {
    let Some(api) = state.api.clone() else {
        ipc::complete_save(state, batch, Err(ApiError::NotConfigured));
        return;
    };
    state.in_flight += 1;
    let tx = tx.clone();
    debug!(save = %batch.target.label(), "dispatching save");
    thread::spawn(move || {
        let result = api.send_batch(&batch);
        let _ = tx.send(Event::Saved(batch, result));
    });
}

fn write_line(stdout: &mut io::Stdout, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}

fn main() {
    let cfg = config::Config::from_env();
    logging::init_tracing(&cfg.log_filter);
    info!(version = env!("CARGO_PKG_VERSION"), server = ?cfg.server_url, "planbookd starting");

    let mut state = ipc::AppState::new(cfg);
    let mut stdout = io::stdout();
    let (tx, rx) = mpsc::channel::<Event>();
    spawn_reader(tx.clone());

    let mut input_open = true;
    loop {
        let now = Instant::now();
        for batch in state.outbox.take_due(now) {
            dispatch(&mut state, &tx, batch);
        }

        if !input_open && state.outbox.is_empty() && state.in_flight == 0 {
            break;
        }

        let wait = state
            .outbox
            .next_deadline()
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(IDLE_WAIT);

        let event = match rx.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            Event::Line(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let req: ipc::Request = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        // Can't reply without id.
                        write_line(&mut stdout, &ipc::err("", "bad_json", e.to_string(), None));
                        continue;
                    }
                };
                let resp = ipc::handle_request(&mut state, req);
                write_line(&mut stdout, &resp);
            }
            Event::Saved(batch, result) => {
                state.in_flight = state.in_flight.saturating_sub(1);
                ipc::complete_save(&mut state, batch, result);
            }
            Event::InputClosed => {
                // Pending edits still go out before exit.
                input_open = false;
                for batch in state.outbox.take_all() {
                    dispatch(&mut state, &tx, batch);
                }
            }
        }
    }
    info!("planbookd stopped");
}
