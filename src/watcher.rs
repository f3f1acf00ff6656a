// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Domain watcher: reflects reader activity (touches of a flow's "access"
//! file) back into that flow's header `lastReadTime` runtime field
//! (`SPEC_FULL.md` §4.9).
//!
//! There is no portable, dependency-free filesystem-notification primitive
//! available to this crate's stack, so the watcher polls `access` file mtimes
//! on a single background thread per instance, the same bounded-backoff
//! idiom used by [`crate::wait`]'s non-Linux fallback. Watcher errors never
//! propagate to readers or writers (§4.9 "Failure mode").

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::header::HeaderView;
use crate::layout;
use crate::mapping::{Mapping, OpenMode};
use crate::lock::LockMode;
use crate::time::{self, Clock};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum Command {
    Register { id: Uuid, flow_dir: PathBuf },
    Unregister { id: Uuid },
    Shutdown,
}

struct WatchedFlow {
    id: Uuid,
    flow_dir: PathBuf,
    header: Mapping,
    last_seen_mtime: Option<SystemTime>,
}

/// A single background task per instance that watches every registered
/// flow's access file and updates its header's last-read timestamp.
pub struct DomainWatcher {
    tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl DomainWatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Command>();
        let handle = std::thread::spawn(move || run(rx));
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Registers `flow_id` (found under `flow_dir`) for watching.
    /// Registration is by (writer handle, flow id) conceptually; in practice
    /// only the flow id and its directory are needed to locate the header.
    /// Errors opening the header are swallowed: the watcher simply never
    /// updates that flow's timestamp, per the non-fatal failure contract.
    pub fn register(&self, flow_id: Uuid, flow_dir: PathBuf) {
        let _ = self.tx.send(Command::Register {
            id: flow_id,
            flow_dir,
        });
    }

    /// Removes a flow from the watch set. Idempotent: removing an id that
    /// isn't registered (or was already removed) is not an error.
    pub fn unregister(&self, flow_id: Uuid) {
        let _ = self.tx.send(Command::Unregister { id: flow_id });
    }
}

impl Default for DomainWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DomainWatcher {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(rx: mpsc::Receiver<Command>) {
    let mut watched: Vec<WatchedFlow> = Vec::new();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Register { id, flow_dir }) => {
                watched.retain(|w| w.id != id);
                match open_header_for_watch(&flow_dir) {
                    Ok(header) => watched.push(WatchedFlow {
                        id,
                        flow_dir,
                        header,
                        last_seen_mtime: None,
                    }),
                    Err(e) => {
                        tracing::debug!(flow_id = %id, error = %e, "watcher failed to open flow header; skipping");
                    }
                }
            }
            Ok(Command::Unregister { id }) => {
                watched.retain(|w| w.id != id);
            }
            Ok(Command::Shutdown) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        for flow in &mut watched {
            if let Err(e) = poll_one(flow) {
                tracing::debug!(flow_id = %flow.id, error = %e, "watcher poll failed; continuing with stale timestamp");
            }
        }
    }
}

fn open_header_for_watch(flow_dir: &std::path::Path) -> crate::error::Result<Mapping> {
    let path = layout::data_path(flow_dir);
    Mapping::open(&path, OpenMode::ReadWrite, LockMode::None, 0)
}

fn poll_one(flow: &mut WatchedFlow) -> std::io::Result<()> {
    let access_path = layout::access_path(&flow.flow_dir);
    let metadata = std::fs::metadata(&access_path)?;
    let mtime = metadata.modified()?;

    let changed = match flow.last_seen_mtime {
        Some(prev) => mtime > prev,
        None => true,
    };
    flow.last_seen_mtime = Some(mtime);

    if changed {
        let now = time::now(Clock::Tai);
        HeaderView::new(flow.header.bytes())
            .last_read_time_atomic()
            .store(now, Ordering::Release);
    }
    Ok(())
}
