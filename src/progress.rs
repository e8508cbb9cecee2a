use std::io::{self, Write};
use std::time::Instant;

/// Per-document batch progress on stderr.
pub struct BatchProgress {
    enabled: bool,
    t0: Instant,
    total: usize,
    done: usize,
    failed: usize,
}

impl BatchProgress {
    pub fn new(enabled: bool, total: usize) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
            total,
            done: 0,
            failed: 0,
        }
    }

    pub fn document_started(&self, name: &str) {
        let current = (self.done + 1).min(self.total.max(1));
        self.line(&format!("{current}/{} {name}", self.total.max(1)));
    }

    pub fn document_finished(&mut self, name: &str, diagnostics: usize, ok: bool) {
        self.done += 1;
        if ok {
            self.line(&format!("done {name} ({diagnostics} diagnostics)"));
        } else {
            self.failed += 1;
            self.line(&format!("FAILED {name}"));
        }
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn summary(&self) {
        let ok = self.done - self.failed;
        self.line(&format!(
            "converted {ok}/{} documents, {} failed",
            self.total, self.failed
        ));
    }

    fn line(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {msg}");
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
