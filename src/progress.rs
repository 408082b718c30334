use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use url::Url;

#[derive(Debug, Clone, Copy)]
pub enum RequestKind {
    ApiRoot,
    Search,
    NextPage,
}

impl RequestKind {
    fn label(self) -> &'static str {
        match self {
            RequestKind::ApiRoot => "api",
            RequestKind::Search => "search",
            RequestKind::NextPage => "next_page",
        }
    }
}

pub struct Progress {
    enabled: bool,
    start: Instant,

    // UI
    mp: Option<MultiProgress>,
    stage: ProgressBar,
    pages: ProgressBar,
    http: ProgressBar,

    // Counters
    posts_loaded: AtomicU64,
    http_in_flight: AtomicU64,
    http_done: AtomicU64,
    http_bytes: AtomicU64,
    last_http_label: Mutex<String>,
}

impl Progress {
    pub fn new(enabled: bool) -> Arc<Self> {
        let start = Instant::now();

        if !enabled {
            return Arc::new(Self::with_bars(
                false,
                start,
                None,
                ProgressBar::hidden(),
                ProgressBar::hidden(),
                ProgressBar::hidden(),
            ));
        }

        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let stage = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}  [{elapsed_precise}]") {
            stage.set_style(style);
        }
        stage.enable_steady_tick(Duration::from_millis(80));
        stage.set_message("starting");

        let pages = mp.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
            pages.set_style(style.progress_chars("##-"));
        }
        pages.set_message("pages");

        let http = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            http.set_style(style);
        }
        http.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self::with_bars(true, start, Some(mp), stage, pages, http))
    }

    fn with_bars(
        enabled: bool,
        start: Instant,
        mp: Option<MultiProgress>,
        stage: ProgressBar,
        pages: ProgressBar,
        http: ProgressBar,
    ) -> Self {
        Self {
            enabled,
            start,
            mp,
            stage,
            pages,
            http,
            posts_loaded: AtomicU64::new(0),
            http_in_flight: AtomicU64::new(0),
            http_done: AtomicU64::new(0),
            http_bytes: AtomicU64::new(0),
            last_http_label: Mutex::new(String::new()),
        }
    }

    pub fn set_stage(&self, msg: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.stage.set_message(msg.into());
    }

    pub fn set_pages_total(&self, total: usize) {
        if self.enabled {
            self.pages.set_length(total as u64);
        }
    }

    pub fn page_loaded(&self, posts: usize) {
        let total = self.posts_loaded.fetch_add(posts as u64, Ordering::Relaxed) + posts as u64;
        if self.enabled {
            self.pages.inc(1);
            self.pages.set_message(format!("{total} posts"));
        }
    }

    pub fn http_start(&self, kind: RequestKind, url: &Url) {
        self.http_in_flight.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.set_last(format!("GET {} ({})", url, kind.label()));
            self.refresh_http();
        }
    }

    pub fn http_ok(&self, kind: RequestKind, url: &Url, bytes: usize) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        self.http_done.fetch_add(1, Ordering::Relaxed);
        self.http_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        if self.enabled {
            self.set_last(format!("GET {} ({}) ok {}B", url, kind.label(), bytes));
            self.refresh_http();
        }
    }

    pub fn http_err(&self, kind: RequestKind, url: &Url) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        if self.enabled {
            self.set_last(format!("GET {} ({}) failed", url, kind.label()));
            self.refresh_http();
        }
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.refresh_http();
        self.stage.finish_with_message("done");
        self.pages.finish_and_clear();
        self.http.finish_and_clear();
        if let Some(mp) = &self.mp {
            let _ = mp.println(format!("Done in {}", HumanDuration(self.start.elapsed())));
        }
    }

    fn set_last(&self, label: String) {
        if let Ok(mut last) = self.last_http_label.lock() {
            *last = label;
        }
    }

    fn refresh_http(&self) {
        let in_flight = self.http_in_flight.load(Ordering::Relaxed);
        let done = self.http_done.load(Ordering::Relaxed);
        let bytes = self.http_bytes.load(Ordering::Relaxed);
        let last = self
            .last_http_label
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        self.http.set_message(format!(
            "HTTP: done {done} | in-flight {in_flight} | bytes {bytes} | {last}",
            bytes = HumanBytes(bytes),
        ));
    }
}
