//! Capability interface over the browser automation layer.
//!
//! The orchestrator in [`crate::render`] only ever talks to these traits. The one production
//! implementation lives in [`crate::chrome`]; tests plug in an in-memory fake.

use crate::Result;
use crate::config::BrowserConfig;

/// Size of the rendering surface used for raster and paginated output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: Option<f64>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_scale_factor: None,
        }
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_scale_factor: None,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.device_scale_factor = Some(scale);
        self
    }

    pub fn scale(&self) -> f64 {
        self.device_scale_factor
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0)
    }
}

/// A rectangle in CSS pixels, relative to the page origin.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfOptions {
    pub print_background: bool,
    /// Inches. `None` keeps the browser's default paper size.
    pub paper_width: Option<f64>,
    pub paper_height: Option<f64>,
    pub page_ranges: Option<String>,
}

pub type ConsoleHandler = Box<dyn Fn(&str) + Send + Sync>;

pub trait BrowserLauncher {
    type Browser: Browser;

    fn launch(&self, config: &BrowserConfig) -> Result<Self::Browser>;
}

pub trait Browser: Send + Sync {
    type Page: Page;

    fn new_page(&self) -> Result<Self::Page>;

    /// Number of pages currently open in the browser process.
    fn page_count(&self) -> usize;

    fn process_id(&self) -> Option<u32>;

    /// Terminates the browser process.
    fn close(self) -> Result<()>;
}

pub trait Page {
    fn set_viewport(&self, viewport: &Viewport) -> Result<()>;

    /// Navigates and waits for the load to finish.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluates `expression` in page context, awaiting it if it is a promise. The expression
    /// must resolve to a string.
    fn evaluate(&self, expression: &str) -> Result<String>;

    fn on_console(&self, handler: ConsoleHandler) -> Result<()>;

    /// Makes the default page background transparent for screenshots and PDFs.
    fn set_transparent_background(&self) -> Result<()>;

    fn screenshot_png(&self, clip: &Clip, scale: f64) -> Result<Vec<u8>>;

    fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;

    fn close(&self) -> Result<()>;
}

/// Closes the wrapped page when dropped, whichever way the render exits.
pub(crate) struct PageGuard<P: Page> {
    page: P,
}

impl<P: Page> PageGuard<P> {
    pub(crate) fn new(page: P) -> Self {
        Self { page }
    }
}

impl<P: Page> std::ops::Deref for PageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.page
    }
}

impl<P: Page> Drop for PageGuard<P> {
    fn drop(&mut self) {
        if let Err(err) = self.page.close() {
            tracing::warn!(error = %err, "failed to close page");
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory browser used by the orchestrator tests.

    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Everything the fake observed, shared between launcher, browser and pages.
    #[derive(Debug, Default)]
    pub(crate) struct Journal {
        pub launches: AtomicUsize,
        pub closes: AtomicUsize,
        pub open_pages: AtomicUsize,
        pub viewports: Mutex<Vec<Viewport>>,
        pub urls: Mutex<Vec<String>>,
        pub scripts: Mutex<Vec<String>>,
        pub transparent: AtomicUsize,
        pub screenshots: Mutex<Vec<(Clip, f64)>>,
        pub pdfs: Mutex<Vec<PdfOptions>>,
    }

    #[derive(Clone)]
    pub(crate) struct FakeLauncher {
        pub journal: Arc<Journal>,
        /// Reply returned for the render script.
        pub reply: Arc<Mutex<String>>,
        pub fail_launch: bool,
    }

    impl FakeLauncher {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                journal: Arc::new(Journal::default()),
                reply: Arc::new(Mutex::new(reply.to_string())),
                fail_launch: false,
            }
        }
    }

    impl BrowserLauncher for FakeLauncher {
        type Browser = FakeBrowser;

        fn launch(&self, _config: &BrowserConfig) -> Result<FakeBrowser> {
            if self.fail_launch {
                return Err(Error::Launch {
                    message: "no browser binary".to_string(),
                });
            }
            let n = self.journal.launches.fetch_add(1, Ordering::SeqCst);
            Ok(FakeBrowser {
                journal: Arc::clone(&self.journal),
                reply: Arc::clone(&self.reply),
                pid: 1000 + n as u32,
            })
        }
    }

    pub(crate) struct FakeBrowser {
        journal: Arc<Journal>,
        reply: Arc<Mutex<String>>,
        pid: u32,
    }

    impl Browser for FakeBrowser {
        type Page = FakePage;

        fn new_page(&self) -> Result<FakePage> {
            self.journal.open_pages.fetch_add(1, Ordering::SeqCst);
            Ok(FakePage {
                journal: Arc::clone(&self.journal),
                reply: Arc::clone(&self.reply),
            })
        }

        fn page_count(&self) -> usize {
            self.journal.open_pages.load(Ordering::SeqCst)
        }

        fn process_id(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn close(self) -> Result<()> {
            self.journal.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub(crate) struct FakePage {
        journal: Arc<Journal>,
        reply: Arc<Mutex<String>>,
    }

    impl Page for FakePage {
        fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
            self.journal.viewports.lock().unwrap().push(*viewport);
            Ok(())
        }

        fn navigate(&self, url: &str) -> Result<()> {
            self.journal.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn evaluate(&self, expression: &str) -> Result<String> {
            self.journal
                .scripts
                .lock()
                .unwrap()
                .push(expression.to_string());
            Ok(self.reply.lock().unwrap().clone())
        }

        fn on_console(&self, handler: ConsoleHandler) -> Result<()> {
            handler("fake console attached");
            Ok(())
        }

        fn set_transparent_background(&self) -> Result<()> {
            self.journal.transparent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn screenshot_png(&self, clip: &Clip, scale: f64) -> Result<Vec<u8>> {
            self.journal.screenshots.lock().unwrap().push((*clip, scale));
            Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
        }

        fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
            self.journal.pdfs.lock().unwrap().push(options.clone());
            Ok(b"%PDF-1.4 fake".to_vec())
        }

        fn close(&self) -> Result<()> {
            self.journal.open_pages.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
