use crate::Result;
use crate::browser::{Browser, BrowserLauncher};
use crate::chrome::ChromeLauncher;
use crate::config::BrowserConfig;
use crate::shell::ShellPage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Launched<B> {
    browser: Arc<B>,
    shell: Arc<ShellPage>,
}

/// Owns at most one browser process, created lazily and reused by every render.
///
/// The lock guards only the handle. Renders clone the `Arc` out and drop the lock before doing
/// any page work, so concurrent renders each get their own page without waiting on each other.
pub struct BrowserSession<L: BrowserLauncher = ChromeLauncher> {
    launcher: L,
    config: BrowserConfig,
    state: Mutex<Option<Launched<L::Browser>>>,
}

impl BrowserSession<ChromeLauncher> {
    pub fn new(config: BrowserConfig) -> Self {
        Self::with_launcher(ChromeLauncher, config)
    }
}

impl Default for BrowserSession<ChromeLauncher> {
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

impl<L: BrowserLauncher> BrowserSession<L> {
    pub fn with_launcher(launcher: L, config: BrowserConfig) -> Self {
        Self {
            launcher,
            config,
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<Launched<L::Browser>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the browser unless one is already running.
    pub fn launch(&self) -> Result<()> {
        self.acquire().map(|_| ())
    }

    fn start(&self) -> Result<Launched<L::Browser>> {
        let shell = ShellPage::materialize(&self.config.renderer_script)?;
        let browser = self.launcher.launch(&self.config)?;
        tracing::info!(pid = ?browser.process_id(), "browser launched");
        Ok(Launched {
            browser: Arc::new(browser),
            shell: Arc::new(shell),
        })
    }

    /// Launches if needed and hands out the browser plus the shell page it renders in.
    pub(crate) fn acquire(&self) -> Result<(Arc<L::Browser>, Arc<ShellPage>)> {
        let mut state = self.lock();
        let launched = match &mut *state {
            Some(launched) => launched,
            empty => empty.insert(self.start()?),
        };
        Ok((Arc::clone(&launched.browser), Arc::clone(&launched.shell)))
    }

    /// Terminates the browser. Calling it without a running browser is a no-op.
    ///
    /// If renders are still in flight on other threads, the process is terminated once the last
    /// of them releases its handle.
    pub fn close(&self) -> Result<()> {
        let Some(launched) = self.lock().take() else {
            return Ok(());
        };
        match Arc::try_unwrap(launched.browser) {
            Ok(browser) => {
                let pid = browser.process_id();
                browser.close()?;
                tracing::info!(?pid, "browser closed");
            }
            Err(shared) => {
                tracing::debug!(
                    in_flight = Arc::strong_count(&shared) - 1,
                    "browser still in use; it exits after the last render"
                );
            }
        }
        Ok(())
    }

    pub fn is_launched(&self) -> bool {
        self.lock().is_some()
    }

    pub fn page_count(&self) -> usize {
        self.lock()
            .as_ref()
            .map_or(0, |launched| launched.browser.page_count())
    }

    pub fn process_id(&self) -> Option<u32> {
        self.lock()
            .as_ref()
            .and_then(|launched| launched.browser.process_id())
    }
}
