//! `headless_chrome` adapter for the capability traits in [`crate::browser`].

use crate::browser::{Browser, BrowserLauncher, Clip, ConsoleHandler, Page, PdfOptions, Viewport};
use crate::config::BrowserConfig;
use crate::{Error, Result};
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport as CdpClip};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{DOM, Emulation, Runtime};
use headless_chrome::types::{Bounds, PrintToPdfOptions};
use headless_chrome::{LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl BrowserLauncher for ChromeLauncher {
    type Browser = ChromeBrowser;

    fn launch(&self, config: &BrowserConfig) -> Result<ChromeBrowser> {
        let args = config.launch_args();
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .path(config.executable_path.clone())
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(config.idle_timeout())
            .args(args.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| Error::Launch {
                message: e.to_string(),
            })?;

        let browser = headless_chrome::Browser::new(options).map_err(|e| Error::Launch {
            message: e.to_string(),
        })?;
        Ok(ChromeBrowser { browser })
    }
}

pub struct ChromeBrowser {
    browser: headless_chrome::Browser,
}

impl Browser for ChromeBrowser {
    type Page = ChromePage;

    fn new_page(&self) -> Result<ChromePage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::browser("new tab", e))?;
        Ok(ChromePage { tab })
    }

    fn page_count(&self) -> usize {
        match self.browser.get_tabs().lock() {
            Ok(tabs) => tabs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn process_id(&self) -> Option<u32> {
        self.browser.get_process_id()
    }

    fn close(self) -> Result<()> {
        // The child process is killed when the last handle to it is dropped.
        drop(self.browser);
        Ok(())
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl Page for ChromePage {
    fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(f64::from(viewport.width)),
                height: Some(f64::from(viewport.height)),
            })
            .map_err(|e| Error::browser("set viewport", e))?;
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| Error::browser("navigate", e))?;
        Ok(())
    }

    fn evaluate(&self, expression: &str) -> Result<String> {
        let remote = self
            .tab
            .evaluate(expression, true)
            .map_err(|e| Error::browser("evaluate", e))?;
        match remote.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            other => Err(Error::PageProtocol {
                message: format!("expected a string result, got {other:?}"),
            }),
        }
    }

    fn on_console(&self, handler: ConsoleHandler) -> Result<()> {
        self.tab
            .call_method(Runtime::Enable(None))
            .map_err(|e| Error::browser("enable runtime", e))?;
        self.tab
            .add_event_listener(Arc::new(move |event: &Event| {
                if let Event::RuntimeConsoleAPICalled(called) = event {
                    let line = called
                        .params
                        .args
                        .iter()
                        .map(|arg| match &arg.value {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                            None => arg.description.clone().unwrap_or_default(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    handler(&line);
                }
            }))
            .map_err(|e| Error::browser("add console listener", e))?;
        Ok(())
    }

    fn set_transparent_background(&self) -> Result<()> {
        self.tab
            .call_method(Emulation::SetDefaultBackgroundColorOverride {
                color: Some(DOM::RGBA {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: Some(0.0),
                }),
            })
            .map_err(|e| Error::browser("set transparent background", e))?;
        Ok(())
    }

    fn screenshot_png(&self, clip: &Clip, scale: f64) -> Result<Vec<u8>> {
        let clip = CdpClip {
            x: clip.x,
            y: clip.y,
            width: clip.width,
            height: clip.height,
            scale,
        };
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::browser("screenshot", e))
    }

    fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            print_background: Some(options.print_background),
            paper_width: options.paper_width,
            paper_height: options.paper_height,
            page_ranges: options.page_ranges.clone(),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            ..Default::default()
        };
        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::browser("print to PDF", e))
    }

    fn close(&self) -> Result<()> {
        self.tab
            .close(false)
            .map_err(|e| Error::browser("close page", e))?;
        Ok(())
    }
}
