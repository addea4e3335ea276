//! Host APIs for trip sources.
//!
//! - [`keychain`] - Secure credential storage (system keychain)
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`process`] - Helper process spawning (WebDriver server)
//! - [`webdriver`] - W3C WebDriver client for browser sessions

pub mod http;
pub mod keychain;
pub mod process;
pub mod webdriver;

// Re-export key types
pub use http::HttpClient;
pub use keychain::{KeychainApi, SystemKeychain};
pub use process::{BackgroundProcess, ProcessRunner};
pub use webdriver::{BrowserOptions, BrowserSession, DriverHandle, ElementRef, Locator, WebDriverClient};
