#[cfg(feature = "browser")]
pub mod browser_probe;
pub mod doh;

#[cfg(feature = "browser")]
pub use browser_probe::{BrowserProbe, ProbeOptions};
pub use doh::{CLOUDFLARE_DOH_URL, DohAnswer, DohClient, DohResponse, parse_unknown_rdata};
