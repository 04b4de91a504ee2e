//! Command-line / environment configuration: hand-parsed flags with an
//! environment-variable fallback, no config-file format.

/// Runtime configuration for the gateway daemon.
pub struct Args {
    pub listen_addr: String,
    pub storage_dir: String,
}

pub fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut listen_addr = String::new();
    let mut storage_dir = String::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" => listen_addr = args.next().unwrap_or_default(),
            "--storage-dir" => storage_dir = args.next().unwrap_or_default(),
            _ => {}
        }
    }

    if listen_addr.is_empty() {
        listen_addr = std::env::var("WCG_LISTEN").unwrap_or_else(|_| "127.0.0.1:8743".to_string());
    }
    if storage_dir.is_empty() {
        storage_dir = std::env::var("WCG_STORAGE_DIR").unwrap_or_else(|_| dirs_fallback("wcg-gateway"));
    }

    Args { listen_addr, storage_dir }
}

fn dirs_fallback(subpath: &str) -> String {
    let base = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{base}/.local/share/{subpath}")
}
