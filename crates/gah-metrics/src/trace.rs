use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` with `verbose`
/// and `info` without. Colour is only used when stderr is a terminal and
/// `NO_COLOR` is unset.
pub fn init(verbose: bool) -> Result<(), InitError> {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color_enabled(&std::io::stderr()))
        .with_writer(std::io::stderr)
        .try_init()
}

/// Whether log output to `stream` should carry ANSI colour codes.
pub fn color_enabled<S: IsTerminal>(stream: &S) -> bool {
    stream.is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirected_output_is_plain() {
        let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let file = std::fs::File::open(manifest).expect("manifest");
        assert!(!color_enabled(&file));
    }
}
