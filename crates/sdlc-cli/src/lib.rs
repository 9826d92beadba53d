//! CLI for the SDLC control plane: a thin client over the session
//! supervisor's Unix domain socket (spec.md §6's `/deploy`, `/sanity-test`,
//! `/fix`, `/sdlc-deploy` and status/list endpoints, reached locally rather
//! than over the network per spec.md §1).

pub mod client;
pub mod commands;
pub mod exit_error;
pub mod output;

use std::path::PathBuf;

/// Resolves the socket path the same way `sdlcd` does: `--socket`, then
/// `SDLC_SOCKET_PATH`, then `$data_dir/sdlc-control-plane/sdlcd.sock`.
pub fn socket_path_or_default(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var("SDLC_SOCKET_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| state_dir().join("sdlcd.sock"))
}

fn state_dir() -> PathBuf {
    std::env::var("SDLC_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("sdlc-control-plane"))
}
