use crate::server::store::StoreUri;
use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `quartet-server` binary.
///
/// Every value is parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for running the
/// demo locally.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "quartet-server",
    version,
    about = "A gRPC server demonstrating every RPC calling convention"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/quartet.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Where blog documents live.
    ///
    /// `memory://` keeps them in process; `file://<path>` persists them as a
    /// JSON snapshot that is rewritten after every mutation.
    ///
    /// Environment variable: `STORE_URI`
    #[arg(long, env = "STORE_URI", default_value_t = String::from("memory://"))]
    pub store_uri: String,

    /// Capacity of the response buffer between a streaming handler and the
    /// gRPC stream.
    ///
    /// A handler that gets this far ahead of its client waits until the
    /// client reads.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Delay between consecutive server-streamed messages, in milliseconds.
    ///
    /// Set to 0 to stream as fast as the client reads.
    ///
    /// Environment variable: `STREAM_INTERVAL_MS`
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 1000)]
    pub stream_interval_ms: u64,

    /// Seconds to wait for in-flight calls before cancelling them on
    /// shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub store_uri: StoreUri,
    pub stream_buffer_size: usize,
    pub stream_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.server_addr.is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        let store_uri = args
            .store_uri
            .parse::<StoreUri>()
            .with_context(|| format!("invalid STORE_URI `{}`", args.store_uri))?;

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            store_uri,
            stream_buffer_size: args.stream_buffer_size,
            stream_interval: Duration::from_millis(args.stream_interval_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["quartet-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn file_store_uri_is_parsed() {
        let config = parse(&[
            "--store-uri",
            "file:///tmp/blogs.json",
            "--stream-interval-ms",
            "0",
            "--shutdown-timeout",
            "7",
        ])
        .unwrap();
        assert_eq!(
            config.store_uri,
            StoreUri::File(PathBuf::from("/tmp/blogs.json"))
        );
        assert!(config.stream_interval.is_zero());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(7));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = parse(&["--stream-buffer-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("STREAM_BUFFER_SIZE"));
    }

    #[test]
    fn unknown_store_scheme_is_rejected() {
        let err = parse(&["--store-uri", "mongodb://localhost:27017"]).unwrap_err();
        assert!(err.to_string().contains("STORE_URI"));
    }
}
