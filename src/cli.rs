//! Command line interface for the `nodewire` operator binary.
//!
//! Also compiled by `build.rs` to render the man page, so it may only depend
//! on `clap` and `std`.

use std::net::SocketAddr;

use clap::Parser;

/// Connect to a media node, activate it and keep it pinged.
#[derive(Debug, Parser)]
#[command(name = "nodewire", version, about = "Media node control client")]
pub struct Cli {
    /// Node host name or address.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Node port.
    #[arg(short, long, default_value_t = 6317)]
    pub port: u16,

    /// License key sent with the activation request.
    #[arg(short = 'k', long, env = "NODEWIRE_LICENSE_KEY")]
    pub license_key: String,

    /// Seconds between service pings once active.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub ping_interval_secs: u64,

    /// Expose Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::Cli;

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["nodewire", "--license-key", "abc"]);
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 6317);
        assert_eq!(cli.ping_interval_secs, 10);
        assert!(cli.metrics_addr.is_none());
    }

    #[rstest]
    #[case::zero_interval(&["nodewire", "-k", "abc", "--ping-interval-secs", "0"])]
    #[case::bad_port(&["nodewire", "-k", "abc", "--port", "70000"])]
    fn rejects_invalid_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }
}
