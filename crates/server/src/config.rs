//! Server configuration.
//!
//! Every option can be given as a command line flag or through the environment, a `.env` file
//! in the working directory is loaded first.
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "libris-server", version, about = "Lending API of the Libris library backend")]
pub struct Config {
    /// SQLite database file holding the library, created if missing.
    #[arg(long, env = "LIBRIS_DATABASE", default_value = "library.db")]
    pub database: PathBuf,

    /// Address the HTTP server listens on.
    #[arg(long, env = "LIBRIS_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Overrides the port of `--listen`, for hosts that only hand out a port.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
}

impl Config {
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        let mut addr = self.listen;
        if let Some(port) = self.port {
            addr.set_port(port);
        }
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_are_parsed() {
        let config = Config::try_parse_from([
            "libris-server",
            "--database",
            "/var/lib/libris/branch.db",
            "--listen",
            "0.0.0.0:8080",
        ])
        .unwrap();

        assert_eq!(config.database, PathBuf::from("/var/lib/libris/branch.db"));
        assert_eq!(config.listen, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn port_overrides_listen_port() {
        let config = Config {
            database: PathBuf::from("library.db"),
            listen: "127.0.0.1:3000".parse().unwrap(),
            port: Some(4100),
        };

        assert_eq!(
            config.listen_addr(),
            "127.0.0.1:4100".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn invalid_listen_address_is_rejected() {
        let result = Config::try_parse_from(["libris-server", "--listen", "not-an-address"]);
        assert!(result.is_err());
    }
}
