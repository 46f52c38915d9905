//! Command line interface for the `pagestream` binary.
//!
//! Streams one chapter's pages from an event-stream endpoint and prints them
//! as they are assembled.

use std::time::Duration;

use clap::Parser;

/// Command line arguments for the `pagestream` binary.
#[derive(Debug, Parser)]
#[command(name = "pagestream", version, about = "Stream and assemble a chapter's pages")]
pub struct Cli {
    /// Event-stream URL of the chapter, e.g. `http://localhost:8000/chapter/mhr/42`.
    pub url: String,

    /// Base URL prefixed to every page path.
    #[arg(short, long)]
    pub media_base: Option<String>,

    /// Seconds to wait for the TCP connection before giving up.
    #[arg(long, value_parser = parse_seconds)]
    pub connect_timeout: Option<Duration>,
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("invalid number of seconds: {e}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_url_and_options() {
        let cli = Cli::parse_from([
            "pagestream",
            "http://localhost:8000/chapter/mhr/42",
            "--media-base",
            "http://localhost:8000/media",
            "--connect-timeout",
            "5",
        ]);
        assert_eq!(cli.url, "http://localhost:8000/chapter/mhr/42");
        assert_eq!(cli.media_base.as_deref(), Some("http://localhost:8000/media"));
        assert_eq!(cli.connect_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_bad_timeout() {
        let result = Cli::try_parse_from(["pagestream", "http://x/", "--connect-timeout", "soon"]);
        assert!(result.is_err());
    }
}
