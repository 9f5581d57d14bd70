use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ttldns::proxy::{self, ProxyConfig, UpstreamKind};
use ttldns::upstream::{DohJsonUpstream, HttpDnsUpstream};

#[derive(Parser)]
#[command(name = "ttldns")]
#[command(about = "Caching DNS proxy with per-domain request deduplication", long_about = None)]
struct Args {
    /// Address to listen on (host:port)
    #[arg(short, long, default_value = "0.0.0.0:53")]
    bind: SocketAddr,

    /// Hosts files, comma separated (file1,file2,...)
    #[arg(long, default_value = "/etc/hosts")]
    hosts: String,

    /// Upstream used on cache misses
    #[arg(short, long, value_enum, default_value_t = UpstreamKind::Httpdns)]
    upstream: UpstreamKind,

    /// Retry failed upstream lookups through the system resolver
    #[arg(long)]
    fallback_system: bool,

    /// Upstream timeout in seconds
    #[arg(short, long, default_value = "3")]
    timeout: u64,

    /// Hosts reload interval in seconds
    #[arg(long, default_value = "5")]
    reload_interval: u64,

    /// DNS-over-HTTPS JSON endpoint
    #[arg(long, default_value = DohJsonUpstream::DEFAULT_URL)]
    doh_url: String,

    /// HTTP DNS endpoint
    #[arg(long, default_value = HttpDnsUpstream::DEFAULT_URL)]
    httpdns_url: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            bind_addr: self.bind,
            hosts_files: self
                .hosts
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            upstream: self.upstream,
            fallback_system: self.fallback_system,
            upstream_timeout: Duration::from_secs(self.timeout),
            reload_interval: Duration::from_secs(self.reload_interval),
            doh_url: self.doh_url,
            httpdns_url: self.httpdns_url,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(proxy::run(args.into_config())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "DNS proxy stopped");
            ExitCode::FAILURE
        }
    }
}
