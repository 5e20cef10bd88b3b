use clap::Parser;

use hermit::cli::Session;
use hermit::logging::{LogConfig, Logger};

/// Natural-language shell assistant that executes every proposed command
/// inside a layered Linux sandbox.
#[derive(Parser, Debug)]
#[command(name = "hermit")]
#[command(version)]
#[command(about = "Convert natural language requests into sandboxed shell commands")]
struct Args {
    /// Run commands directly on the host: no namespaces, chroot, cgroup, or
    /// seccomp filter. The policy engine still gates every command.
    #[arg(long = "unsafe")]
    r#unsafe: bool,

    /// Emit pretty, unredacted logs to stderr instead of the production
    /// JSON/file preset.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    if let Err(e) = Logger::init(log_config) {
        eprintln!("warning: logging already initialized: {e}");
    }

    let mut session = match Session::bootstrap(args.r#unsafe) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("hermit: failed to start: {e}");
            std::process::exit(1);
        }
    };

    session.run().await;
}
