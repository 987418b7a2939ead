//! Server startup: tracing to stderr and the `serve_stdio!` macro.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for an MCP server.
///
/// Logs go to stderr because stdout carries the protocol. `RUST_LOG`
/// filters as usual, with `<crate_name>=info` as the default directive;
/// `LOG_FORMAT=json` switches to structured output.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }
    Ok(())
}

/// Expand to a complete `main` for an MCP server: tracing init, server
/// construction via `new()`, stdio transport, wait for shutdown.
#[macro_export]
macro_rules! serve_stdio {
    ($server_type:ty, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;
            tracing::info!(concat!("starting ", $crate_name, " MCP server"));

            let server = <$server_type>::new();
            let service = server.serve(rmcp::transport::stdio()).await?;
            service.waiting().await?;

            tracing::info!("server shut down");
            Ok(())
        }
    };
}
