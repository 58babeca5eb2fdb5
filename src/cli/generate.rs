//! End-to-end generation pipeline.
//!
//! Pipeline phases:
//! - **Building** - run the SSR bundle build to completion
//! - **Starting** - boot the bundle as the render server subprocess
//! - **WaitingReady** - probe until the server's port accepts connections
//! - **Generating** - fetch every route concurrently, write every page
//! - **ShuttingDown** - terminate the render server, unconditionally
//!
//! The only branch is on failure: a failed build means the server is never
//! started, and a server that dies or stays unreachable during WaitingReady
//! fails the run after teardown. Generation failures never skip teardown;
//! they surface afterwards as a per-route report and a non-zero exit.

use crate::{
    config::PrerenderConfig,
    debug,
    exec::{Cmd, ServerProcess},
    log, pages, probe,
};
use anyhow::{Context, Result, bail};
use std::process::ExitStatus;
use tokio::sync::watch;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Starting,
    WaitingReady,
    Generating,
    ShuttingDown,
}

impl Phase {
    const fn name(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Starting => "starting",
            Self::WaitingReady => "waiting-ready",
            Self::Generating => "generating",
            Self::ShuttingDown => "shutting-down",
        }
    }
}

fn enter(phase: Phase) {
    debug!("phase"; "{}", phase.name());
}

/// What ended the WaitingReady phase.
enum ReadyOutcome {
    Probe(Result<u32, probe::ProbeError>),
    Exited(std::io::Result<ExitStatus>),
}

/// Run the whole pipeline for the configured route table.
pub async fn generate_site(config: &PrerenderConfig) -> Result<()> {
    // A malformed route table aborts here, before any build time is spent.
    let page_routes = config.page_routes()?;
    if page_routes.is_empty() {
        bail!(
            "route table `{}` has no generatable routes",
            config.build.routes.display()
        );
    }
    log!(
        "routes";
        "{} page(s) declared in `{}`",
        page_routes.len(),
        config.build.routes.display()
    );

    let shutdown = spawn_interrupt_watch();
    let vars = prerender_vars(config);

    // Building
    if skip_build(config) {
        log!("build"; "skipped, reusing existing bundle");
    } else {
        enter(Phase::Building);
        log!("build"; "`{}` running", config.build.command.join(" "));
        Cmd::from_slice(&config.build.command)
            .cwd(config.get_root())
            .envs(vars.iter().map(|(k, v)| (k, v)))
            .run("build")
            .await
            .context("Build failed")?;
        log!("build"; "done");
    }

    // Starting
    enter(Phase::Starting);
    log!("server"; "`{}` starting", config.server.command.join(" "));
    let mut server = Cmd::from_slice(&config.server.command)
        .cwd(config.get_root())
        .envs(vars.iter().map(|(k, v)| (k, v)))
        .spawn("server")
        .context("Failed to start render server")?;

    // WaitingReady: the probe races against the server dying on startup.
    enter(Phase::WaitingReady);
    let addr = config.server.addr();
    let settings = config.probe.settings();
    let mut shutdown_rx = shutdown.clone();
    let outcome = tokio::select! {
        result = probe::wait_until_ready(addr, &settings, &mut shutdown_rx) => {
            ReadyOutcome::Probe(result)
        }
        status = server.wait_exit() => ReadyOutcome::Exited(status),
    };

    match outcome {
        ReadyOutcome::Probe(Ok(attempts)) => {
            log!("probe"; "server reachable on {addr} after {attempts} attempt(s)");
        }
        ReadyOutcome::Probe(Err(e)) => {
            teardown(server).await;
            return Err(e).context("Render server never became reachable");
        }
        ReadyOutcome::Exited(status) => {
            teardown(server).await;
            match status {
                Ok(status) => bail!("Render server exited before becoming ready ({status})"),
                Err(e) => return Err(e).context("Failed to observe render server"),
            }
        }
    }

    // Generating: fan out, then wait for every route to settle.
    enter(Phase::Generating);
    let report = pages::generate_pages(
        &config.server.base_url(),
        page_routes,
        &config.build.output,
        false,
    )
    .await;

    // ShuttingDown: not gated on generation success, only on settlement.
    enter(Phase::ShuttingDown);
    log!("server"; "stopping");
    teardown(server).await;

    let report = report?;
    let total = report.results.len();
    let written = report.written();
    if written < total {
        bail!(
            "{} of {total} page(s) failed, {written} written to {}",
            total - written,
            config.build.output.display()
        );
    }

    log!("pages"; "{written} page(s) written to {}", config.build.output.display());
    Ok(())
}

/// Whether `--skip-build` was passed.
fn skip_build(config: &PrerenderConfig) -> bool {
    match config.cli.map(|cli| &cli.command) {
        Some(crate::cli::Commands::Generate { args }) => args.skip_build,
        _ => false,
    }
}

/// Stop the render server, logging instead of failing: teardown runs on
/// error paths where the original error matters more.
async fn teardown(server: ServerProcess) {
    if let Err(e) = server.terminate().await {
        log!("error"; "failed to stop render server: {e:#}");
    }
}

/// Watch channel that flips to true on Ctrl-C.
fn spawn_interrupt_watch() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log!("prerender"; "interrupt received, stopping");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Build `$PRERENDER_*` environment variables for child processes
fn prerender_vars(config: &PrerenderConfig) -> Vec<(String, String)> {
    vec![
        (
            "PRERENDER_ROOT".into(),
            config.get_root().display().to_string(),
        ),
        (
            "PRERENDER_OUTPUT_DIR".into(),
            config.build.output.display().to_string(),
        ),
        ("PRERENDER_PORT".into(), config.server.port.to_string()),
    ]
}

// ============================================================================
// Tests
// ============================================================================
