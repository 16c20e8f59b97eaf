use std::{env, path::PathBuf, process::ExitCode};

use clap::Parser;
use linuxaid::{
    agent::PuppetAgent,
    api::{ObmondoClient, SecurityExporter},
    cli::{LinuxaidArgs, LinuxaidSubcommand},
    config::{
        api_url_from_env,
        defaults::{
            AGENT_CERT_ENV_VAR, AGENT_PRIVATE_KEY_ENV_VAR, DEFAULT_CERTS_DIR,
            DEFAULT_PRIVATE_KEYS_DIR,
        },
        HostIdentity, IdentitySources, OrchestratorContext,
    },
    host::LinuxHost,
    orchestration::{run_agent_once, UpdateOrchestrator},
    packages::SystemPackageManager,
    ErrorKind, LinuxaidError, LinuxaidResult,
};
use linuxaid_utils::SystemCommandRunner;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let args = LinuxaidArgs::parse();
    linuxaid::init_logging(args.debug);

    let identity = match resolve_identity(args.certname) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(error = %e, "failed to determine host identity");
            return ExitCode::from(1);
        }
    };
    tracing::info!(certname = %identity.get_certname(), "starting linuxaid");

    let result = match args.subcommand {
        LinuxaidSubcommand::SystemUpdate { reboot, skip_agent } => {
            let context = OrchestratorContext::builder()
                .identity(identity)
                .api_url(api_url_from_env())
                .reboot(reboot)
                .skip_agent(skip_agent)
                .build();
            system_update(context).await
        }
        LinuxaidSubcommand::RunAgent => {
            let context = OrchestratorContext::builder()
                .identity(identity)
                .api_url(api_url_from_env())
                .build();
            run_agent(context).await
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "failed to set up linuxaid");
            ExitCode::from(setup_exit_code(&e))
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

async fn system_update(context: OrchestratorContext) -> LinuxaidResult<u8> {
    let runner = SystemCommandRunner::with_path(context.get_command_path());
    let control_plane = ObmondoClient::new(&context)?;

    let mut orchestrator = UpdateOrchestrator::new(
        context.clone(),
        Box::new(control_plane),
        Box::new(PuppetAgent::new(runner.clone(), &context)),
        Box::new(SystemPackageManager::new(runner.clone(), &context)),
        Box::new(LinuxHost::new(runner, &context)),
    );

    if let Some(url) = context.get_security_exporter_url() {
        orchestrator = orchestrator
            .with_security_exporter(SecurityExporter::new(url, *context.get_api_timeout())?);
    }

    let outcome = orchestrator.run().await;
    tracing::info!(outcome = ?outcome, exit_code = outcome.exit_code(), "system update finished");

    Ok(outcome.exit_code())
}

async fn run_agent(context: OrchestratorContext) -> LinuxaidResult<u8> {
    let runner = SystemCommandRunner::with_path(context.get_command_path());
    let control_plane = ObmondoClient::new(&context)?;
    let agent = PuppetAgent::new(runner, &context);

    let outcome = run_agent_once(&context, &control_plane, &agent).await;
    tracing::info!(exit_code = outcome.exit_code(), "agent run finished");

    Ok(0)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn resolve_identity(configured_certname: Option<String>) -> LinuxaidResult<HostIdentity> {
    let env_path = |key: &str| {
        env::var_os(key)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    };

    HostIdentity::resolve(&IdentitySources {
        env_cert: env_path(AGENT_CERT_ENV_VAR),
        env_key: env_path(AGENT_PRIVATE_KEY_ENV_VAR),
        certs_dir: PathBuf::from(DEFAULT_CERTS_DIR),
        private_keys_dir: PathBuf::from(DEFAULT_PRIVATE_KEYS_DIR),
        configured_certname,
    })
}

fn setup_exit_code(error: &LinuxaidError) -> u8 {
    match error.kind() {
        Some(ErrorKind::Precondition) => 1,
        _ => 2,
    }
}
