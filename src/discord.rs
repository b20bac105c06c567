use crate::{
    builds::BuildClient,
    commands,
    install::Installer,
    master::MasterServer,
    server::ProcessManager,
    settings::Settings,
    state::State,
    supervisor::{Backends, Channel, Notifier, Supervisor},
    Result,
};
use anyhow::Context as _;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared with every command.
pub struct Data {
    pub settings: Settings,
    pub state: Arc<Mutex<State>>,
    pub servers: Arc<ProcessManager>,
    pub supervisor: Supervisor,
    pub installer: Arc<Installer>,
    pub master: Arc<MasterServer>,
    pub builds: BuildClient,
}

/// Posts notifications to the configured channels.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
    alert: Option<serenity::ChannelId>,
    main: Option<serenity::ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>, settings: &Settings) -> Self {
        let channel = |id: u64| (id != 0).then(|| serenity::ChannelId::new(id));
        Self {
            http,
            alert: channel(settings.alert_channel),
            main: channel(settings.main_channel),
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, channel: Channel, text: &str) -> anyhow::Result<()> {
        let id = match channel {
            Channel::Alert => self.alert,
            Channel::Main => self.main,
        }
        .with_context(|| format!("No {:?} channel configured", channel))?;

        id.say(&*self.http, text).await?;
        Ok(())
    }
}

pub async fn run(settings: Settings, state: State, servers: ProcessManager) -> Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .context("Failed to create http client.")?;
    let builds = BuildClient::new(
        http.clone(),
        settings.dev_feed.clone(),
        settings.launcher_feed.clone(),
    );
    let master = Arc::new(MasterServer::new(http, settings.master_server.clone()));
    let state = Arc::new(Mutex::new(state));
    let servers = Arc::new(servers);

    let token = settings.token.clone();
    let prefix = settings.prefix.clone();
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                case_insensitive_commands: true,
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    log::info!(
                        "Got command '{}' by user '{}'",
                        ctx.invocation_string(),
                        ctx.author().name
                    );
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                log::info!("Connected as {}", ready.user.name);
                ctx.set_activity(Some(serenity::ActivityData::playing(&settings.host)));
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let notifier: Arc<dyn Notifier> =
                    Arc::new(DiscordNotifier::new(ctx.http.clone(), &settings));
                let installer = Arc::new(Installer::new(
                    builds.clone(),
                    servers.clone(),
                    notifier.clone(),
                    settings.builds.clone(),
                    settings.install_dir.clone(),
                    settings.install_grace(),
                ));
                let supervisor = Supervisor::new(Backends {
                    slots: servers.clone(),
                    status: master.clone(),
                    builds: Arc::new(builds.clone()),
                    store: state.clone(),
                    notifier,
                    gate: installer.clone(),
                    host: settings.host.clone(),
                });

                Ok(Data {
                    settings,
                    state,
                    servers,
                    supervisor,
                    installer,
                    master,
                    builds,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    Ok(client.start().await?)
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!(
                "Command '{}' failed: {}",
                ctx.command().qualified_name,
                error
            );
            let _ = ctx
                .say("Something went wrong. Check the logs for more information.")
                .await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                log::warn!("Unhandled framework error. {}", e);
            }
        }
    }
}
