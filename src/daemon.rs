use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::domains::identity::PublicKey;
use crate::interfaces::clock::Clock;
use crate::interfaces::reminders::ReminderRepository;
use crate::interfaces::transport::Transport;
use crate::scheduler::Scheduler;
use crate::services::dispatch::DispatchJob;
use crate::services::identity::Nip19Resolver;
use crate::services::intake::IntakePipeline;

/// Owns the intake pipeline and the dispatch schedule for one bot identity.
/// Inbound notes are fed through [`Daemon::intake`] by whatever listens on
/// the relays.
pub struct Daemon {
    intake: Arc<IntakePipeline>,
    scheduler: Scheduler,
}

impl Daemon {
    pub fn new(
        config: &Config,
        identity: PublicKey,
        store: Arc<dyn ReminderRepository>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let intake = IntakePipeline::new(
            identity,
            Arc::new(Nip19Resolver),
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&clock),
        )
        .with_reaction(config.reaction());
        let dispatch = Arc::new(DispatchJob::new(
            identity,
            store,
            transport,
            clock,
            config.dispatch_settings(),
        ));

        let mut scheduler = Scheduler::new();
        scheduler.register_job(dispatch);

        Self {
            intake: Arc::new(intake),
            scheduler,
        }
    }

    pub fn intake(&self) -> Arc<IntakePipeline> {
        Arc::clone(&self.intake)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn start(&mut self) {
        if self.scheduler.is_running() {
            return;
        }
        tracing::info!(identity = %self.intake.identity(), "Starting reminder dispatch");
        self.scheduler.start();
    }

    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
        tracing::info!("Reminder dispatch stopped");
    }

    /// Runs dispatch until `shutdown` resolves, then stops it cleanly.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start();
        shutdown.await;
        self.stop().await;
    }
}
