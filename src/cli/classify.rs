use std::sync::Arc;

use tracing::{debug, info};

use crate::ai::OllamaClient;
use crate::batch::BatchCoordinator;
use crate::cli::open_store;
use crate::error::Result;
use crate::history::CategoryHistory;
use crate::interrupt::{spawn_ctrl_c_watcher, InterruptSupervisor};
use crate::prompt::Terminal;
use crate::resolver::ClassificationResolver;
use crate::session::ConfirmationSession;
use crate::settings::load_settings;
use crate::stats::StatsTracker;

pub fn run(review_all: bool) -> Result<()> {
    let settings = load_settings();
    let store = open_store()?;

    let pending = store.pending_transactions()?;
    if pending.is_empty() {
        println!("Nothing to classify.");
        return Ok(());
    }

    let history = CategoryHistory::new();
    let past = store.classification_history()?;
    debug!(entries = past.len(), "seeding merchant history");
    for (merchant, category) in &past {
        history.record(merchant, category);
    }

    let supervisor = Arc::new(InterruptSupervisor::stderr());
    // Detached: lives until the process exits.
    spawn_ctrl_c_watcher(Arc::clone(&supervisor))?;

    let ollama = if settings.ai_enabled {
        info!(host = %settings.ai_host, model = %settings.ai_model, "AI suggestions enabled");
        Some(OllamaClient::new(&settings.ai_host, &settings.ai_model)?)
    } else {
        None
    };
    let resolver = ClassificationResolver::new(&store, &history, settings.threshold())?;
    // Without a model, directions come from the bank's type codes.
    let resolver = match &ollama {
        Some(client) => resolver
            .with_classifier(client)
            .with_direction_inferrer(client),
        None => resolver,
    };

    let stats = StatsTracker::new();
    let session = ConfirmationSession::new(
        Terminal::stdio(supervisor.token()),
        &store,
        &history,
        &stats,
    );
    let mut coordinator = BatchCoordinator::new(&resolver, session, &stats, &supervisor)
        .auto_accept(settings.auto_accept && !review_all);

    let outcome = coordinator.run(pending, |batch| {
        for classification in batch {
            store.save_classification(classification)?;
        }
        Ok(())
    });

    match outcome {
        Ok(_) => {
            println!("\n{}", coordinator.finalize());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!(processed = coordinator.processed(), "stopped early");
            println!("\n{}", coordinator.finalize());
            Err(e)
        }
        Err(e) => Err(e),
    }
}
