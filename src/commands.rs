use crate::Data;
use crate::COMMAND_TARGET;
use crate::responses;
use tracing::info;

/// Reply for the start command: a short feature overview
#[must_use]
pub fn start() -> String {
    info!(target: COMMAND_TARGET, command = "start", "Command executed");
    responses::start_text()
}

/// Reply for the stats command: a pure read of the in-memory counters
#[must_use]
pub fn stats(data: &Data) -> String {
    let snapshot = data.stats();

    info!(
        target: COMMAND_TARGET,
        command = "stats",
        restricted_users = snapshot.restricted_users,
        users_with_warnings = snapshot.users_with_warnings,
        invites_tracked = snapshot.invites_tracked,
        "Command executed"
    );

    responses::stats_text(&snapshot)
}
