use super::LoaderShared;

/// Watcher thread body. Every interval, re-parse each region in view; a
/// region whose files changed is queued so its chunks get reloaded.
pub(super) fn run(shared: &LoaderShared) {
    while shared.sleep_interval() {
        let view = shared.view();
        for region in view.regions() {
            if shared.queue.is_closed() {
                return;
            }
            let update = shared.world.parse_region(region, view.min_y, view.max_y);
            if !update.changed {
                continue;
            }
            tracing::debug!(
                "Region {} changed on disk: {} new chunks, {} deleted",
                region,
                update.discovered.len(),
                update.deleted.len()
            );
            shared.queue.push(region);
        }
    }
    tracing::debug!("Region watcher stopped");
}
