/// Reference routing table, grounded in the reference deployment's broker
/// configuration (`celery_config.py: task_routes`). The core does not require
/// these exact queue names; callers populate a [`TaskRoutes`] the same way
/// their broker expects.
#[derive(Debug, Clone)]
pub struct TaskRoutes {
    pub crawler_queue: String,
    pub pipeline_queue: String,
    pub callback_queue: String,
    pub terminator_queue: String,
    pub request_queue: String,
}

impl Default for TaskRoutes {
    fn default() -> Self {
        Self {
            crawler_queue: "crawler".to_string(),
            pipeline_queue: "pipeline".to_string(),
            callback_queue: "callback".to_string(),
            terminator_queue: "terminator".to_string(),
            request_queue: "request".to_string(),
        }
    }
}

impl TaskRoutes {
    /// Resolves the queue name for a dotted task name by its prefix.
    ///
    /// Falls back to the `request` queue for anything that doesn't match one
    /// of the well-known prefixes, matching the reference deployment's
    /// catch-all `kraken.google_play_store.*` route.
    #[must_use]
    pub fn queue_for(&self, task_name: &str) -> &str {
        if task_name.starts_with("crawler.") {
            &self.crawler_queue
        } else if task_name.starts_with("pipeline.") {
            &self.pipeline_queue
        } else if task_name.starts_with("callback.") {
            &self.callback_queue
        } else if task_name.starts_with("terminator.") {
            &self.terminator_queue
        } else {
            &self.request_queue
        }
    }
}

#[cfg(test)]
mod test {
    use super::TaskRoutes;

    #[test]
    fn resolves_well_known_prefixes() {
        let routes = TaskRoutes::default();
        assert_eq!(routes.queue_for("crawler.multi_stage"), "crawler");
        assert_eq!(routes.queue_for("pipeline.data_storage"), "pipeline");
        assert_eq!(routes.queue_for("callback.target_monitor"), "callback");
        assert_eq!(routes.queue_for("terminator.budget"), "terminator");
    }

    #[test]
    fn falls_back_to_request_queue() {
        let routes = TaskRoutes::default();
        assert_eq!(routes.queue_for("google_play_store.detail"), "request");
    }
}
