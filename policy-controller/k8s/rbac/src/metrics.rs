use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counts reconciliation passes and the store writes they issue.
#[derive(Clone, Debug, Default)]
pub struct ControllerMetrics {
    syncs: Family<SyncLabels, Counter>,
    writes: Family<WriteLabels, Counter>,
    domain_errors: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SyncLabels {
    controller: String,
    result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct WriteLabels {
    kind: String,
    op: String,
    result: String,
}

fn result<T, E>(res: &Result<T, E>) -> String {
    match res {
        Ok(_) => "ok".to_string(),
        Err(_) => "error".to_string(),
    }
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let syncs = Family::default();
        prom.register(
            "sync",
            "Count of reconciliation passes by controller and result",
            syncs.clone(),
        );

        let writes = Family::default();
        prom.register(
            "writes",
            "Count of store writes by object kind, operation and result",
            writes.clone(),
        );

        let domain_errors = Counter::default();
        prom.register(
            "domain_errors",
            "Count of authority domain lookups that failed",
            domain_errors.clone(),
        );

        Self {
            syncs,
            writes,
            domain_errors,
        }
    }

    pub(crate) fn sync<T, E>(&self, controller: &str, res: &Result<T, E>) {
        self.syncs
            .get_or_create(&SyncLabels {
                controller: controller.to_string(),
                result: result(res),
            })
            .inc();
    }

    pub(crate) fn write<T, E>(&self, kind: &str, op: &str, res: &Result<T, E>) {
        self.writes
            .get_or_create(&WriteLabels {
                kind: kind.to_string(),
                op: op.to_string(),
                result: result(res),
            })
            .inc();
    }

    pub(crate) fn domain_error(&self) {
        self.domain_errors.inc();
    }

    #[cfg(test)]
    pub(crate) fn writes(&self, kind: &str, op: &str) -> u64 {
        self.writes
            .get_or_create(&WriteLabels {
                kind: kind.to_string(),
                op: op.to_string(),
                result: "ok".to_string(),
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn domain_errors(&self) -> u64 {
        self.domain_errors.get()
    }
}
