use crate::{
    index::{self, metrics::IndexMetrics, Trigger},
    k8s::{
        athenz::AthenzDomain,
        rbac::{ClusterRbacConfig, ServiceRole, ServiceRoleBinding},
        watcher, Namespace, Service,
    },
    rbac::{self, queue, RetryPolicy},
    DomainDiscover,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "athenz-policy-controller",
    about = "Derives mesh RBAC resources from Athenz domains"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "athenz=info,warn",
        env = "ATHENZ_POLICY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The suffix of service identifiers written into access rules.
    #[clap(long, default_value = "svc.cluster.local")]
    dns_suffix: String,

    /// How often every namespace's domain is reconciled, regardless of watch events.
    #[clap(long, default_value = "60")]
    poll_interval_secs: u64,

    /// How long to wait for caches to sync at startup before giving up.
    #[clap(long, default_value = "60")]
    cache_sync_timeout_secs: u64,

    /// The number of times a failed pass is retried before waiting for the next trigger.
    #[clap(long, default_value = "3")]
    max_retries: u32,

    /// Disables maintenance of the cluster RBAC config's inclusion list.
    #[clap(long)]
    disable_onboarding: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            dns_suffix,
            poll_interval_secs,
            cache_sync_timeout_secs,
            max_retries,
            disable_onboarding,
        } = self;

        let rules_trigger = Trigger::default();
        let onboarding_trigger = Trigger::default();

        let namespace_index = index::NamespaceIndex::shared();
        let domain_index = index::DomainIndex::shared(rules_trigger.clone());
        let service_index = index::ServiceIndex::shared(onboarding_trigger.clone());

        let mut prom = <Registry>::default();
        let rbac_metrics =
            rbac::ControllerMetrics::register(prom.sub_registry_with_prefix("rbac"));
        let namespace_metrics = IndexMetrics::register(
            namespace_index.clone(),
            prom.sub_registry_with_prefix("namespace"),
        )
        .shared();
        let domain_metrics =
            IndexMetrics::register(domain_index.clone(), prom.sub_registry_with_prefix("domain"))
                .shared();
        let service_metrics = IndexMetrics::register(
            service_index.clone(),
            prom.sub_registry_with_prefix("service"),
        )
        .shared();
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches.

        let namespaces = runtime.watch_all::<Namespace>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(namespace_metrics, namespaces)
                .instrument(info_span!("namespaces")),
        );

        let domains = runtime.watch_all::<AthenzDomain>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(domain_metrics, domains).instrument(info_span!("athenzdomains")),
        );

        let mut synced = vec![
            namespace_index.read().synced(),
            domain_index.read().synced(),
        ];

        if !disable_onboarding {
            let services = runtime.watch_all::<Service>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(service_metrics, services)
                    .instrument(info_span!("services")),
            );

            let configs = runtime.watch_all::<ClusterRbacConfig>(watcher::Config::default());
            tokio::spawn(
                kubert::index::cluster(onboarding_trigger.clone().shared(), configs)
                    .instrument(info_span!("clusterrbacconfigs")),
            );

            synced.push(service_index.read().synced());
        }

        // Do not act on a partial view of the cluster.
        let timeout = Duration::from_secs(cache_sync_timeout_secs);
        match time::timeout(timeout, index::wait_synced(synced)).await {
            Ok(true) => info!("Caches synced"),
            Ok(false) => bail!("Cache watches terminated before syncing"),
            Err(_) => bail!("Timed out after {timeout:?} waiting for caches to sync"),
        }

        let retry = RetryPolicy::with_max_retries(max_retries);
        let client = runtime.client();

        let controller = Arc::new(rbac::Controller::new(
            DomainDiscover::new(domain_index),
            namespace_index,
            rbac::KubeStore::<ServiceRole>::new(client.clone()),
            rbac::KubeStore::<ServiceRoleBinding>::new(client.clone()),
            dns_suffix.clone(),
            rbac_metrics.clone(),
        ));
        tokio::spawn(
            poll(rules_trigger.clone(), Duration::from_secs(poll_interval_secs))
                .instrument(info_span!("poll")),
        );
        tokio::spawn(
            queue::run(
                rules_trigger,
                retry,
                runtime.shutdown_handle().signaled(),
                move || {
                    let controller = controller.clone();
                    async move { controller.sync().await }
                },
            )
            .instrument(info_span!("rules")),
        );

        if !disable_onboarding {
            let onboarding = Arc::new(rbac::Onboarding::new(
                service_index,
                rbac::KubeClusterStore::<ClusterRbacConfig>::new(client),
                dns_suffix,
                rbac_metrics,
            ));
            tokio::spawn(
                queue::run(
                    onboarding_trigger,
                    retry,
                    runtime.shutdown_handle().signaled(),
                    move || {
                        let onboarding = onboarding.clone();
                        async move { onboarding.sync().await }
                    },
                )
                .instrument(info_span!("onboarding")),
            );
        }

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Triggers a pass on a fixed interval; the authority offers no change notifications.
async fn poll(trigger: Trigger, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        trigger.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["athenz-policy-controller"]).expect("args must parse");
        assert_eq!(args.dns_suffix, "svc.cluster.local");
        assert_eq!(args.poll_interval_secs, 60);
        assert_eq!(args.cache_sync_timeout_secs, 60);
        assert_eq!(args.max_retries, 3);
        assert!(!args.disable_onboarding);
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "athenz-policy-controller",
            "--dns-suffix=svc.example.com",
            "--max-retries=5",
            "--disable-onboarding",
        ])
        .expect("args must parse");
        assert_eq!(args.dns_suffix, "svc.example.com");
        assert_eq!(args.max_retries, 5);
        assert!(args.disable_onboarding);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_an_interval() {
        let trigger = Trigger::default();
        tokio::spawn(poll(trigger.clone(), Duration::from_secs(60)));

        // The first pass runs immediately.
        time::timeout(Duration::from_millis(1), trigger.triggered())
            .await
            .expect("must trigger immediately");
        time::timeout(Duration::from_secs(61), trigger.triggered())
            .await
            .expect("must trigger after the period");
    }
}
