//! The pipeline runtime: stage composition and quiescence detection.
//!
//! Composes the name source through the subdomain task as a linear FIFO
//! chain of bounded channels, runs the source dispatcher alongside it, and
//! samples the quiescence predicate to decide when the run is done: the
//! name source's queue empty, every stage idle (`Stats::is_idle`), and the
//! dispatcher's `pending() == false`, re-sampled on an interval rather than
//! behind a central barrier.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::dedup::{DedupSet, MultiplicityCounter};
use crate::error::EngineError;
use crate::graph::SharedGraph;
use crate::model::{DNSRequest, Event, Seed, Tag};
use crate::pipeline::dispatcher::SourceDispatcher;
use crate::pipeline::name_source::NameSource;
use crate::pipeline::{data_manager, dns_task, root_task, subdomain_task, validation_task};
use crate::resolver::SharedResolver;
use crate::source::DataSource;
use crate::stats::Stats;
use crate::wildcard::WildcardDetector;

/// Buffered-mode (active) in-flight window.
const BUFFERED_BOUND: usize = 50;
/// Unbuffered mode (passive) pulls one at a time.
const UNBUFFERED_BOUND: usize = 1;

/// Interval between quiescence samples. Short enough that a finished run
/// exits promptly, long enough that it isn't a busy-loop.
const QUIESCENCE_POLL: Duration = Duration::from_millis(25);
/// Number of consecutive idle samples required before declaring quiescence,
/// so a momentary gap between one stage retiring an item and the next
/// stage picking it up isn't mistaken for the end of the run.
const QUIESCENCE_DEBOUNCE: u32 = 3;

pub enum RuntimeOutcome {
    Completed,
    Cancelled,
}

/// Owns everything one enumeration run needs: the two resolver pools (the
/// DNS task and validation task must use distinct ones), the graph, and the
/// configured data sources. `run` seeds the name source and the dispatcher
/// from `config` and returns once the run has quiesced or been cancelled.
pub struct PipelineRuntime {
    config: Arc<Config>,
    resolver: SharedResolver,
    trusted_resolver: SharedResolver,
    graph: SharedGraph,
    sources: Vec<Arc<dyn DataSource>>,
    cancel: CancelToken,
}

impl PipelineRuntime {
    pub fn new(
        config: Config,
        resolver: SharedResolver,
        trusted_resolver: SharedResolver,
        graph: SharedGraph,
        sources: Vec<Arc<dyn DataSource>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            trusted_resolver,
            graph,
            sources,
            cancel: CancelToken::new(),
        }
    }

    /// A clone of the runtime's cancellation token, for an external caller
    /// (e.g. the CLI's Ctrl-C handler) to trigger cancellation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn run(self, event: Event) -> Result<RuntimeOutcome, EngineError> {
        let PipelineRuntime {
            config,
            resolver,
            trusted_resolver,
            graph,
            sources,
            cancel,
        } = self;

        config.validate()?;

        let bound = if config.passive { UNBUFFERED_BOUND } else { BUFFERED_BOUND };
        let name_source = Arc::new(NameSource::new());
        let stats = Arc::new(Stats::new());
        let wildcard = Arc::new(WildcardDetector::new(trusted_resolver.clone()));
        let primed_roots = Arc::new(DedupSet::new());
        let subdomain_counts = Arc::new(MultiplicityCounter::new());
        let xfr_seen = Arc::new(DedupSet::new());

        // name source -> root task
        let (root_in_tx, root_in_rx) = mpsc::channel::<DNSRequest>(bound);
        // root task -> (DNS task, or directly validation in passive mode)
        let (root_out_tx, root_out_rx) = mpsc::channel::<DNSRequest>(bound);
        // validation task -> data manager
        let (validated_tx, validated_rx) = mpsc::channel::<DNSRequest>(bound);
        // data manager -> subdomain task
        let (persisted_tx, persisted_rx) = mpsc::channel::<DNSRequest>(bound);
        // data manager -> subdomain task reverse-sweep queue
        let (reverse_tx, reverse_rx) = mpsc::unbounded_channel();
        // data-source discoveries -> admission filter
        let (source_emit_tx, mut source_emit_rx) = mpsc::unbounded_channel::<DNSRequest>();

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        handles.push(tokio::spawn(root_task::run(
            resolver.clone(),
            config.clone(),
            name_source.clone(),
            stats.clone(),
            primed_roots,
            cancel.clone(),
            root_in_rx,
            root_out_tx,
        )));

        let validation_in_rx = if config.passive {
            // Passive mode bypasses the DNS task entirely.
            root_out_rx
        } else {
            let (dns_out_tx, dns_out_rx) = mpsc::channel::<DNSRequest>(bound);
            handles.push(tokio::spawn(dns_task::run(
                resolver.clone(),
                config.clone(),
                stats.clone(),
                cancel.clone(),
                root_out_rx,
                dns_out_tx,
            )));
            dns_out_rx
        };

        handles.push(tokio::spawn(validation_task::run(
            trusted_resolver.clone(),
            config.clone(),
            wildcard,
            stats.clone(),
            cancel.clone(),
            validation_in_rx,
            validated_tx,
        )));

        handles.push(tokio::spawn(data_manager::run(
            graph.clone(),
            config.clone(),
            event,
            name_source.clone(),
            stats.clone(),
            cancel.clone(),
            validated_rx,
            persisted_tx,
            reverse_tx,
        )));

        handles.push(tokio::spawn(subdomain_task::run(
            resolver.clone(),
            config.clone(),
            name_source.clone(),
            stats.clone(),
            subdomain_counts,
            xfr_seen,
            cancel.clone(),
            persisted_rx,
            reverse_rx,
        )));

        let dispatcher = SourceDispatcher::new(sources, source_emit_tx, cancel.clone());

        // Bridges raw data-source discoveries back through the name source's
        // admission filter. A source's `handle` never bypasses dedup/scope.
        {
            let name_source = name_source.clone();
            let config = config.clone();
            let stats = stats.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let req = tokio::select! {
                        _ = cancel.cancelled() => break,
                        item = source_emit_rx.recv() => match item {
                            Some(req) => req,
                            None => break,
                        },
                    };
                    name_source.new_name(req, &config, &stats).await;
                }
            }));
        }

        // Feeds the name source's admitted stream into the bounded root-task
        // input channel.
        let feeder = {
            let name_source = name_source.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let req = tokio::select! {
                        _ = cancel.cancelled() => break,
                        item = name_source.next() => match item {
                            Some(req) => req,
                            None => break,
                        },
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        res = root_in_tx.send(req) => if res.is_err() { break; },
                    }
                }
            })
        };

        seed(&config, &name_source, &dispatcher, &stats).await;

        let outcome = wait_for_quiescence_or_cancellation(&cancel, &stats, &dispatcher).await;

        name_source.stop().await;
        cancel.cancel();

        let _ = feeder.await;
        for handle in handles {
            let _ = handle.await;
        }
        dispatcher.shutdown().await;

        Ok(outcome)
    }
}

/// Admits configured roots and user-provided names into the name source,
/// and submits configured ASNs to the dispatcher (ASN results are an
/// adapter concern, never re-entering the name source directly from here).
async fn seed(config: &Config, name_source: &NameSource, dispatcher: &SourceDispatcher, stats: &Stats) {
    for domain in &config.domains {
        let req = DNSRequest::new(domain.clone(), domain.clone(), Tag::Dns, "DNS");
        name_source.new_name(req.clone(), config, stats).await;
        dispatcher.send_requests(Seed::Name(req));
    }
    for name in &config.provided_names {
        let domain = config.which_domain(name);
        let req = DNSRequest::new(name.clone(), domain, Tag::External, "User Input");
        name_source.new_name(req, config, stats).await;
    }
    for asn in &config.asns {
        dispatcher.send_requests(Seed::Asn(crate::model::ASNRequest::new(*asn)));
    }
}

async fn wait_for_quiescence_or_cancellation(cancel: &CancelToken, stats: &Stats, dispatcher: &SourceDispatcher) -> RuntimeOutcome {
    let mut idle_streak = 0;
    loop {
        if cancel.is_cancelled() {
            return RuntimeOutcome::Cancelled;
        }
        tokio::select! {
            _ = cancel.cancelled() => return RuntimeOutcome::Cancelled,
            _ = tokio::time::sleep(QUIESCENCE_POLL) => {},
        }
        let quiescent = stats.is_idle() && !dispatcher.pending();
        if quiescent {
            idle_streak += 1;
            if idle_streak >= QUIESCENCE_DEBOUNCE {
                return RuntimeOutcome::Completed;
            }
        } else {
            idle_streak = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError as Err2;
    use crate::graph::InMemoryGraph;
    use crate::model::{DNSAnswer, RecordType};
    use crate::resolver::Resolver;
    use async_trait::async_trait;
    use std::net::IpAddr;

    struct EmptyResolver;

    #[async_trait]
    impl Resolver for EmptyResolver {
        async fn resolve(&self, _name: &str, _rtype: RecordType) -> Result<Vec<DNSAnswer>, Err2> {
            Ok(vec![])
        }
        async fn reverse(&self, _ip: IpAddr) -> Result<Option<DNSAnswer>, Err2> {
            Ok(None)
        }
        async fn zone_transfer(&self, _s: &str, _d: &str, _srv: &str) -> Result<Vec<DNSRequest>, Err2> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn single_root_passive_run_persists_root_and_completes() {
        let mut config = Config::new(vec!["example.com".into()]);
        config.passive = true;
        // The test double never returns an answer for anything; without this,
        // C4 (which always re-resolves, even in passive mode, see DESIGN.md)
        // would drop the unresolvable root before it reaches the graph.
        config.include_unresolvable = true;
        let resolver: SharedResolver = Arc::new(EmptyResolver);
        let graph = Arc::new(InMemoryGraph::new());
        let graph_dyn: SharedGraph = graph.clone();

        let runtime = PipelineRuntime::new(config, resolver.clone(), resolver, graph_dyn, vec![]);
        let event = Event::new(1);
        let outcome = tokio::time::timeout(Duration::from_secs(5), runtime.run(event))
            .await
            .expect("run did not quiesce in time")
            .expect("run failed");

        assert!(matches!(outcome, RuntimeOutcome::Completed));
        let names = graph.event_fqdns(event).await;
        assert!(names.contains(&"example.com".to_string()));
    }

    #[tokio::test]
    async fn cancellation_returns_cancelled_outcome() {
        let config = Config::new(vec!["example.com".into()]);
        let resolver: SharedResolver = Arc::new(EmptyResolver);
        let graph: SharedGraph = Arc::new(InMemoryGraph::new());

        let runtime = PipelineRuntime::new(config, resolver.clone(), resolver, graph, vec![]);
        let cancel = runtime.cancel_token();
        let event = Event::new(2);

        let run = tokio::spawn(runtime.run(event));
        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run did not exit after cancellation")
            .expect("task panicked")
            .expect("run failed");

        assert!(matches!(outcome, RuntimeOutcome::Cancelled));
    }
}
