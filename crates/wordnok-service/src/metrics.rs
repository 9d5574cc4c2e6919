//! Statsd metrics.
//!
//! Metrics are emitted with the [`metric!`](crate::metric) macro. Until [`configure_statsd`] has
//! been called, the macro does nothing.

use std::collections::BTreeMap;
use std::io;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;

use cadence::{Metric, MetricBuilder, MetricSink, StatsdClient, UdpMetricSink};

static METRICS_CLIENT: OnceLock<MetricsClient> = OnceLock::new();

/// Re-exports the traits the [`metric!`](crate::metric) macro needs in scope.
pub mod prelude {
    pub use cadence::prelude::*;
}

/// A statsd client that adds a fixed set of tags to every metric.
#[derive(Debug)]
pub struct MetricsClient {
    statsd_client: StatsdClient,
    tags: BTreeMap<String, String>,
}

impl MetricsClient {
    pub fn new<S>(prefix: &str, sink: S, tags: BTreeMap<String, String>) -> Self
    where
        S: MetricSink + Sync + Send + std::panic::RefUnwindSafe + 'static,
    {
        Self {
            statsd_client: StatsdClient::from_sink(prefix, sink),
            tags,
        }
    }

    pub fn statsd(&self) -> &StatsdClient {
        &self.statsd_client
    }

    /// Adds the client's tags to `metric`, and sends it.
    pub fn send_metric<'a, T>(&'a self, metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        let metric = self
            .tags
            .iter()
            .fold(metric, |metric, (tag, value)| metric.with_tag(tag, value));
        metric.send()
    }
}

/// Sends all metrics of this process to the statsd server at `host`.
///
/// Only the first call has an effect.
pub fn configure_statsd<A: ToSocketAddrs>(
    prefix: &str,
    host: A,
    tags: BTreeMap<String, String>,
) -> io::Result<()> {
    let addrs: Vec<_> = host.to_socket_addrs()?.collect();
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(&addrs[..], socket).map_err(io::Error::other)?;

    if let Some(addr) = addrs.first() {
        tracing::info!("Reporting metrics to statsd at {}", addr);
    }
    install(MetricsClient::new(prefix, sink, tags));
    Ok(())
}

/// Makes `client` the client of this process, unless one was installed before.
pub fn install(client: MetricsClient) {
    if METRICS_CLIENT.set(client).is_err() {
        tracing::warn!("statsd was already configured");
    }
}

/// Calls `f` with the installed client, if there is one.
#[inline(always)]
pub fn with_client<F>(f: F)
where
    F: FnOnce(&MetricsClient),
{
    if let Some(client) = METRICS_CLIENT.get() {
        f(client)
    }
}

/// Emits a counter or histogram, with optional `"tag" => value` pairs.
///
/// ```ignore
/// metric!(counter("memoize.hit") += 1, "function" => "getDefinitions");
/// metric!(histogram("batch.size") = 12u64);
/// ```
#[macro_export]
macro_rules! metric {
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {
        $crate::metrics::with_client(|client| {
            use $crate::metrics::prelude::*;
            client.send_metric(client.statsd().count_with_tags($id, $value)$(.with_tag($k, $v))*);
        })
    };

    (histogram($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {
        $crate::metrics::with_client(|client| {
            use $crate::metrics::prelude::*;
            client.send_metric(
                client.statsd().histogram_with_tags($id, $value)$(.with_tag($k, $v))*,
            );
        })
    };
}
