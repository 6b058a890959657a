// Instance discovery from monitoring series headers (monitoring read scope only).

use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::error::{ReportError, ReportResult};
use crate::models::{
    Instance, MetricKind, Node, Product, Topology, Window, extract_database_name, normalize_role,
};
use crate::monitoring_repo::{MonitoringBackend, SeriesQuery, TimeSeries, list_all_pages};

const REGION_LABELS: [&str; 2] = ["region", "location"];
const ZONE_LABELS: [&str; 1] = ["zone"];
const NODE_TYPE_LABELS: [&str; 5] = [
    "node_type",
    "cluster_node_type",
    "tier",
    "service_tier",
    "instance_type",
];
const INSTANCE_ID_FALLBACKS: [&str; 3] = ["instance_id", "cluster_id", "resource_name"];
const NODE_ID_LABELS: [&str; 2] = ["node_id", "shard_id"];

/// Metrics whose headers reveal instances and nodes, in lookup order.
const DISCOVERY_METRICS: [MetricKind; 2] = [MetricKind::MemoryUsage, MetricKind::Commands];

fn pick<'a>(series: &'a TimeSeries, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| series.resource_label(k))
}

#[derive(Default)]
struct InstanceBuilder {
    region: Option<String>,
    zone: Option<String>,
    tier: Option<String>,
    nodes: BTreeMap<String, Option<String>>,
}

impl InstanceBuilder {
    fn absorb(&mut self, series: &TimeSeries) {
        if self.region.is_none() {
            self.region = pick(series, &REGION_LABELS).map(str::to_string);
        }
        if self.zone.is_none() {
            self.zone = pick(series, &ZONE_LABELS).map(str::to_string);
        }
        if self.tier.is_none() {
            self.tier = pick(series, &NODE_TYPE_LABELS).map(str::to_string);
        }
        let node_id = pick(series, &NODE_ID_LABELS).unwrap_or("unknown").to_string();
        let role = series
            .metric_label("role")
            .or_else(|| series.resource_label("role"))
            .and_then(normalize_role);
        let slot = self.nodes.entry(node_id).or_default();
        if slot.is_none() {
            *slot = role;
        }
    }

    fn build(self, project_id: &str, product: Product, instance_id: String) -> Instance {
        let nodes: Vec<Node> = self
            .nodes
            .into_iter()
            .map(|(id, role)| Node { id, role })
            .collect();
        Instance {
            project_id: project_id.to_string(),
            product,
            name: extract_database_name(&instance_id).to_string(),
            instance_id,
            topology: Topology::for_product(product, nodes.len()),
            tier: self.tier,
            region: self.region,
            zone: self.zone,
            nodes,
        }
    }
}

/// Lists every Memorystore instance in `project` that reported during `window`.
/// Sorted by database name then instance id. A project with nothing to list yields an empty vec.
#[instrument(skip(backend, window), fields(operation = "enumerate_instances"))]
pub async fn enumerate_instances(
    backend: &dyn MonitoringBackend,
    project: &str,
    window: Window,
    page_size: u32,
) -> ReportResult<Vec<Instance>> {
    let mut builders: BTreeMap<(Product, String), InstanceBuilder> = BTreeMap::new();

    for product in Product::ALL {
        for kind in DISCOVERY_METRICS {
            let Some(metric_type) = product.metric_type(kind) else {
                continue;
            };
            let query = SeriesQuery::headers(kind, metric_type, window, page_size);
            let series = match list_all_pages(backend, project, &query).await {
                Ok(s) => s,
                Err(ReportError::NotFound(msg)) => {
                    debug!(product = %product, metric = metric_type, reason = %msg, "nothing to list");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for ts in &series {
                let instance_id = std::iter::once(product.instance_label())
                    .chain(INSTANCE_ID_FALLBACKS)
                    .find_map(|k| ts.resource_label(k))
                    .unwrap_or("unknown")
                    .to_string();
                builders
                    .entry((product, instance_id))
                    .or_default()
                    .absorb(ts);
            }
        }
    }

    let mut instances: Vec<Instance> = builders
        .into_iter()
        .map(|((product, instance_id), b)| b.build(project, product, instance_id))
        .collect();
    instances.sort_by(|a, b| (&a.name, &a.instance_id).cmp(&(&b.name, &b.instance_id)));
    debug!(instances = instances.len(), "enumeration complete");
    Ok(instances)
}
