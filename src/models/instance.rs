// Memorystore products, instances and the nodes behind them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Memorystore product family. Each one publishes its own metric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Product {
    Redis,
    Valkey,
    RedisCluster,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::Redis, Product::Valkey, Product::RedisCluster];

    /// Display label written to the InstanceType column.
    pub fn label(self) -> &'static str {
        match self {
            Product::Redis => "Redis",
            Product::Valkey => "Valkey",
            Product::RedisCluster => "Redis Cluster",
        }
    }

    /// Resource label that carries the instance (or cluster) identifier.
    pub fn instance_label(self) -> &'static str {
        match self {
            Product::Redis | Product::Valkey => "instance_id",
            Product::RedisCluster => "cluster_id",
        }
    }

    /// Cloud Monitoring metric type for `kind`, or None when the product does not publish it.
    pub fn metric_type(self, kind: MetricKind) -> Option<&'static str> {
        match (self, kind) {
            (Product::Redis, MetricKind::Commands) => Some("redis.googleapis.com/commands/calls"),
            (Product::Redis, MetricKind::MemoryUsage) => {
                Some("redis.googleapis.com/stats/memory/usage")
            }
            (Product::Redis, MetricKind::MaxMemory) => {
                Some("redis.googleapis.com/stats/memory/maxmemory")
            }
            (Product::Redis, MetricKind::Connections) => Some("redis.googleapis.com/clients/connected"),
            (Product::Redis, MetricKind::NetworkTraffic) => {
                Some("redis.googleapis.com/stats/network_traffic")
            }

            // Valkey: node-level for commands, usage and clients; instance-level for size.
            (Product::Valkey, MetricKind::Commands) => {
                Some("memorystore.googleapis.com/instance/node/commandstats/calls_count")
            }
            (Product::Valkey, MetricKind::MemoryUsage) => {
                Some("memorystore.googleapis.com/instance/node/memory/usage")
            }
            (Product::Valkey, MetricKind::MaxMemory) => {
                Some("memorystore.googleapis.com/instance/memory/size")
            }
            (Product::Valkey, MetricKind::Connections) => {
                Some("memorystore.googleapis.com/instance/node/clients/connected_count")
            }
            (Product::Valkey, MetricKind::NetworkTraffic) => None,

            // Redis Cluster: node-level for commands, usage and clients; cluster-level for size.
            (Product::RedisCluster, MetricKind::Commands) => {
                Some("redis.googleapis.com/cluster/node/commandstats/calls_count")
            }
            (Product::RedisCluster, MetricKind::MemoryUsage) => {
                Some("redis.googleapis.com/cluster/node/memory/usage")
            }
            (Product::RedisCluster, MetricKind::MaxMemory) => {
                Some("redis.googleapis.com/cluster/memory/size")
            }
            (Product::RedisCluster, MetricKind::Connections) => {
                Some("redis.googleapis.com/cluster/node/clients/connected_count")
            }
            (Product::RedisCluster, MetricKind::NetworkTraffic) => None,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counter metrics are reduced by sum, gauges by max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Counter,
    Gauge,
}

/// The metrics collected for every instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Commands,
    MemoryUsage,
    MaxMemory,
    Connections,
    NetworkTraffic,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Commands,
        MetricKind::MemoryUsage,
        MetricKind::MaxMemory,
        MetricKind::Connections,
        MetricKind::NetworkTraffic,
    ];

    pub fn series_kind(self) -> SeriesKind {
        match self {
            MetricKind::Commands | MetricKind::NetworkTraffic => SeriesKind::Counter,
            MetricKind::MemoryUsage | MetricKind::MaxMemory | MetricKind::Connections => {
                SeriesKind::Gauge
            }
        }
    }

    /// Capacity is published once per instance, everything else per node.
    pub fn is_instance_level(self) -> bool {
        matches!(self, MetricKind::MaxMemory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Commands => "commands",
            MetricKind::MemoryUsage => "memory_usage",
            MetricKind::MaxMemory => "max_memory",
            MetricKind::Connections => "connections",
            MetricKind::NetworkTraffic => "network_traffic",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    SingleNode,
    Replicated,
    Clustered,
}

impl Topology {
    pub fn for_product(product: Product, node_count: usize) -> Self {
        match product {
            Product::RedisCluster => Topology::Clustered,
            _ if node_count > 1 => Topology::Replicated,
            _ => Topology::SingleNode,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Topology::SingleNode => "single-node",
            Topology::Replicated => "replicated",
            Topology::Clustered => "clustered",
        }
    }
}

/// One physical member of a replicated or clustered instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// "Master", "Replica", or whatever role label the backend reported.
    pub role: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = normalize_role(role);
        self
    }
}

/// Maps the backend's `primary`/`replica` role label to report wording.
pub fn normalize_role(role: &str) -> Option<String> {
    match role {
        "" => None,
        "primary" => Some("Master".into()),
        "replica" => Some("Replica".into()),
        other => Some(other.to_string()),
    }
}

/// One managed cache database in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub project_id: String,
    pub product: Product,
    /// Full resource name as reported in the resource labels.
    pub instance_id: String,
    /// Short database name (last path segment of `instance_id`).
    pub name: String,
    pub topology: Topology,
    pub tier: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    /// Sorted by node id.
    pub nodes: Vec<Node>,
}

impl Instance {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_multi_node(&self) -> bool {
        self.nodes.len() > 1
    }
}

/// Last `/` segment of a resource name: `projects/p/locations/r/instances/db` -> `db`.
pub fn extract_database_name(instance_id: &str) -> &str {
    instance_id.rsplit('/').next().unwrap_or(instance_id)
}
