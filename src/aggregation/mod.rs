// Reduces an instance's fetched series into summary stats.
// Multi-node: max across nodes at each timestamp first, then the category reduction over time.

pub mod commands;

use std::collections::BTreeMap;

use crate::models::{
    AggregatedStat, AggregatedStats, CommandCategory, CommandStat, CommandStats, Instance,
    MetricKind, MetricSeries, Reduction,
};

/// Label names the backend has used for the command name, in lookup order.
const COMMAND_LABELS: [&str; 3] = ["cmd", "command", "command_name"];

/// Stats for a whole instance plus each of its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceStats {
    pub instance: AggregatedStats,
    /// Keyed by node id.
    pub nodes: BTreeMap<String, AggregatedStats>,
}

/// Aggregates every series fetched for `instance`.
/// Instance-level series (capacity) are applied to every node's stats as well.
pub fn aggregate(instance: &Instance, series: &[MetricSeries]) -> InstanceStats {
    let all: Vec<&MetricSeries> = series.iter().collect();
    let instance_stats = aggregate_series(&all);

    let mut nodes = BTreeMap::new();
    for node in &instance.nodes {
        let node_series: Vec<&MetricSeries> = series
            .iter()
            .filter(|s| s.node_id.is_none() || s.node_id.as_deref() == Some(node.id.as_str()))
            .collect();
        nodes.insert(node.id.clone(), aggregate_series(&node_series));
    }

    InstanceStats {
        instance: instance_stats,
        nodes,
    }
}

/// Reduces a set of series that may span several nodes. Empty input gives all-zero stats.
pub fn aggregate_series(series: &[&MetricSeries]) -> AggregatedStats {
    let mut out = AggregatedStats::zero();

    let (by_ts, step_secs) = command_stats_by_timestamp(series);
    out.commands = reduce_commands(&by_ts, step_secs);

    let connections = values(&max_across_nodes(of_kind(series, MetricKind::Connections)));
    out.connections_avg = AggregatedStat::reduce(Reduction::Average, &connections);
    out.connections_peak = AggregatedStat::reduce(Reduction::Max, &connections);

    let memory = values(&max_across_nodes(of_kind(series, MetricKind::MemoryUsage)));
    out.memory_used_peak = AggregatedStat::reduce(Reduction::Max, &memory);

    let capacity = values(&max_across_nodes(of_kind(series, MetricKind::MaxMemory)));
    out.max_memory = AggregatedStat::reduce(Reduction::Max, &capacity);

    let traffic_in = values(&max_across_nodes(
        of_kind(series, MetricKind::NetworkTraffic).filter(|s| s.label("direction") == Some("in")),
    ));
    let traffic_out = values(&max_across_nodes(
        of_kind(series, MetricKind::NetworkTraffic).filter(|s| s.label("direction") == Some("out")),
    ));
    out.network_in_total = AggregatedStat::reduce(Reduction::Sum, &traffic_in);
    out.network_out_total = AggregatedStat::reduce(Reduction::Sum, &traffic_out);

    let throughput_total = out.command(CommandCategory::Throughput).total.value;
    out.request_bytes_avg = per_command(out.network_in_total, throughput_total);
    out.response_bytes_avg = per_command(out.network_out_total, throughput_total);

    out
}

fn of_kind<'a>(
    series: &'a [&'a MetricSeries],
    kind: MetricKind,
) -> impl Iterator<Item = &'a MetricSeries> + 'a {
    series.iter().copied().filter(move |s| s.metric == kind)
}

/// Sums series of the same node at each timestamp, then takes the max across nodes.
fn max_across_nodes<'a>(series: impl Iterator<Item = &'a MetricSeries>) -> BTreeMap<i64, f64> {
    let mut per_node: BTreeMap<Option<&str>, BTreeMap<i64, f64>> = BTreeMap::new();
    for s in series {
        let node = per_node.entry(s.node_id.as_deref()).or_default();
        for p in &s.points {
            *node.entry(p.timestamp).or_insert(0.0) += p.value;
        }
    }
    let mut out: BTreeMap<i64, f64> = BTreeMap::new();
    for points in per_node.values() {
        for (ts, v) in points {
            out.entry(*ts)
                .and_modify(|cur| *cur = cur.max(*v))
                .or_insert(*v);
        }
    }
    out
}

fn values(by_ts: &BTreeMap<i64, f64>) -> Vec<f64> {
    by_ts.values().copied().collect()
}

/// Per timestamp: categorize each node's commands, then max across nodes.
/// Returns the step the command series were aligned to.
fn command_stats_by_timestamp(series: &[&MetricSeries]) -> (BTreeMap<i64, CommandStats>, u64) {
    let mut per_node: BTreeMap<Option<&str>, BTreeMap<i64, BTreeMap<String, f64>>> =
        BTreeMap::new();
    let mut step_secs = 0u64;
    for s in of_kind(series, MetricKind::Commands) {
        let Some(cmd) = COMMAND_LABELS.iter().find_map(|k| s.label(k)) else {
            continue;
        };
        step_secs = step_secs.max(s.step_secs);
        let node = per_node.entry(s.node_id.as_deref()).or_default();
        for p in &s.points {
            *node
                .entry(p.timestamp)
                .or_default()
                .entry(cmd.to_string())
                .or_insert(0.0) += p.value;
        }
    }

    let mut by_ts: BTreeMap<i64, CommandStats> = BTreeMap::new();
    for points in per_node.values() {
        for (ts, cmds) in points {
            let processed = commands::process_metric_point(cmds);
            by_ts
                .entry(*ts)
                .or_insert_with(CommandStats::new)
                .max_with(&processed);
        }
    }
    (by_ts, step_secs)
}

/// Totals sum the per-step counts; peaks take the busiest step as ops/sec.
fn reduce_commands(
    by_ts: &BTreeMap<i64, CommandStats>,
    step_secs: u64,
) -> BTreeMap<CommandCategory, CommandStat> {
    let step = step_secs.max(1) as f64;
    CommandCategory::ALL
        .iter()
        .map(|category| {
            let counts: Vec<f64> = by_ts.values().map(|s| s.get(*category)).collect();
            let rates: Vec<f64> = counts.iter().map(|c| c / step).collect();
            let stat = CommandStat {
                total: AggregatedStat::reduce(Reduction::Sum, &counts),
                peak_ops: AggregatedStat::reduce(Reduction::Max, &rates),
            };
            (*category, stat)
        })
        .collect()
}

/// Bytes per command over the window; zero when no commands ran.
fn per_command(bytes: AggregatedStat, commands_total: f64) -> AggregatedStat {
    let value = if commands_total > 0.0 {
        bytes.value / commands_total
    } else {
        0.0
    };
    AggregatedStat {
        reduction: Reduction::Average,
        value,
        samples: bytes.samples,
    }
}
