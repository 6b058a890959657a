// Aggregated figures: command categories and per-instance summary stats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Command categories reported per instance. Declaration order is column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandCategory {
    Throughput,
    GetType,
    SetType,
    OtherType,
    Bitmap,
    Cluster,
    Eval,
    GeoSpatial,
    Hash,
    HyperLogLog,
    Key,
    List,
    PubSub,
    Set,
    SortedSet,
    String,
    Stream,
    Transaction,
}

impl CommandCategory {
    pub const ALL: [CommandCategory; 18] = [
        CommandCategory::Throughput,
        CommandCategory::GetType,
        CommandCategory::SetType,
        CommandCategory::OtherType,
        CommandCategory::Bitmap,
        CommandCategory::Cluster,
        CommandCategory::Eval,
        CommandCategory::GeoSpatial,
        CommandCategory::Hash,
        CommandCategory::HyperLogLog,
        CommandCategory::Key,
        CommandCategory::List,
        CommandCategory::PubSub,
        CommandCategory::Set,
        CommandCategory::SortedSet,
        CommandCategory::String,
        CommandCategory::Stream,
        CommandCategory::Transaction,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            CommandCategory::Throughput => "Throughput (Ops)",
            CommandCategory::GetType => "GetTypeCmds",
            CommandCategory::SetType => "SetTypeCmds",
            CommandCategory::OtherType => "OtherTypeCmds",
            CommandCategory::Bitmap => "BitmapBasedCmds",
            CommandCategory::Cluster => "ClusterBasedCmds",
            CommandCategory::Eval => "EvalBasedCmds",
            CommandCategory::GeoSpatial => "GeoSpatialBasedCmds",
            CommandCategory::Hash => "HashBasedCmds",
            CommandCategory::HyperLogLog => "HyperLogLogBasedCmds",
            CommandCategory::Key => "KeyBasedCmds",
            CommandCategory::List => "ListBasedCmds",
            CommandCategory::PubSub => "PubSubBasedCmds",
            CommandCategory::Set => "SetBasedCmds",
            CommandCategory::SortedSet => "SortedSetBasedCmds",
            CommandCategory::String => "StringBasedCmds",
            CommandCategory::Stream => "StreamBasedCmds",
            CommandCategory::Transaction => "TransactionBasedCmds",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One value per command category; every category is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStats(BTreeMap<CommandCategory, f64>);

impl Default for CommandStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStats {
    pub fn new() -> Self {
        Self(CommandCategory::ALL.iter().map(|c| (*c, 0.0)).collect())
    }

    pub fn get(&self, category: CommandCategory) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, category: CommandCategory, value: f64) {
        *self.0.entry(category).or_insert(0.0) += value;
    }

    /// Per-category maximum of `self` and `other`.
    pub fn max_with(&mut self, other: &CommandStats) {
        for (category, value) in &other.0 {
            let slot = self.0.entry(*category).or_insert(0.0);
            if *value > *slot {
                *slot = *value;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommandCategory, f64)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(|v| *v == 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    Sum,
    Average,
    Max,
}

/// A reduced figure and how many samples went into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStat {
    pub reduction: Reduction,
    pub value: f64,
    pub samples: u64,
}

impl AggregatedStat {
    pub fn zero(reduction: Reduction) -> Self {
        Self {
            reduction,
            value: 0.0,
            samples: 0,
        }
    }

    /// Reduces `values` with `reduction`; an empty input yields zero with zero samples.
    pub fn reduce(reduction: Reduction, values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::zero(reduction);
        }
        let value = match reduction {
            Reduction::Sum => values.iter().sum(),
            Reduction::Average => mean_f64(values),
            Reduction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Self {
            reduction,
            value,
            samples: values.len() as u64,
        }
    }
}

fn mean_f64(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / (v.len() as f64)
}

/// Total count and peak rate for one command category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandStat {
    pub total: AggregatedStat,
    /// Highest ops/sec seen in any step.
    pub peak_ops: AggregatedStat,
}

impl Default for CommandStat {
    fn default() -> Self {
        Self {
            total: AggregatedStat::zero(Reduction::Sum),
            peak_ops: AggregatedStat::zero(Reduction::Max),
        }
    }
}

/// Summary figures for one instance (or one node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub commands: BTreeMap<CommandCategory, CommandStat>,
    pub connections_avg: AggregatedStat,
    pub connections_peak: AggregatedStat,
    pub memory_used_peak: AggregatedStat,
    pub max_memory: AggregatedStat,
    pub network_in_total: AggregatedStat,
    pub network_out_total: AggregatedStat,
    pub request_bytes_avg: AggregatedStat,
    pub response_bytes_avg: AggregatedStat,
}

impl Default for AggregatedStats {
    fn default() -> Self {
        Self::zero()
    }
}

impl AggregatedStats {
    pub fn zero() -> Self {
        Self {
            commands: CommandCategory::ALL
                .iter()
                .map(|c| (*c, CommandStat::default()))
                .collect(),
            connections_avg: AggregatedStat::zero(Reduction::Average),
            connections_peak: AggregatedStat::zero(Reduction::Max),
            memory_used_peak: AggregatedStat::zero(Reduction::Max),
            max_memory: AggregatedStat::zero(Reduction::Max),
            network_in_total: AggregatedStat::zero(Reduction::Sum),
            network_out_total: AggregatedStat::zero(Reduction::Sum),
            request_bytes_avg: AggregatedStat::zero(Reduction::Average),
            response_bytes_avg: AggregatedStat::zero(Reduction::Average),
        }
    }

    pub fn command(&self, category: CommandCategory) -> CommandStat {
        self.commands.get(&category).copied().unwrap_or_default()
    }

    /// Samples behind the throughput figure (one per aligned step).
    pub fn samples(&self) -> u64 {
        self.command(CommandCategory::Throughput).total.samples
    }

    pub fn is_zero(&self) -> bool {
        self.metric_values().iter().all(|(_, v)| *v == 0.0)
    }

    /// Metric columns in report order.
    pub fn metric_values(&self) -> Vec<(String, f64)> {
        let mut out = vec![
            ("BytesUsedForCache".to_string(), self.memory_used_peak.value),
            ("MaxMemory".to_string(), self.max_memory.value),
            ("ConnectedClients".to_string(), self.connections_avg.value),
            ("PeakConnectedClients".to_string(), self.connections_peak.value),
            ("NetworkBytesIn".to_string(), self.network_in_total.value),
            ("NetworkBytesOut".to_string(), self.network_out_total.value),
            ("AvgRequestBytes".to_string(), self.request_bytes_avg.value),
            ("AvgResponseBytes".to_string(), self.response_bytes_avg.value),
            ("Samples".to_string(), self.samples() as f64),
        ];
        for category in CommandCategory::ALL {
            let stat = self.command(category);
            out.push((category.column_name().to_string(), stat.peak_ops.value));
            out.push((format!("{} Total", category.column_name()), stat.total.value));
        }
        out
    }

    /// Header names of `metric_values`, without needing an instance.
    pub fn metric_columns() -> Vec<String> {
        Self::zero()
            .metric_values()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}
